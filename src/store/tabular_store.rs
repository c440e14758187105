// ==========================================
// Talhão APEX - tabular store
// ==========================================
// Generic schema-on-write storage over one SQLite file:
// - DDL: ensure_column / create / recreate / copy / drop
// - bulk_load (Replace | Append) with shape checks before any write
// - declarative_update: typed expressions evaluated per row in memory
// - join_with_fallback / aggregate / conditional_merge
// Every operation opens its own connection and transaction
// (acquire-use-release); nothing is held across pipeline stages.
// Identifiers are validated and quoted; values are always bound.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::store::error::{StoreError, StoreResult};
use crate::store::expr::Expr;
use crate::store::table::{ColumnDef, Dataset, LoadMode, Row, Table};
use crate::store::value::{date_from_julian_day, ColumnType, Value};
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Maximum bound parameters per IN (...) chunk
const IN_CHUNK: usize = 500;

/// Quote an identifier for SQL text
pub fn quote_ident(name: &str) -> StoreResult<String> {
    let t = name.trim();
    if t.is_empty() || t.contains('"') || t.contains('\0') {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", t))
}

/// Join/grouping key of a cell
///
/// Whole reals collapse onto integers so `1` and `1.0` meet, as SQL `=` does.
pub fn key_of(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Real(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some((*f as i64).to_string()),
        other => other.as_text(),
    }
}

// ==========================================
// Operation descriptors
// ==========================================

/// One column assignment of a declarative update
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnUpdate {
    pub column: String,
    pub column_type: ColumnType,
    pub expr: Expr,
}

impl ColumnUpdate {
    pub fn new(column: impl Into<String>, column_type: ColumnType, expr: Expr) -> Self {
        Self {
            column: column.into(),
            column_type,
            expr,
        }
    }
}

/// Join a base table against a lookup by primary key, then fallback key
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackJoin {
    pub base: String,
    pub joined: String,
    pub output: String,
    pub columns: Vec<String>,
    pub primary_key: String,
    pub fallback_key: String,
    pub ref_key: String,
}

impl FallbackJoin {
    /// Alias of a projected column in the output table
    pub fn alias(&self, column: &str) -> String {
        format!("{}_{}", column, self.joined)
    }
}

/// Area-weighted aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub base: String,
    pub output: String,
    pub group_by: String,
    /// (numerator column, output alias)
    pub measures: Vec<(String, String)>,
    pub area_column: String,
    pub date_column: String,
    pub date_alias: String,
}

/// Null-only merge of source columns into target columns
#[derive(Debug, Clone, PartialEq)]
pub struct NullMerge {
    pub target: String,
    pub source: String,
    pub target_key: String,
    pub source_key: String,
    /// (source column, target column)
    pub columns: Vec<(String, String)>,
}

// ==========================================
// TabularStore
// ==========================================

#[derive(Debug, Clone)]
pub struct TabularStore {
    db_path: String,
}

impl TabularStore {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Open a fresh connection for one operation
    pub fn connect(&self) -> StoreResult<Connection> {
        Ok(open_sqlite_connection(&self.db_path)?)
    }

    // ===== catalog =====

    pub fn table_exists(&self, table: &str) -> StoreResult<bool> {
        let conn = self.connect()?;
        Ok(crate::db::table_exists(&conn, table)?)
    }

    /// User tables, optionally filtered by a case-insensitive name prefix
    pub fn list_tables(&self, prefix: Option<&str>) -> StoreResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let prefix = prefix.map(|p| p.to_ascii_lowercase());
        Ok(names
            .into_iter()
            .filter(|n| match &prefix {
                Some(p) => n.to_ascii_lowercase().starts_with(p.as_str()),
                None => true,
            })
            .collect())
    }

    pub fn columns(&self, table: &str) -> StoreResult<Vec<ColumnDef>> {
        let conn = self.connect()?;
        Ok(table_info(&conn, table)?
            .into_iter()
            .map(|c| c.def)
            .collect())
    }

    /// Name of the INTEGER PRIMARY KEY column, if the table has one
    pub fn integer_primary_key(&self, table: &str) -> StoreResult<Option<String>> {
        let conn = self.connect()?;
        Ok(table_info(&conn, table)?
            .into_iter()
            .find(|c| c.pk && c.def.column_type == ColumnType::Integer)
            .map(|c| c.def.name))
    }

    // ===== DDL =====

    pub fn drop_table(&self, table: &str) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)?), [])?;
        debug!(table, "table dropped");
        Ok(())
    }

    /// Create a table; fails if it already exists
    pub fn create_table(
        &self,
        table: &str,
        columns: &[ColumnDef],
        surrogate_id: bool,
    ) -> StoreResult<()> {
        let conn = self.connect()?;
        if crate::db::table_exists(&conn, table)? {
            return Err(StoreError::TableExists(table.to_string()));
        }
        conn.execute(&create_table_sql(table, columns, surrogate_id)?, [])?;
        Ok(())
    }

    /// Drop (if present) and create a table in one transaction
    pub fn recreate_table(
        &self,
        table: &str,
        columns: &[ColumnDef],
        surrogate_id: bool,
    ) -> StoreResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)?), [])?;
        tx.execute(&create_table_sql(table, columns, surrogate_id)?, [])?;
        tx.commit()?;
        Ok(())
    }

    /// Add a column if absent (non-fatal: errors are logged)
    pub fn ensure_column(&self, table: &str, name: &str, column_type: ColumnType) {
        if let Err(e) = self.try_ensure_column(table, name, column_type) {
            warn!(table, column = name, error = %e, "ensure_column failed");
        }
    }

    /// Add a column if absent; returns whether it was added
    pub fn try_ensure_column(
        &self,
        table: &str,
        name: &str,
        column_type: ColumnType,
    ) -> StoreResult<bool> {
        let conn = self.connect()?;
        ensure_column_on(&conn, table, &ColumnDef::new(name, column_type))
    }

    /// Copy a table's columns and rows into a new table
    ///
    /// The target must not exist; declared types are carried over,
    /// primary-key constraints are not.
    pub fn copy_table(&self, source: &str, target: &str) -> StoreResult<usize> {
        let mut conn = self.connect()?;
        if crate::db::table_exists(&conn, target)? {
            return Err(StoreError::TableExists(target.to_string()));
        }
        let defs: Vec<ColumnDef> = table_info(&conn, source)?
            .into_iter()
            .map(|c| c.def)
            .collect();
        let cols = quoted_list(defs.iter().map(|c| c.name.as_str()))?;

        let tx = conn.transaction()?;
        tx.execute(&create_table_sql(target, &defs, false)?, [])?;
        let copied = tx.execute(
            &format!(
                "INSERT INTO {} ({cols}) SELECT {cols} FROM {} ORDER BY rowid",
                quote_ident(target)?,
                quote_ident(source)?,
            ),
            [],
        )?;
        tx.commit()?;
        info!(source, target, rows = copied, "table copied");
        Ok(copied)
    }

    // ===== loads and row writes =====

    /// Load a rectangular dataset
    ///
    /// Every row is shape-checked before anything is written.
    pub fn bulk_load(&self, table: &str, dataset: &Dataset, mode: LoadMode) -> StoreResult<usize> {
        check_shape(table, dataset.columns.len(), &dataset.rows)?;

        let mut conn = self.connect()?;
        let exists = crate::db::table_exists(&conn, table)?;
        let tx = conn.transaction()?;
        match mode {
            LoadMode::Replace => {
                tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)?), [])?;
                tx.execute(&create_table_sql(table, &dataset.columns, false)?, [])?;
            }
            LoadMode::Append if exists => {
                for def in &dataset.columns {
                    ensure_column_on(&tx, table, def)?;
                }
            }
            LoadMode::Append => {
                tx.execute(&create_table_sql(table, &dataset.columns, true)?, [])?;
            }
        }

        let names: Vec<&str> = dataset.columns.iter().map(|c| c.name.as_str()).collect();
        let inserted = insert_on(&tx, table, &names, &dataset.rows)?;
        tx.commit()?;

        info!(table, rows = inserted, mode = ?mode, "dataset loaded");
        Ok(inserted)
    }

    /// Insert rows into named columns of an existing table
    pub fn insert_rows(&self, table: &str, columns: &[&str], rows: &[Vec<Value>]) -> StoreResult<usize> {
        check_shape(table, columns.len(), rows)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let n = insert_on(&tx, table, columns, rows)?;
        tx.commit()?;
        Ok(n)
    }

    /// Write computed columns back by rowid, adding missing columns first
    pub fn update_rows(
        &self,
        table: &str,
        columns: &[ColumnDef],
        updates: &[(i64, Vec<Value>)],
    ) -> StoreResult<usize> {
        for (i, (_, values)) in updates.iter().enumerate() {
            if values.len() != columns.len() {
                return Err(StoreError::ShapeMismatch {
                    table: table.to_string(),
                    row: i + 1,
                    expected: columns.len(),
                    actual: values.len(),
                });
            }
        }

        let mut conn = self.connect()?;
        for def in columns {
            ensure_column_on(&conn, table, def)?;
        }
        if updates.is_empty() {
            return Ok(0);
        }

        let tx = conn.transaction()?;
        let written = update_on(&tx, table, columns, updates)?;
        tx.commit()?;
        debug!(table, rows = written, columns = columns.len(), "rows updated");
        Ok(written)
    }

    /// Delete every row whose `column` is in `keys`
    pub fn delete_where_in(&self, table: &str, column: &str, keys: &[Value]) -> StoreResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for chunk in keys.chunks(IN_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "DELETE FROM {} WHERE {} IN ({})",
                quote_ident(table)?,
                quote_ident(column)?,
                placeholders
            );
            deleted += tx.execute(&sql, params_from_iter(chunk.iter()))?;
        }
        tx.commit()?;
        info!(table, deleted, "rows deleted");
        Ok(deleted)
    }

    // ===== reads =====

    pub fn read_table(&self, table: &str) -> StoreResult<Table> {
        let conn = self.connect()?;
        read_on(&conn, table, None)
    }

    /// Read a subset of columns (in the requested order)
    pub fn read_columns(&self, table: &str, columns: &[&str]) -> StoreResult<Table> {
        let conn = self.connect()?;
        read_on(&conn, table, Some(columns))
    }

    // ===== declarative operations =====

    /// Evaluate column assignments over every row
    ///
    /// Entries run in order and later entries see earlier results. Columns
    /// are added first; values are written in one transaction, so an
    /// evaluation error leaves the rows untouched.
    pub fn declarative_update(&self, table: &str, updates: &[ColumnUpdate]) -> StoreResult<usize> {
        let mut conn = self.connect()?;
        for u in updates {
            ensure_column_on(&conn, table, &ColumnDef::new(&u.column, u.column_type))?;
        }

        let mut data = read_on(&conn, table, None)?;
        let mut touched: Vec<usize> = Vec::new();
        for u in updates {
            let col_idx = data
                .column_index(&u.column)
                .ok_or_else(|| StoreError::ColumnNotFound {
                    table: table.to_string(),
                    column: u.column.clone(),
                })?;
            let computed = data
                .iter()
                .map(|row| u.expr.eval(&row))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| StoreError::Expression {
                    table: table.to_string(),
                    source,
                })?;
            for (row_idx, v) in computed.into_iter().enumerate() {
                data.set(row_idx, col_idx, v);
            }
            if !touched.contains(&col_idx) {
                touched.push(col_idx);
            }
        }

        let defs: Vec<ColumnDef> = touched.iter().map(|&i| data.columns[i].clone()).collect();
        let updates_by_row: Vec<(i64, Vec<Value>)> = data
            .rows
            .iter()
            .map(|r| (r.rowid, touched.iter().map(|&i| r.values[i].clone()).collect()))
            .collect();

        let tx = conn.transaction()?;
        let written = update_on(&tx, table, &defs, &updates_by_row)?;
        tx.commit()?;
        debug!(
            table,
            rows = written,
            columns = ?defs.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            "declarative update applied"
        );
        Ok(written)
    }

    /// Build `output` = base.* + joined columns resolved by primary, then fallback key
    pub fn join_with_fallback(&self, join: &FallbackJoin) -> StoreResult<usize> {
        let (base, joined) = {
            let conn = self.connect()?;
            (read_on(&conn, &join.base, None)?, read_on(&conn, &join.joined, None)?)
        };

        let primary_idx = require_column(&base, &join.primary_key)?;
        let fallback_idx = require_column(&base, &join.fallback_key)?;
        let ref_idx = require_column(&joined, &join.ref_key)?;
        let projected = join
            .columns
            .iter()
            .map(|c| require_column(&joined, c))
            .collect::<StoreResult<Vec<_>>>()?;

        let index = first_index(&joined, ref_idx);

        let mut out_columns = base.columns.clone();
        for (name, &idx) in join.columns.iter().zip(&projected) {
            out_columns.push(ColumnDef::new(
                join.alias(name),
                joined.columns[idx].column_type,
            ));
        }

        let mut rows = Vec::with_capacity(base.len());
        let mut via_primary = 0usize;
        let mut via_fallback = 0usize;
        for r in &base.rows {
            let hit = match key_of(&r.values[primary_idx]).and_then(|k| index.get(&k)) {
                Some(&i) => {
                    via_primary += 1;
                    Some(i)
                }
                None => {
                    let fb = key_of(&r.values[fallback_idx]).and_then(|k| index.get(&k)).copied();
                    if fb.is_some() {
                        via_fallback += 1;
                    }
                    fb
                }
            };
            let mut values = r.values.clone();
            for &idx in &projected {
                values.push(match hit {
                    Some(i) => joined.rows[i].values[idx].clone(),
                    None => Value::Null,
                });
            }
            rows.push(values);
        }

        self.recreate_table(&join.output, &out_columns, false)?;
        let names: Vec<&str> = out_columns.iter().map(|c| c.name.as_str()).collect();
        let n = self.insert_rows(&join.output, &names, &rows)?;
        info!(
            output = %join.output,
            joined = %join.joined,
            rows = n,
            via_primary,
            via_fallback,
            "fallback join built"
        );
        Ok(n)
    }

    /// Group `base` by one column into `output` with area-weighted ratios
    /// and the group's mean measurement date
    pub fn aggregate(&self, agg: &Aggregation) -> StoreResult<usize> {
        let base = self.read_table(&agg.base)?;
        let group_idx = require_column(&base, &agg.group_by)?;
        let area_idx = require_column(&base, &agg.area_column)?;
        let date_idx = require_column(&base, &agg.date_column)?;
        let measure_idx = agg
            .measures
            .iter()
            .map(|(src, _)| require_column(&base, src))
            .collect::<StoreResult<Vec<_>>>()?;

        struct Acc {
            key: Value,
            sums: Vec<Option<f64>>,
            area: Option<f64>,
            jd_sum: f64,
            jd_count: usize,
        }

        fn add(slot: &mut Option<f64>, v: Option<f64>) {
            if let Some(x) = v {
                *slot = Some(slot.unwrap_or(0.0) + x);
            }
        }

        let mut order: Vec<Acc> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();
        for r in &base.rows {
            let Some(k) = key_of(&r.values[group_idx]) else {
                continue;
            };
            let slot = *by_key.entry(k).or_insert_with(|| {
                order.push(Acc {
                    key: r.values[group_idx].clone(),
                    sums: vec![None; measure_idx.len()],
                    area: None,
                    jd_sum: 0.0,
                    jd_count: 0,
                });
                order.len() - 1
            });
            let acc = &mut order[slot];
            for (s, &i) in acc.sums.iter_mut().zip(&measure_idx) {
                add(s, r.values[i].as_f64());
            }
            add(&mut acc.area, r.values[area_idx].as_f64());
            if let Some(jd) = r.values[date_idx].julian_day() {
                acc.jd_sum += jd;
                acc.jd_count += 1;
            }
        }

        let mut columns = vec![base.columns[group_idx].clone()];
        columns.extend(agg.measures.iter().map(|(_, alias)| ColumnDef::real(alias)));
        columns.push(ColumnDef::date(&agg.date_alias));

        let rows: Vec<Vec<Value>> = order
            .into_iter()
            .map(|acc| {
                let mut values = vec![acc.key];
                for s in acc.sums {
                    values.push(match (s, acc.area) {
                        (Some(s), Some(a)) if a != 0.0 => Value::Real(s / a),
                        _ => Value::Null,
                    });
                }
                let mean_date = (acc.jd_count > 0)
                    .then(|| (acc.jd_sum / acc.jd_count as f64).round())
                    .and_then(date_from_julian_day);
                values.push(Value::from(mean_date));
                values
            })
            .collect();

        self.recreate_table(&agg.output, &columns, false)?;
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let n = self.insert_rows(&agg.output, &names, &rows)?;
        info!(output = %agg.output, group_by = %agg.group_by, groups = n, "aggregate built");
        Ok(n)
    }

    /// Fill null target cells from the first matching source row
    ///
    /// Populated target cells are never overwritten. Returns the number of
    /// cells filled.
    pub fn conditional_merge(&self, merge: &NullMerge) -> StoreResult<usize> {
        let (target, source) = {
            let conn = self.connect()?;
            (
                read_on(&conn, &merge.target, None)?,
                read_on(&conn, &merge.source, None)?,
            )
        };
        let tkey = require_column(&target, &merge.target_key)?;
        let skey = require_column(&source, &merge.source_key)?;
        let pairs = merge
            .columns
            .iter()
            .map(|(s, t)| Ok((require_column(&source, s)?, require_column(&target, t)?)))
            .collect::<StoreResult<Vec<_>>>()?;

        let index = first_index(&source, skey);

        // per target column: (rowid, value)
        let mut fills: Vec<Vec<(i64, Vec<Value>)>> = vec![Vec::new(); pairs.len()];
        for r in &target.rows {
            let Some(&si) = key_of(&r.values[tkey]).and_then(|k| index.get(&k)) else {
                continue;
            };
            for (slot, &(sc, tc)) in pairs.iter().enumerate() {
                let src = &source.rows[si].values[sc];
                if r.values[tc].is_null() && !src.is_null() {
                    fills[slot].push((r.rowid, vec![src.clone()]));
                }
            }
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut filled = 0;
        for (slot, &(_, tc)) in pairs.iter().enumerate() {
            let def = [target.columns[tc].clone()];
            filled += update_on(&tx, &merge.target, &def, &fills[slot])?;
        }
        tx.commit()?;
        info!(target = %merge.target, source = %merge.source, filled, "null-only merge applied");
        Ok(filled)
    }
}

// ==========================================
// Connection-level helpers
// ==========================================

struct ColumnInfo {
    def: ColumnDef,
    pk: bool,
}

fn table_info(conn: &Connection, table: &str) -> StoreResult<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)?))?;
    let cols = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let decl: Option<String> = row.get(2)?;
            let pk: i64 = row.get(5)?;
            Ok(ColumnInfo {
                def: ColumnDef::new(name, ColumnType::from_declared(decl.as_deref().unwrap_or(""))),
                pk: pk > 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if cols.is_empty() {
        return Err(StoreError::TableNotFound(table.to_string()));
    }
    Ok(cols)
}

fn quoted_list<'a>(names: impl Iterator<Item = &'a str>) -> StoreResult<String> {
    Ok(names
        .map(quote_ident)
        .collect::<StoreResult<Vec<_>>>()?
        .join(", "))
}

fn create_table_sql(table: &str, columns: &[ColumnDef], surrogate_id: bool) -> StoreResult<String> {
    let mut parts = Vec::new();
    if surrogate_id {
        parts.push("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string());
    }
    for c in columns {
        if surrogate_id && c.name.eq_ignore_ascii_case("id") {
            continue;
        }
        parts.push(format!("{} {}", quote_ident(&c.name)?, c.column_type.sql_type()));
    }
    Ok(format!("CREATE TABLE {} ({})", quote_ident(table)?, parts.join(", ")))
}

fn ensure_column_on(conn: &Connection, table: &str, def: &ColumnDef) -> StoreResult<bool> {
    let existing = table_info(conn, table)?;
    if existing.iter().any(|c| c.def.name.eq_ignore_ascii_case(&def.name)) {
        return Ok(false);
    }
    conn.execute(
        &format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table)?,
            quote_ident(&def.name)?,
            def.column_type.sql_type()
        ),
        [],
    )?;
    debug!(table, column = %def.name, column_type = %def.column_type, "column added");
    Ok(true)
}

fn check_shape(table: &str, expected: usize, rows: &[Vec<Value>]) -> StoreResult<()> {
    match rows.iter().position(|r| r.len() != expected) {
        Some(i) => Err(StoreError::ShapeMismatch {
            table: table.to_string(),
            row: i + 1,
            expected,
            actual: rows[i].len(),
        }),
        None => Ok(()),
    }
}

fn insert_on(conn: &Connection, table: &str, columns: &[&str], rows: &[Vec<Value>]) -> StoreResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table)?,
        quoted_list(columns.iter().copied())?,
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut n = 0;
    for r in rows {
        n += stmt.execute(params_from_iter(r.iter()))?;
    }
    Ok(n)
}

fn update_on(
    conn: &Connection,
    table: &str,
    columns: &[ColumnDef],
    updates: &[(i64, Vec<Value>)],
) -> StoreResult<usize> {
    if columns.is_empty() || updates.is_empty() {
        return Ok(0);
    }
    let assignments = columns
        .iter()
        .map(|c| Ok(format!("{} = ?", quote_ident(&c.name)?)))
        .collect::<StoreResult<Vec<_>>>()?
        .join(", ");
    let sql = format!("UPDATE {} SET {} WHERE rowid = ?", quote_ident(table)?, assignments);
    let mut stmt = conn.prepare(&sql)?;
    let mut n = 0;
    for (rowid, values) in updates {
        let rowid = Value::Integer(*rowid);
        n += stmt.execute(params_from_iter(values.iter().chain(std::iter::once(&rowid))))?;
    }
    Ok(n)
}

fn read_on(conn: &Connection, table: &str, subset: Option<&[&str]>) -> StoreResult<Table> {
    let info = table_info(conn, table)?;
    let defs: Vec<ColumnDef> = match subset {
        None => info.into_iter().map(|c| c.def).collect(),
        Some(wanted) => wanted
            .iter()
            .map(|w| {
                info.iter()
                    .find(|c| c.def.name.eq_ignore_ascii_case(w))
                    .map(|c| c.def.clone())
                    .ok_or_else(|| StoreError::ColumnNotFound {
                        table: table.to_string(),
                        column: w.to_string(),
                    })
            })
            .collect::<StoreResult<Vec<_>>>()?,
    };

    let select = if defs.is_empty() {
        "rowid".to_string()
    } else {
        format!("rowid, {}", quoted_list(defs.iter().map(|c| c.name.as_str()))?)
    };
    let sql = format!("SELECT {} FROM {} ORDER BY rowid", select, quote_ident(table)?);
    let mut stmt = conn.prepare(&sql)?;
    let width = defs.len();
    let types: Vec<ColumnType> = defs.iter().map(|d| d.column_type).collect();
    let rows = stmt
        .query_map([], |row| {
            let rowid: i64 = row.get(0)?;
            let mut values = Vec::with_capacity(width);
            for (i, ty) in types.iter().enumerate() {
                let v: Value = row.get(i + 1)?;
                values.push(ty.coerce(v));
            }
            Ok(Row { rowid, values })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Table {
        name: table.to_string(),
        columns: defs,
        rows,
    })
}

fn require_column(table: &Table, column: &str) -> StoreResult<usize> {
    table
        .column_index(column)
        .ok_or_else(|| StoreError::ColumnNotFound {
            table: table.name.clone(),
            column: column.to_string(),
        })
}

/// Map each key to the first row (rowid order) carrying it
fn first_index(table: &Table, col: usize) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    for (i, r) in table.rows.iter().enumerate() {
        if let Some(k) = key_of(&r.values[col]) {
            index.entry(k).or_insert(i);
        }
    }
    index
}
