// ==========================================
// Talhão APEX - typed row expressions
// ==========================================
// A closed set of expression nodes evaluated per row:
// column/literal, substring, concat, arithmetic, comparison,
// boolean logic, CASE, COALESCE/NULLIF, rounding, date difference
// Values are never spliced into SQL; expressions run in memory
// SQL NULL semantics: NULL propagates, CASE treats NULL as false
// ==========================================

use crate::store::error::ExprError;
use crate::store::table::RowAccess;
use crate::store::value::{compare_values, Value};
use std::cmp::Ordering;

/// Days per year used for stand age
pub const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    /// SQLite SUBSTR (1-based, negative start counts from the end)
    Substr {
        expr: Box<Expr>,
        start: Box<Expr>,
        len: Option<Box<Expr>>,
    },
    /// `a || b || ...` (NULL if any part is NULL)
    Concat(Vec<Expr>),
    /// 1-based position of `needle` in `haystack`, 0 if absent
    Instr {
        haystack: Box<Expr>,
        needle: Box<Expr>,
    },
    Length(Box<Expr>),
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    InList {
        expr: Box<Expr>,
        items: Vec<Value>,
    },
    Case {
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Coalesce(Vec<Expr>),
    NullIf(Box<Expr>, Box<Expr>),
    Floor(Box<Expr>),
    Round {
        expr: Box<Expr>,
        digits: i32,
    },
    JulianDay(Box<Expr>),
    /// (julianday(end) - julianday(start)) / 365.25
    YearsBetween {
        start: Box<Expr>,
        end: Box<Expr>,
    },
}

// ==========================================
// Builders
// ==========================================

impl Expr {
    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn null() -> Expr {
        Expr::Literal(Value::Null)
    }

    pub fn substr(self, start: i64, len: i64) -> Expr {
        Expr::Substr {
            expr: Box::new(self),
            start: Box::new(Expr::lit(start)),
            len: Some(Box::new(Expr::lit(len))),
        }
    }

    pub fn substr_expr(self, start: Expr, len: Option<Expr>) -> Expr {
        Expr::Substr {
            expr: Box::new(self),
            start: Box::new(start),
            len: len.map(Box::new),
        }
    }

    pub fn concat(parts: Vec<Expr>) -> Expr {
        Expr::Concat(parts)
    }

    pub fn instr(self, needle: Expr) -> Expr {
        Expr::Instr {
            haystack: Box::new(self),
            needle: Box::new(needle),
        }
    }

    pub fn length(self) -> Expr {
        Expr::Length(Box::new(self))
    }

    fn compare(self, op: CmpOp, rhs: Expr) -> Expr {
        Expr::Compare {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn equals(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Ne, rhs)
    }

    pub fn less_than(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn less_or_equal(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn greater_than(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn greater_or_equal(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Ge, rhs)
    }

    pub fn and(self, rhs: Expr) -> Expr {
        match self {
            Expr::And(mut items) => {
                items.push(rhs);
                Expr::And(items)
            }
            other => Expr::And(vec![other, rhs]),
        }
    }

    pub fn or(self, rhs: Expr) -> Expr {
        match self {
            Expr::Or(mut items) => {
                items.push(rhs);
                Expr::Or(items)
            }
            other => Expr::Or(vec![other, rhs]),
        }
    }

    pub fn negate(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }

    pub fn in_list(self, items: Vec<Value>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            items,
        }
    }

    pub fn case(branches: Vec<(Expr, Expr)>, otherwise: Option<Expr>) -> Expr {
        Expr::Case {
            branches,
            otherwise: otherwise.map(Box::new),
        }
    }

    pub fn coalesce(items: Vec<Expr>) -> Expr {
        Expr::Coalesce(items)
    }

    pub fn null_if(self, other: Expr) -> Expr {
        Expr::NullIf(Box::new(self), Box::new(other))
    }

    pub fn floor(self) -> Expr {
        Expr::Floor(Box::new(self))
    }

    pub fn round(self, digits: i32) -> Expr {
        Expr::Round {
            expr: Box::new(self),
            digits,
        }
    }

    pub fn julian_day(self) -> Expr {
        Expr::JulianDay(Box::new(self))
    }

    pub fn years_between(start: Expr, end: Expr) -> Expr {
        Expr::YearsBetween {
            start: Box::new(start),
            end: Box::new(end),
        }
    }

    /// Columns referenced by this expression
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(c) => out.push(c.as_str()),
            Expr::Literal(_) => {}
            Expr::Substr { expr, start, len } => {
                expr.collect_columns(out);
                start.collect_columns(out);
                if let Some(l) = len {
                    l.collect_columns(out);
                }
            }
            Expr::Concat(items) | Expr::And(items) | Expr::Or(items) | Expr::Coalesce(items) => {
                items.iter().for_each(|e| e.collect_columns(out))
            }
            Expr::Instr { haystack, needle } => {
                haystack.collect_columns(out);
                needle.collect_columns(out);
            }
            Expr::Arith { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::NullIf(a, b) | Expr::YearsBetween { start: a, end: b } => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
            Expr::Length(e)
            | Expr::Not(e)
            | Expr::IsNull(e)
            | Expr::Floor(e)
            | Expr::JulianDay(e)
            | Expr::InList { expr: e, .. }
            | Expr::Round { expr: e, .. } => e.collect_columns(out),
            Expr::Case {
                branches,
                otherwise,
            } => {
                for (w, t) in branches {
                    w.collect_columns(out);
                    t.collect_columns(out);
                }
                if let Some(o) = otherwise {
                    o.collect_columns(out);
                }
            }
        }
    }
}

macro_rules! arith_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::Arith {
                    op: $op,
                    lhs: Box::new(self),
                    rhs: Box::new(rhs),
                }
            }
        }
    };
}

arith_operator!(Add, add, ArithOp::Add);
arith_operator!(Sub, sub, ArithOp::Sub);
arith_operator!(Mul, mul, ArithOp::Mul);
arith_operator!(Div, div, ArithOp::Div);

// ==========================================
// Evaluation
// ==========================================

fn bool_value(b: bool) -> Value {
    Value::Integer(i64::from(b))
}

/// SQL truthiness: None for NULL
pub fn truthy(v: &Value) -> Option<bool> {
    match v {
        Value::Null => None,
        Value::Integer(i) => Some(*i != 0),
        Value::Real(f) => Some(*f != 0.0),
        Value::Text(_) => Some(v.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::Date(_) => Some(false),
    }
}

/// Numeric operand: non-numeric text counts as 0, like SQLite
fn numeric_operand(v: &Value) -> Option<Value> {
    match v {
        Value::Null => None,
        Value::Integer(_) | Value::Real(_) => Some(v.clone()),
        other => Some(Value::Real(other.as_f64().unwrap_or(0.0))),
    }
}

fn eval_arith(op: ArithOp, a: &Value, b: &Value) -> Value {
    let (Some(a), Some(b)) = (numeric_operand(a), numeric_operand(b)) else {
        return Value::Null;
    };
    if let (Value::Integer(x), Value::Integer(y)) = (&a, &b) {
        let exact = match op {
            ArithOp::Add => x.checked_add(*y),
            ArithOp::Sub => x.checked_sub(*y),
            ArithOp::Mul => x.checked_mul(*y),
            ArithOp::Div => None,
        };
        if let Some(v) = exact {
            return Value::Integer(v);
        }
    }
    let (x, y) = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Value::Null,
    };
    let r = match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => {
            if y == 0.0 {
                return Value::Null;
            }
            x / y
        }
    };
    Value::from(r)
}

/// SQLite SUBSTR on characters
pub fn sqlite_substr(s: &str, start: i64, len: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len() as i64;
    let mut p1 = start;
    let mut p2 = len.unwrap_or(i64::MAX / 4);

    if p1 < 0 {
        p1 += n;
        if p1 < 0 {
            p2 += p1;
            if p2 < 0 {
                p2 = 0;
            }
            p1 = 0;
        }
    } else if p1 > 0 {
        p1 -= 1;
    } else if p2 > 0 {
        p2 -= 1;
    }
    if p2 < 0 {
        p1 += p2;
        p2 = -p2;
        if p1 < 0 {
            p2 += p1;
            p1 = 0;
        }
    }
    if p1 >= n || p2 <= 0 {
        return String::new();
    }
    let end = p1.saturating_add(p2).min(n);
    chars[p1 as usize..end as usize].iter().collect()
}

impl Expr {
    /// Evaluate against one row
    pub fn eval(&self, row: &dyn RowAccess) -> Result<Value, ExprError> {
        match self {
            Expr::Column(name) => row
                .value(name)
                .cloned()
                .ok_or_else(|| ExprError::UnknownColumn(name.clone())),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Substr { expr, start, len } => {
                let v = expr.eval(row)?;
                let start = start.eval(row)?;
                let len = match len {
                    Some(l) => Some(l.eval(row)?),
                    None => None,
                };
                let Some(text) = v.as_text() else {
                    return Ok(Value::Null);
                };
                let Some(start) = start.as_f64().map(|f| f as i64) else {
                    return Ok(Value::Null);
                };
                let len = match len {
                    Some(l) => match l.as_f64() {
                        Some(f) => Some(f as i64),
                        None => return Ok(Value::Null),
                    },
                    None => None,
                };
                Ok(Value::Text(sqlite_substr(&text, start, len)))
            }
            Expr::Concat(parts) => {
                let mut out = String::new();
                for p in parts {
                    match p.eval(row)?.as_text() {
                        Some(s) => out.push_str(&s),
                        None => return Ok(Value::Null),
                    }
                }
                Ok(Value::Text(out))
            }
            Expr::Instr { haystack, needle } => {
                let (h, n) = (haystack.eval(row)?, needle.eval(row)?);
                let (Some(h), Some(n)) = (h.as_text(), n.as_text()) else {
                    return Ok(Value::Null);
                };
                let pos = h
                    .find(&n)
                    .map(|byte_idx| h[..byte_idx].chars().count() as i64 + 1)
                    .unwrap_or(0);
                Ok(Value::Integer(pos))
            }
            Expr::Length(e) => Ok(match e.eval(row)?.as_text() {
                Some(s) => Value::Integer(s.chars().count() as i64),
                None => Value::Null,
            }),
            Expr::Arith { op, lhs, rhs } => Ok(eval_arith(*op, &lhs.eval(row)?, &rhs.eval(row)?)),
            Expr::Compare { op, lhs, rhs } => {
                let (a, b) = (lhs.eval(row)?, rhs.eval(row)?);
                Ok(match compare_values(&a, &b) {
                    None => Value::Null,
                    Some(ord) => bool_value(match op {
                        CmpOp::Eq => ord == Ordering::Equal,
                        CmpOp::Ne => ord != Ordering::Equal,
                        CmpOp::Lt => ord == Ordering::Less,
                        CmpOp::Le => ord != Ordering::Greater,
                        CmpOp::Gt => ord == Ordering::Greater,
                        CmpOp::Ge => ord != Ordering::Less,
                    }),
                })
            }
            Expr::And(items) => {
                let mut saw_null = false;
                for e in items {
                    match truthy(&e.eval(row)?) {
                        Some(false) => return Ok(bool_value(false)),
                        None => saw_null = true,
                        Some(true) => {}
                    }
                }
                Ok(if saw_null { Value::Null } else { bool_value(true) })
            }
            Expr::Or(items) => {
                let mut saw_null = false;
                for e in items {
                    match truthy(&e.eval(row)?) {
                        Some(true) => return Ok(bool_value(true)),
                        None => saw_null = true,
                        Some(false) => {}
                    }
                }
                Ok(if saw_null { Value::Null } else { bool_value(false) })
            }
            Expr::Not(e) => Ok(match truthy(&e.eval(row)?) {
                Some(b) => bool_value(!b),
                None => Value::Null,
            }),
            Expr::IsNull(e) => Ok(bool_value(e.eval(row)?.is_null())),
            Expr::InList { expr, items } => {
                let v = expr.eval(row)?;
                if v.is_null() {
                    return Ok(Value::Null);
                }
                let hit = items
                    .iter()
                    .any(|i| compare_values(&v, i) == Some(Ordering::Equal));
                Ok(bool_value(hit))
            }
            Expr::Case {
                branches,
                otherwise,
            } => {
                for (when, then) in branches {
                    if truthy(&when.eval(row)?) == Some(true) {
                        return then.eval(row);
                    }
                }
                match otherwise {
                    Some(e) => e.eval(row),
                    None => Ok(Value::Null),
                }
            }
            Expr::Coalesce(items) => {
                for e in items {
                    let v = e.eval(row)?;
                    if !v.is_null() {
                        return Ok(v);
                    }
                }
                Ok(Value::Null)
            }
            Expr::NullIf(a, b) => {
                let (a, b) = (a.eval(row)?, b.eval(row)?);
                if compare_values(&a, &b) == Some(Ordering::Equal) {
                    Ok(Value::Null)
                } else {
                    Ok(a)
                }
            }
            Expr::Floor(e) => Ok(Value::from(e.eval(row)?.as_f64().map(f64::floor))),
            Expr::Round { expr, digits } => {
                let scale = 10f64.powi(*digits);
                Ok(Value::from(
                    expr.eval(row)?.as_f64().map(|x| (x * scale).round() / scale),
                ))
            }
            Expr::JulianDay(e) => Ok(Value::from(e.eval(row)?.julian_day())),
            Expr::YearsBetween { start, end } => {
                let (s, e) = (start.eval(row)?, end.eval(row)?);
                Ok(match (s.julian_day(), e.julian_day()) {
                    (Some(s), Some(e)) => Value::Real((e - s) / DAYS_PER_YEAR),
                    _ => Value::Null,
                })
            }
        }
    }
}
