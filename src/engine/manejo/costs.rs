// ==========================================
// Talhão APEX - evaluation: delivered wood cost per scenario
// ==========================================
// Every cost is per m³ over both cycles, discounted:
//   D = vpl7·Vol7 + vpl14·Vol_rot
// where Vol_rot is Vol7_2ROT (REF_REG) or Vol7_1ROT (REF_REF).
// Fixed per-hectare costs (support, internal road, admin) are spread
// over D with NULLIF semantics: D = 0 gives NULL.
// CustoPostoFabrica sums the parts and CustoMadAV compares scenarios.
// ==========================================

use crate::domain::parameters::ManagementParameters;
use crate::domain::types::{region_by_code, REGIONS};
use crate::engine::error::EngineResult;
use crate::engine::manejo::lookup::{
    div, floor_lookup, reference_table, round_to, ColumnWriter, ElevationIndex, KeyIndex,
};
use crate::engine::manejo::scenario::Scenario;
use crate::engine::manejo::slope::harvest_table;
use crate::store::{ColumnDef, Table, TabularStore, Value};
use std::collections::HashMap;
use tracing::{debug, info};

pub const OTHER_COSTS_TABLE: &str = "OutrosCustos";
pub const ROAD_FREIGHT_TABLE: &str = "CustosTransRod";
pub const EXTERNAL_ROAD_TABLE: &str = "CustoEstExterna";
pub const RAIL_TABLE: &str = "CustoFerr";
pub const YARD_TABLE: &str = "CustoMovPatio";

/// Road freight is tabulated in 5 km bands
pub const FREIGHT_BAND_KM: f64 = 5.0;

// ==========================================
// Discounting weights
// ==========================================

/// Present-value weights of the two harvests (years 7 and 14)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarvestWeights {
    pub vpl7: f64,
    pub vpl14: f64,
}

impl HarvestWeights {
    pub fn from_params(params: &ManagementParameters) -> Self {
        Self {
            vpl7: params.discount_factor(7.0),
            vpl14: params.discount_factor(14.0),
        }
    }

    /// Discounted volume D
    pub fn discounted_volume(&self, vol7: Option<f64>, vol_rot: Option<f64>) -> Option<f64> {
        Some(self.vpl7 * vol7? + self.vpl14 * vol_rot?)
    }

    /// A cost paid at both harvests, per discounted m³
    pub fn spread(&self, cost: Option<f64>, vol7: Option<f64>, vol_rot: Option<f64>) -> Option<f64> {
        div(cost.map(|c| c * (self.vpl7 + self.vpl14)), self.discounted_volume(vol7, vol_rot))
    }

    /// Volume-weighted harvest cost of both cycles
    pub fn harvest_cost(
        &self,
        vol7: Option<f64>,
        pond7: Option<f64>,
        vol_rot: Option<f64>,
        pond_rot: Option<f64>,
        surcharge: f64,
    ) -> Option<f64> {
        let first = vol7? * pond7? * self.vpl7;
        let second = vol_rot? * pond_rot? * self.vpl14 * surcharge;
        div(Some(first + second), self.discounted_volume(vol7, vol_rot))
    }
}

/// SUM of COALESCE(x, 0)
fn coalesced_sum(parts: &[Option<f64>]) -> f64 {
    parts.iter().map(|p| p.unwrap_or(0.0)).sum()
}

/// Road distance: loading point to factory, or the two legs when the
/// direct distance is zero
pub fn road_distance(lf: Option<f64>, lp: Option<f64>, pf: Option<f64>) -> Option<f64> {
    match lf {
        Some(d) if d == 0.0 => Some(lp? + pf?),
        other => other,
    }
}

/// Freight band of a road distance: round((d + 2) / 5) · 5
pub fn freight_band(distance: f64) -> f64 {
    ((distance + 2.0) / FREIGHT_BAND_KM).round() * FREIGHT_BAND_KM
}

/// Rail plus yard handling, each optional, rounded to cents
pub fn rail_and_yard(rail: Option<f64>, yard: Option<f64>) -> Option<f64> {
    match (rail, yard) {
        (None, None) => None,
        (r, y) => Some(round_to(r.unwrap_or(0.0) + y.unwrap_or(0.0), 2)),
    }
}

/// Apply the elevation discount to a delivered cost
pub fn delivered_cost(parts: &[Option<f64>], coppice_rate_pct: f64) -> f64 {
    coalesced_sum(parts) * (100.0 - coppice_rate_pct) / 100.0
}

// ===== steps =====

/// Steps 13-14: CustoMADPE_{ref} = silviculture Total(region) / D
pub fn apply_silviculture_cost(
    store: &TabularStore,
    table: &str,
    scenario: Scenario,
    params: &ManagementParameters,
) -> EngineResult<usize> {
    let weights = HarvestWeights::from_params(params);
    let totals = reference_table(store, &scenario.present_value_total_table())?;
    let by_region = KeyIndex::new(&totals, "Regiao");
    let vol_rot = scenario.rotation_volume();
    let stands = store.read_columns(table, &["Regiao", "Vol7", &vol_rot])?;

    let mut writer = ColumnWriter::new(vec![ColumnDef::real(scenario.column("CustoMADPE"))]);
    for row in stands.iter() {
        let total = by_region.f64(row.get("Regiao"), "Total");
        let d = weights.discounted_volume(row.f64("Vol7"), row.f64(&vol_rot));
        writer.push(row.rowid(), vec![Value::from(div(total, d))]);
    }
    let n = writer.write(store, table)?;
    info!(table, scenario = scenario.suffix(), rows = n, "silviculture cost computed");
    Ok(n)
}

/// Harvest cost tables keyed by region code
fn harvest_tables(store: &TabularStore) -> EngineResult<HashMap<&'static str, Table>> {
    let mut by_front: HashMap<&'static str, Table> = HashMap::new();
    for region in REGIONS.iter() {
        if by_front.contains_key(region.harvest_front) {
            continue;
        }
        let t = reference_table(store, &harvest_table(region.harvest_front))?;
        by_front.insert(region.harvest_front, t);
    }
    Ok(by_front)
}

/// Steps 15-16: CustosColheitaPond, CustosColheitaPond_{rot}, CustosColheita_{ref}
pub fn apply_harvest_cost(
    store: &TabularStore,
    table: &str,
    scenario: Scenario,
    params: &ManagementParameters,
) -> EngineResult<usize> {
    let weights = HarvestWeights::from_params(params);
    let surcharge = scenario.harvest_surcharge(params.coppice_harvest_surcharge_pct);
    let fronts = harvest_tables(store)?;
    let vol_rot = scenario.rotation_volume();
    let stands = store.read_columns(table, &["Regiao", "Vol7", &vol_rot])?;

    let mut writer = ColumnWriter::new(vec![
        ColumnDef::real("CustosColheitaPond"),
        ColumnDef::real(format!("CustosColheitaPond_{}", scenario.rotation_tag())),
        ColumnDef::real(scenario.column("CustosColheita")),
    ]);
    let mut unmapped = 0usize;
    for row in stands.iter() {
        let costs = row
            .text("Regiao")
            .and_then(|code| region_by_code(&code))
            .and_then(|r| fronts.get(r.harvest_front));
        if costs.is_none() {
            unmapped += 1;
        }
        let vol7 = row.f64("Vol7");
        let rot = row.f64(&vol_rot);
        let pond7 = costs.zip(vol7).and_then(|(t, v)| floor_lookup(t, "PROD", "POND", v));
        let pond_rot = costs.zip(rot).and_then(|(t, v)| floor_lookup(t, "PROD", "POND", v));
        let cost = weights.harvest_cost(vol7, pond7, rot, pond_rot, surcharge);
        writer.push(
            row.rowid(),
            vec![Value::from(pond7), Value::from(pond_rot), Value::from(cost)],
        );
    }
    let n = writer.write(store, table)?;
    if unmapped > 0 {
        debug!(table, unmapped, "stands outside the harvest fronts");
    }
    info!(table, scenario = scenario.suffix(), rows = n, "harvest cost computed");
    Ok(n)
}

/// Spread one OutrosCustos value (or sum of values) over D
fn apply_spread_cost(
    store: &TabularStore,
    table: &str,
    scenario: Scenario,
    params: &ManagementParameters,
    sources: &[&str],
    output: &str,
) -> EngineResult<usize> {
    let weights = HarvestWeights::from_params(params);
    let other = reference_table(store, OTHER_COSTS_TABLE)?;
    let by_region = KeyIndex::new(&other, "Regiao");
    let vol_rot = scenario.rotation_volume();
    let stands = store.read_columns(table, &["Regiao", "Vol7", &vol_rot])?;

    let mut writer = ColumnWriter::new(vec![ColumnDef::real(scenario.column(output))]);
    for row in stands.iter() {
        let cost = by_region.row(row.get("Regiao")).and_then(|r| {
            sources
                .iter()
                .try_fold(0.0, |acc, col| r.f64(col).map(|v| acc + v))
        });
        let spread = weights.spread(cost, row.f64("Vol7"), row.f64(&vol_rot));
        writer.push(row.rowid(), vec![Value::from(spread)]);
    }
    let n = writer.write(store, table)?;
    info!(table, column = %scenario.column(output), rows = n, "fixed cost spread");
    Ok(n)
}

/// Steps 17-18: CustosApoioColheita_{ref}
pub fn apply_support_cost(
    store: &TabularStore,
    table: &str,
    scenario: Scenario,
    params: &ManagementParameters,
) -> EngineResult<usize> {
    apply_spread_cost(store, table, scenario, params, &["ApoioColheita"], "CustosApoioColheita")
}

/// Steps 19-20: CustosColheitaEstradaInterna_{ref}
pub fn apply_internal_road_cost(
    store: &TabularStore,
    table: &str,
    scenario: Scenario,
    params: &ManagementParameters,
) -> EngineResult<usize> {
    apply_spread_cost(store, table, scenario, params, &["EstInterna"], "CustosColheitaEstradaInterna")
}

/// Steps 24-25: CustosTAXAADM_{ref} from ADM + Taxas
pub fn apply_admin_cost(
    store: &TabularStore,
    table: &str,
    scenario: Scenario,
    params: &ManagementParameters,
) -> EngineResult<usize> {
    apply_spread_cost(store, table, scenario, params, &["ADM", "Taxas"], "CustosTAXAADM")
}

/// Steps 21-22: CustosColheitaTotal_{ref}
pub fn apply_harvest_total(store: &TabularStore, table: &str, scenario: Scenario) -> EngineResult<usize> {
    let parts = [
        scenario.column("CustosColheita"),
        scenario.column("CustosApoioColheita"),
        scenario.column("CustosColheitaEstradaInterna"),
    ];
    let names: Vec<&str> = parts.iter().map(String::as_str).collect();
    let stands = store.read_columns(table, &names)?;

    let mut writer = ColumnWriter::new(vec![ColumnDef::real(scenario.column("CustosColheitaTotal"))]);
    for row in stands.iter() {
        let values: Vec<Option<f64>> = names.iter().map(|c| row.f64(c)).collect();
        writer.push(row.rowid(), vec![Value::Real(coalesced_sum(&values))]);
    }
    Ok(writer.write(store, table)?)
}

/// Step 23: DistROD, CustosTransporte, CustoEstradaExterna, CustoFerroviariaMovPatio
pub fn apply_transport(store: &TabularStore, table: &str) -> EngineResult<usize> {
    let freight = reference_table(store, ROAD_FREIGHT_TABLE)?;
    let freight_by_band = KeyIndex::new(&freight, "Distancia");
    let external = reference_table(store, EXTERNAL_ROAD_TABLE)?;
    let external_by_region = KeyIndex::new(&external, "Regiao");
    let rail = reference_table(store, RAIL_TABLE)?;
    let rail_by_region = KeyIndex::new(&rail, "Regiao");
    let yard = reference_table(store, YARD_TABLE)?;
    let yard_by_region = KeyIndex::new(&yard, "Regiao");

    let stands = store.read_columns(table, &["Regiao", "DIST_LFRod", "DIST_LP", "DIST_PFRod"])?;
    let mut writer = ColumnWriter::new(vec![
        ColumnDef::real("DistROD"),
        ColumnDef::real("CustosTransporte"),
        ColumnDef::real("CustoEstradaExterna"),
        ColumnDef::real("CustoFerroviariaMovPatio"),
    ]);
    for row in stands.iter() {
        let region = row.get("Regiao");
        let distance = road_distance(row.f64("DIST_LFRod"), row.f64("DIST_LP"), row.f64("DIST_PFRod"));
        let long_name = row
            .text("Regiao")
            .and_then(|code| region_by_code(&code))
            .map(|r| r.long_name);
        let freight_cost = long_name.zip(distance).and_then(|(col, d)| {
            freight_by_band.f64(&Value::Real(freight_band(d)), col)
        });
        let external_cost = external_by_region.f64(region, "Custo");
        let rail_yard = rail_and_yard(
            rail_by_region.f64(region, "Custo"),
            yard_by_region.f64(region, "Custo"),
        );
        writer.push(
            row.rowid(),
            vec![
                Value::from(distance),
                Value::from(freight_cost),
                Value::from(external_cost),
                Value::from(rail_yard),
            ],
        );
    }
    let n = writer.write(store, table)?;
    info!(table, rows = n, "transport costs computed");
    Ok(n)
}

/// Steps 26-27: CustosPostoFabrica_{ref}
pub fn apply_delivered_cost(
    store: &TabularStore,
    table: &str,
    scenario: Scenario,
    params: &ManagementParameters,
) -> EngineResult<usize> {
    let elevation = ElevationIndex::load(store)?;
    let parts = [
        scenario.column("CustoMADPE"),
        scenario.column("CustosColheitaTotal"),
        "CustosTransporte".to_string(),
        "CustoEstradaExterna".to_string(),
        "CustoFerroviariaMovPatio".to_string(),
        scenario.column("CustosTAXAADM"),
    ];
    let mut names: Vec<&str> = vec!["Regiao"];
    names.extend(parts.iter().map(String::as_str));
    let stands = store.read_columns(table, &names)?;

    let mut writer = ColumnWriter::new(vec![ColumnDef::real(scenario.column("CustosPostoFabrica"))]);
    for row in stands.iter() {
        let class = elevation.class_of(row.text("Regiao").as_deref());
        let values: Vec<Option<f64>> = parts.iter().map(|c| row.f64(c)).collect();
        let cost = delivered_cost(&values, params.coppice_rate_pct(class));
        writer.push(row.rowid(), vec![Value::Real(cost)]);
    }
    let n = writer.write(store, table)?;
    info!(table, scenario = scenario.suffix(), rows = n, "delivered cost computed");
    Ok(n)
}

/// Step 28: CustoMadAV = reform-twice cost / reform-then-regrow cost
pub fn apply_cost_ratio(store: &TabularStore, table: &str) -> EngineResult<usize> {
    let reform = Scenario::RefRef.column("CustosPostoFabrica");
    let regrow = Scenario::RefReg.column("CustosPostoFabrica");
    let stands = store.read_columns(table, &[&reform, &regrow])?;

    let mut writer = ColumnWriter::new(vec![ColumnDef::real("CustoMadAV")]);
    for row in stands.iter() {
        let ratio = div(Some(row.f64(&reform).unwrap_or(0.0)), row.f64(&regrow));
        writer.push(row.rowid(), vec![Value::from(ratio)]);
    }
    let n = writer.write(store, table)?;
    info!(table, rows = n, "cost ratio computed");
    Ok(n)
}
