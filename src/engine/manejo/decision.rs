// ==========================================
// Talhão APEX - evaluation: reform / regeneration decision
// ==========================================
// One ordered rule list per stand. Rules 1-3 split the whole area on
// the cost ratio; inside the regeneration area rules 4-9 are tried in
// order and the first match moves the area to reform. Exactly one rule
// claims a stand, so
//   AvFinalReforma + AvFinalRegeneracao = Area - AvFinalNaoAvaliado
// ==========================================

use crate::domain::parameters::ManagementParameters;
use crate::domain::stand_code::StandCode;
use crate::domain::types::{DecisionClass, ElevationClass, ManagementLabel, MaterialOrigin};
use crate::engine::error::EngineResult;
use crate::engine::manejo::lookup::{reference_table, ColumnWriter, ElevationIndex};
use crate::store::{ColumnDef, RowRef, TabularStore, Value};
use std::collections::HashMap;
use tracing::info;

pub const REGROWTH_TABLE: &str = "RTMaterialGenetico";
pub const MIN_PRODUCTION_TABLE: &str = "ProdMin";

/// Stands older than this are not kept for regrowth
pub const MAX_REGROWTH_AGE: f64 = 15.0;

/// Regrowth factor column of RTMaterialGenetico for a sub-region
pub fn regrowth_column(sub_region: &str) -> &'static str {
    match sub_region {
        "BA" | "MA" => "RegBaixaEncosta",
        "PD" => "RegBaixaBaixada",
        _ => "RegAlta",
    }
}

// ==========================================
// Inputs and outcome
// ==========================================

/// Per-stand inputs of the rule list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandInputs {
    pub area: f64,
    pub vol7: Option<f64>,
    pub vol7_2rot: Option<f64>,
    pub cost_ratio: Option<f64>,
    pub elevation: Option<ElevationClass>,
    pub basal_spacing: Option<f64>,
    pub stems: Option<f64>,
    pub material: Option<String>,
    pub regime: Option<String>,
    pub age: Option<f64>,
    pub regrowth_factor: Option<f64>,
    pub min_production: Option<f64>,
}

/// Areas assigned by each rule, plus the claiming rule
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub class: DecisionClass,
    pub min_stems: Option<f64>,
    pub origin: MaterialOrigin,
    pub reform: f64,
    pub not_evaluated: f64,
    pub regeneration: f64,
    pub below_min_stems: f64,
    pub seed_origin: f64,
    pub second_rotation: f64,
    pub zero_regrowth: f64,
    pub over_age: f64,
    pub below_min_production: f64,
}

impl Decision {
    /// AvAreaReformaSemi: rules 4-8
    pub fn semi_reform(&self) -> f64 {
        self.below_min_stems + self.seed_origin + self.second_rotation + self.zero_regrowth + self.over_age
    }

    pub fn final_reform(&self) -> f64 {
        self.reform + self.semi_reform() + self.below_min_production
    }

    pub fn final_regeneration(&self) -> f64 {
        self.regeneration - self.semi_reform() - self.below_min_production
    }

    pub fn label(&self) -> ManagementLabel {
        ManagementLabel::for_reform_area(self.final_reform())
    }
}

fn lt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}

/// Run the rule list for one stand
pub fn decide(stand: &StandInputs, params: &ManagementParameters) -> Decision {
    let fave = params.viability_threshold();
    let area = stand.area;
    let origin = MaterialOrigin::of(stand.material.as_deref());
    let min_stems = match (stand.elevation, stand.basal_spacing) {
        (Some(e), Some(s)) => Some(params.min_stems(e, s)),
        _ => None,
    };

    let mut d = Decision {
        class: DecisionClass::Regeneration,
        min_stems,
        origin,
        reform: 0.0,
        not_evaluated: 0.0,
        regeneration: 0.0,
        below_min_stems: 0.0,
        seed_origin: 0.0,
        second_rotation: 0.0,
        zero_regrowth: 0.0,
        over_age: 0.0,
        below_min_production: 0.0,
    };

    let no_regrowth = stand.vol7_2rot.map_or(true, |v| v == 0.0);
    let ratio = stand.cost_ratio.filter(|r| *r != 0.0);

    // rules 1-3
    if no_regrowth || ratio.map_or(false, |r| r > fave) {
        d.class = DecisionClass::Reform;
        d.reform = area;
        return d;
    }
    if ratio.is_none() {
        d.class = DecisionClass::NotEvaluated;
        d.not_evaluated = area;
        return d;
    }
    d.regeneration = area;

    // rules 4-9, first match only
    let regime_r = stand.regime.as_deref().map(str::trim) == Some("R");
    let (class, slot) = if lt(stand.stems, min_stems) {
        (DecisionClass::BelowMinStems, &mut d.below_min_stems)
    } else if origin == MaterialOrigin::Semente {
        (DecisionClass::SeedOrigin, &mut d.seed_origin)
    } else if regime_r {
        (DecisionClass::SecondRotation, &mut d.second_rotation)
    } else if stand.regrowth_factor == Some(0.0) {
        (DecisionClass::ZeroRegrowthFactor, &mut d.zero_regrowth)
    } else if stand.age.map_or(false, |a| a > MAX_REGROWTH_AGE) {
        (DecisionClass::OverAge, &mut d.over_age)
    } else if lt(stand.vol7, stand.min_production) {
        (DecisionClass::BelowMinProduction, &mut d.below_min_production)
    } else {
        return d;
    };
    *slot = area;
    d.class = class;
    d
}

// ==========================================
// Step 29
// ==========================================

/// Reference lookups of the rule list
struct DecisionReferences {
    elevation: ElevationIndex,
    regrowth: HashMap<String, [Option<f64>; 3]>,
    min_production: HashMap<String, f64>,
}

impl DecisionReferences {
    fn load(store: &TabularStore) -> EngineResult<Self> {
        let elevation = ElevationIndex::load(store)?;

        let rt = reference_table(store, REGROWTH_TABLE)?;
        let mut regrowth = HashMap::new();
        for row in rt.iter() {
            let Some(material) = row.text("DCR_MatGen") else { continue };
            regrowth.entry(material).or_insert([
                row.f64("RegBaixaEncosta"),
                row.f64("RegBaixaBaixada"),
                row.f64("RegAlta"),
            ]);
        }

        let pm = reference_table(store, MIN_PRODUCTION_TABLE)?;
        let mut min_production = HashMap::new();
        for row in pm.iter() {
            if let (Some(region), Some(v)) = (row.text("Regiao"), row.f64("ProdMin")) {
                min_production.entry(region).or_insert(v);
            }
        }

        Ok(Self {
            elevation,
            regrowth,
            min_production,
        })
    }

    fn regrowth_factor(&self, material: Option<&str>, sub_region: &str) -> Option<f64> {
        let factors = self.regrowth.get(material?)?;
        match regrowth_column(sub_region) {
            "RegBaixaEncosta" => factors[0],
            "RegBaixaBaixada" => factors[1],
            _ => factors[2],
        }
    }

    fn inputs(&self, row: &RowRef<'_>) -> StandInputs {
        let code = StandCode::new(row.text("Talhao").unwrap_or_default());
        let sub_region = code.sub_region();
        let material = row.text("DCR_MatGen");
        StandInputs {
            area: row.f64("Area").unwrap_or(0.0),
            vol7: row.f64("Vol7"),
            vol7_2rot: row.f64("Vol7_2ROT"),
            cost_ratio: row.f64("CustoMadAV"),
            elevation: Some(self.elevation.class_of(row.text("Regiao").as_deref())),
            basal_spacing: row.f64("EspAB"),
            stems: row.f64("Fustes"),
            regrowth_factor: self.regrowth_factor(material.as_deref(), &sub_region),
            min_production: self.min_production.get(&sub_region).copied(),
            material,
            regime: row.text("Regime"),
            age: row.f64("Idade"),
        }
    }
}

pub fn decision_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::real("AVAreaReforma"),
        ColumnDef::real("AvAreaNaoAvaliada"),
        ColumnDef::real("AvAreaRegeneracao"),
        ColumnDef::text("RegAltaBaixa"),
        ColumnDef::real("ArvMin"),
        ColumnDef::real("AvFustesAreaReforma"),
        ColumnDef::text("CloneSemente"),
        ColumnDef::real("AvCSAreaReforma"),
        ColumnDef::real("AvR2AreaReforma"),
        ColumnDef::real("FatorBrotacaoMatGen"),
        ColumnDef::real("AvMGNR"),
        ColumnDef::real("AvMaior15AreaReforma"),
        ColumnDef::real("ProdMin"),
        ColumnDef::real("AvBaixaProd"),
        ColumnDef::real("AvAreaReformaSemi"),
        ColumnDef::real("AvFinalNaoAvaliado"),
        ColumnDef::real("AvFinalAnalise"),
        ColumnDef::real("AvFinalReforma"),
        ColumnDef::real("AvFinalRegeneracao"),
        ColumnDef::text("AvClassificacao"),
    ]
}

/// Step 29: decision columns on the run table
pub fn apply_decision(store: &TabularStore, table: &str, params: &ManagementParameters) -> EngineResult<usize> {
    let refs = DecisionReferences::load(store)?;
    let stands = store.read_columns(
        table,
        &[
            "Talhao", "Regiao", "Regime", "Area", "Idade", "DCR_MatGen", "Fustes", "EspAB", "Vol7",
            "Vol7_2ROT", "CustoMadAV",
        ],
    )?;

    let mut writer = ColumnWriter::new(decision_columns());
    let mut counts: HashMap<DecisionClass, usize> = HashMap::new();
    for row in stands.iter() {
        let inputs = refs.inputs(&row);
        let d = decide(&inputs, params);
        *counts.entry(d.class).or_default() += 1;
        writer.push(
            row.rowid(),
            vec![
                Value::Real(d.reform),
                Value::Real(d.not_evaluated),
                Value::Real(d.regeneration),
                Value::from(inputs.elevation.map(|e| e.code())),
                Value::from(d.min_stems),
                Value::Real(d.below_min_stems),
                Value::from(d.origin.as_str()),
                Value::Real(d.seed_origin),
                Value::Real(d.second_rotation),
                Value::from(inputs.regrowth_factor),
                Value::Real(d.zero_regrowth),
                Value::Real(d.over_age),
                Value::from(inputs.min_production),
                Value::Real(d.below_min_production),
                Value::Real(d.semi_reform()),
                Value::Real(d.not_evaluated),
                Value::Real(d.below_min_production),
                Value::Real(d.final_reform()),
                Value::Real(d.final_regeneration()),
                Value::from(d.class.as_str()),
            ],
        );
    }
    let n = writer.write(store, table)?;
    info!(
        table,
        rows = n,
        reform = counts.get(&DecisionClass::Reform).copied().unwrap_or(0),
        not_evaluated = counts.get(&DecisionClass::NotEvaluated).copied().unwrap_or(0),
        regeneration = counts.get(&DecisionClass::Regeneration).copied().unwrap_or(0),
        "decision tree applied"
    );
    Ok(n)
}

/// Step 31: ManejoAPEX from the final reform area
pub fn apply_management_label(store: &TabularStore, table: &str) -> EngineResult<usize> {
    let stands = store.read_columns(table, &["AvFinalReforma"])?;
    let mut writer = ColumnWriter::new(vec![ColumnDef::text("ManejoAPEX")]);
    for row in stands.iter() {
        let label = ManagementLabel::for_reform_area(row.f64("AvFinalReforma").unwrap_or(0.0));
        writer.push(row.rowid(), vec![Value::from(label.as_str())]);
    }
    let n = writer.write(store, table)?;
    info!(table, rows = n, "management label assigned");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ManagementParameters {
        ManagementParameters {
            viability_threshold_pct: 100.0,
            min_stems_high_narrow: 1000.0,
            min_stems_high_wide: 800.0,
            min_stems_low_narrow: 1200.0,
            min_stems_low_wide: 900.0,
            ..Default::default()
        }
    }

    fn viable() -> StandInputs {
        StandInputs {
            area: 10.0,
            vol7: Some(250.0),
            vol7_2rot: Some(200.0),
            cost_ratio: Some(0.9),
            elevation: Some(ElevationClass::High),
            basal_spacing: Some(6.0),
            stems: Some(1500.0),
            material: Some("CLONE01".into()),
            regime: Some("T".into()),
            age: Some(6.0),
            regrowth_factor: Some(1.0),
            min_production: Some(150.0),
        }
    }

    fn assert_partition(stand: &StandInputs, d: &Decision) {
        let total = d.final_reform() + d.final_regeneration() + d.not_evaluated;
        assert!((total - stand.area).abs() < 1e-9, "{:?}", d);
    }

    #[test]
    fn test_first_three_rules_split_on_cost_ratio() {
        let p = params();
        let mut s = viable();
        let d = decide(&s, &p);
        assert_eq!(d.class, DecisionClass::Regeneration);
        assert_eq!(d.final_regeneration(), 10.0);
        assert_eq!(d.label(), ManagementLabel::Regeneracao);

        s.cost_ratio = Some(1.2);
        let d = decide(&s, &p);
        assert_eq!(d.class, DecisionClass::Reform);
        assert_eq!(d.label(), ManagementLabel::Reforma);
        assert_partition(&s, &d);

        s.cost_ratio = None;
        assert_eq!(decide(&s, &p).class, DecisionClass::NotEvaluated);
        s.cost_ratio = Some(0.0);
        let d = decide(&s, &p);
        assert_eq!(d.class, DecisionClass::NotEvaluated);
        assert_eq!(d.final_reform(), 0.0);
        assert_partition(&s, &d);

        s.vol7_2rot = Some(0.0);
        assert_eq!(decide(&s, &p).class, DecisionClass::Reform);
        s.vol7_2rot = None;
        assert_eq!(decide(&s, &p).class, DecisionClass::Reform);
    }

    #[test]
    fn test_regeneration_rules_claim_in_order() {
        let p = params();

        let mut s = viable();
        s.stems = Some(900.0);
        s.material = Some("E-GRAND".into());
        let d = decide(&s, &p);
        assert_eq!(d.class, DecisionClass::BelowMinStems);
        assert_eq!(d.min_stems, Some(1000.0));
        assert_eq!(d.seed_origin, 0.0);
        assert_partition(&s, &d);

        let mut s = viable();
        s.material = Some("E-GRAND".into());
        s.regime = Some("R".into());
        let d = decide(&s, &p);
        assert_eq!(d.class, DecisionClass::SeedOrigin);
        assert_eq!(d.second_rotation, 0.0);

        let mut s = viable();
        s.regime = Some("R".into());
        assert_eq!(decide(&s, &p).class, DecisionClass::SecondRotation);

        let mut s = viable();
        s.regrowth_factor = Some(0.0);
        s.age = Some(16.0);
        assert_eq!(decide(&s, &p).class, DecisionClass::ZeroRegrowthFactor);

        let mut s = viable();
        s.age = Some(16.0);
        assert_eq!(decide(&s, &p).class, DecisionClass::OverAge);

        let mut s = viable();
        s.min_production = Some(300.0);
        let d = decide(&s, &p);
        assert_eq!(d.class, DecisionClass::BelowMinProduction);
        assert_eq!(d.semi_reform(), 0.0);
        assert_eq!(d.final_reform(), 10.0);
        assert_eq!(d.final_regeneration(), 0.0);
        assert_eq!(d.label(), ManagementLabel::Reforma);
        assert_partition(&s, &d);
    }

    #[test]
    fn test_min_stems_follow_elevation_and_spacing() {
        let p = params();
        let mut s = viable();
        s.elevation = Some(ElevationClass::Low);
        s.basal_spacing = Some(9.0);
        s.stems = Some(850.0);
        let d = decide(&s, &p);
        assert_eq!(d.min_stems, Some(900.0));
        assert_eq!(d.class, DecisionClass::BelowMinStems);

        s.stems = None;
        assert_eq!(decide(&s, &p).class, DecisionClass::Regeneration);
    }

    #[test]
    fn test_regrowth_column_by_sub_region() {
        assert_eq!(regrowth_column("BA"), "RegBaixaEncosta");
        assert_eq!(regrowth_column("MA"), "RegBaixaEncosta");
        assert_eq!(regrowth_column("PD"), "RegBaixaBaixada");
        assert_eq!(regrowth_column("12"), "RegAlta");
    }
}
