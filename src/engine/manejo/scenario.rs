// ==========================================
// Talhão APEX - evaluation: cost scenarios
// ==========================================
// REF_REG: reform now, regrow next cycle (paired with Vol7_2ROT)
// REF_REF: reform now, reform again      (paired with Vol7_1ROT)
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    RefReg,
    RefRef,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::RefReg, Scenario::RefRef];

    /// Column suffix (`CustoMADPE_REF_REG`)
    pub fn suffix(&self) -> &'static str {
        match self {
            Scenario::RefReg => "REF_REG",
            Scenario::RefRef => "REF_REF",
        }
    }

    /// Rotation tag of the second-cycle volume (`2ROT` / `1ROT`)
    pub fn rotation_tag(&self) -> &'static str {
        match self {
            Scenario::RefReg => "2ROT",
            Scenario::RefRef => "1ROT",
        }
    }

    /// Second-cycle volume column
    pub fn rotation_volume(&self) -> String {
        format!("Vol7_{}", self.rotation_tag())
    }

    pub fn schedule_table(&self) -> String {
        format!("CustosSilvicultura_{}", self.suffix())
    }

    pub fn present_value_table(&self) -> String {
        format!("CustosSilvicultura_{}_VPL", self.suffix())
    }

    pub fn present_value_total_table(&self) -> String {
        format!("CustosSilvicultura_{}_VPL_Total", self.suffix())
    }

    /// `name_REF_REG` / `name_REF_REF`
    pub fn column(&self, name: &str) -> String {
        format!("{}_{}", name, self.suffix())
    }

    /// Harvest surcharge multiplier on the second cycle
    pub fn harvest_surcharge(&self, surcharge_pct: f64) -> f64 {
        match self {
            Scenario::RefReg => 1.0,
            Scenario::RefRef => 1.0 + surcharge_pct / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Scenario::RefReg.rotation_volume(), "Vol7_2ROT");
        assert_eq!(Scenario::RefRef.rotation_volume(), "Vol7_1ROT");
        assert_eq!(
            Scenario::RefRef.present_value_total_table(),
            "CustosSilvicultura_REF_REF_VPL_Total"
        );
        assert_eq!(Scenario::RefReg.column("CustoMADPE"), "CustoMADPE_REF_REG");
        assert_eq!(Scenario::RefRef.harvest_surcharge(20.0), 1.2);
        assert_eq!(Scenario::RefReg.harvest_surcharge(20.0), 1.0);
    }
}
