//! Reference scenarios
//!
//! Named clinical profiles spanning the stable range and every override path.
//! Used by the CLI `scenarios` command and as regression fixtures.

use crate::types::{RiskInput, SmokingStatus};
use serde::Serialize;

/// A named input profile
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub name: &'static str,
    pub input: RiskInput,
}

fn profile(
    name: &'static str,
    base: RiskInput,
    hrv: (i32, i32, i32),
    lipids: (f64, f64, f64),
    crp: f64,
) -> Scenario {
    let (now, ago, sd) = hrv;
    let (ldl, hdl, tg) = lipids;
    Scenario {
        name,
        input: base
            .with_hrv(now, ago)
            .with_hrv_sd7d(sd)
            .with_lipids(Some(ldl), Some(hdl), Some(tg))
            .with_crp(crp),
    }
}

/// The reference profiles, in report order
pub fn reference_scenarios() -> Vec<Scenario> {
    use SmokingStatus::*;

    vec![
        profile(
            "Healthy young",
            RiskInput::new(28, true, Never, 22.4, 118),
            (78, 72, 45),
            (110.0, 62.0, 90.0),
            0.5,
        ),
        profile(
            "Middle age stable",
            RiskInput::new(47, false, Never, 25.1, 128),
            (55, 58, 38),
            (135.0, 55.0, 120.0),
            2.0,
        ),
        profile(
            "Pre-hypertensive tension",
            RiskInput::new(52, true, Former, 29.5, 148),
            (40, 50, 32),
            (160.0, 42.0, 180.0),
            4.0,
        ),
        profile(
            "High LDL risk",
            RiskInput::new(61, true, Never, 27.8, 136),
            (48, 54, 44),
            (240.0, 53.0, 130.0),
            1.8,
        ),
        profile(
            "Inflammation fire",
            RiskInput::new(55, false, Never, 26.2, 132),
            (50, 52, 46),
            (155.0, 48.0, 170.0),
            18.0,
        ),
        profile(
            "Autonomic chaos (HRV low)",
            RiskInput::new(45, true, Current, 31.4, 142),
            (12, 45, 20),
            (150.0, 38.0, 200.0),
            7.0,
        ),
        profile(
            "Autonomic chaos (HRV high)",
            RiskInput::new(33, false, Never, 23.0, 118),
            (190, 60, 155),
            (120.0, 65.0, 90.0),
            0.8,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::evaluate;
    use crate::types::{Phase, Trigger};

    fn run(name: &str) -> crate::types::RiskOutput {
        let scenario = reference_scenarios()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap();
        evaluate(&scenario.input)
    }

    #[test]
    fn test_scenario_names_unique() {
        let scenarios = reference_scenarios();
        let mut names: Vec<_> = scenarios.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_stable_profiles() {
        assert_eq!(run("Healthy young").risk, 0.005847);
        assert_eq!(run("Middle age stable").phase, Phase::Stable);
        assert_eq!(run("Pre-hypertensive tension").phase, Phase::Stable);
    }

    #[test]
    fn test_override_profiles() {
        assert_eq!(run("High LDL risk").trigger, Some(Trigger::LdlOverload));
        assert_eq!(run("Inflammation fire").trigger, Some(Trigger::InflammationFire));

        for name in ["Autonomic chaos (HRV low)", "Autonomic chaos (HRV high)"] {
            let output = run(name);
            assert_eq!(output.phase, Phase::Irreversible(Trigger::AutonomicChaos));
            assert_eq!(output.risk, 1.0);
            assert_eq!(output.n_vasc, output.n_crit);
        }
    }

    #[test]
    fn test_reference_numbers_pinned() {
        let expected = [
            ("Healthy young", 0.005847, 12, 8192, Phase::Stable),
            ("Middle age stable", 0.458466, 1019, 7168, Phase::Stable),
            ("Pre-hypertensive tension", 0.863649, 3214, 8192, Phase::Stable),
            ("High LDL risk", 1.0, 7208, 8192, Phase::Irreversible(Trigger::LdlOverload)),
            ("Inflammation fire", 1.0, 6594, 7168, Phase::Irreversible(Trigger::InflammationFire)),
            ("Autonomic chaos (HRV low)", 1.0, 8192, 8192, Phase::Irreversible(Trigger::AutonomicChaos)),
            ("Autonomic chaos (HRV high)", 1.0, 7168, 7168, Phase::Irreversible(Trigger::AutonomicChaos)),
        ];

        for (name, risk, n_vasc, n_crit, phase) in expected {
            let output = run(name);
            assert_eq!(
                (output.risk, output.n_vasc, output.n_crit, output.phase),
                (risk, n_vasc, n_crit, phase),
                "{name}"
            );
        }
    }
}
