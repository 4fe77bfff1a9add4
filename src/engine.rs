//! Risk engine
//!
//! Accumulates integer load terms into `N_vasc`, applies the override
//! branches, and collapses the load into a bounded risk via a fourth-power
//! normalization against the sex-dependent critical mass.
//!
//! The engine is pure: no I/O, no shared state, no fallible paths.

use crate::types::{LoadBreakdown, Phase, RiskInput, RiskOutput, SmokingStatus, Trigger};
use crate::FORMULA_VERSION;

/// Critical mass for male inputs
pub const N_CRIT_MALE: i64 = 8192;
/// Critical mass for female inputs
pub const N_CRIT_FEMALE: i64 = 7168;

/// HRV standard deviation stability band (inclusive)
const HRV_SD_BAND: (i64, i64) = (30, 80);

/// Decision threshold collaborators use to binarize risk
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

/// Evaluate a single input record.
///
/// Identical inputs always yield identical outputs.
pub fn evaluate(input: &RiskInput) -> RiskOutput {
    let n_crit = critical_mass(input.male);
    let mut n_vasc = accumulate_load(input).total();

    let mut trigger = None;
    if let Some((override_trigger, factor)) = critical_override(input) {
        n_vasc = n_vasc.max((n_crit as f64 * factor).floor() as i64);
        trigger = Some(override_trigger);
    }

    if is_autonomic_chaos(input) {
        n_vasc = n_crit;
        trigger = Some(Trigger::AutonomicChaos);
    }

    if trigger.is_none() && n_vasc >= n_crit {
        trigger = Some(Trigger::CriticalMass);
    }

    // Any trigger is terminal
    let (risk, phase) = match trigger {
        Some(t) => (1.0, Phase::Irreversible(t)),
        None => (normalized_risk(n_vasc, n_crit), Phase::Stable),
    };

    RiskOutput {
        risk: round6(risk),
        phase,
        trigger,
        n_vasc,
        n_crit,
        version: FORMULA_VERSION.to_string(),
    }
}

/// Evaluate many inputs, preserving order
pub fn evaluate_batch(inputs: &[RiskInput]) -> Vec<RiskOutput> {
    inputs.iter().map(evaluate).collect()
}

/// Sex-dependent critical mass
pub fn critical_mass(male: bool) -> i64 {
    if male {
        N_CRIT_MALE
    } else {
        N_CRIT_FEMALE
    }
}

/// Compute the ten load contributions for an input.
///
/// Terms saturate instead of overflowing, so implausible magnitudes land at
/// or past critical mass.
pub fn accumulate_load(input: &RiskInput) -> LoadBreakdown {
    let age_excess = (input.age as i64 - 40).max(0);
    let bmi_excess = (input.bmi * 10.0 - 210.0).floor().max(0.0) as i64;
    let sbp_excess = (input.sbp as i64 - 115).max(0);
    let hrv_drop = (input.hrv_30d_ago as i64 - input.hrv_now as i64).max(0);

    LoadBreakdown {
        age: age_excess.saturating_pow(2).saturating_mul(4),
        smoking: smoking_load(input.smoking),
        bmi: bmi_excess.saturating_pow(2) / 16,
        sbp: sbp_excess.saturating_pow(2) / 25,
        diabetes: if input.diabetes { 1024 } else { 0 },
        family: if input.family { 896 } else { 0 },
        hrv_drop: hrv_drop * 32,
        hrv_instability: input.hrv_sd7d.map_or(0, |sd| hrv_instability_load(sd as i64)),
        lipids: lipid_load(input),
        crp: input.crp.map_or(0, crp_load),
    }
}

fn smoking_load(status: SmokingStatus) -> i64 {
    match status {
        SmokingStatus::Never => 0,
        SmokingStatus::Former => 304,
        SmokingStatus::Current => 784,
    }
}

/// Squared distance outside the HRV stability band
fn hrv_instability_load(sd: i64) -> i64 {
    let (lo, hi) = HRV_SD_BAND;
    if sd < lo {
        (lo - sd).saturating_pow(2)
    } else if sd > hi {
        (sd - hi).saturating_pow(2)
    } else {
        0
    }
}

fn lipid_load(input: &RiskInput) -> i64 {
    let mut load: i64 = 0;

    if let Some(ldl) = input.ldl {
        let steps = ((ldl - 130.0) / 10.0).floor().max(0.0) as i64;
        load = load.saturating_add(steps.saturating_mul(64));
    }
    if let Some(hdl) = input.hdl {
        let steps = ((60.0 - hdl) / 5.0).floor().max(0.0) as i64;
        load = load.saturating_add(steps.saturating_mul(96));
    }
    if let Some(ratio) = tg_hdl_ratio(input) {
        if ratio > 3.0 {
            load = load.saturating_add(1024);
        } else if ratio > 2.0 {
            load = load.saturating_add(512);
        }
    }

    load
}

fn crp_load(crp: f64) -> i64 {
    if crp > 10.0 {
        32
    } else if crp > 3.0 {
        16
    } else if crp > 1.0 {
        8
    } else {
        0
    }
}

/// Triglyceride/HDL ratio; defined only when both are present and HDL is positive
fn tg_hdl_ratio(input: &RiskInput) -> Option<f64> {
    match (input.tg, input.hdl) {
        (Some(tg), Some(hdl)) if hdl > 0.0 => Some(tg / hdl),
        _ => None,
    }
}

/// First matching single-parameter override, with its critical-mass factor
fn critical_override(input: &RiskInput) -> Option<(Trigger, f64)> {
    if input.sbp >= 180 || input.sbp <= 80 {
        Some((Trigger::SbpCollapse, 0.90))
    } else if input.crp.is_some_and(|crp| crp >= 15.0) {
        Some((Trigger::InflammationFire, 0.92))
    } else if input.ldl.is_some_and(|ldl| ldl >= 220.0) {
        Some((Trigger::LdlOverload, 0.88))
    } else if tg_hdl_ratio(input).is_some_and(|ratio| ratio >= 6.0) {
        Some((Trigger::EndothelialCollapse, 0.93))
    } else {
        None
    }
}

fn is_autonomic_chaos(input: &RiskInput) -> bool {
    input.hrv_now <= 15 || input.hrv_now >= 180 || input.hrv_sd7d.is_some_and(|sd| sd >= 150)
}

/// Fourth-power distance normalization: (N_crit⁴ − dist⁴) / N_crit⁴
fn normalized_risk(n_vasc: i64, n_crit: i64) -> f64 {
    let dist = (n_crit - n_vasc).clamp(0, n_crit);
    let crit4 = n_crit.pow(4);
    let dist4 = dist.pow(4);
    (crit4 - dist4) as f64 / crit4 as f64
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn healthy_young() -> RiskInput {
        RiskInput::new(28, true, SmokingStatus::Never, 22.4, 118)
            .with_hrv(78, 72)
            .with_hrv_sd7d(45)
            .with_lipids(Some(110.0), Some(62.0), Some(90.0))
            .with_crp(0.5)
    }

    fn low_load() -> RiskInput {
        RiskInput::new(20, true, SmokingStatus::Never, 20.0, 110)
    }

    #[test]
    fn test_healthy_young_is_stable() {
        let output = evaluate(&healthy_young());

        assert_eq!(output.phase, Phase::Stable);
        assert_eq!(output.trigger, None);
        // Only the BMI term contributes: floor(224 - 210)² / 16 = 12
        assert_eq!(output.n_vasc, 12);
        assert_eq!(output.n_crit, 8192);
        assert!(output.risk < 0.01);
        assert_eq!(output.version, "v1.6");
    }

    #[test]
    fn test_load_breakdown_terms() {
        let input = RiskInput::new(52, true, SmokingStatus::Former, 29.5, 148)
            .with_hrv(40, 50)
            .with_hrv_sd7d(32)
            .with_lipids(Some(160.0), Some(42.0), Some(180.0))
            .with_crp(4.0);

        let load = accumulate_load(&input);
        assert_eq!(
            load,
            LoadBreakdown {
                age: 576,
                smoking: 304,
                bmi: 451,
                sbp: 43,
                diabetes: 0,
                family: 0,
                hrv_drop: 320,
                hrv_instability: 0,
                // ldl: 3 * 64, hdl: 3 * 96, tg/hdl 4.29 > 3
                lipids: 192 + 288 + 1024,
                crp: 16,
            }
        );
        assert_eq!(load.total(), 3214);
    }

    #[test]
    fn test_flags_and_hrv_instability() {
        let input = RiskInput::new(40, false, SmokingStatus::Current, 21.0, 115)
            .with_diabetes(true)
            .with_family_history(true)
            .with_hrv_sd7d(20);
        let load = accumulate_load(&input);

        assert_eq!(load.smoking, 784);
        assert_eq!(load.diabetes, 1024);
        assert_eq!(load.family, 896);
        assert_eq!(load.hrv_instability, 100);

        let above_band = accumulate_load(&input.clone().with_hrv_sd7d(95));
        assert_eq!(above_band.hrv_instability, 225);

        let in_band = accumulate_load(&input.with_hrv_sd7d(80));
        assert_eq!(in_band.hrv_instability, 0);
    }

    #[test]
    fn test_stable_risk_formula() {
        let input = RiskInput::new(60, false, SmokingStatus::Never, 21.0, 115);
        let output = evaluate(&input);

        // (60 - 40)² * 4 = 1600
        assert_eq!(output.n_vasc, 1600);
        let dist = (7168.0_f64 - 1600.0).powi(4);
        let expected = (7168.0_f64.powi(4) - dist) / 7168.0_f64.powi(4);
        assert!((output.risk - expected).abs() < 1e-6);
        assert_eq!(output.phase, Phase::Stable);
    }

    #[test]
    fn test_deterministic() {
        let input = healthy_young();
        assert_eq!(evaluate(&input), evaluate(&input));
    }

    #[test]
    fn test_risk_in_unit_range() {
        for age in [0, 30, 55, 80, 100] {
            for sbp in [60, 110, 150, 200] {
                for smoking in [SmokingStatus::Never, SmokingStatus::Current] {
                    let output = evaluate(&RiskInput::new(age, age % 2 == 0, smoking, 31.0, sbp));
                    assert!((0.0..=1.0).contains(&output.risk));
                }
            }
        }
    }

    #[test]
    fn test_sbp_monotonic_load() {
        let mut previous = 0;
        for sbp in 81..180 {
            let n_vasc = evaluate(&RiskInput::new(50, true, SmokingStatus::Never, 25.0, sbp)).n_vasc;
            assert!(n_vasc >= previous, "load decreased at sbp={sbp}");
            previous = n_vasc;
        }
    }

    #[test]
    fn test_saturation_forces_max_risk() {
        let input = RiskInput::new(85, false, SmokingStatus::Current, 35.0, 170)
            .with_diabetes(true)
            .with_family_history(true);
        let output = evaluate(&input);

        assert!(output.n_vasc >= output.n_crit);
        assert_eq!(output.risk, 1.0);
        assert_eq!(output.phase, Phase::Irreversible(Trigger::CriticalMass));
    }

    #[test]
    fn test_sex_asymmetry() {
        let male = RiskInput::new(60, true, SmokingStatus::Former, 27.0, 140);
        let female = RiskInput {
            male: false,
            ..male.clone()
        };

        let m = evaluate(&male);
        let f = evaluate(&female);
        assert_eq!(m.n_crit, 8192);
        assert_eq!(f.n_crit, 7168);
        assert_eq!(m.n_vasc, f.n_vasc);
        assert!(f.risk > m.risk);
    }

    #[test]
    fn test_autonomic_chaos_overrides_low_load() {
        let output = evaluate(&low_load().with_hrv(10, 50));

        assert_eq!(output.risk, 1.0);
        assert!(output.phase.to_string().contains("Autonomic chaos"));
        assert_eq!(output.n_vasc, output.n_crit);
    }

    #[test]
    fn test_autonomic_chaos_high_hrv_and_sd() {
        assert_eq!(
            evaluate(&low_load().with_hrv(180, 50)).trigger,
            Some(Trigger::AutonomicChaos)
        );
        assert_eq!(
            evaluate(&low_load().with_hrv_sd7d(150)).trigger,
            Some(Trigger::AutonomicChaos)
        );
        assert_eq!(evaluate(&low_load().with_hrv(16, 16)).trigger, None);
    }

    #[test]
    fn test_chaos_replaces_earlier_trigger() {
        let input = RiskInput::new(20, true, SmokingStatus::Never, 20.0, 200).with_hrv(12, 50);
        let output = evaluate(&input);

        assert_eq!(output.trigger, Some(Trigger::AutonomicChaos));
        assert_eq!(output.n_vasc, 8192);
    }

    #[test]
    fn test_sbp_collapse() {
        let input = RiskInput {
            sbp: 200,
            ..healthy_young()
        };
        let output = evaluate(&input);

        assert!(output.phase.to_string().starts_with("Irreversible — SBP collapse"));
        assert_eq!(output.risk, 1.0);
        // floor(8192 * 0.90)
        assert_eq!(output.n_vasc, 7372);
    }

    #[test]
    fn test_low_sbp_collapse() {
        let output = evaluate(&RiskInput::new(30, false, SmokingStatus::Never, 20.0, 80));
        assert_eq!(output.trigger, Some(Trigger::SbpCollapse));
        assert_eq!(output.n_vasc, 6451);
    }

    #[test]
    fn test_trigger_priority() {
        let input = RiskInput::new(30, true, SmokingStatus::Never, 22.0, 190).with_crp(20.0);
        let output = evaluate(&input);

        assert_eq!(output.trigger, Some(Trigger::SbpCollapse));
        assert_eq!(output.phase, Phase::Irreversible(Trigger::SbpCollapse));
    }

    #[test]
    fn test_marker_overrides() {
        let base = RiskInput::new(30, false, SmokingStatus::Never, 22.0, 120);

        let inflamed = evaluate(&base.clone().with_crp(15.0));
        assert_eq!(inflamed.trigger, Some(Trigger::InflammationFire));
        assert_eq!(inflamed.n_vasc, (7168.0_f64 * 0.92).floor() as i64);

        let ldl = evaluate(&base.clone().with_lipids(Some(220.0), None, None));
        assert_eq!(ldl.trigger, Some(Trigger::LdlOverload));
        assert_eq!(ldl.n_vasc, 6307);

        let endothelial = evaluate(&base.clone().with_lipids(None, Some(40.0), Some(240.0)));
        assert_eq!(endothelial.trigger, Some(Trigger::EndothelialCollapse));
        assert_eq!(endothelial.n_vasc, 6666);

        let ratio_below = evaluate(&base.with_lipids(None, Some(40.0), Some(239.0)));
        assert_eq!(ratio_below.trigger, None);
    }

    #[test]
    fn test_ratio_bands_are_exclusive() {
        let base = RiskInput::new(30, false, SmokingStatus::Never, 20.0, 115);
        // hdl = 60 contributes no HDL penalty
        let high = accumulate_load(&base.clone().with_lipids(None, Some(60.0), Some(200.0)));
        assert_eq!(high.lipids, 1024);

        let mid = accumulate_load(&base.clone().with_lipids(None, Some(60.0), Some(150.0)));
        assert_eq!(mid.lipids, 512);

        let edge = accumulate_load(&base.with_lipids(None, Some(60.0), Some(120.0)));
        assert_eq!(edge.lipids, 0);
    }

    #[test]
    fn test_presence_not_truthiness() {
        let base = RiskInput::new(30, false, SmokingStatus::Never, 20.0, 115);

        // A measured HDL of zero still carries the HDL penalty but never a ratio
        let zero_hdl = accumulate_load(&base.clone().with_lipids(None, Some(0.0), Some(150.0)));
        assert_eq!(zero_hdl.lipids, 12 * 96);

        let zero_crp = accumulate_load(&base.clone().with_crp(0.0));
        assert_eq!(zero_crp.crp, 0);

        assert_eq!(accumulate_load(&base).total(), 0);
    }

    #[test]
    fn test_crp_bands() {
        assert_eq!(crp_load(0.5), 0);
        assert_eq!(crp_load(1.0), 0);
        assert_eq!(crp_load(1.5), 8);
        assert_eq!(crp_load(3.5), 16);
        assert_eq!(crp_load(10.5), 32);
    }

    #[test]
    fn test_batch_preserves_order() {
        let inputs = vec![healthy_young(), low_load().with_hrv(10, 50), low_load()];
        let outputs = evaluate_batch(&inputs);

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0], evaluate(&inputs[0]));
        assert_eq!(outputs[1].trigger, Some(Trigger::AutonomicChaos));
        assert_eq!(outputs[2].n_vasc, 0);
        assert_eq!(outputs[2].risk, 0.0);
    }

    #[test]
    fn test_output_json_field_names() {
        let json = serde_json::to_value(evaluate(&healthy_young())).unwrap();
        assert_eq!(json["phase"], "Stable system");
        assert_eq!(json["N_vasc"], 12);
        assert_eq!(json["N_crit"], 8192);
        assert_eq!(json["version"], "v1.6");
    }

    #[test]
    fn test_extreme_age_saturates_to_critical_mass() {
        let output = evaluate(&RiskInput::new(u32::MAX, true, SmokingStatus::Never, 22.0, 120));

        assert_eq!(output.phase, Phase::Irreversible(Trigger::CriticalMass));
        assert_eq!(output.risk, 1.0);
        assert_eq!(output.n_vasc, i64::MAX);
    }

    #[test]
    fn test_extreme_bmi_saturates_to_critical_mass() {
        let output = evaluate(&RiskInput::new(30, false, SmokingStatus::Never, 1e300, 120));

        assert_eq!(output.trigger, Some(Trigger::CriticalMass));
        assert_eq!(output.risk, 1.0);
        assert!(output.n_vasc >= N_CRIT_FEMALE);
    }

    #[test]
    fn test_extreme_lipids_do_not_overflow() {
        let input = low_load().with_lipids(Some(1e300), Some(-1e300), None);
        assert_eq!(accumulate_load(&input).lipids, i64::MAX);

        let output = evaluate(&input);
        assert_eq!(output.trigger, Some(Trigger::LdlOverload));
        assert_eq!(output.risk, 1.0);
        assert_eq!(output.n_vasc, i64::MAX);
    }
}
