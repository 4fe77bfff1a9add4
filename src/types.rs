//! Core types for the W-HEART engine
//!
//! This module defines the records that cross the engine boundary: the clinical
//! input record, the per-term load breakdown, and the risk result.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Default HRV reading used when no autonomic data is available (ms)
pub const DEFAULT_HRV: i32 = 50;

/// Smoking status, encoded on the wire as 0/1/2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SmokingStatus {
    #[default]
    Never,
    Former,
    Current,
}

impl SmokingStatus {
    pub fn code(self) -> u8 {
        match self {
            SmokingStatus::Never => 0,
            SmokingStatus::Former => 1,
            SmokingStatus::Current => 2,
        }
    }
}

impl TryFrom<u8> for SmokingStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SmokingStatus::Never),
            1 => Ok(SmokingStatus::Former),
            2 => Ok(SmokingStatus::Current),
            other => Err(format!("smoking code must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<SmokingStatus> for u8 {
    fn from(status: SmokingStatus) -> Self {
        status.code()
    }
}

fn default_hrv() -> i32 {
    DEFAULT_HRV
}

/// Clinical input record for a single evaluation.
///
/// Optional markers are tested by presence only: `Some(0.0)` is a measured
/// zero and is evaluated, `None` contributes no load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskInput {
    /// Age in years
    pub age: u32,
    /// Biological sex (true = male)
    pub male: bool,
    /// Smoking status (0 = never, 1 = former, 2 = current)
    pub smoking: SmokingStatus,
    /// Body mass index (kg/m²)
    pub bmi: f64,
    /// Systolic blood pressure (mmHg)
    pub sbp: i32,
    /// Diagnosed diabetes
    #[serde(default)]
    pub diabetes: bool,
    /// Family history of cardiovascular disease
    #[serde(default)]
    pub family: bool,
    /// Current HRV (ms)
    #[serde(default = "default_hrv")]
    pub hrv_now: i32,
    /// HRV 30 days prior (ms)
    #[serde(default = "default_hrv")]
    pub hrv_30d_ago: i32,
    /// 7-day HRV standard deviation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hrv_sd7d: Option<i32>,
    /// LDL cholesterol (mg/dL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldl: Option<f64>,
    /// HDL cholesterol (mg/dL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdl: Option<f64>,
    /// Triglycerides, or total cholesterol as a proxy (mg/dL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tg: Option<f64>,
    /// C-reactive protein (mg/L)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crp: Option<f64>,
}

impl RiskInput {
    /// Create an input with the required fields; everything else takes its default
    pub fn new(age: u32, male: bool, smoking: SmokingStatus, bmi: f64, sbp: i32) -> Self {
        Self {
            age,
            male,
            smoking,
            bmi,
            sbp,
            diabetes: false,
            family: false,
            hrv_now: DEFAULT_HRV,
            hrv_30d_ago: DEFAULT_HRV,
            hrv_sd7d: None,
            ldl: None,
            hdl: None,
            tg: None,
            crp: None,
        }
    }

    pub fn with_diabetes(mut self, diabetes: bool) -> Self {
        self.diabetes = diabetes;
        self
    }

    pub fn with_family_history(mut self, family: bool) -> Self {
        self.family = family;
        self
    }

    /// Set current and 30-day-prior HRV
    pub fn with_hrv(mut self, hrv_now: i32, hrv_30d_ago: i32) -> Self {
        self.hrv_now = hrv_now;
        self.hrv_30d_ago = hrv_30d_ago;
        self
    }

    pub fn with_hrv_sd7d(mut self, sd: i32) -> Self {
        self.hrv_sd7d = Some(sd);
        self
    }

    /// Set the lipid panel (LDL, HDL, triglycerides)
    pub fn with_lipids(mut self, ldl: Option<f64>, hdl: Option<f64>, tg: Option<f64>) -> Self {
        self.ldl = ldl;
        self.hdl = hdl;
        self.tg = tg;
        self
    }

    pub fn with_crp(mut self, crp: f64) -> Self {
        self.crp = Some(crp);
        self
    }

    /// Check that all fields are within plausible ranges.
    ///
    /// The engine never calls this; it is for callers that accept untrusted input.
    ///
    /// # Errors
    /// Returns every problem found as a list of messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.age > 130 {
            errors.push(format!("Age {} out of range [0, 130]", self.age));
        }
        if !self.bmi.is_finite() || self.bmi <= 0.0 {
            errors.push(format!("BMI {} must be a positive number", self.bmi));
        }
        if !(40..=300).contains(&self.sbp) {
            errors.push(format!("Systolic BP {} out of range [40, 300]", self.sbp));
        }
        if self.hrv_now < 0 {
            errors.push(format!("hrv_now {} must be non-negative", self.hrv_now));
        }
        if self.hrv_30d_ago < 0 {
            errors.push(format!("hrv_30d_ago {} must be non-negative", self.hrv_30d_ago));
        }
        if let Some(sd) = self.hrv_sd7d {
            if sd < 0 {
                errors.push(format!("hrv_sd7d {} must be non-negative", sd));
            }
        }

        let markers = [
            ("ldl", self.ldl),
            ("hdl", self.hdl),
            ("tg", self.tg),
            ("crp", self.crp),
        ];
        for (name, value) in markers {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    errors.push(format!("{} {} must be a non-negative number", name, v));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Named override condition that forces the irreversible phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Trigger {
    #[serde(rename = "SBP collapse")]
    SbpCollapse,
    #[serde(rename = "Inflammation fire")]
    InflammationFire,
    #[serde(rename = "LDL overload")]
    LdlOverload,
    #[serde(rename = "Endothelial collapse")]
    EndothelialCollapse,
    #[serde(rename = "Autonomic chaos")]
    AutonomicChaos,
    /// Accumulated load reached critical mass with no named override
    #[serde(rename = "Critical mass")]
    CriticalMass,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::SbpCollapse => "SBP collapse",
            Trigger::InflammationFire => "Inflammation fire",
            Trigger::LdlOverload => "LDL overload",
            Trigger::EndothelialCollapse => "Endothelial collapse",
            Trigger::AutonomicChaos => "Autonomic chaos",
            Trigger::CriticalMass => "Critical mass",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        [
            Trigger::SbpCollapse,
            Trigger::InflammationFire,
            Trigger::LdlOverload,
            Trigger::EndothelialCollapse,
            Trigger::AutonomicChaos,
            Trigger::CriticalMass,
        ]
        .into_iter()
        .find(|t| t.as_str() == name)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System phase reported with every result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Stable,
    Irreversible(Trigger),
}

impl Phase {
    pub const STABLE_LABEL: &'static str = "Stable system";
    pub const IRREVERSIBLE_PREFIX: &'static str = "Irreversible — ";
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Stable => f.write_str(Self::STABLE_LABEL),
            Phase::Irreversible(trigger) => write!(f, "{}{}", Self::IRREVERSIBLE_PREFIX, trigger),
        }
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        if label == Self::STABLE_LABEL {
            return Ok(Phase::Stable);
        }
        label
            .strip_prefix(Self::IRREVERSIBLE_PREFIX)
            .and_then(Trigger::from_name)
            .map(Phase::Irreversible)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown phase: {label}")))
    }
}

/// Per-term load contributions, summed into `N_vasc` before overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBreakdown {
    pub age: i64,
    pub smoking: i64,
    pub bmi: i64,
    pub sbp: i64,
    pub diabetes: i64,
    pub family: i64,
    pub hrv_drop: i64,
    pub hrv_instability: i64,
    pub lipids: i64,
    pub crp: i64,
}

impl LoadBreakdown {
    /// Sum of all ten contributions, saturating at `i64::MAX`
    pub fn total(&self) -> i64 {
        [
            self.age,
            self.smoking,
            self.bmi,
            self.sbp,
            self.diabetes,
            self.family,
            self.hrv_drop,
            self.hrv_instability,
            self.lipids,
            self.crp,
        ]
        .into_iter()
        .fold(0i64, i64::saturating_add)
    }
}

/// Result of a single evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskOutput {
    /// Normalized risk in [0, 1], rounded to 6 decimals
    pub risk: f64,
    /// "Stable system" or "Irreversible — <trigger>"
    pub phase: Phase,
    /// Override that fired, if any
    pub trigger: Option<Trigger>,
    /// Accumulated load after overrides
    #[serde(rename = "N_vasc")]
    pub n_vasc: i64,
    /// Sex-dependent critical mass
    #[serde(rename = "N_crit")]
    pub n_crit: i64,
    /// Formula version tag
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_input_defaults_from_json() {
        let input: RiskInput =
            serde_json::from_str(r#"{"age": 50, "male": false, "smoking": 1, "bmi": 24.0, "sbp": 120}"#)
                .unwrap();

        assert_eq!(
            input,
            RiskInput::new(50, false, SmokingStatus::Former, 24.0, 120)
        );
        assert_eq!(input.hrv_now, 50);
        assert_eq!(input.hrv_30d_ago, 50);
        assert!(input.hrv_sd7d.is_none());
    }

    #[test]
    fn test_invalid_smoking_code_rejected() {
        let result = serde_json::from_str::<RiskInput>(
            r#"{"age": 50, "male": true, "smoking": 3, "bmi": 24.0, "sbp": 120}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_marker_is_present() {
        let input: RiskInput = serde_json::from_str(
            r#"{"age": 50, "male": true, "smoking": 0, "bmi": 24.0, "sbp": 120, "crp": 0.0}"#,
        )
        .unwrap();
        assert_eq!(input.crp, Some(0.0));
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Stable.to_string(), "Stable system");
        assert_eq!(
            Phase::Irreversible(Trigger::AutonomicChaos).to_string(),
            "Irreversible — Autonomic chaos"
        );

        let json = serde_json::to_string(&Phase::Irreversible(Trigger::SbpCollapse)).unwrap();
        assert_eq!(json, "\"Irreversible — SBP collapse\"");
        let back: Phase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Phase::Irreversible(Trigger::SbpCollapse));
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let mut input = RiskInput::new(200, true, SmokingStatus::Never, -1.0, 20);
        input.ldl = Some(f64::NAN);

        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_validate_accepts_typical_input() {
        let input = RiskInput::new(45, false, SmokingStatus::Current, 27.3, 135)
            .with_lipids(Some(140.0), Some(50.0), Some(150.0))
            .with_crp(2.0);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_load_total_saturates() {
        let load = LoadBreakdown {
            age: i64::MAX,
            smoking: 784,
            ..LoadBreakdown::default()
        };
        assert_eq!(load.total(), i64::MAX);
    }
}
