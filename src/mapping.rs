//! Column mapping
//!
//! A single configuration-driven table that maps dataset columns onto the
//! engine's canonical input fields. Each field names its source column, the
//! coercion that turns cell text into a value, and the fallback policy applied
//! when the cell is empty or unreadable.
//!
//! Categorical fallbacks are lossy: an unrecognized smoking status is read as
//! "never", an unrecognized sex as female. Both are reported as row warnings.

use crate::error::{CoercionError, ComputeError, MappingError};
use crate::types::{RiskInput, SmokingStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical engine input fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    Age,
    Male,
    Smoking,
    Bmi,
    Sbp,
    Diabetes,
    Family,
    HrvNow,
    #[serde(rename = "hrv_30d_ago")]
    Hrv30dAgo,
    HrvSd7d,
    Ldl,
    Hdl,
    Tg,
    Crp,
}

impl InputField {
    pub const ALL: [InputField; 14] = [
        InputField::Age,
        InputField::Male,
        InputField::Smoking,
        InputField::Bmi,
        InputField::Sbp,
        InputField::Diabetes,
        InputField::Family,
        InputField::HrvNow,
        InputField::Hrv30dAgo,
        InputField::HrvSd7d,
        InputField::Ldl,
        InputField::Hdl,
        InputField::Tg,
        InputField::Crp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputField::Age => "age",
            InputField::Male => "male",
            InputField::Smoking => "smoking",
            InputField::Bmi => "bmi",
            InputField::Sbp => "sbp",
            InputField::Diabetes => "diabetes",
            InputField::Family => "family",
            InputField::HrvNow => "hrv_now",
            InputField::Hrv30dAgo => "hrv_30d_ago",
            InputField::HrvSd7d => "hrv_sd7d",
            InputField::Ldl => "ldl",
            InputField::Hdl => "hdl",
            InputField::Tg => "tg",
            InputField::Crp => "crp",
        }
    }

    /// Fields the engine cannot run without
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            InputField::Age | InputField::Male | InputField::Smoking | InputField::Bmi | InputField::Sbp
        )
    }

    /// Check a resolved value against the field's plausible range.
    ///
    /// # Errors
    /// Returns a description of the accepted range.
    pub fn check_value(&self, value: f64) -> Result<(), &'static str> {
        let (admitted, expected) = match self {
            InputField::Age => ((0.0..=130.0).contains(&value), "an age in [0, 130]"),
            InputField::Male | InputField::Diabetes | InputField::Family => {
                (value == 0.0 || value == 1.0, "0 or 1")
            }
            InputField::Smoking => ([0.0, 1.0, 2.0].contains(&value), "0, 1 or 2"),
            InputField::Bmi => (value > 0.0, "a positive BMI"),
            InputField::Sbp => ((40.0..=300.0).contains(&value), "a systolic pressure in [40, 300]"),
            InputField::HrvNow | InputField::Hrv30dAgo | InputField::HrvSd7d => (
                (0.0..=i32::MAX as f64).contains(&value),
                "a non-negative HRV reading",
            ),
            InputField::Ldl | InputField::Hdl | InputField::Tg | InputField::Crp => {
                (value >= 0.0, "a non-negative concentration")
            }
        };
        if value.is_finite() && admitted {
            Ok(())
        } else {
            Err(expected)
        }
    }

    /// Coercion used when a map entry does not name one
    pub fn natural_coercion(&self) -> Coercion {
        match self {
            InputField::Age | InputField::Sbp | InputField::HrvNow | InputField::Hrv30dAgo | InputField::HrvSd7d => {
                Coercion::Integer
            }
            InputField::Male => Coercion::Sex,
            InputField::Smoking => Coercion::Smoking,
            InputField::Diabetes | InputField::Family => Coercion::Flag,
            InputField::Bmi | InputField::Ldl | InputField::Hdl | InputField::Tg | InputField::Crp => {
                Coercion::Float
            }
        }
    }
}

/// How cell text becomes a numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Number truncated toward zero
    Integer,
    Float,
    /// Yes/no style flag, read as 0 or 1
    Flag,
    /// Sex, read as 1 for male and 0 for female
    Sex,
    /// Smoking status, read as 0/1/2
    Smoking,
}

/// What to do when a value is missing or unreadable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum Fallback {
    /// Abort the whole run
    Fail,
    /// Leave the row unscored
    SkipRow,
    /// Substitute this value and record a warning
    Default(f64),
    /// Treat as not measured (optional fields only)
    Absent,
}

/// Mapping entry for one canonical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Source column; `None` when the dataset has no such measurement
    pub column: Option<String>,
    pub coercion: Coercion,
    pub fallback: Fallback,
}

impl FieldSpec {
    pub fn column(column: &str, coercion: Coercion, fallback: Fallback) -> Self {
        Self {
            column: Some(column.to_string()),
            coercion,
            fallback,
        }
    }

    pub fn unmapped(coercion: Coercion) -> Self {
        Self {
            column: None,
            coercion,
            fallback: Fallback::Absent,
        }
    }
}

/// Ground-truth label column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub column: String,
    /// Values read as positive (case-insensitive)
    #[serde(default)]
    pub positive_values: Vec<String>,
    /// Values read as negative (case-insensitive)
    #[serde(default)]
    pub negative_values: Vec<String>,
    /// Numeric values at or above this are positive
    #[serde(default = "default_label_threshold")]
    pub threshold: f64,
}

fn default_label_threshold() -> f64 {
    1.0
}

impl LabelSpec {
    /// Read a label cell; `None` when it matches no rule
    pub fn read(&self, raw: &str) -> Option<bool> {
        let value = raw.trim();
        if is_missing(value) {
            return None;
        }
        if self.positive_values.iter().any(|p| p.eq_ignore_ascii_case(value)) {
            return Some(true);
        }
        if self.negative_values.iter().any(|n| n.eq_ignore_ascii_case(value)) {
            return Some(false);
        }
        parse_number(value).map(|v| v >= self.threshold)
    }
}

/// Complete column map from dataset columns to engine inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub fields: BTreeMap<InputField, FieldSpec>,
    #[serde(default)]
    pub label: Option<LabelSpec>,
}

impl Default for ColumnMap {
    /// Map for the CAIR-CVD export: no HRV layer, no CRP column, total
    /// cholesterol standing in for triglycerides.
    fn default() -> Self {
        use Coercion::*;
        use Fallback::*;

        let fields = BTreeMap::from([
            (InputField::Age, FieldSpec::column("Age", Integer, SkipRow)),
            (InputField::Male, FieldSpec::column("Sex", Sex, SkipRow)),
            (InputField::Smoking, FieldSpec::column("Smoking Status", Smoking, Default(0.0))),
            (InputField::Bmi, FieldSpec::column("BMI", Float, SkipRow)),
            (InputField::Sbp, FieldSpec::column("Systolic BP", Integer, SkipRow)),
            (InputField::Diabetes, FieldSpec::column("Diabetes Status", Flag, Default(0.0))),
            (
                InputField::Family,
                FieldSpec::column("Family History of CVD", Flag, Default(0.0)),
            ),
            (InputField::HrvNow, FieldSpec::unmapped(Integer)),
            (InputField::Hrv30dAgo, FieldSpec::unmapped(Integer)),
            (InputField::HrvSd7d, FieldSpec::unmapped(Integer)),
            (InputField::Ldl, FieldSpec::column("Estimated LDL (mg/dL)", Float, Absent)),
            (InputField::Hdl, FieldSpec::column("HDL (mg/dL)", Float, Absent)),
            (InputField::Tg, FieldSpec::column("Total Cholesterol (mg/dL)", Float, Absent)),
            (InputField::Crp, FieldSpec::unmapped(Float)),
        ]);

        Self {
            fields,
            label: Some(LabelSpec {
                column: "CVD Risk Level".to_string(),
                positive_values: vec!["High".to_string()],
                negative_values: vec![
                    "Low".to_string(),
                    "Medium".to_string(),
                    "Intermediate".to_string(),
                    "Intermediary".to_string(),
                ],
                threshold: 1.0,
            }),
        }
    }
}

impl ColumnMap {
    /// Load a column map from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let map: ColumnMap = serde_json::from_str(json)?;
        map.check()?;
        Ok(map)
    }

    /// Serialize the column map to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Spec for a field; fields absent from the table are unmapped
    pub fn spec(&self, field: InputField) -> FieldSpec {
        self.fields
            .get(&field)
            .cloned()
            .unwrap_or_else(|| FieldSpec::unmapped(field.natural_coercion()))
    }

    /// Reject maps that can never produce a complete input, and defaults
    /// outside their field's range
    pub fn check(&self) -> Result<(), MappingError> {
        for field in InputField::ALL {
            let spec = self.spec(field);
            match spec.fallback {
                Fallback::Absent if field.is_required() => {
                    return Err(MappingError::InvalidConfig(format!(
                        "required field {} cannot use the absent fallback",
                        field.as_str()
                    )));
                }
                Fallback::Default(value) => {
                    if let Err(expected) = field.check_value(value) {
                        return Err(MappingError::InvalidConfig(format!(
                            "default {value} for {} is not {expected}",
                            field.as_str()
                        )));
                    }
                }
                Fallback::Fail | Fallback::SkipRow if spec.column.is_none() => {
                    return Err(MappingError::UnmappedField(field.as_str().to_string()));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolve column names against a header row.
    ///
    /// A missing column is an error unless the field falls back to a default
    /// or to absent. A missing label column disables labels.
    pub fn bind(&self, headers: &[String]) -> Result<BoundColumnMap<'_>, MappingError> {
        self.check()?;

        let position = |column: &str| headers.iter().position(|h| h.trim() == column);
        let mut columns = BTreeMap::new();

        for field in InputField::ALL {
            let spec = self.spec(field);
            let index = match &spec.column {
                Some(column) => match position(column) {
                    Some(index) => Some(index),
                    None => match spec.fallback {
                        Fallback::Default(_) | Fallback::Absent => {
                            tracing::warn!(
                                field = field.as_str(),
                                column = column.as_str(),
                                "column not found, using fallback for every row"
                            );
                            None
                        }
                        Fallback::Fail | Fallback::SkipRow => {
                            return Err(MappingError::MissingColumn {
                                field: field.as_str().to_string(),
                                column: column.clone(),
                            });
                        }
                    },
                },
                None => None,
            };
            columns.insert(field, (spec, index));
        }

        let label = self.label.as_ref().and_then(|spec| match position(&spec.column) {
            Some(index) => Some((spec, index)),
            None => {
                tracing::warn!(column = spec.column.as_str(), "label column not found, metrics disabled");
                None
            }
        });

        Ok(BoundColumnMap { columns, label })
    }
}

/// Result of mapping one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Mapped(MappedRow),
    Skipped { reason: MappingError, label: Option<bool> },
}

/// A row ready for the engine
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub input: RiskInput,
    pub label: Option<bool>,
    /// Fallbacks applied while mapping
    pub warnings: Vec<String>,
}

/// Column map resolved against a concrete header row
#[derive(Debug, Clone)]
pub struct BoundColumnMap<'a> {
    columns: BTreeMap<InputField, (FieldSpec, Option<usize>)>,
    label: Option<(&'a LabelSpec, usize)>,
}

impl BoundColumnMap<'_> {
    pub fn has_label(&self) -> bool {
        self.label.is_some()
    }

    /// Map one row of cells.
    ///
    /// # Errors
    /// Only fields with the `fail` fallback produce an error.
    pub fn map_row<'c>(&self, cell: impl Fn(usize) -> Option<&'c str>) -> Result<RowOutcome, MappingError> {
        let label = self
            .label
            .and_then(|(spec, index)| cell(index).and_then(|raw| spec.read(raw)));

        let mut values = BTreeMap::new();
        let mut warnings = Vec::new();

        for (&field, (spec, index)) in &self.columns {
            let raw = index.and_then(&cell).map(str::trim).filter(|v| !is_missing(v));

            let failure = match raw {
                Some(text) => match coerce(field, spec.coercion, text) {
                    Ok((value, lossy)) => {
                        if let Some(note) = lossy {
                            warnings.push(note);
                        }
                        values.insert(field, value);
                        continue;
                    }
                    Err(e) => MappingError::Coercion(e),
                },
                None => match spec.fallback {
                    Fallback::Absent => continue,
                    _ if spec.column.is_none() => MappingError::UnmappedField(field.as_str().to_string()),
                    _ => MappingError::EmptyValue(field.as_str().to_string()),
                },
            };

            match spec.fallback {
                Fallback::Fail => return Err(failure),
                Fallback::SkipRow => return Ok(RowOutcome::Skipped { reason: failure, label }),
                Fallback::Default(value) => {
                    // An unmapped field silently takes its default
                    if spec.column.is_some() {
                        warnings.push(format!("{failure}; using default {value}"));
                    }
                    values.insert(field, value);
                }
                Fallback::Absent => {
                    if raw.is_some() {
                        warnings.push(format!("{failure}; treating as not measured"));
                    }
                }
            }
        }

        Ok(RowOutcome::Mapped(MappedRow {
            input: assemble(&values),
            label,
            warnings,
        }))
    }
}

/// Build an input from resolved values; unresolved optionals take engine defaults.
///
/// Every value has passed `InputField::check_value`, so the casts are exact.
fn assemble(values: &BTreeMap<InputField, f64>) -> RiskInput {
    let get = |field: InputField| values.get(&field).copied();
    let int = |field: InputField| get(field).map(|v| v as i32);

    let smoking = match get(InputField::Smoking).unwrap_or(0.0) as u8 {
        2 => SmokingStatus::Current,
        1 => SmokingStatus::Former,
        _ => SmokingStatus::Never,
    };

    let mut input = RiskInput::new(
        get(InputField::Age).unwrap_or(0.0).max(0.0) as u32,
        get(InputField::Male).unwrap_or(0.0) != 0.0,
        smoking,
        get(InputField::Bmi).unwrap_or(0.0),
        int(InputField::Sbp).unwrap_or(0),
    )
    .with_diabetes(get(InputField::Diabetes).unwrap_or(0.0) != 0.0)
    .with_family_history(get(InputField::Family).unwrap_or(0.0) != 0.0)
    .with_lipids(get(InputField::Ldl), get(InputField::Hdl), get(InputField::Tg));

    if let Some(now) = int(InputField::HrvNow) {
        input.hrv_now = now;
    }
    if let Some(ago) = int(InputField::Hrv30dAgo) {
        input.hrv_30d_ago = ago;
    }
    input.hrv_sd7d = int(InputField::HrvSd7d);
    input.crp = get(InputField::Crp);
    input
}

fn is_missing(value: &str) -> bool {
    value.is_empty()
        || ["na", "n/a", "nan", "null"]
            .iter()
            .any(|m| m.eq_ignore_ascii_case(value))
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert cell text to an in-range value, with a note when the conversion
/// was lossy
fn coerce(field: InputField, coercion: Coercion, text: &str) -> Result<(f64, Option<String>), CoercionError> {
    let error = |expected| CoercionError {
        field: field.as_str().to_string(),
        value: text.to_string(),
        expected,
    };

    let (value, note) = match coercion {
        Coercion::Float => (parse_number(text).ok_or_else(|| error("a number"))?, None),
        Coercion::Integer => (parse_number(text).ok_or_else(|| error("an integer"))?.trunc(), None),
        Coercion::Flag => (read_flag(text).ok_or_else(|| error("a yes/no flag"))?, None),
        Coercion::Sex => read_sex(text),
        Coercion::Smoking => read_smoking(text),
    };

    field.check_value(value).map_err(error)?;
    Ok((value, note))
}

fn read_flag(text: &str) -> Option<f64> {
    let lower = text.to_ascii_lowercase();
    match lower.as_str() {
        "1" | "true" | "yes" | "y" | "t" | "positive" => Some(1.0),
        "0" | "false" | "no" | "n" | "f" | "negative" => Some(0.0),
        _ => parse_number(text).map(|v| if v != 0.0 { 1.0 } else { 0.0 }),
    }
}

fn read_sex(text: &str) -> (f64, Option<String>) {
    if let Some(v) = parse_number(text) {
        return (if v != 0.0 { 1.0 } else { 0.0 }, None);
    }
    let lower = text.to_ascii_lowercase();
    if lower.starts_with('m') {
        (1.0, None)
    } else if lower.starts_with('f') || lower.starts_with('w') {
        (0.0, None)
    } else {
        (0.0, Some(format!("unrecognized sex {text:?}; read as female")))
    }
}

fn read_smoking(text: &str) -> (f64, Option<String>) {
    let lower = text.to_ascii_lowercase();
    match lower.as_str() {
        "0" | "none" | "no" | "never" | "non-smoker" => (0.0, None),
        "1" | "former" | "past" | "ex-smoker" => (1.0, None),
        "2" | "current" | "yes" | "daily" | "smoker" => (2.0, None),
        _ => (
            0.0,
            Some(format!("unrecognized smoking status {text:?}; read as never")),
        ),
    }
}
