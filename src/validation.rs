//! Dataset validation runs
//!
//! Orchestrates a full scoring pass over a tabular dataset:
//! 1. ColumnMap - bind columns against the header row
//! 2. BoundColumnMap - map each row to a `RiskInput` (and label)
//! 3. Engine - evaluate each mapped row
//! 4. Metrics - AUC, confusion matrix, and risk summary over labeled rows

use crate::dataset::Dataset;
use crate::engine::{evaluate, DEFAULT_DECISION_THRESHOLD};
use crate::error::ComputeError;
use crate::mapping::{ColumnMap, RowOutcome};
use crate::metrics::{roc_auc, ConfusionMatrix, RiskSummary};
use crate::types::RiskOutput;
use crate::{FORMULA_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Scoring result for one dataset row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    /// Zero-based data row index
    pub index: usize,
    /// `None` when the row was skipped
    pub output: Option<RiskOutput>,
    pub label: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// Aggregate report for a validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub run_id: String,
    pub producer: String,
    pub formula_version: String,
    pub computed_at_utc: DateTime<Utc>,
    pub rows_total: usize,
    pub rows_scored: usize,
    pub rows_skipped: usize,
    /// Scored rows that also carry a label
    pub rows_labeled: usize,
    pub warnings_count: usize,
    /// Scored rows per phase label
    pub phase_counts: BTreeMap<String, usize>,
    pub summary: Option<RiskSummary>,
    pub threshold: f64,
    pub auc: Option<f64>,
    pub confusion: Option<ConfusionMatrix>,
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
}

/// Rows and report from one run
#[derive(Debug, Clone)]
pub struct ValidationRun {
    pub rows: Vec<ScoredRow>,
    pub report: ValidationReport,
}

impl ValidationRun {
    /// Risk per dataset row, `None` for skipped rows
    pub fn risk_column(&self) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.output.as_ref().map(|o| o.risk))
            .collect()
    }
}

/// Scores a dataset against a column map
#[derive(Debug, Clone)]
pub struct DatasetValidator {
    column_map: ColumnMap,
    threshold: f64,
}

impl Default for DatasetValidator {
    fn default() -> Self {
        Self::new(ColumnMap::default())
    }
}

impl DatasetValidator {
    pub fn new(column_map: ColumnMap) -> Self {
        Self {
            column_map,
            threshold: DEFAULT_DECISION_THRESHOLD,
        }
    }

    /// Decision threshold for the confusion matrix
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn column_map(&self) -> &ColumnMap {
        &self.column_map
    }

    /// Score every row of `dataset` and compute metrics.
    ///
    /// # Errors
    /// Fails on an unusable column map, a missing required column, or a row
    /// error under the `fail` fallback.
    pub fn run(&self, dataset: &Dataset) -> Result<ValidationRun, ComputeError> {
        if dataset.is_empty() {
            return Err(ComputeError::EmptyDataset);
        }

        let bound = self.column_map.bind(dataset.headers())?;
        let mut rows = Vec::with_capacity(dataset.len());

        for (index, row) in dataset.rows().iter().enumerate() {
            let outcome = bound
                .map_row(|i| row.cell(i))
                .map_err(|source| ComputeError::RowMapping { row: index, source })?;

            let scored = match outcome {
                RowOutcome::Mapped(mapped) => {
                    for warning in &mapped.warnings {
                        tracing::warn!(row = index, "{}", warning);
                    }
                    let output = evaluate(&mapped.input);
                    tracing::debug!(row = index, risk = output.risk, phase = %output.phase, "row scored");
                    ScoredRow {
                        index,
                        output: Some(output),
                        label: mapped.label,
                        warnings: mapped.warnings,
                        skip_reason: None,
                    }
                }
                RowOutcome::Skipped { reason, label } => {
                    tracing::warn!(row = index, reason = %reason, "row skipped");
                    ScoredRow {
                        index,
                        output: None,
                        label,
                        warnings: Vec::new(),
                        skip_reason: Some(reason.to_string()),
                    }
                }
            };
            rows.push(scored);
        }

        let report = self.build_report(&rows, dataset.len());
        tracing::info!(
            run_id = report.run_id.as_str(),
            scored = report.rows_scored,
            skipped = report.rows_skipped,
            auc = ?report.auc,
            "validation run complete"
        );

        Ok(ValidationRun { rows, report })
    }

    fn build_report(&self, rows: &[ScoredRow], rows_total: usize) -> ValidationReport {
        let scored: Vec<&RiskOutput> = rows.iter().filter_map(|r| r.output.as_ref()).collect();
        let scores: Vec<f64> = scored.iter().map(|o| o.risk).collect();

        let mut phase_counts = BTreeMap::new();
        for output in &scored {
            *phase_counts.entry(output.phase.to_string()).or_insert(0) += 1;
        }

        let (labeled_scores, labels): (Vec<f64>, Vec<bool>) = rows
            .iter()
            .filter_map(|r| Some((r.output.as_ref()?.risk, r.label?)))
            .unzip();

        let confusion = (!labels.is_empty())
            .then(|| ConfusionMatrix::at_threshold(&labeled_scores, &labels, self.threshold));

        ValidationReport {
            run_id: Uuid::new_v4().to_string(),
            producer: PRODUCER_NAME.to_string(),
            formula_version: FORMULA_VERSION.to_string(),
            computed_at_utc: Utc::now(),
            rows_total,
            rows_scored: scored.len(),
            rows_skipped: rows_total - scored.len(),
            rows_labeled: labels.len(),
            warnings_count: rows.iter().map(|r| r.warnings.len()).sum(),
            phase_counts,
            summary: RiskSummary::from_scores(&scores),
            threshold: self.threshold,
            auc: roc_auc(&labeled_scores, &labels),
            sensitivity: confusion.and_then(|c| c.sensitivity()),
            specificity: confusion.and_then(|c| c.specificity()),
            confusion,
        }
    }
}
