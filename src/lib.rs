//! W-HEART - deterministic cardiovascular load and risk engine
//!
//! The engine maps a clinical input record to a bounded risk score through a
//! closed-form pipeline: load accumulation → critical overrides → fourth-power
//! normalization against a sex-dependent critical mass. There are no fitted
//! parameters.
//!
//! ## Modules
//!
//! - **Engine**: the pure `evaluate` function and its load terms
//! - **Validation**: CSV ingestion → column mapping → scoring → AUC and
//!   sensitivity/specificity against a ground-truth label

pub mod dataset;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod metrics;
pub mod scenarios;
pub mod types;
pub mod validation;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use engine::{evaluate, evaluate_batch};
pub use error::{CoercionError, ComputeError, MappingError};
pub use mapping::ColumnMap;
pub use types::{Phase, RiskInput, RiskOutput, SmokingStatus, Trigger};
pub use validation::{DatasetValidator, ValidationReport};

/// Formula version embedded in every result
pub const FORMULA_VERSION: &str = "v1.6";

/// Producer name for reports
pub const PRODUCER_NAME: &str = "w-heart";

/// Crate version
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
