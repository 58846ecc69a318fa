//! Graph algorithms and model analysis built on repeated evaluation.
pub mod scenario;
pub mod sensitivity;
pub mod topology;
pub mod volatility;

pub use scenario::run_scenarios;
pub use sensitivity::{
    analyze_sensitivity, detect_key_drivers, DriverScore, SensitivitySeries, SweepConfig,
    SweepPoint,
};
