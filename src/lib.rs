pub mod backfill;
pub mod battery;
pub mod config;
pub mod coverage;
pub mod error;
pub mod executor;
pub mod minimize;
pub mod output;
pub mod patch;
pub mod registry;
pub mod report;
pub mod stage;
pub mod state;

pub use battery::{Battery, BatteryKind};
pub use config::{EvalConfig, Mutator};
pub use error::EvalError;
