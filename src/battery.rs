use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// One category of test execution strategy. The set is closed: result
/// files, record keys and suite files all use the stable names below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Battery {
    /// All generated inline tests (battery A in back-fill terms).
    InlineBaseline,
    /// The reduced-cost inline test set under evaluation (battery B).
    InlineCandidate,
    /// Developer-written unit test suite.
    DeveloperUnit,
    RandoopGenerated,
    EvosuiteGenerated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryKind {
    /// One generated test file per (statement, line); kill decided by
    /// process exit status.
    Inline,
    /// A whole suite run before and after mutation; kill decided by an
    /// increase in the failed-test count.
    Unit,
}

impl Battery {
    pub const ALL: [Battery; 5] = [
        Battery::InlineBaseline,
        Battery::InlineCandidate,
        Battery::DeveloperUnit,
        Battery::RandoopGenerated,
        Battery::EvosuiteGenerated,
    ];

    pub const INLINE: [Battery; 2] = [Battery::InlineBaseline, Battery::InlineCandidate];

    pub fn kind(self) -> BatteryKind {
        match self {
            Battery::InlineBaseline | Battery::InlineCandidate => BatteryKind::Inline,
            Battery::DeveloperUnit | Battery::RandoopGenerated | Battery::EvosuiteGenerated => {
                BatteryKind::Unit
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Battery::InlineBaseline => "inline-baseline",
            Battery::InlineCandidate => "inline-candidate",
            Battery::DeveloperUnit => "developer-unit",
            Battery::RandoopGenerated => "randoop-generated",
            Battery::EvosuiteGenerated => "evosuite-generated",
        }
    }
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Battery {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline-baseline" => Ok(Battery::InlineBaseline),
            "inline-candidate" => Ok(Battery::InlineCandidate),
            "developer-unit" => Ok(Battery::DeveloperUnit),
            "randoop-generated" => Ok(Battery::RandoopGenerated),
            "evosuite-generated" => Ok(Battery::EvosuiteGenerated),
            other => Err(EvalError::UnknownBattery(other.to_string())),
        }
    }
}
