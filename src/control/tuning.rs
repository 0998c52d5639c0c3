//! Classical tuning rules for relay-feedback autotuning.
//!
//! Every rule is a triple of divisors applied to the ultimate gain `Ku`
//! and the ultimate period `Pu`:
//!
//! ```text
//! kp = Ku / d0
//! ki = kp / (Pu / d1)
//! kd = kp * (Pu / d2)
//! ```

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Gains produced by the autotuner (and accepted by the regulator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

/// Named tuning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TuningRule {
    ZieglerNichols,
    TyreusLuyben,
    CianconeMarlin,
    PessenIntegral,
    SomeOvershoot,
    NoOvershoot,
    Brewing,
}

impl TuningRule {
    pub const ALL: [TuningRule; 7] = [
        Self::ZieglerNichols,
        Self::TyreusLuyben,
        Self::CianconeMarlin,
        Self::PessenIntegral,
        Self::SomeOvershoot,
        Self::NoOvershoot,
        Self::Brewing,
    ];

    /// `[kp, ki, kd]` divisors.
    const fn divisors(self) -> [f32; 3] {
        match self {
            Self::ZieglerNichols => [34.0, 40.0, 160.0],
            Self::TyreusLuyben => [44.0, 9.0, 126.0],
            Self::CianconeMarlin => [66.0, 88.0, 162.0],
            Self::PessenIntegral => [28.0, 50.0, 133.0],
            Self::SomeOvershoot => [60.0, 40.0, 60.0],
            Self::NoOvershoot => [100.0, 40.0, 60.0],
            Self::Brewing => [2.5, 6.0, 380.0],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ZieglerNichols => "ziegler-nichols",
            Self::TyreusLuyben => "tyreus-luyben",
            Self::CianconeMarlin => "ciancone-marlin",
            Self::PessenIntegral => "pessen-integral",
            Self::SomeOvershoot => "some-overshoot",
            Self::NoOvershoot => "no-overshoot",
            Self::Brewing => "brewing",
        }
    }

    /// Derive gains from the ultimate gain and ultimate period (seconds).
    pub fn gains(self, ku: f32, pu_secs: f32) -> PidGains {
        let [d0, d1, d2] = self.divisors();
        let kp = ku / d0;
        let ki = kp / (pu_secs / d1);
        let kd = kp * (pu_secs / d2);
        PidGains { kp, ki, kd }
    }
}

impl fmt::Display for TuningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a rule name is not in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownRule;

impl FromStr for TuningRule {
    type Err = UnknownRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rule| rule.name() == s)
            .ok_or(UnknownRule)
    }
}
