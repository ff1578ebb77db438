// ── Call-quality scoring types ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Voice codecs with known E-Model equipment impairment constants.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Codec {
    #[default]
    G711,
    G729,
    Opus,
    #[serde(rename = "g723.1")]
    #[strum(to_string = "g723.1", serialize = "g7231")]
    G7231,
    G722,
}

impl Codec {
    /// Equipment impairment factor `Ie`.
    pub fn ie(self) -> f64 {
        match self {
            Self::G711 | Self::G722 => 0.0,
            Self::G729 => 11.0,
            Self::Opus => 5.0,
            Self::G7231 => 15.0,
        }
    }

    /// Packet-loss robustness factor `Bpl`.
    pub fn bpl(self) -> f64 {
        match self {
            Self::G711 => 25.1,
            Self::G729 => 10.0,
            Self::Opus | Self::G722 => 20.0,
            Self::G7231 => 16.1,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Rating {
    Unusable,
    Bad,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Rating {
    pub fn from_mos(mos: f64) -> Self {
        if mos >= 4.3 {
            Self::Excellent
        } else if mos >= 4.0 {
            Self::Good
        } else if mos >= 3.6 {
            Self::Fair
        } else if mos >= 3.1 {
            Self::Poor
        } else if mos >= 2.6 {
            Self::Bad
        } else {
            Self::Unusable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    pub mos: f64,
    pub r_factor: f64,
    pub rating: Rating,
    pub impairments: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
}
