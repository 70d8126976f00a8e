//! Volume options offered once a video is staged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Volume level applied to the uploaded clip's audio before it is mixed with the mask audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeOption {
    Quiet,
    Half,
    ThreeQuarter,
    Full,
}

/// A selection token outside the fixed option set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown option token: {0:?}")]
pub struct UnknownOptionToken(pub String);

impl VolumeOption {
    /// All options, in presentation order.
    pub const ALL: [VolumeOption; 4] = [
        VolumeOption::Quiet,
        VolumeOption::Half,
        VolumeOption::ThreeQuarter,
        VolumeOption::Full,
    ];

    /// Parse a selection token (`"1"`..`"4"`).
    pub fn from_token(token: &str) -> Result<Self, UnknownOptionToken> {
        match token.trim() {
            "1" => Ok(VolumeOption::Quiet),
            "2" => Ok(VolumeOption::Half),
            "3" => Ok(VolumeOption::ThreeQuarter),
            "4" => Ok(VolumeOption::Full),
            other => Err(UnknownOptionToken(other.to_string())),
        }
    }

    /// Token carried by the selection button.
    pub fn token(&self) -> &'static str {
        match self {
            VolumeOption::Quiet => "1",
            VolumeOption::Half => "2",
            VolumeOption::ThreeQuarter => "3",
            VolumeOption::Full => "4",
        }
    }

    /// Linear gain multiplier.
    pub fn gain(&self) -> f32 {
        match self {
            VolumeOption::Quiet => 0.25,
            VolumeOption::Half => 0.5,
            VolumeOption::ThreeQuarter => 0.75,
            VolumeOption::Full => 1.0,
        }
    }

    /// Button label.
    pub fn label(&self) -> &'static str {
        match self {
            VolumeOption::Quiet => "25%",
            VolumeOption::Half => "50%",
            VolumeOption::ThreeQuarter => "75%",
            VolumeOption::Full => "100%",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeOption::Quiet => "quiet",
            VolumeOption::Half => "half",
            VolumeOption::ThreeQuarter => "three_quarter",
            VolumeOption::Full => "full",
        }
    }
}

impl fmt::Display for VolumeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VolumeOption {
    type Err = UnknownOptionToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s)
    }
}
