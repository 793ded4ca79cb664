use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DragontailError;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z][0-9A-Za-z._-]*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = DragontailError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !VERSION_PATTERN.is_match(normalized) || normalized.contains("..") {
            return Err(DragontailError::InvalidVersion(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for Version {
    type Error = DragontailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolve,
    Download,
    Extract,
    Transform,
    Copy,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Resolve,
        Stage::Download,
        Stage::Extract,
        Stage::Transform,
        Stage::Copy,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Resolve => "Resolve",
            Stage::Download => "Download",
            Stage::Extract => "Extract",
            Stage::Transform => "Transform",
            Stage::Copy => "Copy",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Stage::Resolve => 0,
            Stage::Download => 1,
            Stage::Extract => 2,
            Stage::Transform => 3,
            Stage::Copy => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label().to_lowercase())
    }
}
