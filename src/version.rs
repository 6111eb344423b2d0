use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A `major.minor.patch` version parsed from tool output.
///
/// Ordering is numeric by major, then minor, then patch, which is what the
/// derived `Ord` gives us thanks to the field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("valid version regex"))
}

impl ToolVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Find the first `N.N.N` sequence in arbitrary command output.
    ///
    /// `git version 2.39.2.windows.1` yields 2.39.2 and
    /// `git-lfs/3.4.0 (GitHub; linux amd64; go 1.21.1)` yields 3.4.0.
    pub fn find(text: &str) -> Option<Self> {
        let caps = version_pattern().captures(text)?;
        let part = |idx: usize| caps.get(idx)?.as_str().parse::<u64>().ok();
        Some(Self::new(part(1)?, part(2)?, part(3)?))
    }

    pub fn satisfies(&self, minimum: &ToolVersion) -> bool {
        self >= minimum
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ToolVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let mut parts = trimmed.split('.');
        let mut next = |name: &str| -> Result<u64> {
            parts
                .next()
                .ok_or_else(|| anyhow!("version '{trimmed}' is missing its {name} component"))?
                .parse::<u64>()
                .map_err(|_| anyhow!("version '{trimmed}' has a non-numeric {name} component"))
        };

        let version = Self::new(next("major")?, next("minor")?, next("patch")?);
        if parts.next().is_some() {
            return Err(anyhow!("version '{trimmed}' has more than three components"));
        }
        Ok(version)
    }
}

impl TryFrom<String> for ToolVersion {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ToolVersion> for String {
    fn from(value: ToolVersion) -> Self {
        value.to_string()
    }
}
