//! Provenance tag of the stored auto location.
//!
//! Purely descriptive metadata: it records *why* the stored location has its
//! current value and is never used for control decisions, apart from one
//! exact-match check that avoids overwriting an existing GPS tag.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Base provenance of a stored location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// An acquisition has started and no fix has landed yet.
    UpdateStarted,
    /// Fix came from the precise (GPS-like) provider.
    Gps,
    /// Fix came from the coarse/network provider, with optional detail about
    /// which network observations contributed.
    Network { cells: bool, wifis: bool },
    /// The location could not be acquired.
    NotReachable,
}

/// Composable source status: a base kind, optionally combined with a
/// "taken from the last known fix" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStatus {
    pub kind: SourceKind,
    pub from_last_location: bool,
}

impl SourceStatus {
    pub fn update_started() -> Self {
        Self { kind: SourceKind::UpdateStarted, from_last_location: false }
    }

    pub fn gps() -> Self {
        Self { kind: SourceKind::Gps, from_last_location: false }
    }

    pub fn network() -> Self {
        Self { kind: SourceKind::Network { cells: false, wifis: false }, from_last_location: false }
    }

    pub fn network_with(cells: bool, wifis: bool) -> Self {
        Self { kind: SourceKind::Network { cells, wifis }, from_last_location: false }
    }

    pub fn not_reachable() -> Self {
        Self { kind: SourceKind::NotReachable, from_last_location: false }
    }

    /// Combine with the "from last known location" marker.
    pub fn with_last_location(mut self) -> Self {
        self.from_last_location = true;
        self
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SourceKind::UpdateStarted => f.write_str("update_started")?,
            SourceKind::Gps => f.write_str("gps")?,
            SourceKind::Network { cells, wifis } => {
                f.write_str("network")?;
                if cells {
                    f.write_str("+cells")?;
                }
                if wifis {
                    f.write_str("+wifis")?;
                }
            }
            SourceKind::NotReachable => f.write_str("not_reachable")?,
        }
        if self.from_last_location {
            f.write_str("+last")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized source status: {0}")]
pub struct ParseSourceStatusError(String);

impl FromStr for SourceStatus {
    type Err = ParseSourceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('+');
        let base = parts.next().unwrap_or_default();

        let mut cells = false;
        let mut wifis = false;
        let mut from_last_location = false;
        for part in parts {
            match part {
                "cells" => cells = true,
                "wifis" => wifis = true,
                "last" => from_last_location = true,
                _ => return Err(ParseSourceStatusError(s.to_string())),
            }
        }

        let kind = match base {
            "update_started" => SourceKind::UpdateStarted,
            "gps" => SourceKind::Gps,
            "network" => SourceKind::Network { cells, wifis },
            "not_reachable" => SourceKind::NotReachable,
            _ => return Err(ParseSourceStatusError(s.to_string())),
        };
        if (cells || wifis) && !matches!(kind, SourceKind::Network { .. }) {
            return Err(ParseSourceStatusError(s.to_string()));
        }

        Ok(Self { kind, from_last_location })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_display_round_trip() {
        let statuses = [
            SourceStatus::update_started(),
            SourceStatus::gps(),
            SourceStatus::gps().with_last_location(),
            SourceStatus::network(),
            SourceStatus::network_with(true, false),
            SourceStatus::network_with(false, true),
            SourceStatus::network_with(true, true),
            SourceStatus::network_with(true, true).with_last_location(),
            SourceStatus::not_reachable(),
        ];
        for status in statuses {
            let text = status.to_string();
            let parsed: SourceStatus = text.parse().unwrap();
            assert_eq!(parsed, status, "failed for {text}");
        }
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(SourceStatus::gps().to_string(), "gps");
        assert_eq!(
            SourceStatus::network_with(true, true).to_string(),
            "network+cells+wifis"
        );
        assert_eq!(
            SourceStatus::gps().with_last_location().to_string(),
            "gps+last"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<SourceStatus>().is_err());
        assert!("satellite".parse::<SourceStatus>().is_err());
        assert!("gps+bogus".parse::<SourceStatus>().is_err());
        // cells/wifis only make sense for network fixes
        assert!("gps+cells".parse::<SourceStatus>().is_err());
    }
}
