//! Build metadata surfaced read-only to the host (about dialogs, footers).
//!
//! The commit and build time are stamped at compile time through the
//! `R2BOX_COMMIT_HASH` and `R2BOX_BUILD_TIME` environment variables.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

const DEV_COMMIT: &str = "dev";
const UNKNOWN_BUILD_TIME: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub commit_hash: String,
    /// RFC 3339 timestamp, or "unknown".
    pub build_time: String,
}

impl BuildInfo {
    /// Metadata of the running binary.
    pub fn current() -> Self {
        Self::new(
            env!("CARGO_PKG_VERSION"),
            option_env!("R2BOX_COMMIT_HASH").unwrap_or(DEV_COMMIT),
            option_env!("R2BOX_BUILD_TIME").unwrap_or(UNKNOWN_BUILD_TIME),
        )
    }

    pub fn new(
        version: impl Into<String>,
        commit_hash: impl Into<String>,
        build_time: impl Into<String>,
    ) -> Self {
        let version = version.into();
        let commit_hash = commit_hash.into();
        Self {
            version: if version.is_empty() { "0.0.0".to_string() } else { version },
            commit_hash: if commit_hash.is_empty() { DEV_COMMIT.to_string() } else { commit_hash },
            build_time: build_time.into(),
        }
    }

    pub fn is_dev_build(&self) -> bool {
        self.commit_hash == DEV_COMMIT
    }

    /// `v1.2.0`, or `v1.2.0-dev` when no commit was stamped.
    pub fn display_version(&self) -> String {
        if self.is_dev_build() {
            format!("v{}-dev", self.version)
        } else {
            format!("v{}", self.version)
        }
    }

    /// `v1.2.0 (a1b2c3d)`
    pub fn full_version(&self) -> String {
        format!("v{} ({})", self.version, self.commit_hash)
    }

    /// Build time in local `YYYY/MM/DD HH:MM`, or the raw value when it
    /// does not parse.
    pub fn formatted_build_time(&self) -> String {
        match DateTime::parse_from_rfc3339(&self.build_time) {
            Ok(parsed) => parsed
                .with_timezone(&Local)
                .format("%Y/%m/%d %H:%M")
                .to_string(),
            Err(_) => self.build_time.clone(),
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}
