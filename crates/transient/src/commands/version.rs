//! Version command

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cli::VersionArgs;
use crate::output;

/// Build metadata baked in by the build script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("GIT_SHA").map(String::from),
            build_date: option_env!("BUILD_DATE").map(String::from),
            target: option_env!("TARGET").map(String::from),
        }
    }

    /// One-line summary, e.g. `transient 0.4.0 (abc1234)`
    pub fn summary(&self) -> String {
        match &self.commit {
            Some(commit) => format!("{} {} ({})", self.name, self.version, commit),
            None => format!("{} {}", self.name, self.version),
        }
    }
}

pub fn run(args: VersionArgs) -> Result<()> {
    let info = VersionInfo::current();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", info.summary());
    if let Some(date) = &info.build_date {
        output::kv("Build date", date);
    }
    if let Some(target) = &info.target {
        output::kv("Target", target);
    }

    Ok(())
}
