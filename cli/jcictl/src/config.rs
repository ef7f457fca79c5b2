//! Configuration from the environment.
//!
//! - `CDK_DEFAULT_ACCOUNT`, `CDK_DEFAULT_REGION`: deployment environment
//! - `JCI_OUTDIR`: assembly directory
//! - `JCI_CONTEXT_FILE`: cached lookups (availability zones)
//! - `JCI_SETTINGS_FILE`: stack settings
//! - `JCI_LOG_LEVEL`, `JCI_LOG_FORMAT`: logging, unless `RUST_LOG` is set

use std::path::PathBuf;

use jci_synth::Environment;

const DEFAULT_OUTDIR: &str = "cdk.out";
const DEFAULT_CONTEXT_FILE: &str = "cdk.context.json";
const DEFAULT_SETTINGS_FILE: &str = "jci.toml";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub env: Environment,
    pub outdir: PathBuf,
    pub context_file: PathBuf,
    pub settings_file: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let log_format = match var("JCI_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            env: Environment::from_lookup(&lookup),
            outdir: var("JCI_OUTDIR").unwrap_or_else(|| DEFAULT_OUTDIR.to_string()).into(),
            context_file: var("JCI_CONTEXT_FILE")
                .unwrap_or_else(|| DEFAULT_CONTEXT_FILE.to_string())
                .into(),
            settings_file: var("JCI_SETTINGS_FILE")
                .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string())
                .into(),
            log_level: var("JCI_LOG_LEVEL").unwrap_or_else(|| "warn".to_string()),
            log_format,
        }
    }
}
