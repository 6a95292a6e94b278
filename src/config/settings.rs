//! # Host Settings
//!
//! The only persisted state of chwire: the address of the ClickHouse HTTP
//! endpoint a transport collaborator fetches response bodies from. It is
//! stored as JSON next to the executable:
//!
//! ```text
//! {
//!   "host": "http://localhost:8123"
//! }
//! ```
//!
//! The `CHWIRE_CONFIG` environment variable overrides the file location.
//! Decoding never reads these settings.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::decoder::WireFormat;

const CONFIG_FILE_NAME: &str = "chwire.json";
const CONFIG_ENV_VAR: &str = "CHWIRE_CONFIG";
pub const DEFAULT_HOST: &str = "http://localhost:8123";

/// Query parameters that unlock the experimental types on the server.
pub const EXPERIMENTAL_TYPE_SETTINGS: &[(&str, &str)] = &[
    ("allow_experimental_variant_type", "1"),
    ("allow_experimental_dynamic_type", "1"),
    ("allow_experimental_json_type", "1"),
    ("allow_experimental_qbit_type", "1"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
        }
    }
}

impl HostSettings {
    /// Loads settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read settings from {:?}", path))?;
        serde_json::from_str(&text)
            .wrap_err_with(|| format!("failed to parse settings in {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).wrap_err("failed to serialize settings")?;
        fs::write(path, text).wrap_err_with(|| format!("failed to write settings to {:?}", path))
    }
}

/// Resolves the settings file: `CHWIRE_CONFIG`, else beside the executable.
pub fn settings_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var(CONFIG_ENV_VAR) {
        if custom.is_empty() {
            return None;
        }
        return Some(PathBuf::from(custom));
    }

    env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name(CONFIG_FILE_NAME))
}

/// Builds the HTTP request URL whose response body is a `format` stream.
pub fn request_url(host: &str, query: &str, format: WireFormat) -> Result<Url> {
    let mut url = Url::parse(host).wrap_err_with(|| format!("invalid host address '{}'", host))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("default_format", format.name());
        for (key, value) in EXPERIMENTAL_TYPE_SETTINGS {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("query", query);
    }
    Ok(url)
}
