// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loading `AppConfig` records from a TOML document.
//!
//! Schema validation and file-discovery are out of scope (§1); this module
//! does the minimum necessary to hand the core a `Vec<AppConfig>` or reject
//! it with the "Configuration" error taxonomy entry (§7).

use fw_core::error::ConfigError;
use fw_core::AppConfig;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, serde::Deserialize)]
struct AppsDocument {
    #[serde(default)]
    app: Vec<AppConfig>,
}

/// Errors from loading the apps document, wrapping the pure-validation
/// [`ConfigError`] taxonomy entry (§7) with this module's I/O and parse
/// concerns.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Validation(#[from] ConfigError),
}

/// Parse a TOML document of the form `[[app]] name = "..." ...` into a
/// name-keyed map, rejecting duplicate names.
pub fn parse_apps(toml_text: &str) -> Result<HashMap<String, AppConfig>, ConfigLoadError> {
    let doc: AppsDocument = toml::from_str(toml_text)?;
    let mut apps = HashMap::with_capacity(doc.app.len());
    for app in doc.app {
        if apps.insert(app.name.clone(), app.clone()).is_some() {
            return Err(ConfigError::DuplicateApp(app.name).into());
        }
    }
    Ok(apps)
}

/// Load and parse the apps document from a file path.
pub fn load_apps(path: &Path) -> Result<HashMap<String, AppConfig>, ConfigLoadError> {
    let text = std::fs::read_to_string(path)?;
    parse_apps(&text)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
