use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::TokenPair;
use crate::Result;

/// Persisted module configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Host category the appliance variables are created under.
    #[serde(default)]
    pub category_id: i64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub simulator: bool,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// When set, tokens are read from and persisted to this file instead.
    #[serde(default)]
    pub token_file: Option<String>,
}

impl BridgeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn tokens(&self) -> TokenPair {
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}
