//! Capabilities the embedding hub provides: token persistence, localized
//! strings and mirrored variables.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::types::{Appliance, SettingKind, SettingValue, TokenPair};
use crate::Result;

/// Stable identifier of a mirrored host variable.
pub type VariableId = String;

pub trait TokenStore: Send {
    fn load(&self) -> TokenPair;
    fn save(&mut self, tokens: &TokenPair);
}

/// Shared in-memory store. Clones observe the same tokens.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<Mutex<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new(tokens: TokenPair) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(tokens)),
        }
    }

    pub fn tokens(&self) -> TokenPair {
        self.tokens.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> TokenPair {
        self.tokens()
    }

    fn save(&mut self, tokens: &TokenPair) {
        if let Ok(mut guard) = self.tokens.lock() {
            *guard = tokens.clone();
        }
    }
}

/// Persists tokens as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileTokenStore {
    path: PathBuf,
}

impl JsonFileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write(&self, tokens: &TokenPair) -> Result<()> {
        let json = serde_json::to_string_pretty(tokens)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl TokenStore for JsonFileTokenStore {
    fn load(&self) -> TokenPair {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn save(&mut self, tokens: &TokenPair) {
        if let Err(e) = self.write(tokens) {
            warn!(path = %self.path.display(), "failed to persist tokens: {e}");
        }
    }
}

pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Translation table; unknown strings pass through.
#[derive(Debug, Clone, Default)]
pub struct DictionaryTranslator {
    entries: HashMap<String, String>,
}

impl DictionaryTranslator {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Parse a flat JSON object of `source -> localized` strings.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }
}

impl Translator for DictionaryTranslator {
    fn translate(&self, text: &str) -> String {
        self.entries
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string())
    }
}

pub trait VariablePublisher: Send {
    fn value(&self, id: &VariableId) -> Option<SettingValue>;
    fn publish(&mut self, id: &VariableId, value: SettingValue);
}

/// Shared in-memory variable registry. Clones observe the same values.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    values: Arc<Mutex<HashMap<VariableId, SettingValue>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<SettingValue> {
        self.values.lock().ok().and_then(|v| v.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VariablePublisher for MemoryPublisher {
    fn value(&self, id: &VariableId) -> Option<SettingValue> {
        self.get(id)
    }

    fn publish(&mut self, id: &VariableId, value: SettingValue) {
        if let Ok(mut guard) = self.values.lock() {
            guard.insert(id.clone(), value);
        }
    }
}

pub fn variable_id(appliance_id: &str, display_key: &str) -> VariableId {
    format!("{appliance_id}_{display_key}")
}

/// Exact display key to variable handles for one appliance.
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    handles: HashMap<String, Vec<VariableId>>,
}

impl VariableMap {
    pub fn from_appliance(appliance: &Appliance) -> Self {
        let mut map = Self::default();
        for setting in &appliance.settings {
            map.insert(&setting.key, variable_id(&appliance.id, &setting.key));
        }
        map
    }

    pub fn insert(&mut self, display_key: &str, id: VariableId) {
        let ids = self.handles.entry(display_key.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn handles(&self, display_key: &str) -> &[VariableId] {
        self.handles
            .get(display_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn kind(&self, kind: SettingKind) -> &[VariableId] {
        self.handles(kind.display_key())
    }

    pub fn first(&self, kind: SettingKind) -> Option<&VariableId> {
        self.kind(kind).first()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Setting;
    use tempfile::NamedTempFile;

    fn setting(key: &str, value: SettingValue) -> Setting {
        Setting {
            key: key.to_string(),
            value: Some(value),
            profile: None,
        }
    }

    #[test]
    fn variable_map_dedupes_shared_keys() {
        let appliance = Appliance {
            id: "SIEMENS-1".into(),
            settings: vec![
                setting("Power", SettingValue::Bool(true)),
                setting("Operation State", SettingValue::Int(1)),
                setting("Power", SettingValue::Bool(false)),
            ],
            ..Default::default()
        };
        let map = VariableMap::from_appliance(&appliance);
        assert_eq!(map.kind(SettingKind::Power), ["SIEMENS-1_Power".to_string()]);
        assert_eq!(
            map.first(SettingKind::OperationState).map(String::as_str),
            Some("SIEMENS-1_Operation State")
        );
        assert!(map.kind(SettingKind::Progress).is_empty());
    }

    #[test]
    fn exact_keys_do_not_match_substrings() {
        let mut map = VariableMap::default();
        map.insert("Remaining Time Estimate", "x_Remaining Time Estimate".into());
        assert!(map.kind(SettingKind::Remaining).is_empty());
    }

    #[test]
    fn json_file_store_roundtrips_tokens() {
        let tmp = NamedTempFile::new().unwrap();
        let mut store = JsonFileTokenStore::new(tmp.path());
        store.save(&TokenPair::new("access", "refresh"));
        assert_eq!(store.load(), TokenPair::new("access", "refresh"));
    }

    #[test]
    fn json_file_store_missing_file_is_logged_out() {
        let store = JsonFileTokenStore::new("/nonexistent/dir/tokens.json");
        assert!(!store.load().is_complete());
    }

    #[test]
    fn dictionary_translator_passes_unknown_through() {
        let translator = DictionaryTranslator::from_json(r#"{"Run": "Läuft"}"#).unwrap();
        assert_eq!(translator.translate("Run"), "Läuft");
        assert_eq!(translator.translate("Ready"), "Ready");
    }
}
