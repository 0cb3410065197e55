use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::HomeConnectClient;
use crate::mapping;
use crate::normalize::Normalizer;
use crate::protocol;
use crate::types::{
    Appliance, RawSetting, SelectableValueProfile, Setting, SettingKind, SettingValue,
    ValueProfile, FRIDGE_FREEZER,
};

#[derive(Debug, Deserialize)]
struct ApplianceInfo {
    #[serde(rename = "haId")]
    ha_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    brand: String,
    #[serde(rename = "type", default)]
    appliance_type: String,
    #[serde(default)]
    connected: bool,
}

/// Defaults overridden by live entries sharing a key, in default order,
/// followed by live-only entries.
pub fn merge_settings(defaults: Vec<RawSetting>, live: Vec<RawSetting>) -> Vec<RawSetting> {
    let mut remaining = live;
    let mut merged = Vec::with_capacity(defaults.len() + remaining.len());

    for default in defaults {
        match remaining.iter().position(|l| l.key == default.key) {
            Some(idx) => merged.push(remaining.remove(idx)),
            None => merged.push(default),
        }
    }
    merged.extend(remaining);
    merged
}

/// The synthesized "Program" setting: index of the selected program among
/// the available ones, or -1.
pub fn program_setting(normalizer: &Normalizer, programs: &[String], selected: Option<&str>) -> Setting {
    let current = selected
        .and_then(|key| programs.iter().position(|p| p == key))
        .map(|idx| idx as i64)
        .unwrap_or(-1);
    let names = programs.iter().map(|key| normalizer.program_name(key));

    Setting {
        key: SettingKind::Program.display_key().to_string(),
        value: Some(SettingValue::Int(current)),
        profile: Some(ValueProfile::Selectable(SelectableValueProfile::from_labels(names))),
    }
}

/// Entries of a `[{key, value}, ...]` array; malformed entries are skipped.
pub(crate) fn raw_settings(value: Value) -> Vec<RawSetting> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Walks the vendor API and assembles an `Appliance` per discovered device.
pub struct SyncEngine<'a> {
    client: &'a mut HomeConnectClient,
    normalizer: &'a Normalizer,
}

impl<'a> SyncEngine<'a> {
    pub fn new(client: &'a mut HomeConnectClient, normalizer: &'a Normalizer) -> Self {
        Self { client, normalizer }
    }

    /// A failed appliance listing yields an empty result.
    pub async fn discover_devices(&mut self) -> Vec<Appliance> {
        let listing = match self.client.get(&protocol::appliances()).await {
            Ok(v) => v,
            Err(e) => {
                warn!("appliance listing failed: {e}");
                return Vec::new();
            }
        };

        let infos: Vec<ApplianceInfo> = match listing {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        };

        let mut appliances = Vec::with_capacity(infos.len());
        for info in infos {
            appliances.push(self.assemble(info).await);
        }
        debug!(count = appliances.len(), "discovery complete");
        appliances
    }

    async fn assemble(&mut self, info: ApplianceInfo) -> Appliance {
        let ha_id = info.ha_id;
        let appliance_type = info.appliance_type;

        let defaults = mapping::default_settings(&appliance_type);
        let merged = match self.client.get(&protocol::settings(&ha_id)).await {
            Ok(live) => merge_settings(defaults, raw_settings(live)),
            Err(e) => {
                debug!(ha_id = %ha_id, "settings unavailable, using defaults: {e}");
                defaults
            }
        };

        let mut settings: Vec<Setting> = merged
            .iter()
            .map(|raw| self.normalizer.normalize(&appliance_type, raw))
            .collect();

        match self.client.get(&protocol::status(&ha_id)).await {
            Ok(status) => settings.extend(
                raw_settings(status)
                    .iter()
                    .map(|raw| self.normalizer.normalize(&appliance_type, raw)),
            ),
            Err(e) => debug!(ha_id = %ha_id, "status unavailable: {e}"),
        }

        let mut programs = Vec::new();
        if appliance_type != FRIDGE_FREEZER
            && let Some(listing) = self.programs(&ha_id).await
        {
            settings.push(listing.setting);
            settings.extend(
                listing
                    .options
                    .iter()
                    .map(|raw| self.normalizer.normalize(&appliance_type, raw)),
            );
            programs = listing.keys;
        }

        Appliance {
            id: ha_id,
            name: info.name,
            brand: info.brand,
            appliance_type,
            connected: info.connected,
            settings,
            programs,
        }
    }

    async fn programs(&mut self, ha_id: &str) -> Option<ProgramListing> {
        let available = match self.client.get(&protocol::programs_available(ha_id)).await {
            Ok(v) => v,
            Err(e) => {
                debug!(ha_id, "program list unavailable: {e}");
                return None;
            }
        };
        let keys: Vec<String> = raw_settings_keys(&available);

        let mut selected = self
            .client
            .get(&protocol::programs_selected(ha_id))
            .await
            .ok();
        let selected_key = selected.as_ref().and_then(selected_program_key);
        let options = selected
            .as_mut()
            .and_then(|v| v.pointer_mut("/data/options"))
            .map(Value::take)
            .map(raw_settings)
            .unwrap_or_default();

        Some(ProgramListing {
            setting: program_setting(self.normalizer, &keys, selected_key.as_deref()),
            keys,
            options,
        })
    }
}

struct ProgramListing {
    setting: Setting,
    keys: Vec<String>,
    /// Options of the selected program.
    options: Vec<RawSetting>,
}

fn raw_settings_keys(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|p| p.get("key").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Key of a `programs/selected` (or `programs/active`) response.
pub(crate) fn selected_program_key(response: &Value) -> Option<String> {
    response
        .pointer("/data/key")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}
