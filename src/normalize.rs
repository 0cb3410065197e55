use std::sync::Arc;

use crate::host::{IdentityTranslator, Translator};
use crate::mapping::{self, Conversion, MappingEntry};
use crate::types::{RawSetting, SelectableValueProfile, Setting, SettingValue, ValueProfile};

/// Alias chains in vendor data are at most two keys deep.
const MAX_ALIAS_DEPTH: usize = 2;

const STANDBY_LABEL: &str = "Standby";
const POWER_KEY: &str = "Power";

/// Turns raw vendor settings into display settings using the mapping table.
#[derive(Clone)]
pub struct Normalizer {
    translator: Arc<dyn Translator>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(IdentityTranslator))
    }
}

impl Normalizer {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }

    pub fn translate(&self, text: &str) -> String {
        self.translator.translate(text)
    }

    /// Unknown keys pass through with their raw key and value.
    pub fn normalize(&self, appliance_type: &str, raw: &RawSetting) -> Setting {
        let mut setting = Setting {
            key: raw.key.clone(),
            value: SettingValue::from_json(&raw.value),
            profile: None,
        };

        if let Some(entry) = mapping::lookup(&raw.key) {
            setting.key = entry.name.to_string();

            if entry.has_values() {
                apply_values(entry, appliance_type, raw, &mut setting);
            }
            if let Some(conversion) = entry.convert {
                setting.value = setting.value.map(|v| convert(conversion, v));
            }
            if entry.alias
                && let Some(SettingValue::String(key)) = &setting.value
            {
                setting.value = Some(SettingValue::String(resolve_alias(key, 0)));
            }
        }

        if let Some(SettingValue::String(text)) = &setting.value {
            setting.value = Some(SettingValue::String(self.translate(text)));
        }
        setting
    }

    /// Localized display name of a program key.
    pub fn program_name(&self, program_key: &str) -> String {
        self.translate(mapping::display_name(program_key).unwrap_or(program_key))
    }
}

fn apply_values(entry: &MappingEntry, appliance_type: &str, raw: &RawSetting, setting: &mut Setting) {
    let raw_key = raw.value.as_str();
    let mut labels: Vec<(&str, i64)> = Vec::new();

    for value in entry.values {
        if value.is_available_for(appliance_type) {
            labels.push((value.label, value.raw));
        }
        if raw_key == Some(value.key) {
            setting.value = Some(SettingValue::Int(value.raw));
        }
    }

    let profile = SelectableValueProfile::from_pairs(labels.iter().copied());

    match labels.len() {
        2 => {
            if labels.iter().any(|(label, _)| *label == STANDBY_LABEL) {
                setting.key = POWER_KEY.to_string();
            }
            let on = setting.value.as_ref().and_then(SettingValue::as_i64) == Some(1);
            setting.value = Some(SettingValue::Bool(on));
            setting.profile = None;
        }
        1 => {
            if let Some(label) = setting
                .value
                .as_ref()
                .and_then(SettingValue::as_i64)
                .and_then(|raw| profile.label(raw))
            {
                setting.value = Some(SettingValue::String(label.to_string()));
            }
            setting.profile = Some(ValueProfile::PlainString);
        }
        _ => setting.profile = Some(ValueProfile::Selectable(profile)),
    }
}

fn convert(conversion: Conversion, value: SettingValue) -> SettingValue {
    match (conversion, value) {
        (Conversion::Minute, SettingValue::Int(secs)) => SettingValue::Float(secs as f64 / 60.0),
        (Conversion::Minute, SettingValue::Float(secs)) => SettingValue::Float(secs / 60.0),
        (Conversion::SecondsToMinutes, SettingValue::Int(secs)) if secs % 60 == 0 => {
            SettingValue::Int(secs / 60)
        }
        (Conversion::SecondsToMinutes, SettingValue::Int(secs)) => {
            SettingValue::Float(secs as f64 / 60.0)
        }
        (Conversion::SecondsToMinutes, SettingValue::Float(secs)) => SettingValue::Float(secs / 60.0),
        (_, other) => other,
    }
}

/// Bare key lookup, following names that are themselves keys.
fn resolve_alias(key: &str, depth: usize) -> String {
    match mapping::display_name(key) {
        Some(name) if depth < MAX_ALIAS_DEPTH && mapping::lookup(name).is_some() => {
            resolve_alias(name, depth + 1)
        }
        Some(name) => name.to_string(),
        None => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DictionaryTranslator;
    use serde_json::json;

    fn normalize(appliance_type: &str, key: &str, value: serde_json::Value) -> Setting {
        Normalizer::default().normalize(appliance_type, &RawSetting::new(key, value))
    }

    #[test]
    fn power_state_with_standby_collapses_to_power_bool() {
        let s = normalize(
            "Oven",
            "BSH.Common.Setting.PowerState",
            json!("BSH.Common.EnumType.PowerState.On"),
        );
        assert_eq!(s.key, "Power");
        assert_eq!(s.value, Some(SettingValue::Bool(true)));
        assert_eq!(s.profile, None);
    }

    #[test]
    fn power_state_without_standby_keeps_name() {
        let s = normalize(
            "Dishwasher",
            "BSH.Common.Setting.PowerState",
            json!("BSH.Common.EnumType.PowerState.Off"),
        );
        assert_eq!(s.key, "Power State");
        assert_eq!(s.value, Some(SettingValue::Bool(false)));
        assert_eq!(s.profile, None);
    }

    #[test]
    fn enumeration_yields_index_and_profile() {
        let s = normalize(
            "Dishwasher",
            "BSH.Common.Status.OperationState",
            json!("BSH.Common.EnumType.OperationState.Run"),
        );
        assert_eq!(s.key, "Operation State");
        assert_eq!(s.value, Some(SettingValue::Int(3)));
        match s.profile {
            Some(ValueProfile::Selectable(profile)) => {
                assert_eq!(profile.label(3), Some("Run"));
                assert_eq!(profile.raw("Finished"), Some(6));
            }
            other => panic!("expected selectable profile, got {other:?}"),
        }
    }

    #[test]
    fn single_label_becomes_localized_string() {
        let translator = DictionaryTranslator::from_json(r#"{"Celsius": "Grad Celsius"}"#).unwrap();
        let normalizer = Normalizer::new(Arc::new(translator));
        let s = normalizer.normalize(
            "Dishwasher",
            &RawSetting::new(
                "BSH.Common.Setting.TemperatureUnit",
                "BSH.Common.EnumType.TemperatureUnit.Celsius",
            ),
        );
        assert_eq!(s.key, "Temperature Unit");
        assert_eq!(s.value, Some(SettingValue::String("Grad Celsius".into())));
        assert_eq!(s.profile, Some(ValueProfile::PlainString));
    }

    #[test]
    fn availability_changes_label_count() {
        // Ovens also offer Fahrenheit, so the unit collapses to a boolean there.
        let s = normalize(
            "Oven",
            "BSH.Common.Setting.TemperatureUnit",
            json!("BSH.Common.EnumType.TemperatureUnit.Fahrenheit"),
        );
        assert_eq!(s.value, Some(SettingValue::Bool(true)));
        assert_eq!(s.profile, None);
    }

    #[test]
    fn unknown_key_passes_through() {
        let s = normalize("Washer", "Vendor.New.Field", json!(17));
        assert_eq!(s.key, "Vendor.New.Field");
        assert_eq!(s.value, Some(SettingValue::Int(17)));
        assert_eq!(s.profile, None);
    }

    #[test]
    fn minute_conversion_is_float() {
        let s = normalize("Dishwasher", "BSH.Common.Option.RemainingProgramTime", json!(5400));
        assert_eq!(s.key, "Remaining");
        assert_eq!(s.value, Some(SettingValue::Float(90.0)));
    }

    #[test]
    fn seconds_to_minutes_stays_integral_when_even() {
        let s = normalize("Oven", "BSH.Common.Option.Duration", json!(1800));
        assert_eq!(s.value, Some(SettingValue::Int(30)));
        let s = normalize("Oven", "BSH.Common.Option.Duration", json!(90));
        assert_eq!(s.value, Some(SettingValue::Float(1.5)));
    }

    #[test]
    fn alias_resolves_program_name() {
        let s = normalize(
            "Dishwasher",
            "BSH.Common.Root.SelectedProgram",
            json!("Dishcare.Dishwasher.Program.Eco50"),
        );
        assert_eq!(s.key, "Selected Program");
        assert_eq!(s.value, Some(SettingValue::String("Eco 50°".into())));
    }

    #[test]
    fn alias_with_unknown_program_keeps_key() {
        let s = normalize(
            "Dishwasher",
            "BSH.Common.Root.ActiveProgram",
            json!("Dishcare.Dishwasher.Program.Brand.New"),
        );
        assert_eq!(
            s.value,
            Some(SettingValue::String("Dishcare.Dishwasher.Program.Brand.New".into()))
        );
    }

    #[test]
    fn alias_depth_is_bounded() {
        assert_eq!(resolve_alias("BSH.Common.Setting.PowerState", 0), "Power State");
        assert_eq!(resolve_alias("no.such.key", 0), "no.such.key");
    }

    #[test]
    fn enumerated_values_round_trip_through_profile() {
        let entry = mapping::lookup("ConsumerProducts.CoffeeMaker.Option.BeanAmount").unwrap();
        for value in entry.values {
            let s = normalize("CoffeeMaker", entry.key, json!(value.key));
            let Some(ValueProfile::Selectable(profile)) = &s.profile else {
                panic!("expected profile for {}", value.key);
            };
            let raw = s.value.as_ref().and_then(SettingValue::as_i64).unwrap();
            assert_eq!(raw, value.raw);
            assert_eq!(profile.label(raw), Some(value.label));
        }
    }

    #[test]
    fn boolean_collapse_round_trips_on_value() {
        let on = normalize("Washer", "BSH.Common.Setting.PowerState", json!("BSH.Common.EnumType.PowerState.On"));
        let off = normalize("Washer", "BSH.Common.Setting.PowerState", json!("BSH.Common.EnumType.PowerState.Off"));
        assert_eq!(on.value, Some(SettingValue::Bool(true)));
        assert_eq!(off.value, Some(SettingValue::Bool(false)));
    }

    #[test]
    fn native_bool_passes_through_named_mapping() {
        let s = normalize("FridgeFreezer", "Refrigeration.FridgeFreezer.Setting.SuperModeFreezer", json!(true));
        assert_eq!(s.key, "Super Mode Freezer");
        assert_eq!(s.value, Some(SettingValue::Bool(true)));
    }
}
