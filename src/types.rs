use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Appliance type that has no program list.
pub const FRIDGE_FREEZER: &str = "FridgeFreezer";

/// OAuth token pair as persisted by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    /// Both tokens present. Anything less counts as logged out.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    LoggedOut,
    Authorizing,
    Authorized,
    Refreshing,
}

/// Connection status reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    LoginRequired,
    Connected,
    Failed,
}

impl ConnectionStatus {
    pub fn code(&self) -> u16 {
        match self {
            ConnectionStatus::LoginRequired => 101,
            ConnectionStatus::Connected => 102,
            ConnectionStatus::Failed => 201,
        }
    }
}

/// A mirrored value as the host stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl SettingValue {
    /// `None` for JSON null. Arrays and objects are kept as their JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(SettingValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(SettingValue::Int(i)),
                None => n.as_f64().map(SettingValue::Float),
            },
            Value::String(s) => Some(SettingValue::String(s.clone())),
            other => Some(SettingValue::String(other.to_string())),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            SettingValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            SettingValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Int(i) => Some(*i as f64),
            SettingValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Int(i) => write!(f, "{i}"),
            SettingValue::Float(v) => write!(f, "{v}"),
            SettingValue::String(s) => f.write_str(s),
        }
    }
}

/// Selectable labels keyed by their raw vendor value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectableValueProfile {
    options: BTreeMap<i64, String>,
}

impl SelectableValueProfile {
    /// Later labels sharing a raw value replace earlier ones.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut options = BTreeMap::new();
        for (label, raw) in pairs {
            options.insert(raw, label.into());
        }
        Self { options }
    }

    /// Labels indexed by position, as used for program lists.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_pairs(labels.into_iter().zip(0..))
    }

    pub fn label(&self, raw: i64) -> Option<&str> {
        self.options.get(&raw).map(String::as_str)
    }

    pub fn raw(&self, label: &str) -> Option<i64> {
        self.options
            .iter()
            .find(|(_, l)| l.as_str() == label)
            .map(|(raw, _)| *raw)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueProfile {
    Selectable(SelectableValueProfile),
    /// Single-valued enumeration shown as plain text.
    PlainString,
}

/// A vendor `{key, value}` pair as it arrives from the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSetting {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl RawSetting {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A normalized setting: display key, display value, optional profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub key: String,
    pub value: Option<SettingValue>,
    pub profile: Option<ValueProfile>,
}

#[derive(Debug, Clone, Default)]
pub struct Appliance {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub appliance_type: String,
    pub connected: bool,
    pub settings: Vec<Setting>,
    /// Vendor keys of the available programs, in profile order.
    pub programs: Vec<String>,
}

impl Appliance {
    pub fn setting(&self, key: &str) -> Option<&Setting> {
        self.settings.iter().find(|s| s.key == key)
    }
}

/// Well-known mirrored settings the router reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKind {
    StartDevice,
    OperationState,
    Elapsed,
    Remaining,
    Progress,
    Power,
    PowerState,
    Program,
}

impl SettingKind {
    pub fn display_key(&self) -> &'static str {
        match self {
            SettingKind::StartDevice => "Start Device",
            SettingKind::OperationState => "Operation State",
            SettingKind::Elapsed => "Elapsed",
            SettingKind::Remaining => "Remaining",
            SettingKind::Progress => "Progress",
            SettingKind::Power => "Power",
            SettingKind::PowerState => "Power State",
            SettingKind::Program => "Program",
        }
    }
}

/// Operation State values used by the process callbacks.
pub const OPERATION_STATE_RUN: i64 = 3;
pub const OPERATION_STATE_FINISHED: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureTarget {
    Refrigerator,
    Freezer,
}

impl TemperatureTarget {
    pub fn setting_key(&self) -> &'static str {
        match self {
            TemperatureTarget::Refrigerator => {
                "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureRefrigerator"
            }
            TemperatureTarget::Freezer => {
                "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureFreezer"
            }
        }
    }
}

/// Boolean appliance settings the host can flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    SuperModeRefrigerator,
    SuperModeFreezer,
    BrillianceDry,
    VarioSpeedPlus,
    IntensivZone,
}

impl Toggle {
    pub fn setting_key(&self) -> &'static str {
        match self {
            Toggle::SuperModeRefrigerator => "Refrigeration.FridgeFreezer.Setting.SuperModeRefrigerator",
            Toggle::SuperModeFreezer => "Refrigeration.FridgeFreezer.Setting.SuperModeFreezer",
            Toggle::BrillianceDry => "Dishcare.Dishwasher.Option.BrillianceDry",
            Toggle::VarioSpeedPlus => "Dishcare.Dishwasher.Option.VarioSpeedPlus",
            Toggle::IntensivZone => "Dishcare.Dishwasher.Option.IntensivZone",
        }
    }
}

/// Commands issued by the host against one appliance.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Select a program by vendor key.
    SetProgram(String),
    /// Select a program by its index in the appliance's "Program" profile.
    SetProgramIndex(usize),
    SetOption { key: String, value: Value },
    /// Start (true) or stop (false) the selected program.
    StartStop(bool),
    SetTemperature { target: TemperatureTarget, celsius: f64 },
    SetToggle { toggle: Toggle, enabled: bool },
    /// Power state name such as "on", "off" or "standby".
    SetPower(String),
}

impl Command {
    /// Parse a host action and its argument, e.g. `("SetPowerState", "off")`.
    pub fn from_action(action: &str, value: &Value) -> Option<Self> {
        let toggle = |toggle| value.as_bool().map(|enabled| Command::SetToggle { toggle, enabled });
        let temperature = |target| {
            value
                .as_f64()
                .map(|celsius| Command::SetTemperature { target, celsius })
        };

        match action {
            "SetProgram" => match value {
                Value::String(key) => Some(Command::SetProgram(key.clone())),
                _ => value.as_u64().map(|i| Command::SetProgramIndex(i as usize)),
            },
            "SetOption" => {
                let key = value.get("key")?.as_str()?.to_string();
                let value = value.get("value")?.clone();
                Some(Command::SetOption { key, value })
            }
            "StartStop" => value.as_bool().map(Command::StartStop),
            "SetPower" | "SetPowerState" => value.as_str().map(|s| Command::SetPower(s.to_string())),
            "SetTemperatureRefrigerator" => temperature(TemperatureTarget::Refrigerator),
            "SetTemperatureFreezer" => temperature(TemperatureTarget::Freezer),
            "SetSuperModeRefrigerator" => toggle(Toggle::SuperModeRefrigerator),
            "SetSuperModeFreezer" => toggle(Toggle::SuperModeFreezer),
            "SetBrillianceDry" => toggle(Toggle::BrillianceDry),
            "SetVarioSpeedPlus" => toggle(Toggle::VarioSpeedPlus),
            "SetIntensivZone" => toggle(Toggle::IntensivZone),
            _ => None,
        }
    }
}

/// Lifecycle events pushed by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    Started,
    Finished,
    Aborted,
}

impl ProcessEvent {
    /// Recognize a vendor event `{key, value}`.
    pub fn from_vendor_key(key: &str, value: &Value) -> Option<Self> {
        match key {
            "BSH.Common.Event.ProgramFinished" => Some(ProcessEvent::Finished),
            "BSH.Common.Event.ProgramAborted" => Some(ProcessEvent::Aborted),
            "BSH.Common.Status.OperationState"
                if value.as_str() == Some("BSH.Common.EnumType.OperationState.Run") =>
            {
                Some(ProcessEvent::Started)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_pair_completeness() {
        assert!(!TokenPair::default().is_complete());
        assert!(!TokenPair::new("access", "").is_complete());
        assert!(TokenPair::new("access", "refresh").is_complete());
    }

    #[test]
    fn setting_value_from_json() {
        assert_eq!(SettingValue::from_json(&json!(true)), Some(SettingValue::Bool(true)));
        assert_eq!(SettingValue::from_json(&json!(42)), Some(SettingValue::Int(42)));
        assert_eq!(SettingValue::from_json(&json!(1.5)), Some(SettingValue::Float(1.5)));
        assert_eq!(
            SettingValue::from_json(&json!("x")),
            Some(SettingValue::String("x".into()))
        );
        assert_eq!(SettingValue::from_json(&Value::Null), None);
    }

    #[test]
    fn profile_lookup_both_ways() {
        let profile = SelectableValueProfile::from_labels(["Eco 50°", "Auto 2", "Quick 45°"]);
        assert_eq!(profile.len(), 3);
        assert_eq!(profile.label(1), Some("Auto 2"));
        assert_eq!(profile.raw("Quick 45°"), Some(2));
        assert_eq!(profile.raw("Missing"), None);
    }

    #[test]
    fn process_event_from_vendor_keys() {
        assert_eq!(
            ProcessEvent::from_vendor_key("BSH.Common.Event.ProgramFinished", &json!("Present")),
            Some(ProcessEvent::Finished)
        );
        assert_eq!(
            ProcessEvent::from_vendor_key(
                "BSH.Common.Status.OperationState",
                &json!("BSH.Common.EnumType.OperationState.Run")
            ),
            Some(ProcessEvent::Started)
        );
        assert_eq!(
            ProcessEvent::from_vendor_key(
                "BSH.Common.Status.OperationState",
                &json!("BSH.Common.EnumType.OperationState.Ready")
            ),
            None
        );
    }

    #[test]
    fn power_state_action_is_an_alias() {
        let expected = Some(Command::SetPower("off".into()));
        assert_eq!(Command::from_action("SetPower", &json!("off")), expected);
        assert_eq!(Command::from_action("SetPowerState", &json!("off")), expected);
        assert_eq!(Command::from_action("SetPower", &json!(1)), None);
    }

    #[test]
    fn program_action_by_key_or_index() {
        assert_eq!(
            Command::from_action("SetProgram", &json!("Dishcare.Dishwasher.Program.Eco50")),
            Some(Command::SetProgram("Dishcare.Dishwasher.Program.Eco50".into()))
        );
        assert_eq!(
            Command::from_action("SetProgram", &json!(2)),
            Some(Command::SetProgramIndex(2))
        );
        assert_eq!(
            Command::from_action("SetTemperatureFreezer", &json!(-20)),
            Some(Command::SetTemperature {
                target: TemperatureTarget::Freezer,
                celsius: -20.0
            })
        );
        assert_eq!(Command::from_action("Reboot", &json!(true)), None);
    }

    #[test]
    fn status_codes() {
        assert_eq!(ConnectionStatus::LoginRequired.code(), 101);
        assert_eq!(ConnectionStatus::Connected.code(), 102);
        assert_eq!(ConnectionStatus::Failed.code(), 201);
    }
}
