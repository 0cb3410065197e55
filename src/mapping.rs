//! Static registry of vendor keys: display names, enumerations, unit
//! conversions and alias flags, plus per-type default settings.

use serde_json::{json, Value};

use crate::types::{RawSetting, FRIDGE_FREEZER};

/// Local key for the synthesized start/stop switch.
pub const START_DEVICE_KEY: &str = "StartDevice";

pub const POWER_STATE_KEY: &str = "BSH.Common.Setting.PowerState";
pub const POWER_STATE_PREFIX: &str = "BSH.Common.EnumType.PowerState.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Seconds to minutes, always as a float.
    Minute,
    /// Seconds to minutes, integral when evenly divisible.
    SecondsToMinutes,
}

#[derive(Debug)]
pub struct EnumValue {
    pub key: &'static str,
    pub label: &'static str,
    pub raw: i64,
    /// Appliance types offering this value; `None` means all.
    pub availability: Option<&'static [&'static str]>,
}

impl EnumValue {
    pub fn is_available_for(&self, appliance_type: &str) -> bool {
        self.availability
            .is_none_or(|types| types.contains(&appliance_type))
    }
}

#[derive(Debug)]
pub struct MappingEntry {
    pub key: &'static str,
    pub name: &'static str,
    pub values: &'static [EnumValue],
    pub convert: Option<Conversion>,
    /// The value is itself a vendor key to be looked up.
    pub alias: bool,
}

impl MappingEntry {
    pub fn has_values(&self) -> bool {
        !self.values.is_empty()
    }
}

const fn named(key: &'static str, name: &'static str) -> MappingEntry {
    MappingEntry {
        key,
        name,
        values: &[],
        convert: None,
        alias: false,
    }
}

const fn enumerated(
    key: &'static str,
    name: &'static str,
    values: &'static [EnumValue],
) -> MappingEntry {
    MappingEntry {
        key,
        name,
        values,
        convert: None,
        alias: false,
    }
}

const fn converted(key: &'static str, name: &'static str, convert: Conversion) -> MappingEntry {
    MappingEntry {
        key,
        name,
        values: &[],
        convert: Some(convert),
        alias: false,
    }
}

const fn alias(key: &'static str, name: &'static str) -> MappingEntry {
    MappingEntry {
        key,
        name,
        values: &[],
        convert: None,
        alias: true,
    }
}

const fn value(key: &'static str, label: &'static str, raw: i64) -> EnumValue {
    EnumValue {
        key,
        label,
        raw,
        availability: None,
    }
}

const fn value_for(
    key: &'static str,
    label: &'static str,
    raw: i64,
    types: &'static [&'static str],
) -> EnumValue {
    EnumValue {
        key,
        label,
        raw,
        availability: Some(types),
    }
}

const STANDBY_TYPES: &[&str] = &["Oven", "CoffeeMaker", "Cooktop", "CleaningRobot", "Hob"];
const OFF_TYPES: &[&str] = &[
    "Dishwasher",
    "Washer",
    "Dryer",
    "WasherDryer",
    "Hood",
    "FridgeFreezer",
    "Refrigerator",
    "Freezer",
];
const LOCKING_DOOR_TYPES: &[&str] = &["Oven", "Washer", "WasherDryer", "Dryer"];

static MAPPINGS: &[MappingEntry] = &[
    named(START_DEVICE_KEY, "Start Device"),
    enumerated(
        POWER_STATE_KEY,
        "Power State",
        &[
            value("BSH.Common.EnumType.PowerState.On", "On", 1),
            value_for("BSH.Common.EnumType.PowerState.Off", "Off", 0, OFF_TYPES),
            value_for("BSH.Common.EnumType.PowerState.Standby", "Standby", 0, STANDBY_TYPES),
        ],
    ),
    enumerated(
        "BSH.Common.Status.OperationState",
        "Operation State",
        &[
            value("BSH.Common.EnumType.OperationState.Inactive", "Inactive", 0),
            value("BSH.Common.EnumType.OperationState.Ready", "Ready", 1),
            value("BSH.Common.EnumType.OperationState.DelayedStart", "Delayed Start", 2),
            value("BSH.Common.EnumType.OperationState.Run", "Run", 3),
            value("BSH.Common.EnumType.OperationState.Pause", "Pause", 4),
            value("BSH.Common.EnumType.OperationState.ActionRequired", "Action Required", 5),
            value("BSH.Common.EnumType.OperationState.Finished", "Finished", 6),
            value("BSH.Common.EnumType.OperationState.Error", "Error", 7),
            value("BSH.Common.EnumType.OperationState.Aborting", "Aborting", 8),
        ],
    ),
    enumerated(
        "BSH.Common.Status.DoorState",
        "Door",
        &[
            value("BSH.Common.EnumType.DoorState.Open", "Open", 1),
            value("BSH.Common.EnumType.DoorState.Closed", "Closed", 0),
            value_for("BSH.Common.EnumType.DoorState.Locked", "Locked", 2, LOCKING_DOOR_TYPES),
        ],
    ),
    enumerated(
        "BSH.Common.Setting.TemperatureUnit",
        "Temperature Unit",
        &[
            value("BSH.Common.EnumType.TemperatureUnit.Celsius", "Celsius", 0),
            value_for(
                "BSH.Common.EnumType.TemperatureUnit.Fahrenheit",
                "Fahrenheit",
                1,
                &["Oven"],
            ),
        ],
    ),
    named("BSH.Common.Status.RemoteControlStartAllowed", "Remote control start allowance"),
    named("BSH.Common.Status.RemoteControlActive", "Remote control activation"),
    named("BSH.Common.Status.LocalControlActive", "Local control"),
    named("BSH.Common.Setting.ChildLock", "Child Lock"),
    converted("BSH.Common.Option.ElapsedProgramTime", "Elapsed", Conversion::Minute),
    converted("BSH.Common.Option.RemainingProgramTime", "Remaining", Conversion::Minute),
    converted("BSH.Common.Option.StartInRelative", "Start in", Conversion::SecondsToMinutes),
    converted("BSH.Common.Option.Duration", "Duration", Conversion::SecondsToMinutes),
    named("BSH.Common.Option.ProgramProgress", "Progress"),
    alias("BSH.Common.Root.SelectedProgram", "Selected Program"),
    alias("BSH.Common.Root.ActiveProgram", "Active Program"),
    // Oven
    named("Cooking.Oven.Option.SetpointTemperature", "Target Temperature"),
    named("Cooking.Oven.Status.CurrentCavityTemperature", "Current cavity temperature change"),
    named("Cooking.Oven.Program.HeatingMode.HotAir", "Hot Air"),
    named("Cooking.Oven.Program.HeatingMode.TopBottomHeating", "Top/Bottom Heating"),
    named("Cooking.Oven.Program.HeatingMode.PizzaSetting", "Pizza Setting"),
    named("Cooking.Oven.Program.HeatingMode.PreHeating", "Pre-Heating"),
    // Dishwasher
    named("Dishcare.Dishwasher.Option.BrillianceDry", "Brilliance Dry"),
    named("Dishcare.Dishwasher.Option.VarioSpeedPlus", "VarioSpeed Plus"),
    named("Dishcare.Dishwasher.Option.IntensivZone", "Intensive Zone"),
    named("Dishcare.Dishwasher.Program.Auto2", "Auto 2"),
    named("Dishcare.Dishwasher.Program.Eco50", "Eco 50°"),
    named("Dishcare.Dishwasher.Program.Intensiv70", "Intensive 70°"),
    named("Dishcare.Dishwasher.Program.Quick45", "Quick 45°"),
    named("Dishcare.Dishwasher.Program.PreRinse", "Pre-Rinse"),
    // Coffee maker
    enumerated(
        "ConsumerProducts.CoffeeMaker.Option.BeanAmount",
        "Bean Amount",
        &[
            value("ConsumerProducts.CoffeeMaker.EnumType.BeanAmount.VeryMild", "Very Mild", 0),
            value("ConsumerProducts.CoffeeMaker.EnumType.BeanAmount.Mild", "Mild", 1),
            value("ConsumerProducts.CoffeeMaker.EnumType.BeanAmount.Normal", "Normal", 2),
            value("ConsumerProducts.CoffeeMaker.EnumType.BeanAmount.Strong", "Strong", 3),
            value("ConsumerProducts.CoffeeMaker.EnumType.BeanAmount.VeryStrong", "Very Strong", 4),
            value("ConsumerProducts.CoffeeMaker.EnumType.BeanAmount.DoubleShot", "Double Shot", 5),
        ],
    ),
    enumerated(
        "ConsumerProducts.CoffeeMaker.Option.CoffeeTemperature",
        "Coffee Temperature",
        &[
            value("ConsumerProducts.CoffeeMaker.EnumType.CoffeeTemperature.88C", "Normal", 0),
            value("ConsumerProducts.CoffeeMaker.EnumType.CoffeeTemperature.90C", "High", 1),
            value("ConsumerProducts.CoffeeMaker.EnumType.CoffeeTemperature.92C", "Very High", 2),
        ],
    ),
    named("ConsumerProducts.CoffeeMaker.Option.FillQuantity", "Fill Quantity"),
    named("ConsumerProducts.CoffeeMaker.Program.Beverage.Espresso", "Espresso"),
    named("ConsumerProducts.CoffeeMaker.Program.Beverage.Coffee", "Coffee"),
    named("ConsumerProducts.CoffeeMaker.Program.Beverage.Cappuccino", "Cappuccino"),
    named("ConsumerProducts.CoffeeMaker.Program.Beverage.LatteMacchiato", "Latte Macchiato"),
    // Laundry
    enumerated(
        "LaundryCare.Dryer.Option.DryingTarget",
        "Drying Target",
        &[
            value("LaundryCare.Dryer.EnumType.DryingTarget.IronDry", "Iron Dry", 0),
            value("LaundryCare.Dryer.EnumType.DryingTarget.CupboardDry", "Cupboard Dry", 1),
            value("LaundryCare.Dryer.EnumType.DryingTarget.CupboardDryPlus", "Cupboard Dry Plus", 2),
        ],
    ),
    named("LaundryCare.Washer.Program.Cotton", "Cotton"),
    named("LaundryCare.Washer.Program.EasyCare", "Easy Care"),
    named("LaundryCare.Washer.Program.Mix", "Mix"),
    named("LaundryCare.Washer.Program.DelicatesSilk", "Delicates/Silk"),
    named("LaundryCare.Washer.Program.Wool", "Wool"),
    named("LaundryCare.Dryer.Program.Cotton", "Cotton"),
    named("LaundryCare.Dryer.Program.Synthetic", "Synthetic"),
    named("LaundryCare.Dryer.Program.Mix", "Mix"),
    // Fridge / freezer
    named(
        "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureRefrigerator",
        "Target Temperature Refrigerator",
    ),
    named(
        "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureFreezer",
        "Target Temperature Freezer",
    ),
    named("Refrigeration.FridgeFreezer.Setting.SuperModeRefrigerator", "Super Mode Refrigerator"),
    named("Refrigeration.FridgeFreezer.Setting.SuperModeFreezer", "Super Mode Freezer"),
];

pub fn lookup(key: &str) -> Option<&'static MappingEntry> {
    MAPPINGS.iter().find(|m| m.key == key)
}

/// Bare name lookup for a vendor key.
pub fn display_name(key: &str) -> Option<&'static str> {
    lookup(key).map(|m| m.name)
}

/// Settings every appliance of this type is expected to carry, before the
/// live values are merged in.
pub fn default_settings(appliance_type: &str) -> Vec<RawSetting> {
    let power_off = if STANDBY_TYPES.contains(&appliance_type) {
        "BSH.Common.EnumType.PowerState.Standby"
    } else {
        "BSH.Common.EnumType.PowerState.Off"
    };

    let mut settings = vec![RawSetting::new(POWER_STATE_KEY, power_off)];

    let extra: Vec<(&str, Value)> = match appliance_type {
        FRIDGE_FREEZER => vec![
            (
                "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureRefrigerator",
                json!(4),
            ),
            (
                "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureFreezer",
                json!(-18),
            ),
            ("Refrigeration.FridgeFreezer.Setting.SuperModeRefrigerator", json!(false)),
            ("Refrigeration.FridgeFreezer.Setting.SuperModeFreezer", json!(false)),
        ],
        "Dishwasher" => vec![
            (START_DEVICE_KEY, json!(false)),
            ("Dishcare.Dishwasher.Option.BrillianceDry", json!(false)),
            ("Dishcare.Dishwasher.Option.VarioSpeedPlus", json!(false)),
            ("Dishcare.Dishwasher.Option.IntensivZone", json!(false)),
        ],
        _ => vec![(START_DEVICE_KEY, json!(false))],
    };

    settings.extend(
        extra
            .into_iter()
            .map(|(key, value)| RawSetting::new(key, value)),
    );
    settings
}
