use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::HomeConnectClient;
use crate::host::{VariableMap, VariablePublisher};
use crate::mapping::POWER_STATE_KEY;
use crate::normalize::Normalizer;
use crate::protocol::{self, power_state_value};
use crate::sync::{raw_settings, selected_program_key};
use crate::types::{
    Appliance, Setting, SettingKind, SettingValue, TemperatureTarget, Toggle,
    OPERATION_STATE_FINISHED, OPERATION_STATE_RUN,
};
use crate::{Error, Result};

pub const SELECT_PROGRAM_FIRST: &str = "Please select a program first.";

const TEMPERATURE_UNIT: &str = "°C";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramSlot {
    Selected,
    Active,
}

/// Translates host commands and vendor lifecycle events for one appliance
/// into API calls and mirrored-value updates.
pub struct Router<'a> {
    client: &'a mut HomeConnectClient,
    normalizer: &'a Normalizer,
    publisher: &'a mut dyn VariablePublisher,
    variables: &'a VariableMap,
    appliance: &'a Appliance,
}

impl<'a> Router<'a> {
    pub fn new(
        client: &'a mut HomeConnectClient,
        normalizer: &'a Normalizer,
        publisher: &'a mut dyn VariablePublisher,
        variables: &'a VariableMap,
        appliance: &'a Appliance,
    ) -> Self {
        Self {
            client,
            normalizer,
            publisher,
            variables,
            appliance,
        }
    }

    fn id(&self) -> &'a str {
        &self.appliance.id
    }

    // -- Commands --

    /// Select a program, then mirror the options of the new selection.
    pub async fn set_program(&mut self, program_key: &str) -> Result<()> {
        let ha_id = self.id();
        let data = json!({ "key": program_key });
        self.client.log_command("set_program", ha_id, &data);
        self.client
            .put(&protocol::programs_selected(ha_id), data)
            .await?;

        if let Some(index) = self.appliance.programs.iter().position(|p| p == program_key) {
            self.publish_kind(SettingKind::Program, SettingValue::Int(index as i64));
        }
        if let Err(e) = self.check_options(ProgramSlot::Selected).await {
            warn!(ha_id, "option read-back failed: {e}");
        }
        Ok(())
    }

    /// Select the program at `index` of the appliance's available programs.
    pub async fn set_program_index(&mut self, index: usize) -> Result<()> {
        let appliance = self.appliance;
        let key = appliance
            .programs
            .get(index)
            .ok_or_else(|| Error::Protocol(format!("no program at index {index}")))?;
        self.set_program(key).await
    }

    /// Change an option of the running program, then mirror active options.
    pub async fn set_option(&mut self, key: &str, value: Value) -> Result<()> {
        let ha_id = self.id();
        let data = json!({ "key": key, "value": value });
        self.client.log_command("set_option", ha_id, &data);
        self.client
            .put(&protocol::active_option(ha_id, key), data)
            .await?;

        if let Err(e) = self.check_options(ProgramSlot::Active).await {
            warn!(ha_id, "option read-back failed: {e}");
        }
        Ok(())
    }

    /// Start or stop the currently selected program.
    pub async fn start_stop(&mut self, start: bool) -> Result<()> {
        let ha_id = self.id();
        let selected = self
            .client
            .get(&protocol::programs_selected(ha_id))
            .await
            .map_err(|e| {
                if !means_no_selection(&e) {
                    return e;
                }
                debug!(ha_id, "no selected program: {e}");
                Error::Precondition(SELECT_PROGRAM_FIRST.to_string())
            })?;
        if selected_program_key(&selected).is_none() {
            return Err(Error::Precondition(SELECT_PROGRAM_FIRST.to_string()));
        }

        let program = selected.get("data").cloned().unwrap_or(Value::Null);
        let method = if start { Method::PUT } else { Method::DELETE };
        self.client
            .log_command(if start { "start" } else { "stop" }, ha_id, &program);
        self.client
            .call(&protocol::programs_active(ha_id), Some(program), Some(method))
            .await?;

        self.publish_kind(SettingKind::StartDevice, SettingValue::Bool(start));
        Ok(())
    }

    pub async fn set_temperature(&mut self, target: TemperatureTarget, celsius: f64) -> Result<()> {
        let key = target.setting_key();
        let value = if celsius.fract() == 0.0 {
            json!(celsius as i64)
        } else {
            json!(celsius)
        };
        self.put_setting(key, json!({ "key": key, "value": value, "unit": TEMPERATURE_UNIT }))
            .await
    }

    pub async fn set_toggle(&mut self, toggle: Toggle, enabled: bool) -> Result<()> {
        let key = toggle.setting_key();
        self.put_setting(key, json!({ "key": key, "value": enabled }))
            .await
    }

    /// `state` is a power state name in any case, e.g. "on" or "STANDBY".
    pub async fn set_power(&mut self, state: &str) -> Result<()> {
        let value = power_state_value(state);
        self.put_setting(POWER_STATE_KEY, json!({ "key": POWER_STATE_KEY, "value": value }))
            .await
    }

    async fn put_setting(&mut self, key: &str, data: Value) -> Result<()> {
        let ha_id = self.id();
        self.client.log_command("set_setting", ha_id, &data);
        self.client
            .put(&protocol::setting(ha_id, key), data)
            .await?;
        Ok(())
    }

    // -- Read-backs --

    /// Re-read the appliance status and mirror every entry.
    pub async fn check_status(&mut self) -> Result<()> {
        let ha_id = self.id();
        let status = self.client.get(&protocol::status(ha_id)).await?;
        for raw in raw_settings(status) {
            let setting = self.normalizer.normalize(&self.appliance.appliance_type, &raw);
            self.publish(&setting);
        }
        Ok(())
    }

    /// Re-read the options of the selected or active program.
    pub async fn check_options(&mut self, slot: ProgramSlot) -> Result<()> {
        let ha_id = self.id();
        let resource = match slot {
            ProgramSlot::Selected => protocol::programs_selected(ha_id),
            ProgramSlot::Active => protocol::programs_active(ha_id),
        };
        let mut program = self.client.get(&resource).await?;
        let options = program
            .pointer_mut("/data/options")
            .map(Value::take)
            .unwrap_or(Value::Null);

        for raw in raw_settings(options) {
            let setting = self.normalizer.normalize(&self.appliance.appliance_type, &raw);
            self.publish(&setting);
        }
        Ok(())
    }

    /// Read active options while running, selected options otherwise.
    pub async fn refresh_options(&mut self) -> Result<()> {
        let slot = if self.operation_state() == Some(OPERATION_STATE_RUN) {
            ProgramSlot::Active
        } else {
            ProgramSlot::Selected
        };
        self.check_options(slot).await
    }

    // -- Lifecycle events --

    pub fn process_started(&mut self) {
        self.publish_kind(SettingKind::StartDevice, SettingValue::Bool(true));
        self.publish_kind(SettingKind::OperationState, SettingValue::Int(OPERATION_STATE_RUN));
        debug!(ha_id = %self.id(), "process started");
    }

    pub fn process_finished(&mut self) {
        self.publish_kind(SettingKind::StartDevice, SettingValue::Bool(false));
        self.reset_timers();

        if self.operation_state() == Some(OPERATION_STATE_RUN) {
            self.publish_kind(
                SettingKind::OperationState,
                SettingValue::Int(OPERATION_STATE_FINISHED),
            );
            self.publish_kind(SettingKind::Progress, SettingValue::Int(100));
        }
        debug!(ha_id = %self.id(), "process finished");
    }

    pub fn process_aborted(&mut self) {
        self.publish_kind(SettingKind::StartDevice, SettingValue::Bool(false));
        self.reset_timers();

        for id in self.variables.kind(SettingKind::Progress) {
            let progress = self
                .publisher
                .value(id)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            if progress < 100.0 {
                self.publisher.publish(id, SettingValue::Int(0));
            }
        }
        debug!(ha_id = %self.id(), "process aborted");
    }

    fn reset_timers(&mut self) {
        for kind in [SettingKind::Elapsed, SettingKind::Remaining] {
            for id in self.variables.kind(kind) {
                let zero = match self.publisher.value(id) {
                    Some(SettingValue::Float(_)) => SettingValue::Float(0.0),
                    _ => SettingValue::Int(0),
                };
                self.publisher.publish(id, zero);
            }
        }
    }

    fn operation_state(&self) -> Option<i64> {
        self.variables
            .first(SettingKind::OperationState)
            .and_then(|id| self.publisher.value(id))
            .and_then(|v| v.as_i64())
    }

    fn publish_kind(&mut self, kind: SettingKind, value: SettingValue) {
        for id in self.variables.kind(kind) {
            self.publisher.publish(id, value.clone());
        }
    }

    fn publish(&mut self, setting: &Setting) {
        let Some(ref value) = setting.value else {
            return;
        };
        for id in self.variables.handles(&setting.key) {
            self.publisher.publish(id, value.clone());
        }
    }
}

/// Vendor answers to a selection read that mean nothing is selected.
/// Transport and authorization failures pass through unchanged.
fn means_no_selection(err: &Error) -> bool {
    match err {
        Error::Precondition(_) => true,
        Error::Vendor { status, key, .. } => {
            *status == 404 || key.as_deref().is_some_and(|k| k.contains("NoProgramSelected"))
        }
        _ => false,
    }
}
