use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::client::{HomeConnectClient, HomeConnectClientBuilder};
use crate::host::{variable_id, MemoryPublisher, VariableMap, VariablePublisher};
use crate::normalize::Normalizer;
use crate::protocol;
use crate::router::Router;
use crate::sync::SyncEngine;
use crate::types::{Appliance, Command, ProcessEvent};
use crate::{Error, Result};

/// Interval at which the host timer should call `update_access_token`.
pub const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(86000);

/// Host-facing facade. Every operation recovers its errors into a plain
/// result; the last failure is kept for display.
pub struct Bridge {
    client: HomeConnectClient,
    normalizer: Normalizer,
    publisher: Box<dyn VariablePublisher>,
    appliances: Vec<Appliance>,
    variables: HashMap<String, VariableMap>,
    last_error: Option<String>,
}

impl Bridge {
    pub fn new(
        client: HomeConnectClient,
        normalizer: Normalizer,
        publisher: impl VariablePublisher + 'static,
    ) -> Self {
        Self {
            client,
            normalizer,
            publisher: Box::new(publisher),
            appliances: Vec::new(),
            variables: HashMap::new(),
            last_error: None,
        }
    }

    /// Bridge with an identity translator and an in-memory publisher.
    pub fn from_builder(builder: HomeConnectClientBuilder) -> Result<Self> {
        Ok(Self::new(
            builder.build()?,
            Normalizer::default(),
            MemoryPublisher::new(),
        ))
    }

    pub fn client(&self) -> &HomeConnectClient {
        &self.client
    }

    pub fn appliances(&self) -> &[Appliance] {
        &self.appliances
    }

    pub fn variables(&self, ha_id: &str) -> Option<&VariableMap> {
        self.variables.get(ha_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn authorization_url(&mut self) -> Option<String> {
        let result = self.client.authorization_url();
        self.record(result)
    }

    /// Handle the OAuth redirect query (`code=...&state=...`). The login is
    /// confirmed by listing appliances; a failed listing logs out again.
    /// A redirect rejected before the code exchange leaves the session alone.
    pub async fn handle_redirect(&mut self, query: &str) -> bool {
        let result = self.login(query).await;
        self.record(result).is_some()
    }

    async fn login(&mut self, query: &str) -> Result<()> {
        let mut code = None;
        let mut state = None;
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Auth("redirect carries no authorization code".to_string()))?;
        if !self.client.verify_state(state.as_deref().unwrap_or_default()) {
            return Err(Error::Auth("redirect state does not match".to_string()));
        }

        self.client.exchange_authorization_code(&code).await?;
        if let Err(e) = self.client.get(&protocol::appliances()).await {
            self.client.reject_login();
            return Err(e);
        }
        info!("login verified");
        Ok(())
    }

    /// Scheduled renewal. Returns false when no session can be renewed.
    pub async fn update_access_token(&mut self) -> bool {
        let result = self.client.refresh_access_token().await;
        self.record(result).is_some()
    }

    /// Delay until the next scheduled renewal. An access token already past
    /// its expiry asks for an immediate renewal.
    pub fn refresh_interval(&self) -> Option<Duration> {
        let manager = self.client.token_manager();
        if !manager.is_authorized() {
            return None;
        }
        if manager.tokens().is_expired(Utc::now()) {
            Some(Duration::ZERO)
        } else {
            Some(TOKEN_REFRESH_INTERVAL)
        }
    }

    /// Discover appliances, create their variable maps and publish the
    /// current values. Returns the number of appliances found.
    pub async fn create_devices(&mut self) -> usize {
        let appliances = SyncEngine::new(&mut self.client, &self.normalizer)
            .discover_devices()
            .await;

        self.variables.clear();
        for appliance in &appliances {
            let variables = VariableMap::from_appliance(appliance);
            for setting in &appliance.settings {
                if let Some(ref value) = setting.value {
                    self.publisher
                        .publish(&variable_id(&appliance.id, &setting.key), value.clone());
                }
            }
            debug!(ha_id = %appliance.id, variables = variables.len(), "appliance mirrored");
            self.variables.insert(appliance.id.clone(), variables);
        }

        self.appliances = appliances;
        self.appliances.len()
    }

    pub fn devices_found_message(&self, count: usize) -> String {
        if count == 1 {
            self.normalizer.translate("1 device found!")
        } else {
            format!("{count} {}", self.normalizer.translate("devices found!"))
        }
    }

    pub async fn handle_command(&mut self, ha_id: &str, command: Command) -> bool {
        let result = self.route_command(ha_id, command).await;
        self.record(result).is_some()
    }

    async fn route_command(&mut self, ha_id: &str, command: Command) -> Result<()> {
        let mut router = self.router(ha_id)?;
        match command {
            Command::SetProgram(key) => router.set_program(&key).await,
            Command::SetProgramIndex(index) => router.set_program_index(index).await,
            Command::SetOption { key, value } => router.set_option(&key, value).await,
            Command::StartStop(start) => router.start_stop(start).await,
            Command::SetTemperature { target, celsius } => {
                router.set_temperature(target, celsius).await
            }
            Command::SetToggle { toggle, enabled } => router.set_toggle(toggle, enabled).await,
            Command::SetPower(state) => router.set_power(&state).await,
        }
    }

    /// Apply a vendor lifecycle event to the mirrored variables.
    pub async fn handle_event(&mut self, ha_id: &str, event: ProcessEvent) -> bool {
        let result = self.route_event(ha_id, event).await;
        self.record(result).is_some()
    }

    async fn route_event(&mut self, ha_id: &str, event: ProcessEvent) -> Result<()> {
        let mut router = self.router(ha_id)?;
        match event {
            ProcessEvent::Started => router.process_started(),
            ProcessEvent::Finished => {
                if let Err(e) = router.check_status().await {
                    debug!(ha_id, "status refresh before finish failed: {e}");
                }
                router.process_finished();
            }
            ProcessEvent::Aborted => router.process_aborted(),
        }
        Ok(())
    }

    /// Re-read program options for one appliance.
    pub async fn refresh_options(&mut self, ha_id: &str) -> bool {
        let result = match self.router(ha_id) {
            Ok(mut router) => router.refresh_options().await,
            Err(e) => Err(e),
        };
        self.record(result).is_some()
    }

    fn router(&mut self, ha_id: &str) -> Result<Router<'_>> {
        let appliance = self
            .appliances
            .iter()
            .find(|a| a.id == ha_id)
            .ok_or_else(|| Error::UnknownAppliance(ha_id.to_string()))?;
        let variables = self
            .variables
            .get(ha_id)
            .ok_or_else(|| Error::UnknownAppliance(ha_id.to_string()))?;
        Ok(Router::new(
            &mut self.client,
            &self.normalizer,
            self.publisher.as_mut(),
            variables,
            appliance,
        ))
    }

    fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(e) => {
                warn!("{e}");
                self.last_error = Some(e.to_string());
                None
            }
        }
    }
}
