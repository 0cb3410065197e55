use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::BridgeConfig;
use crate::host::{MemoryTokenStore, TokenStore};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    endpoint_url, is_token_resource, normalize_base, parse_body, request_body, unwrap_envelope,
    vendor_error, VendorError, INVALID_TOKEN, MEDIA_TYPE, PRODUCTION_ENDPOINT, SIMULATOR_ENDPOINT,
};
use crate::token::{Credentials, TokenManager};
use crate::types::{ConnectionStatus, TokenPair};
use crate::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LANGUAGE: &str = "de-DE";

type StatusCallback = Box<dyn Fn(ConnectionStatus) + Send + Sync>;

pub struct HomeConnectClientBuilder {
    base_url: String,
    credentials: Credentials,
    language: String,
    timeout: Duration,
    token_store: Option<Box<dyn TokenStore>>,
    status_callbacks: Vec<StatusCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl Default for HomeConnectClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HomeConnectClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: PRODUCTION_ENDPOINT.to_string(),
            credentials: Credentials::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token_store: None,
            status_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        let mut builder = Self::new()
            .simulator(config.simulator)
            .credentials(&config.client_id, &config.client_secret)
            .redirect_uri(&config.redirect_uri);
        if let Some(ref language) = config.language {
            builder = builder.language(language);
        }
        if let Some(ref path) = config.token_file {
            builder = builder.token_store(crate::host::JsonFileTokenStore::new(path));
        } else {
            builder = builder.tokens(config.tokens());
        }
        builder
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn simulator(mut self, enabled: bool) -> Self {
        self.base_url = if enabled {
            SIMULATOR_ENDPOINT
        } else {
            PRODUCTION_ENDPOINT
        }
        .to_string();
        self
    }

    pub fn credentials(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.credentials.client_id = client_id.into();
        self.credentials.client_secret = client_secret.into();
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.credentials.redirect_uri = uri.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token_store(mut self, store: impl TokenStore + 'static) -> Self {
        self.token_store = Some(Box::new(store));
        self
    }

    /// Start from a fixed token pair held in memory.
    pub fn tokens(self, tokens: TokenPair) -> Self {
        self.token_store(MemoryTokenStore::new(tokens))
    }

    pub fn on_status(mut self, f: impl Fn(ConnectionStatus) + Send + Sync + 'static) -> Self {
        self.status_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<HomeConnectClient> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        let base_url = normalize_base(&self.base_url);
        let store = self
            .token_store
            .unwrap_or_else(|| Box::new(MemoryTokenStore::default()));
        let tokens = TokenManager::new(http.clone(), base_url.clone(), self.credentials, store);

        Ok(HomeConnectClient {
            http,
            base_url,
            language: self.language,
            tokens,
            status_callbacks: self.status_callbacks,
            status: None,
            logger,
        })
    }
}

/// HTTP layer for the vendor API. Attaches auth, decodes responses, detects
/// vendor errors and retries once after a token refresh.
pub struct HomeConnectClient {
    http: reqwest::Client,
    base_url: String,
    language: String,
    tokens: TokenManager,
    status_callbacks: Vec<StatusCallback>,
    status: Option<ConnectionStatus>,
    logger: Option<MessageLogger>,
}

impl HomeConnectClient {
    pub fn builder() -> HomeConnectClientBuilder {
        HomeConnectClientBuilder::new()
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn status(&self) -> Option<ConnectionStatus> {
        self.status
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn authorization_url(&mut self) -> Result<String> {
        self.tokens.authorization_url()
    }

    pub fn verify_state(&self, state: &str) -> bool {
        self.tokens.verify_state(state)
    }

    pub async fn exchange_authorization_code(&mut self, code: &str) -> Result<TokenPair> {
        let result = self
            .tokens
            .exchange_authorization_code(code, self.logger.as_mut())
            .await;
        if let Err(ref e) = result {
            self.fail(e);
        }
        result
    }

    pub async fn refresh_access_token(&mut self) -> Result<TokenPair> {
        let result = self
            .tokens
            .refresh_access_token(self.logger.as_mut())
            .await;
        if let Err(ref e) = result {
            self.fail(e);
        }
        result
    }

    /// Drop the tokens and require a new authorization.
    pub fn logout(&mut self) {
        self.tokens.clear();
        self.set_status(ConnectionStatus::LoginRequired);
    }

    /// Drop the tokens of a login that could not be verified.
    pub(crate) fn reject_login(&mut self) {
        self.tokens.clear();
        self.set_status(ConnectionStatus::Failed);
    }

    pub async fn get(&mut self, resource: &str) -> Result<Value> {
        self.call(resource, None, None).await
    }

    pub async fn put(&mut self, resource: &str, params: Value) -> Result<Value> {
        self.call(resource, Some(params), Some(Method::PUT)).await
    }

    pub async fn delete(&mut self, resource: &str, params: Option<Value>) -> Result<Value> {
        self.call(resource, params, Some(Method::DELETE)).await
    }

    /// Issue an API call. Without an explicit method, calls with params are
    /// PUT and calls without are GET.
    pub async fn call(
        &mut self,
        resource: &str,
        params: Option<Value>,
        method: Option<Method>,
    ) -> Result<Value> {
        if is_token_resource(resource) {
            return Err(Error::Protocol(
                "token requests go through the token manager".to_string(),
            ));
        }
        if !self.tokens.tokens().is_complete() {
            self.set_status(ConnectionStatus::LoginRequired);
            return Err(Error::LoggedOut);
        }

        let method = method.unwrap_or(if params.is_some() {
            Method::PUT
        } else {
            Method::GET
        });

        let mut retried = false;
        loop {
            match self.send(resource, params.as_ref(), &method).await {
                Ok(value) => {
                    self.set_status(ConnectionStatus::Connected);
                    return Ok(unwrap_envelope(value, resource));
                }
                Err(Error::Auth(description))
                    if !retried && self.tokens.tokens().has_refresh_token() =>
                {
                    debug!(resource, "access token rejected ({description}), refreshing");
                    retried = true;
                    if let Err(e) = self
                        .tokens
                        .refresh_access_token(self.logger.as_mut())
                        .await
                    {
                        self.fail(&e);
                        return Err(e);
                    }
                }
                Err(e) => {
                    self.fail(&e);
                    return Err(e);
                }
            }
        }
    }

    async fn send(&mut self, resource: &str, params: Option<&Value>, method: &Method) -> Result<Value> {
        let url = endpoint_url(&self.base_url, resource);
        debug!(method = %method, url = %url, "api request");

        let body = params.filter(|_| *method != Method::GET).map(request_body);
        if let Some(ref mut logger) = self.logger {
            logger.log_request(method.as_str(), resource, body.as_ref());
        }

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, MEDIA_TYPE)
            .header(ACCEPT, MEDIA_TYPE)
            .header(ACCEPT_LANGUAGE, self.language.as_str())
            .bearer_auth(self.tokens.access_token());
        if let Some(ref body) = body {
            req = req.body(serde_json::to_vec(body)?);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let redirect = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = resp.text().await?;
        let parsed = parse_body(&text, redirect.as_deref());
        trace!(status, resource, "api response");

        if let Some(ref mut logger) = self.logger {
            logger.log_response(resource, status, &parsed);
        }

        if let Some(err) = vendor_error(&parsed) {
            return Err(classify(status, err));
        }
        if status >= 400 {
            return Err(classify(
                status,
                VendorError {
                    key: None,
                    description: format!("HTTP {status}"),
                },
            ));
        }
        Ok(parsed)
    }

    pub(crate) fn log_command(&mut self, action: &str, appliance: &str, body: &Value) {
        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, Some(appliance), body);
        }
    }

    fn fail(&mut self, error: &Error) {
        warn!("api error: {error}");
        if error.is_connectivity_fault() {
            self.set_status(ConnectionStatus::Failed);
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == Some(status) {
            return;
        }
        self.status = Some(status);
        for cb in &self.status_callbacks {
            cb(status);
        }
    }
}

/// 401 and `invalid_token` are auth failures; 403 and 409 are preconditions.
fn classify(status: u16, err: VendorError) -> Error {
    if status == 401 || err.key.as_deref() == Some(INVALID_TOKEN) {
        return Error::Auth(err.description);
    }
    if matches!(status, 403 | 409) {
        return Error::Precondition(err.description);
    }
    Error::Vendor {
        status,
        key: err.key,
        description: err.description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(key: Option<&str>) -> VendorError {
        VendorError {
            key: key.map(str::to_string),
            description: "boom".to_string(),
        }
    }

    #[test]
    fn invalid_token_is_auth() {
        assert!(matches!(classify(400, err(Some(INVALID_TOKEN))), Error::Auth(_)));
        assert!(matches!(classify(401, err(None)), Error::Auth(_)));
    }

    #[test]
    fn conflict_and_forbidden_are_preconditions() {
        assert!(matches!(classify(409, err(Some("SDK.Error.NoProgramSelected"))), Error::Precondition(_)));
        assert!(matches!(classify(403, err(None)), Error::Precondition(_)));
    }

    #[test]
    fn other_errors_are_vendor_errors() {
        match classify(500, err(Some("SDK.Error.Internal"))) {
            Error::Vendor { status, key, .. } => {
                assert_eq!(status, 500);
                assert_eq!(key.as_deref(), Some("SDK.Error.Internal"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_without_tokens_is_logged_out() {
        let mut client = HomeConnectClient::builder().build().unwrap();
        let err = client.get("homeappliances").await.unwrap_err();
        assert!(matches!(err, Error::LoggedOut));
        assert_eq!(client.status(), Some(ConnectionStatus::LoginRequired));
    }
}
