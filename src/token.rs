use chrono::{Duration as ChronoDuration, Utc};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::host::TokenStore;
use crate::logger::MessageLogger;
use crate::protocol::{
    authorization_url, endpoint_url, form_body, parse_body, vendor_error, FORM_MEDIA_TYPE,
    INVALID_GRANT, INVALID_TOKEN, TOKEN_RESOURCE,
};
use crate::types::{AuthState, TokenPair};
use crate::{Error, Result};

/// OAuth client registration.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Owns the token pair and every transition of it.
pub struct TokenManager {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    tokens: TokenPair,
    state: AuthState,
    store: Box<dyn TokenStore>,
    pending_state: Option<String>,
}

impl TokenManager {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        credentials: Credentials,
        store: Box<dyn TokenStore>,
    ) -> Self {
        let tokens = store.load();
        let state = if tokens.is_complete() {
            AuthState::Authorized
        } else {
            AuthState::LoggedOut
        };
        Self {
            http,
            base_url,
            credentials,
            tokens,
            state,
            store,
            pending_state: None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    pub fn is_authorized(&self) -> bool {
        self.state == AuthState::Authorized && self.tokens.is_complete()
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    /// Build the URL the user visits to grant access. Each call issues a
    /// fresh `state` value that the redirect must echo back.
    pub fn authorization_url(&mut self) -> Result<String> {
        let state = Uuid::new_v4().to_string();
        let url = authorization_url(
            &self.base_url,
            &self.credentials.client_id,
            &self.credentials.redirect_uri,
            &state,
        )?;
        self.pending_state = Some(state);
        Ok(url)
    }

    pub fn verify_state(&self, state: &str) -> bool {
        self.pending_state.as_deref() == Some(state)
    }

    pub(crate) fn clear(&mut self) {
        self.tokens = TokenPair::default();
        self.store.save(&self.tokens);
        self.state = AuthState::LoggedOut;
    }

    pub(crate) async fn exchange_authorization_code(
        &mut self,
        code: &str,
        logger: Option<&mut MessageLogger>,
    ) -> Result<TokenPair> {
        self.tokens = TokenPair::default();
        self.state = AuthState::Authorizing;

        let credentials = self.credentials.clone();
        let state = self.pending_state.clone().unwrap_or_default();
        let mut params = vec![
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
        ];
        if !state.is_empty() {
            params.push(("state", state.as_str()));
        }

        match self.request_token(&params, logger).await {
            Ok(tokens) if tokens.is_complete() => {
                info!("authorization code exchanged");
                self.pending_state = None;
                self.accept(tokens.clone());
                Ok(tokens)
            }
            Ok(_) => {
                self.clear();
                Err(Error::Auth("token response is missing a token".to_string()))
            }
            Err(e) => {
                warn!("authorization code exchange failed: {e}");
                self.clear();
                Err(match e {
                    Error::Vendor { description, .. } => Error::Auth(description),
                    other => other,
                })
            }
        }
    }

    pub(crate) async fn refresh_access_token(
        &mut self,
        logger: Option<&mut MessageLogger>,
    ) -> Result<TokenPair> {
        if !self.tokens.has_refresh_token() {
            self.state = AuthState::LoggedOut;
            return Err(Error::Auth("no refresh token held".to_string()));
        }

        let previous = self.state;
        self.state = AuthState::Refreshing;

        let refresh_token = self.tokens.refresh_token.clone();
        let client_secret = self.credentials.client_secret.clone();
        let params = [
            ("client_secret", client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        match self.request_token(&params, logger).await {
            Ok(tokens) if tokens.is_complete() => {
                debug!("access token refreshed");
                self.accept(tokens.clone());
                Ok(tokens)
            }
            Ok(_) => {
                self.clear();
                Err(Error::Auth("refresh response is missing a token".to_string()))
            }
            Err(Error::Vendor {
                key: Some(key),
                description,
                ..
            }) if key == INVALID_TOKEN || key == INVALID_GRANT => {
                warn!(key = %key, "refresh token rejected, logging out");
                self.clear();
                Err(Error::Auth(description))
            }
            Err(e) => {
                self.state = previous;
                Err(e)
            }
        }
    }

    fn accept(&mut self, tokens: TokenPair) {
        self.tokens = tokens;
        self.store.save(&self.tokens);
        self.state = AuthState::Authorized;
    }

    async fn request_token(
        &self,
        params: &[(&str, &str)],
        logger: Option<&mut MessageLogger>,
    ) -> Result<TokenPair> {
        let url = endpoint_url(&self.base_url, TOKEN_RESOURCE);
        debug!(url = %url, "requesting token");

        let mut logger = logger;
        if let Some(ref mut logger) = logger {
            let body: Map<String, Value> = params
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect();
            logger.log_request("POST", TOKEN_RESOURCE, Some(&Value::Object(body)));
        }

        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, FORM_MEDIA_TYPE)
            .body(form_body(params))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let redirect = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await?;
        let parsed = parse_body(&body, redirect.as_deref());

        if let Some(ref mut logger) = logger {
            logger.log_response(TOKEN_RESOURCE, status, &parsed);
        }

        if let Some(err) = vendor_error(&parsed) {
            return Err(Error::Vendor {
                status,
                key: err.key,
                description: err.description,
            });
        }
        if status >= 400 {
            return Err(Error::Vendor {
                status,
                key: None,
                description: format!("token endpoint returned HTTP {status}"),
            });
        }

        Ok(tokens_from_response(&parsed))
    }
}

/// `id_token` stands in for a missing `access_token`.
fn tokens_from_response(parsed: &Value) -> TokenPair {
    let field = |name: &str| {
        parsed
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let access_token = field("access_token").or_else(|| field("id_token")).unwrap_or_default();
    let refresh_token = field("refresh_token").unwrap_or_default();
    let expires_in = parsed.get("expires_in").and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    });

    TokenPair {
        access_token,
        refresh_token,
        expires_at: expires_in.map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
    }
}
