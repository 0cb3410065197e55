use serde_json::{json, Map, Value};
use url::{form_urlencoded, Url};

use crate::{Error, Result};

pub const PRODUCTION_ENDPOINT: &str = "https://api.home-connect.com/";
pub const SIMULATOR_ENDPOINT: &str = "https://simulator.home-connect.com/";

pub const TOKEN_RESOURCE: &str = "security/oauth/token";
pub const AUTHORIZE_RESOURCE: &str = "security/oauth/authorize";

pub const MEDIA_TYPE: &str = "application/vnd.bsh.sdk.v1+json";
pub const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

pub const INVALID_TOKEN: &str = "invalid_token";
pub const INVALID_GRANT: &str = "invalid_grant";

/// Path segments that stand in for their parent resource.
const ALIAS_SEGMENTS: &[&str] = &["active", "available"];

pub fn appliances() -> String {
    "homeappliances".to_string()
}

pub fn settings(ha_id: &str) -> String {
    format!("homeappliances/{ha_id}/settings")
}

pub fn setting(ha_id: &str, key: &str) -> String {
    format!("homeappliances/{ha_id}/settings/{key}")
}

pub fn status(ha_id: &str) -> String {
    format!("homeappliances/{ha_id}/status")
}

pub fn programs_available(ha_id: &str) -> String {
    format!("homeappliances/{ha_id}/programs/available")
}

pub fn programs_selected(ha_id: &str) -> String {
    format!("homeappliances/{ha_id}/programs/selected")
}

pub fn programs_active(ha_id: &str) -> String {
    format!("homeappliances/{ha_id}/programs/active")
}

pub fn active_option(ha_id: &str, key: &str) -> String {
    format!("homeappliances/{ha_id}/programs/active/options/{key}")
}

/// Normalize a base URL so resources can be appended directly.
pub fn normalize_base(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

/// OAuth resources live at the root, everything else under `api/`.
pub fn endpoint_url(base: &str, resource: &str) -> String {
    let resource = resource.trim_start_matches('/');
    if resource.contains("oauth") {
        format!("{base}{resource}")
    } else {
        format!("{base}api/{resource}")
    }
}

/// Resource name used for verb selection and envelope unwrapping.
///
/// `programs/available` and `programs/active` resolve to `programs`.
pub fn resource_name(resource: &str) -> &str {
    let mut segments = resource.trim_end_matches('/').rsplit('/');
    let last = segments.next().unwrap_or("");
    if ALIAS_SEGMENTS.contains(&last) {
        segments.next().unwrap_or(last)
    } else {
        last
    }
}

pub fn is_token_resource(resource: &str) -> bool {
    resource_name(resource) == "token"
}

pub fn request_body(params: &Value) -> Value {
    json!({ "data": params })
}

pub fn form_body(params: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}

fn query_to_json(query: &str) -> Value {
    let map: Map<String, Value> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    Value::Object(map)
}

/// Decode a response body: JSON first, then a query string, and for an
/// empty body the query of the redirect target.
pub fn parse_body(body: &str, redirect: Option<&str>) -> Value {
    if body.trim().is_empty() {
        let query = redirect
            .and_then(|location| Url::parse(location).ok())
            .and_then(|url| url.query().map(str::to_string))
            .unwrap_or_default();
        return query_to_json(&query);
    }
    match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => query_to_json(body.trim()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorError {
    pub key: Option<String>,
    pub description: String,
}

/// Extract a vendor error from either `{"error": {"key", "description"}}`
/// or the OAuth form `{"error": "...", "error_description": "..."}`.
pub fn vendor_error(response: &Value) -> Option<VendorError> {
    let error = response.get("error")?;
    let fallback = response
        .get("error_description")
        .and_then(Value::as_str)
        .map(str::to_string);

    let (key, description) = match error {
        Value::Object(obj) => {
            let key = obj.get("key").and_then(Value::as_str).map(str::to_string);
            let description = obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(fallback)
                .or_else(|| key.clone());
            (key, description)
        }
        Value::String(s) => (Some(s.clone()), fallback.or_else(|| Some(s.clone()))),
        _ => (None, fallback),
    };

    Some(VendorError {
        key,
        description: description.unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Strip `{"data": {<resource>: X}}` down to `X`.
pub fn unwrap_envelope(mut value: Value, resource: &str) -> Value {
    let name = resource_name(resource);
    match value.pointer_mut(&format!("/data/{name}")) {
        Some(inner) => inner.take(),
        None => value,
    }
}

pub fn authorization_url(
    base: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<String> {
    let url = Url::parse_with_params(
        &endpoint_url(base, AUTHORIZE_RESOURCE),
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::Protocol(format!("invalid authorization url: {e}")))?;
    Ok(url.to_string())
}

/// Vendor enum name for a power state given as "on", "OFF", "standby", ...
pub fn power_state_value(state: &str) -> String {
    let lower = state.trim().to_lowercase();
    let mut chars = lower.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("{}{capitalized}", crate::mapping::POWER_STATE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://api.home-connect.com/";

    #[test]
    fn api_resources_live_under_api() {
        assert_eq!(
            endpoint_url(BASE, "homeappliances"),
            "https://api.home-connect.com/api/homeappliances"
        );
        assert_eq!(
            endpoint_url(BASE, TOKEN_RESOURCE),
            "https://api.home-connect.com/security/oauth/token"
        );
    }

    #[test]
    fn resource_name_skips_alias_segments() {
        assert_eq!(resource_name(&programs_available("X")), "programs");
        assert_eq!(resource_name(&programs_active("X")), "programs");
        assert_eq!(resource_name(&programs_selected("X")), "selected");
        assert_eq!(resource_name(&settings("X")), "settings");
        assert_eq!(resource_name(&appliances()), "homeappliances");
        assert_eq!(resource_name(TOKEN_RESOURCE), "token");
        assert_eq!(
            resource_name(&active_option("X", "BSH.Common.Option.Duration")),
            "BSH.Common.Option.Duration"
        );
    }

    #[test]
    fn normalize_base_appends_slash() {
        assert_eq!(normalize_base("http://127.0.0.1:1234"), "http://127.0.0.1:1234/");
        assert_eq!(normalize_base(BASE), BASE);
    }

    #[test]
    fn parse_json_body() {
        let v = parse_body(r#"{"data": {"status": []}}"#, None);
        assert!(v["data"]["status"].is_array());
    }

    #[test]
    fn parse_query_string_body() {
        let v = parse_body("access_token=abc&refresh_token=def", None);
        assert_eq!(v["access_token"], "abc");
        assert_eq!(v["refresh_token"], "def");
    }

    #[test]
    fn parse_empty_body_uses_redirect_query() {
        let v = parse_body("", Some("https://example.com/cb?code=xyz&state=1"));
        assert_eq!(v["code"], "xyz");
        assert_eq!(v["state"], "1");
    }

    #[test]
    fn parse_empty_body_without_redirect_is_empty_object() {
        let v = parse_body("", None);
        assert_eq!(v, json!({}));
    }

    #[test]
    fn vendor_error_object_form() {
        let v = json!({"error": {"key": "invalid_token", "description": "token expired"}});
        let e = vendor_error(&v).unwrap();
        assert_eq!(e.key.as_deref(), Some("invalid_token"));
        assert_eq!(e.description, "token expired");
    }

    #[test]
    fn vendor_error_oauth_form() {
        let v = json!({"error": "invalid_grant", "error_description": "code expired"});
        let e = vendor_error(&v).unwrap();
        assert_eq!(e.key.as_deref(), Some("invalid_grant"));
        assert_eq!(e.description, "code expired");
    }

    #[test]
    fn no_error_field_is_not_an_error() {
        assert!(vendor_error(&json!({"data": {}})).is_none());
    }

    #[test]
    fn unwrap_matching_envelope() {
        let v = json!({"data": {"homeappliances": [{"haId": "A"}]}});
        assert_eq!(unwrap_envelope(v, "homeappliances"), json!([{"haId": "A"}]));
    }

    #[test]
    fn keep_non_matching_envelope() {
        let v = json!({"data": {"key": "Dishcare.Dishwasher.Program.Eco50", "options": []}});
        let out = unwrap_envelope(v.clone(), &programs_selected("A"));
        assert_eq!(out, v);
    }

    #[test]
    fn authorization_url_carries_params() {
        let url = authorization_url(BASE, "client", "https://hub.local/hook", "state-1").unwrap();
        assert!(url.starts_with("https://api.home-connect.com/security/oauth/authorize?"));
        assert!(url.contains("client_id=client"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fhub.local%2Fhook"));
        assert!(url.contains("state=state-1"));
    }

    #[test]
    fn form_body_encodes_pairs() {
        let body = form_body(&[("grant_type", "authorization_code"), ("code", "a b")]);
        assert_eq!(body, "grant_type=authorization_code&code=a+b");
    }

    #[test]
    fn power_state_capitalizes() {
        assert_eq!(power_state_value("on"), "BSH.Common.EnumType.PowerState.On");
        assert_eq!(power_state_value("STANDBY"), "BSH.Common.EnumType.PowerState.Standby");
    }
}
