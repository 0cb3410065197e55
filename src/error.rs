use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Timeout,
    /// Authorization or refresh failed; tokens have been cleared.
    Auth(String),
    LoggedOut,
    Vendor {
        status: u16,
        key: Option<String>,
        description: String,
    },
    /// A benign precondition (no program selected, HTTP 403/409).
    Precondition(String),
    Protocol(String),
    UnknownAppliance(String),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl Error {
    /// Whether this failure should flip the connection status to failed.
    pub fn is_connectivity_fault(&self) -> bool {
        !matches!(self, Error::Precondition(_) | Error::UnknownAppliance(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Auth(msg) => write!(f, "authorization failed: {msg}"),
            Error::LoggedOut => write!(f, "not logged in"),
            Error::Vendor {
                status,
                key: Some(key),
                description,
            } => write!(f, "vendor error {status} ({key}): {description}"),
            Error::Vendor {
                status, description, ..
            } => write!(f, "vendor error {status}: {description}"),
            Error::Precondition(msg) => write!(f, "{msg}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::UnknownAppliance(id) => write!(f, "unknown appliance: {id}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
