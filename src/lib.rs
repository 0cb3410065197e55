mod bridge;
mod client;
mod config;
mod error;
mod host;
mod logger;
pub mod mapping;
mod normalize;
mod protocol;
mod router;
mod sync;
mod token;
mod types;

pub use bridge::{Bridge, TOKEN_REFRESH_INTERVAL};
pub use client::{HomeConnectClient, HomeConnectClientBuilder, DEFAULT_LANGUAGE, DEFAULT_TIMEOUT};
pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use host::{
    variable_id, DictionaryTranslator, IdentityTranslator, JsonFileTokenStore, MemoryPublisher,
    MemoryTokenStore, TokenStore, Translator, VariableId, VariableMap, VariablePublisher,
};
pub use logger::MessageLogMode;
pub use normalize::Normalizer;
pub use protocol::{PRODUCTION_ENDPOINT, SIMULATOR_ENDPOINT};
pub use router::{ProgramSlot, Router, SELECT_PROGRAM_FIRST};
pub use sync::{merge_settings, program_setting, SyncEngine};
pub use token::{Credentials, TokenManager};
pub use types::*;
