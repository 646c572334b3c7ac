//! Agent and client runtime configuration: bind address, v1/v2c
//! communities, USM users to localize at startup, and response
//! limits, loaded through the `config` crate's layered
//! defaults → file → environment model.

use serde::Deserialize;

use crate::usm::auth::AuthProtocol;
use crate::usm::database::UserDatabase;
use crate::usm::priv_crypto::PrivProtocol;

/// Errors raised while assembling or applying an [`AgentConfig`].
/// Kept separate from [`crate::error::SnmpError`]: this is entirely a
/// host-side concern (file I/O, malformed TOML, bad env vars), never
/// something the wire protocol itself produces.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid bind address {address:?}: {source}")]
    BindAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("user {name:?}: unknown auth protocol {protocol:?}")]
    UnknownAuthProtocol { name: String, protocol: String },

    #[error("user {name:?}: unknown priv protocol {protocol:?}")]
    UnknownPrivProtocol { name: String, protocol: String },
}

/// One SNMPv3 user to localize and register at startup. Passwords are
/// plaintext only in configuration at rest; [`AgentConfig::user_database`]
/// localizes them immediately and the plaintext is dropped.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct V3UserConfig {
    pub name: String,
    /// One of `md5`, `sha1`, `sha256`, `sha384`, `sha512`, or empty for noAuthNoPriv.
    pub auth_protocol: String,
    pub auth_password: String,
    /// One of `des`, `aes128`, `aes192`, `aes256`, or empty for authNoPriv.
    pub priv_protocol: String,
    pub priv_password: String,
}

impl Default for V3UserConfig {
    fn default() -> Self {
        V3UserConfig {
            name: String::new(),
            auth_protocol: String::new(),
            auth_password: String::new(),
            priv_protocol: String::new(),
            priv_password: String::new(),
        }
    }
}

fn parse_auth_protocol(s: &str) -> Option<AuthProtocol> {
    match s.to_ascii_lowercase().as_str() {
        "" => None,
        "md5" => Some(AuthProtocol::Md5),
        "sha1" | "sha" => Some(AuthProtocol::Sha1),
        "sha256" => Some(AuthProtocol::Sha256),
        "sha384" => Some(AuthProtocol::Sha384),
        "sha512" => Some(AuthProtocol::Sha512),
        _ => None,
    }
}

fn parse_priv_protocol(s: &str) -> Option<PrivProtocol> {
    match s.to_ascii_lowercase().as_str() {
        "" => None,
        "des" | "descbc" => Some(PrivProtocol::DesCbc),
        "aes" | "aes128" => Some(PrivProtocol::Aes128Cfb),
        "aes192" => Some(PrivProtocol::Aes192Cfb),
        "aes256" => Some(PrivProtocol::Aes256Cfb),
        _ => None,
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub bind_address: String,
    pub read_community: String,
    pub write_community: String,
    /// Seed bytes used to derive the agent's `engineID` (RFC 3411
    /// §3.1.1, format 4: "text, administratively assigned").
    pub engine_id_seed: String,
    pub worker_count: usize,
    pub max_response_varbinds: usize,
    pub v3_users: Vec<V3UserConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            bind_address: "0.0.0.0:161".to_string(),
            read_community: "public".to_string(),
            write_community: "private".to_string(),
            engine_id_seed: "snmp-core".to_string(),
            worker_count: 4,
            max_response_varbinds: crate::agent::MAX_BULK_VARBINDS,
            v3_users: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Load configuration layered as: built-in defaults, then an
    /// optional file at `config_path` (any format the `config` crate
    /// recognizes by extension; missing file is not an error), then
    /// `SNMP_AGENT__*` environment variables (double underscore as
    /// the nesting separator, e.g. `SNMP_AGENT__BIND_ADDRESS`).
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = AgentConfig::default();
        let mut builder = config::Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("read_community", defaults.read_community)?
            .set_default("write_community", defaults.write_community)?
            .set_default("engine_id_seed", defaults.engine_id_seed)?
            .set_default("worker_count", defaults.worker_count as i64)?
            .set_default("max_response_varbinds", defaults.max_response_varbinds as i64)?;
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SNMP_AGENT")
                .separator("__")
                .try_parsing(true),
        );
        let settled = builder.build()?;
        let config: AgentConfig = settled.try_deserialize()?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|source| ConfigError::BindAddress {
                address: self.bind_address.clone(),
                source,
            })
    }

    /// Derive a deterministic `engineID` from `engine_id_seed`: an
    /// enterprise-number prefix (RFC 3411 §3.1.1 format 4) followed by
    /// the seed's UTF-8 bytes, truncated to the 32-octet wire maximum.
    pub fn derive_engine_id(&self) -> Vec<u8> {
        const PRIVATE_ENTERPRISE_NUMBER: u32 = 1466581; // unassigned example PEN used for text-format engine IDs
        let mut id = Vec::with_capacity(5 + self.engine_id_seed.len());
        id.push(0x80 | ((PRIVATE_ENTERPRISE_NUMBER >> 24) as u8 & 0x7F));
        id.push((PRIVATE_ENTERPRISE_NUMBER >> 16) as u8);
        id.push((PRIVATE_ENTERPRISE_NUMBER >> 8) as u8);
        id.push(PRIVATE_ENTERPRISE_NUMBER as u8);
        id.push(0x04); // format 4: text, administratively assigned
        id.extend_from_slice(self.engine_id_seed.as_bytes());
        id.truncate(32);
        id
    }

    /// Localize every configured v3 user against `engine_id` and
    /// return a populated [`UserDatabase`].
    pub fn user_database(&self, engine_id: &[u8]) -> Result<UserDatabase, ConfigError> {
        let db = UserDatabase::new();
        for user in &self.v3_users {
            let auth = if user.auth_protocol.is_empty() {
                None
            } else {
                let proto =
                    parse_auth_protocol(&user.auth_protocol).ok_or_else(|| ConfigError::UnknownAuthProtocol {
                        name: user.name.clone(),
                        protocol: user.auth_protocol.clone(),
                    })?;
                Some((proto, user.auth_password.as_bytes()))
            };
            let priv_ = if user.priv_protocol.is_empty() {
                None
            } else {
                let proto =
                    parse_priv_protocol(&user.priv_protocol).ok_or_else(|| ConfigError::UnknownPrivProtocol {
                        name: user.name.clone(),
                        protocol: user.priv_protocol.clone(),
                    })?;
                Some((proto, user.priv_password.as_bytes()))
            };
            db.add_user(user.name.as_bytes(), engine_id, auth, priv_);
        }
        Ok(db)
    }
}

/// Client-side configuration: target, credentials, and transport
/// timing. Mirrors `AgentConfig`'s layered loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub target: String,
    pub community: String,
    pub timeout_ms: u64,
    pub retries: u32,
    pub v3_user: Option<V3UserConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            target: "127.0.0.1:161".to_string(),
            community: "public".to_string(),
            timeout_ms: 3_000,
            retries: 1,
            v3_user: None,
        }
    }
}

impl ClientConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = ClientConfig::default();
        let mut builder = config::Config::builder()
            .set_default("target", defaults.target)?
            .set_default("community", defaults.community)?
            .set_default("timeout_ms", defaults.timeout_ms as i64)?
            .set_default("retries", defaults.retries as i64)?;
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SNMP_CLIENT")
                .separator("__")
                .try_parsing(true),
        );
        let settled = builder.build()?;
        Ok(settled.try_deserialize()?)
    }

    pub fn target_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        self.target.parse().map_err(|source| ConfigError::BindAddress {
            address: self.target.clone(),
            source,
        })
    }
}
