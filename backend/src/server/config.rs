//! Server settings loaded via OrthoConfig and the resolved server
//! configuration built from them.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use city_boundaries::domain::boundary_resolution::{
    DEFAULT_PROVIDER_TIMEOUT, DEFAULT_RESULT_LIMIT,
};
use city_boundaries::domain::scoring::{ScoringPolicy, ScoringWeights};
use city_boundaries::outbound::nominatim::NominatimHttpIdentity;
use city_boundaries::outbound::persistence::DbPool;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_PROVIDER_URL: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_POOL_MAX_SIZE: u32 = 10;

/// Raw settings read from `BOUNDARIES_*` environment variables, config files
/// and command-line flags.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BOUNDARIES")]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub pool_max_size: Option<u32>,
    /// Nominatim-compatible search endpoint.
    pub provider_url: Option<String>,
    /// Provider request timeout in milliseconds.
    pub provider_timeout_ms: Option<u64>,
    /// User agent sent to the provider.
    pub provider_user_agent: Option<String>,
    /// Contact address sent to the provider.
    pub provider_contact: Option<String>,
    /// Candidates requested when a search has no limit.
    pub result_limit: Option<u32>,
    /// Minimum score for a default suggestion.
    pub acceptance_threshold: Option<f64>,
    /// Score gap under which candidates rank as ties.
    pub tie_epsilon: Option<f64>,
    /// Weight of the name similarity signal.
    pub weight_name: Option<f64>,
    /// Weight of the administrative level signal.
    pub weight_admin_level: Option<f64>,
    /// Weight of the tag completeness signal.
    pub weight_tags: Option<f64>,
    /// Weight of the geometry validity signal.
    pub weight_geometry: Option<f64>,
}

/// Settings that do not parse into usable values.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid bind address {value:?}: {source}")]
    BindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("invalid provider url {value:?}: {source}")]
    ProviderUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

impl ServerSettings {
    /// Listening address, falling back to `0.0.0.0:8080`.
    ///
    /// # Errors
    ///
    /// [`SettingsError::BindAddr`] when the value is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let value = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        value.parse().map_err(|source| SettingsError::BindAddr {
            value: value.to_owned(),
            source,
        })
    }

    /// Provider endpoint, falling back to the public Nominatim instance.
    ///
    /// # Errors
    ///
    /// [`SettingsError::ProviderUrl`] when the value is not a URL.
    pub fn provider_url(&self) -> Result<Url, SettingsError> {
        let value = self.provider_url.as_deref().unwrap_or(DEFAULT_PROVIDER_URL);
        Url::parse(value).map_err(|source| SettingsError::ProviderUrl {
            value: value.to_owned(),
            source,
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        self.provider_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT)
    }

    pub fn provider_identity(&self) -> NominatimHttpIdentity {
        let defaults = NominatimHttpIdentity::default();
        NominatimHttpIdentity {
            user_agent: self
                .provider_user_agent
                .clone()
                .unwrap_or(defaults.user_agent),
            contact: self.provider_contact.clone().unwrap_or(defaults.contact),
        }
    }

    pub fn pool_max_size(&self) -> u32 {
        self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE)
    }

    pub fn result_limit(&self) -> u32 {
        self.result_limit.unwrap_or(DEFAULT_RESULT_LIMIT)
    }

    /// Scoring policy with configured overrides applied to the defaults.
    pub fn scoring_policy(&self) -> ScoringPolicy {
        let defaults = ScoringPolicy::default();
        let weights = ScoringWeights {
            name: self.weight_name.unwrap_or(defaults.weights.name),
            admin_level: self
                .weight_admin_level
                .unwrap_or(defaults.weights.admin_level),
            tags: self.weight_tags.unwrap_or(defaults.weights.tags),
            geometry: self.weight_geometry.unwrap_or(defaults.weights.geometry),
        };
        ScoringPolicy {
            weights,
            acceptance_threshold: self
                .acceptance_threshold
                .unwrap_or(defaults.acceptance_threshold),
            tie_epsilon: self.tie_epsilon.unwrap_or(defaults.tie_epsilon),
        }
    }
}

/// Resolved configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) provider_url: Url,
    pub(crate) provider_timeout: Duration,
    pub(crate) provider_identity: NominatimHttpIdentity,
    pub(crate) scoring: ScoringPolicy,
    pub(crate) result_limit: u32,
}

impl ServerConfig {
    /// Resolve settings into a server configuration without a database.
    ///
    /// # Errors
    ///
    /// Propagates [`SettingsError`] for unparsable addresses or URLs.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self, SettingsError> {
        Ok(Self {
            bind_addr: settings.bind_addr()?,
            db_pool: None,
            provider_url: settings.provider_url()?,
            provider_timeout: settings.provider_timeout(),
            provider_identity: settings.provider_identity(),
            scoring: settings.scoring_policy(),
            result_limit: settings.result_limit(),
        })
    }

    /// Attach a database connection pool for the Diesel repository.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
