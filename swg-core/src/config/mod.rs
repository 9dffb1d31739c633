//! Configuration types for the propensity client.
//!
//! These types represent validated runtime configuration and can be shared
//! across crates. Loading and parsing configuration files is handled by the
//! binary crate.

mod config_store;

pub use config_store::ConfigStore;

use url::Url;

/// Default base of the ad-serving endpoints.
pub const DEFAULT_ADS_BASE_URL: &str = "https://pubads.g.doubleclick.net";

/// Protocol version reported in the `v` query parameter.
pub const DEFAULT_PROTOCOL_VERSION: u32 = 1;

/// Client configuration that may change while the page is live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Whether events not originated by the propensity client itself may be
    /// forwarded to the propensity endpoint.
    pub enable_propensity: bool,
}

/// Static settings for the propensity server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropensityServerConfig {
    /// Publication the page belongs to.
    pub publication_id: String,
    /// Base URL the endpoint paths are joined onto.
    pub base_url: Url,
    pub version: u32,
}

impl PropensityServerConfig {
    pub fn new(publication_id: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            publication_id: publication_id.into(),
            base_url: Url::parse(DEFAULT_ADS_BASE_URL)?,
            version: DEFAULT_PROTOCOL_VERSION,
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }
}
