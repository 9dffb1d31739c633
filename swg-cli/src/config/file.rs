//! TOML file configuration structures.
//!
//! These structs directly map to the `swg-propensity.toml` file format.

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub page: PageConfig,
    #[serde(default)]
    pub propensity: PropensityConfig,
}

/// The page the client pretends to run in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    pub publication_id: String,
    pub hostname: String,
    /// Raw cookie string, e.g. `"__gads=ID=abc; theme=dark"`.
    #[serde(default)]
    pub cookie: String,
    #[serde(default)]
    pub referrer: String,
    /// Minutes east of UTC. The local timezone is used when unset.
    #[serde(default)]
    pub timezone_offset_minutes: Option<i32>,
}

/// Propensity endpoint section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropensityConfig {
    /// Forward events not originated by the propensity client.
    #[serde(default)]
    pub enable: bool,
    /// Overrides the default ad-serving base URL.
    #[serde(default)]
    pub base_url: Option<Url>,
    #[serde(default)]
    pub version: Option<u32>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[page]
publication_id = "example.com"
hostname = "news.example.com"
cookie = "__gads=ID=abc:T=1"
referrer = "https://search.example/"
timezone_offset_minutes = -300

[propensity]
enable = true
base_url = "http://localhost:8080"
version = 2
timeout_secs = 5
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.page.publication_id, "example.com");
        assert_eq!(config.page.timezone_offset_minutes, Some(-300));
        assert!(config.propensity.enable);
        assert_eq!(
            config.propensity.base_url.unwrap().as_str(),
            "http://localhost:8080/"
        );
        assert_eq!(config.propensity.version, Some(2));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
[page]
publication_id = "example.com"
hostname = "example.com"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.page.cookie.is_empty());
        assert!(config.page.timezone_offset_minutes.is_none());
        assert!(!config.propensity.enable);
        assert!(config.propensity.base_url.is_none());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let toml_str = r#"
[page]
publication_id = "example.com"
hostname = "example.com"

[propensity]
base_url = "not a url"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
