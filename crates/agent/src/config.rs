//! Agent configuration
//!
//! Collectors come from `[[inputs.hcloud]]` tables in a TOML file. Without a
//! file, a single collector is configured from `HCLOUD_*` environment
//! variables on top of the defaults.

use anyhow::{Context, Result};
use hcloud_lib::HcloudConfig;
use serde::Deserialize;
use std::path::Path;

/// Environment prefix used when no config file is given
const ENV_PREFIX: &str = "HCLOUD";

/// Top-level layout of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub inputs: Inputs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inputs {
    #[serde(default)]
    pub hcloud: Vec<HcloudConfig>,
}

impl AgentConfig {
    /// Load collector configurations from `path`, or from the environment
    pub fn load(path: Option<&Path>) -> Result<Vec<HcloudConfig>> {
        match path {
            Some(path) => Ok(Self::from_file(path)?.inputs.hcloud),
            None => Ok(vec![from_env(ENV_PREFIX)?]),
        }
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        config
            .try_deserialize()
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

fn from_env(prefix: &str) -> Result<HcloudConfig> {
    let config = config::Config::builder()
        .add_source(
            config::Environment::with_prefix(prefix)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("resources"),
        )
        .build()
        .context("Failed to read environment configuration")?;

    config
        .try_deserialize()
        .context("Invalid environment configuration")
}

/// Instance name used in structured logs
pub fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_multiple_inputs() {
        let file = toml_file(
            r#"
[[inputs.hcloud]]
resources = ["load_balancers"]
token = "first"
timeout = "10s"

[[inputs.hcloud]]
token = "second"
"#,
        );

        let configs = AgentConfig::load(Some(file.path())).unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].resources, vec!["load_balancers".to_string()]);
        assert_eq!(configs[0].token, "first");
        assert_eq!(configs[0].timeout, Duration::from_secs(10));

        assert!(configs[1].resources.is_empty());
        assert_eq!(configs[1].timeout, Duration::from_secs(5));
        assert_eq!(configs[1].endpoint, "https://api.hetzner.cloud/v1");
    }

    #[test]
    fn test_other_plugins_ignored() {
        let file = toml_file(
            r#"
[[inputs.cpu]]
percpu = true
"#,
        );

        let configs = AgentConfig::load(Some(file.path())).unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn test_malformed_duration_is_fatal() {
        let file = toml_file(
            r#"
[[inputs.hcloud]]
timeout = "five seconds"
"#,
        );

        assert!(AgentConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let err = AgentConfig::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("HCLOUD_AGENT_TEST_TOKEN", "env-token");
        std::env::set_var("HCLOUD_AGENT_TEST_TIMEOUT", "2s");
        std::env::set_var("HCLOUD_AGENT_TEST_RESOURCES", "load_balancers,servers");

        let config = from_env("HCLOUD_AGENT_TEST").unwrap();

        assert_eq!(config.token, "env-token");
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(
            config.resources,
            vec!["load_balancers".to_string(), "servers".to_string()]
        );
    }
}
