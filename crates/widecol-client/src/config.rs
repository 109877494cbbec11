//! Client-service configuration
//!
//! Settings arrive from the host as an optional resource-file list, the four
//! named connection settings, and arbitrary overrides. `resolve` layers them
//! onto the store defaults in that order.

use std::collections::BTreeMap;

use widecol_core::config::{CLIENT_PORT_KEY, CLIENT_RETRIES_KEY, QUORUM_KEY, ZNODE_PARENT_KEY};
use widecol_core::{Configuration, StoreResult};

use crate::error::{ClientError, ClientResult};

/// Host property carrying the comma-separated resource-file list
pub const CONFIG_FILES_PROPERTY: &str = "config-files";
pub const QUORUM_PROPERTY: &str = "zookeeper-quorum";
pub const CLIENT_PORT_PROPERTY: &str = "zookeeper-client-port";
pub const ZNODE_PARENT_PROPERTY: &str = "zookeeper-znode-parent";
pub const CLIENT_RETRIES_PROPERTY: &str = "client-retries";

/// Settings the service is enabled with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Comma-separated resource-file locations
    pub resource_files: Option<String>,
    /// Comma-separated coordination quorum hosts
    pub zookeeper_quorum: Option<String>,
    pub zookeeper_client_port: Option<u16>,
    /// Parent path of the cluster's coordination node
    pub zookeeper_znode_parent: Option<String>,
    pub client_retries: Option<u32>,
    /// Applied last, in order; a later entry replaces an earlier one
    pub overrides: Vec<(String, String)>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_files(mut self, files: impl Into<String>) -> Self {
        self.resource_files = Some(files.into());
        self
    }

    pub fn with_quorum(mut self, quorum: impl Into<String>) -> Self {
        self.zookeeper_quorum = Some(quorum.into());
        self
    }

    pub fn with_client_port(mut self, port: u16) -> Self {
        self.zookeeper_client_port = Some(port);
        self
    }

    pub fn with_znode_parent(mut self, parent: impl Into<String>) -> Self {
        self.zookeeper_znode_parent = Some(parent.into());
        self
    }

    pub fn with_client_retries(mut self, retries: u32) -> Self {
        self.client_retries = Some(retries);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Build from a host property map. Known property names fill the named
    /// settings; every other entry becomes an override.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> ClientResult<Self> {
        let mut config = Self::new();
        for (name, value) in properties {
            match name.as_str() {
                CONFIG_FILES_PROPERTY => config.resource_files = Some(value.clone()),
                QUORUM_PROPERTY => config.zookeeper_quorum = Some(value.clone()),
                ZNODE_PARENT_PROPERTY => config.zookeeper_znode_parent = Some(value.clone()),
                CLIENT_PORT_PROPERTY => {
                    config.zookeeper_client_port = Some(parse_property(name, value)?);
                }
                CLIENT_RETRIES_PROPERTY => {
                    config.client_retries = Some(parse_property(name, value)?);
                }
                _ => config.overrides.push((name.clone(), value.clone())),
            }
        }
        Ok(config)
    }

    /// Check the settings before any connection attempt.
    ///
    /// Either resource files or all four named settings must be present.
    pub fn validate(&self) -> Result<(), String> {
        let has_files = self.resource_files.as_deref().is_some_and(|f| !f.trim().is_empty());
        let has_all_named = self.zookeeper_quorum.is_some()
            && self.zookeeper_client_port.is_some()
            && self.zookeeper_znode_parent.is_some()
            && self.client_retries.is_some();
        if !has_files && !has_all_named {
            return Err(
                "either resource files or all of quorum, client port, znode parent and client retries must be set"
                    .into(),
            );
        }

        if let Some(quorum) = &self.zookeeper_quorum {
            if quorum.trim().is_empty() {
                return Err("zookeeper quorum must not be blank".into());
            }
        }
        if self.zookeeper_client_port == Some(0) {
            return Err("zookeeper client port must be in [1, 65535]".into());
        }
        if let Some(parent) = &self.zookeeper_znode_parent {
            if parent.trim().is_empty() {
                return Err("zookeeper znode parent must not be blank".into());
            }
        }
        if self.client_retries == Some(0) {
            return Err("client retries must be > 0".into());
        }
        for (key, value) in &self.overrides {
            if key.trim().is_empty() {
                return Err("override key must not be blank".into());
            }
            if value.is_empty() {
                return Err(format!("override {} has an empty value", key));
            }
        }
        Ok(())
    }

    /// Resource files, trimmed, in listed order.
    pub fn resource_paths(&self) -> Vec<&str> {
        self.resource_files
            .as_deref()
            .map(|files| files.split(',').map(str::trim).filter(|f| !f.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Store configuration: defaults, then resource files, then named
    /// settings, then overrides.
    pub fn resolve(&self) -> StoreResult<Configuration> {
        let mut conf = Configuration::create();
        for path in self.resource_paths() {
            conf.add_resource(path)?;
        }

        if let Some(quorum) = &self.zookeeper_quorum {
            conf.set(QUORUM_KEY, quorum.as_str());
        }
        if let Some(port) = self.zookeeper_client_port {
            conf.set(CLIENT_PORT_KEY, port.to_string());
        }
        if let Some(parent) = &self.zookeeper_znode_parent {
            conf.set(ZNODE_PARENT_KEY, parent.as_str());
        }
        if let Some(retries) = self.client_retries {
            conf.set(CLIENT_RETRIES_KEY, retries.to_string());
        }

        for (key, value) in &self.overrides {
            conf.set(key.as_str(), value.as_str());
        }
        Ok(conf)
    }
}

fn parse_property<T: std::str::FromStr>(name: &str, value: &str) -> ClientResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ClientError::ConfigValidation(format!("property {} has invalid value {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn resource(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn explicit() -> ClientConfig {
        ClientConfig::new()
            .with_quorum("zk1,zk2")
            .with_client_port(2181)
            .with_znode_parent("/hbase")
            .with_client_retries(3)
    }

    #[test]
    fn test_nothing_supplied_is_rejected() {
        assert!(ClientConfig::new().validate().is_err());
        assert!(ClientConfig::new().with_resource_files("  ").validate().is_err());
    }

    #[test]
    fn test_partial_named_settings_rejected() {
        let config = ClientConfig::new()
            .with_quorum("zk1")
            .with_client_port(2181)
            .with_znode_parent("/hbase");
        assert!(config.validate().is_err());
        assert!(config.with_client_retries(1).validate().is_ok());
    }

    #[test]
    fn test_resource_files_alone_suffice() {
        assert!(ClientConfig::new().with_resource_files("a.json").validate().is_ok());
    }

    #[test]
    fn test_value_checks() {
        assert!(explicit().with_client_port(0).validate().is_err());
        assert!(explicit().with_client_retries(0).validate().is_err());
        assert!(explicit().with_quorum(" ").validate().is_err());
        assert!(explicit().with_znode_parent("").validate().is_err());
        assert!(explicit().with_override("", "x").validate().is_err());
        assert!(explicit().with_override("k", "").validate().is_err());
        assert!(explicit().with_override("k", "v").validate().is_ok());
    }

    #[test]
    fn test_precedence_files_then_named_then_overrides() {
        let file = resource(r#"{
            "hbase.zookeeper.quorum": "from-file",
            "zookeeper.znode.parent": "/file",
            "custom.setting": "file"
        }"#);
        let config = ClientConfig::new()
            .with_resource_files(file.path().to_string_lossy())
            .with_quorum("named")
            .with_override("custom.setting", "override")
            .with_override(QUORUM_KEY, "overridden");

        let conf = config.resolve().unwrap();
        assert_eq!(conf.get(QUORUM_KEY), Some("overridden"));
        assert_eq!(conf.get(ZNODE_PARENT_KEY), Some("/file"));
        assert_eq!(conf.get("custom.setting"), Some("override"));
        // untouched defaults survive
        assert_eq!(conf.get(CLIENT_PORT_KEY), Some("2181"));
    }

    #[test]
    fn test_later_resource_file_wins() {
        let first = resource(r#"{"hbase.client.retries.number": 5}"#);
        let second = resource(r#"{"hbase.client.retries.number": 7}"#);
        let files = format!("{} , {}", first.path().display(), second.path().display());
        let config = ClientConfig::new().with_resource_files(files);

        assert_eq!(config.resource_paths().len(), 2);
        let conf = config.resolve().unwrap();
        assert_eq!(conf.get_u32(CLIENT_RETRIES_KEY).unwrap(), Some(7));
        assert_eq!(conf.resources().len(), 2);
    }

    #[test]
    fn test_missing_resource_file_fails_resolve() {
        let config = ClientConfig::new().with_resource_files("/definitely/not/here.json");
        assert!(config.validate().is_ok());
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_from_properties() {
        let mut props = BTreeMap::new();
        props.insert(QUORUM_PROPERTY.to_string(), "zk1".to_string());
        props.insert(CLIENT_PORT_PROPERTY.to_string(), "2222".to_string());
        props.insert(ZNODE_PARENT_PROPERTY.to_string(), "/store".to_string());
        props.insert(CLIENT_RETRIES_PROPERTY.to_string(), "4".to_string());
        props.insert("hbase.rpc.timeout".to_string(), "5000".to_string());

        let config = ClientConfig::from_properties(&props).unwrap();
        assert_eq!(config, explicit_from("zk1", 2222, "/store", 4).with_override("hbase.rpc.timeout", "5000"));
        assert!(config.validate().is_ok());

        props.insert(CLIENT_PORT_PROPERTY.to_string(), "port".to_string());
        assert!(matches!(
            ClientConfig::from_properties(&props),
            Err(ClientError::ConfigValidation(_))
        ));
    }

    fn explicit_from(quorum: &str, port: u16, parent: &str, retries: u32) -> ClientConfig {
        ClientConfig::new()
            .with_quorum(quorum)
            .with_client_port(port)
            .with_znode_parent(parent)
            .with_client_retries(retries)
    }
}
