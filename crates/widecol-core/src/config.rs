//! Store-client configuration
//!
//! A `Configuration` is a flat map of string settings. It starts from the
//! store defaults, then resource files and explicit `set` calls are layered
//! on top in call order; a later write to a key always replaces the earlier
//! value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Coordination quorum: comma-separated host list, optionally `host:port`
pub const QUORUM_KEY: &str = "hbase.zookeeper.quorum";
/// Coordination client port
pub const CLIENT_PORT_KEY: &str = "hbase.zookeeper.property.clientPort";
/// Root path of the cluster's coordination node
pub const ZNODE_PARENT_KEY: &str = "zookeeper.znode.parent";
/// Number of retries the store client performs for a failed operation
pub const CLIENT_RETRIES_KEY: &str = "hbase.client.retries.number";

const DEFAULTS: [(&str, &str); 4] = [
    (QUORUM_KEY, "localhost"),
    (CLIENT_PORT_KEY, "2181"),
    (ZNODE_PARENT_KEY, "/hbase"),
    (CLIENT_RETRIES_KEY, "35"),
];

/// Resolved store-client settings
#[derive(Debug, Clone)]
pub struct Configuration {
    settings: BTreeMap<String, String>,
    /// Resource files loaded so far, in load order
    resources: Vec<PathBuf>,
}

impl Configuration {
    /// Configuration holding only the store defaults.
    pub fn create() -> Self {
        let settings = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            settings,
            resources: Vec::new(),
        }
    }

    /// Configuration with no settings at all, not even defaults.
    pub fn empty() -> Self {
        Self {
            settings: BTreeMap::new(),
            resources: Vec::new(),
        }
    }

    /// Load a resource file and apply every setting it contains.
    ///
    /// A resource is a JSON object mapping setting names to scalar values.
    /// Numbers and booleans are stored in their textual form.
    pub fn add_resource<P: AsRef<Path>>(&mut self, path: P) -> StoreResult<()> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|e| StoreError::Resource {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let parsed: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| StoreError::Resource {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let object = parsed.as_object().ok_or_else(|| StoreError::Resource {
            path: path.clone(),
            reason: "top-level value must be an object".into(),
        })?;

        for (key, value) in object {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(StoreError::Resource {
                        path,
                        reason: format!("setting `{}` has non-scalar value {}", key, other),
                    })
                }
            };
            self.settings.insert(key.clone(), value);
        }
        self.resources.push(path);
        Ok(())
    }

    /// Set a value, replacing any earlier one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Remove a setting, returning its previous value.
    pub fn unset(&mut self, key: &str) -> Option<String> {
        self.settings.remove(key)
    }

    /// Read a port-sized integer setting.
    pub fn get_u16(&self, key: &str) -> StoreResult<Option<u16>> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<u16>().map_err(|e| StoreError::InvalidConfig {
                    key: key.to_string(),
                    reason: format!("`{}` is not a valid port: {}", raw, e),
                })
            })
            .transpose()
    }

    pub fn get_u32(&self, key: &str) -> StoreResult<Option<u32>> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<u32>().map_err(|e| StoreError::InvalidConfig {
                    key: key.to_string(),
                    reason: format!("`{}` is not a non-negative integer: {}", raw, e),
                })
            })
            .transpose()
    }

    /// Resource files applied to this configuration, in load order.
    pub fn resources(&self) -> &[PathBuf] {
        &self.resources
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

impl Default for Configuration {
    fn default() -> Self { Self::create() }
}
