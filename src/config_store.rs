//! Durable configuration.
//!
//! Configuration is an ordered key/value record with an append-only schema:
//! existing keys never get removed or renamed, and keys this version does
//! not know about are preserved verbatim across a load/save round-trip.
//! The orchestrator and step bodies only ever read configuration; writes go
//! through `ConfigStore::set`, which the caller may invoke only after
//! obtaining explicit user confirmation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HostPrepError, Result};
use crate::persist::write_atomic;

/// Typed view of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Target host this deployment provisions.
    #[serde(default)]
    pub target_host: String,

    /// Network interface to configure (e.g. `eth0`).
    #[serde(default)]
    pub network_interface: String,

    /// Static address in CIDR form (e.g. `192.168.10.2/24`).
    #[serde(default)]
    pub network_address: String,

    /// Default gateway address.
    #[serde(default)]
    pub network_gateway: String,

    /// Directory backing the storage pool.
    #[serde(default)]
    pub storage_pool: String,

    /// Source URL of the guest image.
    #[serde(default)]
    pub image_url: String,

    /// Name of the guest to deploy.
    #[serde(default)]
    pub deployment_name: String,

    /// Keys from newer versions, preserved verbatim and in order.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Keys required before deployment steps can run. Used by the configuration
/// completeness validation check.
pub const REQUIRED_KEYS: &[&str] = &[
    "target_host",
    "network_interface",
    "network_address",
    "network_gateway",
    "storage_pool",
    "image_url",
    "deployment_name",
];

impl Configuration {
    /// Read one key by name. Known keys read from the typed fields and
    /// yield `None` while unset, so "not yet configured" is distinguishable
    /// from a present value; anything else falls through to the preserved
    /// extras.
    pub fn get(&self, key: &str) -> Option<String> {
        let set = |value: &str| {
            if value.trim().is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        };
        match key {
            "target_host" => set(&self.target_host),
            "network_interface" => set(&self.network_interface),
            "network_address" => set(&self.network_address),
            "network_gateway" => set(&self.network_gateway),
            "storage_pool" => set(&self.storage_pool),
            "image_url" => set(&self.image_url),
            "deployment_name" => set(&self.deployment_name),
            _ => self.extra.get(key).map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    /// True for keys with a typed field in this schema version.
    pub fn is_known_key(key: &str) -> bool {
        REQUIRED_KEYS.contains(&key)
    }

    /// Write one key by name. Unknown keys land in the extras map so a
    /// newer version's keys can still be edited by this one.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "target_host" => self.target_host = value.to_string(),
            "network_interface" => self.network_interface = value.to_string(),
            "network_address" => self.network_address = value.to_string(),
            "network_gateway" => self.network_gateway = value.to_string(),
            "storage_pool" => self.storage_pool = value.to_string(),
            "image_url" => self.image_url = value.to_string(),
            "deployment_name" => self.deployment_name = value.to_string(),
            _ => {
                self.extra.insert(
                    key.to_string(),
                    serde_json::Value::String(value.to_string()),
                );
            }
        }
    }

    /// Required keys that are still unset, in schema order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| self.get(key).is_none())
            .collect()
    }
}

/// File-backed store for `Configuration`.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration. Missing file yields defaults; a malformed
    /// file is surfaced as a persistence error.
    pub fn load(&self) -> Result<Configuration> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                HostPrepError::persistence(format!(
                    "config file {} is malformed: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Configuration::default()),
            Err(e) => Err(HostPrepError::persistence(format!(
                "cannot read config file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Persist the full configuration atomically.
    pub fn save(&self, config: &Configuration) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, &json)
    }

    /// Set one key and persist immediately.
    ///
    /// The caller must have obtained explicit user confirmation before
    /// calling this; the store itself never prompts.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut config = self.load()?;
        config.set(key, value);
        self.save(&config)?;
        log::info!("config key {} updated", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(dir.path().join("config.json"))
            .load()
            .unwrap();
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn test_set_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        store.set("target_host", "hv01.example.net").unwrap();
        store.set("network_interface", "eth0").unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.target_host, "hv01.example.net");
        assert_eq!(config.network_interface, "eth0");
    }

    #[test]
    fn test_unknown_keys_preserved_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"target_host":"hv01","vlan_tag":42,"future_flag":"on"}"#,
        )
        .unwrap();

        let store = ConfigStore::new(&path);
        store.set("deployment_name", "guest01").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["vlan_tag"], 42);
        assert_eq!(raw["future_flag"], "on");
        assert_eq!(raw["deployment_name"], "guest01");
    }

    #[test]
    fn test_unset_known_key_reads_as_none() {
        let mut config = Configuration::default();
        assert_eq!(config.get("target_host"), None);
        // whitespace-only is still unset
        config.set("target_host", "  ");
        assert_eq!(config.get("target_host"), None);

        config.set("target_host", "hv01");
        assert_eq!(config.get("target_host").as_deref(), Some("hv01"));

        assert!(Configuration::is_known_key("target_host"));
        assert!(!Configuration::is_known_key("vlan_tag"));
    }

    #[test]
    fn test_get_reads_extras() {
        let mut config = Configuration::default();
        config.set("future_flag", "on");
        assert_eq!(config.get("future_flag").as_deref(), Some("on"));
        assert_eq!(config.get("not_a_key"), None);
    }

    #[test]
    fn test_missing_required_in_schema_order() {
        let mut config = Configuration::default();
        assert_eq!(config.missing_required().len(), REQUIRED_KEYS.len());

        config.set("target_host", "hv01");
        config.set("image_url", "https://images.example.net/base.qcow2");
        let missing = config.missing_required();
        assert!(!missing.contains(&"target_host"));
        assert!(!missing.contains(&"image_url"));
        assert_eq!(missing[0], "network_interface");
    }
}
