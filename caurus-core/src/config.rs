//! Configuration file management.
//!
//! INI-style `caurus.cfg`: a `[service]` section holding the service id and
//! hex-encoded MAC/encryption keys, plus one `[account.N]` section per
//! enrolled account (id, key, and the 18-byte salt established during
//! activation). All key material is hex on disk.

use std::collections::BTreeMap;
use std::path::Path;

use crate::types::{hex_array, hex_encode, CaurusError, Result};

/// Service identity section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub id: u8,
    pub mac: [u8; 16],
    pub key: [u8; 16],
}

/// One enrolled account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: [u8; 16],
    pub key: [u8; 16],
    pub salt: [u8; 18],
}

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub service: ServiceConfig,
    pub accounts: BTreeMap<u16, AccountRecord>,
}

/// Load a config file from disk.
pub fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Save a config to disk.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    std::fs::write(path, serialize_config(config))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse INI-style config text.
pub fn parse_config(text: &str) -> Result<Config> {
    let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') || stripped.starts_with(';') {
            continue;
        }
        if let Some(name) = stripped.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            current = Some(name.trim().to_string());
            sections.entry(name.trim().to_string()).or_default();
        } else if let Some((key, value)) = stripped.split_once('=') {
            let section = current
                .as_ref()
                .ok_or_else(|| CaurusError::Config(format!("key outside section: {stripped}")))?;
            sections
                .get_mut(section)
                .expect("section inserted on entry")
                .insert(key.trim().to_string(), value.trim().to_string());
        } else {
            return Err(CaurusError::Config(format!("unparseable line: {stripped}")));
        }
    }

    let service = sections
        .get("service")
        .ok_or_else(|| CaurusError::Config("missing [service] section".into()))?;
    let service = ServiceConfig {
        id: field(service, "service", "id")?
            .parse()
            .map_err(|_| CaurusError::Config("service id is not a number".into()))?,
        mac: hex_array(field(service, "service", "mac")?)?,
        key: hex_array(field(service, "service", "key")?)?,
    };
    if service.id >= 64 {
        return Err(CaurusError::Config(format!(
            "service id {} out of range",
            service.id
        )));
    }

    let mut accounts = BTreeMap::new();
    for (name, entries) in &sections {
        let Some(number) = name.strip_prefix("account.") else {
            continue;
        };
        let number: u16 = number
            .parse()
            .map_err(|_| CaurusError::Config(format!("bad account section [{name}]")))?;
        if number >= 1 << 10 {
            return Err(CaurusError::Config(format!(
                "account number {number} out of range"
            )));
        }
        accounts.insert(
            number,
            AccountRecord {
                id: hex_array(field(entries, name, "id")?)?,
                key: hex_array(field(entries, name, "key")?)?,
                salt: hex_array(field(entries, name, "salt")?)?,
            },
        );
    }

    Ok(Config { service, accounts })
}

fn field<'a>(
    section: &'a BTreeMap<String, String>,
    name: &str,
    key: &str,
) -> Result<&'a String> {
    section
        .get(key)
        .ok_or_else(|| CaurusError::Config(format!("missing {key} in [{name}]")))
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize a config to INI text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec![
        "[service]".to_string(),
        format!("id = {}", config.service.id),
        format!("mac = {}", hex_encode(&config.service.mac)),
        format!("key = {}", hex_encode(&config.service.key)),
    ];
    for (number, account) in &config.accounts {
        lines.push(String::new());
        lines.push(format!("[account.{number}]"));
        lines.push(format!("id = {}", hex_encode(&account.id)));
        lines.push(format!("key = {}", hex_encode(&account.key)));
        lines.push(format!("salt = {}", hex_encode(&account.salt)));
    }
    lines.join("\n") + "\n"
}

/// Serialize a single account section, as printed after a successful
/// activation for pasting into the config file.
pub fn serialize_account(number: u16, account: &AccountRecord) -> String {
    [
        format!("[account.{number}]"),
        format!("id = {}", hex_encode(&account.id)),
        format!("key = {}", hex_encode(&account.key)),
        format!("salt = {}", hex_encode(&account.salt)),
    ]
    .join("\n")
        + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
