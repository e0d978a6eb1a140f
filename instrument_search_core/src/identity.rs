//! Provider-qualified identifiers.
//!
//! An [`ExternalId`] is written as `{id_prefix}:{native_id}`. Prefixes are
//! restricted at configuration load to characters other than `:`, so the first
//! separator always ends the prefix and native ids may contain any character,
//! including further separators.

use crate::config::Settings;
use crate::error::IdentifierError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId {
    id_prefix: String,
    native_id: String,
}

impl ExternalId {
    pub fn new(id_prefix: impl Into<String>, native_id: impl Into<String>) -> Self {
        Self {
            id_prefix: id_prefix.into(),
            native_id: native_id.into(),
        }
    }

    pub fn id_prefix(&self) -> &str {
        &self.id_prefix
    }

    pub fn native_id(&self) -> &str {
        &self.native_id
    }

    pub fn into_parts(self) -> (String, String) {
        (self.id_prefix, self.native_id)
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.id_prefix, SEPARATOR, self.native_id)
    }
}

/// Shape-only parsing. Use [`decode`] to also check the prefix is configured.
impl FromStr for ExternalId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IdentifierError::Malformed(s.to_string());
        let (prefix, native) = s.split_once(SEPARATOR).ok_or_else(malformed)?;
        if prefix.is_empty() || native.is_empty() || prefix.trim() != prefix {
            return Err(malformed());
        }
        Ok(Self::new(prefix, native))
    }
}

impl Serialize for ExternalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub fn encode(id_prefix: &str, native_id: &str) -> String {
    ExternalId::new(id_prefix, native_id).to_string()
}

/// Parse an identifier and check its prefix against the configured providers.
pub fn decode(settings: &Settings, external_id: &str) -> Result<ExternalId, IdentifierError> {
    let id: ExternalId = external_id.parse()?;
    if !settings.is_known_prefix(id.id_prefix()) {
        return Err(IdentifierError::UnknownPrefix {
            identifier: external_id.to_string(),
            id_prefix: id.id_prefix.clone(),
        });
    }
    Ok(id)
}
