//! Entity identity - opaque prefixed ID tokens
//!
//! Every record carries an ID of the form `PREFIX-XXXXXXX` where the prefix
//! names the entity kind (RCA, ACT, EVD, INC) and the token is seven random
//! characters from A-Z0-9. IDs are generated once at creation and never
//! reused.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters used in ID tokens
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the random token portion
const TOKEN_LEN: usize = 7;

/// Entity type prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityPrefix {
    /// Root-cause analysis record
    Rca,
    /// Remedial action
    Act,
    /// Evidence record
    Evd,
    /// Incident
    Inc,
}

impl EntityPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::Rca => "RCA",
            EntityPrefix::Act => "ACT",
            EntityPrefix::Evd => "EVD",
            EntityPrefix::Inc => "INC",
        }
    }
}

impl fmt::Display for EntityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityPrefix {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RCA" => Ok(EntityPrefix::Rca),
            "ACT" => Ok(EntityPrefix::Act),
            "EVD" => Ok(EntityPrefix::Evd),
            "INC" => Ok(EntityPrefix::Inc),
            _ => Err(IdParseError::UnknownPrefix(s.to_string())),
        }
    }
}

/// Errors from parsing an entity ID string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("Unknown entity prefix: {0}")]
    UnknownPrefix(String),

    #[error("Malformed entity ID: {0}")]
    Malformed(String),
}

/// A unique entity identifier: `PREFIX-XXXXXXX`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    prefix: EntityPrefix,
    token: String,
}

impl EntityId {
    /// Generate a fresh ID with a random 7-character token
    pub fn new(prefix: EntityPrefix) -> Self {
        let mut rng = rand::rng();
        let token = (0..TOKEN_LEN)
            .map(|_| TOKEN_CHARSET[rng.random_range(0..TOKEN_CHARSET.len())] as char)
            .collect();
        Self { prefix, token }
    }

    /// The entity kind prefix
    pub fn prefix(&self) -> EntityPrefix {
        self.prefix
    }

    /// Parse an ID string, validating prefix and token shape
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        let (prefix_str, token) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::Malformed(s.to_string()))?;
        let prefix = prefix_str.parse::<EntityPrefix>()?;
        if token.is_empty() || !token.bytes().all(|b| TOKEN_CHARSET.contains(&b)) {
            return Err(IdParseError::Malformed(s.to_string()));
        }
        Ok(Self {
            prefix,
            token: token.to_string(),
        })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix.as_str(), self.token)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}
