//! Port names and carriers.
//!
//! A port is a named endpoint registered with the naming service. Names are
//! path-like (`/coman/left_arm/state:o`) and unique across the registry.

use crate::consts::MAX_PORT_NAME_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a string is not a valid port name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortNameError {
    /// Name does not start with `/`.
    #[error("port name must start with '/': {0:?}")]
    MissingSlash(String),

    /// Name is just `/`.
    #[error("port name is empty")]
    Empty,

    /// Name contains whitespace or control characters.
    #[error("port name contains whitespace or control characters: {0:?}")]
    IllegalCharacter(String),

    /// Name exceeds [`MAX_PORT_NAME_LEN`].
    #[error("port name is {len} bytes, limit is {MAX_PORT_NAME_LEN}")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
    },
}

/// A validated, registry-unique port name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortName(String);

impl PortName {
    /// Validate and wrap a port name.
    pub fn new(name: impl Into<String>) -> Result<Self, PortNameError> {
        let name = name.into();
        if !name.starts_with('/') {
            return Err(PortNameError::MissingSlash(name));
        }
        if name.len() == 1 {
            return Err(PortNameError::Empty);
        }
        if name.len() > MAX_PORT_NAME_LEN {
            return Err(PortNameError::TooLong { len: name.len() });
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(PortNameError::IllegalCharacter(name));
        }
        Ok(Self(name))
    }

    /// The name as given, including the leading `/`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PortName {
    type Err = PortNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PortName {
    type Error = PortNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PortName> for String {
    fn from(value: PortName) -> Self {
        value.0
    }
}

/// Carrier used to move data from a publisher to a subscriber.
///
/// Only the best-effort datagram carrier exists: delivery, ordering and
/// arrival are not guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    /// Unreliable UDP datagrams.
    #[default]
    Udp,
}

impl Carrier {
    /// Whether the carrier retransmits lost data.
    pub const fn is_reliable(self) -> bool {
        match self {
            Self::Udp => false,
        }
    }

    /// Lowercase carrier name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Carrier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            other => Err(format!("unsupported carrier '{other}' (expected 'udp')")),
        }
    }
}
