//! BIP32-style key derivation paths
//!
//! Path strings use a leading source marker — `m` (from master), `..`
//! (from parent), `.` (from current, the default) — followed by up to ten
//! `/`-separated components, each optionally hardened with a `'` suffix.
//! On the wire a path is the source byte (OR'd into P1) plus 4-byte
//! big-endian components with the top bit marking hardening.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Maximum number of path components accepted by the applet
pub const MAX_COMPONENTS: usize = 10;

/// Hardened derivation marker bit
const HARDENED: u32 = 0x8000_0000;

/// Error type for key path parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyPathError {
    /// More than [`MAX_COMPONENTS`] components
    #[error("too many path components (max {MAX_COMPONENTS})")]
    TooManyComponents,

    /// A component that does not parse as a non-negative integer
    #[error("invalid path component: {0:?}")]
    InvalidComponent(String),
}

/// Starting point of a derivation, encoded into the command's P1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DeriveSource {
    /// Derive from the master key
    #[default]
    FromMaster = 0x00,
    /// Derive from the parent of the current key
    FromParent = 0x40,
    /// Derive from the current key
    FromCurrent = 0x80,
}

/// A parsed derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    source: DeriveSource,
    components: Vec<u32>,
}

impl KeyPath {
    /// Build a path from a source and raw components (hardening bit
    /// included)
    pub fn new(source: DeriveSource, components: Vec<u32>) -> Result<Self, KeyPathError> {
        if components.len() > MAX_COMPONENTS {
            return Err(KeyPathError::TooManyComponents);
        }
        Ok(Self { source, components })
    }

    /// The derivation source
    pub const fn source(&self) -> DeriveSource {
        self.source
    }

    /// The raw components
    pub fn components(&self) -> &[u32] {
        &self.components
    }

    /// Serialize the components as 4-byte big-endian values for the
    /// derive/sign/export commands
    pub fn to_bytes(&self) -> Vec<u8> {
        self.components
            .iter()
            .flat_map(|component| component.to_be_bytes())
            .collect()
    }
}

impl FromStr for KeyPath {
    type Err = KeyPathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let mut tokens = path.split('/').peekable();

        let source = match tokens.peek() {
            Some(&"m") => {
                tokens.next();
                DeriveSource::FromMaster
            }
            Some(&"..") => {
                tokens.next();
                DeriveSource::FromParent
            }
            Some(&".") => {
                tokens.next();
                DeriveSource::FromCurrent
            }
            _ => DeriveSource::FromCurrent,
        };

        let components = tokens
            .filter(|token| !token.is_empty())
            .map(parse_component)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(source, components)
    }
}

fn parse_component(token: &str) -> Result<u32, KeyPathError> {
    // A leading sign would silently change the value; reject it
    if token.starts_with('+') || token.starts_with('-') {
        return Err(KeyPathError::InvalidComponent(token.to_string()));
    }

    let (number, hardened) = match token.strip_suffix('\'') {
        Some(number) => (number, HARDENED),
        None => (token, 0),
    };

    number
        .parse::<u32>()
        .map(|value| value | hardened)
        .map_err(|_| KeyPathError::InvalidComponent(token.to_string()))
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            DeriveSource::FromMaster => write!(f, "m")?,
            DeriveSource::FromParent => write!(f, "..")?,
            DeriveSource::FromCurrent => write!(f, ".")?,
        }

        for component in &self.components {
            write!(f, "/{}", component & !HARDENED)?;
            if component & HARDENED != 0 {
                write!(f, "'")?;
            }
        }
        Ok(())
    }
}
