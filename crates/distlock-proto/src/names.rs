//! Lock name lists.
//!
//! Batch actions take their names from a single free-text field. Names are
//! separated by any run of whitespace, commas, or semicolons, so
//! `"a, b;c   d"` names four locks.

use serde::Serialize;

use crate::errors::{ProtocolError, Result};

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ',' || c == ';'
}

/// Split free text into lock names, discarding empty tokens.
pub fn split_lock_names(input: &str) -> Vec<String> {
    input.split(is_separator).filter(|token| !token.is_empty()).map(str::to_owned).collect()
}

/// Non-empty list of lock names for `mlock`/`munlock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LockNames(Vec<String>);

impl LockNames {
    /// Split `input` on the separator pattern.
    ///
    /// # Errors
    ///
    /// Returns `EmptyLockNames` if no token survives the split.
    pub fn parse(input: &str) -> Result<Self> {
        let names = split_lock_names(input);
        if names.is_empty() {
            return Err(ProtocolError::EmptyLockNames { input: input.to_string() });
        }
        Ok(Self(names))
    }

    /// Wrap already-split names.
    ///
    /// Empty names are dropped; the list must still contain at least one.
    pub fn from_names(names: Vec<String>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().filter(|name| !name.is_empty()).collect();
        if names.is_empty() {
            return Err(ProtocolError::EmptyLockNames { input: String::new() });
        }
        Ok(Self(names))
    }

    /// Names in input order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of names (always at least one).
    pub fn count(&self) -> usize {
        self.0.len()
    }

    /// Names joined with single spaces, for display.
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }

    /// Consume into the underlying vector.
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}
