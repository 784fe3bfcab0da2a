//! Validated SQL identifiers
//!
//! Table and column names are spliced into SQL text, so they never come
//! straight from a caller. An `Ident` can only hold `[A-Za-z_][A-Za-z0-9_]*`
//! (at most 63 bytes); values always travel as bound parameters instead.

use apim_core::errors::ApimError;

const MAX_IDENT_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    pub fn new(name: impl Into<String>) -> Result<Self, ApimError> {
        let name = name.into();
        if is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(ApimError::InvalidIdentifier { ident: name })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `alias.column` with this identifier as the alias
    pub fn qualify(&self, column: &str) -> String {
        format!("{}.{}", self.0, column)
    }
}

fn is_valid(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENT_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
