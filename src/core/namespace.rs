//! Extension namespace registry
//!
//! Element names may carry a `prefix:` that must be bound to a URI before
//! use. Bindings keep their insertion order so they are written back to the
//! XML section in the order they were declared.

use crate::error::{E57Error, Result};
use tracing::debug;

/// A single prefix to URI binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBinding {
    pub prefix: String,
    pub uri: String,
}

/// Ordered table of namespace bindings with unique prefixes and URIs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceRegistry {
    bindings: Vec<NamespaceBinding>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding
    ///
    /// # Errors
    ///
    /// `DuplicateNamespacePrefix` if the prefix is bound, otherwise
    /// `DuplicateNamespaceUri` if the URI is bound.
    pub fn add(&mut self, prefix: &str, uri: &str) -> Result<()> {
        if self.lookup_prefix(prefix).is_some() {
            return Err(E57Error::DuplicateNamespacePrefix {
                prefix: prefix.to_string(),
                uri: uri.to_string(),
            });
        }
        if self.lookup_uri(uri).is_some() {
            return Err(E57Error::DuplicateNamespaceUri {
                prefix: prefix.to_string(),
                uri: uri.to_string(),
            });
        }

        debug!("Registering namespace {}={}", prefix, uri);
        self.bindings.push(NamespaceBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    pub fn lookup_prefix(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }

    pub fn lookup_uri(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.uri == uri)
            .map(|b| b.prefix.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binding at `index` in insertion order
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn at(&self, index: usize) -> &NamespaceBinding {
        &self.bindings[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamespaceBinding> {
        self.bindings.iter()
    }
}
