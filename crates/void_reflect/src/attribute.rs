//! Attribute storage
//!
//! Free-form, typed metadata attached to reflected items (tooltips,
//! categories, editor hints, script visibility, ...). The engine itself only
//! stores them; consumers decide what they mean.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Well-known attribute keys
pub mod keys {
    /// Human-readable description
    pub const TOOLTIP: &str = "Tooltip";
    /// Grouping used by editors
    pub const CATEGORY: &str = "Category";
    /// Hide from script consumers
    pub const EXCLUDE_FROM_SCRIPT: &str = "ExcludeFromScript";
    /// Replacement to suggest for a deprecated item
    pub const DEPRECATED: &str = "Deprecated";
    /// Type name of the enumeration a global enum value belongs to
    pub const ENUM_TYPE: &str = "EnumType";
}

/// Ordered key/value attribute list
#[derive(Clone, Default)]
pub struct AttributeMap {
    entries: Vec<(String, Arc<dyn Any + Send + Sync>)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any previous value under the same key
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        let value: Arc<dyn Any + Send + Sync> = Arc::new(value);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Typed lookup
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AttributeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}
