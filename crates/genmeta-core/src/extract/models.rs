//! Ordered, de-duplicated model name collection.

use std::collections::HashSet;

/// Model and component names in first-seen order, without duplicates.
///
/// Each extraction builds its own set.
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl ModelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name after trimming. Empty and already-present names are ignored.
    ///
    /// Returns `true` if the name was appended.
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string());
        self.order.push(name.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

impl<'a> Extend<&'a str> for ModelSet {
    fn extend<I: IntoIterator<Item = &'a str>>(&mut self, iter: I) {
        for name in iter {
            self.add(name);
        }
    }
}
