//! Per-call tag store.
//!
//! Hooks that need to pass data to later hooks in the same call - a timer
//! started in a begin interceptor and read in the end interceptor, an
//! auth decision a parameter hook leaves for the transport - store it here
//! instead of coupling to each other. The store is scoped to a single
//! execution context and never shared across calls.

use std::any::Any;
use std::collections::HashMap;

/// A string-keyed, heterogeneous value store.
///
/// Values are only visible through the concrete type they were stored
/// under; asking for the wrong type behaves as if the key were absent.
#[derive(Default)]
pub struct Tags {
    inner: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Tags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`, returning the previous value if one of
    /// the same type was present.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> Option<T> {
        self.inner
            .insert(key.into(), Box::new(value))
            .and_then(|previous| previous.downcast().ok())
            .map(|boxed| *boxed)
    }

    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.inner.get(key).and_then(|value| value.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.inner
            .get_mut(key)
            .and_then(|value| value.downcast_mut())
    }

    /// Remove and return the value under `key` if it has type `T`.
    ///
    /// A value of a different type under the same key is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if self.get::<T>(key).is_none() {
            return None;
        }
        self.inner
            .remove(key)
            .and_then(|value| value.downcast().ok())
            .map(|boxed| *boxed)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for Tags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tags").field("len", &self.inner.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Tags;

    #[test]
    fn values_round_trip_through_their_type() {
        let mut tags = Tags::new();
        tags.insert("attempt", 3u32);
        tags.insert("label", "primary".to_string());

        assert_eq!(tags.get::<u32>("attempt"), Some(&3));
        assert_eq!(tags.get::<String>("label").map(String::as_str), Some("primary"));
    }

    #[test]
    fn wrong_type_behaves_as_absent() {
        let mut tags = Tags::new();
        tags.insert("attempt", 3u32);

        assert_eq!(tags.get::<String>("attempt"), None);
        assert_eq!(tags.remove::<String>("attempt"), None);
        assert!(tags.contains_key("attempt"));
    }

    #[test]
    fn insert_returns_replaced_value() {
        let mut tags = Tags::new();
        assert_eq!(tags.insert("attempt", 1u32), None);
        assert_eq!(tags.insert("attempt", 2u32), Some(1));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn remove_takes_the_value_out() {
        let mut tags = Tags::new();
        tags.insert("token", "abc".to_string());
        assert_eq!(tags.remove::<String>("token"), Some("abc".to_string()));
        assert!(tags.is_empty());
    }
}
