//! Per-request typed value store.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Associates a key type with the type of value stored under it.
///
/// Keys are normally private marker types. Because nothing outside the
/// defining module can name the key, nothing outside that module can read or
/// overwrite its value.
///
/// # Examples
///
/// ```
/// use safeflight::{FlightKey, FlightValues};
///
/// struct RequestTag;
/// impl FlightKey for RequestTag {
///     type Value = String;
/// }
///
/// let mut values = FlightValues::new();
/// values.put::<RequestTag>("checkout".to_string());
/// assert_eq!(values.get::<RequestTag>().map(String::as_str), Some("checkout"));
/// ```
pub trait FlightKey: 'static {
    /// Type of the value stored under this key.
    type Value: 'static;
}

/// Values passed between interceptor phases and handlers of one request.
///
/// A fresh store is created for every request and dropped when the request
/// completes. It is only touched by the request's own worker, so there is no
/// locking.
#[derive(Default)]
pub struct FlightValues {
    values: HashMap<TypeId, Box<dyn Any>>,
}

impl FlightValues {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `K`, replacing any previous value.
    pub fn put<K: FlightKey>(&mut self, value: K::Value) {
        self.values.insert(TypeId::of::<K>(), Box::new(value));
    }

    /// Returns the value stored under `K`.
    pub fn get<K: FlightKey>(&self) -> Option<&K::Value> {
        self.values
            .get(&TypeId::of::<K>())
            .and_then(|v| v.downcast_ref::<K::Value>())
    }

    /// Returns a mutable reference to the value stored under `K`.
    pub fn get_mut<K: FlightKey>(&mut self) -> Option<&mut K::Value> {
        self.values
            .get_mut(&TypeId::of::<K>())
            .and_then(|v| v.downcast_mut::<K::Value>())
    }

    /// Returns true if a value is stored under `K`.
    pub fn contains<K: FlightKey>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<K>())
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Values are opaque; only the count is shown.
impl fmt::Debug for FlightValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightValues")
            .field("len", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nonce;
    impl FlightKey for Nonce {
        type Value = String;
    }

    struct Counter;
    impl FlightKey for Counter {
        type Value = u32;
    }

    // Same value type as `Counter`, different key.
    struct OtherCounter;
    impl FlightKey for OtherCounter {
        type Value = u32;
    }

    #[test]
    fn empty_store_returns_none() {
        let values = FlightValues::new();
        assert!(values.get::<Nonce>().is_none());
        assert!(values.is_empty());
    }

    #[test]
    fn put_overwrites_silently() {
        let mut values = FlightValues::new();
        values.put::<Counter>(1);
        values.put::<Counter>(2);
        assert_eq!(values.get::<Counter>(), Some(&2));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn keys_with_same_value_type_do_not_collide() {
        let mut values = FlightValues::new();
        values.put::<Counter>(1);
        values.put::<OtherCounter>(7);
        assert_eq!(values.get::<Counter>(), Some(&1));
        assert_eq!(values.get::<OtherCounter>(), Some(&7));
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut values = FlightValues::new();
        values.put::<Nonce>("a".to_string());
        values.get_mut::<Nonce>().unwrap().push('b');
        assert_eq!(values.get::<Nonce>().map(String::as_str), Some("ab"));
        assert!(values.contains::<Nonce>());
        assert!(!values.contains::<Counter>());
    }

    #[test]
    fn debug_does_not_expose_values() {
        let mut values = FlightValues::new();
        values.put::<Nonce>("secret-nonce".to_string());
        let out = format!("{:?}", values);
        assert!(!out.contains("secret-nonce"));
        assert!(out.contains("len: 1"));
    }
}
