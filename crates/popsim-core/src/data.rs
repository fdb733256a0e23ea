//! Per-entity key/value store.
//!
//! Values are arbitrary `Clone + Send + Sync` types recovered by runtime type
//! check. Reading a key with a default of a different type than the stored
//! value is an error, never a silent fallback.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::vector::Vector;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("data key {key:?} holds {found}, read as {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Object-safe view of a stored value.
trait DataValue: Any + Send + Sync {
    fn clone_box(&self) -> Box<dyn DataValue>;
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Clone + Send + Sync> DataValue for T {
    fn clone_box(&self) -> Box<dyn DataValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Typed key/value bag. Cloning deep-copies every value, so an entity type's
/// template can be stamped onto each new instance.
#[derive(Default)]
pub struct Data {
    values: BTreeMap<String, Box<dyn DataValue>>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a JSON object into a template.
    ///
    /// Numbers become `f64`, strings `String`, booleans `bool`, two-element
    /// numeric arrays `Vector`. Anything else is kept as `serde_json::Value`.
    pub fn from_json_map(
        map: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        let mut data = Data::new();
        for (key, value) in map {
            match value {
                serde_json::Value::Number(n) => {
                    let f = n.as_f64().ok_or_else(|| ConfigError::UnsupportedDataValue {
                        key: key.clone(),
                    })?;
                    data.set(key, f);
                }
                serde_json::Value::String(s) => data.set(key, s.clone()),
                serde_json::Value::Bool(b) => data.set(key, *b),
                serde_json::Value::Array(items) => match items.as_slice() {
                    [x, y] if x.is_number() && y.is_number() => {
                        let (x, y) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
                        data.set(key, Vector::new(x, y));
                    }
                    _ => data.set(key, value.clone()),
                },
                serde_json::Value::Null | serde_json::Value::Object(_) => {
                    data.set(key, value.clone())
                }
            }
        }
        Ok(data)
    }

    /// Value stored under `key`, or `default` when the key is absent.
    pub fn get<T: Any + Clone>(&self, key: &str, default: T) -> Result<T, DataError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(value) => {
                let value: &dyn DataValue = &**value;
                value
                    .as_any()
                    .downcast_ref::<T>()
                    .cloned()
                    .ok_or_else(|| DataError::TypeMismatch {
                        key: key.to_owned(),
                        expected: type_name::<T>(),
                        found: value.type_name(),
                    })
            }
        }
    }

    pub fn set<T: Any + Clone + Send + Sync>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_owned(), Box::new(value));
    }

    /// Store `value` and return what was there before (or `default`).
    /// The previous value must have the same type as `value`.
    pub fn get_and_set<T: Any + Clone + Send + Sync>(
        &mut self,
        key: &str,
        value: T,
        default: T,
    ) -> Result<T, DataError> {
        let old = self.get(key, default)?;
        self.set(key, value);
        Ok(old)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a key. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl Clone for Data {
    fn clone(&self) -> Self {
        let values = self
            .values
            .iter()
            .map(|(key, value)| {
                let value: &dyn DataValue = &**value;
                (key.clone(), value.clone_box())
            })
            .collect();
        Self { values }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            let value: &dyn DataValue = &**value;
            map.entry(key, &value.type_name());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_returns_default() {
        let data = Data::new();
        assert_eq!(data.get("speed", 2.5).unwrap(), 2.5);
    }

    #[test]
    fn set_then_get() {
        let mut data = Data::new();
        data.set("name", String::from("alpha"));
        assert_eq!(data.get("name", String::new()).unwrap(), "alpha");
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let mut data = Data::new();
        data.set("count", 3_i64);
        let err = data.get("count", 0.0_f64).unwrap_err();
        assert_eq!(
            err,
            DataError::TypeMismatch {
                key: "count".into(),
                expected: "f64",
                found: "i64",
            }
        );
    }

    #[test]
    fn clone_is_deep() {
        let mut template = Data::new();
        template.set("hp", 10.0_f64);
        let mut instance = template.clone();
        instance.set("hp", 4.0_f64);
        assert_eq!(template.get("hp", 0.0).unwrap(), 10.0);
        assert_eq!(instance.get("hp", 0.0).unwrap(), 4.0);
    }

    #[test]
    fn get_and_set_returns_previous() {
        let mut data = Data::new();
        assert_eq!(data.get_and_set("n", 1.0, 0.0).unwrap(), 0.0);
        assert_eq!(data.get_and_set("n", 2.0, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn json_template_conversion() {
        let json = serde_json::json!({
            "range": 128,
            "color": "#ff8800",
            "visible": true,
            "origin": [4, 5.5],
            "tags": ["a", "b"]
        });
        let map: BTreeMap<String, serde_json::Value> = serde_json::from_value(json).unwrap();
        let data = Data::from_json_map(&map).unwrap();

        assert_eq!(data.get("range", 0.0).unwrap(), 128.0);
        assert_eq!(data.get("color", String::new()).unwrap(), "#ff8800");
        assert!(data.get("visible", false).unwrap());
        assert_eq!(data.get("origin", Vector::ZERO).unwrap(), Vector::new(4.0, 5.5));
        assert!(data
            .get("tags", serde_json::Value::Null)
            .unwrap()
            .is_array());
    }
}
