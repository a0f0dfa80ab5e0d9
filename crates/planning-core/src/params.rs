use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// String-keyed parameter bag handed to calculators, patterns and expanders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.0
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        match self.0.get(key) {
            Some(v) => v
                .as_u64()
                .map(|n| n as usize)
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as usize))
                .unwrap_or(default),
            None => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_str<'a>(&'a self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// `other` wins on key collisions.
    pub fn merged(&self, other: &Params) -> Params {
        let mut out = self.clone();
        for (k, v) in &other.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters_fall_back() {
        let p = Params::new()
            .with("a", 1.5)
            .with("n", 3)
            .with("flag", true)
            .with("name", "x");
        assert_eq!(p.get_f64("a", 0.0), 1.5);
        assert_eq!(p.get_f64("missing", 2.0), 2.0);
        assert_eq!(p.get_usize("n", 0), 3);
        assert_eq!(p.get_usize("a", 0), 1);
        assert!(p.get_bool("flag", false));
        assert!(!p.get_bool("name", false));
        assert_eq!(p.get_str("name"), Some("x"));
    }

    #[test]
    fn test_merge_prefers_override() {
        let base = Params::new().with("a", 1).with("b", 2);
        let over = Params::new().with("b", 5);
        let merged = base.merged(&over);
        assert_eq!(merged.get_usize("a", 0), 1);
        assert_eq!(merged.get_usize("b", 0), 5);
    }
}
