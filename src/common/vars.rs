//! String variables carried by an execution session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered `name -> value` map of session variables.
///
/// Values are always strings; structured values (http responses) are stored
/// as their JSON serialization and walked by the template resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars(BTreeMap<String, String>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.0.contains_key(key)
    }

    pub fn set<K: Into<String>, V: Into<String>>(
        &mut self,
        key: K,
        value: V,
    ) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with<K: Into<String>, V: Into<String>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(
        &mut self,
        key: &str,
    ) -> Option<String> {
        self.0.remove(key)
    }

    /// Overwrite entries of `self` with every entry of `other`.
    pub fn merge(
        &mut self,
        other: &Vars,
    ) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Vars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<Vars> for serde_json::Value {
    fn from(vars: Vars) -> Self {
        serde_json::Value::Object(vars.0.into_iter().map(|(k, v)| (k, serde_json::Value::String(v))).collect())
    }
}
