//! Property collections with build engine semantics.
//!
//! Property names compare case-insensitively but keep the spelling they were
//! first defined with. Property groups in the project file keep their
//! declaration order, which matters because later values may reference
//! earlier ones.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Evaluated properties keyed case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
  entries: BTreeMap<String, (String, String)>,
}

impl PropertyMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .entries
      .get(&name.to_ascii_lowercase())
      .map(|(_, value)| value.as_str())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.contains_key(&name.to_ascii_lowercase())
  }

  /// Insert or replace a value. Returns true when the stored value changed.
  pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
    let value = value.into();
    let key = name.to_ascii_lowercase();
    match self.entries.get_mut(&key) {
      Some((_, existing)) if *existing == value => false,
      Some((_, existing)) => {
        *existing = value;
        true
      }
      None => {
        self.entries.insert(key, (name.to_string(), value));
        true
      }
    }
  }

  pub fn remove(&mut self, name: &str) -> Option<String> {
    self.entries.remove(&name.to_ascii_lowercase()).map(|(_, value)| value)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.values().map(|(name, value)| (name.as_str(), value.as_str()))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for PropertyMap {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut map = PropertyMap::new();
    for (name, value) in iter {
      map.set(name.as_ref(), value);
    }
    map
  }
}

/// An ordered list of property definitions, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyList(Vec<(String, String)>);

impl PropertyList {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }

  /// Set a value in place, appending when the name is new.
  pub fn set(&mut self, name: &str, value: impl Into<String>) {
    let value = value.into();
    match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
      Some((_, existing)) => *existing = value,
      None => self.0.push((name.to_string(), value)),
    }
  }

  pub fn remove(&mut self, name: &str) -> Option<String> {
    let index = self.0.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))?;
    Some(self.0.remove(index).1)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyList {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

impl Serialize for PropertyList {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.0.len()))?;
    for (name, value) in &self.0 {
      map.serialize_entry(name, value)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for PropertyList {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
      type Value = PropertyList;

      fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of string properties")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, value)) = access.next_entry::<String, String>()? {
          entries.push((name, value));
        }
        Ok(PropertyList(entries))
      }
    }

    deserializer.deserialize_map(ListVisitor)
  }
}
