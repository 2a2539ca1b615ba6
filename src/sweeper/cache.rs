//! Dotted-key variable cache used to thread parent values into child listings.
use std::collections::BTreeMap;

/// Value stored under a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheValue {
    /// Auto-created on a read miss; renders as the empty string.
    #[default]
    Empty,
    /// A value published by a parent level.
    Value(String),
}

impl CacheValue {
    /// Textual form used in command templates.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Value(v) => v,
        }
    }
}

/// Namespace of dotted keys such as `item.server.id`.
///
/// Reads through [`get`](Self::get) create an empty entry on a miss, so a
/// template referencing a key nobody wrote still renders. Keys are never
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableCache {
    entries: BTreeMap<String, CacheValue>,
}

impl VariableCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.to_string(), CacheValue::Value(value.into()));
    }

    /// Read `key`, creating an [`CacheValue::Empty`] entry if absent.
    pub fn get(&mut self, key: &str) -> &CacheValue {
        self.entries.entry(key.to_string()).or_default()
    }

    /// Read `key` as text; missing or empty entries give `""`.
    pub fn value(&mut self, key: &str) -> String {
        self.get(key).as_str().to_string()
    }

    /// Read `key` without creating it.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&CacheValue> {
        self.entries.get(key)
    }
}

/// Render a child-options spec `"<template>:<key>,<key>..."` against `cache`.
///
/// Each `{}` in the template takes the next key's value, in order. Keys that
/// were never written render as empty; surplus slots are left empty too. A
/// spec without `:` is returned unchanged.
///
/// # Examples
///
/// ```
/// use janitor::sweeper::cache::{VariableCache, render_child_options};
///
/// let mut cache = VariableCache::new();
/// cache.set("item.server.id", "abc");
/// assert_eq!(
///     render_child_options("--server {}:item.server.id", &mut cache),
///     "--server abc"
/// );
/// ```
pub fn render_child_options(spec: &str, cache: &mut VariableCache) -> String {
    let Some((template, keys)) = spec.rsplit_once(':') else {
        return spec.to_string();
    };

    let mut values = keys
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| cache.value(k));

    let mut out = String::with_capacity(template.len());
    let mut parts = template.split("{}").peekable();
    while let Some(part) = parts.next() {
        out.push_str(part);
        if parts.peek().is_some() {
            out.push_str(&values.next().unwrap_or_default());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn get_autovivifies_empty() {
        let mut cache = VariableCache::new();
        assert!(cache.lookup("item.a.id").is_none());
        assert_eq!(cache.get("item.a.id"), &CacheValue::Empty);
        assert_eq!(cache.lookup("item.a.id"), Some(&CacheValue::Empty));
        assert_eq!(cache.value("item.a.id"), "");
    }

    #[test]
    fn set_overwrites() {
        let mut cache = VariableCache::new();
        cache.set("item.a.id", "1");
        cache.set("item.a.id", "2");
        assert_eq!(cache.value("item.a.id"), "2");
    }

    #[test]
    fn clones_are_independent_scopes() {
        let mut parent = VariableCache::new();
        parent.set("item.a.id", "1");
        let mut child = parent.clone();
        child.set("item.b.id", "2");
        assert!(parent.lookup("item.b.id").is_none());
        assert_eq!(child.value("item.a.id"), "1");
    }

    #[test]
    fn render_fills_slots_in_order() {
        let mut cache = VariableCache::new();
        cache.set("item.a.id", "A");
        cache.set("item.b.id", "B");
        assert_eq!(
            render_child_options("--a {} --b {}:item.a.id,item.b.id", &mut cache),
            "--a A --b B"
        );
    }

    #[test]
    fn render_missing_key_is_empty() {
        let mut cache = VariableCache::new();
        assert_eq!(
            render_child_options("--a {}:item.never.set", &mut cache),
            "--a "
        );
        assert_eq!(cache.lookup("item.never.set"), Some(&CacheValue::Empty));
    }

    #[test]
    fn render_without_colon_is_verbatim() {
        let mut cache = VariableCache::new();
        assert_eq!(render_child_options("--all", &mut cache), "--all");
    }

    #[test]
    fn render_splits_on_last_colon() {
        let mut cache = VariableCache::new();
        cache.set("item.a.url", "h");
        assert_eq!(
            render_child_options("--url=http://{}:item.a.url", &mut cache),
            "--url=http://h"
        );
    }
}
