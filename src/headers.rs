//! The header container shared by messages and trailers.
//!
//! Maps lowercase field names to ordered value lists. Every key that is
//! present has at least one value; removing the last value removes the key.
//! Key iteration order is not part of the contract, value order is.
//!
//! Positional operations accept negative indices counting from the end of the
//! value list (`-1` is the last value).

use std::collections::HashMap;

/// An ordered multi-value HTTP header map.
///
/// Once [`lock`](Headers::lock)ed, every mutating operation panics; locking is
/// a one-way transition used to freeze messages handed across trust
/// boundaries.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: HashMap<String, Vec<String>>,
    locked: bool,
}

/// Resolves a possibly-negative index against a list length.
fn resolve_index(index: isize, len: usize) -> Option<usize> {
    let i = if index < 0 { index + len as isize } else { index };
    if i >= 0 && (i as usize) < len {
        Some(i as usize)
    } else {
        None
    }
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_locked(&self) {
        assert!(!self.locked, "header container is locked and may no longer be modified");
    }

    /// The value of the first header named `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_at(key, 0)
    }

    /// The value of the header named `key` at `index`; negative indices count
    /// from the end of the value list.
    #[must_use]
    pub fn get_at(&self, key: &str, index: isize) -> Option<&str> {
        let vals = self.fields.get(key)?;
        resolve_index(index, vals.len()).map(|i| vals[i].as_str())
    }

    /// Like [`get`](Headers::get), with a default.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, def: &'a str) -> &'a str {
        self.get(key).unwrap_or(def)
    }

    /// Replaces all headers named `key` with a single value.
    ///
    /// # Panics
    /// If the container is locked.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.check_locked();
        self.fields.insert(key.into(), vec![value.into()]);
    }

    /// Appends a header named `key` at the end of its value list.
    ///
    /// # Panics
    /// If the container is locked.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.check_locked();
        self.fields.entry(key.into()).or_default().push(value.into());
    }

    /// Inserts a header named `key` at `index` within its value list; `-1`
    /// appends. Existing values at and after `index` shift up.
    ///
    /// # Panics
    /// If the container is locked, or `index` is neither `-1` nor within
    /// `0..=count(key)`.
    pub fn add_at(&mut self, key: impl Into<String>, value: impl Into<String>, index: isize) {
        self.check_locked();
        let vals = self.fields.entry(key.into()).or_default();
        let i = if index == -1 {
            vals.len()
        } else {
            assert!(
                index >= 0 && index as usize <= vals.len(),
                "index: {index}  header count: {}",
                vals.len()
            );
            index as usize
        };
        vals.insert(i, value.into());
    }

    /// Replaces the value of the header named `key` at `index`, returning the
    /// previous value. A `None` value deletes that single header.
    ///
    /// # Panics
    /// If the container is locked or no header exists at the given index.
    pub fn edit(&mut self, key: &str, value: Option<&str>, index: isize) -> String {
        self.check_locked();
        let vals = self
            .fields
            .get_mut(key)
            .unwrap_or_else(|| panic!("index: {index}  header count: 0"));
        let i = resolve_index(index, vals.len())
            .unwrap_or_else(|| panic!("index: {index}  header count: {}", vals.len()));
        match value {
            Some(v) => std::mem::replace(&mut vals[i], v.to_owned()),
            None => {
                let prev = vals.remove(i);
                if vals.is_empty() {
                    self.fields.remove(key);
                }
                prev
            }
        }
    }

    /// Removes all headers named `key` and returns the first previous value.
    ///
    /// # Panics
    /// If the container is locked.
    pub fn extract(&mut self, key: &str) -> Option<String> {
        self.check_locked();
        self.fields.remove(key).map(|mut vals| vals.swap_remove(0))
    }

    /// Removes all headers named `key` and returns all previous values.
    ///
    /// # Panics
    /// If the container is locked.
    pub fn extract_all(&mut self, key: &str) -> Vec<String> {
        self.check_locked();
        self.fields.remove(key).unwrap_or_default()
    }

    /// Appends `value` to the last existing header named `key`, separated by
    /// `", "`, or sets the header if absent.
    ///
    /// # Panics
    /// If the container is locked.
    pub fn append(&mut self, key: &str, value: &str) {
        self.append_with(key, value, ", ", -1);
    }

    /// Appends `value` to the header named `key` at `index`, separated by
    /// `separator`, or sets the header if no header with that name exists.
    ///
    /// # Panics
    /// If the container is locked, or headers named `key` exist but `index`
    /// is out of range.
    pub fn append_with(&mut self, key: &str, value: &str, separator: &str, index: isize) {
        self.check_locked();
        match self.fields.get_mut(key) {
            Some(vals) => {
                let i = resolve_index(index, vals.len())
                    .unwrap_or_else(|| panic!("index: {index}  header count: {}", vals.len()));
                vals[i].push_str(separator);
                vals[i].push_str(value);
            }
            None => self.set(key, value),
        }
    }

    /// The number of headers named `key`.
    #[must_use]
    pub fn count(&self, key: &str) -> usize {
        self.fields.get(key).map_or(0, Vec::len)
    }

    /// Whether at least one header named `key` exists.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Removes all headers named `key`.
    ///
    /// # Panics
    /// If the container is locked.
    pub fn delete(&mut self, key: &str) {
        self.check_locked();
        self.fields.remove(key);
    }

    /// Removes the header named `key` at `index`, returning its value.
    ///
    /// # Panics
    /// If the container is locked or no header exists at the given index.
    pub fn delete_at(&mut self, key: &str, index: isize) -> String {
        self.edit(key, None, index)
    }

    /// Iterates over the distinct header names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The number of distinct header names.
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.fields.len()
    }

    /// Flattens the container into (name, value) pairs. Names repeat when a
    /// header has multiple values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .flat_map(|(k, vals)| vals.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Freezes this container. Irreversible; later mutation panics.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}
