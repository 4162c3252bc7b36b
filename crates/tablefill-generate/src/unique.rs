use std::collections::{HashMap, HashSet};

use crate::generators::GeneratedValue;

/// Values already produced for unique columns during one run, per table and column.
#[derive(Debug, Default)]
pub struct UniqueTracker {
    seen: HashMap<(String, String), HashSet<String>>,
}

impl UniqueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(table: &str, column: &str) -> (String, String) {
        (table.to_lowercase(), column.to_lowercase())
    }

    /// Record values that already exist in the target table.
    pub fn seed<'a>(
        &mut self,
        table: &str,
        column: &str,
        values: impl IntoIterator<Item = &'a GeneratedValue>,
    ) {
        let entry = self.seen.entry(Self::key(table, column)).or_default();
        entry.extend(values.into_iter().filter_map(GeneratedValue::unique_key));
    }

    pub fn len(&self, table: &str, column: &str) -> usize {
        self.seen
            .get(&Self::key(table, column))
            .map(HashSet::len)
            .unwrap_or_default()
    }

    /// Whether `value` was already used. NULL never is.
    pub fn contains(&self, table: &str, column: &str, value: &GeneratedValue) -> bool {
        let Some(key) = value.unique_key() else {
            return false;
        };
        self.seen
            .get(&Self::key(table, column))
            .is_some_and(|used| used.contains(&key))
    }

    /// Record `value`; false when it was already used. NULL never collides.
    pub fn insert(&mut self, table: &str, column: &str, value: &GeneratedValue) -> bool {
        let Some(key) = value.unique_key() else {
            return true;
        };
        self.seen
            .entry(Self::key(table, column))
            .or_default()
            .insert(key)
    }
}
