use std::ops::Bound;
use std::sync::Arc;

use im::{OrdMap, OrdSet};

/// A record type stored in its own table.
///
/// `TABLE` names the table for watch keys and the index ledger. `key` is the
/// primary key; `secondary` optionally names the value indexed by the table's
/// secondary index (policy scope, namespace quota, allocation namespace).
pub trait Record: Clone {
    const TABLE: &'static str;

    fn key(&self) -> &str;

    fn secondary(&self) -> Option<&str> {
        None
    }
}

/// One typed table backed by persistent ordered maps.
///
/// Cloning a table is O(1) and shares structure with the original, which is
/// what makes point-in-time snapshots cheap: readers hold a clone and iterate
/// it without ever blocking the writer.
#[derive(Clone)]
pub struct Table<T: Record> {
    rows: OrdMap<String, Arc<T>>,
    by_secondary: OrdMap<String, OrdSet<String>>,
}

impl<T: Record> Table<T> {
    pub fn new() -> Self {
        Self {
            rows: OrdMap::new(),
            by_secondary: OrdMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Arc<T>> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a record, returning the one it displaced.
    pub fn insert(&mut self, rec: T) -> Option<Arc<T>> {
        let key = rec.key().to_string();
        let secondary = rec.secondary().map(str::to_string);
        let prev = self.rows.insert(key.clone(), Arc::new(rec));

        if let Some(prev) = &prev
            && prev.secondary() != secondary.as_deref()
            && let Some(old) = prev.secondary()
        {
            self.unindex(old, &key);
        }
        if let Some(sec) = secondary {
            let mut set = self.by_secondary.get(&sec).cloned().unwrap_or_default();
            set.insert(key);
            self.by_secondary.insert(sec, set);
        }
        prev
    }

    /// Remove a record by primary key, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Arc<T>> {
        let prev = self.rows.remove(key)?;
        if let Some(sec) = prev.secondary() {
            self.unindex(sec, key);
        }
        Some(prev)
    }

    fn unindex(&mut self, secondary: &str, key: &str) {
        if let Some(set) = self.by_secondary.get(secondary) {
            let mut set = set.clone();
            set.remove(key);
            if set.is_empty() {
                self.by_secondary.remove(secondary);
            } else {
                self.by_secondary.insert(secondary.to_string(), set);
            }
        }
    }

    /// Cursor over every row in primary-key order.
    pub fn iter(&self) -> TableCursor<T> {
        TableCursor {
            rows: self.rows.clone(),
            prefix: None,
            cursor: None,
        }
    }

    /// Cursor over rows whose primary key starts with `prefix`, in
    /// lexicographic key order.
    pub fn prefix(&self, prefix: &str) -> TableCursor<T> {
        TableCursor {
            rows: self.rows.clone(),
            prefix: Some(prefix.to_string()),
            cursor: None,
        }
    }

    /// Cursor over rows whose secondary index value equals `value`, in
    /// primary-key order.
    pub fn by_secondary(&self, value: &str) -> SecondaryCursor<T> {
        SecondaryCursor {
            rows: self.rows.clone(),
            keys: self.by_secondary.get(value).cloned().unwrap_or_default(),
            cursor: None,
        }
    }
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A lazy, restartable cursor over a table snapshot.
///
/// Holds its own clone of the row map, so it stays valid regardless of later
/// writes and can be `rewind`-ed to replay the same point-in-time sequence.
#[derive(Clone)]
pub struct TableCursor<T: Record> {
    rows: OrdMap<String, Arc<T>>,
    prefix: Option<String>,
    cursor: Option<String>,
}

impl<T: Record> TableCursor<T> {
    pub fn rewind(&mut self) {
        self.cursor = None;
    }
}

impl<T: Record> Iterator for TableCursor<T> {
    type Item = Arc<T>;

    fn next(&mut self) -> Option<Arc<T>> {
        let next = match (&self.cursor, &self.prefix) {
            (Some(last), _) => self
                .rows
                .range::<_, str>((Bound::Excluded(last.as_str()), Bound::Unbounded))
                .next(),
            (None, Some(prefix)) => self
                .rows
                .range::<_, str>((Bound::Included(prefix.as_str()), Bound::Unbounded))
                .next(),
            (None, None) => self.rows.iter().next(),
        };
        let (key, value) = next.map(|(k, v)| (k.clone(), v.clone()))?;
        if let Some(prefix) = &self.prefix
            && !key.starts_with(prefix.as_str())
        {
            return None;
        }
        self.cursor = Some(key);
        Some(value)
    }
}

/// Cursor over the rows selected by one secondary index value.
#[derive(Clone)]
pub struct SecondaryCursor<T: Record> {
    rows: OrdMap<String, Arc<T>>,
    keys: OrdSet<String>,
    cursor: Option<String>,
}

impl<T: Record> SecondaryCursor<T> {
    pub fn rewind(&mut self) {
        self.cursor = None;
    }
}

impl<T: Record> Iterator for SecondaryCursor<T> {
    type Item = Arc<T>;

    fn next(&mut self) -> Option<Arc<T>> {
        loop {
            let next = match &self.cursor {
                Some(last) => self
                    .keys
                    .range::<_, str>((Bound::Excluded(last.as_str()), Bound::Unbounded))
                    .next(),
                None => self.keys.iter().next(),
            };
            let key = next.cloned()?;
            self.cursor = Some(key.clone());
            // Index entries are maintained alongside row writes; a miss here
            // would mean a missed unindex, so skip rather than panic.
            if let Some(row) = self.rows.get(&key) {
                return Some(row.clone());
            }
        }
    }
}
