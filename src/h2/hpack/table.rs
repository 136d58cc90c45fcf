//! HPACK indexing tables (RFC 7541 Section 2.3).
//!
//! The static table is parsed once from an embedded resource; each direction
//! of a connection has its own dynamic table. Entry size is the decoded name
//! length plus the decoded value length plus 32; eviction removes entries
//! from the oldest end until the new entry fits.

use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;

const STATIC_TABLE: &str = include_str!("../../../resources/hpack_static_table");

/// One indexed header field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableEntry {
    pub name: String,
    pub value: Option<String>,
    /// Decoded byte length of the name (may differ from `name.len()` only in
    /// theory; kept separately because table sizing must use decoded lengths).
    pub name_len: usize,
    pub value_len: usize,
}

impl TableEntry {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        let name = name.into();
        let name_len = name.len();
        let value_len = value.as_deref().map_or(0, str::len);
        Self { name, value, name_len, value_len }
    }

    pub fn with_lengths(
        name_len: usize,
        value_len: usize,
        name: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self { name: name.into(), value, name_len, value_len }
    }

    /// RFC 7541 Section 4.1 entry size.
    pub fn size(&self) -> usize {
        self.name_len + self.value_len + 32
    }
}

pub(crate) struct StaticTable {
    base: usize,
    entries: Vec<TableEntry>,
    /// `name\0value` -> array index, for exact matches.
    by_pair: HashMap<String, usize>,
    /// name -> array index of the first entry with that name.
    by_name: HashMap<String, usize>,
}

pub(crate) fn pair_key(name: &str, value: &str) -> String {
    let mut key = String::with_capacity(name.len() + value.len() + 1);
    key.push_str(name);
    key.push('\0');
    key.push_str(value);
    key
}

impl StaticTable {
    /// The index of the first static entry.
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The entry with the given table index, if it is a static index.
    pub fn get(&self, index: usize) -> Option<&TableEntry> {
        index.checked_sub(self.base).and_then(|i| self.entries.get(i))
    }

    /// Table index of the entry matching name and value exactly.
    pub fn find_pair(&self, name: &str, value: &str) -> Option<usize> {
        self.by_pair.get(&pair_key(name, value)).map(|i| i + self.base)
    }

    /// Table index of the first entry with the given name.
    pub fn find_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).map(|i| i + self.base)
    }
}

pub(crate) fn static_table() -> &'static StaticTable {
    static TABLE: OnceLock<StaticTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut base = None;
        let mut count = 0usize;
        for line in STATIC_TABLE.lines() {
            if let Some(init) = line.strip_prefix("INIT:") {
                let mut parts = init.split(':');
                base = parts.next().and_then(|p| p.parse().ok());
                count = parts
                    .next()
                    .and_then(|p| p.parse().ok())
                    .expect("static table INIT count");
                break;
            }
        }
        let base: usize = base.expect("static table INIT line");

        let mut entries: Vec<Option<TableEntry>> = vec![None; count];
        let mut by_pair = HashMap::new();
        let mut by_name = HashMap::new();
        for line in STATIC_TABLE.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("INIT") {
                continue;
            }
            let mut parts = line.splitn(3, ' ');
            let index: usize = parts
                .next()
                .and_then(|p| p.parse().ok())
                .expect("static table index");
            let name = parts.next().expect("static table name");
            let value = parts.next().map(str::to_owned);
            let array_index = index - base;
            let entry = TableEntry::new(name, value);
            if let Some(v) = &entry.value {
                by_pair.insert(pair_key(&entry.name, v), array_index);
            }
            by_name.entry(entry.name.clone()).or_insert(array_index);
            entries[array_index] = Some(entry);
        }
        StaticTable {
            base,
            entries: entries
                .into_iter()
                .map(|e| e.expect("static table entry gap"))
                .collect(),
            by_pair,
            by_name,
        }
    })
}

/// One direction's dynamic table. The newest entry sits at the front.
#[derive(Debug, Default)]
pub(crate) struct DynamicTable {
    entries: VecDeque<TableEntry>,
    size: usize,
}

impl DynamicTable {
    /// Sum of the entry sizes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The entry at `offset` from the newest.
    pub fn get(&self, offset: usize) -> Option<&TableEntry> {
        self.entries.get(offset)
    }

    /// Evicts from the oldest end until `incoming` more bytes fit in
    /// `max_size`.
    pub fn evict(&mut self, max_size: usize, incoming: usize) {
        while self.size + incoming > max_size {
            match self.entries.pop_back() {
                Some(e) => self.size -= e.size(),
                None => break,
            }
        }
    }

    /// Inserts a new entry after making room. An entry larger than the whole
    /// table empties it and is not stored (RFC 7541 Section 4.4).
    pub fn add(&mut self, entry: TableEntry, max_size: usize) {
        self.evict(max_size, entry.size());
        if entry.size() <= max_size {
            self.size += entry.size();
            self.entries.push_front(entry);
        }
    }

    /// Finds a name match, preferring an exact (name, value) match. Returns
    /// the offset from the newest entry.
    pub fn find(&self, name: &str, value: &str) -> Option<(usize, &TableEntry)> {
        let mut found = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.name == name {
                if entry.value.as_deref() == Some(value) {
                    return Some((i, entry));
                }
                if found.is_none() {
                    found = Some((i, entry));
                }
            }
        }
        found
    }

    /// Snapshot of the entries, newest first, for table-coherence checks.
    pub fn entries(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.iter()
    }
}
