//! Shared test fixtures: an in-memory directory and a counting group store.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ldapsync_directory::{
    DirectoryError, DirectoryResult, DirectorySearcher, DistinguishedName, RemoteEntry,
    SearchRequest, SearchScope,
};
use ldapsync_engine::store::StoreResult;
use ldapsync_engine::{GroupStore, InMemoryGroupStore, LocalGroup};

/// Directory that evaluates searches against a fixed entry list.
///
/// Supports equality, presence, `&`, `|` and `!` filters, which covers every
/// filter the strategies build.
pub struct MockDirectory {
    entries: Mutex<Vec<RemoteEntry>>,
    searches: AtomicUsize,
    requests: Mutex<Vec<SearchRequest>>,
}

impl MockDirectory {
    pub fn new(entries: Vec<RemoteEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
            searches: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remove(&self, dn: &str) {
        self.entries.lock().unwrap().retain(|e| e.dn() != dn);
    }

    /// Add `entry`, replacing any entry with the same DN.
    pub fn insert(&self, entry: RemoteEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.dn() != entry.dn());
        entries.push(entry);
    }

    fn find(&self, dn: &DistinguishedName) -> Option<RemoteEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| DistinguishedName::parse(e.dn()).unwrap() == *dn)
            .cloned()
    }

    /// A base exists if it is an entry or an ancestor of one.
    fn base_exists(&self, base: &DistinguishedName) -> bool {
        self.entries.lock().unwrap().iter().any(|e| {
            let dn = DistinguishedName::parse(e.dn()).unwrap();
            base.contains(&dn)
        })
    }
}

#[async_trait]
impl DirectorySearcher for MockDirectory {
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<RemoteEntry>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let base = DistinguishedName::parse(&request.base_dn)?;
        if !self.base_exists(&base) {
            return Err(DirectoryError::no_such_object(&request.base_dn));
        }
        let filter = Filter::parse(&request.filter);

        if request.scope == SearchScope::Base {
            return Ok(self
                .find(&base)
                .filter(|e| filter.matches(e))
                .into_iter()
                .collect());
        }

        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                let dn = DistinguishedName::parse(e.dn()).unwrap();
                request.scope.admits(&base, &dn) && filter.matches(e)
            })
            .cloned()
            .collect())
    }
}

enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
}

impl Filter {
    fn parse(input: &str) -> Filter {
        let (filter, _) = Self::parse_at(input.trim().as_bytes(), 0);
        filter
    }

    fn parse_at(input: &[u8], pos: usize) -> (Filter, usize) {
        assert_eq!(input[pos], b'(', "filter must start with '('");
        let mut pos = pos + 1;
        match input[pos] {
            b'&' | b'|' => {
                let op = input[pos];
                pos += 1;
                let mut parts = Vec::new();
                while input[pos] == b'(' {
                    let (part, next) = Self::parse_at(input, pos);
                    parts.push(part);
                    pos = next;
                }
                let filter = if op == b'&' {
                    Filter::And(parts)
                } else {
                    Filter::Or(parts)
                };
                (filter, pos + 1)
            }
            b'!' => {
                let (inner, next) = Self::parse_at(input, pos + 1);
                (Filter::Not(Box::new(inner)), next + 1)
            }
            _ => {
                let start = pos;
                let mut escaped = false;
                while escaped || input[pos] != b')' {
                    escaped = !escaped && input[pos] == b'\\';
                    pos += 1;
                }
                let item = std::str::from_utf8(&input[start..pos]).unwrap();
                let (attr, value) = item.split_once('=').unwrap();
                let filter = if value == "*" {
                    Filter::Present(attr.to_string())
                } else {
                    Filter::Equal(attr.to_string(), unescape(value))
                };
                (filter, pos + 1)
            }
        }
    }

    fn matches(&self, entry: &RemoteEntry) -> bool {
        match self {
            Filter::And(parts) => parts.iter().all(|p| p.matches(entry)),
            Filter::Or(parts) => parts.iter().any(|p| p.matches(entry)),
            Filter::Not(inner) => !inner.matches(entry),
            Filter::Present(attr) => {
                attr.eq_ignore_ascii_case("objectClass") || !entry.values(attr).is_empty()
            }
            Filter::Equal(attr, value) => entry
                .values(attr)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
        }
    }
}

fn unescape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
            out.push(u8::from_str_radix(hex, 16).unwrap());
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).unwrap()
}

/// In-memory store that counts writes and deletes.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryGroupStore,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingStore {
    pub fn with_groups(groups: impl IntoIterator<Item = LocalGroup>) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryGroupStore::with_groups(groups),
            ..Default::default()
        })
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GroupStore for CountingStore {
    async fn get(&self, name: &str) -> StoreResult<Option<LocalGroup>> {
        self.inner.get(name).await
    }

    async fn create(&self, group: LocalGroup) -> StoreResult<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(group).await
    }

    async fn update(&self, group: LocalGroup) -> StoreResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(group).await
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(name).await
    }

    async fn list(&self) -> StoreResult<Vec<LocalGroup>> {
        self.inner.list().await
    }
}

pub fn user(dn: &str, uid: &str) -> RemoteEntry {
    RemoteEntry::new(dn)
        .with_attribute("objectClass", ["inetOrgPerson"])
        .with_attribute("uid", [uid])
}

pub fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
