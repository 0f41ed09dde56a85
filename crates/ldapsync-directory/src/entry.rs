//! Remote directory entries

use std::collections::BTreeMap;

use ldap3::SearchEntry;
use serde::{Deserialize, Serialize};

/// An entry fetched from the directory: a DN plus its attribute values.
///
/// Attribute names are matched ASCII-case-insensitively; values keep the
/// order the server returned them in. Entries are never mutated after they
/// are fetched, only built up with [`RemoteEntry::with_attribute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    dn: String,
    attributes: BTreeMap<String, Vec<String>>,
}

impl RemoteEntry {
    /// Create an entry without attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add values for an attribute, appending to any existing values.
    #[must_use]
    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let values = values.into_iter().map(Into::into);
        match self.key_for(&name) {
            Some(existing) => {
                if let Some(list) = self.attributes.get_mut(&existing) {
                    list.extend(values);
                }
            }
            None => {
                self.attributes.insert(name, values.collect());
            }
        }
        self
    }

    /// The entry's distinguished name.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// All values of an attribute, or an empty slice when absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// The first value of an attribute.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    /// Attribute names present on the entry.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    fn key_for(&self, name: &str) -> Option<String> {
        self.attributes
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }
}

impl From<SearchEntry> for RemoteEntry {
    fn from(entry: SearchEntry) -> Self {
        let mut remote = RemoteEntry::new(entry.dn);
        for (name, values) in entry.attrs {
            remote = remote.with_attribute(name, values);
        }
        // Binary attributes are carried as lossy strings; membership and
        // naming attributes are never binary.
        for (name, values) in entry.bin_attrs {
            remote = remote.with_attribute(
                name,
                values
                    .into_iter()
                    .map(|v| String::from_utf8_lossy(&v).into_owned()),
            );
        }
        remote
    }
}
