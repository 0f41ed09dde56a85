//! Query descriptors
//!
//! A [`QueryDescriptor`] describes where and how to search; a
//! [`QueryOnAttribute`] adds the attribute used to look a single entry up by
//! value. Both are pure values that turn into a [`SearchRequest`] for the
//! transport.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dn::DistinguishedName;
use crate::error::{DirectoryError, DirectoryResult};

/// Filter used when none is configured.
pub const MATCH_ALL_FILTER: &str = "(objectClass=*)";

/// Pseudo-attribute naming the entry's distinguished name.
pub const DN_ATTRIBUTE: &str = "dn";

/// LDAP search scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// Only the base entry itself.
    Base,
    /// Direct children of the base entry.
    #[serde(rename = "one", alias = "onelevel")]
    OneLevel,
    /// The base entry and everything below it.
    #[default]
    #[serde(rename = "sub", alias = "subtree")]
    Subtree,
}

impl SearchScope {
    /// Check that `dn` could be returned by a search with this scope at `base`.
    pub fn admits(&self, base: &DistinguishedName, dn: &DistinguishedName) -> bool {
        match self {
            SearchScope::Base => base.equal_fold(dn),
            SearchScope::OneLevel => base.is_parent_of(dn),
            SearchScope::Subtree => base.contains(dn),
        }
    }
}

impl From<SearchScope> for ldap3::Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => ldap3::Scope::Base,
            SearchScope::OneLevel => ldap3::Scope::OneLevel,
            SearchScope::Subtree => ldap3::Scope::Subtree,
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchScope::Base => "base",
            SearchScope::OneLevel => "one",
            SearchScope::Subtree => "sub",
        })
    }
}

impl FromStr for SearchScope {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(SearchScope::Base),
            "one" | "onelevel" => Ok(SearchScope::OneLevel),
            "sub" | "subtree" => Ok(SearchScope::Subtree),
            other => Err(DirectoryError::invalid_query(format!(
                "invalid search scope {:?}, expected one of base, one, sub",
                other
            ))),
        }
    }
}

/// Alias dereferencing policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerefAliases {
    #[default]
    Never,
    /// Dereference while searching below the base.
    Search,
    /// Dereference when locating the base.
    Base,
    Always,
}

impl From<DerefAliases> for ldap3::DerefAliases {
    fn from(deref: DerefAliases) -> Self {
        match deref {
            DerefAliases::Never => ldap3::DerefAliases::Never,
            DerefAliases::Search => ldap3::DerefAliases::Searching,
            DerefAliases::Base => ldap3::DerefAliases::Finding,
            DerefAliases::Always => ldap3::DerefAliases::Always,
        }
    }
}

impl FromStr for DerefAliases {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(DerefAliases::Never),
            "search" => Ok(DerefAliases::Search),
            "base" => Ok(DerefAliases::Base),
            "always" => Ok(DerefAliases::Always),
            other => Err(DirectoryError::invalid_query(format!(
                "invalid alias dereference policy {:?}, expected one of never, search, base, always",
                other
            ))),
        }
    }
}

fn default_filter() -> String {
    MATCH_ALL_FILTER.to_string()
}

/// Where and how to search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Search base (e.g., "ou=groups,dc=example,dc=com").
    pub base_dn: String,

    #[serde(default)]
    pub scope: SearchScope,

    #[serde(default)]
    pub deref_aliases: DerefAliases,

    /// Server-side time limit in seconds; 0 means no limit.
    #[serde(default)]
    pub time_limit: u32,

    #[serde(default = "default_filter")]
    pub filter: String,

    /// Paged results page size; 0 disables paging.
    #[serde(default)]
    pub page_size: u32,
}

impl QueryDescriptor {
    /// Create a subtree query for all entries under `base_dn`.
    pub fn new(base_dn: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope: SearchScope::default(),
            deref_aliases: DerefAliases::default(),
            time_limit: 0,
            filter: default_filter(),
            page_size: 0,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    #[must_use]
    pub fn with_deref_aliases(mut self, deref_aliases: DerefAliases) -> Self {
        self.deref_aliases = deref_aliases;
        self
    }

    #[must_use]
    pub fn with_time_limit(mut self, seconds: u32) -> Self {
        self.time_limit = seconds;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Validate the base DN and filter.
    pub fn validate(&self) -> DirectoryResult<()> {
        DistinguishedName::parse(&self.base_dn)?;
        validate_filter(&self.filter)
    }

    /// Build a request for every entry this query matches.
    pub fn search_request(&self, attributes: Vec<String>) -> SearchRequest {
        SearchRequest {
            base_dn: self.base_dn.clone(),
            scope: self.scope,
            deref_aliases: self.deref_aliases,
            time_limit: self.time_limit,
            filter: self.filter.clone(),
            attributes,
            page_size: self.page_size,
        }
    }
}

/// A query plus the attribute used to look entries up by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOnAttribute {
    #[serde(flatten)]
    pub query: QueryDescriptor,

    /// Attribute holding the lookup value; `dn` means the value is a DN.
    pub query_attribute: String,
}

impl QueryOnAttribute {
    pub fn new(query: QueryDescriptor, query_attribute: impl Into<String>) -> Self {
        Self {
            query,
            query_attribute: query_attribute.into(),
        }
    }

    /// Check if lookups are by distinguished name.
    pub fn is_dn_query(&self) -> bool {
        self.query_attribute.eq_ignore_ascii_case(DN_ATTRIBUTE)
    }

    /// Validate the underlying query and the query attribute.
    pub fn validate(&self) -> DirectoryResult<()> {
        self.query.validate()?;
        if self.query_attribute.trim().is_empty() {
            return Err(DirectoryError::invalid_query("query attribute must not be empty"));
        }
        Ok(())
    }

    /// Build a request for every entry the underlying query matches.
    pub fn search_request(&self, attributes: Vec<String>) -> SearchRequest {
        self.query.search_request(attributes)
    }

    /// Build a request for the entry whose query attribute equals `value`.
    ///
    /// DN-valued lookups search the DN itself at base scope with the
    /// configured filter, after checking that the configured query could have
    /// returned it; anything else yields [`DirectoryError::QueryOutOfBounds`]
    /// without a search.
    pub fn search_request_for(
        &self,
        value: &str,
        attributes: Vec<String>,
    ) -> DirectoryResult<SearchRequest> {
        if self.is_dn_query() {
            let dn = DistinguishedName::parse(value)?;
            let base = DistinguishedName::parse(&self.query.base_dn)?;
            if !self.query.scope.admits(&base, &dn) {
                return Err(DirectoryError::out_of_bounds(value, &self.query.base_dn));
            }
            return Ok(SearchRequest {
                base_dn: value.to_string(),
                scope: SearchScope::Base,
                deref_aliases: self.query.deref_aliases,
                time_limit: self.query.time_limit,
                filter: self.query.filter.clone(),
                attributes,
                page_size: 0,
            });
        }

        let filter = format!(
            "(&{}({}={}))",
            self.query.filter,
            self.query_attribute,
            escape_filter_value(value)
        );
        Ok(SearchRequest {
            filter,
            page_size: 0,
            ..self.query.search_request(attributes)
        })
    }
}

/// A fully resolved search, ready for a [`crate::DirectorySearcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: SearchScope,
    pub deref_aliases: DerefAliases,
    pub time_limit: u32,
    pub filter: String,
    pub attributes: Vec<String>,
    pub page_size: u32,
}

/// Escape special characters in LDAP filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Merge attribute lists, dropping case-insensitive duplicates and `dn`.
///
/// The DN comes back with every entry, so requesting it as an attribute is
/// never needed.
pub fn merge_attributes<'a, I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut merged: Vec<String> = Vec::new();
    for attr in lists.into_iter().flatten() {
        if attr.eq_ignore_ascii_case(DN_ATTRIBUTE) {
            continue;
        }
        if !merged.iter().any(|m| m.eq_ignore_ascii_case(attr)) {
            merged.push(attr.clone());
        }
    }
    merged
}

/// Check that a filter is a single parenthesized, balanced expression.
fn validate_filter(filter: &str) -> DirectoryResult<()> {
    let filter = filter.trim();
    if !filter.starts_with('(') || !filter.ends_with(')') {
        return Err(DirectoryError::invalid_query(format!(
            "filter {:?} must be enclosed in parentheses",
            filter
        )));
    }

    let mut depth: i32 = 0;
    let mut escaped = false;
    for (i, ch) in filter.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 || (depth == 0 && i + 1 != filter.len()) {
                    return Err(DirectoryError::invalid_query(format!(
                        "filter {:?} has unbalanced parentheses",
                        filter
                    )));
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(DirectoryError::invalid_query(format!(
            "filter {:?} has unbalanced parentheses",
            filter
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups_by_dn(scope: SearchScope) -> QueryOnAttribute {
        QueryOnAttribute::new(
            QueryDescriptor::new("ou=groups,dc=example,dc=com")
                .with_scope(scope)
                .with_filter("(objectClass=groupOfNames)")
                .with_time_limit(10),
            "dn",
        )
    }

    #[test]
    fn test_dn_query_in_subtree() {
        let query = groups_by_dn(SearchScope::Subtree);
        let request = query
            .search_request_for(
                "cn=eng,ou=teams,ou=groups,dc=example,dc=com",
                vec!["cn".to_string()],
            )
            .unwrap();

        assert_eq!(request.base_dn, "cn=eng,ou=teams,ou=groups,dc=example,dc=com");
        assert_eq!(request.scope, SearchScope::Base);
        assert_eq!(request.filter, "(objectClass=groupOfNames)");
        assert_eq!(request.time_limit, 10);
    }

    #[test]
    fn test_dn_query_out_of_bounds() {
        let query = groups_by_dn(SearchScope::Subtree);
        let err = query
            .search_request_for("cn=eng,ou=groups,dc=other,dc=com", vec![])
            .unwrap_err();
        assert!(err.is_out_of_bounds());
    }

    #[test]
    fn test_dn_query_respects_scope() {
        let direct = "cn=eng,ou=groups,dc=example,dc=com";
        let nested = "cn=eng,ou=teams,ou=groups,dc=example,dc=com";
        let base = "ou=groups,dc=example,dc=com";

        let one = groups_by_dn(SearchScope::OneLevel);
        assert!(one.search_request_for(direct, vec![]).is_ok());
        assert!(one.search_request_for(nested, vec![]).unwrap_err().is_out_of_bounds());
        assert!(one.search_request_for(base, vec![]).unwrap_err().is_out_of_bounds());

        let base_scope = groups_by_dn(SearchScope::Base);
        assert!(base_scope.search_request_for(base, vec![]).is_ok());
        assert!(base_scope
            .search_request_for(direct, vec![])
            .unwrap_err()
            .is_out_of_bounds());
    }

    #[test]
    fn test_dn_query_rejects_malformed_dn() {
        let query = groups_by_dn(SearchScope::Subtree);
        let err = query.search_request_for("not a dn", vec![]).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DN");
    }

    #[test]
    fn test_attribute_query_escapes_value() {
        let query = QueryOnAttribute::new(
            QueryDescriptor::new("ou=users,dc=example,dc=com")
                .with_filter("(objectClass=posixAccount)")
                .with_page_size(500),
            "uid",
        );
        let request = query
            .search_request_for("al*ce(x)", vec!["uid".to_string()])
            .unwrap();

        assert_eq!(
            request.filter,
            r"(&(objectClass=posixAccount)(uid=al\2ace\28x\29))"
        );
        assert_eq!(request.base_dn, "ou=users,dc=example,dc=com");
        assert_eq!(request.scope, SearchScope::Subtree);
        assert_eq!(request.page_size, 0);
    }

    #[test]
    fn test_validate_filter() {
        assert!(validate_filter("(objectClass=*)").is_ok());
        assert!(validate_filter("(&(a=b)(|(c=d)(e=f)))").is_ok());
        assert!(validate_filter(r"(cn=a\29b)").is_ok());

        assert!(validate_filter("objectClass=*").is_err());
        assert!(validate_filter("(a=b").is_err());
        assert!(validate_filter("(a=b))").is_err());
        assert!(validate_filter("(a=b)(c=d)").is_err());
    }

    #[test]
    fn test_validate_query() {
        let bad_base = QueryOnAttribute::new(QueryDescriptor::new("dc=example,dc"), "dn");
        assert!(bad_base.validate().is_err());

        let no_attr = QueryOnAttribute::new(QueryDescriptor::new("dc=example,dc=com"), " ");
        assert!(no_attr.validate().is_err());

        assert!(groups_by_dn(SearchScope::Subtree).validate().is_ok());
    }

    #[test]
    fn test_merge_attributes() {
        let names = vec!["cn".to_string(), "dn".to_string()];
        let members = vec!["member".to_string(), "CN".to_string()];
        let merged = merge_attributes([names.as_slice(), members.as_slice()]);
        assert_eq!(merged, vec!["cn".to_string(), "member".to_string()]);
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("sub".parse::<SearchScope>().unwrap(), SearchScope::Subtree);
        assert_eq!("ONE".parse::<SearchScope>().unwrap(), SearchScope::OneLevel);
        assert_eq!("base".parse::<SearchScope>().unwrap(), SearchScope::Base);
        assert!("children".parse::<SearchScope>().is_err());

        assert_eq!("search".parse::<DerefAliases>().unwrap(), DerefAliases::Search);
        assert!("sometimes".parse::<DerefAliases>().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let query: QueryOnAttribute = serde_yaml::from_str(
            "base_dn: ou=users,dc=example,dc=com\nquery_attribute: uid\n",
        )
        .unwrap();

        assert_eq!(query.query.scope, SearchScope::Subtree);
        assert_eq!(query.query.deref_aliases, DerefAliases::Never);
        assert_eq!(query.query.filter, MATCH_ALL_FILTER);
        assert_eq!(query.query.page_size, 0);
        assert_eq!(query.query_attribute, "uid");
    }

    #[test]
    fn test_deserialize_scope_aliases() {
        let query: QueryDescriptor =
            serde_json::from_str(r#"{"base_dn": "dc=com", "scope": "one", "deref_aliases": "always"}"#)
                .unwrap();
        assert_eq!(query.scope, SearchScope::OneLevel);
        assert_eq!(query.deref_aliases, DerefAliases::Always);
    }
}
