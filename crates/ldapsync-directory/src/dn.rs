//! Distinguished names
//!
//! A lenient RFC 4514 parser plus the subtree containment checks used to keep
//! DN-valued lookups inside their configured base.

use std::fmt;
use std::str::FromStr;

use crate::error::{DirectoryError, DirectoryResult};

/// A single `type=value` pair inside an RDN.
#[derive(Debug, Clone)]
struct AttributeTypeAndValue {
    /// Attribute type, lowercased.
    attr_type: String,
    /// Unescaped value as written.
    value: String,
    /// Value used for comparisons.
    folded: String,
}

impl AttributeTypeAndValue {
    fn new(attr_type: &str, value: String) -> Self {
        let folded = value.to_lowercase();
        Self {
            attr_type: attr_type.trim().to_ascii_lowercase(),
            value,
            folded,
        }
    }

    fn equal_fold(&self, other: &Self) -> bool {
        self.attr_type == other.attr_type && self.folded == other.folded
    }
}

/// A relative distinguished name (one or more AVAs joined by `+`).
#[derive(Debug, Clone)]
struct Rdn {
    attributes: Vec<AttributeTypeAndValue>,
}

impl Rdn {
    /// Multi-valued RDNs are unordered, so compare as sets.
    fn equal_fold(&self, other: &Self) -> bool {
        self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .all(|a| other.attributes.iter().any(|b| a.equal_fold(b)))
    }
}

/// Parsed distinguished name.
///
/// RDNs are stored leaf first, the way they are written
/// (`cn=alice,ou=users,dc=example,dc=com`). The empty string parses to the
/// root DN, which is an ancestor of every other DN.
#[derive(Debug, Clone)]
pub struct DistinguishedName {
    rdns: Vec<Rdn>,
}

impl DistinguishedName {
    /// Parse a DN string.
    pub fn parse(input: &str) -> DirectoryResult<Self> {
        Parser::new(input).parse()
    }

    /// The root DN.
    pub fn root() -> Self {
        Self { rdns: Vec::new() }
    }

    /// Number of RDNs.
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    /// Check if this is the root DN.
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Case-insensitive equality on attribute types and values.
    pub fn equal_fold(&self, other: &Self) -> bool {
        self.rdns.len() == other.rdns.len()
            && self
                .rdns
                .iter()
                .zip(other.rdns.iter())
                .all(|(a, b)| a.equal_fold(b))
    }

    /// Check if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        if other.rdns.len() <= self.rdns.len() {
            return false;
        }
        let offset = other.rdns.len() - self.rdns.len();
        self.rdns
            .iter()
            .zip(other.rdns[offset..].iter())
            .all(|(a, b)| a.equal_fold(b))
    }

    /// Check if `self` is the immediate parent of `other`.
    pub fn is_parent_of(&self, other: &Self) -> bool {
        other.rdns.len() == self.rdns.len() + 1 && self.is_ancestor_of(other)
    }

    /// Check if `other` is `self` or lies anywhere below it.
    pub fn contains(&self, other: &Self) -> bool {
        self.equal_fold(other) || self.is_ancestor_of(other)
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.equal_fold(other)
    }
}

impl Eq for DistinguishedName {}

impl FromStr for DistinguishedName {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            for (j, ava) in rdn.attributes.iter().enumerate() {
                if j > 0 {
                    f.write_str("+")?;
                }
                write!(f, "{}={}", ava.attr_type, escape_value(&ava.value))?;
            }
        }
        Ok(())
    }
}

/// Escape special characters in a DN attribute value per RFC 4514.
///
/// Characters that must be escaped:
/// - Leading or trailing SPACE (as `\20`)
/// - Leading `#` (as `\23`)
/// - `, + " \ < > ; =` (with a backslash prefix)
/// - NUL (as `\00`)
pub fn escape_value(value: &str) -> String {
    let count = value.chars().count();
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == count;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if is_first || is_last => result.push_str("\\20"),
            '#' if is_first => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> DirectoryError {
        DirectoryError::InvalidDn {
            dn: self.input.to_string(),
            message: message.into(),
        }
    }

    fn skip_spaces(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> DirectoryResult<DistinguishedName> {
        let mut rdns = Vec::new();
        if self.input.trim().is_empty() {
            return Ok(DistinguishedName { rdns });
        }

        let mut current = Vec::new();
        loop {
            let ava = self.parse_ava()?;
            current.push(ava);

            match self.bytes.get(self.pos) {
                None => {
                    rdns.push(Rdn {
                        attributes: std::mem::take(&mut current),
                    });
                    break;
                }
                Some(b'+') => {
                    self.pos += 1;
                }
                Some(b',') | Some(b';') => {
                    self.pos += 1;
                    rdns.push(Rdn {
                        attributes: std::mem::take(&mut current),
                    });
                }
                Some(other) => {
                    return Err(self.error(format!(
                        "unexpected character {:?} at offset {}",
                        *other as char, self.pos
                    )));
                }
            }
        }

        Ok(DistinguishedName { rdns })
    }

    fn parse_ava(&mut self) -> DirectoryResult<AttributeTypeAndValue> {
        self.skip_spaces();
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'=' {
            match self.bytes[self.pos] {
                b',' | b';' | b'+' => {
                    return Err(self.error(format!("missing '=' at offset {}", self.pos)));
                }
                _ => self.pos += 1,
            }
        }
        if self.pos >= self.bytes.len() {
            return Err(self.error("missing '=' in attribute type and value"));
        }

        let attr_type = self.input[start..self.pos].trim();
        if attr_type.is_empty() {
            return Err(self.error(format!("empty attribute type at offset {}", start)));
        }
        self.pos += 1;

        self.skip_spaces();
        let value = if self.bytes.get(self.pos) == Some(&b'"') {
            self.parse_quoted_value()?
        } else {
            self.parse_value()?
        };

        Ok(AttributeTypeAndValue::new(attr_type, value))
    }

    fn parse_value(&mut self) -> DirectoryResult<String> {
        let mut buf: Vec<u8> = Vec::new();
        // Length of `buf` up to and including the last byte that must be kept.
        let mut keep = 0;

        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b',' | b';' | b'+' => break,
                b'\\' => {
                    let byte = self.parse_escape()?;
                    buf.push(byte);
                    keep = buf.len();
                }
                b' ' => {
                    buf.push(b' ');
                    self.pos += 1;
                }
                other => {
                    buf.push(other);
                    keep = buf.len();
                    self.pos += 1;
                }
            }
        }

        // Unescaped trailing spaces are insignificant.
        buf.truncate(keep);
        String::from_utf8(buf).map_err(|_| self.error("value is not valid UTF-8"))
    }

    fn parse_quoted_value(&mut self) -> DirectoryResult<String> {
        self.pos += 1;
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match self.bytes.get(self.pos) {
                None => return Err(self.error("unterminated quoted value")),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    let byte = self.parse_escape()?;
                    buf.push(byte);
                }
                Some(other) => {
                    buf.push(*other);
                    self.pos += 1;
                }
            }
        }
        self.skip_spaces();
        String::from_utf8(buf).map_err(|_| self.error("value is not valid UTF-8"))
    }

    /// Consume a backslash escape, either `\XX` hex or `\<special>`.
    fn parse_escape(&mut self) -> DirectoryResult<u8> {
        self.pos += 1;
        let first = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| self.error("dangling escape at end of value"))?;

        if first.is_ascii_hexdigit() {
            let second = *self
                .bytes
                .get(self.pos + 1)
                .ok_or_else(|| self.error("truncated hex escape"))?;
            if !second.is_ascii_hexdigit() {
                return Err(self.error(format!("invalid hex escape at offset {}", self.pos)));
            }
            let hex = &self.input[self.pos..self.pos + 2];
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| self.error(format!("invalid hex escape {:?}", hex)))?;
            self.pos += 2;
            Ok(byte)
        } else {
            self.pos += 1;
            Ok(first)
        }
    }
}
