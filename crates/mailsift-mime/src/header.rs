//! RFC 5322 header handling.

use std::fmt;

use crate::error::{Error, Result};

/// Ordered collection of email headers.
///
/// Names are matched case-insensitively and rendered in canonical
/// `Word-Word` capitalization. Insertion order is preserved so generated
/// messages are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value, keeping any existing values.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into().to_lowercase(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// The header keeps the position of its first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();

        match self.entries.iter().position(|(n, _)| *n == name) {
            Some(idx) => {
                self.entries[idx].1 = value;
                let mut seen = false;
                self.entries.retain(|(n, _)| {
                    if *n != name {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Checks that header values cannot inject additional header lines.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeader` if a name or value contains CR or LF.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in &self.entries {
            if name.is_empty() || name.contains([':', '\r', '\n']) {
                return Err(Error::InvalidHeader(name.clone()));
            }
            if value.contains(['\r', '\n']) {
                return Err(Error::InvalidHeader(format!("{name}: {value}")));
            }
        }
        Ok(())
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

/// Capitalizes a header name (e.g., "in-reply-to" -> "In-Reply-To").
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{}: {value}\r\n", canonical_name(name))?;
        }
        Ok(())
    }
}
