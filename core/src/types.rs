//! Response shapes shared by every resource.
//!
//! # Design
//! List endpoints answer with the same envelope: hyperlink relations, the
//! page of results and a total count. Missing `links` or `results` decode as
//! empty vectors so callers never need to distinguish "absent" from "empty".

use serde::{Deserialize, Deserializer, Serialize};

/// A named hyperlink to a related resource or page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// Envelope of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Paginated<T> {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub links: Vec<Link>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_count: i64,
}

/// Decode a list that the server may send as `null`.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self {
            links: Vec::new(),
            results: Vec::new(),
            total_count: 0,
        }
    }
}

impl<T> Paginated<T> {
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }

    pub fn next_href(&self) -> Option<&str> {
        self.link("next").map(|link| link.href.as_str())
    }

    pub fn is_last_page(&self) -> bool {
        self.link("next").is_none()
    }

    /// Page number of the `self` link; 1 when the link carries no `pageNum`.
    pub fn current_page(&self) -> Option<i64> {
        let link = self.link("self")?;
        let url = url::Url::parse(&link.href).ok()?;
        match url.query_pairs().find(|(key, _)| key == "pageNum") {
            Some((_, value)) => value.parse().ok(),
            None => Some(1),
        }
    }
}
