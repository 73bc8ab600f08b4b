//! The archive document: one account's full snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, InvalidInputError};
use crate::record::Record;

/// One account's full snapshot: account metadata, the four record
/// collections, and the wholesale-replaced social-graph lists.
///
/// The document is the sole unit of durable state. It is owned exclusively
/// by the running invocation; concurrent writers are unsupported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveDocument {
    /// Account payload as returned by the credential check.
    #[serde(default)]
    pub account: Value,

    #[serde(default)]
    pub statuses: Vec<Record>,

    #[serde(default)]
    pub favourites: Vec<Record>,

    #[serde(default)]
    pub bookmarks: Vec<Record>,

    #[serde(default)]
    pub mentions: Vec<Record>,

    /// People following the account. Replaced wholesale on each fetch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followers: Vec<Value>,

    /// People the account follows. Replaced wholesale on each fetch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub following: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutes: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
}

impl ArchiveDocument {
    /// Borrow one of the named record collections.
    pub fn collection(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::Statuses => &self.statuses,
            Collection::Favourites => &self.favourites,
            Collection::Bookmarks => &self.bookmarks,
            Collection::Mentions => &self.mentions,
        }
    }

    /// Mutably borrow one of the named record collections.
    pub fn collection_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        match collection {
            Collection::Statuses => &mut self.statuses,
            Collection::Favourites => &mut self.favourites,
            Collection::Bookmarks => &mut self.bookmarks,
            Collection::Mentions => &mut self.mentions,
        }
    }
}

/// A named, ordered record collection within the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Statuses,
    Favourites,
    Bookmarks,
    Mentions,
}

impl Collection {
    /// All record collections, in archive order.
    pub const ALL: [Collection; 4] = [
        Collection::Statuses,
        Collection::Favourites,
        Collection::Bookmarks,
        Collection::Mentions,
    ];

    /// The collection's key in the archive document.
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Statuses => "statuses",
            Collection::Favourites => "favourites",
            Collection::Bookmarks => "bookmarks",
            Collection::Mentions => "mentions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "statuses" => Ok(Collection::Statuses),
            "favourites" => Ok(Collection::Favourites),
            "bookmarks" => Ok(Collection::Bookmarks),
            "mentions" => Ok(Collection::Mentions),
            other => Err(InvalidInputError::Collection {
                value: other.to_string(),
            }
            .into()),
        }
    }
}
