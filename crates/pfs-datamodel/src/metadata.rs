//! Header metadata: an ordered keyword → value mapping stored as the primary
//! header of a product file.

use std::fmt;

use indexmap::IndexMap;
use pfs_fits::header::{format_card, is_reserved_keyword, HIERARCH};
use pfs_fits::{Card, Value};

use crate::error::{Error, Result};

/// A plain-old-data header value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{v}"),
            MetadataValue::Int(v) => write!(f, "{v}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Str(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! metadata_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for MetadataValue {
                fn from(v: $t) -> Self {
                    MetadataValue::$variant(v.into())
                }
            }
        )*
    };
}

metadata_value_from!(
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    f32 => Float,
    String => Str,
    &str => Str,
);

impl From<MetadataValue> for Value {
    fn from(v: MetadataValue) -> Self {
        match v {
            MetadataValue::Bool(b) => Value::Logical(b),
            MetadataValue::Int(n) => Value::Integer(n),
            MetadataValue::Float(x) => Value::Float(x),
            MetadataValue::Str(s) => Value::String(s),
        }
    }
}

impl From<Value> for MetadataValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Logical(b) => MetadataValue::Bool(b),
            Value::Integer(n) => MetadataValue::Int(n),
            Value::Float(x) => MetadataValue::Float(x),
            Value::String(s) => MetadataValue::Str(s),
        }
    }
}

/// Keyword → value pairs plus optional comments, in insertion order.
///
/// Keywords are case-insensitive: they are stored uppercased, as they appear
/// in a header. Equality ignores ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    values: IndexMap<String, MetadataValue>,
    comments: IndexMap<String, String>,
}

impl Metadata {
    /// No keywords.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Metadata::insert`].
    pub fn with(mut self, keyword: &str, value: impl Into<MetadataValue>) -> Self {
        self.insert(keyword, value);
        self
    }

    /// Set a keyword, returning the previous value.
    pub fn insert(&mut self, keyword: &str, value: impl Into<MetadataValue>) -> Option<MetadataValue> {
        self.values.insert(keyword.to_uppercase(), value.into())
    }

    /// Attach a comment to a keyword. Comments of keywords without a value are
    /// not written.
    pub fn set_comment(&mut self, keyword: &str, comment: impl Into<String>) {
        self.comments.insert(keyword.to_uppercase(), comment.into());
    }

    /// The value of `keyword`, in any case.
    pub fn get(&self, keyword: &str) -> Option<&MetadataValue> {
        self.values.get(&keyword.to_uppercase())
    }

    /// The comment attached to `keyword`.
    pub fn comment(&self, keyword: &str) -> Option<&str> {
        self.comments.get(&keyword.to_uppercase()).map(String::as_str)
    }

    /// Remove a keyword and its comment.
    pub fn remove(&mut self, keyword: &str) -> Option<MetadataValue> {
        let keyword = keyword.to_uppercase();
        self.comments.shift_remove(&keyword);
        self.values.shift_remove(&keyword)
    }

    /// Number of keywords.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when there are no keywords.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keywords and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Header cards for every keyword, in insertion order.
    ///
    /// Structural keywords are refused, as are keywords that cannot carry a
    /// value (`COMMENT`, `HISTORY`, a bare `HIERARCH`) and values that a header
    /// cannot hold: non-finite floats and strings too long for one card.
    pub fn to_cards(&self) -> Result<Vec<Card>> {
        self.values
            .iter()
            .map(|(keyword, value)| {
                let bad = |reason: String| Error::Metadata {
                    keyword: keyword.clone(),
                    reason,
                };
                if is_reserved_keyword(keyword) {
                    return Err(bad("describes the file structure".into()));
                }
                if matches!(keyword.as_str(), "" | "COMMENT" | "HISTORY" | HIERARCH) {
                    return Err(bad("cannot carry a value".into()));
                }
                if let MetadataValue::Float(x) = value {
                    if !x.is_finite() {
                        return Err(bad(format!("{x} cannot be stored in a header")));
                    }
                }
                let mut card = Card::new(keyword.as_str(), value.clone().into());
                card.comment = self.comments.get(keyword).cloned();
                format_card(&card).map_err(|e| bad(e.to_string()))?;
                Ok(card)
            })
            .collect()
    }

    /// Collect the content keywords of a header. Structural keywords, commentary
    /// cards and keywords without a value are skipped.
    pub fn from_cards(cards: &[Card]) -> Self {
        let mut metadata = Metadata::new();
        for card in cards {
            if card.is_commentary() || is_reserved_keyword(&card.keyword) {
                continue;
            }
            let Some(value) = card.value.clone() else {
                continue;
            };
            metadata.insert(&card.keyword, value);
            if let Some(comment) = &card.comment {
                metadata.set_comment(&card.keyword, comment.as_str());
            }
        }
        metadata
    }
}
