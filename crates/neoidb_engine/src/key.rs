//! Keys, key ranges and key paths.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A record key.
///
/// Keys of different types order `Integer < Text < Binary < Array`;
/// arrays compare element by element, then by length. The derived
/// ordering matches that rule because of the variant order below.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Integer key.
    Integer(i64),
    /// Text key.
    Text(String),
    /// Binary key.
    Binary(Vec<u8>),
    /// Compound key.
    Array(Vec<Key>),
}

impl Key {
    /// Converts a JSON value into a key.
    ///
    /// Returns `None` for values that are not valid keys: booleans, null,
    /// objects, non-integral numbers, and arrays containing any of those.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(Self::Integer(i));
                }
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Some(Self::Integer(f as i64))
                } else {
                    None
                }
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            Value::Null | Value::Bool(_) | Value::Object(_) => None,
        }
    }

    /// Converts the key into JSON.
    ///
    /// Binary keys become arrays of byte values.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(i) => Value::from(*i),
            Self::Text(s) => Value::String(s.clone()),
            Self::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Returns the integer value, if this is an integer key.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the text value, if this is a text key.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Binary(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<Key>> for Key {
    fn from(value: Vec<Key>) -> Self {
        Self::Array(value)
    }
}

/// A contiguous interval of keys.
///
/// Either bound may be absent (unbounded) and each present bound is
/// either closed (inclusive) or open (exclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Option<Key>,
    upper: Option<Key>,
    lower_open: bool,
    upper_open: bool,
}

impl KeyRange {
    /// A range containing exactly `key`.
    #[must_use]
    pub fn only(key: impl Into<Key>) -> Self {
        let key = key.into();
        Self {
            lower: Some(key.clone()),
            upper: Some(key),
            lower_open: false,
            upper_open: false,
        }
    }

    /// A range with only a lower bound.
    #[must_use]
    pub fn lower_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: Some(key.into()),
            upper: None,
            lower_open: open,
            upper_open: false,
        }
    }

    /// A range with only an upper bound.
    #[must_use]
    pub fn upper_bound(key: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: None,
            upper: Some(key.into()),
            lower_open: false,
            upper_open: open,
        }
    }

    /// A range with both bounds.
    ///
    /// # Errors
    ///
    /// Returns a data error if `lower` is greater than `upper`, or if the
    /// bounds are equal and either end is open.
    pub fn bound(
        lower: impl Into<Key>,
        upper: impl Into<Key>,
        lower_open: bool,
        upper_open: bool,
    ) -> EngineResult<Self> {
        let lower = lower.into();
        let upper = upper.into();
        if lower > upper || (lower == upper && (lower_open || upper_open)) {
            return Err(EngineError::data(format!(
                "key range lower bound {lower} is not below upper bound {upper}"
            )));
        }
        Ok(Self {
            lower: Some(lower),
            upper: Some(upper),
            lower_open,
            upper_open,
        })
    }

    /// Returns the lower bound.
    #[must_use]
    pub fn lower(&self) -> Option<&Key> {
        self.lower.as_ref()
    }

    /// Returns the upper bound.
    #[must_use]
    pub fn upper(&self) -> Option<&Key> {
        self.upper.as_ref()
    }

    /// Whether the lower bound is excluded.
    #[must_use]
    pub fn lower_open(&self) -> bool {
        self.lower_open
    }

    /// Whether the upper bound is excluded.
    #[must_use]
    pub fn upper_open(&self) -> bool {
        self.upper_open
    }

    /// Returns true if `key` lies within the range.
    #[must_use]
    pub fn includes(&self, key: &Key) -> bool {
        let above_lower = match &self.lower {
            Some(lower) if self.lower_open => key > lower,
            Some(lower) => key >= lower,
            None => true,
        };
        let below_upper = match &self.upper {
            Some(upper) if self.upper_open => key < upper,
            Some(upper) => key <= upper,
            None => true,
        };
        above_lower && below_upper
    }
}

/// A dotted path into a JSON record, such as `"id"` or `"author.email"`.
///
/// The empty path designates the record itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPath(String);

impl KeyPath {
    /// Creates a key path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the path as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Returns the JSON value the path points at, if present.
    #[must_use]
    pub fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut current = value;
        for segment in self.segments() {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Evaluates the path against a record.
    ///
    /// Returns `Ok(None)` when the path does not resolve.
    ///
    /// # Errors
    ///
    /// Returns a data error when the path resolves to a value that is not a
    /// valid key.
    pub fn evaluate(&self, value: &Value) -> EngineResult<Option<Key>> {
        match self.lookup(value) {
            None => Ok(None),
            Some(found) => Key::from_json(found).map(Some).ok_or_else(|| {
                EngineError::data(format!(
                    "value at key path `{}` is not a valid key",
                    self.0
                ))
            }),
        }
    }

    /// Writes `key` into `value` at this path, creating intermediate objects.
    ///
    /// # Errors
    ///
    /// Returns a data error for the empty path, or when an intermediate
    /// value exists but is not an object.
    pub fn inject(&self, value: &mut Value, key: &Key) -> EngineResult<()> {
        let segments: Vec<&str> = self.segments().collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(EngineError::data("cannot inject a key at the record root"));
        };
        let not_object = || {
            EngineError::data(format!(
                "cannot inject a key at `{}`: parent is not an object",
                self.0
            ))
        };

        let mut current = value;
        for segment in parents {
            current = current
                .as_object_mut()
                .ok_or_else(not_object)?
                .entry((*segment).to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        current
            .as_object_mut()
            .ok_or_else(not_object)?
            .insert((*last).to_owned(), key.to_json());
        Ok(())
    }
}

impl From<&str> for KeyPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for KeyPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
