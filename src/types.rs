use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A totally ordered key used both as an instance identifier and as an indexed value.
///
/// Every on-disk ordering (page entry order, index manifest order, range scans) is
/// defined in terms of this type's `Ord` implementation, never the caller's own type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Bytes(Vec<u8>),
    Str(String),
    I64(i64),
    U64(u64),
    Bool(bool),
}

impl Key {
    #[must_use]
    pub fn as_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self {
            Self::Bytes(b) => std::borrow::Cow::Borrowed(b),
            Self::Str(s) => std::borrow::Cow::Borrowed(s.as_bytes()),
            Self::I64(i) => std::borrow::Cow::Owned(i.to_be_bytes().to_vec()),
            Self::U64(u) => std::borrow::Cow::Owned(u.to_be_bytes().to_vec()),
            Self::Bool(b) => std::borrow::Cow::Owned(vec![u8::from(*b)]),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Bytes(_) => 0,
            Self::Str(_) => 1,
            Self::I64(_) => 2,
            Self::U64(_) => 3,
            Self::Bool(_) => 4,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::I64(a), Self::I64(b)) => a.cmp(b),
            (Self::U64(a), Self::U64(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Bytes(b) => b.hash(state),
            Self::Str(s) => s.hash(state),
            Self::I64(i) => i.hash(state),
            Self::U64(u) => u.hash(state),
            Self::Bool(b) => b.hash(state),
        }
    }
}

/// A scan direction over an ordered index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Ascending,
    Descending,
}

/// A caller-supplied schema version tag, carried opaquely as JSON.
///
/// `warm_up` only ever compares these via the caller-supplied `VersionOrd`
/// shim; the core never interprets the shape of the value itself.
pub type VersionTag = serde_json::Value;

pub trait VersionOrd {
    fn version_cmp(&self, a: &VersionTag, b: &VersionTag) -> Ordering;
}

/// Default ordering for version tags that are JSON integers or strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalVersionOrd;

impl VersionOrd for NaturalVersionOrd {
    fn version_cmp(&self, a: &VersionTag, b: &VersionTag) -> Ordering {
        match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.to_string().cmp(&b.to_string()),
        }
    }
}
