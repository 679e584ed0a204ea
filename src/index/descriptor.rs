//! Caller-declared secondary index descriptions. Rather than reflecting over a
//! schema, cowstore requires callers to declare every secondary index up front
//! so the warm-up path never has to guess shape.

use serde::{Deserialize, Serialize};

/// The shape of the relationship a secondary index maintains between an instance's
/// key and the values it's indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// Each instance key maps to exactly one indexed value, and vice versa.
    OneToOne,
    /// Each instance key maps to one indexed value; many keys may share a value.
    ManyToOne,
    /// Each instance key maps to many indexed values.
    OneToMany,
    /// Each instance key maps to many indexed values, and values may be shared.
    ManyToMany,
}

/// Whether a secondary index stores just the instance keys an indexed value maps
/// to (`Reference`, the common case) or duplicates the instance's content
/// alongside each indexed value (`Direct`), trading disk space for skipping a
/// primary-index lookup on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageKind {
    Reference,
    Direct,
}

/// A caller-supplied declaration of one secondary index: its name, the
/// cardinality of the relationship it maintains, whether duplicate indexed
/// values are permitted under a one-to-one/many-to-one cardinality, and how its
/// content is stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub cardinality: Cardinality,
    pub unique: bool,
    pub storage_kind: StorageKind,
}

impl IndexSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, cardinality: Cardinality) -> Self {
        let unique = matches!(cardinality, Cardinality::OneToOne | Cardinality::ManyToOne);
        Self { name: name.into(), cardinality, unique, storage_kind: StorageKind::Reference }
    }

    #[must_use]
    pub fn with_storage_kind(mut self, storage_kind: StorageKind) -> Self {
        self.storage_kind = storage_kind;
        self
    }

    /// A short tag identifying this index's shape, used by schema warm-up to
    /// detect whether a persisted index still matches what's declared live.
    #[must_use]
    pub fn kind_tag(&self) -> String {
        format!("{:?}:{:?}", self.cardinality, self.storage_kind)
    }
}
