use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A timestamp-prefixed identifier whose lexicographic order matches creation order:
/// `"YYYY-MM-DD HH-mm-ss-SSS HHHHHHHHHHHHHHHH"`, UTC milliseconds followed by a
/// 16-hex-digit random token sourced from a UUIDv4's low bits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatedId(String);

impl DatedId {
    #[must_use]
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    #[must_use]
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        let token = random_token();
        Self(format!("{} {token}", timestamp.format("%Y-%m-%d %H-%M-%S-%3f")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the UTC timestamp prefix back out of a dated identifier.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` if the identifier does not match the expected shape.
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        let prefix = self.0.splitn(2, ' ').next().zip(self.0.split(' ').nth(1));
        let (date, time) = prefix.ok_or_else(|| Error::Corrupt(format!("malformed dated id {:?}", self.0)))?;
        let naive = chrono::NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H-%M-%S-%3f")
            .map_err(|e| Error::Corrupt(format!("malformed dated id {:?}: {e}", self.0)))?;
        Ok(naive.and_utc())
    }
}

impl Default for DatedId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DatedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A name-scoped identifier: `"<name>-HHHHHHHHHHHHHHHH"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedId(String);

impl TypedId {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(format!("{name}-{}", random_token()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TypedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_token() -> String {
    let uuid = Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let low = u64::from_be_bytes(bytes[8..16].try_into().expect("uuid has 16 bytes"));
    format!("{low:016x}")
}
