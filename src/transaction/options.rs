//! Bitflag options threaded through every transaction, distinguishing durability
//! and observation behavior per call rather than wiring a separate method for
//! every combination.

/// A read-only transaction takes no writer slot and never blocks the writer queue.
pub const READ_ONLY: u32 = 1;
/// Collate writes made within this transaction into a single commit record.
pub const COLLATE_WRITES: u32 = 2;
/// Replaying this transaction a second time (same instance keys, same values) is safe.
pub const IDEMPOTENT: u32 = 4;
/// Suppress observation-bus events for this transaction's mutations.
pub const SKIP_OBSERVATIONS: u32 = 0x1_0000;
/// Force an fsync of every page and manifest this transaction writes before it commits.
pub const ENFORCE_DURABILITY: u32 = 0x2_0000;

/// Parsed transaction options, built from the bitflags above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions(pub u32);

impl TxOptions {
    #[must_use]
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn is_read_only(self) -> bool {
        self.0 & READ_ONLY != 0
    }

    #[must_use]
    pub fn collates_writes(self) -> bool {
        self.0 & COLLATE_WRITES != 0
    }

    #[must_use]
    pub fn is_idempotent(self) -> bool {
        self.0 & IDEMPOTENT != 0
    }

    #[must_use]
    pub fn skips_observations(self) -> bool {
        self.0 & SKIP_OBSERVATIONS != 0
    }

    #[must_use]
    pub fn enforces_durability(self) -> bool {
        self.0 & ENFORCE_DURABILITY != 0
    }
}
