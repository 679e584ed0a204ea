//! Single-writer, many-reader transaction coordination: one writer at a time,
//! admitted in FIFO order via a `tokio::sync::Mutex`, alongside any number of
//! concurrent MVCC-pinned readers. Nested transactions are rejected rather than
//! silently reentering.

use crate::errors::{Error, Result};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxKind {
    Read,
    Write,
}

thread_local! {
    static ACTIVE_TX: RefCell<Vec<TxKind>> = const { RefCell::new(Vec::new()) };
}

fn top() -> Option<TxKind> {
    ACTIVE_TX.with(|stack| stack.borrow().last().copied())
}

fn push(kind: TxKind) {
    ACTIVE_TX.with(|stack| stack.borrow_mut().push(kind));
}

fn pop() {
    ACTIVE_TX.with(|stack| {
        stack.borrow_mut().pop();
    });
}

/// Coordinates access to one persistence root's committed version counter.
#[derive(Debug)]
pub struct TransactionCoordinator {
    writer_lock: tokio::sync::Mutex<()>,
    version: AtomicU64,
    notify: Arc<tokio::sync::Notify>,
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self { writer_lock: tokio::sync::Mutex::new(()), version: AtomicU64::new(0), notify: Arc::new(tokio::sync::Notify::new()) }
    }

    #[must_use]
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Wait until the committed version advances past `version`.
    pub async fn wait_for_commit_after(&self, version: u64) {
        while self.current_version() <= version {
            self.notify.notified().await;
        }
    }

    /// Pin a read view onto the currently committed version. Any number of reads
    /// may be pinned concurrently, including nested under another read.
    #[must_use]
    pub fn begin_read(&self) -> ReadView {
        push(TxKind::Read);
        ReadView { pinned_version: self.current_version(), valid: Arc::new(AtomicBool::new(true)) }
    }

    /// Admit one write transaction at a time, in FIFO order. Rejects reentrant
    /// writes and writes nested under an outer read on this thread.
    ///
    /// # Errors
    /// Returns `Error::NestedWriteUnderReader` if called while a read transaction
    /// opened on this thread is still open, or `Error::NestedStoreWrite` if a
    /// write transaction is already open.
    pub async fn begin_write(&self) -> Result<WriteGuard<'_>> {
        match top() {
            Some(TxKind::Read) => return Err(Error::NestedWriteUnderReader),
            Some(TxKind::Write) => return Err(Error::NestedStoreWrite),
            None => {}
        }
        push(TxKind::Write);
        let permit = self.writer_lock.lock().await;
        Ok(WriteGuard { coordinator: self, _permit: permit })
    }

    fn commit(&self) -> u64 {
        let next = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        self.notify.notify_waiters();
        next
    }
}

/// A pinned, read-only view onto a committed version. Using it after the
/// transaction that produced it has ended is rejected rather than silently
/// reading a version that may already be garbage collected.
#[derive(Debug)]
pub struct ReadView {
    pinned_version: u64,
    valid: Arc<AtomicBool>,
}

impl ReadView {
    /// # Errors
    /// Returns `Error::StaleReadView` if the owning transaction has already ended.
    pub fn pinned_version(&self) -> Result<u64> {
        if self.valid.load(Ordering::Acquire) {
            Ok(self.pinned_version)
        } else {
            Err(Error::StaleReadView)
        }
    }
}

impl Drop for ReadView {
    fn drop(&mut self) {
        self.valid.store(false, Ordering::Release);
        pop();
    }
}

/// An admitted write transaction. Dropping without calling `commit` discards the
/// writer slot without advancing the committed version, as if nothing happened.
pub struct WriteGuard<'a> {
    coordinator: &'a TransactionCoordinator,
    _permit: tokio::sync::MutexGuard<'a, ()>,
}

impl WriteGuard<'_> {
    #[must_use]
    pub fn commit(self) -> u64 {
        self.coordinator.commit()
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        pop();
    }
}
