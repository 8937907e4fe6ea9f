//! Transaction guard
//!
//! [`Transaction`] wraps one backend transaction for the lifetime of a group of
//! facade operations. It tracks status, refuses writes through read-only
//! transactions, and settles itself when dropped according to
//! [`CloseBehavior`].
//!
//! # Status transitions
//!
//! ```text
//! Active ──commit()──▶ Committed
//!   │ └───cancel()──▶ Cancelled
//!   └── backend error on write ──▶ Failed
//!                                    └──(drop / commit / cancel)──▶ backend cancel
//! ```

use std::fmt;

use tracing::{debug, info, warn};

use chronodoc_core::{Error, Result};
use chronodoc_storage::KvTransaction;

use crate::config::CloseBehavior;

/// Current state of a [`Transaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Operations may run
    Active,
    /// Writes were made visible
    Committed,
    /// Writes were discarded
    Cancelled,
    /// A write hit a backend error; only cancellation remains
    Failed {
        /// Message of the error that failed the transaction
        reason: String,
    },
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => f.write_str("active"),
            TransactionStatus::Committed => f.write_str("committed"),
            TransactionStatus::Cancelled => f.write_str("cancelled"),
            TransactionStatus::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// Scoped unit of atomicity over one backend transaction
pub struct Transaction<T: KvTransaction> {
    id: u64,
    inner: Option<T>,
    read_only: bool,
    status: TransactionStatus,
    on_close: CloseBehavior,
}

impl<T: KvTransaction> Transaction<T> {
    pub(crate) fn new(id: u64, inner: T, on_close: CloseBehavior) -> Self {
        let read_only = inner.is_read_only();
        debug!(target: "chronodoc::txn", txn_id = id, read_only, "Transaction started");
        Transaction {
            id,
            inner: Some(inner),
            read_only,
            status: TransactionStatus::Active,
            on_close,
        }
    }

    /// Store-unique transaction id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// True if writes are refused
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Check if operations may still run
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if the transaction failed
    pub fn is_failed(&self) -> bool {
        matches!(self.status, TransactionStatus::Failed { .. })
    }

    /// Ensure the transaction is active
    ///
    /// # Errors
    /// Returns [`Error::TransactionNotActive`] otherwise.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::TransactionNotActive {
                state: self.status.to_string(),
            })
        }
    }

    /// Backend transaction for reads
    pub(crate) fn reader(&self) -> Result<&T> {
        self.ensure_active()?;
        self.inner.as_ref().ok_or_else(|| Error::TransactionNotActive {
            state: self.status.to_string(),
        })
    }

    /// Run a mutation against the backend transaction
    ///
    /// A storage or corruption error raised by `f` fails the transaction.
    pub(crate) fn write<R>(&mut self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        self.ensure_active()?;
        if self.read_only {
            return Err(Error::ReadOnlyTransaction);
        }
        let inner = self.inner.as_mut().ok_or_else(|| Error::TransactionNotActive {
            state: self.status.to_string(),
        })?;
        let result = f(inner);
        if let Err(e) = &result {
            if e.is_storage() || matches!(e, Error::Corruption(_)) {
                warn!(target: "chronodoc::txn", txn_id = self.id, error = %e, "Transaction failed");
                self.status = TransactionStatus::Failed {
                    reason: e.to_string(),
                };
            }
        }
        result
    }

    /// Make all writes visible
    ///
    /// A failed transaction is cancelled instead and reports
    /// [`Error::TransactionNotActive`].
    pub fn commit(mut self) -> Result<()> {
        let inner = self.inner.take();
        if !self.is_active() {
            if let Some(inner) = inner {
                inner.cancel()?;
            }
            return Err(Error::TransactionNotActive {
                state: self.status.to_string(),
            });
        }
        let Some(inner) = inner else {
            return Err(Error::TransactionNotActive {
                state: self.status.to_string(),
            });
        };
        match inner.commit() {
            Ok(()) => {
                self.status = TransactionStatus::Committed;
                info!(target: "chronodoc::txn", txn_id = self.id, "Transaction committed");
                Ok(())
            }
            Err(e) => {
                warn!(target: "chronodoc::txn", txn_id = self.id, error = %e, "Commit failed");
                self.status = TransactionStatus::Failed {
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Discard all writes
    pub fn cancel(mut self) -> Result<()> {
        self.status = TransactionStatus::Cancelled;
        debug!(target: "chronodoc::txn", txn_id = self.id, "Transaction cancelled");
        match self.inner.take() {
            Some(inner) => inner.cancel(),
            None => Ok(()),
        }
    }
}

impl<T: KvTransaction> Drop for Transaction<T> {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        let result = match (&self.status, self.on_close) {
            (TransactionStatus::Active, CloseBehavior::Commit) => {
                debug!(target: "chronodoc::txn", txn_id = self.id, "Committing on close");
                inner.commit()
            }
            _ => {
                debug!(
                    target: "chronodoc::txn",
                    txn_id = self.id,
                    status = %self.status,
                    "Cancelling on close"
                );
                inner.cancel()
            }
        };
        if let Err(e) = result {
            warn!(
                target: "chronodoc::txn",
                txn_id = self.id,
                error = %e,
                "Transaction close failed"
            );
        }
    }
}

impl<T: KvTransaction> fmt::Debug for Transaction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("read_only", &self.read_only)
            .field("status", &self.status)
            .field("on_close", &self.on_close)
            .finish()
    }
}
