//! Gapless sequence numbers for human-readable document codes.
//!
//! Counters are keyed by `(year, document type)`. The increment happens on
//! the caller's transaction under a row lock, so concurrent callers are
//! serialized and a rollback also rolls back the increment.

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::storage::{Storage, Transaction};
use serde::{Deserialize, Serialize};

/// Document families that draw codes from their own counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentType {
    /// Travel request (`SPD`)
    Request,
    /// Expense liquidation (`DES`)
    Liquidation,
}

impl DocumentType {
    /// Code prefix, also the storage key.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Request => "SPD",
            Self::Liquidation => "DES",
        }
    }

    /// Parse a storage key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown prefix.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "SPD" => Ok(Self::Request),
            "DES" => Ok(Self::Liquidation),
            other => Err(Error::Validation(format!("unknown document type: {other}"))),
        }
    }
}

/// Format a code: prefix, two-digit year, four-digit counter (`SPD-250042`).
#[must_use]
pub fn format_code(document: DocumentType, year: i32, value: u32) -> String {
    format!("{}-{:02}{value:04}", document.prefix(), year.rem_euclid(100))
}

/// Issue the next value inside an open transaction.
///
/// # Errors
///
/// Propagates storage failures; the caller's rollback undoes the increment.
pub async fn next_in<T: Transaction>(
    tx: &mut T,
    year: i32,
    document: DocumentType,
) -> Result<u32> {
    let value = tx.increment_sequence(year, document).await?;
    tracing::debug!(year, document = document.prefix(), value, "Sequence value issued");
    metrics::counter!("pasajes.sequence.issued", "document" => document.prefix()).increment(1);
    Ok(value)
}

/// Standalone sequence generator, one transaction per call.
pub struct SequenceGenerator<S> {
    env: Environment<S>,
}

impl<S> Clone for SequenceGenerator<S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
        }
    }
}

impl<S: Storage> SequenceGenerator<S> {
    /// Create a generator.
    #[must_use]
    pub const fn new(env: Environment<S>) -> Self {
        Self { env }
    }

    /// Issue the next value for `(year, document)`.
    ///
    /// Concurrent callers receive distinct, strictly increasing values with
    /// no gaps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] or [`Error::Timeout`]; no value is consumed
    /// in that case.
    pub async fn next_value(&self, year: i32, document: DocumentType) -> Result<u32> {
        self.env
            .bounded(async {
                let mut tx = self.env.storage().begin().await?;
                let value = next_in(&mut tx, year, document).await?;
                tx.commit().await?;
                Ok(value)
            })
            .await
    }

    /// Issue the next value and format it as a code.
    ///
    /// # Errors
    ///
    /// See [`SequenceGenerator::next_value`].
    pub async fn next_code(&self, year: i32, document: DocumentType) -> Result<String> {
        let value = self.next_value(year, document).await?;
        Ok(format_code(document, year, value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{FixedClock, InMemoryStorage};
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn generator(storage: InMemoryStorage) -> SequenceGenerator<InMemoryStorage> {
        SequenceGenerator::new(Environment::new(storage, Arc::new(FixedClock::default())))
    }

    #[test]
    fn codes_use_two_digit_year_and_padding() {
        assert_eq!(format_code(DocumentType::Request, 2025, 42), "SPD-250042");
        assert_eq!(format_code(DocumentType::Liquidation, 2031, 12_345), "DES-3112345");
    }

    #[tokio::test]
    async fn counters_are_independent_per_year_and_type() {
        let sequences = generator(InMemoryStorage::new());

        assert_eq!(sequences.next_value(2025, DocumentType::Request).await.unwrap(), 1);
        assert_eq!(sequences.next_value(2025, DocumentType::Request).await.unwrap(), 2);
        assert_eq!(sequences.next_value(2025, DocumentType::Liquidation).await.unwrap(), 1);
        assert_eq!(sequences.next_value(2026, DocumentType::Request).await.unwrap(), 1);
        assert_eq!(
            sequences.next_code(2025, DocumentType::Request).await.unwrap(),
            "SPD-250003"
        );
    }

    #[tokio::test]
    async fn rolled_back_increment_is_not_consumed() {
        let storage = InMemoryStorage::new();
        {
            let mut tx = storage.begin().await.unwrap();
            assert_eq!(next_in(&mut tx, 2025, DocumentType::Request).await.unwrap(), 1);
            // dropped without commit
        }
        let sequences = generator(storage);
        assert_eq!(sequences.next_value(2025, DocumentType::Request).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_get_exactly_one_to_n() {
        let sequences = generator(InMemoryStorage::new());
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let sequences = sequences.clone();
                tokio::spawn(async move {
                    sequences.next_value(2025, DocumentType::Request).await
                })
            })
            .collect();

        let mut issued = BTreeSet::new();
        for handle in handles {
            assert!(issued.insert(handle.await.unwrap().unwrap()));
        }
        assert_eq!(issued, (1..=64).collect());
    }

    proptest! {
        #[test]
        fn rolled_back_draws_leave_no_gaps(commits in proptest::collection::vec(any::<bool>(), 1..24)) {
            let storage = InMemoryStorage::new();
            let committed = tokio_test::block_on(async {
                let mut committed = 0;
                for commit in &commits {
                    let mut tx = storage.begin().await.unwrap();
                    next_in(&mut tx, 2025, DocumentType::Request).await.unwrap();
                    if *commit {
                        tx.commit().await.unwrap();
                        committed += 1;
                    }
                }
                committed
            });

            let next = tokio_test::block_on(
                generator(storage).next_value(2025, DocumentType::Request),
            )
            .unwrap();
            prop_assert_eq!(next, committed + 1);
        }
    }
}
