//! Record Store access: the read-only query interface against the hosted
//! backend's tables.
//!
//! The `RecordStore` trait is the seam between handlers and Postgres;
//! tests mock it, the service runs `PgRecordStore`.

pub mod postgres;
pub mod query;

use async_trait::async_trait;

use crate::models::{LabExam, Patient, Screening, Visit};

pub use postgres::PgRecordStore;
pub use query::{RowQuery, ScalarValue};

/// Failures while reading from the Record Store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,
    #[error("backend query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("result shaping failed: {0}")]
    Shape(#[from] serde_json::Error),
}

impl StoreError {
    /// Only backend query failures are worth retrying; a missing resource
    /// or a shaping bug will not improve on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Query(_))
    }
}

/// Read-only row retrieval per table. Column projection is fixed by the
/// row types; filters, ordering, and limit come from the `RowQuery`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn patients(&self, query: &RowQuery) -> Result<Vec<Patient>, StoreError>;
    async fn visits(&self, query: &RowQuery) -> Result<Vec<Visit>, StoreError>;
    async fn lab_exams(&self, query: &RowQuery) -> Result<Vec<LabExam>, StoreError>;
    async fn screenings(&self, query: &RowQuery) -> Result<Vec<Screening>, StoreError>;
    /// Cheap liveness probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
