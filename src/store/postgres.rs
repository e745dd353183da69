//! Postgres implementation of the Record Store query interface.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use crate::config::StoreSettings;
use crate::models::{LabExam, Patient, Screening, Visit};

use super::{RecordStore, RowQuery, StoreError};

pub(crate) fn map_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Query(other),
    }
}

/// Connection pool against the hosted Record Store.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_rows<T>(&self, head: &str, query: &RowQuery) -> Result<Vec<T>, StoreError>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(head);
        query.apply(&mut qb);
        qb.build_query_as::<T>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[instrument(skip(self, query))]
    async fn patients(&self, query: &RowQuery) -> Result<Vec<Patient>, StoreError> {
        self.fetch_rows(
            "SELECT id, sex, birth_date, linkage, dependency, enrolled_at FROM patients",
            query,
        )
        .await
    }

    #[instrument(skip(self, query))]
    async fn visits(&self, query: &RowQuery) -> Result<Vec<Visit>, StoreError> {
        self.fetch_rows(
            "SELECT id, patient_id, visit_date, channel, outcome, diagnosis FROM visits",
            query,
        )
        .await
    }

    #[instrument(skip(self, query))]
    async fn lab_exams(&self, query: &RowQuery) -> Result<Vec<LabExam>, StoreError> {
        self.fetch_rows(
            "SELECT id, patient_id, exam_date, exam_type, value, reference_low, reference_high \
             FROM lab_exams",
            query,
        )
        .await
    }

    #[instrument(skip(self, query))]
    async fn screenings(&self, query: &RowQuery) -> Result<Vec<Screening>, StoreError> {
        self.fetch_rows(
            "SELECT id, patient_id, screening_type, requested_at, performed_at, due_at, \
             status, result FROM screenings",
            query,
        )
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
