use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::VisitChannel;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_date: NaiveDate,
    pub channel: VisitChannel,
    /// Outcome code as recorded by the backend; absent for open visits.
    pub outcome: Option<String>,
    /// Primary diagnosis code (ICD-style), when one was recorded.
    pub diagnosis: Option<String>,
}
