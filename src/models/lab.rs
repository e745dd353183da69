use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LabExam {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub exam_date: NaiveDate,
    pub exam_type: String,
    pub value: Option<f64>,
    pub reference_low: Option<f64>,
    pub reference_high: Option<f64>,
}

impl LabExam {
    /// Whether the numeric result falls outside its reference range.
    /// Exams without a value or without bounds are never flagged.
    pub fn out_of_range(&self) -> bool {
        match (self.value, self.reference_low, self.reference_high) {
            (Some(v), Some(low), _) if v < low => true,
            (Some(v), _, Some(high)) if v > high => true,
            _ => false,
        }
    }
}
