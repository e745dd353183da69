use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DependencyStatus, LinkageStatus, Sex};

/// Age bands used by every demographic breakdown, in display order.
pub const AGE_BANDS: &[&str] = &[
    "0-17", "18-29", "30-39", "40-49", "50-59", "60-69", "70+",
];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub sex: Sex,
    pub birth_date: NaiveDate,
    pub linkage: LinkageStatus,
    pub dependency: DependencyStatus,
    /// Date the patient entered the care program.
    pub enrolled_at: NaiveDate,
}

impl Patient {
    /// Whole years of age as of `today`; `None` for birth dates in the future.
    pub fn age(&self, today: NaiveDate) -> Option<u32> {
        today.years_since(self.birth_date)
    }

    /// Age band label as of `today`. Derived on every pass, never stored.
    pub fn age_band(&self, today: NaiveDate) -> Option<&'static str> {
        let age = self.age(today)?;
        let band = match age {
            0..=17 => "0-17",
            18..=29 => "18-29",
            30..=39 => "30-39",
            40..=49 => "40-49",
            50..=59 => "50-59",
            60..=69 => "60-69",
            _ => "70+",
        };
        Some(band)
    }
}
