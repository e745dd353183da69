use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ScreeningStatus;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Screening {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Program identifier, e.g. "mammography" or "cervical-cytology".
    pub screening_type: String,
    pub requested_at: Option<NaiveDate>,
    pub performed_at: Option<NaiveDate>,
    pub due_at: Option<NaiveDate>,
    pub status: ScreeningStatus,
    /// Result classification code. Mammography rows carry the BI-RADS
    /// category as "0" through "6".
    pub result: Option<String>,
}

impl Screening {
    /// BI-RADS category when the result parses as one.
    pub fn birads(&self) -> Option<u8> {
        let code: u8 = self.result.as_deref()?.trim().parse().ok()?;
        (code <= 6).then_some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screening(result: Option<&str>) -> Screening {
        Screening {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            screening_type: "mammography".into(),
            requested_at: None,
            performed_at: None,
            due_at: None,
            status: ScreeningStatus::Done,
            result: result.map(Into::into),
        }
    }

    #[test]
    fn parses_birads_categories() {
        assert_eq!(screening(Some("0")).birads(), Some(0));
        assert_eq!(screening(Some("4")).birads(), Some(4));
        assert_eq!(screening(Some(" 6 ")).birads(), Some(6));
    }

    #[test]
    fn rejects_non_birads_results() {
        assert_eq!(screening(Some("7")).birads(), None);
        assert_eq!(screening(Some("negative")).birads(), None);
        assert_eq!(screening(None).birads(), None);
    }
}
