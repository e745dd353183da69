//! Domain aggregations: cohort breakdowns computed from Record Store rows.
//!
//! Each function is a pure linear scan; staleness and refresh are the
//! fetch layer's concern.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::patient::AGE_BANDS;
use crate::models::{LabExam, LinkageStatus, Patient, Screening, ScreeningStatus, Visit};

use super::{funnel, partition, partition_ordered, BucketSet, FunnelStage, PercentBasis};

/// BI-RADS category labels in display order.
const BIRADS_LABELS: &[&str] = &[
    "BI-RADS 0",
    "BI-RADS 1",
    "BI-RADS 2",
    "BI-RADS 3",
    "BI-RADS 4",
    "BI-RADS 5",
    "BI-RADS 6",
];

/// Share of patients actively linked to the care program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub linked: u64,
    pub total: u64,
    pub pct: u32,
}

/// Headline KPI numbers for the dashboard landing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewStats {
    pub total_patients: u64,
    pub linkage: CoverageSummary,
    pub total_visits: u64,
    pub pending_screenings: u64,
    pub overdue_screenings: u64,
}

pub fn sex_distribution(patients: &[Patient]) -> BucketSet {
    partition(patients, |p| Some(p.sex.to_string()))
}

pub fn age_distribution(patients: &[Patient], today: NaiveDate) -> BucketSet {
    partition_ordered(patients, |p| p.age_band(today).map(String::from), AGE_BANDS)
}

pub fn dependency_split(patients: &[Patient]) -> BucketSet {
    partition(patients, |p| Some(p.dependency.to_string()))
}

/// Full three-state linkage breakdown; "not-linked" and "unlinked" stay
/// distinct buckets.
pub fn linkage_breakdown(patients: &[Patient]) -> BucketSet {
    partition(patients, |p| Some(p.linkage.to_string()))
}

pub fn linkage_coverage(patients: &[Patient]) -> CoverageSummary {
    let total = patients.len() as u64;
    let linked = patients
        .iter()
        .filter(|p| p.linkage == LinkageStatus::Linked)
        .count() as u64;
    let pct = if total == 0 {
        0
    } else {
        ((100 * linked + total / 2) / total) as u32
    };
    CoverageSummary { linked, total, pct }
}

/// Coverage summary plus the full breakdown, served by one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkageReport {
    pub coverage: CoverageSummary,
    pub breakdown: BucketSet,
}

pub fn linkage_report(patients: &[Patient]) -> LinkageReport {
    LinkageReport {
        coverage: linkage_coverage(patients),
        breakdown: linkage_breakdown(patients),
    }
}

pub fn visit_channels(visits: &[Visit]) -> BucketSet {
    partition(visits, |v| Some(v.channel.to_string()))
}

/// Visits without a recorded outcome are excluded, not bucketed.
pub fn visit_outcomes(visits: &[Visit]) -> BucketSet {
    partition(visits, |v| v.outcome.clone())
}

/// Diagnosis grouping by code chapter (first three characters), the
/// granularity the charts plot.
pub fn diagnosis_groups(visits: &[Visit]) -> BucketSet {
    partition(visits, |v| {
        v.diagnosis
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| d.trim().chars().take(3).collect::<String>().to_uppercase())
    })
}

pub fn lab_exam_types(exams: &[LabExam]) -> BucketSet {
    partition(exams, |e| Some(e.exam_type.clone()))
}

/// Screening funnel: eligible (every row of the type) → requested →
/// performed → classified. `screening_type = None` spans all programs.
pub fn screening_funnel(
    screenings: &[Screening],
    screening_type: Option<&str>,
    basis: PercentBasis,
) -> Vec<FunnelStage> {
    let rows: Vec<&Screening> = screenings
        .iter()
        .filter(|s| screening_type.map_or(true, |t| s.screening_type == t))
        .collect();

    let eligible = rows.len() as u64;
    let requested = rows.iter().filter(|s| s.requested_at.is_some()).count() as u64;
    let performed = rows.iter().filter(|s| s.performed_at.is_some()).count() as u64;
    let classified = rows.iter().filter(|s| s.result.is_some()).count() as u64;

    funnel(
        &[
            ("eligible", eligible),
            ("requested", requested),
            ("performed", performed),
            ("classified", classified),
        ],
        basis,
    )
}

pub fn screening_status(screenings: &[Screening]) -> BucketSet {
    partition(screenings, |s| Some(s.status.to_string()))
}

/// BI-RADS category counts over mammography results. Rows whose result is
/// absent or not a BI-RADS code are excluded from the total.
pub fn birads_categories(screenings: &[Screening]) -> BucketSet {
    partition_ordered(
        screenings,
        |s| s.birads().map(|c| format!("BI-RADS {}", c)),
        BIRADS_LABELS,
    )
}

pub fn overview(
    patients: &[Patient],
    visits: &[Visit],
    screenings: &[Screening],
) -> OverviewStats {
    OverviewStats {
        total_patients: patients.len() as u64,
        linkage: linkage_coverage(patients),
        total_visits: visits.len() as u64,
        pending_screenings: screenings
            .iter()
            .filter(|s| s.status == ScreeningStatus::Pending)
            .count() as u64,
        overdue_screenings: screenings
            .iter()
            .filter(|s| s.status == ScreeningStatus::Overdue)
            .count() as u64,
    }
}
