//! HTTP handlers: each endpoint resolves its aggregate through the fetch
//! layer, so repeated reads inside the staleness window never touch the
//! Record Store and feed-driven invalidation keeps charts fresh.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::aggregate::reports::{self, LinkageReport, OverviewStats};
use crate::aggregate::{BucketSet, FunnelStage, PercentBasis};
use crate::export::{bucket_sheet, funnel_sheet, SheetSet};
use crate::fetch::{FetchError, FetchLayer, QueryKey};
use crate::models::{Patient, Screening, Visit};
use crate::realtime::{CountersSnapshot, FeedState, RefreshShared};
use crate::store::{RecordStore, RowQuery};

use super::error::ApiError;

/// Delimiter of the text export artifact.
const EXPORT_DELIMITER: u8 = b';';

/// Shared application state injected into every handler.
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub fetch: Arc<FetchLayer>,
    pub realtime: Arc<RefreshShared>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DateRangeParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRangeParams {
    fn check(&self) -> Result<(), ApiError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::BadRequest(format!(
                    "from {} is after to {}",
                    from, to
                )));
            }
        }
        Ok(())
    }

    fn key_segments(&self) -> (String, String) {
        let fmt = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "all".into());
        (fmt(self.from), fmt(self.to))
    }

    fn visit_query(&self) -> RowQuery {
        let mut query = RowQuery::new();
        if let Some(from) = self.from {
            query = query.gte("visit_date", from);
        }
        if let Some(to) = self.to {
            query = query.lte("visit_date", to);
        }
        query
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct FunnelParams {
    #[validate(length(min = 1, max = 64))]
    pub screening_type: Option<String>,
    pub basis: Option<PercentBasis>,
}

// ── Cached aggregate getters ─────────────────────────────────────────────
// The export handlers reuse these, so a spreadsheet download rides the
// same cache entries as the charts.

async fn patient_buckets(
    state: &AppState,
    key: QueryKey,
    build: impl Fn(&[Patient]) -> BucketSet + Send + Sync + 'static,
) -> Result<BucketSet, FetchError> {
    let store = Arc::clone(&state.store);
    let build = Arc::new(build);
    state
        .fetch
        .fetch(key, move || {
            let store = Arc::clone(&store);
            let build = Arc::clone(&build);
            async move {
                let patients = store.patients(&RowQuery::new()).await?;
                serde_json::to_value((*build)(&patients)).map_err(Into::into)
            }
        })
        .await
}

async fn visit_buckets(
    state: &AppState,
    key: QueryKey,
    query: RowQuery,
    build: impl Fn(&[Visit]) -> BucketSet + Send + Sync + 'static,
) -> Result<BucketSet, FetchError> {
    let store = Arc::clone(&state.store);
    let build = Arc::new(build);
    state
        .fetch
        .fetch(key, move || {
            let store = Arc::clone(&store);
            let build = Arc::clone(&build);
            let query = query.clone();
            async move {
                let visits = store.visits(&query).await?;
                serde_json::to_value((*build)(&visits)).map_err(Into::into)
            }
        })
        .await
}

async fn screening_buckets(
    state: &AppState,
    key: QueryKey,
    build: impl Fn(&[Screening]) -> BucketSet + Send + Sync + 'static,
) -> Result<BucketSet, FetchError> {
    let store = Arc::clone(&state.store);
    let build = Arc::new(build);
    state
        .fetch
        .fetch(key, move || {
            let store = Arc::clone(&store);
            let build = Arc::clone(&build);
            async move {
                let screenings = store.screenings(&RowQuery::new()).await?;
                serde_json::to_value((*build)(&screenings)).map_err(Into::into)
            }
        })
        .await
}

async fn overview_stats(state: &AppState) -> Result<OverviewStats, FetchError> {
    let store = Arc::clone(&state.store);
    state
        .fetch
        .fetch(QueryKey::new(["overview"]), move || {
            let store = Arc::clone(&store);
            async move {
                let patients = store.patients(&RowQuery::new()).await?;
                let visits = store.visits(&RowQuery::new()).await?;
                let screenings = store.screenings(&RowQuery::new()).await?;
                serde_json::to_value(reports::overview(&patients, &visits, &screenings))
                    .map_err(Into::into)
            }
        })
        .await
}

async fn linkage(state: &AppState) -> Result<LinkageReport, FetchError> {
    let store = Arc::clone(&state.store);
    state
        .fetch
        .fetch(QueryKey::new(["coverage", "linkage"]), move || {
            let store = Arc::clone(&store);
            async move {
                let patients = store.patients(&RowQuery::new()).await?;
                serde_json::to_value(reports::linkage_report(&patients)).map_err(Into::into)
            }
        })
        .await
}

async fn lab_type_buckets(state: &AppState) -> Result<BucketSet, FetchError> {
    let store = Arc::clone(&state.store);
    state
        .fetch
        .fetch(QueryKey::new(["labs", "types"]), move || {
            let store = Arc::clone(&store);
            async move {
                let exams = store.lab_exams(&RowQuery::new()).await?;
                serde_json::to_value(reports::lab_exam_types(&exams)).map_err(Into::into)
            }
        })
        .await
}

async fn funnel_stages(
    state: &AppState,
    screening_type: Option<String>,
    basis: PercentBasis,
) -> Result<Vec<FunnelStage>, FetchError> {
    let basis_segment = match basis {
        PercentBasis::PreviousStage => "previous-stage",
        PercentBasis::TopOfFunnel => "top-of-funnel",
    };
    let type_segment = screening_type.clone().unwrap_or_else(|| "all".into());
    let key = QueryKey::new(["screenings", "funnel", type_segment.as_str(), basis_segment]);

    let store = Arc::clone(&state.store);
    state
        .fetch
        .fetch(key, move || {
            let store = Arc::clone(&store);
            let screening_type = screening_type.clone();
            async move {
                let screenings = store.screenings(&RowQuery::new()).await?;
                let stages =
                    reports::screening_funnel(&screenings, screening_type.as_deref(), basis);
                serde_json::to_value(stages).map_err(Into::into)
            }
        })
        .await
}

// ── Endpoints ────────────────────────────────────────────────────────────

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let record_store = state.store.ping().await.is_ok();
    let status = if record_store { "ok" } else { "degraded" };
    HttpResponse::Ok().json(serde_json::json!({
        "status": status,
        "record_store": record_store,
        "feed": state.realtime.connectivity(),
    }))
}

#[derive(Debug, Serialize)]
struct OverviewResponse {
    stats: OverviewStats,
    /// Best-effort local counters, not authoritative.
    today: CountersSnapshot,
    feed: FeedState,
}

pub async fn overview(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = overview_stats(&state).await?;
    Ok(HttpResponse::Ok().json(OverviewResponse {
        stats,
        today: state.realtime.counters(),
        feed: state.realtime.connectivity(),
    }))
}

pub async fn demographics_sex(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let set = patient_buckets(
        &state,
        QueryKey::new(["demographics", "sex"]),
        |p| reports::sex_distribution(p),
    )
    .await?;
    Ok(HttpResponse::Ok().json(set))
}

pub async fn demographics_age(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let today = Local::now().date_naive();
    let set = patient_buckets(
        &state,
        QueryKey::new(["demographics", "age"]),
        move |p| reports::age_distribution(p, today),
    )
    .await?;
    Ok(HttpResponse::Ok().json(set))
}

pub async fn demographics_dependency(
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let set = patient_buckets(
        &state,
        QueryKey::new(["demographics", "dependency"]),
        |p| reports::dependency_split(p),
    )
    .await?;
    Ok(HttpResponse::Ok().json(set))
}

pub async fn coverage_linkage(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let report = linkage(&state).await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn visits_channels(
    state: web::Data<AppState>,
    params: web::Query<DateRangeParams>,
) -> Result<HttpResponse, ApiError> {
    params
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    params.check()?;
    let (from, to) = params.key_segments();
    let set = visit_buckets(
        &state,
        QueryKey::new(["visits", "channels", from.as_str(), to.as_str()]),
        params.visit_query(),
        |v| reports::visit_channels(v),
    )
    .await?;
    Ok(HttpResponse::Ok().json(set))
}

pub async fn visits_outcomes(
    state: web::Data<AppState>,
    params: web::Query<DateRangeParams>,
) -> Result<HttpResponse, ApiError> {
    params
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    params.check()?;
    let (from, to) = params.key_segments();
    let set = visit_buckets(
        &state,
        QueryKey::new(["visits", "outcomes", from.as_str(), to.as_str()]),
        params.visit_query(),
        |v| reports::visit_outcomes(v),
    )
    .await?;
    Ok(HttpResponse::Ok().json(set))
}

pub async fn visits_diagnoses(
    state: web::Data<AppState>,
    params: web::Query<DateRangeParams>,
) -> Result<HttpResponse, ApiError> {
    params
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    params.check()?;
    let (from, to) = params.key_segments();
    let set = visit_buckets(
        &state,
        QueryKey::new(["visits", "diagnoses", from.as_str(), to.as_str()]),
        params.visit_query(),
        |v| reports::diagnosis_groups(v),
    )
    .await?;
    Ok(HttpResponse::Ok().json(set))
}

pub async fn labs_types(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let set = lab_type_buckets(&state).await?;
    Ok(HttpResponse::Ok().json(set))
}

pub async fn screenings_funnel(
    state: web::Data<AppState>,
    params: web::Query<FunnelParams>,
) -> Result<HttpResponse, ApiError> {
    params
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let basis = params.basis.unwrap_or(PercentBasis::TopOfFunnel);
    let stages = funnel_stages(&state, params.screening_type.clone(), basis).await?;
    Ok(HttpResponse::Ok().json(stages))
}

pub async fn screenings_status(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let set = screening_buckets(
        &state,
        QueryKey::new(["screenings", "status"]),
        |s| reports::screening_status(s),
    )
    .await?;
    Ok(HttpResponse::Ok().json(set))
}

pub async fn screenings_birads(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let set = screening_buckets(
        &state,
        QueryKey::new(["screenings", "birads"]),
        |s| reports::birads_categories(s),
    )
    .await?;
    Ok(HttpResponse::Ok().json(set))
}

// ── Export ───────────────────────────────────────────────────────────────

async fn export_sheets(state: &AppState, report: &str) -> Result<SheetSet, ApiError> {
    let mut set = SheetSet::new(report);
    match report {
        "demographics" => {
            let today = Local::now().date_naive();
            let sex = patient_buckets(state, QueryKey::new(["demographics", "sex"]), |p| {
                reports::sex_distribution(p)
            })
            .await?;
            let age = patient_buckets(state, QueryKey::new(["demographics", "age"]), move |p| {
                reports::age_distribution(p, today)
            })
            .await?;
            let dependency =
                patient_buckets(state, QueryKey::new(["demographics", "dependency"]), |p| {
                    reports::dependency_split(p)
                })
                .await?;
            let linkage = linkage(state).await?;
            set.push(bucket_sheet("Sex", &sex));
            set.push(bucket_sheet("Age bands", &age));
            set.push(bucket_sheet("Dependency", &dependency));
            set.push(bucket_sheet("Linkage", &linkage.breakdown));
        }
        "visits" => {
            let all = DateRangeParams { from: None, to: None };
            let (from, to) = all.key_segments();
            let channels = visit_buckets(
                state,
                QueryKey::new(["visits", "channels", from.as_str(), to.as_str()]),
                all.visit_query(),
                |v| reports::visit_channels(v),
            )
            .await?;
            let outcomes = visit_buckets(
                state,
                QueryKey::new(["visits", "outcomes", from.as_str(), to.as_str()]),
                all.visit_query(),
                |v| reports::visit_outcomes(v),
            )
            .await?;
            let diagnoses = visit_buckets(
                state,
                QueryKey::new(["visits", "diagnoses", from.as_str(), to.as_str()]),
                all.visit_query(),
                |v| reports::diagnosis_groups(v),
            )
            .await?;
            set.push(bucket_sheet("Channels", &channels));
            set.push(bucket_sheet("Outcomes", &outcomes));
            set.push(bucket_sheet("Diagnoses", &diagnoses));
        }
        "screenings" => {
            let status = screening_buckets(state, QueryKey::new(["screenings", "status"]), |s| {
                reports::screening_status(s)
            })
            .await?;
            let funnel = funnel_stages(state, None, PercentBasis::TopOfFunnel).await?;
            let retained = funnel_stages(state, None, PercentBasis::PreviousStage).await?;
            let birads = screening_buckets(state, QueryKey::new(["screenings", "birads"]), |s| {
                reports::birads_categories(s)
            })
            .await?;
            set.push(bucket_sheet("Status", &status));
            set.push(funnel_sheet("Funnel", &funnel));
            set.push(funnel_sheet("Funnel retained", &retained));
            set.push(bucket_sheet("BI-RADS", &birads));
        }
        "labs" => {
            let types = lab_type_buckets(state).await?;
            set.push(bucket_sheet("Exam types", &types));
        }
        other => return Err(ApiError::NotFound(format!("unknown report: {}", other))),
    }
    Ok(set)
}

pub async fn export_report(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (report, format) = path.into_inner();
    let sheets = export_sheets(&state, &report).await?;

    let (bytes, content_type) = match format.as_str() {
        "xlsx" => (
            sheets.to_xlsx()?,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        "csv" => (sheets.to_delimited(EXPORT_DELIMITER)?, "text/csv; charset=utf-8"),
        other => {
            return Err(ApiError::BadRequest(format!(
                "unsupported export format: {}",
                other
            )))
        }
    };

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}.{}\"", report, format),
        ))
        .body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{
        DependencyStatus, LinkageStatus, ScreeningStatus, Sex,
    };
    use crate::store::{MockRecordStore, StoreError};
    use actix_web::{test, App};
    use std::time::Duration;
    use uuid::Uuid;

    fn sample_patients() -> Vec<Patient> {
        let patient = |sex, linkage| Patient {
            id: Uuid::new_v4(),
            sex,
            birth_date: NaiveDate::from_ymd_opt(1985, 5, 20).unwrap(),
            linkage,
            dependency: DependencyStatus::PrimaryHolder,
            enrolled_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        vec![
            patient(Sex::Male, LinkageStatus::Linked),
            patient(Sex::Female, LinkageStatus::Linked),
            patient(Sex::Female, LinkageStatus::NotLinked),
        ]
    }

    fn sample_screenings() -> Vec<Screening> {
        let day = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let row = |requested: bool, performed: bool, result: Option<&str>| Screening {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            screening_type: "mammography".into(),
            requested_at: requested.then_some(day),
            performed_at: performed.then_some(day),
            due_at: None,
            status: ScreeningStatus::Done,
            result: result.map(Into::into),
        };
        vec![
            row(true, true, Some("1")),
            row(true, true, Some("2")),
            row(true, false, None),
            row(false, false, None),
        ]
    }

    fn state_with(mock: MockRecordStore) -> web::Data<AppState> {
        let fetch = Arc::new(FetchLayer::with_retry_base(
            Duration::from_secs(300),
            Duration::ZERO,
        ));
        web::Data::new(AppState {
            store: Arc::new(mock),
            fetch: Arc::clone(&fetch),
            realtime: Arc::new(RefreshShared::new(fetch)),
        })
    }

    #[actix_rt::test]
    async fn sex_endpoint_returns_ordered_buckets() {
        let mut mock = MockRecordStore::new();
        mock.expect_patients()
            .returning(|_| Ok(sample_patients()));

        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/demographics/sex")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["total"], 3);
        assert_eq!(body["buckets"][0]["label"], "female");
        assert_eq!(body["buckets"][0]["count"], 2);
        assert_eq!(body["buckets"][0]["pct"], 67);
        assert_eq!(body["buckets"][1]["label"], "male");
        assert_eq!(body["buckets"][1]["pct"], 33);
    }

    #[actix_rt::test]
    async fn repeated_reads_hit_the_cache() {
        let mut mock = MockRecordStore::new();
        mock.expect_patients()
            .times(1)
            .returning(|_| Ok(sample_patients()));

        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri("/api/demographics/sex")
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert!(resp.status().is_success());
        }
    }

    #[actix_rt::test]
    async fn store_outage_surfaces_as_bad_gateway_after_retries() {
        let mut mock = MockRecordStore::new();
        mock.expect_patients()
            .times(3)
            .returning(|_| Err(StoreError::Query(sqlx::Error::PoolTimedOut)));

        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/demographics/sex")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_GATEWAY);
    }

    #[actix_rt::test]
    async fn funnel_basis_changes_percentages() {
        let mut mock = MockRecordStore::new();
        mock.expect_screenings()
            .returning(|_| Ok(sample_screenings()));

        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/screenings/funnel?basis=top-of-funnel")
            .to_request();
        let absolute: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(absolute[0]["pct"], 100);
        assert_eq!(absolute[2]["pct"], 50);
        assert_eq!(absolute[2]["basis"], "top-of-funnel");

        let req = test::TestRequest::get()
            .uri("/api/screenings/funnel?basis=previous-stage")
            .to_request();
        let retained: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(retained[2]["pct"], 67);
        assert_eq!(retained[2]["basis"], "previous-stage");
    }

    #[actix_rt::test]
    async fn inverted_date_range_is_rejected() {
        let mock = MockRecordStore::new();
        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/visits/channels?from=2026-02-01&to=2026-01-01")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn csv_export_carries_attachment_headers() {
        let mut mock = MockRecordStore::new();
        mock.expect_lab_exams().returning(|_| Ok(Vec::new()));

        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/export/labs.csv")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let disposition = resp
            .headers()
            .get("Content-Disposition")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("labs.csv"));
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("Exam types"));
    }

    #[actix_rt::test]
    async fn unknown_report_is_404_and_bad_format_400() {
        let mut mock = MockRecordStore::new();
        mock.expect_lab_exams().returning(|_| Ok(Vec::new()));

        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/export/nonsense.csv")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/export/labs.pdf")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn overview_attaches_live_counters_and_feed_state() {
        let mut mock = MockRecordStore::new();
        mock.expect_patients().returning(|_| Ok(sample_patients()));
        mock.expect_visits().returning(|_| Ok(Vec::new()));
        mock.expect_screenings()
            .returning(|_| Ok(sample_screenings()));

        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/overview").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["stats"]["total_patients"], 3);
        assert_eq!(body["stats"]["linkage"]["linked"], 2);
        assert_eq!(body["stats"]["linkage"]["pct"], 67);
        assert_eq!(body["feed"], "disconnected");
        assert_eq!(body["today"]["visits"], 0);
    }

    #[actix_rt::test]
    async fn health_reports_degraded_store() {
        let mut mock = MockRecordStore::new();
        mock.expect_ping()
            .returning(|| Err(StoreError::Query(sqlx::Error::PoolTimedOut)));

        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["record_store"], false);
    }

    #[::core::prelude::v1::test]
    fn date_range_builds_bounded_query() {
        let params = DateRangeParams {
            from: NaiveDate::from_ymd_opt(2026, 1, 1),
            to: NaiveDate::from_ymd_opt(2026, 1, 31),
        };
        assert!(params.check().is_ok());
        let (from, to) = params.key_segments();
        assert_eq!(from, "2026-01-01");
        assert_eq!(to, "2026-01-31");

        let all = DateRangeParams { from: None, to: None };
        assert_eq!(all.key_segments(), ("all".into(), "all".into()));
    }

    #[actix_rt::test]
    async fn funnel_rejects_oversized_type_filter() {
        let mock = MockRecordStore::new();
        let app = test::init_service(
            App::new()
                .app_data(state_with(mock))
                .configure(crate::api::configure),
        )
        .await;

        let long = "x".repeat(65);
        let req = test::TestRequest::get()
            .uri(&format!("/api/screenings/funnel?screening_type={}", long))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
