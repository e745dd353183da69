//! Route table for the dashboard API.

use actix_web::web;

use super::{handlers, ws};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/overview", web::get().to(handlers::overview))
            .route("/demographics/sex", web::get().to(handlers::demographics_sex))
            .route("/demographics/age", web::get().to(handlers::demographics_age))
            .route(
                "/demographics/dependency",
                web::get().to(handlers::demographics_dependency),
            )
            .route("/coverage/linkage", web::get().to(handlers::coverage_linkage))
            .route("/visits/channels", web::get().to(handlers::visits_channels))
            .route("/visits/outcomes", web::get().to(handlers::visits_outcomes))
            .route("/visits/diagnoses", web::get().to(handlers::visits_diagnoses))
            .route("/labs/types", web::get().to(handlers::labs_types))
            .route("/screenings/funnel", web::get().to(handlers::screenings_funnel))
            .route("/screenings/status", web::get().to(handlers::screenings_status))
            .route("/screenings/birads", web::get().to(handlers::screenings_birads))
            .route(
                "/export/{report}.{format}",
                web::get().to(handlers::export_report),
            ),
    )
    .route("/ws", web::get().to(ws::counter_stream));
}
