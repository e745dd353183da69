//! One-off Record Store provisioning utilities: create the dashboard
//! tables and seed synthetic demo data. Not part of the runtime service.
//!
//! ```text
//! cargo run --features provision --bin provision -- create-tables
//! cargo run --features provision --bin provision -- seed --patients 500
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::{Parser, Subcommand};
use fake::faker::chrono::en::DateTimeBetween;
use fake::Fake;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use carelens::config::Settings;
use carelens::models::enums::{
    DependencyStatus, LinkageStatus, ScreeningStatus, Sex, VisitChannel,
};

#[derive(Parser)]
#[command(name = "provision", about = "One-off Record Store provisioning utilities")]
struct Cli {
    /// Connection string; falls back to the configured record store URL.
    #[arg(long, env = "CARELENS_RECORD_STORE__URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the dashboard tables if they do not exist.
    CreateTables,
    /// Grant read-only access on the dashboard tables to a role.
    GrantRead {
        #[arg(long)]
        role: String,
    },
    /// Insert synthetic demo data.
    Seed {
        #[arg(long, default_value_t = 500)]
        patients: usize,
        /// RNG seed, fixed so demo environments are reproducible.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS patients (
        id UUID PRIMARY KEY,
        sex TEXT NOT NULL CHECK (sex IN ('male', 'female')),
        birth_date DATE NOT NULL,
        linkage TEXT NOT NULL CHECK (linkage IN ('linked', 'not-linked', 'unlinked')),
        dependency TEXT NOT NULL CHECK (dependency IN ('primary-holder', 'dependent')),
        enrolled_at DATE NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS visits (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL REFERENCES patients(id),
        visit_date DATE NOT NULL,
        channel TEXT NOT NULL CHECK (channel IN ('in-person', 'virtual', 'scheduled')),
        outcome TEXT,
        diagnosis TEXT
    )",
    "CREATE TABLE IF NOT EXISTS lab_exams (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL REFERENCES patients(id),
        exam_date DATE NOT NULL,
        exam_type TEXT NOT NULL,
        value DOUBLE PRECISION,
        reference_low DOUBLE PRECISION,
        reference_high DOUBLE PRECISION
    )",
    "CREATE TABLE IF NOT EXISTS screenings (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL REFERENCES patients(id),
        screening_type TEXT NOT NULL,
        requested_at DATE,
        performed_at DATE,
        due_at DATE,
        status TEXT NOT NULL CHECK (status IN ('pending', 'done', 'overdue')),
        result TEXT
    )",
];

const OUTCOMES: &[&str] = &["resolved", "follow-up", "referred", "no-show"];
const DIAGNOSES: &[&str] = &["E11.9", "I10", "J06.9", "M54.5", "F41.1"];
const EXAM_TYPES: &[&str] = &["glycated-hemoglobin", "lipid-panel", "creatinine"];
const SCREENING_TYPES: &[&str] = &["mammography", "cervical-cytology"];

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();
    let url = match cli.database_url {
        Some(url) => url,
        None => {
            Settings::load()
                .context("no --database-url given and configuration did not load")?
                .record_store
                .url
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .context("failed to connect to the record store")?;

    match cli.command {
        Commands::CreateTables => create_tables(&pool).await?,
        Commands::GrantRead { role } => grant_read(&pool, &role).await?,
        Commands::Seed { patients, seed } => seed_demo_data(&pool, patients, seed).await?,
    }
    Ok(())
}

const TABLES: &[&str] = &["patients", "visits", "lab_exams", "screenings"];

async fn grant_read(pool: &PgPool, role: &str) -> Result<()> {
    // Role names cannot be bound as parameters; quote them as identifiers.
    if !role.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("role must be alphanumeric/underscore, got {:?}", role);
    }
    for table in TABLES {
        sqlx::query(&format!("GRANT SELECT ON {} TO \"{}\"", table, role))
            .execute(pool)
            .await?;
    }
    tracing::info!(role, "read access granted");
    Ok(())
}

async fn create_tables(pool: &PgPool) -> Result<()> {
    for statement in CREATE_TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("tables created");
    Ok(())
}

async fn seed_demo_data(pool: &PgPool, patient_count: usize, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let today = Utc::now().date_naive();
    let birth_start: DateTime<Utc> = Utc.with_ymd_and_hms(1935, 1, 1, 0, 0, 0).unwrap();
    let birth_end: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();

    for _ in 0..patient_count {
        let patient_id = Uuid::new_v4();
        let birth_date = DateTimeBetween(birth_start, birth_end)
            .fake_with_rng::<DateTime<Utc>, _>(&mut rng)
            .date_naive();
        let enrolled_at = today - Duration::days(rng.gen_range(30..1500));
        let sex = *Sex::ALL.choose(&mut rng).unwrap();
        let linkage = *LinkageStatus::ALL.choose(&mut rng).unwrap();
        let dependency = *DependencyStatus::ALL.choose(&mut rng).unwrap();

        sqlx::query(
            "INSERT INTO patients (id, sex, birth_date, linkage, dependency, enrolled_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(patient_id)
        .bind(sex.as_str())
        .bind(birth_date)
        .bind(linkage.as_str())
        .bind(dependency.as_str())
        .bind(enrolled_at)
        .execute(pool)
        .await?;

        for _ in 0..rng.gen_range(0..5) {
            let channel = *VisitChannel::ALL.choose(&mut rng).unwrap();
            let outcome = OUTCOMES.choose(&mut rng).filter(|_| rng.gen_bool(0.8));
            let diagnosis = DIAGNOSES.choose(&mut rng).filter(|_| rng.gen_bool(0.7));
            sqlx::query(
                "INSERT INTO visits (id, patient_id, visit_date, channel, outcome, diagnosis)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(patient_id)
            .bind(today - Duration::days(rng.gen_range(0..365)))
            .bind(channel.as_str())
            .bind(outcome.copied())
            .bind(diagnosis.copied())
            .execute(pool)
            .await?;
        }

        for _ in 0..rng.gen_range(0..3) {
            let exam_type = *EXAM_TYPES.choose(&mut rng).unwrap();
            sqlx::query(
                "INSERT INTO lab_exams
                   (id, patient_id, exam_date, exam_type, value, reference_low, reference_high)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::new_v4())
            .bind(patient_id)
            .bind(today - Duration::days(rng.gen_range(0..365)))
            .bind(exam_type)
            .bind(rng.gen_range(3.0..12.0))
            .bind(4.0)
            .bind(6.5)
            .execute(pool)
            .await?;
        }

        for _ in 0..rng.gen_range(0..2) {
            let screening_type = *SCREENING_TYPES.choose(&mut rng).unwrap();
            let status = *ScreeningStatus::ALL.choose(&mut rng).unwrap();
            let requested_at =
                (status != ScreeningStatus::Overdue).then(|| today - Duration::days(rng.gen_range(0..180)));
            let performed_at = (status == ScreeningStatus::Done)
                .then(|| today - Duration::days(rng.gen_range(0..90)));
            let result = (status == ScreeningStatus::Done && screening_type == "mammography")
                .then(|| rng.gen_range(0..=6u8).to_string());
            sqlx::query(
                "INSERT INTO screenings
                   (id, patient_id, screening_type, requested_at, performed_at, due_at, status, result)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::new_v4())
            .bind(patient_id)
            .bind(screening_type)
            .bind(requested_at)
            .bind(performed_at)
            .bind(today + Duration::days(rng.gen_range(0..180)))
            .bind(status.as_str())
            .bind(result)
            .execute(pool)
            .await?;
        }
    }

    tracing::info!(patients = patient_count, "demo data seeded");
    Ok(())
}
