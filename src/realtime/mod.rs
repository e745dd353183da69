//! Realtime refresh controller.
//!
//! Owns the change-feed subscription, today's per-table insert counters,
//! and the cache-invalidation fan-out. Counters are a best-effort local
//! hint for the dashboard header — never authoritative; any persisted
//! metric is re-derived from the Record Store.

pub mod feed;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::RealtimeSettings;
use crate::fetch::{FetchLayer, QueryKey};

pub use feed::{ChangeEvent, ChangeKind, FeedState};

/// Record Store tables whose inserts drive counters and invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedTable {
    Patients,
    Visits,
    LabExams,
    Screenings,
}

impl WatchedTable {
    pub const ALL: &'static [WatchedTable] = &[
        WatchedTable::Patients,
        WatchedTable::Visits,
        WatchedTable::LabExams,
        WatchedTable::Screenings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchedTable::Patients => "patients",
            WatchedTable::Visits => "visits",
            WatchedTable::LabExams => "lab_exams",
            WatchedTable::Screenings => "screenings",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    /// Cache key prefixes whose aggregates depend on this table.
    fn invalidation_prefixes(&self) -> &'static [&'static [&'static str]] {
        match self {
            WatchedTable::Patients => &[&["overview"], &["demographics"], &["coverage"]],
            WatchedTable::Visits => &[&["overview"], &["visits"]],
            WatchedTable::LabExams => &[&["overview"], &["labs"]],
            WatchedTable::Screenings => &[&["overview"], &["screenings"]],
        }
    }
}

/// Inserts observed today, reset at local calendar-day rollover.
#[derive(Debug, Clone, Copy)]
struct TodayCounters {
    day: NaiveDate,
    patients: u64,
    visits: u64,
    lab_exams: u64,
    screenings: u64,
}

impl TodayCounters {
    fn new(day: NaiveDate) -> Self {
        Self { day, patients: 0, visits: 0, lab_exams: 0, screenings: 0 }
    }

    fn roll(&mut self, today: NaiveDate) {
        if today != self.day {
            *self = Self::new(today);
        }
    }

    fn record(&mut self, table: WatchedTable, today: NaiveDate) {
        self.roll(today);
        match table {
            WatchedTable::Patients => self.patients += 1,
            WatchedTable::Visits => self.visits += 1,
            WatchedTable::LabExams => self.lab_exams += 1,
            WatchedTable::Screenings => self.screenings += 1,
        }
    }
}

/// Counter values pushed to dashboard clients.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub day: NaiveDate,
    pub patients: u64,
    pub visits: u64,
    pub lab_exams: u64,
    pub screenings: u64,
}

/// State shared between the feed task, HTTP handlers, and ws sessions.
pub struct RefreshShared {
    state: Mutex<FeedState>,
    counters: Mutex<TodayCounters>,
    fetch: Arc<FetchLayer>,
}

impl RefreshShared {
    pub fn new(fetch: Arc<FetchLayer>) -> Self {
        Self {
            state: Mutex::new(FeedState::Disconnected),
            counters: Mutex::new(TodayCounters::new(Local::now().date_naive())),
            fetch,
        }
    }

    pub fn connectivity(&self) -> FeedState {
        *self.state.lock().expect("feed state lock poisoned")
    }

    pub(crate) fn set_state(&self, next: FeedState) {
        let mut state = self.state.lock().expect("feed state lock poisoned");
        if *state != next {
            info!(from = ?*state, to = ?next, "change feed state");
            *state = next;
        }
    }

    /// Current counters, rolled to today on read.
    pub fn counters(&self) -> CountersSnapshot {
        let mut counters = self.counters.lock().expect("counters lock poisoned");
        counters.roll(Local::now().date_naive());
        CountersSnapshot {
            day: counters.day,
            patients: counters.patients,
            visits: counters.visits,
            lab_exams: counters.lab_exams,
            screenings: counters.screenings,
        }
    }

    /// Apply one feed notification: count the insert and drop every cache
    /// family that aggregates the table. A read racing the notification may
    /// still see pre-insert data until the store reflects the row.
    pub fn apply_event(&self, event: &ChangeEvent) {
        if event.event != ChangeKind::Insert {
            return;
        }
        let Some(table) = WatchedTable::from_name(&event.table) else {
            debug!(table = %event.table, "notification for unwatched table");
            return;
        };

        self.counters
            .lock()
            .expect("counters lock poisoned")
            .record(table, Local::now().date_naive());

        for prefix in table.invalidation_prefixes() {
            self.fetch.invalidate(&QueryKey::new(prefix.iter().copied()));
        }
    }
}

/// Handle owning the feed task. Shutdown releases the subscription exactly
/// once; repeated calls are no-ops.
pub struct RefreshController {
    shared: Arc<RefreshShared>,
    stop: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
}

impl RefreshController {
    pub fn spawn(settings: RealtimeSettings, fetch: Arc<FetchLayer>) -> Self {
        let shared = Arc::new(RefreshShared::new(fetch));
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(feed::run_feed(settings, Arc::clone(&shared), stop_rx));
        Self {
            shared,
            stop,
            handle: Mutex::new(Some(handle)),
            released: AtomicBool::new(false),
        }
    }

    pub fn shared(&self) -> Arc<RefreshShared> {
        Arc::clone(&self.shared)
    }

    pub async fn shutdown(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.stop.send(true);
        let handle = self.handle.lock().expect("controller handle lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        if !self.released.load(Ordering::SeqCst) {
            let _ = self.stop.send(true);
        }
    }
}
