//! Shared fixtures for service tests: SQLite with the real schema (in memory,
//! or a WAL file shared by several connections for contention tests), a seeded
//! local random source and a recording message transport.

use crate::config::LotteryDefaultsConfig;
use crate::entities::{LotteryStatus, lottery_entity as lotteries};
use crate::error::{AppError, AppResult};
use crate::services::{
    DrawService, LedgerService, LotteryService, MessageTransport, NotificationService,
    PurchaseService, RandomSource,
};
use async_trait::async_trait;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Set,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One connection: every connection to `sqlite::memory:` is its own database.
pub(crate) async fn setup_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    opts.max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// On-disk WAL database behind a real pool, so concurrent tasks hold
/// separate connections and contend for the write lock.
pub(crate) struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub(crate) async fn open(max_connections: u32) -> (Self, DatabaseConnection) {
        let path = std::env::temp_dir().join(format!("lottery-test-{}.db", uuid::Uuid::new_v4()));
        let mut opts = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
        opts.max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        db.execute_unprepared("PRAGMA journal_mode=WAL").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        (Self { path }, db)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub(crate) async fn create_lottery(db: &DatabaseConnection, max_tickets: i32) -> lotteries::Model {
    lotteries::ActiveModel {
        name: Set(format!("Test lottery ({max_tickets})")),
        ticket_price: Set(10),
        max_tickets: Set(max_tickets),
        tickets_sold: Set(0),
        status: Set(LotteryStatus::Open),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Records delivered messages; fails or never answers for chosen recipients.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<(i64, String)>>,
    failing: HashSet<i64>,
    hanging: HashSet<i64>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_for(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            failing: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub(crate) fn hanging_for(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            hanging: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub(crate) async fn recipients(&self) -> Vec<i64> {
        self.sent.lock().await.iter().map(|(id, _)| *id).collect()
    }

    /// Announcements run detached; poll until `n` messages arrived or `limit` passed.
    pub(crate) async fn wait_for(&self, n: usize, limit: Duration) -> Vec<i64> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let recipients = self.recipients().await;
            if recipients.len() >= n || tokio::time::Instant::now() >= deadline {
                return recipients;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<()> {
        if self.hanging.contains(&chat_id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&chat_id) {
            return Err(AppError::ExternalApiError(format!(
                "chat {chat_id} unreachable"
            )));
        }
        self.sent.lock().await.push((chat_id, text.to_string()));
        Ok(())
    }
}

/// Fully wired services over one test database
pub(crate) struct Harness {
    pub db: DatabaseConnection,
    pub ledger: LedgerService,
    pub draw: DrawService,
    pub lotteries: LotteryService,
    pub purchases: PurchaseService,
    pub transport: Arc<RecordingTransport>,
    _store: Option<FileStore>,
}

impl Harness {
    pub(crate) async fn new(seed: u64) -> Self {
        Self::build(seed, setup_db().await, None, RecordingTransport::new())
    }

    /// Services over a multi-connection WAL store
    pub(crate) async fn multi_connection(seed: u64) -> Self {
        let (store, db) = FileStore::open(8).await;
        Self::build(seed, db, Some(store), RecordingTransport::new())
    }

    pub(crate) async fn with_failing_recipients(
        seed: u64,
        ids: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self::build(
            seed,
            setup_db().await,
            None,
            RecordingTransport::failing_for(ids),
        )
    }

    fn build(
        seed: u64,
        db: DatabaseConnection,
        store: Option<FileStore>,
        transport: RecordingTransport,
    ) -> Self {
        let transport = Arc::new(transport);
        let notifier = NotificationService::new(
            Some(transport.clone() as Arc<dyn MessageTransport>),
            None,
            Duration::from_secs(1),
        );

        let ledger = LedgerService::new(db.clone());
        let draw = DrawService::new(
            db.clone(),
            ledger.clone(),
            RandomSource::fallback_only(Some(seed)),
            notifier,
        );
        let lotteries = LotteryService::new(
            db.clone(),
            ledger.clone(),
            draw.clone(),
            LotteryDefaultsConfig::default(),
        );
        let purchases = PurchaseService::new(ledger.clone(), draw.clone(), lotteries.clone());

        Self {
            db,
            ledger,
            draw,
            lotteries,
            purchases,
            transport,
            _store: store,
        }
    }
}
