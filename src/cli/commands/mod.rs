use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use delivery_lifecycle::{
    Actor, IdentityResolver, LifecycleConfig, PersistenceStore, SnapshotFile, StaticIdentity,
    SystemClock, TransitionExecutor,
};

use super::GlobalArgs;

pub mod actions;
pub mod assign;
pub mod create;
pub mod graph;
pub mod history;
pub mod transition;

pub type CliExecutor = TransitionExecutor<dyn PersistenceStore, SystemClock>;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, ctx: &CommandContext) -> Result<()>;
}

/// Where the CLI keeps deliveries and ledgers
#[derive(Debug)]
pub enum Backend {
    Snapshot(SnapshotFile),
    #[cfg(feature = "database")]
    Database(String),
}

impl Backend {
    /// An explicit `--store` wins, then `store.database_url`, then `store.snapshot_path`
    fn select(global: &GlobalArgs, config: &LifecycleConfig) -> Self {
        if let Some(path) = &global.store {
            return Backend::Snapshot(SnapshotFile::new(path.clone()));
        }
        match &config.store.database_url {
            #[cfg(feature = "database")]
            Some(url) => return Backend::Database(url.clone()),
            #[cfg(not(feature = "database"))]
            Some(url) => tracing::warn!(
                database_url = %url,
                "store.database_url ignored: built without the database feature"
            ),
            None => {}
        }
        let path: PathBuf = config.store.snapshot_path.clone();
        Backend::Snapshot(SnapshotFile::new(path))
    }
}

/// Store backend, identity and output settings shared by all commands
pub struct CommandContext {
    pub backend: Backend,
    pub identity: StaticIdentity,
    pub history_page_size: usize,
    pub json: bool,
}

impl CommandContext {
    pub fn new(global: &GlobalArgs, config: &LifecycleConfig) -> Self {
        let identity = match &global.actor {
            Some(id) => StaticIdentity::new(Actor::new(id.clone(), global.role)),
            None => StaticIdentity::anonymous(),
        };
        Self {
            backend: Backend::select(global, config),
            identity,
            history_page_size: config.ledger.history_page_size,
            json: global.json,
        }
    }

    pub fn actor(&self) -> Result<Actor> {
        Ok(self.identity.resolve()?)
    }

    fn executor(&self, store: Arc<dyn PersistenceStore>) -> CliExecutor {
        TransitionExecutor::new(store, SystemClock).with_history_page_size(self.history_page_size)
    }

    /// Run `f` with write access. A snapshot is saved only if `f` succeeds;
    /// the database commits each write on its own.
    pub async fn with_executor<F, Fut, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(CliExecutor) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        match &self.backend {
            Backend::Snapshot(snapshot) => {
                snapshot
                    .update(|store| async move { f(self.executor(store)).await })
                    .await
            }
            #[cfg(feature = "database")]
            Backend::Database(url) => self.with_database(url, f).await,
        }
    }

    /// Read-only access to the store
    pub async fn with_reader<F, Fut, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(CliExecutor) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        match &self.backend {
            Backend::Snapshot(snapshot) => {
                snapshot
                    .inspect(|store| async move { f(self.executor(store)).await })
                    .await
            }
            #[cfg(feature = "database")]
            Backend::Database(url) => self.with_database(url, f).await,
        }
    }

    #[cfg(feature = "database")]
    async fn with_database<F, Fut, R>(&self, url: &str, f: F) -> Result<R>
    where
        F: FnOnce(CliExecutor) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let store = Arc::new(delivery_lifecycle::SqliteStore::connect(url).await?);
        let result = f(self.executor(store.clone())).await;
        store.shutdown().await;
        result
    }

    /// JSON to stdout when `--json` was given, otherwise the text rendering
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}
