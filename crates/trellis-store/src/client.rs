//! Store connection handling.

use crate::error::StoreError;
use neo4rs::{query, ConfigBuilder, DetachedRowStream, Graph, Query, Txn};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Connection parameters for the graph store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Named database/catalog; the server default when unset.
    pub database: Option<String>,
}

impl StoreConfig {
    pub fn new(
        uri: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            user: user.into(),
            password: password.into(),
            database: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

/// Handle to the persistent graph store.
///
/// All pipeline writes go through this wrapper; it keeps exactly one store
/// call in flight at a time from a given run (callers await each operation
/// before issuing the next).
pub struct GraphStore {
    graph: Graph,
    dynamic_labels: OnceCell<bool>,
}

impl GraphStore {
    /// Connects with the given credentials.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str());
        if let Some(database) = &config.database {
            builder = builder.db(database.as_str());
        }

        let graph = Graph::connect(builder.build()?).await?;
        debug!(uri = %config.uri, "connected to graph store");

        Ok(Self {
            graph,
            dynamic_labels: OnceCell::new(),
        })
    }

    /// Runs a statement, discarding any results.
    pub async fn run(&self, q: Query) -> Result<(), StoreError> {
        self.graph.run(q).await.map_err(Into::into)
    }

    /// Runs a statement and returns its row stream.
    pub async fn execute(&self, q: Query) -> Result<DetachedRowStream, StoreError> {
        self.graph.execute(q).await.map_err(Into::into)
    }

    /// Runs a statement expected to return a single integer column.
    pub async fn fetch_count(&self, q: Query, column: &str) -> Result<i64, StoreError> {
        let mut stream = self.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(row.get::<i64>(column)?),
            None => Ok(0),
        }
    }

    /// Opens an explicit transaction.
    pub async fn start_txn(&self) -> Result<Txn, StoreError> {
        self.graph.start_txn().await.map_err(Into::into)
    }

    /// Whether the store supports dynamic label mutation (APOC).
    ///
    /// Probed once per connection; without the extension, label sync on
    /// existing nodes is skipped rather than failing the import.
    pub async fn supports_dynamic_labels(&self) -> bool {
        *self
            .dynamic_labels
            .get_or_init(|| async {
                match self.graph.execute(query("RETURN apoc.version() AS version")).await {
                    Ok(_) => true,
                    Err(err) => {
                        warn!(error = %err, "dynamic label extension unavailable, label sync will be skipped");
                        false
                    }
                }
            })
            .await
    }
}
