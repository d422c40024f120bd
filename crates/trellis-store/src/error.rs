use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("graph database error: {0}")]
    Database(#[from] neo4rs::Error),

    #[error("row decoding error: {0}")]
    Decode(#[from] neo4rs::DeError),

    #[error("schema verification failed: {0}")]
    SchemaVerification(String),

    #[error("migration from schema version {version} failed (rolled back): {source}")]
    Migration {
        version: i64,
        #[source]
        source: Box<StoreError>,
    },

    #[error("backup i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
