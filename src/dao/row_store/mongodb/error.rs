use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write player `{id}`")]
    WritePlayer {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load player `{id}`")]
    LoadPlayer {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to write race `{id}`")]
    WriteRace {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load race `{id}`")]
    LoadRace {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to query open public races")]
    QueryOpenRaces {
        #[source]
        source: MongoError,
    },
    #[error("failed to write text `{id}`")]
    WriteText {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to read texts collection")]
    ReadTexts {
        #[source]
        source: MongoError,
    },
    #[error("failed to sweep collection `{collection}`")]
    Sweep {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
}
