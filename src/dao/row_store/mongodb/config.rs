use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;

use super::error::{MongoDaoError, MongoResult};

/// Default database name when `MONGO_DB` is not provided.
const DEFAULT_DATABASE: &str = "typerush";

/// The coordinator regularly comes up before its database container does, so
/// the first pings of a fresh connection are expected to fail and are retried
/// with backoff before the attempt counts as lost.
const MAX_PING_ATTEMPTS: u32 = 8;
const FIRST_PING_DELAY: Duration = Duration::from_millis(200);
const MAX_PING_DELAY: Duration = Duration::from_secs(4);

/// Parsed connection options plus the database the row collections live in.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }

    /// Build a client from these options and wait until the database answers
    /// a ping, retrying with capped exponential backoff.
    pub async fn open(&self) -> MongoResult<(Client, Database)> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut attempts = 0;
        let mut delay = FIRST_PING_DELAY;
        loop {
            attempts += 1;
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok((client, database)),
                Err(source) => {
                    if attempts >= MAX_PING_ATTEMPTS {
                        return Err(MongoDaoError::InitialPing { attempts, source });
                    }
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_PING_DELAY);
                }
            }
        }
    }
}
