//! Shared application state handed to every request handler.
//!
//! Holds configuration only; each request opens its own SQLite connection
//! through `open_db`, so there is no pooled or locked resource here.

use std::path::Path;

use rusqlite::Connection;

use crate::config::Config;
use crate::crypto::PasswordHasher;
use crate::db::{self, DatabaseError};
use crate::media::MediaStore;

#[derive(Debug, Clone)]
pub struct CoreState {
    config: Config,
    hasher: PasswordHasher,
    media: MediaStore,
}

impl CoreState {
    pub fn new(config: Config) -> Self {
        let hasher = PasswordHasher::new(config.password_iterations);
        let media = MediaStore::new(config.media_dir.clone(), config.max_image_bytes);
        Self {
            config,
            hasher,
            media,
        }
    }

    /// Create the data directories and bring the schema up to date.
    pub fn prepare(&self) -> Result<(), DatabaseError> {
        for dir in [self.config.db_path.parent(), Some(self.config.media_dir.as_path())]
            .into_iter()
            .flatten()
            .filter(|d| !d.as_os_str().is_empty())
        {
            std::fs::create_dir_all(dir).map_err(|e| DatabaseError::MigrationFailed {
                version: 0,
                reason: format!("cannot create {}: {e}", dir.display()),
            })?;
        }
        let conn = self.open_db()?;
        tracing::info!(
            db = %self.config.db_path.display(),
            version = db::get_current_version(&conn),
            "Database ready"
        );
        Ok(())
    }

    /// Open a connection for the current request.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        db::open_database(&self.config.db_path)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub fn media_root(&self) -> &Path {
        self.media.root()
    }
}
