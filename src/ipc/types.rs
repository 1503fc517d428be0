use std::path::{Path, PathBuf};

use crate::auth::Session;
use crate::config::Config;
use crate::db;
use crate::error::{AppError, AppResult};
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything a request may touch. The session lives here and nowhere else:
/// set by `auth.signIn`, cleared by `auth.signOut` or a workspace switch.
pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            session: None,
        }
    }

    /// Opens (or creates) the workspace database. Any session from a
    /// previous workspace is dropped.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        self.session = None;
        Ok(())
    }

    pub fn conn(&self) -> AppResult<&Connection> {
        self.db.as_ref().ok_or(AppError::NoWorkspace)
    }

    pub fn export_dir(&self) -> AppResult<PathBuf> {
        if let Some(dir) = &self.config.export_dir {
            return Ok(dir.clone());
        }
        self.workspace
            .as_ref()
            .map(|w| w.join("exports"))
            .ok_or(AppError::NoWorkspace)
    }
}
