use std::path::{Path, PathBuf};

use crate::{catalog::Schema, error::{PlanError, PlanResult}};

pub const DEFAULT_PROMPT: &str = "sqlplan> ";
pub const DEFAULT_LOG_FILTER: &str = "sqlplan=info";

/// Settings of the line-mode planner shell.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// JSON schema file; an empty catalog is used when unset.
    pub schema_path: Option<PathBuf>,
    pub prompt: String,
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_path: None,
            prompt: DEFAULT_PROMPT.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(schema_path: Option<&Path>, prompt: &str, log_filter: &str) -> Self {
        Self {
            schema_path: schema_path.map(Path::to_path_buf),
            prompt: prompt.to_string(),
            log_filter: log_filter.to_string(),
        }
    }

    pub fn with_schema(schema_path: impl AsRef<Path>) -> Self {
        Self {
            schema_path: Some(schema_path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub async fn load_schema(&self) -> PlanResult<Schema> {
        let Some(path) = &self.schema_path else {
            return Ok(Schema::new());
        };
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PlanError::Schema(format!("failed to read {}: {e}", path.display())))?;
        Schema::from_json(&content)
    }
}
