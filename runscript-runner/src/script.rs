//! Script resolution

use std::io::ErrorKind;
use tracing::debug;

use crate::config::Config;
use crate::error::{RunError, RunResult};

/// Reads the script called `name` from the configured scripts directory
pub async fn read_script(config: &Config, name: &str) -> RunResult<String> {
    let path = config.script_path(name);
    debug!("Reading script from {}", path.display());

    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Ok(body),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(RunError::ScriptNotFound(path)),
        Err(source) => Err(RunError::ScriptUnreadable { path, source }),
    }
}
