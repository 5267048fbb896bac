//! `dockerpty exec <container> <cmd>...` — run a command inside a running
//! container with the local terminal attached.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use dockerpty::{start_exec_session, SessionOptions};
use dockerpty_engine::DockerEngine;

pub async fn run(
    engine: DockerEngine,
    container: &str,
    command: &[String],
    tty: bool,
    mut options: SessionOptions,
) -> Result<()> {
    let exec_id = engine
        .create_exec(container, command, tty)
        .await
        .with_context(|| format!("failed to create exec in '{container}'"))?;
    options.attach.raw = tty;

    info!(container, exec = %exec_id, command = ?command, "starting exec session");
    start_exec_session(Arc::new(engine), exec_id, options).await?;
    info!("exec session ended");
    Ok(())
}
