//! `dockerpty start <container>` — attach to a created container and start it.
//!
//! Resolves the container to its full ID so lifecycle events can be matched,
//! then hands the terminal to the session until the container exits.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use dockerpty::{start_container_session, SessionOptions};
use dockerpty_engine::{ContainerInfo, DockerEngine};

pub async fn run(engine: DockerEngine, container: &str, mut options: SessionOptions) -> Result<()> {
    let info = engine
        .inspect_container(container)
        .await
        .with_context(|| format!("failed to inspect container '{container}'"))?;
    if !info.tty {
        warn!(container, "container has no tty; output will be demultiplexed");
    }
    apply_container_config(&info, &mut options);

    info!(id = %info.id, "starting container session");
    start_container_session(Arc::new(engine), info.id, options).await?;
    info!("container session ended");
    Ok(())
}

/// Match the attachment to how the container was created.
fn apply_container_config(info: &ContainerInfo, options: &mut SessionOptions) {
    options.attach.raw = info.tty;
    // The engine drops input for containers created without an open stdin.
    options.attach.stdin = info.open_stdin;
}
