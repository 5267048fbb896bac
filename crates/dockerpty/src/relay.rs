//! Stream relay between the local standard streams and a remote process.
//!
//! The relay opens the attachment, then pumps local stdin to the remote
//! input while copying remote output to local stdout (and stderr, for
//! non-tty processes whose output is multiplexed). It returns when the
//! remote side closes the stream or an I/O error occurs.

use std::sync::Arc;

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::{debug, info};

use dockerpty_core::{AttachOptions, ProcessRef, PtyError, PtyResult, RuntimeClient};

/// The local end of a session.
pub struct LocalStreams {
    pub stdin: Box<dyn AsyncRead + Send + Unpin>,
    pub stdout: Box<dyn AsyncWrite + Send + Unpin>,
    pub stderr: Box<dyn AsyncWrite + Send + Unpin>,
}

impl LocalStreams {
    pub fn new(
        stdin: impl AsyncRead + Send + Unpin + 'static,
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// The process's own standard streams.
    pub fn std() -> Self {
        Self::new(io::stdin(), io::stdout(), io::stderr())
    }
}

/// Relays bytes for one attachment.
pub struct StreamRelay {
    client: Arc<dyn RuntimeClient>,
    target: ProcessRef,
    options: AttachOptions,
}

impl StreamRelay {
    pub fn new(client: Arc<dyn RuntimeClient>, target: ProcessRef, options: AttachOptions) -> Self {
        Self {
            client,
            target,
            options,
        }
    }

    /// Attach and pump until the stream ends.
    ///
    /// `ready` is signalled as soon as the attachment is established; if the
    /// attach call fails it is dropped unsignalled and the client's error is
    /// returned as is. Once attached, only the output side decides the
    /// result.
    pub async fn run(self, local: LocalStreams, ready: Option<oneshot::Sender<()>>) -> PtyResult<()> {
        let remote = self.client.attach(&self.target, self.options).await?;
        debug!(id = %self.target, raw = self.options.raw, "attached");
        if let Some(ready) = ready {
            let _ = ready.send(());
        }

        let LocalStreams {
            mut stdin,
            mut stdout,
            mut stderr,
        } = local;
        let (mut remote_rd, mut remote_wr) = io::split(remote);

        let forward_input = self.options.stdin;
        let input = async {
            if forward_input {
                let n = io::copy(&mut stdin, &mut remote_wr).await?;
                debug!(bytes = n, "local input closed");
            }
            remote_wr.shutdown().await
        };

        let raw = self.options.raw;
        let output = async {
            if raw {
                let n = io::copy(&mut remote_rd, &mut stdout).await?;
                debug!(bytes = n, "remote output closed");
                Ok(())
            } else {
                demux(&mut remote_rd, &mut stdout, &mut stderr).await
            }
        };

        tokio::pin!(input);
        tokio::pin!(output);
        let mut input_done = false;
        let result = loop {
            tokio::select! {
                res = &mut input, if !input_done => {
                    input_done = true;
                    // Output decides the result; a write racing the remote close fails with EPIPE.
                    if let Err(e) = res {
                        debug!(id = %self.target, "local input stopped: {e}");
                    }
                }
                res = &mut output => break res,
            }
        };

        match result {
            Ok(()) => {
                info!(id = %self.target, "stream closed");
                Ok(())
            }
            Err(e) => Err(PtyError::Stream(format!("{}: {e}", self.target))),
        }
    }
}

/// Stream type byte in a multiplexed frame header.
const STREAM_STDIN: u8 = 0;
const STREAM_STDOUT: u8 = 1;
const STREAM_STDERR: u8 = 2;

/// Length of a multiplexed frame header: `[type, 0, 0, 0, len BE u32]`.
const HEADER_LEN: usize = 8;

/// Split a multiplexed non-tty stream into stdout and stderr.
///
/// Returns `Ok(())` on EOF at a frame boundary; EOF inside a frame is an
/// `UnexpectedEof` error.
pub async fn demux<R, O, E>(reader: &mut R, stdout: &mut O, stderr: &mut E) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    loop {
        if !read_header(reader, &mut header).await? {
            return Ok(());
        }
        let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as u64;
        let mut frame = (&mut *reader).take(len);
        let copied = match header[0] {
            STREAM_STDIN | STREAM_STDOUT => {
                let n = io::copy(&mut frame, stdout).await?;
                stdout.flush().await?;
                n
            }
            STREAM_STDERR => {
                let n = io::copy(&mut frame, stderr).await?;
                stderr.flush().await?;
                n
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown stream type {other} in multiplexed frame"),
                ))
            }
        };
        if copied < len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }
}

/// Fill `header`, returning `false` on a clean EOF before its first byte.
async fn read_header<R: AsyncRead + Unpin>(reader: &mut R, header: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        filled += n;
    }
    Ok(true)
}
