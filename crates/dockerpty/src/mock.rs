//! Test doubles for the runtime and terminal collaborators.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, Notify};

use dockerpty_core::{
    AttachOptions, BoxFuture, Dimension, EventStream, ProcessRef, PtyError, PtyResult,
    RemoteStream, RuntimeClient, RuntimeEvent, StartOptions, TerminalDevice,
};

/// A recorded runtime RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Subscribe,
    Attach(ProcessRef),
    Start(ProcessRef),
    Resize(ProcessRef, Dimension),
}

/// A scripted runtime. Attachments are backed by in-memory duplex pipes
/// whose far end the test picks up with [`MockRuntime::remote`].
pub struct MockRuntime {
    calls: Mutex<Vec<Call>>,
    start_error: Mutex<Option<PtyError>>,
    attach_error: Mutex<Option<PtyError>>,
    subscribe_error: Mutex<Option<PtyError>>,
    resize_error: AtomicBool,
    broken_stream: AtomicBool,
    remote: Mutex<Option<DuplexStream>>,
    attached: Notify,
    resized: Notify,
    events_tx: mpsc::UnboundedSender<PtyResult<RuntimeEvent>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<PtyResult<RuntimeEvent>>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            calls: Mutex::new(Vec::new()),
            start_error: Mutex::new(None),
            attach_error: Mutex::new(None),
            subscribe_error: Mutex::new(None),
            resize_error: AtomicBool::new(false),
            broken_stream: AtomicBool::new(false),
            remote: Mutex::new(None),
            attached: Notify::new(),
            resized: Notify::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn with_start_error(self, err: PtyError) -> Self {
        *self.start_error.lock().unwrap() = Some(err);
        self
    }

    pub fn with_attach_error(self, err: PtyError) -> Self {
        *self.attach_error.lock().unwrap() = Some(err);
        self
    }

    pub fn with_subscribe_error(self, err: PtyError) -> Self {
        *self.subscribe_error.lock().unwrap() = Some(err);
        self
    }

    pub fn with_failing_resize(self) -> Self {
        self.resize_error.store(true, Ordering::SeqCst);
        self
    }

    /// Attachments succeed but every read from them fails.
    pub fn with_broken_stream(self) -> Self {
        self.broken_stream.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn resizes(&self) -> Vec<Dimension> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Resize(_, size) => Some(size),
                _ => None,
            })
            .collect()
    }

    pub fn send_event(&self, event: RuntimeEvent) {
        let _ = self.events_tx.send(Ok(event));
    }

    /// Wait for the session to attach and take the remote end of the pipe.
    pub async fn remote(&self) -> DuplexStream {
        loop {
            if let Some(remote) = self.remote.lock().unwrap().take() {
                return remote;
            }
            self.attached.notified().await;
        }
    }

    /// Wait until at least `n` resize calls have been recorded.
    pub async fn wait_for_resizes(&self, n: usize) {
        while self.resizes().len() < n {
            self.resized.notified().await;
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RuntimeClient for MockRuntime {
    fn start<'a>(
        &'a self,
        target: &'a ProcessRef,
        _options: &'a StartOptions,
    ) -> BoxFuture<'a, PtyResult<()>> {
        Box::pin(async move {
            self.record(Call::Start(target.clone()));
            match self.start_error.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn attach<'a>(
        &'a self,
        target: &'a ProcessRef,
        _options: AttachOptions,
    ) -> BoxFuture<'a, PtyResult<RemoteStream>> {
        Box::pin(async move {
            self.record(Call::Attach(target.clone()));
            if let Some(err) = self.attach_error.lock().unwrap().take() {
                return Err(err);
            }
            if self.broken_stream.load(Ordering::SeqCst) {
                return Ok(Box::new(BrokenStream) as RemoteStream);
            }
            let (local, remote) = tokio::io::duplex(4096);
            *self.remote.lock().unwrap() = Some(remote);
            self.attached.notify_one();
            Ok(Box::new(local) as RemoteStream)
        })
    }

    fn resize<'a>(
        &'a self,
        target: &'a ProcessRef,
        size: Dimension,
    ) -> BoxFuture<'a, PtyResult<()>> {
        Box::pin(async move {
            self.record(Call::Resize(target.clone(), size));
            self.resized.notify_one();
            if self.resize_error.load(Ordering::SeqCst) {
                return Err(PtyError::Api {
                    status: 409,
                    message: "container is not running".into(),
                });
            }
            Ok(())
        })
    }

    fn subscribe_events(&self) -> BoxFuture<'_, PtyResult<EventStream>> {
        Box::pin(async move {
            self.record(Call::Subscribe);
            if let Some(err) = self.subscribe_error.lock().unwrap().take() {
                return Err(err);
            }
            let rx = self
                .events_rx
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| PtyError::EventSubscription("already subscribed".into()))?;
            let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(Box::pin(stream) as EventStream)
        })
    }
}

/// A remote stream whose reads always fail.
struct BrokenStream;

impl AsyncRead for BrokenStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

impl AsyncWrite for BrokenStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A terminal with a settable size that counts mode switches.
pub struct MockTerminal {
    tty: bool,
    fail_enter: bool,
    fail_restore: bool,
    size: Mutex<Option<Dimension>>,
    enters: AtomicUsize,
    restores: AtomicUsize,
}

impl MockTerminal {
    pub fn new(size: Dimension) -> Self {
        Self {
            tty: true,
            fail_enter: false,
            fail_restore: false,
            size: Mutex::new(Some(size)),
            enters: AtomicUsize::new(0),
            restores: AtomicUsize::new(0),
        }
    }

    pub fn not_a_tty(mut self) -> Self {
        self.tty = false;
        self
    }

    pub fn failing_enter(mut self) -> Self {
        self.fail_enter = true;
        self
    }

    pub fn failing_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }

    pub fn set_size(&self, size: Dimension) {
        *self.size.lock().unwrap() = Some(size);
    }

    /// Make subsequent size queries fail.
    pub fn break_size(&self) {
        *self.size.lock().unwrap() = None;
    }

    pub fn enter_count(&self) -> usize {
        self.enters.load(Ordering::SeqCst)
    }

    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl TerminalDevice for MockTerminal {
    fn is_terminal(&self) -> bool {
        self.tty
    }

    fn enter_raw(&self) -> PtyResult<()> {
        if self.fail_enter {
            return Err(PtyError::ModeSwitch("tcsetattr: input/output error".into()));
        }
        self.enters.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn restore(&self) -> PtyResult<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        if self.fail_restore {
            return Err(PtyError::ModeSwitch("tcsetattr: input/output error".into()));
        }
        Ok(())
    }

    fn size(&self) -> PtyResult<Dimension> {
        match *self.size.lock().unwrap() {
            Some(size) => Ok(size),
            None => Err(PtyError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "ioctl TIOCGWINSZ failed",
            ))),
        }
    }
}
