//! Docker Engine API client.
//!
//! Every request opens its own HTTP/1.1 connection to the engine. Attach
//! and exec-start requests ask for a `tcp` upgrade; once the engine answers
//! `101` the upgraded connection carries the process's raw streams.

use std::collections::VecDeque;

use futures_util::stream;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::client::conn::http1;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::form_urlencoded;

use dockerpty_core::{
    AttachOptions, BoxFuture, Dimension, EventStream, ProcessRef, PtyError, PtyResult, RemoteIo,
    RemoteStream, RuntimeClient, RuntimeEvent, StartOptions,
};

use crate::config::{EngineConfig, Endpoint};
use crate::events::EventDecoder;

/// The bits of `GET /containers/{id}/json` the CLI cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Full container ID. Lifecycle events are keyed by it.
    pub id: String,
    /// Whether the container was created with a tty.
    pub tty: bool,
    /// Whether stdin is kept open.
    pub open_stdin: bool,
}

#[derive(Deserialize)]
struct InspectResponse {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Config", default)]
    config: InspectConfig,
}

#[derive(Default, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Tty", default)]
    tty: bool,
    #[serde(rename = "OpenStdin", default)]
    open_stdin: bool,
}

#[derive(Deserialize)]
struct IdResponse {
    #[serde(rename = "Id")]
    id: String,
}

/// Client for a single Docker Engine endpoint.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    endpoint: Endpoint,
    api_version: Option<String>,
}

impl DockerEngine {
    pub fn new(config: &EngineConfig) -> PtyResult<Self> {
        let endpoint = Endpoint::parse(&config.host)?;
        debug!(host = %config.host, api_version = ?config.api_version, "engine client configured");
        Ok(Self {
            endpoint,
            api_version: config.api_version.clone(),
        })
    }

    /// Resolve a container name or ID prefix to its full ID and tty flag.
    pub async fn inspect_container(&self, name: &str) -> PtyResult<ContainerInfo> {
        let uri = self.uri(&format!("/containers/{name}/json"), None);
        let body = self.call(Method::GET, &uri, None).await?;
        let inspect: InspectResponse = serde_json::from_slice(&body)?;
        Ok(ContainerInfo {
            id: inspect.id,
            tty: inspect.config.tty,
            open_stdin: inspect.config.open_stdin,
        })
    }

    /// Create an exec instance running `cmd` inside `container`.
    pub async fn create_exec(&self, container: &str, cmd: &[String], tty: bool) -> PtyResult<String> {
        if cmd.is_empty() {
            return Err(PtyError::Config("exec needs a command".into()));
        }
        let uri = self.uri(&format!("/containers/{container}/exec"), None);
        let body = json!({
            "AttachStdin": true,
            "AttachStdout": true,
            "AttachStderr": true,
            "Tty": tty,
            "Cmd": cmd,
        });
        let resp = self.call(Method::POST, &uri, Some(body)).await?;
        let created: IdResponse = serde_json::from_slice(&resp)?;
        debug!(container, exec = %created.id, "exec instance created");
        Ok(created.id)
    }

    /// Build a request path, prefixed with the pinned API version if any.
    fn uri(&self, path: &str, query: Option<String>) -> String {
        let mut uri = match &self.api_version {
            Some(v) => format!("/v{}{path}", v.trim_start_matches('v')),
            None => path.to_string(),
        };
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            uri.push('?');
            uri.push_str(&q);
        }
        uri
    }

    async fn connect(&self) -> PtyResult<Box<dyn RemoteIo>> {
        match &self.endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await.map_err(|e| {
                    PtyError::Transport(format!("connect {}: {e}", path.display()))
                })?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(PtyError::Config(format!(
                "unix sockets are not supported on this platform: {}",
                path.display()
            ))),
            Endpoint::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr)
                    .await
                    .map_err(|e| PtyError::Transport(format!("connect {addr}: {e}")))?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
        }
    }

    /// Send one request on a fresh connection and return the response head.
    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        upgrade: bool,
    ) -> PtyResult<Response<Incoming>> {
        let io = self.connect().await?;
        let (mut sender, conn) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(io))
            .await
            .map_err(|e| PtyError::Transport(format!("handshake: {e}")))?;
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                debug!("engine connection closed: {e}");
            }
        });

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(header::HOST, "docker");
        if upgrade {
            builder = builder
                .header(header::CONNECTION, "Upgrade")
                .header(header::UPGRADE, "tcp");
        }
        let payload = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Bytes::from(serde_json::to_vec(&value)?)
            }
            None => Bytes::new(),
        };
        let request = builder
            .body(Full::new(payload))
            .map_err(|e| PtyError::Transport(format!("invalid request {uri}: {e}")))?;

        trace!(%method, uri, "engine request");
        let resp = sender
            .send_request(request)
            .await
            .map_err(|e| PtyError::Transport(format!("{method} {uri}: {e}")))?;
        trace!(%method, uri, status = resp.status().as_u16(), "engine response");
        Ok(resp)
    }

    /// Send a plain request and return the body of a successful response.
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> PtyResult<Bytes> {
        let resp = self.send(method, uri, body, false).await?;
        let status = resp.status();
        let bytes = read_body(resp).await?;
        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }
        Ok(bytes)
    }

    /// Send an upgrade request and hand back the hijacked connection.
    async fn hijack(&self, uri: &str, body: Option<Value>) -> PtyResult<RemoteStream> {
        let mut resp = self.send(Method::POST, uri, body, true).await?;
        let status = resp.status();
        if status != StatusCode::SWITCHING_PROTOCOLS {
            let bytes = read_body(resp).await?;
            return Err(api_error(status, &bytes));
        }
        let upgraded = hyper::upgrade::on(&mut resp)
            .await
            .map_err(|e| PtyError::Transport(format!("upgrade {uri}: {e}")))?;
        Ok(Box::new(TokioIo::new(upgraded)))
    }

    async fn start_container(&self, id: &str, options: &StartOptions) -> PtyResult<()> {
        let query = options
            .detach_keys
            .as_deref()
            .map(|keys| encode_query(&[("detachKeys", keys)]));
        let uri = self.uri(&format!("/containers/{id}/start"), query);
        let resp = self.send(Method::POST, &uri, None, false).await?;
        let status = resp.status();
        let bytes = read_body(resp).await?;
        match status {
            StatusCode::NOT_MODIFIED => {
                debug!(id, "container already running");
                Ok(())
            }
            s if s.is_success() => Ok(()),
            s => Err(api_error(s, &bytes)),
        }
    }

    async fn subscribe(&self) -> PtyResult<EventStream> {
        let filters = json!({ "type": ["container"] }).to_string();
        let uri = self.uri("/events", Some(encode_query(&[("filters", filters.as_str())])));
        let resp = self.send(Method::GET, &uri, None, false).await?;
        let status = resp.status();
        if !status.is_success() {
            let bytes = read_body(resp).await?;
            return Err(api_error(status, &bytes));
        }

        let feed = EventFeed {
            body: resp.into_body(),
            decoder: EventDecoder::new(),
            queue: VecDeque::new(),
            done: false,
        };
        let events: EventStream = Box::pin(stream::unfold(feed, EventFeed::next));
        Ok(events)
    }
}

impl RuntimeClient for DockerEngine {
    fn start<'a>(
        &'a self,
        target: &'a ProcessRef,
        options: &'a StartOptions,
    ) -> BoxFuture<'a, PtyResult<()>> {
        Box::pin(async move {
            match target {
                ProcessRef::Container(id) => self.start_container(id, options).await,
                ProcessRef::Exec(id) => Err(PtyError::RemoteStart(format!(
                    "exec {id} is started by attaching to it"
                ))),
            }
        })
    }

    fn attach<'a>(
        &'a self,
        target: &'a ProcessRef,
        options: AttachOptions,
    ) -> BoxFuture<'a, PtyResult<RemoteStream>> {
        Box::pin(async move {
            match target {
                ProcessRef::Container(id) => {
                    let query = encode_query(&[
                        ("stream", "1"),
                        ("stdin", flag(options.stdin)),
                        ("stdout", flag(options.stdout)),
                        ("stderr", flag(options.stderr)),
                    ]);
                    let uri = self.uri(&format!("/containers/{id}/attach"), Some(query));
                    self.hijack(&uri, None).await
                }
                ProcessRef::Exec(id) => {
                    let uri = self.uri(&format!("/exec/{id}/start"), None);
                    let body = json!({ "Detach": false, "Tty": options.raw });
                    self.hijack(&uri, Some(body)).await
                }
            }
        })
    }

    fn resize<'a>(
        &'a self,
        target: &'a ProcessRef,
        size: Dimension,
    ) -> BoxFuture<'a, PtyResult<()>> {
        Box::pin(async move {
            let path = match target {
                ProcessRef::Container(id) => format!("/containers/{id}/resize"),
                ProcessRef::Exec(id) => format!("/exec/{id}/resize"),
            };
            let (h, w) = (size.rows.to_string(), size.cols.to_string());
            let uri = self.uri(&path, Some(encode_query(&[("h", h.as_str()), ("w", w.as_str())])));
            self.call(Method::POST, &uri, None).await.map(|_| ())
        })
    }

    fn subscribe_events(&self) -> BoxFuture<'_, PtyResult<EventStream>> {
        Box::pin(self.subscribe())
    }
}

/// Unfold state turning a chunked `/events` body into decoded events.
struct EventFeed {
    body: Incoming,
    decoder: EventDecoder,
    queue: VecDeque<RuntimeEvent>,
    done: bool,
}

impl EventFeed {
    async fn next(mut self) -> Option<(PtyResult<RuntimeEvent>, Self)> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some((Ok(event), self));
            }
            if self.done {
                return None;
            }
            match self.body.frame().await {
                Some(Ok(frame)) => {
                    let Ok(data) = frame.into_data() else {
                        continue;
                    };
                    match self.decoder.push(&data) {
                        Ok(events) => self.queue.extend(events),
                        Err(e) => {
                            self.done = true;
                            return Some((Err(e), self));
                        }
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some((Err(PtyError::Transport(format!("event stream: {e}"))), self));
                }
                None => return None,
            }
        }
    }
}

async fn read_body(resp: Response<Incoming>) -> PtyResult<Bytes> {
    let collected = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| PtyError::Transport(format!("reading response: {e}")))?;
    Ok(collected.to_bytes())
}

/// Map an unsuccessful response to [`PtyError::Api`], preferring the
/// engine's `{"message": ...}` body.
fn api_error(status: StatusCode, body: &[u8]) -> PtyError {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let message = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(b) => b.message,
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text
            }
        }
    };
    PtyError::Api {
        status: status.as_u16(),
        message,
    }
}

fn encode_query(pairs: &[(&str, &str)]) -> String {
    let mut ser = form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        ser.append_pair(k, v);
    }
    ser.finish()
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}
