//! Docker Engine API client for dockerpty sessions.
//!
//! [`DockerEngine`] implements [`dockerpty_core::RuntimeClient`] over the
//! engine's HTTP API, on a unix socket or a plain TCP endpoint.

pub mod client;
pub mod config;
pub mod events;

pub use client::{ContainerInfo, DockerEngine};
pub use config::{EngineConfig, Endpoint, DEFAULT_HOST};
pub use events::EventDecoder;
