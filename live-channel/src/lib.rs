//! # Live Channel
//!
//! A persistent push connection bound to the current session token.
//!
//! This crate provides:
//! - Decoding of server frames into a closed set of [`ChannelMessage`] variants
//! - A [`QueryCache`] whose entries are invalidated by those messages
//! - A single-slot [`ReconnectSlot`] for the fixed-delay reconnect timer
//! - A [`Connector`] abstraction with a tokio-tungstenite implementation
//! - The [`LiveChannel`] state machine and its async driver
//!
//! ## Separation of Concerns
//!
//! This crate does **not** authenticate. It only follows a session token
//! published on a `tokio::sync::watch` channel: a token means "connect",
//! `None` means "tear down and stay down".
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use live_channel::{LiveChannel, LiveChannelConfig, QueryCache, WsConnector};
//!
//! let cache = Arc::new(QueryCache::new());
//! let channel = LiveChannel::new(config, Arc::new(WsConnector::default()), cache.clone());
//! tokio::spawn(channel.run(session.subscribe()));
//! ```

pub mod cache;
pub mod connection;
pub mod models;
pub mod reconnect;
pub mod service;

pub use cache::{QueryCache, QueryKey};
pub use connection::{
    Connection, ConnectionEvent, ConnectionEvents, Connector, WsConnector, DEFAULT_CONNECT_TIMEOUT,
};
pub use models::{ChannelError, ChannelMessage, ConnectionState};
pub use reconnect::ReconnectSlot;
pub use service::{LiveChannel, LiveChannelConfig};
