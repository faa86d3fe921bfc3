//! Line-delimited JSON over a Unix domain socket.
//!
//! Every connection gets a [`ConnectionId`] and an outbox in the [`Hub`], so
//! the daemon can push events to one peer or to every subscriber at any time,
//! not only in response to a request.

pub mod client;
pub mod hub;
pub mod paths;
pub mod server;

pub use client::{ClientError, DaemonClient};
pub use hub::{ConnectionId, Hub};
pub use paths::RuntimePaths;
pub use server::run_socket_server;
