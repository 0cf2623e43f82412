//! Network Module
//!
//! TCP server and connection handling.
//!
//! ## Architecture
//! - Single acceptor thread per server
//! - One worker thread per accepted connection (unbounded)
//! - Coordinator connections loop over requests; storage node connections
//!   serve one request each (see `node::NodeService`)

mod server;
mod connection;

pub use server::{Server, Service, ShutdownHandle};
pub use connection::{Connection, CoordinatorService};
