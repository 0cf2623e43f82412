//! Storage Node Module
//!
//! A storage node owns a flat directory of part files and answers three
//! requests, one per connection:
//! - `store`: write exactly the announced bytes under the part name
//! - `GET_PART`: stream a part back with its length, or report it missing
//! - `DELETE_PART`: remove a part, SUCCESS or FAILURE
//!
//! [`NodeClient`] is the coordinator's side of the same protocol.

mod store;
mod handler;
mod client;

pub use store::PartStore;
pub use handler::NodeService;
pub use client::{FetchOutcome, NodeClient};
