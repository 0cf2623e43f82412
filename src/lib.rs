//! # AtlasFS
//!
//! A sharded file store:
//! - A coordinator splits each uploaded file into parts
//! - Part `i` is pushed to storage node `i` over TCP
//! - A plain-text ledger records which node holds which part
//! - Downloads fetch and concatenate the parts, deletes remove them
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                               │
//! │         (list / upload / download / DELETE_FILE)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ TCP
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Coordinator                              │
//! │   split / assemble  ──────────  Ledger (file_mapping.txt)    │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ store / GET_PART / DELETE_PART   │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │  Storage Node 1 │      ...       │  Storage Node K │
//!   │  (part files)   │                │  (part files)   │
//!   └─────────────────┘                └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod names;

pub mod protocol;
pub mod ledger;
pub mod node;
pub mod coordinator;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AtlasError, Result};
pub use config::{CoordinatorConfig, NodeConfig, StorageServerInfo};
pub use coordinator::Coordinator;
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasFS
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
