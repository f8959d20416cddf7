//! LSP stdio client and the per-server client manager

pub mod client;
mod jsonrpc;
pub mod manager;

pub use client::{DiagnosticsCache, LspClient};
pub use manager::LspCodeIntelligence;
