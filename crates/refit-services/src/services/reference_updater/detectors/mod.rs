//! Reference detectors
//!
//! Language plugins are consulted first; the generic detector covers opted-in
//! text formats that no plugin claims.

pub mod generic;
pub mod plugin;

pub use generic::{find_path_mentions, PathMention};
pub use plugin::{is_path_reference, line_edits, located_refs};
