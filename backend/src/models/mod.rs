//! Data models for the Writers & Readers Hub.
//!
//! Every model is stored as camelCase JSON so records stay readable by the web client.

mod activity;
mod comment;
mod dashboard;
mod profile;
mod registry;
mod story;

pub use activity::*;
pub use comment::*;
pub use dashboard::*;
pub use profile::*;
pub use registry::*;
pub use story::*;

/// Fresh random identifier for stories, comments and activity entries.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
