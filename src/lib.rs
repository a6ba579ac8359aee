//! Attachment slots and live image previews for a markdown content form.
//!
//! The form keeps a bounded list of attachment slots, restores the
//! identifiers of removed slots when they are added back, and keeps
//! temporary preview references in sync with the rendered markdown.

pub mod config;
pub mod logging;
pub mod preview;
pub mod state;
