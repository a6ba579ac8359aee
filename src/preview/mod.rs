/// Live preview support
///
/// This module handles:
/// - Temporary references to selected files (store.rs)
/// - The rendered preview the references are shown in (surface.rs)
/// - Reading picked files off the UI thread (loader.rs)

pub mod loader;
pub mod store;
pub mod surface;
