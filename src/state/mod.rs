/// State management module
///
/// This module handles all attachment form state, including:
/// - Shared data structures (data.rs)
/// - Slot bookkeeping and the restore stack (slots.rs)
/// - Temporary preview references (registry.rs)
/// - File validation (validate.rs)
/// - The form session tying them together (form.rs)
/// - The SQLite attachment catalog (library.rs)

pub mod data;
pub mod form;
pub mod library;
pub mod registry;
pub mod slots;
pub mod validate;
