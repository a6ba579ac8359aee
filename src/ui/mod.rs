/// View helpers for the attachment editor window

pub mod preview;
pub mod slots;
