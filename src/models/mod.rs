pub mod popover;
pub mod settings;
