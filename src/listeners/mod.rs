//! # Built-in listeners.
//!
//! - [`LogWriter`] prints events to stdout _(demo/reference only)_.

mod log;

pub use log::LogWriter;
