//! `render` crate: lays a report out onto PDF pages.
//!
//! The renderer is pure: the same records, config, summary and run date
//! always produce the same bytes. Nothing reads the clock and the document
//! carries no random identifiers.

mod canvas;
mod chart;
pub mod error;
pub mod format;
mod layout;
mod report;
mod table;

pub use error::RenderError;
pub use report::{RenderRequest, ReportRenderer};
