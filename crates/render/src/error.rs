//! Render-stage error type.

use thiserror::Error;

/// The data could not be laid out, or the PDF could not be serialised.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("report has no columns to print")]
    NoColumns,

    #[error("{columns} columns do not fit on a page (at most {max})")]
    TooManyColumns { columns: usize, max: usize },

    #[error("PDF serialisation failed: {0}")]
    Pdf(#[from] lopdf::Error),
}
