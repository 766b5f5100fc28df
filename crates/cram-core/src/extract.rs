//! Syllabus text extraction from uploaded PDFs.
//!
//! [`extract_text`] never fails: a document that cannot be read comes back
//! as an `Error reading PDF: ...` string, which callers then treat as
//! syllabus text like any other. [`try_extract_text`] exposes the typed
//! failure for callers that want to block on it instead.

use std::panic::{self, UnwindSafe};

use lopdf::Document;
use tracing::{debug, warn};

/// Prefix of the text returned by [`extract_text`] when parsing fails.
pub const EXTRACT_ERROR_PREFIX: &str = "Error reading PDF:";

/// Errors from reading a PDF.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("could not parse document: {0}")]
    Load(#[source] lopdf::Error),
    #[error("could not extract text from page {page}: {source}")]
    Page {
        page: u32,
        #[source]
        source: lopdf::Error,
    },
    /// The parser panicked on a malformed document.
    #[error("parser crashed on malformed document: {0}")]
    Panicked(String),
}

/// Extract the text of every page, in page order, concatenated with no
/// separator.
///
/// lopdf can panic on some corrupt inputs; that is caught and reported as
/// [`ExtractError::Panicked`].
pub fn try_extract_text(bytes: &[u8]) -> Result<String, ExtractError> {
    catch_parser_panic(|| extract_pages(bytes))
}

fn extract_pages(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = Document::load_mem(bytes).map_err(ExtractError::Load)?;

    let mut text = String::new();
    for &page in doc.get_pages().keys() {
        let page_text = doc
            .extract_text(&[page])
            .map_err(|source| ExtractError::Page { page, source })?;
        text.push_str(&page_text);
    }

    debug!(bytes = bytes.len(), chars = text.chars().count(), "extracted PDF text");
    Ok(text)
}

fn catch_parser_panic<F>(parse: F) -> Result<String, ExtractError>
where
    F: FnOnce() -> Result<String, ExtractError> + UnwindSafe,
{
    panic::catch_unwind(parse).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ExtractError::Panicked(message))
    })
}

/// Extract PDF text, reporting failure as text instead of an error.
pub fn extract_text(bytes: &[u8]) -> String {
    match try_extract_text(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "PDF extraction failed; passing the error text on as syllabus");
            format!("{EXTRACT_ERROR_PREFIX} {e}")
        }
    }
}
