//! Content normalization: PDFs and web pages to clean text.
//!
//! HTML goes through `htmd` after content-container extraction and table
//! pre-processing; PDFs through `pdf-extract`. Both outputs then pass a
//! series of cleanup passes (see `cleanup`).

mod cleanup;
pub mod converter;
pub mod html;
pub mod pdf;

pub use converter::{ConvertInput, MarkdownConverter, TextConverter};
pub use html::{ConvertResult, convert_html, looks_like_html};
pub use pdf::{extract_pdf_text, pdf_bytes_to_text};
