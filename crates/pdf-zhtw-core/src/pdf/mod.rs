mod cmap;
mod document;
mod font;
mod interpreter;
mod layout;
mod page_index;
mod resources;
mod rewriter;
mod source_font;
mod text;

pub use document::PdfDocument;
pub use font::{TargetFace, TargetFonts};
pub use interpreter::{LineStart, RunSpan, scan_runs};
pub use layout::{FitBox, Fitted, fit_text, wrap_lines};
pub use page_index::PageIndex;
pub use resources::{page_fonts, page_resources, register_font};
pub use rewriter::{PageReport, PageRewriter};
pub use source_font::SourceFont;
pub use text::{BoundingBox, Matrix, Point, RgbColor, TextRun};

use lopdf::content::Content;
use lopdf::{Document, ObjectId};

use crate::error::{Error, Result};

/// Extract the visible, non-empty text runs of a page in drawing order.
pub fn extract_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<TextRun>> {
    let bytes = doc.get_page_content(page_id).map_err(|e| Error::ContentStream {
        page: 0,
        reason: e.to_string(),
    })?;
    let content = Content::decode(&bytes).map_err(|e| Error::ContentStream {
        page: 0,
        reason: e.to_string(),
    })?;
    let fonts = page_fonts(doc, page_id)?;
    Ok(scan_runs(&content.operations, &fonts)
        .into_iter()
        .filter(|span| span.is_visible() && !span.run.text.is_empty())
        .map(|span| span.run)
        .collect())
}
