use std::io::Write;
use std::path::{Path, PathBuf};

use lopdf::{Document, ObjectId};
use tempfile::NamedTempFile;
use tracing::debug;

use super::page_index::PageIndex;
use crate::error::{Error, Result};

/// How far into the file the `%PDF-` header may start
const HEADER_SEARCH_LEN: usize = 1024;

/// A PDF loaded for rewriting
pub struct PdfDocument {
    doc: Document,
    /// Page object IDs in page order
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    /// Open a PDF from a file path.
    ///
    /// A missing file or one without a PDF header is unreadable; a PDF whose
    /// structure lopdf cannot parse, or that has no pages, is corrupt.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::DocumentUnreadable(format!("failed to read file {}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    /// Open a PDF from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header_window = &bytes[..bytes.len().min(HEADER_SEARCH_LEN)];
        if !header_window.windows(5).any(|w| w == b"%PDF-") {
            return Err(Error::DocumentUnreadable("not a PDF file".to_string()));
        }

        let doc = Document::load_mem(bytes).map_err(|e| Error::DocumentCorrupt(format!("failed to parse PDF: {e}")))?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(Error::DocumentCorrupt("document has no pages".to_string()));
        }

        Ok(Self { doc, pages })
    }

    /// Get number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page object IDs in page order
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.pages
    }

    pub fn page_id(&self, index: PageIndex) -> Result<ObjectId> {
        self.pages.get(index.as_usize()).copied().ok_or(Error::InvalidPage {
            page: index.as_usize(),
            total: self.pages.len(),
        })
    }

    pub const fn inner(&self) -> &Document {
        &self.doc
    }

    pub const fn inner_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Serialize the document.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.doc.compress();
        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| Error::DocumentWriteFailed(format!("failed to serialize PDF: {e}")))?;
        Ok(output)
    }

    /// Write the document to `output` in one step.
    ///
    /// The bytes go to a temporary file in the destination directory which is
    /// then renamed over `output`, so a failed write leaves no partial file.
    pub fn save_atomic(&mut self, output: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let write_failed = |e: std::io::Error| Error::DocumentWriteFailed(format!("{}: {e}", output.display()));

        let mut file = NamedTempFile::new_in(&dir).map_err(write_failed)?;
        file.write_all(&bytes).map_err(write_failed)?;
        file.as_file().sync_all().map_err(write_failed)?;
        file.persist(output).map_err(|e| write_failed(e.error))?;

        debug!("Wrote {} bytes to {}", bytes.len(), output.display());
        Ok(())
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.pages.len())
            .finish_non_exhaustive()
    }
}
