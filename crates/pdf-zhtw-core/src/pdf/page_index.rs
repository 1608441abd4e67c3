//! Page index newtype for safe conversion between Rust indices and lopdf
//! page numbers.
//!
//! Rust collections and progress reporting count pages from 0; lopdf's page
//! tree numbers them from 1 as `u32`.

use std::fmt;

use crate::error::Error;

/// A zero-based page index that is known to fit a lopdf page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(u32);

impl PageIndex {
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the index as usize for Rust collections.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Get the 1-indexed page number lopdf uses.
    #[must_use]
    pub const fn as_lopdf_page_number(self) -> u32 {
        self.0.saturating_add(1)
    }

    /// Try to create a PageIndex from a usize page index.
    ///
    /// Returns an error if the index is not below the total page count or
    /// does not fit a lopdf page number.
    pub fn try_from_page_num(page_num: usize, total_pages: usize) -> Result<Self, Error> {
        let invalid = || Error::InvalidPage {
            page: page_num,
            total: total_pages,
        };
        if page_num >= total_pages {
            return Err(invalid());
        }
        u32::try_from(page_num)
            .ok()
            .filter(|n| *n < u32::MAX)
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl From<PageIndex> for usize {
    fn from(index: PageIndex) -> Self {
        index.as_usize()
    }
}

impl fmt::Display for PageIndex {
    /// Human page number, counting from 1
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_lopdf_page_number())
    }
}
