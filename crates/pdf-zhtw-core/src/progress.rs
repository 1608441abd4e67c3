//! Progress notifications pushed to the caller during a conversion.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    PageStarted,
    PageFinished,
    /// A run or page was left untranslated
    Warning,
}

/// One notification. `page_index` counts from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub page_index: usize,
    pub page_count: usize,
    pub kind: ProgressKind,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(page_index: usize, page_count: usize, kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            page_index,
            page_count,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.page_index + 1, self.page_count, self.message)
    }
}

/// Receives progress events; must not block.
pub type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_one_based() {
        let event = ProgressEvent::new(0, 3, ProgressKind::PageStarted, "Translating");
        assert_eq!(event.to_string(), "[1/3] Translating");
    }
}
