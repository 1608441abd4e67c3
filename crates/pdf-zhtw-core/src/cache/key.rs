use crate::util::normalize_whitespace;

/// Cache key for a translated text run.
///
/// The key is the normalized source text. The target language is fixed, so
/// the source language does not take part in the key. Normalization collapses
/// whitespace runs and trims, so text differing only in spacing shares an
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text: String,
}

impl CacheKey {
    pub fn new(text: &str) -> Self {
        Self {
            text: normalize_whitespace(text),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Fixed-length key for the persistent layer.
    ///
    /// Entries written by one backend are never served to another, so the
    /// backend identity is hashed in with the text. Null byte separators keep
    /// ("a", "bc") and ("ab", "c") apart.
    pub fn disk_key(&self, backend_identity: &str) -> String {
        let combined = format!("{}\0{}", backend_identity.to_lowercase(), self.text);
        format!("{:x}", md5::compute(combined.as_bytes()))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_variants_share_key() {
        assert_eq!(CacheKey::new("Hello  world"), CacheKey::new(" Hello\tworld\n"));
    }

    #[test]
    fn test_content_changes_key() {
        assert_ne!(CacheKey::new("Hello"), CacheKey::new("World"));
    }

    #[test]
    fn test_case_is_significant() {
        assert_ne!(CacheKey::new("Error"), CacheKey::new("error"));
    }

    #[test]
    fn test_disk_key_is_fixed_length_hash() {
        let k = CacheKey::new("Hello world").disk_key("google|x|");
        assert_eq!(k.len(), 32);
        assert!(k.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_disk_key_differs_by_backend() {
        let k = CacheKey::new("Hello");
        assert_ne!(k.disk_key("google||"), k.disk_key("openai|x|gpt-3.5-turbo"));
        assert_eq!(k.disk_key("GOOGLE||"), k.disk_key("google||"));
    }

    #[test]
    fn test_empty_text() {
        assert!(CacheKey::new(" \n ").is_empty());
    }
}
