//! Source language classification.
//!
//! Classification is a pure function of the text. Short strings are never
//! guessed at; Han-only text is treated as already being in the target script
//! without consulting the statistical detector, which is unreliable on CJK
//! fragments.

use crate::config::Lang;

/// Character-class counts of a string, ignoring whitespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptProfile {
    /// Non-whitespace characters
    pub visible: usize,
    /// CJK ideographs
    pub han: usize,
    /// Hiragana and katakana
    pub kana: usize,
    pub hangul: usize,
    pub latin: usize,
    /// Alphabetic characters of any other script
    pub other_letters: usize,
}

impl ScriptProfile {
    pub fn of(text: &str) -> Self {
        let mut profile = Self::default();
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            profile.visible += 1;
            if is_han(c) {
                profile.han += 1;
            } else if is_kana(c) {
                profile.kana += 1;
            } else if is_hangul(c) {
                profile.hangul += 1;
            } else if c.is_ascii_alphabetic() || is_latin_extended(c) {
                profile.latin += 1;
            } else if c.is_alphabetic() {
                profile.other_letters += 1;
            }
        }
        profile
    }

    /// Letters outside the Han script (Latin, kana, Hangul, Cyrillic...)
    pub const fn foreign_letters(&self) -> usize {
        self.kana + self.hangul + self.latin + self.other_letters
    }

    /// Only Han ideographs among the letters, and at least one of them
    pub const fn is_han_only(&self) -> bool {
        self.han > 0 && self.foreign_letters() == 0
    }
}

fn is_han(c: char) -> bool {
    matches!(c as u32,
        0x3400..=0x4DBF |   // Extension A
        0x4E00..=0x9FFF |   // Unified Ideographs
        0xF900..=0xFAFF |   // Compatibility Ideographs
        0x20000..=0x2FA1F   // Extensions B+ and compatibility supplement
    ) || c == '〇'
}

fn is_kana(c: char) -> bool {
    matches!(c as u32, 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9D)
}

fn is_hangul(c: char) -> bool {
    matches!(c as u32, 0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF)
}

fn is_latin_extended(c: char) -> bool {
    matches!(c as u32, 0x00C0..=0x024F | 0x1E00..=0x1EFF) && c.is_alphabetic()
}

/// Classifies the language of a text run.
#[derive(Debug, Clone)]
pub struct LanguageClassifier {
    min_chars: usize,
}

impl LanguageClassifier {
    /// `min_chars` is the smallest number of visible characters that will be
    /// classified; anything shorter is `Unknown`.
    pub const fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    pub const fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Classify `text`, returning `None` for `Unknown`.
    pub fn classify(&self, text: &str) -> Option<Lang> {
        let profile = ScriptProfile::of(text);
        if profile.visible < self.min_chars.max(1) {
            return None;
        }
        if profile.is_han_only() {
            return Some(Lang::new("zh"));
        }
        if profile.foreign_letters() == 0 {
            // Digits and punctuation carry no language
            return None;
        }

        let info = whatlang::detect(text)?;
        if !info.is_reliable() {
            return None;
        }
        lang_to_code(info.lang()).map(Lang::new)
    }

    /// Whether a run should be left untouched as already being in the target
    /// script.
    ///
    /// True when the run classifies as Chinese, or when it is unclassifiable
    /// and contains no letters outside the Han script (numbers, symbols, a
    /// lone ideograph).
    pub fn is_target_script(classified: Option<&Lang>, text: &str) -> bool {
        match classified {
            Some(lang) => lang.is_chinese(),
            None => ScriptProfile::of(text).foreign_letters() == 0,
        }
    }
}

impl Default for LanguageClassifier {
    fn default() -> Self {
        Self::new(2)
    }
}

fn lang_to_code(lang: whatlang::Lang) -> Option<&'static str> {
    use whatlang::Lang;
    let code = match lang {
        Lang::Afr => "af",
        Lang::Ara => "ar",
        Lang::Bul => "bg",
        Lang::Ben => "bn",
        Lang::Cat => "ca",
        Lang::Ces => "cs",
        Lang::Cmn => "zh",
        Lang::Dan => "da",
        Lang::Deu => "de",
        Lang::Ell => "el",
        Lang::Eng => "en",
        Lang::Epo => "eo",
        Lang::Spa => "es",
        Lang::Est => "et",
        Lang::Fin => "fi",
        Lang::Fra => "fr",
        Lang::Heb => "he",
        Lang::Hin => "hi",
        Lang::Hrv => "hr",
        Lang::Hun => "hu",
        Lang::Ind => "id",
        Lang::Ita => "it",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Lat => "la",
        Lang::Lav => "lv",
        Lang::Lit => "lt",
        Lang::Nld => "nl",
        Lang::Nob => "no",
        Lang::Pol => "pl",
        Lang::Por => "pt",
        Lang::Ron => "ro",
        Lang::Rus => "ru",
        Lang::Slk => "sk",
        Lang::Slv => "sl",
        Lang::Swe => "sv",
        Lang::Tha => "th",
        Lang::Tur => "tr",
        Lang::Ukr => "uk",
        Lang::Vie => "vi",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_unknown() {
        let classifier = LanguageClassifier::new(2);
        assert_eq!(classifier.classify("A"), None);
        assert_eq!(classifier.classify("  "), None);
        assert_eq!(classifier.classify("中"), None);
    }

    #[test]
    fn test_han_only_is_chinese() {
        let classifier = LanguageClassifier::default();
        assert_eq!(classifier.classify("公司"), Some(Lang::new("zh")));
        assert_eq!(classifier.classify("這是一份報告。"), Some(Lang::new("zh")));
    }

    #[test]
    fn test_japanese_is_not_target() {
        let classifier = LanguageClassifier::default();
        let lang = classifier.classify("これは日本語の文章です");
        assert!(!lang.as_ref().is_some_and(Lang::is_chinese));
    }

    #[test]
    fn test_numbers_are_unknown() {
        let classifier = LanguageClassifier::default();
        assert_eq!(classifier.classify("2024-05-17"), None);
        assert_eq!(classifier.classify("3.14 %"), None);
    }

    #[test]
    fn test_detects_long_english() {
        let classifier = LanguageClassifier::default();
        let lang = classifier.classify(
            "The quarterly report shows that revenue grew faster than expected in every region",
        );
        assert_eq!(lang, Some(Lang::new("en")));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let strict = LanguageClassifier::new(10);
        assert_eq!(strict.classify("公司簡介"), None);
        let lax = LanguageClassifier::new(1);
        assert_eq!(lax.classify("中"), Some(Lang::new("zh")));
    }

    #[test]
    fn test_target_script_rule() {
        assert!(LanguageClassifier::is_target_script(Some(&Lang::new("zh")), "公司"));
        assert!(LanguageClassifier::is_target_script(None, "42"));
        assert!(LanguageClassifier::is_target_script(None, "中"));
        assert!(!LanguageClassifier::is_target_script(None, "OK"));
        assert!(!LanguageClassifier::is_target_script(Some(&Lang::new("fr")), "Bonjour"));
    }

    #[test]
    fn test_script_profile() {
        let p = ScriptProfile::of("Hé 你好 ка");
        assert_eq!(p.visible, 6);
        assert_eq!(p.latin, 2);
        assert_eq!(p.han, 2);
        assert_eq!(p.other_letters, 2);
        assert!(!p.is_han_only());
    }
}
