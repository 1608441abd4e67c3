//! Fitting replacement text into the slot of the text it replaces.
//!
//! Sizes and widths here are in the run's text space, so the caller's
//! transformation matrix applies unchanged to whatever is drawn.

/// Line height as a multiple of font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.15;

/// Each shrink step multiplies the size by this factor.
const SHRINK_STEP: f32 = 0.95;

/// Target slot for a replacement string
#[derive(Debug, Clone, Copy)]
pub struct FitBox {
    /// Width of the original run
    pub width: f32,
    /// Height of the original run's glyph box
    pub height: f32,
    /// Original font size; text never grows beyond it
    pub max_size: f32,
    /// Shrink floor
    pub min_size: f32,
    /// Horizontal scaling applied to glyph advances (`Tz / 100`)
    pub horizontal_scaling: f32,
}

/// Replacement text broken into lines at a chosen size
#[derive(Debug, Clone, PartialEq)]
pub struct Fitted {
    pub size: f32,
    pub lines: Vec<String>,
    /// Text exceeds the box even at the floor size
    pub overflow: bool,
}

impl Fitted {
    pub fn line_height(&self) -> f32 {
        self.size * LINE_HEIGHT_FACTOR
    }
}

/// Choose the largest size (down to the floor) at which `text` fits the box,
/// wrapping onto as many lines as the box height allows.
///
/// `advance` gives a character's advance in em units. At the floor size the
/// text is wrapped as well as it can be, lines beyond the box are joined
/// onto the last one, and the result is marked as overflowing.
pub fn fit_text(text: &str, target: &FitBox, advance: impl Fn(char) -> f32) -> Fitted {
    let floor = target.min_size.min(target.max_size).max(f32::EPSILON);
    let scale = target.horizontal_scaling.abs().max(f32::EPSILON);
    let mut size = target.max_size.max(floor);

    loop {
        let max_em = target.width / (size * scale);
        let lines = wrap_lines(text, max_em, &advance);
        let fits = lines.len() <= max_lines(target.height, size)
            && lines.iter().all(|line| line_width(line, &advance) <= max_em + 1e-4);
        if fits {
            return Fitted {
                size,
                lines,
                overflow: false,
            };
        }

        let next = size * SHRINK_STEP;
        if next < floor {
            break;
        }
        size = next;
    }

    size = floor;
    let max_em = target.width / (size * scale);
    let mut lines = wrap_lines(text, max_em, &advance);
    let allowed = max_lines(target.height, size);
    if lines.len() > allowed {
        lines.truncate(allowed - 1);
        let tail = remainder(text, &lines).to_string();
        lines.push(tail);
    }
    Fitted {
        size,
        lines,
        overflow: true,
    }
}

/// The part of `text` not covered by `head`, with its original spacing.
///
/// Wrapped lines keep every visible character in order, so walking them
/// against the source finds where the tail starts.
fn remainder<'a>(text: &'a str, head: &[String]) -> &'a str {
    let mut rest = text;
    for c in head.iter().flat_map(|line| line.chars()) {
        if c.is_whitespace() {
            continue;
        }
        rest = rest.trim_start();
        match rest.strip_prefix(c) {
            Some(after) => rest = after,
            None => break,
        }
    }
    rest.trim()
}

fn max_lines(height: f32, size: f32) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lines = (height / (size * LINE_HEIGHT_FACTOR)).floor().max(0.0) as usize;
    lines.max(1)
}

/// Width of `line` in em units
pub fn line_width(line: &str, advance: impl Fn(char) -> f32) -> f32 {
    line.chars().map(advance).sum()
}

/// Characters a line may break before or after
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{1100}'..='\u{11FF}'
        | '\u{2E80}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FE30}'..='\u{FE4F}'
        | '\u{FF00}'..='\u{FFEF}'
        | '\u{20000}'..='\u{2FA1F}')
}

/// Punctuation that must not begin a line
fn is_closing(c: char) -> bool {
    matches!(
        c,
        '，' | '。' | '、' | '；' | '：' | '？' | '！' | '」' | '』' | '）' | '》' | '〉' | '】' | '…' | ','
            | '.' | ';' | ':' | '?' | '!' | ')'
    )
}

/// Split text into unbreakable pieces: each CJK character alone, runs of
/// other characters as words, whitespace as separators. Closing punctuation
/// sticks to the piece before it.
fn tokens(text: &str) -> Vec<(String, bool)> {
    let mut out: Vec<(String, bool)> = Vec::new();
    let mut word = String::new();
    let mut space_before = false;

    let flush = |word: &mut String, out: &mut Vec<(String, bool)>, space: &mut bool| {
        if !word.is_empty() {
            out.push((std::mem::take(word), *space));
            *space = false;
        }
    };

    for c in text.chars() {
        if c.is_whitespace() {
            flush(&mut word, &mut out, &mut space_before);
            space_before = !out.is_empty();
        } else if is_closing(c) && word.is_empty() && !space_before {
            match out.last_mut() {
                Some((last, _)) => last.push(c),
                None => word.push(c),
            }
        } else if is_cjk(c) {
            flush(&mut word, &mut out, &mut space_before);
            out.push((c.to_string(), space_before));
            space_before = false;
        } else {
            word.push(c);
        }
    }
    flush(&mut word, &mut out, &mut space_before);
    out
}

/// Wrap text so each line is at most `max_em` wide. Words wider than a line
/// are broken between characters.
pub fn wrap_lines(text: &str, max_em: f32, advance: impl Fn(char) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0.0_f32;

    for (token, space_before) in tokens(text) {
        let token_width = line_width(&token, &advance);
        let gap = if space_before && !current_line.is_empty() { advance(' ') } else { 0.0 };

        if current_width + gap + token_width <= max_em + 1e-4 {
            if gap > 0.0 {
                current_line.push(' ');
            }
            current_line.push_str(&token);
            current_width += gap + token_width;
            continue;
        }

        if !current_line.is_empty() {
            lines.push(std::mem::take(&mut current_line));
            current_width = 0.0;
        }

        if token_width <= max_em + 1e-4 {
            current_line = token;
            current_width = token_width;
        } else {
            for c in token.chars() {
                let w = advance(c);
                if current_width + w > max_em + 1e-4 && !current_line.is_empty() {
                    lines.push(std::mem::take(&mut current_line));
                    current_width = 0.0;
                }
                current_line.push(c);
                current_width += w;
            }
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Half width for ASCII, full width otherwise
    fn cjk_metrics(c: char) -> f32 {
        if c.is_ascii() { 0.5 } else { 1.0 }
    }

    fn slot(width: f32, size: f32) -> FitBox {
        FitBox {
            width,
            height: size,
            max_size: size,
            min_size: 4.0,
            horizontal_scaling: 1.0,
        }
    }

    #[test]
    fn test_wrap_words() {
        let lines = wrap_lines("Hello world this is a test", 5.0, cjk_metrics);
        assert_eq!(lines, ["Hello", "world this", "is a test"]);
    }

    #[test]
    fn test_wrap_cjk_keeps_closing_punctuation_attached() {
        let lines = wrap_lines("你好世界，再見", 3.0, cjk_metrics);
        assert_eq!(lines, ["你好世", "界，再", "見"]);
    }

    #[test]
    fn test_wrap_empty() {
        assert_eq!(wrap_lines("", 10.0, cjk_metrics), [""]);
    }

    #[test]
    fn test_text_that_fits_keeps_size() {
        // "你好" is 2 em = 24pt at 12pt, inside a 27pt slot
        let fitted = fit_text("你好", &slot(27.3, 12.0), cjk_metrics);
        assert!((fitted.size - 12.0).abs() < f32::EPSILON);
        assert_eq!(fitted.lines, ["你好"]);
        assert!(!fitted.overflow);
    }

    #[test]
    fn test_long_text_shrinks_within_width() {
        let target = slot(30.0, 12.0);
        let fitted = fit_text("這是一段比較長的翻譯", &target, cjk_metrics);
        assert!(fitted.size < 12.0);
        assert!(fitted.size >= 4.0);
        assert!(!fitted.overflow);
        for line in &fitted.lines {
            assert!(line_width(line, cjk_metrics) * fitted.size <= target.width + 1e-3);
        }
    }

    #[test]
    fn test_tall_box_wraps_onto_lines() {
        let target = FitBox {
            width: 24.0,
            height: 60.0,
            max_size: 12.0,
            min_size: 4.0,
            horizontal_scaling: 1.0,
        };
        let fitted = fit_text("你好世界", &target, cjk_metrics);
        assert!((fitted.size - 12.0).abs() < f32::EPSILON);
        assert_eq!(fitted.lines, ["你好", "世界"]);
    }

    #[test]
    fn test_overflow_at_floor_is_flagged() {
        let fitted = fit_text("非常非常非常長的文字內容", &slot(5.0, 12.0), cjk_metrics);
        assert!(fitted.overflow);
        assert!((fitted.size - 4.0).abs() < f32::EPSILON);
        assert_eq!(fitted.lines.len(), 2);
        assert_eq!(fitted.lines.concat(), "非常非常非常長的文字內容");
    }

    #[test]
    fn test_overflow_tail_keeps_word_spacing() {
        let fitted = fit_text("alpha beta gamma delta", &slot(5.0, 12.0), cjk_metrics);
        assert!(fitted.overflow);
        assert_eq!(fitted.lines, ["al", "pha beta gamma delta"]);
    }

    #[test]
    fn test_horizontal_scaling_narrows_capacity() {
        let mut target = slot(24.0, 12.0);
        target.horizontal_scaling = 2.0;
        let fitted = fit_text("你好", &target, cjk_metrics);
        assert!(fitted.size <= 6.0 + 1e-3);
    }
}
