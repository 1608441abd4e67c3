//! ToUnicode CMap parsing.
//!
//! Only the `bfchar` and `bfrange` sections are read; that is all a
//! ToUnicode map needs to turn character codes into text.

use std::collections::HashMap;

/// Character code to Unicode string mapping from a `/ToUnicode` stream.
#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    mappings: HashMap<u32, String>,
    /// Byte length of codes, from the first codespace range (1 when absent)
    code_len: usize,
}

impl ToUnicode {
    /// Parse CMap stream content. Malformed lines are skipped.
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut mappings = HashMap::new();

        for section in sections(&text, "beginbfchar", "endbfchar") {
            parse_bfchar_section(section, &mut mappings);
        }
        for section in sections(&text, "beginbfrange", "endbfrange") {
            parse_bfrange_section(section, &mut mappings);
        }

        let code_len = sections(&text, "begincodespacerange", "endcodespacerange")
            .next()
            .and_then(|s| extract_hex_tokens(s).first().map(|t| t.len().div_ceil(2)))
            .unwrap_or(1)
            .clamp(1, 4);

        Self { mappings, code_len }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    pub const fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn sections<'t>(text: &'t str, begin: &'t str, end: &'t str) -> impl Iterator<Item = &'t str> + 't {
    let mut search_from = 0;
    std::iter::from_fn(move || {
        let start = search_from + text[search_from..].find(begin)? + begin.len();
        let len = text[start..].find(end)?;
        search_from = start + len + end.len();
        Some(&text[start..start + len])
    })
}

fn parse_bfchar_section(section: &str, mappings: &mut HashMap<u32, String>) {
    // Entries may share a line, so pair tokens rather than reading line by line
    let tokens = extract_hex_tokens(section);
    for pair in tokens.chunks_exact(2) {
        if let (Some(code), Some(text)) = (parse_hex_code(pair[0]), decode_utf16be_hex(pair[1])) {
            mappings.insert(code, text);
        }
    }
}

/// `<lo> <hi> <dst>` or `<lo> <hi> [<dst1> <dst2> ...]`
fn parse_bfrange_section(section: &str, mappings: &mut HashMap<u32, String>) {
    for line in section.lines() {
        let trimmed = line.trim();
        if !trimmed.contains('<') {
            continue;
        }

        if let Some(bracket_start) = trimmed.find('[') {
            let src = extract_hex_tokens(&trimmed[..bracket_start]);
            let (Some(lo), Some(hi)) = (
                src.first().and_then(|t| parse_hex_code(t)),
                src.get(1).and_then(|t| parse_hex_code(t)),
            ) else {
                continue;
            };
            let bracket_end = trimmed.rfind(']').unwrap_or(trimmed.len());
            let dst = extract_hex_tokens(&trimmed[bracket_start + 1..bracket_end]);
            for (code, hex) in (lo..=hi).zip(dst) {
                if let Some(text) = decode_utf16be_hex(hex) {
                    mappings.insert(code, text);
                }
            }
        } else {
            let tokens = extract_hex_tokens(trimmed);
            if tokens.len() < 3 {
                continue;
            }
            let (Some(lo), Some(hi)) = (parse_hex_code(tokens[0]), parse_hex_code(tokens[1])) else {
                continue;
            };
            let Some(mut units) = hex_to_utf16(tokens[2]) else {
                continue;
            };
            // Bounded so a hostile range cannot allocate without limit
            for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                if let Ok(text) = String::from_utf16(&units) {
                    mappings.insert(code, text);
                }
                if let Some(last) = units.last_mut() {
                    *last = last.wrapping_add(1);
                }
            }
        }
    }
}

fn parse_hex_code(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex, 16).ok()
}

fn hex_to_utf16(hex: &str) -> Option<Vec<u16>> {
    let hex = if hex.len() == 2 { format!("00{hex}") } else { hex.to_string() };
    if hex.is_empty() || hex.len() % 4 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks(4)
        .map(|chunk| std::str::from_utf8(chunk).ok().and_then(|s| u16::from_str_radix(s, 16).ok()))
        .collect()
}

fn decode_utf16be_hex(hex: &str) -> Option<String> {
    hex_to_utf16(hex).and_then(|units| String::from_utf16(&units).ok())
}

fn extract_hex_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        let Some(end) = rest[start + 1..].find('>') else {
            break;
        };
        tokens.push(rest[start + 1..start + 1 + end].trim());
        rest = &rest[start + 1 + end + 1..];
    }
    tokens
}
