//! Reading the fonts a page already uses.
//!
//! A [`SourceFont`] turns show-string bytes into glyphs: the Unicode text
//! each code stands for (when it can be recovered) and its advance width in
//! thousandths of an em.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::cmap::ToUnicode;

const DEFAULT_ASCENT: f32 = 0.75;
const DEFAULT_DESCENT: f32 = -0.25;
const DEFAULT_WIDTH: f32 = 500.0;

/// One decoded glyph
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Unicode text, empty when the code cannot be decoded
    pub text: String,
    /// Advance in glyph space (1/1000 em)
    pub width: f32,
    /// Single-byte code 32, which receives word spacing
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    /// `/FirstChar` + `/Widths`
    Simple { first_char: u32, widths: Vec<f32>, missing: f32 },
    /// `/W` ranges + `/DW`
    Composite { widths: HashMap<u32, f32>, default: f32 },
    /// Standard-14 font without explicit widths
    Standard(&'static [u16; 95], f32),
}

impl Widths {
    fn width(&self, code: u32) -> f32 {
        match self {
            Self::Simple { first_char, widths, missing } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize).copied())
                .unwrap_or(*missing),
            Self::Composite { widths, default } => widths.get(&code).copied().unwrap_or(*default),
            Self::Standard(table, fallback) => code
                .checked_sub(32)
                .and_then(|i| table.get(i as usize))
                .map_or(*fallback, |w| f32::from(*w)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    /// Two-byte codes that are UCS-2 code points (`Uni*-UCS2-H`)
    Ucs2,
    /// Single-byte Windows-1252 superset
    WinAnsi,
    /// No way to recover text
    Opaque,
}

/// A font resource as used by the page being read.
#[derive(Debug, Clone)]
pub struct SourceFont {
    /// Base font name without the subset tag
    pub base_font: String,
    composite: bool,
    to_unicode: Option<ToUnicode>,
    encoding: TextEncoding,
    widths: Widths,
    /// Ascent in em units (positive)
    pub ascent: f32,
    /// Descent in em units (negative)
    pub descent: f32,
}

impl SourceFont {
    /// Read a font dictionary. Never fails: missing data falls back to
    /// defaults, and undecodable fonts report `can_decode() == false`.
    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let subtype = name_of(font.get(b"Subtype").ok());
        let composite = subtype.as_deref() == Some("Type0");
        let base_font = strip_subset_tag(&name_of(font.get(b"BaseFont").ok()).unwrap_or_default());

        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_stream().ok())
            .and_then(|stream| stream.decompressed_content().ok().or_else(|| Some(stream.content.clone())))
            .map(|data| ToUnicode::parse(&data))
            .filter(|map| !map.is_empty());

        let encoding_name = name_of(font.get(b"Encoding").ok().and_then(|o| resolve(doc, o)));
        let encoding = if composite {
            if encoding_name.as_deref().is_some_and(|n| n.contains("UCS2") || n.contains("UTF16")) {
                TextEncoding::Ucs2
            } else {
                TextEncoding::Opaque
            }
        } else {
            TextEncoding::WinAnsi
        };

        let descendant = if composite {
            font.get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_dict().ok())
        } else {
            None
        };

        let descriptor = descendant
            .unwrap_or(font)
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok());

        let missing = descriptor
            .and_then(|d| number(d.get(b"MissingWidth").ok()))
            .unwrap_or(0.0);

        let widths = match descendant {
            Some(cid_font) => Widths::Composite {
                widths: cid_widths(doc, cid_font),
                default: number(cid_font.get(b"DW").ok()).unwrap_or(1000.0),
            },
            None => simple_widths(doc, font, &base_font, missing),
        };

        let ascent = descriptor
            .and_then(|d| number(d.get(b"Ascent").ok()))
            .filter(|a| *a > 0.0)
            .map_or(DEFAULT_ASCENT, |a| a / 1000.0);
        let descent = descriptor
            .and_then(|d| number(d.get(b"Descent").ok()))
            .filter(|d| *d < 0.0)
            .map_or(DEFAULT_DESCENT, |d| d / 1000.0);

        Self {
            base_font,
            composite,
            to_unicode,
            encoding,
            widths,
            ascent,
            descent,
        }
    }

    /// Stand-in for a font resource the page does not define. Advances use a
    /// default width so positions stay plausible; text is never decoded.
    pub fn placeholder() -> Self {
        Self {
            base_font: String::new(),
            composite: false,
            to_unicode: None,
            encoding: TextEncoding::Opaque,
            widths: Widths::Simple {
                first_char: 0,
                widths: Vec::new(),
                missing: DEFAULT_WIDTH,
            },
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
        }
    }

    /// Whether text can be recovered from this font's codes
    pub fn can_decode(&self) -> bool {
        self.to_unicode.is_some() || self.encoding != TextEncoding::Opaque
    }

    fn code_len(&self) -> usize {
        if self.composite {
            2
        } else {
            self.to_unicode.as_ref().map_or(1, ToUnicode::code_len).min(2)
        }
    }

    /// Split show-string bytes into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let code_len = self.code_len();
        bytes
            .chunks(code_len)
            .map(|chunk| {
                let code = chunk.iter().fold(0_u32, |acc, b| (acc << 8) | u32::from(*b));
                let text = self
                    .to_unicode
                    .as_ref()
                    .and_then(|map| map.lookup(code))
                    .map(str::to_string)
                    .or_else(|| match self.encoding {
                        TextEncoding::Ucs2 => char::from_u32(code).map(String::from),
                        TextEncoding::WinAnsi if code_len == 1 => win_ansi(code).map(String::from),
                        _ => None,
                    })
                    .unwrap_or_default();
                // UCS-2 fonts are the predefined CJK faces: ASCII is half width
                let width = if self.encoding == TextEncoding::Ucs2 && (0x20..=0x7E).contains(&code) {
                    500.0
                } else {
                    self.widths.width(code)
                };
                Glyph {
                    text,
                    width,
                    is_word_space: code_len == 1 && code == 32,
                }
            })
            .collect()
    }

    /// Whether the face looks like a serif design.
    pub fn is_serif(&self) -> bool {
        const SERIF_HINTS: &[&str] = &[
            "times", "serif", "mincho", "song", "sung", "simsun", "ming", "georgia", "garamond", "roman",
            "book", "cambria", "palatino", "batang", "kai",
        ];
        let name = self.base_font.to_lowercase();
        if name.contains("sans") {
            return false;
        }
        SERIF_HINTS.iter().any(|hint| name.contains(hint))
    }
}

/// Resolve a reference, leaving direct objects as they are.
pub fn resolve<'d>(doc: &'d Document, obj: &'d Object) -> Option<&'d Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Numeric value of an integer or real object.
pub fn number(obj: Option<&Object>) -> Option<f32> {
    match obj? {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn name_of(obj: Option<&Object>) -> Option<String> {
    match obj? {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

/// `ABCDEF+Times-Roman` -> `Times-Roman`
fn strip_subset_tag(name: &str) -> String {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest.to_string(),
        _ => name.to_string(),
    }
}

fn simple_widths(doc: &Document, font: &Dictionary, base_font: &str, missing: f32) -> Widths {
    let explicit = font
        .get(b"Widths")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().map(|w| number(resolve(doc, w)).unwrap_or(missing)).collect::<Vec<_>>());

    if let Some(widths) = explicit {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let first_char = number(font.get(b"FirstChar").ok()).unwrap_or(0.0).max(0.0) as u32;
        return Widths::Simple {
            first_char,
            widths,
            missing,
        };
    }

    standard_widths(base_font)
}

/// `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn cid_widths(doc: &Document, cid_font: &Dictionary) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let Some(arr) = cid_font
        .get(b"W")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
    else {
        return widths;
    };

    let mut i = 0;
    while i < arr.len() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let Some(first) = number(resolve(doc, &arr[i])).map(|n| n.max(0.0) as u32) else {
            break;
        };
        match arr.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in (0_u32..).zip(list) {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(first + offset, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let last = number(Some(last)).map_or(first, |n| n.max(0.0) as u32);
                let w = arr.get(i + 2).and_then(|o| number(resolve(doc, o))).unwrap_or(1000.0);
                for code in first..=last.min(first.saturating_add(0xFFFF)) {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// Printable ASCII widths (codes 32..=126) of the standard fonts.
#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

static COURIER_WIDTHS: [u16; 95] = [600; 95];

fn standard_widths(base_font: &str) -> Widths {
    let name = base_font.to_lowercase();
    if name.starts_with("courier") {
        Widths::Standard(&COURIER_WIDTHS, 600.0)
    } else if name.starts_with("times") {
        Widths::Standard(&TIMES_WIDTHS, 500.0)
    } else if name.starts_with("helvetica") || name.starts_with("arial") {
        Widths::Standard(&HELVETICA_WIDTHS, 556.0)
    } else {
        Widths::Simple {
            first_char: 0,
            widths: Vec::new(),
            missing: DEFAULT_WIDTH,
        }
    }
}

/// WinAnsiEncoding: Latin-1 with the Windows-1252 block at 0x80..=0x9F.
fn win_ansi(code: u32) -> Option<char> {
    let c = match code {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '•',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        0x20..=0x7E | 0xA0..=0xFF => char::from_u32(code)?,
        _ => return None,
    };
    Some(c)
}
