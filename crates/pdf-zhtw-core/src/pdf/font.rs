//! Fonts that draw the Traditional Chinese replacement text.
//!
//! Two kinds of font are available:
//! - **Predefined CNS1 fonts**: `MSung-Light` (Ming, for serif sources) and
//!   `MHei-Medium` (sans). Every conforming viewer supplies these, so they
//!   are referenced by name and never embedded. Text is encoded with the
//!   `UniCNS-UCS2-H` CMap, i.e. two-byte Unicode code points.
//! - **An embedded TrueType/OpenType font** loaded from disk, written as a
//!   CIDFont with Identity-H encoding. Width and ToUnicode tables cover
//!   exactly the glyphs used and are written once the document is complete.
//!
//! # PDF Font Structure
//!
//! - **Type0 font**: the top-level font dictionary that references:
//!   - **CIDFont**: glyph metrics, referencing:
//!     - **FontDescriptor**: font metadata (flags, bounding box, etc.)
//!     - **FontFile2**: the embedded font program (embedded font only)
//!   - **ToUnicode CMap**: maps glyph IDs back to Unicode (embedded font only)

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::Face;
use tracing::debug;

use crate::error::{Error, Result};

/// Ascent of the predefined faces, in em units
const PREDEFINED_ASCENT: f32 = 0.88;

/// Which font draws a replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFace {
    /// `MSung-Light`
    Serif,
    /// `MHei-Medium`
    Sans,
    /// Font loaded from `layout.font_path`
    Embedded,
}

impl TargetFace {
    /// Preferred resource name on the page
    pub const fn resource_name(self) -> &'static str {
        match self {
            Self::Serif => "FZhSerif",
            Self::Sans => "FZhSans",
            Self::Embedded => "FZhEmb",
        }
    }

    const fn base_font(self) -> &'static str {
        match self {
            Self::Serif => "MSung-Light",
            Self::Sans | Self::Embedded => "MHei-Medium",
        }
    }
}

/// Advance widths for one face, in em units.
pub struct Metrics<'a> {
    face: Option<Face<'a>>,
}

impl Metrics<'_> {
    pub fn advance(&self, c: char) -> f32 {
        match &self.face {
            Some(face) => {
                let units = face
                    .glyph_index(c)
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .unwrap_or(0);
                f32::from(units) / f32::from(face.units_per_em())
            }
            None => predefined_advance(c),
        }
    }

    /// Ascent in em units
    pub fn ascent(&self) -> f32 {
        self.face.as_ref().map_or(PREDEFINED_ASCENT, |face| {
            f32::from(face.ascender()) / f32::from(face.units_per_em())
        })
    }
}

/// Half width for printable ASCII, full width for everything else
fn predefined_advance(c: char) -> f32 {
    if (' '..='~').contains(&c) { 0.5 } else { 1.0 }
}

/// A TrueType/OpenType font read from disk and embedded on first use.
pub struct EmbeddedFont {
    data: Vec<u8>,
    name: String,
    /// Glyphs drawn so far: GID -> (character, width in 1/1000 em)
    used: BTreeMap<u16, (char, i64)>,
}

impl EmbeddedFont {
    /// Read and validate a font file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::FontUnavailable(format!("failed to read {}: {e}", path.display())))?;
        Face::parse(&data, 0)
            .map_err(|e| Error::FontUnavailable(format!("failed to parse {}: {e}", path.display())))?;

        let name: String = path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        let name = if name.is_empty() { "EmbeddedCJK".to_string() } else { name };

        Ok(Self {
            data,
            name,
            used: BTreeMap::new(),
        })
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    /// Whether every character of `text` has a glyph.
    pub fn covers(&self, text: &str) -> bool {
        self.face()
            .is_some_and(|face| text.chars().all(|c| face.glyph_index(c).is_some()))
    }

    /// Encode as two-byte glyph IDs, recording each glyph used.
    fn encode(&mut self, text: &str) -> Result<Vec<u8>> {
        let face = Face::parse(&self.data, 0).map_err(|e| Error::FontUnavailable(e.to_string()))?;
        let units_per_em = i64::from(face.units_per_em());
        let mut bytes = Vec::with_capacity(text.len() * 2);
        for c in text.chars() {
            let gid = face
                .glyph_index(c)
                .ok_or_else(|| Error::FontUnavailable(format!("{} has no glyph for {c:?}", self.name)))?;
            let width = i64::from(face.glyph_hor_advance(gid).unwrap_or(0)) * 1000 / units_per_em;
            self.used.entry(gid.0).or_insert((c, width));
            bytes.extend_from_slice(&gid.0.to_be_bytes());
        }
        Ok(bytes)
    }

    /// Create the FontFile2 stream containing the raw font data.
    #[allow(clippy::cast_possible_wrap)]
    fn create_font_file(&self, doc: &mut Document) -> ObjectId {
        let mut dict = Dictionary::new();
        dict.set("Length1", Object::Integer(self.data.len() as i64));
        let stream = Stream::new(dict, self.data.clone()).with_compression(true);
        doc.add_object(Object::Stream(stream))
    }

    /// Create the FontDescriptor dictionary with font metrics.
    fn create_font_descriptor(&self, doc: &mut Document, font_file_id: ObjectId) -> Result<ObjectId> {
        let face = self.face().ok_or_else(|| Error::FontUnavailable(self.name.clone()))?;
        let bbox = face.global_bounding_box();
        let scale = |v: i16| i64::from(v) * 1000 / i64::from(face.units_per_em());

        let dict = Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(self.name.as_bytes().to_vec())),
            ("Flags", Object::Integer(4)), // Symbolic
            (
                "FontBBox",
                Object::Array(vec![
                    Object::Integer(scale(bbox.x_min)),
                    Object::Integer(scale(bbox.y_min)),
                    Object::Integer(scale(bbox.x_max)),
                    Object::Integer(scale(bbox.y_max)),
                ]),
            ),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(scale(face.ascender()))),
            ("Descent", Object::Integer(scale(face.descender()))),
            (
                "CapHeight",
                Object::Integer(scale(face.capital_height().unwrap_or_else(|| face.ascender()))),
            ),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(font_file_id)),
        ]);

        Ok(doc.add_object(Object::Dictionary(dict)))
    }

    /// W array in `[gid [w1 w2 ...]]` form, grouping consecutive GIDs.
    fn build_widths_array(&self) -> Vec<Object> {
        let mut result = Vec::new();
        let mut iter = self.used.iter().peekable();

        while let Some((&first_gid, &(_, first_width))) = iter.next() {
            let mut widths = vec![Object::Integer(first_width)];
            let mut expected_next = first_gid.wrapping_add(1);

            while let Some(&(&gid, &(_, width))) = iter.peek() {
                if gid == expected_next {
                    widths.push(Object::Integer(width));
                    expected_next = expected_next.wrapping_add(1);
                    iter.next();
                } else {
                    break;
                }
            }

            result.push(Object::Integer(i64::from(first_gid)));
            result.push(Object::Array(widths));
        }

        result
    }

    /// ToUnicode CMap covering the glyphs used.
    fn build_to_unicode(&self) -> Vec<u8> {
        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
",
        );

        let entries: Vec<_> = self.used.iter().collect();
        // At most 100 entries per bfchar section
        for chunk in entries.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
            for (gid, (c, _)) in chunk {
                let mut units = [0_u16; 2];
                let hex: String = c.encode_utf16(&mut units).iter().map(|u| format!("{u:04X}")).collect();
                let _ = writeln!(cmap, "<{gid:04X}> <{hex}>");
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str(
            "endcmap
CMapName currentdict /CMap defineresource pop
end
end",
        );
        cmap.into_bytes()
    }
}

/// Object IDs of the embedded font's tables written at the end
#[derive(Debug, Clone, Copy)]
struct DeferredTables {
    widths: ObjectId,
    to_unicode: ObjectId,
}

/// The replacement fonts of one document.
///
/// Font objects are added to the document the first time a face is used,
/// and [`TargetFonts::finish`] must run before the document is saved.
pub struct TargetFonts {
    embedded: Option<EmbeddedFont>,
    objects: HashMap<TargetFace, ObjectId>,
    deferred: Option<DeferredTables>,
}

impl TargetFonts {
    /// Predefined fonts only
    pub fn predefined() -> Self {
        Self {
            embedded: None,
            objects: HashMap::new(),
            deferred: None,
        }
    }

    /// Predefined fonts plus, when `font_path` is given, an embeddable font.
    pub fn new(font_path: Option<&Path>) -> Result<Self> {
        let mut fonts = Self::predefined();
        if let Some(path) = font_path {
            fonts.embedded = Some(EmbeddedFont::from_file(path)?);
            debug!("Loaded replacement font from {}", path.display());
        }
        Ok(fonts)
    }

    /// The embedded font when it can draw all of `text`, otherwise the
    /// predefined face matching the source style.
    pub fn choose(&self, text: &str, serif: bool) -> TargetFace {
        if self.embedded.as_ref().is_some_and(|font| font.covers(text)) {
            TargetFace::Embedded
        } else if serif {
            TargetFace::Serif
        } else {
            TargetFace::Sans
        }
    }

    pub fn metrics(&self, face: TargetFace) -> Metrics<'_> {
        let face = match face {
            TargetFace::Embedded => self.embedded.as_ref().and_then(EmbeddedFont::face),
            TargetFace::Serif | TargetFace::Sans => None,
        };
        Metrics { face }
    }

    /// Encode text as show-string bytes for `face`.
    ///
    /// Fails for characters the face cannot address, which leaves the run
    /// untranslated rather than drawing missing glyphs.
    pub fn encode(&mut self, face: TargetFace, text: &str) -> Result<Vec<u8>> {
        match face {
            TargetFace::Embedded => self
                .embedded
                .as_mut()
                .ok_or_else(|| Error::FontUnavailable("no embedded font loaded".to_string()))?
                .encode(text),
            TargetFace::Serif | TargetFace::Sans => {
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for c in text.chars() {
                    let code = u16::try_from(u32::from(c)).map_err(|_| {
                        Error::FontUnavailable(format!("{} cannot address {c:?}", face.base_font()))
                    })?;
                    bytes.extend_from_slice(&code.to_be_bytes());
                }
                Ok(bytes)
            }
        }
    }

    /// Object ID of the Type0 font for `face`, creating it on first use.
    pub fn font_object(&mut self, doc: &mut Document, face: TargetFace) -> Result<ObjectId> {
        if let Some(id) = self.objects.get(&face) {
            return Ok(*id);
        }
        let id = match face {
            TargetFace::Serif | TargetFace::Sans => create_predefined(doc, face),
            TargetFace::Embedded => self.create_embedded(doc)?,
        };
        self.objects.insert(face, id);
        Ok(id)
    }

    fn create_embedded(&mut self, doc: &mut Document) -> Result<ObjectId> {
        let font = self
            .embedded
            .as_ref()
            .ok_or_else(|| Error::FontUnavailable("no embedded font loaded".to_string()))?;

        let font_file_id = font.create_font_file(doc);
        let descriptor_id = font.create_font_descriptor(doc, font_file_id)?;
        let tables = DeferredTables {
            widths: doc.new_object_id(),
            to_unicode: doc.new_object_id(),
        };

        let cid_font = Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(font.name.as_bytes().to_vec())),
            ("CIDSystemInfo", Object::Dictionary(system_info("Identity"))),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("DW", Object::Integer(1000)),
            ("W", Object::Reference(tables.widths)),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
        ]);
        let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

        let type0 = Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(font.name.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
            ("ToUnicode", Object::Reference(tables.to_unicode)),
        ]);

        self.deferred = Some(tables);
        Ok(doc.add_object(Object::Dictionary(type0)))
    }

    /// Write the embedded font's width and ToUnicode tables.
    pub fn finish(&self, doc: &mut Document) {
        let (Some(font), Some(tables)) = (&self.embedded, self.deferred) else {
            return;
        };
        doc.objects
            .insert(tables.widths, Object::Array(font.build_widths_array()));
        doc.objects.insert(
            tables.to_unicode,
            Object::Stream(Stream::new(Dictionary::new(), font.build_to_unicode())),
        );
        debug!("Embedded {} glyphs of {}", font.used.len(), font.name);
    }
}

fn system_info(ordering: &str) -> Dictionary {
    Dictionary::from_iter([
        ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
        ("Ordering", Object::String(ordering.as_bytes().to_vec(), StringFormat::Literal)),
        ("Supplement", Object::Integer(0)),
    ])
}

/// Type0 font referencing a predefined CNS1 face without embedding it.
fn create_predefined(doc: &mut Document, face: TargetFace) -> ObjectId {
    let base_font = face.base_font();
    let (flags, bbox, stem_v) = match face {
        TargetFace::Serif => (6, [-160, -259, 1015, 888], 93),
        _ => (4, [-45, -250, 1015, 887], 93),
    };

    let descriptor = Dictionary::from_iter([
        ("Type", Object::Name(b"FontDescriptor".to_vec())),
        ("FontName", Object::Name(base_font.as_bytes().to_vec())),
        ("Flags", Object::Integer(flags)),
        ("FontBBox", Object::Array(bbox.iter().map(|v| Object::Integer(*v)).collect())),
        ("ItalicAngle", Object::Integer(0)),
        ("Ascent", Object::Integer(880)),
        ("Descent", Object::Integer(-120)),
        ("CapHeight", Object::Integer(880)),
        ("StemV", Object::Integer(stem_v)),
    ]);
    let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

    // CIDs 1-95 and 13648-13742 are the half-width Latin glyphs
    let widths = [1, 95, 500, 13648, 13742, 500].map(Object::Integer).to_vec();
    let cid_font = Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"CIDFontType0".to_vec())),
        ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
        ("CIDSystemInfo", Object::Dictionary(system_info("CNS1"))),
        ("FontDescriptor", Object::Reference(descriptor_id)),
        ("DW", Object::Integer(1000)),
        ("W", Object::Array(widths)),
    ]);
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let type0 = Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type0".to_vec())),
        ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
        ("Encoding", Object::Name(b"UniCNS-UCS2-H".to_vec())),
        ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
    ]);
    doc.add_object(Object::Dictionary(type0))
}
