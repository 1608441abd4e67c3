//! Per-page translate-and-repaint.
//!
//! Each translatable run's show-text operators are swapped, in place, for
//! operators that draw the translation with a Traditional Chinese font and
//! then put the text state back exactly as the original operators left it.
//! Everything else in the content stream, including drawing order, is kept.

use std::collections::HashMap;
use std::ops::Range;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::font::{TargetFace, TargetFonts};
use super::interpreter::{LineStart, RunSpan, scan_runs};
use super::layout::{FitBox, Fitted, fit_text};
use super::resources::{page_fonts, register_font};
use super::text::TextRun;
use crate::config::LayoutConfig;
use crate::error::{Error, Result};
use crate::gate::{RunOutcome, TranslationGate};
use crate::util::normalize_whitespace;

/// What happened on one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReport {
    /// Runs offered to the gate
    pub runs: usize,
    pub translated: usize,
    pub cached: usize,
    /// Empty or already in the target script
    pub skipped: usize,
    /// Left untranslated after a backend or rendering failure
    pub failed_soft: usize,
    pub warnings: Vec<String>,
}

/// Rewrites pages of one document.
///
/// Holds the document's replacement fonts, so one rewriter serves exactly
/// one document and [`PageRewriter::finish`] runs before saving it.
pub struct PageRewriter {
    fonts: TargetFonts,
    min_font_size: f32,
}

impl PageRewriter {
    pub fn new(layout: &LayoutConfig) -> Result<Self> {
        Ok(Self {
            fonts: TargetFonts::new(layout.font_path.as_deref())?,
            min_font_size: layout.min_font_size,
        })
    }

    /// Translate every run on a page and write the new content stream.
    ///
    /// Cancellation is checked before each run. A content stream that
    /// cannot be decoded fails with [`Error::ContentStream`] and leaves the
    /// page untouched.
    pub async fn rewrite_page(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        page_number: usize,
        gate: &TranslationGate<'_>,
        cancel: &CancellationToken,
    ) -> Result<PageReport> {
        let mut content = read_content(doc, page_id, page_number)?;
        let fonts = page_fonts(doc, page_id)?;
        let spans = scan_runs(&content.operations, &fonts);
        debug!("Page {}: {} text runs", page_number, spans.len());

        let mut report = PageReport::default();
        let mut replacements: Vec<(Range<usize>, Vec<Operation>)> = Vec::new();
        let mut resource_names: HashMap<TargetFace, String> = HashMap::new();

        for span in spans.iter().filter(|s| s.is_rewritable()) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            report.runs += 1;

            let result = gate.translate_run(&span.run.text).await;
            let outcome = if result.is_translation() && result.translated_text != span.run.text {
                match self.replacement(doc, page_id, span, &result.translated_text, &mut resource_names) {
                    Ok(ops) => {
                        replacements.push((span.ops.clone(), ops));
                        result.outcome
                    }
                    Err(e) => {
                        warn!("Page {}: keeping {:?}: {}", page_number, preview(&span.run), e);
                        RunOutcome::FailedSoft(e.to_string())
                    }
                }
            } else {
                result.outcome
            };

            match outcome {
                RunOutcome::NoOp | RunOutcome::Skipped => report.skipped += 1,
                RunOutcome::Cached => report.cached += 1,
                RunOutcome::Translated => report.translated += 1,
                RunOutcome::FailedSoft(reason) => {
                    report.failed_soft += 1;
                    report
                        .warnings
                        .push(format!("text {:?} left untranslated: {reason}", preview(&span.run)));
                }
            }
        }

        if replacements.is_empty() {
            return Ok(report);
        }

        // Back to front so earlier ranges keep their indices
        for (range, ops) in replacements.into_iter().rev() {
            let _removed: Vec<Operation> = content.operations.splice(range, ops).collect();
        }
        write_content(doc, page_id, page_number, &content)?;

        info!(
            "Page {}: {} translated, {} cached, {} skipped, {} failed",
            page_number, report.translated, report.cached, report.skipped, report.failed_soft
        );
        Ok(report)
    }

    /// Write document-level font data. Call once, after the last page.
    pub fn finish(&self, doc: &mut Document) {
        self.fonts.finish(doc);
    }

    /// Operators drawing `translated` in the slot of `span`.
    fn replacement(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        span: &RunSpan,
        translated: &str,
        resource_names: &mut HashMap<TargetFace, String>,
    ) -> Result<Vec<Operation>> {
        let text = normalize_whitespace(translated);
        let face = self.fonts.choose(&text, span.serif);

        let target = FitBox {
            width: span.advance,
            height: span.box_height(),
            max_size: span.font_size,
            min_size: self.min_font_size / span.scale,
            horizontal_scaling: span.horizontal_scaling,
        };
        let (fitted, ascent) = {
            let metrics = self.fonts.metrics(face);
            (fit_text(&text, &target, |c| metrics.advance(c)), metrics.ascent())
        };
        if fitted.overflow {
            debug!("{:?} overflows its box at the minimum size", preview(&span.run));
        }

        let lines = fitted
            .lines
            .iter()
            .map(|line| self.fonts.encode(face, line))
            .collect::<Result<Vec<_>>>()?;

        let name = match resource_names.get(&face) {
            Some(name) => name.clone(),
            None => {
                let font_id = self.fonts.font_object(doc, face)?;
                let name = register_font(doc, page_id, face.resource_name(), font_id)?;
                resource_names.insert(face, name.clone());
                name
            }
        };

        Ok(replacement_ops(span, &name, &fitted, ascent, lines))
    }
}

fn preview(run: &TextRun) -> String {
    run.text.chars().take(40).collect()
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

/// Build the operator sequence for one replacement.
///
/// On entry the text state is what the original operators saw. On exit the
/// line matrix, text matrix, font and character spacing match what they
/// would have been after the original operators, so the rest of the stream
/// renders unchanged.
fn replacement_ops(span: &RunSpan, font_name: &str, fitted: &Fitted, ascent: f32, lines: Vec<Vec<u8>>) -> Vec<Operation> {
    let mut ops = Vec::new();

    match span.line_start {
        Some(LineStart::NextLine) => ops.push(op("T*", vec![])),
        Some(LineStart::NextLineSpaced {
            word_spacing,
            char_spacing,
        }) => {
            ops.push(op("Tw", vec![real(word_spacing)]));
            ops.push(op("Tc", vec![real(char_spacing)]));
            ops.push(op("T*", vec![]));
        }
        None => {}
    }

    let has_char_spacing = span.char_spacing.abs() > f32::EPSILON;
    if has_char_spacing {
        ops.push(op("Tc", vec![real(0.0)]));
    }

    let size = fitted.size;
    let line_height = fitted.line_height();
    ops.push(op("Tf", vec![Object::Name(font_name.as_bytes().to_vec()), real(size)]));

    // Line matrix to the run start; multi-line text hangs from the box top
    let dx = span.line_offset;
    let dy = if lines.len() > 1 {
        span.ascent * span.font_size - ascent * size
    } else {
        0.0
    };
    if dx.abs() > f32::EPSILON || dy.abs() > f32::EPSILON {
        ops.push(op("Td", vec![real(dx), real(dy)]));
    }

    let line_count = lines.len();
    for (i, bytes) in lines.into_iter().enumerate() {
        if i > 0 {
            ops.push(op("Td", vec![real(0.0), real(-line_height)]));
        }
        ops.push(op("Tj", vec![Object::String(bytes, StringFormat::Hexadecimal)]));
    }

    // Back to the original line matrix; also resets the text matrix
    #[allow(clippy::cast_precision_loss)]
    let back_y = -dy + line_count.saturating_sub(1) as f32 * line_height;
    ops.push(op("Td", vec![real(-dx), real(back_y)]));

    // Text matrix to where the original run ended
    let shift = dx + span.advance;
    if shift.abs() > f32::EPSILON {
        let adjust = -shift * 1000.0 / (size * span.horizontal_scaling);
        ops.push(op("TJ", vec![Object::Array(vec![real(adjust)])]));
    }

    ops.push(op(
        "Tf",
        vec![Object::Name(span.font_resource.clone()), real(span.font_size)],
    ));
    if has_char_spacing {
        ops.push(op("Tc", vec![real(span.char_spacing)]));
    }

    ops
}

fn read_content(doc: &Document, page_id: ObjectId, page_number: usize) -> Result<Content> {
    let bytes = doc.get_page_content(page_id).map_err(|e| Error::ContentStream {
        page: page_number,
        reason: e.to_string(),
    })?;
    Content::decode(&bytes).map_err(|e| Error::ContentStream {
        page: page_number,
        reason: e.to_string(),
    })
}

/// Replace the page's content with a single new stream.
fn write_content(doc: &mut Document, page_id: ObjectId, page_number: usize, content: &Content) -> Result<()> {
    let bytes = content.encode().map_err(|e| Error::ContentStream {
        page: page_number,
        reason: e.to_string(),
    })?;
    let stream = Stream::new(Dictionary::new(), bytes).with_compression(true);
    let content_id = doc.add_object(Object::Stream(stream));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::DocumentCorrupt(format!("failed to get page: {e}")))?;
    if let Object::Dictionary(dict) = page {
        dict.set("Contents", Object::Reference(content_id));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::source_font::{SourceFont, number};
    use lopdf::dictionary;

    fn helvetica_fonts() -> HashMap<Vec<u8>, SourceFont> {
        let doc = Document::with_version("1.5");
        let dict: Dictionary = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };
        HashMap::from([(b"F1".to_vec(), SourceFont::load(&doc, &dict))])
    }

    /// Track where the text matrix ends up after running `ops`
    fn final_x(ops: &[Operation], fonts: &HashMap<Vec<u8>, SourceFont>) -> f32 {
        let mut trailing = ops.to_vec();
        trailing.push(op("Tf", vec![Object::Name(b"F1".to_vec()), real(10.0)]));
        trailing.push(op("Tj", vec![Object::string_literal("X")]));
        let runs = scan_runs(&trailing, fonts);
        runs.last().unwrap().run.baseline_origin.x
    }

    #[test]
    fn test_replacement_restores_text_position() {
        let fonts = helvetica_fonts();
        let original = Content::decode(b"BT /F1 12 Tf 100 700 Td (Hi) Tj (Hello) Tj ET").unwrap();
        let spans = scan_runs(&original.operations, &fonts);
        let span = spans.first().unwrap();
        assert_eq!(span.run.text, "HiHello");

        let fitted = Fitted {
            size: 12.0,
            lines: vec!["你好".to_string()],
            overflow: false,
        };
        let replacement = replacement_ops(span, "FZhSans", &fitted, 0.88, vec![vec![0x4F, 0x60, 0x59, 0x7D]]);

        let mut rewritten = original.operations[..3].to_vec();
        rewritten.extend(replacement);
        let expected = final_x(&original.operations[..5], &fonts);
        let actual = final_x(&rewritten, &fonts);
        assert!((expected - actual).abs() < 1e-3, "{expected} != {actual}");
    }

    #[test]
    fn test_replacement_mid_line_moves_to_run_start() {
        let fonts = helvetica_fonts();
        let original = Content::decode(b"BT /F1 10 Tf 50 50 Td (A) Tj 0 g (Bonjour) Tj ET").unwrap();
        let spans = scan_runs(&original.operations, &fonts);
        let span = &spans[1];
        let fitted = Fitted {
            size: 10.0,
            lines: vec!["你好".to_string()],
            overflow: false,
        };
        let ops = replacement_ops(span, "FZhSans", &fitted, 0.88, vec![vec![0x4F, 0x60, 0x59, 0x7D]]);
        let td = ops.iter().find(|o| o.operator == "Td").unwrap();
        assert_eq!(number(td.operands.first()), Some(span.line_offset));
        assert!(ops.iter().any(|o| o.operator == "TJ"));
        assert_eq!(ops.last().unwrap().operator, "Tf");
    }

    #[test]
    fn test_multi_line_returns_to_line_matrix() {
        let fonts = helvetica_fonts();
        let original = Content::decode(b"BT /F1 20 Tf 10 10 Td (Hello) Tj ET").unwrap();
        let span = &scan_runs(&original.operations, &fonts)[0];
        let fitted = Fitted {
            size: 8.0,
            lines: vec!["你".to_string(), "好".to_string()],
            overflow: false,
        };
        let ops = replacement_ops(span, "FZhSans", &fitted, 0.88, vec![vec![0x4F, 0x60], vec![0x59, 0x7D]]);

        // The Td moves must sum to zero
        let (sum_x, sum_y) = ops
            .iter()
            .filter(|o| o.operator == "Td")
            .fold((0.0_f32, 0.0_f32), |(x, y), o| {
                let v: Vec<f32> = o.operands.iter().map(|n| number(Some(n)).unwrap()).collect();
                (x + v[0], y + v[1])
            });
        assert!(sum_x.abs() < 1e-4 && sum_y.abs() < 1e-4);
        assert_eq!(ops.iter().filter(|o| o.operator == "Tj").count(), 2);
    }
}
