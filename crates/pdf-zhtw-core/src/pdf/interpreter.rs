//! Content stream interpretation.
//!
//! Walks a page's operators tracking just enough graphics and text state to
//! locate every show-text operator: which font draws it, where it lands on
//! the page, in which colour, and what text it spells. The result is a list
//! of [`RunSpan`]s that point back into the operator list so the rewriter
//! can splice replacements in place.

use std::collections::HashMap;
use std::ops::Range;

use lopdf::Object;
use lopdf::content::Operation;

use super::source_font::{SourceFont, number};
use super::text::{BoundingBox, Matrix, RgbColor, TextRun};

/// TJ adjustments more negative than this read as a word gap
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// Text state parameters, saved and restored with the graphics state
#[derive(Debug, Clone)]
struct TextState {
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz / 100`
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
    render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: RgbColor,
    text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: RgbColor::BLACK,
            text: TextState::default(),
        }
    }
}

/// Line-starting operator that began a run (`'` or `"`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineStart {
    /// `'`: move to the next line
    NextLine,
    /// `"`: set word and character spacing, then move to the next line
    NextLineSpaced { word_spacing: f32, char_spacing: f32 },
}

/// One text run and everything needed to redraw it in place.
#[derive(Debug, Clone)]
pub struct RunSpan {
    /// Operator indices the run was drawn by
    pub ops: Range<usize>,
    pub run: TextRun,
    /// Resource name of the source font
    pub font_resource: Vec<u8>,
    /// `Tf` size operand
    pub font_size: f32,
    pub char_spacing: f32,
    pub horizontal_scaling: f32,
    pub render_mode: i64,
    /// Horizontal distance from the line matrix to the run start, text space
    pub line_offset: f32,
    /// Total horizontal advance of the run, text space
    pub advance: f32,
    pub line_start: Option<LineStart>,
    /// Text space to user space vertical scale
    pub scale: f32,
    /// Font ascent in em units
    pub ascent: f32,
    /// Font descent in em units (negative)
    pub descent: f32,
    pub serif: bool,
    /// Text could be recovered from the font
    pub decodable: bool,
}

impl RunSpan {
    /// Modes 3 (invisible) and 7 (clip only) paint nothing
    pub const fn is_visible(&self) -> bool {
        !matches!(self.render_mode, 3 | 7)
    }

    /// Whether this run can be redrawn with replacement text
    pub fn is_rewritable(&self) -> bool {
        self.decodable
            && self.is_visible()
            && self.font_size > 0.0
            && self.advance > 0.0
            && self.horizontal_scaling.abs() > f32::EPSILON
            && self.scale > f32::EPSILON
    }

    /// Height available to replacement text, text space
    pub fn box_height(&self) -> f32 {
        (self.ascent - self.descent) * self.font_size
    }
}

struct Interpreter<'f> {
    fonts: &'f HashMap<Vec<u8>, SourceFont>,
    placeholder: SourceFont,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    line_offset: f32,
    runs: Vec<RunSpan>,
    /// Index of the previous operator if it extended a run
    open_run_end: Option<usize>,
}

/// Locate every text run drawn by `operations`, in drawing order.
pub fn scan_runs(operations: &[Operation], fonts: &HashMap<Vec<u8>, SourceFont>) -> Vec<RunSpan> {
    let mut interpreter = Interpreter {
        fonts,
        placeholder: SourceFont::placeholder(),
        state: GraphicsState::default(),
        stack: Vec::new(),
        text_matrix: Matrix::IDENTITY,
        line_matrix: Matrix::IDENTITY,
        line_offset: 0.0,
        runs: Vec::new(),
        open_run_end: None,
    };
    for (index, op) in operations.iter().enumerate() {
        interpreter.step(index, op);
    }
    interpreter.runs
}

fn operand(op: &Operation, i: usize) -> f32 {
    number(op.operands.get(i)).unwrap_or(0.0)
}

fn operands(op: &Operation) -> Vec<f32> {
    op.operands.iter().filter_map(|o| number(Some(o))).collect()
}

impl Interpreter<'_> {
    fn step(&mut self, index: usize, op: &Operation) {
        let extends_run = matches!(op.operator.as_str(), "Tj" | "TJ");
        if !extends_run {
            self.open_run_end = None;
        }

        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                let v = operands(op);
                if v.len() == 6 {
                    let m = Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]);
                    self.state.ctm = m.concat(&self.state.ctm);
                }
            }
            "g" => self.state.fill = RgbColor::gray(operand(op, 0)),
            "rg" => self.state.fill = RgbColor::new(operand(op, 0), operand(op, 1), operand(op, 2)),
            "k" => {
                self.state.fill = RgbColor::from_cmyk(operand(op, 0), operand(op, 1), operand(op, 2), operand(op, 3));
            }
            "cs" => self.state.fill = RgbColor::BLACK,
            "sc" | "scn" => {
                let v = operands(op);
                match v.len() {
                    1 => self.state.fill = RgbColor::gray(v[0]),
                    3 => self.state.fill = RgbColor::new(v[0], v[1], v[2]),
                    4 => self.state.fill = RgbColor::from_cmyk(v[0], v[1], v[2], v[3]),
                    _ => {}
                }
            }
            "BT" => self.set_line_matrix(Matrix::IDENTITY),
            "Tf" => {
                self.state.text.font = match op.operands.first() {
                    Some(Object::Name(name)) => Some(name.clone()),
                    _ => None,
                };
                self.state.text.font_size = operand(op, 1);
            }
            "Tc" => self.state.text.char_spacing = operand(op, 0),
            "Tw" => self.state.text.word_spacing = operand(op, 0),
            "Tz" => self.state.text.horizontal_scaling = operand(op, 0) / 100.0,
            "TL" => self.state.text.leading = operand(op, 0),
            "Ts" => self.state.text.rise = operand(op, 0),
            "Tr" => {
                #[allow(clippy::cast_possible_truncation)]
                let mode = operand(op, 0) as i64;
                self.state.text.render_mode = mode;
            }
            "Tm" => {
                let v = operands(op);
                if v.len() == 6 {
                    self.set_line_matrix(Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]));
                }
            }
            "Td" => self.move_line(operand(op, 0), operand(op, 1)),
            "TD" => {
                self.state.text.leading = -operand(op, 1);
                self.move_line(operand(op, 0), operand(op, 1));
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(index, &[ShowItem::Text(bytes)], None);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let items: Vec<ShowItem<'_>> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(ShowItem::Text(bytes)),
                            other => number(Some(other)).map(ShowItem::Adjust),
                        })
                        .collect();
                    self.show(index, &items, None);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(index, &[ShowItem::Text(bytes)], Some(LineStart::NextLine));
                }
            }
            "\"" => {
                let word_spacing = operand(op, 0);
                let char_spacing = operand(op, 1);
                self.state.text.word_spacing = word_spacing;
                self.state.text.char_spacing = char_spacing;
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show(
                        index,
                        &[ShowItem::Text(bytes)],
                        Some(LineStart::NextLineSpaced {
                            word_spacing,
                            char_spacing,
                        }),
                    );
                }
            }
            _ => {}
        }
    }

    fn set_line_matrix(&mut self, m: Matrix) {
        self.line_matrix = m;
        self.text_matrix = m;
        self.line_offset = 0.0;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.set_line_matrix(Matrix::translation(tx, ty).concat(&self.line_matrix));
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.text.leading);
    }

    fn show(&mut self, index: usize, items: &[ShowItem<'_>], line_start: Option<LineStart>) {
        let text_state = self.state.text.clone();
        let font = text_state
            .font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .unwrap_or(&self.placeholder);
        let known_font = text_state.font.as_ref().is_some_and(|name| self.fonts.contains_key(name));

        let tfs = text_state.font_size;
        let th = text_state.horizontal_scaling;
        let mut text = String::new();
        let mut advance = 0.0_f32;
        for item in items {
            match item {
                ShowItem::Text(bytes) => {
                    for glyph in font.decode(bytes) {
                        text.push_str(&glyph.text);
                        let spacing = text_state.char_spacing
                            + if glyph.is_word_space { text_state.word_spacing } else { 0.0 };
                        advance += (glyph.width / 1000.0 * tfs + spacing) * th;
                    }
                }
                ShowItem::Adjust(amount) => {
                    if *amount < TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                    advance -= amount / 1000.0 * tfs * th;
                }
            }
        }

        let start_matrix = self.text_matrix;
        let start_offset = self.line_offset;
        self.text_matrix = Matrix::translation(advance, 0.0).concat(&self.text_matrix);
        self.line_offset += advance;

        let decodable = known_font && font.can_decode();
        let span = self.build_span(index, text, advance, start_matrix, start_offset, font, line_start, decodable);

        let continues = line_start.is_none() && index > 0 && self.open_run_end == Some(index - 1);
        match self.runs.last_mut() {
            Some(prev) if continues && same_style(prev, &span) => extend(prev, &span),
            _ => self.runs.push(span),
        }
        self.open_run_end = Some(index);
    }

    #[allow(clippy::too_many_arguments)]
    fn build_span(
        &self,
        index: usize,
        text: String,
        advance: f32,
        start_matrix: Matrix,
        line_offset: f32,
        font: &SourceFont,
        line_start: Option<LineStart>,
        decodable: bool,
    ) -> RunSpan {
        let ts = &self.state.text;
        let to_user = start_matrix.concat(&self.state.ctm);
        let low = font.descent * ts.font_size + ts.rise;
        let high = font.ascent * ts.font_size + ts.rise;
        let bbox = BoundingBox::enclosing(&[
            to_user.apply(0.0, low),
            to_user.apply(advance, low),
            to_user.apply(0.0, high),
            to_user.apply(advance, high),
        ]);
        let scale = to_user.vertical_scale();

        RunSpan {
            ops: index..index + 1,
            run: TextRun {
                text,
                bbox,
                font_name: font.base_font.clone(),
                font_size: ts.font_size * scale,
                color: self.state.fill,
                baseline_origin: to_user.apply(0.0, ts.rise),
            },
            font_resource: ts.font.clone().unwrap_or_default(),
            font_size: ts.font_size,
            char_spacing: ts.char_spacing,
            horizontal_scaling: ts.horizontal_scaling,
            render_mode: ts.render_mode,
            line_offset,
            advance,
            line_start,
            scale,
            ascent: font.ascent,
            descent: font.descent,
            serif: font.is_serif(),
            decodable,
        }
    }
}

enum ShowItem<'a> {
    Text(&'a [u8]),
    Adjust(f32),
}

fn same_style(a: &RunSpan, b: &RunSpan) -> bool {
    a.font_resource == b.font_resource
        && (a.font_size - b.font_size).abs() < f32::EPSILON
        && a.run.color.approx_eq(&b.run.color)
        && a.render_mode == b.render_mode
        && (a.char_spacing - b.char_spacing).abs() < f32::EPSILON
        && (a.horizontal_scaling - b.horizontal_scaling).abs() < f32::EPSILON
        && (a.scale - b.scale).abs() < 1e-4
        && a.decodable == b.decodable
}

fn extend(prev: &mut RunSpan, next: &RunSpan) {
    prev.ops.end = next.ops.end;
    prev.run.text.push_str(&next.run.text);
    prev.advance += next.advance;
    prev.run.bbox = BoundingBox::new(
        prev.run.bbox.x0.min(next.run.bbox.x0),
        prev.run.bbox.y0.min(next.run.bbox.y0),
        prev.run.bbox.x1.max(next.run.bbox.x1),
        prev.run.bbox.y1.max(next.run.bbox.y1),
    );
}
