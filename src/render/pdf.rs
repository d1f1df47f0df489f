//! PDF output
//!
//! `PdfPageBackend` implements the plotters `DrawingBackend` on top of one printpdf
//! layer. One backend pixel is one PDF point, and the page background is white, so
//! translucent plotters colours are blended against white instead of using PDF
//! transparency groups.

use super::draw_page;
use crate::report::PageSummary;
use anyhow::{Context, Result};
use plotters::prelude::IntoDrawingArea;
use plotters_backend::text_anchor::{HPos, Pos, VPos};
use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
    FontStyle, FontTransform,
};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Polygon, Pt, Rgb, TextMatrix,
};
use std::convert::Infallible;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

const MM_PER_PT: f32 = 25.4 / 72.0;

/// Segments used to approximate a circle
const CIRCLE_SEGMENTS: usize = 48;

fn mm(pt: f32) -> Mm {
    Mm(pt * MM_PER_PT)
}

/// Regular and bold Helvetica
#[derive(Debug, Clone)]
struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Blend a translucent colour against the white page
fn blend(color: BackendColor) -> (f32, f32, f32) {
    let alpha = color.alpha.clamp(0.0, 1.0) as f32;
    let channel = |c: u8| (c as f32 / 255.0) * alpha + (1.0 - alpha);
    let (r, g, b) = color.rgb;
    (channel(r), channel(g), channel(b))
}

fn pdf_color(color: BackendColor) -> Color {
    let (r, g, b) = blend(color);
    Color::Rgb(Rgb::new(r, g, b, None))
}

/// Approximate Helvetica advance width in em for one character
fn char_width(c: char, bold: bool) -> f64 {
    let width = match c {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.28,
        'f' | 't' | 'r' | 'I' | ' ' | '(' | ')' | '[' | ']' | '-' => 0.33,
        'm' | 'w' | 'M' | 'W' => 0.85,
        c if c.is_ascii_uppercase() => 0.68,
        c if c.is_ascii_digit() => 0.556,
        _ => 0.53,
    };
    if bold {
        width * 1.06
    } else {
        width
    }
}

fn text_width(text: &str, size: f64, bold: bool) -> f64 {
    text.chars().map(|c| char_width(c, bold)).sum::<f64>() * size
}

/// Baseline origin (backend coordinates) and counter-clockwise rotation in degrees
/// for a text of `width` anchored at `pos`
fn place_text(
    pos: BackendCoord,
    width: f64,
    size: f64,
    anchor: Pos,
    transform: FontTransform,
) -> ((f64, f64), f32) {
    // Reading direction and the glyph "down" direction in backend coordinates
    let (dir, down, angle) = match transform {
        FontTransform::None => ((1.0, 0.0), (0.0, 1.0), 0.0),
        FontTransform::Rotate90 => ((0.0, 1.0), (-1.0, 0.0), -90.0),
        FontTransform::Rotate180 => ((-1.0, 0.0), (0.0, -1.0), 180.0),
        FontTransform::Rotate270 => ((0.0, -1.0), (1.0, 0.0), 90.0),
    };

    let along = match anchor.h_pos {
        HPos::Left => 0.0,
        HPos::Center => width / 2.0,
        HPos::Right => width,
    };
    let across = match anchor.v_pos {
        VPos::Top => 0.78 * size,
        VPos::Center => 0.36 * size,
        VPos::Bottom => -0.21 * size,
    };

    let x = pos.0 as f64 - dir.0 * along + down.0 * across;
    let y = pos.1 as f64 - dir.1 * along + down.1 * across;
    ((x, y), angle)
}

/// Plotters backend drawing onto one PDF page
pub struct PdfPageBackend {
    layer: PdfLayerReference,
    fonts: Fonts,
    size: (u32, u32),
}

impl PdfPageBackend {
    fn new(layer: PdfLayerReference, fonts: Fonts, size: (u32, u32)) -> Self {
        Self { layer, fonts, size }
    }

    fn point(&self, (x, y): BackendCoord) -> (Point, bool) {
        (
            Point::new(mm(x as f32), mm(self.size.1 as f32 - y as f32)),
            false,
        )
    }

    fn stroke(&self, points: &[BackendCoord], closed: bool, color: BackendColor, width: u32) {
        if color.alpha <= 0.0 || points.len() < 2 {
            return;
        }
        self.layer.set_outline_color(pdf_color(color));
        self.layer.set_outline_thickness(width.max(1) as f32);
        self.layer.add_line(Line {
            points: points.iter().map(|p| self.point(*p)).collect(),
            is_closed: closed,
        });
    }

    fn fill(&self, points: &[BackendCoord], color: BackendColor) {
        if color.alpha <= 0.0 || points.len() < 3 {
            return;
        }
        self.layer.set_fill_color(pdf_color(color));
        self.layer.add_polygon(Polygon {
            rings: vec![points.iter().map(|p| self.point(*p)).collect()],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }
}

impl DrawingBackend for PdfPageBackend {
    type ErrorType = Infallible;

    fn get_size(&self) -> (u32, u32) {
        self.size
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn draw_pixel(
        &mut self,
        (x, y): BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        self.fill(&[(x, y), (x + 1, y), (x + 1, y + 1), (x, y + 1)], color);
        Ok(())
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        self.stroke(&[from, to], false, style.color(), style.stroke_width());
        Ok(())
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        (x0, y0): BackendCoord,
        (x1, y1): BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
        if fill {
            self.fill(&corners, style.color());
        } else {
            self.stroke(&corners, true, style.color(), style.stroke_width());
        }
        Ok(())
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let points: Vec<BackendCoord> = path.into_iter().collect();
        self.stroke(&points, false, style.color(), style.stroke_width());
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        (cx, cy): BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let r = radius as f64;
        let points: Vec<BackendCoord> = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / CIRCLE_SEGMENTS as f64;
                (cx + (r * a.cos()).round() as i32, cy + (r * a.sin()).round() as i32)
            })
            .collect();
        if fill {
            self.fill(&points, style.color());
        } else {
            self.stroke(&points, true, style.color(), style.stroke_width());
        }
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let points: Vec<BackendCoord> = vert.into_iter().collect();
        self.fill(&points, style.color());
        Ok(())
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Infallible>> {
        let color = style.color();
        if text.is_empty() || color.alpha <= 0.0 {
            return Ok(());
        }

        let size = style.size();
        let bold = matches!(style.style(), FontStyle::Bold);
        let width = text_width(text, size, bold);
        let ((x, y), angle) = place_text(pos, width, size, style.anchor(), style.transform());
        let font = if bold {
            &self.fonts.bold
        } else {
            &self.fonts.regular
        };

        self.layer.begin_text_section();
        self.layer.set_font(font, size as f32);
        self.layer.set_fill_color(pdf_color(color));
        self.layer.set_text_matrix(TextMatrix::TranslateRotate(
            Pt(x as f32),
            Pt(self.size.1 as f32 - y as f32),
            angle,
        ));
        self.layer.write_text(text, font);
        self.layer.end_text_section();

        Ok(())
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Infallible>> {
        let size = style.size();
        let bold = matches!(style.style(), FontStyle::Bold);
        Ok((
            text_width(text, size, bold).ceil() as u32,
            size.ceil() as u32,
        ))
    }
}

/// Multi-page PDF report
pub struct PdfReport {
    doc: PdfDocumentReference,
    fonts: Fonts,
    size: (u32, u32),
    /// Page created together with the document, used by the first `add_page`
    initial: Option<(PdfPageIndex, PdfLayerIndex)>,
    pages: usize,
}

impl PdfReport {
    /// Create an empty report with pages of `size` points
    pub fn new(title: &str, size: (u32, u32)) -> Result<Self> {
        let (width, height) = (mm(size.0 as f32), mm(size.1 as f32));
        let (doc, page, layer) = PdfDocument::new(title, width, height, "Charts");

        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow::anyhow!("Failed to add Helvetica font: {:?}", e))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow::anyhow!("Failed to add Helvetica-Bold font: {:?}", e))?;

        Ok(Self {
            doc,
            fonts: Fonts { regular, bold },
            size,
            initial: Some((page, layer)),
            pages: 0,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Draw `page` onto a new PDF page
    pub fn add_page(&mut self, page: &PageSummary) -> Result<()> {
        let (page_index, layer_index) = match self.initial.take() {
            Some(indices) => indices,
            None => self.doc.add_page(
                mm(self.size.0 as f32),
                mm(self.size.1 as f32),
                "Charts",
            ),
        };
        let layer = self.doc.get_page(page_index).get_layer(layer_index);

        let root = PdfPageBackend::new(layer, self.fonts.clone(), self.size).into_drawing_area();
        draw_page(&root, page).with_context(|| format!("Failed to draw page: {}", page.headline))?;
        root.present()?;

        self.pages += 1;
        debug!(page = self.pages, headline = %page.headline, "Added PDF page");
        Ok(())
    }

    /// Serialise the document
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| anyhow::anyhow!("Failed to serialise PDF: {:?}", e))
    }

    /// Write the document to `path`
    pub fn save(self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;

        let pages = self.pages;
        self.doc
            .save(&mut BufWriter::new(file))
            .map_err(|e| anyhow::anyhow!("Failed to write PDF {}: {:?}", path.display(), e))?;

        info!(path = %path.display(), pages = pages, "Wrote PDF report");
        Ok(())
    }
}
