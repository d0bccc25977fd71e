//! Card compositing: gradient panel, headline and labels over the generated image.

use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use tracing::{debug, warn};

use crate::models::CardRequest;
use crate::{Error, Result};

pub const JPEG_QUALITY: u8 = 92;

/// Probed in order after any configured paths.
pub const DEFAULT_FONT_PATHS: &[&str] = &[
    "/opt/fonts/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
];

const PANEL_COLOR: [u8; 3] = [13, 16, 35];
const PANEL_MAX_ALPHA: f32 = 220.0;
const PANEL_FRACTION: f32 = 0.4;
const CORNER_INSET: i32 = 40;

const HEADLINE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 240]);
const DATE_COLOR: Rgba<u8> = Rgba([255, 223, 186, 235]);
const LOCATION_COLOR: Rgba<u8> = Rgba([255, 200, 137, 235]);
const CORNER_COLOR: Rgba<u8> = Rgba([255, 255, 255, 230]);

/// Font used for the overlay text.
pub enum FontFace {
    TrueType(Box<Font<'static>>),
    /// Built-in 5x7 face; covers printable ASCII only.
    Bitmap,
}

impl FontFace {
    /// First loadable font among `paths`, or the built-in face.
    pub fn probe(paths: &[PathBuf]) -> Self {
        for path in paths {
            if let Some(font) = load_truetype(path) {
                debug!(path = %path.display(), "font.loaded");
                return FontFace::TrueType(Box::new(font));
            }
        }
        warn!("No font file found, using built-in bitmap font");
        FontFace::Bitmap
    }

    /// Line height for text set at `px`.
    fn line_height(&self, px: f32) -> f32 {
        match self {
            FontFace::TrueType(font) => {
                let vm = font.v_metrics(Scale::uniform(px));
                vm.ascent - vm.descent
            }
            FontFace::Bitmap => (bitmap_scale(px) * BITMAP_ROWS) as f32,
        }
    }

    fn text_width(&self, px: f32, text: &str) -> f32 {
        match self {
            FontFace::TrueType(font) => {
                let scale = Scale::uniform(px);
                font.layout(text, scale, point(0.0, 0.0))
                    .last()
                    .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                    .unwrap_or(0.0)
            }
            FontFace::Bitmap => {
                let count = text.chars().count() as i32;
                (count * BITMAP_ADVANCE * bitmap_scale(px)) as f32
            }
        }
    }

    /// Draw `text` with its top-left corner at (`x`, `top`).
    fn draw(&self, img: &mut RgbaImage, px: f32, x: f32, top: f32, color: Rgba<u8>, text: &str) {
        match self {
            FontFace::TrueType(font) => draw_truetype(img, font, px, x, top, color, text),
            FontFace::Bitmap => draw_bitmap(img, px, x.round() as i32, top.round() as i32, color, text),
        }
    }
}

fn load_truetype(path: &Path) -> Option<Font<'static>> {
    let bytes = std::fs::read(path).ok()?;
    match Font::try_from_vec_and_index(bytes, 0) {
        Some(font) => Some(font),
        None => {
            warn!(path = %path.display(), "font.unreadable");
            None
        }
    }
}

/// Renders finished cards.
pub struct CardRenderer {
    font: FontFace,
}

impl CardRenderer {
    /// Probe `extra_paths` first, then [`DEFAULT_FONT_PATHS`].
    pub fn new(extra_paths: &[PathBuf]) -> Self {
        let paths: Vec<PathBuf> = extra_paths
            .iter()
            .cloned()
            .chain(DEFAULT_FONT_PATHS.iter().map(PathBuf::from))
            .collect();
        Self::with_font(FontFace::probe(&paths))
    }

    pub fn with_font(font: FontFace) -> Self {
        Self { font }
    }

    /// Composite the overlay onto `image_bytes` and encode as JPEG.
    pub fn render(&self, image_bytes: &[u8], card: &CardRequest) -> Result<Vec<u8>> {
        let mut canvas = image::load_from_memory(image_bytes)?.to_rgba8();
        let (width, height) = canvas.dimensions();
        let (w, h) = (width as f32, height as f32);

        let panel_height = (h * PANEL_FRACTION) as u32;
        draw_panel(&mut canvas, panel_height);

        let multiplier = card.text_size.multiplier();
        let large = (w * 0.08 * multiplier).floor().max(1.0);
        let medium = (w * 0.045 * multiplier).floor().max(1.0);
        let small = (w * 0.035 * multiplier).floor().max(1.0);
        let padding = (w * 0.06).floor();

        let panel_top = h - panel_height as f32;
        let headline = format!("Sunset Score {}", card.score);
        self.font.draw(&mut canvas, large, padding, panel_top + padding, HEADLINE_COLOR, &headline);

        let date_line = format!("{} | 日の入り {}", card.date, card.sunset_time);
        self.font
            .draw(&mut canvas, medium, padding, panel_top + padding + large + 12.0, DATE_COLOR, &date_line);

        let location_line = format!("{} — {}", card.location, card.conditions);
        let location_top = h - padding * 0.4 - self.font.line_height(small);
        self.font.draw(&mut canvas, small, padding, location_top, LOCATION_COLOR, &location_line);

        let corner = format!("Sunset {} JST", card.sunset_time);
        let corner_right = (width as i32 - CORNER_INSET).max(0) as f32;
        let corner_bottom = (height as i32 - CORNER_INSET).max(0) as f32;
        let corner_left = corner_right - self.font.text_width(small, &corner);
        let corner_top = corner_bottom - self.font.line_height(small);
        self.font.draw(&mut canvas, small, corner_left, corner_top, CORNER_COLOR, &corner);

        encode_jpeg(canvas)
    }
}

/// Darken the bottom `panel_height` rows. Alpha grows with distance from the
/// bottom edge, peaking where the panel meets the image.
fn draw_panel(img: &mut RgbaImage, panel_height: u32) {
    let height = img.height();
    for step in 0..panel_height {
        // Row `height` (step 0) lies just past the image and is skipped.
        let Some(row) = height.checked_sub(step).filter(|row| *row < height) else {
            continue;
        };
        let alpha = (PANEL_MAX_ALPHA * step as f32 / panel_height as f32) as u8;
        let color = Rgba([PANEL_COLOR[0], PANEL_COLOR[1], PANEL_COLOR[2], alpha]);
        for x in 0..img.width() {
            blend(img, x as i32, row as i32, color, 1.0);
        }
    }
}

/// Alpha-blend `color` at coverage `coverage` over an opaque pixel.
fn blend(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0) * color.0[3] as f32 / 255.0;
    if alpha <= 0.0 {
        return;
    }
    let dst = img.get_pixel_mut(x as u32, y as u32);
    let inv = 1.0 - alpha;
    for c in 0..3 {
        dst.0[c] = (color.0[c] as f32 * alpha + dst.0[c] as f32 * inv).round() as u8;
    }
    dst.0[3] = 255;
}

fn draw_truetype(img: &mut RgbaImage, font: &Font<'static>, px: f32, x: f32, top: f32, color: Rgba<u8>, text: &str) {
    let scale = Scale::uniform(px);
    let ascent = font.v_metrics(scale).ascent;

    for glyph in font.layout(text, scale, point(x, top + ascent)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                blend(img, gx as i32 + bb.min.x, gy as i32 + bb.min.y, color, v);
            });
        }
    }
}

/// Baseline JPEG with optimized Huffman tables.
fn encode_jpeg(canvas: RgbaImage) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let width = u16::try_from(rgb.width())
        .map_err(|_| Error::Internal(format!("Card too wide to encode: {}px", rgb.width())))?;
    let height = u16::try_from(rgb.height())
        .map_err(|_| Error::Internal(format!("Card too tall to encode: {}px", rgb.height())))?;

    let mut buffer = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut buffer, JPEG_QUALITY);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| Error::Internal(format!("JPEG encoding failed: {}", e)))?;
    Ok(buffer)
}

const BITMAP_ROWS: i32 = 8;
const BITMAP_ADVANCE: i32 = 6;

fn bitmap_scale(px: f32) -> i32 {
    ((px / BITMAP_ROWS as f32).round() as i32).max(1)
}

fn draw_bitmap(img: &mut RgbaImage, px: f32, x: i32, top: i32, color: Rgba<u8>, text: &str) {
    let scale = bitmap_scale(px);
    let mut caret = x;

    for ch in text.chars() {
        if let Some(columns) = bitmap_glyph(ch) {
            for (col, bits) in columns.iter().enumerate() {
                for row in 0..BITMAP_ROWS {
                    if bits & (1 << row) == 0 {
                        continue;
                    }
                    let ox = caret + col as i32 * scale;
                    let oy = top + row * scale;
                    for dy in 0..scale {
                        for dx in 0..scale {
                            blend(img, ox + dx, oy + dy, color, 1.0);
                        }
                    }
                }
            }
        }
        caret += BITMAP_ADVANCE * scale;
    }
}

/// Column-major 5x8 glyphs for printable ASCII, least significant bit on top.
fn bitmap_glyph(ch: char) -> Option<&'static [u8; 5]> {
    let code = ch as u32;
    if (0x20..0x7f).contains(&code) {
        Some(&BITMAP_GLYPHS[(code - 0x20) as usize])
    } else {
        None
    }
}

#[rustfmt::skip]
const BITMAP_GLYPHS: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], [0x00, 0x00, 0x5F, 0x00, 0x00], [0x00, 0x07, 0x00, 0x07, 0x00],
    [0x14, 0x7F, 0x14, 0x7F, 0x14], [0x24, 0x2A, 0x7F, 0x2A, 0x12], [0x23, 0x13, 0x08, 0x64, 0x62],
    [0x36, 0x49, 0x56, 0x20, 0x50], [0x00, 0x08, 0x07, 0x03, 0x00], [0x00, 0x1C, 0x22, 0x41, 0x00],
    [0x00, 0x41, 0x22, 0x1C, 0x00], [0x2A, 0x1C, 0x7F, 0x1C, 0x2A], [0x08, 0x08, 0x3E, 0x08, 0x08],
    [0x00, 0x80, 0x70, 0x30, 0x00], [0x08, 0x08, 0x08, 0x08, 0x08], [0x00, 0x00, 0x60, 0x60, 0x00],
    [0x20, 0x10, 0x08, 0x04, 0x02], [0x3E, 0x51, 0x49, 0x45, 0x3E], [0x00, 0x42, 0x7F, 0x40, 0x00],
    [0x72, 0x49, 0x49, 0x49, 0x46], [0x21, 0x41, 0x49, 0x4D, 0x33], [0x18, 0x14, 0x12, 0x7F, 0x10],
    [0x27, 0x45, 0x45, 0x45, 0x39], [0x3C, 0x4A, 0x49, 0x49, 0x31], [0x41, 0x21, 0x11, 0x09, 0x07],
    [0x36, 0x49, 0x49, 0x49, 0x36], [0x46, 0x49, 0x49, 0x29, 0x1E], [0x00, 0x00, 0x14, 0x00, 0x00],
    [0x00, 0x40, 0x34, 0x00, 0x00], [0x00, 0x08, 0x14, 0x22, 0x41], [0x14, 0x14, 0x14, 0x14, 0x14],
    [0x00, 0x41, 0x22, 0x14, 0x08], [0x02, 0x01, 0x59, 0x09, 0x06], [0x3E, 0x41, 0x5D, 0x59, 0x4E],
    [0x7C, 0x12, 0x11, 0x12, 0x7C], [0x7F, 0x49, 0x49, 0x49, 0x36], [0x3E, 0x41, 0x41, 0x41, 0x22],
    [0x7F, 0x41, 0x41, 0x41, 0x3E], [0x7F, 0x49, 0x49, 0x49, 0x41], [0x7F, 0x09, 0x09, 0x09, 0x01],
    [0x3E, 0x41, 0x41, 0x51, 0x73], [0x7F, 0x08, 0x08, 0x08, 0x7F], [0x00, 0x41, 0x7F, 0x41, 0x00],
    [0x20, 0x40, 0x41, 0x3F, 0x01], [0x7F, 0x08, 0x14, 0x22, 0x41], [0x7F, 0x40, 0x40, 0x40, 0x40],
    [0x7F, 0x02, 0x1C, 0x02, 0x7F], [0x7F, 0x04, 0x08, 0x10, 0x7F], [0x3E, 0x41, 0x41, 0x41, 0x3E],
    [0x7F, 0x09, 0x09, 0x09, 0x06], [0x3E, 0x41, 0x51, 0x21, 0x5E], [0x7F, 0x09, 0x19, 0x29, 0x46],
    [0x26, 0x49, 0x49, 0x49, 0x32], [0x03, 0x01, 0x7F, 0x01, 0x03], [0x3F, 0x40, 0x40, 0x40, 0x3F],
    [0x1F, 0x20, 0x40, 0x20, 0x1F], [0x3F, 0x40, 0x38, 0x40, 0x3F], [0x63, 0x14, 0x08, 0x14, 0x63],
    [0x03, 0x04, 0x78, 0x04, 0x03], [0x61, 0x59, 0x49, 0x4D, 0x43], [0x00, 0x7F, 0x41, 0x41, 0x41],
    [0x02, 0x04, 0x08, 0x10, 0x20], [0x00, 0x41, 0x41, 0x41, 0x7F], [0x04, 0x02, 0x01, 0x02, 0x04],
    [0x40, 0x40, 0x40, 0x40, 0x40], [0x00, 0x03, 0x07, 0x08, 0x00], [0x20, 0x54, 0x54, 0x78, 0x40],
    [0x7F, 0x28, 0x44, 0x44, 0x38], [0x38, 0x44, 0x44, 0x44, 0x28], [0x38, 0x44, 0x44, 0x28, 0x7F],
    [0x38, 0x54, 0x54, 0x54, 0x18], [0x00, 0x08, 0x7E, 0x09, 0x02], [0x18, 0xA4, 0xA4, 0x9C, 0x78],
    [0x7F, 0x08, 0x04, 0x04, 0x78], [0x00, 0x44, 0x7D, 0x40, 0x00], [0x20, 0x40, 0x40, 0x3D, 0x00],
    [0x7F, 0x10, 0x28, 0x44, 0x00], [0x00, 0x41, 0x7F, 0x40, 0x00], [0x7C, 0x04, 0x78, 0x04, 0x78],
    [0x7C, 0x08, 0x04, 0x04, 0x78], [0x38, 0x44, 0x44, 0x44, 0x38], [0xFC, 0x18, 0x24, 0x24, 0x18],
    [0x18, 0x24, 0x24, 0x18, 0xFC], [0x7C, 0x08, 0x04, 0x04, 0x08], [0x48, 0x54, 0x54, 0x54, 0x24],
    [0x04, 0x04, 0x3F, 0x44, 0x24], [0x3C, 0x40, 0x40, 0x20, 0x7C], [0x1C, 0x20, 0x40, 0x20, 0x1C],
    [0x3C, 0x40, 0x30, 0x40, 0x3C], [0x44, 0x28, 0x10, 0x28, 0x44], [0x4C, 0x90, 0x90, 0x90, 0x7C],
    [0x44, 0x64, 0x54, 0x4C, 0x44], [0x00, 0x08, 0x36, 0x41, 0x00], [0x00, 0x00, 0x77, 0x00, 0x00],
    [0x00, 0x41, 0x36, 0x08, 0x00], [0x02, 0x01, 0x02, 0x04, 0x02],
];
