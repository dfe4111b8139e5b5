//! Frame rendering for the dial display
//!
//! A frame is a square PNG showing:
//! - a pill-shaped track, centered
//! - a green → yellow → red fill proportional to the value
//! - a faint outline and a bold percentage label above the track
//! - a red "X" across the track when muted
//!
//! The frame is composed as SVG and rasterized with resvg. Every proportion is a
//! fixed fraction of the requested size, so the layout scales to any display.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{fontdb, Options, Tree};

const BACKGROUND: &str = "#0b0b0b";
const TRACK_COLOR: &str = "#2e2e2e";
const LABEL_COLOR: &str = "#ffffff";
const MUTE_COLOR: &str = "#dc3232";
const MUTE_OPACITY: f64 = 0.98;
const OUTLINE_OPACITY: f64 = 0.06;
/// (offset, color) stops, defined over the full track width
const GRADIENT_STOPS: [(f64, &str); 3] = [(0.0, "#4caf50"), (0.6, "#ffeb3b"), (1.0, "#f44336")];

const TRACK_PADDING: f64 = 0.12;
const TRACK_HEIGHT: f64 = 0.12;
const OUTLINE_WIDTH: f64 = 0.006;
const FONT_SIZE: f64 = 0.14;
const LABEL_GAP: f64 = 0.04;
const MUTE_STROKE_WIDTH: f64 = 0.03;
/// The cross stays legible on small keys
const MIN_MUTE_STROKE_PX: f64 = 6.0;
/// Fraction of track height the mute cross is inset from the track edges
const MUTE_INSET: f64 = 0.4;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Invalid render size {0}")]
    InvalidSize(u32),

    #[error("Failed to build frame SVG: {0}")]
    Svg(#[from] resvg::usvg::Error),

    #[error("Failed to allocate {0}x{0} pixmap")]
    Allocation(u32),

    #[error("Failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// Pixel geometry of a frame, derived from its size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    pub size: u32,
    pub track_x: f64,
    pub track_y: f64,
    pub track_width: f64,
    pub track_height: f64,
    pub corner_radius: f64,
    pub outline_width: f64,
    pub font_size: f64,
    /// Baseline of the percentage label
    pub label_y: f64,
    pub mute_stroke_width: f64,
    pub mute_inset: f64,
}

impl FrameLayout {
    pub fn for_size(size: u32) -> Self {
        let s = f64::from(size);
        let track_width = (s * (1.0 - 2.0 * TRACK_PADDING)).round();
        let track_height = (s * TRACK_HEIGHT).round();
        let track_x = ((s - track_width) / 2.0).round();
        let track_y = (s * 0.5 - track_height / 2.0).round();

        Self {
            size,
            track_x,
            track_y,
            track_width,
            track_height,
            corner_radius: track_height / 2.0,
            outline_width: (s * OUTLINE_WIDTH).round().max(1.0),
            font_size: (s * FONT_SIZE).round(),
            label_y: track_y - (s * LABEL_GAP).round(),
            mute_stroke_width: (s * MUTE_STROKE_WIDTH).round().max(MIN_MUTE_STROKE_PX),
            mute_inset: (track_height * MUTE_INSET).round(),
        }
    }

    /// Width of the filled portion for `value` percent
    pub fn fill_width(&self, value: u8) -> f64 {
        (f64::from(value.min(100)) / 100.0 * self.track_width).round()
    }
}

/// Compose the SVG document for one frame
pub fn frame_svg(value: u8, muted: bool, layout: &FrameLayout) -> String {
    let FrameLayout {
        size,
        track_x: x,
        track_y: y,
        track_width: w,
        track_height: h,
        corner_radius: r,
        ..
    } = *layout;

    let mut svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"##
    );

    svg.push_str(&format!(
        r##"<defs><linearGradient id="fill" gradientUnits="userSpaceOnUse" x1="{}" y1="{}" x2="{}" y2="{}">"##,
        x,
        y,
        x + w,
        y
    ));
    for (offset, color) in GRADIENT_STOPS {
        svg.push_str(&format!(r##"<stop offset="{offset}" stop-color="{color}"/>"##));
    }
    svg.push_str("</linearGradient></defs>");

    svg.push_str(&format!(
        r##"<rect width="100%" height="100%" fill="{BACKGROUND}"/>"##
    ));
    svg.push_str(&format!(
        r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="{r}" fill="{TRACK_COLOR}"/>"##
    ));

    let fill_w = layout.fill_width(value);
    if fill_w > 0.0 {
        let fill_r = r.min(fill_w / 2.0);
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{fill_w}" height="{h}" rx="{fill_r}" fill="url(#fill)"/>"##
        ));
    }

    svg.push_str(&format!(
        r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="{r}" fill="none" stroke="#ffffff" stroke-opacity="{OUTLINE_OPACITY}" stroke-width="{}"/>"##,
        layout.outline_width
    ));

    svg.push_str(&format!(
        r##"<text x="{}" y="{}" fill="{LABEL_COLOR}" font-family="sans-serif" font-weight="bold" font-size="{}" text-anchor="middle">{}%</text>"##,
        f64::from(size) / 2.0,
        layout.label_y,
        layout.font_size,
        value.min(100)
    ));

    if muted {
        let pad = layout.mute_inset;
        let (left, right) = (x + pad, x + w - pad);
        let (top, bottom) = (y + pad, y + h - pad);
        svg.push_str(&format!(
            r##"<path d="M {left} {top} L {right} {bottom} M {right} {top} L {left} {bottom}" fill="none" stroke="{MUTE_COLOR}" stroke-opacity="{MUTE_OPACITY}" stroke-width="{}" stroke-linecap="round"/>"##,
            layout.mute_stroke_width
        ));
    }

    svg.push_str("</svg>");
    svg
}

/// Stateless frame renderer.
///
/// Holds only the font database used for the label; identical arguments
/// always produce identical bytes.
#[derive(Clone)]
pub struct FrameRenderer {
    fontdb: Arc<fontdb::Database>,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("font_faces", &self.fontdb.len())
            .finish()
    }
}

impl FrameRenderer {
    /// Renderer using the system fonts for the label
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!("Frame renderer loaded {} font faces", db.len());
        Self { fontdb: Arc::new(db) }
    }

    /// Renderer without any fonts (label is skipped)
    pub fn without_fonts() -> Self {
        Self {
            fontdb: Arc::new(fontdb::Database::new()),
        }
    }

    /// Render a frame and encode it as PNG
    pub fn render(&self, value: u8, muted: bool, size: u32) -> Result<Vec<u8>, RenderError> {
        let rgba = self.render_rgba(value, muted, size)?;

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(&rgba, size, size, ExtendedColorType::Rgba8)?;
        Ok(png)
    }

    /// Render a frame to straight-alpha RGBA pixels
    pub fn render_rgba(&self, value: u8, muted: bool, size: u32) -> Result<RgbaImage, RenderError> {
        if size == 0 {
            return Err(RenderError::InvalidSize(size));
        }

        let layout = FrameLayout::for_size(size);
        let svg = frame_svg(value, muted, &layout);

        let mut options = Options::default();
        options.fontdb = self.fontdb.clone();
        let tree = Tree::from_str(&svg, &options)?;

        let mut pixmap = Pixmap::new(size, size).ok_or(RenderError::Allocation(size))?;
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

        let mut rgba = RgbaImage::new(size, size);
        for (dst, src) in rgba.pixels_mut().zip(pixmap.pixels()) {
            let c = src.demultiply();
            *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Ok(rgba)
    }
}

/// One rendered snapshot: PNG bitmap plus the text label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub png: Vec<u8>,
    pub title: String,
}

impl Frame {
    pub fn new(png: Vec<u8>, value: u8, muted: bool) -> Self {
        Self {
            png,
            title: frame_title(value, muted),
        }
    }

    /// `data:image/png;base64,...` form accepted by dial hosts
    pub fn data_url(&self) -> String {
        png_data_url(&self.png)
    }
}

/// Label shown next to the frame
pub fn frame_title(value: u8, muted: bool) -> String {
    if muted {
        "Muted".to_string()
    } else {
        format!("{}%", value)
    }
}

pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(img: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
        img.get_pixel(x, y).0
    }

    #[test]
    fn test_layout_at_default_size() {
        let layout = FrameLayout::for_size(240);
        assert_eq!(layout.track_width, 182.0);
        assert_eq!(layout.track_height, 29.0);
        assert_eq!(layout.track_x, 29.0);
        assert_eq!(layout.track_y, 106.0);
        assert_eq!(layout.corner_radius, 14.5);
        assert_eq!(layout.outline_width, 1.0);
        assert_eq!(layout.font_size, 34.0);
        assert_eq!(layout.label_y, 96.0);
        assert_eq!(layout.mute_stroke_width, 7.0);
        assert_eq!(layout.mute_inset, 12.0);
    }

    #[test]
    fn test_layout_scales_with_size() {
        for size in [72, 144, 240, 480] {
            let layout = FrameLayout::for_size(size);
            let s = f64::from(size);
            assert!((layout.track_width - s * 0.76).abs() <= 1.0);
            assert!((layout.track_height - s * 0.12).abs() <= 1.0);
            // Track stays centered
            assert!((layout.track_x * 2.0 + layout.track_width - s).abs() <= 1.0);
        }
    }

    #[test]
    fn test_mute_stroke_has_six_pixel_floor() {
        assert_eq!(FrameLayout::for_size(72).mute_stroke_width, 6.0);
        assert_eq!(FrameLayout::for_size(144).mute_stroke_width, 6.0);
        assert_eq!(FrameLayout::for_size(480).mute_stroke_width, 14.0);
    }

    #[test]
    fn test_fill_width_bounds() {
        let layout = FrameLayout::for_size(240);
        assert_eq!(layout.fill_width(0), 0.0);
        assert_eq!(layout.fill_width(50), 91.0);
        assert_eq!(layout.fill_width(100), layout.track_width);
        assert_eq!(layout.fill_width(200), layout.track_width);
    }

    #[test]
    fn test_svg_fill_and_mute_elements() {
        let layout = FrameLayout::for_size(240);

        let empty = frame_svg(0, false, &layout);
        assert!(!empty.contains("url(#fill)"));
        assert!(!empty.contains("<path"));

        let full_muted = frame_svg(100, true, &layout);
        assert!(full_muted.contains(r#"width="182" height="29" rx="14.5" fill="url(#fill)""#));
        assert!(full_muted.contains("<path"));
        assert!(full_muted.contains("stroke-linecap=\"round\""));
    }

    #[test]
    fn test_gradient_independent_of_value() {
        let layout = FrameLayout::for_size(240);
        let gradient = |svg: &str| {
            let start = svg.find("<linearGradient").unwrap();
            let end = svg.find("</linearGradient>").unwrap();
            svg[start..end].to_string()
        };
        assert_eq!(
            gradient(&frame_svg(30, false, &layout)),
            gradient(&frame_svg(90, false, &layout))
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = FrameRenderer::new();
        let a = renderer.render(63, false, 240).unwrap();
        let b = renderer.render(63, false, 240).unwrap();
        assert_eq!(a, b);

        let c = renderer.render(63, true, 240).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_render_produces_png_of_requested_size() {
        let renderer = FrameRenderer::without_fonts();
        let png = renderer.render(50, false, 144).unwrap();

        let decoded = image::load_from_memory(&png).expect("PNG should decode");
        assert_eq!(decoded.width(), 144);
        assert_eq!(decoded.height(), 144);
    }

    #[test]
    fn test_empty_and_full_muted_frames_differ() {
        let renderer = FrameRenderer::without_fonts();
        let empty = renderer.render_rgba(0, false, 240).unwrap();
        let full_muted = renderer.render_rgba(100, true, 240).unwrap();

        // Near the right end of the track: bare track vs red end of the gradient
        let [r, g, b, _] = pixel(&empty, 205, 120);
        assert!(r < 80 && g < 80 && b < 80, "unfilled track expected, got {:?}", (r, g, b));
        let [r, g, _, _] = pixel(&full_muted, 205, 120);
        assert!(r > 200 && g < 140, "red gradient end expected, got {:?}", (r, g));

        // Track center: the mute cross passes through it
        let [r, _, _, _] = pixel(&empty, 120, 120);
        assert!(r < 80);
        let [r, g, _, _] = pixel(&full_muted, 120, 120);
        assert!(r > 180 && g < 100, "mute stroke expected, got {:?}", (r, g));
    }

    #[test]
    fn test_mute_stroke_layered_over_fill() {
        let renderer = FrameRenderer::without_fonts();
        let plain = renderer.render_rgba(100, false, 240).unwrap();
        let muted = renderer.render_rgba(100, true, 240).unwrap();

        let [_, g_plain, _, _] = pixel(&plain, 120, 120);
        let [_, g_muted, _, _] = pixel(&muted, 120, 120);
        assert!(g_plain > 150, "gradient midpoint is yellowish, got g={}", g_plain);
        assert!(g_muted < 100, "mute stroke covers the fill, got g={}", g_muted);
    }

    #[test]
    fn test_background_is_opaque() {
        let renderer = FrameRenderer::without_fonts();
        let img = renderer.render_rgba(10, false, 72).unwrap();
        assert_eq!(pixel(&img, 0, 0), [0x0b, 0x0b, 0x0b, 255]);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let renderer = FrameRenderer::without_fonts();
        assert!(matches!(
            renderer.render(50, false, 0),
            Err(RenderError::InvalidSize(0))
        ));
    }

    #[test]
    fn test_frame_title_and_data_url() {
        assert_eq!(frame_title(42, false), "42%");
        assert_eq!(frame_title(42, true), "Muted");

        let frame = Frame::new(vec![1, 2, 3], 7, false);
        assert_eq!(frame.title, "7%");
        assert_eq!(frame.data_url(), "data:image/png;base64,AQID");
    }
}
