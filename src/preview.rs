//! Debug preview: a magnified copy of the grid next to the webcam image.
//!
//! The preview never affects what the LEDs show. It exists so the wiring and
//! the downsampling can be checked from a desk without looking at the panel.

use embedded_graphics::Drawable;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X13;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Pixel, Point, RgbColor, Size};
use embedded_graphics::text::Text;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::convert::Infallible;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Color of the cell-boundary lines.
pub const GRID_LINE_COLOR: Rgb<u8> = Rgb([30, 30, 30]);

/// Default magnification: one LED becomes a `12x12` block.
pub const DEFAULT_SCALE: u32 = 12;

/// Baseline of the first overlay line; later lines go 20 px further down.
const OVERLAY_ORIGIN: Point = Point::new(8, 20);
const OVERLAY_LINE_STEP: i32 = 20;

/// Label drawn on the webcam half.
pub const WEBCAM_LABEL: &str = "Webcam";

// ── Composition ──────────────────────────────────────────────────────

/// Magnify `grid` by an integer `scale`, every cell a solid block.
pub fn magnify(grid: &RgbImage, scale: u32) -> RgbImage {
    RgbImage::from_fn(grid.width() * scale, grid.height() * scale, |x, y| {
        *grid.get_pixel(x / scale, y / scale)
    })
}

/// Draw one-pixel lines on every cell boundary, outer border included.
pub fn draw_grid_lines(img: &mut RgbImage, step: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || step == 0 {
        return;
    }
    for x in (0..=w).step_by(step as usize).map(|x| x.min(w - 1)) {
        for y in 0..h {
            img.put_pixel(x, y, color);
        }
    }
    for y in (0..=h).step_by(step as usize).map(|y| y.min(h - 1)) {
        for x in 0..w {
            img.put_pixel(x, y, color);
        }
    }
}

/// `embedded-graphics` view of an `RgbImage`. Pixels outside the image are dropped.
struct Canvas<'a>(&'a mut RgbImage);

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = self.0.dimensions();
        for Pixel(coord, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(coord.x), u32::try_from(coord.y)) {
                if x < w && y < h {
                    self.0.put_pixel(x, y, Rgb([color.r(), color.g(), color.b()]));
                }
            }
        }
        Ok(())
    }
}

/// Write `lines` in white from the top-left corner, one line every 20 px.
pub fn draw_overlay(img: &mut RgbImage, lines: &[String]) {
    let style = MonoTextStyle::new(&FONT_6X13, Rgb888::WHITE);
    let mut canvas = Canvas(img);
    let mut position = OVERLAY_ORIGIN;
    for line in lines {
        if let Err(never) = Text::new(line, position, style).draw(&mut canvas) {
            match never {}
        }
        position.y += OVERLAY_LINE_STEP;
    }
}

/// Build the side-by-side preview: magnified grid with `overlay` text on the
/// left, the camera frame scaled to the same size on the right (black when
/// there is none yet).
///
/// `webcam` must already be in RGB order.
pub fn compose(
    grid: &RgbImage,
    webcam: Option<&RgbImage>,
    scale: u32,
    show_grid: bool,
    overlay: &[String],
) -> RgbImage {
    let mut sim = magnify(grid, scale);
    if show_grid {
        draw_grid_lines(&mut sim, scale, GRID_LINE_COLOR);
    }
    draw_overlay(&mut sim, overlay);
    let (w, h) = sim.dimensions();

    let mut both = RgbImage::new(w * 2, h);
    imageops::replace(&mut both, &sim, 0, 0);
    if let Some(frame) = webcam {
        let mut scaled = imageops::resize(frame, w, h, FilterType::Triangle);
        draw_overlay(&mut scaled, &[WEBCAM_LABEL.to_string()]);
        imageops::replace(&mut both, &scaled, i64::from(w), 0);
    }
    both
}

// ── Frame rate ───────────────────────────────────────────────────────

/// Frames per second as an exponential moving average (smoothing 0.9).
#[derive(Debug, Clone, Default)]
pub struct FpsMeter {
    fps: f64,
    last: Option<Instant>,
}

impl FpsMeter {
    const SMOOTHING: f64 = 0.9;

    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame finished at `now` and return the updated average.
    pub fn tick(&mut self, now: Instant) -> f64 {
        if let Some(prev) = self.last {
            let dt = now.saturating_duration_since(prev).as_secs_f64();
            if dt > 0.0 {
                self.fps = Self::SMOOTHING * self.fps + (1.0 - Self::SMOOTHING) / dt;
            }
        }
        self.last = Some(now);
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

// ── Surfaces ─────────────────────────────────────────────────────────

/// Somewhere to show the preview. Optional; headless runs have none.
pub trait PreviewSurface {
    /// Show one composed preview with its overlay text lines.
    fn present(&mut self, image: &RgbImage, overlay: &[String]) -> Result<(), Box<dyn Error>>;

    /// Release the surface. Called once during shutdown.
    fn close(&mut self);
}

/// Writes the preview to a PNG file, at most once per `interval`.
///
/// The file is replaced atomically, so an image viewer with auto-reload
/// never sees a half-written image.
pub struct PngPreview {
    path: PathBuf,
    interval: Duration,
    last_write: Option<Instant>,
    written: u64,
}

impl PngPreview {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            last_write: None,
            written: 0,
        }
    }

    fn due(&self, now: Instant) -> bool {
        self.last_write
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }
}

impl PreviewSurface for PngPreview {
    fn present(&mut self, image: &RgbImage, overlay: &[String]) -> Result<(), Box<dyn Error>> {
        let now = Instant::now();
        if !self.due(now) {
            return Ok(());
        }
        let tmp = self.path.with_extension("tmp.png");
        image.save(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        self.last_write = Some(now);
        self.written += 1;
        tracing::debug!("Preview {}: {}", self.path.display(), overlay.join(" | "));
        Ok(())
    }

    fn close(&mut self) {
        tracing::info!(
            "Preview closed after {} snapshots ({})",
            self.written,
            self.path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    fn two_cell_grid() -> RgbImage {
        let mut grid = RgbImage::new(2, 1);
        grid.put_pixel(0, 0, RED);
        grid.put_pixel(1, 0, BLUE);
        grid
    }

    #[test]
    fn magnify_makes_solid_blocks() {
        let big = magnify(&two_cell_grid(), 3);
        assert_eq!(big.dimensions(), (6, 3));
        assert_eq!(big.get_pixel(2, 2), &RED);
        assert_eq!(big.get_pixel(3, 0), &BLUE);
    }

    #[test]
    fn grid_lines_cover_boundaries_and_border() {
        let mut img = RgbImage::from_pixel(8, 4, RED);
        draw_grid_lines(&mut img, 4, GRID_LINE_COLOR);

        for y in 0..4 {
            assert_eq!(img.get_pixel(0, y), &GRID_LINE_COLOR);
            assert_eq!(img.get_pixel(4, y), &GRID_LINE_COLOR);
            assert_eq!(img.get_pixel(7, y), &GRID_LINE_COLOR);
        }
        assert_eq!(img.get_pixel(2, 3), &GRID_LINE_COLOR);
        assert_eq!(img.get_pixel(2, 2), &RED);
    }

    #[test]
    fn compose_places_webcam_to_the_right() {
        let webcam = RgbImage::from_pixel(64, 48, BLUE);
        let preview = compose(&two_cell_grid(), Some(&webcam), 4, false, &[]);

        assert_eq!(preview.dimensions(), (16, 4));
        assert_eq!(preview.get_pixel(1, 1), &RED);
        assert_eq!(preview.get_pixel(12, 2), &BLUE);
    }

    #[test]
    fn compose_without_webcam_leaves_right_half_black() {
        let preview = compose(&two_cell_grid(), None, 2, true, &[]);
        assert_eq!(preview.get_pixel(6, 1), &Rgb([0, 0, 0]));
    }

    fn white_pixels(img: &RgbImage, x_range: std::ops::Range<u32>, y_range: std::ops::Range<u32>) -> usize {
        y_range
            .flat_map(|y| x_range.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y) == &Rgb([255, 255, 255]))
            .count()
    }

    #[test]
    fn overlay_lines_are_drawn_top_left() {
        let grid = RgbImage::new(42, 40);
        let plain = compose(&grid, None, DEFAULT_SCALE, false, &[]);
        let lines = vec!["42x40 | Layout:rows_snake".to_string(), "FPS: 29.7".to_string()];
        let labelled = compose(&grid, None, DEFAULT_SCALE, false, &lines);

        assert_eq!(white_pixels(&plain, 0..200, 0..50), 0);
        // First line sits on baseline y=20, second on y=40.
        assert!(white_pixels(&labelled, 8..200, 8..24) > 0);
        assert!(white_pixels(&labelled, 8..70, 28..44) > 0);
        // Nothing spills onto the webcam half.
        assert_eq!(white_pixels(&labelled, 504..1008, 0..480), 0);
    }

    #[test]
    fn fps_text_changes_the_preview() {
        let grid = RgbImage::new(42, 40);
        let slow = compose(&grid, None, DEFAULT_SCALE, false, &["FPS: 12.0".to_string()]);
        let fast = compose(&grid, None, DEFAULT_SCALE, false, &["FPS: 30.0".to_string()]);
        assert_ne!(slow, fast);
    }

    #[test]
    fn webcam_half_is_labelled() {
        let webcam = RgbImage::from_pixel(64, 48, BLUE);
        let preview = compose(&RgbImage::new(42, 40), Some(&webcam), DEFAULT_SCALE, false, &[]);
        assert!(white_pixels(&preview, 504 + 8..504 + 60, 8..24) > 0);
    }

    #[test]
    fn overlay_is_clipped_to_small_images() {
        let mut tiny = RgbImage::new(10, 10);
        draw_overlay(&mut tiny, &["a long line that runs off the edge".to_string()]);
        assert_eq!(tiny.dimensions(), (10, 10));
    }

    #[test]
    fn fps_meter_averages_with_smoothing() {
        let start = Instant::now();
        let mut meter = FpsMeter::new();
        assert_eq!(meter.tick(start), 0.0);

        // One 100 ms frame: 0.9 * 0 + 0.1 * 10
        let fps = meter.tick(start + Duration::from_millis(100));
        assert!((fps - 1.0).abs() < 1e-9, "fps = {fps}");

        // Another: 0.9 * 1 + 0.1 * 10
        let fps = meter.tick(start + Duration::from_millis(200));
        assert!((fps - 1.9).abs() < 1e-9, "fps = {fps}");
    }

    #[test]
    fn fps_meter_ignores_zero_length_frames() {
        let start = Instant::now();
        let mut meter = FpsMeter::new();
        meter.tick(start);
        meter.tick(start + Duration::from_millis(50));
        let before = meter.fps();
        assert_eq!(meter.tick(start + Duration::from_millis(50)), before);
    }

    #[test]
    fn png_preview_writes_then_throttles() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("preview.png");
        let mut surface = PngPreview::new(&path, Duration::from_secs(3600));
        let image = RgbImage::from_pixel(4, 2, RED);

        surface.present(&image, &["hello".to_string()]).unwrap();
        let written = image::open(&path).unwrap().to_rgb8();
        assert_eq!(written, image);

        let other = RgbImage::from_pixel(4, 2, BLUE);
        surface.present(&other, &[]).unwrap();
        let still = image::open(&path).unwrap().to_rgb8();
        assert_eq!(still, image);
        assert!(!tmp.path().join("preview.tmp.png").exists());

        surface.close();
    }
}
