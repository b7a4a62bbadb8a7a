//! Live webcam mirror on a serpentine-wired LED matrix.
//!
//! The crate is split the same way the hardware is:
//! - [`mapping`]: grid `(x, y)` to physical LED index (pure)
//! - [`strip`]: the staged LED buffer and the WS281x driver behind it
//! - [`camera`]: frame acquisition
//! - [`pattern`]: synthetic test pattern for checking the wiring
//! - [`preview`]: magnified debug snapshot of what the matrix shows
//! - [`input`]: live keyboard toggles
//! - [`pipeline`]: the per-frame loop tying everything together
//! - [`config`]: defaults, JSON file and validation
//!
//! This root module holds the pieces every other module shares: the
//! [`Color`] type and Ctrl+C handling.

pub mod camera;
pub mod config;
pub mod input;
pub mod mapping;
pub mod pattern;
pub mod pipeline;
pub mod preview;
pub mod strip;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Color ──────────────────────────────────────────────────────────

/// One LED's color, decoupled from the hardware crate.
///
/// This lets the whole pipeline be tested on a laptop without `rs_ws281x`.
/// At the hardware boundary the driver converts it to its raw word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<image::Rgb<u8>> for Color {
    fn from(pixel: image::Rgb<u8>) -> Self {
        Self::new(pixel[0], pixel[1], pixel[2])
    }
}

impl From<Color> for image::Rgb<u8> {
    fn from(c: Color) -> Self {
        image::Rgb([c.r, c.g, c.b])
    }
}

// ── Signal handling ────────────────────────────────────────────────

/// Install a Ctrl+C / SIGTERM handler that sets the returned flag to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the main loop and the signal handler.
/// `Arc` gives both owners access; `AtomicBool` needs no mutex for a
/// single bool. The handler does nothing else: the loop notices the flag
/// and runs its own cleanup, so the LEDs are always cleared.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn color_new() {
        let c = Color::new(10, 20, 30);
        assert_eq!(c.r, 10);
        assert_eq!(c.g, 20);
        assert_eq!(c.b, 30);
    }

    #[test]
    fn default_color_is_black() {
        assert_eq!(Color::default(), Color::BLACK);
    }

    #[test]
    fn color_converts_to_and_from_rgb_pixel() {
        let pixel = image::Rgb([1, 2, 3]);
        let c = Color::from(pixel);
        assert_eq!(c, Color::new(1, 2, 3));
        assert_eq!(image::Rgb::from(c), pixel);
    }

    #[test]
    fn is_running_reads_flag() {
        let flag = AtomicBool::new(true);
        assert!(is_running(&flag));
        flag.store(false, Ordering::SeqCst);
        assert!(!is_running(&flag));
    }
}
