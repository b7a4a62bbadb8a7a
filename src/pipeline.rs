//! The per-frame loop: capture, downsample, map, flush, preview, poll keys.
//!
//! Everything runs on one thread. The camera read is the only place the loop
//! blocks; a Ctrl+C only flips a flag that is checked once per iteration, so
//! every exit path goes through [`Pipeline::run`]'s cleanup and the LEDs are
//! left dark.
//!
//! ## Rust concepts
//! - `ControlFlow` to say "keep going" or "stop, and here is why"
//! - Builder-style `with_*` methods for optional collaborators
//! - `Copy` state structs updated by value instead of mutated in place

use crate::camera::{CameraSource, ChannelOrder, to_display_order};
use crate::config::Config;
use crate::input::{Command, KeySource, NoKeys, Toggle};
use crate::mapping::Layout;
use crate::pattern::Chaser;
use crate::preview::{self, FpsMeter, PreviewSurface};
use crate::strip::PhysicalStrip;
use crate::{Color, is_running};
use image::RgbImage;
use image::imageops::{self, FilterType};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

// ── View state ───────────────────────────────────────────────────────

/// Where the grid comes from this iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Live,
    Test,
}

/// Everything the keyboard can change while running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub layout: Layout,
    pub mirror: bool,
    pub show_grid: bool,
    pub show_fps: bool,
    pub source: Source,
}

impl ViewState {
    pub fn from_config(config: &Config, layout: Layout) -> Self {
        Self {
            layout,
            mirror: config.mirror,
            show_grid: config.show_grid,
            show_fps: config.show_fps,
            source: if config.start_in_test {
                Source::Test
            } else {
                Source::Live
            },
        }
    }

    /// The state after one toggle.
    pub fn apply(self, toggle: Toggle) -> Self {
        match toggle {
            Toggle::Wiring => Self {
                layout: self.layout.toggle_wiring(),
                ..self
            },
            Toggle::Origin => Self {
                layout: self.layout.toggle_origin(),
                ..self
            },
            Toggle::Mirror => Self {
                mirror: !self.mirror,
                ..self
            },
            Toggle::GridOverlay => Self {
                show_grid: !self.show_grid,
                ..self
            },
            Toggle::FpsReadout => Self {
                show_fps: !self.show_fps,
                ..self
            },
            Toggle::Source => Self {
                source: match self.source {
                    Source::Live => Source::Test,
                    Source::Test => Source::Live,
                },
                ..self
            },
        }
    }

    /// Text drawn over the preview.
    pub fn overlay_lines(&self, fps: f64) -> Vec<String> {
        let mut lines = vec![self.to_string()];
        if self.show_fps {
            lines.push(format!("FPS: {fps:.1}"));
        }
        lines
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} | Layout:{} | OriginTopLeft:{} | Mirror:{} | Test:{}",
            self.layout.width(),
            self.layout.height(),
            self.layout.wiring(),
            self.layout.origin_top_left(),
            self.mirror,
            self.source == Source::Test
        )
    }
}

// ── Stop reasons ─────────────────────────────────────────────────────

/// Why the loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Quit key.
    Quit,
    /// Ctrl+C or SIGTERM.
    Interrupted,
    /// The camera stopped delivering frames.
    CameraLost(String),
    /// The LED driver failed to transmit.
    FlushFailed(String),
}

impl StopReason {
    /// Whether the process should exit with a failure status.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::CameraLost(_) | Self::FlushFailed(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => f.write_str("quit requested"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::CameraLost(e) => write!(f, "camera lost: {e}"),
            Self::FlushFailed(e) => write!(f, "LED flush failed: {e}"),
        }
    }
}

// ── Frame helpers ────────────────────────────────────────────────────

/// Turn a native camera frame into a `width x height` RGB grid.
///
/// Mirror, then resize with linear filtering (this is the only downsampling
/// step), then fix the channel order.
pub fn downsample(
    frame: &RgbImage,
    order: ChannelOrder,
    mirror: bool,
    width: u32,
    height: u32,
) -> RgbImage {
    let small = if mirror {
        imageops::resize(&imageops::flip_horizontal(frame), width, height, FilterType::Triangle)
    } else {
        imageops::resize(frame, width, height, FilterType::Triangle)
    };
    to_display_order(small, order)
}

/// Stage every grid cell into the strip at its mapped physical index.
pub fn write_grid(strip: &mut PhysicalStrip, grid: &RgbImage, layout: &Layout) {
    for y in 0..layout.height() {
        for x in 0..layout.width() {
            let color = Color::from(*grid.get_pixel(x, y));
            strip.set_pixel(layout.index_of(x, y), color);
        }
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────

/// Owns the camera, the strip and the debug collaborators for one run.
pub struct Pipeline {
    camera: Box<dyn CameraSource>,
    strip: PhysicalStrip,
    preview: Option<Box<dyn PreviewSurface>>,
    keys: Box<dyn KeySource>,
    view: ViewState,
    scale: u32,
    chaser: Chaser,
    fps: FpsMeter,
    /// Last camera frame in RGB order, kept only while a preview is attached.
    webcam: Option<RgbImage>,
    frames: u64,
}

impl Pipeline {
    /// `strip` must hold exactly one LED per grid cell.
    pub fn new(
        camera: Box<dyn CameraSource>,
        strip: PhysicalStrip,
        view: ViewState,
        scale: u32,
        chaser_delay: Duration,
    ) -> Self {
        assert_eq!(
            strip.len(),
            view.layout.led_count(),
            "strip length does not match the grid"
        );
        Self {
            camera,
            strip,
            preview: None,
            keys: Box::new(NoKeys),
            view,
            scale: scale.max(1),
            chaser: Chaser::new(chaser_delay),
            fps: FpsMeter::new(),
            webcam: None,
            frames: 0,
        }
    }

    pub fn with_preview(mut self, surface: Box<dyn PreviewSurface>) -> Self {
        self.preview = Some(surface);
        self
    }

    pub fn with_keys(mut self, keys: Box<dyn KeySource>) -> Self {
        self.keys = keys;
        self
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn strip(&self) -> &PhysicalStrip {
        &self.strip
    }

    /// Frames flushed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run until quit, interrupt or a fatal error, then clean up.
    ///
    /// Cleanup always releases the camera, closes the preview and clears the
    /// strip, whatever the reason.
    pub fn run(mut self, running: &AtomicBool) -> StopReason {
        tracing::info!(
            "Pipeline started: {} (hardware: {})",
            self.view,
            if self.strip.has_driver() { "yes" } else { "preview only" }
        );

        let reason = loop {
            if !is_running(running) {
                break StopReason::Interrupted;
            }
            if let ControlFlow::Break(reason) = self.step() {
                break reason;
            }
        };

        if reason.is_failure() {
            tracing::error!("Stopping after {} frames: {}", self.frames, reason);
        } else {
            tracing::info!("Stopping after {} frames: {}", self.frames, reason);
        }
        self.shutdown();
        reason
    }

    /// One iteration of the loop.
    pub fn step(&mut self) -> ControlFlow<StopReason> {
        let layout = self.view.layout;

        // The camera is read in both sources so a dead camera is always fatal
        // and the webcam preview stays live next to the test pattern.
        let frame = match self.camera.read() {
            Ok(frame) => frame,
            Err(e) => return ControlFlow::Break(StopReason::CameraLost(e.to_string())),
        };
        let order = self.camera.channel_order();

        let grid = match self.view.source {
            Source::Live => downsample(
                &frame,
                order,
                self.view.mirror,
                layout.width(),
                layout.height(),
            ),
            Source::Test => {
                let grid = self.chaser.render(&layout);
                thread::sleep(self.chaser.delay());
                grid
            }
        };

        if self.preview.is_some() {
            let frame = if self.view.mirror {
                imageops::flip_horizontal(&frame)
            } else {
                frame
            };
            self.webcam = Some(to_display_order(frame, order));
        }

        write_grid(&mut self.strip, &grid, &layout);
        if let Err(e) = self.strip.show() {
            return ControlFlow::Break(StopReason::FlushFailed(e.to_string()));
        }
        self.frames += 1;

        let fps = self.fps.tick(Instant::now());
        tracing::trace!("Frame {} flushed ({:.1} fps)", self.frames, fps);
        self.present_preview(&grid, fps);

        match self.keys.poll() {
            Some(Command::Quit) => ControlFlow::Break(StopReason::Quit),
            Some(Command::Toggle(toggle)) => {
                self.view = self.view.apply(toggle);
                tracing::info!("{:?} toggled: {}", toggle, self.view);
                ControlFlow::Continue(())
            }
            None => ControlFlow::Continue(()),
        }
    }

    fn present_preview(&mut self, grid: &RgbImage, fps: f64) {
        let Some(surface) = self.preview.as_mut() else {
            return;
        };
        let overlay = self.view.overlay_lines(fps);
        let image = preview::compose(
            grid,
            self.webcam.as_ref(),
            self.scale,
            self.view.show_grid,
            &overlay,
        );
        if let Err(e) = surface.present(&image, &overlay) {
            tracing::warn!("Preview failed, continuing without it: {}", e);
            surface.close();
            self.preview = None;
            self.webcam = None;
        }
    }

    fn shutdown(&mut self) {
        self.camera.release();
        if let Some(mut surface) = self.preview.take() {
            surface.close();
        }
        match self.strip.clear() {
            Ok(()) => tracing::info!("LEDs cleared"),
            Err(e) => tracing::error!("Failed to clear LEDs: {}", e),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
