//! Live webcam mirror on a WS281x LED matrix.
//!
//! Captures the camera, shrinks every frame to the panel's resolution and
//! writes it to a serpentine-wired strip. Without LED hardware (or when the
//! driver fails to start) it keeps running in preview-only mode.
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/led-mirror --width 42 --height 40 --preview /tmp/matrix.png
//! sudo ./target/release/led-mirror --config panel.json --test-pattern
//! ```

#[cfg(not(feature = "camera"))]
fn main() {
    eprintln!("This binary requires the 'camera' feature (nokhwa).");
    eprintln!("Build with: cargo build --release");
    eprintln!("Tests can run without it: cargo test --no-default-features");
    std::process::exit(1);
}

#[cfg(feature = "camera")]
fn main() {
    std::process::exit(app::run());
}

#[cfg(feature = "camera")]
mod app {
    use clap::Parser;
    use led_mirror::camera::{CameraSource, NokhwaCamera};
    use led_mirror::config::Config;
    use led_mirror::input::{KeySource, NoKeys, RawModeWriter, TerminalKeys};
    use led_mirror::mapping::{Layout, WiringMode};
    use led_mirror::pipeline::{Pipeline, ViewState};
    use led_mirror::preview::PngPreview;
    use led_mirror::setup_signal_handler;
    use led_mirror::strip::{LedOptions, PhysicalStrip};
    use std::path::PathBuf;
    use std::time::Duration;
    use tracing_subscriber::EnvFilter;

    /// Live webcam mirror on a serpentine-wired LED matrix
    #[derive(Parser)]
    #[command(name = "led-mirror")]
    #[command(version)]
    struct Args {
        /// JSON config file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// LEDs across
        #[arg(long)]
        width: Option<u32>,

        /// LEDs down
        #[arg(long)]
        height: Option<u32>,

        /// Strip wiring: rows_snake or cols_snake
        #[arg(long)]
        wiring: Option<WiringMode>,

        /// Logical (0,0) is the bottom-left LED
        #[arg(long)]
        origin_bottom_left: bool,

        /// Mirror the camera horizontally
        #[arg(long)]
        mirror: bool,

        /// Start on the chaser test pattern
        #[arg(long)]
        test_pattern: bool,

        /// Camera device index
        #[arg(long)]
        device: Option<u32>,

        /// LED brightness (0-255), applied by the driver
        #[arg(long)]
        brightness: Option<u8>,

        /// GPIO pin for the LED data line
        #[arg(long)]
        pin: Option<i32>,

        /// Do not drive LEDs (preview only)
        #[arg(long)]
        no_leds: bool,

        /// Write preview snapshots to this PNG file
        #[arg(long)]
        preview: Option<PathBuf>,

        /// Do not read keys from the terminal
        #[arg(long)]
        no_keys: bool,

        /// Print the effective configuration as JSON and exit
        #[arg(long)]
        print_config: bool,
    }

    impl Args {
        fn apply(&self, config: &mut Config) {
            if let Some(width) = self.width {
                config.width = width;
            }
            if let Some(height) = self.height {
                config.height = height;
            }
            if let Some(wiring) = self.wiring {
                config.wiring = wiring;
            }
            if self.origin_bottom_left {
                config.origin_top_left = false;
            }
            config.mirror |= self.mirror;
            config.start_in_test |= self.test_pattern;
            if let Some(device) = self.device {
                config.camera.device = device;
            }
            if let Some(brightness) = self.brightness {
                config.led.brightness = brightness;
            }
            if let Some(pin) = self.pin {
                config.led.pin = pin;
            }
            if self.no_leds {
                config.led.enabled = false;
            }
        }
    }

    /// Run the program and return its exit code.
    pub fn run() -> i32 {
        let args = Args::parse();
        init_logging(!args.no_keys);

        let mut config = match &args.config {
            Some(path) => match Config::load(path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!("{}", e);
                    return 2;
                }
            },
            None => Config::default(),
        };
        args.apply(&mut config);

        let layout = match config.validate() {
            Ok(layout) => layout,
            Err(e) => {
                tracing::error!("Invalid configuration: {}", e);
                return 2;
            }
        };

        if args.print_config {
            match config.to_json() {
                Ok(json) => {
                    println!("{json}");
                    return 0;
                }
                Err(e) => {
                    tracing::error!("Cannot serialize configuration: {}", e);
                    return 1;
                }
            }
        }

        tracing::info!("LED mirror v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!(
            "Panel: {}x{} ({} LEDs), {}, origin {}",
            layout.width(),
            layout.height(),
            layout.led_count(),
            layout.wiring(),
            if layout.origin_top_left() { "top-left" } else { "bottom-left" }
        );

        let running = match setup_signal_handler() {
            Ok(running) => running,
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                return 1;
            }
        };

        let mut strip = open_strip(&config.led, &layout);

        let camera: Box<dyn CameraSource> = match NokhwaCamera::open(&config.camera) {
            Ok(camera) => Box::new(camera),
            Err(e) => {
                tracing::error!("Failed to open camera {}: {}", config.camera.device, e);
                if let Err(e) = strip.clear() {
                    tracing::error!("Failed to clear LEDs: {}", e);
                }
                return 1;
            }
        };

        let keys: Box<dyn KeySource> = if args.no_keys {
            Box::new(NoKeys)
        } else {
            match TerminalKeys::new() {
                Ok(keys) => {
                    tracing::info!("Keys: q/Esc quit, l wiring, o origin, f mirror, g grid, t test, p fps");
                    Box::new(keys)
                }
                Err(e) => {
                    tracing::warn!("No terminal for keys ({}), running without them", e);
                    Box::new(NoKeys)
                }
            }
        };

        let view = ViewState::from_config(&config, layout);
        let mut pipeline = Pipeline::new(
            camera,
            strip,
            view,
            config.scale,
            Duration::from_millis(config.chaser_delay_ms),
        )
        .with_keys(keys);
        if let Some(path) = &args.preview {
            tracing::info!("Writing preview to {}", path.display());
            pipeline = pipeline.with_preview(Box::new(PngPreview::new(
                path,
                Duration::from_millis(config.preview_interval_ms),
            )));
        }

        let reason = pipeline.run(&running);
        if reason.is_failure() { 1 } else { 0 }
    }

    /// Logs go to stderr. With keys enabled the terminal is in raw mode,
    /// so line breaks need an explicit carriage return.
    fn init_logging(raw_terminal: bool) {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_ansi(false)
            .compact();
        if raw_terminal {
            builder
                .with_writer(|| RawModeWriter(std::io::stderr()))
                .init();
        } else {
            builder.with_writer(std::io::stderr).init();
        }
    }

    /// The strip, with hardware if it can be had.
    fn open_strip(options: &LedOptions, layout: &Layout) -> PhysicalStrip {
        let led_count = layout.led_count();
        if !options.enabled {
            tracing::info!("LED output disabled, preview only");
            return PhysicalStrip::preview_only(led_count);
        }
        hardware_strip(options, led_count)
    }

    #[cfg(feature = "hardware")]
    fn hardware_strip(options: &LedOptions, led_count: usize) -> PhysicalStrip {
        use led_mirror::strip::Ws281xDriver;

        match Ws281xDriver::initialize(options, led_count) {
            Ok(driver) => {
                tracing::info!(
                    "WS281x on GPIO{} (DMA {}, channel {}, brightness {}, {:?})",
                    options.pin,
                    options.dma,
                    options.channel,
                    options.brightness,
                    options.color_order
                );
                PhysicalStrip::new(led_count, Some(Box::new(driver)))
            }
            Err(e) => {
                tracing::error!("Could not start LED driver: {}. Continuing preview only.", e);
                PhysicalStrip::preview_only(led_count)
            }
        }
    }

    #[cfg(not(feature = "hardware"))]
    fn hardware_strip(_options: &LedOptions, led_count: usize) -> PhysicalStrip {
        tracing::warn!("Built without the 'hardware' feature, preview only");
        PhysicalStrip::preview_only(led_count)
    }
}
