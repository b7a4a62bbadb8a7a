//! The physical LED strip: a staged pixel buffer and an optional driver.
//!
//! Writes land in the staging buffer and stay invisible until [`PhysicalStrip::show`]
//! pushes the whole buffer to the driver in one transmit. The driver is
//! decided once at startup: when it could not be initialized the strip keeps
//! staging pixels (the preview still reads them) but nothing reaches hardware.
//!
//! ## Rust concepts
//! - Trait objects (`Box<dyn LedDriver>`) at the hardware seam
//! - `Option` for "hardware present or not"
//! - `Drop` as a last-resort cleanup when a panic skips the normal path

use crate::Color;
use serde::{Deserialize, Serialize};
use std::error::Error;

// ── Driver seam ──────────────────────────────────────────────────────

/// Anything that can light a strip of LEDs.
pub trait LedDriver {
    /// Stage one LED. Not visible until [`LedDriver::show`].
    fn set_pixel(&mut self, index: usize, color: Color);

    /// Transmit every staged LED.
    fn show(&mut self) -> Result<(), Box<dyn Error>>;
}

/// Order in which the LED chip expects the three color bytes on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    #[default]
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
}

/// Electrical parameters handed to the WS281x driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedOptions {
    /// Drive hardware at all. When false the run is preview-only.
    pub enabled: bool,
    /// GPIO pin carrying the data line (18 is PWM0).
    pub pin: i32,
    pub frequency_hz: u32,
    pub dma: i32,
    /// Global brightness applied by the driver (0-255).
    pub brightness: u8,
    pub invert: bool,
    /// PWM channel, 0 or 1.
    pub channel: usize,
    pub color_order: ColorOrder,
}

impl Default for LedOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            pin: 18,
            frequency_hz: 800_000,
            dma: 10,
            brightness: 16,
            invert: false,
            channel: 0,
            color_order: ColorOrder::Rgb,
        }
    }
}

// ── Physical strip ───────────────────────────────────────────────────

/// The strip as the pipeline sees it. Owned by exactly one pipeline.
pub struct PhysicalStrip {
    pixels: Vec<Color>,
    driver: Option<Box<dyn LedDriver>>,
    /// Something non-black may be showing on hardware.
    lit: bool,
}

impl PhysicalStrip {
    pub fn new(led_count: usize, driver: Option<Box<dyn LedDriver>>) -> Self {
        Self {
            pixels: vec![Color::BLACK; led_count],
            driver,
            lit: false,
        }
    }

    /// A strip with no hardware behind it.
    pub fn preview_only(led_count: usize) -> Self {
        Self::new(led_count, None)
    }

    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Staged colors in physical order.
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Stage one LED. Panics if `index` is past the end of the strip.
    pub fn set_pixel(&mut self, index: usize, color: Color) {
        self.pixels[index] = color;
    }

    /// Transmit the whole staged buffer.
    pub fn show(&mut self) -> Result<(), Box<dyn Error>> {
        let Some(driver) = self.driver.as_mut() else {
            return Ok(());
        };
        for (index, &color) in self.pixels.iter().enumerate() {
            driver.set_pixel(index, color);
        }
        self.lit = true;
        driver.show()
    }

    /// Turn every LED off and transmit.
    ///
    /// A failed transmit is reported but not retried, including by `Drop`.
    pub fn clear(&mut self) -> Result<(), Box<dyn Error>> {
        self.pixels.fill(Color::BLACK);
        let result = self.show();
        self.lit = false;
        result
    }
}

impl Drop for PhysicalStrip {
    fn drop(&mut self) {
        if self.lit {
            tracing::warn!("Strip dropped while lit, clearing");
            if let Err(e) = self.clear() {
                tracing::error!("Failed to clear strip on drop: {}", e);
            }
        }
    }
}

// ── WS281x driver ────────────────────────────────────────────────────

#[cfg(feature = "hardware")]
pub use ws281x::Ws281xDriver;

#[cfg(feature = "hardware")]
mod ws281x {
    use super::{ColorOrder, LedDriver, LedOptions};
    use crate::Color;
    use rs_ws281x::{ChannelBuilder, Controller, ControllerBuilder, StripType};
    use std::error::Error;

    impl From<ColorOrder> for StripType {
        fn from(order: ColorOrder) -> Self {
            match order {
                ColorOrder::Rgb => StripType::Ws2811Rgb,
                ColorOrder::Rbg => StripType::Ws2811Rbg,
                ColorOrder::Grb => StripType::Ws2811Grb,
                ColorOrder::Gbr => StripType::Ws2811Gbr,
                ColorOrder::Brg => StripType::Ws2811Brg,
                ColorOrder::Bgr => StripType::Ws2811Bgr,
            }
        }
    }

    /// WS281x strip driven through the rpi_ws281x C library (DMA + PWM).
    ///
    /// Needs root on a Raspberry Pi.
    pub struct Ws281xDriver {
        controller: Controller,
        channel: usize,
    }

    impl Ws281xDriver {
        pub fn initialize(options: &LedOptions, led_count: usize) -> Result<Self, Box<dyn Error>> {
            let count = i32::try_from(led_count)?;
            let controller = ControllerBuilder::new()
                .freq(options.frequency_hz)
                .dma(options.dma)
                .channel(
                    options.channel,
                    ChannelBuilder::new()
                        .pin(options.pin)
                        .count(count)
                        .strip_type(options.color_order.into())
                        .invert(options.invert)
                        .brightness(options.brightness)
                        .build(),
                )
                .build()
                .map_err(|e| format!("ws281x initialization failed: {e:?}"))?;

            Ok(Self {
                controller,
                channel: options.channel,
            })
        }
    }

    impl LedDriver for Ws281xDriver {
        fn set_pixel(&mut self, index: usize, color: Color) {
            // Raw words are 0x00RRGGBB, little-endian in memory.
            if let Some(led) = self.controller.leds_mut(self.channel).get_mut(index) {
                *led = [color.b, color.g, color.r, 0];
            }
        }

        fn show(&mut self) -> Result<(), Box<dyn Error>> {
            self.controller
                .render()
                .map_err(|e| format!("ws281x render failed: {e:?}").into())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
