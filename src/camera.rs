//! Camera frame acquisition.
//!
//! Cameras hand over frames in whatever channel order they natively use.
//! Each [`CameraSource`] declares that order once, and the pipeline converts
//! explicitly with [`to_display_order`]; nothing is guessed per frame.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// Byte order of the three channels in a camera frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// A source of frames.
///
/// `read` blocks until the next frame arrives. An `Err` means the camera is
/// gone; callers treat it as final.
pub trait CameraSource {
    /// Channel order of every frame this source returns.
    fn channel_order(&self) -> ChannelOrder;

    /// Block for the next frame, in native channel order.
    fn read(&mut self) -> Result<RgbImage, Box<dyn Error>>;

    /// Stop streaming and hand the device back to the OS.
    fn release(&mut self);
}

/// Requested capture mode. Cameras pick the closest mode they support.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Device index (0 is `/dev/video0` on Linux).
    pub device: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            device: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// Reorder a frame's channels into RGB.
pub fn to_display_order(mut frame: RgbImage, order: ChannelOrder) -> RgbImage {
    match order {
        ChannelOrder::Rgb => frame,
        ChannelOrder::Bgr => {
            for pixel in frame.pixels_mut() {
                pixel.0.swap(0, 2);
            }
            frame
        }
    }
}

// ── nokhwa camera ────────────────────────────────────────────────────

#[cfg(feature = "camera")]
pub use native::NokhwaCamera;

#[cfg(feature = "camera")]
mod native {
    use super::{CameraOptions, CameraSource, ChannelOrder};
    use image::RgbImage;
    use nokhwa::Camera;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    };
    use std::error::Error;

    /// A V4L2 / AVFoundation / MSMF webcam through `nokhwa`.
    pub struct NokhwaCamera {
        camera: Camera,
        streaming: bool,
    }

    impl NokhwaCamera {
        /// Open a camera and start streaming.
        ///
        /// The resolution and frame rate are a request; the camera may pick
        /// something else, which the pipeline resizes anyway.
        pub fn open(options: &CameraOptions) -> Result<Self, Box<dyn Error>> {
            let wanted = CameraFormat::new(
                Resolution::new(options.width, options.height),
                FrameFormat::MJPEG,
                options.fps,
            );
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));
            let mut camera = Camera::new(CameraIndex::Index(options.device), requested)?;
            camera.open_stream()?;

            let format = camera.camera_format();
            tracing::info!(
                "Camera {} streaming {}x{} @ {} fps",
                options.device,
                format.width(),
                format.height(),
                format.frame_rate()
            );

            Ok(Self {
                camera,
                streaming: true,
            })
        }
    }

    impl CameraSource for NokhwaCamera {
        fn channel_order(&self) -> ChannelOrder {
            // RgbFormat decoding always yields R, G, B.
            ChannelOrder::Rgb
        }

        fn read(&mut self) -> Result<RgbImage, Box<dyn Error>> {
            let buffer = self.camera.frame()?;
            let decoded = buffer.decode_image::<RgbFormat>()?;
            let (width, height) = (decoded.width(), decoded.height());
            // Rebuild with our own `image` version in case nokhwa pins another.
            RgbImage::from_raw(width, height, decoded.into_raw())
                .ok_or_else(|| format!("camera returned a short {width}x{height} frame").into())
        }

        fn release(&mut self) {
            if !self.streaming {
                return;
            }
            self.streaming = false;
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!("Failed to stop camera stream: {}", e);
            }
        }
    }

    impl Drop for NokhwaCamera {
        fn drop(&mut self) {
            self.release();
        }
    }
}
