use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb, Ltwh};
use crate::error::Error;

/// Static properties of a video stream
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    pub frame_count: Option<u64>,
}

impl VideoInfo {
    pub const DEFAULT_FPS: f32 = 25.0;

    /// Reported fps, or 25 when the container gives nothing usable.
    #[inline]
    pub fn effective_fps(&self) -> f32 {
        if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            Self::DEFAULT_FPS
        }
    }
}

/// Decoded frame, pixels are laid out as (height, width, channels)
pub struct Frame {
    pub index: u64,
    pub timestamp: f32, // in seconds
    pub pixels: Array3<u8>,
}

impl Frame {
    #[inline]
    pub fn new(index: u64, timestamp: f32, pixels: Array3<u8>) -> Self {
        Self {
            index,
            timestamp,
            pixels,
        }
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        let shape = self.pixels.shape();
        (shape[1] as u32, shape[0] as u32)
    }

    /// Crops `bbox` (clamped to the frame) and returns the view with the region it covers.
    pub fn crop(&self, bbox: &BBox<Ltrb>) -> Option<(ArrayView3<'_, u8>, BBox<Ltwh>)> {
        let (fw, fh) = self.dims();
        let clamped = bbox.clamp_to(fw, fh)?;

        let x1 = clamped.left() as usize;
        let y1 = clamped.top() as usize;
        let x2 = clamped.right() as usize;
        let y2 = clamped.bottom() as usize;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let view = self.pixels.slice(s![y1..y2, x1..x2, ..]);
        let region = BBox::ltwh(x1 as f32, y1 as f32, (x2 - x1) as f32, (y2 - y1) as f32);

        Some((view, region))
    }
}

/// Decoded video stream, consumed strictly in frame order
pub trait FrameSource {
    fn info(&self) -> VideoInfo;

    /// `Ok(None)` marks the end of the stream; `Err` is a terminal decode failure.
    fn next_frame(&mut self) -> Result<Option<Frame>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = Frame::new(0, 0.0, Array3::zeros((100, 200, 3)));
        let (view, region) = frame.crop(&BBox::ltrb(-20.0, 10.0, 50.0, 60.0)).unwrap();

        assert_eq!(view.shape(), &[50, 50, 3]);
        assert_eq!(region.as_slice(), &[0.0, 10.0, 50.0, 50.0]);
    }

    #[test]
    fn test_crop_outside_frame() {
        let frame = Frame::new(0, 0.0, Array3::zeros((100, 200, 3)));
        assert!(frame.crop(&BBox::ltrb(300.0, 10.0, 400.0, 60.0)).is_none());
    }

    #[test]
    fn test_effective_fps_fallback() {
        let info = VideoInfo {
            width: 640,
            height: 480,
            fps: 0.0,
            frame_count: None,
        };
        assert_eq!(info.effective_fps(), 25.0);
    }
}
