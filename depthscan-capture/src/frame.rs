//! Frame data acquired from a multi-source sample.

use image::RgbaImage;

use crate::driver::{CaptureError, MultiSourceSample};

/// Which sources a multi-source reader should deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSources {
    pub depth: bool,
    pub color: bool,
}

impl FrameSources {
    /// Paired depth and color, the only combination scanning needs.
    pub const DEPTH_AND_COLOR: Self = Self {
        depth: true,
        color: true,
    };
}

/// Depth image in millimetres. A sample of `0` means "no reading".
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    data: Vec<u16>,
}

impl DepthBuffer {
    /// Create a depth buffer, checking that `data` covers `width * height`.
    pub fn new(width: u32, height: u32, data: Vec<u16>) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(CaptureError::InvalidData(format!(
                "depth buffer has {} samples, expected {}x{} = {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw samples in row-major order.
    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    /// Depth at pixel `(x, y)`, or `None` outside the image.
    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Number of pixels carrying a depth reading.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&d| d != 0).count()
    }

    /// Smallest and largest valid depth, if any pixel has a reading.
    pub fn depth_range(&self) -> Option<(u16, u16)> {
        self.data
            .iter()
            .copied()
            .filter(|&d| d != 0)
            .fold(None, |range, d| match range {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
            })
    }

    /// Mean of the valid depth samples.
    pub fn mean_depth(&self) -> Option<f32> {
        let valid = self.valid_count();
        if valid == 0 {
            return None;
        }
        let sum: u64 = self.data.iter().map(|&d| u64::from(d)).sum();
        Some(sum as f32 / valid as f32)
    }
}

/// Color image delivered alongside the depth data.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBuffer {
    image: RgbaImage,
}

impl ColorBuffer {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Build from raw RGBA bytes. `data` must hold exactly `width * height`
    /// pixels.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(CaptureError::InvalidData(format!(
                "color buffer has {} bytes, expected {} for {}x{} RGBA",
                data.len(),
                expected,
                width,
                height
            )));
        }
        RgbaImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| {
                CaptureError::InvalidData(format!("{}x{} RGBA image is too large", width, height))
            })
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Depth and color data copied out of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePayload {
    pub depth: DepthBuffer,
    pub color: ColorBuffer,
}

impl FramePayload {
    /// Copy both sources out of `sample`.
    ///
    /// Returns `Ok(None)` if either source is missing; the sample is then
    /// unusable and should be dropped.
    pub fn acquire(sample: &dyn MultiSourceSample) -> Result<Option<Self>, CaptureError> {
        let Some(depth) = sample.depth_frame()? else {
            return Ok(None);
        };
        let Some(color) = sample.color_frame()? else {
            return Ok(None);
        };
        Ok(Some(Self { depth, color }))
    }
}

/// A successfully acquired, sequenced frame.
///
/// Ids are 1-based and assigned in acquisition order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    id: u64,
    payload: FramePayload,
}

impl Frame {
    pub fn new(id: u64, payload: FramePayload) -> Self {
        Self { id, payload }
    }

    /// Sequence id of this frame.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn depth(&self) -> &DepthBuffer {
        &self.payload.depth
    }

    pub fn color(&self) -> &ColorBuffer {
        &self.payload.color
    }

    pub fn payload(&self) -> &FramePayload {
        &self.payload
    }

    pub fn into_payload(self) -> FramePayload {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSample {
        depth: Option<DepthBuffer>,
        color: Option<ColorBuffer>,
    }

    impl MultiSourceSample for FixedSample {
        fn depth_frame(&self) -> Result<Option<DepthBuffer>, CaptureError> {
            Ok(self.depth.clone())
        }

        fn color_frame(&self) -> Result<Option<ColorBuffer>, CaptureError> {
            Ok(self.color.clone())
        }
    }

    fn depth_2x2() -> DepthBuffer {
        DepthBuffer::new(2, 2, vec![0, 1000, 1200, 800]).unwrap()
    }

    fn color_2x2() -> ColorBuffer {
        ColorBuffer::new(RgbaImage::new(2, 2))
    }

    #[test]
    fn test_depth_buffer_rejects_wrong_length() {
        assert!(DepthBuffer::new(4, 4, vec![0; 15]).is_err());
    }

    #[test]
    fn test_depth_buffer_statistics() {
        let depth = depth_2x2();
        assert_eq!(depth.valid_count(), 3);
        assert_eq!(depth.depth_range(), Some((800, 1200)));
        assert_eq!(depth.mean_depth(), Some(1000.0));
        assert_eq!(depth.get(1, 1), Some(800));
        assert_eq!(depth.get(2, 0), None);
    }

    #[test]
    fn test_empty_depth_has_no_range() {
        let depth = DepthBuffer::new(2, 1, vec![0, 0]).unwrap();
        assert_eq!(depth.depth_range(), None);
        assert_eq!(depth.mean_depth(), None);
    }

    #[test]
    fn test_color_buffer_from_raw_requires_exact_length() {
        assert!(ColorBuffer::from_raw(2, 2, vec![0; 15]).is_err());
        assert!(matches!(
            ColorBuffer::from_raw(2, 2, vec![0; 17]),
            Err(CaptureError::InvalidData(_))
        ));
        let color = ColorBuffer::from_raw(2, 2, vec![0; 16]).unwrap();
        assert_eq!(color.image().as_raw().len(), 16);
    }

    #[test]
    fn test_payload_acquire_requires_both_sources() {
        let complete = FixedSample {
            depth: Some(depth_2x2()),
            color: Some(color_2x2()),
        };
        assert!(FramePayload::acquire(&complete).unwrap().is_some());

        let no_depth = FixedSample {
            depth: None,
            color: Some(color_2x2()),
        };
        assert!(FramePayload::acquire(&no_depth).unwrap().is_none());

        let no_color = FixedSample {
            depth: Some(depth_2x2()),
            color: None,
        };
        assert!(FramePayload::acquire(&no_color).unwrap().is_none());
    }

    #[test]
    fn test_frame_accessors() {
        let payload = FramePayload {
            depth: depth_2x2(),
            color: color_2x2(),
        };
        let frame = Frame::new(7, payload.clone());
        assert_eq!(frame.id(), 7);
        assert_eq!(frame.depth().dimensions(), (2, 2));
        assert_eq!(frame.color().dimensions(), (2, 2));
        assert_eq!(frame.into_payload(), payload);
    }
}
