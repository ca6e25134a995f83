//! Per-frame summaries logged by the scanner.

use std::fmt;

use depthscan_capture::Frame;

/// Depth statistics of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    pub id: u64,
    pub depth_resolution: (u32, u32),
    pub color_resolution: (u32, u32),
    /// Fraction of depth pixels with a reading.
    pub coverage: f32,
    pub depth_range: Option<(u16, u16)>,
    pub mean_depth: Option<f32>,
}

impl FrameSummary {
    pub fn of(frame: &Frame) -> Self {
        let depth = frame.depth();
        let (width, height) = depth.dimensions();
        let total = width as usize * height as usize;
        let coverage = if total == 0 {
            0.0
        } else {
            depth.valid_count() as f32 / total as f32
        };
        Self {
            id: frame.id(),
            depth_resolution: depth.dimensions(),
            color_resolution: frame.color().dimensions(),
            coverage,
            depth_range: depth.depth_range(),
            mean_depth: depth.mean_depth(),
        }
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (dw, dh) = self.depth_resolution;
        let (cw, ch) = self.color_resolution;
        write!(
            f,
            "frame {}: depth {}x{} ({:.1}% valid), color {}x{}",
            self.id,
            dw,
            dh,
            self.coverage * 100.0,
            cw,
            ch
        )?;
        if let (Some((near, far)), Some(mean)) = (self.depth_range, self.mean_depth) {
            write!(f, ", depth {}-{} mm (mean {:.0} mm)", near, far, mean)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthscan_capture::{ColorBuffer, DepthBuffer, FramePayload};

    fn black(width: u32, height: u32) -> ColorBuffer {
        ColorBuffer::from_raw(width, height, vec![0; (width * height * 4) as usize]).unwrap()
    }

    #[test]
    fn test_summary_of_frame() {
        let payload = FramePayload {
            depth: DepthBuffer::new(2, 2, vec![0, 900, 1100, 1000]).unwrap(),
            color: black(4, 2),
        };
        let summary = FrameSummary::of(&Frame::new(3, payload));

        assert_eq!(summary.id, 3);
        assert_eq!(summary.coverage, 0.75);
        assert_eq!(summary.depth_range, Some((900, 1100)));
        assert_eq!(summary.mean_depth, Some(1000.0));
        assert_eq!(
            summary.to_string(),
            "frame 3: depth 2x2 (75.0% valid), color 4x2, depth 900-1100 mm (mean 1000 mm)"
        );
    }

    #[test]
    fn test_summary_without_readings() {
        let payload = FramePayload {
            depth: DepthBuffer::new(1, 1, vec![0]).unwrap(),
            color: black(1, 1),
        };
        let summary = FrameSummary::of(&Frame::new(1, payload));
        assert_eq!(
            summary.to_string(),
            "frame 1: depth 1x1 (0.0% valid), color 1x1"
        );
    }
}
