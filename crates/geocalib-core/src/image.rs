use serde::{Deserialize, Serialize};

/// Borrowed 8-bit grayscale raster.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

/// Owned 8-bit grayscale raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Axis-aligned rectangle in image pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clip to a `width x height` image.
    pub fn clipped(&self, width: usize, height: usize) -> PixelRect {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

impl<'a> GrayImageView<'a> {
    /// Checked constructor: `data.len()` must equal `width * height`.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Option<Self> {
        (width.checked_mul(height)? == data.len()).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Copy `rect` (clipped to the image) into an owned raster.
    ///
    /// Returns `None` when the clipped region is empty.
    pub fn crop(&self, rect: PixelRect) -> Option<GrayImage> {
        let r = rect.clipped(self.width, self.height);
        if r.is_empty() {
            return None;
        }
        let mut data = Vec::with_capacity(r.width * r.height);
        for y in r.y..r.y + r.height {
            let row = y * self.width;
            data.extend_from_slice(&self.data[row + r.x..row + r.x + r.width]);
        }
        Some(GrayImage {
            width: r.width,
            height: r.height,
            data,
        })
    }
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Write `src` with its top-left corner at `(x, y)`, clipping at the edges.
    pub fn paste(&mut self, src: &GrayImageView<'_>, x: usize, y: usize) {
        let w = src.width.min(self.width.saturating_sub(x));
        let h = src.height.min(self.height.saturating_sub(y));
        for row in 0..h {
            let dst = (y + row) * self.width + x;
            let s = row * src.width;
            self.data[dst..dst + w].copy_from_slice(&src.data[s..s + w]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: usize, h: usize) -> GrayImage {
        GrayImage {
            width: w,
            height: h,
            data: (0..w * h).map(|i| (i % 251) as u8).collect(),
        }
    }

    #[test]
    fn crop_clips_to_bounds() {
        let img = ramp(8, 6);
        let view = img.view();
        let c = view.crop(PixelRect::new(6, 4, 10, 10)).expect("non-empty");
        assert_eq!((c.width, c.height), (2, 2));
        assert_eq!(c.data, vec![view.get(6, 4), view.get(7, 4), view.get(6, 5), view.get(7, 5)]);
        assert!(view.crop(PixelRect::new(8, 0, 3, 3)).is_none());
    }

    #[test]
    fn paste_then_crop_recovers_patch() {
        let patch = ramp(3, 2);
        let mut canvas = GrayImage::new(10, 10);
        canvas.paste(&patch.view(), 4, 5);
        let back = canvas.view().crop(PixelRect::new(4, 5, 3, 2)).expect("non-empty");
        assert_eq!(back, patch);
    }

    #[test]
    fn view_rejects_wrong_buffer_length() {
        assert!(GrayImageView::new(4, 4, &[0u8; 15]).is_none());
        assert!(GrayImageView::new(4, 4, &[0u8; 16]).is_some());
    }
}
