//! Bridges from the `image` crate to the borrowed rasters used internally.

use std::path::Path;

use geocalib_core::GrayImageView;

/// Borrow an `image::GrayImage` as a [`GrayImageView`].
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode any supported image file and convert it to 8-bit grayscale.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, ::image::ImageError> {
    Ok(::image::ImageReader::open(path)?.decode()?.to_luma8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_matches_buffer_layout() {
        let img = ::image::GrayImage::from_fn(5, 3, |x, y| ::image::Luma([(y * 5 + x) as u8]));
        let view = gray_view(&img);
        assert_eq!((view.width, view.height), (5, 3));
        assert_eq!(view.get(4, 2), 14);
    }

    #[test]
    fn png_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gray.png");
        let img = ::image::GrayImage::from_fn(8, 4, |x, y| ::image::Luma([(x * 30 + y) as u8]));
        img.save(&path).expect("save png");
        let loaded = load_gray(&path).expect("load");
        assert_eq!(loaded, img);
    }
}
