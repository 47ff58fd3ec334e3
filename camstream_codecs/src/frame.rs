use bytes::Bytes;
use image::{DynamicImage, GenericImageView};
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty frame payload")]
    Empty,

    #[error("malformed frame: {0}")]
    Malformed(#[from] image::ImageError),
}

/// A decoded raster image at the decoder's native resolution.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub received_at: Instant,
}

impl Frame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Decode one compressed image (jpeg or png).
    ///
    /// Scratch buffers live only for the duration of this call, on success and
    /// on failure alike.
    pub fn decode(&self, payload: &Bytes) -> Result<Frame, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        let received_at = Instant::now();
        let image = image::load_from_memory(payload)?;
        Ok(Frame { image, received_at })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tokio_test::{assert_err, assert_ok};

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Bytes {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, format)
            .unwrap();
        Bytes::from(buffer.into_inner())
    }

    #[test]
    fn decodes_jpeg_at_native_resolution() {
        let frame = assert_ok!(FrameDecoder.decode(&encoded(64, 48, ImageFormat::Jpeg)));
        assert_eq!(frame.dimensions(), (64, 48));
    }

    #[test]
    fn decodes_png() {
        let frame = assert_ok!(FrameDecoder.decode(&encoded(3, 5, ImageFormat::Png)));
        assert_eq!(frame.dimensions(), (3, 5));
    }

    #[test]
    fn rejects_garbage() {
        let garbage = Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        let err = assert_err!(FrameDecoder.decode(&garbage));
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn rejects_truncated_png() {
        let png = encoded(3, 5, ImageFormat::Png);
        let truncated = png.slice(..20);
        assert_err!(FrameDecoder.decode(&truncated));
    }

    #[test]
    fn rejects_empty() {
        let err = assert_err!(FrameDecoder.decode(&Bytes::new()));
        assert!(matches!(err, DecodeError::Empty));
    }
}
