use anyhow::Context;
use camstream::{CameraId, Frame, RenderSink};
use image::{imageops::FilterType, ImageFormat, Rgba, RgbaImage};
use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

/// Fixed size drawing surface owned by the viewer.
#[derive(Debug, Clone)]
pub struct Surface {
    canvas: Arc<Mutex<RgbaImage>>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        let canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        Self {
            canvas: Arc::new(Mutex::new(canvas)),
        }
    }

    /// A sink drawing onto this surface. Frames are stretched to the surface size.
    pub fn sink(&self) -> SurfaceSink {
        SurfaceSink {
            canvas: Arc::clone(&self.canvas),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.canvas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[derive(Debug)]
pub struct SurfaceSink {
    canvas: Arc<Mutex<RgbaImage>>,
}

impl RenderSink for SurfaceSink {
    fn render(&mut self, camera: &CameraId, frame: Frame) {
        let mut canvas = self.canvas.lock().unwrap_or_else(PoisonError::into_inner);
        let (width, height) = canvas.dimensions();
        tracing::trace!(camera = %camera, "Drawing {:?} frame", frame.dimensions());
        *canvas = frame
            .image
            .resize_exact(width, height, FilterType::Triangle)
            .into_rgba8();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::time::Instant;

    #[test]
    fn frames_are_scaled_onto_the_surface() {
        let surface = Surface::new(48, 36);
        let mut sink = surface.sink();
        let frame = Frame {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([255, 0, 0]))),
            received_at: Instant::now(),
        };
        sink.render(&CameraId::from("cam-1"), frame);

        let canvas = surface.canvas.lock().unwrap();
        assert_eq!(canvas.dimensions(), (48, 36));
        let Rgba([r, g, b, a]) = *canvas.get_pixel(10, 10);
        assert!(r > 250 && g < 5 && b < 5, "{r} {g} {b}");
        assert_eq!(a, 255);
    }
}
