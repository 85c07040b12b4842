//! Face cropping and storage.

use std::path::{Path, PathBuf};

use deepscan_models::{AnalysisId, FaceBox};
use image::{imageops, ImageFormat, RgbImage};

use crate::error::MediaResult;

/// Writes face crops as JPEG files into one directory.
#[derive(Debug, Clone)]
pub struct FaceWriter {
    dir: PathBuf,
}

impl FaceWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writer for one analysis run, in its own subdirectory.
    pub async fn for_analysis(&self, id: &AnalysisId) -> MediaResult<FaceWriter> {
        let dir = self.dir.join(id.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(FaceWriter { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `face_{frame}_{detection}.jpg`
    pub fn file_name(frame_index: u64, detection_index: usize) -> String {
        format!("face_{}_{}.jpg", frame_index, detection_index)
    }

    /// Encode and write one crop. Blocking; call from the blocking pool.
    pub fn write(
        &self,
        frame_index: u64,
        detection_index: usize,
        face: &RgbImage,
    ) -> MediaResult<PathBuf> {
        let path = self.dir.join(Self::file_name(frame_index, detection_index));
        face.save_with_format(&path, ImageFormat::Jpeg)?;
        Ok(path)
    }
}

/// Crop a detected face out of a frame.
///
/// Coordinates are truncated to integers and clamped to the frame. Returns
/// `None` when nothing of the box lies inside the frame.
pub fn crop_face(frame: &RgbImage, face: &FaceBox) -> Option<RgbImage> {
    let (width, height) = (i64::from(frame.width()), i64::from(frame.height()));
    let (x1, y1, x2, y2) = face.corners();

    let x1 = x1.clamp(0, width);
    let y1 = y1.clamp(0, height);
    let x2 = x2.clamp(0, width);
    let y2 = y2.clamp(0, height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let crop = imageops::crop_imm(
        frame,
        x1 as u32,
        y1 as u32,
        (x2 - x1) as u32,
        (y2 - y1) as u32,
    );
    Some(crop.to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame() -> RgbImage {
        RgbImage::from_fn(100, 80, |x, y| Rgb([x as u8, y as u8, 0]))
    }

    #[test]
    fn test_crop_inside_frame() {
        let crop = crop_face(&frame(), &FaceBox::new(10.9, 20.2, 30.5, 40.0, 0.9)).unwrap();
        // corners (10, 20, 41, 60)
        assert_eq!(crop.dimensions(), (31, 40));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([10, 20, 0]));
    }

    #[test]
    fn test_crop_clamped_to_frame() {
        let crop = crop_face(&frame(), &FaceBox::new(-20.0, 60.0, 50.0, 50.0, 0.9)).unwrap();
        assert_eq!(crop.dimensions(), (30, 20));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([0, 60, 0]));
    }

    #[test]
    fn test_crop_outside_frame() {
        assert!(crop_face(&frame(), &FaceBox::new(200.0, 10.0, 20.0, 20.0, 0.9)).is_none());
        assert!(crop_face(&frame(), &FaceBox::new(-50.0, -50.0, 20.0, 20.0, 0.9)).is_none());
        assert!(crop_face(&frame(), &FaceBox::new(10.0, 10.0, 0.5, 20.0, 0.9)).is_none());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(FaceWriter::file_name(35, 2), "face_35_2.jpg");
    }

    #[tokio::test]
    async fn test_write_into_analysis_dir() {
        let root = tempfile::tempdir().unwrap();
        let id = AnalysisId::from("run-1");
        let writer = FaceWriter::new(root.path()).for_analysis(&id).await.unwrap();
        assert_eq!(writer.dir(), root.path().join("run-1"));

        let face = RgbImage::from_pixel(8, 8, Rgb([200, 10, 10]));
        let path = writer.write(5, 0, &face).unwrap();

        assert_eq!(path, root.path().join("run-1").join("face_5_0.jpg"));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }
}
