//! Detected face models.

use serde::{Deserialize, Serialize};

/// Facial landmark in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// A detected face in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Left edge x-coordinate
    pub x: f32,
    /// Top edge y-coordinate
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector confidence [0, 1]
    pub score: f32,
    /// Right eye, left eye, nose tip, right mouth corner, left mouth corner
    pub landmarks: [Landmark; 5],
}

impl FaceBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32, score: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
            landmarks: [Landmark::default(); 5],
        }
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over Union with another box.
    pub fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Integer corner coordinates `(x1, y1, x2, y2)`, truncated toward zero.
    pub fn corners(&self) -> (i64, i64, i64, i64) {
        (
            self.x as i64,
            self.y as i64,
            self.x2() as i64,
            self.y2() as i64,
        )
    }

    /// Multiply coordinates and landmarks by per-axis scale factors.
    pub fn scaled(&self, scale_x: f32, scale_y: f32) -> FaceBox {
        let mut landmarks = self.landmarks;
        for lm in &mut landmarks {
            lm.x *= scale_x;
            lm.y *= scale_y;
        }
        FaceBox {
            x: self.x * scale_x,
            y: self.y * scale_y,
            width: self.width * scale_x,
            height: self.height * scale_y,
            score: self.score,
            landmarks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = FaceBox::new(10.0, 10.0, 20.0, 20.0, 0.9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let b = FaceBox::new(100.0, 100.0, 5.0, 5.0, 0.9);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = FaceBox::new(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = FaceBox::new(5.0, 0.0, 10.0, 10.0, 1.0);
        // intersection 50, union 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_corners_truncate() {
        let face = FaceBox::new(10.7, 20.2, 30.6, 40.9, 0.5);
        assert_eq!(face.corners(), (10, 20, 41, 61));
    }

    #[test]
    fn test_scaled() {
        let mut face = FaceBox::new(10.0, 20.0, 30.0, 40.0, 0.5);
        face.landmarks[0] = Landmark { x: 15.0, y: 25.0 };
        let scaled = face.scaled(2.0, 0.5);
        assert_eq!(scaled.x, 20.0);
        assert_eq!(scaled.height, 20.0);
        assert_eq!(scaled.landmarks[0], Landmark { x: 30.0, y: 12.5 });
        assert_eq!(scaled.score, 0.5);
    }
}
