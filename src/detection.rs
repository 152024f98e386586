use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Person box reported by a detector, in full-frame pixels
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl Detection {
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            bbox: BBox::ltrb(x1, y1, x2, y2),
            confidence,
        }
    }

    #[inline(always)]
    pub fn center_x(&self) -> f32 {
        self.bbox.center_x()
    }
}
