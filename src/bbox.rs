use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Layout of the four coordinates of a `BBox`
pub trait BBoxFormat: Copy + fmt::Debug {}

/// `[left, top, width, height]`, used for crop regions
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// `[left, top, right, bottom]` with inclusive pixel edges
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }
}

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(left: f32, top: f32, width: f32, height: f32) -> Self {
        BBox([left, top, width, height], PhantomData)
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline]
    pub fn to_ltrb(&self) -> BBox<Ltrb> {
        BBox::ltrb(
            self.left(),
            self.top(),
            self.left() + self.width(),
            self.top() + self.height(),
        )
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        BBox([left, top, right, bottom], PhantomData)
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn center_x(&self) -> f32 {
        (self.left() + self.right()) / 2.0
    }

    #[inline]
    pub fn area(&self) -> f32 {
        span(self.left(), self.right()) * span(self.top(), self.bottom())
    }

    /// Intersection over union, 0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BBox<Ltrb>) -> f32 {
        let inter = span(self.left().max(other.left()), self.right().min(other.right()))
            * span(self.top().max(other.top()), self.bottom().min(other.bottom()));

        let union = self.area() + other.area() - inter;
        if !(union > 0.0) {
            return 0.0;
        }

        inter / union
    }

    /// Clamps the box into a `width` x `height` frame; `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BBox<Ltrb>> {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;

        let l = self.left().max(0.0);
        let t = self.top().max(0.0);
        let r = self.right().min(max_x);
        let b = self.bottom().min(max_y);

        (l < r && t < b).then(|| BBox::ltrb(l, t, r, b))
    }
}

/// Pixel count between two inclusive edges
#[inline(always)]
fn span(from: f32, to: f32) -> f32 {
    (to - from + 1.0).max(0.0)
}
