/// Axis-aligned rectangle for collision tests
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    #[inline]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Square rectangle (tanks, bullets, wall cells are all square)
    #[inline]
    pub fn square(x: f64, y: f64, size: f64) -> Self {
        Self { x, y, w: size, h: size }
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Overlap test with a signed threshold.
    ///
    /// A negative threshold shrinks the contact band, so rectangles may graze
    /// each other by up to `-threshold` units without counting as overlapping.
    pub fn overlaps(&self, other: &Rect, threshold: f64) -> bool {
        between(other.x - self.w, self.x, other.x + other.w, threshold)
            && between(other.y - self.h, self.y, other.y + other.h, threshold)
    }
}

#[inline]
fn between(lo: f64, v: f64, hi: f64, threshold: f64) -> bool {
    lo - threshold <= v && v <= hi + threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_overlap() {
        let a = Rect::square(0.0, 0.0, 16.0);
        let b = Rect::square(8.0, 8.0, 16.0);
        assert!(a.overlaps(&b, 0.0));
    }

    #[test]
    fn test_disjoint() {
        let a = Rect::square(0.0, 0.0, 16.0);
        let b = Rect::square(40.0, 0.0, 16.0);
        assert!(!a.overlaps(&b, 0.0));
    }

    #[test]
    fn test_touching_edges_zero_threshold() {
        // Exact edge contact counts as overlap at threshold 0
        let a = Rect::square(0.0, 0.0, 16.0);
        let b = Rect::square(16.0, 0.0, 16.0);
        assert!(a.overlaps(&b, 0.0));
    }

    #[test]
    fn test_touching_edges_negative_threshold() {
        // The tank-vs-wall threshold lets edge contact pass
        let a = Rect::square(0.0, 0.0, 16.0);
        let b = Rect::square(16.0, 0.0, 16.0);
        assert!(!a.overlaps(&b, -0.01));
    }

    #[test]
    fn test_graze_within_threshold() {
        // 0.005 of penetration is below the 0.01 band
        let a = Rect::square(0.0, 0.0, 16.0);
        let b = Rect::square(15.995, 0.0, 16.0);
        assert!(!a.overlaps(&b, -0.01));
    }

    #[test]
    fn test_penetration_beyond_threshold() {
        let a = Rect::square(0.0, 0.0, 16.0);
        let b = Rect::square(15.9, 0.0, 16.0);
        assert!(a.overlaps(&b, -0.01));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = Rect::square(0.0, 0.0, 16.0);
        let b = Rect::square(10.0, 12.0, 16.0);
        assert_eq!(a.overlaps(&b, 0.0), b.overlaps(&a, 0.0));
        assert_eq!(a.overlaps(&b, -0.01), b.overlaps(&a, -0.01));
    }

    #[test]
    fn test_asymmetric_sizes() {
        // Bullet (3x3) vs tank (16x16)
        let bullet = Rect::square(20.0, 20.0, 3.0);
        let tank = Rect::square(10.0, 10.0, 16.0);
        assert!(bullet.overlaps(&tank, 0.0));
        let far = Rect::square(10.0, 40.0, 16.0);
        assert!(!bullet.overlaps(&far, 0.0));
    }

    #[test]
    fn test_edges() {
        let r = Rect::new(4.0, 8.0, 16.0, 12.0);
        assert_eq!(r.right(), 20.0);
        assert_eq!(r.bottom(), 20.0);
    }
}
