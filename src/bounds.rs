/// Axis-aligned bounding box in `D`-dimensional space.
///
/// The box is closed: points on its faces are inside. An inverted box (any
/// `min > max`) is empty and acts as the identity for [`BoundingBox::union`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

impl<const D: usize> BoundingBox<D> {
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Self { min, max }
    }

    /// An inverted box that contains nothing.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; D],
            max: [f64::NEG_INFINITY; D],
        }
    }

    /// A degenerate box holding a single point.
    pub fn from_point(point: [f64; D]) -> Self {
        Self { min: point, max: point }
    }

    pub fn is_empty(&self) -> bool {
        (0..D).any(|axis| self.min[axis] > self.max[axis])
    }

    /// Whether every corner coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }

    /// Grows this box to also cover `other`.
    pub fn expand(&mut self, other: &Self) {
        for axis in 0..D {
            self.min[axis] = self.min[axis].min(other.min[axis]);
            self.max[axis] = self.max[axis].max(other.max[axis]);
        }
    }

    /// The smallest box covering both inputs.
    pub fn union(mut self, other: &Self) -> Self {
        self.expand(other);
        self
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &Self) -> bool {
        if other.is_empty() {
            return true;
        }
        (0..D).all(|axis| self.min[axis] <= other.min[axis] && other.max[axis] <= self.max[axis])
    }

    pub fn contains_point(&self, point: &[f64; D]) -> bool {
        (0..D).all(|axis| self.min[axis] <= point[axis] && point[axis] <= self.max[axis])
    }

    /// Whether the two closed boxes share at least one point.
    pub fn intersects(&self, other: &Self) -> bool {
        (0..D).all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }

    pub fn centroid(&self) -> [f64; D] {
        let mut c = [0.0; D];
        for axis in 0..D {
            c[axis] = 0.5 * (self.min[axis] + self.max[axis]);
        }
        c
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// Squared Euclidean distance from `point` to the closest point of the box.
    ///
    /// Zero when the point is inside.
    pub fn distance_sq_to_point(&self, point: &[f64; D]) -> f64 {
        let mut d2 = 0.0;
        for axis in 0..D {
            let d = (self.min[axis] - point[axis]).max(0.0).max(point[axis] - self.max[axis]);
            d2 += d * d;
        }
        d2
    }
}

impl<const D: usize> Default for BoundingBox<D> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_union_identity() {
        let b = BoundingBox::new([0.0, 1.0], [2.0, 3.0]);
        assert!(BoundingBox::<2>::empty().is_empty());
        assert_eq!(BoundingBox::empty().union(&b), b);
        assert!(b.contains(&BoundingBox::empty()));
    }

    #[test]
    fn union_contains_both() {
        let a = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = BoundingBox::new([2.0, -1.0, 0.5], [3.0, 0.0, 4.0]);
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u.min, [0.0, -1.0, 0.0]);
        assert_eq!(u.max, [3.0, 1.0, 4.0]);
    }

    #[test]
    fn distance_to_box() {
        let b = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
        assert_eq!(b.distance_sq_to_point(&[0.5, 0.5]), 0.0);
        assert_eq!(b.distance_sq_to_point(&[1.0, 1.0]), 0.0);
        assert_eq!(b.distance_sq_to_point(&[4.0, 0.5]), 9.0);
        assert_eq!(b.distance_sq_to_point(&[-3.0, 5.0]), 25.0);
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = BoundingBox::new([0.0, 0.0], [1.0, 1.0]);
        let b = BoundingBox::new([1.0, 0.0], [2.0, 1.0]);
        let c = BoundingBox::new([1.5, 0.0], [2.0, 1.0]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn finiteness() {
        assert!(BoundingBox::from_point([1.0, 2.0]).is_finite());
        assert!(!BoundingBox::from_point([f64::NAN, 2.0]).is_finite());
        assert!(!BoundingBox::<2>::empty().is_finite());
    }
}
