use crate::bounds::BoundingBox;
use crate::error::{Error, Result};
use rand::Rng;

/// Anything the hierarchy can index: it only needs an axis-aligned bounding box.
pub trait Primitive<const D: usize>: Send + Sync {
    fn bounding_box(&self) -> BoundingBox<D>;
}

/// A single-precision point in `D`-dimensional space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point<const D: usize>(pub [f32; D]);

impl<const D: usize> Point<D> {
    pub fn new(coords: [f32; D]) -> Self {
        Self(coords)
    }

    /// Coordinates widened to `f64`, which is exact for every `f32` value.
    pub fn coords(&self) -> [f64; D] {
        self.0.map(f64::from)
    }
}

impl<const D: usize> Primitive<D> for Point<D> {
    fn bounding_box(&self) -> BoundingBox<D> {
        BoundingBox::from_point(self.coords())
    }
}

impl<const D: usize> Primitive<D> for BoundingBox<D> {
    fn bounding_box(&self) -> BoundingBox<D> {
        *self
    }
}

/// Immutable, ordered set of primitives indexed `0..len`.
#[derive(Clone, Debug)]
pub struct PrimitiveStore<P> {
    items: Vec<P>,
}

impl<P> PrimitiveStore<P> {
    pub fn new(items: Vec<P>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&P> {
        self.items.get(index)
    }

    pub fn as_slice(&self) -> &[P] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.items.iter()
    }
}

impl<P> std::ops::Index<usize> for PrimitiveStore<P> {
    type Output = P;

    fn index(&self, index: usize) -> &P {
        &self.items[index]
    }
}

impl<P> From<Vec<P>> for PrimitiveStore<P> {
    fn from(items: Vec<P>) -> Self {
        Self::new(items)
    }
}

impl<const D: usize> PrimitiveStore<Point<D>> {
    /// Reads points from a flat row-major buffer `[x0, y0, z0, x1, y1, z1, ...]`.
    pub fn from_flat(coords: &[f32]) -> Result<Self> {
        if D == 0 || coords.len() % D != 0 {
            return Err(Error::MisalignedCoordinates {
                len: coords.len(),
                dim: D,
            });
        }
        let items = coords
            .chunks_exact(D)
            .map(|chunk| {
                let mut p = [0.0f32; D];
                p.copy_from_slice(chunk);
                Point(p)
            })
            .collect();
        Ok(Self { items })
    }

    /// Writes the points back into a flat row-major buffer.
    pub fn to_flat(&self) -> Vec<f32> {
        self.items.iter().flat_map(|p| p.0).collect()
    }

    /// Fills `bounds` with `count` uniformly distributed points.
    pub fn random(count: usize, bounds: &BoundingBox<D>) -> Self {
        Self::random_with(&mut rand::thread_rng(), count, bounds)
    }

    /// Like [`PrimitiveStore::random`] but driven by a caller-supplied generator.
    pub fn random_with<R: Rng + ?Sized>(
        rng: &mut R,
        count: usize,
        bounds: &BoundingBox<D>,
    ) -> Self {
        let items = (0..count)
            .map(|_| {
                let mut p = [0.0f32; D];
                for axis in 0..D {
                    let t: f64 = rng.r#gen();
                    p[axis] = (bounds.min[axis] + t * bounds.extent(axis)) as f32;
                }
                Point(p)
            })
            .collect();
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_flat_buffer() {
        let store = PrimitiveStore::<Point<3>>::from_flat(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store[1], Point([3.0, 4.0, 5.0]));
        assert_eq!(store.to_flat(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn rejects_misaligned_buffer() {
        let err = PrimitiveStore::<Point<3>>::from_flat(&[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::MisalignedCoordinates { len: 2, dim: 3 }));
    }

    #[test]
    fn random_points_stay_in_bounds() {
        let bounds = BoundingBox::new([-1.0, 0.0], [1.0, 10.0]);
        let store = PrimitiveStore::<Point<2>>::random(200, &bounds);
        assert_eq!(store.len(), 200);
        assert!(store.iter().all(|p| bounds.contains_point(&p.coords())));
    }

    #[test]
    fn point_box_is_degenerate() {
        let b = Point([1.0f32, -2.0]).bounding_box();
        assert_eq!(b.min, b.max);
        assert_eq!(b.min, [1.0, -2.0]);
    }
}
