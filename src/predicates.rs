use crate::bounds::BoundingBox;
use crate::error::{Result, validate_radius};
use crate::primitives::{Primitive, PrimitiveStore};

/// A spatial query shape that the hierarchy can be traversed against.
///
/// Traversal calls [`Predicate::overlaps`] on internal node boxes (broad phase,
/// must never reject a box that could hold a match) and [`Predicate::matches`] on
/// the box of every leaf it reaches (narrow phase).
pub trait Predicate<const D: usize> {
    fn overlaps(&self, bounds: &BoundingBox<D>) -> bool;

    fn matches(&self, bounds: &BoundingBox<D>) -> bool {
        self.overlaps(bounds)
    }

    /// Box enclosing the query shape, used to order predicates before traversal.
    fn bounding_box(&self) -> BoundingBox<D>;
}

/// Closed ball: matches primitives whose box lies within `radius` of `center`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere<const D: usize> {
    pub center: [f64; D],
    pub radius: f64,
}

impl<const D: usize> Sphere<D> {
    pub fn new(center: [f64; D], radius: f64) -> Self {
        Self { center, radius }
    }
}

impl<const D: usize> Predicate<D> for Sphere<D> {
    #[inline]
    fn overlaps(&self, bounds: &BoundingBox<D>) -> bool {
        bounds.distance_sq_to_point(&self.center) <= self.radius * self.radius
    }

    fn bounding_box(&self) -> BoundingBox<D> {
        let mut b = BoundingBox::from_point(self.center);
        for axis in 0..D {
            b.min[axis] -= self.radius;
            b.max[axis] += self.radius;
        }
        b
    }
}

/// Matches primitives whose box intersects the given box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intersects<const D: usize>(pub BoundingBox<D>);

impl<const D: usize> Predicate<D> for Intersects<D> {
    #[inline]
    fn overlaps(&self, bounds: &BoundingBox<D>) -> bool {
        self.0.intersects(bounds)
    }

    fn bounding_box(&self) -> BoundingBox<D> {
        self.0
    }
}

/// An indexed collection of predicates, one traversal lane each.
pub trait Predicates<const D: usize>: Sync {
    type Item: Predicate<D>;

    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Self::Item;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const D: usize, T> Predicates<D> for [T]
where
    T: Predicate<D> + Clone + Sync,
{
    type Item = T;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, index: usize) -> T {
        self[index].clone()
    }
}

impl<const D: usize, T> Predicates<D> for Vec<T>
where
    T: Predicate<D> + Clone + Sync,
{
    type Item = T;

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> T {
        self[index].clone()
    }
}

/// One sphere of a shared radius centred on each primitive of a store.
///
/// This is the neighbourhood query of density clustering: predicate `i` is the
/// `radius`-ball around primitive `i`, so every primitive finds itself.
#[derive(Debug)]
pub struct PrimitivesWithRadius<'a, P> {
    primitives: &'a PrimitiveStore<P>,
    radius: f64,
}

impl<'a, P> PrimitivesWithRadius<'a, P> {
    pub fn new(primitives: &'a PrimitiveStore<P>, radius: f64) -> Result<Self> {
        validate_radius(radius)?;
        Ok(Self { primitives, radius })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl<P> Clone for PrimitivesWithRadius<'_, P> {
    fn clone(&self) -> Self {
        Self {
            primitives: self.primitives,
            radius: self.radius,
        }
    }
}

impl<const D: usize, P: Primitive<D>> Predicates<D> for PrimitivesWithRadius<'_, P> {
    type Item = Sphere<D>;

    fn len(&self) -> usize {
        self.primitives.len()
    }

    fn get(&self, index: usize) -> Sphere<D> {
        Sphere::new(self.primitives[index].bounding_box().centroid(), self.radius)
    }
}
