use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by hierarchy construction, queries and clustering.
///
/// Invalid inputs are rejected before any parallel work is issued, and a failed
/// construction never leaves a partially built hierarchy behind.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Tree construction was asked to index zero primitives.
    #[error("cannot build a bounding volume hierarchy over an empty primitive set")]
    EmptyPrimitives,
    /// `min_pts` must be at least 1.
    #[error("min_pts must be at least 1 (got {got})")]
    InvalidMinPts { got: usize },
    /// A search radius was negative or not finite.
    #[error("radius must be finite and non-negative (got {got})")]
    InvalidRadius { got: f64 },
    /// A flat coordinate buffer does not hold a whole number of points.
    #[error("coordinate buffer of length {len} is not a multiple of dimension {dim}")]
    MisalignedCoordinates { len: usize, dim: usize },
    /// A primitive has a NaN or infinite coordinate.
    #[error("primitive {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
    /// Cluster filtering needs a minimum size of at least 1.
    #[error("cluster_min_size must be at least 1 (got {got})")]
    InvalidClusterMinSize { got: usize },
    /// Labels are `i32`, so at most `i32::MAX` primitives can be clustered.
    #[error("cannot label {count} primitives with 32-bit cluster ids")]
    TooManyPrimitives { count: usize },
    /// A cluster label does not name a primitive of the labelled set.
    #[error("label {label} of primitive {index} is out of range")]
    InvalidLabel { index: usize, label: i32 },
    /// The connected-component core points are only exact for `min_pts <= 2`.
    #[error("connected-component core points require min_pts <= 2 (got {min_pts})")]
    UnsupportedCorePoints { min_pts: usize },
    /// Memory for the tree or the disjoint-set forest could not be reserved.
    #[error("failed to allocate {what} for {count} elements")]
    ResourceExhaustion {
        what: &'static str,
        count: usize,
        #[source]
        source: TryReserveError,
    },
    /// The thread pool backing an execution space could not be created.
    #[error("failed to create execution space")]
    ExecutionSpace(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Returns `true` for errors caused by caller-supplied arguments.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::EmptyPrimitives
                | Error::InvalidMinPts { .. }
                | Error::InvalidRadius { .. }
                | Error::MisalignedCoordinates { .. }
                | Error::NonFiniteCoordinate { .. }
                | Error::InvalidClusterMinSize { .. }
                | Error::TooManyPrimitives { .. }
                | Error::InvalidLabel { .. }
                | Error::UnsupportedCorePoints { .. }
        )
    }

    /// Returns `true` when an allocation or the execution space itself failed.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Error::ResourceExhaustion { .. } | Error::ExecutionSpace(_))
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Reserves room for `count` elements or reports which buffer could not be allocated.
pub(crate) fn try_with_capacity<T>(what: &'static str, count: usize) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(count)
        .map_err(|source| Error::ResourceExhaustion { what, count, source })?;
    Ok(buffer)
}

/// Checks that `radius` can be used for a sphere query.
pub(crate) fn validate_radius(radius: f64) -> Result<()> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidRadius { got: radius })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_invalid_input() {
        assert!(Error::EmptyPrimitives.is_invalid_input());
        assert!(Error::InvalidMinPts { got: 0 }.is_invalid_input());
        assert!(!Error::EmptyPrimitives.is_resource_exhaustion());
    }

    #[test]
    fn rejects_bad_radii() {
        assert!(validate_radius(0.0).is_ok());
        assert!(validate_radius(2.5).is_ok());
        assert!(matches!(validate_radius(-1.0), Err(Error::InvalidRadius { .. })));
        assert!(validate_radius(f64::NAN).is_err());
        assert!(validate_radius(f64::INFINITY).is_err());
    }

    #[test]
    fn reports_impossible_reservations() {
        let err = try_with_capacity::<u64>("test buffer", usize::MAX).unwrap_err();
        assert!(err.is_resource_exhaustion());
        assert!(err.to_string().contains("test buffer"));
    }
}
