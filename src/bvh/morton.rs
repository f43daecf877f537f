//! Morton codes (Z-order curve keys) for ordering boxes along a space-filling curve.
//!
//! A centroid is normalised to the scene box, quantised to `63 / D` bits per axis
//! (21 bits in 3-D, capped at 32) and the axis bits are interleaved, most
//! significant bit first, with axis 0 taking the highest position of each group.
//! Points that are close in space tend to receive close codes, so sorting by code
//! groups neighbouring primitives into neighbouring leaves.

use crate::bounds::BoundingBox;

const MORTON_BITS: u32 = 63;

/// Bits spent on each axis for a `D`-dimensional code.
pub(crate) const fn bits_per_axis<const D: usize>() -> u32 {
    if D == 0 {
        return 0;
    }
    let bits = MORTON_BITS / D as u32;
    if bits > 32 { 32 } else { bits }
}

/// Interleaves the low `bits` bits of each quantised coordinate.
pub(crate) fn interleave<const D: usize>(cells: [u64; D], bits: u32) -> u64 {
    let mut code = 0u64;
    for bit in (0..bits).rev() {
        for cell in cells.iter() {
            code = (code << 1) | ((cell >> bit) & 1);
        }
    }
    code
}

/// Morton code of `point` relative to `scene`.
///
/// Points outside the scene are clamped onto it; a degenerate axis (zero extent)
/// contributes zeros.
pub(crate) fn morton_code<const D: usize>(point: &[f64; D], scene: &BoundingBox<D>) -> u64 {
    let bits = bits_per_axis::<D>();
    let max_cell = ((1u64 << bits) - 1) as f64;
    let mut cells = [0u64; D];
    for axis in 0..D {
        let extent = scene.extent(axis);
        let t = if extent > 0.0 {
            ((point[axis] - scene.min[axis]) / extent).clamp(0.0, 1.0)
        } else {
            0.0
        };
        cells[axis] = (t * max_cell) as u64;
    }
    interleave(cells, bits)
}
