//! 3-D Morton (Z-order) keys and bounding-box range decomposition.
//!
//! Coordinates are 21-bit unsigned integers per axis; interleaving their
//! bits yields a 63-bit code that fits a non-negative `i64` key. Nearby
//! points in space land on nearby keys, which is what makes short range
//! scans effective for spatial queries.
//!
//! [`z_ranges`] turns an axis-aligned box into a small set of disjoint key
//! ranges by descending the implicit octree: a cell fully inside the box
//! contributes its whole (contiguous) code range, a partially covered cell
//! is split into its eight children, and once the range budget is spent the
//! remaining cells are emitted coarsely. Callers filter scan results with
//! [`in_box`], so coarse ranges cost extra scanning, never correctness.

use anyhow::{bail, Result};

/// Exclusive upper bound per axis (21 bits).
pub const COORD_LIMIT: u32 = 1 << 21;

/// Cap on ranges emitted by [`z_ranges`] before cells stop splitting.
const MAX_RANGES: usize = 128;

/// Encodes a 3-D coordinate into its Morton key.
///
/// # Errors
///
/// Fails if any coordinate is `>= 2^21`.
pub fn encode3d(x: u32, y: u32, z: u32) -> Result<i64> {
    if x >= COORD_LIMIT || y >= COORD_LIMIT || z >= COORD_LIMIT {
        bail!("coordinate out of bounds (max {})", COORD_LIMIT - 1);
    }
    let code = split_by3(x) | (split_by3(y) << 1) | (split_by3(z) << 2);
    Ok(code as i64)
}

/// Decodes a Morton key back into `(x, y, z)`.
#[must_use]
pub fn decode3d(code: i64) -> (u32, u32, u32) {
    let c = code as u64;
    (compact_by3(c), compact_by3(c >> 1), compact_by3(c >> 2))
}

/// `true` if `key` decodes to a coordinate inside the inclusive box.
#[must_use]
pub fn in_box(key: i64, min: (u32, u32, u32), max: (u32, u32, u32)) -> bool {
    let (x, y, z) = decode3d(key);
    (min.0..=max.0).contains(&x) && (min.1..=max.1).contains(&y) && (min.2..=max.2).contains(&z)
}

/// Decomposes an inclusive bounding box into sorted, disjoint, merged
/// Z-order key ranges covering (at least) the box.
///
/// # Errors
///
/// Fails if any coordinate is out of bounds or a min exceeds its max.
pub fn z_ranges(min: (u32, u32, u32), max: (u32, u32, u32)) -> Result<Vec<(i64, i64)>> {
    if max.0 >= COORD_LIMIT || max.1 >= COORD_LIMIT || max.2 >= COORD_LIMIT {
        bail!("coordinate out of bounds (max {})", COORD_LIMIT - 1);
    }
    if min.0 > max.0 || min.1 > max.1 || min.2 > max.2 {
        bail!("inverted bounding box");
    }

    let mut ranges: Vec<(u64, u64)> = Vec::new();
    descend(0, 0, 0, 21, min, max, &mut ranges);

    // Merge touching/overlapping neighbors into maximal runs.
    ranges.sort_unstable();
    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match merged.last_mut() {
            Some(last) if lo <= last.1 as u64 + 1 => {
                last.1 = last.1.max(hi as i64);
            }
            _ => merged.push((lo as i64, hi as i64)),
        }
    }
    Ok(merged)
}

/// Recursive octree descent. `(cx, cy, cz)` address the cell in units of
/// its own side length `2^level`.
fn descend(
    cx: u32,
    cy: u32,
    cz: u32,
    level: u32,
    min: (u32, u32, u32),
    max: (u32, u32, u32),
    out: &mut Vec<(u64, u64)>,
) {
    let side = 1u32 << level;
    let (x0, y0, z0) = (cx << level, cy << level, cz << level);
    let (x1, y1, z1) = (x0 + side - 1, y0 + side - 1, z0 + side - 1);

    // Disjoint from the box: nothing to emit.
    if x0 > max.0 || x1 < min.0 || y0 > max.1 || y1 < min.1 || z0 > max.2 || z1 < min.2 {
        return;
    }

    let contained =
        x0 >= min.0 && x1 <= max.0 && y0 >= min.1 && y1 <= max.1 && z0 >= min.2 && z1 <= max.2;

    // An octree-aligned cell covers one contiguous code run: the interleave
    // of its origin, followed by 8^level consecutive codes.
    if contained || level == 0 || out.len() >= MAX_RANGES {
        let base = (split_by3(x0) | (split_by3(y0) << 1) | (split_by3(z0) << 2)) as u64;
        let span = 1u64 << (3 * level);
        out.push((base, base + span - 1));
        return;
    }

    for dz in 0..2u32 {
        for dy in 0..2u32 {
            for dx in 0..2u32 {
                descend(
                    (cx << 1) | dx,
                    (cy << 1) | dy,
                    (cz << 1) | dz,
                    level - 1,
                    min,
                    max,
                    out,
                );
            }
        }
    }
}

/// Spreads the low 21 bits of `a` so consecutive bits land three apart.
fn split_by3(a: u32) -> u64 {
    let mut x = a as u64 & 0x1f_ffff;
    x = (x | x << 32) & 0x001f_0000_0000_ffff;
    x = (x | x << 16) & 0x001f_0000_ff00_00ff;
    x = (x | x << 8) & 0x100f_00f0_0f00_f00f;
    x = (x | x << 4) & 0x10c3_0c30_c30c_30c3;
    x = (x | x << 2) & 0x1249_2492_4924_9249;
    x
}

/// Inverse of [`split_by3`].
fn compact_by3(x: u64) -> u32 {
    let mut x = x & 0x1249_2492_4924_9249;
    x = (x ^ (x >> 2)) & 0x10c3_0c30_c30c_30c3;
    x = (x ^ (x >> 4)) & 0x100f_00f0_0f00_f00f;
    x = (x ^ (x >> 8)) & 0x001f_0000_ff00_00ff;
    x = (x ^ (x >> 16)) & 0x001f_0000_0000_ffff;
    x = (x ^ (x >> 32)) & 0x1f_ffff;
    x as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        for &(x, y, z) in &[
            (0u32, 0u32, 0u32),
            (1, 2, 3),
            (100, 200, 300),
            (COORD_LIMIT - 1, COORD_LIMIT - 1, COORD_LIMIT - 1),
            (0, COORD_LIMIT - 1, 12345),
        ] {
            let code = encode3d(x, y, z).unwrap();
            assert!(code >= 0);
            assert_eq!(decode3d(code), (x, y, z), "({x},{y},{z})");
        }
    }

    #[test]
    fn out_of_bounds_coordinates_are_rejected() {
        assert!(encode3d(COORD_LIMIT, 0, 0).is_err());
        assert!(encode3d(0, COORD_LIMIT, 0).is_err());
        assert!(encode3d(0, 0, u32::MAX).is_err());
    }

    #[test]
    fn interleaving_is_monotone_per_axis() {
        // Raising one coordinate raises the code.
        let a = encode3d(5, 7, 9).unwrap();
        let b = encode3d(6, 7, 9).unwrap();
        assert!(b > a);
    }

    #[test]
    fn in_box_matches_decoded_coordinates() {
        let key = encode3d(10, 20, 30).unwrap();
        assert!(in_box(key, (10, 20, 30), (10, 20, 30)));
        assert!(in_box(key, (0, 0, 0), (100, 100, 100)));
        assert!(!in_box(key, (11, 0, 0), (100, 100, 100)));
        assert!(!in_box(key, (0, 0, 0), (100, 19, 100)));
    }

    #[test]
    fn ranges_cover_every_point_in_the_box() {
        let min = (3u32, 5u32, 2u32);
        let max = (9u32, 8u32, 6u32);
        let ranges = z_ranges(min, max).unwrap();
        assert!(!ranges.is_empty());

        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                for z in min.2..=max.2 {
                    let code = encode3d(x, y, z).unwrap();
                    assert!(
                        ranges.iter().any(|&(lo, hi)| lo <= code && code <= hi),
                        "({x},{y},{z}) code {code} not covered"
                    );
                }
            }
        }
    }

    #[test]
    fn ranges_are_sorted_disjoint_and_bounded() {
        let ranges = z_ranges((0, 0, 0), (1000, 500, 250)).unwrap();
        // Sibling cells merge into contiguous runs, so the budget holds
        // loosely even when the descent was cut short.
        assert!(ranges.len() <= 2 * MAX_RANGES);
        for pair in ranges.windows(2) {
            assert!(pair[0].1 < pair[1].0, "ranges overlap or touch unmerged");
        }
    }

    #[test]
    fn single_point_box_yields_single_code() {
        let ranges = z_ranges((7, 7, 7), (7, 7, 7)).unwrap();
        let code = encode3d(7, 7, 7).unwrap();
        assert_eq!(ranges, vec![(code, code)]);
    }

    #[test]
    fn full_space_is_one_range() {
        let lim = COORD_LIMIT - 1;
        let ranges = z_ranges((0, 0, 0), (lim, lim, lim)).unwrap();
        assert_eq!(ranges, vec![(0, i64::MAX)]);
    }

    #[test]
    fn inverted_box_is_rejected() {
        assert!(z_ranges((5, 0, 0), (1, 10, 10)).is_err());
    }
}
