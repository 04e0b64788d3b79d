//! # Query Engine
//!
//! Stateless range algorithms over [`SpatialHash`] buckets.
//!
//! Every query visits only the buckets that can contain a match, so cost is
//! bounded by the query footprint and the occupants inside it, never by grid
//! area. Distances are measured between cell coordinates.

use std::cmp::Ordering;

use super::hash::{BucketCoord, SpatialHash};
use crate::grid::ParticleRef;

/// A point in grid space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    /// Column coordinate.
    pub x: f32,
    /// Row coordinate.
    pub y: f32,
}

impl Point {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// A bucket whose occupant count exceeded a density threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DenseRegion {
    /// The bucket.
    pub bucket: BucketCoord,
    /// Top-left grid cell of the bucket.
    pub origin: (u32, u32),
    /// Occupants in the bucket.
    pub count: usize,
}

/// Inclusive bucket rectangle.
#[derive(Clone, Copy, Debug)]
struct BucketRange {
    min: BucketCoord,
    max: BucketCoord,
}

impl BucketRange {
    /// Buckets covering the cells in `[lo, hi]` on both axes, clipped to
    /// the populated extent. `None` if nothing populated can intersect.
    fn covering(hash: &SpatialHash, lo: (f64, f64), hi: (f64, f64)) -> Option<Self> {
        let extent = hash.extent()?;
        let (min_x, max_x) = cell_span(lo.0, hi.0)?;
        let (min_y, max_y) = cell_span(lo.1, hi.1)?;
        let cs = hash.cell_size();
        let min = BucketCoord::new(min_x / cs, min_y / cs);
        let max = BucketCoord::new((max_x / cs).min(extent.x), (max_y / cs).min(extent.y));
        (min.x <= max.x && min.y <= max.y).then_some(Self { min, max })
    }

    fn for_each_entry<F>(self, hash: &SpatialHash, mut f: F)
    where
        F: FnMut(ParticleRef),
    {
        for by in self.min.y..=self.max.y {
            for bx in self.min.x..=self.max.x {
                hash.entries(BucketCoord::new(bx, by)).for_each(&mut f);
            }
        }
    }
}

/// Integer cells in `[lo, hi]`, clipped below at zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cell_span(lo: f64, hi: f64) -> Option<(u32, u32)> {
    if !(lo <= hi) || hi < 0.0 {
        return None;
    }
    let first = lo.ceil().max(0.0);
    let last = hi.floor().min(f64::from(u32::MAX));
    (first <= last).then(|| (first as u32, last as u32))
}

fn distance_squared(entry: ParticleRef, point: Point) -> f64 {
    let dx = f64::from(entry.x()) - f64::from(point.x);
    let dy = f64::from(entry.y()) - f64::from(point.y);
    dx * dx + dy * dy
}

/// Ascending distance, then column, then row.
fn by_distance(a: &(f64, ParticleRef), b: &(f64, ParticleRef)) -> Ordering {
    a.0.total_cmp(&b.0)
        .then_with(|| a.1.x().cmp(&b.1.x()))
        .then_with(|| a.1.y().cmp(&b.1.y()))
}

/// Every entry in the buckets covering the cells within `radius` cells of
/// `(x, y)` on both axes. Bucket granularity, no exact filtering. The
/// neighborhood is clipped to the grid, so `(x, y)` may lie outside it.
#[must_use]
pub fn area(hash: &SpatialHash, x: i32, y: i32, radius: u32) -> Vec<ParticleRef> {
    let r = f64::from(radius);
    let lo = (f64::from(x) - r, f64::from(y) - r);
    let hi = (f64::from(x) + r, f64::from(y) + r);
    let mut out = Vec::new();
    if let Some(range) = BucketRange::covering(hash, lo, hi) {
        range.for_each_entry(hash, |entry| out.push(entry));
    }
    out
}

/// Entries whose Euclidean distance to `center` is at most `radius`.
///
/// A negative or non-finite radius matches nothing.
#[must_use]
pub fn radius(hash: &SpatialHash, center: Point, radius: f32) -> Vec<ParticleRef> {
    if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
        return Vec::new();
    }
    let (cx, cy, r) = (f64::from(center.x), f64::from(center.y), f64::from(radius));
    let limit = r * r;
    let mut out = Vec::new();
    if let Some(range) = BucketRange::covering(hash, (cx - r, cy - r), (cx + r, cy + r)) {
        range.for_each_entry(hash, |entry| {
            if distance_squared(entry, center) <= limit {
                out.push(entry);
            }
        });
    }
    out
}

/// Entries inside the closed rectangle `[min, max]`.
///
/// An inverted rectangle matches nothing.
#[must_use]
pub fn boxed(hash: &SpatialHash, min: Point, max: Point) -> Vec<ParticleRef> {
    let lo = (f64::from(min.x), f64::from(min.y));
    let hi = (f64::from(max.x), f64::from(max.y));
    let mut out = Vec::new();
    // Integer cells inside [lo, hi] are exactly those the covering range
    // enumerates after the per-cell check.
    if let Some(range) = BucketRange::covering(hash, lo, hi) {
        range.for_each_entry(hash, |entry| {
            let (x, y) = (f64::from(entry.x()), f64::from(entry.y()));
            if x >= lo.0 && x <= hi.0 && y >= lo.1 && y <= hi.1 {
                out.push(entry);
            }
        });
    }
    out
}

/// Up to `k` entries nearest to `point`, ascending by distance with ties
/// broken by column then row.
///
/// Buckets are visited in square rings around the point's bucket, clamped
/// to one bucket outside the populated extent. The search stops once `k`
/// candidates are known and every unvisited populated bucket is strictly
/// farther than the k-th candidate, or once every entry has been seen.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn k_nearest(hash: &SpatialHash, point: Point, k: usize) -> Vec<ParticleRef> {
    let Some(extent) = hash.extent() else {
        return Vec::new();
    };
    if k == 0 || hash.is_empty() || !point.is_finite() {
        return Vec::new();
    }

    let cs = f64::from(hash.cell_size());
    let (px, py) = (f64::from(point.x), f64::from(point.y));
    let (ex, ey) = (i64::from(extent.x), i64::from(extent.y));
    // Clamped in f64 so far-away points cannot saturate the cast.
    let bx = (px / cs).floor().clamp(-1.0, (ex + 1) as f64) as i64;
    let by = (py / cs).floor().clamp(-1.0, (ey + 1) as f64) as i64;
    let max_ring = bx.abs().max((ex - bx).abs()).max(by.abs()).max((ey - by).abs());

    let mut candidates: Vec<(f64, ParticleRef)> = Vec::new();
    for ring in 0..=max_ring {
        visit_ring(bx, by, ring, ex, ey, |coord| {
            candidates.extend(hash.entries(coord).map(|e| (distance_squared(e, point), e)));
        });
        if candidates.len() == hash.len() {
            break;
        }
        if candidates.len() >= k {
            let bound = unvisited_bound(px, py, cs, (bx, by), ring, (ex, ey));
            candidates.select_nth_unstable_by(k - 1, by_distance);
            if candidates[k - 1].0 < bound * bound {
                break;
            }
        }
    }

    candidates.sort_unstable_by(by_distance);
    candidates.truncate(k);
    candidates.into_iter().map(|(_, e)| e).collect()
}

/// Lower bound on the distance from `(px, py)` to any cell in a populated
/// bucket outside the square of `ring` around bucket `(bx, by)`. Sides with no
/// populated buckets beyond them do not constrain the bound.
#[allow(clippy::cast_precision_loss)]
fn unvisited_bound(
    px: f64,
    py: f64,
    cs: f64,
    (bx, by): (i64, i64),
    ring: i64,
    (ex, ey): (i64, i64),
) -> f64 {
    let mut bound = f64::INFINITY;
    if bx - ring > 0 {
        let edge = ((bx - ring) as f64) * cs - 1.0;
        bound = bound.min((px - edge).max(0.0));
    }
    if bx + ring < ex {
        let edge = ((bx + ring + 1) as f64) * cs;
        bound = bound.min((edge - px).max(0.0));
    }
    if by - ring > 0 {
        let edge = ((by - ring) as f64) * cs - 1.0;
        bound = bound.min((py - edge).max(0.0));
    }
    if by + ring < ey {
        let edge = ((by + ring + 1) as f64) * cs;
        bound = bound.min((edge - py).max(0.0));
    }
    bound
}

/// Calls `f` for every populated-range bucket at Chebyshev distance `ring`
/// from `(bx, by)`, clipped to `[0, ex] x [0, ey]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn visit_ring<F>(bx: i64, by: i64, ring: i64, ex: i64, ey: i64, mut f: F)
where
    F: FnMut(BucketCoord),
{
    let in_x = |x: i64| (0..=ex).contains(&x);
    let in_y = |y: i64| (0..=ey).contains(&y);
    let mut visit = |x: i64, y: i64| f(BucketCoord::new(x as u32, y as u32));

    if ring == 0 {
        if in_x(bx) && in_y(by) {
            visit(bx, by);
        }
        return;
    }

    let (x0, x1, y0, y1) = (bx - ring, bx + ring, by - ring, by + ring);
    let (cx0, cx1) = (x0.max(0), x1.min(ex));
    for y in [y0, y1] {
        if in_y(y) {
            for x in cx0..=cx1 {
                visit(x, y);
            }
        }
    }
    let (cy0, cy1) = ((y0 + 1).max(0), (y1 - 1).min(ey));
    for x in [x0, x1] {
        if in_x(x) {
            for y in cy0..=cy1 {
                visit(x, y);
            }
        }
    }
}

/// Buckets holding more than `threshold` entries, densest first, ties by
/// bucket coordinate.
#[must_use]
pub fn dense_regions(hash: &SpatialHash, threshold: usize) -> Vec<DenseRegion> {
    let cs = hash.cell_size();
    let mut regions: Vec<DenseRegion> = hash
        .buckets()
        .filter(|&(_, count)| count > threshold)
        .map(|(bucket, count)| DenseRegion {
            bucket,
            origin: (bucket.x.saturating_mul(cs), bucket.y.saturating_mul(cs)),
            count,
        })
        .collect();
    regions.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.bucket.cmp(&b.bucket)));
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::memory::AllocationMonitor;

    fn populated(cells: &[(u32, u32)]) -> SpatialHash {
        let grid = Grid::new(200, 200);
        let mut hash = SpatialHash::new(AllocationMonitor::new());
        for &(x, y) in cells {
            hash.insert(grid.particle_ref(x, y).unwrap(), x, y);
        }
        hash
    }

    fn positions(refs: &[ParticleRef]) -> Vec<(u32, u32)> {
        let mut out: Vec<_> = refs.iter().map(|r| r.position()).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let hash = populated(&[]);
        assert!(area(&hash, 5, 5, 1).is_empty());
        assert!(radius(&hash, Point::new(5.0, 5.0), 10.0).is_empty());
        assert!(boxed(&hash, Point::new(0.0, 0.0), Point::new(50.0, 50.0)).is_empty());
        assert!(k_nearest(&hash, Point::new(5.0, 5.0), 3).is_empty());
        assert!(dense_regions(&hash, 0).is_empty());
    }

    #[test]
    fn test_radius_is_exact() {
        let hash = populated(&[(50, 50), (53, 54), (54, 54), (60, 50)]);
        let hits = radius(&hash, Point::new(50.0, 50.0), 5.0);
        // (53,54) is exactly 5 away, (54,54) is not.
        assert_eq!(positions(&hits), vec![(50, 50), (53, 54)]);
        assert!(radius(&hash, Point::new(50.0, 50.0), -1.0).is_empty());
    }

    #[test]
    fn test_radius_spans_buckets() {
        let hash = populated(&[(15, 15), (16, 16), (17, 14)]);
        let hits = radius(&hash, Point::new(16.0, 15.0), 1.5);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_box_is_closed() {
        let hash = populated(&[(45, 45), (55, 55), (56, 50), (44, 50), (50, 50)]);
        let hits = boxed(&hash, Point::new(45.0, 45.0), Point::new(55.0, 55.0));
        assert_eq!(positions(&hits), vec![(45, 45), (50, 50), (55, 55)]);
        assert!(boxed(&hash, Point::new(55.0, 55.0), Point::new(45.0, 45.0)).is_empty());
    }

    #[test]
    fn test_box_with_negative_corner() {
        let hash = populated(&[(0, 0), (3, 3)]);
        let hits = boxed(&hash, Point::new(-10.0, -10.0), Point::new(1.0, 1.0));
        assert_eq!(positions(&hits), vec![(0, 0)]);
    }

    #[test]
    fn test_k_nearest_order_and_ties() {
        let hash = populated(&[(52, 50), (48, 50), (50, 50), (50, 53), (51, 50)]);
        let hits = k_nearest(&hash, Point::new(50.0, 50.0), 4);
        let got: Vec<_> = hits.iter().map(|r| r.position()).collect();
        assert_eq!(got, vec![(50, 50), (51, 50), (48, 50), (52, 50)]);
    }

    #[test]
    fn test_k_nearest_caps_at_population() {
        let hash = populated(&[(1, 1), (150, 150)]);
        assert_eq!(k_nearest(&hash, Point::new(0.0, 0.0), 10).len(), 2);
    }

    #[test]
    fn test_k_nearest_crosses_bucket_boundary() {
        // The point sits at the right edge of bucket 0; the true nearest
        // occupant lives in bucket 1, a farther one in bucket 0.
        let hash = populated(&[(16, 8), (2, 8)]);
        let hits = k_nearest(&hash, Point::new(15.0, 8.0), 1);
        assert_eq!(hits[0].position(), (16, 8));
    }

    #[test]
    fn test_k_nearest_from_far_away() {
        let hash = populated(&[(3, 3)]);
        for point in [
            Point::new(f32::MAX, 0.0),
            Point::new(1e12, 0.0),
            Point::new(-f32::MAX, f32::MAX),
            Point::new(0.0, -1e12),
        ] {
            let hits = k_nearest(&hash, point, 1);
            assert_eq!(positions(&hits), vec![(3, 3)], "from {point:?}");
        }
    }

    #[test]
    fn test_k_nearest_far_away_keeps_order() {
        let hash = populated(&[(0, 0), (30, 30), (199, 0), (199, 120)]);
        let hits = k_nearest(&hash, Point::new(1e12, 0.0), 2);
        let got: Vec<_> = hits.iter().map(|r| r.position()).collect();
        assert_eq!(got, vec![(199, 0), (199, 120)]);
    }

    #[test]
    fn test_k_nearest_from_outside_grid() {
        let hash = populated(&[(0, 0), (30, 30)]);
        let hits = k_nearest(&hash, Point::new(-40.0, -40.0), 1);
        assert_eq!(hits[0].position(), (0, 0));
    }

    #[test]
    fn test_dense_regions() {
        let mut cells: Vec<_> = (0..6).map(|i| (i, 0)).collect();
        cells.extend((0..3).map(|i| (32 + i, 32)));
        cells.push((100, 100));
        let hash = populated(&cells);

        let regions = dense_regions(&hash, 2);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].count, 6);
        assert_eq!(regions[0].origin, (0, 0));
        assert_eq!(regions[1].bucket, BucketCoord::new(2, 2));
        assert_eq!(regions[1].origin, (32, 32));
    }

    #[test]
    fn test_area_covers_neighbor_buckets() {
        let hash = populated(&[(15, 15), (16, 16), (40, 40)]);
        assert_eq!(area(&hash, 15, 15, 1).len(), 2);
        assert_eq!(area(&hash, 5, 5, 0).len(), 1);
        // Clipped at the grid edge rather than rejected.
        assert_eq!(area(&hash, -1, -1, 1).len(), 1);
        assert!(area(&hash, -20, -20, 1).is_empty());
    }
}
