//! # Spatial Query Tests
//!
//! Five particles in a row at (50, 50)..(54, 50), queried every way the
//! connector supports, plus randomized worlds checked against a full scan
//! of the grid.
//!
//! Run with: cargo test --test query_test

use std::cmp::Ordering;

use proptest::prelude::*;
use sandgrid_core::{
    AllocationMonitor, Connector, Particle, ParticleKind, ParticleRef, Point, SyncConfig,
};

fn row_world() -> Connector {
    let mut world =
        Connector::with_config(100, 100, SyncConfig::default(), AllocationMonitor::new())
            .expect("default config is valid");
    for x in 50..55 {
        world.add_particle(x, 50, Particle::from(ParticleKind::Sand)).unwrap();
    }
    world
}

fn columns(refs: &[ParticleRef]) -> Vec<u32> {
    let mut xs: Vec<u32> = refs.iter().map(|r| r.x()).collect();
    xs.sort_unstable();
    xs
}

#[test]
fn radius_query() {
    let mut world = row_world();
    let hits = world.query_radius(Point::new(52.0, 50.0), 2.0);
    assert_eq!(columns(&hits), vec![50, 51, 52, 53, 54]);

    let hits = world.query_radius(Point::new(52.0, 50.0), 1.0);
    assert_eq!(columns(&hits), vec![51, 52, 53]);

    assert!(world.query_radius(Point::new(10.0, 10.0), 5.0).is_empty());
}

#[test]
fn box_query_is_inclusive() {
    let mut world = row_world();
    let hits = world.query_box(Point::new(51.0, 50.0), Point::new(53.0, 50.0));
    assert_eq!(columns(&hits), vec![51, 52, 53]);

    let hits = world.query_box(Point::new(0.0, 0.0), Point::new(99.0, 49.0));
    assert!(hits.is_empty());
}

#[test]
fn k_nearest_orders_by_distance() {
    let mut world = row_world();
    let hits = world.query_k_nearest(Point::new(50.0, 50.0), 3);
    let xs: Vec<u32> = hits.iter().map(|r| r.x()).collect();
    assert_eq!(xs, vec![50, 51, 52]);

    let all = world.query_k_nearest(Point::new(0.0, 0.0), 10);
    assert_eq!(all.len(), 5, "k larger than the population returns everyone");
    assert!(world.query_k_nearest(Point::new(0.0, 0.0), 0).is_empty());
}

#[test]
fn k_nearest_breaks_ties_by_position() {
    let mut world = row_world();
    // 51 and 53 are equidistant from 52; lower x first.
    let xs: Vec<u32> = world
        .query_k_nearest(Point::new(52.0, 50.0), 3)
        .iter()
        .map(|r| r.x())
        .collect();
    assert_eq!(xs, vec![52, 51, 53]);
}

#[test]
fn area_query_covers_neighborhood() {
    let mut world = row_world();
    let hits = world.query_area(52, 50);
    assert_eq!(columns(&hits), vec![50, 51, 52, 53, 54]);
    for hit in hits {
        assert_eq!(world.resolve(hit).map(|p| p.kind), Some(ParticleKind::Sand));
    }
}

#[test]
fn dense_regions_by_threshold() {
    let mut world = row_world();
    let regions = world.query_dense_regions(4);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].count, 5);
    assert_eq!(regions[0].origin, (48, 48));

    assert!(world.query_dense_regions(5).is_empty());
}

#[test]
fn queries_see_unsynced_moves() {
    let mut world = row_world();
    world.update();
    assert!(world.move_particle(54, 50, 54, 90));
    let hits = world.query_box(Point::new(50.0, 50.0), Point::new(54.0, 50.0));
    assert_eq!(columns(&hits), vec![50, 51, 52, 53]);
    let moved = world.query_k_nearest(Point::new(54.0, 95.0), 1);
    assert_eq!(moved[0].position(), (54, 90));
}

#[test]
fn custom_cell_size_gives_same_answers() {
    let config = SyncConfig::from_toml_str("cell_size = 4\narea_radius = 2").unwrap();
    let mut world =
        Connector::with_config(100, 100, config, AllocationMonitor::new()).unwrap();
    for x in 50..55 {
        world.add_particle(x, 50, Particle::from(ParticleKind::Sand)).unwrap();
    }
    let hits = world.query_radius(Point::new(52.0, 50.0), 2.0);
    assert_eq!(columns(&hits), vec![50, 51, 52, 53, 54]);
    assert_eq!(world.index().cell_size(), 4);
}

#[test]
fn k_nearest_from_far_outside_the_grid() {
    let mut world =
        Connector::with_config(64, 64, SyncConfig::default(), AllocationMonitor::new()).unwrap();
    world.add_particle(3, 3, Particle::from(ParticleKind::Stone)).unwrap();

    for point in [
        Point::new(f32::MAX, 0.0),
        Point::new(1e12, 0.0),
        Point::new(1e9, 0.0),
        Point::new(-f32::MAX, -f32::MAX),
    ] {
        let hits = world.query_k_nearest(point, 1);
        assert_eq!(hits.len(), 1, "from {point:?}");
        assert_eq!(hits[0].position(), (3, 3));
    }
}

#[test]
fn area_query_clips_negative_center() {
    let mut world = row_world();
    world.add_particle(0, 0, Particle::from(ParticleKind::Wood)).unwrap();
    let hits = world.query_area(-1, -1);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].position(), (0, 0));
    assert!(world.query_area(-500, 50).is_empty());
}

// ============================================================================
// Randomized worlds against a full grid scan
// ============================================================================

/// Occupied cells as seen by a row-major scan of the grid.
fn occupied(world: &Connector) -> Vec<(u32, u32)> {
    let mut cells = Vec::new();
    world.for_each_cell(|x, y, p| {
        if !p.is_empty() {
            cells.push((x, y));
        }
    });
    cells
}

fn distance_squared((x, y): (u32, u32), p: Point) -> f64 {
    let dx = f64::from(x) - f64::from(p.x);
    let dy = f64::from(y) - f64::from(p.y);
    dx * dx + dy * dy
}

fn sorted_positions(refs: &[ParticleRef]) -> Vec<(u32, u32)> {
    let mut out: Vec<_> = refs.iter().map(|r| r.position()).collect();
    out.sort_unstable();
    out
}

fn scan_radius(cells: &[(u32, u32)], center: Point, r: f32) -> Vec<(u32, u32)> {
    let limit = f64::from(r) * f64::from(r);
    let mut out: Vec<_> =
        cells.iter().copied().filter(|&c| distance_squared(c, center) <= limit).collect();
    out.sort_unstable();
    out
}

fn scan_box(cells: &[(u32, u32)], min: Point, max: Point) -> Vec<(u32, u32)> {
    let mut out: Vec<_> = cells
        .iter()
        .copied()
        .filter(|&(x, y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            x >= f64::from(min.x)
                && x <= f64::from(max.x)
                && y >= f64::from(min.y)
                && y <= f64::from(max.y)
        })
        .collect();
    out.sort_unstable();
    out
}

fn scan_k_nearest(cells: &[(u32, u32)], p: Point, k: usize) -> Vec<(u32, u32)> {
    let mut ranked: Vec<(f64, (u32, u32))> =
        cells.iter().map(|&c| (distance_squared(c, p), c)).collect();
    ranked.sort_unstable_by(|a, b| match a.0.total_cmp(&b.0) {
        Ordering::Equal => a.1.cmp(&b.1),
        other => other,
    });
    ranked.into_iter().take(k).map(|(_, c)| c).collect()
}

fn point() -> impl Strategy<Value = Point> {
    prop_oneof![
        6 => (-20.0f32..70.0, -20.0f32..70.0).prop_map(Point::from),
        2 => (-20i32..70, -20i32..70).prop_map(|(x, y)| Point::new(x as f32, y as f32)),
        1 => (-1e9f32..1e9, -1e9f32..1e9).prop_map(Point::from),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn queries_match_grid_scan(
        cell_size in 1u32..=33,
        width in 1u32..=48,
        height in 1u32..=48,
        seeds in prop::collection::vec((0u32..48, 0u32..48), 0..120),
        centers in prop::collection::vec((point(), 0.0f32..30.0), 1..8),
        boxes in prop::collection::vec((point(), point()), 1..8),
        ks in prop::collection::vec((point(), 0usize..130), 1..8),
    ) {
        let config = SyncConfig { cell_size, ..SyncConfig::default() };
        let mut world =
            Connector::with_config(width, height, config, AllocationMonitor::new()).unwrap();
        for (x, y) in seeds {
            let (x, y) = ((x % width) as i32, (y % height) as i32);
            let _ = world.add_particle(x, y, Particle::from(ParticleKind::Sand));
        }
        let cells = occupied(&world);

        for (center, r) in centers {
            let hits = world.query_radius(center, r);
            prop_assert_eq!(sorted_positions(&hits), scan_radius(&cells, center, r));
        }
        for (a, b) in boxes {
            let hits = world.query_box(a, b);
            prop_assert_eq!(sorted_positions(&hits), scan_box(&cells, a, b));
        }
        for (p, k) in ks {
            // k ranges past the population so the all-seen exit is exercised.
            let k = k.min(cells.len() + 2);
            let got: Vec<_> = world.query_k_nearest(p, k).iter().map(|r| r.position()).collect();
            prop_assert_eq!(got, scan_k_nearest(&cells, p, k));
        }
    }
}
