// src/target.rs
//
// Target entities: the primary "affliction" catalog, falling bonus
// targets, travel math and id generation. Spawning and timeout wiring
// live in `spawner`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use nalgebra::Point2;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::geometry::{self, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Costs a life when its travel timeout expires unhit.
    Primary,
    /// Doubles the score multiplier when hit; no penalty on miss.
    Bonus,
}

/// One entry of the primary target catalog: a travel speed factor and the
/// visual asset the presentation layer should render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub speed: f32,
    pub image: String,
}

impl CatalogEntry {
    pub fn default_catalog() -> Vec<CatalogEntry> {
        DEFAULT_CATALOG.clone()
    }
}

static DEFAULT_CATALOG: Lazy<Vec<CatalogEntry>> = Lazy::new(|| {
    vec![
        CatalogEntry {
            name: "ignorance".to_string(),
            speed: 0.5,
            image: "/Ignorance.gif".to_string(),
        },
        CatalogEntry {
            name: "greed".to_string(),
            speed: 1.0,
            image: "/Greed.gif".to_string(),
        },
        CatalogEntry {
            name: "anger".to_string(),
            speed: 1.5,
            image: "/Anger.gif".to_string(),
        },
    ]
});

/// Lifecycle of one target. `Hit` is terminal: once latched, no further
/// transition is legal regardless of later collisions or timeouts.
/// `Removed` marks targets swept off the canvas at session teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Traveling,
    Hit,
    Missed,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Monotonic clock-derived target ids: milliseconds since the generator
/// was created, with a counter in the low digits to keep same-millisecond
/// spawns unique.
pub struct TargetIdGen {
    epoch: Instant,
    counter: AtomicU64,
}

impl TargetIdGen {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> TargetId {
        let millis = self.epoch.elapsed().as_millis() as u64;
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        TargetId(millis * 1000 + seq % 1000)
    }
}

impl Default for TargetIdGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the presentation layer needs to animate one target. The
/// core never reads rendering internals back except through the
/// pull-based `target_circle` query.
#[derive(Debug, Clone)]
pub struct TargetSprite {
    pub id: TargetId,
    pub kind: TargetKind,
    pub image: String,
    pub start: Point2<f32>,
    pub dest: Point2<f32>,
    pub travel: Duration,
    pub radius: f32,
    /// Cosmetic lateral sway amplitude; zero for primary targets.
    pub sway_px: f32,
}

/// The four spawn corners of the canvas.
pub fn corner_positions(rect: &Rect) -> [Point2<f32>; 4] {
    rect.corners()
}

/// Travel duration: speed-normalized distance over the base rate. Faster
/// catalog entries (higher speed factor) arrive sooner.
pub fn travel_duration(
    start: Point2<f32>,
    dest: Point2<f32>,
    speed: f32,
    base_rate_px_per_sec: f32,
) -> Duration {
    let rate = (speed * base_rate_px_per_sec).max(1.0);
    Duration::from_secs_f32(geometry::distance(start, dest) / rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_matches_affliction_roster() {
        let catalog = CatalogEntry::default_catalog();
        let names: Vec<&str> = catalog.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["ignorance", "greed", "anger"]);
        assert_eq!(catalog[0].speed, 0.5);
        assert_eq!(catalog[2].speed, 1.5);
    }

    #[test]
    fn ids_are_unique_and_monotonic() {
        let gen = TargetIdGen::new();
        let a = gen.next();
        let b = gen.next();
        let c = gen.next();
        assert!(a < b && b < c);
    }

    #[test]
    fn travel_duration_scales_with_speed() {
        let start = Point2::new(0.0, 0.0);
        let dest = Point2::new(300.0, 400.0); // 500px
        let slow = travel_duration(start, dest, 0.5, 250.0);
        let fast = travel_duration(start, dest, 1.5, 250.0);
        assert!((slow.as_secs_f32() - 4.0).abs() < 0.01);
        assert!((fast.as_secs_f32() - 500.0 / 375.0).abs() < 0.01);
        assert!(fast < slow);
    }

    #[test]
    fn travel_duration_survives_zero_distance() {
        let p = Point2::new(10.0, 10.0);
        assert_eq!(travel_duration(p, p, 1.0, 250.0), Duration::ZERO);
    }

    #[test]
    fn corners_cover_the_rect() {
        let rect = Rect::new(0.0, 0.0, 640.0, 480.0);
        let corners = corner_positions(&rect);
        assert_eq!(corners.len(), 4);
        assert!(corners.iter().all(|c| rect.contains(*c)));
    }
}
