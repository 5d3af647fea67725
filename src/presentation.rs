// src/presentation.rs
//
// Presentation port. The core pushes sprites and HUD state out through
// this trait and pulls current target geometry back per frame; it never
// reads renderer internals. `LogPresenter` is the headless production
// implementation, `StaticPresenter` the deterministic test double.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use image::RgbaImage;
use nalgebra::Point2;
use tracing::{debug, info};

use crate::geometry::{Circle, Rect};
use crate::perception::{HandLandmarks, Pose};
use crate::session::SessionState;
use crate::target::{TargetId, TargetKind, TargetSprite};

pub trait PresentationPort: Send + Sync {
    /// The canvas rectangle targets travel across, in screen space.
    fn canvas_rect(&self) -> Rect;

    /// A new target enters the canvas and starts traveling.
    fn spawn_target(&self, sprite: TargetSprite);

    /// A target leaves the canvas (hit, timed out, or session teardown).
    fn remove_target(&self, id: TargetId);

    /// Current bounding circle of a rendered target. `None` once the
    /// target is no longer on the canvas.
    fn target_circle(&self, id: TargetId) -> Option<Circle>;

    /// Score, multiplier, lives and countdown for the HUD.
    fn update_hud(&self, state: &SessionState);

    /// The composited self-view frame for this iteration.
    fn show_frame(&self, frame: &RgbaImage);

    /// Skeleton and hand drawing data for overlays. The core hands the
    /// geometry over; drawing is the renderer's business.
    fn show_overlay(&self, poses: &[Pose], hands: &[HandLandmarks]);

    /// A life was just lost.
    fn play_damage_cue(&self);
}

struct ActiveSprite {
    sprite: TargetSprite,
    spawned_at: Instant,
}

impl ActiveSprite {
    /// Interpolated center along the start→dest segment, clamped at the
    /// destination once the travel duration has elapsed. Bonus targets
    /// add their cosmetic lateral sway.
    fn center(&self) -> Point2<f32> {
        let travel = self.sprite.travel.as_secs_f32();
        let t = if travel <= f32::EPSILON {
            1.0
        } else {
            (self.spawned_at.elapsed().as_secs_f32() / travel).min(1.0)
        };
        let start = self.sprite.start;
        let dest = self.sprite.dest;
        let mut center = Point2::new(
            start.x + (dest.x - start.x) * t,
            start.y + (dest.y - start.y) * t,
        );
        if self.sprite.sway_px > 0.0 {
            // 0.5s sway period.
            let phase = self.spawned_at.elapsed().as_secs_f32() * std::f32::consts::TAU * 2.0;
            center.x += phase.sin() * self.sprite.sway_px;
        }
        center
    }
}

/// Headless presenter: animates targets internally and reports state
/// changes through the log. Stands in wherever no renderer is attached.
pub struct LogPresenter {
    canvas: Rect,
    active: Mutex<HashMap<TargetId, ActiveSprite>>,
}

impl LogPresenter {
    pub fn new(canvas: Rect) -> Self {
        Self {
            canvas,
            active: Mutex::new(HashMap::new()),
        }
    }
}

impl PresentationPort for LogPresenter {
    fn canvas_rect(&self) -> Rect {
        self.canvas
    }

    fn spawn_target(&self, sprite: TargetSprite) {
        info!(
            target_id = %sprite.id,
            kind = ?sprite.kind,
            image = %sprite.image,
            travel_ms = sprite.travel.as_millis() as u64,
            "target spawned"
        );
        if let Ok(mut active) = self.active.lock() {
            active.insert(
                sprite.id,
                ActiveSprite {
                    sprite,
                    spawned_at: Instant::now(),
                },
            );
        }
    }

    fn remove_target(&self, id: TargetId) {
        if let Ok(mut active) = self.active.lock() {
            if active.remove(&id).is_some() {
                info!(target_id = %id, "target removed");
            }
        }
    }

    fn target_circle(&self, id: TargetId) -> Option<Circle> {
        let active = self.active.lock().ok()?;
        let entry = active.get(&id)?;
        Some(Circle::new(entry.center(), entry.sprite.radius))
    }

    fn update_hud(&self, state: &SessionState) {
        info!(
            phase = ?state.phase,
            score = state.score,
            multiplier = state.multiplier,
            lives = state.lives,
            countdown = state.countdown_remaining,
            "hud"
        );
    }

    fn show_frame(&self, frame: &RgbaImage) {
        debug!(
            width = frame.width(),
            height = frame.height(),
            "frame presented"
        );
    }

    fn show_overlay(&self, poses: &[Pose], hands: &[HandLandmarks]) {
        debug!(poses = poses.len(), hands = hands.len(), "overlay data");
    }

    fn play_damage_cue(&self) {
        info!("life lost");
    }
}

/// Test presenter: every target sits motionless at its spawn point, so a
/// hit-test probe at a known corner lands deterministically. Counts the
/// calls the core makes.
pub struct StaticPresenter {
    canvas: Rect,
    active: Mutex<HashMap<TargetId, TargetSprite>>,
    pub spawned: AtomicUsize,
    pub removed: AtomicUsize,
    pub hud_updates: AtomicUsize,
    pub frames_shown: AtomicUsize,
    pub overlays_shown: AtomicUsize,
    pub damage_cues: AtomicUsize,
}

impl StaticPresenter {
    pub fn new(canvas: Rect) -> Self {
        Self {
            canvas,
            active: Mutex::new(HashMap::new()),
            spawned: AtomicUsize::new(0),
            removed: AtomicUsize::new(0),
            hud_updates: AtomicUsize::new(0),
            frames_shown: AtomicUsize::new(0),
            overlays_shown: AtomicUsize::new(0),
            damage_cues: AtomicUsize::new(0),
        }
    }

    pub fn damage_cue_count(&self) -> usize {
        self.damage_cues.load(Ordering::SeqCst)
    }

    pub fn spawned_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn removed_count(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().map(|a| a.len()).unwrap_or(0)
    }

    /// Ids of targets currently on the canvas, optionally filtered by kind.
    pub fn active_ids(&self, kind: Option<TargetKind>) -> Vec<TargetId> {
        match self.active.lock() {
            Ok(active) => active
                .values()
                .filter(|s| kind.map_or(true, |k| s.kind == k))
                .map(|s| s.id)
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl PresentationPort for StaticPresenter {
    fn canvas_rect(&self) -> Rect {
        self.canvas
    }

    fn spawn_target(&self, sprite: TargetSprite) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut active) = self.active.lock() {
            active.insert(sprite.id, sprite);
        }
    }

    fn remove_target(&self, id: TargetId) {
        if let Ok(mut active) = self.active.lock() {
            if active.remove(&id).is_some() {
                self.removed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn target_circle(&self, id: TargetId) -> Option<Circle> {
        let active = self.active.lock().ok()?;
        let sprite = active.get(&id)?;
        Some(Circle::new(sprite.start, sprite.radius))
    }

    fn update_hud(&self, _state: &SessionState) {
        self.hud_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn show_frame(&self, _frame: &RgbaImage) {
        self.frames_shown.fetch_add(1, Ordering::SeqCst);
    }

    fn show_overlay(&self, _poses: &[Pose], _hands: &[HandLandmarks]) {
        self.overlays_shown.fetch_add(1, Ordering::SeqCst);
    }

    fn play_damage_cue(&self) {
        self.damage_cues.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sprite(id: u64, start: Point2<f32>, dest: Point2<f32>, travel: Duration) -> TargetSprite {
        TargetSprite {
            id: TargetId(id),
            kind: TargetKind::Primary,
            image: "/Greed.gif".to_string(),
            start,
            dest,
            travel,
            radius: 50.0,
            sway_px: 0.0,
        }
    }

    #[test]
    fn log_presenter_interpolates_toward_destination() {
        let presenter = LogPresenter::new(Rect::new(0.0, 0.0, 640.0, 480.0));
        let start = Point2::new(0.0, 0.0);
        let dest = Point2::new(100.0, 0.0);
        presenter.spawn_target(sprite(1, start, dest, Duration::from_secs(3600)));

        let circle = presenter.target_circle(TargetId(1)).expect("on canvas");
        // Barely any time has passed relative to the hour-long travel.
        assert!(circle.center.x < 1.0);
        assert_eq!(circle.radius, 50.0);
    }

    #[test]
    fn log_presenter_clamps_at_destination_after_travel() {
        let presenter = LogPresenter::new(Rect::new(0.0, 0.0, 640.0, 480.0));
        let dest = Point2::new(100.0, 200.0);
        presenter.spawn_target(sprite(2, Point2::new(0.0, 0.0), dest, Duration::ZERO));

        let circle = presenter.target_circle(TargetId(2)).expect("on canvas");
        assert_eq!(circle.center, dest);
    }

    #[test]
    fn removed_targets_report_no_circle() {
        let presenter = LogPresenter::new(Rect::new(0.0, 0.0, 640.0, 480.0));
        presenter.spawn_target(sprite(
            3,
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Duration::from_secs(1),
        ));
        presenter.remove_target(TargetId(3));
        assert!(presenter.target_circle(TargetId(3)).is_none());
    }

    #[test]
    fn static_presenter_counts_and_pins_targets() {
        let presenter = StaticPresenter::new(Rect::new(0.0, 0.0, 640.0, 480.0));
        let start = Point2::new(10.0, 20.0);
        presenter.spawn_target(sprite(4, start, Point2::new(300.0, 300.0), Duration::from_secs(2)));
        assert_eq!(presenter.spawned_count(), 1);
        assert_eq!(presenter.active_count(), 1);

        let circle = presenter.target_circle(TargetId(4)).expect("pinned");
        assert_eq!(circle.center, start);

        presenter.remove_target(TargetId(4));
        assert_eq!(presenter.removed_count(), 1);
        assert_eq!(presenter.active_count(), 0);
        // Removing again is a no-op, not a double count.
        presenter.remove_target(TargetId(4));
        assert_eq!(presenter.removed_count(), 1);
    }
}
