// src/spawner.rs
//
// Target production. Two interval producers run while a session is
// active: primary targets launched from random canvas corners toward the
// session anchor, and bonus targets falling from the top edge. Each
// spawned target carries its own timeout task; the registry's one-shot
// latch arbitrates between that timeout and a landmark hit.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nalgebra::Point2;
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::SpawnConfig;
use crate::hittest::{TargetRegistry, TargetResolution};
use crate::presentation::PresentationPort;
use crate::target::{self, CatalogEntry, TargetIdGen, TargetKind, TargetSprite};

pub struct Spawner {
    config: SpawnConfig,
    catalog: Vec<CatalogEntry>,
    registry: Arc<TargetRegistry>,
    presenter: Arc<dyn PresentationPort>,
    events: UnboundedSender<TargetResolution>,
    ids: TargetIdGen,
    producers: Mutex<Vec<JoinHandle<()>>>,
    anchor: Mutex<Option<Point2<f32>>>,
}

impl Spawner {
    pub fn new(
        config: SpawnConfig,
        catalog: Vec<CatalogEntry>,
        registry: Arc<TargetRegistry>,
        presenter: Arc<dyn PresentationPort>,
        events: UnboundedSender<TargetResolution>,
    ) -> Self {
        Self {
            config,
            catalog,
            registry,
            presenter,
            events,
            ids: TargetIdGen::new(),
            producers: Mutex::new(Vec::new()),
            anchor: Mutex::new(None),
        }
    }

    /// Begin producing targets toward the given anchor. The first primary
    /// launches immediately; intervals pace the rest.
    pub fn start(self: Arc<Self>, anchor: Point2<f32>) {
        if let Ok(mut slot) = self.anchor.lock() {
            *slot = Some(anchor);
        }

        let primary = {
            let spawner = Arc::clone(&self);
            let period = Duration::from_millis(self.config.spawn_interval_ms);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    spawner.spawn_primary();
                }
            })
        };
        let bonus = {
            let spawner = Arc::clone(&self);
            let period = Duration::from_millis(self.config.bonus_interval_ms);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                // The immediate first tick: bonus targets wait one period.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    spawner.spawn_bonus();
                }
            })
        };

        if let Ok(mut producers) = self.producers.lock() {
            producers.push(primary);
            producers.push(bonus);
        }
    }

    /// Stop producing, cancel every pending timeout and clear the canvas.
    /// Safe to call more than once.
    pub fn stop(&self) {
        if let Ok(mut producers) = self.producers.lock() {
            for handle in producers.drain(..) {
                handle.abort();
            }
        }
        for id in self.registry.clear() {
            self.presenter.remove_target(id);
            self.registry.discard(id);
        }
        if let Ok(mut slot) = self.anchor.lock() {
            *slot = None;
        }
    }

    fn anchor_or_center(&self) -> Point2<f32> {
        self.anchor
            .lock()
            .ok()
            .and_then(|slot| *slot)
            .unwrap_or_else(|| self.presenter.canvas_rect().center())
    }

    /// One primary target from a random corner toward the anchor.
    pub fn spawn_primary(&self) {
        if self.catalog.is_empty() {
            return;
        }
        let canvas = self.presenter.canvas_rect();
        let dest = self.anchor_or_center();
        let (entry, start) = {
            let mut rng = rand::thread_rng();
            let entry = self.catalog[rng.gen_range(0..self.catalog.len())].clone();
            let corners = target::corner_positions(&canvas);
            (entry, corners[rng.gen_range(0..corners.len())])
        };
        let travel =
            target::travel_duration(start, dest, entry.speed, self.config.base_rate_px_per_sec);
        let sprite = TargetSprite {
            id: self.ids.next(),
            kind: TargetKind::Primary,
            image: entry.image,
            start,
            dest,
            travel,
            radius: self.config.primary_radius_px,
            sway_px: 0.0,
        };
        debug!(target_id = %sprite.id, name = %entry.name, "primary target launched");
        self.launch(sprite);
    }

    /// One bonus target falling from a random point on the top edge.
    pub fn spawn_bonus(&self) {
        let canvas = self.presenter.canvas_rect();
        let radius = self.config.bonus_radius_px;
        let x = {
            let mut rng = rand::thread_rng();
            let lo = canvas.left + radius;
            let hi = (canvas.left + canvas.width - radius).max(lo + 1.0);
            rng.gen_range(lo..hi)
        };
        let sprite = TargetSprite {
            id: self.ids.next(),
            kind: TargetKind::Bonus,
            image: self.config.bonus_image.clone(),
            start: Point2::new(x, canvas.top - radius),
            dest: Point2::new(x, canvas.top + canvas.height + radius),
            travel: Duration::from_secs(self.config.bonus_fall_secs),
            radius,
            sway_px: self.config.bonus_sway_px,
        };
        debug!(target_id = %sprite.id, "bonus target falling");
        self.launch(sprite);
    }

    /// A fraction of primary hits are answered with an immediate
    /// replacement, keeping pressure up late in a session.
    pub fn maybe_replace_primary(&self) {
        let roll = rand::thread_rng().gen_bool(self.config.replacement_chance);
        if roll {
            self.spawn_primary();
        }
    }

    fn launch(&self, sprite: TargetSprite) {
        let id = sprite.id;
        let kind = sprite.kind;
        let travel = sprite.travel;
        self.registry.register(id, kind);
        self.presenter.spawn_target(sprite);

        let registry = Arc::clone(&self.registry);
        let presenter = Arc::clone(&self.presenter);
        let events = self.events.clone();
        let timeout = tokio::spawn(async move {
            tokio::time::sleep(travel).await;
            if registry.latch_miss(id).is_some() {
                presenter.remove_target(id);
                let _ = events.send(TargetResolution {
                    id,
                    kind,
                    was_hit: false,
                });
            }
        });
        self.registry.arm_timeout(id, timeout);
    }

    pub fn active_target_count(&self) -> usize {
        self.registry.len()
    }
}
