// src/game.rs
//
// Lifecycle controller: owns the session state machine, the spawner and
// the hit-test engine, drains the target resolution channel, runs the
// countdown and cooldown clocks and persists the high score. Cloneable;
// clones share one controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nalgebra::Point2;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::gesture::GestureReading;
use crate::hittest::{HitTestEngine, TargetRegistry, TargetResolution};
use crate::presentation::PresentationPort;
use crate::session::{SessionOutcome, SessionState};
use crate::spawner::Spawner;
use crate::store::{HighScoreRecord, ScoreStore};
use crate::target::TargetKind;

#[derive(Default)]
struct Timers {
    countdown: Option<JoinHandle<()>>,
    cooldown: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

struct ControllerInner {
    config: GameConfig,
    session: Mutex<SessionState>,
    spawner: Arc<Spawner>,
    engine: HitTestEngine,
    presenter: Arc<dyn PresentationPort>,
    store: Arc<dyn ScoreStore>,
    high_score: Mutex<Option<HighScoreRecord>>,
    timers: Mutex<Timers>,
}

#[derive(Clone)]
pub struct GameController {
    inner: Arc<ControllerInner>,
}

impl GameController {
    pub fn new(
        config: GameConfig,
        presenter: Arc<dyn PresentationPort>,
        store: Arc<dyn ScoreStore>,
    ) -> Self {
        let registry = Arc::new(TargetRegistry::new());
        let (events, rx) = mpsc::unbounded_channel();
        let spawner = Arc::new(Spawner::new(
            config.spawn.clone(),
            config.catalog.clone(),
            Arc::clone(&registry),
            Arc::clone(&presenter),
            events.clone(),
        ));
        let engine = HitTestEngine::new(registry, Arc::clone(&presenter), events);

        let high_score = match store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "high score unavailable, starting fresh");
                None
            }
        };
        if let Some(record) = &high_score {
            info!(score = record.score, "high score loaded");
        }

        let controller = Self {
            inner: Arc::new(ControllerInner {
                config,
                session: Mutex::new(SessionState::new()),
                spawner,
                engine,
                presenter,
                store,
                high_score: Mutex::new(high_score),
                timers: Mutex::new(Timers::default()),
            }),
        };
        controller.start_event_pump(rx);
        controller
    }

    fn start_event_pump(&self, mut rx: UnboundedReceiver<TargetResolution>) {
        let controller = self.clone();
        let pump = tokio::spawn(async move {
            while let Some(resolution) = rx.recv().await {
                controller.handle_resolution(resolution);
            }
        });
        if let Ok(mut timers) = self.inner.timers.lock() {
            timers.pump = Some(pump);
        }
    }

    /// One gesture reading per frame. Only an idle session reacts; an
    /// active, finished or cooling-down session ignores the gesture.
    pub fn on_gesture(&self, reading: &GestureReading) {
        if !reading.is_ready_gesture {
            return;
        }
        if let Some(anchor) = reading.anchor_point {
            self.begin_session(anchor);
        }
    }

    /// Manual session trigger, for runs without a person in frame. Goes
    /// through the same idle-only gate as the gesture path.
    pub fn force_start(&self) {
        self.begin_session(self.inner.presenter.canvas_rect().center());
    }

    fn begin_session(&self, anchor: Point2<f32>) {
        let started = match self.inner.session.lock() {
            Ok(mut session) => session.start(&self.inner.config.rules, anchor),
            Err(_) => false,
        };
        if !started {
            return;
        }
        info!(anchor_x = anchor.x, anchor_y = anchor.y, "session started");
        Arc::clone(&self.inner.spawner).start(anchor);
        self.start_countdown();
        self.push_hud();
    }

    /// One frame's tracked hand landmarks, already in screen space.
    /// Collision sweeps only run while the session is active.
    pub fn on_hand_points(&self, points: &[Point2<f32>]) {
        let active = self
            .inner
            .session
            .lock()
            .map(|s| s.is_active())
            .unwrap_or(false);
        if active {
            self.inner.engine.process(points);
        }
    }

    fn handle_resolution(&self, resolution: TargetResolution) {
        let mut life_lost = false;
        let outcome = {
            let Ok(mut session) = self.inner.session.lock() else {
                return;
            };
            if !session.is_active() {
                return;
            }
            match (resolution.kind, resolution.was_hit) {
                (TargetKind::Primary, true) => {
                    let awarded = session.apply_primary_hit();
                    info!(target_id = %resolution.id, awarded, score = session.score, "whack");
                    None
                }
                (TargetKind::Bonus, true) => {
                    session.apply_bonus_hit();
                    info!(multiplier = session.multiplier, "bonus caught");
                    None
                }
                (TargetKind::Primary, false) => {
                    let before = session.lives;
                    let outcome = session.apply_primary_miss();
                    life_lost = session.lives < before;
                    outcome
                }
                (TargetKind::Bonus, false) => None,
            }
        };

        if life_lost {
            self.inner.presenter.play_damage_cue();
        }
        if resolution.was_hit && resolution.kind == TargetKind::Primary {
            self.inner.spawner.maybe_replace_primary();
        }
        self.push_hud();
        if let Some(outcome) = outcome {
            self.finish(outcome);
        }
    }

    fn start_countdown(&self) {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                let outcome = match controller.inner.session.lock() {
                    Ok(mut session) => session.countdown_tick(),
                    Err(_) => return,
                };
                controller.push_hud();
                if let Some(outcome) = outcome {
                    controller.finish(outcome);
                    return;
                }
            }
        });
        if let Ok(mut timers) = self.inner.timers.lock() {
            if let Some(stale) = timers.countdown.replace(handle) {
                stale.abort();
            }
        }
    }

    /// Active → GameOver → Cooldown. Called from the countdown clock or
    /// the last-life miss; a second caller finds the session no longer
    /// active and returns.
    fn finish(&self, outcome: SessionOutcome) {
        let score = {
            let Ok(mut session) = self.inner.session.lock() else {
                return;
            };
            if !session.game_over(outcome) {
                return;
            }
            session.score
        };
        info!(?outcome, score, "session over");

        if let Ok(mut timers) = self.inner.timers.lock() {
            if let Some(countdown) = timers.countdown.take() {
                countdown.abort();
            }
        }
        self.inner.spawner.stop();
        self.persist_high_score(score);

        if let Ok(mut session) = self.inner.session.lock() {
            session.enter_cooldown();
        }
        self.push_hud();
        self.start_cooldown();
    }

    /// A new record only on a strictly greater score.
    fn persist_high_score(&self, score: u32) {
        let Ok(mut high_score) = self.inner.high_score.lock() else {
            return;
        };
        if high_score.map_or(false, |record| score <= record.score) {
            return;
        }
        let record = HighScoreRecord::now(score);
        match self.inner.store.save(&record) {
            Ok(()) => *high_score = Some(record),
            Err(e) => warn!(error = %e, "failed to persist high score"),
        }
    }

    fn start_cooldown(&self) {
        let controller = self.clone();
        let lockout = Duration::from_secs(self.inner.config.rules.cooldown_secs);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(lockout).await;
            if let Ok(mut session) = controller.inner.session.lock() {
                if session.cooldown_elapsed() {
                    info!("cooldown elapsed, ready for a new session");
                }
            }
            controller.push_hud();
        });
        if let Ok(mut timers) = self.inner.timers.lock() {
            if let Some(stale) = timers.cooldown.replace(handle) {
                stale.abort();
            }
        }
    }

    fn push_hud(&self) {
        if let Ok(session) = self.inner.session.lock() {
            self.inner.presenter.update_hud(&session);
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner
            .session
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn high_score(&self) -> Option<HighScoreRecord> {
        self.inner.high_score.lock().map(|h| *h).unwrap_or(None)
    }

    /// Whether any session has ever finished on this install. The first
    /// session always persists a record, even at zero points.
    pub fn has_played(&self) -> bool {
        self.high_score().is_some()
    }

    /// Tear down every background task. Idempotent.
    pub fn shutdown(&self) {
        self.inner.spawner.stop();
        if let Ok(mut timers) = self.inner.timers.lock() {
            for handle in [
                timers.countdown.take(),
                timers.cooldown.take(),
                timers.pump.take(),
            ]
            .into_iter()
            .flatten()
            {
                handle.abort();
            }
        }
    }
}
