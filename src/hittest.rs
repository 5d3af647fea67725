// src/hittest.rs
//
// Target registry and collision detection. The registry is the single
// authority on each target's lifecycle; `Hit` latches exactly once, so a
// landmark sweep and a timeout racing on the same target resolve to one
// outcome. The engine tests hand landmarks against rendered geometry
// pulled from the presentation port.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nalgebra::Point2;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::presentation::PresentationPort;
use crate::target::{TargetId, TargetKind, TargetState};

/// The terminal outcome of one target, sent to the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetResolution {
    pub id: TargetId,
    pub kind: TargetKind,
    pub was_hit: bool,
}

struct Registration {
    kind: TargetKind,
    state: TargetState,
    timeout: Option<JoinHandle<()>>,
}

/// Live target bookkeeping. Lock scope is a few map operations; nothing
/// async runs under it.
#[derive(Default)]
pub struct TargetRegistry {
    inner: Mutex<HashMap<TargetId, Registration>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: TargetId, kind: TargetKind) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.insert(
                id,
                Registration {
                    kind,
                    state: TargetState::Traveling,
                    timeout: None,
                },
            );
        }
    }

    /// Attach the timeout task for a target so a hit can cancel it. A
    /// target resolved before its timeout was armed aborts it right away.
    pub fn arm_timeout(&self, id: TargetId, handle: JoinHandle<()>) {
        let Ok(mut inner) = self.inner.lock() else {
            handle.abort();
            return;
        };
        match inner.get_mut(&id) {
            Some(reg) if reg.state == TargetState::Traveling => reg.timeout = Some(handle),
            _ => handle.abort(),
        }
    }

    /// Traveling → Hit. Returns the kind when this call won the latch;
    /// `None` if the target was already resolved or never registered.
    pub fn latch_hit(&self, id: TargetId) -> Option<TargetKind> {
        let mut inner = self.inner.lock().ok()?;
        let reg = inner.get_mut(&id)?;
        if reg.state != TargetState::Traveling {
            return None;
        }
        reg.state = TargetState::Hit;
        if let Some(handle) = reg.timeout.take() {
            handle.abort();
        }
        Some(reg.kind)
    }

    /// Traveling → Missed, from the timeout path.
    pub fn latch_miss(&self, id: TargetId) -> Option<TargetKind> {
        let mut inner = self.inner.lock().ok()?;
        let reg = inner.get_mut(&id)?;
        if reg.state != TargetState::Traveling {
            return None;
        }
        reg.state = TargetState::Missed;
        reg.timeout = None;
        Some(reg.kind)
    }

    /// Drop one resolved target's bookkeeping.
    pub fn discard(&self, id: TargetId) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(reg) = inner.remove(&id) {
                if let Some(handle) = reg.timeout {
                    handle.abort();
                }
            }
        }
    }

    /// Session teardown: abort every pending timeout, drop resolved
    /// targets and mark the ones still on the canvas `Removed`. Returns
    /// the removed ids; the caller discards each after presenter removal.
    pub fn clear(&self) -> Vec<TargetId> {
        let Ok(mut inner) = self.inner.lock() else {
            return Vec::new();
        };
        let mut cleared = Vec::with_capacity(inner.len());
        inner.retain(|id, reg| {
            if let Some(handle) = reg.timeout.take() {
                handle.abort();
            }
            if reg.state == TargetState::Traveling {
                reg.state = TargetState::Removed;
                cleared.push(*id);
                true
            } else {
                false
            }
        });
        cleared
    }

    pub fn traveling(&self) -> Vec<(TargetId, TargetKind)> {
        match self.inner.lock() {
            Ok(inner) => inner
                .iter()
                .filter(|(_, reg)| reg.state == TargetState::Traveling)
                .map(|(id, reg)| (*id, reg.kind))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn state_of(&self, id: TargetId) -> Option<TargetState> {
        self.inner.lock().ok()?.get(&id).map(|reg| reg.state)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-frame collision sweep: every tracked hand landmark against every
/// traveling target's current bounding circle.
pub struct HitTestEngine {
    registry: Arc<TargetRegistry>,
    presenter: Arc<dyn PresentationPort>,
    events: UnboundedSender<TargetResolution>,
}

impl HitTestEngine {
    pub fn new(
        registry: Arc<TargetRegistry>,
        presenter: Arc<dyn PresentationPort>,
        events: UnboundedSender<TargetResolution>,
    ) -> Self {
        Self {
            registry,
            presenter,
            events,
        }
    }

    /// Sweep one frame's landmark points. Returns the hits latched by
    /// this call, already reported on the event channel and removed from
    /// the canvas.
    pub fn process(&self, points: &[Point2<f32>]) -> Vec<TargetResolution> {
        if points.is_empty() {
            return Vec::new();
        }
        let mut hits = Vec::new();
        for (id, _) in self.registry.traveling() {
            // The presenter may have dropped the target a beat before the
            // registry heard about it; skip, the timeout will resolve it.
            let Some(circle) = self.presenter.target_circle(id) else {
                continue;
            };
            if !points.iter().any(|p| circle.contains(*p)) {
                continue;
            }
            let Some(kind) = self.registry.latch_hit(id) else {
                continue;
            };
            debug!(target_id = %id, ?kind, "target hit");
            self.presenter.remove_target(id);
            let resolution = TargetResolution {
                id,
                kind,
                was_hit: true,
            };
            if self.events.send(resolution).is_err() {
                warn!("resolution channel closed, dropping hit event");
            }
            hits.push(resolution);
        }
        hits
    }
}
