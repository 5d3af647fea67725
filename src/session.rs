// src/session.rs
//
// The game session state machine, kept pure so every invariant is
// testable without timers: Idle → Active → GameOver → Cooldown → Idle,
// and no other transition. The async driver in `game` owns the clocks.

use nalgebra::Point2;
use serde::Serialize;

use crate::config::SessionRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Active,
    GameOver,
    Cooldown,
}

/// How a session ended: out of lives, or survived the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    Overwhelmed,
    Survived,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub phase: Phase,
    pub score: u32,
    pub multiplier: u32,
    pub lives: u32,
    pub countdown_remaining: u32,
    pub last_outcome: Option<SessionOutcome>,
    /// Screen point primary targets travel toward, set at session start.
    #[serde(skip)]
    pub anchor: Option<Point2<f32>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            score: 0,
            multiplier: 1,
            lives: 0,
            countdown_remaining: 0,
            last_outcome: None,
            anchor: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Idle → Active. Any other phase (including Cooldown lockout)
    /// rejects the start.
    pub fn start(&mut self, rules: &SessionRules, anchor: Point2<f32>) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.phase = Phase::Active;
        self.score = 0;
        self.multiplier = 1;
        self.lives = rules.lives;
        self.countdown_remaining = rules.countdown_secs;
        self.anchor = Some(anchor);
        true
    }

    /// One 1 Hz countdown tick. Returns the timeout outcome exactly when
    /// the countdown first reaches zero.
    pub fn countdown_tick(&mut self) -> Option<SessionOutcome> {
        if self.phase != Phase::Active || self.countdown_remaining == 0 {
            return None;
        }
        self.countdown_remaining -= 1;
        if self.countdown_remaining == 0 {
            Some(SessionOutcome::Survived)
        } else {
            None
        }
    }

    /// A primary target was whacked. Returns the points awarded.
    pub fn apply_primary_hit(&mut self) -> u32 {
        if self.phase != Phase::Active {
            return 0;
        }
        let awarded = self.multiplier;
        self.score += awarded;
        awarded
    }

    /// A bonus target was caught: the multiplier doubles.
    pub fn apply_bonus_hit(&mut self) {
        if self.phase == Phase::Active {
            self.multiplier = self.multiplier.saturating_mul(2);
        }
    }

    /// A primary target timed out unhit. Returns the overwhelmed outcome
    /// exactly when lives first reach zero.
    pub fn apply_primary_miss(&mut self) -> Option<SessionOutcome> {
        if self.phase != Phase::Active || self.lives == 0 {
            return None;
        }
        self.lives -= 1;
        if self.lives == 0 {
            Some(SessionOutcome::Overwhelmed)
        } else {
            None
        }
    }

    /// Active → GameOver, recording the outcome.
    pub fn game_over(&mut self, outcome: SessionOutcome) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        self.phase = Phase::GameOver;
        self.last_outcome = Some(outcome);
        true
    }

    /// GameOver → Cooldown. Immediate and automatic after game over.
    pub fn enter_cooldown(&mut self) -> bool {
        if self.phase != Phase::GameOver {
            return false;
        }
        self.phase = Phase::Cooldown;
        true
    }

    /// Cooldown → Idle once the lockout expires. The last outcome stays
    /// visible for the idle screen.
    pub fn cooldown_elapsed(&mut self) -> bool {
        if self.phase != Phase::Cooldown {
            return false;
        }
        self.phase = Phase::Idle;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> SessionRules {
        SessionRules {
            lives: 3,
            countdown_secs: 5,
            cooldown_secs: 60,
        }
    }

    fn anchor() -> Point2<f32> {
        Point2::new(320.0, 240.0)
    }

    fn active_state() -> SessionState {
        let mut s = SessionState::new();
        assert!(s.start(&rules(), anchor()));
        s
    }

    #[test]
    fn start_resets_session_values() {
        let s = active_state();
        assert_eq!(s.phase, Phase::Active);
        assert_eq!(s.score, 0);
        assert_eq!(s.multiplier, 1);
        assert_eq!(s.lives, 3);
        assert_eq!(s.countdown_remaining, 5);
        assert!(s.anchor.is_some());
    }

    #[test]
    fn start_is_rejected_outside_idle() {
        let mut s = active_state();
        assert!(!s.start(&rules(), anchor()));
        s.game_over(SessionOutcome::Survived);
        assert!(!s.start(&rules(), anchor()));
        s.enter_cooldown();
        assert!(!s.start(&rules(), anchor()));
        s.cooldown_elapsed();
        assert!(s.start(&rules(), anchor()));
    }

    #[test]
    fn countdown_decrements_once_per_tick_and_ends_the_session() {
        let mut s = active_state();
        for expected in (1..5).rev() {
            assert_eq!(s.countdown_tick(), None);
            assert_eq!(s.countdown_remaining, expected);
        }
        assert_eq!(s.countdown_tick(), Some(SessionOutcome::Survived));
        assert_eq!(s.countdown_remaining, 0);
        // Once at zero, further ticks report nothing.
        assert_eq!(s.countdown_tick(), None);
    }

    #[test]
    fn lives_are_monotonically_non_increasing() {
        let mut s = active_state();
        assert_eq!(s.apply_primary_miss(), None);
        assert_eq!(s.lives, 2);
        assert_eq!(s.apply_primary_miss(), None);
        assert_eq!(s.lives, 1);
        assert_eq!(s.apply_primary_miss(), Some(SessionOutcome::Overwhelmed));
        assert_eq!(s.lives, 0);
        assert_eq!(s.apply_primary_miss(), None);
        assert_eq!(s.lives, 0);
    }

    #[test]
    fn bonus_hits_double_the_multiplier_and_primary_hits_use_it() {
        let mut s = active_state();
        s.apply_bonus_hit();
        assert_eq!(s.multiplier, 2);
        s.apply_bonus_hit();
        assert_eq!(s.multiplier, 4);
        let awarded = s.apply_primary_hit();
        assert_eq!(awarded, 4);
        assert_eq!(s.score, 4);
    }

    #[test]
    fn scoring_is_ignored_outside_active() {
        let mut s = SessionState::new();
        assert_eq!(s.apply_primary_hit(), 0);
        s.apply_bonus_hit();
        assert_eq!(s.multiplier, 1);
        assert_eq!(s.apply_primary_miss(), None);
    }

    #[test]
    fn full_phase_cycle() {
        let mut s = active_state();
        assert!(s.game_over(SessionOutcome::Overwhelmed));
        assert_eq!(s.phase, Phase::GameOver);
        assert!(s.enter_cooldown());
        assert_eq!(s.phase, Phase::Cooldown);
        assert!(s.cooldown_elapsed());
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.last_outcome, Some(SessionOutcome::Overwhelmed));
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut s = SessionState::new();
        assert!(!s.game_over(SessionOutcome::Survived));
        assert!(!s.enter_cooldown());
        assert!(!s.cooldown_elapsed());
    }
}
