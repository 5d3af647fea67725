// src/config.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::perception::{HandOptions, PoseOptions};
use crate::target::CatalogEntry;

/// Top-level configuration. Every timing value and gesture threshold is
/// configuration rather than a constant, and is replaceable between
/// sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub rules: SessionRules,
    #[serde(default)]
    pub spawn: SpawnConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default = "CatalogEntry::default_catalog")]
    pub catalog: Vec<CatalogEntry>,
}

/// Session-scoped rules consumed once at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRules {
    #[serde(default = "default_lives")]
    pub lives: u32,
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u32,
    /// Lockout after a session ends before a new one may start.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnConfig {
    #[serde(default = "default_spawn_interval_ms")]
    pub spawn_interval_ms: u64,
    #[serde(default = "default_bonus_interval_ms")]
    pub bonus_interval_ms: u64,
    #[serde(default = "default_bonus_fall_secs")]
    pub bonus_fall_secs: u64,
    /// Base travel rate; a catalog speed of 1.0 moves this many px/s.
    #[serde(default = "default_base_rate")]
    pub base_rate_px_per_sec: f32,
    /// Chance that a primary hit immediately spawns a replacement.
    #[serde(default = "default_replacement_chance")]
    pub replacement_chance: f64,
    #[serde(default = "default_primary_radius")]
    pub primary_radius_px: f32,
    #[serde(default = "default_bonus_radius")]
    pub bonus_radius_px: f32,
    /// Cosmetic lateral sway amplitude of falling bonus targets.
    #[serde(default = "default_bonus_sway")]
    pub bonus_sway_px: f32,
    #[serde(default = "default_bonus_image")]
    pub bonus_image: String,
}

/// Praying-hands detector thresholds. The closeness and alignment bands
/// trade precision for responsiveness; defaults sit mid-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,
    #[serde(default = "default_wrist_closeness")]
    pub wrist_closeness_px: f32,
    #[serde(default = "default_vertical_alignment")]
    pub vertical_alignment_px: f32,
    #[serde(default = "default_chest_proximity")]
    pub chest_proximity_px: f32,
    /// Shoulder separation, as a fraction of frame width, above which a
    /// pose counts as facing the camera when several bodies are detected.
    #[serde(default = "default_shoulder_separation")]
    pub min_shoulder_separation_frac: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on iterations per second; the refresh callback cap.
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    #[serde(default = "default_pose_score_threshold")]
    pub pose_score_threshold: f32,
    #[serde(default = "default_max_poses")]
    pub max_poses: usize,
    #[serde(default = "default_max_hands")]
    pub max_hands: usize,
    #[serde(default = "default_min_detection_confidence")]
    pub min_detection_confidence: f32,
    #[serde(default = "default_min_tracking_confidence")]
    pub min_tracking_confidence: f32,
    /// Optional path to the background image composited behind the cutout.
    #[serde(default)]
    pub background_path: Option<PathBuf>,
}

fn default_lives() -> u32 {
    3
}
fn default_countdown_secs() -> u32 {
    45
}
fn default_cooldown_secs() -> u64 {
    60
}
fn default_spawn_interval_ms() -> u64 {
    750
}
fn default_bonus_interval_ms() -> u64 {
    3000
}
fn default_bonus_fall_secs() -> u64 {
    10
}
fn default_base_rate() -> f32 {
    240.0
}
fn default_replacement_chance() -> f64 {
    0.35
}
fn default_primary_radius() -> f32 {
    50.0
}
fn default_bonus_radius() -> f32 {
    32.0
}
fn default_bonus_sway() -> f32 {
    20.0
}
fn default_bonus_image() -> String {
    "🌸".to_string()
}
fn default_confidence_floor() -> f32 {
    0.25
}
fn default_wrist_closeness() -> f32 {
    95.0
}
fn default_vertical_alignment() -> f32 {
    80.0
}
fn default_chest_proximity() -> f32 {
    150.0
}
fn default_shoulder_separation() -> f32 {
    0.15
}
fn default_refresh_hz() -> u32 {
    60
}
fn default_frame_width() -> u32 {
    640
}
fn default_frame_height() -> u32 {
    480
}
fn default_pose_score_threshold() -> f32 {
    0.3
}
fn default_max_poses() -> usize {
    3
}
fn default_max_hands() -> usize {
    2
}
fn default_min_detection_confidence() -> f32 {
    0.5
}
fn default_min_tracking_confidence() -> f32 {
    0.5
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rules: SessionRules::default(),
            spawn: SpawnConfig::default(),
            gesture: GestureConfig::default(),
            pipeline: PipelineConfig::default(),
            catalog: CatalogEntry::default_catalog(),
        }
    }
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            lives: default_lives(),
            countdown_secs: default_countdown_secs(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            spawn_interval_ms: default_spawn_interval_ms(),
            bonus_interval_ms: default_bonus_interval_ms(),
            bonus_fall_secs: default_bonus_fall_secs(),
            base_rate_px_per_sec: default_base_rate(),
            replacement_chance: default_replacement_chance(),
            primary_radius_px: default_primary_radius(),
            bonus_radius_px: default_bonus_radius(),
            bonus_sway_px: default_bonus_sway(),
            bonus_image: default_bonus_image(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            wrist_closeness_px: default_wrist_closeness(),
            vertical_alignment_px: default_vertical_alignment(),
            chest_proximity_px: default_chest_proximity(),
            min_shoulder_separation_frac: default_shoulder_separation(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refresh_hz: default_refresh_hz(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            pose_score_threshold: default_pose_score_threshold(),
            max_poses: default_max_poses(),
            max_hands: default_max_hands(),
            min_detection_confidence: default_min_detection_confidence(),
            min_tracking_confidence: default_min_tracking_confidence(),
            background_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn pose_options(&self) -> PoseOptions {
        PoseOptions {
            score_threshold: self.pose_score_threshold,
            max_poses: self.max_poses,
        }
    }

    pub fn hand_options(&self) -> HandOptions {
        HandOptions {
            max_hands: self.max_hands,
            min_detection_confidence: self.min_detection_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
        }
    }
}

impl GameConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: GameConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load the config from the platform config directory, falling back
    /// to defaults when no file exists or it cannot be parsed.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("no config directory available, using defaults");
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                info!("using default config ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "whackcam")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GameConfig::default();
        assert_eq!(config.rules.lives, 3);
        assert_eq!(config.rules.countdown_secs, 45);
        assert_eq!(config.rules.cooldown_secs, 60);
        assert_eq!(config.spawn.spawn_interval_ms, 750);
        assert_eq!(config.spawn.bonus_interval_ms, 3000);
        assert_eq!(config.spawn.bonus_fall_secs, 10);
        assert!((config.spawn.replacement_chance - 0.35).abs() < f64::EPSILON);
        assert_eq!(config.catalog.len(), 3);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{ "rules": { "lives": 5 }, "spawn": { "spawn_interval_ms": 500 } }"#;
        let config: GameConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.rules.lives, 5);
        assert_eq!(config.rules.countdown_secs, 45);
        assert_eq!(config.spawn.spawn_interval_ms, 500);
        assert_eq!(config.spawn.bonus_interval_ms, 3000);
        assert_eq!(config.catalog.len(), 3);
    }

    #[test]
    fn gesture_thresholds_sit_inside_tuned_bands() {
        let g = GestureConfig::default();
        assert!(g.confidence_floor >= 0.15 && g.confidence_floor <= 0.35);
        assert!(g.wrist_closeness_px >= 90.0 && g.wrist_closeness_px <= 100.0);
        assert!(g.vertical_alignment_px >= 70.0 && g.vertical_alignment_px <= 90.0);
        assert!(g.chest_proximity_px <= 150.0);
    }
}
