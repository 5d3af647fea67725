//! Webcam whack-a-mole game core.
//!
//! A mirrored self-view is composited from the camera feed and a person
//! segmentation mask. A praying-hands gesture starts a session; targets
//! launch from the canvas corners toward the player and bonus targets
//! fall from the top edge, and tracked hand landmarks whack them for
//! points until the lives run out or the countdown does. The highest
//! score survives restarts.
//!
//! The perception models themselves are external collaborators behind
//! the traits in [`perception`]; deterministic synthetic backends in
//! [`perception::sim`] run the whole pipeline without a camera or an
//! inference runtime.

pub mod config;
pub mod error;
pub mod game;
pub mod geometry;
pub mod gesture;
pub mod hittest;
pub mod perception;
pub mod pipeline;
pub mod presentation;
pub mod session;
pub mod spawner;
pub mod store;
pub mod target;

pub use config::GameConfig;
pub use game::GameController;
pub use gesture::{GestureDetector, GestureReading};
pub use pipeline::Orchestrator;
pub use presentation::PresentationPort;
pub use session::{Phase, SessionOutcome, SessionState};
pub use store::{HighScoreRecord, ScoreStore};
