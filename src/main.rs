use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use whackcam::config::GameConfig;
use whackcam::game::GameController;
use whackcam::geometry::Rect;
use whackcam::gesture::GestureDetector;
use whackcam::perception::sim::{SimHandTracker, SimPoseEstimator, SimSegmenter};
use whackcam::perception::PerceptionAdapter;
use whackcam::pipeline::{CameraSource, FrameSource, Orchestrator, SimFrameSource};
use whackcam::presentation::{LogPresenter, PresentationPort};
use whackcam::store::{JsonFileStore, MemoryStore, ScoreStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let sim_mode = args.iter().any(|a| a == "--sim");
    let camera_index = args
        .iter()
        .position(|a| a == "--camera")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);

    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(cameras) => {
            info!("found {} camera(s)", cameras.len());
            for (i, camera) in cameras.iter().enumerate() {
                info!("  [{}] {}", i, camera.human_name());
            }
        }
        Err(e) => warn!("failed to query cameras: {}", e),
    }

    let config = GameConfig::load_or_default();
    let (width, height) = (config.pipeline.frame_width, config.pipeline.frame_height);

    let presenter: Arc<dyn PresentationPort> = Arc::new(LogPresenter::new(Rect::new(
        0.0,
        0.0,
        width as f32,
        height as f32,
    )));
    let store: Arc<dyn ScoreStore> = match JsonFileStore::at_default_path() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("high score file unavailable ({}), scores will not persist", e);
            Arc::new(MemoryStore::new())
        }
    };

    let controller = GameController::new(config.clone(), Arc::clone(&presenter), store);
    if let Some(record) = controller.high_score() {
        info!(score = record.score, "score to beat");
    }

    // Manual session trigger for runs without a person in frame: type
    // "start" on stdin.
    let stdin_controller = controller.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim() == "start" {
                stdin_controller.force_start();
            }
        }
    });

    // An unusable camera is fatal; --sim opts into synthetic frames.
    let source: Box<dyn FrameSource> = if sim_mode {
        info!("running with synthetic frames");
        Box::new(SimFrameSource::new(width, height))
    } else {
        Box::new(CameraSource::open(camera_index, width, height)?)
    };

    let perception = PerceptionAdapter::new(
        SimSegmenter::new(),
        SimPoseEstimator::new(),
        SimHandTracker::new(),
        config.pipeline.pose_options(),
        config.pipeline.hand_options(),
    );
    let orchestrator = Orchestrator::new(
        source,
        perception,
        GestureDetector::new(config.gesture.clone()),
        controller.clone(),
        Arc::clone(&presenter),
        config.pipeline.clone(),
    );

    tokio::select! {
        result = orchestrator.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            controller.shutdown();
            Ok(())
        }
    }
}
