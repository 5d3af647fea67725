// Capture smoke check: enumerate cameras, then open index 0 through the
// same source the game uses and pull one mirrored frame through it.

use nokhwa::utils::ApiBackend;

use whackcam::pipeline::{CameraSource, FrameSource};

fn main() {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) if cameras.is_empty() => println!("no cameras found"),
        Ok(cameras) => {
            for camera in &cameras {
                println!("camera [{}] {}", camera.index(), camera.human_name());
            }
        }
        Err(e) => println!("camera query failed: {e}"),
    }

    let mut source = match CameraSource::open(0, 640, 480) {
        Ok(source) => source,
        Err(e) => {
            // CaptureError::Unavailable here means open or stream start
            // failed; the game would refuse to start for the same reason.
            println!("capture path unavailable: {e}");
            std::process::exit(1);
        }
    };

    let (w, h) = source.dimensions();
    println!("capture open at {w}x{h}");

    match source.next_frame() {
        Ok(frame) => println!(
            "mirrored frame decoded: {}x{}",
            frame.width(),
            frame.height()
        ),
        Err(e) => {
            println!("frame grab failed: {e}");
            std::process::exit(1);
        }
    }
}
