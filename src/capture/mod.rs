pub mod screen;

pub use screen::{CaptureRegion, CapturedFrame, FrameSource, OsScreenCapture};
