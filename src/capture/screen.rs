use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const FILE_WAIT_TIMEOUT: Duration = Duration::from_millis(1_500);
const FILE_WAIT_POLL: Duration = Duration::from_millis(50);

/// Rectangle to keep from a full-screen capture, in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureRegion {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

pub trait FrameSource {
    fn capture(&self, out_path: &Path, region: Option<CaptureRegion>) -> Result<CapturedFrame>;
}

/// Captures through the platform screenshot utility as a child process.
pub struct OsScreenCapture;

impl FrameSource for OsScreenCapture {
    fn capture(&self, out_path: &Path, region: Option<CaptureRegion>) -> Result<CapturedFrame> {
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create frame dir {}", parent.display()))?;
        }

        let mut command = screenshot_command(out_path)?;
        let status = command
            .status()
            .context("failed to spawn the screenshot utility")?;
        if !status.success() {
            bail!("screenshot utility exited with {status}");
        }

        // The utility can return before the file is flushed.
        if !wait_for_file(out_path, FILE_WAIT_TIMEOUT) {
            bail!("screenshot produced no valid file at {}", out_path.display());
        }

        finalize_frame(out_path, region)
    }
}

#[cfg(target_os = "macos")]
fn screenshot_command(out_path: &Path) -> Result<Command> {
    let mut command = Command::new("screencapture");
    command.arg("-x").arg(out_path);
    Ok(command)
}

#[cfg(target_os = "linux")]
fn screenshot_command(out_path: &Path) -> Result<Command> {
    let mut command = Command::new("scrot");
    command.arg("--overwrite").arg(out_path);
    Ok(command)
}

// TODO: windows backend; there is no stock CLI capture utility to shell out to.
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn screenshot_command(_out_path: &Path) -> Result<Command> {
    bail!("screen capture is not supported on this platform")
}

/// Polls until `path` exists with non-zero size, up to `timeout`.
fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if file_is_ready(path) {
            return true;
        }
        thread::sleep(FILE_WAIT_POLL);
    }
    file_is_ready(path)
}

fn file_is_ready(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.len() > 0).unwrap_or(false)
}

/// Crops the capture in place when a region is configured, then re-reads the
/// final dimensions from disk.
fn finalize_frame(out_path: &Path, region: Option<CaptureRegion>) -> Result<CapturedFrame> {
    if let Some(region) = region {
        let full = image::open(out_path)
            .with_context(|| format!("failed to open captured frame {}", out_path.display()))?;
        let cropped = full.crop_imm(region.x, region.y, region.width, region.height);
        cropped
            .save(out_path)
            .with_context(|| format!("failed to save cropped frame {}", out_path.display()))?;
    }

    let (width, height) = image::image_dimensions(out_path)
        .with_context(|| format!("failed to read frame dimensions of {}", out_path.display()))?;

    Ok(CapturedFrame {
        path: out_path.to_path_buf(),
        width,
        height,
    })
}
