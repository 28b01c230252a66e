//! Frame counting, snapshots, and the final report.

use crate::driver::Driver;
use crate::error::Error;

use image::png::PngEncoder;
use image::ColorType;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct FrameStats {
    frames: usize,
    started: Instant,
    gpu_ms: f64,
    timed: bool,

    /// Where to write snapshots, if anywhere.
    snapshot_prefix: Option<String>,
    width: u32,
    height: u32,
}

/// A summary of a finished replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frames: usize,
    pub elapsed: Duration,
    /// Total GPU time in milliseconds, if timings were collected.
    pub gpu_ms: Option<f64>,
}

impl FrameReport {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

impl FrameStats {
    pub fn new(snapshot_prefix: Option<String>, width: u32, height: u32) -> FrameStats {
        FrameStats {
            frames: 0,
            started: Instant::now(),
            gpu_ms: 0.0,
            timed: false,
            snapshot_prefix,
            width,
            height,
        }
    }

    /// Note the end of a frame.
    ///
    /// If snapshots were requested and `bound` is true, read the frame back
    /// through `driver` and write it out first.
    pub fn frame_complete<D: Driver + ?Sized>(&mut self, driver: &D, bound: bool) -> Result<(), Error> {
        debug!(frame = self.frames, "frame complete");
        if bound {
            if let Some(prefix) = &self.snapshot_prefix {
                let path = snapshot_path(prefix, self.frames);
                let pixels = driver.read_pixels_rgba8(self.width, self.height);
                write_snapshot(&path, &pixels, self.width, self.height)?;
            }
        }
        self.frames += 1;
        Ok(())
    }

    /// Add `ms` milliseconds of GPU time to the total.
    pub fn record_gpu_time(&mut self, ms: f64) {
        self.timed = true;
        self.gpu_ms += ms;
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn gpu_ms(&self) -> f64 {
        self.gpu_ms
    }

    /// Log the frame rate and GPU total, and return them.
    pub fn finish(&self) -> FrameReport {
        let report = FrameReport {
            frames: self.frames,
            elapsed: self.started.elapsed(),
            gpu_ms: if self.timed { Some(self.gpu_ms) } else { None },
        };
        info!(
            "Rendered {} frames in {:.3} secs, average of {:.3} fps",
            report.frames,
            report.elapsed.as_secs_f64(),
            report.fps()
        );
        if let Some(gpu_ms) = report.gpu_ms {
            info!("Total GPU time: {:.3} ms", gpu_ms);
        }
        report
    }
}

/// Return the file name for a snapshot of `frame`.
pub fn snapshot_path(prefix: &str, frame: usize) -> PathBuf {
    PathBuf::from(format!("{}{:010}.png", prefix, frame))
}

/// Write RGBA8 `pixels`, bottom row first as GL returns them, to a PNG file.
pub fn write_snapshot(path: &Path, pixels: &[u8], width: u32, height: u32) -> Result<(), Error> {
    let stride = width as usize * 4;
    let mut flipped = Vec::with_capacity(pixels.len());
    for row in pixels.chunks(stride.max(1)).rev() {
        flipped.extend_from_slice(row);
    }

    let snapshot_error = |source| Error::Snapshot {
        path: path.to_owned(),
        source,
    };
    let file = File::create(path).map_err(|e| snapshot_error(image::ImageError::IoError(e)))?;
    PngEncoder::new(file)
        .encode(&flipped, width, height, ColorType::Rgba8)
        .map_err(snapshot_error)?;
    debug!("wrote snapshot {}", path.display());
    Ok(())
}
