//! Parser for ffmpeg's `ametadata=mode=print` output of the `astats` filter.
//!
//! The stream is line oriented and grouped by frame:
//!
//! ```text
//! frame:12   pts:26460   pts_time:0.6
//! lavfi.astats.1.Peak_level=-6.020600
//! lavfi.astats.1.RMS_level=-9.030900
//! lavfi.astats.2.Peak_level=-inf
//! lavfi.astats.2.RMS_level=-inf
//! lavfi.astats.Overall.Peak_level=-6.020600
//! ```
//!
//! Each frame becomes one [`PipelineMessage::Level`] batch, ordered by the
//! astats channel number. `Overall` and per-channel keys other than the peak
//! and RMS levels are skipped.

use std::collections::BTreeMap;

use tracing::debug;

use crate::protocol::{PipelineMessage, Sample, DB_FLOOR};

const KEY_PREFIX: &str = "lavfi.astats.";
const FRAME_PREFIX: &str = "frame:";

#[derive(Debug, Default, Clone, Copy)]
struct PartialSample {
    peak_db: Option<f64>,
    rms_db: Option<f64>,
}

/// Incremental, frame-grouped parser. Feed it lines; it hands back a batch
/// each time a frame is complete.
#[derive(Debug, Default)]
pub struct AmetadataParser {
    frame: BTreeMap<u32, PartialSample>,
}

impl AmetadataParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line. Returns the previous frame's batch when `line`
    /// starts a new frame, or `Other` for lines that are not metadata.
    pub fn feed_line(&mut self, line: &str) -> Option<PipelineMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line.starts_with(FRAME_PREFIX) {
            return self.flush();
        }

        let Some(rest) = line.strip_prefix(KEY_PREFIX) else {
            return Some(PipelineMessage::Other(line.to_string()));
        };
        let Some((key, value)) = rest.split_once('=') else {
            return Some(PipelineMessage::Other(line.to_string()));
        };
        let Some((channel, field)) = key.split_once('.') else {
            return None;
        };
        let Ok(channel) = channel.parse::<u32>() else {
            // Overall.* and friends
            return None;
        };

        match field {
            "Peak_level" => {
                self.frame.entry(channel).or_default().peak_db = Some(parse_db(value));
            }
            "RMS_level" => {
                self.frame.entry(channel).or_default().rms_db = Some(parse_db(value));
            }
            _ => {}
        }
        None
    }

    /// Flush the frame in progress at end of input.
    pub fn finish(&mut self) -> Option<PipelineMessage> {
        self.flush()
    }

    fn flush(&mut self) -> Option<PipelineMessage> {
        if self.frame.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.frame)
            .into_values()
            .map(|p| {
                Sample::new(
                    p.peak_db.unwrap_or(DB_FLOOR),
                    p.rms_db.unwrap_or(DB_FLOOR),
                )
            })
            .collect();
        Some(PipelineMessage::Level(batch))
    }
}

/// Parse an astats level. ffmpeg prints `-inf` for digital silence, which
/// `f64::from_str` understands; anything unreadable counts as silence.
fn parse_db(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            debug!("ametadata: unreadable level {:?}", value);
            DB_FLOOR
        }
    }
}
