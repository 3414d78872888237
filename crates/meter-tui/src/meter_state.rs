//! Per-channel metering state: peak hold with decay, clip indicator and
//! over (clip run) counting. One `advance` per incoming sample.

use meter_proto::protocol::{saturate_db, Sample, DB_FLOOR};

/// Most channels a session will track; wider sources are truncated.
pub const MAXCHANS: usize = 8;
/// Peak level at or above which a sample counts as clipped, in dBFS.
pub const CLIP_DB: f64 = 0.0;
/// Ticks the peak-hold marker stays put before decaying. The clip indicator
/// stays lit for twice as long.
pub const HOLD: i32 = 24;
/// Consecutive clipped samples that make one over.
pub const OVER: u32 = 3;
/// Linear amount the peak hold falls per tick once the hold expires.
pub const DECAY_STEP: f64 = 0.02;

/// dBFS to linear amplitude. The floor is treated as true silence.
pub fn db_to_amplitude(db: f64) -> f64 {
    if db <= DB_FLOOR {
        0.0
    } else {
        10f64.powf(db / 20.0)
    }
}

/// What gets drawn for one channel after one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub peak_db: f64,
    pub rms_db: f64,
    /// Linear peak amplitude of this sample.
    pub peak: f64,
    /// Linear RMS amplitude of this sample.
    pub rms: f64,
    pub peak_hold: f64,
    pub clip_ticks: i32,
    pub total_overs: u64,
    /// Peak hold rose or a clip sample arrived; status text needs a redraw.
    pub changed: bool,
}

impl MeterReading {
    /// Reading for a channel that has not produced a sample yet.
    pub fn idle() -> Self {
        Self {
            peak_db: DB_FLOOR,
            rms_db: DB_FLOOR,
            peak: 0.0,
            rms: 0.0,
            peak_hold: 0.0,
            clip_ticks: 0,
            total_overs: 0,
            changed: false,
        }
    }

    pub fn clip_active(&self) -> bool {
        self.clip_ticks > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMeterState {
    peak_hold: f64,
    hold_ticks: i32,
    clip_ticks: i32,
    consecutive_over: u32,
    total_overs: u64,
}

impl Default for ChannelMeterState {
    fn default() -> Self {
        Self {
            peak_hold: 0.0,
            hold_ticks: HOLD,
            clip_ticks: 0,
            consecutive_over: 0,
            total_overs: 0,
        }
    }
}

impl ChannelMeterState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn peak_hold(&self) -> f64 {
        self.peak_hold
    }

    #[cfg(test)]
    pub fn hold_ticks(&self) -> i32 {
        self.hold_ticks
    }

    #[cfg(test)]
    pub fn clip_ticks(&self) -> i32 {
        self.clip_ticks
    }

    #[cfg(test)]
    pub fn consecutive_over(&self) -> u32 {
        self.consecutive_over
    }

    pub fn total_overs(&self) -> u64 {
        self.total_overs
    }

    /// Step the state machine by one sample.
    ///
    /// The returned reading is taken after clip detection and the peak-hold
    /// update but before the hold and clip countdowns tick, so a clip sample
    /// is always drawn with the full `HOLD * 2` clip countdown.
    pub fn advance(&mut self, sample: Sample) -> MeterReading {
        // `Sample`'s fields are public; do not trust that it went through `new`.
        let peak_db = saturate_db(sample.peak_db);
        let rms_db = saturate_db(sample.rms_db);
        let peak = db_to_amplitude(peak_db);
        let rms = db_to_amplitude(rms_db);
        let mut changed = false;

        if peak_db >= CLIP_DB {
            self.consecutive_over = self.consecutive_over.saturating_add(1);
            self.clip_ticks = HOLD * 2;
            // Exactly once per run, however long the run gets.
            if self.consecutive_over == OVER {
                self.total_overs += 1;
            }
            changed = true;
        } else {
            self.consecutive_over = 0;
        }

        if peak > self.peak_hold {
            self.peak_hold = peak;
            self.hold_ticks = HOLD;
            changed = true;
        }

        let reading = MeterReading {
            peak_db,
            rms_db,
            peak,
            rms,
            peak_hold: self.peak_hold,
            clip_ticks: self.clip_ticks,
            total_overs: self.total_overs,
            changed,
        };

        if self.hold_ticks > 0 {
            self.hold_ticks -= 1;
        } else if self.peak_hold >= DECAY_STEP {
            self.peak_hold -= DECAY_STEP;
        } else {
            self.peak_hold = 0.0;
        }

        if self.clip_ticks > 0 {
            self.clip_ticks -= 1;
        }

        reading
    }
}
