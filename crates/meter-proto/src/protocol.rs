/// Lowest level the meter distinguishes. Silence, `-inf` and NaN land here.
pub const DB_FLOOR: f64 = -90.0;
/// Highest level accepted from the pipeline. `+inf` saturates here.
pub const DB_CEIL: f64 = 24.0;

/// One channel's measurement for one analysis interval, in dBFS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub peak_db: f64,
    pub rms_db: f64,
}

impl Sample {
    /// Build a sample, saturating non-finite or out-of-range values into
    /// `[DB_FLOOR, DB_CEIL]`.
    pub fn new(peak_db: f64, rms_db: f64) -> Self {
        Self {
            peak_db: saturate_db(peak_db),
            rms_db: saturate_db(rms_db),
        }
    }

    pub fn silence() -> Self {
        Self {
            peak_db: DB_FLOOR,
            rms_db: DB_FLOOR,
        }
    }
}

/// Clamp a dB reading into the accepted range. NaN counts as silence.
pub fn saturate_db(db: f64) -> f64 {
    if db.is_nan() {
        DB_FLOOR
    } else {
        db.clamp(DB_FLOOR, DB_CEIL)
    }
}

/// Everything the level pipeline can tell the session.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    /// One measurement per live channel, in channel order.
    Level(Vec<Sample>),
    /// The source ran dry; the session should stop cleanly.
    EndOfStream,
    /// Something non-fatal happened upstream.
    Warning { source: String, message: String },
    /// The pipeline failed. `source` names the failing component.
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    /// Anything else the pipeline emitted (diagnostic text, unknown keys).
    Other(String),
}
