//! Level meter row — maps one channel's reading onto terminal columns.
//!
//! A row is one terminal line:
//!
//! ```text
//! [=========================+=====!] Peak   -6.02dB RMS  -12.00dB Over 0
//! ^ col 0                          ^ col usable_width, status starts right after
//! ```
//!
//! The peak bar is drawn first and colored by the zone the current peak is in,
//! the RMS bar is laid over its left end in green, then the peak-hold marker
//! and the clip glyph go on top.

use ratatui::{
    style::Color,
    text::{Line, Span},
};

use crate::meter_state::MeterReading;
use crate::theme::{style_fg, C_AMBER, C_CLIP, C_FRAME, C_LOW, C_RED, C_RMS};

/// Linear level where the bar turns amber (about -3.5 dBFS).
pub const AMBER: f64 = 0.67;
/// Linear level where the bar turns red (about -2.0 dBFS).
pub const RED: f64 = 0.79;
/// Columns reserved to the right of the bar for the status text.
pub const STATUS_WIDTH: u16 = 42;

const BAR_CHAR: char = '=';
const HOLD_CHAR: char = '+';
const CLIP_CHAR: char = '!';

/// Column layout for a given terminal width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u16,
    pub usable_width: usize,
    pub amber_col: usize,
    pub red_col: usize,
}

impl Geometry {
    pub fn compute(width: u16) -> Self {
        let usable_width = width.saturating_sub(STATUS_WIDTH) as usize;
        Self {
            width,
            usable_width,
            amber_col: (usable_width as f64 * AMBER).floor() as usize,
            red_col: (usable_width as f64 * RED).floor() as usize,
        }
    }

    /// Columns covered by a linear level, clamped to the bar.
    pub fn col(&self, x: f64) -> usize {
        (self.usable_width as f64 * x.clamp(0.0, 1.0)).floor() as usize
    }

    /// Absolute column where the status text starts.
    pub fn status_col(&self) -> u16 {
        if self.usable_width == 0 {
            0
        } else {
            (self.usable_width + 1) as u16
        }
    }
}

/// Color band a linear level falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Low,
    Amber,
    Red,
}

impl Zone {
    pub fn of(x: f64) -> Self {
        if x >= RED {
            Zone::Red
        } else if x >= AMBER {
            Zone::Amber
        } else {
            Zone::Low
        }
    }

    pub fn color(self) -> Color {
        match self {
            Zone::Low => C_LOW,
            Zone::Amber => C_AMBER,
            Zone::Red => C_RED,
        }
    }
}

/// One rendered channel: the styled bar and the fixed-width status text.
#[derive(Debug, Clone)]
pub struct ChannelRow {
    pub bar: Line<'static>,
    pub status: String,
}

pub fn status_text(reading: &MeterReading) -> String {
    format!(
        " Peak {:7.2}dB RMS {:7.2}dB Over {:<5}",
        reading.peak_db, reading.rms_db, reading.total_overs
    )
}

/// Render one channel. Pure; the engine decides where the row goes.
pub fn render_channel(reading: &MeterReading, geometry: &Geometry) -> ChannelRow {
    ChannelRow {
        bar: build_bar(reading, geometry),
        status: status_text(reading),
    }
}

fn peak_cell_color(col: usize, zone: Zone, geometry: &Geometry) -> Color {
    match zone {
        Zone::Low => C_LOW,
        Zone::Amber if col < geometry.amber_col => C_LOW,
        Zone::Amber => C_AMBER,
        Zone::Red if col < geometry.amber_col => C_LOW,
        Zone::Red if col < geometry.red_col => C_AMBER,
        Zone::Red => C_RED,
    }
}

fn build_bar(reading: &MeterReading, geometry: &Geometry) -> Line<'static> {
    let w = geometry.usable_width;
    if w == 0 {
        return Line::default();
    }

    // Columns 0..w are the bar, column w is the closing bracket.
    let mut cells: Vec<(char, Color)> = vec![(' ', C_FRAME); w + 1];

    let zone = Zone::of(reading.peak);
    for (col, cell) in cells.iter_mut().enumerate().take(geometry.col(reading.peak)) {
        *cell = (BAR_CHAR, peak_cell_color(col, zone, geometry));
    }
    cells[w] = (']', C_FRAME);

    cells[0] = ('[', C_FRAME);
    let rms_end = geometry.col(reading.rms).min(w.saturating_sub(1));
    for cell in cells.iter_mut().take(rms_end + 1).skip(1) {
        *cell = (BAR_CHAR, C_RMS);
    }

    if w >= 2 {
        if reading.peak_hold > 0.0 {
            let hold_col = geometry
                .col(reading.peak_hold)
                .saturating_sub(1)
                .max(rms_end + 1)
                .min(w - 1);
            cells[hold_col] = (HOLD_CHAR, Zone::of(reading.peak_hold).color());
        }
        if reading.clip_active() {
            cells[w - 1] = (CLIP_CHAR, C_CLIP);
        }
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current_color: Option<Color> = None;
    let mut current_str = String::new();

    let flush = |spans: &mut Vec<Span<'static>>, color: Color, s: String| {
        if !s.is_empty() {
            spans.push(Span::styled(s, style_fg(color)));
        }
    };

    for (ch, color) in cells {
        if current_color != Some(color) {
            if let Some(c) = current_color.take() {
                flush(&mut spans, c, std::mem::take(&mut current_str));
            }
            current_color = Some(color);
        }
        current_str.push(ch);
    }

    if let Some(c) = current_color {
        flush(&mut spans, c, current_str);
    }

    Line::from(spans)
}
