//! MeterEngine — owns the channel states and paints the meter region.
//!
//! The region is exactly one row per channel. Every frame is painted from the
//! region's top row and ends with the cursor moved back there, so the next
//! frame overwrites it in place instead of scrolling.

use std::io::Write;

use meter_proto::protocol::Sample;
use ratatui::backend::IntoCrossterm;
use ratatui::crossterm::{
    cursor::{MoveToColumn, MoveUp},
    queue,
    style::{Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use ratatui::style::Color;
use tracing::{debug, info, warn};

use crate::components::level_meter::{render_channel, Geometry};
use crate::error::SessionError;
use crate::meter_state::{ChannelMeterState, MeterReading, MAXCHANS};

pub struct MeterEngine<W: Write> {
    out: W,
    geometry: Geometry,
    /// Sized by the first non-empty batch, fixed afterwards.
    channels: Vec<ChannelMeterState>,
    readings: Vec<MeterReading>,
    /// Status text currently on screen, per channel.
    drawn_status: Vec<Option<String>>,
    /// Redraw every status text on the next frame.
    dirty: bool,
    /// Clear the region before the next frame (after a resize).
    needs_clear: bool,
    frames: u64,
}

impl<W: Write> MeterEngine<W> {
    pub fn new(out: W, width: u16) -> Self {
        Self {
            out,
            geometry: Geometry::compute(width),
            channels: Vec::new(),
            readings: Vec::new(),
            drawn_status: Vec::new(),
            dirty: true,
            needs_clear: false,
            frames: 0,
        }
    }

    #[cfg(test)]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[cfg(test)]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[ChannelMeterState] {
        &self.channels
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// New terminal width: recompute the layout and repaint everything,
    /// clearing the old region first, on the next frame.
    pub fn resize(&mut self, width: u16) {
        self.geometry = Geometry::compute(width);
        self.dirty = true;
        self.needs_clear = true;
        debug!(
            "engine: resized to {} cols (bar {} cols)",
            self.geometry.width, self.geometry.usable_width
        );
    }

    /// Advance every channel present in `batch` and paint a frame.
    pub fn apply(&mut self, batch: &[Sample]) -> Result<(), SessionError> {
        if self.channels.is_empty() {
            if batch.is_empty() {
                debug!("engine: empty batch before channel count is known, skipping");
                return Ok(());
            }
            let count = batch.len().min(MAXCHANS);
            if batch.len() > MAXCHANS {
                warn!(
                    "engine: source reports {} channels, metering the first {}",
                    batch.len(),
                    MAXCHANS
                );
            }
            self.channels = vec![ChannelMeterState::new(); count];
            self.readings = vec![MeterReading::idle(); count];
            self.drawn_status = vec![None; count];
            self.dirty = true;
            info!("engine: metering {} channel(s)", count);
        } else if batch.len() > self.channels.len() {
            debug!(
                "engine: ignoring {} channel(s) beyond the first {}",
                batch.len() - self.channels.len(),
                self.channels.len()
            );
        }

        for ((state, reading), sample) in self
            .channels
            .iter_mut()
            .zip(self.readings.iter_mut())
            .zip(batch)
        {
            *reading = state.advance(*sample);
            if reading.changed {
                self.dirty = true;
            }
        }

        self.draw()
    }

    /// Paint the whole region from its top row and return the cursor there.
    pub fn draw(&mut self) -> Result<(), SessionError> {
        if self.needs_clear {
            queue!(self.out, MoveToColumn(0), Clear(ClearType::FromCursorDown))?;
            self.needs_clear = false;
        }

        let count = self.readings.len();
        for i in 0..count {
            let row = render_channel(&self.readings[i], &self.geometry);

            queue!(self.out, MoveToColumn(0))?;
            for span in &row.bar.spans {
                let fg = span.style.fg.unwrap_or(Color::Reset);
                queue!(
                    self.out,
                    SetForegroundColor(fg.into_crossterm()),
                    Print(span.content.as_ref())
                )?;
            }
            queue!(self.out, ResetColor)?;

            let stale = self.drawn_status[i].as_deref() != Some(row.status.as_str());
            if self.dirty || stale {
                queue!(
                    self.out,
                    MoveToColumn(self.geometry.status_col()),
                    Print(&row.status)
                )?;
                self.drawn_status[i] = Some(row.status);
            }

            if i + 1 < count {
                queue!(self.out, Print("\n"))?;
            }
        }

        if count > 1 {
            queue!(self.out, MoveUp((count - 1) as u16))?;
        }
        queue!(self.out, MoveToColumn(0))?;
        self.out.flush()?;

        self.dirty = false;
        self.frames += 1;
        Ok(())
    }

    /// Erase the meter region. The cursor ends at column 0 of its top row.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        queue!(self.out, MoveToColumn(0), Clear(ClearType::FromCursorDown))?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter_state::HOLD;

    fn output(engine: &mut MeterEngine<Vec<u8>>) -> String {
        let s = String::from_utf8_lossy(engine.writer()).into_owned();
        engine.writer_mut().clear();
        s
    }

    fn stereo(peak: f64) -> Vec<Sample> {
        vec![Sample::new(peak, peak - 6.0), Sample::new(peak, peak - 6.0)]
    }

    #[test]
    fn test_channel_count_fixed_by_first_batch() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        engine.apply(&stereo(-10.0)).unwrap();
        assert_eq!(engine.channel_count(), 2);

        let wider = vec![Sample::new(-10.0, -16.0); 5];
        engine.apply(&wider).unwrap();
        assert_eq!(engine.channel_count(), 2);

        // A short batch only advances the channels it carries.
        engine.apply(&[Sample::new(-1.0, -4.0)]).unwrap();
        assert_eq!(engine.channel_count(), 2);
        assert!(engine.channels()[0].peak_hold() > engine.channels()[1].peak_hold());
    }

    #[test]
    fn test_ten_channels_are_truncated_to_eight() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        let batch = vec![Sample::new(-6.0, -12.0); 10];
        engine.apply(&batch).unwrap();
        assert_eq!(engine.channel_count(), MAXCHANS);

        let out = output(&mut engine);
        assert_eq!(out.matches('\n').count(), MAXCHANS - 1);
        assert!(out.contains("\x1b[7A"));
    }

    #[test]
    fn test_empty_first_batch_is_skipped() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        engine.apply(&[]).unwrap();
        assert_eq!(engine.channel_count(), 0);
        assert_eq!(engine.frames(), 0);
        assert!(engine.writer().is_empty());
    }

    #[test]
    fn test_single_channel_never_moves_up() {
        let mut engine = MeterEngine::new(Vec::new(), 100);
        engine.apply(&[Sample::new(-6.0, -12.0)]).unwrap();
        let out = output(&mut engine);
        assert!(!out.contains('\n'));
        assert!(!out.contains("A"), "unexpected cursor-up in {:?}", out);
        // Status text is positioned absolutely, right after the bar.
        assert!(out.contains("\x1b[60G Peak"));
    }

    #[test]
    fn test_frame_returns_to_region_top() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        engine.apply(&stereo(-6.0)).unwrap();
        let out = output(&mut engine);
        assert_eq!(out.matches('\n').count(), 1);
        assert!(out.ends_with("\x1b[1A\x1b[1G"));
    }

    #[test]
    fn test_unchanged_status_is_not_repainted() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        engine.apply(&[Sample::new(-6.0, -12.0)]).unwrap();
        assert!(output(&mut engine).contains("Peak"));

        // Same levels, peak hold not rising: nothing new to say.
        engine.apply(&[Sample::new(-6.0, -12.0)]).unwrap();
        assert!(!output(&mut engine).contains("Peak"));

        // New text shows up even without a hold/clip change.
        engine.apply(&[Sample::new(-7.0, -12.0)]).unwrap();
        assert!(output(&mut engine).contains("-7.00dB"));
    }

    #[test]
    fn test_resize_clears_and_repaints_with_new_geometry() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        engine.apply(&[Sample::new(-6.0, -12.0)]).unwrap();
        output(&mut engine);

        engine.resize(80);
        assert_eq!(engine.geometry().usable_width, 38);
        engine.apply(&[Sample::new(-6.0, -12.0)]).unwrap();
        let out = output(&mut engine);
        assert!(out.starts_with("\x1b[1G\x1b[J"));
        assert!(out.contains("\x1b[40G Peak"), "status not moved in {:?}", out);

        // Only the frame right after the resize clears.
        engine.apply(&[Sample::new(-6.0, -12.0)]).unwrap();
        assert!(!output(&mut engine).contains("\x1b[J"));
    }

    #[test]
    fn test_clip_forces_status_repaint() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        for _ in 0..3 {
            engine.apply(&[Sample::new(0.0, -3.0)]).unwrap();
        }
        let out = output(&mut engine);
        assert!(out.contains("Over 1"));
        assert_eq!(engine.channels()[0].total_overs(), 1);
        assert_eq!(engine.channels()[0].clip_ticks(), HOLD * 2 - 1);
    }

    #[test]
    fn test_bar_uses_standard_ansi_colors() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        engine.apply(&[Sample::new(-6.0, -12.0)]).unwrap();
        let out = output(&mut engine);
        assert!(out.contains("\x1b[39m["), "frame color missing in {:?}", out);
        assert!(out.contains("\x1b[38;5;2m="), "rms green missing in {:?}", out);
        assert!(out.contains("\x1b[38;5;4m="), "peak blue missing in {:?}", out);
    }

    #[test]
    fn test_clear_erases_region() {
        let mut engine = MeterEngine::new(Vec::new(), 120);
        engine.apply(&stereo(-6.0)).unwrap();
        output(&mut engine);
        engine.clear().unwrap();
        assert_eq!(output(&mut engine), "\x1b[1G\x1b[J");
    }
}
