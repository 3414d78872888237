//! Color palette for the level meter. Plain ANSI colors so the meter looks the
//! same on any terminal theme.

use ratatui::style::{Color, Style};

/// Peak bar below the amber threshold.
pub const C_LOW: Color = Color::Blue;
/// Peak bar between the amber and red thresholds.
pub const C_AMBER: Color = Color::Yellow;
/// Peak bar at or above the red threshold.
pub const C_RED: Color = Color::Red;
/// RMS bar.
pub const C_RMS: Color = Color::Green;
/// Clip indicator.
pub const C_CLIP: Color = Color::Red;
/// Brackets, blanks and status text.
pub const C_FRAME: Color = Color::Reset;

pub fn style_fg(color: Color) -> Style {
    Style::default().fg(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::IntoCrossterm;
    use ratatui::crossterm::style::Color as TermColor;

    #[test]
    fn test_palette_maps_to_standard_ansi() {
        let term = |c: Color| -> TermColor { c.into_crossterm() };
        assert_eq!(term(C_LOW), TermColor::DarkBlue);
        assert_eq!(term(C_AMBER), TermColor::DarkYellow);
        assert_eq!(term(C_RED), TermColor::DarkRed);
        assert_eq!(term(C_RMS), TermColor::DarkGreen);
        assert_eq!(term(C_FRAME), TermColor::Reset);
    }
}
