//! Display state owned by the overlay thread

use std::time::{Duration, Instant};

use super::Style;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Hidden,
    Visible {
        text: String,
        style: Style,
        expires_at: Instant,
    },
}

impl DisplayState {
    /// Replace whatever is showing; the dismiss deadline restarts from `now`
    pub fn show(&mut self, text: &str, style: Style, duration: Duration, now: Instant) {
        *self = DisplayState::Visible {
            text: text.to_string(),
            style,
            expires_at: now + duration,
        };
    }

    /// Returns true if something was visible
    pub fn hide(&mut self) -> bool {
        let was_visible = self.is_visible();
        *self = DisplayState::Hidden;
        was_visible
    }

    /// Hide if the deadline has passed. Returns true if this call hid it.
    pub fn expire(&mut self, now: Instant) -> bool {
        let expired = matches!(self, DisplayState::Visible { expires_at, .. } if *expires_at <= now);
        expired && self.hide()
    }

    /// Time left before auto-hide, `None` while hidden
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self {
            DisplayState::Visible { expires_at, .. } => Some(expires_at.saturating_duration_since(now)),
            DisplayState::Hidden => None,
        }
    }

    /// Text and style currently on screen
    pub fn visible(&self) -> Option<(&str, Style)> {
        match self {
            DisplayState::Visible { text, style, .. } => Some((text.as_str(), *style)),
            DisplayState::Hidden => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, DisplayState::Visible { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE: Duration = Duration::from_secs(5);

    #[test]
    fn test_second_show_overwrites_text_style_and_deadline() {
        let start = Instant::now();
        let mut state = DisplayState::Hidden;

        state.show("X", Style::Normal, FIVE, start);
        let later = start + Duration::from_secs(3);
        state.show("Y", Style::Warning, FIVE, later);

        assert_eq!(
            state,
            DisplayState::Visible {
                text: "Y".to_string(),
                style: Style::Warning,
                expires_at: later + FIVE,
            }
        );
        // The first show's deadline no longer applies
        assert!(!state.expire(start + FIVE));
        assert!(state.is_visible());
        assert_eq!(state.visible(), Some(("Y", Style::Warning)));
        assert!(state.expire(later + FIVE));
        assert_eq!(state, DisplayState::Hidden);
        assert_eq!(state.visible(), None);
    }

    #[test]
    fn test_expire_before_deadline_is_noop() {
        let start = Instant::now();
        let mut state = DisplayState::Hidden;
        state.show("X", Style::Normal, FIVE, start);

        assert!(!state.expire(start + Duration::from_secs(4)));
        assert_eq!(state.remaining(start + Duration::from_secs(4)), Some(Duration::from_secs(1)));
        assert_eq!(state.remaining(start + Duration::from_secs(9)), Some(Duration::ZERO));
    }

    #[test]
    fn test_hide_is_idempotent() {
        let mut state = DisplayState::Hidden;
        assert!(!state.hide());
        state.show("X", Style::Normal, FIVE, Instant::now());
        assert!(state.hide());
        assert!(!state.hide());
        assert_eq!(state.remaining(Instant::now()), None);
    }
}
