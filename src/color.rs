//! Hex color parsing and X11 color conversion

use x11rb::protocol::render::Color;

/// Color parsed from a `#RRGGBB` or `#AARRGGBB` string, stored as raw ARGB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(u32);

impl HexColor {
    /// Parse a hex color. The `#` prefix is optional; 6-digit colors are opaque.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok().map(|rgb| Self(0xFF00_0000 | rgb)),
            8 => u32::from_str_radix(hex, 16).ok().map(Self),
            _ => None,
        }
    }

    pub fn from_argb32(argb: u32) -> Self {
        Self(argb)
    }

    /// Raw (non-premultiplied) ARGB value
    pub fn argb32(self) -> u32 {
        self.0
    }

    /// Convert to a RENDER color (16 bits per channel)
    pub fn to_x11_color(self) -> Color {
        let channel = |shift: u32| ((self.0 >> shift) & 0xFF) as u16 * 257;
        Color {
            red: channel(16),
            green: channel(8),
            blue: channel(0),
            alpha: channel(24),
        }
    }
}

/// Window opacity as a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opacity(u8);

impl Opacity {
    pub fn from_percent(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Value for `_NET_WM_WINDOW_OPACITY` (0 = transparent, u32::MAX = opaque)
    pub fn to_cardinal(self) -> u32 {
        ((u32::MAX as u64 * self.0 as u64) / 100) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_six_digit_is_opaque() {
        assert_eq!(HexColor::parse("#e0e0e0").unwrap().argb32(), 0xFFE0E0E0);
        assert_eq!(HexColor::parse("ff9800").unwrap().argb32(), 0xFFFF9800);
    }

    #[test]
    fn test_parse_eight_digit_keeps_alpha() {
        assert_eq!(HexColor::parse("#80112233").unwrap().argb32(), 0x80112233);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(HexColor::parse("invalid").is_none());
        assert!(HexColor::parse("#12345").is_none());
        assert!(HexColor::parse("#gg0000").is_none());
    }

    #[test]
    fn test_to_x11_color() {
        let color = HexColor::from_argb32(0xFFFF9800).to_x11_color();
        assert_eq!(color.red, 65535);
        assert_eq!(color.green, 0x98 * 257);
        assert_eq!(color.blue, 0);
        assert_eq!(color.alpha, 65535);
    }

    #[test]
    fn test_opacity_cardinal() {
        assert_eq!(Opacity::from_percent(100).to_cardinal(), u32::MAX);
        assert_eq!(Opacity::from_percent(0).to_cardinal(), 0);
        assert_eq!(Opacity::from_percent(150), Opacity::from_percent(100));
    }
}
