//! TrueType text rendering using fontdue (pure Rust), with word wrapping

use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use super::font_discovery::find_font_path;
use crate::constants::fonts;

/// Rendered text as ARGB bitmap
pub struct RenderedText {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u32>, // ARGB pixels (premultiplied alpha)
}

impl RenderedText {
    fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    /// The first `rows` rows (at most `height`) in X11 native byte order
    /// (little-endian BGRA)
    pub fn to_bgra_rows(&self, rows: usize) -> Vec<u8> {
        let rows = rows.min(self.height);
        self.data[..rows * self.width]
            .iter()
            .flat_map(|pixel| pixel.to_le_bytes())
            .collect()
    }
}

/// Font renderer using fontdue
#[derive(Debug)]
pub struct FontRenderer {
    font: Font,
    size: f32,
}

impl FontRenderer {
    /// Load a TrueType font from a file path
    pub fn from_path(path: PathBuf, size: f32) -> Result<Self> {
        let font_data = fs::read(&path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;

        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font: {}", e))?;

        info!(path = %path.display(), size = size, "Loaded font");
        Ok(Self { font, size })
    }

    /// Load font from a font name (family or fullname) via fontconfig
    pub fn from_font_name(font_name: &str, size: f32) -> Result<Self> {
        let font_path = find_font_path(font_name)
            .with_context(|| format!("Failed to resolve font '{}'", font_name))?;
        Self::from_path(font_path, size)
    }

    /// Fontconfig's default sans face, then well-known file locations
    pub fn from_system_font(size: f32) -> Result<Self> {
        if let Ok(renderer) = Self::from_font_name(fonts::FALLBACK_FAMILY, size) {
            return Ok(renderer);
        }
        warn!(family = fonts::FALLBACK_FAMILY, "Fontconfig lookup failed, trying hardcoded font paths");

        for path in fonts::FALLBACK_PATHS {
            if let Ok(renderer) = Self::from_path(PathBuf::from(path), size) {
                return Ok(renderer);
            }
        }

        Err(anyhow::anyhow!(
            "Could not find any system fonts. Tried fontconfig '{}' and hardcoded paths: {:?}",
            fonts::FALLBACK_FAMILY,
            fonts::FALLBACK_PATHS
        ))
    }

    /// Configured font if one is set and loadable, otherwise the system default
    pub fn load(font_name: &str, size: f32) -> Result<Self> {
        if font_name.is_empty() {
            return Self::from_system_font(size);
        }
        Self::from_font_name(font_name, size).or_else(|e| {
            warn!(font = %font_name, error = ?e, "Failed to load configured font, falling back to system default");
            Self::from_system_font(size)
        })
    }

    /// Horizontal advance of a string in pixels
    pub fn measure(&self, text: &str) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, self.size).advance_width)
            .sum()
    }

    /// Render text wrapped to `max_width` pixels onto a transparent ARGB bitmap
    pub fn render_wrapped(
        &self,
        text: &str,
        fg_color: u32, // ARGB format
        max_width: u16,
    ) -> RenderedText {
        let lines = wrap_text(text, max_width as f32, |s| self.measure(s));
        if lines.is_empty() {
            return RenderedText::empty();
        }

        let (ascent, line_height) = match self.font.horizontal_line_metrics(self.size) {
            Some(m) => (m.ascent.ceil() as i32, m.new_line_size.ceil().max(1.0) as usize),
            None => (self.size.ceil() as i32, (self.size * 1.25).ceil() as usize),
        };

        let width = lines
            .iter()
            .map(|line| self.measure(line).ceil() as usize)
            .max()
            .unwrap_or(0)
            .min(max_width as usize);
        let height = line_height * lines.len();

        if width == 0 || height == 0 {
            return RenderedText::empty();
        }

        // Create ARGB bitmap filled with fully transparent pixels
        let mut data = vec![0x00000000; width * height];

        // Extract color components (foreground is NOT premultiplied - raw ARGB)
        let fg_a = ((fg_color >> 24) & 0xFF) as f32 / 255.0;
        let fg_r = ((fg_color >> 16) & 0xFF) as f32 / 255.0;
        let fg_g = ((fg_color >> 8) & 0xFF) as f32 / 255.0;
        let fg_b = (fg_color & 0xFF) as f32 / 255.0;

        for (row, line) in lines.iter().enumerate() {
            let baseline = (row * line_height) as i32 + ascent;
            let mut pen_x = 0.0f32;

            for ch in line.chars() {
                let (metrics, bitmap) = self.font.rasterize(ch, self.size);
                let glyph_x = pen_x as i32 + metrics.xmin;
                let glyph_y = baseline - (metrics.height as i32 + metrics.ymin);
                pen_x += metrics.advance_width;

                for gy in 0..metrics.height {
                    for gx in 0..metrics.width {
                        let px = glyph_x + gx as i32;
                        let py = glyph_y + gy as i32;

                        if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                            continue;
                        }

                        let coverage = bitmap[gy * metrics.width + gx] as f32 / 255.0;

                        if coverage > 0.0 {
                            // Premultiply: alpha = fg_alpha * coverage, RGB = fg_RGB * coverage
                            let alpha = (fg_a * coverage * 255.0) as u32;
                            let r = (fg_r * coverage * 255.0) as u32;
                            let g = (fg_g * coverage * 255.0) as u32;
                            let b = (fg_b * coverage * 255.0) as u32;

                            data[(py as usize) * width + (px as usize)] =
                                (alpha << 24) | (r << 16) | (g << 8) | b;
                        }
                    }
                }
            }
        }

        RenderedText {
            width,
            height,
            data,
        }
    }
}

/// Greedy word wrap. Explicit newlines are kept (blank lines included) and
/// words wider than a whole line are broken between characters.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }

            for ch in word.chars() {
                current.push(ch);
                if measure(&current) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }

        lines.push(current);
    }

    lines
}
