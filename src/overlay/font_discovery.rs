//! Resolve font names to files via fontconfig

use anyhow::{Context, Result};
use fontconfig::{Fontconfig, Pattern};
use std::ffi::CString;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Style suffixes recognized in names like "Roboto Mono SemiBold Italic".
/// Longer names first so "SemiBold Italic" wins over "Bold Italic".
const KNOWN_STYLES: &[&str] = &[
    "SemiBold Italic",
    "Bold Italic",
    "Light Italic",
    "Medium Italic",
    "SemiBold",
    "Italic",
    "Bold",
    "Light",
    "Medium",
    "Regular",
];

/// Aliases fontconfig always substitutes, so the returned family never matches
const GENERIC_FAMILIES: &[&str] = &["sans", "sans-serif", "serif", "monospace"];

/// Split "Family Name Style" into family and optional style
fn split_style(font_name: &str) -> (&str, Option<&'static str>) {
    for &style in KNOWN_STYLES {
        if let Some(prefix) = font_name.strip_suffix(style)
            && (prefix.is_empty() || prefix.ends_with(' '))
        {
            return (prefix.trim(), Some(style));
        }
    }
    (font_name, None)
}

/// Best matching font file for a family name or "family style" name
pub fn find_font_path(font_name: &str) -> Result<PathBuf> {
    let fc = Fontconfig::new().context("Failed to initialize fontconfig")?;
    let (family, style) = split_style(font_name.trim());

    let mut pattern = Pattern::new(&fc);
    let family_cstr =
        CString::new(family).with_context(|| format!("Invalid family name: {}", family))?;
    pattern.add_string(fontconfig::FC_FAMILY, &family_cstr);
    if let Some(style) = style {
        let style_cstr = CString::new(style).with_context(|| format!("Invalid style name: {}", style))?;
        pattern.add_string(fontconfig::FC_STYLE, &style_cstr);
    }

    let matched = pattern.font_match();

    // fontconfig falls back silently when a family isn't installed
    let generic = GENERIC_FAMILIES.contains(&family.to_lowercase().as_str());
    if !generic
        && let Some(matched_family) = matched.get_string(fontconfig::FC_FAMILY)
        && !matched_family.eq_ignore_ascii_case(family)
    {
        warn!(
            requested = font_name,
            matched_family = matched_family,
            "Fontconfig returned a different family, requested font may not be installed"
        );
        anyhow::bail!("Font '{}' not found (fontconfig offered '{}')", font_name, matched_family);
    }

    let path = PathBuf::from(
        matched
            .filename()
            .with_context(|| format!("No font file found for '{}'", font_name))?,
    );
    if !path.exists() {
        anyhow::bail!("Font file path '{}' does not exist", path.display());
    }

    debug!(font = font_name, family = family, style = ?style, path = %path.display(), "Resolved font path");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_style() {
        assert_eq!(split_style("DejaVu Sans"), ("DejaVu Sans", None));
        assert_eq!(split_style("Roboto Mono Bold"), ("Roboto Mono", Some("Bold")));
        assert_eq!(split_style("Noto Sans SemiBold Italic"), ("Noto Sans", Some("SemiBold Italic")));
        // "Bold" inside a word is not a style suffix
        assert_eq!(split_style("UltraBold"), ("UltraBold", None));
    }

    #[test]
    fn test_generic_family_resolves_when_fontconfig_present() {
        if let Ok(path) = find_font_path("Sans") {
            assert!(path.is_absolute());
        }
    }
}
