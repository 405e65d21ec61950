use anyhow::{Context, Result};
use tracing::debug;
use x11rb::protocol::render::{ConnectionExt as RenderExt, Pictformat};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub wm_class: Atom,
    pub net_wm_name: Atom,
    pub utf8_string: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_window_opacity: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_notification: Atom,
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .context(format!("Failed to intern {} atom", name))?
        .reply()
        .context(format!("Failed to get reply for {} atom", name))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        Ok(Self {
            wm_class: intern(conn, "WM_CLASS")?,
            net_wm_name: intern(conn, "_NET_WM_NAME")?,
            utf8_string: intern(conn, "UTF8_STRING")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_above: intern(conn, "_NET_WM_STATE_ABOVE")?,
            net_wm_window_opacity: intern(conn, "_NET_WM_WINDOW_OPACITY")?,
            net_wm_window_type: intern(conn, "_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_notification: intern(conn, "_NET_WM_WINDOW_TYPE_NOTIFICATION")?,
        })
    }
}

#[tracing::instrument(skip(conn))]
pub fn get_pictformat(conn: &RustConnection, depth: u8, alpha: bool) -> Result<Pictformat> {
    let formats = conn
        .render_query_pict_formats()
        .context("Failed to query RENDER picture formats")?
        .reply()
        .context("Failed to get reply for RENDER picture formats query")?
        .formats;

    let format = formats
        .iter()
        .find(|format| {
            format.depth == depth
                && if alpha {
                    format.direct.alpha_mask != 0
                } else {
                    format.direct.alpha_mask == 0
                }
        })
        .with_context(|| {
            format!(
                "Could not find suitable picture format (depth={}, alpha={}). Check RENDER extension support.",
                depth, alpha
            )
        })?;

    debug!(depth = format.depth, alpha_mask = format.direct.alpha_mask, "using Pictformat");
    Ok(format.id)
}

/// Pictformat matching the root window's visual
pub fn root_pictformat(conn: &RustConnection, screen: &Screen) -> Result<Pictformat> {
    let reply = conn
        .render_query_pict_formats()
        .context("Failed to query RENDER picture formats")?
        .reply()
        .context("Failed to get reply for RENDER picture formats query")?;

    reply
        .screens
        .iter()
        .flat_map(|s| s.depths.iter())
        .flat_map(|d| d.visuals.iter())
        .find(|v| v.visual == screen.root_visual)
        .map(|v| v.format)
        .map_or_else(|| get_pictformat(conn, screen.root_depth, false), Ok)
}

/// Screen geometry helper: top-left of a box anchored `offset` px from the
/// bottom-left corner, kept on screen
pub fn bottom_left_position(
    screen_height: u16,
    window_height: u16,
    offset_x: i16,
    offset_y: i16,
) -> (i16, i16) {
    let y = screen_height as i32 - window_height as i32 - offset_y as i32;
    (offset_x.max(0), y.clamp(0, i16::MAX as i32) as i16)
}

/// Set the `_NET_WM_STATE` list on an unmapped window
pub fn set_wm_state(conn: &RustConnection, window: Window, atoms: &CachedAtoms, states: &[Atom]) -> Result<()> {
    use x11rb::wrapper::ConnectionExt as WrapperExt;

    conn.change_property32(PropMode::REPLACE, window, atoms.net_wm_state, AtomEnum::ATOM, states)
        .context(format!("Failed to set _NET_WM_STATE on window {}", window))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_left_position() {
        assert_eq!(bottom_left_position(1080, 124, 20, 20), (20, 936));
    }

    #[test]
    fn test_bottom_left_position_tall_window_stays_on_screen() {
        assert_eq!(bottom_left_position(600, 900, 20, 20), (20, 0));
        assert_eq!(bottom_left_position(600, 100, -5, 20), (0, 480));
    }
}
