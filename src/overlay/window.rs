use anyhow::{Context, Result};
use tracing::{debug, error, info};
use x11rb::connection::Connection;
use x11rb::protocol::render::{ConnectionExt as RenderExt, CreatePictureAux, PictOp, Pictformat, Picture};
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use super::Style;
use super::font::{FontRenderer, RenderedText};
use crate::config::OverlayConfig;
use crate::constants::x11;
use crate::x11_utils::{CachedAtoms, bottom_left_position, get_pictformat, root_pictformat, set_wm_state};

/// The single borderless answer window, reused for every answer
pub struct AnswerWindow<'a> {
    pub window: Window,
    mapped: bool,
    width: u16,
    height: u16,
    screen_height: u16,

    // Cached so Expose can repaint without re-rasterizing
    rendered: Option<RenderedText>,

    picture: Picture,
    argb_format: Pictformat,

    conn: &'a RustConnection,
    config: &'a OverlayConfig,
    font: &'a FontRenderer,
}

impl<'a> AnswerWindow<'a> {
    fn create_window(conn: &RustConnection, screen: &Screen, width: u16) -> Result<Window> {
        let window = conn.generate_id().context("Failed to generate X11 window ID")?;
        conn.create_window(
            screen.root_depth,
            window,
            screen.root,
            0,
            0,
            width,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new()
                .override_redirect(x11::OVERRIDE_REDIRECT)
                .event_mask(EventMask::EXPOSURE),
        )
        .context("Failed to create overlay window")?;
        Ok(window)
    }

    /// Opacity, WM_CLASS, name, notification type and always-on-top
    fn setup_window_properties(
        conn: &RustConnection,
        window: Window,
        atoms: &CachedAtoms,
        config: &OverlayConfig,
    ) -> Result<()> {
        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.net_wm_window_opacity,
            AtomEnum::CARDINAL,
            &[config.opacity.to_cardinal()],
        )
        .context("Failed to set overlay opacity")?;

        conn.change_property8(PropMode::REPLACE, window, atoms.wm_class, AtomEnum::STRING, x11::WM_CLASS)
            .context("Failed to set WM_CLASS")?;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            atoms.net_wm_name,
            atoms.utf8_string,
            b"shot-answer",
        )
        .context("Failed to set _NET_WM_NAME")?;

        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.net_wm_window_type,
            AtomEnum::ATOM,
            &[atoms.net_wm_window_type_notification],
        )
        .context("Failed to set _NET_WM_WINDOW_TYPE")?;

        set_wm_state(conn, window, atoms, &[atoms.net_wm_state_above])?;
        Ok(())
    }

    pub fn new(
        conn: &'a RustConnection,
        screen: &Screen,
        atoms: &CachedAtoms,
        config: &'a OverlayConfig,
        font: &'a FontRenderer,
    ) -> Result<Self> {
        let width = config.window_width();
        let window = Self::create_window(conn, screen, width)?;

        // Destroy the window if a later step fails
        struct WindowGuard<'a> {
            conn: &'a RustConnection,
            window: Window,
            should_cleanup: bool,
        }

        impl Drop for WindowGuard<'_> {
            fn drop(&mut self) {
                if self.should_cleanup {
                    if let Err(e) = self.conn.destroy_window(self.window) {
                        error!(window = self.window, error = %e, "Failed to cleanup overlay window after initialization failure");
                    }
                    let _ = self.conn.flush();
                }
            }
        }

        let mut guard = WindowGuard {
            conn,
            window,
            should_cleanup: true,
        };

        Self::setup_window_properties(conn, window, atoms, config)?;

        let picture = conn.generate_id().context("Failed to generate ID for window picture")?;
        conn.render_create_picture(
            picture,
            window,
            root_pictformat(conn, screen).context("Failed to get picture format for overlay window")?,
            &CreatePictureAux::new(),
        )
        .context("Failed to create overlay window picture")?;
        let argb_format =
            get_pictformat(conn, x11::ARGB_DEPTH, true).context("Failed to get ARGB picture format for text")?;

        let overlay = Self {
            window,
            mapped: false,
            width,
            height: 1,
            screen_height: screen.height_in_pixels,
            rendered: None,
            picture,
            argb_format,
            conn,
            config,
            font,
        };
        overlay.set_click_through()?;
        conn.flush().context("Failed to flush X11 connection after creating overlay")?;

        guard.should_cleanup = false;
        info!(window = window, width = width, "Created overlay window");
        Ok(overlay)
    }

    /// Empty input shape: pointer events fall through to whatever is below
    fn set_click_through(&self) -> Result<()> {
        self.conn
            .shape_rectangles(SO::SET, SK::INPUT, ClipOrdering::UNSORTED, self.window, 0, 0, &[])
            .context("Failed to clear overlay input shape (is the SHAPE extension available?)")?;
        Ok(())
    }

    fn color_for(&self, style: Style) -> u32 {
        match style {
            Style::Normal => self.config.text_color,
            Style::Warning => self.config.warning_color,
        }
    }

    /// Lay out the text, move to the bottom-left corner, raise and paint
    pub fn show(&mut self, text: &str, style: Style) -> Result<()> {
        let rendered = self
            .font
            .render_wrapped(text, self.color_for(style), self.config.wrap_width);

        let chrome = 2 * (self.config.padding_y as u32 + self.config.border_size as u32);
        let max_height = (self.screen_height as i32 - 2 * self.config.offset_y as i32).max(chrome as i32 + 1) as u32;
        self.height = (rendered.height as u32 + chrome).min(max_height).min(u16::MAX as u32) as u16;
        self.rendered = Some(rendered);

        let (x, y) = bottom_left_position(self.screen_height, self.height, self.config.offset_x, self.config.offset_y);
        self.conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new()
                    .x(x as i32)
                    .y(y as i32)
                    .width(self.width as u32)
                    .height(self.height as u32)
                    .stack_mode(StackMode::ABOVE),
            )
            .context(format!("Failed to position overlay at ({}, {})", x, y))?;

        if !self.mapped {
            self.conn.map_window(self.window).context("Failed to map overlay window")?;
            self.mapped = true;
        }
        self.set_click_through()?;
        self.draw()?;
        self.conn.flush().context("Failed to flush X11 connection after showing overlay")?;
        debug!(x = x, y = y, height = self.height, ?style, "Overlay shown");
        Ok(())
    }

    pub fn hide(&mut self) -> Result<()> {
        if !self.mapped {
            return Ok(());
        }
        self.conn.unmap_window(self.window).context("Failed to unmap overlay window")?;
        self.mapped = false;
        self.conn.flush().context("Failed to flush X11 connection after hiding overlay")?;
        Ok(())
    }

    /// Repaint after Expose
    pub fn redraw(&self) -> Result<()> {
        if self.mapped {
            self.draw()?;
            self.conn.flush().context("Failed to flush X11 connection after redraw")?;
        }
        Ok(())
    }

    fn draw(&self) -> Result<()> {
        let border = self.config.border_size;
        let full = Rectangle {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        };
        let inner = Rectangle {
            x: border as i16,
            y: border as i16,
            width: self.width.saturating_sub(2 * border),
            height: self.height.saturating_sub(2 * border),
        };

        self.conn
            .render_fill_rectangles(PictOp::SRC, self.picture, self.config.border_color, &[full])
            .context("Failed to paint overlay border")?;
        self.conn
            .render_fill_rectangles(PictOp::SRC, self.picture, self.config.background_color, &[inner])
            .context("Failed to paint overlay background")?;

        if let Some(rendered) = &self.rendered
            && rendered.width > 0
            && rendered.height > 0
        {
            self.draw_text(
                rendered,
                (border + self.config.padding_x) as i16,
                (border + self.config.padding_y) as i16,
            )?;
        }
        Ok(())
    }

    /// Upload the rasterized text and composite it over the background.
    /// Rows below the window's bottom edge are not uploaded.
    fn draw_text(&self, rendered: &RenderedText, x: i16, y: i16) -> Result<()> {
        let visible_rows = rendered.height.min(self.height.saturating_sub(y.max(0) as u16) as usize);
        if visible_rows == 0 {
            return Ok(());
        }
        let w = rendered.width.min(u16::MAX as usize) as u16;
        let h = visible_rows as u16;
        let pixels = rendered.to_bgra_rows(visible_rows);

        let text_pixmap = self.conn.generate_id().context("Failed to generate ID for text pixmap")?;
        self.conn
            .create_pixmap(x11::ARGB_DEPTH, text_pixmap, self.window, w, h)
            .context("Failed to create text pixmap")?;

        let gc = self.conn.generate_id().context("Failed to generate ID for text graphics context")?;
        self.conn
            .create_gc(gc, text_pixmap, &CreateGCAux::new())
            .context("Failed to create text graphics context")?;

        self.conn
            .put_image(
                ImageFormat::Z_PIXMAP,
                text_pixmap,
                gc,
                w,
                h,
                0,
                0,
                0,
                x11::ARGB_DEPTH,
                &pixels,
            )
            .context("Failed to upload text image")?;

        let text_picture = self.conn.generate_id().context("Failed to generate ID for text picture")?;
        self.conn
            .render_create_picture(text_picture, text_pixmap, self.argb_format, &CreatePictureAux::new())
            .context("Failed to create text picture")?;

        self.conn
            .render_composite(PictOp::OVER, text_picture, 0u32, self.picture, 0, 0, 0, 0, x, y, w, h)
            .context("Failed to composite text onto overlay")?;

        self.conn.render_free_picture(text_picture).context("Failed to free text picture")?;
        self.conn.free_gc(gc).context("Failed to free text graphics context")?;
        self.conn.free_pixmap(text_pixmap).context("Failed to free text pixmap")?;
        Ok(())
    }
}

impl Drop for AnswerWindow<'_> {
    fn drop(&mut self) {
        // Clean up each resource independently
        if let Err(e) = self.conn.render_free_picture(self.picture) {
            error!(picture = self.picture, error = %e, "Failed to free overlay picture");
        }
        if let Err(e) = self.conn.destroy_window(self.window) {
            error!(window = self.window, error = %e, "Failed to destroy overlay window");
        }
        if let Err(e) = self.conn.flush() {
            error!(error = %e, "Failed to flush X11 connection during cleanup");
        }
    }
}
