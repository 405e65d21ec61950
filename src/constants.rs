//! Application-wide constants
//!
//! Magic numbers and string literals used throughout the application,
//! grouped by the component that consumes them.

/// X11 protocol and rendering constants
pub mod x11 {
    /// ARGB color depth (32-bit: 8 bits each for Alpha, Red, Green, Blue)
    pub const ARGB_DEPTH: u8 = 32;

    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// WM_CLASS value (instance\0class\0)
    pub const WM_CLASS: &[u8] = b"shot-answer\0shot-answer\0";
}

/// Screenshot discovery constants
pub mod screenshots {
    /// Extensions (lower-case, without dot) recognized as screenshot images
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

    /// Directory name appended to the user's picture directory by default
    pub const DEFAULT_SUBDIR: &str = "Screenshots";

    /// Wait after a creation event before the file is read (ms)
    pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

    /// How often the watch loop re-checks the shutdown flag (ms)
    pub const SHUTDOWN_POLL_MS: u64 = 200;
}

/// Prompt sent with every screenshot
pub const QUESTION_PROMPT: &str = "Look at this screenshot carefully. If there is a question visible, identify the question number (if applicable) and provide a clear, concise answer.

Format your response as:
- \"Question [number]: [answer]\" if a question number is present
- \"[answer]\" if no question number is present

Only include the question number and answer. Be brief and direct.";

/// Vision backend constants
pub mod backend {
    /// Output-length cap sent with every request
    pub const DEFAULT_MAX_TOKENS: u32 = 300;

    pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
    pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
    pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

    pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
    pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";
    pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

    /// Value of the `anthropic-version` header
    pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

    /// Keywords shared by every backend's billing classification
    pub const BILLING_KEYWORDS: &[&str] = &[
        "quota",
        "billing",
        "payment",
        "credit",
        "insufficient",
        "exceeded",
        "limit",
        "subscription",
        "account",
    ];
}

/// Overlay window defaults
pub mod overlay {
    /// Display duration for answers (seconds)
    pub const NORMAL_DURATION_SECS: u64 = 5;

    /// Display duration for billing warnings (seconds)
    pub const WARNING_DURATION_SECS: u64 = 10;

    /// Maximum text width before wrapping (pixels)
    pub const WRAP_WIDTH: u16 = 400;

    /// Inner padding between border and text
    pub const PADDING_X: u16 = 20;
    pub const PADDING_Y: u16 = 15;

    pub const BORDER_SIZE: u16 = 2;

    /// Distance from the left and bottom screen edges
    pub const SCREEN_OFFSET_X: i16 = 20;
    pub const SCREEN_OFFSET_Y: i16 = 20;

    pub const OPACITY_PERCENT: u8 = 95;
    pub const TEXT_SIZE: f32 = 15.0;

    pub const TEXT_COLOR: &str = "#e0e0e0";
    pub const WARNING_COLOR: &str = "#ff9800";
    pub const BACKGROUND_COLOR: &str = "#1a1a1a";
    pub const BORDER_COLOR: &str = "#ffffff";

    /// How long `Overlay::spawn` waits for the UI thread to come up
    pub const READY_TIMEOUT_MS: u64 = 2000;

    /// Upper bound on how long the UI thread blocks before polling X events
    pub const EVENT_POLL_MS: u64 = 50;
}

/// Configuration file locations
pub mod config {
    pub const APP_DIR: &str = "shot-answer";
    pub const FILENAME: &str = "config.toml";
    pub const DEFAULT_HOTKEY: &str = "ctrl+shift+q";
}

/// Fallback font files tried when fontconfig cannot resolve one
pub mod fonts {
    pub const FALLBACK_FAMILY: &str = "Sans";

    pub const FALLBACK_PATHS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    ];
}
