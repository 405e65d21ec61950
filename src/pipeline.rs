//! Screenshot -> backend -> overlay

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::constants::QUESTION_PROMPT;
use crate::overlay::{AnswerSink, Style};
use crate::provider::{Answer, VisionBackend};
use crate::screenshot;

/// Owns the active backend and routes each screenshot's result to the overlay
pub struct Pipeline<'a, S: AnswerSink> {
    config: &'a AppConfig,
    backend: Box<dyn VisionBackend>,
    sink: S,
    /// Only the immediately previous path is remembered
    last_processed: Option<PathBuf>,
}

impl<'a, S: AnswerSink> Pipeline<'a, S> {
    pub fn new(config: &'a AppConfig, backend: Box<dyn VisionBackend>, sink: S) -> Self {
        Self {
            config,
            backend,
            sink,
            last_processed: None,
        }
    }

    /// Process one screenshot; `None` means "the newest one in the directory"
    pub fn process(&mut self, path: Option<PathBuf>) {
        let path = match path {
            Some(path) => path,
            None => match screenshot::latest(&self.config.screenshot_dir) {
                Some(path) => path,
                None => {
                    info!(dir = %self.config.screenshot_dir.display(), "No screenshots found in the directory");
                    return;
                }
            },
        };

        if self.last_processed.as_deref() == Some(path.as_path()) {
            return;
        }
        info!(path = %path.display(), "Processing screenshot");
        self.last_processed = Some(path.clone());

        self.answer(&path);
    }

    fn answer(&self, path: &Path) {
        let Some(image) = screenshot::load(path) else {
            return;
        };

        let overlay = &self.config.overlay;
        match self.backend.answer(&image, QUESTION_PROMPT) {
            Answer::BillingWarning(warning) => {
                warn!(provider = %self.backend.provider(), "Billing error: {}", warning);
                self.sink.show(&warning, overlay.warning_duration, Style::Warning);
            }
            Answer::Failed(reason) => {
                info!(path = %path.display(), reason = %reason, "No answer received from AI");
            }
            Answer::Text(text) => {
                info!("Answer: {}", text);
                self.sink.show(&text, overlay.normal_duration, Style::Normal);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::provider::{BillingRules, Provider, VendorError};
    use image::RgbImage;
    use std::cell::RefCell;
    use std::fs::File;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    type Shown = Rc<RefCell<Vec<(String, Duration, Style)>>>;

    struct RecordingSink(Shown);

    impl AnswerSink for RecordingSink {
        fn show(&self, text: &str, duration: Duration, style: Style) {
            self.0.borrow_mut().push((text.to_string(), duration, style));
        }
    }

    struct FakeBackend {
        rules: BillingRules,
        reply: Result<String, VendorError>,
        calls: Arc<AtomicUsize>,
    }

    impl VisionBackend for FakeBackend {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        fn billing_rules(&self) -> &BillingRules {
            &self.rules
        }

        fn request(&self, _png_base64: &str, prompt: &str) -> Result<String, VendorError> {
            assert_eq!(prompt, QUESTION_PROMPT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    struct Fixture {
        dir: TempDir,
        config: AppConfig,
        calls: Arc<AtomicUsize>,
        shown: Shown,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let mut settings = Settings {
                screenshot_dir: Some(dir.path().to_path_buf()),
                ..Settings::default()
            };
            settings.openai.api_key = "sk-test".to_string();
            let config = settings.resolve(None, None).unwrap();
            Self {
                dir,
                config,
                calls: Arc::new(AtomicUsize::new(0)),
                shown: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn pipeline(&self, reply: Result<String, VendorError>) -> Pipeline<'_, RecordingSink> {
            let backend = FakeBackend {
                rules: BillingRules::for_provider(Provider::OpenAi, &[]),
                reply,
                calls: Arc::clone(&self.calls),
            };
            Pipeline::new(&self.config, Box::new(backend), RecordingSink(Rc::clone(&self.shown)))
        }

        fn screenshot(&self, name: &str, secs: u64) -> PathBuf {
            let path = self.dir.path().join(name);
            RgbImage::new(8, 8).save(&path).unwrap();
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
                .unwrap();
            path
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_answer_shown_with_normal_style() {
        let fx = Fixture::new();
        let shot = fx.screenshot("shot.png", 100);
        fx.pipeline(Ok(" Question 4: C ".to_string())).process(Some(shot));

        assert_eq!(
            *fx.shown.borrow(),
            vec![("Question 4: C".to_string(), Duration::from_secs(5), Style::Normal)]
        );
    }

    #[test]
    fn test_same_path_twice_calls_backend_once() {
        let fx = Fixture::new();
        let shot = fx.screenshot("shot.png", 100);
        let mut pipeline = fx.pipeline(Ok("A".to_string()));

        pipeline.process(Some(shot.clone()));
        pipeline.process(Some(shot));
        assert_eq!(fx.calls(), 1);
        assert_eq!(fx.shown.borrow().len(), 1);
    }

    #[test]
    fn test_latest_then_watcher_delivery_is_suppressed() {
        let fx = Fixture::new();
        fx.screenshot("shot1.png", 100);
        let newest = fx.screenshot("shot2.jpg", 200);
        let mut pipeline = fx.pipeline(Ok("A".to_string()));

        pipeline.process(None);
        pipeline.process(Some(newest));
        assert_eq!(fx.calls(), 1);
    }

    #[test]
    fn test_older_path_reprocessed_after_different_one() {
        let fx = Fixture::new();
        let first = fx.screenshot("a.png", 100);
        let second = fx.screenshot("b.png", 200);
        let mut pipeline = fx.pipeline(Ok("A".to_string()));

        pipeline.process(Some(first.clone()));
        pipeline.process(Some(second));
        pipeline.process(Some(first));
        assert_eq!(fx.calls(), 3);
    }

    #[test]
    fn test_billing_error_shows_warning() {
        let fx = Fixture::new();
        let shot = fx.screenshot("shot.png", 100);
        fx.pipeline(Err(VendorError::new("You exceeded your current quota (insufficient_quota)")))
            .process(Some(shot));

        let shown = fx.shown.borrow();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, Provider::OpenAi.billing_warning());
        assert_eq!(shown[0].1, Duration::from_secs(10));
        assert_eq!(shown[0].2, Style::Warning);
    }

    #[test]
    fn test_silent_failure_still_marks_processed() {
        let fx = Fixture::new();
        let shot = fx.screenshot("shot.png", 100);
        let mut pipeline = fx.pipeline(Err(VendorError::with_status(500, "server exploded")));

        pipeline.process(Some(shot.clone()));
        pipeline.process(Some(shot));
        assert_eq!(fx.calls(), 1);
        assert!(fx.shown.borrow().is_empty());
    }

    #[test]
    fn test_empty_directory_is_noop() {
        let fx = Fixture::new();
        fx.pipeline(Ok("A".to_string())).process(None);
        assert_eq!(fx.calls(), 0);
        assert!(fx.shown.borrow().is_empty());
    }

    #[test]
    fn test_undecodable_file_skipped() {
        let fx = Fixture::new();
        let broken = fx.dir.path().join("broken.png");
        std::fs::write(&broken, b"not an image").unwrap();
        let mut pipeline = fx.pipeline(Ok("A".to_string()));

        pipeline.process(Some(broken.clone()));
        pipeline.process(Some(broken));
        assert_eq!(fx.calls(), 0);
        assert!(fx.shown.borrow().is_empty());
    }
}
