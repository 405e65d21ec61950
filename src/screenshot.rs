//! Finding and reading screenshots on disk

use anyhow::{Context, Result};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error};

use crate::constants::screenshots::IMAGE_EXTENSIONS;

/// True if the path has one of the recognized image extensions (any case)
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Most recently modified image directly inside `dir`
///
/// Returns `None` if the directory is missing, has no images, or can't be
/// read. Ties between equal timestamps resolve arbitrarily.
pub fn latest(dir: &Path) -> Option<PathBuf> {
    if !dir.exists() {
        return None;
    }
    latest_in(dir)
        .inspect_err(|e| error!(dir = %dir.display(), error = ?e, "Error getting latest screenshot"))
        .ok()
        .flatten()
}

fn latest_in(dir: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir).context(format!("Failed to read directory {}", dir.display()))? {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();
        if !is_image_path(&path) {
            continue;
        }
        // Follows symlinks; dangling links are skipped
        let Ok(metadata) = fs::metadata(&path) else {
            debug!(path = %path.display(), "Skipping unreadable entry");
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .context(format!("No modification time for {}", path.display()))?;

        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    if let Some((_, path)) = &newest {
        debug!(path = %path.display(), "Latest screenshot");
    }
    Ok(newest.map(|(_, path)| path))
}

/// Decode an image file, logging and returning `None` on failure
pub fn load(path: &Path) -> Option<DynamicImage> {
    image::open(path)
        .inspect_err(|e| error!(path = %path.display(), error = %e, "Error reading screenshot"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, secs: u64) -> PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
        path
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("/tmp/shot.png")));
        assert!(is_image_path(Path::new("Screenshot 2024.JPEG")));
        assert!(is_image_path(Path::new("a.webp")));
        assert!(!is_image_path(Path::new("note.txt")));
        assert!(!is_image_path(Path::new("png")));
        assert!(!is_image_path(Path::new("archive.png.part")));
    }

    #[test]
    fn test_latest_picks_newest_image() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "shot1.png", 100);
        let newest = touch(&dir, "shot2.jpg", 200);
        assert_eq!(latest(dir.path()), Some(newest));
    }

    #[test]
    fn test_latest_ignores_non_images() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "notes.txt", 500);
        touch(&dir, "desktop.ini", 600);
        assert_eq!(latest(dir.path()), None);

        let shot = touch(&dir, "shot.bmp", 10);
        assert_eq!(latest(dir.path()), Some(shot));
    }

    #[test]
    fn test_latest_over_many_distinct_times() {
        let dir = TempDir::new().unwrap();
        let times = [42u64, 7, 1_000, 300, 999];
        let paths: Vec<PathBuf> = times
            .iter()
            .enumerate()
            .map(|(i, t)| touch(&dir, &format!("shot{i}.png"), *t))
            .collect();
        assert_eq!(latest(dir.path()), Some(paths[2].clone()));
    }

    #[test]
    fn test_latest_skips_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("folder.png")).unwrap();
        let nested = TempDir::new_in(dir.path()).unwrap();
        File::create(nested.path().join("deep.png")).unwrap();
        assert_eq!(latest(dir.path()), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_latest_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let target = target_dir.path().join("real.png");
        File::create(&target).unwrap();

        let link = dir.path().join("shot.png");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.png"), dir.path().join("dangling.png")).unwrap();

        assert_eq!(latest(dir.path()), Some(link));
    }

    #[test]
    fn test_latest_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert_eq!(latest(&dir.path().join("nope")), None);
    }

    #[test]
    fn test_load_valid_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.png");
        RgbImage::new(3, 2).save(&good).unwrap();
        let loaded = load(&good).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 2));

        let bad = dir.path().join("bad.png");
        fs::write(&bad, b"definitely not a png").unwrap();
        assert!(load(&bad).is_none());
    }
}
