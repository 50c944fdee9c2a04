//! Listing and serving saved images.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use raspbot_types::BotError;

/// Cards shown on the gallery page.
pub const GALLERY_LIMIT: usize = 100;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub name: String,
    pub modified: SystemTime,
    pub size: u64,
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Image files in `dir`, newest modification first, at most `limit`.
///
/// # Errors
///
/// [`BotError::Io`] when the directory cannot be read. Entries that vanish
/// or cannot be inspected mid-listing are skipped.
pub async fn list_images(dir: &Path, limit: usize) -> Result<Vec<GalleryEntry>, BotError> {
    let mut entries = Vec::new();
    let mut rd = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if !has_image_extension(&path) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        entries.push(GalleryEntry {
            name: name.to_string(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: meta.len(),
        });
    }
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
    entries.truncate(limit);
    Ok(entries)
}

/// `true` for a single path component that names a visible file.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

/// Path of an existing image called `name` inside `dir`, if any.
pub async fn resolve_image(dir: &Path, name: &str) -> Option<PathBuf> {
    if !is_plain_file_name(name) {
        return None;
    }
    let path = dir.join(name);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Some(path),
        _ => None,
    }
}

/// MIME type by extension.
pub fn content_type_for(name: &str) -> &'static str {
    match Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        let when = SystemTime::now() - Duration::from_secs(age_secs);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[tokio::test]
    async fn newest_first_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "old.jpg", 300);
        touch(dir.path(), "new.PNG", 10);
        touch(dir.path(), "mid.jpeg", 100);
        touch(dir.path(), "notes.txt", 1);
        touch(dir.path(), ".img_x.jpg.part", 1);
        std::fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let names: Vec<_> = list_images(dir.path(), GALLERY_LIMIT)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["new.PNG", "mid.jpeg", "old.jpg"]);
    }

    #[tokio::test]
    async fn limit_applies() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("img{i}.jpg"), i * 10);
        }
        let list = list_images(dir.path(), 3).await.unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].name, "img0.jpg");
    }

    #[tokio::test]
    async fn missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_images(&dir.path().join("nope"), 10).await.is_err());
    }

    #[test]
    fn plain_names_only() {
        assert!(is_plain_file_name("img_1.jpg"));
        assert!(!is_plain_file_name("../etc/passwd"));
        assert!(!is_plain_file_name("a/b.jpg"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".hidden.jpg"));
    }

    #[tokio::test]
    async fn resolve_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.jpg", 0);
        assert!(resolve_image(dir.path(), "a.jpg").await.is_some());
        assert!(resolve_image(dir.path(), "b.jpg").await.is_none());
        assert!(resolve_image(dir.path(), "../a.jpg").await.is_none());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a"), "application/octet-stream");
    }
}
