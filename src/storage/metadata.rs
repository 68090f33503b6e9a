//! Metadata derivation for uploaded files.
//!
//! Every step is best-effort: a failed lookup is logged and replaced by its
//! default, so resolving metadata never blocks saving the record.

use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::file::{FileCategory, NewFile};
use crate::storage::object_store::ObjectStore;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const FALLBACK_UPLOAD_NAME: &str = "upload.bin";

/// Longest display name the record store accepts, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

/// Extension table, checked in order. Unlisted extensions are `Other`.
const CATEGORY_EXTENSIONS: &[(FileCategory, &[&str])] = &[
    (FileCategory::Document, &["pdf", "doc", "docx", "txt", "rtf"]),
    (FileCategory::Image, &["jpg", "jpeg", "png", "gif", "bmp", "svg"]),
    (FileCategory::Video, &["mp4", "avi", "mov", "wmv", "flv"]),
    (FileCategory::Audio, &["mp3", "wav", "flac", "aac"]),
    (FileCategory::Archive, &["zip", "rar", "7z", "tar", "gz"]),
];

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Object key for a fresh upload: `uploads/{owner}/{unix_seconds}_{clean_name}`.
pub fn upload_key(owner_id: Uuid, filename: &str, at: DateTime<Utc>) -> String {
    let clean: String = filename
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    let clean = if clean.is_empty() { FALLBACK_UPLOAD_NAME.to_string() } else { clean };
    format!("uploads/{}/{}_{}", owner_id, at.timestamp(), clean)
}

/// Display name: the explicit one, untouched, when non-blank. Otherwise the
/// key's last segment, cut to `MAX_FILENAME_CHARS`.
pub fn resolve_filename(explicit: Option<&str>, storage_key: &str) -> String {
    match explicit {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => storage_key
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(storage_key)
            .chars()
            .take(MAX_FILENAME_CHARS)
            .collect(),
    }
}

pub fn resolve_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

pub fn resolve_category(filename: &str) -> FileCategory {
    let Some(ext) = Path::new(filename).extension().and_then(|ext| ext.to_str()) else {
        return FileCategory::Other;
    };
    let ext = ext.to_lowercase();
    CATEGORY_EXTENSIONS
        .iter()
        .find(|(_, extensions)| extensions.contains(&ext.as_str()))
        .map(|(category, _)| *category)
        .unwrap_or(FileCategory::Other)
}

/// Human readable size with one decimal, e.g. `1536` -> `"1.5 KB"`.
pub fn format_human_size(bytes: i64) -> String {
    let mut size = bytes.max(0) as f64;
    for unit in SIZE_UNITS {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

pub struct MetadataResolver<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> MetadataResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// A non-zero known size wins; otherwise ask the object store, and fall
    /// back to 0 if that fails.
    pub async fn resolve_size(&self, known: i64, storage_key: &str) -> i64 {
        if known > 0 {
            return known;
        }
        match self.store.size_of(storage_key).await {
            Ok(size) => size.max(0),
            Err(err) => {
                log::warn!("Size lookup failed for {}: {}", storage_key, err);
                0
            }
        }
    }

    /// Fills in every derived field left unset on `file`. Explicit values are kept.
    pub async fn resolve(&self, file: &mut NewFile) {
        let filename = resolve_filename(file.original_filename.as_deref(), &file.storage_key);
        // Types come from the uncut name; a shortened fallback may lose its extension.
        let typed_name = match file.original_filename.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => file.storage_key.as_str(),
        };

        file.size_bytes = self.resolve_size(file.size_bytes, &file.storage_key).await;

        if file.mime_type.trim().is_empty() {
            file.mime_type = resolve_mime_type(typed_name);
        }

        if file.category == FileCategory::Other {
            file.category = resolve_category(typed_name);
        }

        file.original_filename = Some(filename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::object_store::memory::MemoryObjectStore;
    use chrono::TimeZone;

    #[test]
    fn category_table_covers_every_listed_extension() {
        let cases: [(FileCategory, &[&str]); 5] = [
            (FileCategory::Document, &["a.pdf", "a.doc", "a.docx", "a.txt", "a.rtf"]),
            (FileCategory::Image, &["a.jpg", "a.jpeg", "a.png", "a.gif", "a.bmp", "a.svg"]),
            (FileCategory::Video, &["a.mp4", "a.avi", "a.mov", "a.wmv", "a.flv"]),
            (FileCategory::Audio, &["a.mp3", "a.wav", "a.flac", "a.aac"]),
            (FileCategory::Archive, &["a.zip", "a.rar", "a.7z", "a.tar", "a.gz"]),
        ];
        for (expected, names) in cases {
            for name in names {
                assert_eq!(resolve_category(name), expected, "{}", name);
            }
        }
    }

    #[test]
    fn category_ignores_case_and_defaults_to_other() {
        assert_eq!(resolve_category("REPORT.PDF"), FileCategory::Document);
        assert_eq!(resolve_category("Photo.JpEg"), FileCategory::Image);
        assert_eq!(resolve_category("backup.tar.gz"), FileCategory::Archive);
        assert_eq!(resolve_category("slides.pptx"), FileCategory::Other);
        assert_eq!(resolve_category("Makefile"), FileCategory::Other);
        assert_eq!(resolve_category(".bashrc"), FileCategory::Other);
        assert_eq!(resolve_category("trailing."), FileCategory::Other);
    }

    #[test]
    fn human_size_matches_iterative_scaling() {
        assert_eq!(format_human_size(0), "0.0 B");
        assert_eq!(format_human_size(1023), "1023.0 B");
        assert_eq!(format_human_size(1024), "1.0 KB");
        assert_eq!(format_human_size(1536), "1.5 KB");
        assert_eq!(format_human_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_human_size(1073741824), "1.0 GB");
        assert_eq!(format_human_size(3 * 1024_i64.pow(4)), "3.0 TB");
    }

    #[test]
    fn filename_falls_back_to_key_basename() {
        let key = "uploads/42/1700000000_notes.txt";
        assert_eq!(resolve_filename(None, key), "1700000000_notes.txt");
        assert_eq!(resolve_filename(Some("   "), key), "1700000000_notes.txt");
        assert_eq!(resolve_filename(Some("Notes.txt"), key), "Notes.txt");
        assert_eq!(resolve_filename(None, "plain"), "plain");
    }

    #[test]
    fn explicit_filename_is_kept_verbatim() {
        let key = "uploads/42/1700000000_notes.txt";
        assert_eq!(resolve_filename(Some(" a.pdf"), key), " a.pdf");
        assert_eq!(resolve_filename(Some("b.pdf\t"), key), "b.pdf\t");
    }

    #[test]
    fn long_fallback_name_is_cut_on_char_boundary() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let key = upload_key(Uuid::nil(), &"a".repeat(300), at);
        let name = resolve_filename(None, &key);
        assert_eq!(name.chars().count(), MAX_FILENAME_CHARS);
        assert!(name.starts_with("1700000000_aaa"));

        let key = format!("uploads/u/{}", "é".repeat(300));
        let name = resolve_filename(None, &key);
        assert_eq!(name.chars().count(), MAX_FILENAME_CHARS);
        assert!(name.chars().all(|c| c == 'é'));
    }

    #[test]
    fn mime_type_guessed_from_extension() {
        assert_eq!(resolve_mime_type("paper.pdf"), "application/pdf");
        assert_eq!(resolve_mime_type("photo.PNG"), "image/png");
        assert_eq!(resolve_mime_type("mystery.zzzunknown"), DEFAULT_MIME_TYPE);
        assert_eq!(resolve_mime_type("no_extension"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn upload_key_cleans_separators_and_spaces() {
        let owner = Uuid::nil();
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(
            upload_key(owner, "my lab/report\\v2.pdf", at),
            format!("uploads/{}/1700000000_my_lab_report_v2.pdf", owner)
        );
        assert_eq!(upload_key(owner, "", at), format!("uploads/{}/1700000000_upload.bin", owner));
    }

    #[tokio::test]
    async fn resolve_fills_every_derived_field() {
        let store = MemoryObjectStore::default();
        let resolver = MetadataResolver::new(&store);
        let mut file = NewFile::new("uploads/u/1700000000_Lecture 1.MP4", Uuid::new_v4());
        file.original_filename = Some("Lecture 1.MP4".to_string());
        file.size_bytes = 2048;

        resolver.resolve(&mut file).await;

        assert_eq!(file.size_bytes, 2048);
        assert_eq!(file.mime_type, "video/mp4");
        assert_eq!(file.category, FileCategory::Video);
    }

    #[tokio::test]
    async fn resolve_looks_up_unknown_size_in_store() {
        let store = MemoryObjectStore::default();
        store.insert("uploads/u/1_song.flac", vec![0u8; 777]);
        let resolver = MetadataResolver::new(&store);
        let mut file = NewFile::new("uploads/u/1_song.flac", Uuid::new_v4());

        resolver.resolve(&mut file).await;

        assert_eq!(file.size_bytes, 777);
        assert_eq!(file.original_filename.as_deref(), Some("1_song.flac"));
        assert_eq!(file.category, FileCategory::Audio);
    }

    #[tokio::test]
    async fn resolve_keeps_explicit_values_and_is_idempotent() {
        let store = MemoryObjectStore::failing();
        let resolver = MetadataResolver::new(&store);
        let mut file = NewFile::new("uploads/u/1_data.bin", Uuid::new_v4());
        file.original_filename = Some("data.bin".to_string());
        file.category = FileCategory::Archive;
        file.size_bytes = 10;
        file.mime_type = "application/x-custom".to_string();
        let before = file.clone();

        resolver.resolve(&mut file).await;
        assert_eq!(file, before);
        resolver.resolve(&mut file).await;
        assert_eq!(file, before);
    }

    #[tokio::test]
    async fn resolve_never_fails_when_lookups_fail() {
        let store = MemoryObjectStore::failing();
        let resolver = MetadataResolver::new(&store);
        let mut file = NewFile::new("uploads/u/1_blob", Uuid::new_v4());

        resolver.resolve(&mut file).await;

        assert_eq!(file.size_bytes, 0);
        assert_eq!(file.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(file.category, FileCategory::Other);
        assert_eq!(file.original_filename.as_deref(), Some("1_blob"));
    }
}
