use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::storage::metadata::format_human_size;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Document,
    Image,
    Video,
    Audio,
    Archive,
    #[default]
    Other,
}

#[derive(Debug)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown file type '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Document => "document",
            FileCategory::Image => "image",
            FileCategory::Video => "video",
            FileCategory::Audio => "audio",
            FileCategory::Archive => "archive",
            FileCategory::Other => "other",
        }
    }
}

impl FromStr for FileCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document" => Ok(FileCategory::Document),
            "image" => Ok(FileCategory::Image),
            "video" => Ok(FileCategory::Video),
            "audio" => Ok(FileCategory::Audio),
            "archive" => Ok(FileCategory::Archive),
            "other" => Ok(FileCategory::Other),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

impl TryFrom<String> for FileCategory {
    type Error = UnknownCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A file about to be persisted. Fields left at their zero value
/// (`None`, `0`, empty string, `Other`) are filled in by the metadata resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFile {
    pub storage_key: String,
    pub original_filename: Option<String>,
    pub category: FileCategory,
    pub size_bytes: i64,
    pub mime_type: String,
    pub owner_id: Uuid,
    pub assignment_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub is_public: bool,
    pub description: String,
}

impl NewFile {
    pub fn new(storage_key: impl Into<String>, owner_id: Uuid) -> Self {
        Self {
            storage_key: storage_key.into(),
            original_filename: None,
            category: FileCategory::Other,
            size_bytes: 0,
            mime_type: String::new(),
            owner_id,
            assignment_id: None,
            course_id: None,
            is_public: false,
            description: String::new(),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct FileRecord {
    pub id: Uuid,
    pub storage_key: String,
    pub original_filename: Option<String>,
    #[sqlx(try_from = "String")]
    pub category: FileCategory,
    pub size_bytes: i64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub assignment_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub is_public: bool,
    pub description: String,
}

impl FileRecord {
    pub fn display_name(&self) -> &str {
        self.original_filename.as_deref().unwrap_or(&self.storage_key)
    }
}

/// Present-but-null becomes `Some(None)`, so a link can be cleared.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Mutable fields of a stored file. Absent fields are left untouched;
/// `null` links are cleared.
#[derive(Deserialize, Validate, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileUpdate {
    #[validate(length(min = 1, max = 255))]
    pub original_filename: Option<String>,
    pub file_type: Option<FileCategory>,
    #[serde(rename = "assignment", default, deserialize_with = "nullable")]
    pub assignment_id: Option<Option<Uuid>>,
    #[serde(rename = "course", default, deserialize_with = "nullable")]
    pub course_id: Option<Option<Uuid>>,
    pub is_public: Option<bool>,
    pub description: Option<String>,
}

impl FileUpdate {
    pub fn apply(&self, record: &mut FileRecord) {
        if let Some(name) = &self.original_filename {
            record.original_filename = Some(name.clone());
        }
        if let Some(category) = self.file_type {
            record.category = category;
        }
        if let Some(assignment_id) = self.assignment_id {
            record.assignment_id = assignment_id;
        }
        if let Some(course_id) = self.course_id {
            record.course_id = course_id;
        }
        if let Some(is_public) = self.is_public {
            record.is_public = is_public;
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
    }
}

#[derive(Serialize, Debug)]
pub struct FileView {
    pub id: Uuid,
    pub file: String,
    pub original_filename: Option<String>,
    pub file_type: FileCategory,
    pub file_size: i64,
    pub file_size_display: String,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: Uuid,
    pub uploaded_by_name: String,
    pub assignment: Option<Uuid>,
    pub course: Option<Uuid>,
    pub is_public: bool,
    pub description: String,
    pub file_url: Option<String>,
}

impl FileView {
    pub fn new(record: FileRecord, file_url: Option<String>) -> Self {
        Self {
            id: record.id,
            file_size_display: format_human_size(record.size_bytes),
            file: record.storage_key,
            original_filename: record.original_filename,
            file_type: record.category,
            file_size: record.size_bytes,
            mime_type: record.mime_type,
            uploaded_at: record.uploaded_at,
            uploaded_by: record.owner_id,
            uploaded_by_name: record.owner_name,
            assignment: record.assignment_id,
            course: record.course_id,
            is_public: record.is_public,
            description: record.description,
            file_url,
        }
    }
}

#[cfg(test)]
impl FileRecord {
    pub fn sample(owner_id: Uuid, filename: &str, size_bytes: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            storage_key: format!("uploads/{}/1700000000_{}", owner_id, filename),
            original_filename: Some(filename.to_string()),
            category: FileCategory::Other,
            size_bytes,
            mime_type: "application/octet-stream".to_string(),
            uploaded_at: Utc::now(),
            owner_id,
            owner_name: "Ada Lovelace".to_string(),
            assignment_id: None,
            course_id: None,
            is_public: false,
            description: String::new(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct DownloadResponse {
    pub download_url: String,
    pub filename: String,
    pub file_size: i64,
    pub mime_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_and_serializes_lowercase() {
        assert_eq!("Archive".parse::<FileCategory>().unwrap(), FileCategory::Archive);
        assert!("spreadsheet".parse::<FileCategory>().is_err());
        assert_eq!(serde_json::to_string(&FileCategory::Video).unwrap(), "\"video\"");
    }

    #[test]
    fn update_touches_only_present_fields() {
        let mut record = FileRecord::sample(Uuid::new_v4(), "notes.txt", 12);
        record.description = "draft".into();
        let update = FileUpdate {
            is_public: Some(true),
            ..Default::default()
        };
        update.apply(&mut record);
        assert!(record.is_public);
        assert_eq!(record.description, "draft");
        assert_eq!(record.original_filename.as_deref(), Some("notes.txt"));
        assert_eq!(record.size_bytes, 12);
    }

    #[test]
    fn update_distinguishes_null_from_absent_links() {
        let course = Uuid::new_v4();
        let mut record = FileRecord::sample(Uuid::new_v4(), "notes.txt", 12);
        record.course_id = Some(course);
        record.assignment_id = Some(Uuid::new_v4());

        let absent: FileUpdate = serde_json::from_str(r#"{"is_public": true}"#).unwrap();
        absent.apply(&mut record);
        assert_eq!(record.course_id, Some(course));

        let cleared: FileUpdate = serde_json::from_str(r#"{"assignment": null}"#).unwrap();
        assert_eq!(cleared.assignment_id, Some(None));
        cleared.apply(&mut record);
        assert_eq!(record.assignment_id, None);
        assert_eq!(record.course_id, Some(course));

        let relinked = Uuid::new_v4();
        let set: FileUpdate = serde_json::from_value(serde_json::json!({ "course": relinked })).unwrap();
        set.apply(&mut record);
        assert_eq!(record.course_id, Some(relinked));
    }

    #[test]
    fn update_rejects_overlong_filename() {
        let update = FileUpdate {
            original_filename: Some("x".repeat(256)),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
