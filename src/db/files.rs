use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::file::{FileRecord, NewFile};

/// Persistence for file records. Listings are newest first.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_files_by_owner(&self, owner_id: Uuid) -> Result<Vec<FileRecord>, AppError>;

    async fn save(&self, file: NewFile) -> Result<FileRecord, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    async fn list_public(&self, limit: i64, offset: i64) -> Result<Vec<FileRecord>, AppError>;

    async fn count_public(&self) -> Result<i64, AppError>;

    /// Writes back the mutable fields of `file`.
    async fn update(&self, file: &FileRecord) -> Result<(), AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

const FILE_COLUMNS: &str = r#"
    f.id,
    f.storage_key,
    f.original_filename,
    f.file_type AS category,
    f.file_size AS size_bytes,
    f.mime_type,
    f.uploaded_at,
    f.uploaded_by AS owner_id,
    TRIM(u.first_name || ' ' || u.last_name) AS owner_name,
    f.assignment_id,
    f.course_id,
    f.is_public,
    f.description
"#;

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_files_by_owner(&self, owner_id: Uuid) -> Result<Vec<FileRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM files f JOIN users u ON u.id = f.uploaded_by \
             WHERE f.uploaded_by = $1 ORDER BY f.uploaded_at DESC",
            FILE_COLUMNS
        );
        let files = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    async fn save(&self, file: NewFile) -> Result<FileRecord, AppError> {
        let sql = format!(
            "WITH f AS ( \
                INSERT INTO files (id, storage_key, original_filename, file_type, file_size, mime_type, \
                                   uploaded_at, uploaded_by, assignment_id, course_id, is_public, description) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                RETURNING * \
             ) \
             SELECT {} FROM f JOIN users u ON u.id = f.uploaded_by",
            FILE_COLUMNS
        );
        let record = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&file.storage_key)
            .bind(&file.original_filename)
            .bind(file.category.as_str())
            .bind(file.size_bytes)
            .bind(&file.mime_type)
            .bind(Utc::now())
            .bind(file.owner_id)
            .bind(file.assignment_id)
            .bind(file.course_id)
            .bind(file.is_public)
            .bind(&file.description)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM files f JOIN users u ON u.id = f.uploaded_by WHERE f.id = $1",
            FILE_COLUMNS
        );
        let record = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_public(&self, limit: i64, offset: i64) -> Result<Vec<FileRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM files f JOIN users u ON u.id = f.uploaded_by \
             WHERE f.is_public ORDER BY f.uploaded_at DESC LIMIT $1 OFFSET $2",
            FILE_COLUMNS
        );
        let files = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    async fn count_public(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files WHERE is_public")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update(&self, file: &FileRecord) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE files SET original_filename = $1, file_type = $2, assignment_id = $3, \
             course_id = $4, is_public = $5, description = $6 WHERE id = $7",
        )
        .bind(&file.original_filename)
        .bind(file.category.as_str())
        .bind(file.assignment_id)
        .bind(file.course_id)
        .bind(file.is_public)
        .bind(&file.description)
        .bind(file.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
