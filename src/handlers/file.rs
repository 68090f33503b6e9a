use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::db::files::RecordStore;
use crate::errors::AppError;
use crate::models::file::{DownloadResponse, FileCategory, FileRecord, FileUpdate, FileView, NewFile};
use crate::storage::metadata::{resolve_mime_type, upload_key, MetadataResolver, MAX_FILENAME_CHARS};
use crate::storage::object_store::ObjectStore;
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

struct UploadedBlob {
    filename: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedBlob>,
    original_filename: Option<String>,
    file_type: Option<FileCategory>,
    assignment_id: Option<Uuid>,
    course_id: Option<Uuid>,
    is_public: bool,
    description: String,
}

impl UploadForm {
    fn set_text_field(&mut self, name: &str, value: String) -> Result<(), AppError> {
        let value = value.trim().to_string();
        match name {
            "original_filename" => {
                if value.chars().count() > MAX_FILENAME_CHARS {
                    return Err(AppError::BadRequest(format!(
                        "original_filename exceeds {} characters",
                        MAX_FILENAME_CHARS
                    )));
                }
                self.original_filename = Some(value).filter(|v| !v.is_empty());
            }
            "file_type" if !value.is_empty() => {
                let category = value
                    .parse::<FileCategory>()
                    .map_err(|err| AppError::BadRequest(err.to_string()))?;
                self.file_type = Some(category);
            }
            "assignment" if !value.is_empty() => {
                self.assignment_id = Some(parse_uuid(&value, "assignment")?);
            }
            "course" if !value.is_empty() => {
                self.course_id = Some(parse_uuid(&value, "course")?);
            }
            "is_public" => {
                self.is_public = parse_bool(&value)?;
            }
            "description" => {
                self.description = value;
            }
            _ => {}
        }
        Ok(())
    }
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value).map_err(|_| AppError::BadRequest(format!("Invalid {} ID", field)))
}

fn parse_bool(value: &str) -> Result<bool, AppError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        _ => Err(AppError::BadRequest("is_public must be a boolean".to_string())),
    }
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|err| AppError::BadRequest(format!("Upload read error: {}", err)))?
    {
        data.extend_from_slice(&chunk);
        if data.len() > limit {
            return Err(AppError::BadRequest(format!("Upload exceeds {} byte limit", limit)));
        }
    }
    Ok(data)
}

async fn read_upload_form(mut payload: Multipart, max_upload_bytes: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|err| AppError::BadRequest(format!("Invalid multipart payload: {}", err)))?
    {
        let disposition = field.content_disposition().clone();
        let name = disposition.get_name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = disposition.get_filename().unwrap_or_default().to_string();
            let data = read_field(&mut field, max_upload_bytes).await?;
            form.file = Some(UploadedBlob { filename, data });
        } else {
            let raw = read_field(&mut field, MAX_TEXT_FIELD_BYTES).await?;
            let value = String::from_utf8(raw)
                .map_err(|_| AppError::BadRequest(format!("Field {} is not valid UTF-8", name)))?;
            form.set_text_field(&name, value)?;
        }
    }
    Ok(form)
}

async fn file_view(objects: &dyn ObjectStore, record: FileRecord) -> FileView {
    let url = match objects.url_of(&record.storage_key).await {
        Ok(url) => Some(url),
        Err(err) => {
            log::warn!("Could not build URL for {}: {}", record.storage_key, err);
            None
        }
    };
    FileView::new(record, url)
}

async fn file_views(objects: &dyn ObjectStore, records: Vec<FileRecord>) -> Vec<FileView> {
    let mut views = Vec::with_capacity(records.len());
    for record in records {
        views.push(file_view(objects, record).await);
    }
    views
}

/// Loads a file the caller owns. Files of other users are reported as missing.
async fn owned_file(records: &dyn RecordStore, user: &AuthUser, file_id: Uuid) -> Result<FileRecord, AppError> {
    match records.get(file_id).await? {
        Some(record) if record.owner_id == user.user_id => Ok(record),
        _ => Err(AppError::NotFound("File not found".to_string())),
    }
}

pub async fn list_my_files(
    user: AuthUser,
    records: web::Data<dyn RecordStore>,
    objects: web::Data<dyn ObjectStore>,
) -> Result<HttpResponse, AppError> {
    let files = records.list_files_by_owner(user.user_id).await?;
    Ok(HttpResponse::Ok().json(file_views(objects.get_ref(), files).await))
}

pub async fn upload_file(
    user: AuthUser,
    config: web::Data<Config>,
    records: web::Data<dyn RecordStore>,
    objects: web::Data<dyn ObjectStore>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = read_upload_form(payload, config.max_upload_bytes).await?;
    let blob = form
        .file
        .ok_or_else(|| AppError::BadRequest("No file was submitted".to_string()))?;

    let key = upload_key(user.user_id, &blob.filename, Utc::now());
    let content_type = resolve_mime_type(&blob.filename);
    let size = blob.data.len() as i64;
    objects.put(&key, blob.data, &content_type).await?;

    let mut new_file = NewFile::new(key.clone(), user.user_id);
    new_file.original_filename = form.original_filename;
    new_file.category = form.file_type.unwrap_or_default();
    new_file.size_bytes = size;
    new_file.assignment_id = form.assignment_id;
    new_file.course_id = form.course_id;
    new_file.is_public = form.is_public;
    new_file.description = form.description;

    MetadataResolver::new(objects.get_ref()).resolve(&mut new_file).await;

    let record = match records.save(new_file).await {
        Ok(record) => record,
        Err(err) => {
            if let Err(cleanup) = objects.delete(&key).await {
                log::warn!("Record for {} not saved and object remains: {}", key, cleanup);
            }
            return Err(err);
        }
    };
    log::info!(
        "User {} uploaded {} ({} bytes, {})",
        user.user_id,
        record.display_name(),
        record.size_bytes,
        record.category.as_str()
    );
    Ok(HttpResponse::Created().json(file_view(objects.get_ref(), record).await))
}

pub async fn get_file(
    user: AuthUser,
    records: web::Data<dyn RecordStore>,
    objects: web::Data<dyn ObjectStore>,
    file_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let record = owned_file(records.get_ref(), &user, file_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(file_view(objects.get_ref(), record).await))
}

pub async fn update_file(
    user: AuthUser,
    records: web::Data<dyn RecordStore>,
    objects: web::Data<dyn ObjectStore>,
    file_id: web::Path<Uuid>,
    updates: web::Json<FileUpdate>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&updates.0)?;
    let mut record = owned_file(records.get_ref(), &user, file_id.into_inner()).await?;
    updates.apply(&mut record);
    records.update(&record).await?;
    Ok(HttpResponse::Ok().json(file_view(objects.get_ref(), record).await))
}

pub async fn delete_file(
    user: AuthUser,
    records: web::Data<dyn RecordStore>,
    objects: web::Data<dyn ObjectStore>,
    file_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let record = owned_file(records.get_ref(), &user, file_id.into_inner()).await?;
    records.delete(record.id).await?;

    if let Err(err) = objects.delete(&record.storage_key).await {
        log::warn!("Record {} deleted but object {} remains: {}", record.id, record.storage_key, err);
    }
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
pub struct PageParams {
    page: Option<i64>,
    page_size: Option<i64>,
}

#[derive(Serialize)]
pub struct Page<T> {
    count: i64,
    next: Option<String>,
    previous: Option<String>,
    results: Vec<T>,
}

fn page_link(path: &str, page: i64, page_size: i64) -> String {
    format!("{}?page={}&page_size={}", path, page, page_size)
}

pub async fn shared_files(
    req: HttpRequest,
    _user: AuthUser,
    records: web::Data<dyn RecordStore>,
    objects: web::Data<dyn ObjectStore>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| AppError::BadRequest("Invalid page".to_string()))?;

    let count = records.count_public().await?;
    let files = records.list_public(page_size, offset).await?;

    let path = req.path();
    let next = (offset.saturating_add(files.len() as i64) < count)
        .then(|| page_link(path, page.saturating_add(1), page_size));
    let previous = (page > 1).then(|| page_link(path, page - 1, page_size));

    Ok(HttpResponse::Ok().json(Page {
        count,
        next,
        previous,
        results: file_views(objects.get_ref(), files).await,
    }))
}

pub async fn download_file(
    user: AuthUser,
    records: web::Data<dyn RecordStore>,
    objects: web::Data<dyn ObjectStore>,
    file_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let record = records
        .get(file_id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    if record.owner_id != user.user_id && !record.is_public {
        return Err(AppError::Forbidden("Permission denied".to_string()));
    }

    let download_url = objects.url_of(&record.storage_key).await?;
    log::debug!("Issued download URL for file {}", record.id);

    Ok(HttpResponse::Ok().json(DownloadResponse {
        download_url,
        filename: record.display_name().to_string(),
        file_size: record.size_bytes,
        mime_type: record.mime_type,
    }))
}
