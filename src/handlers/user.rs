use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::user::{Account, UserView};
use crate::storage::object_store::ObjectStore;
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Deserialize, Validate, Default)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    #[validate(email, length(max = 254))]
    email: Option<String>,
    #[validate(length(max = 150))]
    first_name: Option<String>,
    #[validate(length(max = 150))]
    last_name: Option<String>,
    bio: Option<String>,
    #[validate(length(max = 20))]
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
}

pub(crate) async fn fetch_account(pool: &PgPool, user_id: Uuid) -> Result<Option<Account>, AppError> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(account)
}

pub(crate) async fn user_view(objects: &dyn ObjectStore, account: Account) -> UserView {
    let avatar = match &account.avatar_key {
        Some(key) => objects
            .url_of(key)
            .await
            .map_err(|err| log::warn!("Could not build avatar URL for {}: {}", account.id, err))
            .ok(),
        None => None,
    };
    UserView::new(account, avatar)
}

pub async fn list_users(
    _user: AuthUser,
    pool: web::Data<PgPool>,
    objects: web::Data<dyn ObjectStore>,
) -> Result<HttpResponse, AppError> {
    let accounts = sqlx::query_as::<_, Account>("SELECT * FROM users ORDER BY username")
        .fetch_all(pool.get_ref())
        .await?;

    let mut users = Vec::with_capacity(accounts.len());
    for account in accounts {
        users.push(user_view(objects.get_ref(), account).await);
    }
    Ok(HttpResponse::Ok().json(users))
}

pub async fn get_user(
    _user: AuthUser,
    pool: web::Data<PgPool>,
    objects: web::Data<dyn ObjectStore>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let account = fetch_account(pool.get_ref(), user_id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(HttpResponse::Ok().json(user_view(objects.get_ref(), account).await))
}

pub async fn get_profile(
    user: AuthUser,
    pool: web::Data<PgPool>,
    objects: web::Data<dyn ObjectStore>,
) -> Result<HttpResponse, AppError> {
    let account = fetch_account(pool.get_ref(), user.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found or unauthorized".to_string()))?;
    Ok(HttpResponse::Ok().json(user_view(objects.get_ref(), account).await))
}

pub async fn update_profile(
    user: AuthUser,
    pool: web::Data<PgPool>,
    objects: web::Data<dyn ObjectStore>,
    updates: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&updates.0)?;

    if let Some(email) = &updates.email {
        let email_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id != $2)",
        )
        .bind(email)
        .bind(user.user_id)
        .fetch_one(pool.get_ref())
        .await?;

        if email_exists {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
    }

    // Only the fields present in the body are written
    let mut query = sqlx::QueryBuilder::<Postgres>::new("UPDATE users SET ");
    let mut separated = query.separated(", ");
    if let Some(email) = &updates.email {
        separated.push("email = ").push_bind_unseparated(email);
    }
    if let Some(first_name) = &updates.first_name {
        separated.push("first_name = ").push_bind_unseparated(first_name);
    }
    if let Some(last_name) = &updates.last_name {
        separated.push("last_name = ").push_bind_unseparated(last_name);
    }
    if let Some(bio) = &updates.bio {
        separated.push("bio = ").push_bind_unseparated(bio);
    }
    if let Some(phone) = &updates.phone {
        separated.push("phone = ").push_bind_unseparated(phone);
    }
    if let Some(date_of_birth) = updates.date_of_birth {
        separated.push("date_of_birth = ").push_bind_unseparated(date_of_birth);
    }
    separated.push("updated_at = ").push_bind_unseparated(Utc::now());
    query.push(" WHERE id = ");
    query.push_bind(user.user_id);
    query.push(" RETURNING *");

    let account = query
        .build_query_as::<Account>()
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(user_view(objects.get_ref(), account).await))
}

fn avatar_extension(body: &[u8]) -> Result<&'static str, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty avatar upload".to_string()));
    }
    if body.len() > MAX_AVATAR_BYTES {
        return Err(AppError::BadRequest("Avatar exceeds 5MiB limit".to_string()));
    }
    let kind = infer::get(body).ok_or_else(|| AppError::BadRequest("Invalid file type".to_string()))?;
    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(AppError::BadRequest("Avatar must be an image".to_string()));
    }
    Ok(kind.extension())
}

pub async fn upload_avatar(
    user: AuthUser,
    pool: web::Data<PgPool>,
    objects: web::Data<dyn ObjectStore>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let extension = avatar_extension(&body)?;
    let content_type = infer::get(&body)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");

    let key = format!("avatars/{}.{}", user.user_id, extension);
    objects.put(&key, body.to_vec(), content_type).await?;

    let account = sqlx::query_as::<_, Account>(
        "UPDATE users SET avatar_key = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(&key)
    .bind(Utc::now())
    .bind(user.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(user_view(objects.get_ref(), account).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    ];

    #[test]
    fn avatar_accepts_images_only() {
        assert_eq!(avatar_extension(&PNG_HEADER).unwrap(), "png");
        assert!(matches!(avatar_extension(b"%PDF-1.7 not an image"), Err(AppError::BadRequest(_))));
        assert!(matches!(avatar_extension(b"plain text"), Err(AppError::BadRequest(_))));
        assert!(matches!(avatar_extension(&[]), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn profile_update_validates_present_fields_only() {
        let empty = ProfileUpdate::default();
        assert!(validate_payload(&empty).is_ok());

        let bad = ProfileUpdate {
            email: Some("nope".into()),
            phone: Some("0".repeat(21)),
            ..Default::default()
        };
        assert!(matches!(validate_payload(&bad), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn profile_update_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<ProfileUpdate>(r#"{"role": "admin"}"#);
        assert!(parsed.is_err());
    }
}
