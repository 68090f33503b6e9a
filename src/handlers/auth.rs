use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::errors::AppError;
use crate::handlers::user::{fetch_account, user_view};
use crate::models::user::{Account, Role, UserView};
use crate::storage::object_store::ObjectStore;
use crate::utils::auth::{hash_password, verify_password};
use crate::utils::jwt::{self, TokenKind, TokenPair};
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150))]
    username: String,
    #[validate(email, length(max = 254))]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    password_confirm: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    last_name: String,
    #[serde(default)]
    role: Role,
}

impl RegisterRequest {
    fn check(&self) -> Result<(), AppError> {
        validate_payload(self)?;
        if self.password != self.password_confirm {
            return Err(AppError::BadRequest("Passwords don't match".to_string()));
        }
        match self.role {
            Role::Student | Role::Teacher => Ok(()),
            Role::Admin => Err(AppError::Forbidden("Administrators cannot self-register".to_string())),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh: Option<String>,
}

#[derive(Serialize)]
pub struct AuthResponse {
    user: UserView,
    tokens: TokenPair,
}

/// Marks a refresh token as spent. Returns false if it already was.
async fn revoke(pool: &PgPool, jti: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query(
        "INSERT INTO revoked_tokens (jti, revoked_at) VALUES ($1, $2) ON CONFLICT (jti) DO NOTHING",
    )
    .bind(jti)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

fn invalid_refresh() -> AppError {
    AppError::BadRequest("Invalid refresh token".to_string())
}

pub async fn register(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    objects: web::Data<dyn ObjectStore>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    req.check()?;

    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR LOWER(email) = LOWER($2))",
    )
    .bind(&req.username)
    .bind(&req.email)
    .fetch_one(pool.get_ref())
    .await?;
    if taken {
        return Err(AppError::Conflict("Username or email already exists".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let now = Utc::now();
    let account = sqlx::query_as::<_, Account>(
        "INSERT INTO users (id, username, email, password, first_name, last_name, role, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.username)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(req.role.as_str())
    .bind(now)
    .fetch_one(pool.get_ref())
    .await?;

    log::info!("Registered {} as {}", account.username, account.role.as_str());
    let tokens = jwt::issue_pair(account.id, account.role, &config)?;
    Ok(HttpResponse::Created().json(AuthResponse {
        user: user_view(objects.get_ref(), account).await,
        tokens,
    }))
}

pub async fn login(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    objects: web::Data<dyn ObjectStore>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let lookup = match (&req.username, &req.email) {
        (Some(username), _) if !username.is_empty() => {
            sqlx::query_as::<_, Account>("SELECT * FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(pool.get_ref())
                .await?
        }
        (_, Some(email)) if !email.is_empty() => {
            sqlx::query_as::<_, Account>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(pool.get_ref())
                .await?
        }
        _ => return Err(AppError::BadRequest("Username or email is required".to_string())),
    };

    let account = lookup
        .filter(|account| verify_password(&account.password, &req.password))
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let tokens = jwt::issue_pair(account.id, account.role, &config)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        user: user_view(objects.get_ref(), account).await,
        tokens,
    }))
}

pub async fn logout(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    if let Some(token) = &req.refresh {
        let claims = jwt::validate_token(token, TokenKind::Refresh, &config).map_err(|_| invalid_refresh())?;
        revoke(pool.get_ref(), claims.token_id()?).await?;
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully logged out" })))
}

/// Exchanges a refresh token for a new pair. The presented token is spent.
pub async fn refresh(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    let token = req
        .refresh
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("No refresh token provided".to_string()))?;
    let claims = jwt::validate_token(token, TokenKind::Refresh, &config).map_err(|err| {
        log::debug!("Refresh token rejected: {}", err);
        invalid_refresh()
    })?;

    if !revoke(pool.get_ref(), claims.token_id()?).await? {
        return Err(invalid_refresh());
    }

    // Re-read the account so a changed role is reflected in the new tokens
    let account = fetch_account(pool.get_ref(), claims.user_id()?)
        .await?
        .ok_or_else(invalid_refresh)?;

    Ok(HttpResponse::Ok().json(jwt::issue_pair(account.id, account.role, &config)?))
}
