use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::course::Course;
use crate::models::user::Role;
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

const COURSE_SELECT: &str = r#"
    SELECT c.id, c.name, c.code, c.description, c.teacher_id,
           TRIM(u.first_name || ' ' || u.last_name) AS teacher_name,
           c.created_at, c.updated_at
    FROM courses c
    JOIN users u ON u.id = c.teacher_id
"#;

#[derive(Deserialize, Validate)]
pub struct NewCourse {
    #[validate(length(min = 1, max = 200))]
    name: String,
    #[validate(length(min = 1, max = 20))]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CourseUpdate {
    #[validate(length(min = 1, max = 200))]
    name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    code: Option<String>,
    description: Option<String>,
}

pub(crate) async fn fetch_course(pool: &PgPool, course_id: Uuid) -> Result<Course, AppError> {
    sqlx::query_as::<_, Course>(&format!("{} WHERE c.id = $1", COURSE_SELECT))
        .bind(course_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
}

/// Loads a course the caller is allowed to change.
async fn managed_course(pool: &PgPool, user: &AuthUser, course_id: Uuid) -> Result<Course, AppError> {
    let course = fetch_course(pool, course_id).await?;
    if !user.role.can_manage_course(user.user_id, course.teacher_id) {
        return Err(AppError::Forbidden("Only the course teacher can change this course".to_string()));
    }
    Ok(course)
}

pub async fn list_courses(user: AuthUser, pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let courses = match user.role {
        Role::Teacher => {
            sqlx::query_as::<_, Course>(&format!("{} WHERE c.teacher_id = $1 ORDER BY c.name", COURSE_SELECT))
                .bind(user.user_id)
                .fetch_all(pool.get_ref())
                .await?
        }
        Role::Student | Role::Admin => {
            sqlx::query_as::<_, Course>(&format!("{} ORDER BY c.name", COURSE_SELECT))
                .fetch_all(pool.get_ref())
                .await?
        }
    };
    Ok(HttpResponse::Ok().json(courses))
}

pub async fn get_course(
    _user: AuthUser,
    pool: web::Data<PgPool>,
    course_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(fetch_course(pool.get_ref(), course_id.into_inner()).await?))
}

pub async fn create_course(
    user: AuthUser,
    pool: web::Data<PgPool>,
    new_course: web::Json<NewCourse>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&new_course.0)?;
    if !user.role.can_create_course() {
        return Err(AppError::Forbidden("Only teachers can create courses".to_string()));
    }

    let course_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO courses (id, name, code, description, teacher_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $6)",
    )
    .bind(course_id)
    .bind(&new_course.name)
    .bind(&new_course.code)
    .bind(&new_course.description)
    .bind(user.user_id)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(fetch_course(pool.get_ref(), course_id).await?))
}

pub async fn update_course(
    user: AuthUser,
    pool: web::Data<PgPool>,
    course_id: web::Path<Uuid>,
    updates: web::Json<CourseUpdate>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&updates.0)?;
    let course = managed_course(pool.get_ref(), &user, course_id.into_inner()).await?;

    sqlx::query(
        "UPDATE courses SET name = COALESCE($1, name), code = COALESCE($2, code), \
         description = COALESCE($3, description), updated_at = $4 WHERE id = $5",
    )
    .bind(&updates.name)
    .bind(&updates.code)
    .bind(&updates.description)
    .bind(Utc::now())
    .bind(course.id)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(fetch_course(pool.get_ref(), course.id).await?))
}

pub async fn delete_course(
    user: AuthUser,
    pool: web::Data<PgPool>,
    course_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let course = managed_course(pool.get_ref(), &user, course_id.into_inner()).await?;

    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(course.id)
        .execute(pool.get_ref())
        .await?;

    log::info!("Course {} ({}) deleted by {}", course.code, course.id, user.user_id);
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_code_is_limited_to_twenty_chars() {
        let course = NewCourse {
            name: "Compilers".into(),
            code: "CS-4120-COMPILERS-FALL".into(),
            description: String::new(),
        };
        assert!(matches!(validate_payload(&course), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn course_update_accepts_partial_body() {
        let update: CourseUpdate = serde_json::from_str(r#"{"description": "Now with labs"}"#).unwrap();
        assert!(validate_payload(&update).is_ok());
        assert!(update.name.is_none());
    }
}
