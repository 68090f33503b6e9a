use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::course::fetch_course;
use crate::models::assignment::Assignment;
use crate::utils::auth::AuthUser;
use crate::utils::validation::validate_payload;

const ASSIGNMENT_SELECT: &str = r#"
    SELECT a.id, a.title, a.description, a.due_date, a.course_id,
           c.name AS course_name, a.created_at, a.updated_at
    FROM assignments a
    JOIN courses c ON c.id = a.course_id
"#;

#[derive(Deserialize)]
pub struct AssignmentQueryParams {
    course_id: Option<Uuid>,
}

#[derive(Deserialize, Validate)]
pub struct NewAssignment {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[serde(default)]
    description: String,
    due_date: DateTime<Utc>,
    course: Uuid,
}

#[derive(Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AssignmentUpdate {
    #[validate(length(min = 1, max = 200))]
    title: Option<String>,
    description: Option<String>,
    due_date: Option<DateTime<Utc>>,
}

async fn fetch_assignment(pool: &PgPool, assignment_id: Uuid) -> Result<Assignment, AppError> {
    sqlx::query_as::<_, Assignment>(&format!("{} WHERE a.id = $1", ASSIGNMENT_SELECT))
        .bind(assignment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))
}

/// Fails unless the caller teaches `course_id` or is an admin.
async fn ensure_manages_course(pool: &PgPool, user: &AuthUser, course_id: Uuid) -> Result<(), AppError> {
    let course = fetch_course(pool, course_id).await?;
    if !user.role.can_manage_course(user.user_id, course.teacher_id) {
        return Err(AppError::Forbidden("Only the course teacher can manage its assignments".to_string()));
    }
    Ok(())
}

pub async fn list_assignments(
    _user: AuthUser,
    pool: web::Data<PgPool>,
    query: web::Query<AssignmentQueryParams>,
) -> Result<HttpResponse, AppError> {
    let assignments = match query.course_id {
        Some(course_id) => {
            sqlx::query_as::<_, Assignment>(&format!(
                "{} WHERE a.course_id = $1 ORDER BY a.due_date",
                ASSIGNMENT_SELECT
            ))
            .bind(course_id)
            .fetch_all(pool.get_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, Assignment>(&format!("{} ORDER BY a.due_date", ASSIGNMENT_SELECT))
                .fetch_all(pool.get_ref())
                .await?
        }
    };
    Ok(HttpResponse::Ok().json(assignments))
}

pub async fn get_assignment(
    _user: AuthUser,
    pool: web::Data<PgPool>,
    assignment_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(fetch_assignment(pool.get_ref(), assignment_id.into_inner()).await?))
}

pub async fn create_assignment(
    user: AuthUser,
    pool: web::Data<PgPool>,
    new_assignment: web::Json<NewAssignment>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&new_assignment.0)?;
    ensure_manages_course(pool.get_ref(), &user, new_assignment.course).await?;

    let assignment_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO assignments (id, title, description, due_date, course_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $6)",
    )
    .bind(assignment_id)
    .bind(&new_assignment.title)
    .bind(&new_assignment.description)
    .bind(new_assignment.due_date)
    .bind(new_assignment.course)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(fetch_assignment(pool.get_ref(), assignment_id).await?))
}

pub async fn update_assignment(
    user: AuthUser,
    pool: web::Data<PgPool>,
    assignment_id: web::Path<Uuid>,
    updates: web::Json<AssignmentUpdate>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&updates.0)?;
    let assignment = fetch_assignment(pool.get_ref(), assignment_id.into_inner()).await?;
    ensure_manages_course(pool.get_ref(), &user, assignment.course_id).await?;

    sqlx::query(
        "UPDATE assignments SET title = COALESCE($1, title), description = COALESCE($2, description), \
         due_date = COALESCE($3, due_date), updated_at = $4 WHERE id = $5",
    )
    .bind(&updates.title)
    .bind(&updates.description)
    .bind(updates.due_date)
    .bind(Utc::now())
    .bind(assignment.id)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(fetch_assignment(pool.get_ref(), assignment.id).await?))
}

pub async fn delete_assignment(
    user: AuthUser,
    pool: web::Data<PgPool>,
    assignment_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let assignment = fetch_assignment(pool.get_ref(), assignment_id.into_inner()).await?;
    ensure_manages_course(pool.get_ref(), &user, assignment.course_id).await?;

    sqlx::query("DELETE FROM assignments WHERE id = $1")
        .bind(assignment.id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
