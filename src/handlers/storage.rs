use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::db::files::RecordStore;
use crate::errors::AppError;
use crate::storage::quota::{compute_quota, QuotaReport, STORAGE_LIMIT_BYTES};
use crate::utils::auth::AuthUser;

#[derive(Serialize)]
struct CacheInfo {
    size: i64,
    items_count: i64,
}

/// Never fails: a broken listing is reported as an empty quota.
pub async fn storage_info(
    user: AuthUser,
    records: web::Data<dyn RecordStore>,
) -> Result<HttpResponse, AppError> {
    let report = match records.list_files_by_owner(user.user_id).await {
        Ok(files) => compute_quota(&files, STORAGE_LIMIT_BYTES),
        Err(err) => {
            log::error!("Error getting storage info for {}: {}", user.user_id, err);
            QuotaReport::empty(STORAGE_LIMIT_BYTES)
        }
    };
    Ok(HttpResponse::Ok().json(report))
}

// No server-side cache exists; these keep the client contract.
pub async fn cache_info(_user: AuthUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(CacheInfo { size: 0, items_count: 0 }))
}

pub async fn clear_cache(_user: AuthUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(json!({ "message": "Cache cleared successfully" })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{test, App};
    use uuid::Uuid;

    use super::*;
    use crate::config::Config;
    use crate::db::files::memory::MemoryRecordStore;
    use crate::models::file::FileRecord;
    use crate::models::user::Role;
    use crate::utils::jwt::{self, TokenKind};

    const GIB: i64 = 1024 * 1024 * 1024;

    async fn get_json(records: Arc<dyn RecordStore>, user_id: Uuid, uri: &str) -> serde_json::Value {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Config::for_tests()))
                .app_data(web::Data::from(records))
                .configure(crate::handlers::configure_storage),
        )
        .await;
        let token = jwt::generate_token(user_id, Role::Student, TokenKind::Access, &Config::for_tests()).unwrap();
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        test::call_and_read_body_json(&app, req).await
    }

    #[actix_web::test]
    async fn info_sums_only_callers_files() {
        let owner = Uuid::new_v4();
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::with_files(vec![
            FileRecord::sample(owner, "a.iso", 4 * GIB),
            FileRecord::sample(owner, "b.iso", GIB),
            FileRecord::sample(Uuid::new_v4(), "c.iso", 3 * GIB),
        ]));

        let body = get_json(records, owner, "/storage/info").await;
        assert_eq!(body["used"], 5 * GIB);
        assert_eq!(body["total"], STORAGE_LIMIT_BYTES);
        assert_eq!(body["used_percentage"], 50.0);
    }

    #[actix_web::test]
    async fn info_falls_back_when_listing_fails() {
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::failing());

        let body = get_json(records, Uuid::new_v4(), "/storage/info").await;
        assert_eq!(body["used"], 0);
        assert_eq!(body["total"], STORAGE_LIMIT_BYTES);
        assert_eq!(body["used_percentage"], 0.0);
    }

    #[actix_web::test]
    async fn cache_endpoints_are_stubs() {
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::default());
        let body = get_json(records, Uuid::new_v4(), "/storage/cache/info").await;
        assert_eq!(body["size"], 0);
        assert_eq!(body["items_count"], 0);
    }
}
