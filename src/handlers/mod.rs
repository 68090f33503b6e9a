use actix_web::web;

pub mod assignment;
pub mod auth;
pub mod course;
pub mod file;
pub mod storage;
pub mod user;

/// Registers every API route. Mounted under `/api` by `main`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(auth::register))
            .route("/login", web::post().to(auth::login))
            .route("/logout", web::post().to(auth::logout))
            .route("/refresh", web::post().to(auth::refresh)),
    )
    .service(
        web::scope("/users")
            .route("", web::get().to(user::list_users))
            .service(
                web::resource("/profile")
                    .route(web::get().to(user::get_profile))
                    .route(web::put().to(user::update_profile))
                    .route(web::patch().to(user::update_profile)),
            )
            .route("/profile/avatar", web::put().to(user::upload_avatar))
            .route("/{id}", web::get().to(user::get_user)),
    )
    .service(
        web::scope("/courses")
            .service(
                web::resource("")
                    .route(web::get().to(course::list_courses))
                    .route(web::post().to(course::create_course)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(course::get_course))
                    .route(web::put().to(course::update_course))
                    .route(web::patch().to(course::update_course))
                    .route(web::delete().to(course::delete_course)),
            ),
    )
    .service(
        web::scope("/assignments")
            .service(
                web::resource("")
                    .route(web::get().to(assignment::list_assignments))
                    .route(web::post().to(assignment::create_assignment)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(assignment::get_assignment))
                    .route(web::put().to(assignment::update_assignment))
                    .route(web::patch().to(assignment::update_assignment))
                    .route(web::delete().to(assignment::delete_assignment)),
            ),
    )
    .configure(configure_files)
    .configure(configure_storage);
}

pub fn configure_files(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/files")
            .service(
                web::resource("")
                    .route(web::get().to(file::list_my_files))
                    .route(web::post().to(file::upload_file)),
            )
            .route("/my_files", web::get().to(file::list_my_files))
            .route("/shared_files", web::get().to(file::shared_files))
            .service(
                web::resource("/{id}")
                    .route(web::get().to(file::get_file))
                    .route(web::put().to(file::update_file))
                    .route(web::patch().to(file::update_file))
                    .route(web::delete().to(file::delete_file)),
            )
            .route("/{id}/download", web::get().to(file::download_file)),
    );
}

pub fn configure_storage(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/storage")
            .route("/info", web::get().to(storage::storage_info))
            .route("/cache/info", web::get().to(storage::cache_info))
            .route("/cache/clear", web::post().to(storage::clear_cache)),
    );
}
