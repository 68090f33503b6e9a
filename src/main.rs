mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod storage;
mod utils;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::info;

use crate::config::Config;
use crate::db::files::{PgRecordStore, RecordStore};
use crate::storage::object_store::{ObjectStore, S3ObjectStore};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|err| {
        log::error!("Invalid configuration: {}", err);
        io::Error::new(io::ErrorKind::InvalidInput, err)
    })?;

    let pool = db::create_pool(&config.database_url).await.map_err(|err| {
        log::error!("Failed to connect to the database: {}", err);
        io::Error::new(io::ErrorKind::Other, err)
    })?;

    let s3_client = utils::s3::create_s3_client(&config).await;
    let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(
        s3_client,
        config.s3_bucket.clone(),
        Duration::from_secs(config.presign_expiry_secs),
    ));
    let records: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool.clone()));

    let bind_address = config.bind_address.clone();
    let max_upload_bytes = config.max_upload_bytes;
    let config = web::Data::new(config);
    let pool = web::Data::new(pool);
    let objects = web::Data::from(objects);
    let records = web::Data::from(records);

    info!("Starting server at {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .app_data(config.clone())
            .app_data(pool.clone())
            .app_data(objects.clone())
            .app_data(records.clone())
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .service(web::scope("/api").configure(handlers::configure))
    })
    .bind(bind_address)?
    .run()
    .await
}
