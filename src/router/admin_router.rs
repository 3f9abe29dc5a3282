use actix_web::web;
use const_format::concatcp;

use super::admin_handlers::*;
use crate::globals;

pub const ADMIN_PATH_PREFIX: &str = concatcp!(globals::SYSTEM_RESERVED_BUCKET_PATH, "/admin");
pub const ADMIN_API_VERSION: &str = "v3";
pub const ADMIN_API_VERSION_PREFIX: &str = concatcp!(ADMIN_PATH_PREFIX, "/", ADMIN_API_VERSION);

/// Admin API routes, all under `/hulk/admin/v3`.
pub fn configure_admin_router(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(ADMIN_API_VERSION_PREFIX)
            // Heal processing endpoints.
            .route("/heal/", web::post().to(heal_handler))
            .route("/heal/{bucket}", web::post().to(heal_handler))
            .route("/heal/{bucket}/{prefix:.*}", web::post().to(heal_handler))
            .route(
                "/background-heal/status",
                web::post().to(background_heal_status_handler),
            )
            // Lock operations.
            .route("/top/locks", web::get().to(top_locks_handler))
            .route("/force-unlock", web::post().to(force_unlock_handler))
            // Service and info operations.
            .route("/service", web::post().to(service_handler))
            .route("/storageinfo", web::get().to(storage_info_handler))
            .route("/healthinfo", web::get().to(health_info_handler))
            .route("/profiling/start", web::post().to(start_profiling_handler))
            .route(
                "/profiling/download",
                web::post().to(download_profiling_handler),
            )
            .route("/inspect-data", web::get().to(inspect_data_handler))
            // Streaming endpoints.
            .route("/trace", web::get().to(trace_handler))
            .route("/log", web::get().to(console_log_handler)),
    );
}
