use std::str::FromStr;

use actix_web::web::{self, Data};
use actix_web::HttpRequest;
use log::warn;

use super::streams::{console_stream, trace_stream};
use super::utils::*;
use crate::admin::{self, BackendType, TraceOpts};
use crate::auth::AdminAction;
use crate::errors::{to_admin_api_err, ApiError};
use crate::globals::Globals;
use crate::http::ApiResponse;
use crate::lock::LockArgs;
use crate::peer::*;
use crate::signals::ServiceSignal;

macro_rules! authorize {
    ($req:expr, $globals:expr, $fn_name:expr) => {
        if let Err(res) = authorize(&$req, &$globals, $fn_name, AdminAction::Peer) {
            return res;
        }
    };
}

/// Routes answering the fan-out calls of other nodes.
pub fn configure_peer_router(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(PEER_PATH_PREFIX)
            .route(PEER_METHOD_GET_LOCKS, web::get().to(get_locks_handler))
            .route(PEER_METHOD_FORCE_UNLOCK, web::post().to(force_unlock_handler))
            .route(
                PEER_METHOD_BACKGROUND_HEAL_STATUS,
                web::get().to(background_heal_status_handler),
            )
            .route(PEER_METHOD_SIGNAL_SERVICE, web::post().to(signal_service_handler))
            .route(PEER_METHOD_START_PROFILING, web::post().to(start_profiling_handler))
            .route(
                PEER_METHOD_DOWNLOAD_PROFILING,
                web::post().to(download_profiling_handler),
            )
            .route(PEER_METHOD_SERVER_HEALTH, web::get().to(server_health_handler))
            .route(PEER_METHOD_TRACE, web::get().to(trace_handler))
            .route(PEER_METHOD_CONSOLE_LOG, web::get().to(console_log_handler)),
    );
}

async fn get_locks_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerGetLocks");
    ApiResponse::success_json(&globals.local_locker.dup_lock_map())
}

async fn force_unlock_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerForceUnlock");

    let paths = parse_paths(&query_map(&req));
    if paths.is_empty() {
        return ApiResponse::error_json(ApiError::AdminInvalidArgument.to(), &req);
    }
    globals.local_locker.force_unlock_now(&LockArgs {
        resources: paths,
        ..Default::default()
    });
    ApiResponse::ok()
}

async fn background_heal_status_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerBackgroundHealStatus");

    let backend = match globals.object_layer() {
        Some(backend) => backend,
        None => return ApiResponse::error_json(ApiError::ServerNotInitialized.to(), &req),
    };
    if backend.backend_info().type_ != BackendType::Erasure {
        return ApiResponse::error_json(ApiError::HealNotImplemented.to(), &req);
    }
    match backend.background_heal_status().await {
        Some(state) => ApiResponse::success_json(&state),
        None => ApiResponse::error_json(ApiError::ServerNotInitialized.to(), &req),
    }
}

async fn signal_service_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerSignalService");

    let query = query_map(&req);
    let sig = match query.get("signal").map(|s| ServiceSignal::from_str(s)) {
        Some(Ok(sig)) => sig,
        _ => return ApiResponse::error_json(ApiError::MalformedPOSTRequest.to(), &req),
    };
    let res = ApiResponse::ok();
    if globals.service_tx.send(sig).is_err() {
        warn!("Service signal {} dropped, server loop is gone", sig);
    }
    res
}

async fn start_profiling_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerStartProfiling");

    let query = query_map(&req);
    let started = admin::parse_profiler_types(query.get("profilerType").map_or("", String::as_str))
        .and_then(|kinds| globals.profilers.start(&kinds));
    match started {
        Ok(()) => ApiResponse::ok(),
        Err(err) => ApiResponse::error_json(to_admin_api_err(&err), &req),
    }
}

async fn download_profiling_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerDownloadProfiling");
    ApiResponse::success_json(&globals.profilers.stop_all())
}

async fn server_health_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerServerHealth");
    ApiResponse::success_json(&globals.local_server_health().await)
}

async fn trace_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerTrace");

    match TraceOpts::from_query(&query_map(&req)) {
        Ok(opts) => trace_stream(&globals, opts, false),
        Err(err) => ApiResponse::error_json(
            ApiError::InvalidRequest.to_with_err(&err.to_string()),
            &req,
        ),
    }
}

async fn console_log_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "PeerConsoleLog");

    match parse_log_kind(&query_map(&req)) {
        Ok(kind) => console_stream(&globals, "", 0, kind, false),
        Err(err) => ApiResponse::error_json(err.to(), &req),
    }
}
