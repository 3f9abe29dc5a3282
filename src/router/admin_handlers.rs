use std::str::FromStr;

use actix_web::http::StatusCode;
use actix_web::web::{Bytes, Data};
use actix_web::HttpRequest;
use log::{info, warn};
use tokio::sync::mpsc;

use super::streams::{console_stream, trace_stream};
use super::utils::*;
use crate::admin::{
    self, encode_frame, BackendType, HealthInfo, InspectDataFrame, NodeProfiles,
    StartProfilingResult, StreamSession, TraceOpts,
};
use crate::auth::AdminAction;
use crate::errors::{to_admin_api_err, ApiError};
use crate::globals::*;
use crate::heal::{self, get_aggregated_background_heal_state, storage_info_with_healing};
use crate::http::{ApiResponse, RequestExtensionsContext};
use crate::lock::{top_lock_entries, truncate_lock_entries, LockArgs, PeerLocks};
use crate::s3utils;
use crate::signals::ServiceSignal;
use crate::utils;

const DEFAULT_TOP_LOCKS_COUNT: i64 = 10;
const DEFAULT_CONSOLE_LOG_LIMIT: usize = 10;

macro_rules! authorize {
    ($req:expr, $globals:expr, $fn_name:expr, $action:expr) => {
        if let Err(res) = authorize(&$req, &$globals, $fn_name, $action) {
            return res;
        }
    };
}

// POST /hulk/admin/v3/heal/{bucket}/{prefix}
pub async fn heal_handler(req: HttpRequest, globals: Data<Globals>, body: Bytes) -> ApiResponse {
    authorize!(req, globals, "Heal", AdminAction::Heal);

    let bucket = req.match_info().get("bucket").unwrap_or_default().to_owned();
    let prefix = req.match_info().get("prefix").unwrap_or_default().to_owned();
    let query = query_map(&req);
    heal::heal(&req, &globals, &bucket, &prefix, &query, &body).await
}

// POST /hulk/admin/v3/background-heal/status
pub async fn background_heal_status_handler(
    req: HttpRequest,
    globals: Data<Globals>,
) -> ApiResponse {
    authorize!(req, globals, "BackgroundHealStatus", AdminAction::Heal);

    let backend = match globals.object_layer() {
        Some(backend) => backend,
        None => return ApiResponse::error_json(ApiError::ServerNotInitialized.to(), &req),
    };
    if backend.backend_info().type_ != BackendType::Erasure {
        return ApiResponse::error_json(ApiError::HealNotImplemented.to(), &req);
    }
    let state =
        get_aggregated_background_heal_state(Some(backend.as_ref()), &globals.notification).await;
    match state {
        Ok(state) => ApiResponse::success_json(&state),
        Err(err) => ApiResponse::error_json(to_admin_api_err(&err), &req),
    }
}

// GET /hulk/admin/v3/top/locks?count=10&stale=true
pub async fn top_locks_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "TopLocks", AdminAction::TopLocks);

    let query = query_map(&req);
    let count = match query.get("count").filter(|c| !c.is_empty()) {
        Some(count) => match count.parse::<i64>() {
            Ok(count) => count,
            Err(err) => {
                return ApiResponse::error_json(
                    ApiError::AdminInvalidArgument.to_with_err(&err.to_string()),
                    &req,
                )
            }
        },
        None => DEFAULT_TOP_LOCKS_COUNT,
    };
    let stale = query.get("stale").map_or(false, |v| v == "true");

    let mut peer_locks = vec![PeerLocks {
        addr: globals.node_name.clone(),
        locks: globals.local_locker.dup_lock_map(),
    }];
    peer_locks.extend(globals.notification.get_locks().await);

    let entries = truncate_lock_entries(top_lock_entries(&peer_locks, stale), count);
    ApiResponse::success_json(&entries)
}

// POST /hulk/admin/v3/force-unlock?paths=bucket/object,...
pub async fn force_unlock_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "ForceUnlock", AdminAction::ForceUnlock);

    let paths = parse_paths(&query_map(&req));
    if paths.is_empty() {
        return ApiResponse::error_json(ApiError::AdminInvalidArgument.to(), &req);
    }

    let args = LockArgs {
        resources: paths.clone(),
        ..Default::default()
    };
    globals.local_locker.force_unlock_now(&args);
    // Peer failures are logged by the fan-out.
    globals.notification.force_unlock(&paths).await;
    info!("Force unlocked {:?}", paths);
    ApiResponse::ok()
}

// POST /hulk/admin/v3/service?action=restart|stop
pub async fn service_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    req.set_handler_fn_name("Service");
    let query = query_map(&req);
    let sig = match query.get("action").map(|a| ServiceSignal::from_str(a)) {
        Some(Ok(sig)) => sig,
        _ => return ApiResponse::error_json(ApiError::MalformedPOSTRequest.to(), &req),
    };
    let action = match sig {
        ServiceSignal::Restart => AdminAction::ServiceRestart,
        ServiceSignal::Stop => AdminAction::ServiceStop,
    };
    authorize!(req, globals, "Service", action);

    globals.notification.signal_service(sig).await;
    // The reply is built before the local server is told to go away.
    let res = ApiResponse::ok();
    if globals.service_tx.send(sig).is_err() {
        warn!("Service signal {} dropped, server loop is gone", sig);
    }
    res
}

// GET /hulk/admin/v3/storageinfo
pub async fn storage_info_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "StorageInfo", AdminAction::ServerInfo);

    let backend = match globals.object_layer() {
        Some(backend) => backend,
        None => return ApiResponse::error_json(ApiError::ServerNotInitialized.to(), &req),
    };
    let info = storage_info_with_healing(backend.as_ref(), &globals.notification).await;
    ApiResponse::success_json(&info)
}

// GET /hulk/admin/v3/trace?s3=true&internal=true&err=true&threshold=100ms
pub async fn trace_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "Trace", AdminAction::ServerTrace);

    let opts = match TraceOpts::from_query(&query_map(&req)) {
        Ok(opts) => opts,
        Err(err) => {
            return ApiResponse::error_json(
                ApiError::InvalidRequest.to_with_err(&err.to_string()),
                &req,
            )
        }
    };
    trace_stream(&globals, opts, true)
}

// GET /hulk/admin/v3/log?node=&limit=10&logType=ALL
pub async fn console_log_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "ConsoleLog", AdminAction::ConsoleLog);

    let query = query_map(&req);
    let node = query.get("node").cloned().unwrap_or_default();
    let limit = query
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(DEFAULT_CONSOLE_LOG_LIMIT);
    let kind = match parse_log_kind(&query) {
        Ok(kind) => kind,
        Err(err) => return ApiResponse::error_json(err.to(), &req),
    };
    console_stream(&globals, &node, limit, kind, true)
}

// GET /hulk/admin/v3/healthinfo?deadline=1h
pub async fn health_info_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "HealthInfo", AdminAction::HealthInfo);

    let query = query_map(&req);
    let deadline = match query.get("deadline").filter(|d| !d.is_empty()) {
        Some(deadline) => match humantime::parse_duration(deadline) {
            Ok(deadline) => deadline,
            Err(err) => {
                return terminal_error(ApiError::InvalidRequest.to_with_err(&err.to_string()))
            }
        },
        None => HEALTH_DEFAULT_DEADLINE,
    };

    let lock = match globals
        .local_locker
        .lock_guard(HEALTH_CHECK_LOCK_RESOURCE, &globals.node_name)
    {
        Some(lock) => lock,
        None => {
            return terminal_error(
                ApiError::Busy.to_with_description("Another health check is in progress".to_owned()),
            )
        }
    };

    let session = StreamSession::new(&globals.shutdown, HEALTH_KEEP_ALIVE_INTERVAL)
        .with_deadline(deadline);
    let (tx, rx) = mpsc::channel(4);
    let _ = tx.try_send(HealthInfo::version_only());

    let cancel = session.token();
    let probe_globals = globals.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = probe_health(probe_globals, tx) => {}
        }
    });
    ApiResponse::streaming(session.run(rx, lock))
}

async fn probe_health(globals: Data<Globals>, tx: mpsc::Sender<HealthInfo>) {
    let local = globals.local_server_health().await;
    if tx
        .send(HealthInfo::with_servers(utils::now(), vec![local]))
        .await
        .is_err()
    {
        return;
    }
    if !globals.notification.is_empty() {
        let peers = globals.notification.server_health().await;
        let _ = tx.send(HealthInfo::with_servers(utils::now(), peers)).await;
    }
}

// POST /hulk/admin/v3/profiling/start?profilerType=cpu,mem
pub async fn start_profiling_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "StartProfiling", AdminAction::Profiling);

    if !globals.profilers.is_enabled() {
        return ApiResponse::error_json(ApiError::AdminProfilerNotEnabled.to(), &req);
    }
    let query = query_map(&req);
    let kinds = match admin::parse_profiler_types(query.get("profilerType").map_or("", String::as_str)) {
        Ok(kinds) if !kinds.is_empty() => kinds,
        Ok(_) => return ApiResponse::error_json(ApiError::AdminInvalidArgument.to(), &req),
        Err(err) => return ApiResponse::error_json(to_admin_api_err(&err), &req),
    };

    let local = globals.profilers.start(&kinds);
    let mut results = vec![StartProfilingResult {
        node_name: globals.node_name.clone(),
        success: local.is_ok(),
        error: local.err().map(|e| e.to_string()).unwrap_or_default(),
    }];
    results.extend(globals.notification.start_profiling(&kinds).await);
    ApiResponse::success_json(&results)
}

// POST /hulk/admin/v3/profiling/download
pub async fn download_profiling_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "DownloadProfiling", AdminAction::Profiling);

    let mut nodes = vec![NodeProfiles {
        node_name: globals.node_name.clone(),
        profiles: globals.profilers.stop_all(),
        error: String::new(),
    }];
    nodes.extend(globals.notification.download_profiling().await);
    if nodes.iter().all(|n| n.profiles.is_empty()) {
        return ApiResponse::error_json(ApiError::AdminProfilerNotEnabled.to(), &req);
    }
    json_frames(&nodes, &req)
}

// GET /hulk/admin/v3/inspect-data?volume=bucket&file=object/xl.meta
pub async fn inspect_data_handler(req: HttpRequest, globals: Data<Globals>) -> ApiResponse {
    authorize!(req, globals, "InspectData", AdminAction::InspectData);

    let backend = match globals.object_layer() {
        Some(backend) => backend,
        None => return ApiResponse::error_json(ApiError::ServerNotInitialized.to(), &req),
    };
    let reader = match backend.raw_data() {
        Some(reader) => reader,
        None => return ApiResponse::error_json(ApiError::NotImplemented.to(), &req),
    };

    let query = query_map(&req);
    let volume = query.get("volume").map_or("", String::as_str);
    let file = query.get("file").map_or("", String::as_str);
    if volume.is_empty() {
        return ApiResponse::error_json(ApiError::InvalidBucketName.to(), &req);
    }
    if file.is_empty() || s3utils::has_bad_path_component(file) {
        return ApiResponse::error_json(ApiError::InvalidRequest.to(), &req);
    }

    let files = match reader.read_raw(volume, file).await {
        Ok(files) => files,
        Err(err) => return ApiResponse::error_json(to_admin_api_err(&err), &req),
    };
    let frames: Vec<InspectDataFrame> = files
        .into_iter()
        .map(|f| InspectDataFrame {
            endpoint: f.endpoint,
            path: f.path,
            data: base64::encode(&f.data),
        })
        .collect();
    json_frames(&frames, &req)
}

// Newline delimited JSON body, one frame per item.
fn json_frames<T: serde::Serialize>(items: &[T], req: &HttpRequest) -> ApiResponse {
    let mut frames = Vec::with_capacity(items.len());
    for item in items {
        match encode_frame(item) {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                return ApiResponse::error_json(
                    ApiError::InternalError.to_with_err(&err.to_string()),
                    req,
                )
            }
        }
    }
    ApiResponse::new(
        StatusCode::OK,
        concat_frames(frames),
        Some(mime::APPLICATION_JSON),
    )
}
