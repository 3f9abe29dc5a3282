use std::collections::HashMap;

use actix_web::HttpRequest;
use log::debug;

use super::*;
use crate::admin::{BackendType, HealStartSuccess};
use crate::errors::ApiError;
use crate::globals::{Globals, HEAL_KEEP_ALIVE_INTERVAL};
use crate::http::{await_with_keep_alive, ApiResponse};
use crate::utils;

/// Serves a heal request on `bucket/prefix`: start a sequence, poll or stop
/// it, depending on the client token and force flags.
pub async fn heal(
    req: &HttpRequest,
    globals: &Globals,
    bucket: &str,
    prefix: &str,
    query: &HashMap<String, String>,
    body: &[u8],
) -> ApiResponse {
    let backend = match globals.object_layer() {
        Some(backend) => backend,
        None => return ApiResponse::error_json(ApiError::ServerNotInitialized.to(), req),
    };
    if backend.backend_info().type_ != BackendType::Erasure {
        return ApiResponse::error_json(ApiError::HealNotImplemented.to(), req);
    }

    let hip = match extract_heal_init_params(bucket, prefix, query, body) {
        Ok(hip) => hip,
        Err(err) => return ApiResponse::error_json(err.to(), req),
    };

    let client_address = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or_default()
        .to_owned();
    let heal_path = utils::path_join(&[hip.bucket.as_str(), hip.obj_prefix.as_str()]);
    let manager = globals.heal_manager.clone();

    if hip.client_token.is_empty() && !hip.force_start && !hip.force_stop {
        if let Some(seq) = manager.get_heal_sequence(&heal_path).await {
            if !seq.has_ended() {
                debug!(
                    "Heal on '{}' already running, replying with token {}",
                    heal_path, seq.client_token
                );
                return ApiResponse::success_json(&HealStartSuccess {
                    client_token: seq.client_token.clone(),
                    client_address: seq.client_address.clone(),
                    start_time: seq.start_time,
                });
            }
        }
    }

    if !hip.client_token.is_empty() {
        return match manager
            .pop_heal_status_json(&heal_path, &hip.client_token)
            .await
        {
            Ok(body) => ApiResponse::success_json_bytes(body),
            Err(err) => ApiResponse::error_json(err, req),
        };
    }

    if hip.force_stop {
        let task = async move { manager.stop_heal_sequence(&heal_path).await };
        return await_with_keep_alive(task, HEAL_KEEP_ALIVE_INTERVAL, req).await;
    }

    let seq = HealSequence::new(
        &hip.bucket,
        &hip.obj_prefix,
        &client_address,
        hip.hs,
        hip.force_start,
    )
    .with_queue_capacity(globals.config.heal_max_items);
    let task = async move { manager.launch_new_heal_sequence(seq, backend).await };
    await_with_keep_alive(task, HEAL_KEEP_ALIVE_INTERVAL, req).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::body;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use bytes::Bytes;
    use maplit::hashmap;
    use tokio::sync::mpsc;

    use super::*;
    use crate::admin::{HealStatusSummary, HealTaskStatus};
    use crate::config::Config;
    use crate::errors::ApiErrorResponse;
    use crate::object::{MemoryObjectLayer, ObjectLayer};

    const OPTS: &[u8] = br#"{"recursive":true}"#;

    fn globals(layer: Option<MemoryObjectLayer>) -> Globals {
        let (tx, _rx) = mpsc::unbounded_channel();
        let globals = Globals::new(Config::default(), tx);
        match layer {
            Some(layer) => globals.with_object_layer(Arc::new(layer) as Arc<dyn ObjectLayer>),
            None => globals,
        }
    }

    fn slow_layer() -> MemoryObjectLayer {
        let layer = MemoryObjectLayer::erasure(
            vec!["http://node1:9000/d1".to_owned(), "http://node1:9000/d2".to_owned()],
            1,
        )
        .with_heal_delay(Duration::from_secs(5));
        layer.make_bucket("photos");
        layer
            .put_object("photos", "a.png", Bytes::from_static(b"a"))
            .unwrap();
        layer
    }

    async fn call(
        globals: &Globals,
        bucket: &str,
        query: HashMap<String, String>,
        body: &[u8],
    ) -> (StatusCode, Bytes) {
        let req = TestRequest::default().to_http_request();
        let res = heal(&req, globals, bucket, "", &query, body)
            .await
            .into_inner();
        let status = res.status();
        (status, body::to_bytes(res.into_body()).await.unwrap())
    }

    fn error_code(body: &[u8]) -> String {
        serde_json::from_slice::<ApiErrorResponse>(body).unwrap().code
    }

    #[actix_rt::test]
    async fn test_heal_requires_erasure_backend() {
        let (status, body) = call(&globals(None), "photos", HashMap::new(), OPTS).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error_code(&body), "XHulkServerNotInitialized");

        let fs = globals(Some(MemoryObjectLayer::fs("/data")));
        let (_, body) = call(&fs, "photos", HashMap::new(), OPTS).await;
        assert_eq!(error_code(&body), "XHulkHealNotImplemented");
    }

    #[actix_rt::test]
    async fn test_heal_start_poll_stop() {
        let globals = globals(Some(slow_layer()));

        let (status, body) = call(&globals, "photos", HashMap::new(), OPTS).await;
        assert_eq!(status, StatusCode::OK);
        let started: HealStartSuccess = serde_json::from_slice(&body).unwrap();

        // A second identical request joins the live sequence.
        let (_, body) = call(&globals, "photos", HashMap::new(), OPTS).await;
        let again: HealStartSuccess = serde_json::from_slice(&body).unwrap();
        assert_eq!(again.client_token, started.client_token);

        let (_, body) = call(
            &globals,
            "photos",
            hashmap! { HEAL_CLIENT_TOKEN.to_owned() => "bogus".to_owned() },
            b"",
        )
        .await;
        assert_eq!(error_code(&body), "XHulkHealNoSuchProcess");

        let (status, body) = call(
            &globals,
            "photos",
            hashmap! { HEAL_CLIENT_TOKEN.to_owned() => started.client_token.clone() },
            b"",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let polled: HealTaskStatus = serde_json::from_slice(&body).unwrap();
        assert!(polled.heal_settings.recursive);

        let (status, body) = call(
            &globals,
            "photos",
            hashmap! { HEAL_FORCE_STOP.to_owned() => "".to_owned() },
            OPTS,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stopped: HealTaskStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(stopped.summary, HealStatusSummary::Stopped);
        assert!(globals.heal_manager.get_heal_sequence("photos").await.is_none());
    }

    #[actix_rt::test]
    async fn test_heal_force_start_replaces_sequence() {
        let globals = globals(Some(slow_layer()));
        let (_, body) = call(&globals, "photos", HashMap::new(), OPTS).await;
        let first: HealStartSuccess = serde_json::from_slice(&body).unwrap();

        let (status, body) = call(
            &globals,
            "photos",
            hashmap! { HEAL_FORCE_START.to_owned() => "".to_owned() },
            OPTS,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let second: HealStartSuccess = serde_json::from_slice(&body).unwrap();
        assert_ne!(second.client_token, first.client_token);

        let (_, body) = call(&globals, "", HashMap::new(), OPTS).await;
        assert_eq!(error_code(&body), "XHulkHealOverlappingPaths");
        globals.heal_manager.stop_all().await;
    }
}
