use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use futures_util::stream::{self, StreamExt};
use log::warn;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

use super::*;
use crate::admin::KEEP_ALIVE_FILLER;
use crate::errors::{ApiError, ApiErrorResponse, GenericApiError};

type TaskResult = Result<Vec<u8>, GenericApiError>;

/// Runs `task` and answers with its result. When the task outlives the
/// first `interval` the response is committed as `200 OK`, a space is
/// written every `interval` and the result (or the error as JSON) is
/// appended once known.
pub async fn await_with_keep_alive<F>(task: F, interval: Duration, req: &HttpRequest) -> ApiResponse
where
    F: Future<Output = TaskResult> + Send + 'static,
{
    let mut handle = tokio::spawn(task);

    tokio::select! {
        res = &mut handle => {
            return match flatten(res) {
                Ok(body) => ApiResponse::success_json_bytes(body),
                Err(err) => ApiResponse::error_json(err, req),
            };
        }
        _ = tokio::time::sleep(interval) => {}
    }

    // Error details have to be captured now, the request is gone once the
    // body starts streaming.
    let err_res = error_response(ApiError::None.to(), req);
    let ticker = tokio::time::interval_at(Instant::now() + interval, interval);

    let filler = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(KEEP_ALIVE_FILLER)) });
    let rest = stream::unfold(Some((handle, ticker)), move |state| {
        let err_res = err_res.clone();
        async move { next_chunk(state?, err_res).await }
    });
    ApiResponse::streaming(filler.chain(rest))
}

async fn next_chunk(
    (mut handle, mut ticker): (JoinHandle<TaskResult>, Interval),
    err_res: ApiErrorResponse,
) -> Option<(
    Result<Bytes, Infallible>,
    Option<(JoinHandle<TaskResult>, Interval)>,
)> {
    tokio::select! {
        res = &mut handle => {
            let body = match flatten(res) {
                Ok(body) => Bytes::from(body),
                Err(err) => {
                    let err_res = ApiErrorResponse {
                        code: err.code.to_owned(),
                        message: err.description,
                        ..err_res
                    };
                    Bytes::from(serde_json::to_vec(&err_res).unwrap_or_default())
                }
            };
            Some((Ok(body), None))
        }
        _ = ticker.tick() => Some((Ok(Bytes::from_static(KEEP_ALIVE_FILLER)), Some((handle, ticker)))),
    }
}

fn flatten(res: Result<TaskResult, tokio::task::JoinError>) -> TaskResult {
    res.unwrap_or_else(|err| {
        warn!("keep-alive task failed: {}", err);
        Err(ApiError::InternalError.to_with_err(&err.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use actix_web::body;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;

    use super::*;

    #[actix_rt::test]
    async fn test_fast_task_answers_directly() {
        let req = TestRequest::default().to_http_request();
        let res = await_with_keep_alive(async { Ok(b"{}".to_vec()) }, Duration::from_secs(10), &req)
            .await
            .into_inner();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(&body::to_bytes(res.into_body()).await.unwrap()[..], b"{}");

        let res = await_with_keep_alive(
            async { Err(ApiError::HealOverlappingPaths.to()) },
            Duration::from_secs(10),
            &req,
        )
        .await
        .into_inner();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_slow_task_streams_filler() {
        let req = TestRequest::default().to_http_request();
        let task = async {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok(b"{\"clientToken\":\"t\"}".to_vec())
        };
        let res = await_with_keep_alive(task, Duration::from_millis(50), &req)
            .await
            .into_inner();
        assert_eq!(res.status(), StatusCode::OK);

        let body = body::to_bytes(res.into_body()).await.unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.starts_with(' '));
        assert_eq!(text.trim_start(), "{\"clientToken\":\"t\"}");
    }

    #[actix_rt::test]
    async fn test_slow_task_error_is_appended() {
        let req = TestRequest::with_uri("/hulk/admin/v3/heal/b1").to_http_request();
        let task = async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Err(ApiError::HealAlreadyRunning.to())
        };
        let res = await_with_keep_alive(task, Duration::from_millis(50), &req)
            .await
            .into_inner();
        assert_eq!(res.status(), StatusCode::OK);

        let body = body::to_bytes(res.into_body()).await.unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        let err: ApiErrorResponse = serde_json::from_str(text.trim_start()).unwrap();
        assert_eq!(err.code, "XHulkHealAlreadyRunning");
        assert_eq!(err.resource, "/hulk/admin/v3/heal/b1");
    }
}
