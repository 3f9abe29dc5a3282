use std::collections::BTreeMap;
use std::future::{ready, Future, Ready};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use actix_http::body::{BodySize, MessageBody};
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::Error;
use actix_web::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use actix_web::web::Bytes;
use actix_web::HttpMessage;
use futures_util::ready as ready_poll;

use crate::admin::{HttpTrace, TraceCallStats, TraceInfo, TraceRequestInfo, TraceResponseInfo};
use crate::globals::Globals;
use crate::http::{
    HttpApiStatsGuard, HttpStats, RequestExtensions, RequestExtensionsContext, AMZ_REQUEST_ID,
};
use crate::pubsub::PubSub;
use crate::utils;

/// Tags each request with a request id, counts it in the HTTP stats and
/// publishes an HTTP trace once the response body is written.
#[derive(Clone)]
pub struct Trace {
    node_name: String,
    trace: PubSub<TraceInfo>,
    stats: Arc<HttpStats>,
}

impl Trace {
    pub fn new(globals: &Globals) -> Self {
        Trace {
            node_name: globals.node_name.clone(),
            trace: globals.trace.clone(),
            stats: globals.http_stats.clone(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody,
{
    type Response = ServiceResponse<RecordResponseBody<B>>;
    type Error = Error;
    type Transform = TraceMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceMiddleware {
            service,
            node_name: self.node_name.clone(),
            trace: self.trace.clone(),
            stats: self.stats.clone(),
        }))
    }
}

pub struct TraceMiddleware<S> {
    service: S,
    node_name: String,
    trace: PubSub<TraceInfo>,
    stats: Arc<HttpStats>,
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody,
{
    type Response = ServiceResponse<RecordResponseBody<B>>;
    type Error = Error;
    type Future = RecordResponse<S, B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ctx = RequestExtensions::new();
        let request_id = ctx.request_id.clone();
        req.extensions_mut().insert(ctx);

        let api = req.match_pattern().unwrap_or_else(|| req.path().to_owned());
        let stats_guard = self.stats.inc_guard(&api);
        let bytes_read = content_length(req.headers());
        self.stats.add_bytes_received(bytes_read as u64);

        let req_info = if self.trace.subscribers_num() > 0 {
            Some(TraceRequestInfo {
                time: utils::now(),
                proto: format!("{:?}", req.version()),
                method: req.method().to_string(),
                path: req.path().to_owned(),
                raw_query: req.query_string().to_owned(),
                headers: header_map(req.headers()),
                body: "".to_owned(),
                client: req
                    .connection_info()
                    .realip_remote_addr()
                    .unwrap_or_default()
                    .to_owned(),
            })
        } else {
            None
        };

        RecordResponse {
            fut: self.service.call(req),
            inner: Some(RecordResponseInner {
                request_id,
                stats_guard,
                bytes_read,
                req_info,
                node_name: self.node_name.clone(),
                trace: self.trace.clone(),
                stats: self.stats.clone(),
                start: Instant::now(),
            }),
            _phantom: PhantomData,
        }
    }
}

#[pin_project::pin_project]
pub struct RecordResponse<S, B>
where
    S: Service<ServiceRequest>,
{
    #[pin]
    fut: S::Future,
    inner: Option<RecordResponseInner>,
    _phantom: PhantomData<B>,
}

struct RecordResponseInner {
    request_id: String,
    stats_guard: HttpApiStatsGuard,
    bytes_read: usize,
    req_info: Option<TraceRequestInfo>,
    node_name: String,
    trace: PubSub<TraceInfo>,
    stats: Arc<HttpStats>,
    start: Instant,
}

impl<S, B> Future for RecordResponse<S, B>
where
    B: MessageBody,
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Output = Result<ServiceResponse<RecordResponseBody<B>>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut res = ready_poll!(this.fut.poll(cx))?;

        let inner = match this.inner.take() {
            Some(inner) => inner,
            None => {
                return Poll::Ready(Ok(
                    res.map_body(|_, body| RecordResponseBody { body, inner: None })
                ))
            }
        };

        let RecordResponseInner {
            request_id,
            stats_guard,
            bytes_read,
            req_info,
            node_name,
            trace,
            stats,
            start,
        } = inner;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            res.headers_mut()
                .insert(HeaderName::from_static(AMZ_REQUEST_ID), value);
        }
        let status_code = res.status();
        stats.update_stats(stats_guard.api(), status_code);

        let pending = req_info.map(|req_info| {
            let fn_name = res
                .request()
                .ctx()
                .handler_fn_name
                .unwrap_or("unknown")
                .to_owned();
            HttpTrace {
                node_name,
                fn_name,
                time: utils::now(),
                req_info,
                resp_info: TraceResponseInfo {
                    time: utils::now(),
                    headers: header_map(res.headers()),
                    body: "".to_owned(),
                    status_code: status_code.as_u16(),
                },
                call_stats: TraceCallStats {
                    input_bytes: bytes_read,
                    ..Default::default()
                },
            }
        });

        let body_inner = RecordResponseBodyInner {
            stats_guard,
            stats,
            trace,
            pending,
            start,
            bytes_written: 0,
            time_to_first_byte: None,
        };
        Poll::Ready(Ok(res.map_body(move |_, body| RecordResponseBody {
            body,
            inner: Some(body_inner),
        })))
    }
}

#[pin_project::pin_project]
pub struct RecordResponseBody<B> {
    #[pin]
    body: B,
    inner: Option<RecordResponseBodyInner>,
}

struct RecordResponseBodyInner {
    // Keeps the request counted as in flight while the body streams.
    #[allow(dead_code)]
    stats_guard: HttpApiStatsGuard,
    stats: Arc<HttpStats>,
    trace: PubSub<TraceInfo>,
    pending: Option<HttpTrace>,
    start: Instant,
    bytes_written: usize,
    time_to_first_byte: Option<Duration>,
}

impl<B: MessageBody> MessageBody for RecordResponseBody<B> {
    type Error = B::Error;

    fn size(&self) -> BodySize {
        self.body.size()
    }

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Bytes, Self::Error>>> {
        let this = self.project();
        let next = ready_poll!(this.body.poll_next(cx));

        let inner = match this.inner.as_mut() {
            Some(inner) => inner,
            None => return Poll::Ready(next),
        };
        match &next {
            Some(Ok(chunk)) => {
                inner.bytes_written += chunk.len();
                inner.stats.add_bytes_sent(chunk.len() as u64);
                if inner.time_to_first_byte.is_none() {
                    inner.time_to_first_byte = Some(inner.start.elapsed());
                }
            }
            Some(Err(_)) => {}
            None => inner.publish(),
        }
        Poll::Ready(next)
    }
}

impl RecordResponseBodyInner {
    fn publish(&mut self) {
        if let Some(mut trace) = self.pending.take() {
            trace.resp_info.time = utils::now();
            trace.call_stats.latency = self.start.elapsed();
            trace.call_stats.output_bytes = self.bytes_written;
            trace.call_stats.time_to_first_byte = self.time_to_first_byte.unwrap_or_default();
            self.trace.publish(TraceInfo::Http(trace));
        }
    }
}

// Empty bodies are never polled, and clients may go away mid-stream.
impl Drop for RecordResponseBodyInner {
    fn drop(&mut self) {
        self.publish();
    }
}

fn content_length(headers: &HeaderMap) -> usize {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use actix_web::{test, web, App, HttpRequest, HttpResponse};
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::Config;

    async fn ping(req: HttpRequest) -> HttpResponse {
        req.set_handler_fn_name("Ping");
        HttpResponse::Ok().body("pong")
    }

    #[actix_rt::test]
    async fn test_trace_publishes_http_trace() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let globals = Globals::new(Config::default(), tx);
        let (_sub, mut traces) = globals
            .trace
            .subscribe_channel(8, Box::new(|_: &TraceInfo| true));

        let app = test::init_service(
            App::new()
                .wrap(Trace::new(&globals))
                .route("/hulk/admin/v3/ping", web::get().to(ping)),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/hulk/admin/v3/ping?x=1")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert!(res.headers().contains_key(AMZ_REQUEST_ID));
        let body = test::read_body(res).await;
        assert_eq!(&body[..], b"pong");

        let trace = match traces.recv().await.unwrap() {
            TraceInfo::Http(trace) => trace,
            other => panic!("unexpected trace {:?}", other),
        };
        assert_eq!(trace.fn_name, "Ping");
        assert_eq!(trace.req_info.raw_query, "x=1");
        assert_eq!(trace.resp_info.status_code, 200);
        assert_eq!(trace.call_stats.output_bytes, 4);

        let stats = globals.http_stats.snapshot();
        assert_eq!(stats.total_requests["/hulk/admin/v3/ping"], 1);
        assert_eq!(stats.current_requests["/hulk/admin/v3/ping"], 0);
        assert_eq!(stats.total_bytes_sent, 4);
    }
}
