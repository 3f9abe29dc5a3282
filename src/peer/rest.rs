use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures_util::StreamExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::*;
use crate::admin::{
    BgHealState, LogInfo, ProfileData, ProfilerType, ServerHealth, TraceInfo, TraceOpts,
};
use crate::errors::{ApiErrorResponse, TypedError};
use crate::lock::LockMap;
use crate::logger::ErrKind;
use crate::signals::ServiceSignal;

const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(15);

/// Peer client talking to the peer router of another node.
pub struct RestPeerClient {
    host: String,
    base: Url,
    client: reqwest::Client,
    token: Option<String>,
    timeout: Duration,
}

impl RestPeerClient {
    /// `host` is `host:port`, optionally with a scheme (`http` by default).
    pub fn new(host: &str, token: Option<String>) -> anyhow::Result<RestPeerClient> {
        let url = if host.contains("://") {
            host.to_owned()
        } else {
            format!("http://{}", host)
        };
        let base = Url::parse(&url)?.join(&format!("{}/", PEER_PATH_PREFIX))?;
        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_PEER_TIMEOUT)
            .build()?;
        Ok(RestPeerClient {
            host: host.to_owned(),
            base,
            client,
            token,
            timeout: DEFAULT_PEER_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> RestPeerClient {
        self.timeout = timeout;
        self
    }

    fn request(&self, method: Method, peer_method: &str) -> anyhow::Result<RequestBuilder> {
        let url = self.base.join(peer_method.trim_start_matches('/'))?;
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        Ok(req)
    }

    async fn call(&self, req: RequestBuilder) -> anyhow::Result<Response> {
        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(remote_error(resp).await)
    }

    async fn call_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> anyhow::Result<T> {
        let resp = self.call(req.timeout(self.timeout)).await?;
        Ok(resp.json().await?)
    }

    async fn stream<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        tx: mpsc::Sender<T>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let resp = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            resp = self.call(req) => resp?,
        };
        let mut body = resp.bytes_stream();
        let mut buf = BytesMut::new();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tx.closed() => return Ok(()),
                chunk = body.next() => chunk,
            };
            let chunk = match chunk {
                Some(chunk) => chunk?,
                None => return Ok(()),
            };
            buf.extend_from_slice(&chunk);
            for frame in decode_json_lines::<T>(&mut buf)? {
                // Same policy as the local broker, a full client queue drops.
                let _ = tx.try_send(frame);
            }
        }
    }
}

async fn remote_error(resp: Response) -> anyhow::Error {
    let status = resp.status();
    match resp.json::<ApiErrorResponse>().await {
        Ok(err) => TypedError::RemoteApi {
            code: err.code,
            message: err.message,
        }
        .into(),
        Err(_) if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
            TypedError::AccessDenied.into()
        }
        Err(_) => anyhow::anyhow!("peer replied with status {}", status),
    }
}

/// Splits complete newline terminated JSON frames off the front of `buf`.
/// Whitespace only lines are keep-alive filler and skipped.
pub fn decode_json_lines<T: DeserializeOwned>(buf: &mut BytesMut) -> anyhow::Result<Vec<T>> {
    let mut frames = Vec::new();
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let line = buf.split_to(pos + 1);
        let line = &line[..pos];
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        frames.push(serde_json::from_slice(line)?);
    }
    // Filler written between frames never ends with a newline.
    let filler = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
    buf.advance(filler);
    Ok(frames)
}

#[async_trait]
impl PeerClient for RestPeerClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn get_locks(&self) -> anyhow::Result<LockMap> {
        self.call_json(self.request(Method::GET, PEER_METHOD_GET_LOCKS)?)
            .await
    }

    async fn force_unlock(&self, paths: &[String]) -> anyhow::Result<()> {
        let req = self
            .request(Method::POST, PEER_METHOD_FORCE_UNLOCK)?
            .query(&[("paths", paths.join(","))])
            .timeout(self.timeout);
        self.call(req).await?;
        Ok(())
    }

    async fn background_heal_status(&self) -> anyhow::Result<BgHealState> {
        self.call_json(self.request(Method::GET, PEER_METHOD_BACKGROUND_HEAL_STATUS)?)
            .await
    }

    async fn signal_service(&self, sig: ServiceSignal) -> anyhow::Result<()> {
        let req = self
            .request(Method::POST, PEER_METHOD_SIGNAL_SERVICE)?
            .query(&[("signal", sig.to_string())])
            .timeout(self.timeout);
        self.call(req).await?;
        Ok(())
    }

    async fn start_profiling(&self, profilers: &[ProfilerType]) -> anyhow::Result<()> {
        let kinds: Vec<String> = profilers.iter().map(|p| p.to_string()).collect();
        let req = self
            .request(Method::POST, PEER_METHOD_START_PROFILING)?
            .query(&[("profilerType", kinds.join(","))])
            .timeout(self.timeout);
        self.call(req).await?;
        Ok(())
    }

    async fn download_profiling(&self) -> anyhow::Result<Vec<ProfileData>> {
        self.call_json(self.request(Method::POST, PEER_METHOD_DOWNLOAD_PROFILING)?)
            .await
    }

    async fn server_health(&self) -> anyhow::Result<ServerHealth> {
        self.call_json(self.request(Method::GET, PEER_METHOD_SERVER_HEALTH)?)
            .await
    }

    async fn trace(
        &self,
        opts: &TraceOpts,
        tx: mpsc::Sender<TraceInfo>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let req = self
            .request(Method::GET, PEER_METHOD_TRACE)?
            .query(&opts.to_query());
        self.stream(req, tx, cancel).await
    }

    async fn console_log(
        &self,
        kind: ErrKind,
        tx: mpsc::Sender<LogInfo>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let req = self
            .request(Method::GET, PEER_METHOD_CONSOLE_LOG)?
            .query(&[("logType", kind.to_string())]);
        self.stream(req, tx, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::HealthInfo;

    #[test]
    fn test_decode_json_lines() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"  {\"version\":\"3\"}\n {\"vers");
        let frames: Vec<HealthInfo> = decode_json_lines(&mut buf).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].version, "3");
        assert_eq!(&buf[..], b"{\"vers");

        buf.extend_from_slice(b"ion\":\"4\"}\n   ");
        let frames: Vec<HealthInfo> = decode_json_lines(&mut buf).unwrap();
        assert_eq!(frames[0].version, "4");
        assert!(buf.is_empty());

        buf.extend_from_slice(b"not json\n");
        assert!(decode_json_lines::<HealthInfo>(&mut buf).is_err());
    }

    #[test]
    fn test_request_url() {
        let client = RestPeerClient::new("node2:9000", Some("secret".to_owned())).unwrap();
        let req = client
            .request(Method::GET, PEER_METHOD_GET_LOCKS)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(req.url().as_str(), "http://node2:9000/hulk/peer/v1/locks");
        assert_eq!(
            req.headers()["authorization"].to_str().unwrap(),
            "Bearer secret"
        );

        let client = RestPeerClient::new("https://node3:9000", None).unwrap();
        assert_eq!(client.host(), "https://node3:9000");
        assert_eq!(client.base.as_str(), "https://node3:9000/hulk/peer/v1/");
    }
}
