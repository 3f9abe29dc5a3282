use std::convert::Infallible;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::errors::{ApiError, ApiErrorResponse, GenericApiError};

/// Written on an idle stream so proxies keep the connection open.
pub const KEEP_ALIVE_FILLER: &[u8] = b" ";

const OUTPUT_BUFFER: usize = 16;

/// Encodes one complete frame: the JSON document and a newline.
pub fn encode_frame<T: Serialize + ?Sized>(item: &T) -> serde_json::Result<Bytes> {
    let mut buf = BytesMut::new().writer();
    serde_json::to_writer(&mut buf, item)?;
    let mut buf = buf.into_inner();
    buf.put_u8(b'\n');
    Ok(buf.freeze())
}

/// Terminal frame written once a stream can no longer change its status.
pub fn error_frame(err: GenericApiError) -> Bytes {
    let res = ApiErrorResponse::from(err, "".to_owned(), "".to_owned(), "".to_owned());
    encode_frame(&res).unwrap_or_else(|_| Bytes::from_static(b"{}\n"))
}

/// Per-client stream: merges everything sent to one channel into JSON
/// frames and keeps the connection alive while nothing happens.
pub struct StreamSession {
    cancel: CancellationToken,
    keep_alive: Duration,
    deadline: Option<Duration>,
}

impl StreamSession {
    pub fn new(parent: &CancellationToken, keep_alive: Duration) -> StreamSession {
        StreamSession {
            cancel: parent.child_token(),
            keep_alive,
            deadline: None,
        }
    }

    /// Ends the stream once `deadline` elapsed, whatever the client does.
    pub fn with_deadline(mut self, deadline: Duration) -> StreamSession {
        self.deadline = Some(deadline);
        self
    }

    /// Token for the tasks feeding this session; cancelled when the session
    /// ends for any reason.
    pub fn token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Starts pumping `rx` into the returned body stream. `guard` (usually the
    /// local subscription) lives until the session ends.
    pub fn run<T, G>(
        self,
        rx: mpsc::Receiver<T>,
        guard: G,
    ) -> impl Stream<Item = Result<Bytes, Infallible>>
    where
        T: Serialize + Send + 'static,
        G: Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::channel(OUTPUT_BUFFER);
        tokio::spawn(pump(self, rx, out_tx, guard));
        ReceiverStream::new(out_rx).map(Ok)
    }
}

async fn pump<T, G>(session: StreamSession, mut rx: mpsc::Receiver<T>, out: mpsc::Sender<Bytes>, guard: G)
where
    T: Serialize,
{
    let _guard = guard;

    let mut ticker = tokio::time::interval(session.keep_alive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let has_deadline = session.deadline.is_some();
    let deadline = tokio::time::sleep(session.deadline.unwrap_or_default());
    tokio::pin!(deadline);

    let mut emitted = false;
    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => break,
            _ = &mut deadline, if has_deadline => break,
            // Client went away.
            _ = out.closed() => break,
            item = rx.recv() => {
                let item = match item {
                    Some(item) => item,
                    None => break,
                };
                let frame = match encode_frame(&item) {
                    Ok(frame) => frame,
                    Err(err) => {
                        let err = ApiError::InternalError.to_with_err(&err.to_string());
                        let _ = out.send(error_frame(err)).await;
                        break;
                    }
                };
                if out.send(frame).await.is_err() {
                    break;
                }
                emitted = true;
            }
            _ = ticker.tick() => {
                if !emitted && out.send(Bytes::from_static(KEEP_ALIVE_FILLER)).await.is_err() {
                    break;
                }
                emitted = false;
            }
        }
    }

    session.cancel.cancel();
}

#[cfg(test)]
mod tests {
    use serde::ser::Error as _;
    use serde::Serializer;
    use tokio::time::timeout;

    use super::*;
    use crate::pubsub::PubSub;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot encode"))
        }
    }

    #[tokio::test]
    async fn test_frames_and_filler() {
        let session = StreamSession::new(&CancellationToken::new(), Duration::from_millis(30));
        let (tx, rx) = mpsc::channel(4);
        let mut out = Box::pin(session.run(rx, ()));

        tx.send(serde_json::json!({ "a": 1 })).await.unwrap();
        let frame = timeout(Duration::from_secs(1), out.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(&frame[..], b"{\"a\":1}\n");

        // Nothing more is sent, so only filler follows.
        for _ in 0..2 {
            let frame = timeout(Duration::from_secs(1), out.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            assert_eq!(&frame[..], KEEP_ALIVE_FILLER);
        }
    }

    #[tokio::test]
    async fn test_deadline_ends_stream() {
        let session = StreamSession::new(&CancellationToken::new(), Duration::from_secs(5))
            .with_deadline(Duration::from_millis(50));
        let token = session.token();
        let (_tx, rx) = mpsc::channel::<u32>(4);
        let mut out = Box::pin(session.run(rx, ()));

        let end = timeout(Duration::from_secs(2), out.next()).await.unwrap();
        assert!(end.is_none());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_client_disconnect_cancels_and_unsubscribes() {
        let hub: PubSub<u32> = PubSub::new();
        let (sub, rx) = hub.subscribe_channel(4, Box::new(|_| true));
        let session = StreamSession::new(&CancellationToken::new(), Duration::from_millis(20));
        let token = session.token();
        let out = session.run(rx, sub);
        assert_eq!(hub.subscribers_num(), 1);

        drop(out);
        timeout(Duration::from_secs(2), token.cancelled())
            .await
            .unwrap();
        // Give the pump task a moment to drop its guard.
        for _ in 0..50 {
            if hub.subscribers_num() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hub.subscribers_num(), 0);
    }

    #[tokio::test]
    async fn test_encode_failure_writes_error_frame() {
        let session = StreamSession::new(&CancellationToken::new(), Duration::from_secs(5));
        let (tx, rx) = mpsc::channel(1);
        let mut out = Box::pin(session.run(rx, ()));
        tx.send(Unencodable).await.unwrap();

        let frame = timeout(Duration::from_secs(1), out.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let res: ApiErrorResponse = serde_json::from_slice(&frame).unwrap();
        assert_eq!(res.code, "InternalError");
        assert!(timeout(Duration::from_secs(1), out.next())
            .await
            .unwrap()
            .is_none());
    }
}
