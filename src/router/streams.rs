use tokio::sync::mpsc;

use crate::admin::{StreamSession, TraceOpts};
use crate::globals::{Globals, STREAM_KEEP_ALIVE_INTERVAL, STREAM_QUEUE_CAPACITY};
use crate::http::ApiResponse;
use crate::logger::ErrKind;

/// Streams the traces of this node matching `opts`, merged with those of
/// every peer when `with_peers`.
pub fn trace_stream(globals: &Globals, opts: TraceOpts, with_peers: bool) -> ApiResponse {
    let session = StreamSession::new(&globals.shutdown, STREAM_KEEP_ALIVE_INTERVAL);
    let (tx, rx) = mpsc::channel(STREAM_QUEUE_CAPACITY);
    if with_peers {
        globals
            .notification
            .spawn_trace(&opts, tx.clone(), &session.token());
    }
    let subscription = globals
        .trace
        .subscribe(tx, Box::new(move |entry| opts.must_trace(entry)));
    ApiResponse::streaming(session.run(rx, subscription))
}

/// Streams the console log of this node, starting with the last `limit`
/// buffered records, merged with the peers matching `node` when
/// `with_peers`.
pub fn console_stream(
    globals: &Globals,
    node: &str,
    limit: usize,
    kind: ErrKind,
    with_peers: bool,
) -> ApiResponse {
    let session = StreamSession::new(&globals.shutdown, STREAM_KEEP_ALIVE_INTERVAL);
    let (tx, rx) = backlog_channel(globals.console.replay(node, limit, kind));
    if with_peers {
        globals
            .notification
            .spawn_console_log(node, kind, tx.clone(), &session.token());
    }
    let subscription = globals.console.subscribe(tx, node, kind);
    ApiResponse::streaming(session.run(rx, subscription))
}

/// Channel preloaded with `backlog`, with room for it on top of the usual
/// queue so no replayed record is lost.
fn backlog_channel<T>(backlog: Vec<T>) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(STREAM_QUEUE_CAPACITY + backlog.len());
    for item in backlog {
        if tx.try_send(item).is_err() {
            break;
        }
    }
    (tx, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backlog_larger_than_queue() {
        let backlog: Vec<usize> = (0..STREAM_QUEUE_CAPACITY * 2 + 7).collect();
        let (tx, mut rx) = backlog_channel(backlog);
        assert!(tx.try_send(usize::MAX).is_ok());
        drop(tx);

        let mut received = Vec::new();
        while let Some(item) = rx.recv().await {
            received.push(item);
        }
        assert_eq!(received.len(), STREAM_QUEUE_CAPACITY * 2 + 8);
        assert_eq!(received[STREAM_QUEUE_CAPACITY * 2 + 6], STREAM_QUEUE_CAPACITY * 2 + 6);
        assert_eq!(received.last(), Some(&usize::MAX));
    }
}
