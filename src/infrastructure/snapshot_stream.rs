// Chunked snapshot streaming over HTTP
use crate::application::filter_state::FilterState;
use crate::application::publisher::{SnapshotObserver, SnapshotPublisher, SubscriptionToken};
use crate::domain::snapshot::Snapshot;
use crate::infrastructure::http_response::brotli_compress;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Forwards snapshots into a bounded channel without ever blocking the
/// publisher. A full channel drops the snapshot for that client.
pub struct ChannelObserver {
    tx: mpsc::Sender<Arc<Snapshot>>,
}

impl SnapshotObserver for ChannelObserver {
    fn on_snapshot(&self, snapshot: &Arc<Snapshot>) -> anyhow::Result<()> {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                anyhow::bail!("stream client lagging, snapshot {} dropped", snapshot.sequence)
            }
            Err(TrySendError::Closed(_)) => anyhow::bail!("stream client disconnected"),
        }
    }
}

/// Unsubscribes its observer when dropped.
pub struct Subscription {
    publisher: Arc<SnapshotPublisher>,
    token: SubscriptionToken,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.publisher.unsubscribe(self.token);
    }
}

pub fn subscribe_channel(
    publisher: &Arc<SnapshotPublisher>,
    buffer: usize,
) -> (Subscription, mpsc::Receiver<Arc<Snapshot>>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let token = publisher.subscribe(Arc::new(ChannelObserver { tx }));
    let subscription = Subscription {
        publisher: publisher.clone(),
        token,
    };
    (subscription, rx)
}

/// Encode one message as a 4-byte big-endian length followed by the
/// (optionally Brotli-compressed) JSON payload.
pub async fn serialize_chunk<T: Serialize>(msg: &T, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(msg).map_err(std::io::Error::other)?;

    let payload = if compress {
        brotli_compress(json).await?
    } else {
        json
    };

    let length = payload.len() as u32;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

enum StreamEvent {
    Published(Arc<Snapshot>),
    FiltersChanged,
}

/// Stream the latest snapshot, then every new one, each rendered through
/// the filter selection active at delivery time. A filter change re-sends
/// the latest snapshot under the new selection.
pub fn snapshot_stream(
    publisher: Arc<SnapshotPublisher>,
    filters: Arc<FilterState>,
    buffer: usize,
    compress: bool,
) -> impl IntoResponse {
    let (subscription, mut rx) = subscribe_channel(&publisher, buffer);
    let mut filter_rx = filters.subscribe();
    tracing::debug!(
        "Stream client connected ({} observers)",
        publisher.subscriber_count()
    );

    let views = async_stream::stream! {
        let _subscription = subscription;
        // Read on first poll; anything published since subscribing is
        // either this snapshot or queued behind it
        let mut current = publisher.latest_snapshot();
        if let Some(snapshot) = &current {
            let selection = *filter_rx.borrow_and_update();
            yield snapshot.view(selection);
        }

        loop {
            let event = tokio::select! {
                received = rx.recv() => received.map(StreamEvent::Published),
                changed = filter_rx.changed() => changed.ok().map(|_| StreamEvent::FiltersChanged),
            };
            let selection = *filter_rx.borrow_and_update();

            match event {
                Some(StreamEvent::Published(snapshot)) => {
                    if current.as_ref().is_some_and(|c| snapshot.sequence <= c.sequence) {
                        continue;
                    }
                    yield snapshot.view(selection);
                    current = Some(snapshot);
                }
                Some(StreamEvent::FiltersChanged) => {
                    if let Some(snapshot) = &current {
                        yield snapshot.view(selection);
                    }
                }
                None => break,
            }
        }
    };

    let byte_stream = views.then(move |view| async move { serialize_chunk(&view, compress).await });

    // Chunks are compressed individually, so no Content-Encoding header
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-snapshot-stream")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::FilterRequest;
    use chrono::Utc;
    use futures::Stream;

    fn snapshot(sequence: u64) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(sequence, Utc::now(), Vec::new(), Vec::new()))
    }

    #[tokio::test]
    async fn test_serialize_chunk_prefixes_length() {
        let chunk = serialize_chunk(&serde_json::json!({"a": 1}), false).await.unwrap();
        let length = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
        assert_eq!(length, chunk.len() - 4);
        assert_eq!(&chunk[4..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_channel_observer_forwards_and_unsubscribes_on_drop() {
        let publisher = Arc::new(SnapshotPublisher::new());
        let (subscription, mut rx) = subscribe_channel(&publisher, 4);
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish(snapshot(1));
        assert_eq!(rx.recv().await.unwrap().sequence, 1);

        drop(subscription);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    /// Pull the next length-prefixed frame off the body as JSON.
    async fn next_frame<S>(body: &mut S, pending: &mut BytesMut) -> serde_json::Value
    where
        S: Stream<Item = Result<Bytes, axum::Error>> + Unpin,
    {
        loop {
            if pending.len() >= 4 {
                let length =
                    u32::from_be_bytes([pending[0], pending[1], pending[2], pending[3]]) as usize;
                if pending.len() >= 4 + length {
                    let frame = pending.split_to(4 + length);
                    return serde_json::from_slice(&frame[4..]).unwrap();
                }
            }
            let chunk = body.next().await.unwrap().unwrap();
            pending.extend_from_slice(&chunk);
        }
    }

    #[tokio::test]
    async fn test_stream_sends_latest_then_new_snapshots_once() {
        let publisher = Arc::new(SnapshotPublisher::new());
        let filters = Arc::new(FilterState::default());

        let response = snapshot_stream(publisher.clone(), filters.clone(), 4, false).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-snapshot-stream"
        );
        assert_eq!(publisher.subscriber_count(), 1);

        // Published after subscribing, so it is both latest and queued
        publisher.publish(snapshot(1));

        let mut body = response.into_body().into_data_stream();
        let mut pending = BytesMut::new();
        let first = next_frame(&mut body, &mut pending).await;
        assert_eq!(first["sequence"], 1);
        assert_eq!(first["filters"]["category"], "all");

        publisher.publish(snapshot(2));
        let second = next_frame(&mut body, &mut pending).await;
        assert_eq!(second["sequence"], 2);

        filters.set(&FilterRequest::new("24h", "sales", "europe")).unwrap();
        let refiltered = next_frame(&mut body, &mut pending).await;
        assert_eq!(refiltered["sequence"], 2);
        assert_eq!(refiltered["filters"]["category"], "sales");
        assert_eq!(refiltered["filters"]["region"], "europe");

        drop(body);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let observer = ChannelObserver { tx };

        observer.on_snapshot(&snapshot(1)).unwrap();
        assert!(observer.on_snapshot(&snapshot(2)).is_err());
        assert_eq!(rx.try_recv().unwrap().sequence, 1);

        drop(rx);
        assert!(observer.on_snapshot(&snapshot(3)).is_err());
    }
}
