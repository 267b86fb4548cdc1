//! Broadcaster delivery tests
//!
//! Ordering of `connected` vs `updated`, fan-out to several subscribers, and
//! the bounds on coalesced notifications.

use std::time::Duration;

use imgcast_core::{
    Broadcaster,
    broadcaster::{CONNECTED_FRAME, UPDATED_FRAME},
};
use tokio::io::{AsyncReadExt, DuplexStream, duplex};

/// Read everything that arrives until the stream stays quiet for `quiet`.
async fn drain(reader: &mut DuplexStream, quiet: Duration) -> String {
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    while let Ok(Ok(n)) = tokio::time::timeout(quiet, reader.read(&mut buf)).await {
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    String::from_utf8(out).unwrap()
}

fn count_updates(stream: &str) -> usize {
    stream.matches(std::str::from_utf8(UPDATED_FRAME).unwrap()).count()
}

#[tokio::test]
async fn connected_precedes_updates() {
    let broadcaster = Broadcaster::new("demo");
    let (writer, mut reader) = duplex(4096);

    broadcaster.add_subscriber(writer).await.unwrap();
    broadcaster.notify();

    let stream = drain(&mut reader, Duration::from_millis(200)).await;
    let connected = std::str::from_utf8(CONNECTED_FRAME).unwrap();
    assert!(stream.starts_with(connected), "got {stream:?}");
    assert_eq!(count_updates(&stream), 1);
}

#[tokio::test]
async fn every_subscriber_gets_the_update() {
    let broadcaster = Broadcaster::new("demo");
    let mut readers = Vec::new();
    for _ in 0..5 {
        let (writer, reader) = duplex(4096);
        broadcaster.add_subscriber(writer).await.unwrap();
        readers.push(reader);
    }
    assert_eq!(broadcaster.subscriber_count().await, 5);

    broadcaster.notify();

    for reader in &mut readers {
        let stream = drain(reader, Duration::from_millis(200)).await;
        assert_eq!(count_updates(&stream), 1);
    }
}

#[tokio::test]
async fn rapid_notifications_coalesce_within_bounds() {
    for n in [1usize, 3, 10, 25] {
        let broadcaster = Broadcaster::new("demo");
        let (writer, mut reader) = duplex(64 * 1024);
        broadcaster.add_subscriber(writer).await.unwrap();

        for _ in 0..n {
            broadcaster.notify();
        }

        let updates = count_updates(&drain(&mut reader, Duration::from_millis(200)).await);
        assert!((1..=n).contains(&updates), "{n} notifications produced {updates} updates");
    }
}

#[tokio::test]
async fn removed_subscriber_stops_receiving() {
    let broadcaster = Broadcaster::new("demo");
    let (writer, mut reader) = duplex(4096);

    let id = broadcaster.add_subscriber(writer).await.unwrap();
    broadcaster.remove_subscriber(id).await;
    broadcaster.notify();

    // The sink was dropped on removal: `connected`, then EOF
    let stream = drain(&mut reader, Duration::from_millis(200)).await;
    assert_eq!(stream.as_bytes(), CONNECTED_FRAME);
}

#[tokio::test]
async fn late_subscriber_misses_earlier_updates() {
    let broadcaster = Broadcaster::new("demo");
    broadcaster.notify();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (writer, mut reader) = duplex(4096);
    broadcaster.add_subscriber(writer).await.unwrap();

    let stream = drain(&mut reader, Duration::from_millis(200)).await;
    assert_eq!(stream.as_bytes(), CONNECTED_FRAME);
}
