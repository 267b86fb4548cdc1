//! Server-sent event response bodies.
//!
//! The broadcaster writes frames into one end of an in-memory pipe; the
//! response body reads the other end. When the client goes away hyper drops
//! the body, and the dropped [`EventStream`] deregisters its subscriber.

use std::{
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use imgcast_core::{Room, SubscriberId};
use tokio::io::{AsyncRead, DuplexStream, ReadBuf};

/// Pipe capacity between the broadcaster and one response body.
pub const PIPE_CAPACITY: usize = 4096;

/// Byte stream of one subscriber's event frames.
pub struct EventStream {
    reader: DuplexStream,
    buf: Box<[u8]>,
    subscription: Subscription,
}

impl EventStream {
    /// Create the pipe, register its writer with the room's broadcaster and
    /// return the reading end.
    ///
    /// Fails if the `connected` frame cannot be written.
    pub async fn subscribe(room: Arc<Room>) -> io::Result<Self> {
        let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        let id = room.broadcaster().add_subscriber(writer).await?;

        Ok(Self {
            reader,
            buf: vec![0u8; PIPE_CAPACITY].into_boxed_slice(),
            subscription: Subscription { room, id },
        })
    }

    /// Handle of the registered subscriber.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscription.id
    }
}

impl Stream for EventStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut buf = ReadBuf::new(&mut this.buf);

        match Pin::new(&mut this.reader).poll_read(cx, &mut buf) {
            Poll::Ready(Ok(())) if buf.filled().is_empty() => Poll::Ready(None),
            Poll::Ready(Ok(())) => Poll::Ready(Some(Ok(Bytes::copy_from_slice(buf.filled())))),
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Removes the subscriber from its room when dropped.
struct Subscription {
    room: Arc<Room>,
    id: SubscriberId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let room = Arc::clone(&self.room);
        let id = self.id;

        // Outside a runtime the next fan-out pass fails the write and drops it
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                room.broadcaster().remove_subscriber(id).await;
                tracing::debug!(room = %room.name(), subscriber = %id, "event stream closed");
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use imgcast_core::{CredentialStore, HtpasswdFile, ImageStore, RoomRegistry, broadcaster, htpasswd_factory};

    use super::*;

    fn room(dir: &std::path::Path) -> Arc<Room> {
        let images = ImageStore::new(dir);
        images.ensure_base_dir().unwrap();
        let admin = HtpasswdFile::with_cost(images.admin_credentials_path(), 4);
        admin.create_with_user("admin", "pw1").unwrap();

        let registry = RoomRegistry::with_credentials(images, Arc::new(admin), htpasswd_factory(4));
        registry.create("demo", "admin", "pw1").unwrap()
    }

    async fn next_chunk(stream: &mut EventStream) -> Bytes {
        tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("chunk within timeout")
            .expect("stream still open")
            .unwrap()
    }

    #[tokio::test]
    async fn yields_connected_then_updated() {
        let dir = tempfile::tempdir().unwrap();
        let room = room(dir.path());

        let mut stream = EventStream::subscribe(Arc::clone(&room)).await.unwrap();
        assert_eq!(&next_chunk(&mut stream).await[..], broadcaster::CONNECTED_FRAME);

        room.broadcaster().notify();
        assert_eq!(&next_chunk(&mut stream).await[..], broadcaster::UPDATED_FRAME);
    }

    #[tokio::test]
    async fn drop_deregisters_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        let room = room(dir.path());

        let stream = EventStream::subscribe(Arc::clone(&room)).await.unwrap();
        assert_eq!(room.broadcaster().subscriber_count().await, 1);

        drop(stream);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(room.broadcaster().subscriber_count().await, 0);
    }
}
