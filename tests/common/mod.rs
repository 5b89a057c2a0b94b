#![allow(dead_code)]

pub mod http;

use futures::{SinkExt, StreamExt};
use popnet_harness::network::codec::FrameCodec;
use popnet_harness::network::message::{BlockHeader, Heartbeat};
use popnet_harness::network::{build_message, event, Event};
use popnet_harness::PeerConfig;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};

/// The node side of a peer connection.
pub struct MockPeer {
    pub reader: FramedRead<OwnedReadHalf, FrameCodec>,
    pub writer: FramedWrite<OwnedWriteHalf, FrameCodec>,
}

impl MockPeer {
    pub fn new(stream: TcpStream) -> Self {
        let (r, w) = stream.into_split();
        Self {
            reader: FramedRead::new(r, FrameCodec::default()),
            writer: FramedWrite::new(w, FrameCodec::default()),
        }
    }

    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("no client connected")
            .unwrap();
        Self::new(stream)
    }

    pub async fn recv(&mut self) -> Event {
        let frame = tokio::time::timeout(Duration::from_secs(5), self.reader.next())
            .await
            .expect("no frame from client")
            .expect("client closed the stream")
            .unwrap();
        Event::from_frame("client", &frame).unwrap()
    }

    pub async fn send(&mut self, event: &Event) {
        self.writer.send(event.to_frame()).await.unwrap();
    }

    /// Write bytes that bypass the codec.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        use tokio::io::AsyncWriteExt;
        self.writer.get_mut().write_all(bytes).await.unwrap();
    }
}

pub async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

pub fn test_config() -> PeerConfig {
    PeerConfig {
        connect_attempts: 2,
        connect_retry_delay_ms: 20,
        connect_timeout_ms: 1_000,
        frame_read_timeout_ms: 1_000,
        ..PeerConfig::default()
    }
}

pub fn heartbeat(id: impl Into<String>) -> Event {
    build_message(id, false, event::Results::Heartbeat(Heartbeat { block: None }))
}

pub fn advertise_blocks(id: impl Into<String>) -> Event {
    let header = BlockHeader { header: vec![0u8; 64], hash: vec![1u8; 24] };
    build_message(
        id,
        false,
        event::Results::AdvertiseBlocks(popnet_harness::network::message::AdvertiseBlocks {
            headers: vec![header],
        }),
    )
}
