//! Integration tests: sender and receiver talking over loopback UDP,
//! plus hostile-input scenarios against a live receiver.

use std::time::Duration;

use bytes::Bytes;
use framecast_core::{
    ChunkHeader, FrameDecoder, FrameReceiver, FrameSender, FrameSink, JpegCodec, PixelFormat, PollOutcome,
    ProtocolLimits, QualityConfig, RawFrame, ReassemblyConfig, ReceiverConfig, SenderConfig, TestPattern,
};
use tokio::net::UdpSocket;

// ── Helpers ──────────────────────────────────────────────────────

#[derive(Default)]
struct Collect(Vec<RawFrame>);

impl FrameSink for Collect {
    fn present(&mut self, frame: RawFrame) {
        self.0.push(frame);
    }
}

/// Hands back the reassembled bytes untouched.
struct Passthrough;

impl FrameDecoder for Passthrough {
    fn decode(&mut self, data: &[u8]) -> Result<RawFrame, framecast_core::CodecError> {
        Ok(RawFrame::new(data.len() as u32, 1, PixelFormat::Luma8, data.to_vec()))
    }
}

fn limits(max_chunk_size: usize) -> ProtocolLimits {
    ProtocolLimits {
        max_chunk_size,
        max_chunks: 100,
    }
}

async fn receiver(cfg: ReceiverConfig) -> FrameReceiver {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    FrameReceiver::new(socket, cfg).unwrap()
}

/// Poll until `n` non-idle outcomes have been collected.
async fn drain(rx: &mut FrameReceiver, sink: &mut Collect, n: usize) -> Vec<PollOutcome> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..(n * 10 + 20) {
        if out.len() == n {
            break;
        }
        let outcome = rx.poll_once(&mut Passthrough, sink).await.unwrap();
        if outcome != PollOutcome::Idle {
            out.push(outcome);
        }
    }
    out
}

// ── End to end ───────────────────────────────────────────────────

#[tokio::test]
async fn jpeg_stream_over_loopback() {
    let mut rx = receiver(ReceiverConfig {
        limits: limits(1200),
        poll_timeout: Duration::from_millis(20),
        ..Default::default()
    })
    .await;
    let rx_addr = rx.local_addr().unwrap();
    let stop_rx = rx.stop_handle();

    let recv_task = tokio::spawn(async move {
        let mut decoder = JpegCodec::new();
        let mut sink = Collect::default();
        let stats = rx.run(&mut decoder, &mut sink).await.unwrap();
        (sink, stats)
    });

    let tx_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut sender = FrameSender::new(
        tx_socket,
        rx_addr,
        SenderConfig {
            limits: limits(1200),
            target_fps: 60,
            ..Default::default()
        },
    )
    .unwrap();

    let mut source = TestPattern::new(160, 120).with_frame_limit(10);
    let mut encoder = JpegCodec::new();
    let sent = sender.run(&mut source, &mut encoder).await.unwrap();
    assert_eq!(sent.frames_sent, 10);
    assert!(sent.chunks_sent > 10, "frames should span several chunks");

    tokio::time::sleep(Duration::from_millis(200)).await;
    stop_rx.store(false, std::sync::atomic::Ordering::SeqCst);
    let (sink, stats) = tokio::time::timeout(Duration::from_secs(5), recv_task)
        .await
        .expect("receiver did not stop")
        .unwrap();

    assert!(!sink.0.is_empty(), "no frames delivered");
    assert_eq!(stats.malformed, 0);
    for frame in &sink.0 {
        assert_eq!((frame.width, frame.height), (160, 120));
        assert_eq!(frame.format, PixelFormat::Rgb8);
    }
    // Quality ramps up while sends succeed.
    assert_eq!(sender.quality(), QualityConfig::default().max_quality);
}

#[tokio::test]
async fn single_datagram_frames() {
    let mut rx = receiver(ReceiverConfig {
        poll_timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .await;
    let tx_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut sender = FrameSender::new(tx_socket, rx.local_addr().unwrap(), SenderConfig::default()).unwrap();

    for payload in [&b"first"[..], &b"second"[..]] {
        sender.send_frame(Bytes::copy_from_slice(payload)).await.unwrap();
    }

    let mut sink = Collect::default();
    let outcomes = drain(&mut rx, &mut sink, 2).await;
    assert_eq!(
        outcomes,
        vec![
            PollOutcome::Delivered { frame_id: 0, bytes: 5 },
            PollOutcome::Delivered { frame_id: 1, bytes: 6 },
        ]
    );
    assert_eq!(sink.0[1].data, b"second");
}

#[tokio::test]
async fn large_frame_spans_chunks() {
    let mut rx = receiver(ReceiverConfig {
        limits: limits(4000),
        poll_timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .await;
    let tx_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut sender = FrameSender::new(
        tx_socket,
        rx.local_addr().unwrap(),
        SenderConfig {
            limits: limits(4000),
            ..Default::default()
        },
    )
    .unwrap();

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    sender.send_frame(Bytes::from(payload.clone())).await.unwrap();
    // Payload bytes on both ends agree; headers are counted separately.
    assert_eq!(sender.stats().bytes_sent, 10_000);

    let mut sink = Collect::default();
    let outcomes = drain(&mut rx, &mut sink, 3).await;
    assert_eq!(outcomes[..2], [PollOutcome::Pending, PollOutcome::Pending]);
    assert_eq!(
        outcomes[2],
        PollOutcome::Delivered {
            frame_id: 0,
            bytes: 10_000
        }
    );
    assert_eq!(sink.0[0].data, payload);
}

// ── Hostile input ────────────────────────────────────────────────

#[tokio::test]
async fn chunk_zero_flood_stays_bounded() {
    let mut rx = receiver(ReceiverConfig {
        limits: limits(64),
        reassembly: ReassemblyConfig {
            max_pending_frames: 30,
            frame_ttl: None,
        },
        poll_timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .await;
    let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    tx.connect(rx.local_addr().unwrap()).await.unwrap();

    for id in 0..100u32 {
        let mut d = ChunkHeader::new(id, 0, 100).encode().to_vec();
        d.extend_from_slice(b"junk");
        tx.send(&d).await.unwrap();
    }

    let mut sink = Collect::default();
    let outcomes = drain(&mut rx, &mut sink, 100).await;
    assert!(outcomes.iter().all(|o| *o == PollOutcome::Pending));
    assert!(rx.table().len() <= 30);
    assert_eq!(
        rx.stats().evicted_capacity as usize + rx.table().len(),
        outcomes.len()
    );
}

#[tokio::test]
async fn invalid_headers_leave_table_empty() {
    let mut rx = receiver(ReceiverConfig {
        limits: limits(64),
        poll_timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .await;
    let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    tx.connect(rx.local_addr().unwrap()).await.unwrap();

    for (frame_id, index, total) in [(1, 0, 0), (2, 0, 101), (3, 0, u32::MAX), (4, 7, 3)] {
        let mut d = ChunkHeader::new(frame_id, index, total).encode().to_vec();
        d.push(0);
        tx.send(&d).await.unwrap();
    }

    let mut sink = Collect::default();
    let outcomes = drain(&mut rx, &mut sink, 4).await;
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| matches!(o, PollOutcome::Rejected(_))));
    assert!(rx.table().is_empty());
}
