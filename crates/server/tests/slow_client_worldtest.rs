//! Backpressure: a client that stops draining its transmit queue is
//! dropped rather than allowed to stall the shard.

use chunkwright_core::ChunkPos;
use chunkwright_server::{
    ChunkActor, DropReason, EntityIds, PlayerHandle, PlayerMessage,
};
use chunkwright_world::{BlockRegistry, ChunkSource, FlatGenerator};
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFS: &str = r#"{
    "0": {"Name": "air", "Opacity": 0, "Destructable": false, "Solid": false,
          "Replaceable": true, "Attachable": false, "Aspect": "Void", "AspectArgs": {}},
    "3": {"Name": "dirt", "Aspect": "Standard",
          "AspectArgs": {"DroppedItems": [{"DroppedItem": 3, "Count": 1}]}}
}"#;

#[tokio::test]
async fn the_129th_frame_drops_the_connection() {
    // The default transmit queue: 128 frames.
    let (frames_tx, mut frames_rx) = mpsc::channel::<Vec<u8>>(128);
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let handle = PlayerHandle::new(1, frames_tx, control_tx);

    for i in 0..128u32 {
        handle.transmit(i.to_be_bytes().to_vec());
    }
    assert!(
        control_rx.try_recv().is_err(),
        "128 frames fit without complaint"
    );

    handle.transmit(vec![0xff]);
    match control_rx.try_recv().unwrap() {
        PlayerMessage::Drop { reason } => assert_eq!(reason, DropReason::SlowClient),
        other => panic!("expected drop, got {other:?}"),
    }

    // The queued frames are intact; the overflow frame was discarded.
    let mut queued = 0;
    while frames_rx.try_recv().is_ok() {
        queued += 1;
    }
    assert_eq!(queued, 128);
}

#[tokio::test]
async fn overflow_during_multicast_releases_the_subscriber() {
    let registry = Arc::new(BlockRegistry::load_from_str(DEFS).unwrap());
    let data = FlatGenerator::new(3, 64).generate(ChunkPos::new(0, 0));
    let mut chunk = ChunkActor::new(ChunkPos::new(0, 0), data, registry, EntityIds::new());

    // A queue so small the subscription snapshot already fills it.
    let (frames_tx, _frames_rx) = mpsc::channel::<Vec<u8>>(1);
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let handle = PlayerHandle::new(9, frames_tx, control_tx);

    chunk.subscribe(handle);
    match control_rx.try_recv().unwrap() {
        PlayerMessage::Drop {
            reason: DropReason::SlowClient,
        } => {}
        other => panic!("expected slow-client drop, got {other:?}"),
    }

    // The session reacts by disconnecting, which releases the
    // subscription without an unload packet.
    chunk.disconnect(9);
    assert_eq!(chunk.subscriber_count(), 0);

    // Later broadcasts reach nobody and in particular never panic.
    chunk.multicast(None, &[0x00]);
    assert!(control_rx.try_recv().is_err());
}
