mod common;

use common::{collect_until_closed, data_bytes, next_event, MockDevice, MockOpener, TICK};
use serialterm::dump::escape_text;
use serialterm::serial::{BridgeEvent, BridgeOptions, PortConfig, SerialBridge};
use std::time::{Duration, Instant};

fn start(device: &MockDevice) -> (SerialBridge, serialterm::serial::EventReceiver) {
    SerialBridge::start(
        PortConfig::new("/dev/ttyMOCK0", 9600),
        MockOpener::new(device.clone()),
        BridgeOptions::with_read_timeout(TICK),
    )
}

fn wait_for_writes(device: &MockDevice, count: usize, within: Duration) {
    let deadline = Instant::now() + within;
    while device.writes().len() < count {
        assert!(
            Instant::now() < deadline,
            "only {} of {} units written",
            device.writes().len(),
            count
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[tokio::test]
async fn echoed_hello_renders_as_text() {
    let device = MockDevice::echoing();
    let (bridge, mut rx) = start(&device);
    assert_eq!(next_event(&mut rx, Duration::from_secs(1)).await, BridgeEvent::Opened);

    bridge.send(b"hello".to_vec());
    match next_event(&mut rx, TICK * 2 + Duration::from_millis(500)).await {
        BridgeEvent::Data(bytes) => assert_eq!(escape_text(&bytes), "hello"),
        other => panic!("expected data, got {:?}", other),
    }
    bridge.stop();
    collect_until_closed(&mut rx, Duration::from_secs(1)).await;
}

#[tokio::test]
async fn units_are_written_in_send_order() {
    let device = MockDevice::new();
    let (bridge, mut rx) = start(&device);
    assert_eq!(next_event(&mut rx, Duration::from_secs(1)).await, BridgeEvent::Opened);

    let units: Vec<Vec<u8>> = (0..10).map(|i| format!("cmd{i}\n").into_bytes()).collect();
    for u in &units {
        bridge.send(u.clone());
    }
    bridge.send(Vec::new()); // empty units are not queued
    wait_for_writes(&device, units.len(), Duration::from_secs(5));
    bridge.stop();
    collect_until_closed(&mut rx, Duration::from_secs(1)).await;

    assert_eq!(device.writes(), units);
}

#[tokio::test]
async fn inbound_chunks_arrive_in_order_without_loss() {
    let device = MockDevice::new();
    let (bridge, mut rx) = start(&device);
    assert_eq!(next_event(&mut rx, Duration::from_secs(1)).await, BridgeEvent::Opened);

    let chunks: Vec<Vec<u8>> = vec![
        b"first ".to_vec(),
        vec![0x00, 0xFF, 0x7E, 0x7F],
        b"\r\nthird".to_vec(),
        (0u8..=255).collect(),
    ];
    for c in &chunks {
        device.push_inbound(c);
    }
    let expected: Vec<u8> = chunks.concat();

    // A read that started before the chunks landed may split the first one,
    // so only the byte stream is compared.
    let mut got = Vec::new();
    while got.len() < expected.len() {
        match next_event(&mut rx, Duration::from_secs(1)).await {
            BridgeEvent::Data(b) => {
                assert!(!b.is_empty());
                got.extend_from_slice(&b);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(got, expected);

    bridge.stop();
    let rest = collect_until_closed(&mut rx, Duration::from_secs(1)).await;
    assert!(data_bytes(&rest).is_empty());
}

#[tokio::test]
async fn concurrent_units_are_never_interleaved() {
    let device = MockDevice::new();
    let (bridge, mut rx) = start(&device);
    assert_eq!(next_event(&mut rx, Duration::from_secs(1)).await, BridgeEvent::Opened);

    const PER_THREAD: usize = 10;
    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..PER_THREAD {
                bridge.send(b"AAA".to_vec());
            }
        });
        s.spawn(|| {
            for _ in 0..PER_THREAD {
                bridge.send(b"BBB".to_vec());
            }
        });
    });
    wait_for_writes(&device, PER_THREAD * 2, Duration::from_secs(5));
    bridge.stop();
    collect_until_closed(&mut rx, Duration::from_secs(1)).await;

    let writes = device.writes();
    assert!(writes
        .iter()
        .all(|w| w.as_slice() == b"AAA" || w.as_slice() == b"BBB"));
    let flat = device.written_bytes();
    assert_eq!(flat.len(), PER_THREAD * 2 * 3);
    for run in flat.chunks(3) {
        assert!(run == b"AAA" || run == b"BBB", "interleaved run {:?}", run);
    }
    assert_eq!(writes.iter().filter(|w| w.as_slice() == b"AAA").count(), PER_THREAD);
}

#[tokio::test]
async fn reads_keep_flowing_while_writes_are_queued() {
    let device = MockDevice::echoing();
    let (bridge, mut rx) = start(&device);
    assert_eq!(next_event(&mut rx, Duration::from_secs(1)).await, BridgeEvent::Opened);

    for i in 0..5u8 {
        bridge.send(vec![b'0' + i]);
    }
    let mut echoed = Vec::new();
    while echoed.len() < 5 {
        if let BridgeEvent::Data(b) = next_event(&mut rx, Duration::from_secs(1)).await {
            echoed.extend(b);
        }
    }
    assert_eq!(echoed, b"01234");
    bridge.stop();
    collect_until_closed(&mut rx, Duration::from_secs(1)).await;
}
