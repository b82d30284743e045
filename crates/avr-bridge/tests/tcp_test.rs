//! Round trip over real localhost sockets.

use avr_bridge::mock::{MockDevice, RecordingSink};
use avr_bridge::{Bridge, BridgeOptions, TcpClientListener};
use avr_protocol::CommandFrame;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

type TcpBridge = Bridge<MockDevice, TcpClientListener, RecordingSink>;

/// Tick until `done` holds or the deadline passes.
fn tick_until(bridge: &mut TcpBridge, mut done: impl FnMut(&TcpBridge) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        bridge.tick().expect("tick should not fail");
        if done(bridge) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

fn setup() -> (TcpBridge, MockDevice, TcpStream) {
    let listener = TcpClientListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().unwrap();
    let device = MockDevice::new();
    let mut bridge = Bridge::new(
        device.clone(),
        listener,
        RecordingSink::new(),
        BridgeOptions::default(),
    )
    .unwrap();

    let client = TcpStream::connect(addr).expect("connect should succeed");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    assert!(
        tick_until(&mut bridge, |b| b.clients().len() == 1),
        "client was never accepted"
    );
    (bridge, device, client)
}

#[test]
fn test_mirror_over_tcp() {
    let (mut bridge, device, mut client) = setup();
    assert_eq!(bridge.clients().iter().next().unwrap().identifier(), "127.0.0.1");

    let payload = b"MPSEND\x32\xF0HELLO         \xF1VOL -12dB     \xF2";
    device.inject(payload);
    bridge.tick().unwrap();

    let mut received = vec![0u8; payload.len()];
    client.read_exact(&mut received).expect("mirror bytes should arrive");
    assert_eq!(&received[..], &payload[..]);
}

#[test]
fn test_command_over_tcp() {
    let (mut bridge, device, mut client) = setup();

    client.write_all(&[0x01, 0x02, 0x03, 0x04]).unwrap();
    assert!(
        tick_until(&mut bridge, |_| device.written().len() == 14),
        "command frame was never written"
    );
    let command = CommandFrame::decode(&device.written()).unwrap();
    assert_eq!(command.payload(), [0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn test_client_close_is_reaped() {
    let (mut bridge, _device, client) = setup();
    drop(client);
    assert!(
        tick_until(&mut bridge, |b| b.clients().is_empty()),
        "closed client was never removed"
    );
}
