use libctp::error::CtpError;
use libctp::physical::can::{CanConfig, CanLink, CanOptions};
use libctp::physical::loopback::Loopback;
use libctp::physical::LinkAdapter;
use libctp::transport::frame::{decode, LogicalFrame};
use libctp::transport::reassembly::{receive_until, Reassembler};
use libctp::transport::TransportLayer;
use libctp::types::{Port, RawFrame};
use libctp::{receive, receive_bytes, send, Ctp, CtpConfig, Mode};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Two ports sharing one simulated bus segment
#[derive(Clone, Default)]
struct SharedBus {
    frames: Arc<Mutex<VecDeque<RawFrame>>>,
}

impl Port for SharedBus {
    fn write(&mut self, frame: &RawFrame) -> libctp::error::Result<()> {
        self.frames.lock().unwrap().push_back(*frame);
        Ok(())
    }

    fn read(&mut self) -> libctp::error::Result<Option<RawFrame>> {
        Ok(self.frames.lock().unwrap().pop_front())
    }
}

fn open_can(bus: &SharedBus, options: CanOptions) -> CanLink<SharedBus> {
    let config = CanConfig {
        options,
        ..Default::default()
    };
    let mut link = CanLink::with_port(config, bus.clone());
    link.open().unwrap();
    link
}

#[test]
fn test_full_stack_classic_can() {
    let bus = SharedBus::default();
    let tester = open_can(&bus, CanOptions::NONE);
    let ecu = open_can(&bus, CanOptions::NONE);

    let mut client = Ctp::with_link(
        CtpConfig {
            tx_id: 0x7E0,
            rx_id: Some(0x7E8),
            timeout_ms: Some(100),
            ..Default::default()
        },
        tester,
    );
    let mut server = Ctp::with_link(
        CtpConfig {
            tx_id: 0x7E8,
            rx_id: Some(0x7E0),
            timeout_ms: Some(100),
            ..Default::default()
        },
        ecu,
    );
    client.open().unwrap();
    server.open().unwrap();

    let request = b"Hello World! This request spans several CAN frames.";
    assert_eq!(client.send(request).unwrap(), request.len());

    let mut buffer = [0u8; 128];
    let len = server.receive(&mut buffer).unwrap();
    assert_eq!(&buffer[..len], &request[..]);

    let response: Vec<u8> = request.iter().rev().copied().collect();
    server.send(&response).unwrap();
    let len = client.receive(&mut buffer).unwrap();
    assert_eq!(&buffer[..len], response.as_slice());
}

#[test]
fn test_full_stack_fd_multi_transfer() {
    let bus = SharedBus::default();
    let mut tx = open_can(&bus, CanOptions::FD);
    let mut rx = open_can(&bus, CanOptions::FD);

    let data: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(
        send(&mut tx, 0x18DA_10F1, &data, Mode::Extended).unwrap(),
        data.len()
    );

    let mut buffer = vec![0u8; data.len()];
    assert_eq!(
        receive_bytes(&mut rx, &mut buffer, data.len(), Mode::Extended).unwrap(),
        data.len()
    );
    assert_eq!(buffer, data);
}

#[test]
fn test_extended_frames_rejected_by_classic_controller() {
    let bus = SharedBus::default();
    let mut link = open_can(&bus, CanOptions::NONE);
    assert_eq!(
        send(&mut link, 0x100, &[0u8; 100], Mode::Extended),
        Err(CtpError::LinkTransmitFailure { id: 0x100 })
    );
}

#[test]
fn test_corrupted_sequence_via_hook() {
    // Rewrites the second CONSECUTIVE frame's sequence number
    let mut seen = 0;
    let mut link = Loopback::with_hook(Box::new(move |mut frame: RawFrame| {
        if frame.data[0] == 1 {
            seen += 1;
            if seen == 2 {
                frame.data[1] = 9;
            }
        }
        Some(frame)
    }));
    send(&mut link, 0x321, &[0x5A; 40], Mode::Classic).unwrap();

    let mut buffer = [0u8; 40];
    assert_eq!(
        receive(&mut link, &mut buffer, Mode::Classic),
        Err(CtpError::SequenceMismatch {
            expected: 1,
            actual: 9
        })
    );
}

#[test]
fn test_dropped_end_times_out() {
    let mut link = Loopback::with_hook(Box::new(|frame: RawFrame| {
        if frame.data[0] == 2 {
            None
        } else {
            Some(frame)
        }
    }));
    send(&mut link, 0x321, &[0x11; 20], Mode::Classic).unwrap();

    let mut reassembler = Reassembler::new(Mode::Classic, None);
    let mut buffer = [0u8; 20];
    let deadline = Instant::now() + Duration::from_millis(10);
    assert_eq!(
        receive_until(&mut link, &mut reassembler, &mut buffer, Some(deadline)),
        Err(CtpError::Timeout)
    );
    assert!(!reassembler.state().started);
}

fn payload(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max)
}

proptest! {
    #[test]
    fn classic_round_trip(data in payload(Mode::Classic.max_transfer_len())) {
        let mut link = Loopback::new();
        prop_assert_eq!(send(&mut link, 0x123, &data, Mode::Classic).unwrap(), data.len());
        let mut buffer = vec![0u8; Mode::Classic.max_transfer_len()];
        let len = receive(&mut link, &mut buffer, Mode::Classic).unwrap();
        prop_assert_eq!(&buffer[..len], data.as_slice());
        prop_assert_eq!(link.pending(), 0);
    }

    #[test]
    fn extended_round_trip(data in payload(Mode::Extended.max_transfer_len())) {
        let mut link = Loopback::new();
        send(&mut link, 0x123, &data, Mode::Extended).unwrap();
        let mut buffer = vec![0u8; data.len()];
        let len = receive(&mut link, &mut buffer, Mode::Extended).unwrap();
        prop_assert_eq!(len, data.len());
        prop_assert_eq!(buffer, data);
    }

    #[test]
    fn multi_transfer_round_trip(data in prop::collection::vec(any::<u8>(), 1..2000)) {
        let mut link = Loopback::new();
        send(&mut link, 0x42, &data, Mode::Classic).unwrap();
        let mut buffer = vec![0u8; data.len()];
        receive_bytes(&mut link, &mut buffer, data.len(), Mode::Classic).unwrap();
        prop_assert_eq!(buffer, data);
    }

    #[test]
    fn consecutive_sequences_restart_per_transfer(len in 1usize..1500) {
        let data = vec![0xA5u8; len];
        let mut link = Loopback::new();
        send(&mut link, 0x42, &data, Mode::Classic).unwrap();

        let mut expected = 0u8;
        while let Some(raw) = link.poll_receive() {
            match decode(&raw, Mode::Classic).unwrap() {
                LogicalFrame::Start { .. } => expected = 0,
                LogicalFrame::Consecutive { sequence, .. } => {
                    prop_assert_eq!(sequence, expected);
                    expected += 1;
                }
                _ => {}
            }
        }
    }
}
