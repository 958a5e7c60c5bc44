//! Client transactor tests.
//!
//! Drives a real client against either a scripted peer (frames injected on
//! the far end of a loopback pair) or a live server pumped from inside the
//! client's radio poll, all on one thread.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use meterlink::command::{InfoResponse, InstantResponse, StatusResponse};
use meterlink::config::{ClientConfig, ServerConfig};
use meterlink::error::{ConfigError, Error, LinkError, TransactionError};
use meterlink::link::{Clock, LoopbackLink, RadioLink, SystemClock};
use meterlink::protocol::Packet;
use meterlink::types::{Address, EnergyType, Generation, ParameterGroup, Payload};
use meterlink::{Client, Server};

/// Deterministic clock advancing a fixed step on every read.
struct SteppingClock {
    now: Cell<u64>,
    step: u64,
}

impl SteppingClock {
    fn new(step: u64) -> Self {
        Self {
            now: Cell::new(0),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

/// Radio adapter that runs a server's poll loop before every client poll,
/// so a synchronous `send` sees its response without a second thread.
struct PumpedLink {
    inner: LoopbackLink,
    server: Rc<RefCell<Server<LoopbackLink, SystemClock>>>,
}

impl RadioLink for PumpedLink {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.inner.transmit(frame)
    }

    fn poll_frame(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        self.server.borrow_mut().poll();
        self.inner.poll_frame(buf)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

fn served_client(
    generation: Generation,
    server_addr: Address,
) -> (
    Client<PumpedLink, SystemClock>,
    Rc<RefCell<Server<LoopbackLink, SystemClock>>>,
) {
    let (client_link, server_link) = LoopbackLink::pair();
    let server = Server::new(
        server_link,
        SystemClock::new(),
        ServerConfig {
            address: server_addr,
            status: 0,
            generation,
            poll_timeout: Duration::ZERO,
        },
    );
    let server = Rc::new(RefCell::new(server));
    let client = Client::new(
        PumpedLink {
            inner: client_link,
            server: Rc::clone(&server),
        },
        SystemClock::new(),
    );
    (client, server)
}

// ============================================================================
// Full exchanges
// ============================================================================

#[test]
fn test_ping_exchange() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let meter = Address::new(0x0001);
    let (mut client, _server) = served_client(Generation::New, meter);

    let response = client.ping(meter).unwrap();
    assert_eq!(response.firmware_version, 0x0100);
    assert_eq!(response.device_address, meter);
}

#[test]
fn test_generation_detection_flow() {
    let meter = Address::new(0x0001);
    let (mut client, _server) = served_client(Generation::New, meter);

    assert_eq!(client.generation(), None);
    let generation = client.detect_generation(meter).unwrap();
    assert_eq!(generation, Generation::New);
    assert_eq!(client.generation(), Some(Generation::New));

    // Follow-up commands now use the detected encoding.
    let status = client.read_status(meter, EnergyType::ActiveForward).unwrap();
    assert!(matches!(status, StatusResponse::Extended(_)));
    let instant = client
        .read_instant_value(meter, ParameterGroup::Basic)
        .unwrap();
    assert!(matches!(instant, InstantResponse::New(_)));
}

#[test]
fn test_get_info_against_transition_server() {
    let meter = Address::new(0x0042);
    let (mut client, _server) = served_client(Generation::Transition, meter);

    match client.get_info(meter).unwrap() {
        InfoResponse::Legacy(info) => {
            assert_eq!(info.board_id, 0x07);
            assert!(info.supports_100a());
        }
        other => panic!("transition server answered with {other:?}"),
    }
}

#[test]
fn test_read_date_time() {
    let meter = Address::new(0x0001);
    let (mut client, _server) = served_client(Generation::Old, meter);

    let date_time = client.read_date_time(meter).unwrap();
    assert_eq!(date_time.day, 27);
    assert_eq!(date_time.month, 5);
    assert!(date_time.hours <= 23);
}

// ============================================================================
// Response matching
// ============================================================================

fn scripted_client() -> (Client<LoopbackLink, SystemClock>, LoopbackLink) {
    let (client_link, peer) = LoopbackLink::pair();
    let client = Client::with_config(
        client_link,
        SystemClock::new(),
        ClientConfig {
            receive_timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        },
    );
    (client, peer)
}

fn ping_payload() -> Payload {
    Payload::copy_from(&[0x00, 0x01, 0x02, 0x00]).unwrap()
}

#[test]
fn test_mismatched_source_rejected() {
    // Meter 0x0003 answers a ping addressed to 0x0002.
    let (mut client, mut peer) = scripted_client();
    let stray = Packet {
        encoded: false,
        complex_version: false,
        direction: meterlink::protocol::Direction::Response,
        dest: Address::BROADCAST,
        src: Address::new(0x0003),
        command: 0x01,
        auth: 0,
        payload: ping_payload(),
    };
    peer.transmit(stray.pack().unwrap().as_slice()).unwrap();

    let err = client.ping(Address::new(0x0002)).unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::ResponseMismatch("src_addr"))
    ));
}

#[test]
fn test_mismatched_command_rejected() {
    let (mut client, mut peer) = scripted_client();
    let stray = Packet {
        encoded: false,
        complex_version: false,
        direction: meterlink::protocol::Direction::Response,
        dest: Address::BROADCAST,
        src: Address::new(0x0002),
        command: 0x30,
        auth: 0,
        payload: ping_payload(),
    };
    peer.transmit(stray.pack().unwrap().as_slice()).unwrap();

    let err = client.ping(Address::new(0x0002)).unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::ResponseMismatch("command"))
    ));
}

#[test]
fn test_mismatched_destination_rejected() {
    let (mut client, mut peer) = scripted_client();
    let stray = Packet {
        encoded: false,
        complex_version: false,
        direction: meterlink::protocol::Direction::Response,
        dest: Address::new(0x1234),
        src: Address::new(0x0002),
        command: 0x01,
        auth: 0,
        payload: ping_payload(),
    };
    peer.transmit(stray.pack().unwrap().as_slice()).unwrap();

    let err = client.ping(Address::new(0x0002)).unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::ResponseMismatch("dest_addr"))
    ));
}

#[test]
fn test_request_direction_rejected() {
    // A request-flagged frame that otherwise matches perfectly.
    let (mut client, mut peer) = scripted_client();
    let stray = Packet::request(
        0x01,
        Address::BROADCAST,
        Address::new(0x0002),
        0,
        ping_payload(),
    );
    peer.transmit(stray.pack().unwrap().as_slice()).unwrap();

    let err = client.ping(Address::new(0x0002)).unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::NotAResponse)
    ));
}

#[test]
fn test_corrupt_response_is_a_frame_error() {
    let (mut client, mut peer) = scripted_client();
    let response = Packet {
        encoded: false,
        complex_version: false,
        direction: meterlink::protocol::Direction::Response,
        dest: Address::BROADCAST,
        src: Address::new(0x0002),
        command: 0x01,
        auth: 0,
        payload: ping_payload(),
    };
    let mut raw = response.pack().unwrap().as_slice().to_vec();
    raw[5] ^= 0xFF;
    peer.transmit(&raw).unwrap();

    let err = client.ping(Address::new(0x0002)).unwrap_err();
    assert!(err.is_wire_noise());
}

// ============================================================================
// Timeouts and configuration guards
// ============================================================================

#[test]
fn test_receive_timeout() {
    let (client_link, _peer) = LoopbackLink::pair();
    let mut client = Client::with_config(
        client_link,
        SteppingClock::new(1000),
        ClientConfig::default(),
    );

    let err = client.ping(Address::new(0x0001)).unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_unsupported_command_blocked_before_transmit() {
    let (client_link, mut peer) = LoopbackLink::pair();
    let mut client = Client::new(client_link, SystemClock::new());
    client.set_generation(Generation::Old);

    let err = client
        .read_instant_value(Address::new(0x0001), ParameterGroup::Basic)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::UnsupportedForGeneration { command: 0x2B, .. })
    ));

    // Nothing may have reached the radio.
    let mut buf = [0u8; 64];
    assert_eq!(peer.poll_frame(&mut buf).unwrap(), 0);
}
