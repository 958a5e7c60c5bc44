//! Server dispatcher: impersonate a meter and answer client requests.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, trace};

use crate::command::{
    codes, command_name, DateTime, DeviceInfo, ExtendedStatus, NewDeviceInfo, NewInstant,
    OldStatus, PingResponse, TransitionInstant,
};
use crate::config::ServerConfig;
use crate::error::{DispatchError, Error, TransactionError};
use crate::link::{Clock, RadioLink};
use crate::protocol::Packet;
use crate::types::{
    Address, ConfigByte, EnergyType, Generation, ParameterGroup, Payload, MAX_FRAME_SIZE,
    MAX_PAYLOAD_SIZE,
};

/// Read-only view of the server a handler runs against.
#[derive(Debug, Clone, Copy)]
pub struct ServerContext {
    pub address: Address,
    pub status: u32,
    pub generation: Generation,
    /// Milliseconds since the server was constructed.
    pub uptime_ms: u64,
    /// Sample values the default handlers serve.
    pub fixtures: Fixtures,
}

/// Sample meter readings served by the default handlers until a host
/// replaces them or overrides the handlers outright.
#[derive(Debug, Clone, Copy)]
pub struct Fixtures {
    pub firmware_version: u16,
    pub firmware_crc: u16,
    /// Device flags byte; bit 7 advertises 100 A support.
    pub flags: u8,
    pub active_tariff_crc: u16,
    pub planned_tariff_crc: u16,
    /// Backup battery voltage in millivolts (new generation only).
    pub battery_voltage_mv: u16,
}

impl Default for Fixtures {
    fn default() -> Self {
        Self {
            firmware_version: 0x0100,
            firmware_crc: 0x1234,
            flags: 0x80,
            active_tariff_crc: 0x5678,
            planned_tariff_crc: 0x9ABC,
            battery_voltage_mv: 3300,
        }
    }
}

/// A registered command handler. Receives the request packet and fills the
/// response payload buffer, returning the response length.
pub type Handler = Box<dyn FnMut(&ServerContext, &Packet, &mut [u8]) -> anyhow::Result<usize>>;

struct HandlerEntry {
    min_request: usize,
    run: Handler,
}

/// What a single [`Server::poll`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// No frame arrived inside the poll window.
    Idle,
    /// A request was handled. On broadcast the response is built but never
    /// transmitted.
    Handled { command: u8, broadcast: bool },
    /// A frame arrived but was dropped; the reason is recorded.
    Dropped(DropReason),
}

/// Why an incoming frame produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Unparseable or CRC-failing frame.
    BadFrame,
    /// Parsed fine but is not a request.
    NotARequest,
    /// Addressed to some other device; dropped silently.
    NotAddressed,
    /// No handler registered for the command code.
    NoHandler(u8),
    /// Handler rejected the request or its payload was too short.
    HandlerFailed(u8),
    /// Handler succeeded but the reply could not be sent.
    ReplyFailed,
}

/// A protocol server: receives requests, dispatches them to per-command
/// handlers and transmits the responses.
///
/// The five built-in commands get default handlers at construction; a host
/// may override any of them or register handlers for new codes.
pub struct Server<R, C> {
    address: Address,
    status: u32,
    generation: Generation,
    poll_timeout: Duration,
    fixtures: Fixtures,
    handlers: HashMap<u8, HandlerEntry>,
    last_error: Option<Error>,
    radio: R,
    clock: C,
}

impl<R: RadioLink, C: Clock> Server<R, C> {
    pub fn new(radio: R, clock: C, config: ServerConfig) -> Self {
        let mut server = Self {
            address: config.address,
            status: config.status,
            generation: config.generation,
            poll_timeout: config.poll_timeout,
            fixtures: Fixtures::default(),
            handlers: HashMap::new(),
            last_error: None,
            radio,
            clock,
        };
        server.register_default_handlers();
        server
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn set_status(&mut self, status: u32) {
        self.status = status;
    }

    pub fn set_fixtures(&mut self, fixtures: Fixtures) {
        self.fixtures = fixtures;
    }

    /// Last recorded error, for diagnostics. Dropped packets never produce
    /// traffic on the wire.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Register (or replace) the handler for a command code.
    ///
    /// `min_request` is the shortest request payload the dispatcher will
    /// hand to the handler; shorter requests are dropped before dispatch.
    pub fn register_handler(&mut self, code: u8, min_request: usize, handler: Handler) {
        self.handlers.insert(
            code,
            HandlerEntry {
                min_request,
                run: handler,
            },
        );
    }

    /// Receive and process at most one request. Call from the host loop.
    pub fn poll(&mut self) -> ServerEvent {
        let mut rx = [0u8; MAX_FRAME_SIZE];
        let raw_len = match self.receive_frame(&mut rx) {
            Some(n) => n,
            None => {
                trace!("poll window elapsed without a frame");
                return ServerEvent::Idle;
            }
        };

        let request = match Packet::unpack(&rx[..raw_len]) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(%err, "dropping undecodable frame");
                self.last_error = Some(err.into());
                return ServerEvent::Dropped(DropReason::BadFrame);
            }
        };

        if !request.is_request() {
            self.last_error = Some(TransactionError::NotARequest.into());
            return ServerEvent::Dropped(DropReason::NotARequest);
        }

        let broadcast = request.dest.is_broadcast();
        if request.dest != self.address && !broadcast {
            // Not for us; stay silent.
            trace!(dest = %request.dest, "request addressed elsewhere");
            return ServerEvent::Dropped(DropReason::NotAddressed);
        }

        let command = request.command;
        let context = ServerContext {
            address: self.address,
            status: self.status,
            generation: self.generation,
            uptime_ms: self.clock.now_ms(),
            fixtures: self.fixtures,
        };

        let Some(entry) = self.handlers.get_mut(&command) else {
            self.last_error = Some(DispatchError::NoHandler(command).into());
            return ServerEvent::Dropped(DropReason::NoHandler(command));
        };

        if request.payload.len() < entry.min_request {
            self.last_error = Some(
                DispatchError::RequestTooShort {
                    command,
                    len: request.payload.len(),
                    min: entry.min_request,
                }
                .into(),
            );
            return ServerEvent::Dropped(DropReason::HandlerFailed(command));
        }

        let mut response_buf = [0u8; MAX_PAYLOAD_SIZE];
        let response_len = match (entry.run)(&context, &request, &mut response_buf) {
            Ok(n) => n,
            Err(err) => {
                debug!(command = command_name(command), %err, "handler rejected request");
                self.last_error = Some(DispatchError::HandlerRejected(command).into());
                return ServerEvent::Dropped(DropReason::HandlerFailed(command));
            }
        };

        debug!(
            command = command_name(command),
            response_len, broadcast, "request handled"
        );

        if broadcast {
            // Execute but never answer a broadcast.
            return ServerEvent::Handled {
                command,
                broadcast: true,
            };
        }

        match self.send_response(&request, &response_buf[..response_len]) {
            Ok(()) => ServerEvent::Handled {
                command,
                broadcast: false,
            },
            Err(err) => {
                self.last_error = Some(err);
                ServerEvent::Dropped(DropReason::ReplyFailed)
            }
        }
    }

    fn receive_frame(&mut self, rx: &mut [u8]) -> Option<usize> {
        let deadline = self
            .clock
            .now_ms()
            .saturating_add(self.poll_timeout.as_millis() as u64);
        loop {
            match self.radio.poll_frame(rx) {
                Ok(0) => {}
                Ok(n) => {
                    self.radio.reset();
                    return Some(n);
                }
                Err(err) => {
                    self.last_error = Some(err.into());
                    self.radio.reset();
                    return None;
                }
            }
            if self.clock.now_ms() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn send_response(&mut self, request: &Packet, payload: &[u8]) -> Result<(), Error> {
        let payload = Payload::copy_from(payload)?;
        let response = Packet::response_to(request, self.status, payload);
        let frame = response.pack()?;
        self.radio.transmit(frame.as_slice())?;
        self.radio.reset();
        Ok(())
    }

    fn register_default_handlers(&mut self) {
        self.register_handler(codes::PING, 0, Box::new(handle_ping));
        self.register_handler(codes::GET_INFO, 0, Box::new(handle_get_info));
        self.register_handler(codes::READ_DATE_TIME, 0, Box::new(handle_read_date_time));
        let status_min = if self.generation == Generation::Old { 0 } else { 1 };
        self.register_handler(codes::READ_STATUS, status_min, Box::new(handle_read_status));
        self.register_handler(
            codes::READ_INSTANT_VALUE,
            1,
            Box::new(handle_read_instant_value),
        );
    }
}

fn handle_ping(
    ctx: &ServerContext,
    _request: &Packet,
    out: &mut [u8],
) -> anyhow::Result<usize> {
    let response = PingResponse {
        firmware_version: ctx.fixtures.firmware_version,
        device_address: ctx.address,
    };
    Ok(response.encode(out))
}

fn handle_get_info(
    ctx: &ServerContext,
    _request: &Packet,
    out: &mut [u8],
) -> anyhow::Result<usize> {
    let uptime_secs = (ctx.uptime_ms / 1000) as u32;
    let info = DeviceInfo {
        board_id: ctx.generation.representative_board_id(),
        firmware_version: ctx.fixtures.firmware_version,
        firmware_crc: ctx.fixtures.firmware_crc,
        work_time: uptime_secs,
        sleep_time: 0,
        group_id: 0,
        flags: ctx.fixtures.flags,
        active_tariff_crc: ctx.fixtures.active_tariff_crc,
        planned_tariff_crc: ctx.fixtures.planned_tariff_crc,
        time_since_correction: uptime_secs,
        reserve: 0,
        interface1_type: 1,
        interface2_type: 2,
    };
    let len = match ctx.generation {
        Generation::New => NewDeviceInfo {
            info,
            interface3_type: 3,
            interface4_type: 4,
            battery_voltage: Some(ctx.fixtures.battery_voltage_mv),
        }
        .encode(out),
        _ => info.encode(out),
    };
    Ok(len)
}

fn handle_read_date_time(
    ctx: &ServerContext,
    _request: &Packet,
    out: &mut [u8],
) -> anyhow::Result<usize> {
    let date_time = DateTime {
        seconds: ((ctx.uptime_ms / 1000) % 60) as u8,
        minutes: ((ctx.uptime_ms / 60_000) % 60) as u8,
        hours: 14,
        day_of_week: 2,
        day: 27,
        month: 5,
        year: 25,
    };
    Ok(date_time.encode(out))
}

fn handle_read_status(
    ctx: &ServerContext,
    request: &Packet,
    out: &mut [u8],
) -> anyhow::Result<usize> {
    if ctx.generation == Generation::Old {
        let response = OldStatus {
            total_energy: 12_345_678,
            config: ConfigByte::from_byte(0x03),
            division_coeff: 1,
            role_code: 0x32,
            multiplication_coeff: 1,
            tariffs: [1_000_000, 2_000_000, 3_000_000, 4_000_000],
        };
        return Ok(response.encode(out));
    }

    let energy_type = match request.payload.as_slice().first() {
        Some(&code) => EnergyType::from_code(code)?,
        None => EnergyType::ActiveForward,
    };
    let response = ExtendedStatus {
        energy_type,
        config: ConfigByte::from_byte(0x03),
        voltage_transform_coeff: 1,
        current_transform_coeff: 1,
        total_full: 87_654_321,
        total_active: 87_654_321,
        tariffs: [2_000_000, 4_000_000, 6_000_000, 8_000_000],
    };
    Ok(response.encode(out))
}

fn handle_read_instant_value(
    ctx: &ServerContext,
    request: &Packet,
    out: &mut [u8],
) -> anyhow::Result<usize> {
    let group = request
        .payload
        .as_slice()
        .first()
        .map(|&code| ParameterGroup::from_code(code))
        .transpose()?
        .unwrap_or(ParameterGroup::Basic);

    match ctx.generation {
        Generation::Old => Err(anyhow!("instant values are not available on old boards")),
        Generation::Transition => {
            let response = TransitionInstant {
                group,
                voltage_transform_coeff: 1,
                current_transform_coeff: 5,
                active_power: 1234,
                reactive_power: 567,
                frequency: 5000,
                cos_phi: 850,
                voltage_a: 23_000,
                voltage_b: 23_100,
                voltage_c: 22_900,
                current_a: 5_350,
                current_b: 5_420,
                current_c: 5_280,
                wide_currents: ctx.fixtures.flags & 0x80 != 0,
            };
            Ok(response.encode(out))
        }
        Generation::New => {
            let response = NewInstant {
                group,
                voltage_transform_coeff: 1,
                current_transform_coeff: 5,
                active_power: 12_340,
                reactive_power: 5_670,
                frequency: 5000,
                cos_phi: 850,
                voltage_a: 23_000,
                voltage_b: 23_100,
                voltage_c: 22_900,
                current_a: 5_350,
                current_b: 5_420,
                current_c: 5_280,
            };
            Ok(response.encode(out))
        }
    }
}
