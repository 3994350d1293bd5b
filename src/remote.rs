//! Sharing one physical bus between processes over a byte stream.
//!
//! The wire format is deliberately small: each request is a single
//! opcode byte ([`Opcode`]) followed by an opcode-specific payload, and
//! only read and version-query requests produce a reply. [`StreamBus`]
//! is the client half. It implements [`Ymf825Bus`] by encoding each
//! call onto any [`Read`] + [`Write`] stream, so higher layers such as
//! the register driver work unchanged against a remote bus.
//! [`BusServer`] is the other half: it owns the real bus and replays
//! client requests onto it, one client at a time.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::bus::{BusCounters, Ymf825Bus};
use crate::error::Ymf825Error;
use crate::wire::{self, Opcode};
use crate::Result;

/// Stream timeout applied by the [`StreamBus`] constructors.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`Ymf825Bus`] client that forwards every operation over a byte
/// stream to a [`BusServer`].
///
/// The stream may be anything that is [`Read`] + [`Write`]; the
/// provided constructors cover TCP sockets and serial ports. Argument
/// validation mirrors the local bus driver and happens before any bytes
/// are sent, so a rejected call never desynchronizes the stream.
///
/// Requests without a reply cannot report a fault raised by the
/// server's own bus. The server logs and counts those on its side
/// instead of ending the session.
///
/// # Example
///
/// ```no_run
/// use ymf825::{StreamBus, Ymf825Bus};
///
/// # fn main() -> ymf825::Result<()> {
/// let mut bus = StreamBus::connect("127.0.0.1:9825")?;
/// bus.check_available()?;
/// bus.set_target(0x01)?;
/// bus.write(0x0B, 0x30)?;
/// # Ok(())
/// # }
/// ```
pub struct StreamBus<S> {
    stream: S,
    frame: Vec<u8>,
    target: u8,
    counters: BusCounters,
}

impl StreamBus<TcpStream> {
    /// Connects to a bus server over TCP.
    ///
    /// Nagle's algorithm is disabled and both directions get a
    /// five-second timeout, so a dead server fails the call instead of
    /// hanging it.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        log::debug!("connected to bus server at {}", stream.peer_addr()?);
        Ok(Self::new(stream))
    }
}

impl StreamBus<Box<dyn SerialPort>> {
    /// Opens a serial port speaking the bus protocol, 8N1 with no flow
    /// control.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(IO_TIMEOUT)
            .open()?;
        log::debug!("opened serial bus on {path} at {baud_rate} baud");
        Ok(Self::new(port))
    }
}

impl<S: Read + Write> StreamBus<S> {
    /// Wraps an already-connected stream.
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            frame: Vec::new(),
            target: 0,
            counters: BusCounters::default(),
        }
    }

    /// Verifies that the other end speaks this crate's protocol
    /// version, [`PROTOCOL_VERSION`].
    ///
    /// [`PROTOCOL_VERSION`]: crate::wire::PROTOCOL_VERSION
    pub fn check_available(&mut self) -> Result<()> {
        self.frame.clear();
        self.frame.push(Opcode::VersionQuery.into());
        self.send()?;
        let mut reply = [0u8; 8];
        self.stream.read_exact(&mut reply)?;
        log::debug!("version query answered {reply:02X?}");
        if reply == wire::PROTOCOL_VERSION {
            Ok(())
        } else {
            Err(Ymf825Error::VersionMismatch)
        }
    }

    /// Returns the currently selected target mask.
    #[must_use]
    pub fn target(&self) -> u8 {
        self.target
    }

    fn require_target(&self) -> Result<()> {
        if self.target == 0 {
            return Err(Ymf825Error::InvalidOperation("no target selected"));
        }
        Ok(())
    }

    fn send(&mut self) -> Result<()> {
        self.stream.write_all(&self.frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn send_write(&mut self, address: u8, data: u8) -> Result<()> {
        self.require_target()?;
        self.frame.clear();
        wire::encode_write(&mut self.frame, address, data);
        self.send()
    }

    fn send_burst_write(&mut self, address: u8, data: &[u8]) -> Result<()> {
        self.require_target()?;
        if data.is_empty() || data.len() > wire::MAX_BURST_LEN {
            return Err(Ymf825Error::InvalidParameter);
        }
        self.frame.clear();
        wire::encode_burst_write(&mut self.frame, address, data);
        self.send()
    }

    fn send_read(&mut self, address: u8) -> Result<u8> {
        self.require_target()?;
        if self.target.count_ones() != 1 {
            return Err(Ymf825Error::InvalidOperation(
                "multiple targets selected for read",
            ));
        }
        self.frame.clear();
        wire::encode_read(&mut self.frame, self.target, address);
        self.send()?;
        let mut reply = [0u8; 1];
        self.stream.read_exact(&mut reply)?;
        Ok(reply[0])
    }
}

impl<S: Read + Write> Ymf825Bus for StreamBus<S> {
    fn write(&mut self, address: u8, data: u8) -> Result<()> {
        match self.send_write(address, data) {
            Ok(()) => {
                self.counters.write.record(2);
                Ok(())
            }
            Err(e) => {
                self.counters.write.record_error();
                Err(e)
            }
        }
    }

    fn burst_write(&mut self, address: u8, data: &[u8]) -> Result<()> {
        match self.send_burst_write(address, data) {
            Ok(()) => {
                self.counters.burst_write.record(1 + data.len());
                Ok(())
            }
            Err(e) => {
                self.counters.burst_write.record_error();
                Err(e)
            }
        }
    }

    fn read(&mut self, address: u8) -> Result<u8> {
        match self.send_read(address) {
            Ok(value) => {
                self.counters.read.record(2);
                Ok(value)
            }
            Err(e) => {
                self.counters.read.record_error();
                Err(e)
            }
        }
    }

    fn set_target(&mut self, mask: u8) -> Result<()> {
        self.frame.clear();
        wire::encode_set_target(&mut self.frame, mask);
        self.send()?;
        self.target = mask;
        Ok(())
    }

    fn reset_hardware(&mut self) -> Result<()> {
        self.frame.clear();
        self.frame.push(Opcode::HardwareReset.into());
        self.send()
    }

    fn counters(&self) -> BusCounters {
        self.counters
    }
}

/// Serves a local bus to stream clients, one session at a time.
///
/// Every request is replayed onto the owned bus. Faults raised by the
/// bus are not propagated to the client: they are logged, counted in
/// [`faults`], and answered with a zero value where the protocol
/// expects a reply, so a client session survives a transient device
/// failure. Malformed requests (an unknown opcode or an out-of-range
/// burst length) end the session instead, since the stream position can
/// no longer be trusted.
///
/// [`faults`]: BusServer::faults
pub struct BusServer<B> {
    bus: B,
    faults: u64,
}

impl<B: Ymf825Bus> BusServer<B> {
    /// Creates a server that replays requests onto `bus`.
    #[must_use]
    pub fn new(bus: B) -> Self {
        Self { bus, faults: 0 }
    }

    /// Number of bus faults absorbed instead of propagated.
    #[must_use]
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Releases the underlying bus.
    #[must_use]
    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Accepts clients on `listener` forever, one at a time. A failed
    /// session is logged and the next client is accepted; only listener
    /// failures end the loop.
    pub fn run(&mut self, listener: &TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept()?;
            stream.set_nodelay(true)?;
            log::info!("client {peer} connected");
            match self.serve(stream) {
                Ok(()) => log::info!("client {peer} disconnected"),
                Err(err) => log::warn!("client {peer} session failed: {err}"),
            }
        }
    }

    /// Serves a single client session until the stream reaches a clean
    /// end of input.
    pub fn serve<S: Read + Write>(&mut self, mut stream: S) -> Result<()> {
        loop {
            let mut opcode = [0u8; 1];
            match stream.read_exact(&mut opcode) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(err) => return Err(err.into()),
            }
            let Ok(opcode) = Opcode::try_from(opcode[0]) else {
                log::warn!("unknown opcode {:#04x}", opcode[0]);
                return Err(Ymf825Error::InvalidParameter);
            };
            self.dispatch(opcode, &mut stream)?;
        }
    }

    fn dispatch<S: Read + Write>(&mut self, opcode: Opcode, stream: &mut S) -> Result<()> {
        match opcode {
            Opcode::Write => {
                let [address, data] = read_array(stream)?;
                let result = self.bus.write(address, data);
                self.absorb(result);
            }
            Opcode::BurstWrite => {
                let [len_lo, len_hi, address] = read_array(stream)?;
                let len = usize::from(u16::from_le_bytes([len_lo, len_hi]));
                if len == 0 || len > wire::MAX_BURST_LEN {
                    log::warn!("burst length {len} out of range");
                    return Err(Ymf825Error::InvalidParameter);
                }
                let mut data = vec![0u8; len];
                stream.read_exact(&mut data)?;
                let result = self.bus.burst_write(address, &data);
                self.absorb(result);
            }
            Opcode::Read => {
                let [target, address] = read_array(stream)?;
                let result = self
                    .bus
                    .set_target(target)
                    .and_then(|()| self.bus.read(address));
                let value = self.absorb(result);
                stream.write_all(&[value])?;
                stream.flush()?;
            }
            Opcode::SetTarget => {
                let [mask] = read_array(stream)?;
                let result = self.bus.set_target(mask);
                self.absorb(result);
            }
            Opcode::HardwareReset => {
                let result = self.bus.reset_hardware();
                self.absorb(result);
            }
            Opcode::VersionQuery => {
                stream.write_all(&wire::PROTOCOL_VERSION)?;
                stream.flush()?;
            }
        }
        Ok(())
    }

    /// Logs and counts a bus fault, substituting the default value, so
    /// the session stays alive.
    fn absorb<T: Default>(&mut self, result: Result<T>) -> T {
        result.unwrap_or_else(|err| {
            log::warn!("bus fault absorbed: {err}");
            self.faults += 1;
            T::default()
        })
    }
}

fn read_array<const N: usize, S: Read>(stream: &mut S) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum BusOp {
        Write(u8, u8),
        BurstWrite(u8, Vec<u8>),
        Read(u8),
        SetTarget(u8),
        Reset,
    }

    #[derive(Default)]
    struct MockBus {
        ops: Vec<BusOp>,
        read_value: u8,
        fail_reads: bool,
    }

    impl Ymf825Bus for MockBus {
        fn write(&mut self, address: u8, data: u8) -> Result<()> {
            self.ops.push(BusOp::Write(address, data));
            Ok(())
        }

        fn burst_write(&mut self, address: u8, data: &[u8]) -> Result<()> {
            self.ops.push(BusOp::BurstWrite(address, data.to_vec()));
            Ok(())
        }

        fn read(&mut self, address: u8) -> Result<u8> {
            self.ops.push(BusOp::Read(address));
            if self.fail_reads {
                Err(Ymf825Error::IoError)
            } else {
                Ok(self.read_value)
            }
        }

        fn set_target(&mut self, mask: u8) -> Result<()> {
            self.ops.push(BusOp::SetTarget(mask));
            Ok(())
        }

        fn reset_hardware(&mut self) -> Result<()> {
            self.ops.push(BusOp::Reset);
            Ok(())
        }

        fn counters(&self) -> BusCounters {
            BusCounters::default()
        }
    }

    /// Read side replays a script, write side records everything sent.
    struct MockStream {
        input: io::Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: io::Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn client_frames_each_operation() {
        let mut bus = StreamBus::new(MockStream::new(vec![0xA5]));
        bus.set_target(0x01).unwrap();
        bus.write(0x85, 0x30).unwrap();
        bus.burst_write(0x07, &[0x10, 0x20]).unwrap();
        assert_eq!(bus.read(0x04).unwrap(), 0xA5);
        bus.reset_hardware().unwrap();

        assert_eq!(
            bus.stream.output,
            [
                0x40, 0x01, // set target
                0x00, 0x05, 0x30, // write, address top bit cleared
                0x01, 0x02, 0x00, 0x07, 0x10, 0x20, // burst write
                0x20, 0x01, 0x04, // read carries the target
                0xFE, // hardware reset
            ]
        );
        let counters = bus.counters();
        assert_eq!(counters.write.commands, 1);
        assert_eq!(counters.write.bytes, 2);
        assert_eq!(counters.burst_write.bytes, 3);
        assert_eq!(counters.read.commands, 1);
    }

    #[test]
    fn client_validates_before_sending() {
        let mut bus = StreamBus::new(MockStream::new(Vec::new()));
        assert_eq!(
            bus.write(0x00, 0x00),
            Err(Ymf825Error::InvalidOperation("no target selected"))
        );

        bus.set_target(0x03).unwrap();
        assert_eq!(
            bus.read(0x04),
            Err(Ymf825Error::InvalidOperation(
                "multiple targets selected for read"
            ))
        );
        assert_eq!(
            bus.burst_write(0x07, &[]),
            Err(Ymf825Error::InvalidParameter)
        );
        let oversized = vec![0u8; wire::MAX_BURST_LEN + 1];
        assert_eq!(
            bus.burst_write(0x07, &oversized),
            Err(Ymf825Error::InvalidParameter)
        );

        // Only the target frame went out.
        assert_eq!(bus.stream.output, [0x40, 0x03]);
        assert_eq!(bus.counters().write.errors, 1);
        assert_eq!(bus.counters().read.errors, 1);
        assert_eq!(bus.counters().burst_write.errors, 2);
    }

    #[test]
    fn version_handshake() {
        let mut bus = StreamBus::new(MockStream::new(wire::PROTOCOL_VERSION.to_vec()));
        bus.check_available().unwrap();
        assert_eq!(bus.stream.output, [0xFF]);

        let mut bus = StreamBus::new(MockStream::new(b"YMF825V9".to_vec()));
        assert_eq!(bus.check_available(), Err(Ymf825Error::VersionMismatch));
    }

    #[test]
    fn server_replays_requests_onto_the_bus() {
        let mut stream = MockStream::new(vec![
            0x40, 0x01, // set target
            0x00, 0x0B, 0x30, // write
            0x01, 0x03, 0x00, 0x07, 0x10, 0x20, 0x30, // burst write
            0xFE, // hardware reset
            0xFF, // version query
        ]);
        let mut server = BusServer::new(MockBus::default());
        server.serve(&mut stream).unwrap();

        assert_eq!(
            server.bus.ops,
            [
                BusOp::SetTarget(0x01),
                BusOp::Write(0x0B, 0x30),
                BusOp::BurstWrite(0x07, vec![0x10, 0x20, 0x30]),
                BusOp::Reset,
            ]
        );
        assert_eq!(stream.output, wire::PROTOCOL_VERSION);
        assert_eq!(server.faults(), 0);
    }

    #[test]
    fn server_answers_reads_with_zero_after_a_fault() {
        let mut stream = MockStream::new(vec![0x20, 0x01, 0x04]);
        let mut server = BusServer::new(MockBus {
            fail_reads: true,
            ..MockBus::default()
        });
        server.serve(&mut stream).unwrap();

        assert_eq!(stream.output, [0x00]);
        assert_eq!(server.faults(), 1);
    }

    #[test]
    fn server_ends_the_session_on_malformed_requests() {
        let mut server = BusServer::new(MockBus::default());
        let mut stream = MockStream::new(vec![0x99]);
        assert_eq!(
            server.serve(&mut stream),
            Err(Ymf825Error::InvalidParameter)
        );

        // Burst length above the protocol bound.
        let mut stream = MockStream::new(vec![0x01, 0x01, 0x02, 0x07]);
        assert_eq!(
            server.serve(&mut stream),
            Err(Ymf825Error::InvalidParameter)
        );
        assert!(server.bus.ops.is_empty());
    }

    #[test]
    fn truncated_frames_are_io_errors() {
        let mut server = BusServer::new(MockBus::default());
        let mut stream = MockStream::new(vec![0x00, 0x0B]);
        assert_eq!(server.serve(&mut stream), Err(Ymf825Error::IoError));
    }

    #[test]
    fn tcp_loopback_session() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let mut server = BusServer::new(MockBus {
                read_value: 0x01,
                ..MockBus::default()
            });
            let (stream, _) = listener.accept().unwrap();
            server.serve(stream).unwrap();
            server
        });

        let mut bus = StreamBus::connect(addr).unwrap();
        bus.check_available().unwrap();
        bus.set_target(0x01).unwrap();
        bus.write(0x0B, 0x30).unwrap();
        assert_eq!(bus.read(0x04).unwrap(), 0x01);
        drop(bus);

        let server = handle.join().unwrap();
        assert_eq!(server.faults(), 0);
        assert_eq!(
            server.bus.ops,
            [
                BusOp::SetTarget(0x01),
                BusOp::Write(0x0B, 0x30),
                BusOp::SetTarget(0x01),
                BusOp::Read(0x04),
            ]
        );
    }
}
