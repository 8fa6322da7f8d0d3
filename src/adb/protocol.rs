use crate::error::{AdbError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use tokio_util::codec::{Decoder, Encoder};

/// Length of the fixed frame header
pub const HEADER_LENGTH: usize = 24;

/// Protocol version we advertise in CNXN
pub const CONNECT_VERSION: u32 = 0x0100_0000;

/// Largest payload we accept from the peer before CNXN tells us otherwise
pub const CONNECT_MAXDATA: u32 = 4096;

/// Identity sent with CNXN
pub const CONNECT_PAYLOAD: &[u8] = b"host::\0";

/// Hard ceiling on any declared payload length (the protocol's MAX_PAYLOAD)
pub const MAX_PAYLOAD_LIMIT: usize = 1024 * 1024;

// AUTH sub-types (arg0)
pub const AUTH_TYPE_TOKEN: u32 = 1;
pub const AUTH_TYPE_SIGNATURE: u32 = 2;
pub const AUTH_TYPE_RSA_PUBLIC: u32 = 3;

/// Wire command, a 4-character ASCII code packed little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Sync,
    Cnxn,
    Auth,
    Open,
    Okay,
    Clse,
    Wrte,
    Unknown(u32),
}

impl Command {
    const fn code(tag: &[u8; 4]) -> u32 {
        u32::from_le_bytes(*tag)
    }

    pub fn from_u32(value: u32) -> Self {
        match value {
            v if v == Self::code(b"SYNC") => Command::Sync,
            v if v == Self::code(b"CNXN") => Command::Cnxn,
            v if v == Self::code(b"AUTH") => Command::Auth,
            v if v == Self::code(b"OPEN") => Command::Open,
            v if v == Self::code(b"OKAY") => Command::Okay,
            v if v == Self::code(b"CLSE") => Command::Clse,
            v if v == Self::code(b"WRTE") => Command::Wrte,
            other => Command::Unknown(other),
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            Command::Sync => Self::code(b"SYNC"),
            Command::Cnxn => Self::code(b"CNXN"),
            Command::Auth => Self::code(b"AUTH"),
            Command::Open => Self::code(b"OPEN"),
            Command::Okay => Self::code(b"OKAY"),
            Command::Clse => Self::code(b"CLSE"),
            Command::Wrte => Self::code(b"WRTE"),
            Command::Unknown(value) => *value,
        }
    }

    pub fn magic(&self) -> u32 {
        self.as_u32() ^ 0xFFFF_FFFF
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Unknown(value) => write!(f, "{:#010x}", value),
            known => write!(f, "{}", String::from_utf8_lossy(&known.as_u32().to_le_bytes())),
        }
    }
}

/// One ADB frame. `data_length`, `data_check` and `magic` only exist on the
/// wire and are derived from these fields when encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdbMessage {
    pub command: Command,
    pub arg0: u32,
    pub arg1: u32,
    pub data: Bytes,
}

impl AdbMessage {
    pub fn new(command: Command, arg0: u32, arg1: u32, data: impl Into<Bytes>) -> Self {
        Self {
            command,
            arg0,
            arg1,
            data: data.into(),
        }
    }

    /// CNXN with our version, max payload and `host::` banner
    pub fn connect() -> Self {
        Self::new(
            Command::Cnxn,
            CONNECT_VERSION,
            CONNECT_MAXDATA,
            Bytes::from_static(CONNECT_PAYLOAD),
        )
    }

    pub fn auth(auth_type: u32, data: impl Into<Bytes>) -> Self {
        Self::new(Command::Auth, auth_type, 0, data)
    }

    /// OPEN carries the destination as a NUL-terminated string
    pub fn open(local_id: u32, destination: &str) -> Self {
        let mut data = BytesMut::with_capacity(destination.len() + 1);
        data.put_slice(destination.as_bytes());
        data.put_u8(0);
        Self::new(Command::Open, local_id, 0, data.freeze())
    }

    pub fn write(local_id: u32, remote_id: u32, data: impl Into<Bytes>) -> Self {
        Self::new(Command::Wrte, local_id, remote_id, data)
    }

    pub fn ready(local_id: u32, remote_id: u32) -> Self {
        Self::new(Command::Okay, local_id, remote_id, Bytes::new())
    }

    pub fn close(local_id: u32, remote_id: u32) -> Self {
        Self::new(Command::Clse, local_id, remote_id, Bytes::new())
    }
}

impl fmt::Display for AdbMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {}, {} bytes)",
            self.command,
            self.arg0,
            self.arg1,
            self.data.len()
        )
    }
}

/// Unsigned byte sum of the payload, modulo 2^32.
pub fn checksum(data: &[u8]) -> u32 {
    data.iter()
        .fold(0u32, |sum, &byte| sum.wrapping_add(u32::from(byte)))
}

/// Frame codec for `FramedRead`/`FramedWrite`.
///
/// Decoding validates the magic as soon as the header is complete and the
/// checksum once the payload is; either failure is fatal for the stream of
/// frames.
#[derive(Debug, Clone)]
pub struct AdbCodec {
    max_payload: usize,
}

impl AdbCodec {
    pub fn new() -> Self {
        Self {
            max_payload: MAX_PAYLOAD_LIMIT,
        }
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Default for AdbCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AdbCodec {
    type Item = AdbMessage;
    type Error = AdbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AdbMessage>> {
        if src.len() < HEADER_LENGTH {
            src.reserve(HEADER_LENGTH - src.len());
            return Ok(None);
        }

        let mut header = &src[..HEADER_LENGTH];
        let command = header.get_u32_le();
        let arg0 = header.get_u32_le();
        let arg1 = header.get_u32_le();
        let data_length = header.get_u32_le() as usize;
        let data_check = header.get_u32_le();
        let magic = header.get_u32_le();

        if command != magic ^ 0xFFFF_FFFF {
            return Err(AdbError::MagicMismatch { command, magic });
        }

        if data_length > self.max_payload {
            return Err(AdbError::PayloadTooLarge {
                size: data_length,
                max: self.max_payload,
            });
        }

        let frame_length = HEADER_LENGTH + data_length;
        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LENGTH);
        let data = src.split_to(data_length).freeze();

        if data_length > 0 {
            let actual = checksum(&data);
            if actual != data_check {
                return Err(AdbError::ChecksumMismatch {
                    expected: data_check,
                    actual,
                });
            }
        }

        Ok(Some(AdbMessage {
            command: Command::from_u32(command),
            arg0,
            arg1,
            data,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<AdbMessage>> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(AdbError::ShortRead(src.len())),
        }
    }
}

impl Encoder<AdbMessage> for AdbCodec {
    type Error = AdbError;

    fn encode(&mut self, msg: AdbMessage, dst: &mut BytesMut) -> Result<()> {
        AdbProtocol::encode_into(&msg, dst);
        Ok(())
    }
}

/// ADB wire protocol helpers for callers working on plain byte buffers
pub struct AdbProtocol;

impl AdbProtocol {
    /// Encode a message for transmission
    pub fn encode_message(msg: &AdbMessage) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LENGTH + msg.data.len());
        Self::encode_into(msg, &mut buf);
        buf
    }

    fn encode_into(msg: &AdbMessage, buf: &mut BytesMut) {
        let command = msg.command.as_u32();
        let (data_length, data_check) = if msg.data.is_empty() {
            (0, 0)
        } else {
            (msg.data.len() as u32, checksum(&msg.data))
        };

        buf.reserve(HEADER_LENGTH + msg.data.len());
        buf.put_u32_le(command);
        buf.put_u32_le(msg.arg0);
        buf.put_u32_le(msg.arg1);
        buf.put_u32_le(data_length);
        buf.put_u32_le(data_check);
        buf.put_u32_le(msg.command.magic());
        buf.put_slice(&msg.data);
    }

    /// Decode exactly one message from a complete buffer
    pub fn decode_message(data: &[u8]) -> Result<AdbMessage> {
        let mut buf = BytesMut::from(data);
        match AdbCodec::new().decode_eof(&mut buf)? {
            Some(message) => Ok(message),
            None => Err(AdbError::ShortRead(0)),
        }
    }
}

/// Sync sub-protocol ids
pub mod sync {
    pub const DATA: &[u8; 4] = b"DATA";
    pub const DONE: &[u8; 4] = b"DONE";
    pub const SEND: &[u8; 4] = b"SEND";
    pub const RECV: &[u8; 4] = b"RECV";
    pub const LIST: &[u8; 4] = b"LIST";
    pub const DENT: &[u8; 4] = b"DENT";
    pub const STAT: &[u8; 4] = b"STAT";
    pub const QUIT: &[u8; 4] = b"QUIT";
    pub const OKAY: &[u8; 4] = b"OKAY";
    pub const FAIL: &[u8; 4] = b"FAIL";

    /// Largest DATA chunk a sync peer accepts
    pub const MAX_DATA: usize = 64 * 1024;
}
