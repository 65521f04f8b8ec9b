//! Wire protocol for locker-bank controllers.
//!
//! Frames look like `POST:1,133,8,4,FFFF=6CA4\r\n`: a start marker, four
//! comma-separated numeric header fields, a payload, a CRC16 and CRLF.
//!
//! - [`CommandRequestBuilder`] builds outbound frames.
//! - [`ResponseParser`] parses inbound frames.
//! - [`FrameAssembler`] recovers frames from an arbitrarily chunked byte stream.
//! - [`LockerCodec`] ties assembler and parser to `tokio_util::codec`.

pub mod assembler;
pub mod builder;
pub mod cell_mask;
pub mod codec;
pub mod commands;
pub mod crc16;
pub mod frame;
pub mod message;
pub mod parser;

pub use assembler::{AssemblerState, DrainFrames, FrameAssembler};
pub use builder::CommandRequestBuilder;
pub use cell_mask::{CellMask, CellMaskMode};
pub use codec::LockerCodec;
pub use commands::CommandKind;
pub use frame::Frame;
pub use message::LockerCommand;
pub use parser::ResponseParser;
