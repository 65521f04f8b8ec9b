//! Tokio codec for locker serial lines.
//!
//! [`LockerCodec`] joins the [`FrameAssembler`] and [`ResponseParser`] behind
//! `tokio_util`'s [`Decoder`] and [`Encoder`] traits, so a serial stream
//! wrapped in `Framed` yields parsed [`LockerCommand`]s and accepts outbound
//! ones.
//!
//! ```text
//! serial bytes -> FrameAssembler -> Frame -> ResponseParser -> LockerCommand
//! LockerCommand -> raw wire text -> serial bytes
//! ```
//!
//! # Noise handling
//!
//! Frames that do not match the grammar, carry an unknown command code or
//! fail the parser's checksum policy are logged at debug level and dropped
//! without an error. Noisy lines produce them routinely and they must not end
//! the stream. The count of dropped frames is available from
//! [`LockerCodec::dropped_frames`].
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use lockerlink_protocol::{CommandRequestBuilder, LockerCodec};
//! use tokio_util::codec::Framed;
//!
//! # async fn example(port: tokio::io::DuplexStream) -> lockerlink_core::Result<()> {
//! let mut framed = Framed::new(port, LockerCodec::new());
//!
//! let open = CommandRequestBuilder::new().cell_number("133_1")?.build()?;
//! framed.send(open).await?;
//!
//! while let Some(report) = framed.next().await {
//!     println!("{}", report?);
//! }
//! # Ok(())
//! # }
//! ```

use crate::{assembler::FrameAssembler, message::LockerCommand, parser::ResponseParser};
use bytes::BytesMut;
use lockerlink_core::{Error, Result};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

/// Codec for locker serial streams.
#[derive(Debug, Default)]
pub struct LockerCodec {
    assembler: FrameAssembler,
    parser: ResponseParser,
    dropped: u64,
}

impl LockerCodec {
    /// Codec with a permissive parser.
    pub fn new() -> Self {
        Self::with_parser(ResponseParser::new())
    }

    /// Codec using `parser` for inbound frames, e.g. [`ResponseParser::strict`].
    pub fn with_parser(parser: ResponseParser) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            parser,
            dropped: 0,
        }
    }

    /// Number of complete frames dropped because they failed to parse.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }
}

impl Decoder for LockerCodec {
    type Item = LockerCommand;
    type Error = Error;

    /// Feed every buffered byte to the assembler and return the first frame
    /// that parses.
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use lockerlink_protocol::LockerCodec;
    /// use tokio_util::codec::Decoder;
    ///
    /// let mut codec = LockerCodec::new();
    /// let mut buffer = BytesMut::from(&b"junkPOST:1,1,10,4,0001=DF26\r\n"[..]);
    ///
    /// let command = codec.decode(&mut buffer).unwrap().unwrap();
    /// assert_eq!(command.cells, Some(vec![1]));
    /// assert!(buffer.is_empty());
    /// ```
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            // The assembler keeps its own partial-frame state
            let chunk = src.split();
            self.assembler.feed(&chunk);
        }

        while let Some(frame) = self.assembler.next_frame() {
            match self.parser.parse(frame.as_bytes()) {
                Ok(Some(command)) => return Ok(Some(command)),
                Ok(None) => {
                    self.dropped += 1;
                    debug!(frame = %frame, "Dropping malformed frame");
                }
                Err(e) => {
                    self.dropped += 1;
                    debug!(frame = %frame, error = %e, "Dropping unparseable frame");
                }
            }
        }

        Ok(None)
    }
}

impl Encoder<LockerCommand> for LockerCodec {
    type Error = Error;

    fn encode(&mut self, item: LockerCommand, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

impl Encoder<&LockerCommand> for LockerCodec {
    type Error = Error;

    fn encode(&mut self, item: &LockerCommand, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}
