use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Size of the `int32` length prefix.
pub const HEADER_LEN: usize = 4;

/// Produces/consumes raw frames: a big-endian `int32` length followed by that many bytes.
/// Decoding of the payload into an `Event` happens in the connection layer.
///
/// The decoder leaves a frame in the read buffer until all of it has arrived, so a
/// non-empty buffer between frames always means "frame in progress".
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
    max_frame_length: usize,
}

impl FrameCodec {
    pub fn new(max_frame_length: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(HEADER_LEN)
            .big_endian()
            .max_frame_length(max_frame_length)
            .new_codec();
        Self { inner, max_frame_length }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(16 * 1024 * 1024)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let declared = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if declared < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("negative frame length {}", declared),
            ));
        }
        let len = declared as usize;
        if len > self.max_frame_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame length {} exceeds limit {}", len, self.max_frame_length),
            ));
        }
        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }
        match self.inner.decode(src)? {
            Some(buf) => Ok(Some(buf.freeze())),
            None => Ok(None),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(item, dst)
    }
}
