//! Byte codec shared by the sync protocol and the state records.
//!
//! Every value goes through bincode configured for variable-length integers:
//! an unsigned value below 251 is one byte, otherwise a marker byte (251, 252
//! or 253) is followed by the value as a little-endian `u16`, `u32` or `u64`.
//! Counts are written as `u64` with the same rule, so reader and writer stay
//! symmetric without a separate length framing.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

/// Errors raised while encoding or decoding sync payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// bincode rejected a value.
    #[error("value codec failed: {0}")]
    Value(#[from] bincode::Error),
    /// The payload ended before a fixed-size chunk could be read.
    #[error("payload truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes requested.
        needed: usize,
        /// Bytes left in the payload.
        remaining: usize,
    },
    /// A count exceeded what the remaining payload could possibly hold.
    #[error("count {count} exceeds the {remaining} bytes left in the payload")]
    CountTooLarge {
        /// Decoded count.
        count: u64,
        /// Bytes left in the payload.
        remaining: usize,
    },
    /// A field mask referenced fields the record does not have.
    #[error("record {record} has no fields for mask {bits:#x}")]
    UnknownFields {
        /// Record name.
        record: &'static str,
        /// Offending mask.
        bits: u64,
    },
    /// An enumerated value carried a code outside its range.
    #[error("unknown {kind} code {code}")]
    UnknownCode {
        /// Name of the enumeration.
        kind: &'static str,
        /// Offending code.
        code: u8,
    },
    /// A fixed-length array decoded to the wrong number of items.
    #[error("expected {expected} items, decoded {actual}")]
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Decoded length.
        actual: usize,
    },
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_varint_encoding()
        .with_little_endian()
}

/// Append-only writer for sync payloads.
#[derive(Clone, Debug, Default)]
pub struct Encoder {
    bytes: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one serde value.
    pub fn write<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: Serialize + ?Sized,
    {
        options().serialize_into(&mut self.bytes, value)?;
        Ok(())
    }

    /// Appends a collection length.
    pub fn write_count(&mut self, count: usize) -> Result<(), CodecError> {
        self.write(&(count as u64))
    }

    /// Appends bytes verbatim.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Reports whether nothing was written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Finishes the payload.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Cursor over a sync payload.
#[derive(Clone, Debug)]
pub struct Decoder<'a> {
    input: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Starts decoding `input` from its first byte.
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    /// Reads one serde value.
    pub fn read<T>(&mut self) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        Ok(options().deserialize_from(&mut self.input)?)
    }

    /// Reads a collection length written by [`Encoder::write_count`].
    ///
    /// Every counted item takes at least one byte, so counts larger than the
    /// remaining payload are rejected before anything is allocated.
    pub fn read_count(&mut self) -> Result<usize, CodecError> {
        let count: u64 = self.read()?;
        let remaining = self.input.len();
        if count > remaining as u64 {
            return Err(CodecError::CountTooLarge { count, remaining });
        }
        Ok(count as usize)
    }

    /// Reads `len` bytes verbatim.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.input.len() < len {
            return Err(CodecError::Truncated {
                needed: len,
                remaining: self.input.len(),
            });
        }
        let (head, tail) = self.input.split_at(len);
        self.input = tail;
        Ok(head)
    }

    /// Bytes not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    /// Reports whether the whole payload was consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}
