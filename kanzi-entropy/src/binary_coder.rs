//! Binary entropy coder, C5: a carry-less arithmetic coder driven by a
//! [`Predictor`](crate::predictors::Predictor).
//!
//! The coder keeps a 56-bit `[low, high]` interval held in the bottom 56
//! bits of a `u64`. Each bit is coded by splitting the interval at `xmid`,
//! proportional to the predictor's estimate of `P(bit = 1)`; the interval
//! then renormalizes 32 bits at a time whenever its top 32 bits agree,
//! which is what makes the coder carry-less (no bytes already written are
//! ever revised).

use kanzi_core::bitstream::{BitReader, BitWriter};
use kanzi_core::error::Result;
use std::io::{Read, Write};

use crate::predictors::Predictor;

const TOP: u64 = (1u64 << 56) - 1;
const TOP_BITS: u32 = 56;
const MASK_24: u64 = (1u64 << 24) - 1;

#[inline]
fn split(low: u64, high: u64, p: i32) -> u64 {
    low + ((((high - low) >> 4) * p as u64) >> 8)
}

/// Encodes a bit stream using a predictor-driven binary arithmetic coder.
pub struct BinaryEncoder<P: Predictor, W: Write> {
    predictor: P,
    writer: BitWriter<W>,
    low: u64,
    high: u64,
}

impl<P: Predictor, W: Write> BinaryEncoder<P, W> {
    /// Create an encoder over `writer` using `predictor` for bit probabilities.
    pub fn new(writer: BitWriter<W>, predictor: P) -> Self {
        Self {
            predictor,
            writer,
            low: 0,
            high: TOP,
        }
    }

    /// Encode a single bit (`0` or `1`).
    pub fn encode_bit(&mut self, bit: u32) -> Result<()> {
        let p = self.predictor.predict();
        let xmid = split(self.low, self.high, p);
        debug_assert!(self.low <= xmid && xmid < self.high);
        if bit != 0 {
            self.high = xmid;
        } else {
            self.low = xmid + 1;
        }
        self.predictor.update(bit);

        while (self.low >> 24) == (self.high >> 24) {
            self.writer.write_bits(self.high >> 24, 32)?;
            self.low = (self.low & MASK_24) << 32;
            self.high = ((self.high & MASK_24) << 32) | 0xFFFF_FFFF;
        }
        Ok(())
    }

    /// Flush the remaining interval state and close the underlying bit writer.
    pub fn finish(mut self) -> Result<()> {
        self.writer.write_bits(self.low | 0x00FF_FFFF, TOP_BITS)?;
        self.writer.close()
    }

    /// Borrow the predictor (primarily for tests/diagnostics).
    pub fn predictor(&self) -> &P {
        &self.predictor
    }
}

/// Decodes a bit stream produced by [`BinaryEncoder`].
pub struct BinaryDecoder<P: Predictor, R: Read> {
    predictor: P,
    reader: BitReader<R>,
    low: u64,
    high: u64,
    current: u64,
}

impl<P: Predictor, R: Read> BinaryDecoder<P, R> {
    /// Create a decoder over `reader` using `predictor` for bit probabilities.
    pub fn new(mut reader: BitReader<R>, predictor: P) -> Result<Self> {
        let current = reader.read_bits(TOP_BITS)?;
        Ok(Self {
            predictor,
            reader,
            low: 0,
            high: TOP,
            current,
        })
    }

    /// Decode a single bit.
    pub fn decode_bit(&mut self) -> Result<u32> {
        let p = self.predictor.predict();
        let xmid = split(self.low, self.high, p);
        let bit = if self.current <= xmid { 1 } else { 0 };
        if bit != 0 {
            self.high = xmid;
        } else {
            self.low = xmid + 1;
        }
        self.predictor.update(bit);

        while (self.low >> 24) == (self.high >> 24) {
            self.low = (self.low & MASK_24) << 32;
            self.high = ((self.high & MASK_24) << 32) | 0xFFFF_FFFF;
            let chunk = self.reader.read_bits(32)?;
            self.current = ((self.current & MASK_24) << 32) | chunk;
        }
        Ok(bit)
    }
}
