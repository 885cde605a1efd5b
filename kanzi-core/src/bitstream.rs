//! Bit-level I/O operations for the entropy coding layer.
//!
//! This module provides [`BitReader`] and [`BitWriter`], the MSB-first,
//! big-endian bit channel every coder in this crate (Huffman, Range, ANS,
//! the binary arithmetic coder) is built on top of.
//!
//! # Bit ordering
//!
//! Bits are packed MSB-first within each 64-bit word, and words are written
//! to the backing byte channel big-endian: the first bit ever written ends
//! up as the most significant bit of the first byte.
//!
//! # Example
//!
//! ```
//! use kanzi_core::bitstream::{BitReader, BitWriter};
//! use std::io::Cursor;
//!
//! let mut output = Vec::new();
//! {
//!     let mut writer = BitWriter::new(&mut output);
//!     writer.write_bits(0b101, 3).unwrap();  // Write 3 bits
//!     writer.write_bits(0b1100, 4).unwrap(); // Write 4 bits
//!     writer.close().unwrap();
//! }
//!
//! let mut reader = BitReader::new(Cursor::new(&output));
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! ```

use crate::error::{EntropyError, Result};
use std::io::{Read, Write};

#[inline]
fn mask(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

/// A bit-level writer that wraps any [`Write`] implementation.
///
/// `BitWriter` packs bits MSB-first into a 64-bit accumulator that is
/// left-justified: the top `bits_in_buffer` bits of `buffer` hold the next
/// bits due to be flushed, in stream order. Once the accumulator fills, all
/// eight bytes are emitted big-endian.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    writer: W,
    buffer: u64,
    bits_in_buffer: u32,
    total_bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Create a new `BitWriter` wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_written: 0,
        }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Get a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Total number of bits written so far (including buffered, unflushed bits).
    pub fn bits_written(&self) -> u64 {
        self.total_bits_written
    }

    #[inline]
    fn flush_word(&mut self) -> Result<()> {
        self.writer.write_all(&self.buffer.to_be_bytes())?;
        self.buffer = 0;
        self.bits_in_buffer = 0;
        Ok(())
    }

    /// Write a single bit.
    pub fn write_bit(&mut self, bit: u32) -> Result<()> {
        self.write_bits((bit & 1) as u64, 1)
    }

    /// Write the low `n` bits of `value`, MSB-first, with 1 ≤ n ≤ 64.
    pub fn write_bits(&mut self, value: u64, n: u32) -> Result<()> {
        debug_assert!((1..=64).contains(&n), "write_bits: n must be in 1..=64");

        let mut n = n;
        let mut value = value & mask(n);

        while n > 0 {
            let space = 64 - self.bits_in_buffer;
            let take = n.min(space);
            let shift_out = n - take;
            let chunk = (value >> shift_out) & mask(take);
            self.buffer |= chunk << (space - take);
            self.bits_in_buffer += take;
            self.total_bits_written += take as u64;
            n -= take;
            value &= mask(n);

            if self.bits_in_buffer == 64 {
                self.flush_word()?;
            }
        }

        Ok(())
    }

    /// Flush any buffered bits, padding the final byte with zero bits.
    ///
    /// Idempotent: calling `close` again after a successful close writes
    /// nothing further, since no bits remain buffered.
    pub fn close(&mut self) -> Result<()> {
        if self.bits_in_buffer > 0 {
            let nbytes = self.bits_in_buffer.div_ceil(8) as usize;
            let bytes = self.buffer.to_be_bytes();
            self.writer.write_all(&bytes[..nbytes])?;
            self.buffer = 0;
            self.bits_in_buffer = 0;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// A bit-level reader that wraps any [`Read`] implementation.
///
/// Mirrors [`BitWriter`]'s left-justified accumulator: the top
/// `bits_in_buffer` bits of `buffer` are the next bits due to be consumed,
/// in stream order.
///
/// The accumulator is a `u128`, twice as wide as the 64 bits `read_bits` can
/// return in one call: refilling by whole bytes can leave up to 7 leftover
/// bits from a prior read sitting above a freshly read 64-bit field, and a
/// 64-bit-only accumulator has no room left to hold that overhang.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    reader: R,
    buffer: u128,
    bits_in_buffer: u32,
    total_bits_read: u64,
}

impl<R: Read> BitReader<R> {
    /// Create a new `BitReader` wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_read: 0,
        }
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Get a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Total number of bits consumed so far.
    pub fn bits_read(&self) -> u64 {
        self.total_bits_read
    }

    /// Ensure at least `count` bits are buffered, reading whole bytes as needed.
    #[inline]
    fn fill_buffer(&mut self, count: u32) -> Result<()> {
        debug_assert!(count <= 64, "fill_buffer: count must be <= 64");

        while self.bits_in_buffer < count {
            let mut byte = [0u8; 1];
            match self.reader.read(&mut byte) {
                Ok(0) => return Err(EntropyError::end_of_stream(count - self.bits_in_buffer)),
                Ok(_) => {
                    // Byte lands immediately after the currently valid bits,
                    // left-justified in the 128-bit accumulator.
                    let shift = 128 - self.bits_in_buffer - 8;
                    self.buffer |= (byte[0] as u128) << shift;
                    self.bits_in_buffer += 8;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<u32> {
        Ok(self.read_bits(1)? as u32)
    }

    /// Read `n` bits (1 ≤ n ≤ 64), MSB-first, returning them as a non-negative integer.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        debug_assert!((1..=64).contains(&n), "read_bits: n must be in 1..=64");

        self.fill_buffer(n)?;

        let result = (self.buffer >> (128 - n)) as u64;
        self.buffer <<= n;
        self.bits_in_buffer -= n;
        self.total_bits_read += n as u64;

        Ok(result)
    }

    /// Peek at the next `n` bits without consuming them.
    pub fn peek_bits(&mut self, n: u32) -> Result<u64> {
        self.fill_buffer(n)?;
        Ok((self.buffer >> (128 - n)) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_roundtrip_small_fields() {
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            w.write_bits(0b101, 3).unwrap();
            w.write_bits(0b1100, 4).unwrap();
            w.write_bits(0, 1).unwrap();
            w.close().unwrap();
        }
        let mut r = BitReader::new(Cursor::new(&out));
        assert_eq!(r.read_bits(3).unwrap(), 0b101);
        assert_eq!(r.read_bits(4).unwrap(), 0b1100);
        assert_eq!(r.read_bits(1).unwrap(), 0);
    }

    #[test]
    fn test_big_endian_byte_order() {
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            w.write_bits(0xAB, 8).unwrap();
            w.close().unwrap();
        }
        assert_eq!(out, vec![0xAB]);
    }

    #[test]
    fn test_64_bit_values_split_across_words() {
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            w.write_bits(0b11, 2).unwrap();
            w.write_bits(u64::MAX, 64).unwrap();
            w.close().unwrap();
        }
        let mut r = BitReader::new(Cursor::new(&out));
        assert_eq!(r.read_bits(2).unwrap(), 0b11);
        assert_eq!(r.read_bits(64).unwrap(), u64::MAX);
    }

    #[test]
    fn test_close_pads_with_zero_bits() {
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            w.write_bits(0b1, 1).unwrap();
            w.close().unwrap();
        }
        assert_eq!(out, vec![0b1000_0000]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        w.write_bits(0b10110, 5).unwrap();
        w.close().unwrap();
        w.close().unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_end_of_stream_error() {
        let data: Vec<u8> = vec![0xFF];
        let mut r = BitReader::new(Cursor::new(data));
        r.read_bits(8).unwrap();
        assert!(matches!(
            r.read_bits(1),
            Err(EntropyError::EndOfStream { .. })
        ));
    }

    #[test]
    fn test_many_small_writes_match_many_small_reads() {
        let mut out = Vec::new();
        let values: Vec<(u64, u32)> = vec![
            (1, 1), (0, 1), (0b111, 3), (0xFF, 8), (0x3, 2), (0xABCD, 16), (0, 5),
        ];
        {
            let mut w = BitWriter::new(&mut out);
            for &(v, n) in &values {
                w.write_bits(v, n).unwrap();
            }
            w.close().unwrap();
        }
        let mut r = BitReader::new(Cursor::new(&out));
        for &(v, n) in &values {
            assert_eq!(r.read_bits(n).unwrap(), v & mask(n));
        }
    }
}
