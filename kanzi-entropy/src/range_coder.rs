//! Order-0 range coder, C7: a carryless Subbotin-style range coder over a
//! per-chunk frequency table.
//!
//! Unlike the bit-probability range coder the entropy crate's Huffman/LZMA
//! neighbor uses, this coder works directly on byte frequencies: the chunk's
//! normalized histogram (built by [`crate::alphabet::normalize_frequencies`])
//! becomes a cumulative frequency table, and each byte is coded against its
//! `[cum_freq, cum_freq + freq)` sub-interval of the current range. `low`
//! and `range` live in the bottom 60 bits of a `u64`; renormalization shifts
//! 28 bits at a time whenever the top 28 bits of `low` and `low + range`
//! agree, or the range has shrunk below `BOTTOM_RANGE` — the classic
//! carryless design shared by the wider LZMA/range-coder family this
//! crate's bitstream layer is grounded on, scaled up from 32-bit words to
//! 60-bit ones.

use kanzi_core::bitstream::{BitReader, BitWriter};
use kanzi_core::error::{EntropyError, Result};
use std::io::{Read, Write};

const TOP_RANGE: u64 = 0x0FFF_FFFF_FFFF_FFFF;
const BOTTOM_RANGE: u64 = 0x0000_0000_0000_FFFF;
const RENORM_BITS: u32 = 28;
const RENORM_SETTLED: u64 = 1u64 << 32;
const STATE_BITS: u32 = 60;

/// A per-chunk cumulative frequency table over the 256-symbol byte alphabet.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    freqs: [u32; 256],
    cum: [u32; 257],
    log_range: u32,
}

impl FrequencyTable {
    /// Build a cumulative table from normalized per-symbol frequencies
    /// (as produced by [`crate::alphabet::normalize_frequencies`]) whose sum
    /// is exactly `1 << log_range`.
    pub fn new(freqs: [u32; 256], log_range: u32) -> Result<Self> {
        if !(8..=16).contains(&log_range) {
            return Err(EntropyError::invalid_argument(
                "log_range",
                log_range as i64,
                "8..=16",
            ));
        }
        let mut cum = [0u32; 257];
        for i in 0..256 {
            cum[i + 1] = cum[i] + freqs[i];
        }
        if cum[256] != 1u32 << log_range {
            return Err(EntropyError::invalid_argument(
                "freqs",
                cum[256] as i64,
                "sum equal to 1 << log_range",
            ));
        }
        Ok(Self {
            freqs,
            cum,
            log_range,
        })
    }

    fn find_symbol(&self, target: u32) -> u8 {
        let idx = self.cum.partition_point(|&c| c <= target);
        (idx - 1) as u8
    }

    /// Frequency of `symbol` (`0` if absent from the alphabet).
    pub(crate) fn freq(&self, symbol: u8) -> u32 {
        self.freqs[symbol as usize]
    }

    /// Cumulative frequency below `symbol`.
    pub(crate) fn cum_freq(&self, symbol: u8) -> u32 {
        self.cum[symbol as usize]
    }

    /// `log2` of the total frequency scale.
    pub(crate) fn log_range(&self) -> u32 {
        self.log_range
    }

    /// Symbol whose `[cum_freq, cum_freq + freq)` interval contains `target`.
    pub(crate) fn symbol_at(&self, target: u32) -> u8 {
        self.find_symbol(target)
    }
}

/// Encodes bytes against a [`FrequencyTable`] using a carryless range coder.
pub struct RangeEncoder<W: Write> {
    writer: BitWriter<W>,
    low: u64,
    range: u64,
}

impl<W: Write> RangeEncoder<W> {
    /// Create a new encoder writing to `writer`.
    pub fn new(writer: BitWriter<W>) -> Self {
        Self {
            writer,
            low: 0,
            range: TOP_RANGE,
        }
    }

    /// Encode one byte against `table`.
    pub fn encode(&mut self, table: &FrequencyTable, symbol: u8) -> Result<()> {
        let sym = symbol as usize;
        let cum_freq = table.cum[sym] as u64;
        let freq = table.freqs[sym] as u64;
        self.range >>= table.log_range;
        self.low = (self.low + cum_freq * self.range) & TOP_RANGE;
        self.range *= freq;
        self.normalize()
    }

    fn normalize(&mut self) -> Result<()> {
        loop {
            if (self.low ^ (self.low + self.range)) < RENORM_SETTLED {
                // top 28 bits settled, fall through to shift
            } else if self.range <= BOTTOM_RANGE {
                self.range = (!(self.low.wrapping_sub(1))) & BOTTOM_RANGE;
            } else {
                break;
            }
            self.writer.write_bits(self.low >> 32, RENORM_BITS)?;
            self.low = (self.low << RENORM_BITS) & TOP_RANGE;
            self.range = (self.range << RENORM_BITS) & TOP_RANGE;
        }
        Ok(())
    }

    /// Flush remaining state and close the underlying bit writer.
    pub fn finish(mut self) -> Result<()> {
        self.writer.write_bits(self.low, STATE_BITS)?;
        self.writer.close()
    }
}

/// Decodes bytes against a [`FrequencyTable`] using a carryless range coder.
pub struct RangeDecoder<R: Read> {
    reader: BitReader<R>,
    low: u64,
    range: u64,
    code: u64,
}

impl<R: Read> RangeDecoder<R> {
    /// Create a new decoder reading from `reader`.
    pub fn new(mut reader: BitReader<R>) -> Result<Self> {
        let code = reader.read_bits(STATE_BITS)?;
        Ok(Self {
            reader,
            low: 0,
            range: TOP_RANGE,
            code,
        })
    }

    /// Decode one byte against `table`.
    pub fn decode(&mut self, table: &FrequencyTable) -> Result<u8> {
        self.range >>= table.log_range;
        let target = (self.code - self.low) / self.range;
        let target = target.min((1u64 << table.log_range) - 1) as u32;
        let symbol = table.find_symbol(target);

        let sym = symbol as usize;
        self.low = (self.low + table.cum[sym] as u64 * self.range) & TOP_RANGE;
        self.range *= table.freqs[sym] as u64;
        self.normalize()?;
        Ok(symbol)
    }

    fn normalize(&mut self) -> Result<()> {
        loop {
            if (self.low ^ (self.low + self.range)) < RENORM_SETTLED {
                // fall through to shift
            } else if self.range <= BOTTOM_RANGE {
                self.range = (!(self.low.wrapping_sub(1))) & BOTTOM_RANGE;
            } else {
                break;
            }
            let chunk = self.reader.read_bits(RENORM_BITS)?;
            self.code = ((self.code << RENORM_BITS) & TOP_RANGE) | chunk;
            self.low = (self.low << RENORM_BITS) & TOP_RANGE;
            self.range = (self.range << RENORM_BITS) & TOP_RANGE;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn uniform_table() -> FrequencyTable {
        let freqs = [256u32; 256];
        FrequencyTable::new(freqs, 16).unwrap()
    }

    fn skewed_table() -> FrequencyTable {
        let mut freqs = [1u32; 256];
        freqs[b'a' as usize] = 65536 - 255;
        FrequencyTable::new(freqs, 16).unwrap()
    }

    #[test]
    fn test_roundtrip_uniform() {
        let table = uniform_table();
        let input: Vec<u8> = (0..=255u16).map(|i| (i % 256) as u8).collect();

        let mut buf = Vec::new();
        {
            let mut enc = RangeEncoder::new(BitWriter::new(&mut buf));
            for &b in &input {
                enc.encode(&table, b).unwrap();
            }
            enc.finish().unwrap();
        }

        let mut dec = RangeDecoder::new(BitReader::new(Cursor::new(&buf))).unwrap();
        for &expected in &input {
            assert_eq!(dec.decode(&table).unwrap(), expected);
        }
    }

    #[test]
    fn test_skewed_distribution_compresses() {
        let table = skewed_table();
        let input = vec![b'a'; 5000];

        let mut buf = Vec::new();
        {
            let mut enc = RangeEncoder::new(BitWriter::new(&mut buf));
            for &b in &input {
                enc.encode(&table, b).unwrap();
            }
            enc.finish().unwrap();
        }
        assert!(buf.len() < input.len() / 4);

        let mut dec = RangeDecoder::new(BitReader::new(Cursor::new(&buf))).unwrap();
        for &expected in &input {
            assert_eq!(dec.decode(&table).unwrap(), expected);
        }
    }

    #[test]
    fn test_rejects_bad_frequency_sum() {
        let freqs = [1u32; 256];
        assert!(FrequencyTable::new(freqs, 16).is_err());
    }
}
