//! Asymmetric numeral system coder, C8: order-0 and order-1 rANS over the
//! same per-chunk [`FrequencyTable`](crate::range_coder::FrequencyTable)
//! used by the range coder.
//!
//! This is the byte-wise renormalizing rANS design ("ryg_rans"-style,
//! grounded on the `rans32` reference in this crate's retrieval pack):
//! state lives in a single `u32`, renormalizes 8 bits at a time, and symbols
//! must be encoded in *reverse* order so that the emitted byte stream reads
//! forward under decoding. [`encode_order0`]/[`decode_order0`] hide that
//! detail behind a whole-block API; the order-1 variants additionally
//! select one of 256 frequency tables by the preceding byte (context index
//! `prev << 8 | cur` is owned by the caller building those tables, per the
//! chosen convention that the *previous* byte indexes the table array).

use kanzi_core::bitstream::{BitReader, BitWriter};
use kanzi_core::error::Result;
use std::io::{Read, Write};

use crate::range_coder::FrequencyTable;

const RANS_L: u32 = 1 << 23;

/// Low-level rANS encoder. Symbols must be fed in reverse stream order.
struct RansEncoder {
    x: u32,
    out: Vec<u8>,
}

impl RansEncoder {
    fn new() -> Self {
        Self { x: RANS_L, out: Vec::new() }
    }

    fn encode(&mut self, table: &FrequencyTable, symbol: u8) {
        let freq = table.freq(symbol);
        let scale_bits = table.log_range();
        let x_max = ((RANS_L >> scale_bits) << 8) * freq;
        while self.x >= x_max {
            self.out.push((self.x & 0xFF) as u8);
            self.x >>= 8;
        }
        self.x = ((self.x / freq) << scale_bits) + (self.x % freq) + table.cum_freq(symbol);
    }

    fn finish<W: Write>(self, writer: &mut BitWriter<W>) -> Result<()> {
        writer.write_bits(self.x as u64, 32)?;
        for &b in self.out.iter().rev() {
            writer.write_bits(b as u64, 8)?;
        }
        Ok(())
    }
}

/// Low-level rANS decoder, mirroring [`RansEncoder`].
struct RansDecoder<R: Read> {
    reader: BitReader<R>,
    x: u32,
}

impl<R: Read> RansDecoder<R> {
    fn new(mut reader: BitReader<R>) -> Result<Self> {
        let x = reader.read_bits(32)? as u32;
        Ok(Self { reader, x })
    }

    fn decode(&mut self, table: &FrequencyTable) -> Result<u8> {
        let scale_bits = table.log_range();
        let slot = self.x & ((1u32 << scale_bits) - 1);
        let symbol = table.symbol_at(slot);
        let freq = table.freq(symbol);
        self.x = freq.wrapping_mul(self.x >> scale_bits) + slot - table.cum_freq(symbol);
        while self.x < RANS_L {
            self.x = (self.x << 8) | self.reader.read_bits(8)? as u32;
        }
        Ok(symbol)
    }
}

/// Encode `symbols` against a single order-0 frequency table.
pub fn encode_order0<W: Write>(
    writer: &mut BitWriter<W>,
    table: &FrequencyTable,
    symbols: &[u8],
) -> Result<()> {
    let mut enc = RansEncoder::new();
    for &s in symbols.iter().rev() {
        enc.encode(table, s);
    }
    enc.finish(writer)
}

/// Decode `count` symbols against a single order-0 frequency table.
pub fn decode_order0<R: Read>(
    reader: BitReader<R>,
    table: &FrequencyTable,
    count: usize,
) -> Result<Vec<u8>> {
    let mut dec = RansDecoder::new(reader)?;
    let mut out = vec![0u8; count];
    for slot in out.iter_mut() {
        *slot = dec.decode(table)?;
    }
    Ok(out)
}

/// Encode `symbols` against 256 order-1 frequency tables indexed by the
/// preceding byte (`0` for the first symbol).
///
/// `tables` must hold exactly 256 entries; it is taken as a slice (rather
/// than `[FrequencyTable; 256]`) so callers can keep the table set on the
/// heap instead of materializing a multi-hundred-kilobyte array on the
/// stack.
pub fn encode_order1<W: Write>(
    writer: &mut BitWriter<W>,
    tables: &[FrequencyTable],
    symbols: &[u8],
) -> Result<()> {
    debug_assert_eq!(tables.len(), 256);
    let mut enc = RansEncoder::new();
    for i in (0..symbols.len()).rev() {
        let prev = if i == 0 { 0 } else { symbols[i - 1] };
        enc.encode(&tables[prev as usize], symbols[i]);
    }
    enc.finish(writer)
}

/// Decode `count` symbols against 256 order-1 frequency tables indexed by
/// the preceding decoded byte (`0` for the first symbol).
pub fn decode_order1<R: Read>(
    reader: BitReader<R>,
    tables: &[FrequencyTable],
    count: usize,
) -> Result<Vec<u8>> {
    debug_assert_eq!(tables.len(), 256);
    let mut dec = RansDecoder::new(reader)?;
    let mut out = vec![0u8; count];
    let mut prev = 0u8;
    for slot in out.iter_mut() {
        let sym = dec.decode(&tables[prev as usize])?;
        *slot = sym;
        prev = sym;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn uniform_table() -> FrequencyTable {
        FrequencyTable::new([256u32; 256], 16).unwrap()
    }

    fn skewed_table(heavy: u8) -> FrequencyTable {
        let mut freqs = [1u32; 256];
        freqs[heavy as usize] = 65536 - 255;
        FrequencyTable::new(freqs, 16).unwrap()
    }

    #[test]
    fn test_order0_roundtrip_uniform() {
        let table = uniform_table();
        let input: Vec<u8> = (0..500u32).map(|i| (i % 256) as u8).collect();

        let mut buf = Vec::new();
        {
            let mut w = BitWriter::new(&mut buf);
            encode_order0(&mut w, &table, &input).unwrap();
            w.close().unwrap();
        }
        let r = BitReader::new(Cursor::new(&buf));
        let out = decode_order0(r, &table, input.len()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_order0_skewed_compresses() {
        let table = skewed_table(b'x');
        let input = vec![b'x'; 4000];

        let mut buf = Vec::new();
        {
            let mut w = BitWriter::new(&mut buf);
            encode_order0(&mut w, &table, &input).unwrap();
            w.close().unwrap();
        }
        assert!(buf.len() < input.len() / 4);

        let r = BitReader::new(Cursor::new(&buf));
        let out = decode_order0(r, &table, input.len()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_order1_roundtrip_markov_source() {
        // Strictly alternating source: a Markov-1 model should compress it
        // far better than an order-0 one.
        let input: Vec<u8> = (0..2000).map(|i| if i % 2 == 0 { b'a' } else { b'b' }).collect();

        let mut table_array: Vec<FrequencyTable> = Vec::with_capacity(256);
        for ctx in 0..256u16 {
            table_array.push(if ctx == b'a' as u16 {
                skewed_table(b'b')
            } else if ctx == b'b' as u16 {
                skewed_table(b'a')
            } else {
                uniform_table()
            });
        }
        let tables = table_array;

        let mut buf = Vec::new();
        {
            let mut w = BitWriter::new(&mut buf);
            encode_order1(&mut w, &tables, &input).unwrap();
            w.close().unwrap();
        }
        assert!(buf.len() < input.len() / 4);

        let r = BitReader::new(Cursor::new(&buf));
        let out = decode_order1(r, &tables, input.len()).unwrap();
        assert_eq!(out, input);
    }
}
