//! Entropy codec factory, C9: a dispatch table over every coder in this
//! crate, plus the chunk framing that lets a caller compress an arbitrarily
//! large buffer as a sequence of independently decodable chunks.
//!
//! The stream layout is: an 8-byte total length, a 4-byte chunk size, then
//! one frame per chunk. Each frame opens with a 4-bit [`EntropyKind`] tag
//! followed by that coder's own header and payload. Keeping each chunk
//! self-contained (its own Huffman/frequency header, its own fresh
//! predictor state) trades a little compression ratio at chunk boundaries
//! for independent decodability, the same trade the bzip2/LZMA-family
//! teacher this crate is adapted from makes at its own block boundaries.

use kanzi_core::bitstream::{BitReader, BitWriter};
use kanzi_core::error::{EntropyError, Result};
use std::io::{Read, Write};

use crate::alphabet::{normalize_frequencies, read_alphabet, write_alphabet};
use crate::ans_coder;
use crate::binary_coder::{BinaryDecoder, BinaryEncoder};
use crate::huffman::{self, HuffmanTable};
use crate::predictors::cm::CmPredictor;
use crate::predictors::fpaq::FpaqPredictor;
use crate::predictors::tpaq::TpaqPredictor;
use crate::predictors::Predictor;
use crate::range_coder::{FrequencyTable, RangeDecoder, RangeEncoder};

/// Default chunk size used when the caller does not pick one explicitly.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 16;

/// Which coder a chunk (or frame) was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyKind {
    /// No entropy coding; the chunk is stored verbatim.
    None = 0,
    /// Canonical Huffman coding (C6).
    Huffman = 1,
    /// Order-0 bitwise arithmetic coding (C4 FPAQ + C5).
    Fpaq = 2,
    /// Historical-naming alias for `Cm`: the same CM-predictor-backed binary
    /// coder, constructed under the tag this family of coders was first
    /// published under.
    Paq = 3,
    /// Order-0 byte-wise range coding (C7).
    Range = 4,
    /// Order-0 rANS coding (C8).
    Ans0 = 5,
    /// Two-counter context-mixing bitwise coding (C4 CM + C5).
    Cm = 6,
    /// Neural-mixer context-mixing bitwise coding (C4 TPAQ + C5).
    Tpaq = 7,
    /// Order-1 rANS coding (C8).
    Ans1 = 8,
    /// TPAQ with an extra SSE refinement pass.
    TpaqX = 9,
}

impl EntropyKind {
    fn from_tag(tag: u64) -> Result<Self> {
        Ok(match tag {
            0 => EntropyKind::None,
            1 => EntropyKind::Huffman,
            2 => EntropyKind::Fpaq,
            3 => EntropyKind::Paq,
            4 => EntropyKind::Range,
            5 => EntropyKind::Ans0,
            6 => EntropyKind::Cm,
            7 => EntropyKind::Tpaq,
            8 => EntropyKind::Ans1,
            9 => EntropyKind::TpaqX,
            other => {
                return Err(EntropyError::invalid_stream(
                    0,
                    format!("unknown entropy kind tag {other}"),
                ))
            }
        })
    }
}

fn histogram(data: &[u8]) -> [u64; 256] {
    let mut h = [0u64; 256];
    for &b in data {
        h[b as usize] += 1;
    }
    h
}

fn write_freq_table<W: Write>(writer: &mut BitWriter<W>, freqs: &[u32; 256], log_range: u32) -> Result<()> {
    writer.write_bits(log_range as u64, 5)?;
    let alphabet: Vec<u8> = (0u8..=255).filter(|&s| freqs[s as usize] > 0).collect();
    write_alphabet(writer, &alphabet)?;
    // Frequencies range over [1, 1 << log_range] (a single-symbol alphabet
    // gets the full scale); storing freq - 1 keeps every value within
    // log_range bits instead of needing log_range + 1 for the top value.
    for &s in &alphabet {
        writer.write_bits((freqs[s as usize] - 1) as u64, log_range)?;
    }
    Ok(())
}

fn read_freq_table<R: Read>(reader: &mut BitReader<R>) -> Result<([u32; 256], u32)> {
    let log_range = reader.read_bits(5)? as u32;
    let alphabet = read_alphabet(reader)?;
    let mut freqs = [0u32; 256];
    for &s in &alphabet {
        freqs[s as usize] = reader.read_bits(log_range)? as u32 + 1;
    }
    Ok((freqs, log_range))
}

#[inline(never)]
fn encode_predictor_chunk<P: Predictor, W: Write>(
    writer: &mut BitWriter<W>,
    predictor: P,
    data: &[u8],
) -> Result<()> {
    let mut enc = BinaryEncoder::new(BitWriter::new(FrameWriter(writer)), predictor);
    for &byte in data {
        for i in (0..8).rev() {
            enc.encode_bit(((byte >> i) & 1) as u32)?;
        }
    }
    enc.finish()
}

#[inline(never)]
fn decode_predictor_chunk<P: Predictor, R: Read>(
    reader: &mut BitReader<R>,
    predictor: P,
    count: usize,
) -> Result<Vec<u8>> {
    let mut dec = BinaryDecoder::new(BitReader::new(FrameReader(reader)), predictor)?;
    let mut out = vec![0u8; count];
    for slot in out.iter_mut() {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | dec.decode_bit()? as u8;
        }
        *slot = byte;
    }
    Ok(out)
}

/// Adapts a borrowed `BitWriter<W>` into a byte sink so predictor-coded
/// frames can share the chunk's outer bit writer instead of each owning one.
struct FrameWriter<'a, W: Write>(&'a mut BitWriter<W>);

impl<W: Write> Write for FrameWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for &b in buf {
            self.0
                .write_bits(b as u64, 8)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Adapts a borrowed `BitReader<R>` into a byte source for the same reason.
struct FrameReader<'a, R: Read>(&'a mut BitReader<R>);

impl<R: Read> Read for FrameReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        for slot in buf.iter_mut() {
            let bits = self
                .0
                .read_bits(8)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            *slot = bits as u8;
        }
        Ok(buf.len())
    }
}

#[inline(never)]
fn compress_chunk<W: Write>(
    writer: &mut BitWriter<W>,
    kind: EntropyKind,
    chunk: &[u8],
    log_range: u32,
) -> Result<()> {
    writer.write_bits(kind as u64, 4)?;
    match kind {
        EntropyKind::None => {
            for &b in chunk {
                writer.write_bits(b as u64, 8)?;
            }
        }
        EntropyKind::Huffman => {
            let hist = histogram(chunk);
            let mut freqs32 = [0u32; 256];
            for i in 0..256 {
                freqs32[i] = hist[i].min(u32::MAX as u64) as u32;
            }
            let lengths = huffman::build_code_lengths(&freqs32, huffman::MAX_CODE_LEN as u8);
            huffman::write_header(writer, &lengths)?;
            let table = HuffmanTable::from_lengths(&lengths)?;
            for &b in chunk {
                table.encode(writer, b)?;
            }
        }
        EntropyKind::Fpaq => encode_predictor_chunk(writer, FpaqPredictor::new(), chunk)?,
        EntropyKind::Cm | EntropyKind::Paq => {
            encode_predictor_chunk(writer, CmPredictor::default(), chunk)?
        }
        EntropyKind::Tpaq => {
            encode_predictor_chunk(writer, TpaqPredictor::with_block_size(chunk.len(), false), chunk)?
        }
        EntropyKind::TpaqX => {
            encode_predictor_chunk(writer, TpaqPredictor::with_block_size(chunk.len(), true), chunk)?
        }
        EntropyKind::Range => {
            let hist = histogram(chunk);
            let (_, freqs) = normalize_frequencies(&hist, log_range)?;
            write_freq_table(writer, &freqs, log_range)?;
            let table = FrequencyTable::new(freqs, log_range)?;
            let mut enc = RangeEncoder::new(BitWriter::new(FrameWriter(writer)));
            for &b in chunk {
                enc.encode(&table, b)?;
            }
            enc.finish()?;
        }
        EntropyKind::Ans0 => {
            let hist = histogram(chunk);
            let (_, freqs) = normalize_frequencies(&hist, log_range)?;
            write_freq_table(writer, &freqs, log_range)?;
            let table = FrequencyTable::new(freqs, log_range)?;
            ans_coder::encode_order0(writer, &table, chunk)?;
        }
        EntropyKind::Ans1 => {
            const ORDER1_LOG_RANGE: u32 = 8;
            // Contexts that never occur as a "previous byte" in this chunk
            // have no observations to normalize; fall back to a uniform
            // histogram so every one of the 256 tables is still well-formed
            // (its table is transmitted but never exercised by the decoder).
            const UNIFORM_CTX_HIST: [u64; 256] = [1; 256];
            let mut tables: Vec<FrequencyTable> = Vec::with_capacity(256);
            let mut per_ctx_hist = vec![[0u64; 256]; 256];
            for i in 0..chunk.len() {
                let ctx = if i == 0 { 0usize } else { chunk[i - 1] as usize };
                per_ctx_hist[ctx][chunk[i] as usize] += 1;
            }
            for ctx_hist in &per_ctx_hist {
                let total: u64 = ctx_hist.iter().sum();
                let source = if total == 0 { &UNIFORM_CTX_HIST } else { ctx_hist };
                let (_, freqs) = normalize_frequencies(source, ORDER1_LOG_RANGE)?;
                write_freq_table(writer, &freqs, ORDER1_LOG_RANGE)?;
                tables.push(FrequencyTable::new(freqs, ORDER1_LOG_RANGE)?);
            }
            ans_coder::encode_order1(writer, &tables, chunk)?;
        }
    }
    Ok(())
}

#[inline(never)]
fn decompress_chunk<R: Read>(reader: &mut BitReader<R>, chunk_len: usize) -> Result<Vec<u8>> {
    let tag = reader.read_bits(4)?;
    let kind = EntropyKind::from_tag(tag)?;
    match kind {
        EntropyKind::None => {
            let mut out = vec![0u8; chunk_len];
            for slot in out.iter_mut() {
                *slot = reader.read_bits(8)? as u8;
            }
            Ok(out)
        }
        EntropyKind::Huffman => {
            let lengths = huffman::read_header(reader)?;
            let table = HuffmanTable::from_lengths(&lengths)?;
            let mut out = vec![0u8; chunk_len];
            for slot in out.iter_mut() {
                *slot = table.decode(reader)?;
            }
            Ok(out)
        }
        EntropyKind::Fpaq => decode_predictor_chunk(reader, FpaqPredictor::new(), chunk_len),
        EntropyKind::Cm | EntropyKind::Paq => {
            decode_predictor_chunk(reader, CmPredictor::default(), chunk_len)
        }
        EntropyKind::Tpaq => decode_predictor_chunk(
            reader,
            TpaqPredictor::with_block_size(chunk_len, false),
            chunk_len,
        ),
        EntropyKind::TpaqX => decode_predictor_chunk(
            reader,
            TpaqPredictor::with_block_size(chunk_len, true),
            chunk_len,
        ),
        EntropyKind::Range => {
            let (freqs, log_range) = read_freq_table(reader)?;
            let table = FrequencyTable::new(freqs, log_range)?;
            let mut dec = RangeDecoder::new(BitReader::new(FrameReader(reader)))?;
            let mut out = vec![0u8; chunk_len];
            for slot in out.iter_mut() {
                *slot = dec.decode(&table)?;
            }
            Ok(out)
        }
        EntropyKind::Ans0 => {
            let (freqs, log_range) = read_freq_table(reader)?;
            let table = FrequencyTable::new(freqs, log_range)?;
            ans_coder::decode_order0(BitReader::new(FrameReader(reader)), &table, chunk_len)
        }
        EntropyKind::Ans1 => {
            let mut tables: Vec<FrequencyTable> = Vec::with_capacity(256);
            for _ in 0..256 {
                let (freqs, log_range) = read_freq_table(reader)?;
                tables.push(FrequencyTable::new(freqs, log_range)?);
            }
            ans_coder::decode_order1(BitReader::new(FrameReader(reader)), &tables, chunk_len)
        }
    }
}

/// Compress `data` into `writer` as a sequence of `chunk_size`-byte chunks,
/// each coded with `kind`.
pub fn compress<W: Write>(
    writer: &mut BitWriter<W>,
    kind: EntropyKind,
    data: &[u8],
    chunk_size: usize,
    log_range: u32,
) -> Result<()> {
    if chunk_size == 0 {
        return Err(EntropyError::invalid_argument(
            "chunk_size",
            0,
            "greater than zero",
        ));
    }
    writer.write_bits(data.len() as u64, 64)?;
    writer.write_bits(chunk_size as u64, 32)?;
    for chunk in data.chunks(chunk_size) {
        compress_chunk(writer, kind, chunk, log_range)?;
    }
    Ok(())
}

/// Decompress a stream written by [`compress`].
pub fn decompress<R: Read>(reader: &mut BitReader<R>) -> Result<Vec<u8>> {
    let total_len = reader.read_bits(64)? as usize;
    let chunk_size = reader.read_bits(32)? as usize;
    if chunk_size == 0 && total_len > 0 {
        return Err(EntropyError::invalid_stream(reader.bits_read(), "zero chunk size"));
    }
    let mut out = Vec::with_capacity(total_len);
    let mut remaining = total_len;
    while remaining > 0 {
        let this_chunk = remaining.min(chunk_size);
        out.extend(decompress_chunk(reader, this_chunk)?);
        remaining -= this_chunk;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(kind: EntropyKind, data: &[u8], chunk_size: usize, log_range: u32) {
        let mut buf = Vec::new();
        {
            let mut w = BitWriter::new(&mut buf);
            compress(&mut w, kind, data, chunk_size, log_range).unwrap();
            w.close().unwrap();
        }
        let mut r = BitReader::new(Cursor::new(&buf));
        let out = decompress(&mut r).unwrap();
        assert_eq!(out, data, "kind={kind:?}");
    }

    #[test]
    fn test_empty_input_every_kind() {
        for kind in [
            EntropyKind::None,
            EntropyKind::Huffman,
            EntropyKind::Fpaq,
            EntropyKind::Paq,
            EntropyKind::Cm,
            EntropyKind::Tpaq,
            EntropyKind::Range,
            EntropyKind::Ans0,
            EntropyKind::Ans1,
            EntropyKind::TpaqX,
        ] {
            roundtrip(kind, &[], 1024, 12);
        }
    }

    #[test]
    fn test_none_roundtrip() {
        roundtrip(EntropyKind::None, b"hello, world!", 4, 12);
    }

    #[test]
    fn test_huffman_roundtrip_multi_chunk() {
        let data: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        roundtrip(EntropyKind::Huffman, &data, 777, 12);
    }

    #[test]
    fn test_huffman_single_symbol_alphabet() {
        roundtrip(EntropyKind::Huffman, &[0x41; 500], 256, 12);
    }

    #[test]
    fn test_fpaq_roundtrip() {
        let data: Vec<u8> = b"aaaabbbbccccddddaaaabbbbccccdddd".repeat(50);
        roundtrip(EntropyKind::Fpaq, &data, 200, 12);
    }

    #[test]
    fn test_range_roundtrip() {
        let data: Vec<u8> = (0..2000u32).map(|i| ((i * 37) % 256) as u8).collect();
        roundtrip(EntropyKind::Range, &data, 500, 14);
    }

    #[test]
    fn test_ans0_roundtrip() {
        let data: Vec<u8> = (0..2000u32).map(|i| ((i * 53) % 256) as u8).collect();
        roundtrip(EntropyKind::Ans0, &data, 600, 14);
    }

    #[test]
    fn test_ans1_roundtrip_markov_source() {
        let data: Vec<u8> = (0..1500).map(|i| if i % 2 == 0 { b'a' } else { b'b' }).collect();
        roundtrip(EntropyKind::Ans1, &data, 1500, 8);
    }

    #[test]
    fn test_cm_roundtrip() {
        let data: Vec<u8> = b"the quick brown fox jumps over the lazy dog".repeat(20);
        roundtrip(EntropyKind::Cm, &data, 300, 12);
    }

    #[test]
    fn test_paq_roundtrip_matches_cm() {
        // `Paq` (tag 3) is a historical-naming alias: it must round-trip
        // through the same CM-predictor-backed binary coder as `Cm` (tag 6).
        let data: Vec<u8> = b"the quick brown fox jumps over the lazy dog".repeat(20);
        roundtrip(EntropyKind::Paq, &data, 300, 12);
    }

    #[test]
    fn test_tpaq_zero_block() {
        roundtrip(EntropyKind::Tpaq, &[0u8; 4096], 4096, 12);
    }

    #[test]
    fn test_tpaqx_roundtrip() {
        let data: Vec<u8> = b"abcabcabcabcabcabcabcabcabcabc".repeat(30);
        roundtrip(EntropyKind::TpaqX, &data, 512, 12);
    }
}
