//! Alphabet codec and frequency normalization shared by Huffman, Range and
//! ANS coders (C2 in the design).
//!
//! An "alphabet" here is the strictly increasing list of symbols (from
//! `0..=255`) that occur at least once in a chunk. It is always carried
//! alongside a frequency table normalized to a power-of-two scale.
//!
//! # Wire shape
//!
//! ```text
//! tag: 1 bit    0 = full (alphabet is the contiguous prefix {0..count})
//!               1 = partial
//!
//! full:
//!   bit: 1 bit  0 = ALPHABET_256 (count == 256, nothing further)
//!               1 = explicit count: 5 bits (log-1), then `log` bits of count
//!
//! partial:
//!   bit: 1 bit  1 = bit-encoded (256-bit presence mask, used when
//!                   32 <= count <= 224)
//!               0 = delta-encoded
//!   delta-encoded:
//!     4 bits (log-1), `log` bits: count of the coded side
//!     1 bit: 0 = present symbols coded, 1 = absent symbols coded
//!            (whichever side is smaller)
//!     chunks of 8 deltas (if coded-count <= 64) or 16 deltas (else),
//!     each chunk prefixed by 4 bits (logMax-1) then each delta in
//!     logMax bits.
//! ```
//!
//! This shape follows the specification's description; no bit-stream
//! compatibility with any prior implementation is claimed (the spec
//! explicitly waives that). See `DESIGN.md` for the "FULL_ALPHABET" framing
//! decision.

use kanzi_core::bitstream::{BitReader, BitWriter};
use kanzi_core::error::{EntropyError, Result};
use std::io::{Read, Write};

fn bits_for(value: u32) -> u32 {
    32 - value.max(1).leading_zeros()
}

/// Write an alphabet (a strictly increasing list of byte symbols) to the bit stream.
pub fn write_alphabet<W: Write>(writer: &mut BitWriter<W>, alphabet: &[u8]) -> Result<()> {
    let count = alphabet.len();
    if count > 256 {
        return Err(EntropyError::invalid_argument(
            "alphabet.len()",
            count as i64,
            "<= 256",
        ));
    }

    let is_contiguous_prefix = alphabet.iter().enumerate().all(|(i, &s)| s as usize == i);

    if is_contiguous_prefix {
        writer.write_bit(0)?; // FULL_ALPHABET
        if count == 256 {
            writer.write_bit(0)?; // ALPHABET_256
        } else {
            writer.write_bit(1)?;
            let log = bits_for(count as u32).max(1);
            writer.write_bits((log - 1) as u64, 5)?;
            writer.write_bits(count as u64, log)?;
        }
        return Ok(());
    }

    writer.write_bit(1)?; // PARTIAL_ALPHABET

    if (32..=224).contains(&count) {
        writer.write_bit(1)?; // BIT_ENCODED_ALPHABET_256
        let mut mask = [0u64; 4];
        for &s in alphabet {
            let s = s as usize;
            mask[s / 64] |= 1u64 << (s % 64);
        }
        for word in mask {
            writer.write_bits(word, 64)?;
        }
        return Ok(());
    }

    writer.write_bit(0)?; // DELTA_ENCODED_ALPHABET

    let absent_count = 256 - count;
    let code_absent = absent_count < count;
    let coded: Vec<u8> = if code_absent {
        let present: std::collections::HashSet<u8> = alphabet.iter().copied().collect();
        (0u32..256).filter(|v| !present.contains(&(*v as u8))).map(|v| v as u8).collect()
    } else {
        alphabet.to_vec()
    };

    let coded_count = coded.len();
    let log = bits_for(coded_count as u32).max(1);
    writer.write_bits((log - 1) as u64, 4)?;
    writer.write_bits(coded_count as u64, log)?;
    writer.write_bit(if code_absent { 1 } else { 0 })?;

    let chunk_size = if coded_count <= 64 { 8 } else { 16 };
    let mut prev: i32 = -1;
    for chunk in coded.chunks(chunk_size) {
        let deltas: Vec<u32> = chunk
            .iter()
            .map(|&v| {
                let d = v as i32 - prev - 1;
                prev = v as i32;
                d as u32
            })
            .collect();
        let max_delta = deltas.iter().copied().max().unwrap_or(0);
        let log_max = bits_for(max_delta).max(1);
        writer.write_bits((log_max - 1) as u64, 4)?;
        for d in deltas {
            writer.write_bits(d as u64, log_max)?;
        }
    }

    Ok(())
}

/// Read an alphabet back from the bit stream.
pub fn read_alphabet<R: Read>(reader: &mut BitReader<R>) -> Result<Vec<u8>> {
    let tag = reader.read_bit()?;

    if tag == 0 {
        // FULL_ALPHABET
        let sub = reader.read_bit()?;
        let count = if sub == 0 {
            256usize
        } else {
            let log = reader.read_bits(5)? as u32 + 1;
            let count = reader.read_bits(log)? as usize;
            if count > 256 {
                return Err(EntropyError::invalid_stream(
                    reader.bits_read(),
                    format!("alphabet count {count} exceeds 256"),
                ));
            }
            count
        };
        return Ok((0..count as u32).map(|v| v as u8).collect());
    }

    // PARTIAL_ALPHABET
    let sub = reader.read_bit()?;
    if sub == 1 {
        // BIT_ENCODED_ALPHABET_256
        let mut mask = [0u64; 4];
        for word in mask.iter_mut() {
            *word = reader.read_bits(64)?;
        }
        let mut alphabet = Vec::new();
        for (i, word) in mask.iter().enumerate() {
            for b in 0..64 {
                if word & (1u64 << b) != 0 {
                    alphabet.push((i * 64 + b) as u8);
                }
            }
        }
        return Ok(alphabet);
    }

    // DELTA_ENCODED_ALPHABET
    let log = reader.read_bits(4)? as u32 + 1;
    let coded_count = reader.read_bits(log)? as usize;
    if coded_count > 256 {
        return Err(EntropyError::invalid_stream(
            reader.bits_read(),
            format!("alphabet coded count {coded_count} exceeds 256"),
        ));
    }
    let code_absent = reader.read_bit()? == 1;

    let chunk_size = if coded_count <= 64 { 8 } else { 16 };
    let mut coded = Vec::with_capacity(coded_count);
    let mut prev: i32 = -1;
    let mut remaining = coded_count;
    while remaining > 0 {
        let n = remaining.min(chunk_size);
        let log_max = reader.read_bits(4)? as u32 + 1;
        for _ in 0..n {
            let delta = reader.read_bits(log_max)? as i32;
            let v = prev + delta + 1;
            if !(0..=255).contains(&v) {
                return Err(EntropyError::invalid_stream(
                    reader.bits_read(),
                    format!("alphabet delta decodes to out-of-range symbol {v}"),
                ));
            }
            coded.push(v as u8);
            prev = v;
        }
        remaining -= n;
    }

    if code_absent {
        let absent: std::collections::HashSet<u8> = coded.into_iter().collect();
        Ok((0u32..256).filter(|v| !absent.contains(&(*v as u8))).map(|v| v as u8).collect())
    } else {
        Ok(coded)
    }
}

/// Normalize a 256-entry histogram to frequencies summing to `1 << log_range`.
///
/// Returns the populated alphabet (strictly increasing symbols with non-zero
/// input frequency) together with the normalized frequency of each symbol in
/// the 256-entry output array (zero for symbols outside the alphabet).
pub fn normalize_frequencies(
    histogram: &[u64; 256],
    log_range: u32,
) -> Result<(Vec<u8>, [u32; 256])> {
    if !(8..=16).contains(&log_range) {
        return Err(EntropyError::invalid_argument(
            "logRange",
            log_range as i64,
            "[8,16]",
        ));
    }

    let total: u64 = histogram.iter().sum();
    let mut normalized = [0u32; 256];
    let alphabet: Vec<u8> = (0u32..256)
        .filter(|&i| histogram[i as usize] > 0)
        .map(|i| i as u8)
        .collect();

    if total == 0 {
        return Ok((alphabet, normalized));
    }

    let scale = 1u64 << log_range;

    for &sym in &alphabet {
        let f = histogram[sym as usize];
        let raw = f as u128 * scale as u128;
        let scaled = (raw / total as u128) as u32;
        normalized[sym as usize] = scaled.max(1);
    }

    let mut sum: i64 = alphabet.iter().map(|&s| normalized[s as usize] as i64).sum();
    let target = scale as i64;

    // Too much mass: shave from the largest frequencies first, never below 1.
    while sum > target {
        let sym = alphabet
            .iter()
            .copied()
            .max_by_key(|&s| normalized[s as usize])
            .expect("alphabet is non-empty when total > 0");
        if normalized[sym as usize] > 1 {
            normalized[sym as usize] -= 1;
            sum -= 1;
        } else {
            // Every symbol is pinned at 1: nothing further can be removed
            // (can only happen if scale < alphabet.len(), which normalize's
            // caller must avoid by choosing a large enough log_range).
            break;
        }
    }

    // Too little mass: grow the largest frequency until the budget is spent.
    while sum < target {
        let sym = alphabet
            .iter()
            .copied()
            .max_by_key(|&s| normalized[s as usize])
            .expect("alphabet is non-empty when total > 0");
        normalized[sym as usize] += 1;
        sum += 1;
    }

    Ok((alphabet, normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip_alphabet(alphabet: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut w = BitWriter::new(&mut buf);
            write_alphabet(&mut w, alphabet).unwrap();
            w.close().unwrap();
        }
        let mut r = BitReader::new(Cursor::new(buf));
        read_alphabet(&mut r).unwrap()
    }

    #[test]
    fn test_full_256() {
        let full: Vec<u8> = (0u32..256).map(|v| v as u8).collect();
        assert_eq!(roundtrip_alphabet(&full), full);
    }

    #[test]
    fn test_contiguous_prefix() {
        let prefix: Vec<u8> = (0u8..17).collect();
        assert_eq!(roundtrip_alphabet(&prefix), prefix);
    }

    #[test]
    fn test_single_symbol() {
        assert_eq!(roundtrip_alphabet(&[0x41]), vec![0x41]);
        assert_eq!(roundtrip_alphabet(&[0]), vec![0]);
        assert_eq!(roundtrip_alphabet(&[255]), vec![255]);
    }

    #[test]
    fn test_sparse_subset() {
        let alphabet = vec![3, 17, 42, 100, 255];
        assert_eq!(roundtrip_alphabet(&alphabet), alphabet);
    }

    #[test]
    fn test_dense_subset_bit_encoded() {
        let alphabet: Vec<u8> = (0u8..=199).step_by(1).take(180).collect();
        assert_eq!(roundtrip_alphabet(&alphabet), alphabet);
    }

    #[test]
    fn test_empty_alphabet() {
        assert_eq!(roundtrip_alphabet(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_normalize_sums_to_scale() {
        for log_range in 8u32..=16 {
            let mut hist = [0u64; 256];
            hist[0] = 100;
            hist[1] = 1;
            hist[255] = 37;
            let (alphabet, freqs) = normalize_frequencies(&hist, log_range).unwrap();
            assert_eq!(alphabet, vec![0, 1, 255]);
            let sum: u32 = freqs.iter().sum();
            assert_eq!(sum, 1 << log_range);
            for &s in &alphabet {
                assert!(freqs[s as usize] >= 1);
            }
            for s in 0..256u32 {
                if !alphabet.contains(&(s as u8)) {
                    assert_eq!(freqs[s as usize], 0);
                }
            }
        }
    }

    #[test]
    fn test_normalize_rejects_bad_log_range() {
        let hist = [1u64; 256];
        assert!(normalize_frequencies(&hist, 7).is_err());
        assert!(normalize_frequencies(&hist, 17).is_err());
    }

    #[test]
    fn test_normalize_full_alphabet_uniform() {
        let hist = [1u64; 256];
        let (alphabet, freqs) = normalize_frequencies(&hist, 8).unwrap();
        assert_eq!(alphabet.len(), 256);
        let sum: u32 = freqs.iter().sum();
        assert_eq!(sum, 256);
        for f in freqs {
            assert_eq!(f, 1);
        }
    }

    #[test]
    fn test_normalize_empty_histogram() {
        let hist = [0u64; 256];
        let (alphabet, freqs) = normalize_frequencies(&hist, 8).unwrap();
        assert!(alphabet.is_empty());
        assert!(freqs.iter().all(|&f| f == 0));
    }
}
