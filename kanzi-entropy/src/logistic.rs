//! Logistic squash/stretch pair shared by the adaptive probability map and
//! the predictor family.
//!
//! `squash` maps a stretched ("logit") domain value in `[-2047, 2047]` to a
//! probability in `[0, 4095]`; `stretch` is its inverse. Both are built from
//! a single 4096-entry lookup table computed once at process start, the way
//! lpaq-style predictors precompute them (see e.g. `ari::log` in the
//! reference context-mixing compressors this crate's predictors are
//! grounded on).

use std::sync::OnceLock;

fn squash_f64(d: f64) -> f64 {
    4096.0 / (1.0 + (-d / 256.0).exp())
}

fn squash_table() -> &'static [i32; 4096] {
    static TABLE: OnceLock<[i32; 4096]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [0i32; 4096];
        for (i, slot) in t.iter_mut().enumerate() {
            let d = i as i32 - 2048;
            *slot = squash_f64(d as f64).round().clamp(0.0, 4095.0) as i32;
        }
        t
    })
}

fn stretch_table() -> &'static [i16; 4096] {
    static TABLE: OnceLock<[i16; 4096]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [0i16; 4096];
        let sq = squash_table();
        let mut pi = 0usize;
        for x in -2047..=2047i32 {
            let p = sq[(x + 2048) as usize] as usize;
            for slot in t.iter_mut().take(p + 1).skip(pi) {
                *slot = x as i16;
            }
            pi = p + 1;
        }
        for slot in t.iter_mut().skip(pi) {
            *slot = 2047;
        }
        t
    })
}

/// Map a stretched value (clamped to `[-2047, 2047]`) to a probability in `[0, 4095]`.
#[inline]
pub fn squash(d: i32) -> i32 {
    let d = d.clamp(-2048, 2047);
    squash_table()[(d + 2048) as usize]
}

/// Map a probability in `[0, 4095]` to its stretched ("logit") value.
#[inline]
pub fn stretch(p: i32) -> i32 {
    let p = p.clamp(0, 4095);
    stretch_table()[p as usize] as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squash_monotonic() {
        let mut prev = squash(-2047);
        for x in -2046..=2047 {
            let v = squash(x);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_squash_midpoint() {
        assert!((squash(0) - 2048).abs() <= 2);
    }

    #[test]
    fn test_stretch_roundtrips_near_identity() {
        for p in (1..4095).step_by(37) {
            let back = squash(stretch(p));
            assert!((back - p).abs() <= 4, "p={p} back={back}");
        }
    }

    #[test]
    fn test_stretch_monotonic() {
        let mut prev = stretch(0);
        for p in 1..4096 {
            let v = stretch(p);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_bounds() {
        assert!((0..=4095).contains(&squash(-9999)));
        assert!((0..=4095).contains(&squash(9999)));
        assert!(stretch(0) <= 2047);
        assert!(stretch(4095) >= -2047);
    }
}
