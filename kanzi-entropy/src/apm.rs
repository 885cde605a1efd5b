//! Adaptive probability map (APM / SSE — secondary symbol estimation), C3.
//!
//! An APM refines a probability estimate using a small context: it holds a
//! piecewise-linear table indexed by (stretched input, context) and corrects
//! itself online from the bit it was last asked to predict.
//!
//! Two variants share the same correction/interpolation mechanics but differ
//! in what domain the table stores: [`LinearApm`]'s table holds probabilities
//! (the table is initialized straight from `squash`, and `get` returns the
//! interpolated probability as-is); [`LogisticApm`]'s table holds stretched
//! ("logit") values, and `get` applies `squash` to the interpolated result
//! to produce the final probability — matching the two update rules
//! described for the APM contract, while keeping one external contract:
//! `get(bit, pr, ctx) -> probability in [0, 4095]`.

use crate::logistic::{squash, stretch};

const BINS: usize = 33;

struct ApmCore {
    rate: u32,
    last: Option<(usize, usize)>,
}

impl ApmCore {
    fn new(rate: u32) -> Self {
        Self { rate, last: None }
    }

    /// Apply the online correction owed from the previous call, then
    /// interpolate the table at the bin selected by `pr`'s stretched value.
    /// Returns `(low_index, weight_0_127, interpolated_value)`.
    fn step<T, ToI64, FromI64>(
        &mut self,
        table: &mut [T],
        bit: u32,
        pr: i32,
        ctx: usize,
        to_i64: ToI64,
        from_i64: FromI64,
    ) -> i64
    where
        T: Copy,
        ToI64: Fn(T) -> i64,
        FromI64: Fn(i64) -> T,
    {
        if let Some((lo, hi)) = self.last {
            let g = ((bit as i64) << 16) + ((bit as i64) << self.rate) - ((bit as i64) << 1);
            for idx in [lo, hi] {
                let e = to_i64(table[idx]);
                table[idx] = from_i64(e + ((g - e) >> self.rate));
            }
        }

        let s = stretch(pr.clamp(0, 4095)) as i64;
        let bin = ((s + 2048) >> 7) as usize;
        let bin = bin.min(BINS - 2);
        let w = s & 127;

        let base = ctx * BINS + bin;
        self.last = Some((base, base + 1));

        let lo = to_i64(table[base]);
        let hi = to_i64(table[base + 1]);
        lo + (((hi - lo) * w) >> 7)
    }
}

fn init_linear_row() -> [u16; BINS] {
    let mut row = [0u16; BINS];
    for (j, slot) in row.iter_mut().enumerate() {
        *slot = (squash(((j as i32) - 16) * 128) * 16) as u16;
    }
    row
}

fn init_logistic_row() -> [i16; BINS] {
    let mut row = [0i16; BINS];
    for (j, slot) in row.iter_mut().enumerate() {
        *slot = (((j as i32) - 16) * 128) as i16;
    }
    row
}

/// Probability-domain APM: the table holds refined probabilities directly.
pub struct LinearApm {
    table: Vec<u16>,
    core: ApmCore,
}

impl LinearApm {
    /// Create an APM with `ctx_count` contexts and learning rate `rate` (`4..=8`).
    pub fn new(ctx_count: usize, rate: u32) -> Self {
        let row = init_linear_row();
        let mut table = Vec::with_capacity(ctx_count * BINS);
        for _ in 0..ctx_count {
            table.extend_from_slice(&row);
        }
        Self {
            table,
            core: ApmCore::new(rate),
        }
    }

    /// Refine `pr` (a probability in `[0, 4095]`) using context `ctx`, and
    /// record the outcome `bit` of the previous call for online correction.
    pub fn get(&mut self, bit: u32, pr: i32, ctx: usize) -> i32 {
        let interp = self.core.step(
            &mut self.table,
            bit,
            pr,
            ctx,
            |v: u16| v as i64,
            |v: i64| v.clamp(0, 65535) as u16,
        );
        (interp >> 4).clamp(0, 4095) as i32
    }
}

/// Logit-domain APM: the table holds stretched values; `squash` is applied
/// to the interpolation result to produce the final probability.
pub struct LogisticApm {
    table: Vec<i16>,
    core: ApmCore,
}

impl LogisticApm {
    /// Create an APM with `ctx_count` contexts and learning rate `rate` (`4..=8`).
    pub fn new(ctx_count: usize, rate: u32) -> Self {
        let row = init_logistic_row();
        let mut table = Vec::with_capacity(ctx_count * BINS);
        for _ in 0..ctx_count {
            table.extend_from_slice(&row);
        }
        Self {
            table,
            core: ApmCore::new(rate),
        }
    }

    /// Refine `pr` (a probability in `[0, 4095]`) using context `ctx`, and
    /// record the outcome `bit` of the previous call for online correction.
    pub fn get(&mut self, bit: u32, pr: i32, ctx: usize) -> i32 {
        let interp = self.core.step(
            &mut self.table,
            bit,
            pr,
            ctx,
            |v: i16| v as i64,
            |v: i64| v.clamp(-2047, 2047) as i16,
        );
        squash(interp as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_apm_monotonic_in_fixed_context() {
        let mut apm = LinearApm::new(4, 7);
        let mut prev = apm.get(0, 0, 2);
        for pr in (1..4096).step_by(17) {
            let out = apm.get(0, pr, 2);
            assert!(out >= prev - 1, "pr={pr} out={out} prev={prev}");
            prev = out;
        }
    }

    #[test]
    fn test_logistic_apm_monotonic_in_fixed_context() {
        let mut apm = LogisticApm::new(4, 7);
        let mut prev = apm.get(0, 0, 1);
        for pr in (1..4096).step_by(17) {
            let out = apm.get(0, pr, 1);
            assert!(out >= prev - 1, "pr={pr} out={out} prev={prev}");
            prev = out;
        }
    }

    #[test]
    fn test_apm_output_in_range() {
        let mut apm = LinearApm::new(2, 6);
        for pr in [0, 1, 2048, 4094, 4095] {
            let out = apm.get(1, pr, 0);
            assert!((0..=4095).contains(&out));
        }
    }

    #[test]
    fn test_apm_adapts_toward_observed_bit() {
        let mut apm = LinearApm::new(1, 5);
        let mut pr = 2048;
        for _ in 0..2000 {
            pr = apm.get(1, pr, 0);
        }
        assert!(pr > 2048);
    }
}
