//! Random number sources.
//!
//! Produces the `(n_paths × n_steps)` standard-normal shock matrices the
//! Monte Carlo engines consume. Three sources are supported — Mersenne
//! Twister pseudo-randoms, Sobol, and Halton — with optional antithetic
//! pairing. Quasi-random uniforms are mapped through the inverse normal
//! CDF so their low-discrepancy structure survives the transform.

pub mod sobol;

use crate::distributions::normal_cdf_inv;
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use rand_mt::Mt19937GenRand64;
use sobol::SobolSequence;

/// A uniform pseudo-random generator based on MT19937-64.
pub struct MersenneTwisterRng {
    rng: Mt19937GenRand64,
}

impl MersenneTwisterRng {
    /// Create a new generator with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mt19937GenRand64::new(seed),
        }
    }

    /// Generate the next uniform deviate in `[0, 1)`.
    pub fn next_uniform(&mut self) -> Real {
        let u: u64 = self.rng.next_u64();
        u as f64 / (u64::MAX as f64 + 1.0)
    }

    /// Generate the next standard-normal deviate via the inverse CDF.
    pub fn next_normal(&mut self) -> Real {
        // Avoid exact 0 which would map to −∞
        let u = loop {
            let u = self.next_uniform();
            if u > 0.0 {
                break u;
            }
        };
        normal_cdf_inv(u)
    }
}

/// Halton low-discrepancy sequence with digit-reversal scrambling.
///
/// Dimension `d` uses the `d`-th prime base; each digit is permuted by
/// `σ_p(k) = (p − k) mod p`, which is the identity in base 2 and breaks the
/// strong correlation between high-dimensional projections otherwise.
pub struct HaltonSequence {
    bases: Vec<u64>,
    index: u64,
}

impl HaltonSequence {
    /// Create a new Halton generator of the given dimension, skipping the
    /// first `skip` points.
    pub fn new(dimension: usize, skip: u64) -> Self {
        Self {
            bases: first_primes(dimension),
            index: skip,
        }
    }

    /// Generate the next quasi-random vector in `(0, 1)^d`.
    pub fn next_point(&mut self) -> Vec<Real> {
        self.index += 1;
        self.bases
            .iter()
            .map(|&base| scrambled_van_der_corput(self.index, base))
            .collect()
    }
}

/// Radical-inverse of `n` in `base` with digit-reversal permutation.
fn scrambled_van_der_corput(mut n: u64, base: u64) -> Real {
    let mut result = 0.0;
    let mut denom = 1.0;
    while n > 0 {
        let digit = n % base;
        let scrambled = if digit == 0 { 0 } else { base - digit };
        denom *= base as Real;
        result += scrambled as Real / denom;
        n /= base;
    }
    result
}

/// Return the first `count` prime numbers.
fn first_primes(count: usize) -> Vec<u64> {
    let mut primes = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if is_prime(candidate) {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5;
    while i * i <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

// ── Shock matrices ────────────────────────────────────────────────────────────

/// The kind of normal source feeding a shock matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalSource {
    /// Mersenne-Twister pseudo-randoms.
    Pseudorandom,
    /// Sobol low-discrepancy points (Joe-Kuo directions, MT-padded beyond
    /// the direction-number table).
    Sobol,
    /// Scrambled Halton low-discrepancy points.
    Halton,
}

/// A dense `(n_paths × n_steps)` matrix of standard-normal shocks.
#[derive(Debug, Clone)]
pub struct ShockMatrix {
    n_paths: usize,
    n_steps: usize,
    data: Vec<Real>,
}

impl ShockMatrix {
    /// Generate a shock matrix.
    ///
    /// With `antithetic` set, only `n_paths / 2` independent draws are made
    /// and the second half of the matrix is their negation; `n_paths` must
    /// then be even. For Sobol, path `i` is the `i`-th Sobol point with the
    /// path's time steps as dimensions (the origin is consumed by the
    /// Gray-code update and never emitted).
    pub fn generate(
        source: NormalSource,
        seed: u64,
        n_paths: usize,
        n_steps: usize,
        antithetic: bool,
    ) -> Result<Self> {
        ensure!(n_paths >= 1, "n_paths must be at least 1");
        ensure!(n_steps >= 1, "n_steps must be at least 1");
        ensure!(
            !antithetic || n_paths % 2 == 0,
            "antithetic pairing needs an even path count, got {n_paths}"
        );

        let independent = if antithetic { n_paths / 2 } else { n_paths };
        let mut data = Vec::with_capacity(n_paths * n_steps);

        match source {
            NormalSource::Pseudorandom => {
                let mut rng = MersenneTwisterRng::new(seed);
                for _ in 0..independent * n_steps {
                    data.push(rng.next_normal());
                }
            }
            NormalSource::Sobol => {
                let table_dim = n_steps.min(SobolSequence::TABLE_DIMENSION);
                let mut sobol = SobolSequence::new(table_dim, 0);
                let mut pad = MersenneTwisterRng::new(seed);
                for _ in 0..independent {
                    let point = sobol.next_point();
                    for &u in &point {
                        data.push(normal_cdf_inv(clamp_unit(u)));
                    }
                    // Dimensions beyond the direction-number table fall back
                    // to pseudo-randoms; a 21201-dimension table is not worth
                    // carrying for daily step counts.
                    for _ in table_dim..n_steps {
                        data.push(pad.next_normal());
                    }
                }
            }
            NormalSource::Halton => {
                let mut halton = HaltonSequence::new(n_steps, 0);
                for _ in 0..independent {
                    for u in halton.next_point() {
                        data.push(normal_cdf_inv(clamp_unit(u)));
                    }
                }
            }
        }

        if antithetic {
            for i in 0..independent * n_steps {
                let z = data[i];
                data.push(-z);
            }
        }

        Ok(Self {
            n_paths,
            n_steps,
            data,
        })
    }

    /// Number of paths (rows).
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Number of steps (columns).
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// The shocks of path `i`.
    pub fn row(&self, i: usize) -> &[Real] {
        &self.data[i * self.n_steps..(i + 1) * self.n_steps]
    }
}

fn clamp_unit(u: Real) -> Real {
    u.clamp(1e-12, 1.0 - 1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mt_uniforms_in_range() {
        let mut rng = MersenneTwisterRng::new(42);
        for _ in 0..1_000 {
            let x = rng.next_uniform();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn halton_first_point() {
        let mut halton = HaltonSequence::new(3, 0);
        let pt = halton.next_point();
        // base 2: unscrambled 1/2; base 3: digit 1 → 2 ⇒ 2/3; base 5: 1 → 4 ⇒ 4/5
        assert!((pt[0] - 0.5).abs() < 1e-12);
        assert!((pt[1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((pt[2] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn halton_fills_unit_interval() {
        let mut halton = HaltonSequence::new(2, 0);
        let mut sum = [0.0, 0.0];
        let n = 1024;
        for _ in 0..n {
            let pt = halton.next_point();
            for d in 0..2 {
                assert!(pt[d] > 0.0 && pt[d] < 1.0);
                sum[d] += pt[d];
            }
        }
        for d in 0..2 {
            let mean = sum[d] / n as f64;
            assert!((mean - 0.5).abs() < 0.02, "dim {d} mean {mean}");
        }
    }

    #[test]
    fn shock_matrix_shape_and_determinism() {
        let a = ShockMatrix::generate(NormalSource::Pseudorandom, 7, 16, 10, false).unwrap();
        let b = ShockMatrix::generate(NormalSource::Pseudorandom, 7, 16, 10, false).unwrap();
        assert_eq!(a.n_paths(), 16);
        assert_eq!(a.row(3), b.row(3));
    }

    #[test]
    fn antithetic_rows_negate() {
        let m = ShockMatrix::generate(NormalSource::Sobol, 0, 8, 6, true).unwrap();
        for step in 0..6 {
            assert!((m.row(0)[step] + m.row(4)[step]).abs() < 1e-15);
            assert!((m.row(3)[step] + m.row(7)[step]).abs() < 1e-15);
        }
    }

    #[test]
    fn antithetic_requires_even_paths() {
        assert!(ShockMatrix::generate(NormalSource::Halton, 0, 7, 4, true).is_err());
    }

    #[test]
    fn sobol_shocks_have_near_zero_mean() {
        let m = ShockMatrix::generate(NormalSource::Sobol, 0, 1024, 4, false).unwrap();
        for step in 0..4 {
            let mean: Real =
                (0..1024).map(|i| m.row(i)[step]).sum::<Real>() / 1024.0;
            assert!(mean.abs() < 0.05, "step {step} mean {mean}");
        }
    }
}
