//! Sample statistics accumulator.
//!
//! Collects Monte Carlo payoff samples and reports mean, sample standard
//! deviation, and the standard error of the mean.

use pk_core::Real;

/// Incremental statistics accumulator.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    count: usize,
    sum: Real,
    sum_sq: Real,
}

impl Statistics {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample.
    pub fn add(&mut self, x: Real) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    /// Number of samples.
    pub fn samples(&self) -> usize {
        self.count
    }

    /// Sample mean. Returns `None` when empty.
    pub fn mean(&self) -> Option<Real> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as Real)
        }
    }

    /// Unbiased sample variance. Returns `None` for fewer than 2 samples.
    pub fn variance(&self) -> Option<Real> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as Real;
        let m = self.sum / n;
        Some(((self.sum_sq / n - m * m) * n / (n - 1.0)).max(0.0))
    }

    /// Sample standard deviation.
    pub fn std_dev(&self) -> Option<Real> {
        self.variance().map(Real::sqrt)
    }

    /// Standard error of the mean: `std_dev / √n`.
    pub fn error_estimate(&self) -> Option<Real> {
        self.std_dev()
            .map(|s| s / (self.count as Real).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_variance() {
        let mut s = Statistics::new();
        for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
            s.add(x);
        }
        assert_eq!(s.samples(), 5);
        assert!((s.mean().unwrap() - 3.0).abs() < 1e-12);
        assert!((s.variance().unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn error_estimate_shrinks_with_samples() {
        let mut small = Statistics::new();
        let mut large = Statistics::new();
        for i in 0..100 {
            small.add((i % 7) as Real);
        }
        for i in 0..10_000 {
            large.add((i % 7) as Real);
        }
        assert!(large.error_estimate().unwrap() < small.error_estimate().unwrap());
    }

    #[test]
    fn empty_accumulator_is_none() {
        let s = Statistics::new();
        assert!(s.mean().is_none());
        assert!(s.variance().is_none());
        assert!(s.error_estimate().is_none());
    }
}
