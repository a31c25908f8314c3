//! Piecewise-linear and bilinear interpolation with flat extrapolation.
//!
//! Used by the rate term structure (1-D over year fractions) and the
//! local-volatility surface (2-D over expiry × strike). Queries outside the
//! data domain clamp to the nearest pillar rather than extrapolating.

use pk_core::errors::Result;
use pk_core::{ensure, Real};

/// Piecewise-linear interpolation over strictly increasing abscissae.
#[derive(Debug, Clone)]
pub struct LinearInterp {
    xs: Vec<Real>,
    ys: Vec<Real>,
}

impl LinearInterp {
    /// Build from (x, y) pairs. `xs` must be strictly increasing and
    /// non-empty.
    pub fn new(xs: Vec<Real>, ys: Vec<Real>) -> Result<Self> {
        ensure!(!xs.is_empty(), "interpolation needs at least one point");
        ensure!(
            xs.len() == ys.len(),
            "mismatched interpolation data: {} x vs {} y",
            xs.len(),
            ys.len()
        );
        for w in xs.windows(2) {
            ensure!(w[0] < w[1], "abscissae must be strictly increasing");
        }
        Ok(Self { xs, ys })
    }

    /// Interpolated value at `x`, clamped to the data range.
    pub fn value(&self, x: Real) -> Real {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        let i = self.locate(x);
        let w = (x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]);
        self.ys[i] * (1.0 - w) + self.ys[i + 1] * w
    }

    fn locate(&self, x: Real) -> usize {
        // Index i with xs[i] <= x < xs[i+1]; callers guarantee x is interior.
        match self.xs.partition_point(|&v| v <= x) {
            0 => 0,
            i => i - 1,
        }
    }
}

/// Bilinear interpolation over a rectangular grid, flat outside the domain.
#[derive(Debug, Clone)]
pub struct BilinearInterp {
    rows: LinearAxis,
    cols: LinearAxis,
    /// Row-major values: `values[i * cols + j]`.
    values: Vec<Real>,
}

#[derive(Debug, Clone)]
struct LinearAxis {
    ticks: Vec<Real>,
}

impl LinearAxis {
    /// Bracketing index and weight for `x`, clamped to the axis.
    fn bracket(&self, x: Real) -> (usize, Real) {
        let n = self.ticks.len();
        if n == 1 || x <= self.ticks[0] {
            return (0, 0.0);
        }
        if x >= self.ticks[n - 1] {
            return (n - 2, 1.0);
        }
        let i = match self.ticks.partition_point(|&v| v <= x) {
            0 => 0,
            i => i - 1,
        };
        let w = (x - self.ticks[i]) / (self.ticks[i + 1] - self.ticks[i]);
        (i, w)
    }
}

impl BilinearInterp {
    /// Build from row ticks, column ticks, and row-major values.
    pub fn new(rows: Vec<Real>, cols: Vec<Real>, values: Vec<Real>) -> Result<Self> {
        ensure!(
            !rows.is_empty() && !cols.is_empty(),
            "grid axes must be non-empty"
        );
        ensure!(
            values.len() == rows.len() * cols.len(),
            "grid needs {} values, got {}",
            rows.len() * cols.len(),
            values.len()
        );
        for axis in [&rows, &cols] {
            for w in axis.windows(2) {
                ensure!(w[0] < w[1], "grid axes must be strictly increasing");
            }
        }
        Ok(Self {
            rows: LinearAxis { ticks: rows },
            cols: LinearAxis { ticks: cols },
            values,
        })
    }

    /// Interpolated value at `(row, col)`, clamped to the grid.
    pub fn value(&self, row: Real, col: Real) -> Real {
        let ncols = self.cols.ticks.len();
        let (i, wi) = self.rows.bracket(row);
        let (j, wj) = self.cols.bracket(col);
        let i1 = (i + 1).min(self.rows.ticks.len() - 1);
        let j1 = (j + 1).min(ncols - 1);
        let v00 = self.values[i * ncols + j];
        let v01 = self.values[i * ncols + j1];
        let v10 = self.values[i1 * ncols + j];
        let v11 = self.values[i1 * ncols + j1];
        v00 * (1.0 - wi) * (1.0 - wj)
            + v01 * (1.0 - wi) * wj
            + v10 * wi * (1.0 - wj)
            + v11 * wi * wj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_interpolates_and_clamps() {
        let li = LinearInterp::new(vec![0.5, 1.0, 2.0], vec![0.02, 0.025, 0.03]).unwrap();
        assert!((li.value(0.75) - 0.0225).abs() < 1e-15);
        assert!((li.value(1.0) - 0.025).abs() < 1e-15);
        // Flat extrapolation both sides
        assert!((li.value(0.1) - 0.02).abs() < 1e-15);
        assert!((li.value(5.0) - 0.03).abs() < 1e-15);
    }

    #[test]
    fn linear_rejects_unsorted() {
        assert!(LinearInterp::new(vec![1.0, 1.0], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn bilinear_interpolates_plane() {
        // f(r, c) = 2r + 3c is reproduced exactly by bilinear interpolation
        let rows = vec![0.0, 1.0, 2.0];
        let cols = vec![0.0, 10.0];
        let values: Vec<Real> = rows
            .iter()
            .flat_map(|&r| cols.iter().map(move |&c| 2.0 * r + 3.0 * c))
            .collect();
        let bi = BilinearInterp::new(rows, cols, values).unwrap();
        assert!((bi.value(0.5, 5.0) - 16.0).abs() < 1e-12);
        assert!((bi.value(1.5, 2.5) - 10.5).abs() < 1e-12);
    }

    #[test]
    fn bilinear_clamps_outside_domain() {
        let bi = BilinearInterp::new(
            vec![1.0, 2.0],
            vec![90.0, 110.0],
            vec![0.2, 0.22, 0.25, 0.27],
        )
        .unwrap();
        assert!((bi.value(0.0, 50.0) - 0.2).abs() < 1e-15);
        assert!((bi.value(9.0, 500.0) - 0.27).abs() < 1e-15);
    }
}
