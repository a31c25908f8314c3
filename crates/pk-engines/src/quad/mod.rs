//! Backward quadrature engines.
//!
//! The option value is rolled backward in time on a uniform log-price
//! mesh: each step integrates the value against the log-normal transition
//! density with Simpson or trapezoid weights. Between event dates the
//! density is exact, so steps are only taken where something happens —
//! daily for daily barriers, observation-to-observation for autocalls.
//!
//! The mesh spans `ln s₀ ± n_max·σ√τ` and is anchored so that the primary
//! barrier falls exactly on a node: indicator events are then exact at
//! nodes, the weights stay uniform, and the density row stays Toeplitz
//! (one row serves every target node).

pub mod autocallable;
pub mod barrier;
pub mod vanilla;

pub use autocallable::{QuadAutoCallEngine, QuadFcnEngine, QuadSnowballEngine};
pub use barrier::{QuadBarrierEngine, QuadDigitalEngine, QuadDoubleSharkEngine};
pub use vanilla::QuadVanillaEngine;

use pk_core::errors::Result;
use pk_core::{ensure, Real, Time};
use pk_math::normal_pdf;

/// Integration rule on the log-price mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadMethod {
    /// Simpson's rule (odd point count).
    Simpson,
    /// Trapezoid rule.
    Trapezoid,
}

/// Quadrature configuration.
#[derive(Debug, Clone, Copy)]
pub struct QuadConfig {
    /// Integration rule.
    pub quad_method: QuadMethod,
    /// Mesh points (odd for Simpson).
    pub n_points: usize,
    /// Mesh half-span in terminal standard deviations.
    pub n_max: usize,
}

impl Default for QuadConfig {
    fn default() -> Self {
        Self {
            quad_method: QuadMethod::Simpson,
            n_points: 801,
            n_max: 4,
        }
    }
}

impl QuadConfig {
    fn validate(&self) -> Result<()> {
        ensure!(self.n_points >= 11, "n_points too small: {}", self.n_points);
        ensure!(
            self.quad_method != QuadMethod::Simpson || self.n_points % 2 == 1,
            "Simpson integration needs an odd point count, got {}",
            self.n_points
        );
        ensure!(self.n_max >= 2, "n_max must be at least 2");
        Ok(())
    }
}

/// The uniform log-price mesh.
#[derive(Debug, Clone)]
pub(crate) struct QuadMesh {
    /// Log-price nodes.
    pub x: Vec<Real>,
    /// Price nodes `exp(x)`.
    pub s: Vec<Real>,
    /// Node spacing.
    pub dx: Real,
    /// Integration weights (rule weights × dx).
    pub weights: Vec<Real>,
}

impl QuadMesh {
    /// Build the mesh around `ln s0`, anchored so `anchor` (a price level)
    /// sits exactly on a node.
    pub fn build(
        config: &QuadConfig,
        s0: Real,
        sigma: Real,
        tau: Time,
        anchor: Option<Real>,
    ) -> Result<Self> {
        config.validate()?;
        let n = config.n_points;
        let half_span = config.n_max as Real * sigma * tau.sqrt();
        let dx = 2.0 * half_span / (n - 1) as Real;
        let mut x0 = s0.ln() - half_span;

        if let Some(level) = anchor {
            let lx = level.ln();
            if lx > x0 && lx < x0 + 2.0 * half_span {
                // Shift the origin so the nearest node lands on the level
                let steps = ((lx - x0) / dx).round();
                x0 += lx - (x0 + steps * dx);
            }
        }

        let x: Vec<Real> = (0..n).map(|i| x0 + i as Real * dx).collect();
        let s: Vec<Real> = x.iter().map(|&v| v.exp()).collect();
        let weights = match config.quad_method {
            QuadMethod::Trapezoid => {
                let mut w = vec![dx; n];
                w[0] = 0.5 * dx;
                w[n - 1] = 0.5 * dx;
                w
            }
            QuadMethod::Simpson => {
                let mut w = vec![0.0; n];
                for (i, slot) in w.iter_mut().enumerate() {
                    *slot = if i == 0 || i == n - 1 {
                        dx / 3.0
                    } else if i % 2 == 1 {
                        4.0 * dx / 3.0
                    } else {
                        2.0 * dx / 3.0
                    };
                }
                w
            }
        };

        Ok(Self { x, s, dx, weights })
    }

    /// Index of the node closest to price `level`.
    pub fn node_at(&self, level: Real) -> usize {
        let lx = level.ln();
        let i = ((lx - self.x[0]) / self.dx).round() as i64;
        i.clamp(0, self.x.len() as i64 - 1) as usize
    }

    /// Linear interpolation of a value vector at price `level`.
    pub fn interpolate(&self, values: &[Real], level: Real) -> Real {
        let lx = level.ln();
        let n = self.x.len();
        if lx <= self.x[0] {
            return values[0];
        }
        if lx >= self.x[n - 1] {
            return values[n - 1];
        }
        let i = ((lx - self.x[0]) / self.dx).floor() as usize;
        let i = i.min(n - 2);
        let w = (lx - self.x[i]) / self.dx;
        values[i] * (1.0 - w) + values[i + 1] * w
    }
}

/// One backward density step over `dt`, precomputed as a Toeplitz row.
#[derive(Debug)]
pub(crate) struct DensityStep {
    /// Kernel values for offsets `j − i ∈ [−(n−1), n−1]`.
    kernel: Vec<Real>,
    /// Discount factor over the step.
    disc: Real,
    n: usize,
}

impl DensityStep {
    /// Precompute the transition kernel for a step of `dt`.
    pub fn new(mesh: &QuadMesh, mu: Real, sigma: Real, r: Real, dt: Time) -> Self {
        let n = mesh.x.len();
        let vol = sigma * dt.sqrt();
        let drift = (mu - 0.5 * sigma * sigma) * dt;
        let kernel: Vec<Real> = (-(n as i64 - 1)..=(n as i64 - 1))
            .map(|d| normal_pdf((d as Real * mesh.dx - drift) / vol) / vol)
            .collect();
        Self {
            kernel,
            disc: (-r * dt).exp(),
            n,
        }
    }

    /// Roll a value vector one step backward.
    pub fn apply(&self, mesh: &QuadMesh, values: &[Real]) -> Vec<Real> {
        let n = self.n;
        let mut out = vec![0.0; n];
        for (i, slot) in out.iter_mut().enumerate() {
            let mut acc = 0.0;
            // kernel offset index: (j − i) + (n − 1)
            let base = n - 1 - i;
            for j in 0..n {
                acc += mesh.weights[j] * self.kernel[base + j] * values[j];
            }
            *slot = acc * self.disc;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simpson_weights_integrate_quadratics_exactly() {
        let config = QuadConfig {
            quad_method: QuadMethod::Simpson,
            n_points: 101,
            n_max: 4,
        };
        let mesh = QuadMesh::build(&config, 100.0, 0.2, 1.0, None).unwrap();
        // ∫ x² over the mesh range
        let numeric: Real = mesh
            .x
            .iter()
            .zip(&mesh.weights)
            .map(|(&x, &w)| w * x * x)
            .sum();
        let (a, b) = (mesh.x[0], *mesh.x.last().unwrap());
        let exact = (b * b * b - a * a * a) / 3.0;
        assert!((numeric - exact).abs() < 1e-10);
    }

    #[test]
    fn mesh_anchors_barrier_on_node() {
        let config = QuadConfig::default();
        let mesh = QuadMesh::build(&config, 100.0, 0.2, 1.0, Some(110.0)).unwrap();
        let i = mesh.node_at(110.0);
        assert!(
            (mesh.s[i] - 110.0).abs() < 1e-9,
            "barrier off-node: {}",
            mesh.s[i]
        );
    }

    #[test]
    fn density_step_preserves_discounted_cash() {
        // Rolling a constant vector back one step must return the
        // discounted constant (density integrates to one).
        let config = QuadConfig {
            quad_method: QuadMethod::Simpson,
            n_points: 601,
            n_max: 6,
        };
        let mesh = QuadMesh::build(&config, 100.0, 0.2, 1.0, None).unwrap();
        let step = DensityStep::new(&mesh, 0.01, 0.2, 0.03, 1.0 / 12.0);
        let values = vec![1.0; mesh.x.len()];
        let rolled = step.apply(&mesh, &values);
        let mid = rolled[mesh.x.len() / 2];
        let expected = (-0.03_f64 / 12.0).exp();
        assert!(
            (mid - expected).abs() < 1e-6,
            "mass lost: {mid} vs {expected}"
        );
    }
}
