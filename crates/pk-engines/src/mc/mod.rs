//! Monte Carlo engines.
//!
//! Every MC engine wraps an [`McCore`]: the configured random source, the
//! cached shock block, and the cached path set. Shocks are cached by their
//! shape (the seed and source are fixed per engine), so a bump-and-reprice
//! pass reuses the exact same draws and finite-difference Greeks are not
//! drowned in sampling noise. Paths are cached by grid shape and the
//! process version counter, and rebuild whenever market data mutates.

pub mod accrual;
pub mod autocallable;
pub mod barrier;
pub mod vanilla;

pub use accrual::{McAccumulatorEngine, McRangeAccrualEngine};
pub use autocallable::{McAutoCallEngine, McPhoenixEngine, McSnowballEngine};
pub use barrier::{McAirbagEngine, McBarrierEngine, McDoubleSharkEngine};
pub use vanilla::{McAsianEngine, McDigitalEngine, McDoubleDigitalEngine, McVanillaEngine};

use log::debug;
use pk_core::errors::Result;
use pk_core::{ensure, Real, Time};
use pk_math::{NormalSource, ShockMatrix};
use pk_processes::{PathMatrix, StochasticProcess};
use std::sync::{Arc, Mutex};

/// Pseudo-random versus low-discrepancy draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandsMethod {
    /// Mersenne-Twister pseudo-randoms.
    Pseudorandom,
    /// Low-discrepancy points chosen by [`LdMethod`].
    LowDiscrepancy,
}

/// Which low-discrepancy sequence to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdMethod {
    /// Sobol with Joe-Kuo directions.
    Sobol,
    /// Scrambled Halton.
    Halton,
}

/// Monte Carlo configuration shared by all MC engines.
#[derive(Debug, Clone, Copy)]
pub struct McConfig {
    /// Number of simulated paths.
    pub n_path: usize,
    /// Pseudo-random or low-discrepancy source.
    pub rands_method: RandsMethod,
    /// Antithetic pairing (halves the independent draws).
    pub antithetic_variate: bool,
    /// Low-discrepancy flavour when `rands_method` selects it.
    pub ld_method: LdMethod,
    /// Seed for the pseudo-random source (and Sobol padding).
    pub seed: u64,
}

impl Default for McConfig {
    fn default() -> Self {
        Self {
            n_path: 100_000,
            rands_method: RandsMethod::Pseudorandom,
            antithetic_variate: false,
            ld_method: LdMethod::Sobol,
            seed: 0,
        }
    }
}

type ShockCacheEntry = (usize, Arc<ShockMatrix>);
type PathCacheEntry = ((usize, u64, u64), Arc<PathMatrix>);

/// Process + configuration + caches shared by the MC engines.
#[derive(Debug)]
pub struct McCore {
    process: Arc<dyn StochasticProcess>,
    config: McConfig,
    shock_cache: Mutex<Option<ShockCacheEntry>>,
    path_cache: Mutex<Option<PathCacheEntry>>,
}

impl McCore {
    /// Create a core for the given process and configuration.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        ensure!(config.n_path >= 1, "n_path must be at least 1");
        ensure!(
            !config.antithetic_variate || config.n_path % 2 == 0,
            "antithetic pairing needs an even path count, got {}",
            config.n_path
        );
        Ok(Self {
            process,
            config,
            shock_cache: Mutex::new(None),
            path_cache: Mutex::new(None),
        })
    }

    /// The process supplying market data.
    pub fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn source(&self) -> NormalSource {
        match self.config.rands_method {
            RandsMethod::Pseudorandom => NormalSource::Pseudorandom,
            RandsMethod::LowDiscrepancy => match self.config.ld_method {
                LdMethod::Sobol => NormalSource::Sobol,
                LdMethod::Halton => NormalSource::Halton,
            },
        }
    }

    /// The shock block for a grid of `columns` normals per path.
    ///
    /// Cached by shape: repeated calls (and bumped reprices) see identical
    /// draws.
    fn shocks(&self, columns: usize) -> Result<Arc<ShockMatrix>> {
        let mut cache = self.shock_cache.lock().expect("shock cache poisoned");
        if let Some((cols, shocks)) = cache.as_ref() {
            if *cols == columns {
                return Ok(Arc::clone(shocks));
            }
        }
        debug!(
            "building {}x{columns} shock block ({:?})",
            self.config.n_path,
            self.source()
        );
        let shocks = Arc::new(ShockMatrix::generate(
            self.source(),
            self.config.seed,
            self.config.n_path,
            columns,
            self.config.antithetic_variate,
        )?);
        *cache = Some((columns, Arc::clone(&shocks)));
        Ok(shocks)
    }

    /// Simulated price paths over `[0, tau]` on `n_step` trading days.
    ///
    /// Cached by `(n_step, tau, process version)`; any market-data
    /// mutation invalidates the entry.
    pub fn paths(&self, tau: Time, n_step: usize) -> Result<Arc<PathMatrix>> {
        let key = (n_step, tau.to_bits(), self.process.version());
        let mut cache = self.path_cache.lock().expect("path cache poisoned");
        if let Some((k, paths)) = cache.as_ref() {
            if *k == key {
                return Ok(Arc::clone(paths));
            }
        }
        let shocks = self.shocks(n_step * self.process.shocks_per_step())?;
        let paths = Arc::new(self.process.simulate_paths(tau, n_step, &shocks)?);
        *cache = Some((key, Arc::clone(&paths)));
        Ok(paths)
    }

    /// Discount factor helper.
    pub fn disc(&self, t: Time) -> Real {
        self.process.disc_factor(t)
    }

    /// Year fraction of step `k` on the trading grid.
    pub fn step_time(&self, k: usize, tau: Time, n_step: usize) -> Time {
        tau * k as Time / n_step as Time
    }
}

/// Observation step indices within the grid: offsets clipped to `(0, n_step]`.
pub(crate) fn obs_steps(offsets: &[usize], n_step: usize) -> Vec<usize> {
    offsets
        .iter()
        .copied()
        .filter(|&k| k > 0 && k <= n_step)
        .collect()
}

/// Step stride for a discrete observation interval on a trading grid
/// (1 = daily; `None` also observes every grid step, approximating the
/// continuous limit).
pub(crate) fn obs_stride(
    interval: Option<Time>,
    steps_per_year: usize,
) -> usize {
    match interval {
        None => 1,
        Some(dt) => ((dt * steps_per_year as Time).round() as usize).max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pk_processes::GeneralizedBsmProcess;

    #[test]
    fn shock_cache_reuses_block() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.0, 0.2));
        let core = McCore::new(process, McConfig::default()).unwrap();
        let a = core.shocks(10).unwrap();
        let b = core.shocks(10).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn path_cache_invalidates_on_mutation() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.0, 0.2));
        let core = McCore::new(
            Arc::clone(&process) as Arc<dyn StochasticProcess>,
            McConfig {
                n_path: 64,
                ..Default::default()
            },
        )
        .unwrap();
        let a = core.paths(1.0, 12).unwrap();
        let b = core.paths(1.0, 12).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        process.set_spot(101.0);
        let c = core.paths(1.0, 12).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert!((c.path(0)[0] - 101.0).abs() < 1e-12);
    }

    #[test]
    fn antithetic_needs_even_paths() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.0, 0.2));
        let config = McConfig {
            n_path: 101,
            antithetic_variate: true,
            ..Default::default()
        };
        assert!(McCore::new(process, config).is_err());
    }

    #[test]
    fn observation_steps_clip_to_grid() {
        assert_eq!(obs_steps(&[0, 5, 10, 300], 243), vec![5, 10]);
        assert_eq!(obs_stride(Some(1.0 / 243.0), 243), 1);
        assert_eq!(obs_stride(Some(5.0 / 243.0), 243), 5);
        assert_eq!(obs_stride(None, 243), 1);
    }
}
