//! Ratio Universe
//!
//! Enumerates "numerator basket / denominator basket" pairs over an aligned
//! panel and computes each pair's ratio series on demand:
//!
//! ratio[t] = sum(panel[t, num]) / (sum(panel[t, den]) + epsilon)
//!
//! Baskets live in one flat index arena per basket size. Jobs are two
//! integer ids into those arenas, yielded lazily, so memory stays at
//! O(C(N,k) * k) no matter how many pairs a sweep visits.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::UniverseConfig;
use crate::domain::{AlignedPanel, SignalSeries};
use crate::error::{MrError, Result};

/// Exact binomial coefficient, failing on u128 overflow
pub fn binomial(n: u64, k: u64) -> Result<u128> {
    if k > n {
        return Ok(0);
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // acc * (n - i) is divisible by (i + 1) at every step
        acc = acc
            .checked_mul(u128::from(n - i))
            .ok_or_else(|| MrError::Numeric(format!("C({}, {}) overflows u128", n, k)))?
            / u128::from(i + 1);
    }
    Ok(acc)
}

/// Job count for a (k_num, k_den) sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatioCountEstimate {
    pub jobs: u128,
    /// False when overlap filtering may drop some of `jobs`
    pub exact: bool,
}

/// Number of jobs a sweep over `n` symbols would yield
///
/// Unfiltered pair count; with overlap filtering enabled it is an upper bound.
pub fn estimate_ratio_count(
    n: usize,
    k_num: usize,
    k_den: usize,
    config: &UniverseConfig,
) -> Result<RatioCountEstimate> {
    let b_num = binomial(n as u64, k_num as u64)?;
    let jobs = if k_num == k_den && config.unordered_if_equal_k {
        choose_two(b_num)?
    } else {
        let b_den = binomial(n as u64, k_den as u64)?;
        b_num.checked_mul(b_den).ok_or_else(|| {
            MrError::Numeric(format!("{} x {} ratio jobs overflow u128", b_num, b_den))
        })?
    };
    Ok(RatioCountEstimate {
        jobs,
        exact: !config.disallow_overlap,
    })
}

fn choose_two(b: u128) -> Result<u128> {
    if b < 2 {
        return Ok(0);
    }
    let (even, odd) = if b % 2 == 0 { (b / 2, b - 1) } else { (b, (b - 1) / 2) };
    even.checked_mul(odd)
        .ok_or_else(|| MrError::Numeric(format!("C({}, 2) overflows u128", b)))
}

/// Every size-`k` combination of `n` symbol indices, in lexicographic order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketLibrary {
    k: usize,
    len: usize,
    indices: Vec<u32>,
}

impl BasketLibrary {
    pub fn build(n: usize, k: usize, max_size: u64) -> Result<Self> {
        if k == 0 || k > n {
            return Err(MrError::config(format!(
                "basket size must be in 1..={}, got {}",
                n, k
            )));
        }
        let count = binomial(n as u64, k as u64)?;
        if count > u128::from(max_size) {
            return Err(MrError::config(format!(
                "C({}, {}) = {} baskets exceeds max_library_size {}",
                n, k, count, max_size
            )));
        }
        let len = usize::try_from(count)
            .map_err(|_| MrError::Numeric(format!("{} baskets do not fit in memory", count)))?;

        let mut indices = Vec::with_capacity(len * k);
        let mut combo: Vec<u32> = (0..k as u32).collect();
        let n = n as u32;
        loop {
            indices.extend_from_slice(&combo);
            // rightmost position that can still move
            let Some(pos) = (0..k).rev().find(|&i| combo[i] < n - (k - i) as u32) else {
                break;
            };
            combo[pos] += 1;
            for i in pos + 1..k {
                combo[i] = combo[i - 1] + 1;
            }
        }
        tracing::debug!("Built basket library k={} with {} baskets", k, len);
        Ok(Self { k, len, indices })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sorted symbol indices of basket `id`
    pub fn basket(&self, id: usize) -> &[u32] {
        &self.indices[id * self.k..(id + 1) * self.k]
    }
}

/// True when two sorted index sets share no element
pub fn is_disjoint(a: &[u32], b: &[u32]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return false,
        }
    }
    true
}

/// Reference to one numerator/denominator basket pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RatioJob {
    pub k_num: usize,
    pub k_den: usize,
    pub numerator_basket_id: usize,
    pub denominator_basket_id: usize,
}

impl RatioJob {
    /// Stable identifier, used as the backtest job id
    pub fn key(&self) -> String {
        format!(
            "{}:{}/{}:{}",
            self.k_num, self.numerator_basket_id, self.k_den, self.denominator_basket_id
        )
    }

    /// Human-readable "A+B/C+D"
    pub fn label(&self, universe: &RatioUniverse) -> Result<String> {
        let (num, den) = universe.baskets(self)?;
        Ok(basket_label(universe.panel(), num, den))
    }
}

/// Render two baskets as "A+B/C+D"
pub fn basket_label(panel: &AlignedPanel, num: &[u32], den: &[u32]) -> String {
    let names = |basket: &[u32]| {
        basket
            .iter()
            .map(|&i| panel.symbols()[i as usize].as_str())
            .collect::<Vec<_>>()
            .join("+")
    };
    format!("{}/{}", names(num), names(den))
}

/// Lazy job iterator; the overlap filter is applied per job
#[derive(Debug, Clone)]
pub struct JobIter {
    num: Arc<BasketLibrary>,
    den: Arc<BasketLibrary>,
    unordered: bool,
    disallow_overlap: bool,
    i: usize,
    j: usize,
}

impl JobIter {
    fn new(
        num: Arc<BasketLibrary>,
        den: Arc<BasketLibrary>,
        unordered: bool,
        disallow_overlap: bool,
    ) -> Self {
        let j = usize::from(unordered);
        Self {
            num,
            den,
            unordered,
            disallow_overlap,
            i: 0,
            j,
        }
    }

    fn advance(&mut self) {
        self.j += 1;
        if self.j >= self.den.len() {
            self.i += 1;
            self.j = if self.unordered { self.i + 1 } else { 0 };
        }
    }
}

impl Iterator for JobIter {
    type Item = RatioJob;

    fn next(&mut self) -> Option<RatioJob> {
        while self.i < self.num.len() {
            if self.j >= self.den.len() {
                self.advance();
                continue;
            }
            let (i, j) = (self.i, self.j);
            self.advance();
            if self.disallow_overlap && !is_disjoint(self.num.basket(i), self.den.basket(j)) {
                continue;
            }
            return Some(RatioJob {
                k_num: self.num.k(),
                k_den: self.den.k(),
                numerator_basket_id: i,
                denominator_basket_id: j,
            });
        }
        None
    }
}

/// Basket sums of both legs of a job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegSeries {
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
}

/// Panel plus cached basket libraries
#[derive(Debug)]
pub struct RatioUniverse {
    panel: AlignedPanel,
    config: UniverseConfig,
    libraries: HashMap<usize, Arc<BasketLibrary>>,
}

impl RatioUniverse {
    /// Normalizes the panel by its first row when configured
    pub fn new(panel: AlignedPanel, config: UniverseConfig) -> Result<Self> {
        if !(config.epsilon.is_finite() && config.epsilon > 0.0) {
            return Err(MrError::config(format!(
                "epsilon must be > 0, got {}",
                config.epsilon
            )));
        }
        let panel = if config.normalize {
            panel.normalized()?
        } else {
            panel
        };
        Ok(Self {
            panel,
            config,
            libraries: HashMap::new(),
        })
    }

    pub fn panel(&self) -> &AlignedPanel {
        &self.panel
    }

    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    /// Basket library for size `k`, built on first use
    pub fn library(&mut self, k: usize) -> Result<Arc<BasketLibrary>> {
        if let Some(lib) = self.libraries.get(&k) {
            return Ok(Arc::clone(lib));
        }
        let lib = Arc::new(BasketLibrary::build(
            self.panel.n_symbols(),
            k,
            self.config.max_library_size,
        )?);
        self.libraries.insert(k, Arc::clone(&lib));
        Ok(lib)
    }

    /// Lazily enumerate the jobs of a (k_num, k_den) sweep
    pub fn jobs(&mut self, k_num: usize, k_den: usize) -> Result<JobIter> {
        let num = self.library(k_num)?;
        let den = self.library(k_den)?;
        let unordered = k_num == k_den && self.config.unordered_if_equal_k;
        Ok(JobIter::new(num, den, unordered, self.config.disallow_overlap))
    }

    pub fn estimate_ratio_count(&self, k_num: usize, k_den: usize) -> Result<RatioCountEstimate> {
        estimate_ratio_count(self.panel.n_symbols(), k_num, k_den, &self.config)
    }

    /// Symbol indices of both baskets of a job
    pub fn baskets(&self, job: &RatioJob) -> Result<(&[u32], &[u32])> {
        let lib = |k: usize| {
            self.libraries
                .get(&k)
                .ok_or_else(|| MrError::config(format!("no basket library built for k={}", k)))
        };
        let num = lib(job.k_num)?;
        let den = lib(job.k_den)?;
        if job.numerator_basket_id >= num.len() || job.denominator_basket_id >= den.len() {
            return Err(MrError::config(format!("job {} is out of range", job.key())));
        }
        Ok((
            num.basket(job.numerator_basket_id),
            den.basket(job.denominator_basket_id),
        ))
    }

    pub fn compute_ratio_series(&self, job: &RatioJob) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.panel.n_dates());
        self.compute_ratio_series_into(job, &mut out)?;
        Ok(out)
    }

    /// Same values as [`Self::compute_ratio_series`], written into `out`
    pub fn compute_ratio_series_into(&self, job: &RatioJob, out: &mut Vec<f64>) -> Result<()> {
        let (num, den) = self.baskets(job)?;
        self.ratio_into(num, den, out);
        Ok(())
    }

    /// Ratio series of two explicit baskets
    pub fn ratio_into(&self, num: &[u32], den: &[u32], out: &mut Vec<f64>) {
        out.clear();
        out.extend((0..self.panel.n_dates()).map(|t| {
            let row = self.panel.row(t);
            basket_sum(row, num) / (basket_sum(row, den) + self.config.epsilon)
        }));
    }

    pub fn compute_leg_series(&self, job: &RatioJob) -> Result<LegSeries> {
        let mut legs = LegSeries::default();
        self.compute_leg_series_into(job, &mut legs)?;
        Ok(legs)
    }

    pub fn compute_leg_series_into(&self, job: &RatioJob, legs: &mut LegSeries) -> Result<()> {
        let (num, den) = self.baskets(job)?;
        self.legs_into(num, den, legs);
        Ok(())
    }

    /// Basket-sum price series of two explicit baskets
    pub fn legs_into(&self, num: &[u32], den: &[u32], legs: &mut LegSeries) {
        legs.numerator.clear();
        legs.denominator.clear();
        for t in 0..self.panel.n_dates() {
            let row = self.panel.row(t);
            legs.numerator.push(basket_sum(row, num));
            legs.denominator.push(basket_sum(row, den));
        }
    }

    pub fn compute_signal_series(&self, job: &RatioJob, kind: SignalSeries) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.panel.n_dates());
        self.compute_signal_series_into(job, kind, &mut out)?;
        Ok(out)
    }

    pub fn compute_signal_series_into(
        &self,
        job: &RatioJob,
        kind: SignalSeries,
        out: &mut Vec<f64>,
    ) -> Result<()> {
        self.compute_ratio_series_into(job, out)?;
        apply_signal(kind, out);
        Ok(())
    }

    /// Drive a sweep, handing each job's ratio series to `process`
    ///
    /// Stops when `process` returns false or after `max_jobs` jobs. Returns
    /// the number of jobs processed.
    pub fn scan<F>(
        &mut self,
        k_num: usize,
        k_den: usize,
        max_jobs: Option<usize>,
        mut process: F,
    ) -> Result<usize>
    where
        F: FnMut(&RatioJob, &[f64]) -> bool,
    {
        let jobs = self.jobs(k_num, k_den)?;
        let mut buffer = Vec::with_capacity(self.panel.n_dates());
        let mut processed = 0usize;
        for job in jobs {
            if max_jobs.is_some_and(|max| processed >= max) {
                break;
            }
            self.compute_ratio_series_into(&job, &mut buffer)?;
            processed += 1;
            if !process(&job, &buffer) {
                break;
            }
        }
        tracing::info!("Scanned {} ratio jobs (k_num={}, k_den={})", processed, k_num, k_den);
        Ok(processed)
    }
}

/// Turn a ratio series into the requested signal in place
pub fn apply_signal(kind: SignalSeries, series: &mut [f64]) {
    if kind == SignalSeries::LogRatio {
        for v in series.iter_mut() {
            *v = v.ln();
        }
    }
}

fn basket_sum(row: &[f64], basket: &[u32]) -> f64 {
    basket.iter().map(|&i| row[i as usize]).sum()
}
