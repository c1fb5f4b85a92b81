use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, trace};

use crate::errors::SGError;
use crate::storage::{GridPointRef, GridStorage};

///
/// Scores grid points for removal. Points with smaller scores are removed first.
///
pub trait CoarseningFunctor : Sync
{
    fn score(&self, storage: &GridStorage, seq: usize, alpha: &[f64]) -> f64;

    ///
    /// Maximum number of points removed per call.
    ///
    fn removements_num(&self) -> usize;

    ///
    /// Points need a score strictly below this value.
    ///
    fn threshold(&self) -> f64;

    fn start(&self) -> f64
    {
        f64::MAX
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoarseningOptions
{
    /// Only points with a sequence number below this value are considered.
    pub num_first_only: Option<usize>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CoarseningResult
{
    pub removed: usize,
    /// Old sequence numbers of the surviving points, in their new order.
    pub remaining: Vec<usize>,
}

fn is_removable(point: &GridPointRef<'_>) -> bool
{
    point.is_leaf() && point.is_inner_point() && point.level().iter().any(|&l| l != 1)
}

#[derive(Default, Debug, Clone, Copy)]
pub struct HashCoarsening;

impl HashCoarsening
{
    ///
    /// Removes the lowest scoring leaves and compacts `alpha` to match the
    /// new sequence numbers.
    ///
    pub fn coarsen(&self, storage: &mut GridStorage, alpha: &mut Vec<f64>, functor: &dyn CoarseningFunctor, options: &CoarseningOptions) -> Result<CoarseningResult, SGError>
    {
        if storage.is_empty()
        {
            return Err(SGError::EmptyStorage);
        }
        if alpha.len() != storage.len()
        {
            return Err(SGError::CoefficientLengthMismatch { expected: storage.len(), actual: alpha.len() });
        }
        let _span = info_span!("coarsen", points = storage.len()).entered();
        let candidates = self.collect(storage, options);
        let selected: Vec<usize> = {
            let _span = info_span!("select", candidates = candidates.len()).entered();
            let storage_ref = &*storage;
            let alpha_ref = alpha.as_slice();
            let mut scored: Vec<(usize, f64)> = candidates.par_iter()
                .map(|&seq| (seq, functor.score(storage_ref, seq, alpha_ref).abs()))
                .collect();
            let (start, threshold) = (functor.start(), functor.threshold());
            scored.retain(|&(seq, s)|
            {
                let keep = s < threshold && s < start;
                trace!(seq, score = s, keep, "coarsening candidate");
                keep
            });
            scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            scored.truncate(functor.removements_num());
            scored.into_iter().map(|(seq, _)| seq).collect()
        };
        if selected.is_empty()
        {
            debug!(candidates = candidates.len(), "nothing to coarsen");
            return Ok(CoarseningResult { removed: 0, remaining: (0..storage.len()).collect() });
        }
        let remaining = {
            let _span = info_span!("apply", selected = selected.len()).entered();
            storage.delete_points(&selected)?
        };
        *alpha = remaining.iter().map(|&seq| alpha[seq]).collect();
        debug!(candidates = candidates.len(), removed = selected.len(), remaining = storage.len(), "coarsening finished");
        Ok(CoarseningResult { removed: selected.len(), remaining })
    }

    ///
    /// Returns the number of grid points that can be removed.
    ///
    pub fn number_of_removable_points(&self, storage: &GridStorage, options: &CoarseningOptions) -> usize
    {
        self.collect(storage, options).len()
    }

    fn collect(&self, storage: &GridStorage, options: &CoarseningOptions) -> Vec<usize>
    {
        let _span = info_span!("collect").entered();
        let limit = options.num_first_only.unwrap_or(usize::MAX);
        storage.iter()
            .take_while(|&(_, seq)| seq < limit)
            .filter(|(point, _)| is_removable(point))
            .map(|(_, seq)| seq)
            .collect()
    }
}
