//! Independent compensations in parallel.

use rayon::prelude::*;

use crate::compensation::compensator::NetworkCompensator;
use crate::domain::{CalculationResults, CompensationResults};
use crate::error::Result;

/// One traverse to compensate: reduced chain plus its distance vector.
#[derive(Debug, Clone, Copy)]
pub struct CompensationJob<'a> {
    pub results: &'a CalculationResults,
    pub distances: &'a [f64],
}

impl<'a> CompensationJob<'a> {
    pub fn new(results: &'a CalculationResults, distances: &'a [f64]) -> Self {
        Self { results, distances }
    }
}

/// Compensate every job with the same compensator.
///
/// Jobs share no state, so they run on the rayon pool; the output keeps the
/// input order and one failing job does not affect the others.
pub fn compensate_batch(
    compensator: &NetworkCompensator,
    jobs: &[CompensationJob<'_>],
) -> Vec<Result<CompensationResults>> {
    jobs.par_iter()
        .map(|job| compensator.compensate(job.results, job.distances))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{simulate_traverse, TraverseSimulation};
    use crate::domain::{CompensationConfig, LevelingConfig};
    use crate::reduction::reduce;

    #[test]
    fn batch_matches_sequential_and_keeps_order() {
        let reduced: Vec<CalculationResults> = (0..6)
            .map(|seed| {
                let sim = TraverseSimulation {
                    seed,
                    point_count: 8 + seed as usize,
                    close_loop: true,
                    ..TraverseSimulation::default()
                };
                reduce(&simulate_traverse(&sim).unwrap().traverse, &LevelingConfig::default()).unwrap()
            })
            .collect();
        let distances: Vec<Vec<f64>> = reduced.iter().map(|r| r.observation_distances().unwrap()).collect();

        let mut jobs: Vec<CompensationJob<'_>> =
            reduced.iter().zip(&distances).map(|(r, d)| CompensationJob::new(r, d)).collect();
        // A broken job in the middle.
        jobs[2].distances = &distances[2][1..];

        let compensator = NetworkCompensator::new(CompensationConfig::default()).unwrap();
        let batch = compensate_batch(&compensator, &jobs);
        assert_eq!(batch.len(), 6);
        assert_eq!(batch[2].as_ref().unwrap_err().code(), "DIMENSION_MISMATCH");
        for (i, out) in batch.iter().enumerate().filter(|(i, _)| *i != 2) {
            let sequential = compensator.compensate(&reduced[i], &distances[i]).unwrap();
            assert_eq!(out.as_ref().unwrap(), &sequential);
        }
    }
}
