//! Parallel fetch of all quadrants on a fixed-size worker pool.
//!
//! Every task owns its quadrant, response body and decoded buffer; nothing is
//! shared between workers. Failures stay inside the task that produced them
//! and come back as a [`QuadrantReport`], so a run always yields a result set,
//! possibly empty.

use std::time::Instant;

use log::{info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::config::StarstreamConfig;
use crate::coords::StarPoint;
use crate::error::{AggregateError, FetchError};
use crate::quadrant::{partition, Quadrant};
use crate::tap::QuadrantSource;

/// Outcome of fetching one quadrant.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrantReport {
    pub quadrant: Quadrant,
    pub outcome: Result<Vec<StarPoint>, FetchError>,
}

impl QuadrantReport {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn star_count(&self) -> usize {
        self.outcome.as_ref().map_or(0, Vec::len)
    }

    pub fn status(&self) -> QuadrantStatus {
        match &self.outcome {
            Ok(stars) => QuadrantStatus::Ok {
                quadrant: self.quadrant,
                count: stars.len(),
            },
            Err(e) => QuadrantStatus::Failed {
                quadrant: self.quadrant,
                error: e.to_string(),
            },
        }
    }
}

/// Serializable per-quadrant status, without the stars themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuadrantStatus {
    Ok { quadrant: Quadrant, count: usize },
    Failed { quadrant: Quadrant, error: String },
}

/// All reports of one aggregate run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    pub reports: Vec<QuadrantReport>,
}

impl AggregateResult {
    /// Stars of every successful quadrant. Order within a quadrant follows
    /// the binary stream; order across quadrants is unspecified.
    pub fn stars(&self) -> impl Iterator<Item = &StarPoint> {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .flatten()
    }

    pub fn into_stars(self) -> Vec<StarPoint> {
        self.reports
            .into_iter()
            .filter_map(|r| r.outcome.ok())
            .flatten()
            .collect()
    }

    pub fn star_count(&self) -> usize {
        self.reports.iter().map(QuadrantReport::star_count).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_ok()).count()
    }

    pub fn statuses(&self) -> Vec<QuadrantStatus> {
        self.reports.iter().map(QuadrantReport::status).collect()
    }
}

/// Fixed-size pool that fetches a partitioned quadrant list.
///
/// The pool and task list are built once and reused for every run.
pub struct Aggregator {
    pool: ThreadPool,
    tasks: Vec<Quadrant>,
    worker_count: usize,
}

impl Aggregator {
    /// Partition `quadrants` for `worker_count` workers and start the pool.
    pub fn new(quadrants: &[Quadrant], worker_count: usize) -> Result<Self, AggregateError> {
        for quadrant in quadrants {
            quadrant.validate()?;
        }
        let tasks = partition(quadrants, worker_count)?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("quadrant-fetch-{i}"))
            .build()?;

        Ok(Self {
            pool,
            tasks,
            worker_count,
        })
    }

    pub fn from_config(config: &StarstreamConfig) -> Result<Self, AggregateError> {
        config.validate()?;
        Self::new(&config.quadrants, config.worker_count)
    }

    /// Quadrants actually dispatched, after partitioning.
    pub fn tasks(&self) -> &[Quadrant] {
        &self.tasks
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Fetch every task and block until all have finished.
    pub fn run<S: QuadrantSource + ?Sized>(&self, source: &S) -> AggregateResult {
        let start = Instant::now();

        let reports: Vec<QuadrantReport> = self.pool.install(|| {
            self.tasks
                .par_iter()
                .map(|quadrant| {
                    let outcome = source.fetch(quadrant);
                    if let Err(e) = &outcome {
                        warn!("Quadrant {quadrant} yielded no stars: {e}");
                    }
                    QuadrantReport {
                        quadrant: *quadrant,
                        outcome,
                    }
                })
                .collect()
        });

        let result = AggregateResult { reports };
        info!(
            "Fetched {} stars from {} quadrants ({} failed) in {:.2?}",
            result.star_count(),
            result.reports.len(),
            result.failed_count(),
            start.elapsed()
        );
        result
    }

    /// Fetch every task and return the flattened stars only.
    pub fn aggregate<S: QuadrantSource + ?Sized>(&self, source: &S) -> Vec<StarPoint> {
        self.run(source).into_stars()
    }
}

/// One-shot convenience: build a pool, fetch, flatten.
pub fn aggregate<S: QuadrantSource + ?Sized>(
    source: &S,
    quadrants: &[Quadrant],
    worker_count: usize,
) -> Result<Vec<StarPoint>, AggregateError> {
    Ok(Aggregator::new(quadrants, worker_count)?.aggregate(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuadrantError;
    use crate::quadrant::reference_quadrants;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn marker(q: &Quadrant, index: usize) -> StarPoint {
        StarPoint {
            x: q.ra_min,
            y: q.dec_min,
            z: index as f64,
            parallax: 1.0,
        }
    }

    /// Source returning three stars per quadrant, tagged with its bounds.
    fn tagged(q: &Quadrant) -> Result<Vec<StarPoint>, FetchError> {
        Ok((0..3).map(|i| marker(q, i)).collect())
    }

    #[test]
    fn test_flattens_all_quadrants() {
        let aggregator = Aggregator::new(&reference_quadrants(), 4).unwrap();
        let result = aggregator.run(&tagged);

        assert_eq!(result.reports.len(), 4);
        assert_eq!(result.failed_count(), 0);
        assert_eq!(result.star_count(), 12);

        let stars = result.into_stars();
        assert_eq!(stars.len(), 12);
        for quadrant in reference_quadrants() {
            let expected: Vec<_> = (0..3).map(|i| marker(&quadrant, i)).collect();
            let found: Vec<_> = stars
                .iter()
                .filter(|s| s.x == quadrant.ra_min && s.y == quadrant.dec_min)
                .copied()
                .collect();
            // within-quadrant order is preserved
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_completion_order_does_not_matter() {
        let source = |q: &Quadrant| -> Result<Vec<StarPoint>, FetchError> {
            // later quadrants finish first
            let delay = 80 - (q.ra_min as u64 / 90) * 30 - ((q.dec_min < -45.0) as u64) * 40;
            thread::sleep(Duration::from_millis(delay));
            tagged(q)
        };

        let mut stars = aggregate(&source, &reference_quadrants(), 4).unwrap();
        let mut expected: Vec<_> = reference_quadrants()
            .iter()
            .flat_map(|q| tagged(q).unwrap())
            .collect();

        let key = |s: &StarPoint| (s.x as i64, s.y as i64, s.z as i64);
        stars.sort_by_key(key);
        expected.sort_by_key(key);
        assert_eq!(stars, expected);
    }

    #[test]
    fn test_failures_are_contained() {
        let source = |q: &Quadrant| -> Result<Vec<StarPoint>, FetchError> {
            if q.ra_min == 90.0 {
                Err(FetchError::Transport("connection refused".to_string()))
            } else {
                tagged(q)
            }
        };

        let aggregator = Aggregator::new(&reference_quadrants(), 4).unwrap();
        let result = aggregator.run(&source);
        assert_eq!(result.failed_count(), 2);
        assert_eq!(result.star_count(), 6);
        assert_eq!(result.stars().count(), 6);

        let statuses = result.statuses();
        assert!(statuses.contains(&QuadrantStatus::Failed {
            quadrant: reference_quadrants()[1],
            error: "Transport error: connection refused".to_string(),
        }));
        assert!(statuses.contains(&QuadrantStatus::Ok {
            quadrant: reference_quadrants()[0],
            count: 3,
        }));
    }

    #[test]
    fn test_all_failed_is_empty_not_error() {
        let source = |_: &Quadrant| -> Result<Vec<StarPoint>, FetchError> {
            Err(FetchError::Transport("timed out".to_string()))
        };
        let stars = aggregate(&source, &reference_quadrants(), 2).unwrap();
        assert!(stars.is_empty());
    }

    #[test]
    fn test_dispatches_partitioned_tasks() {
        let calls = AtomicUsize::new(0);
        let source = |q: &Quadrant| -> Result<Vec<StarPoint>, FetchError> {
            calls.fetch_add(1, Ordering::SeqCst);
            tagged(q)
        };

        let aggregator = Aggregator::new(&reference_quadrants(), 8).unwrap();
        assert_eq!(aggregator.tasks().len(), 8);
        assert_eq!(aggregator.worker_count(), 8);

        let result = aggregator.run(&source);
        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(result.star_count(), 24);
    }

    #[test]
    fn test_concurrency_bounded_by_worker_count() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let source = |q: &Quadrant| -> Result<Vec<StarPoint>, FetchError> {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(40));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            tagged(q)
        };

        let quadrants: Vec<_> = (0..12)
            .map(|i| Quadrant::new(i as f64 * 10.0, i as f64 * 10.0 + 10.0, 0.0, 10.0).unwrap())
            .collect();
        let aggregator = Aggregator::new(&quadrants, 3).unwrap();
        assert_eq!(aggregator.tasks().len(), 3);

        let wide = Aggregator::new(&quadrants, 12).unwrap();
        wide.run(&source);
        let observed = peak.load(Ordering::SeqCst);
        assert!(observed <= 12);
        assert!(observed >= 2, "expected parallel fetches, peak was {observed}");

        peak.store(0, Ordering::SeqCst);
        aggregator.run(&source);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(matches!(
            Aggregator::new(&reference_quadrants(), 0),
            Err(AggregateError::Quadrant(QuadrantError::ZeroWorkers))
        ));

        let inverted = Quadrant {
            ra_min: 50.0,
            ra_max: 10.0,
            dec_min: 0.0,
            dec_max: 1.0,
        };
        assert!(matches!(
            Aggregator::new(&[inverted], 2),
            Err(AggregateError::Quadrant(QuadrantError::Inverted { .. }))
        ));
    }

    #[test]
    fn test_status_serialization() {
        let status = QuadrantStatus::Failed {
            quadrant: reference_quadrants()[0],
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["quadrant"]["raMax"], 90.0);
    }
}
