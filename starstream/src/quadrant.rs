//! Sky regions used to split a catalog query, and the partitioner that
//! matches their number to the worker pool.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QuadrantError;

/// Valid right ascension range in degrees.
pub const RA_RANGE: (f64, f64) = (0.0, 360.0);
/// Valid declination range in degrees.
pub const DEC_RANGE: (f64, f64) = (-90.0, 90.0);

/// Rectangular ra/dec box in degrees.
///
/// Serialized with the archive-facing camelCase keys (`raMin`, `decMax`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quadrant {
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
}

fn check_axis(
    axis: &'static str,
    min: f64,
    max: f64,
    (low, high): (f64, f64),
) -> Result<(), QuadrantError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(QuadrantError::NonFinite { axis, min, max });
    }
    if min >= max {
        return Err(QuadrantError::Inverted { axis, min, max });
    }
    if min < low || max > high {
        return Err(QuadrantError::OutOfRange {
            axis,
            min,
            max,
            low,
            high,
        });
    }
    Ok(())
}

impl Quadrant {
    /// Create a validated quadrant.
    pub fn new(ra_min: f64, ra_max: f64, dec_min: f64, dec_max: f64) -> Result<Self, QuadrantError> {
        let quadrant = Self {
            ra_min,
            ra_max,
            dec_min,
            dec_max,
        };
        quadrant.validate()?;
        Ok(quadrant)
    }

    /// Check bounds are finite, ordered and inside the celestial sphere.
    pub fn validate(&self) -> Result<(), QuadrantError> {
        check_axis("ra", self.ra_min, self.ra_max, RA_RANGE)?;
        check_axis("dec", self.dec_min, self.dec_max, DEC_RANGE)
    }

    pub fn ra_width(&self) -> f64 {
        self.ra_max - self.ra_min
    }

    /// Split into `strips` equal-width slices along ra, keeping dec bounds.
    ///
    /// The last strip ends exactly at `ra_max`.
    pub fn split_ra(&self, strips: usize) -> Vec<Quadrant> {
        let strips = strips.max(1);
        let width = self.ra_width() / strips as f64;
        (0..strips)
            .map(|i| Quadrant {
                ra_min: self.ra_min + width * i as f64,
                ra_max: if i + 1 == strips {
                    self.ra_max
                } else {
                    self.ra_min + width * (i + 1) as f64
                },
                dec_min: self.dec_min,
                dec_max: self.dec_max,
            })
            .collect()
    }

    /// Smallest quadrant containing every member, or `None` for no members.
    ///
    /// Gaps between non-adjacent members are covered too, so callers should
    /// only merge contiguous regions.
    pub fn envelope<'a>(members: impl IntoIterator<Item = &'a Quadrant>) -> Option<Quadrant> {
        members.into_iter().fold(None, |acc: Option<Quadrant>, q| {
            Some(match acc {
                None => *q,
                Some(a) => Quadrant {
                    ra_min: a.ra_min.min(q.ra_min),
                    ra_max: a.ra_max.max(q.ra_max),
                    dec_min: a.dec_min.min(q.dec_min),
                    dec_max: a.dec_max.max(q.dec_max),
                },
            })
        })
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ra [{}, {}] dec [{}, {}]",
            self.ra_min, self.ra_max, self.dec_min, self.dec_max
        )
    }
}

/// The four fixed regions the service queries by default.
pub fn reference_quadrants() -> Vec<Quadrant> {
    vec![
        Quadrant {
            ra_min: 0.0,
            ra_max: 90.0,
            dec_min: -45.0,
            dec_max: 45.0,
        },
        Quadrant {
            ra_min: 90.0,
            ra_max: 180.0,
            dec_min: -45.0,
            dec_max: 45.0,
        },
        Quadrant {
            ra_min: 0.0,
            ra_max: 90.0,
            dec_min: -90.0,
            dec_max: -45.0,
        },
        Quadrant {
            ra_min: 90.0,
            ra_max: 180.0,
            dec_min: -90.0,
            dec_max: -45.0,
        },
    ]
}

/// Reshape `quadrants` into roughly `worker_count` fetch tasks.
///
/// With more workers than quadrants, each quadrant is cut into
/// `ceil(workers / quadrants)` ra strips. Otherwise consecutive quadrants are
/// grouped `ceil(quadrants / workers)` at a time and each group is replaced
/// by its bounding envelope. Inputs to the merging branch must be contiguous
/// in input order.
pub fn partition(
    quadrants: &[Quadrant],
    worker_count: usize,
) -> Result<Vec<Quadrant>, QuadrantError> {
    if worker_count == 0 {
        return Err(QuadrantError::ZeroWorkers);
    }
    if quadrants.is_empty() {
        return Ok(Vec::new());
    }

    let count = quadrants.len();
    if worker_count > count {
        let strips = worker_count.div_ceil(count);
        Ok(quadrants.iter().flat_map(|q| q.split_ra(strips)).collect())
    } else {
        let batch = count.div_ceil(worker_count);
        Ok(quadrants
            .chunks(batch)
            .filter_map(|group| Quadrant::envelope(group))
            .collect())
    }
}
