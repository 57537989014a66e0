//! Spherical to Cartesian projection of decoded catalog records.
//!
//! Distance is the literal inverse of the parallax value as delivered. No
//! milliarcsecond-to-parsec scaling is applied, so the unit of `x`, `y`, `z`
//! is "inverse parallax unit".

use serde::{Deserialize, Serialize};

use crate::votable::RawRecord;

/// Distance assigned to records whose parallax is exactly zero.
pub const ZERO_PARALLAX_DISTANCE: f64 = 1e10;

/// A star placed in 3D space, keeping its original parallax.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub parallax: f64,
}

/// Inverse-parallax distance with the zero-parallax sentinel.
pub fn parallax_distance(parallax: f64) -> f64 {
    if parallax != 0.0 {
        1.0 / parallax
    } else {
        ZERO_PARALLAX_DISTANCE
    }
}

/// Project one record into Cartesian space.
///
/// `dec` is treated as latitude and `ra` as longitude:
/// ```text
/// x = d * cos(dec) * cos(ra)
/// y = d * cos(dec) * sin(ra)
/// z = d * sin(dec)
/// ```
pub fn transform(record: &RawRecord) -> StarPoint {
    let ra = f64::from(record.ra).to_radians();
    let dec = f64::from(record.dec).to_radians();
    let parallax = f64::from(record.parallax);
    let distance = parallax_distance(parallax);

    let (sin_dec, cos_dec) = dec.sin_cos();
    let (sin_ra, cos_ra) = ra.sin_cos();

    StarPoint {
        x: distance * cos_dec * cos_ra,
        y: distance * cos_dec * sin_ra,
        z: distance * sin_dec,
        parallax,
    }
}

impl From<RawRecord> for StarPoint {
    fn from(record: RawRecord) -> Self {
        transform(&record)
    }
}

impl StarPoint {
    /// Euclidean distance from the origin.
    pub fn distance(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}
