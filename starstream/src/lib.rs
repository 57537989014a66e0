//! Gaia catalog fetching by sky quadrant.
//!
//! Queries a TAP archive for ra, dec and parallax inside a set of ra/dec
//! boxes, decodes the base64 VOTable binary stream of each answer, and
//! projects every star into Cartesian space. Quadrants are fetched in
//! parallel on a fixed-size pool and the results flattened.
//!
//! ```no_run
//! use starstream::{Aggregator, StarstreamConfig, TapClient};
//!
//! let config = StarstreamConfig::default();
//! let aggregator = Aggregator::from_config(&config)?;
//! let stars = aggregator.aggregate(&TapClient::new(&config));
//! println!("{} stars", stars.len());
//! # Ok::<(), starstream::AggregateError>(())
//! ```

pub mod aggregate;
pub mod config;
pub mod coords;
pub mod error;
pub mod quadrant;
pub mod tap;
pub mod votable;

pub use aggregate::{aggregate, AggregateResult, Aggregator, QuadrantReport, QuadrantStatus};
pub use config::{StarstreamConfig, TapConfig};
pub use coords::{transform, StarPoint, ZERO_PARALLAX_DISTANCE};
pub use error::{AggregateError, ConfigError, EnvelopeError, FetchError, QuadrantError};
pub use quadrant::{partition, reference_quadrants, Quadrant};
pub use tap::{
    build_query, build_url, records_from_votable, stars_from_votable, QuadrantSource, TapClient,
};
pub use votable::{decode, extract_stream, NonFinitePolicy, RawRecord, RecordDecoder};
