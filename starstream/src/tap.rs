//! Quadrant fetching against a TAP (Table Access Protocol) service.
//!
//! Each quadrant becomes one ADQL query sent as a synchronous GET. The VOTable
//! answer goes through envelope extraction, record decoding and the Cartesian
//! transform before it leaves this module.

use std::time::Duration;

use log::debug;
use ureq::Agent;

use crate::config::{StarstreamConfig, TapConfig};
use crate::coords::StarPoint;
use crate::error::{EnvelopeError, FetchError};
use crate::quadrant::Quadrant;
use crate::votable::{extract_stream, NonFinitePolicy, RawRecord, RecordDecoder};

/// Anything that can turn a quadrant into stars.
///
/// Implementations must be shareable across the worker pool. Closures with
/// the matching signature implement this trait, which keeps test doubles
/// short.
pub trait QuadrantSource: Send + Sync {
    fn fetch(&self, quadrant: &Quadrant) -> Result<Vec<StarPoint>, FetchError>;
}

impl<F> QuadrantSource for F
where
    F: Fn(&Quadrant) -> Result<Vec<StarPoint>, FetchError> + Send + Sync,
{
    fn fetch(&self, quadrant: &Quadrant) -> Result<Vec<StarPoint>, FetchError> {
        self(quadrant)
    }
}

/// ADQL selecting ra, dec and parallax inside `quadrant`.
pub fn build_query(quadrant: &Quadrant, max_rows: u32, table: &str) -> String {
    format!(
        "SELECT TOP {max_rows} ra, dec, parallax FROM {table} \
         WHERE ra BETWEEN {} AND {} AND dec BETWEEN {} AND {}",
        quadrant.ra_min, quadrant.ra_max, quadrant.dec_min, quadrant.dec_max
    )
}

/// Synchronous TAP request URL carrying `query` as an escaped parameter.
pub fn build_url(endpoint: &str, query: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{endpoint}{separator}REQUEST=doQuery&LANG=ADQL&FORMAT=votable&QUERY={}",
        urlencoding::encode(query)
    )
}

/// Decoded records of a VOTable document, before projection.
///
/// A document without a STREAM element yields no records.
pub fn records_from_votable(
    xml: &str,
    policy: NonFinitePolicy,
) -> Result<Vec<RawRecord>, EnvelopeError> {
    let Some(bytes) = extract_stream(xml)? else {
        return Ok(Vec::new());
    };
    Ok(RecordDecoder::new(&bytes, policy).collect())
}

/// Run a VOTable document through extraction, decoding and projection.
pub fn stars_from_votable(
    xml: &str,
    policy: NonFinitePolicy,
) -> Result<Vec<StarPoint>, EnvelopeError> {
    Ok(records_from_votable(xml, policy)?
        .into_iter()
        .map(StarPoint::from)
        .collect())
}

/// Blocking client for a TAP sync endpoint.
#[derive(Debug, Clone)]
pub struct TapClient {
    agent: Agent,
    tap: TapConfig,
    max_rows: u32,
    policy: NonFinitePolicy,
}

impl TapClient {
    /// Create a client from the archive settings of `config`.
    pub fn new(config: &StarstreamConfig) -> Self {
        Self::with_options(config.tap.clone(), config.max_rows_per_query, config.non_finite)
    }

    pub fn with_options(tap: TapConfig, max_rows: u32, policy: NonFinitePolicy) -> Self {
        let agent = Agent::new_with_config(
            Agent::config_builder()
                .timeout_global(Some(tap.timeout()))
                .build(),
        );
        Self {
            agent,
            tap,
            max_rows,
            policy,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.tap.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.tap.timeout()
    }

    /// Full request URL for one quadrant.
    pub fn query_url(&self, quadrant: &Quadrant) -> String {
        build_url(
            &self.tap.endpoint,
            &build_query(quadrant, self.max_rows, &self.tap.table),
        )
    }

    /// GET the VOTable text for `url`.
    fn get_votable(&self, url: &str) -> Result<String, FetchError> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if let Some(content_type) = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.to_ascii_lowercase().contains("xml") {
                return Err(FetchError::UnexpectedContentType(content_type.to_string()));
            }
        }

        response
            .body_mut()
            .read_to_string()
            .map_err(|e| FetchError::Body(e.to_string()))
    }

    /// Fetch one quadrant and return the decoded records without projecting.
    pub fn fetch_records(&self, quadrant: &Quadrant) -> Result<Vec<RawRecord>, FetchError> {
        let body = self.get_votable(&self.query_url(quadrant))?;
        Ok(records_from_votable(&body, self.policy)?)
    }
}

impl QuadrantSource for TapClient {
    fn fetch(&self, quadrant: &Quadrant) -> Result<Vec<StarPoint>, FetchError> {
        let url = self.query_url(quadrant);
        debug!("Fetching {quadrant} from {url}");

        let body = self.get_votable(&url)?;
        let stars = stars_from_votable(&body, self.policy)?;

        debug!("Decoded {} stars for {quadrant}", stars.len());
        Ok(stars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn reference() -> Quadrant {
        Quadrant::new(0.0, 90.0, -45.0, 45.0).unwrap()
    }

    #[test]
    fn test_query_embeds_bounds_and_limit() {
        let query = build_query(&reference(), 1000, "gaiadr2.gaia_source");
        assert_eq!(
            query,
            "SELECT TOP 1000 ra, dec, parallax FROM gaiadr2.gaia_source \
             WHERE ra BETWEEN 0 AND 90 AND dec BETWEEN -45 AND 45"
        );

        let fractional = Quadrant::new(22.5, 45.0, -89.5, -45.0).unwrap();
        assert!(build_query(&fractional, 10, "t").contains("ra BETWEEN 22.5 AND 45"));
    }

    #[test]
    fn test_url_escapes_query() {
        let url = build_url("https://example.org/tap/sync", "SELECT TOP 1 ra FROM t WHERE ra > 5");
        assert_eq!(
            url,
            "https://example.org/tap/sync?REQUEST=doQuery&LANG=ADQL&FORMAT=votable\
             &QUERY=SELECT%20TOP%201%20ra%20FROM%20t%20WHERE%20ra%20%3E%205"
        );
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_url_appends_to_existing_query_string() {
        let url = build_url("http://host/sync?PHASE=RUN", "x");
        assert!(url.starts_with("http://host/sync?PHASE=RUN&REQUEST=doQuery"));
    }

    #[test]
    fn test_client_url_uses_config() {
        let client = TapClient::new(&StarstreamConfig::default());
        let url = client.query_url(&reference());
        assert!(url.starts_with("https://gea.esac.esa.int/tap-server/tap/sync?"));
        assert!(url.contains("TOP%201000"));
        assert!(url.contains("gaiadr2.gaia_source"));
        assert_eq!(client.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_stars_from_votable_pipeline() {
        let records = [
            RawRecord::new(0.0, 0.0, 0.5),
            RawRecord::new(f32::NAN, 0.0, 0.5),
            RawRecord::new(90.0, 0.0, 0.0),
        ];
        let mut bytes: Vec<u8> = records.iter().flat_map(|r| r.to_le_bytes()).collect();
        bytes.extend_from_slice(&[0xAB; 5]);
        let xml = format!(
            "<VOTABLE><RESOURCE><TABLE><DATA><BINARY2><STREAM encoding=\"base64\">{}</STREAM></BINARY2></DATA></TABLE></RESOURCE></VOTABLE>",
            STANDARD.encode(&bytes)
        );

        let stars = stars_from_votable(&xml, NonFinitePolicy::default()).unwrap();
        assert_eq!(stars.len(), 2);
        assert_eq!(stars[0].x, 2.0);
        assert_eq!(stars[1].parallax, 0.0);
        assert!(stars[1].y > 1e9);
    }

    #[test]
    fn test_stars_match_projected_records() {
        let records = [RawRecord::new(10.0, 20.0, 0.5), RawRecord::new(200.0, -60.0, 0.0)];
        let bytes: Vec<u8> = records.iter().flat_map(|r| r.to_le_bytes()).collect();
        let xml = format!("<VOTABLE><STREAM>{}</STREAM></VOTABLE>", STANDARD.encode(&bytes));

        let decoded = records_from_votable(&xml, NonFinitePolicy::default()).unwrap();
        let stars = stars_from_votable(&xml, NonFinitePolicy::default()).unwrap();
        assert_eq!(decoded, records);
        let projected: Vec<StarPoint> = decoded.iter().map(crate::coords::transform).collect();
        assert_eq!(stars, projected);

        let broken = "<VOTABLE><STREAM>AAAA</VOTABLE>";
        assert!(records_from_votable(broken, NonFinitePolicy::default()).is_err());
        assert!(stars_from_votable(broken, NonFinitePolicy::default()).is_err());
    }

    #[test]
    fn test_votable_without_stream() {
        let stars = stars_from_votable("<VOTABLE/>", NonFinitePolicy::default()).unwrap();
        assert!(stars.is_empty());
        let records = records_from_votable("<VOTABLE/>", NonFinitePolicy::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_closure_is_a_source() {
        let source = |q: &Quadrant| -> Result<Vec<StarPoint>, FetchError> {
            Ok(vec![StarPoint {
                x: q.ra_min,
                y: q.ra_max,
                z: 0.0,
                parallax: 1.0,
            }])
        };
        let stars = source.fetch(&reference()).unwrap();
        assert_eq!(stars[0].y, 90.0);
    }
}
