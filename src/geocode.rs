//! Launch site geocoding
//!
//! Turning pad coordinates into an address is left to a [`Geocoder`]
//! implementation supplied by the embedding application. The station only
//! calls it best-effort, off the ingestion path, under a timeout.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{Result, TelemetryError};

/// Reverse geocoding collaborator.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync + 'static {
    /// Resolve coordinates into a human readable place name.
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String>;
}

/// Geocoder that formats the coordinates themselves.
///
/// Default when no external service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateGeocoder;

#[async_trait::async_trait]
impl Geocoder for CoordinateGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String> {
        Ok(format_coordinates(latitude, longitude))
    }
}

/// `"lat, lon"` with six decimals.
pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("{:.6}, {:.6}", latitude, longitude)
}

/// Parse a raw `"lat, lon"` launch site.
///
/// Returns `None` for anything that is not two finite numbers in range, such
/// as a site that is already a place name.
pub fn parse_coordinates(site: &str) -> Option<(f64, f64)> {
    let (lat, lon) = site.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    valid.then_some((lat, lon))
}

/// Resolve `site` under `timeout`, falling back to the raw string.
pub async fn resolve_or_raw(geocoder: Arc<dyn Geocoder>, site: String, timeout: Duration) -> String {
    let Some((lat, lon)) = parse_coordinates(&site) else {
        return site;
    };

    match tokio::time::timeout(timeout, geocoder.reverse(lat, lon)).await {
        Ok(Ok(address)) if !address.trim().is_empty() => {
            debug!(site = %site, address = %address, "Geocoded launch site");
            address
        }
        Ok(Ok(_)) => site,
        Ok(Err(e)) => {
            warn!(site = %site, error = %e, "Geocoding failed, keeping raw coordinates");
            site
        }
        Err(_) => {
            let e = TelemetryError::Timeout { duration: timeout };
            warn!(site = %site, error = %e, "Geocoding timed out, keeping raw coordinates");
            site
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for SlowGeocoder {
        async fn reverse(&self, _: f64, _: f64) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".into())
        }
    }

    struct FailingGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for FailingGeocoder {
        async fn reverse(&self, _: f64, _: f64) -> Result<String> {
            Err(TelemetryError::Geocode { reason: "service unavailable".into() })
        }
    }

    struct FixedGeocoder(&'static str);

    #[async_trait::async_trait]
    impl Geocoder for FixedGeocoder {
        async fn reverse(&self, _: f64, _: f64) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn parses_coordinate_sites() {
        assert_eq!(parse_coordinates("37.5665, 126.978"), Some((37.5665, 126.978)));
        assert_eq!(parse_coordinates(" -12.5 ,40"), Some((-12.5, 40.0)));
        assert_eq!(parse_coordinates("Naro Space Center"), None);
        assert_eq!(parse_coordinates("91.0, 0.0"), None);
        assert_eq!(parse_coordinates("NaN, 0.0"), None);
    }

    #[tokio::test]
    async fn successful_lookup_replaces_site() {
        let site = resolve_or_raw(
            Arc::new(FixedGeocoder("Goheung, Jeollanam-do")),
            "34.43, 127.53".into(),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(site, "Goheung, Jeollanam-do");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_raw_site() {
        let site =
            resolve_or_raw(Arc::new(SlowGeocoder), "1.0, 2.0".into(), Duration::from_secs(3))
                .await;
        assert_eq!(site, "1.0, 2.0");
    }

    #[tokio::test]
    async fn failure_keeps_raw_site() {
        let site =
            resolve_or_raw(Arc::new(FailingGeocoder), "1.0, 2.0".into(), Duration::from_secs(1))
                .await;
        assert_eq!(site, "1.0, 2.0");
    }

    #[tokio::test]
    async fn place_names_skip_lookup() {
        let site = resolve_or_raw(
            Arc::new(FixedGeocoder("should not be used")),
            "Naro Space Center".into(),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(site, "Naro Space Center");
    }

    #[tokio::test]
    async fn coordinate_geocoder_formats() {
        let name = CoordinateGeocoder.reverse(37.5665, 126.978).await.unwrap();
        assert_eq!(name, "37.566500, 126.978000");
    }
}
