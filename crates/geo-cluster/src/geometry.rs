//! Spherical geometry primitives
//!
//! Distances use the Haversine formula on a spherical Earth. Centroids are
//! computed by averaging unit vectors and projecting back to the sphere, so
//! clusters straddling the antimeridian or sitting near a pole keep a
//! sensible center.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance to another point in kilometers
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    fn to_unit_vector(self) -> [f64; 3] {
        let lat = self.latitude.to_radians();
        let lon = self.longitude.to_radians();
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }
}

/// Great-circle distance between two points given in degrees
pub fn distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let phi_a = lat_a.to_radians();
    let phi_b = lat_b.to_radians();
    let delta_phi = (lat_b - lat_a).to_radians();
    let delta_lambda = (lon_b - lon_a).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (delta_lambda / 2.0).sin().powi(2);

    // Rounding can push h a hair past 1.0 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Spherical centroid of a set of points. An empty set yields (0, 0).
pub fn compute_centroid(points: &[GeoPoint]) -> GeoPoint {
    if points.is_empty() {
        return GeoPoint::new(0.0, 0.0);
    }

    let mut sum = [0.0_f64; 3];
    for point in points {
        let v = point.to_unit_vector();
        sum[0] += v[0];
        sum[1] += v[1];
        sum[2] += v[2];
    }

    let n = points.len() as f64;
    let (x, y, z) = (sum[0] / n, sum[1] / n, sum[2] / n);

    let longitude = y.atan2(x).to_degrees();
    let latitude = z.atan2(x.hypot(y)).to_degrees();

    GeoPoint { latitude, longitude }
}

/// Spread of a cluster around its centroid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterMetrics {
    /// Farthest member distance from the centroid (km)
    pub radius_km: f64,
    /// Mean member distance from the centroid (km)
    pub average_distance_km: f64,
}

/// Farthest and mean distance of `members` from `centroid`, zero for an empty set
pub fn compute_cluster_metrics(members: &[GeoPoint], centroid: &GeoPoint) -> ClusterMetrics {
    if members.is_empty() {
        return ClusterMetrics::default();
    }

    let distances: Vec<f64> = members.iter().map(|m| m.distance_to(centroid)).collect();
    let radius_km = distances.iter().copied().fold(0.0_f64, f64::max);
    let average_distance_km = distances.iter().sum::<f64>() / distances.len() as f64;

    ClusterMetrics {
        radius_km,
        average_distance_km,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_distance_identity() {
        assert_eq!(distance_km(48.8566, 2.3522, 48.8566, 2.3522), 0.0);
        assert_eq!(distance_km(-90.0, 0.0, -90.0, 0.0), 0.0);
        assert_eq!(distance_km(0.0, 180.0, 0.0, 180.0), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let pairs = [
            ((48.8566, 2.3522), (35.6762, 139.6503)),
            ((-33.8688, 151.2093), (40.7128, -74.0060)),
            ((89.5, 10.0), (-89.5, -170.0)),
            ((0.0, 179.0), (0.0, -179.0)),
        ];

        for ((lat_a, lon_a), (lat_b, lon_b)) in pairs {
            let ab = distance_km(lat_a, lon_a, lat_b, lon_b);
            let ba = distance_km(lat_b, lon_b, lat_a, lon_a);
            assert!(approx(ab, ba, 1e-9), "{} != {}", ab, ba);
        }
    }

    #[test]
    fn test_distance_across_antimeridian() {
        let d = distance_km(0.0, 179.0, 0.0, -179.0);
        assert!(approx(d, 222.39, 1.0), "got {}", d);
    }

    #[test]
    fn test_distance_antipodal() {
        let d = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!(approx(d, 20015.09, 1.0), "got {}", d);

        let poles = distance_km(90.0, 0.0, -90.0, 0.0);
        assert!(poles.is_finite());
        assert!(approx(poles, 20015.09, 1.0));
    }

    #[test]
    fn test_distance_known_city_pair() {
        // Paris to Versailles
        let d = distance_km(48.8566, 2.3522, 48.8049, 2.1204);
        assert!(approx(d, 17.9, 0.2), "got {}", d);
    }

    #[test]
    fn test_centroid_empty() {
        assert_eq!(compute_centroid(&[]), GeoPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_centroid_single_point() {
        let c = compute_centroid(&[GeoPoint::new(12.5, -45.25)]);
        assert!(approx(c.latitude, 12.5, 1e-9));
        assert!(approx(c.longitude, -45.25, 1e-9));
    }

    #[test]
    fn test_centroid_across_antimeridian() {
        let points = [GeoPoint::new(10.0, 179.0), GeoPoint::new(10.0, -179.0)];
        let c = compute_centroid(&points);

        // Naive averaging would land on the prime meridian
        assert!(approx(c.longitude.abs(), 180.0, 1e-6), "got {}", c.longitude);
        assert!(approx(c.latitude, 10.0, 0.01));
    }

    #[test]
    fn test_centroid_near_pole() {
        let points = [
            GeoPoint::new(89.0, 0.0),
            GeoPoint::new(89.0, 90.0),
            GeoPoint::new(89.0, 180.0),
            GeoPoint::new(89.0, -90.0),
        ];
        let c = compute_centroid(&points);
        assert!(approx(c.latitude, 90.0, 1e-6), "got {}", c.latitude);
    }

    #[test]
    fn test_cluster_metrics() {
        let members = [
            GeoPoint::new(48.8566, 2.3522),
            GeoPoint::new(48.8049, 2.1204),
            GeoPoint::new(48.4084, 2.7008),
        ];
        let centroid = compute_centroid(&members);
        let metrics = compute_cluster_metrics(&members, &centroid);

        assert!(approx(metrics.radius_km, 38.71, 0.5), "got {}", metrics.radius_km);
        assert!(approx(metrics.average_distance_km, 27.03, 0.5));
        assert!(metrics.average_distance_km <= metrics.radius_km);
    }

    #[test]
    fn test_cluster_metrics_empty() {
        let metrics = compute_cluster_metrics(&[], &GeoPoint::new(0.0, 0.0));
        assert_eq!(metrics, ClusterMetrics::default());
    }
}
