use crate::geo::haversine_km;
use crate::models::location::{PositionReport, TrackStatistics};

/// Movement summary over reports sorted ascending by `recorded_at`.
///
/// Average and max speed come from the device-reported `speed` field, not
/// from displacement over time, so they can disagree with the distance when
/// GPS is noisy.
pub fn compute_statistics(reports: &[PositionReport]) -> TrackStatistics {
    let total_points = reports.len();
    if total_points < 2 {
        return TrackStatistics {
            total_points,
            ..TrackStatistics::default()
        };
    }

    let distance_traveled_km: f64 = reports
        .windows(2)
        .map(|pair| haversine_km(&pair[0].point(), &pair[1].point()))
        .sum();

    let speeds: Vec<f64> = reports.iter().filter_map(|report| report.speed).collect();
    let average_speed_kmh = if speeds.is_empty() {
        0.0
    } else {
        speeds.iter().sum::<f64>() / speeds.len() as f64
    };
    let max_speed_kmh = speeds.iter().copied().fold(0.0, f64::max);

    let first = reports[0].recorded_at;
    let last = reports[total_points - 1].recorded_at;

    TrackStatistics {
        total_points,
        distance_traveled_km,
        average_speed_kmh,
        max_speed_kmh,
        time_span_minutes: (last - first).num_minutes(),
    }
}
