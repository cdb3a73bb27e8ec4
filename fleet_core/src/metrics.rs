//! Rolling engine counters.

/// Counters accumulated across all frames since engine construction.
///
/// Live gauges (`live_*`, `over_capacity_stations`) reflect the most
/// recently applied snapshot; everything else is monotonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleMetrics {
    /// Frames parsed, sanitized, and applied to the overlay tables.
    pub frames_applied: u64,
    /// Frames dropped at the parse or payload-shape stage.
    pub frames_rejected: u64,
    pub live_vehicles: usize,
    pub live_stations: usize,
    pub live_routes: usize,
    pub live_corridors: usize,
    /// Vehicle records discarded for non-finite coordinates.
    pub dropped_vehicles: u64,
    /// Station records discarded for non-finite coordinates.
    pub dropped_stations: u64,
    /// Assignments whose route decoded to fewer than two points.
    pub undecodable_routes: u64,
    /// Stations in the live snapshot reporting more occupants than slots.
    pub over_capacity_stations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_zero() {
        let metrics = CycleMetrics::default();
        assert_eq!(metrics.frames_applied, 0);
        assert_eq!(metrics.frames_rejected, 0);
        assert_eq!(metrics.live_vehicles, 0);
        assert_eq!(metrics.undecodable_routes, 0);
    }
}
