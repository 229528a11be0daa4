use crate::model::*;

// ── Availability Algorithm ────────────────────────────────────────

/// Free units safe to reserve on every day of `query.range`.
///
/// Maintenance overrides interval math. Otherwise the answer is
/// `total_units - peak`, where `peak` is the highest per-day committed sum
/// inside the window (holds of `query.exclude_consumer` ignored).
/// `intervals` must be sorted by start date.
pub fn compute_availability(
    item: &InventoryItem,
    intervals: &[ReservationInterval],
    query: &AvailabilityQuery,
) -> AvailabilityResult {
    if item.is_under_maintenance {
        return AvailabilityResult {
            available_units: 0,
            is_under_maintenance: true,
        };
    }
    let peak = peak_committed(intervals, &query.range, query.exclude_consumer);
    AvailabilityResult {
        available_units: free_units(item.total_units, peak),
        is_under_maintenance: false,
    }
}

fn free_units(total_units: u32, committed: u64) -> u32 {
    let committed = committed.min(total_units as u64) as u32;
    total_units - committed
}

/// Sweep events clamped to `window`: `+units` on the first held day,
/// `-units` on the day after the last held day.
fn sweep_events(
    intervals: &[ReservationInterval],
    window: &DateRange,
    exclude: Option<ConsumerId>,
) -> Vec<(DayNumber, i64)> {
    let mut events: Vec<(DayNumber, i64)> = Vec::new();
    for interval in overlapping(intervals, window) {
        if exclude == Some(interval.consumer_id) {
            continue;
        }
        let start = interval.range.start.max(window.start);
        let end = interval.range.end.min(window.end);
        events.push((day_number(start), interval.units as i64));
        events.push((day_number(end) + 1, -(interval.units as i64)));
    }
    // Releases sort before acquisitions on the same day, so back-to-back
    // holds never look like they overlap.
    events.sort_unstable();
    events
}

/// Highest committed unit sum on any single day of `window`.
pub fn peak_committed(
    intervals: &[ReservationInterval],
    window: &DateRange,
    exclude: Option<ConsumerId>,
) -> u64 {
    let mut committed: i64 = 0;
    let mut peak: i64 = 0;
    for (_, delta) in sweep_events(intervals, window, exclude) {
        committed += delta;
        peak = peak.max(committed);
    }
    peak as u64
}

/// Split `range` into maximal runs of constant availability.
pub fn availability_profile(
    item: &InventoryItem,
    intervals: &[ReservationInterval],
    range: &DateRange,
) -> Vec<ProfileSegment> {
    if !range.is_valid() {
        return Vec::new();
    }
    if item.is_under_maintenance {
        return vec![ProfileSegment {
            range: *range,
            available_units: 0,
        }];
    }

    let last_day = day_number(range.end);
    let mut segments: Vec<ProfileSegment> = Vec::new();
    let mut push = |from: DayNumber, to: DayNumber, committed: i64| {
        let available_units = free_units(item.total_units, committed.max(0) as u64);
        if let Some(prev) = segments.last_mut()
            && prev.available_units == available_units
        {
            prev.range.end = from_day_number(to);
            return;
        }
        segments.push(ProfileSegment {
            range: DateRange::new(from_day_number(from), from_day_number(to)),
            available_units,
        });
    };

    let mut cursor = day_number(range.start);
    let mut committed: i64 = 0;
    for (day, delta) in sweep_events(intervals, range, None) {
        if day > cursor {
            push(cursor, day - 1, committed);
            cursor = day;
        }
        committed += delta;
    }
    if cursor <= last_day {
        push(cursor, last_day, committed);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn item(total_units: u32) -> InventoryItem {
        InventoryItem::new(Ulid::new(), None, total_units)
    }

    fn hold(consumer_id: ConsumerId, start: NaiveDate, end: NaiveDate, units: u32) -> ReservationInterval {
        ReservationInterval {
            item_id: Ulid::nil(),
            consumer_id,
            kind: ReservationKind::Booking,
            range: DateRange::new(start, end),
            units,
        }
    }

    fn sorted(mut intervals: Vec<ReservationInterval>) -> Vec<ReservationInterval> {
        intervals.sort_by_key(|i| i.range.start);
        intervals
    }

    fn query(item: &InventoryItem, start: NaiveDate, end: NaiveDate) -> AvailabilityQuery {
        AvailabilityQuery::new(item.id, DateRange::new(start, end))
    }

    #[test]
    fn empty_item_is_fully_free() {
        let it = item(10);
        let r = compute_availability(&it, &[], &query(&it, d(1, 1), d(12, 31)));
        assert_eq!(r.available_units, 10);
        assert!(!r.is_under_maintenance);
    }

    #[test]
    fn maintenance_overrides_everything() {
        let mut it = item(10);
        it.is_under_maintenance = true;
        let r = compute_availability(&it, &[], &query(&it, d(1, 1), d(1, 2)));
        assert_eq!(r.available_units, 0);
        assert!(r.is_under_maintenance);
    }

    #[test]
    fn partial_overlap_counts_against_window() {
        let it = item(10);
        let holds = vec![hold(Ulid::new(), d(1, 1), d(1, 10), 6)];
        let r = compute_availability(&it, &holds, &query(&it, d(1, 5), d(1, 15)));
        assert_eq!(r.available_units, 4);
    }

    #[test]
    fn disjoint_holds_do_not_stack() {
        let it = item(10);
        let holds = sorted(vec![
            hold(Ulid::new(), d(1, 1), d(1, 5), 6),
            hold(Ulid::new(), d(1, 10), d(1, 15), 7),
        ]);
        let r = compute_availability(&it, &holds, &query(&it, d(1, 1), d(1, 31)));
        assert_eq!(r.available_units, 3); // worst day, not the sum
    }

    #[test]
    fn back_to_back_holds_do_not_overlap() {
        let it = item(10);
        let holds = sorted(vec![
            hold(Ulid::new(), d(1, 1), d(1, 10), 6),
            hold(Ulid::new(), d(1, 11), d(1, 20), 6),
        ]);
        let r = compute_availability(&it, &holds, &query(&it, d(1, 1), d(1, 20)));
        assert_eq!(r.available_units, 4);
    }

    #[test]
    fn shared_boundary_day_stacks() {
        let it = item(10);
        let holds = sorted(vec![
            hold(Ulid::new(), d(1, 1), d(1, 10), 6),
            hold(Ulid::new(), d(1, 10), d(1, 20), 3),
        ]);
        let r = compute_availability(&it, &holds, &query(&it, d(1, 1), d(1, 20)));
        assert_eq!(r.available_units, 1);
    }

    #[test]
    fn hold_outside_window_ignored() {
        let it = item(10);
        let holds = sorted(vec![
            hold(Ulid::new(), d(1, 1), d(1, 4), 9),
            hold(Ulid::new(), d(2, 1), d(2, 4), 9),
        ]);
        let r = compute_availability(&it, &holds, &query(&it, d(1, 5), d(1, 31)));
        assert_eq!(r.available_units, 10);
    }

    #[test]
    fn excluded_consumer_not_counted() {
        let it = item(10);
        let me = Ulid::new();
        let holds = sorted(vec![
            hold(me, d(1, 1), d(1, 10), 6),
            hold(Ulid::new(), d(1, 5), d(1, 8), 2),
        ]);
        let q = query(&it, d(1, 1), d(1, 10)).excluding(me);
        assert_eq!(compute_availability(&it, &holds, &q).available_units, 8);
        let q = query(&it, d(1, 1), d(1, 10));
        assert_eq!(compute_availability(&it, &holds, &q).available_units, 2);
    }

    #[test]
    fn overcommitted_data_saturates_at_zero() {
        let it = item(5);
        let holds = sorted(vec![
            hold(Ulid::new(), d(1, 1), d(1, 10), 4),
            hold(Ulid::new(), d(1, 1), d(1, 10), 4),
        ]);
        let r = compute_availability(&it, &holds, &query(&it, d(1, 1), d(1, 1)));
        assert_eq!(r.available_units, 0);
    }

    #[test]
    fn peak_tracks_maximum_not_final_value() {
        let holds = sorted(vec![
            hold(Ulid::new(), d(1, 1), d(1, 3), 2),
            hold(Ulid::new(), d(1, 2), d(1, 2), 5),
        ]);
        let window = DateRange::new(d(1, 1), d(1, 31));
        assert_eq!(peak_committed(&holds, &window, None), 7);
    }

    #[test]
    fn profile_of_empty_item_is_one_segment() {
        let it = item(4);
        let range = DateRange::new(d(3, 1), d(3, 31));
        let profile = availability_profile(&it, &[], &range);
        assert_eq!(
            profile,
            vec![ProfileSegment {
                range,
                available_units: 4
            }]
        );
    }

    #[test]
    fn profile_splits_on_changes() {
        let it = item(10);
        let holds = sorted(vec![
            hold(Ulid::new(), d(1, 3), d(1, 5), 4),
            hold(Ulid::new(), d(1, 5), d(1, 7), 2),
        ]);
        let profile = availability_profile(&it, &holds, &DateRange::new(d(1, 1), d(1, 10)));
        let expected = vec![
            (d(1, 1), d(1, 2), 10),
            (d(1, 3), d(1, 4), 6),
            (d(1, 5), d(1, 5), 4),
            (d(1, 6), d(1, 7), 8),
            (d(1, 8), d(1, 10), 10),
        ];
        let got: Vec<_> = profile
            .iter()
            .map(|s| (s.range.start, s.range.end, s.available_units))
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn profile_merges_equal_neighbours() {
        let it = item(10);
        let holds = sorted(vec![
            hold(Ulid::new(), d(1, 1), d(1, 5), 3),
            hold(Ulid::new(), d(1, 6), d(1, 9), 3),
        ]);
        let profile = availability_profile(&it, &holds, &DateRange::new(d(1, 1), d(1, 9)));
        assert_eq!(profile.len(), 1);
        assert_eq!(profile[0].available_units, 7);
    }

    #[test]
    fn profile_minimum_matches_availability() {
        let it = item(12);
        let holds = sorted(vec![
            hold(Ulid::new(), d(2, 1), d(2, 20), 5),
            hold(Ulid::new(), d(2, 10), d(3, 5), 4),
            hold(Ulid::new(), d(2, 15), d(2, 16), 2),
        ]);
        let range = DateRange::new(d(2, 1), d(3, 10));
        let min = availability_profile(&it, &holds, &range)
            .iter()
            .map(|s| s.available_units)
            .min()
            .unwrap();
        let q = AvailabilityQuery::new(it.id, range);
        assert_eq!(min, compute_availability(&it, &holds, &q).available_units);
        assert_eq!(min, 1);
    }

    #[test]
    fn profile_under_maintenance_is_zero() {
        let mut it = item(3);
        it.is_under_maintenance = true;
        let range = DateRange::new(d(1, 1), d(1, 3));
        let profile = availability_profile(&it, &[], &range);
        assert_eq!(profile.len(), 1);
        assert_eq!(profile[0].available_units, 0);
    }
}
