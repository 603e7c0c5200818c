//! Operating-window admission
//!
//! Shared by the timeline assembler and the preview simulator: given a
//! hotspot's windows for one weekday, decide whether a proposed visit
//! fits, must wait for a later opening, or cannot happen that day.
//!
//! Weekdays with no window rows are closed unless the hotspot carries
//! the explicit always-open marker.

use chrono::NaiveTime;

use super::clock;
use crate::types::OperatingWindow;

/// End-of-day close used for open-all-day windows when ranking by
/// closing time.
pub const OPEN_ALL_DAY_CLOSE_SECONDS: i64 = 24 * 60 * 60;

/// Outcome of checking one proposed visit against a hotspot's windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The visit fits as proposed.
    Admit,
    /// Not open yet at the proposed arrival; the earliest usable window
    /// opens at this time. The caller may wait and retry once.
    OpensLater { opens_at: NaiveTime },
    /// No usable window admits this visit for the whole weekday.
    Closed,
}

fn usable<'a>(windows: &'a [&'a OperatingWindow]) -> impl Iterator<Item = &'a OperatingWindow> + 'a {
    windows.iter().copied().filter(|w| !w.closed)
}

/// Plain arrival-time admission: true iff the arrival instant lies
/// inside some non-closed window, or the hotspot is open all day.
pub fn admits_at(windows: &[&OperatingWindow], always_open: bool, arrival: NaiveTime) -> bool {
    if always_open {
        return true;
    }
    usable(windows).any(|w| w.open_all_day || (w.start <= arrival && arrival < w.end))
}

/// Full visit admission: the arrival must be admitted and the visit must
/// finish before the window closes.
pub fn check_visit(
    windows: &[&OperatingWindow],
    always_open: bool,
    arrival: NaiveTime,
    visit_end: NaiveTime,
) -> Admission {
    if always_open {
        return Admission::Admit;
    }

    let mut next_open: Option<NaiveTime> = None;

    for window in usable(windows) {
        if window.open_all_day {
            return Admission::Admit;
        }

        if window.start <= arrival && arrival < window.end {
            if visit_end <= window.end {
                return Admission::Admit;
            }
            // Inside the window but the visit spills past its close;
            // a later window may still take it.
            continue;
        }

        if window.start > arrival {
            let duration = clock::diff_seconds(visit_end, arrival);
            let shifted_end = clock::add_seconds(window.start, duration);
            // Only windows the shifted visit would actually fit into
            // are worth waiting for.
            if shifted_end.is_some_and(|end| end <= window.end)
                && next_open.map_or(true, |t| window.start < t)
            {
                next_open = Some(window.start);
            }
        }
    }

    match next_open {
        Some(opens_at) => Admission::OpensLater { opens_at },
        None => Admission::Closed,
    }
}

/// Earliest closing time of the hotspot's usable windows that weekday,
/// in seconds from midnight. Open-all-day counts as a midnight close so
/// it ranks after every timed window.
pub fn earliest_close_seconds(windows: &[&OperatingWindow], always_open: bool) -> i64 {
    if always_open {
        return OPEN_ALL_DAY_CLOSE_SECONDS;
    }
    usable(windows)
        .map(|w| {
            if w.open_all_day {
                OPEN_ALL_DAY_CLOSE_SECONDS
            } else {
                clock::seconds_from_midnight(w.end)
            }
        })
        .min()
        .unwrap_or(OPEN_ALL_DAY_CLOSE_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(start: NaiveTime, end: NaiveTime) -> OperatingWindow {
        OperatingWindow {
            hotspot_id: 1,
            weekday: 1,
            start,
            end,
            closed: false,
            open_all_day: false,
        }
    }

    // -----------------------------------------------------------------------
    // check_visit
    // -----------------------------------------------------------------------

    #[test]
    fn test_admit_inside_window() {
        let w = window(hm(9, 0), hm(17, 0));
        let windows = vec![&w];
        assert_eq!(check_visit(&windows, false, hm(10, 0), hm(11, 0)), Admission::Admit);
    }

    #[test]
    fn test_reject_after_close() {
        // Closing 17:30, arriving 18:00 — a window miss, not a shift.
        let w = window(hm(9, 0), hm(17, 30));
        let windows = vec![&w];
        assert_eq!(check_visit(&windows, false, hm(18, 0), hm(19, 0)), Admission::Closed);
    }

    #[test]
    fn test_visit_spilling_past_close_rejected() {
        let w = window(hm(9, 0), hm(17, 0));
        let windows = vec![&w];
        assert_eq!(check_visit(&windows, false, hm(16, 30), hm(17, 30)), Admission::Closed);
    }

    #[test]
    fn test_arrival_before_opening_waits() {
        let w = window(hm(10, 0), hm(17, 0));
        let windows = vec![&w];
        assert_eq!(
            check_visit(&windows, false, hm(9, 30), hm(10, 30)),
            Admission::OpensLater { opens_at: hm(10, 0) }
        );
    }

    #[test]
    fn test_wait_skipped_when_shifted_visit_would_not_fit() {
        // Window is only 30 minutes long; a 60-minute visit never fits.
        let w = window(hm(10, 0), hm(10, 30));
        let windows = vec![&w];
        assert_eq!(check_visit(&windows, false, hm(9, 0), hm(10, 0)), Admission::Closed);
    }

    #[test]
    fn test_second_window_taken_when_first_missed() {
        let morning = window(hm(9, 0), hm(12, 0));
        let evening = window(hm(15, 0), hm(19, 0));
        let windows = vec![&morning, &evening];
        assert_eq!(
            check_visit(&windows, false, hm(13, 0), hm(14, 0)),
            Admission::OpensLater { opens_at: hm(15, 0) }
        );
    }

    #[test]
    fn test_closed_rows_ignored() {
        let mut w = window(hm(9, 0), hm(17, 0));
        w.closed = true;
        let windows = vec![&w];
        assert_eq!(check_visit(&windows, false, hm(10, 0), hm(11, 0)), Admission::Closed);
    }

    #[test]
    fn test_open_all_day_row_admits() {
        let mut w = window(hm(0, 0), hm(0, 0));
        w.open_all_day = true;
        let windows = vec![&w];
        assert_eq!(check_visit(&windows, false, hm(22, 0), hm(23, 0)), Admission::Admit);
    }

    #[test]
    fn test_no_rows_closed_unless_always_open() {
        let windows: Vec<&OperatingWindow> = vec![];
        assert_eq!(check_visit(&windows, false, hm(10, 0), hm(11, 0)), Admission::Closed);
        assert_eq!(check_visit(&windows, true, hm(10, 0), hm(11, 0)), Admission::Admit);
    }

    // -----------------------------------------------------------------------
    // earliest_close_seconds
    // -----------------------------------------------------------------------

    #[test]
    fn test_earliest_close_picks_minimum() {
        let a = window(hm(9, 0), hm(12, 0));
        let b = window(hm(14, 0), hm(18, 0));
        let windows = vec![&b, &a];
        assert_eq!(earliest_close_seconds(&windows, false), 12 * 3600);
    }

    #[test]
    fn test_open_all_day_ranks_as_midnight_close() {
        let mut w = window(hm(0, 0), hm(0, 0));
        w.open_all_day = true;
        let windows = vec![&w];
        assert_eq!(earliest_close_seconds(&windows, false), OPEN_ALL_DAY_CLOSE_SECONDS);
        assert_eq!(earliest_close_seconds(&[], true), OPEN_ALL_DAY_CLOSE_SECONDS);
    }

    // -----------------------------------------------------------------------
    // admission property: admitted iff the arrival lies inside some
    // non-closed window, or the hotspot is open all day
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn prop_admits_at_matches_window_containment(
            specs in proptest::collection::vec((0u32..86_340, 60u32..43_200, any::<bool>()), 0..4),
            always_open in any::<bool>(),
            arrival_secs in 0u32..86_400,
        ) {
            let windows: Vec<OperatingWindow> = specs
                .iter()
                .map(|&(start, len, closed)| {
                    let end = (start + len).min(86_399);
                    OperatingWindow {
                        hotspot_id: 1,
                        weekday: 1,
                        start: NaiveTime::from_num_seconds_from_midnight_opt(start, 0).unwrap(),
                        end: NaiveTime::from_num_seconds_from_midnight_opt(end, 0).unwrap(),
                        closed,
                        open_all_day: false,
                    }
                })
                .filter(|w| w.is_well_formed())
                .collect();
            let refs: Vec<&OperatingWindow> = windows.iter().collect();
            let arrival = NaiveTime::from_num_seconds_from_midnight_opt(arrival_secs, 0).unwrap();

            let expected = always_open
                || windows
                    .iter()
                    .any(|w| !w.closed && w.start <= arrival && arrival < w.end);

            prop_assert_eq!(admits_at(&refs, always_open, arrival), expected);
        }
    }
}
