use crate::clock::timeframe::TimeframeKey;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use std::collections::BTreeSet;

/// Returns the highest-priority active timeframe closing at `instant`, if any.
///
/// The instant is expected to sit on a minute boundary (callers align it);
/// only calendar fields are inspected. Precedence is fixed: month, week, day,
/// 4h, 1h, 30m, 15m, 5m, 1m. When boundaries coincide (midnight on the 1st is
/// also a day, 4h and 1h boundary) only the first *active* match is reported,
/// so disabling a larger timeframe lets a smaller one through.
pub fn closing_timeframe(
    instant: DateTime<Utc>,
    active: &BTreeSet<TimeframeKey>,
) -> Option<TimeframeKey> {
    let day = instant.day();
    let weekday = instant.weekday();
    let hour = instant.hour();
    let minute = instant.minute();
    let is_active = |tf: TimeframeKey| active.contains(&tf);

    if day == 1 && hour == 0 && minute == 0 && is_active(TimeframeKey::Mo1) {
        return Some(TimeframeKey::Mo1);
    }
    if weekday == Weekday::Mon && hour == 0 && minute == 0 && is_active(TimeframeKey::W1) {
        return Some(TimeframeKey::W1);
    }
    if hour == 0 && minute == 0 && is_active(TimeframeKey::D1) {
        return Some(TimeframeKey::D1);
    }
    if hour % 4 == 0 && minute == 0 && is_active(TimeframeKey::H4) {
        return Some(TimeframeKey::H4);
    }
    if minute == 0 && is_active(TimeframeKey::H1) {
        return Some(TimeframeKey::H1);
    }
    if minute % 30 == 0 && is_active(TimeframeKey::M30) {
        return Some(TimeframeKey::M30);
    }
    if minute % 15 == 0 && is_active(TimeframeKey::M15) {
        return Some(TimeframeKey::M15);
    }
    if minute % 5 == 0 && is_active(TimeframeKey::M5) {
        return Some(TimeframeKey::M5);
    }
    if is_active(TimeframeKey::M1) {
        return Some(TimeframeKey::M1);
    }

    None
}

pub fn close_message(timeframe: TimeframeKey) -> String {
    format!("{} candle closed!", timeframe.label())
}

pub fn closing_soon_message(timeframe: TimeframeKey, lead_secs: u32) -> String {
    format!("{} candle closing in {lead_secs}s", timeframe.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn active(keys: &[TimeframeKey]) -> BTreeSet<TimeframeKey> {
        keys.iter().copied().collect()
    }

    #[test]
    fn month_boundary_wins_over_all_coinciding_boundaries() {
        // 2024-01-01 is a Monday: month, week, day, 4h, 1h, 30m, 15m, 5m, 1m
        // all coincide at midnight.
        let instant = utc(2024, 1, 1, 0, 0);
        let all = active(&TimeframeKey::ALL);
        assert_eq!(closing_timeframe(instant, &all), Some(TimeframeKey::Mo1));
    }

    #[test]
    fn inactive_higher_timeframe_falls_through_to_next_rule() {
        let instant = utc(2024, 1, 1, 0, 0);
        let subset = active(&[TimeframeKey::D1, TimeframeKey::M5]);
        assert_eq!(closing_timeframe(instant, &subset), Some(TimeframeKey::D1));

        let only_small = active(&[TimeframeKey::M5]);
        assert_eq!(
            closing_timeframe(instant, &only_small),
            Some(TimeframeKey::M5)
        );
    }

    #[test]
    fn week_requires_monday_midnight() {
        let monday = utc(2024, 1, 8, 0, 0);
        let tuesday = utc(2024, 1, 9, 0, 0);
        let weekly = active(&[TimeframeKey::W1, TimeframeKey::D1]);
        assert_eq!(closing_timeframe(monday, &weekly), Some(TimeframeKey::W1));
        assert_eq!(closing_timeframe(tuesday, &weekly), Some(TimeframeKey::D1));
    }

    #[test]
    fn four_hour_only_on_multiples_of_four() {
        let all = active(&TimeframeKey::ALL);
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 8, 0), &all),
            Some(TimeframeKey::H4)
        );
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 9, 0), &all),
            Some(TimeframeKey::H1)
        );
    }

    #[test]
    fn minute_rules_follow_modulo_precedence() {
        let all = active(&TimeframeKey::ALL);
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 9, 30), &all),
            Some(TimeframeKey::M30)
        );
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 9, 45), &all),
            Some(TimeframeKey::M15)
        );
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 9, 35), &all),
            Some(TimeframeKey::M5)
        );
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 9, 37), &all),
            Some(TimeframeKey::M1)
        );
    }

    #[test]
    fn one_minute_only_reports_every_minute() {
        let only_1m = active(&[TimeframeKey::M1]);
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 9, 0), &only_1m),
            Some(TimeframeKey::M1)
        );
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 9, 41), &only_1m),
            Some(TimeframeKey::M1)
        );
    }

    #[test]
    fn one_hour_only_reports_on_the_hour() {
        let only_1h = active(&[TimeframeKey::H1]);
        assert_eq!(
            closing_timeframe(utc(2024, 3, 5, 9, 0), &only_1h),
            Some(TimeframeKey::H1)
        );
        assert_eq!(closing_timeframe(utc(2024, 3, 5, 9, 30), &only_1h), None);
    }

    #[test]
    fn empty_active_set_never_reports() {
        assert_eq!(
            closing_timeframe(utc(2024, 1, 1, 0, 0), &BTreeSet::new()),
            None
        );
    }
}
