//! Property tests for cron next-run computation

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use crier::scheduler::CronSchedule;
use proptest::prelude::*;

fn arbitrary_after() -> impl Strategy<Value = DateTime<Local>> {
    // Seconds range covering 2021..2027, away from chrono edge years
    (1_609_459_200i64..1_798_761_600i64).prop_map(|secs| {
        Local
            .timestamp_opt(secs, 0)
            .earliest()
            .expect("timestamp in range")
    })
}

proptest! {
    #[test]
    fn next_is_strictly_after_input(
        after in arbitrary_after(),
        minute in 0u32..60,
        hour in 0u32..24,
    ) {
        let cron = CronSchedule::parse(&format!("{minute} {hour} * * *")).unwrap();
        let next = cron.next_after(after).expect("daily schedule always fires");

        prop_assert!(next > after);
        prop_assert_eq!(next.minute(), minute);
        prop_assert_eq!(next.hour(), hour);
        prop_assert_eq!(next.second(), 0);
    }

    #[test]
    fn next_fires_within_a_day_for_daily_schedules(
        after in arbitrary_after(),
        minute in 0u32..60,
        hour in 0u32..24,
    ) {
        let cron = CronSchedule::parse(&format!("{minute} {hour} * * *")).unwrap();
        let next = cron.next_after(after).unwrap();

        // A daily schedule fires within the next ~25 hours (DST slack)
        prop_assert!((next - after).num_hours() <= 25);
    }

    #[test]
    fn next_is_idempotent_from_previous_result(
        after in arbitrary_after(),
        step in proptest::sample::select(vec![1u32, 5, 10, 15, 20, 30]),
    ) {
        let cron = CronSchedule::parse(&format!("*/{step} * * * *")).unwrap();

        let first = cron.next_after(after).unwrap();
        let second = cron.next_after(first).unwrap();

        prop_assert!(second > first);
        // Both firings land on the step grid, one step of wall time apart
        prop_assert_eq!(first.minute() % step, 0);
        prop_assert_eq!(second.minute() % step, 0);
        prop_assert!((second - first).num_minutes() >= step as i64);
    }

    #[test]
    fn weekday_field_is_honored(
        after in arbitrary_after(),
        weekday in 0u32..7,
    ) {
        let cron = CronSchedule::parse(&format!("0 12 * * {weekday}")).unwrap();
        let next = cron.next_after(after).unwrap();

        prop_assert_eq!(next.weekday().num_days_from_sunday(), weekday);
        prop_assert_eq!(next.hour(), 12);
    }

    #[test]
    fn month_field_is_honored(
        after in arbitrary_after(),
        month in 1u32..13,
    ) {
        let cron = CronSchedule::parse(&format!("0 0 1 {month} *")).unwrap();
        let next = cron.next_after(after).unwrap();

        prop_assert_eq!(next.month(), month);
        prop_assert_eq!(next.day(), 1);
    }
}
