use crate::pipeline::{Pipeline, RunReport};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Daily wall-clock fire times in a fixed zone.
#[derive(Debug, Clone)]
pub struct Schedule {
    times: Vec<NaiveTime>,
    tz: Tz,
}

impl Schedule {
    pub fn new(mut times: Vec<NaiveTime>, tz: Tz) -> Self {
        times.sort();
        times.dedup();
        Self { times, tz }
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// First fire time strictly after `now`, or `None` for an empty schedule.
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.with_timezone(&self.tz).date_naive();

        (0..=2)
            .filter_map(|offset| today.checked_add_signed(Duration::days(offset)))
            .flat_map(|day| self.times.iter().map(move |t| day.and_time(*t)))
            .filter_map(|local| {
                // A time inside a DST gap fires at the first valid instant after it
                self.tz
                    .from_local_datetime(&local)
                    .earliest()
                    .or_else(|| self.tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
            })
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|dt| *dt > now)
            .min()
    }

    /// Next fire time after both `now` and the slot that last fired, so a wall
    /// clock stepping backwards cannot fire the same slot twice.
    pub fn next_fire_since(&self, now: DateTime<Utc>, last_fired: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let from = last_fired.map_or(now, |last| now.max(last));
        self.next_fire(from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Scheduled,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Startup => f.write_str("startup"),
            Trigger::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// Single-run guard around the pipeline: a trigger arriving while a run is in
/// progress is dropped rather than queued.
#[derive(Clone)]
pub struct Relay {
    pipeline: Arc<Mutex<Pipeline>>,
}

impl Relay {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// Run the pipeline unless a run is already in flight.
    pub async fn trigger(&self, trigger: Trigger) -> Option<RunReport> {
        let Ok(mut pipeline) = self.pipeline.try_lock() else {
            warn!(trigger = %trigger, "Previous run still in progress, skipping trigger");
            return None;
        };
        info!(trigger = %trigger, "Run triggered");
        Some(pipeline.run_once().await)
    }
}

pub struct Scheduler {
    schedule: Schedule,
    relay: Relay,
}

impl Scheduler {
    pub fn new(schedule: Schedule, relay: Relay) -> Self {
        Self { schedule, relay }
    }

    /// Run once now, then on every scheduled time until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        // The startup run completes before any scheduled fire is armed
        tokio::select! {
            _ = self.relay.trigger(Trigger::Startup) => {}
            _ = &mut shutdown => {
                info!("Shutdown requested during startup run");
                return;
            }
        }

        let mut last_fired = None;
        loop {
            let now = Utc::now();
            let Some(next) = self.schedule.next_fire_since(now, last_fired) else {
                error!("Schedule has no fire times, stopping scheduler");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(
                next_run = %next.with_timezone(&self.schedule.timezone()).format("%Y-%m-%d %H:%M %Z"),
                "Waiting for next scheduled run"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last_fired = Some(next);
                    let relay = self.relay.clone();
                    tokio::spawn(async move {
                        relay.trigger(Trigger::Scheduled).await;
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Moscow;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_fire_same_day() {
        let schedule = Schedule::new(vec![t(18, 0), t(9, 0), t(12, 0)], Moscow);
        // 10:30 MSK
        let next = schedule.next_fire(utc("2024-03-01T07:30:00Z")).unwrap();
        assert_eq!(next, utc("2024-03-01T09:00:00Z"));
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        let schedule = Schedule::new(vec![t(9, 0), t(12, 0), t(18, 0)], Moscow);
        // 19:00 MSK
        let next = schedule.next_fire(utc("2024-03-01T16:00:00Z")).unwrap();
        assert_eq!(next, utc("2024-03-02T06:00:00Z"));
    }

    #[test]
    fn test_next_fire_is_strictly_after_now() {
        let schedule = Schedule::new(vec![t(9, 0), t(12, 0)], Moscow);
        let next = schedule.next_fire(utc("2024-03-01T06:00:00Z")).unwrap();
        assert_eq!(next, utc("2024-03-01T09:00:00Z"));
    }

    #[test]
    fn test_next_fire_across_dst_gap() {
        // 02:30 does not exist in Berlin on 2024-03-31
        let schedule = Schedule::new(vec![t(2, 30)], chrono_tz::Europe::Berlin);
        let next = schedule.next_fire(utc("2024-03-30T12:00:00Z")).unwrap();
        assert_eq!(next, utc("2024-03-31T01:30:00Z"));
    }

    #[test]
    fn test_slot_does_not_refire_when_clock_steps_back() {
        let schedule = Schedule::new(vec![t(9, 0), t(12, 0)], Moscow);
        let fired = utc("2024-03-01T06:00:00Z");
        // Wall clock reads just before the 09:00 MSK slot that already fired
        let now = utc("2024-03-01T05:59:59Z");
        assert_eq!(schedule.next_fire(now), Some(fired));
        assert_eq!(schedule.next_fire_since(now, Some(fired)), Some(utc("2024-03-01T09:00:00Z")));
        assert_eq!(schedule.next_fire_since(now, None), Some(fired));
    }

    #[test]
    fn test_empty_schedule() {
        let schedule = Schedule::new(vec![], Moscow);
        assert!(schedule.next_fire(Utc::now()).is_none());
    }
}
