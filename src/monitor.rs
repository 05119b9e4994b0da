use crate::geo::{ProximityCheck, DEFAULT_THRESHOLD_METERS};
use crate::portal::Snapshot;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Anything that can report where the bus and the stop are right now.
#[async_trait]
pub trait PositionSource: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch(&mut self) -> Result<Snapshot, Self::Error>;
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` polls until something else stops the loop.
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
    pub threshold_meters: f64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: None,
            deadline: None,
            threshold_meters: DEFAULT_THRESHOLD_METERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Arrived {
        snapshot: Snapshot,
        check: ProximityCheck,
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
    },
    DeadlineReached {
        attempts: u32,
    },
    Cancelled {
        attempts: u32,
    },
}

/// Poll `source` until the bus is within the threshold of the stop.
///
/// Fetch errors are returned as-is on the first failure; there is no retry.
pub async fn watch<S: PositionSource>(
    source: &mut S,
    settings: &PollSettings,
    cancel: &CancellationToken,
) -> Result<PollOutcome, S::Error> {
    tracing::info!(
        interval_ms = settings.interval.as_millis() as u64,
        max_attempts = ?settings.max_attempts,
        deadline = ?settings.deadline,
        threshold_m = settings.threshold_meters,
        "Watching for bus"
    );

    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        let Some(fetched) = until_cancelled(cancel, source.fetch()).await else {
            return Ok(PollOutcome::Cancelled { attempts });
        };
        let snapshot = fetched?;
        attempts += 1;

        let check = ProximityCheck::evaluate(
            snapshot.stop.point(),
            snapshot.bus.point(),
            settings.threshold_meters,
        );

        if check.arrived() {
            tracing::info!(
                lat = snapshot.bus.latitude,
                lon = snapshot.bus.longitude,
                distance_m = check.distance_meters.round(),
                "Bus is within {} meters",
                settings.threshold_meters
            );
            return Ok(PollOutcome::Arrived {
                snapshot,
                check,
                attempts,
            });
        }

        tracing::info!(
            lat = snapshot.bus.latitude,
            lon = snapshot.bus.longitude,
            distance_m = check.distance_meters.round(),
            speed = ?snapshot.bus.speed,
            heading = ?snapshot.bus.heading,
            fix_time = ?snapshot.bus.time,
            attempt = attempts,
            "Bus is outside {} meters, retrying",
            settings.threshold_meters
        );

        if settings.max_attempts.is_some_and(|max| attempts >= max) {
            return Ok(PollOutcome::Exhausted { attempts });
        }
        if settings
            .deadline
            .is_some_and(|deadline| started.elapsed() + settings.interval > deadline)
        {
            return Ok(PollOutcome::DeadlineReached { attempts });
        }

        if until_cancelled(cancel, tokio::time::sleep(settings.interval))
            .await
            .is_none()
        {
            return Ok(PollOutcome::Cancelled { attempts });
        }
    }
}

/// Drive `fut` to completion unless `cancel` fires first.
pub async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::Position;
    use std::collections::VecDeque;

    const STOP: (f64, f64) = (43.728150882692312, -79.43893765643179);

    #[derive(Debug, thiserror::Error)]
    #[error("portal unreachable")]
    struct Unreachable;

    /// Replays a fixed list of bus latitudes against a fixed stop.
    struct Scripted {
        bus_latitudes: VecDeque<Result<f64, Unreachable>>,
        fetches: u32,
    }

    impl Scripted {
        fn new(steps: impl IntoIterator<Item = Result<f64, Unreachable>>) -> Self {
            Self {
                bus_latitudes: steps.into_iter().collect(),
                fetches: 0,
            }
        }

        fn far_away() -> Self {
            Self {
                bus_latitudes: VecDeque::new(),
                fetches: 0,
            }
        }

        /// Bus approaching the stop from the north, `metres` away along the meridian.
        fn metres_north(metres: f64) -> Result<f64, Unreachable> {
            Ok(STOP.0 + metres / 111_195.0)
        }
    }

    fn position(latitude: f64, longitude: f64) -> Position {
        Position {
            latitude,
            longitude,
            heading: None,
            speed: None,
            time: None,
        }
    }

    #[async_trait]
    impl PositionSource for Scripted {
        type Error = Unreachable;

        async fn fetch(&mut self) -> Result<Snapshot, Unreachable> {
            self.fetches += 1;
            let latitude = self
                .bus_latitudes
                .pop_front()
                .unwrap_or_else(|| Scripted::metres_north(5_000.0))?;
            Ok(Snapshot {
                bus: position(latitude, STOP.1),
                stop: position(STOP.0, STOP.1),
            })
        }
    }

    fn settings() -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(1),
            ..PollSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn arrives_on_first_cycle_when_already_close() {
        let mut source = Scripted::new([Scripted::metres_north(120.0)]);
        let outcome = watch(&mut source, &settings(), &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            PollOutcome::Arrived {
                snapshot,
                check,
                attempts,
            } => {
                assert_eq!(attempts, 1);
                assert!((check.distance_meters - 120.0).abs() < 1.0);
                assert_eq!(snapshot.stop.latitude, STOP.0);
                assert!(snapshot.bus.latitude > STOP.0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(source.fetches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_until_threshold_crossed() {
        let mut source = Scripted::new([
            Scripted::metres_north(2_000.0),
            Scripted::metres_north(1_200.0),
            Scripted::metres_north(700.0),
            Scripted::metres_north(450.0),
        ]);
        let started = Instant::now();
        let outcome = watch(&mut source, &settings(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, PollOutcome::Arrived { attempts: 4, .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let mut source = Scripted::far_away();
        let settings = PollSettings {
            max_attempts: Some(3),
            ..settings()
        };
        let outcome = watch(&mut source, &settings, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 3 });
        assert_eq!(source.fetches, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_deadline() {
        let mut source = Scripted::far_away();
        let settings = PollSettings {
            deadline: Some(Duration::from_millis(4_500)),
            ..settings()
        };
        let started = Instant::now();
        let outcome = watch(&mut source, &settings, &CancellationToken::new())
            .await
            .unwrap();

        // Polls at 0s..4s; a fifth sleep would overrun the deadline.
        assert_eq!(outcome, PollOutcome::DeadlineReached { attempts: 5 });
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_fetch() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut source = Scripted::far_away();

        let outcome = watch(&mut source, &settings(), &cancel).await.unwrap();
        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 0 });
        assert_eq!(source.fetches, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_while_sleeping() {
        let cancel = cancel_after(Duration::from_millis(2_500));

        let mut source = Scripted::far_away();
        let outcome = watch(&mut source, &settings(), &cancel).await.unwrap();
        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 3 });
    }

    /// A portal that never answers within the test's patience.
    struct Stalled;

    #[async_trait]
    impl PositionSource for Stalled {
        type Error = Unreachable;

        async fn fetch(&mut self) -> Result<Snapshot, Unreachable> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Scripted::far_away().fetch().await
        }
    }

    fn cancel_after(delay: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.cancel();
        });
        cancel
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_during_slow_fetch() {
        let cancel = cancel_after(Duration::from_secs(1));
        let started = Instant::now();

        let outcome = watch(&mut Stalled, &settings(), &cancel).await.unwrap();
        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 0 });
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn until_cancelled_abandons_pending_work() {
        let cancel = cancel_after(Duration::from_secs(2));
        let started = Instant::now();

        let out = until_cancelled(&cancel, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "logged in"
        })
        .await;
        assert_eq!(out, None);
        assert_eq!(started.elapsed(), Duration::from_secs(2));

        let quick = until_cancelled(&CancellationToken::new(), async { 7 }).await;
        assert_eq!(quick, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_is_fatal() {
        let mut source = Scripted::new([Scripted::metres_north(3_000.0), Err(Unreachable)]);
        let result = watch(&mut source, &settings(), &CancellationToken::new()).await;

        assert!(result.is_err());
        assert_eq!(source.fetches, 2);
    }
}
