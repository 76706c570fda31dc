use std::future::Future;

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::sync::watch;
use tracing::{error, info};

use crate::schedule::{next_daily_run, RunTime};

/// Daily trigger loop. One job runs at a time; a job that outlasts a day
/// delays the next run instead of overlapping it.
pub struct TriggerEngine<Tz: TimeZone = Local> {
    run_time: RunTime,
    tz: Tz,
}

impl TriggerEngine<Local> {
    pub fn new(run_time: RunTime) -> Self {
        Self {
            run_time,
            tz: Local,
        }
    }
}

impl<Tz: TimeZone> TriggerEngine<Tz> {
    pub fn with_timezone(run_time: RunTime, tz: Tz) -> Self {
        Self { run_time, tz }
    }

    pub fn next_run(&self) -> Option<DateTime<Tz>> {
        next_daily_run(self.run_time, Utc::now().with_timezone(&self.tz))
    }

    /// Main event loop. Runs `job` at every occurrence of the run time until
    /// `shutdown` broadcasts `true` or its sender goes away. A job already in
    /// progress is allowed to finish.
    pub async fn run<F, Fut>(self, mut shutdown: watch::Receiver<bool>, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        info!(run_time = %self.run_time, "daily trigger started");

        // a timer that wakes a hair early must not fire the same occurrence twice
        let mut last_fired: Option<DateTime<Tz>> = None;
        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }
            let now = Utc::now().with_timezone(&self.tz);
            let from = match last_fired.take() {
                Some(fired) if fired > now => fired,
                _ => now,
            };
            let Some(next) = next_daily_run(self.run_time, from) else {
                error!(run_time = %self.run_time, "no next run time could be computed");
                break;
            };
            let wait = (next.with_timezone(&Utc) - Utc::now())
                .to_std()
                .unwrap_or_default();
            info!(next = %next.naive_local(), wait_secs = wait.as_secs(), "next burst scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    info!("trigger fired, starting burst");
                    job().await;
                    info!("burst finished");
                    last_fired = Some(next);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("daily trigger shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_at_run_time_then_stops_on_shutdown() {
        let soon = (Utc::now() + chrono::TimeDelta::seconds(2)).time().format("%H:%M:%S").to_string();
        let engine = TriggerEngine::with_timezone(RunTime::parse(&soon).unwrap(), Utc);
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let runs = Arc::new(AtomicUsize::new(0));

        let job_runs = Arc::clone(&runs);
        let job_tx = Arc::clone(&tx);
        let handle = tokio::spawn(engine.run(rx, move || {
            let runs = Arc::clone(&job_runs);
            let tx = Arc::clone(&job_tx);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(true);
            }
        }));

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("trigger should fire and stop")
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_before_run_time_skips_the_job() {
        let later = (Utc::now() + chrono::TimeDelta::hours(1)).time().format("%H:%M:%S").to_string();
        let engine = TriggerEngine::with_timezone(RunTime::parse(&later).unwrap(), Utc);
        let (tx, rx) = watch::channel(false);
        let runs = Arc::new(AtomicUsize::new(0));

        let job_runs = Arc::clone(&runs);
        let handle = tokio::spawn(engine.run(rx, move || {
            let runs = Arc::clone(&job_runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("trigger should stop promptly")
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropped_sender_stops_the_loop() {
        let later = (Utc::now() + chrono::TimeDelta::hours(1)).time().format("%H:%M:%S").to_string();
        let engine = TriggerEngine::with_timezone(RunTime::parse(&later).unwrap(), Utc);
        let (tx, rx) = watch::channel(false);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), engine.run(rx, || async {}))
            .await
            .expect("trigger should stop when the sender is gone");
    }

    #[test]
    fn next_run_is_in_the_future() {
        let engine = TriggerEngine::new(RunTime::parse("22:59:55").unwrap());
        assert!(engine.next_run().unwrap() > Local::now());
    }
}
