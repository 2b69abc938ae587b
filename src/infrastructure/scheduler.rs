//! Timer services
//!
//! [`TokioScheduler`] spawns one interval task per timer and posts each
//! tick to the station's event channel. [`VirtualScheduler`] keeps a
//! manual clock so tests can step time deterministically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::application::events::StationEvent;
use crate::application::ports::{Scheduler, TimerHandle, TimerKind, TimerTick};

/// Real-time scheduler backed by tokio timers
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<StationEvent>,
    timers: HashMap<TimerHandle, JoinHandle<()>>,
    next_handle: u64,
}

impl TokioScheduler {
    pub fn new(events: mpsc::UnboundedSender<StationEvent>) -> Self {
        Self {
            events,
            timers: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&mut self, kind: TimerKind, period: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(StationEvent::Tick(TimerTick { handle, kind })).is_err() {
                    break;
                }
            }
        });

        debug!(?handle, ?kind, ?period, "Timer scheduled");
        self.timers.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.timers.remove(&handle) {
            task.abort();
            debug!(?handle, "Timer cancelled");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}

#[derive(Debug)]
struct VirtualTimer {
    kind: TimerKind,
    period: Duration,
    next_due: Duration,
}

#[derive(Debug, Default)]
struct VirtualClock {
    now: Duration,
    next_handle: u64,
    timers: HashMap<TimerHandle, VirtualTimer>,
}

/// Manually advanced scheduler.
///
/// Clones share the same clock, so a test can keep one clone while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct VirtualScheduler {
    clock: Arc<Mutex<VirtualClock>>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward and return every tick that fell due, in
    /// firing order. Ticks at the same instant are ordered by handle.
    pub fn advance(&self, by: Duration) -> Vec<TimerTick> {
        let mut clock = self.lock();
        let target = clock.now + by;
        let mut due = Vec::new();

        for (handle, timer) in clock.timers.iter_mut() {
            while timer.next_due <= target {
                due.push((timer.next_due, *handle, timer.kind));
                timer.next_due += timer.period;
            }
        }
        clock.now = target;

        due.sort_by_key(|(at, handle, _)| (*at, *handle));
        due.into_iter()
            .map(|(_, handle, kind)| TimerTick { handle, kind })
            .collect()
    }

    pub fn advance_secs(&self, secs: u64) -> Vec<TimerTick> {
        self.advance(Duration::from_secs(secs))
    }

    pub fn now(&self) -> Duration {
        self.lock().now
    }

    pub fn live_timers(&self) -> usize {
        self.lock().timers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VirtualClock> {
        // a panicking test thread must not hide the clock from the others
        self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule_repeating(&mut self, kind: TimerKind, period: Duration) -> TimerHandle {
        let mut clock = self.lock();
        clock.next_handle += 1;
        let handle = TimerHandle(clock.next_handle);
        let next_due = clock.now + period;
        clock.timers.insert(
            handle,
            VirtualTimer {
                kind,
                period,
                next_due,
            },
        );
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.lock().timers.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_ticks_fire_once_per_period() {
        let mut scheduler = VirtualScheduler::new();
        let handle = scheduler.schedule_repeating(TimerKind::Heartbeat, Duration::from_secs(10));

        assert!(scheduler.advance_secs(9).is_empty());
        let ticks = scheduler.advance_secs(1);
        assert_eq!(ticks, vec![TimerTick { handle, kind: TimerKind::Heartbeat }]);
        assert_eq!(scheduler.advance_secs(25).len(), 2);
        assert_eq!(scheduler.now(), Duration::from_secs(35));
    }

    #[test]
    fn virtual_ticks_are_ordered_by_due_time() {
        let mut scheduler = VirtualScheduler::new();
        let slow = scheduler.schedule_repeating(TimerKind::Heartbeat, Duration::from_secs(3));
        let fast = scheduler.schedule_repeating(
            TimerKind::AutoMeterValue { connector_id: 1 },
            Duration::from_secs(2),
        );

        let order: Vec<TimerHandle> = scheduler.advance_secs(6).into_iter().map(|t| t.handle).collect();
        assert_eq!(order, vec![fast, slow, fast, slow, fast]);
    }

    #[test]
    fn cancelled_virtual_timer_stops_firing() {
        let mut scheduler = VirtualScheduler::new();
        let handle = scheduler.schedule_repeating(TimerKind::Heartbeat, Duration::from_secs(1));
        scheduler.cancel(handle);
        scheduler.cancel(handle);

        assert!(scheduler.advance_secs(5).is_empty());
        assert_eq!(scheduler.live_timers(), 0);
    }

    #[test]
    fn clones_share_the_clock() {
        let mut engine_side = VirtualScheduler::new();
        let test_side = engine_side.clone();
        engine_side.schedule_repeating(TimerKind::Heartbeat, Duration::from_secs(1));

        assert_eq!(test_side.live_timers(), 1);
        assert_eq!(test_side.advance_secs(2).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_posts_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(tx);
        let handle = scheduler.schedule_repeating(TimerKind::Heartbeat, Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(11)).await;
        let mut ticks = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event, StationEvent::Tick(TimerTick { handle, kind: TimerKind::Heartbeat }));
            ticks += 1;
        }
        assert_eq!(ticks, 2);

        scheduler.cancel(handle);
        assert_eq!(scheduler.active_timers(), 0);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
