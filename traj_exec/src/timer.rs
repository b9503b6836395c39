//! # Timers
//!
//! Periodic callbacks are provided by a [`TimerFactory`] so the code driving them does not depend
//! on a real clock. [`ThreadTimerFactory`] runs each timer on its own thread against the system
//! clock, [`ManualTimerFactory`] only fires timers when told to.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Longest single sleep of a timer thread, bounds the time taken to stop a timer.
const MAX_SLEEP: Duration = Duration::from_millis(50);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Callback invoked on every timer tick.
pub type TimerCallback = Box<dyn FnMut(&TimerEvent) + Send>;

/// A periodic timer.
pub trait Timer: Send {
    /// ID given to the timer by its factory.
    fn id(&self) -> u32;

    /// Start invoking the callback. Starting a running timer has no effect.
    fn start(&mut self) -> Result<(), TimerError>;

    /// Stop invoking the callback. A timer cannot be restarted once stopped.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Builds timers.
pub trait TimerFactory {
    /// Build a timer calling `callback` every `period`.
    ///
    /// If `autostart` is set the timer is started before being returned.
    fn build_timer(
        &self,
        id: u32,
        period: Duration,
        callback: TimerCallback,
        autostart: bool
    ) -> Result<Box<dyn Timer>, TimerError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Information passed to a timer callback.
#[derive(Debug, Clone, Copy)]
pub struct TimerEvent {
    /// ID of the timer which fired
    pub id: u32,

    /// Number of ticks of this timer before this one
    pub tick: u64,

    /// When this tick was due
    pub expected: Instant,

    /// When this tick actually fired
    pub actual: Instant,
}

/// Builds [`ThreadTimer`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadTimerFactory;

/// A timer which runs its callback on a dedicated thread.
///
/// Ticks are scheduled against absolute deadlines so the period does not drift with callback
/// duration. If a callback overruns by more than a whole period the missed ticks are skipped.
pub struct ThreadTimer {
    id: u32,
    period: Duration,
    callback: Option<TimerCallback>,
    stop: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

/// Builds [`ManualTimer`]s, which only tick when [`ManualTimerFactory::fire`] is called.
///
/// The factory is cheaply cloneable, clones share the same set of timers.
#[derive(Clone, Default)]
pub struct ManualTimerFactory {
    timers: Arc<Mutex<Vec<ManualEntry>>>,
}

/// Handle to a timer built by [`ManualTimerFactory`].
pub struct ManualTimer {
    id: u32,
    running: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

struct ManualEntry {
    id: u32,
    period: Duration,
    tick: u64,
    running: Arc<AtomicBool>,
    callback: Arc<Mutex<TimerCallback>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("Timer period must be non-zero")]
    ZeroPeriod,

    #[error("Timer {0} has been stopped and cannot be restarted")]
    AlreadyStopped(u32),

    #[error("Could not spawn the timer thread: {0}")]
    SpawnError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TimerFactory for ThreadTimerFactory {
    fn build_timer(
        &self,
        id: u32,
        period: Duration,
        callback: TimerCallback,
        autostart: bool
    ) -> Result<Box<dyn Timer>, TimerError> {
        if period == Duration::from_secs(0) {
            return Err(TimerError::ZeroPeriod);
        }

        let mut timer = ThreadTimer {
            id,
            period,
            callback: Some(callback),
            stop: Arc::new(AtomicBool::new(false)),
            join_handle: None,
        };

        if autostart {
            timer.start()?;
        }

        Ok(Box::new(timer))
    }
}

impl Timer for ThreadTimer {
    fn id(&self) -> u32 {
        self.id
    }

    fn start(&mut self) -> Result<(), TimerError> {
        if self.join_handle.is_some() {
            return Ok(());
        }

        let callback = self.callback.take().ok_or(TimerError::AlreadyStopped(self.id))?;
        let stop = self.stop.clone();
        let id = self.id;
        let period = self.period;

        let join_handle = thread::Builder::new()
            .name(format!("timer_{}", id))
            .spawn(move || run_timer(id, period, callback, stop))
            .map_err(TimerError::SpawnError)?;

        self.join_handle = Some(join_handle);

        debug!("Timer {} started with period {:?}", id, period);

        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.callback = None;

        if let Some(jh) = self.join_handle.take() {
            // A callback stopping its own timer must not join itself
            if jh.thread().id() == thread::current().id() {
                return;
            }

            if jh.join().is_err() {
                warn!("Timer {} thread panicked", self.id);
            }
        }
    }

    fn is_running(&self) -> bool {
        self.join_handle.is_some() && !self.stop.load(Ordering::Relaxed)
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ManualTimerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers built by this factory.
    pub fn num_timers(&self) -> usize {
        self.lock_timers().len()
    }

    /// Fire every running timer with the given ID once.
    ///
    /// Returns the number of callbacks invoked.
    pub fn fire(&self, id: u32) -> usize {
        // Collect callbacks first so a callback can use the factory without deadlocking
        let due: Vec<(Arc<Mutex<TimerCallback>>, TimerEvent)> = {
            let mut timers = self.lock_timers();
            let now = Instant::now();

            timers
                .iter_mut()
                .filter(|t| t.id == id && t.running.load(Ordering::Relaxed))
                .map(|t| {
                    let event = TimerEvent {
                        id: t.id,
                        tick: t.tick,
                        expected: now,
                        actual: now,
                    };
                    t.tick += 1;
                    (t.callback.clone(), event)
                })
                .collect()
        };

        for (callback, event) in due.iter() {
            let mut cb = callback.lock().unwrap_or_else(|e| e.into_inner());
            (*cb)(event);
        }

        due.len()
    }

    /// Period a timer was built with.
    pub fn period(&self, id: u32) -> Option<Duration> {
        self.lock_timers().iter().find(|t| t.id == id).map(|t| t.period)
    }

    fn lock_timers(&self) -> std::sync::MutexGuard<'_, Vec<ManualEntry>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TimerFactory for ManualTimerFactory {
    fn build_timer(
        &self,
        id: u32,
        period: Duration,
        callback: TimerCallback,
        autostart: bool
    ) -> Result<Box<dyn Timer>, TimerError> {
        if period == Duration::from_secs(0) {
            return Err(TimerError::ZeroPeriod);
        }

        let running = Arc::new(AtomicBool::new(false));

        self.lock_timers().push(ManualEntry {
            id,
            period,
            tick: 0,
            running: running.clone(),
            callback: Arc::new(Mutex::new(callback)),
        });

        let mut timer = ManualTimer {
            id,
            running,
            stopped: Arc::new(AtomicBool::new(false)),
        };

        if autostart {
            timer.start()?;
        }

        Ok(Box::new(timer))
    }
}

impl Timer for ManualTimer {
    fn id(&self) -> u32 {
        self.id
    }

    fn start(&mut self) -> Result<(), TimerError> {
        if self.stopped.load(Ordering::Relaxed) {
            return Err(TimerError::AlreadyStopped(self.id));
        }
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn run_timer(id: u32, period: Duration, mut callback: TimerCallback, stop: Arc<AtomicBool>) {
    let mut tick = 0u64;
    let mut expected = Instant::now() + period;

    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();

        if now < expected {
            thread::sleep((expected - now).min(MAX_SLEEP));
            continue;
        }

        callback(&TimerEvent {
            id,
            tick,
            expected,
            actual: now,
        });

        tick += 1;
        expected += period;

        // Skip ticks missed while the callback was running, the next deadline is in the future
        let after = Instant::now();
        if after >= expected {
            let missed = ((after - expected).as_nanos() / period.as_nanos()) as u32 + 1;
            warn!("Timer {} overran, skipping {} ticks", id, missed);
            expected += period * missed;
        }
    }

    debug!("Timer {} stopped after {} ticks", id, tick);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn counting_callback(count: &Arc<AtomicU64>) -> TimerCallback {
        let count = count.clone();
        Box::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_manual_timer() {
        let factory = ManualTimerFactory::new();
        let count = Arc::new(AtomicU64::new(0));

        let mut timer = factory
            .build_timer(1, Duration::from_millis(100), counting_callback(&count), false)
            .unwrap();

        assert_eq!(factory.num_timers(), 1);
        assert_eq!(factory.period(1), Some(Duration::from_millis(100)));

        // Not started yet
        assert_eq!(factory.fire(1), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        timer.start().unwrap();
        assert!(timer.is_running());
        assert_eq!(factory.fire(1), 1);
        assert_eq!(factory.fire(2), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(factory.fire(1), 0);
        assert!(timer.start().is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manual_timer_tick_index() {
        let factory = ManualTimerFactory::new();
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let ticks_clone = ticks.clone();

        let _timer = factory
            .build_timer(
                3,
                Duration::from_millis(10),
                Box::new(move |e| ticks_clone.lock().unwrap().push((e.id, e.tick))),
                true
            )
            .unwrap();

        for _ in 0..3 {
            factory.fire(3);
        }

        assert_eq!(*ticks.lock().unwrap(), vec![(3, 0), (3, 1), (3, 2)]);
    }

    #[test]
    fn test_zero_period_rejected() {
        let count = Arc::new(AtomicU64::new(0));

        assert!(matches!(
            ThreadTimerFactory.build_timer(0, Duration::from_secs(0), counting_callback(&count), true),
            Err(TimerError::ZeroPeriod)
        ));
        assert!(matches!(
            ManualTimerFactory::new()
                .build_timer(0, Duration::from_secs(0), counting_callback(&count), true),
            Err(TimerError::ZeroPeriod)
        ));
    }

    #[test]
    fn test_thread_timer_ticks() {
        let count = Arc::new(AtomicU64::new(0));

        let mut timer = ThreadTimerFactory
            .build_timer(7, Duration::from_millis(10), counting_callback(&count), true)
            .unwrap();
        assert!(timer.is_running());

        thread::sleep(Duration::from_millis(200));
        timer.stop();
        assert!(!timer.is_running());

        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 5, "Expected at least 5 ticks, got {}", ticks);

        // No ticks after stopping
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), ticks);
    }

    #[test]
    fn test_thread_timer_skips_missed_ticks() {
        let period = Duration::from_millis(20);
        let events = Arc::new(Mutex::new(Vec::<TimerEvent>::new()));
        let events_clone = events.clone();

        let start = Instant::now();
        let mut timer = ThreadTimerFactory
            .build_timer(
                9,
                period,
                Box::new(move |e| {
                    events_clone.lock().unwrap().push(*e);
                    // Overrun by more than two periods on the first tick only
                    if e.tick == 0 {
                        thread::sleep(Duration::from_millis(70));
                    }
                }),
                true
            )
            .unwrap();

        thread::sleep(Duration::from_millis(250));
        timer.stop();
        let elapsed = start.elapsed();

        let events = events.lock().unwrap();
        assert!(events.len() >= 3, "Expected at least 3 ticks, got {}", events.len());

        // The deadlines covered by the overrun are never fired
        assert!(events[1].expected - events[0].expected >= period * 3);

        // Ticks stay on the period grid, no catch-up ticks between deadlines
        for pair in events.windows(2) {
            let gap = pair[1].expected - pair[0].expected;
            assert!(gap >= period);
            assert_eq!(gap.as_nanos() % period.as_nanos(), 0);
        }

        let deadlines = (elapsed.as_nanos() / period.as_nanos()) as usize;
        assert!(
            events.len() + 2 <= deadlines,
            "{} ticks in {} deadlines, missed ticks were not skipped",
            events.len(),
            deadlines
        );
    }

    #[test]
    fn test_thread_timer_not_started() {
        let count = Arc::new(AtomicU64::new(0));

        let timer = ThreadTimerFactory
            .build_timer(8, Duration::from_millis(5), counting_callback(&count), false)
            .unwrap();
        assert!(!timer.is_running());

        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
