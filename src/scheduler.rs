//! Frame and interval scheduling on a single thread.
//!
//! The scheduler plays the role of a display's refresh callback plus a
//! wall-clock interval timer. Callers register a one-shot frame request or a
//! repeating interval and receive a handle; `next_tick` waits until the
//! earliest registration is due and reports which one fired. Nothing runs
//! inside the scheduler, so the owner handles each tick with full `&mut`
//! access to its state.

use std::{
    cell::Cell,
    time::{Duration, Instant},
};

/// Refresh period of the emulated display (60 Hz).
pub const REFRESH_PERIOD: Duration = Duration::from_nanos(16_666_667);

pub trait TimeSource {
    /// Time elapsed since the source's origin.
    fn now(&self) -> Duration;

    /// Blocks (or jumps) until `deadline`.
    fn sleep_until(&self, deadline: Duration);
}

/// Wall-clock time.
pub struct SystemTime {
    origin: Instant,
}

impl SystemTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Virtual time that jumps straight to each deadline. Used for offline
/// rendering and deterministic tests.
#[derive(Default)]
pub struct VirtualTime {
    now: Cell<Duration>,
}

impl VirtualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl TimeSource for VirtualTime {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Duration) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntervalHandle(u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tick {
    Frame {
        handle: FrameHandle,
        timestamp: Duration,
    },
    Interval {
        handle: IntervalHandle,
        fired_at: Duration,
    },
}

struct IntervalEntry {
    handle: IntervalHandle,
    period: Duration,
    next_due: Duration,
}

pub struct Scheduler<T: TimeSource> {
    time: T,
    refresh: Duration,
    frame: Option<(FrameHandle, Duration)>,
    intervals: Vec<IntervalEntry>,
    next_id: u64,
}

impl<T: TimeSource> Scheduler<T> {
    pub fn new(time: T) -> Self {
        Self::with_refresh(time, REFRESH_PERIOD)
    }

    pub fn with_refresh(time: T, refresh: Duration) -> Self {
        Self {
            time,
            refresh: refresh.max(Duration::from_micros(1)),
            frame: None,
            intervals: Vec::new(),
            next_id: 1,
        }
    }

    pub fn time(&self) -> &T {
        &self.time
    }

    pub fn now(&self) -> Duration {
        self.time.now()
    }

    pub fn refresh_period(&self) -> Duration {
        self.refresh
    }

    /// Requests a callback at the next refresh boundary. Only one frame
    /// request is outstanding at a time; a new request replaces the old one.
    pub fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.alloc_id());
        let due = self.next_refresh_after(self.time.now());
        self.frame = Some((handle, due));
        handle
    }

    pub fn cancel_frame(&mut self, handle: FrameHandle) -> bool {
        match self.frame {
            Some((h, _)) if h == handle => {
                self.frame = None;
                true
            }
            _ => false,
        }
    }

    pub fn set_interval(&mut self, period: Duration) -> IntervalHandle {
        let handle = IntervalHandle(self.alloc_id());
        let period = period.max(Duration::from_micros(1));
        self.intervals.push(IntervalEntry {
            handle,
            period,
            next_due: self.time.now() + period,
        });
        handle
    }

    pub fn clear_interval(&mut self, handle: IntervalHandle) -> bool {
        let before = self.intervals.len();
        self.intervals.retain(|e| e.handle != handle);
        self.intervals.len() != before
    }

    pub fn has_registrations(&self) -> bool {
        self.frame.is_some() || !self.intervals.is_empty()
    }

    /// Earliest pending deadline, if anything is registered.
    pub fn next_deadline(&self) -> Option<Duration> {
        let interval = self.intervals.iter().map(|e| e.next_due).min();
        let frame = self.frame.map(|(_, due)| due);
        match (interval, frame) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Waits for the earliest registration and returns it. Intervals win ties.
    pub fn next_tick(&mut self) -> Option<Tick> {
        let deadline = self.next_deadline()?;
        self.time.sleep_until(deadline);
        let now = self.time.now();

        if let Some(entry) = self
            .intervals
            .iter_mut()
            .filter(|e| e.next_due <= deadline)
            .min_by_key(|e| e.next_due)
        {
            let fired_at = entry.next_due;
            entry.next_due += entry.period;
            // A stalled thread does not replay missed firings.
            if entry.next_due < now {
                entry.next_due = now + entry.period;
            }
            return Some(Tick::Interval {
                handle: entry.handle,
                fired_at,
            });
        }

        let (handle, _) = self.frame.take()?;
        Some(Tick::Frame {
            handle,
            timestamp: now,
        })
    }

    fn next_refresh_after(&self, now: Duration) -> Duration {
        let period = self.refresh.as_nanos();
        let n = now.as_nanos() / period + 1;
        Duration::from_nanos((n * period).min(u128::from(u64::MAX)) as u64)
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
