use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Time source, injectable so window math is testable without real delays.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Outcome of an admission request. A denied request is never dropped; the
/// caller is told exactly how long to wait before asking again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    Wait(Duration),
}

struct ChannelWindow {
    max_per_minute: usize,
    admissions: VecDeque<Instant>,
}

/// Sliding-window admission control over named channels.
///
/// Each channel keeps its own window under its own lock, so exhausting
/// "search" never blocks "oracle". Constructed explicitly and shared by
/// reference; there is no process-wide instance.
pub struct RateLimiter {
    channels: HashMap<String, Mutex<ChannelWindow>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            channels: HashMap::new(),
            clock,
        }
    }

    /// Register a channel bounded to `max_per_minute` admissions.
    pub fn channel(mut self, name: impl Into<String>, max_per_minute: u32) -> Self {
        self.channels.insert(
            name.into(),
            Mutex::new(ChannelWindow {
                max_per_minute: (max_per_minute.max(1)) as usize,
                admissions: VecDeque::new(),
            }),
        );
        self
    }

    /// Request admission on `channel`. Granted admissions are recorded
    /// immediately; denials return the wait until the oldest admission
    /// leaves the window. Unregistered channels are not limited.
    pub fn admit(&self, channel: &str) -> Admission {
        let Some(window) = self.channels.get(channel) else {
            tracing::warn!(channel, "admission requested on unregistered channel");
            return Admission::Granted;
        };

        let now = self.clock.now();
        let mut window = window.lock().unwrap();

        while let Some(oldest) = window.admissions.front() {
            if now.duration_since(*oldest) >= WINDOW {
                window.admissions.pop_front();
            } else {
                break;
            }
        }

        if window.admissions.len() < window.max_per_minute {
            window.admissions.push_back(now);
            Admission::Granted
        } else {
            let oldest = *window.admissions.front().expect("window is full");
            Admission::Wait(WINDOW - now.duration_since(oldest))
        }
    }

    /// Admission that sleeps out denials. Used in front of every outbound
    /// oracle and search call.
    pub async fn acquire(&self, channel: &str) {
        loop {
            match self.admit(channel) {
                Admission::Granted => return,
                Admission::Wait(delay) => {
                    tracing::debug!(channel, wait_ms = delay.as_millis() as u64, "rate limited");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
