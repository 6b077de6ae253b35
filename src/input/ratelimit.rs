//! Throttles codes sent over a core's serial keyboard link.
//!
//! Some cores forward keys over a slow serial link of their own, and drop
//! codes which arrive too close together.  A code is sent straight away if
//! the link is idle, otherwise it waits in a bounded FIFO, and the I/O loop
//! drains one code per interval.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use embassy_time::{Duration, Instant};
use heapless::Deque;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::constants::KBD_QUEUE_SIZE;

pub struct KeyboardRateLimiter {
    queue: Deque<u16, KBD_QUEUE_SIZE>,
    interval: Duration,

    // When the last code sent may be followed by another.  None if the
    // link is idle.
    busy_until: Option<Instant>,
    dropped: u32,
}

impl KeyboardRateLimiter {
    /// Creates a limiter allowing one code per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            queue: Deque::new(),
            interval,
            busy_until: None,
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Codes dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Empties the queue, for example when the core changes.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.busy_until = None;
    }

    /// Offers a code for sending.  Returns the code if it can go out now,
    /// otherwise queues it.
    pub fn submit(&mut self, code: u16, now: Instant) -> Option<u16> {
        if self.queue.is_empty() && self.is_idle(now) {
            self.busy_until = Some(now + self.interval);
            Some(code)
        } else {
            self.enqueue(code);
            None
        }
    }

    /// Queues a code.  If the queue is full the code is dropped.
    pub fn enqueue(&mut self, code: u16) -> bool {
        match self.queue.push_back(code) {
            Ok(()) => true,
            Err(code) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("Keyboard queue full - dropped 0x{:04x}", code);
                false
            }
        }
    }

    /// Returns the next queued code, if the interval since the last one
    /// has passed.
    pub fn poll(&mut self, now: Instant) -> Option<u16> {
        if !self.is_idle(now) {
            return None;
        }
        self.busy_until = None;

        let code = self.queue.pop_front()?;
        self.busy_until = Some(now + self.interval);
        Some(code)
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.busy_until.is_none_or(|until| now >= until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::KBD_RATE_INTERVAL;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn immediate_when_idle() {
        let mut limiter = KeyboardRateLimiter::new(KBD_RATE_INTERVAL);
        assert_eq!(limiter.submit(0x20, at(0)), Some(0x20));
        assert_eq!(limiter.submit(0x21, at(1)), None);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.poll(at(9)), None);
        assert_eq!(limiter.poll(at(10)), Some(0x21));
        assert_eq!(limiter.poll(at(30)), None);
        assert_eq!(limiter.submit(0x22, at(30)), Some(0x22));
    }

    #[test]
    fn bounded_fifo_drains_in_order() {
        let mut limiter = KeyboardRateLimiter::new(KBD_RATE_INTERVAL);
        let retained = (0..20u16).filter(|c| limiter.enqueue(*c)).count();
        assert_eq!(retained, 16);
        assert_eq!(limiter.dropped(), 4);

        let mut sent = Vec::new();
        let mut last = None;
        for ms in 0..1000 {
            if let Some(code) = limiter.poll(at(ms)) {
                if let Some(prev) = last {
                    assert!(at(ms) - prev >= KBD_RATE_INTERVAL);
                }
                last = Some(at(ms));
                sent.push(code);
            }
        }
        assert_eq!(sent, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn queued_code_not_overtaken() {
        let mut limiter = KeyboardRateLimiter::new(KBD_RATE_INTERVAL);
        limiter.enqueue(0x01);
        // Idle, but something is already waiting
        assert_eq!(limiter.submit(0x02, at(0)), None);
        assert_eq!(limiter.poll(at(0)), Some(0x01));
        assert_eq!(limiter.poll(at(10)), Some(0x02));
    }

    #[test]
    fn clear_empties() {
        let mut limiter = KeyboardRateLimiter::new(KBD_RATE_INTERVAL);
        limiter.submit(0x01, at(0));
        limiter.submit(0x02, at(0));
        limiter.clear();
        assert!(limiter.is_empty());
        assert_eq!(limiter.submit(0x03, at(1)), Some(0x03));
    }
}
