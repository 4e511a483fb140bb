//! Pacing of new order placement from the active-order count.

use std::time::{Duration, Instant};

/// Decides how long the loop should wait before opening another order.
/// The cooldown between opens stretches as the book of working orders
/// fills up and collapses once orders start completing.
#[derive(Debug)]
pub struct OpenThrottle {
    base_wait: Duration,
    max_orders: usize,
    last_active: usize,
    last_open: Option<Instant>,
}

impl OpenThrottle {
    pub fn new(base_wait: Duration, max_orders: usize) -> Self {
        Self {
            base_wait,
            max_orders,
            last_active: 0,
            last_open: None,
        }
    }

    /// Mark a successful open so the cooldown clock restarts.
    pub fn record_open(&mut self, now: Instant) {
        self.last_open = Some(now);
        self.last_active += 1;
    }

    /// Duration::ZERO means go now; anything else is how long to sleep
    /// before re-checking.
    pub fn next_wait(&mut self, active: usize, now: Instant) -> Duration {
        // an order completed since last check, replace it immediately
        if active < self.last_active {
            self.last_active = active;
            return Duration::ZERO;
        }
        self.last_active = active;

        if active >= self.max_orders {
            return Duration::from_secs(1);
        }

        let ratio = active as f64 / self.max_orders as f64;
        let cooldown = if ratio >= 2.0 / 3.0 {
            self.base_wait * 2
        } else if ratio >= 1.0 / 3.0 {
            self.base_wait
        } else if ratio >= 1.0 / 6.0 {
            self.base_wait / 2
        } else {
            self.base_wait / 4
        };

        match self.last_open {
            Some(last) if now.duration_since(last) <= cooldown => Duration::from_secs(1),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(400);

    #[test]
    fn first_order_goes_immediately() {
        let mut t = OpenThrottle::new(WAIT, 40);
        assert_eq!(t.next_wait(0, Instant::now()), Duration::ZERO);
    }

    #[test]
    fn completed_order_releases_throttle() {
        let mut t = OpenThrottle::new(WAIT, 40);
        let now = Instant::now();
        assert_eq!(t.next_wait(20, now), Duration::ZERO);
        t.record_open(now);
        // count dropped from 21 to 20: an order finished
        assert_eq!(t.next_wait(20, now), Duration::ZERO);
    }

    #[test]
    fn full_book_waits() {
        let mut t = OpenThrottle::new(WAIT, 40);
        assert_eq!(t.next_wait(40, Instant::now()), Duration::from_secs(1));
        assert_eq!(t.next_wait(45, Instant::now()), Duration::from_secs(1));
    }

    #[test]
    fn cooldown_scales_with_fill_ratio() {
        let now = Instant::now();

        // low utilization: quarter cooldown
        let mut t = OpenThrottle::new(WAIT, 40);
        t.record_open(now);
        assert_eq!(t.next_wait(2, now + WAIT / 4 + Duration::from_secs(1)), Duration::ZERO);

        // >= 1/6: half cooldown
        let mut t = OpenThrottle::new(WAIT, 40);
        t.record_open(now);
        t.last_active = 10;
        assert_eq!(t.next_wait(10, now + WAIT / 4), Duration::from_secs(1));
        assert_eq!(t.next_wait(10, now + WAIT / 2 + Duration::from_secs(1)), Duration::ZERO);

        // >= 1/3: full cooldown
        let mut t = OpenThrottle::new(WAIT, 40);
        t.record_open(now);
        t.last_active = 15;
        assert_eq!(t.next_wait(15, now + WAIT / 2), Duration::from_secs(1));
        assert_eq!(t.next_wait(15, now + WAIT + Duration::from_secs(1)), Duration::ZERO);

        // >= 2/3: double cooldown
        let mut t = OpenThrottle::new(WAIT, 40);
        t.record_open(now);
        t.last_active = 30;
        assert_eq!(t.next_wait(30, now + WAIT), Duration::from_secs(1));
        assert_eq!(t.next_wait(30, now + WAIT * 2 + Duration::from_secs(1)), Duration::ZERO);
    }
}
