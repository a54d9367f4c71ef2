//! Clock and random implementations.

use crate::infrastructure::ports::{ClockPort, RandomPort};
use chrono::{DateTime, Utc};

/// System clock - uses real time.
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// System random - uses real randomness.
pub struct SystemRandom;

impl SystemRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomPort for SystemRandom {
    fn roll_die(&self, sides: u32) -> u32 {
        use rand::Rng;
        rand::thread_rng().gen_range(1..=sides.max(1))
    }

    fn short_id(&self) -> String {
        use rand::Rng;
        // 8 chars of lowercase base36, plenty for per-scene measurement ids.
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| {
                let n = rng.gen_range(0..36u32);
                char::from_digit(n, 36).unwrap_or('0')
            })
            .collect()
    }
}

/// Fixed clock for testing.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Fixed random for testing: every die lands on the given face and every
/// short id comes out the same.
#[cfg(test)]
pub struct FixedRandom(pub u32);

#[cfg(test)]
impl RandomPort for FixedRandom {
    fn roll_die(&self, _sides: u32) -> u32 {
        self.0
    }

    fn short_id(&self) -> String {
        format!("fixed-{}", self.0)
    }
}
