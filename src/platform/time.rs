use std::time::Duration;

/// An opaque value representing a snapshot in time captured from the underlying
/// platform.
///
/// Implements a subset of `std::time::Instant`, see:
/// https://doc.rust-lang.org/std/time/struct.Instant.html
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct SystemTime {
    /// Normal non-wasm time measurement provided by std
    #[cfg(not(target_arch = "wasm32"))]
    instant: std::time::Instant,
    /// JavaScript measures time since January 1, 1970 00:00:00 UTC in
    /// milliseconds.
    #[cfg(target_arch = "wasm32")]
    millis_since_epoch: f64,
}

impl SystemTime {
    /// Get the current system time.
    pub fn now() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                Self {
                    millis_since_epoch: js_sys::Date::now()
                }
            } else {
                Self {
                    instant: std::time::Instant::now()
                }
            }
        }
    }

    /// Time elapsed from `earlier` to `self`, saturating to zero when `earlier`
    /// is actually later.
    pub fn saturating_duration_since(&self, earlier: SystemTime) -> Duration {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                let millis = (self.millis_since_epoch - earlier.millis_since_epoch).max(0.0);
                Duration::from_secs_f64(millis / 1000.0)
            } else {
                self.instant.saturating_duration_since(earlier.instant)
            }
        }
    }

    /// Time elapsed since this value was captured.
    pub fn elapsed(&self) -> Duration {
        Self::now().saturating_duration_since(*self)
    }
}

impl std::ops::Add<Duration> for SystemTime {
    type Output = SystemTime;

    fn add(self, rhs: Duration) -> Self::Output {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                Self {
                    millis_since_epoch: self.millis_since_epoch + rhs.as_secs_f64() * 1000.0
                }
            } else {
                Self {
                    instant: self.instant + rhs
                }
            }
        }
    }
}

impl std::ops::Sub<SystemTime> for SystemTime {
    type Output = Duration;

    fn sub(self, rhs: SystemTime) -> Self::Output {
        self.saturating_duration_since(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_subtract_round_trips() {
        let start = SystemTime::now();
        let later = start + Duration::from_millis(250);

        assert_eq!(Duration::from_millis(250), later - start);
        assert!(later > start);
    }

    #[test]
    fn earlier_minus_later_saturates() {
        let start = SystemTime::now();
        let later = start + Duration::from_secs(2);

        assert_eq!(Duration::ZERO, start - later);
    }
}
