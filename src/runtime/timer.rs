//! Run clock
//!
//! Records when a run started in epoch milliseconds for the `start` event and
//! measures how long it took for the `end` event. Native builds measure with
//! `Instant`; wasm32 has no usable `Instant`, so both readings come from
//! `js_sys::Date::now()` there.

// Native: monotonic duration, separate wall-clock start

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use std::time::{Instant, SystemTime, UNIX_EPOCH};

    #[derive(Debug, Clone)]
    pub struct Timer {
        start: Instant,
        started_at_ms: f64,
    }

    impl Timer {
        pub fn now() -> Self {
            let started_at_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or(0.0);

            Self {
                start: Instant::now(),
                started_at_ms,
            }
        }

        /// Wall-clock start time in milliseconds since the Unix epoch.
        pub fn started_at_ms(&self) -> f64 {
            self.started_at_ms
        }

        pub fn elapsed_ms(&self) -> f64 {
            self.start.elapsed().as_secs_f64() * 1000.0
        }
    }
}

// wasm32: one Date::now() source for both

#[cfg(target_arch = "wasm32")]
mod imp {
    #[derive(Debug, Clone)]
    pub struct Timer {
        start_ms: f64,
    }

    impl Timer {
        pub fn now() -> Self {
            Self {
                start_ms: js_sys::Date::now(),
            }
        }

        /// Wall-clock start time in milliseconds since the Unix epoch.
        pub fn started_at_ms(&self) -> f64 {
            self.start_ms
        }

        // Date::now() is not monotonic; clamp so a clock step never yields a negative duration.
        pub fn elapsed_ms(&self) -> f64 {
            (js_sys::Date::now() - self.start_ms).max(0.0)
        }
    }
}

pub use imp::Timer;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_non_negative_and_grows() {
        let timer = Timer::now();
        let first = timer.elapsed_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = timer.elapsed_ms();

        assert!(first >= 0.0);
        assert!(second >= first);
        assert!(timer.started_at_ms() > 0.0);
    }
}
