use std::time::{Duration, Instant};

pub const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// True at most once per `LOG_THROTTLE` for a given timestamp slot.
pub fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}
