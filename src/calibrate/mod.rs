//! Payload size calibration
//!
//! Picks a payload size so one transfer takes approximately the target
//! duration, then reports the throughput of the accepted trial. This is
//! a heuristic: "within a factor of two of the requested duration" is
//! good enough, statistical convergence is a non-goal.

use std::time::Duration;

use tracing::debug;

use crate::defaults;
use crate::error::Result;
use crate::transfer::Direction;

/// One timed transfer attempt at a specific payload size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    /// Payload size in bytes
    pub size: u64,
    /// Wall-clock time strictly bounding the transfer
    pub elapsed: Duration,
}

impl Trial {
    pub fn new(size: u64, elapsed: Duration) -> Self {
        Self { size, elapsed }
    }

    /// Implied throughput in bytes per second: size divided by elapsed,
    /// with no rounding before the division.
    pub fn throughput(&self) -> f64 {
        self.size as f64 / self.elapsed.as_secs_f64()
    }
}

/// Runs one timed transfer per call.
///
/// The real implementation moves bytes over ssh; tests substitute a
/// deterministic mock, so calibration never needs a network.
pub trait TrialDriver {
    fn run_trial(&mut self, direction: Direction, size: u64) -> Result<Trial>;
}

/// Calibration phases: an initial guess, refinement toward the target
/// duration, and a terminal accepted trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    InitialGuess,
    Refining,
    Done,
}

/// Find a payload size whose transfer time approximates `target`, and
/// return the accepted trial for `direction`.
///
/// A trial is accepted when its elapsed time is within a factor of
/// [`defaults::ACCEPT_RATIO`] of the target on either side. Otherwise
/// the size is rescaled proportionally (`size * target / elapsed`),
/// clamped between [`defaults::MIN_PAYLOAD_SIZE`] and
/// [`defaults::MAX_PAYLOAD_SIZE`]. A size pinned at either clamp is
/// accepted as-is: for a near-zero target the floor trial is the answer,
/// noise and all. After [`defaults::MAX_TRIALS`] trials the last one is
/// accepted unconditionally.
///
/// Driver errors abort calibration immediately; a retry would
/// misrepresent the measurement.
pub fn calibrate(
    target: Duration,
    direction: Direction,
    driver: &mut dyn TrialDriver,
) -> Result<Trial> {
    let target_secs = target.as_secs_f64();
    let mut phase = Phase::InitialGuess;
    let mut size = defaults::INITIAL_PAYLOAD_SIZE;
    let mut trial = driver.run_trial(direction, size)?;

    for attempt in 1..defaults::MAX_TRIALS {
        match next_size(&trial, target_secs) {
            None => {
                phase = Phase::Done;
                break;
            }
            Some(next) if next == size => {
                // Pinned at a clamp while still outside the band
                phase = Phase::Done;
                break;
            }
            Some(next) => {
                debug!(
                    %direction,
                    attempt,
                    elapsed_secs = trial.elapsed.as_secs_f64(),
                    from = size,
                    to = next,
                    "rescaling payload"
                );
                phase = Phase::Refining;
                size = next;
                trial = driver.run_trial(direction, size)?;
            }
        }
    }

    if phase != Phase::Done {
        debug!(%direction, "trial cap reached, accepting last trial");
    }
    Ok(trial)
}

/// The next size to try, or `None` when the trial is inside the
/// acceptance band.
fn next_size(trial: &Trial, target_secs: f64) -> Option<u64> {
    let elapsed = trial.elapsed.as_secs_f64();
    if elapsed * defaults::ACCEPT_RATIO >= target_secs && elapsed <= target_secs * defaults::ACCEPT_RATIO
    {
        return None;
    }
    // Guard against a sub-nanosecond trial blowing up the ratio
    let scale = target_secs / elapsed.max(1e-9);
    let next = (trial.size as f64 * scale) as u64;
    Some(next.clamp(defaults::MIN_PAYLOAD_SIZE, defaults::MAX_PAYLOAD_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    /// Elapsed time is a deterministic linear function of size
    struct LinearDriver {
        bytes_per_second: f64,
        calls: u32,
    }

    impl LinearDriver {
        fn new(bytes_per_second: f64) -> Self {
            Self {
                bytes_per_second,
                calls: 0,
            }
        }
    }

    impl TrialDriver for LinearDriver {
        fn run_trial(&mut self, _direction: Direction, size: u64) -> Result<Trial> {
            self.calls += 1;
            let secs = size as f64 / self.bytes_per_second;
            Ok(Trial::new(size, Duration::from_secs_f64(secs)))
        }
    }

    /// Fails every call, as a dead or unauthenticated link would
    struct FailingDriver {
        calls: u32,
    }

    impl TrialDriver for FailingDriver {
        fn run_trial(&mut self, _direction: Direction, _size: u64) -> Result<Trial> {
            self.calls += 1;
            Err(AppError::connection("host unreachable"))
        }
    }

    /// Elapsed time never depends on size; calibration cannot converge
    struct ConstantDriver {
        elapsed: Duration,
        calls: u32,
    }

    impl TrialDriver for ConstantDriver {
        fn run_trial(&mut self, _direction: Direction, size: u64) -> Result<Trial> {
            self.calls += 1;
            Ok(Trial::new(size, self.elapsed))
        }
    }

    #[test]
    fn test_throughput_is_exact_division() {
        let trial = Trial::new(3, Duration::from_secs(2));
        assert_eq!(trial.throughput(), 1.5);

        let trial = Trial::new(500_000_000, Duration::from_secs(5));
        assert_eq!(trial.throughput(), 100_000_000.0);
    }

    #[test]
    fn test_settles_near_target_on_100mb_link() {
        // End-to-end scenario: 100 MB/s link, 5 second target
        let mut driver = LinearDriver::new(100_000_000.0);
        let trial = calibrate(Duration::from_secs(5), Direction::Upload, &mut driver).unwrap();

        // Proportional rescaling should land at roughly target * rate
        assert!(
            (trial.size as f64 - 500_000_000.0).abs() < 1_000_000.0,
            "size {} not near 500 MB",
            trial.size
        );
        assert!((trial.throughput() - 100_000_000.0).abs() < 1_000_000.0);
        assert!(driver.calls <= defaults::MAX_TRIALS);
    }

    #[test]
    fn test_accepted_trial_is_inside_band() {
        for rate in [10_000.0, 1_000_000.0, 100_000_000.0, 10_000_000_000.0] {
            let target = Duration::from_secs(5);
            let mut driver = LinearDriver::new(rate);
            let trial = calibrate(target, Direction::Download, &mut driver).unwrap();

            let elapsed = trial.elapsed.as_secs_f64();
            let in_band = elapsed * defaults::ACCEPT_RATIO >= 5.0 && elapsed <= 5.0 * defaults::ACCEPT_RATIO;
            let at_floor = trial.size == defaults::MIN_PAYLOAD_SIZE;
            assert!(
                in_band || at_floor,
                "rate {rate}: elapsed {elapsed} not in band and size {} not at floor",
                trial.size
            );
            assert!(driver.calls <= defaults::MAX_TRIALS);
        }
    }

    #[test]
    fn test_zero_target_terminates_at_floor() {
        let mut driver = LinearDriver::new(1_000_000.0);
        let trial = calibrate(Duration::ZERO, Direction::Upload, &mut driver).unwrap();
        assert_eq!(trial.size, defaults::MIN_PAYLOAD_SIZE);
        assert!(driver.calls <= defaults::MAX_TRIALS);
    }

    #[test]
    fn test_tiny_target_accepts_floor_overshoot() {
        // 10 KB/s link: even the floor takes ~105s against a 1s target
        let mut driver = LinearDriver::new(10_000.0);
        let trial = calibrate(Duration::from_secs(1), Direction::Upload, &mut driver).unwrap();
        assert_eq!(trial.size, defaults::MIN_PAYLOAD_SIZE);
    }

    #[test]
    fn test_driver_error_propagates_without_retry() {
        let mut driver = FailingDriver { calls: 0 };
        let err = calibrate(Duration::from_secs(5), Direction::Upload, &mut driver).unwrap_err();
        assert_eq!(err.category(), "CONNECTION");
        assert_eq!(driver.calls, 1, "no further trials after a failure");
    }

    #[test]
    fn test_trial_cap_bounds_non_converging_driver() {
        // Constant sub-target elapsed keeps asking for more size until
        // the ceiling clamp pins it
        let mut driver = ConstantDriver {
            elapsed: Duration::from_millis(1),
            calls: 0,
        };
        let trial = calibrate(Duration::from_secs(30), Direction::Upload, &mut driver).unwrap();
        assert!(driver.calls <= defaults::MAX_TRIALS);
        assert_eq!(trial.size, defaults::MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_first_guess_accepted_when_already_in_band() {
        // 1 MB/s: the 2 MiB initial guess takes ~2.1s against a 4s
        // target, inside the factor-two band, so one trial suffices
        let mut driver = LinearDriver::new(1_000_000.0);
        let trial = calibrate(Duration::from_secs(4), Direction::Upload, &mut driver).unwrap();
        assert_eq!(driver.calls, 1);
        assert_eq!(trial.size, defaults::INITIAL_PAYLOAD_SIZE);
    }
}
