//! # Burst Sampling
//!
//! A single ping is noisy (ragged trash surfaces, off-axis reflections), so
//! each monitor cycle fires the sensor repeatedly for a fixed wall-clock window
//! and reports the mean. Failed pings are skipped. A window with no successful
//! ping at all reports the container height, so a dead sensor reads as an
//! empty bin and never raises the alarm.

use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;
use crate::fill::CONTAINER_HEIGHT_CM;
use crate::ranging::DistanceSensor;

/// Length of one sampling burst
pub const MEASUREMENT_WINDOW: Duration = Duration::from_secs(2);
/// Pause after each ping
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Result of one sampling burst.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleReading {
    /// Mean distance, or the container height when nothing was measured
    pub distance_cm: f64,
    /// Successful pings
    pub samples: usize,
    /// Pings that failed (timeouts, pin errors)
    pub failures: usize,
}

impl CycleReading {
    /// True when no ping succeeded and the distance is the fallback value.
    pub fn is_fallback(&self) -> bool {
        self.samples == 0
    }
}

pub struct SamplingEngine<S, CLOCK> {
    sensor: S,
    clock: CLOCK,
}

impl<S, CLOCK> SamplingEngine<S, CLOCK>
where
    S: DistanceSensor,
    CLOCK: Clock,
{
    pub fn new(sensor: S, clock: CLOCK) -> Self {
        Self { sensor, clock }
    }

    /// Sample for [`MEASUREMENT_WINDOW`] and reduce to one reading.
    pub fn measure_cycle(&mut self) -> CycleReading {
        let started = self.clock.now();
        let mut distances = Vec::with_capacity(20);
        let mut failures = 0;

        while self.clock.now().saturating_sub(started) < MEASUREMENT_WINDOW {
            match self.sensor.sample() {
                Ok(distance) => distances.push(distance),
                Err(e) => {
                    debug!("Ping failed: {}", e);
                    failures += 1;
                }
            }
            self.clock.sleep(SAMPLE_INTERVAL);
        }

        let distance_cm = if distances.is_empty() {
            CONTAINER_HEIGHT_CM
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };

        CycleReading {
            distance_cm,
            samples: distances.len(),
            failures,
        }
    }
}
