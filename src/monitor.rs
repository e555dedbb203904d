//! # Fill Monitor State Machine
//!
//! ```text
//!            reading < 100 %
//!          ┌───────────────┐
//!          ▼               │
//!    ┌────────────┐  100 % after countdown  ┌─────────────┐
//!    │ Monitoring │ ──────────────────────▶ │ AlarmActive │
//!    └────────────┘ ◀────────────────────── └─────────────┘
//!                        button pressed
//! ```
//!
//! **Monitoring**: one sampling burst, then the percentage on line 1 and a ten
//! second countdown on line 2. The full check happens only after the countdown.
//!
//! **AlarmActive**: red LED, buzzer, "Trash FULL!" and a button poll. The
//! sensor is not consulted until the button is pressed, so the alarm stays
//! latched even if the bin is emptied without acknowledging.
//!
//! The loop runs until the [`Shutdown`] flag is raised. The flag is checked at
//! every pause the monitor owns, and the alarm outputs are de-energized on the
//! way out whatever the reason for leaving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::alarm::{ActuatorError, AlarmOutputs};
use crate::bus::BusTransport;
use crate::clock::Clock;
use crate::fill::percent_full;
use crate::lcd::Lcd1602;
use crate::ranging::DistanceSensor;
use crate::sampling::SamplingEngine;

/// Countdown ticks between the reading and the full check
pub const COUNTDOWN_SECS: u32 = 10;
/// Length of one countdown tick
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
/// Button poll period while alarming
pub const BUTTON_POLL: Duration = Duration::from_millis(100);
/// How long the "Alarm off" confirmation stays up
pub const CONFIRMATION_HOLD: Duration = Duration::from_secs(2);

pub const FULL_MESSAGE: (&str, &str) = ("Trash FULL!", "Press button");
pub const CLEARED_MESSAGE: (&str, &str) = ("Alarm off", "Trash OK");

/// Something that can show two lines of status text.
pub trait StatusDisplay {
    fn render_status(&mut self, line1: &str, line2: &str);
}

impl<BUS: BusTransport, CLOCK: Clock> StatusDisplay for Lcd1602<BUS, CLOCK> {
    fn render_status(&mut self, line1: &str, line2: &str) {
        Lcd1602::render_status(self, line1, line2);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Monitoring,
    AlarmActive,
}

/// Cross-thread stop request, raised by the signal handler.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    #[error(transparent)]
    Actuator(#[from] ActuatorError),
}

pub struct FillMonitor<D, S, A, CLOCK> {
    display: D,
    sampler: SamplingEngine<S, CLOCK>,
    alarm: A,
    clock: CLOCK,
    shutdown: Shutdown,
    state: MonitorState,
    last_percent: Option<u8>,
}

impl<D, S, A, CLOCK> FillMonitor<D, S, A, CLOCK>
where
    D: StatusDisplay,
    S: DistanceSensor,
    A: AlarmOutputs,
    CLOCK: Clock,
{
    pub fn new(
        display: D,
        sampler: SamplingEngine<S, CLOCK>,
        alarm: A,
        clock: CLOCK,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            display,
            sampler,
            alarm,
            clock,
            shutdown,
            state: MonitorState::Monitoring,
            last_percent: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Percentage computed by the most recent monitoring cycle
    pub fn last_percent(&self) -> Option<u8> {
        self.last_percent
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Run until shutdown is requested, then de-energize all outputs.
    pub fn run(&mut self) -> Result<(), MonitorError> {
        info!("Trash monitor running");
        let outcome = self.run_until_shutdown();
        let cleanup = self.alarm.de_energize();
        if let Err(e) = &outcome {
            warn!("Monitor stopped on error: {}", e);
        }
        outcome?;
        cleanup?;
        info!("Outputs de-energized");
        Ok(())
    }

    fn run_until_shutdown(&mut self) -> Result<(), MonitorError> {
        self.alarm.show_idle()?;
        while !self.shutdown.is_triggered() {
            self.step()?;
        }
        Ok(())
    }

    /// Perform the action of the current state once and report the state
    /// that follows. Returns early, without a transition, on shutdown.
    pub fn step(&mut self) -> Result<MonitorState, MonitorError> {
        match self.state {
            MonitorState::Monitoring => self.monitor_cycle(),
            MonitorState::AlarmActive => self.alarm_cycle()?,
        }
        Ok(self.state)
    }

    fn monitor_cycle(&mut self) {
        let reading = self.sampler.measure_cycle();
        if reading.is_fallback() {
            warn!(
                "No echo in {} pings, assuming empty bin",
                reading.failures
            );
        }
        info!(
            "Average distance: {:.1} cm ({} samples)",
            reading.distance_cm, reading.samples
        );

        let percent = percent_full(reading.distance_cm);
        self.last_percent = Some(percent);
        let status = format!("{}% Full", percent);
        info!("Trash status: {}", status);

        for remaining in (1..=COUNTDOWN_SECS).rev() {
            if self.shutdown.is_triggered() {
                return;
            }
            self.display
                .render_status(&status, &format!("Next: {} sec", remaining));
            self.clock.sleep(COUNTDOWN_TICK);
        }

        if percent >= 100 {
            self.state = MonitorState::AlarmActive;
        }
    }

    fn alarm_cycle(&mut self) -> Result<(), MonitorError> {
        self.alarm.raise()?;
        self.display.render_status(FULL_MESSAGE.0, FULL_MESSAGE.1);
        warn!("Trash full! Alarm activated. Waiting for button press...");

        loop {
            if self.shutdown.is_triggered() {
                return Ok(());
            }
            if self.alarm.button_pressed()? {
                break;
            }
            self.clock.sleep(BUTTON_POLL);
        }

        self.alarm.silence()?;
        self.display
            .render_status(CLEARED_MESSAGE.0, CLEARED_MESSAGE.1);
        info!("Alarm cleared via button press");
        self.state = MonitorState::Monitoring;
        self.hold(CONFIRMATION_HOLD);
        Ok(())
    }

    /// Sleep for `duration` in poll-sized slices, stopping early on shutdown.
    fn hold(&mut self, duration: Duration) {
        let mut left = duration;
        while !left.is_zero() && !self.shutdown.is_triggered() {
            let slice = left.min(BUTTON_POLL);
            self.clock.sleep(slice);
            left -= slice;
        }
    }
}
