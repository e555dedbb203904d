//! # Whole-System Scenarios
//!
//! These tests wire the real drivers (HC-SR04 ranging, sampling, LCD nibble
//! protocol, alarm actuator) to the simulated parts and check what a person
//! standing next to the bin would see: the LCD contents, the LEDs and the
//! buzzer. Everything runs on virtual time.

use std::time::Duration;

use crate::alarm::AlarmActuator;
use crate::clock::Clock;
use crate::fill::CONTAINER_HEIGHT_CM;
use crate::lcd::{Lcd1602, DEFAULT_ADDRESS};
use crate::monitor::{FillMonitor, MonitorState, Shutdown};
use crate::ranging::HcSr04;
use crate::sampling::SamplingEngine;
use crate::sim::{SimBuzzer, SimButton, SimClock, SimEcho, SimLcd, SimLed, SimSonar, SimTrigger};

type SimMonitor = FillMonitor<
    Lcd1602<SimLcd, SimClock>,
    HcSr04<SimTrigger<SimClock>, SimEcho<SimClock>, SimClock>,
    AlarmActuator<SimLed, SimLed, SimBuzzer, SimButton>,
    SimClock,
>;

/// Handles to everything observable on the simulated bin.
struct Bin {
    clock: SimClock,
    lcd: SimLcd,
    red: SimLed,
    green: SimLed,
    buzzer: SimBuzzer,
    button: SimButton,
    shutdown: Shutdown,
}

fn build(sonar: &SimSonar<SimClock>, clock: SimClock) -> (SimMonitor, Bin) {
    let bin = Bin {
        clock: clock.clone(),
        lcd: SimLcd::new(DEFAULT_ADDRESS),
        red: SimLed::new(),
        green: SimLed::new(),
        buzzer: SimBuzzer::new(),
        button: SimButton::new(),
        shutdown: Shutdown::new(),
    };

    let mut lcd = Lcd1602::new(bin.lcd.clone(), clock.clone(), DEFAULT_ADDRESS, true);
    assert!(lcd.initialize());

    let sensor = HcSr04::new(sonar.trigger(), sonar.echo(), clock.clone());
    let alarm = AlarmActuator::new(
        bin.red.clone(),
        bin.green.clone(),
        bin.buzzer.clone(),
        bin.button.clone(),
    );
    let monitor = FillMonitor::new(
        lcd,
        SamplingEngine::new(sensor, clock.clone()),
        alarm,
        clock,
        bin.shutdown.clone(),
    );
    (monitor, bin)
}

fn screen(bin: &Bin) -> (String, String) {
    let buffer = bin.lcd.screen();
    (buffer.text(0), buffer.text(1))
}

#[test]
fn noisy_readings_average_to_six_percent() {
    let clock = SimClock::new();
    let sonar = SimSonar::scripted(
        clock.clone(),
        vec![Some(30.0), Some(31.0), Some(29.0), Some(30.0)],
    );
    let (mut monitor, bin) = build(&sonar, clock);

    assert_eq!(monitor.step().unwrap(), MonitorState::Monitoring);
    assert_eq!(monitor.last_percent(), Some(6));
    assert_eq!(screen(&bin), ("6% Full".into(), "Next: 1 sec".into()));
}

#[test]
fn close_surface_raises_latched_alarm() {
    let clock = SimClock::new();
    let sonar = SimSonar::fixed(clock.clone(), Some(5.0));
    let (mut monitor, bin) = build(&sonar, clock);

    assert_eq!(monitor.step().unwrap(), MonitorState::AlarmActive);
    assert_eq!(screen(&bin).0, "100% Full");

    // Someone takes the trash out without pressing the button; the alarm
    // keeps going because the sensor is not consulted until acknowledged
    sonar.set_distance(Some(CONTAINER_HEIGHT_CM));
    bin.button.press_after_polls(600);
    let pings_before = sonar.pings();
    let alarm_started = bin.clock.now();
    monitor.step().unwrap();

    assert!(bin.clock.now() - alarm_started >= Duration::from_secs(60));
    assert_eq!(sonar.pings(), pings_before);
    assert_eq!(bin.buzzer.starts(), 1);
    assert_eq!(screen(&bin), ("Alarm off".into(), "Trash OK".into()));
    assert!(bin.green.is_on());
    assert!(!bin.red.is_on());

    assert_eq!(monitor.step().unwrap(), MonitorState::Monitoring);
    assert_eq!(monitor.last_percent(), Some(0));
}

#[test]
fn alarm_screen_shows_while_waiting() {
    let clock = SimClock::new();
    let sonar = SimSonar::fixed(clock.clone(), Some(5.0));
    let (mut monitor, bin) = build(&sonar, clock);
    monitor.step().unwrap();

    bin.shutdown.trigger();
    monitor.step().unwrap();
    assert_eq!(screen(&bin), ("Trash FULL!".into(), "Press button".into()));
    assert!(bin.red.is_on());
    assert_eq!(bin.buzzer.tone(), Some((440.0, 0.5)));
}

#[test]
fn dead_sensor_reads_empty() {
    let clock = SimClock::new();
    let sonar = SimSonar::fixed(clock.clone(), None);
    let (mut monitor, bin) = build(&sonar, clock);

    assert_eq!(monitor.step().unwrap(), MonitorState::Monitoring);
    assert_eq!(monitor.last_percent(), Some(0));
    assert_eq!(screen(&bin).0, "0% Full");
    assert!(!bin.buzzer.is_sounding());
}

#[test]
fn filling_bin_eventually_alarms() {
    let clock = SimClock::new();
    // 20 pings per cycle, 0.5 cm per ping: 10 cm closer every cycle
    let sonar = SimSonar::filling(clock.clone(), 31.0, 0.5, 3.0);
    let (mut monitor, _bin) = build(&sonar, clock);

    let mut seen = Vec::new();
    for _ in 0..5 {
        if monitor.step().unwrap() == MonitorState::AlarmActive {
            break;
        }
        seen.push(monitor.last_percent().unwrap());
    }

    assert_eq!(monitor.state(), MonitorState::AlarmActive);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "fill went down: {seen:?}");
}

#[test]
fn interrupt_before_first_cycle_cleans_up() {
    let clock = SimClock::new();
    let sonar = SimSonar::fixed(clock.clone(), Some(20.0));
    let (mut monitor, bin) = build(&sonar, clock);

    bin.shutdown.trigger();
    monitor.run().unwrap();
    assert!(!bin.red.is_on());
    assert!(!bin.green.is_on());
    assert!(!bin.buzzer.is_sounding());
    assert_eq!(sonar.pings(), 0);
}

#[test]
fn unplugged_display_does_not_stop_alarm() {
    let clock = SimClock::new();
    let sonar = SimSonar::fixed(clock.clone(), Some(16.0));
    let (mut monitor, bin) = build(&sonar, clock);

    monitor.step().unwrap();
    bin.lcd.unplug();
    sonar.set_distance(Some(4.0));
    assert_eq!(monitor.step().unwrap(), MonitorState::AlarmActive);

    bin.button.press();
    assert_eq!(monitor.step().unwrap(), MonitorState::Monitoring);
    assert_eq!(bin.buzzer.starts(), 1);
    // Nothing new reached the screen after the display went away
    assert_eq!(screen(&bin), ("50% Full".into(), "Next: 1 sec".into()));
}
