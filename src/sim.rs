//! # Simulated Hardware
//!
//! Stand-ins for every peripheral the monitor touches, used by the test suite
//! and by `--simulate` on machines without the sensor, LCD or GPIO.
//!
//! - [`SimClock`]: virtual time. `sleep` jumps the clock forward and every
//!   `now` call advances it by a small step, so busy-wait loops terminate
//! - [`SimSonar`]: HC-SR04 model. Dropping the trigger schedules an echo pulse
//!   whose width matches the current surface distance
//! - [`SimLcd`]: PCF8574/HD44780 model that decodes the nibble protocol back
//!   into a [`DisplayBuffer`]
//! - [`SimLed`], [`SimBuzzer`], [`SimButton`]: observable alarm I/O
//!
//! Handles are cheap clones sharing state, so a test keeps one copy and gives
//! the other to the code under test.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::alarm::Buzzer;
use crate::bus::{BusTransport, TransportError};
use crate::clock::Clock;
use crate::lcd::{decode_nibbles, DisplayBuffer, Register};
use crate::ranging::SPEED_OF_SOUND_CM_PER_S;

/// Time from trigger release to echo rise on a real HC-SR04 (8 cycles at 40 kHz,
/// plus internal processing)
const ECHO_LATENCY: Duration = Duration::from_micros(250);

const LCD_ENABLE: u8 = 0x04;

/// Virtual monotonic clock.
#[derive(Clone, Debug)]
pub struct SimClock {
    elapsed: Rc<Cell<Duration>>,
    step: Duration,
}

impl SimClock {
    /// Clock advancing 1 µs per `now()` call.
    pub fn new() -> Self {
        Self::with_step(Duration::from_micros(1))
    }

    pub fn with_step(step: Duration) -> Self {
        Self {
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
            step,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        let now = self.elapsed.get();
        self.elapsed.set(now + self.step);
        now
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// What the simulated sonar sees below it.
#[derive(Clone, Debug)]
enum Surface {
    /// Same answer every ping; `None` is a disconnected sensor
    Fixed(Option<f64>),
    /// Cycles through a list of answers
    Script { pattern: Vec<Option<f64>>, next: usize },
    /// Trash piling up: the surface creeps closer on every ping
    Filling {
        level_cm: f64,
        empty_cm: f64,
        per_ping_cm: f64,
        floor_cm: f64,
    },
}

impl Surface {
    fn next_distance(&mut self) -> Option<f64> {
        match self {
            Surface::Fixed(distance) => *distance,
            Surface::Script { pattern, next } => {
                let distance = pattern.get(*next).copied().flatten();
                *next = (*next + 1) % pattern.len().max(1);
                distance
            }
            Surface::Filling {
                level_cm,
                per_ping_cm,
                floor_cm,
                ..
            } => {
                let distance = *level_cm;
                *level_cm = (*level_cm - *per_ping_cm).max(*floor_cm);
                Some(distance)
            }
        }
    }
}

#[derive(Debug)]
struct SonarState {
    surface: Surface,
    trigger_high: bool,
    echo_window: Option<(Duration, Duration)>,
    jammed: bool,
    pings: usize,
}

/// Simulated HC-SR04.
#[derive(Clone, Debug)]
pub struct SimSonar<C> {
    clock: C,
    state: Rc<RefCell<SonarState>>,
}

impl<C: Clock + Clone> SimSonar<C> {
    fn with_surface(clock: C, surface: Surface) -> Self {
        Self {
            clock,
            state: Rc::new(RefCell::new(SonarState {
                surface,
                trigger_high: false,
                echo_window: None,
                jammed: false,
                pings: 0,
            })),
        }
    }

    /// Constant distance; `None` never answers.
    pub fn fixed(clock: C, distance_cm: Option<f64>) -> Self {
        Self::with_surface(clock, Surface::Fixed(distance_cm))
    }

    /// Replay `pattern` ping by ping, wrapping around.
    pub fn scripted(clock: C, pattern: Vec<Option<f64>>) -> Self {
        Self::with_surface(clock, Surface::Script { pattern, next: 0 })
    }

    /// A bin that fills by `per_ping_cm` every ping, stopping at `floor_cm`.
    pub fn filling(clock: C, empty_cm: f64, per_ping_cm: f64, floor_cm: f64) -> Self {
        Self::with_surface(
            clock,
            Surface::Filling {
                level_cm: empty_cm,
                empty_cm,
                per_ping_cm,
                floor_cm,
            },
        )
    }

    pub fn trigger(&self) -> SimTrigger<C> {
        SimTrigger {
            sonar: self.clone(),
        }
    }

    pub fn echo(&self) -> SimEcho<C> {
        SimEcho {
            sonar: self.clone(),
        }
    }

    /// Switch to a constant distance from the next ping on.
    pub fn set_distance(&self, distance_cm: Option<f64>) {
        self.state.borrow_mut().surface = Surface::Fixed(distance_cm);
    }

    /// Empty a filling bin.
    pub fn empty(&self) {
        if let Surface::Filling {
            level_cm, empty_cm, ..
        } = &mut self.state.borrow_mut().surface
        {
            *level_cm = *empty_cm;
        }
    }

    /// Hold the echo line high forever, as a shorted sensor would.
    pub fn jam_echo_high(&self) {
        self.state.borrow_mut().jammed = true;
    }

    /// Number of trigger pulses seen
    pub fn pings(&self) -> usize {
        self.state.borrow().pings
    }

    fn release_trigger(&self) {
        let released_at = self.clock.now();
        let mut state = self.state.borrow_mut();
        if !state.trigger_high {
            return;
        }
        state.trigger_high = false;
        state.pings += 1;
        let window = state.surface.next_distance().map(|distance| {
            let round_trip =
                Duration::from_secs_f64(2.0 * distance.max(0.0) / SPEED_OF_SOUND_CM_PER_S);
            let rise = released_at + ECHO_LATENCY;
            (rise, rise + round_trip)
        });
        state.echo_window = window;
    }

    fn echo_level(&self) -> bool {
        let window = {
            let state = self.state.borrow();
            if state.jammed {
                return true;
            }
            state.echo_window
        };
        match window {
            Some((rise, fall)) => {
                let now = self.clock.now();
                now >= rise && now < fall
            }
            None => false,
        }
    }
}

/// Trigger input of a [`SimSonar`].
pub struct SimTrigger<C> {
    sonar: SimSonar<C>,
}

impl<C> ErrorType for SimTrigger<C> {
    type Error = Infallible;
}

impl<C: Clock + Clone> OutputPin for SimTrigger<C> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.sonar.release_trigger();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.sonar.state.borrow_mut().trigger_high = true;
        Ok(())
    }
}

/// Echo output of a [`SimSonar`].
pub struct SimEcho<C> {
    sonar: SimSonar<C>,
}

impl<C> ErrorType for SimEcho<C> {
    type Error = Infallible;
}

impl<C: Clock + Clone> InputPin for SimEcho<C> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.sonar.echo_level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.sonar.echo_level())
    }
}

/// An LED whose state can be inspected.
#[derive(Clone, Debug, Default)]
pub struct SimLed {
    lit: Rc<Cell<bool>>,
}

impl SimLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.lit.get()
    }
}

impl ErrorType for SimLed {
    type Error = Infallible;
}

impl OutputPin for SimLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.lit.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.lit.set(true);
        Ok(())
    }
}

/// A buzzer remembering the tone it is playing.
#[derive(Clone, Debug, Default)]
pub struct SimBuzzer {
    tone: Rc<Cell<Option<(f64, f64)>>>,
    starts: Rc<Cell<usize>>,
}

impl SimBuzzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sounding(&self) -> bool {
        self.tone.get().is_some()
    }

    /// (frequency, duty cycle) while sounding
    pub fn tone(&self) -> Option<(f64, f64)> {
        self.tone.get()
    }

    /// How many times the buzzer was switched on
    pub fn starts(&self) -> usize {
        self.starts.get()
    }
}

impl ErrorType for SimBuzzer {
    type Error = Infallible;
}

impl Buzzer for SimBuzzer {
    fn start(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<(), Self::Error> {
        self.tone.set(Some((frequency_hz, duty_cycle)));
        self.starts.set(self.starts.get() + 1);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.tone.set(None);
        Ok(())
    }
}

#[derive(Default)]
struct ButtonState {
    held: bool,
    auto_press_after: Option<u32>,
    polls: u32,
    idle_polls: u32,
    on_press: Option<Box<dyn FnMut()>>,
}

/// Pulled-up momentary button: reads high when idle, low while pressed.
#[derive(Clone, Default)]
pub struct SimButton {
    state: Rc<RefCell<ButtonState>>,
}

impl SimButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the button down until [`SimButton::release`].
    pub fn press(&self) {
        self.state.borrow_mut().held = true;
    }

    pub fn release(&self) {
        self.state.borrow_mut().held = false;
    }

    /// Let a virtual user tap the button after `polls` reads of it.
    pub fn press_after_polls(&self, polls: u32) {
        let mut state = self.state.borrow_mut();
        state.auto_press_after = Some(polls.max(1));
        state.idle_polls = 0;
    }

    /// Run `action` every time an automatic tap happens.
    pub fn on_press(&self, action: impl FnMut() + 'static) {
        self.state.borrow_mut().on_press = Some(Box::new(action));
    }

    /// Total reads of the button
    pub fn polls(&self) -> u32 {
        self.state.borrow().polls
    }

    fn read_pressed(&self) -> bool {
        let mut state = self.state.borrow_mut();
        state.polls += 1;
        if state.held {
            return true;
        }
        let Some(after) = state.auto_press_after else {
            return false;
        };
        state.idle_polls += 1;
        if state.idle_polls < after {
            return false;
        }
        state.idle_polls = 0;
        let mut action = state.on_press.take();
        drop(state);
        if let Some(action) = action.as_mut() {
            action();
        }
        self.state.borrow_mut().on_press = action;
        true
    }
}

impl ErrorType for SimButton {
    type Error = Infallible;
}

impl InputPin for SimButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.read_pressed())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_pressed())
    }
}

#[derive(Debug)]
struct LcdState {
    address: u8,
    present: bool,
    strobe: Option<u8>,
    nibbles: Vec<(u8, u8)>,
    screen: DisplayBuffer,
    cursor: (usize, usize),
    commands: Vec<u8>,
    raw: Vec<u8>,
    rejected: usize,
    clears: usize,
}

impl LcdState {
    fn accept(&mut self, value: u8) {
        self.raw.push(value);
        if value & LCD_ENABLE != 0 {
            self.strobe = Some(value);
            return;
        }
        let Some(strobe) = self.strobe.take() else {
            // Port write with no strobe in flight (backlight only)
            return;
        };
        if value != strobe & !LCD_ENABLE {
            self.nibbles.clear();
            return;
        }
        self.nibbles.push((strobe, value));
        if self.nibbles.len() == 2 {
            let [(a, b), (c, d)] = [self.nibbles[0], self.nibbles[1]];
            self.nibbles.clear();
            if let Some((byte, register)) = decode_nibbles([a, b, c, d]) {
                self.execute(byte, register);
            }
        }
    }

    fn execute(&mut self, byte: u8, register: Register) {
        match register {
            Register::Data => {
                let (column, row) = self.cursor;
                self.screen.put(column, row, byte);
                self.cursor = (column + 1, row);
            }
            Register::Command => {
                self.commands.push(byte);
                if byte == 0x01 {
                    self.screen.clear();
                    self.cursor = (0, 0);
                    self.clears += 1;
                } else if byte & 0x80 != 0 {
                    let address = usize::from(byte & 0x7F);
                    self.cursor = if address >= 0x40 {
                        (address - 0x40, 1)
                    } else {
                        (address, 0)
                    };
                }
            }
        }
    }
}

/// The LCD backpack as seen from the bus.
#[derive(Clone, Debug)]
pub struct SimLcd {
    state: Rc<RefCell<LcdState>>,
}

impl SimLcd {
    /// A display answering at `address`.
    pub fn new(address: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(LcdState {
                address,
                present: true,
                strobe: None,
                nibbles: Vec::new(),
                screen: DisplayBuffer::new(),
                cursor: (0, 0),
                commands: Vec::new(),
                raw: Vec::new(),
                rejected: 0,
                clears: 0,
            })),
        }
    }

    /// Stop acknowledging writes.
    pub fn unplug(&self) {
        self.state.borrow_mut().present = false;
    }

    /// Current screen contents
    pub fn screen(&self) -> DisplayBuffer {
        self.state.borrow().screen.clone()
    }

    /// Every decoded command byte, in order
    pub fn commands(&self) -> Vec<u8> {
        self.state.borrow().commands.clone()
    }

    /// Every accepted port write, in order
    pub fn raw_writes(&self) -> Vec<u8> {
        self.state.borrow().raw.clone()
    }

    /// Writes that were not acknowledged
    pub fn rejected_writes(&self) -> usize {
        self.state.borrow().rejected
    }

    /// Clear-display commands received
    pub fn clears(&self) -> usize {
        self.state.borrow().clears
    }
}

impl BusTransport for SimLcd {
    fn write_byte(&mut self, address: u8, value: u8) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.present || address != state.address {
            state.rejected += 1;
            return Err(TransportError::NoAcknowledge { address });
        }
        state.accept(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_clock_advances_on_read_and_sleep() {
        let clock = SimClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(clock.now(), Duration::from_micros(1));
        clock.sleep(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_micros(1_000_002));
    }

    #[test]
    fn scripted_sonar_wraps_around() {
        let clock = SimClock::new();
        let sonar = SimSonar::scripted(clock, vec![Some(10.0), None]);
        let mut trigger = sonar.trigger();
        for _ in 0..3 {
            trigger.set_high().unwrap();
            trigger.set_low().unwrap();
        }
        assert_eq!(sonar.pings(), 3);
        let next = sonar.state.borrow_mut().surface.next_distance();
        assert_eq!(next, None);
    }

    #[test]
    fn filling_bin_rises_and_empties() {
        let sonar = SimSonar::filling(SimClock::new(), 30.0, 5.0, 4.0);
        let mut trigger = sonar.trigger();
        for _ in 0..10 {
            trigger.set_high().unwrap();
            trigger.set_low().unwrap();
        }
        assert_eq!(sonar.state.borrow_mut().surface.next_distance(), Some(4.0));
        sonar.empty();
        assert_eq!(sonar.state.borrow_mut().surface.next_distance(), Some(30.0));
    }

    #[test]
    fn button_auto_press_is_momentary() {
        let mut button = SimButton::new();
        let taps = Rc::new(Cell::new(0));
        let counter = taps.clone();
        button.on_press(move || counter.set(counter.get() + 1));
        button.press_after_polls(3);
        let reads: Vec<bool> = (0..6).map(|_| button.is_low().unwrap()).collect();
        assert_eq!(reads, vec![false, false, true, false, false, true]);
        assert_eq!(taps.get(), 2);
        assert_eq!(button.polls(), 6);
    }

    #[test]
    fn lcd_ignores_bytes_without_strobe() {
        let mut lcd = SimLcd::new(0x27);
        lcd.write_byte(0x27, 0x08).unwrap();
        lcd.write_byte(0x27, 0x48).unwrap();
        assert!(lcd.commands().is_empty());
        assert_eq!(lcd.raw_writes(), vec![0x08, 0x48]);
    }
}
