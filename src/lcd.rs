//! # 16x2 Character LCD Driver (HD44780 behind a PCF8574 backpack)
//!
//! The backpack exposes the controller's pins as one 8-bit port, so every
//! logical byte travels as two 4-bit nibbles. Each nibble is written with the
//! enable strobe raised, held for a settle delay, then written again with the
//! strobe dropped; the falling edge latches the nibble.
//!
//! ## Port bit layout
//!
//! | bit | 7..4   | 3         | 2      | 1   | 0  |
//! |-----|--------|-----------|--------|-----|----|
//! |     | nibble | backlight | enable | R/W | RS |
//!
//! RS is 1 for character data and 0 for commands, and stays set for all four
//! bytes of a transaction. The backlight bit is a persistent flag OR'd into
//! (or masked out of) every byte sent.
//!
//! ## Failure semantics
//!
//! A failed bus write never reaches the monitor loop. The driver logs it and
//! switches to degraded mode, after which render calls are silently dropped.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bus::{BusTransport, TransportError};
use crate::clock::Clock;

/// Visible characters per line
pub const LCD_COLUMNS: usize = 16;
/// Number of display lines
pub const LCD_ROWS: usize = 2;
/// Factory address of the common PCF8574T backpack
pub const DEFAULT_ADDRESS: u8 = 0x27;

const BACKLIGHT: u8 = 0x08;
const ENABLE: u8 = 0x04;
const REGISTER_SELECT: u8 = 0x01;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE_INCREMENT: u8 = 0x06;
const CMD_DISPLAY_ON_CURSOR_OFF: u8 = 0x0C;
const CMD_FUNCTION_SET_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM_ADDRESS: u8 = 0x80;
/// Two 8-bit function-set nibbles; resyncs the controller from any state
const INIT_WAKE: u8 = 0x33;
/// Final 8-bit function-set nibble followed by the switch to 4-bit mode
const INIT_ENTER_4BIT: u8 = 0x32;

const SECOND_LINE_OFFSET: u8 = 0x40;

/// Hold time between raising and dropping the enable strobe
pub const STROBE_SETTLE: Duration = Duration::from_millis(2);
/// Pause between the steps of the power-on sequence
pub const INIT_SETTLE: Duration = Duration::from_millis(5);

/// Which controller register a transaction targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    Command,
    Data,
}

impl Register {
    fn flag(self) -> u8 {
        match self {
            Register::Command => 0,
            Register::Data => REGISTER_SELECT,
        }
    }
}

fn apply_backlight(byte: u8, backlight: bool) -> u8 {
    if backlight {
        byte | BACKLIGHT
    } else {
        byte & !BACKLIGHT
    }
}

/// Encode one logical byte into the four port writes that transfer it:
/// high nibble strobed, high nibble latched, low nibble strobed, low nibble latched.
pub fn encode_nibbles(value: u8, register: Register, backlight: bool) -> [u8; 4] {
    let rs = register.flag();
    let high = (value & 0xF0) | rs;
    let low = ((value & 0x0F) << 4) | rs;
    [
        apply_backlight(high | ENABLE, backlight),
        apply_backlight(high, backlight),
        apply_backlight(low | ENABLE, backlight),
        apply_backlight(low, backlight),
    ]
}

/// Reverse [`encode_nibbles`].
///
/// Returns `None` unless both nibbles arrive as a strobe/latch pair and all
/// four bytes agree on the register select flag.
pub fn decode_nibbles(bytes: [u8; 4]) -> Option<(u8, Register)> {
    let [hi_strobe, hi_latch, lo_strobe, lo_latch] = bytes;
    let is_pair = |strobe: u8, latch: u8| strobe & ENABLE != 0 && latch == strobe & !ENABLE;
    if !is_pair(hi_strobe, hi_latch) || !is_pair(lo_strobe, lo_latch) {
        return None;
    }
    let rs = hi_strobe & REGISTER_SELECT;
    if bytes.iter().any(|b| b & REGISTER_SELECT != rs) {
        return None;
    }
    let register = if rs == 0 {
        Register::Command
    } else {
        Register::Data
    };
    Some(((hi_latch & 0xF0) | (lo_latch >> 4), register))
}

/// Set-DDRAM-address command for a (column, row) position, clamped to the screen.
pub fn cursor_address(column: i32, row: i32) -> u8 {
    let column = column.clamp(0, LCD_COLUMNS as i32 - 1) as u8;
    let row_offset = if row.clamp(0, LCD_ROWS as i32 - 1) == 0 {
        0
    } else {
        SECOND_LINE_OFFSET
    };
    CMD_SET_DDRAM_ADDRESS + row_offset + column
}

/// HD44780 driver speaking over a [`BusTransport`].
pub struct Lcd1602<BUS, CLOCK> {
    bus: BUS,
    clock: CLOCK,
    address: u8,
    backlight: bool,
    degraded: bool,
}

impl<BUS, CLOCK> Lcd1602<BUS, CLOCK>
where
    BUS: BusTransport,
    CLOCK: Clock,
{
    /// Create a driver. Nothing is sent until [`Lcd1602::initialize`].
    pub fn new(bus: BUS, clock: CLOCK, address: u8, backlight: bool) -> Self {
        Self {
            bus,
            clock,
            address,
            backlight,
            degraded: false,
        }
    }

    /// True once a transport failure has switched the driver off.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Bring the controller from its unknown power-on state into 4-bit,
    /// two-line mode with a cleared screen.
    ///
    /// Returns `false` (and degrades the driver) on any transport failure.
    pub fn initialize(&mut self) -> bool {
        match self.power_on_sequence() {
            Ok(()) => {
                self.degraded = false;
                info!("LCD initialized at {:#04x}", self.address);
                true
            }
            Err(e) => {
                warn!("LCD initialization error: {}", e);
                self.degraded = true;
                false
            }
        }
    }

    fn power_on_sequence(&mut self) -> Result<(), TransportError> {
        let steps = [
            INIT_WAKE,
            INIT_ENTER_4BIT,
            CMD_FUNCTION_SET_4BIT_2LINE,
            CMD_DISPLAY_ON_CURSOR_OFF,
            CMD_CLEAR,
        ];
        for command in steps {
            self.send_command(command)?;
            self.clock.sleep(INIT_SETTLE);
        }
        self.send_command(CMD_ENTRY_MODE_INCREMENT)?;
        // Leave the port idle with only the backlight bit driven
        self.write_word(0x00)
    }

    /// Send one command byte.
    pub fn send_command(&mut self, code: u8) -> Result<(), TransportError> {
        self.send(code, Register::Command)
    }

    /// Send one character code.
    pub fn send_data(&mut self, code: u8) -> Result<(), TransportError> {
        self.send(code, Register::Data)
    }

    fn send(&mut self, value: u8, register: Register) -> Result<(), TransportError> {
        let [hi_strobe, hi_latch, lo_strobe, lo_latch] =
            encode_nibbles(value, register, self.backlight);
        self.bus.write_byte(self.address, hi_strobe)?;
        self.clock.sleep(STROBE_SETTLE);
        self.bus.write_byte(self.address, hi_latch)?;
        self.bus.write_byte(self.address, lo_strobe)?;
        self.clock.sleep(STROBE_SETTLE);
        self.bus.write_byte(self.address, lo_latch)
    }

    fn write_word(&mut self, byte: u8) -> Result<(), TransportError> {
        let byte = apply_backlight(byte, self.backlight);
        self.bus.write_byte(self.address, byte)
    }

    /// Clear the screen and home the cursor.
    pub fn clear(&mut self) {
        if self.degraded {
            return;
        }
        let result = self.send_command(CMD_CLEAR);
        self.note_failure(result);
    }

    /// Write `text` starting at (column, row); both are clamped to the screen.
    ///
    /// Characters past the last column are dropped and anything outside
    /// printable ASCII is shown as `?`.
    pub fn write_at(&mut self, column: i32, row: i32, text: &str) {
        if self.degraded {
            return;
        }
        let result = self.try_write_at(column, row, text);
        self.note_failure(result);
    }

    fn try_write_at(&mut self, column: i32, row: i32, text: &str) -> Result<(), TransportError> {
        let address = cursor_address(column, row);
        self.send_command(address)?;
        let start = usize::from(address & 0x0F);
        for ch in text.chars().take(LCD_COLUMNS - start) {
            let code = if ch.is_ascii() && !ch.is_ascii_control() {
                ch as u8
            } else {
                b'?'
            };
            self.send_data(code)?;
        }
        Ok(())
    }

    /// Replace the whole screen with two lines of text.
    pub fn render_status(&mut self, line1: &str, line2: &str) {
        if self.degraded {
            return;
        }
        debug!(line1, line2, "LCD render");
        self.clear();
        self.write_at(0, 0, line1);
        self.write_at(0, 1, line2);
    }

    fn note_failure(&mut self, result: Result<(), TransportError>) {
        if let Err(e) = result {
            warn!("LCD write failed, display disabled: {}", e);
            self.degraded = true;
        }
    }
}

/// Character contents of the two display lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayBuffer {
    lines: [[u8; LCD_COLUMNS]; LCD_ROWS],
}

impl DisplayBuffer {
    pub fn new() -> Self {
        Self {
            lines: [[b' '; LCD_COLUMNS]; LCD_ROWS],
        }
    }

    pub fn clear(&mut self) {
        self.lines = [[b' '; LCD_COLUMNS]; LCD_ROWS];
    }

    /// Store a character; out-of-range positions are ignored.
    pub fn put(&mut self, column: usize, row: usize, code: u8) {
        if let Some(cell) = self.lines.get_mut(row).and_then(|l| l.get_mut(column)) {
            *cell = code;
        }
    }

    /// Full 16-character line, padded with spaces
    pub fn line(&self, row: usize) -> String {
        self.lines
            .get(row)
            .map(|l| l.iter().map(|&b| b as char).collect())
            .unwrap_or_default()
    }

    /// Line text without trailing padding
    pub fn text(&self, row: usize) -> String {
        self.line(row).trim_end().to_string()
    }
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DisplayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border = "-".repeat(LCD_COLUMNS);
        writeln!(f, "+{}+", border)?;
        for row in 0..LCD_ROWS {
            writeln!(f, "|{}|", self.line(row))?;
        }
        write!(f, "+{}+", border)
    }
}
