//! # Trash Monitor Application Entry Point
//!
//! Wires the drivers to either the Raspberry Pi hardware (feature `hardware`)
//! or the simulated bin (`--simulate`) and runs the fill monitor until Ctrl+C.

use std::env;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trash_monitor_lib::config::Config;
use trash_monitor_lib::monitor::Shutdown;

/// Convert a BCM GPIO number to its physical header pin for the wiring log
fn bcm_to_board(gpio: u8) -> u8 {
    match gpio {
        17 => 11,
        27 => 13,
        23 => 16,
        24 => 18,
        13 => 33,
        19 => 35,
        5 => 29,
        6 => 31,
        12 => 32,
        26 => 37,
        _ => 0, // Unknown
    }
}

fn log_wiring(config: &Config) {
    let pins = &config.pins;
    info!("GPIO pin configuration (BCM / board):");
    for (role, gpio) in [
        ("Sensor trigger", pins.trigger),
        ("Sensor echo", pins.echo),
        ("Red LED", pins.red_led),
        ("Green LED", pins.green_led),
        ("Buzzer", pins.buzzer),
        ("Button", pins.button),
    ] {
        info!("   {}: GPIO {} (Pin {})", role, gpio, bcm_to_board(gpio));
    }
    info!(
        "   LCD: {} at {:#04x}",
        config.display.i2c_device, config.display.address
    );
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
fn run_hardware(config: &Config, shutdown: Shutdown) -> anyhow::Result<()> {
    use anyhow::Context;
    use trash_monitor_lib::alarm::AlarmActuator;
    use trash_monitor_lib::clock::SystemClock;
    use trash_monitor_lib::hardware::HardwareRig;
    use trash_monitor_lib::lcd::Lcd1602;
    use trash_monitor_lib::monitor::FillMonitor;
    use trash_monitor_lib::ranging::HcSr04;
    use trash_monitor_lib::sampling::SamplingEngine;

    let rig = HardwareRig::open(config).context("claim GPIO and I2C")?;
    let clock = SystemClock::new();

    let mut lcd = Lcd1602::new(
        rig.bus,
        clock,
        config.display.address,
        config.display.backlight,
    );
    if !lcd.initialize() {
        warn!("LCD not responding, continuing without display");
    }

    let sensor = HcSr04::new(rig.trigger, rig.echo, clock);
    let alarm = AlarmActuator::new(rig.red_led, rig.green_led, rig.buzzer, rig.button);
    let mut monitor = FillMonitor::new(
        lcd,
        SamplingEngine::new(sensor, clock),
        alarm,
        clock,
        shutdown,
    );
    monitor.run()?;
    Ok(())
}

/// Run against a simulated bin that fills a little with every ping and is
/// emptied by a virtual user a few seconds after each alarm.
fn run_simulated(config: &Config, shutdown: Shutdown) -> anyhow::Result<()> {
    use trash_monitor_lib::alarm::AlarmActuator;
    use trash_monitor_lib::clock::SystemClock;
    use trash_monitor_lib::lcd::Lcd1602;
    use trash_monitor_lib::monitor::FillMonitor;
    use trash_monitor_lib::ranging::HcSr04;
    use trash_monitor_lib::sampling::SamplingEngine;
    use trash_monitor_lib::sim::{SimButton, SimBuzzer, SimLcd, SimLed, SimSonar};

    let clock = SystemClock::new();
    let sonar = SimSonar::filling(clock, 31.0, 0.4, 3.0);

    let button = SimButton::new();
    button.press_after_polls(30);
    let emptied = sonar.clone();
    button.on_press(move || {
        info!("Simulated user empties the bin");
        emptied.empty();
    });

    let mut lcd = Lcd1602::new(
        SimLcd::new(config.display.address),
        clock,
        config.display.address,
        config.display.backlight,
    );
    if !lcd.initialize() {
        warn!("Simulated LCD not responding, continuing without display");
    }

    let sensor = HcSr04::new(sonar.trigger(), sonar.echo(), clock);
    let alarm = AlarmActuator::new(SimLed::new(), SimLed::new(), SimBuzzer::new(), button);
    let mut monitor = FillMonitor::new(
        lcd,
        SamplingEngine::new(sensor, clock),
        alarm,
        clock,
        shutdown,
    );
    monitor.run()?;
    Ok(())
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    let simulate = env::args().any(|arg| arg == "--simulate");

    // Screen frames are logged by the LCD driver at debug level; surface them
    // by default when there is no physical display to look at
    let default_filter = if simulate {
        "info,trash_monitor_lib::lcd=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = Config::load();
    if env::args().any(|arg| arg == "--write-config") {
        config.save()?;
        return Ok(());
    }
    log_wiring(&config);

    // The monitor loop blocks the main thread; the runtime only waits for Ctrl+C
    let shutdown = Shutdown::new();
    let rt = tokio::runtime::Runtime::new()?;
    let on_signal = shutdown.clone();
    rt.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Program interrupted by user");
                on_signal.trigger();
            }
            Err(e) => warn!("Unable to listen for Ctrl+C: {}", e),
        }
    });

    if simulate {
        return run_simulated(&config, shutdown);
    }

    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        return run_hardware(&config, shutdown);
    }

    #[cfg(all(target_os = "linux", not(feature = "hardware")))]
    {
        warn!("GPIO support not enabled. Rebuild with --features hardware, or run with --simulate.");
        #[allow(unreachable_code)]
        return Err(anyhow::anyhow!("hardware support not compiled in"));
    }

    #[cfg(not(target_os = "linux"))]
    {
        warn!("Hardware mode is only available on Linux. Use --simulate for development mode.");
        #[allow(unreachable_code)]
        return Err(anyhow::anyhow!(
            "Hardware mode not supported on this platform"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_wiring_maps_to_header_pins() {
        let pins = Config::default().pins;
        assert_eq!(bcm_to_board(pins.trigger), 16);
        assert_eq!(bcm_to_board(pins.echo), 18);
        assert_eq!(bcm_to_board(pins.red_led), 33);
        assert_eq!(bcm_to_board(pins.green_led), 35);
        assert_eq!(bcm_to_board(pins.buzzer), 11);
        assert_eq!(bcm_to_board(pins.button), 13);
    }

    #[test]
    fn unknown_gpio_maps_to_zero() {
        assert_eq!(bcm_to_board(2), 0);
    }
}
