//! Press-to-talk button input
//!
//! Reads a GPIO line exported through sysfs. Hosts without the line
//! (desktops, CI) get no button and the daemon falls back to
//! silence-gated auto recording.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::ButtonConfig;

/// A boolean "pressed" signal
pub trait PressSignal: Send {
    /// Current debounced state of the signal
    fn is_pressed(&mut self) -> bool;
}

/// Press signal backed by a sysfs GPIO value file
pub struct GpioButton {
    value_path: PathBuf,
    active_low: bool,
    debounce: Duration,
    last_level: bool,
    last_change: Instant,
}

impl GpioButton {
    /// Open the configured GPIO line
    ///
    /// Returns `None` if the line is not exported on this host.
    #[must_use]
    pub fn open(config: &ButtonConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let value_path = PathBuf::from(format!("/sys/class/gpio/gpio{}/value", config.gpio));
        if !value_path.exists() {
            tracing::warn!(
                gpio = config.gpio,
                "GPIO line not available, falling back to auto recording"
            );
            return None;
        }

        tracing::info!(gpio = config.gpio, "press-to-talk button ready");
        Some(Self::at_path(
            value_path,
            config.active_low,
            Duration::from_millis(config.debounce_ms),
        ))
    }

    fn at_path(value_path: PathBuf, active_low: bool, debounce: Duration) -> Self {
        // Backdate the last change so the first press registers
        // without waiting out a debounce window; the monotonic clock
        // may be near its epoch right after boot
        let last_change = Instant::now()
            .checked_sub(debounce)
            .unwrap_or_else(Instant::now);

        Self {
            value_path,
            active_low,
            debounce,
            last_level: false,
            last_change,
        }
    }

    fn read_level(&self) -> Option<bool> {
        let raw = std::fs::read_to_string(&self.value_path).ok()?;
        let high = raw.trim() == "1";
        Some(if self.active_low { !high } else { high })
    }
}

impl PressSignal for GpioButton {
    fn is_pressed(&mut self) -> bool {
        let Some(level) = self.read_level() else {
            return self.last_level;
        };

        // Debounce: ignore level changes inside the debounce window
        if level != self.last_level && self.last_change.elapsed() >= self.debounce {
            self.last_level = level;
            self.last_change = Instant::now();
        }

        self.last_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button_on(
        value: &str,
        active_low: bool,
        debounce: Duration,
    ) -> (GpioButton, tempfile::NamedTempFile) {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), value).unwrap();
        let button = GpioButton::at_path(file.path().to_path_buf(), active_low, debounce);
        (button, file)
    }

    #[test]
    fn first_press_registers_without_a_debounce_delay() {
        // The initial debounce window is backdated, so a press seen on
        // the very first poll (even right after boot) counts
        let (mut button, _file) = button_on("1\n", false, Duration::from_millis(100));
        assert!(button.is_pressed());
    }

    #[test]
    fn active_low_inverts_the_level() {
        let (mut button, file) = button_on("0\n", true, Duration::ZERO);
        assert!(button.is_pressed());

        std::fs::write(file.path(), "1\n").unwrap();
        assert!(!button.is_pressed());
    }

    #[test]
    fn bounce_inside_the_window_is_ignored() {
        let (mut button, file) = button_on("1\n", false, Duration::from_secs(60));
        assert!(button.is_pressed());

        // A flicker right after the press stays within the window
        std::fs::write(file.path(), "0\n").unwrap();
        assert!(button.is_pressed());
    }
}
