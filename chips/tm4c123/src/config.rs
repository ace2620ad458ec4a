// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Compile-time configuration for the TM4C123 drivers.
//!
//! Configuration is a typed `const` object rather than a set of `#[cfg]`
//! gates, so every code path is type-checked even when it is switched off and
//! the disabled branches are folded away by the compiler. The boolean values
//! can be flipped from a board crate through the cargo features of the same
//! name.

/// Data structure holding compile-time configuration options.
pub(crate) struct Config {
    /// Whether every register update made by a driver is logged at `trace`
    /// level, with the register and the value involved.
    pub(crate) trace_register_writes: bool,

    /// Whether requests that are dropped (interrupt numbers past the last
    /// line, exceptions that cannot be disabled, reload values that do not
    /// fit in 24 bits) are reported at `warn` level.
    ///
    /// The drivers never fail these requests; this only makes them visible.
    pub(crate) warn_on_ignored_input: bool,

    /// SysTick ticks per second used by `SysTick::new()`.
    ///
    /// The TM4C123 runs from the 16 MHz precision oscillator after reset and
    /// SysTick is clocked from the system clock, so a full second is
    /// 15_999_999 reload counts.
    pub(crate) systick_ticks_per_second: u32,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub(crate) const CONFIG: Config = Config {
    trace_register_writes: cfg!(feature = "trace_register_writes"),
    warn_on_ignored_input: !cfg!(feature = "no_warn_ignored_input"),
    systick_ticks_per_second: 15_999_999,
};

#[cfg(test)]
mod tests {
    use super::CONFIG;

    #[test]
    fn features_only_flip_config_values() {
        assert_eq!(
            CONFIG.trace_register_writes,
            cfg!(feature = "trace_register_writes")
        );
        assert_eq!(
            CONFIG.warn_on_ignored_input,
            !cfg!(feature = "no_warn_ignored_input")
        );
        assert_eq!(CONFIG.systick_ticks_per_second, 15_999_999);
    }
}
