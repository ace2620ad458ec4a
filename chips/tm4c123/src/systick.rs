// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! ARM Cortex-M SysTick peripheral, as configured on the TM4C123.
//!
//! The timer counts down from the reload value at the system clock rate and
//! raises COUNT (and, with INTEN set, the SysTick exception) each time it
//! wraps. Two modes share the same three registers:
//!
//!  - interrupt mode ([`SysTick::init_periodic`]): the exception fires every
//!    period and the chip's exception servicing calls
//!    [`SysTick::handle_interrupt`], which runs the registered callback;
//!  - polling mode ([`SysTick::start_busy_wait`]): the interrupt is masked and
//!    the caller spins on COUNT for one period.
//!
//! Arming one mode overwrites the configuration of the other.
//!
//! Documented in the Cortex-M4 Devices Generic User Guide, section 4.4, and
//! the TM4C123GH6PM datasheet, section 3.3.

use core::cell::Cell;

use tock_registers::fields::FieldValue;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

use crate::config::CONFIG;
use crate::ErrorCode;

register_structs! {
    /// SysTick registers. The calibration register that follows STCURRENT is
    /// not used by this driver.
    pub SysTickRegisters {
        /// SysTick Control and Status Register
        (0x0 => stctrl: ReadWrite<u32, Control::Register>),

        /// SysTick Reload Value Register
        (0x4 => streload: ReadWrite<u32, Reload::Register>),

        /// SysTick Current Value Register
        (0x8 => stcurrent: ReadWrite<u32, Current::Register>),

        (0xc => @END),
    }
}

register_bitfields![u32,
    Control [
        /// Returns 1 if timer counted to 0 since last time this was read.
        /// Reading STCTRL clears it.
        COUNT           OFFSET(16)  NUMBITS(1) [],

        /// Clock source is (0) PIOSC / 4 or (1) the system clock.
        CLK_SRC         OFFSET(2)   NUMBITS(1) [],

        /// Set to 1 to enable the SysTick exception request.
        INTEN           OFFSET(1)   NUMBITS(1) [],

        /// Enable the counter (1 == Enabled).
        ENABLE          OFFSET(0)   NUMBITS(1) []
    ],

    Reload [
        /// Value loaded into STCURRENT when the counter reaches 0.
        RELOAD          OFFSET(0)   NUMBITS(24) []
    ],

    Current [
        /// Reads current value. Write of any value sets to 0.
        CURRENT         OFFSET(0)   NUMBITS(24) []
    ]
];

const SYSTICK_BASE: *const SysTickRegisters = 0xE000_E010 as *const SysTickRegisters;

/// Largest value the 24-bit reload field holds.
pub const MAX_RELOAD: u32 = 0x00ff_ffff;

/// Receives SysTick expiries in interrupt mode.
///
/// Any `Fn()` is a client, so a plain function or a closure can be
/// registered once it is bound to a `&dyn SysTickClient`.
pub trait SysTickClient {
    /// Called once per expiry from [`SysTick::handle_interrupt`].
    fn fired(&self);
}

impl<F: Fn()> SysTickClient for F {
    fn fired(&self) {
        self()
    }
}

/// Reference to a registered client.
///
/// `&dyn SysTickClient` is two words wide, so the slot holds a thin reference
/// to one. `Option` of it is a single word, and replacing it is a single
/// store that an exception preempting `set_callback` sees either before or
/// after, never half written.
pub type ClientRef<'a> = &'a &'a dyn SysTickClient;

/// The SysTick timer together with the callback it dispatches to.
///
/// The callback lives in this object instead of in a global.
pub struct SysTick<'a> {
    registers: &'a SysTickRegisters,
    ticks_per_second: u32,
    client: Cell<Option<ClientRef<'a>>>,
}

impl SysTick<'static> {
    /// Creates the driver for the chip's SysTick, clocked at the default
    /// system clock rate.
    ///
    /// Marked unsafe because only chip/platform configuration code should
    /// create it, and only once.
    pub unsafe fn new() -> Self {
        SysTick::new_with_clock(CONFIG.systick_ticks_per_second)
    }

    /// Creates the driver for the chip's SysTick with an explicit tick rate.
    ///
    ///   * `ticks_per_second` - reload counts in one second. If SysTick is
    ///   driven by the system clock, this is the CPU frequency minus one.
    pub unsafe fn new_with_clock(ticks_per_second: u32) -> Self {
        SysTick::with_registers(&*SYSTICK_BASE, ticks_per_second)
    }
}

impl<'a> SysTick<'a> {
    pub const fn with_registers(registers: &'a SysTickRegisters, ticks_per_second: u32) -> Self {
        SysTick {
            registers,
            ticks_per_second,
            client: Cell::new(None),
        }
    }

    /// Reload counts per millisecond. Integer division, so a 15_999_999 Hz
    /// tick rate gives 15_999.
    pub fn ticks_per_ms(&self) -> u32 {
        self.ticks_per_second / 1000
    }

    /// Reload value for `period_ms`, before it is truncated to 24 bits.
    fn reload_for(&self, period_ms: u16) -> u32 {
        u32::from(period_ms).wrapping_mul(self.ticks_per_ms())
    }

    /// Stop, reprogram and restart the counter with `mode` OR-ed into
    /// STCTRL.
    fn configure(&self, period_ms: u16, mode: FieldValue<u32, Control::Register>) {
        let reload = self.reload_for(period_ms);
        if reload > MAX_RELOAD && CONFIG.warn_on_ignored_input {
            log::warn!(
                "systick: {} ms needs reload {:#x}, wider than 24 bits; period wraps",
                period_ms,
                reload
            );
        }

        self.registers.stctrl.set(0);
        self.registers.streload.write(Reload::RELOAD.val(reload));
        self.registers.stcurrent.set(0);
        self.registers.stctrl.modify(mode);
        self.start();

        if CONFIG.trace_register_writes {
            log::trace!(
                "systick: STRELOAD <- {:#x}, STCTRL <- {:#x}",
                self.registers.streload.get(),
                self.registers.stctrl.get()
            );
        }
    }

    /// Arm the timer in interrupt mode with a period of `period_ms`.
    ///
    /// The reload value is `period_ms * ticks_per_ms()`. It is not range
    /// checked: anything above [`MAX_RELOAD`] keeps only its low 24 bits and
    /// yields a shorter period. See [`SysTick::checked_init_periodic`].
    pub fn init_periodic(&self, period_ms: u16) {
        self.configure(period_ms, Control::INTEN::SET + Control::CLK_SRC::SET);
    }

    /// Like [`SysTick::init_periodic`], but refuses a period whose reload
    /// value does not fit in 24 bits. The registers are left untouched in
    /// that case.
    pub fn checked_init_periodic(&self, period_ms: u16) -> Result<(), ErrorCode> {
        let reload = u64::from(period_ms) * u64::from(self.ticks_per_ms());
        if reload > u64::from(MAX_RELOAD) {
            return Err(ErrorCode::SIZE);
        }
        self.init_periodic(period_ms);
        Ok(())
    }

    /// Arm the timer in polling mode with a period of `period_ms`, without
    /// waiting for it.
    pub fn configure_polling(&self, period_ms: u16) {
        self.configure(period_ms, Control::INTEN::CLEAR + Control::CLK_SRC::SET);
    }

    /// Block until COUNT reads as set.
    ///
    /// This spins with no timeout and no yield point. Reading STCTRL clears
    /// COUNT, so each call waits for a fresh expiry (or consumes one that
    /// happened since the last read).
    pub fn wait_for_count(&self) {
        while !self.registers.stctrl.is_set(Control::COUNT) {
            core::hint::spin_loop();
        }
    }

    /// Arm the timer in polling mode and block the caller for one period of
    /// `period_ms`.
    pub fn start_busy_wait(&self, period_ms: u16) {
        self.configure_polling(period_ms);
        self.wait_for_count();
    }

    /// Register the callback run on every expiry, replacing any previous one.
    /// `None` stops dispatching without stopping the timer.
    ///
    /// ```ignore
    /// fn tick() { /* ... */ }
    /// let client: &dyn SysTickClient = &tick;
    /// systick.set_callback(Some(&client));
    /// ```
    pub fn set_callback(&self, client: Option<ClientRef<'a>>) {
        self.client.set(client);
    }

    /// Service a SysTick exception: run the callback, if any.
    pub fn handle_interrupt(&self) {
        self.client.get().map(|client| client.fired());
    }

    /// Resume counting with the current reload and control configuration.
    pub fn start(&self) {
        self.registers.stctrl.modify(Control::ENABLE::SET);
    }

    /// Pause counting. Reload value and current count are kept.
    pub fn stop(&self) {
        self.registers.stctrl.modify(Control::ENABLE::CLEAR);
    }

    /// Return to the idle state by zeroing STCTRL and STCURRENT.
    ///
    /// STRELOAD is left as it was, so a later [`SysTick::start`] without a new
    /// init counts the old period, with the interrupt masked and on the
    /// PIOSC / 4 clock.
    pub fn deinit(&self) {
        self.registers.stctrl.set(0);
        self.registers.stcurrent.set(0);
        if CONFIG.trace_register_writes {
            log::trace!("systick: deinit");
        }
    }

    pub fn reload_value(&self) -> u32 {
        self.registers.streload.read(Reload::RELOAD)
    }

    pub fn current_value(&self) -> u32 {
        self.registers.stcurrent.read(Current::CURRENT)
    }

    pub fn is_enabled(&self) -> bool {
        self.registers.stctrl.is_set(Control::ENABLE)
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.registers.stctrl.is_set(Control::INTEN)
    }

    /// Whether the counter reached 0 since STCTRL was last read. The read
    /// itself clears the flag.
    pub fn has_expired(&self) -> bool {
        self.registers.stctrl.is_set(Control::COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKS_PER_SECOND: u32 = 15_999_999;

    fn registers() -> SysTickRegisters {
        unsafe { core::mem::zeroed() }
    }

    #[test]
    fn init_periodic_programs_reload_and_control() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);
        regs.stcurrent.set(1234);

        systick.init_periodic(100);

        assert_eq!(regs.streload.get(), 1_599_900);
        assert_eq!(regs.stcurrent.get(), 0);
        assert_eq!(regs.stctrl.get(), 0b111);
        assert!(systick.is_enabled());
        assert!(systick.interrupt_enabled());
    }

    #[test]
    fn init_periodic_clears_previous_control_bits() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);
        regs.stctrl.set(1 << 16);

        systick.init_periodic(1);

        assert_eq!(regs.stctrl.get(), 0b111);
        assert_eq!(regs.streload.get(), 15_999);
    }

    #[test]
    fn oversized_period_wraps_to_24_bits() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);

        systick.init_periodic(2000);

        assert_eq!(regs.streload.get(), (2000 * 15_999) & MAX_RELOAD);
    }

    #[test]
    fn checked_init_periodic_rejects_oversized_period() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);

        assert_eq!(systick.checked_init_periodic(2000), Err(ErrorCode::SIZE));
        assert_eq!(regs.stctrl.get(), 0);
        assert_eq!(regs.streload.get(), 0);

        // 1048 ms is the longest period that fits at 16 MHz.
        assert_eq!(systick.checked_init_periodic(1048), Ok(()));
        assert_eq!(regs.streload.get(), 1048 * 15_999);
        assert_eq!(systick.checked_init_periodic(1049), Err(ErrorCode::SIZE));
    }

    #[test]
    fn polling_mode_leaves_interrupt_masked() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);
        systick.init_periodic(10);

        systick.configure_polling(10);

        assert_eq!(regs.stctrl.get(), 0b101);
        assert_eq!(regs.streload.get(), 159_990);
        assert_eq!(regs.stcurrent.get(), 0);
        assert!(!systick.interrupt_enabled());
    }

    #[test]
    fn wait_for_count_returns_once_count_is_set() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);
        systick.configure_polling(5);
        regs.stctrl.set(regs.stctrl.get() | (1 << 16));

        systick.wait_for_count();

        assert!(systick.has_expired());
    }

    #[test]
    fn callback_runs_once_per_interrupt() {
        let regs = registers();
        let fired = Cell::new(0);
        let callback = || fired.set(fired.get() + 1);
        let client: &dyn SysTickClient = &callback;
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);

        systick.handle_interrupt();
        assert_eq!(fired.get(), 0);

        systick.set_callback(Some(&client));
        systick.handle_interrupt();
        assert_eq!(fired.get(), 1);
        systick.handle_interrupt();
        assert_eq!(fired.get(), 2);

        systick.set_callback(None);
        systick.handle_interrupt();
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn later_callback_replaces_earlier_one() {
        let regs = registers();
        let first = Cell::new(0);
        let second = Cell::new(0);
        let first_callback = || first.set(first.get() + 1);
        let second_callback = || second.set(second.get() + 1);
        let first_client: &dyn SysTickClient = &first_callback;
        let second_client: &dyn SysTickClient = &second_callback;
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);

        systick.set_callback(Some(&first_client));
        systick.set_callback(Some(&second_client));
        systick.handle_interrupt();

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn clearing_callback_keeps_timer_running() {
        let regs = registers();
        let callback = || {};
        let client: &dyn SysTickClient = &callback;
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);
        systick.init_periodic(100);
        systick.set_callback(Some(&client));

        systick.set_callback(None);

        assert_eq!(regs.stctrl.get(), 0b111);
    }

    #[test]
    fn stop_and_start_keep_reload() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);
        systick.init_periodic(100);
        regs.stcurrent.set(42);

        systick.stop();
        assert_eq!(regs.stctrl.get(), 0b110);
        assert_eq!(regs.streload.get(), 1_599_900);
        assert_eq!(systick.current_value(), 42);

        systick.start();
        assert_eq!(regs.stctrl.get(), 0b111);
        assert_eq!(systick.reload_value(), 1_599_900);
        assert_eq!(systick.current_value(), 42);
    }

    #[test]
    fn deinit_keeps_reload() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);
        systick.init_periodic(100);
        regs.stcurrent.set(42);

        systick.deinit();
        assert_eq!(regs.stctrl.get(), 0);
        assert_eq!(regs.stcurrent.get(), 0);
        assert_eq!(regs.streload.get(), 1_599_900);

        // Restarting without a new init only sets ENABLE.
        systick.start();
        assert_eq!(regs.stctrl.get(), 0b001);
        assert!(!systick.interrupt_enabled());
    }

    #[test]
    fn start_after_deinit_without_any_init_uses_zero_reload() {
        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);

        systick.deinit();
        systick.start();

        assert_eq!(systick.reload_value(), 0);
        assert!(systick.is_enabled());
    }

    #[test]
    fn plain_function_is_a_client() {
        use core::sync::atomic::{AtomicUsize, Ordering};

        static FIRED: AtomicUsize = AtomicUsize::new(0);
        fn tick() {
            FIRED.fetch_add(1, Ordering::Relaxed);
        }
        let client: &dyn SysTickClient = &tick;

        let regs = registers();
        let systick = SysTick::with_registers(&regs, TICKS_PER_SECOND);
        systick.set_callback(Some(&client));
        systick.handle_interrupt();

        assert_eq!(FIRED.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn callback_slot_is_one_word() {
        assert_eq!(
            core::mem::size_of::<Cell<Option<ClientRef<'static>>>>(),
            core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn ticks_per_ms_truncates() {
        let regs = registers();
        assert_eq!(SysTick::with_registers(&regs, TICKS_PER_SECOND).ticks_per_ms(), 15_999);
        assert_eq!(SysTick::with_registers(&regs, 80_000_000).ticks_per_ms(), 80_000);
    }
}
