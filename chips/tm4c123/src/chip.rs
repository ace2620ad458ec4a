// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Peripheral set for the TM4C123 and exception routing.

use crate::nvic::Nvic;
use crate::scb::{Exception, Scb};
use crate::systick::SysTick;

pub struct Tm4c123DefaultPeripherals<'a> {
    pub nvic: Nvic<'a>,
    pub scb: Scb<'a>,
    pub systick: SysTick<'a>,
}

impl Tm4c123DefaultPeripherals<'static> {
    /// Creates the drivers for the chip's NVIC, SCB and SysTick.
    ///
    /// Marked unsafe because the drivers alias fixed MMIO addresses; the
    /// board must create this once. The set holds `Cell`s and is not `Sync`,
    /// so boards keep it in `static_init!`-style storage (a `static mut`
    /// buffer handed out once as `&'static`), not in a plain `static`.
    pub unsafe fn new() -> Self {
        Self {
            nvic: Nvic::new(),
            scb: Scb::new(),
            systick: SysTick::new(),
        }
    }
}

impl<'a> Tm4c123DefaultPeripherals<'a> {
    pub fn with_peripherals(nvic: Nvic<'a>, scb: Scb<'a>, systick: SysTick<'a>) -> Self {
        Self { nvic, scb, systick }
    }

    /// Service a system exception by number. Returns `false` if no driver in
    /// this set handles it.
    pub fn service_exception(&self, number: u32) -> bool {
        match Exception::from_number(number) {
            Some(Exception::SysTick) => self.systick.handle_interrupt(),
            _ => {
                log::debug!("tm4c123: exception {} not serviced", number);
                return false;
            }
        }
        true
    }
}
