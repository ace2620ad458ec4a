// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Peripheral drivers for the TI TM4C123GH6PM (Cortex-M4F).
//!
//! This crate covers the two core peripherals a board needs before anything
//! else: the NVIC (interrupt line enable and priority), the system handler
//! part of the SCB (fault enables and exception priorities), and the SysTick
//! countdown timer.
//!
//! Every driver holds a reference to its register block. The `new()`
//! constructors bind to the fixed MMIO addresses of the chip; the
//! `with_registers()` constructors accept any block with the same layout,
//! which is how the unit tests exercise the drivers on the host.

#![cfg_attr(not(test), no_std)]

pub mod chip;
pub mod interrupts;
pub mod nvic;
pub mod scb;
pub mod systick;

mod config;
mod errorcode;

pub use crate::errorcode::ErrorCode;
