// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! System handler configuration in the System Control Block.
//!
//! The configurable system exceptions are prioritized through SYSPRI1-3 and
//! the three fault exceptions are switched on and off through SYSHNDCTRL.
//! Reset, NMI and HardFault have fixed priorities and are not listed.

use tock_registers::interfaces::{ReadWriteable, Readable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

use crate::config::CONFIG;
use crate::ErrorCode;

register_structs! {
    /// System handler registers, starting at SYSPRI1.
    pub ScbRegisters {
        /// System Handler Priority 1
        (0x00 => syspri1: ReadWrite<u32, SystemPriority1::Register>),

        /// System Handler Priority 2
        (0x04 => syspri2: ReadWrite<u32, SystemPriority2::Register>),

        /// System Handler Priority 3
        (0x08 => syspri3: ReadWrite<u32, SystemPriority3::Register>),

        /// System Handler Control and State
        (0x0c => syshndctrl: ReadWrite<u32, SystemHandlerControl::Register>),

        (0x10 => @END),
    }
}

register_bitfields![u32,
    SystemPriority1 [
        /// Usage Fault Priority
        USAGE           OFFSET(21)  NUMBITS(3) [],

        /// Bus Fault Priority
        BUS             OFFSET(13)  NUMBITS(3) [],

        /// Memory Management Fault Priority
        MEM             OFFSET(5)   NUMBITS(3) []
    ],

    SystemPriority2 [
        /// SVCall Priority
        SVC             OFFSET(29)  NUMBITS(3) []
    ],

    SystemPriority3 [
        /// SysTick Exception Priority
        TICK            OFFSET(29)  NUMBITS(3) [],

        /// PendSV Priority
        PENDSV          OFFSET(21)  NUMBITS(3) [],

        /// Debug Priority
        DEBUG           OFFSET(5)   NUMBITS(3) []
    ],

    SystemHandlerControl [
        /// Usage Fault Enable
        USAGE           OFFSET(18)  NUMBITS(1) [],

        /// Bus Fault Enable
        BUS             OFFSET(17)  NUMBITS(1) [],

        /// Memory Management Fault Enable
        MEM             OFFSET(16)  NUMBITS(1) []
    ]
];

/// Address of SYSPRI1.
const SCB_BASE: *const ScbRegisters = 0xE000_ED18 as *const ScbRegisters;

/// System exceptions with a configurable priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exception {
    MemoryManagement,
    BusFault,
    UsageFault,
    SupervisorCall,
    DebugMonitor,
    PendSV,
    SysTick,
}

impl Exception {
    pub const ALL: [Exception; 7] = [
        Exception::MemoryManagement,
        Exception::BusFault,
        Exception::UsageFault,
        Exception::SupervisorCall,
        Exception::DebugMonitor,
        Exception::PendSV,
        Exception::SysTick,
    ];

    /// Exception number, as found in IPSR and as the vector table index.
    pub const fn number(self) -> u32 {
        match self {
            Exception::MemoryManagement => 4,
            Exception::BusFault => 5,
            Exception::UsageFault => 6,
            Exception::SupervisorCall => 11,
            Exception::DebugMonitor => 12,
            Exception::PendSV => 14,
            Exception::SysTick => 15,
        }
    }

    pub fn from_number(number: u32) -> Option<Exception> {
        Exception::ALL
            .iter()
            .copied()
            .find(|exception| exception.number() == number)
    }

    /// Whether the exception can be switched off through SYSHNDCTRL.
    pub const fn is_fault(self) -> bool {
        matches!(
            self,
            Exception::MemoryManagement | Exception::BusFault | Exception::UsageFault
        )
    }
}

/// Driver for the system handler registers.
pub struct Scb<'a> {
    registers: &'a ScbRegisters,
}

impl Scb<'static> {
    /// Creates the driver for the chip's SCB.
    ///
    /// Marked unsafe because only chip/platform configuration code should
    /// create it, and only once.
    pub unsafe fn new() -> Self {
        Scb::with_registers(&*SCB_BASE)
    }
}

impl<'a> Scb<'a> {
    pub const fn with_registers(registers: &'a ScbRegisters) -> Self {
        Scb { registers }
    }

    /// Enable a fault exception. Other exceptions are always enabled and
    /// are left alone.
    pub fn enable_exception(&self, exception: Exception) {
        self.update_enable(exception, 1);
    }

    /// Disable a fault exception. Other exceptions cannot be disabled and
    /// are left alone.
    pub fn disable_exception(&self, exception: Exception) {
        self.update_enable(exception, 0);
    }

    /// Like [`Scb::disable_exception`], but reports `NOSUPPORT` for an
    /// exception that cannot be disabled.
    pub fn checked_disable_exception(&self, exception: Exception) -> Result<(), ErrorCode> {
        if !exception.is_fault() {
            return Err(ErrorCode::NOSUPPORT);
        }
        self.disable_exception(exception);
        Ok(())
    }

    /// Set the priority of `exception`, truncated to three bits.
    ///
    /// Each exception's field is updated in the register that holds it;
    /// every other bit of that register is preserved.
    pub fn set_exception_priority(&self, exception: Exception, priority: u8) {
        let priority = u32::from(priority);
        let regs = self.registers;
        match exception {
            Exception::MemoryManagement => regs.syspri1.modify(SystemPriority1::MEM.val(priority)),
            Exception::BusFault => regs.syspri1.modify(SystemPriority1::BUS.val(priority)),
            Exception::UsageFault => regs.syspri1.modify(SystemPriority1::USAGE.val(priority)),
            Exception::SupervisorCall => regs.syspri2.modify(SystemPriority2::SVC.val(priority)),
            Exception::DebugMonitor => regs.syspri3.modify(SystemPriority3::DEBUG.val(priority)),
            Exception::PendSV => regs.syspri3.modify(SystemPriority3::PENDSV.val(priority)),
            Exception::SysTick => regs.syspri3.modify(SystemPriority3::TICK.val(priority)),
        }
        if CONFIG.trace_register_writes {
            log::trace!(
                "scb: {:?} priority {} (SYSPRI1 {:#010x} SYSPRI2 {:#010x} SYSPRI3 {:#010x})",
                exception,
                priority,
                regs.syspri1.get(),
                regs.syspri2.get(),
                regs.syspri3.get()
            );
        }
    }

    pub fn exception_priority(&self, exception: Exception) -> u8 {
        let regs = self.registers;
        let priority = match exception {
            Exception::MemoryManagement => regs.syspri1.read(SystemPriority1::MEM),
            Exception::BusFault => regs.syspri1.read(SystemPriority1::BUS),
            Exception::UsageFault => regs.syspri1.read(SystemPriority1::USAGE),
            Exception::SupervisorCall => regs.syspri2.read(SystemPriority2::SVC),
            Exception::DebugMonitor => regs.syspri3.read(SystemPriority3::DEBUG),
            Exception::PendSV => regs.syspri3.read(SystemPriority3::PENDSV),
            Exception::SysTick => regs.syspri3.read(SystemPriority3::TICK),
        };
        priority as u8
    }

    /// Whether `exception` will be taken. Non-fault exceptions are always
    /// enabled.
    pub fn is_exception_enabled(&self, exception: Exception) -> bool {
        let ctrl = &self.registers.syshndctrl;
        match exception {
            Exception::MemoryManagement => ctrl.is_set(SystemHandlerControl::MEM),
            Exception::BusFault => ctrl.is_set(SystemHandlerControl::BUS),
            Exception::UsageFault => ctrl.is_set(SystemHandlerControl::USAGE),
            _ => true,
        }
    }

    fn update_enable(&self, exception: Exception, value: u32) {
        let ctrl = &self.registers.syshndctrl;
        match exception {
            Exception::MemoryManagement => ctrl.modify(SystemHandlerControl::MEM.val(value)),
            Exception::BusFault => ctrl.modify(SystemHandlerControl::BUS.val(value)),
            Exception::UsageFault => ctrl.modify(SystemHandlerControl::USAGE.val(value)),
            _ => {
                if CONFIG.warn_on_ignored_input {
                    log::warn!("scb: {:?} is always enabled, request ignored", exception);
                }
                return;
            }
        }
        if CONFIG.trace_register_writes {
            log::trace!("scb: SYSHNDCTRL <- {:#010x}", ctrl.get());
        }
    }
}
