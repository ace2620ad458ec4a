// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! TM4C123 NVIC
//!
//! The NVIC registers of the TM4C123GH6PM are described in section 3.4 of the
//! datasheet. Each of the 139 interrupt lines owns:
//!
//!  - one bit in each of the EN, DIS, PEND, UNPEND and ACTIVE banks, at bit
//!    `n % 32` of register `n / 32` (five registers per bank), and
//!  - one byte in the PRI registers, at byte `n % 4` of register `n / 4`. Only
//!    the top three bits of that byte are implemented, so a priority is a
//!    value in `0..=7` with 0 being the most urgent.
//!
//! Line numbers are translated into a register index plus a typed
//! `tock_registers` field by [`bank_bit`] and [`priority_slot`]; the driver
//! itself only ever does read-modify-write updates through those fields.
//!
//! Requests for lines past `NUM_IRQS` are dropped without touching any
//! register. The `checked_*` operations report them instead.

use tock_registers::fields::Field;
use tock_registers::interfaces::{ReadWriteable, Readable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

use crate::config::CONFIG;
use crate::interrupts::NUM_IRQS;
use crate::ErrorCode;

register_structs! {
    /// NVIC registers, starting at EN0.
    pub NvicRegisters {
        /// Interrupt 0-138 Set Enable
        (0x000 => en: [ReadWrite<u32, InterruptBits::Register>; 5]),

        (0x014 => _reserved0),

        /// Interrupt 0-138 Clear Enable
        (0x080 => dis: [ReadWrite<u32, InterruptBits::Register>; 5]),

        (0x094 => _reserved1),

        /// Interrupt 0-138 Set Pending
        (0x100 => pend: [ReadWrite<u32, InterruptBits::Register>; 5]),

        (0x114 => _reserved2),

        /// Interrupt 0-138 Clear Pending
        (0x180 => unpend: [ReadWrite<u32, InterruptBits::Register>; 5]),

        (0x194 => _reserved3),

        /// Interrupt 0-138 Active Bit
        (0x200 => active: [ReadOnly<u32, InterruptBits::Register>; 5]),

        (0x214 => _reserved4),

        /// Interrupt 0-138 Priority
        (0x300 => pri: [ReadWrite<u32, InterruptPriority::Register>; 35]),

        (0x38c => @END),
    }
}

register_bitfields![u32,
    InterruptBits [
        /// For register n of a bank, line (32 * n) + m is bit m.
        INT             OFFSET(0)   NUMBITS(32) []
    ],

    InterruptPriority [
        /// For register PRIn, priority of interrupt 4n+3.
        INTD            OFFSET(29)  NUMBITS(3) [],

        /// For register PRIn, priority of interrupt 4n+2.
        INTC            OFFSET(21)  NUMBITS(3) [],

        /// For register PRIn, priority of interrupt 4n+1.
        INTB            OFFSET(13)  NUMBITS(3) [],

        /// For register PRIn, priority of interrupt 4n.
        INTA            OFFSET(5)   NUMBITS(3) []
    ]
];

/// Address of EN0.
const NVIC_BASE: *const NvicRegisters = 0xE000_E100 as *const NvicRegisters;

/// Highest priority value that fits in a priority field.
pub const MAX_PRIORITY: u8 = 0b111;

/// First DIS register whose bit `disable_irq` ORs in instead of clearing.
const DISABLE_SETS_BANK: usize = 4;

/// Priority field for `n % 4`.
const PRIORITY_FIELDS: [Field<u32, InterruptPriority::Register>; 4] = [
    InterruptPriority::INTA,
    InterruptPriority::INTB,
    InterruptPriority::INTC,
    InterruptPriority::INTD,
];

/// Location of an interrupt line in the 32-bit banks (EN, DIS, PEND, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BankBit {
    pub(crate) register: usize,
    pub(crate) bit: usize,
}

impl BankBit {
    fn field(self) -> Field<u32, InterruptBits::Register> {
        Field::new(1, self.bit as _)
    }
}

/// Location of an interrupt line's priority field.
#[derive(Clone, Copy)]
pub(crate) struct PrioritySlot {
    pub(crate) register: usize,
    pub(crate) field: Field<u32, InterruptPriority::Register>,
}

/// Where `irq` lives in the enable/disable/pending banks, or `None` if the
/// line does not exist.
pub(crate) fn bank_bit(irq: u32) -> Option<BankBit> {
    if irq < NUM_IRQS {
        Some(BankBit {
            register: (irq / 32) as usize,
            bit: (irq % 32) as usize,
        })
    } else {
        None
    }
}

/// Where `irq`'s priority lives, or `None` if the line does not exist.
pub(crate) fn priority_slot(irq: u32) -> Option<PrioritySlot> {
    if irq < NUM_IRQS {
        Some(PrioritySlot {
            register: (irq / 4) as usize,
            field: PRIORITY_FIELDS[(irq % 4) as usize],
        })
    } else {
        None
    }
}

fn ignored(operation: &str, irq: u32) {
    if CONFIG.warn_on_ignored_input {
        log::warn!(
            "nvic: {} ignored, irq {} is not below {}",
            operation,
            irq,
            NUM_IRQS
        );
    }
}

/// Driver for the interrupt line half of the NVIC.
///
/// All operations are plain read-modify-write sequences on shared registers.
/// Nothing here masks interrupts, so a caller that reconfigures a line from
/// both thread mode and a handler must provide its own exclusion.
pub struct Nvic<'a> {
    registers: &'a NvicRegisters,
}

impl Nvic<'static> {
    /// Creates the driver for the chip's NVIC.
    ///
    /// Marked unsafe because only chip/platform configuration code should
    /// create it, and only once.
    pub unsafe fn new() -> Self {
        Nvic::with_registers(&*NVIC_BASE)
    }
}

impl<'a> Nvic<'a> {
    /// Creates the driver on top of an arbitrary register block.
    pub const fn with_registers(registers: &'a NvicRegisters) -> Self {
        Nvic { registers }
    }

    /// Enable interrupt line `irq`.
    pub fn enable_irq(&self, irq: u32) {
        match bank_bit(irq) {
            Some(loc) => {
                self.registers.en[loc.register].modify(loc.field().val(1));
                self.trace_bank("EN", loc);
            }
            None => ignored("enable", irq),
        }
    }

    /// Disable interrupt line `irq`.
    ///
    /// Lines below 128 have their DIS bit cleared. Lines 128-138 have their
    /// DIS4 bit set instead.
    pub fn disable_irq(&self, irq: u32) {
        match bank_bit(irq) {
            Some(loc) if loc.register < DISABLE_SETS_BANK => {
                self.registers.dis[loc.register].modify(loc.field().val(0));
                self.trace_bank("DIS", loc);
            }
            Some(loc) => {
                self.registers.dis[loc.register].modify(loc.field().val(1));
                self.trace_bank("DIS", loc);
            }
            None => ignored("disable", irq),
        }
    }

    /// Set the priority of interrupt line `irq`.
    ///
    /// Only the three bits owned by `irq` change; the other three lines that
    /// share the PRI register keep their priority. `priority` is truncated to
    /// its low three bits.
    pub fn set_priority_irq(&self, irq: u32, priority: u8) {
        match priority_slot(irq) {
            Some(slot) => {
                let register = &self.registers.pri[slot.register];
                register.modify(slot.field.val(u32::from(priority)));
                if CONFIG.trace_register_writes {
                    log::trace!(
                        "nvic: PRI{} <- {:#010x} (irq {} priority {})",
                        slot.register,
                        register.get(),
                        irq,
                        priority
                    );
                }
            }
            None => ignored("set priority", irq),
        }
    }

    /// Like [`Nvic::enable_irq`], but rejects a line that does not exist.
    pub fn checked_enable_irq(&self, irq: u32) -> Result<(), ErrorCode> {
        if irq >= NUM_IRQS {
            return Err(ErrorCode::INVAL);
        }
        self.enable_irq(irq);
        Ok(())
    }

    /// Like [`Nvic::set_priority_irq`], but rejects a line that does not
    /// exist (`INVAL`) and a priority that does not fit in three bits
    /// (`SIZE`) instead of truncating it.
    pub fn checked_set_priority_irq(&self, irq: u32, priority: u8) -> Result<(), ErrorCode> {
        if irq >= NUM_IRQS {
            return Err(ErrorCode::INVAL);
        }
        if priority > MAX_PRIORITY {
            return Err(ErrorCode::SIZE);
        }
        self.set_priority_irq(irq, priority);
        Ok(())
    }

    /// Whether the EN bit of `irq` is set. Lines that do not exist read as
    /// disabled.
    pub fn is_enabled(&self, irq: u32) -> bool {
        bank_bit(irq).is_some_and(|loc| self.registers.en[loc.register].is_set(loc.field()))
    }

    /// Current priority of `irq`, or `None` if the line does not exist.
    pub fn priority(&self, irq: u32) -> Option<u8> {
        priority_slot(irq).map(|slot| self.registers.pri[slot.register].read(slot.field) as u8)
    }

    /// Force `irq` pending.
    pub fn set_pending(&self, irq: u32) {
        match bank_bit(irq) {
            Some(loc) => {
                self.registers.pend[loc.register].modify(loc.field().val(1));
                self.trace_bank("PEND", loc);
            }
            None => ignored("set pending", irq),
        }
    }

    /// Clear the pending state of `irq`.
    pub fn clear_pending(&self, irq: u32) {
        match bank_bit(irq) {
            Some(loc) => {
                self.registers.unpend[loc.register].modify(loc.field().val(1));
                self.trace_bank("UNPEND", loc);
            }
            None => ignored("clear pending", irq),
        }
    }

    pub fn is_pending(&self, irq: u32) -> bool {
        bank_bit(irq).is_some_and(|loc| self.registers.pend[loc.register].is_set(loc.field()))
    }

    pub fn is_active(&self, irq: u32) -> bool {
        bank_bit(irq).is_some_and(|loc| self.registers.active[loc.register].is_set(loc.field()))
    }

    fn trace_bank(&self, bank: &str, loc: BankBit) {
        if CONFIG.trace_register_writes {
            log::trace!(
                "nvic: {}{} bit {} (irq {})",
                bank,
                loc.register,
                loc.bit,
                loc.register * 32 + loc.bit
            );
        }
    }
}
