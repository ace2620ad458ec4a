// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Named constants for TM4C123GH6PM NVIC ids
//!
//! Gaps in the numbering are reserved lines. The last implemented line is
//! `PWM1_FAULT` (138).

/// Number of interrupt lines implemented by the NVIC.
pub const NUM_IRQS: u32 = 139;

pub const GPIOA: u32 = 0;
pub const GPIOB: u32 = 1;
pub const GPIOC: u32 = 2;
pub const GPIOD: u32 = 3;
pub const GPIOE: u32 = 4;
pub const UART0: u32 = 5;
pub const UART1: u32 = 6;
pub const SSI0: u32 = 7;
pub const I2C0: u32 = 8;
pub const PWM0_FAULT: u32 = 9;
pub const PWM0_0: u32 = 10;
pub const PWM0_1: u32 = 11;
pub const PWM0_2: u32 = 12;
pub const QEI0: u32 = 13;
pub const ADC0SS0: u32 = 14;
pub const ADC0SS1: u32 = 15;
pub const ADC0SS2: u32 = 16;
pub const ADC0SS3: u32 = 17;
pub const WATCHDOG: u32 = 18;
pub const TIMER0A: u32 = 19;
pub const TIMER0B: u32 = 20;
pub const TIMER1A: u32 = 21;
pub const TIMER1B: u32 = 22;
pub const TIMER2A: u32 = 23;
pub const TIMER2B: u32 = 24;
pub const COMP0: u32 = 25;
pub const COMP1: u32 = 26;
pub const SYSCTL: u32 = 28;
pub const FLASH: u32 = 29;
pub const GPIOF: u32 = 30;
pub const UART2: u32 = 33;
pub const SSI1: u32 = 34;
pub const TIMER3A: u32 = 35;
pub const TIMER3B: u32 = 36;
pub const I2C1: u32 = 37;
pub const QEI1: u32 = 38;
pub const CAN0: u32 = 39;
pub const CAN1: u32 = 40;
pub const HIBERNATE: u32 = 43;
pub const USB0: u32 = 44;
pub const PWM0_3: u32 = 45;
pub const UDMA: u32 = 46;
pub const UDMAERR: u32 = 47;
pub const ADC1SS0: u32 = 48;
pub const ADC1SS1: u32 = 49;
pub const ADC1SS2: u32 = 50;
pub const ADC1SS3: u32 = 51;
pub const SSI2: u32 = 57;
pub const SSI3: u32 = 58;
pub const UART3: u32 = 59;
pub const UART4: u32 = 60;
pub const UART5: u32 = 61;
pub const UART6: u32 = 62;
pub const UART7: u32 = 63;
pub const I2C2: u32 = 68;
pub const I2C3: u32 = 69;
pub const TIMER4A: u32 = 70;
pub const TIMER4B: u32 = 71;
pub const TIMER5A: u32 = 92;
pub const TIMER5B: u32 = 93;
pub const WTIMER0A: u32 = 94;
pub const WTIMER0B: u32 = 95;
pub const WTIMER1A: u32 = 96;
pub const WTIMER1B: u32 = 97;
pub const WTIMER2A: u32 = 98;
pub const WTIMER2B: u32 = 99;
pub const WTIMER3A: u32 = 100;
pub const WTIMER3B: u32 = 101;
pub const WTIMER4A: u32 = 102;
pub const WTIMER4B: u32 = 103;
pub const WTIMER5A: u32 = 104;
pub const WTIMER5B: u32 = 105;
pub const SYSEXC: u32 = 106;
pub const PWM1_0: u32 = 134;
pub const PWM1_1: u32 = 135;
pub const PWM1_2: u32 = 136;
pub const PWM1_3: u32 = 137;
pub const PWM1_FAULT: u32 = 138;
