//! Core of a CHIP-8 virtual machine: instruction decoding, execution and a threaded runner.

pub mod font;
pub mod instruction;
pub mod nibble_ints;
pub mod processor;
pub mod screen;
