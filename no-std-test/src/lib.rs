//! Test that inlinestr works in a no_std environment.
//!
//! This crate verifies that the field operations compile and work without the
//! standard library, driving a field the way a record would.
//!
//! Build with: cargo build -p no-std-test --target thumbv7m-none-eabi

#![no_std]

extern crate alloc;

use core::ptr::NonNull;

use alloc::vec::Vec;
use inlinestr::arena::Arena;
use inlinestr::donation::{DonationSlot, DonationVector, DtorHook};
use inlinestr::inlined_string::InlinedStringField;
use inlinestr::Allocator;

const MASK: u32 = DonationVector::mask(0);

unsafe fn cleanup(_: NonNull<u8>) {}

struct Record {
    states: DonationVector,
    registered: bool,
    field: InlinedStringField,
}

impl Record {
    fn new() -> Self {
        Record {
            states: DonationVector::new(MASK),
            registered: false,
            field: InlinedStringField::new(),
        }
    }

    fn parts(&mut self) -> (&mut InlinedStringField, bool, DonationSlot<'_>) {
        let donated = self.states.is_donated(MASK);
        let hook = unsafe { DtorHook::new(&mut self.registered, NonNull::dangling(), cleanup) };
        (&mut self.field, donated, DonationSlot::new(&mut self.states, MASK, hook))
    }
}

/// Test copying sets stay donated in no_std
pub fn test_set(alloc: &dyn Allocator) -> bool {
    let arena = Arena::new(alloc);
    let mut record = Record::new();

    let (field, donated, slot) = record.parts();
    field.set("test.proto", Some(&arena), donated, slot);

    record.field.as_bytes() == b"test.proto" && record.states.is_donated(MASK)
}

/// Test mutable access undonates in no_std
pub fn test_mutable(alloc: &dyn Allocator) -> bool {
    let arena = Arena::new(alloc);
    let mut record = Record::new();

    let (field, donated, slot) = record.parts();
    field.set("my", Some(&arena), donated, slot);
    let (field, donated, slot) = record.parts();
    field
        .mutable(Some(&arena), donated, slot)
        .extend_from_slice(b".package");

    let ok = record.field.as_bytes() == b"my.package"
        && !record.states.is_donated(MASK)
        && record.registered;
    let (field, donated, slot) = record.parts();
    field.destroy(Some(&arena), donated, slot);
    ok
}

/// Test release hands back an owned buffer in no_std
pub fn test_release(alloc: &dyn Allocator) -> bool {
    let arena = Arena::new(alloc);
    let mut record = Record::new();

    let (field, donated, slot) = record.parts();
    field.set_owned(Vec::from(&b"roundtrip"[..]), Some(&arena), donated, slot);
    let (field, donated, slot) = record.parts();
    let released = field.release(Some(&arena), donated, slot);

    *released == b"roundtrip" && record.field.is_empty()
}
