//! Inline string fields with arena donation.
//!
//! [`InlinedStringField`] is stored directly inside a record and embeds exactly
//! one [`StringValue`]; it has no other state. Its buffer is either *donated*
//! (arena memory, reclaimed in bulk with the arena) or heap owned (freed by
//! [`InlinedStringField::destroy`]). Which one is recorded in the owning record's
//! [`DonationVector`], not in the field.
//!
//! A freshly constructed field is donated, because the field itself lives in
//! record memory. Copying setters keep the donation state and grow from the arena
//! while donated. Operations that hand out or take in heap ownership undonate the
//! field: [`mutable`](InlinedStringField::mutable), the moving setters,
//! [`set_allocated`](InlinedStringField::set_allocated),
//! [`release`](InlinedStringField::release) and a swap with a field whose buffer
//! lives elsewhere. Undonation is one way.
//!
//! ```text
//!   new ──► Donated ──(mutable / set_owned / set_allocated / release / swap)──► Undonated
//!              │  ▲                                                            │  ▲
//!              └──┘ set / clear                                                └──┘ everything
//! ```
//!
//! Every operation that may allocate takes the record's arena (if any) and the
//! caller's view of the donation bit, which must agree with the vector. The
//! agreement is checked in debug builds only.
//!
//! # Example
//!
//! ```
//! use core::ptr::NonNull;
//! use inlinestr::test_utils::Global;
//! use inlinestr::arena::Arena;
//! use inlinestr::donation::{DonationSlot, DonationVector, DtorHook};
//! use inlinestr::inlined_string::InlinedStringField;
//!
//! unsafe fn cleanup(_: NonNull<u8>) {}
//!
//! fn slot<'r>(
//!     states: &'r mut DonationVector,
//!     registered: &'r mut bool,
//!     record: NonNull<u8>,
//! ) -> DonationSlot<'r> {
//!     let hook = unsafe { DtorHook::new(registered, record, cleanup) };
//!     DonationSlot::new(states, 0b1, hook)
//! }
//!
//! let arena = Arena::new(&Global);
//! let mut states = DonationVector::new(0b1);
//! let mut registered = false;
//! let mut field = InlinedStringField::new();
//! let mut anchor = 0u8;
//! let record = NonNull::from(&mut anchor);
//!
//! field.set("hello", Some(&arena), true, slot(&mut states, &mut registered, record));
//! assert!(states.is_donated(0b1));
//!
//! field
//!     .mutable(Some(&arena), true, slot(&mut states, &mut registered, record))
//!     .extend_from_slice(b" world");
//! assert!(!states.is_donated(0b1));
//! assert!(registered);
//! assert_eq!(field.as_bytes(), b"hello world");
//!
//! field.destroy(Some(&arena), false, slot(&mut states, &mut registered, record));
//! ```

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::arena::Arena;
use crate::donation::DonationSlot;
use crate::value::{Backing, MutableString, StringValue};

#[cfg(doc)]
use crate::donation::DonationVector;

#[repr(transparent)]
#[derive(Default)]
pub struct InlinedStringField {
    value: StringValue,
}

/// One side of [`InlinedStringField::internal_swap`].
pub struct SwapSide<'s, 'a> {
    pub arena: Option<&'s Arena<'a>>,
    pub donated: bool,
    pub slot: DonationSlot<'s>,
}

impl InlinedStringField {
    pub const fn new() -> Self {
        InlinedStringField {
            value: StringValue::new(),
        }
    }

    /// Construct holding a copy of `value`, donated. The copy is placed in
    /// `arena` when there is one.
    pub fn with_value(value: &[u8], arena: Option<&Arena>) -> Self {
        let mut field = Self::new();
        field.value.assign(value, Backing::of(arena, true));
        field
    }

    pub const fn get(&self) -> &StringValue {
        &self.value
    }

    pub const fn as_bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }

    pub fn to_str(&self) -> Result<&str, core::str::Utf8Error> {
        core::str::from_utf8(self.as_bytes())
    }

    pub const fn len(&self) -> usize {
        self.value.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.value.capacity()
    }

    /// Inline fields carry no default-value pointer, so they are never in the
    /// "points at the default" state.
    pub const fn is_default(&self) -> bool {
        false
    }

    /// Copy `value` in. Never changes the donation state.
    pub fn set(&mut self, value: &str, arena: Option<&Arena>, donated: bool, slot: DonationSlot) {
        self.set_bytes(value.as_bytes(), arena, donated, slot);
    }

    /// Copy `value` in. Never changes the donation state.
    pub fn set_bytes(
        &mut self,
        value: &[u8],
        arena: Option<&Arena>,
        donated: bool,
        slot: DonationSlot,
    ) {
        slot.check(donated);
        self.value.assign(value, Backing::of(arena, donated));
    }

    /// Take over the buffer of `value` without copying. Undonates.
    pub fn set_owned(
        &mut self,
        value: Vec<u8>,
        arena: Option<&Arena>,
        donated: bool,
        mut slot: DonationSlot,
    ) {
        slot.check(donated);
        self.value.destroy(Backing::of(arena, donated));
        if donated {
            slot.undonate(arena);
        }
        self.value.put_heap(value);
    }

    /// Take over the buffer of `value` without copying. Undonates.
    pub fn set_string(
        &mut self,
        value: String,
        arena: Option<&Arena>,
        donated: bool,
        slot: DonationSlot,
    ) {
        self.set_owned(value.into_bytes(), arena, donated, slot);
    }

    /// Hand out the live value for direct mutation.
    ///
    /// A donated field first moves its content to the heap and undonates, so the
    /// caller may grow the buffer freely. An undonated field is returned as is.
    pub fn mutable(
        &mut self,
        arena: Option<&Arena>,
        donated: bool,
        mut slot: DonationSlot,
    ) -> MutableString<'_> {
        slot.check(donated);
        if donated {
            self.value.make_heap(Backing::of(arena, donated));
            slot.undonate(arena);
        }
        unsafe { MutableString::new(&mut self.value) }
    }

    /// Like [`mutable`](Self::mutable) without any donation bookkeeping, for
    /// parsers that already know where the buffer lives.
    ///
    /// # Safety
    ///
    /// The field must not be donated to an arena: either it is undonated or
    /// its record has no arena.
    pub unsafe fn mutable_no_copy(&mut self) -> MutableString<'_> {
        unsafe { MutableString::new(&mut self.value) }
    }

    /// Take ownership of a heap string's content and free the emptied box.
    /// `None` clears the field instead and leaves the donation state alone.
    pub fn set_allocated(
        &mut self,
        value: Option<Box<Vec<u8>>>,
        arena: Option<&Arena>,
        donated: bool,
        slot: DonationSlot,
    ) {
        match value {
            Some(value) => self.set_owned(*value, arena, donated, slot),
            None => {
                slot.check(donated);
                self.clear_to_empty();
            }
        }
    }

    /// Move the content into a new heap string owned by the caller and leave
    /// the field empty.
    ///
    /// Releasing undonates the field, the same as every other operation that
    /// hands heap ownership across the field boundary.
    #[must_use]
    pub fn release(
        &mut self,
        arena: Option<&Arena>,
        donated: bool,
        mut slot: DonationSlot,
    ) -> Box<Vec<u8>> {
        slot.check(donated);
        let released = self.value.take(Backing::of(arena, donated));
        if donated {
            // The field is empty now, but the next set grows on the heap, so the
            // record's cleanup must already be registered.
            slot.undonate(arena);
        }
        Box::new(released)
    }

    /// Empty the field but keep its buffer for reuse.
    pub fn clear_to_empty(&mut self) {
        self.value.clear();
    }

    /// Like [`clear_to_empty`](Self::clear_to_empty) but the content becomes
    /// `default`. Grows like a copying set if the buffer is too small.
    pub fn clear_to_default(
        &mut self,
        default: &[u8],
        arena: Option<&Arena>,
        donated: bool,
        slot: DonationSlot,
    ) {
        slot.check(donated);
        self.value.assign(default, Backing::of(arena, donated));
    }

    /// Free a heap owned buffer. A donated field of an arena-resident record
    /// owns nothing; records skip this call for such fields and calling it
    /// anyway only empties the field.
    pub fn destroy(&mut self, arena: Option<&Arena>, donated: bool, slot: DonationSlot) {
        slot.check(donated);
        self.value.destroy(Backing::of(arena, donated));
    }

    /// Exchange the contents of two fields.
    ///
    /// The caller guarantees each field belongs to its side's record and arena.
    /// Buffers are exchanged bitwise when both live in the same arena or both
    /// on the heap. Otherwise each donated side is moved to the heap and
    /// undonated first, so no record ends up holding memory of an arena it
    /// does not belong to.
    ///
    /// If exactly one record had its arena cleanup registered before the swap,
    /// the other one registers now: it may have received a heap buffer.
    pub fn internal_swap(lhs: &mut Self, mut lhs_side: SwapSide, rhs: &mut Self, mut rhs_side: SwapSide) {
        lhs_side.slot.check(lhs_side.donated);
        rhs_side.slot.check(rhs_side.donated);
        let lhs_registered = lhs_side.slot.is_dtor_registered();
        let rhs_registered = rhs_side.slot.is_dtor_registered();

        let lhs_backing = Backing::of(lhs_side.arena, lhs_side.donated);
        let rhs_backing = Backing::of(rhs_side.arena, rhs_side.donated);
        if !lhs_backing.can_exchange(&rhs_backing) {
            if lhs_backing.is_arena() {
                lhs.value.make_heap(lhs_backing);
                lhs_side.slot.undonate(lhs_side.arena);
            }
            if rhs_backing.is_arena() {
                rhs.value.make_heap(rhs_backing);
                rhs_side.slot.undonate(rhs_side.arena);
            }
        }

        core::mem::swap(&mut lhs.value, &mut rhs.value);

        if !lhs_registered && rhs_registered {
            lhs_side.slot.request_dtor(lhs_side.arena);
        } else if lhs_registered && !rhs_registered {
            rhs_side.slot.request_dtor(rhs_side.arena);
        }
    }
}

impl PartialEq for InlinedStringField {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for InlinedStringField {}

impl core::fmt::Debug for InlinedStringField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.value.fmt(f)
    }
}
