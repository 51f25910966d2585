//! Donation state shared between a record and its inline string fields.
//!
//! A field is *donated* while its character buffer lives in arena memory that
//! is reclaimed in bulk. To keep fields free of per-field flags, a record packs
//! the donation state of all its inline fields into one [`DonationVector`]
//! word; each field owns one bit, identified by a mask.
//!
//! Fields never set a bit. The only transition is clearing it (undonation),
//! performed through a [`DonationSlot`] the record hands to the field. The slot
//! also carries the record's [`DtorHook`], so that a record living in an arena
//! asks that arena to run its field cleanup the first time any field becomes
//! heap owned.

use core::ptr::NonNull;

use crate::arena::Arena;

/// Bit-packed donation states of one record's inline fields.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct DonationVector(u32);

impl DonationVector {
    /// Create a vector with the bits in `donated` set. Records pass the union of
    /// their field masks at construction, since every field starts donated.
    pub const fn new(donated: u32) -> Self {
        DonationVector(donated)
    }

    /// Mask for the field at `index`.
    pub const fn mask(index: u32) -> u32 {
        assert!(index < u32::BITS, "a record has at most 32 inline fields");
        1 << index
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_donated(&self, mask: u32) -> bool {
        self.0 & mask != 0
    }

    pub(crate) fn undonate(&mut self, mask: u32) {
        self.0 &= !mask;
    }
}

impl core::fmt::Debug for DonationVector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DonationVector({:#034b})", self.0)
    }
}

/// A record's handle for registering its arena cleanup on demand.
pub struct DtorHook<'r> {
    registered: &'r mut bool,
    record: NonNull<u8>,
    cleanup: unsafe fn(NonNull<u8>),
}

impl<'r> DtorHook<'r> {
    /// # Safety
    ///
    /// If the record lives in an arena, `record` must stay valid until that
    /// arena is dropped and `cleanup(record)` must be sound to run exactly once
    /// at that point. `registered` must be the record's own flag, shared by all
    /// hooks created for that record.
    pub unsafe fn new(
        registered: &'r mut bool,
        record: NonNull<u8>,
        cleanup: unsafe fn(NonNull<u8>),
    ) -> Self {
        DtorHook {
            registered,
            record,
            cleanup,
        }
    }

    pub fn is_registered(&self) -> bool {
        *self.registered
    }

    /// Register the record's cleanup with `arena` unless already done. Records
    /// without an arena are destroyed by their owner and need nothing.
    pub fn request(&mut self, arena: Option<&Arena>) {
        let Some(arena) = arena else {
            return;
        };
        if *self.registered {
            return;
        }
        unsafe { arena.register_dtor(self.record, self.cleanup) };
        *self.registered = true;
        tracing::trace!(record = ?self.record, "registered arena dtor on demand");
    }
}

/// Everything a field needs to undonate itself: the record's vector, the
/// field's mask and the record's registration hook.
pub struct DonationSlot<'r> {
    states: &'r mut DonationVector,
    mask: u32,
    hook: DtorHook<'r>,
}

impl<'r> DonationSlot<'r> {
    pub fn new(states: &'r mut DonationVector, mask: u32, hook: DtorHook<'r>) -> Self {
        debug_assert!(mask.is_power_of_two(), "mask {mask:#x} must select one bit");
        DonationSlot { states, mask, hook }
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn is_donated(&self) -> bool {
        self.states.is_donated(self.mask)
    }

    pub fn is_dtor_registered(&self) -> bool {
        self.hook.is_registered()
    }

    /// Caller contract: the `donated` argument of every field operation agrees
    /// with the vector.
    #[inline(always)]
    pub(crate) fn check(&self, donated: bool) {
        debug_assert_eq!(
            donated,
            self.is_donated(),
            "donated argument disagrees with donation vector bit {:#x}",
            self.mask
        );
    }

    /// Clear this field's bit and make sure the record gets destroyed by its
    /// arena. Idempotent.
    pub(crate) fn undonate(&mut self, arena: Option<&Arena>) {
        if self.states.is_donated(self.mask) {
            self.states.undonate(self.mask);
            tracing::trace!(mask = self.mask, "undonated inlined string field");
        }
        self.hook.request(arena);
    }

    pub(crate) fn request_dtor(&mut self, arena: Option<&Arena>) {
        self.hook.request(arena);
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::test_utils::Global;

    unsafe fn noop(_: NonNull<u8>) {}

    #[test]
    fn test_vector_bits() {
        let mut v = DonationVector::new(DonationVector::mask(0) | DonationVector::mask(3));
        assert!(v.is_donated(1));
        assert!(!v.is_donated(2));
        assert!(v.is_donated(8));
        v.undonate(8);
        assert_eq!(v.bits(), 1);
        v.undonate(8);
        assert_eq!(v.bits(), 1);
    }

    #[test]
    fn test_hook_registers_once() {
        let arena = Arena::new(&Global);
        let mut registered = false;
        let mut target = 0u8;
        let mut hook = unsafe { DtorHook::new(&mut registered, NonNull::from(&mut target), noop) };
        hook.request(None);
        assert!(!hook.is_registered());
        hook.request(Some(&arena));
        hook.request(Some(&arena));
        assert!(hook.is_registered());
        assert_eq!(arena.dtor_count(), 1);
    }

    #[test]
    fn test_slot_undonate_clears_only_its_bit() {
        let arena = Arena::new(&Global);
        let mut states = DonationVector::new(0b11);
        let mut registered = false;
        let mut target = 0u8;
        let hook = unsafe { DtorHook::new(&mut registered, NonNull::from(&mut target), noop) };
        let mut slot = DonationSlot::new(&mut states, 0b10, hook);
        slot.check(true);
        slot.undonate(Some(&arena));
        assert!(!slot.is_donated());
        assert!(slot.is_dtor_registered());
        slot.undonate(Some(&arena));
        assert_eq!(states.bits(), 0b01);
        assert!(registered);
        assert_eq!(arena.dtor_count(), 1);
    }
}
