//! Test utilities for inlinestr - available to downstream crates for testing.
//!
//! - [`CountingAllocator`]: an instrumented allocator for checking that code
//!   paths do not allocate.
//! - [`Person`]: a record with two inline string fields, written the way
//!   generated record code drives the fields.

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use crate::arena::Arena;
use crate::donation::{DonationSlot, DonationVector, DtorHook};
use crate::inlined_string::{InlinedStringField, SwapSide};
use crate::value::MutableString;
use crate::{AllocError, Allocator};

#[cfg(not(feature = "nightly"))]
pub use allocator_api2::alloc::Global;
#[cfg(feature = "nightly")]
pub use std::alloc::Global;

/// Forwards to [`Global`] and counts what passes through.
#[derive(Default)]
pub struct CountingAllocator {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    live_bytes: Cell<usize>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    pub fn deallocations(&self) -> usize {
        self.deallocations.get()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }
}

unsafe impl Allocator for CountingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let p = Global.allocate(layout)?;
        self.allocations.set(self.allocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + layout.size());
        Ok(p)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocations.set(self.deallocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() - layout.size());
        unsafe { Global.deallocate(ptr, layout) }
    }
}

const NAME_MASK: u32 = DonationVector::mask(0);
const EMAIL_MASK: u32 = DonationVector::mask(1);

/// A record holding two inline string fields.
///
/// Records created with [`Person::new_in`] live in the arena and are never
/// dropped; the arena runs their field cleanup if any field became heap owned.
/// Records created with [`Person::new`] own their fields and destroy them on
/// drop.
pub struct Person<'a> {
    donating: DonationVector,
    arena_dtor_registered: bool,
    arena: Option<&'a Arena<'a>>,
    // Address handed to the arena for cleanup, dangling without an arena.
    this: NonNull<u8>,
    name: InlinedStringField,
    email: InlinedStringField,
}

macro_rules! string_accessors {
    ($field:ident, $mask:expr, $is_donated:ident, $set:ident, $set_owned:ident,
     $mutable:ident, $release:ident, $set_allocated:ident, $clear:ident) => {
        pub fn $field(&self) -> &[u8] {
            self.$field.as_bytes()
        }

        pub fn $is_donated(&self) -> bool {
            self.donating.is_donated($mask)
        }

        pub fn $set(&mut self, value: &str) {
            let (field, arena, donated, slot) = self.parts($mask);
            field.set(value, arena, donated, slot);
        }

        pub fn $set_owned(&mut self, value: std::string::String) {
            let (field, arena, donated, slot) = self.parts($mask);
            field.set_string(value, arena, donated, slot);
        }

        pub fn $mutable(&mut self) -> MutableString<'_> {
            let (field, arena, donated, slot) = self.parts($mask);
            field.mutable(arena, donated, slot)
        }

        #[must_use]
        pub fn $release(&mut self) -> Box<Vec<u8>> {
            let (field, arena, donated, slot) = self.parts($mask);
            field.release(arena, donated, slot)
        }

        pub fn $set_allocated(&mut self, value: Option<Box<Vec<u8>>>) {
            let (field, arena, donated, slot) = self.parts($mask);
            field.set_allocated(value, arena, donated, slot);
        }

        pub fn $clear(&mut self) {
            self.$field.clear_to_empty();
        }
    };
}

impl<'a> Person<'a> {
    pub fn new() -> Self {
        Person {
            donating: DonationVector::new(NAME_MASK | EMAIL_MASK),
            arena_dtor_registered: false,
            arena: None,
            this: NonNull::dangling(),
            name: InlinedStringField::new(),
            email: InlinedStringField::new(),
        }
    }

    pub fn new_in(arena: &'a Arena<'a>) -> &'a mut Self {
        let ptr = arena.alloc_raw(Layout::new::<Self>()).cast::<Self>();
        unsafe {
            ptr.as_ptr().write(Person {
                donating: DonationVector::new(NAME_MASK | EMAIL_MASK),
                arena_dtor_registered: false,
                arena: Some(arena),
                this: ptr.cast(),
                name: InlinedStringField::new(),
                email: InlinedStringField::new(),
            });
            &mut *ptr.as_ptr()
        }
    }

    string_accessors!(
        name, NAME_MASK, is_name_donated, set_name, set_name_owned,
        mutable_name, release_name, set_allocated_name, clear_name
    );

    string_accessors!(
        email, EMAIL_MASK, is_email_donated, set_email, set_email_owned,
        mutable_email, release_email, set_allocated_email, clear_email
    );

    pub fn donation_bits(&self) -> u32 {
        self.donating.bits()
    }

    pub fn arena_dtor_registered(&self) -> bool {
        self.arena_dtor_registered
    }

    pub fn clear(&mut self) {
        self.name.clear_to_empty();
        self.email.clear_to_empty();
    }

    /// Swap field contents with `other`, which may live in another arena or on
    /// the heap.
    pub fn swap(&mut self, other: &mut Person<'a>) {
        for mask in [NAME_MASK, EMAIL_MASK] {
            let (lhs, lhs_arena, lhs_donated, lhs_slot) = self.parts(mask);
            let (rhs, rhs_arena, rhs_donated, rhs_slot) = other.parts(mask);
            InlinedStringField::internal_swap(
                lhs,
                SwapSide {
                    arena: lhs_arena,
                    donated: lhs_donated,
                    slot: lhs_slot,
                },
                rhs,
                SwapSide {
                    arena: rhs_arena,
                    donated: rhs_donated,
                    slot: rhs_slot,
                },
            );
        }
    }

    fn parts(
        &mut self,
        mask: u32,
    ) -> (
        &mut InlinedStringField,
        Option<&'a Arena<'a>>,
        bool,
        DonationSlot<'_>,
    ) {
        let Person {
            donating,
            arena_dtor_registered,
            arena,
            this,
            name,
            email,
        } = self;
        let field = if mask == NAME_MASK { name } else { email };
        let donated = donating.is_donated(mask);
        let hook = unsafe { DtorHook::new(arena_dtor_registered, *this, Self::arena_dtor) };
        (field, *arena, donated, DonationSlot::new(donating, mask, hook))
    }

    fn destroy_fields(&mut self) {
        for mask in [NAME_MASK, EMAIL_MASK] {
            let (field, arena, donated, slot) = self.parts(mask);
            field.destroy(arena, donated, slot);
        }
    }

    unsafe fn arena_dtor(this: NonNull<u8>) {
        let person = unsafe { this.cast::<Self>().as_mut() };
        person.destroy_fields();
    }
}

impl Default for Person<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Person<'_> {
    fn drop(&mut self) {
        // Arena records are never dropped, this only sees heap records.
        if self.arena.is_none() {
            self.destroy_fields();
        }
    }
}

impl core::fmt::Debug for Person<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Person")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("donating", &self.donating)
            .finish()
    }
}

#[cfg(feature = "serde_support")]
impl serde::Serialize for Person<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Person", 2)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("email", &self.email)?;
        s.end()
    }
}
