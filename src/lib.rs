//! Arena-aware inline string fields.
//!
//! An [`InlinedStringField`](inlined_string::InlinedStringField) is a string
//! stored directly inside a record. Its buffer is either bump allocated from the
//! record's [`Arena`](arena::Arena) and freed in bulk, or an ordinary heap
//! allocation freed individually. Records track which, for all their inline
//! fields at once, in a single [`DonationVector`](donation::DonationVector)
//! word.
//!
//! ```
//! use inlinestr::arena::Arena;
//! use inlinestr::test_utils::{Global, Person};
//!
//! let arena = Arena::new(&Global);
//! let person = Person::new_in(&arena);
//!
//! person.set_name("hello");
//! assert!(person.is_name_donated());
//!
//! person.mutable_name().extend_from_slice(b", world");
//! assert!(!person.is_name_donated());
//! assert_eq!(person.name(), b"hello, world");
//!
//! let owned = person.release_name();
//! assert_eq!(*owned, b"hello, world");
//! assert!(person.name().is_empty());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(feature = "nightly", feature(allocator_api))]

extern crate alloc;

pub mod arena;
pub mod donation;
pub mod inlined_string;
pub mod value;

#[cfg(feature = "serde_support")]
pub mod serde;

#[cfg(feature = "std")]
pub mod test_utils;

#[cfg(not(feature = "nightly"))]
pub use allocator_api2::alloc::{AllocError, Allocator};
#[cfg(feature = "nightly")]
pub use core::alloc::{AllocError, Allocator};

pub use arena::Arena;
pub use donation::{DonationSlot, DonationVector, DtorHook};
pub use inlined_string::{InlinedStringField, SwapSide};
pub use value::{MutableString, StringValue};
