//! The string object embedded in an inline field.
//!
//! [`StringValue`] is a pointer, length and capacity. It does not know where its
//! buffer came from; the owner tells it on every operation that may allocate or
//! free by passing a [`Backing`]. Heap buffers are exactly what a `Vec<u8>` would
//! own, so heap values convert to and from `Vec<u8>` without copying. Arena
//! buffers are abandoned when replaced and never freed individually.

use alloc::vec::Vec;
use core::alloc::Layout;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use core::ptr;

use crate::arena::Arena;

/// Where a value's buffer lives, derived from the record's arena and the
/// field's donation bit.
#[derive(Clone, Copy)]
pub(crate) enum Backing<'s, 'a> {
    Arena(&'s Arena<'a>),
    Heap,
}

impl<'s, 'a> Backing<'s, 'a> {
    #[inline(always)]
    pub(crate) fn of(arena: Option<&'s Arena<'a>>, donated: bool) -> Self {
        match arena {
            Some(arena) if donated => Backing::Arena(arena),
            _ => Backing::Heap,
        }
    }

    pub(crate) fn is_arena(&self) -> bool {
        matches!(self, Backing::Arena(_))
    }

    /// Two values may trade buffers bitwise iff neither side would end up
    /// holding memory its owner cannot account for.
    pub(crate) fn can_exchange(&self, other: &Backing) -> bool {
        match (self, other) {
            (Backing::Heap, Backing::Heap) => true,
            (Backing::Arena(a), Backing::Arena(b)) => ptr::addr_eq(*a, *b),
            _ => false,
        }
    }
}

// `ptr` is null iff `cap == 0`.
#[repr(C)]
pub struct StringValue {
    ptr: *mut u8,
    len: usize,
    cap: usize,
}

unsafe impl Send for StringValue {}
unsafe impl Sync for StringValue {}

impl StringValue {
    pub const fn new() -> Self {
        StringValue {
            ptr: ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }

    pub const fn as_bytes(&self) -> &[u8] {
        if self.cap == 0 {
            &[]
        } else {
            unsafe { core::slice::from_raw_parts(self.ptr, self.len) }
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        self.cap
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Length goes to zero, the buffer stays.
    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    /// Overwrite the content with `bytes`, growing from `backing` if the current
    /// buffer is too small.
    pub(crate) fn assign(&mut self, bytes: &[u8], backing: Backing) {
        match backing {
            Backing::Arena(arena) => {
                if bytes.len() > self.cap {
                    // The old buffer is arena memory, leave it to the arena.
                    let new_cap = bytes.len().max(2 * self.cap);
                    let layout = Layout::array::<u8>(new_cap).expect("capacity overflow");
                    self.ptr = arena.alloc_raw(layout).as_ptr();
                    self.cap = new_cap;
                }
                if !bytes.is_empty() {
                    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr, bytes.len()) };
                }
                self.len = bytes.len();
            }
            Backing::Heap => {
                let mut v = unsafe { self.take_heap() };
                v.clear();
                v.extend_from_slice(bytes);
                self.put_heap(v);
            }
        }
    }

    /// Make the buffer heap owned, copying it out of the arena if needed.
    pub(crate) fn make_heap(&mut self, backing: Backing) {
        if backing.is_arena() {
            let v = self.as_bytes().to_vec();
            *self = StringValue::new();
            self.put_heap(v);
        }
    }

    /// Run the destructor. Arena memory is left to the arena.
    pub(crate) fn destroy(&mut self, backing: Backing) {
        match backing {
            Backing::Arena(_) => *self = StringValue::new(),
            Backing::Heap => drop(unsafe { self.take_heap() }),
        }
    }

    /// Move the content out as an owned `Vec`, leaving the value empty.
    pub(crate) fn take(&mut self, backing: Backing) -> Vec<u8> {
        match backing {
            Backing::Arena(_) => {
                let v = self.as_bytes().to_vec();
                *self = StringValue::new();
                v
            }
            Backing::Heap => unsafe { self.take_heap() },
        }
    }

    /// Reassemble the heap buffer as a `Vec`, leaving the value empty.
    ///
    /// # Safety
    ///
    /// The buffer must be heap owned.
    pub(crate) unsafe fn take_heap(&mut self) -> Vec<u8> {
        let v = if self.cap == 0 {
            Vec::new()
        } else {
            unsafe { Vec::from_raw_parts(self.ptr, self.len, self.cap) }
        };
        *self = StringValue::new();
        v
    }

    /// Adopt the buffer of `v`. Any buffer currently held is forgotten, so
    /// callers take or destroy it first.
    pub(crate) fn put_heap(&mut self, v: Vec<u8>) {
        let mut v = ManuallyDrop::new(v);
        if v.capacity() == 0 {
            *self = StringValue::new();
        } else {
            *self = StringValue {
                ptr: v.as_mut_ptr(),
                len: v.len(),
                cap: v.capacity(),
            };
        }
    }
}

impl Default for StringValue {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for StringValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "{:?}", self.as_bytes()),
        }
    }
}

/// Exclusive access to a heap owned value as a `Vec<u8>`.
///
/// The buffer is moved out of the field for the guard's lifetime and put back on
/// drop. If the guard is leaked the field reads empty and the buffer leaks.
pub struct MutableString<'a> {
    value: ManuallyDrop<Vec<u8>>,
    origin: &'a mut StringValue,
}

impl<'a> MutableString<'a> {
    /// # Safety
    ///
    /// `origin` must be heap owned.
    pub(crate) unsafe fn new(origin: &'a mut StringValue) -> Self {
        let value = ManuallyDrop::new(unsafe { origin.take_heap() });
        MutableString { value, origin }
    }
}

impl Deref for MutableString<'_> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl DerefMut for MutableString<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

impl Drop for MutableString<'_> {
    fn drop(&mut self) {
        self.origin
            .put_heap(unsafe { ManuallyDrop::take(&mut self.value) });
    }
}
