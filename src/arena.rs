//! Bump arena for records and their donated string buffers.
//!
//! Allocation takes `&self`: the cursor lives in `Cell`s, so several records
//! and the buffers of their fields can hold the same arena at once, and a swap
//! between two records of one arena sees both through shared references.
//! Blocks come from a `&dyn Allocator` chosen by the caller. The first block
//! holds [`DEFAULT_BLOCK_SIZE`] bytes unless configured otherwise, and each new
//! block doubles up to [`MAX_BLOCK_SIZE`]. A request that does not fit gets a
//! block of its own size.
//!
//! Nothing placed in the arena is dropped. A record whose field moved to the
//! heap registers its cleanup with [`Arena::register_dtor`]. Registered
//! callbacks run newest first when the arena is dropped, while every block is
//! still live, and only then are the blocks returned to the allocator.
//!
//! # Example
//!
//! ```
//! use inlinestr::arena::Arena;
//! use inlinestr::test_utils::Global;
//!
//! let arena = Arena::new(&Global);
//! let x = arena.alloc(42u64);
//! *x += 1;
//! assert_eq!(*x, 43);
//!
//! let s = arena.alloc_slice_copy(b"hello");
//! assert_eq!(s, b"hello");
//! ```

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::{self, NonNull};

use crate::Allocator;

/// Size of the first block requested from the underlying allocator.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Blocks double in size until they reach this cap.
pub const MAX_BLOCK_SIZE: usize = 1 << 20;

pub struct Arena<'a> {
    current: Cell<*mut MemBlock>,
    cursor: Cell<*mut u8>,
    end: Cell<*mut u8>,
    dtors: Cell<*mut DtorNode>,
    next_block_size: Cell<usize>,
    bytes_allocated: Cell<usize>,
    allocator: &'a dyn Allocator,
}

// Mem block is a block of contiguous memory allocated from the underlying
// allocator. The header sits at the start, the bump region follows it.
#[repr(C)]
struct MemBlock {
    prev: *mut MemBlock,
    layout: Layout,
}

struct DtorNode {
    prev: *mut DtorNode,
    object: NonNull<u8>,
    dtor: unsafe fn(NonNull<u8>),
}

impl<'a> Arena<'a> {
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self::with_block_size(allocator, DEFAULT_BLOCK_SIZE)
    }

    /// Create an arena whose first block holds `block_size` bytes.
    pub fn with_block_size(allocator: &'a dyn Allocator, block_size: usize) -> Self {
        Arena {
            current: Cell::new(ptr::null_mut()),
            cursor: Cell::new(ptr::null_mut()),
            end: Cell::new(ptr::null_mut()),
            dtors: Cell::new(ptr::null_mut()),
            next_block_size: Cell::new(block_size.clamp(size_of::<MemBlock>() * 2, MAX_BLOCK_SIZE)),
            bytes_allocated: Cell::new(0),
            allocator,
        }
    }

    /// Bump allocate `layout`. The memory is uninitialized and lives until the
    /// arena is dropped.
    #[inline]
    pub fn alloc_raw(&self, layout: Layout) -> NonNull<u8> {
        self.bytes_allocated
            .set(self.bytes_allocated.get() + layout.size());
        if let Some(p) = self.try_bump(layout) {
            return p;
        }
        self.alloc_slow(layout)
    }

    #[allow(clippy::mut_from_ref)]
    pub fn alloc<T>(&self, value: T) -> &mut T {
        let p = self.alloc_raw(Layout::new::<T>()).cast::<T>();
        unsafe {
            p.as_ptr().write(value);
            &mut *p.as_ptr()
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy(&self, bytes: &[u8]) -> &mut [u8] {
        if bytes.is_empty() {
            return &mut [];
        }
        let p = self
            .alloc_raw(Layout::array::<u8>(bytes.len()).expect("capacity overflow"))
            .as_ptr();
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), p, bytes.len());
            core::slice::from_raw_parts_mut(p, bytes.len())
        }
    }

    /// Ask the arena to call `dtor(object)` when it is dropped.
    ///
    /// Registrations are not deduplicated; callers keep their own "already
    /// registered" flag (see [`crate::donation::DtorHook`]).
    ///
    /// # Safety
    ///
    /// `object` must stay valid until the arena is dropped and `dtor` must be
    /// sound to call with it exactly once at that point.
    pub unsafe fn register_dtor(&self, object: NonNull<u8>, dtor: unsafe fn(NonNull<u8>)) {
        let node = self.alloc(DtorNode {
            prev: self.dtors.get(),
            object,
            dtor,
        });
        self.dtors.set(node);
    }

    /// Total bytes handed out by `alloc_raw` so far, excluding block headers.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated.get()
    }

    pub fn block_count(&self) -> usize {
        let mut count = 0;
        let mut block = self.current.get();
        while !block.is_null() {
            count += 1;
            block = unsafe { (*block).prev };
        }
        count
    }

    pub fn dtor_count(&self) -> usize {
        let mut count = 0;
        let mut node = self.dtors.get();
        while !node.is_null() {
            count += 1;
            node = unsafe { (*node).prev };
        }
        count
    }

    #[inline(always)]
    fn try_bump(&self, layout: Layout) -> Option<NonNull<u8>> {
        let cursor = self.cursor.get();
        if cursor.is_null() {
            return None;
        }
        let pad = cursor.align_offset(layout.align());
        let available = self.end.get() as usize - cursor as usize;
        if pad > available || layout.size() > available - pad {
            return None;
        }
        unsafe {
            let p = cursor.add(pad);
            self.cursor.set(p.add(layout.size()));
            Some(NonNull::new_unchecked(p))
        }
    }

    #[cold]
    #[inline(never)]
    fn alloc_slow(&self, layout: Layout) -> NonNull<u8> {
        let header = size_of::<MemBlock>();
        let needed = header
            .checked_add(layout.size())
            .and_then(|n| n.checked_add(layout.align()))
            .expect("capacity overflow");
        let size = self.next_block_size.get().max(needed);
        let align = align_of::<MemBlock>().max(layout.align());
        let block_layout = Layout::from_size_align(size, align).expect("capacity overflow");

        let base = match self.allocator.allocate(block_layout) {
            Ok(p) => p.cast::<u8>(),
            Err(_) => alloc::alloc::handle_alloc_error(block_layout),
        };
        let block = base.cast::<MemBlock>().as_ptr();
        unsafe {
            block.write(MemBlock {
                prev: self.current.get(),
                layout: block_layout,
            });
            self.cursor.set(base.as_ptr().add(header));
            self.end.set(base.as_ptr().add(size));
        }
        self.current.set(block);
        self.next_block_size
            .set((self.next_block_size.get() * 2).min(MAX_BLOCK_SIZE));
        tracing::trace!(size, "arena block allocated");

        self.try_bump(layout)
            .expect("fresh arena block is large enough for the request")
    }
}

impl Drop for Arena<'_> {
    fn drop(&mut self) {
        let mut node = self.dtors.get();
        let mut dtors = 0usize;
        while !node.is_null() {
            // The node lives in a block that is freed below, read it first.
            let DtorNode { prev, object, dtor } = unsafe { node.read() };
            unsafe { dtor(object) };
            node = prev;
            dtors += 1;
        }
        let mut blocks = 0usize;
        let mut block = self.current.get();
        while !block.is_null() {
            let MemBlock { prev, layout } = unsafe { block.read() };
            unsafe {
                self.allocator
                    .deallocate(NonNull::new_unchecked(block.cast::<u8>()), layout)
            };
            block = prev;
            blocks += 1;
        }
        tracing::trace!(dtors, blocks, "arena dropped");
    }
}

impl core::fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("bytes_allocated", &self.bytes_allocated())
            .field("blocks", &self.block_count())
            .field("dtors", &self.dtor_count())
            .finish()
    }
}
