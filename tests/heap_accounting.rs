//! Heap accounting for field buffers.
//!
//! Field buffers on the heap come from the global allocator, so this binary
//! installs a counting one. Counters are per thread, which keeps the tests
//! independent under the parallel test runner.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use inlinestr::arena::Arena;
use inlinestr::test_utils::{Global, Person};

struct CountingGlobal;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for CountingGlobal {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = LIVE.try_with(|c| c.set(c.get() + 1));
        let _ = ALLOCATIONS.try_with(|c| c.set(c.get() + 1));
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let _ = LIVE.try_with(|c| c.set(c.get() - 1));
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|c| c.set(c.get() + 1));
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static GLOBAL: CountingGlobal = CountingGlobal;

fn live() -> isize {
    LIVE.with(Cell::get)
}

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

#[test]
fn test_arena_drop_frees_undonated_fields() {
    let baseline = live();
    {
        let arena = Arena::new(&Global);
        let person = Person::new_in(&arena);
        person.set_name("stays in the arena");
        person.mutable_email().extend_from_slice(b"moved to the heap");
        assert!(person.is_name_donated());
        assert!(!person.is_email_donated());
        // One arena block plus the email buffer.
        assert_eq!(live(), baseline + 2);
    }
    assert_eq!(live(), baseline);
}

#[test]
fn test_arena_without_undonation_frees_only_blocks() {
    let baseline = live();
    {
        let arena = Arena::new(&Global);
        let person = Person::new_in(&arena);
        person.set_name("a");
        person.set_email("b");
        assert_eq!(arena.dtor_count(), 0);
    }
    assert_eq!(live(), baseline);
}

#[test]
fn test_heap_record_drop_frees_fields() {
    let baseline = live();
    {
        let mut person = Person::new();
        person.set_name("copied");
        person.set_email_owned("moved".into());
        assert_eq!(live(), baseline + 2);
    }
    assert_eq!(live(), baseline);
}

#[test]
fn test_release_and_set_allocated_balance() {
    let baseline = live();
    {
        let arena = Arena::new(&Global);
        let person = Person::new_in(&arena);
        person.set_name("released later");
        let released = person.release_name();
        assert_eq!(*released, b"released later");
        person.set_allocated_email(Some(Box::new(b"adopted".to_vec())));
        person.set_allocated_email(Some(released));
        assert_eq!(person.email(), b"released later");
        person.set_name("grows on the heap after release");
    }
    assert_eq!(live(), baseline);
}

#[test]
fn test_swaps_across_arenas_and_heap_balance() {
    let baseline = live();
    {
        let arena_a = Arena::new(&Global);
        let arena_b = Arena::new(&Global);
        let a = Person::new_in(&arena_a);
        let b = Person::new_in(&arena_b);
        let mut c = Person::new();
        a.set_name("a name");
        a.set_email_owned("a email".into());
        b.set_name("b name");
        c.set_name("c name");
        c.set_email("c email");

        a.swap(b);
        b.swap(&mut c);
        a.swap(&mut c);
        a.swap(b);

        let mut names = vec![a.name().to_vec(), b.name().to_vec(), c.name().to_vec()];
        names.sort();
        assert_eq!(names, [b"a name".to_vec(), b"b name".to_vec(), b"c name".to_vec()]);
        drop(names);
    }
    assert_eq!(live(), baseline);
}

#[test]
fn test_heap_clear_then_set_does_not_allocate() {
    let mut person = Person::new();
    person.set_name("warm up the heap buffer");
    let before = allocations();
    for word in ["a", "bb", "ccc", "warm up the heap buffer"] {
        person.clear_name();
        person.set_name(word);
    }
    assert_eq!(allocations(), before);
    assert_eq!(person.name(), b"warm up the heap buffer");
}

#[test]
fn test_arena_clear_then_set_does_not_allocate() {
    let arena = Arena::new(&Global);
    let person = Person::new_in(&arena);
    person.set_name("warm up the arena buffer");
    let before = allocations();
    for word in ["a", "bb", "ccc", "warm up the arena buffer"] {
        person.clear_name();
        person.set_name(word);
    }
    assert_eq!(allocations(), before);
}
