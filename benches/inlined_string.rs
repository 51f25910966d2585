use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use inlinestr::arena::Arena;
use inlinestr::test_utils::{Global, Person};

const WORDS: [&str; 6] = [
    "alpha",
    "a somewhat longer value",
    "x",
    "",
    "user@example.com",
    "the longest value in the whole rotation of words",
];

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(WORDS.len() as u64));

    group.bench_function("arena/donated", |b| {
        let arena = Arena::new(&Global);
        let person = Person::new_in(&arena);
        b.iter(|| {
            for word in WORDS {
                person.clear_name();
                person.set_name(black_box(word));
            }
            black_box(person.name().len())
        })
    });

    group.bench_function("arena/undonated", |b| {
        let arena = Arena::new(&Global);
        let person = Person::new_in(&arena);
        person.mutable_name().clear();
        b.iter(|| {
            for word in WORDS {
                person.clear_name();
                person.set_name(black_box(word));
            }
            black_box(person.name().len())
        })
    });

    group.bench_function("heap", |b| {
        let mut person = Person::new();
        b.iter(|| {
            for word in WORDS {
                person.clear_name();
                person.set_name(black_box(word));
            }
            black_box(person.name().len())
        })
    });

    group.finish();
}

fn bench_mutable(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutable");

    // A fresh record each round so every call pays for the undonation.
    group.bench_function("first_call", |b| {
        let arena = Arena::new(&Global);
        b.iter(|| {
            let person = Person::new_in(&arena);
            person.set_name("content copied out of the arena");
            person.mutable_name().push(b'!');
            black_box(person.name().len())
        })
    });

    group.bench_function("steady_state", |b| {
        let mut person = Person::new();
        person.set_name("content");
        b.iter(|| {
            let mut m = person.mutable_name();
            m.push(b'!');
            m.pop();
            black_box(m.len())
        })
    });

    group.finish();
}

fn bench_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("swap");

    group.bench_function("same_arena", |b| {
        let arena = Arena::new(&Global);
        let left = Person::new_in(&arena);
        let right = Person::new_in(&arena);
        left.set_name("left");
        right.set_name("right");
        b.iter(|| {
            left.swap(right);
            black_box(left.name().len())
        })
    });

    group.bench_function("heap", |b| {
        let mut left = Person::new();
        let mut right = Person::new();
        left.set_name("left");
        right.set_name("right");
        b.iter(|| {
            left.swap(&mut right);
            black_box(left.name().len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_mutable, bench_swap);
criterion_main!(benches);
