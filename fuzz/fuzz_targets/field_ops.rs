#![no_main]

use arbitrary::Arbitrary;
use inlinestr::arena::Arena;
use inlinestr::test_utils::{Global, Person};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    Set(bool, String),
    SetOwned(bool, String),
    Append(bool, Vec<u8>),
    SetAllocated(bool, Option<Vec<u8>>),
    Release(bool),
    Clear(bool),
    Swap,
}

#[derive(Arbitrary, Debug)]
struct Input {
    same_arena: bool,
    ops: Vec<(bool, Op)>,
}

#[derive(Default)]
struct Model {
    name: Vec<u8>,
    email: Vec<u8>,
}

impl Model {
    fn field(&mut self, email: bool) -> &mut Vec<u8> {
        if email { &mut self.email } else { &mut self.name }
    }
}

fn apply(person: &mut Person<'_>, model: &mut Model, op: Op) {
    match op {
        Op::Set(email, s) => {
            if email {
                person.set_email(&s);
            } else {
                person.set_name(&s);
            }
            *model.field(email) = s.into_bytes();
        }
        Op::SetOwned(email, s) => {
            *model.field(email) = s.clone().into_bytes();
            if email {
                person.set_email_owned(s);
            } else {
                person.set_name_owned(s);
            }
        }
        Op::Append(email, bytes) => {
            let mut m = if email {
                person.mutable_email()
            } else {
                person.mutable_name()
            };
            m.extend_from_slice(&bytes);
            model.field(email).extend_from_slice(&bytes);
        }
        Op::SetAllocated(email, value) => {
            *model.field(email) = value.clone().unwrap_or_default();
            let value = value.map(Box::new);
            if email {
                person.set_allocated_email(value);
            } else {
                person.set_allocated_name(value);
            }
        }
        Op::Release(email) => {
            let released = if email {
                person.release_email()
            } else {
                person.release_name()
            };
            assert_eq!(*released, *model.field(email));
            model.field(email).clear();
        }
        Op::Clear(email) => {
            if email {
                person.clear_email();
            } else {
                person.clear_name();
            }
            model.field(email).clear();
        }
        Op::Swap => unreachable!(),
    }
}

fuzz_target!(|input: Input| {
    let arena_a = Arena::new(&Global);
    let arena_b = Arena::new(&Global);
    let a = Person::new_in(&arena_a);
    let b = Person::new_in(if input.same_arena { &arena_a } else { &arena_b });
    let mut models = [Model::default(), Model::default()];

    for (right, op) in input.ops {
        let bits_before = [a.donation_bits(), b.donation_bits()];
        if let Op::Swap = op {
            a.swap(b);
            models.swap(0, 1);
        } else if right {
            apply(b, &mut models[1], op);
        } else {
            apply(a, &mut models[0], op);
        }

        // Bits are only ever cleared.
        assert_eq!(a.donation_bits() & !bits_before[0], 0);
        assert_eq!(b.donation_bits() & !bits_before[1], 0);
        for (person, model) in [(&*a, &models[0]), (&*b, &models[1])] {
            assert_eq!(person.name(), model.name.as_slice());
            assert_eq!(person.email(), model.email.as_slice());
            if person.donation_bits() != 0b11 {
                assert!(person.arena_dtor_registered());
            }
        }
    }
});
