//! Serde support for inline string fields.
//!
//! A field serializes as a string when its content is valid UTF-8 and as bytes
//! otherwise.

use crate::inlined_string::InlinedStringField;

impl serde::Serialize for InlinedStringField {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.to_str() {
            Ok(s) => serializer.serialize_str(s),
            Err(_) => serializer.serialize_bytes(self.as_bytes()),
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use crate::arena::Arena;
    use crate::inlined_string::InlinedStringField;
    use crate::test_utils::{Global, Person};

    #[test]
    fn test_text_serializes_as_string() {
        let arena = Arena::new(&Global);
        let field = InlinedStringField::with_value(b"hello", Some(&arena));
        assert_eq!(serde_json::to_string(&field).unwrap(), "\"hello\"");
    }

    #[test]
    fn test_binary_serializes_as_bytes() {
        let mut person = Person::new();
        person.mutable_name().extend_from_slice(&[0xff, 0x00]);
        assert_eq!(
            serde_json::to_string(&person).unwrap(),
            r#"{"name":[255,0],"email":""}"#
        );
    }

    #[test]
    fn test_record_serializes_as_struct() {
        let arena = Arena::new(&Global);
        let person = Person::new_in(&arena);
        person.set_name("ada");
        person.mutable_email().extend_from_slice(b"ada@example.com");
        assert_eq!(
            serde_json::to_string(&*person).unwrap(),
            r#"{"name":"ada","email":"ada@example.com"}"#
        );
    }
}
