//! Compact self-describing binary value encoding.
//!
//! Every chunk begins with a header byte whose high nibble names a [`Tag`]
//! and whose low nibble carries either an inline value (`SmallInt`,
//! `SmallString`) or the high bits of a variable-length size. Containers
//! (`List`, `BigList`) are written with [`Encoder::push_list`]/`pop_list`
//! and walked back with [`Decoder`]/[`Chunk::items`].

mod decoder;
mod encoder;
mod error;
mod tag;

pub use decoder::{Chunk, Decoder};
pub use encoder::{ContainerHandle, Encoder};
pub use error::{CodecError, Result};
pub use tag::{MAX_BIGLIST_PAYLOAD, MAX_LIST_PAYLOAD, MAX_SMALL_STRING, Tag};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_basics_example() {
        // Encode [1, "hello", "wee", ["one","tu"]]
        let mut enc = Encoder::new();
        enc.uint(1);
        enc.string("hello");
        enc.string("wee");
        let inner = enc.push_list();
        enc.string("one");
        enc.string("tu");
        enc.pop_list(inner).unwrap();
        let archive = enc.done().unwrap();
        assert_eq!(archive.len(), 23);

        let mut dec = Decoder::from_archive(&archive).unwrap();
        let a = dec.next().unwrap().unwrap();
        assert_eq!(a.as_uint().unwrap(), 1);
        let b = dec.next().unwrap().unwrap();
        assert_eq!(b.as_str().unwrap(), "hello");
        let c = dec.next().unwrap().unwrap();
        assert_eq!(c.as_str().unwrap(), "wee");
        let d = dec.next().unwrap().unwrap();
        let mut items = d.items().unwrap();
        assert_eq!(items.next().unwrap().unwrap().as_str().unwrap(), "one");
        assert_eq!(items.next().unwrap().unwrap().as_str().unwrap(), "tu");
        assert!(items.next().is_none());
        assert!(dec.next().is_none());
    }

    #[test]
    fn round_trip_scalars() {
        let mut enc = Encoder::new();
        enc.null();
        enc.bool(true);
        enc.bool(false);
        enc.uint(0);
        enc.uint(15);
        enc.uint(16);
        enc.uint(255);
        enc.uint(256);
        enc.uint(70000);
        enc.int32(-42);
        enc.time_ms(1_700_000_000_000);
        enc.uuid(uuid::Uuid::nil());
        enc.uuid(uuid::Uuid::from_u128(0xdead_beef));
        let archive = enc.done().unwrap();

        let mut dec = Decoder::from_archive(&archive).unwrap();
        assert_eq!(dec.next().unwrap().unwrap().tag(), Tag::Null);
        assert!(dec.next().unwrap().unwrap().as_bool().unwrap());
        assert!(!dec.next().unwrap().unwrap().as_bool().unwrap());
        assert_eq!(dec.next().unwrap().unwrap().as_uint().unwrap(), 0);
        assert_eq!(dec.next().unwrap().unwrap().as_uint().unwrap(), 15);
        assert_eq!(dec.next().unwrap().unwrap().as_uint().unwrap(), 16);
        assert_eq!(dec.next().unwrap().unwrap().as_uint().unwrap(), 255);
        assert_eq!(dec.next().unwrap().unwrap().as_uint().unwrap(), 256);
        assert_eq!(dec.next().unwrap().unwrap().as_uint().unwrap(), 70000);
        assert_eq!(dec.next().unwrap().unwrap().as_int32().unwrap(), -42);
        assert_eq!(dec.next().unwrap().unwrap().as_time_ms().unwrap(), 1_700_000_000_000);
        assert!(dec.next().unwrap().unwrap().as_uuid().unwrap().is_nil());
        assert_eq!(
            dec.next().unwrap().unwrap().as_uuid().unwrap(),
            uuid::Uuid::from_u128(0xdead_beef)
        );
    }

    #[test]
    fn small_int_auto_narrows() {
        let mut enc = Encoder::new();
        enc.uint(10);
        let archive = enc.done().unwrap();
        // tag byte for SmallInt(10): top nibble 2 (SmallInt), low nibble 10
        assert_eq!(archive[3], (Tag::SmallInt.as_nibble() << 4) | 10);
    }

    #[test]
    fn list_upgrades_to_biglist_on_overflow() {
        let mut enc = Encoder::new();
        let handle = enc.push_list();
        for _ in 0..2000 {
            enc.bytes(&[0u8; 3]); // 2 header + 3 body = 5 bytes/item > 4095 total
        }
        enc.pop_list(handle).unwrap();
        let archive = enc.done().unwrap();
        let mut dec = Decoder::from_archive(&archive).unwrap();
        let list_chunk = dec.next().unwrap().unwrap();
        assert_eq!(list_chunk.tag(), Tag::BigList);
        assert_eq!(list_chunk.items().unwrap().count(), 2000);
    }

    #[test]
    fn bad_tag_is_rejected() {
        let bytes = [0xF0u8]; // tag nibble 15, reserved
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(dec.next(), Some(Err(CodecError::BadTag(15)))));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let bytes = [Tag::Uint64.as_nibble() << 4, 1, 2, 3]; // needs 8 body bytes, only 3 given
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(dec.next(), Some(Err(CodecError::Truncated { .. }))));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut enc = Encoder::new();
        enc.string("oops");
        let archive = enc.done().unwrap();
        let mut dec = Decoder::from_archive(&archive).unwrap();
        let chunk = dec.next().unwrap().unwrap();
        assert!(matches!(chunk.as_uint(), Err(CodecError::TypeMismatch { .. })));
    }

    proptest::proptest! {
        #[test]
        fn prop_uint_round_trips(v: u64) {
            let mut enc = Encoder::new();
            enc.uint(v);
            let archive = enc.done().unwrap();
            let mut dec = Decoder::from_archive(&archive).unwrap();
            let got = dec.next().unwrap().unwrap().as_uint().unwrap();
            proptest::prop_assert_eq!(got, v);
        }

        #[test]
        fn prop_string_round_trips(s in "[a-zA-Z0-9 ]{0,200}") {
            let mut enc = Encoder::new();
            enc.string(&s);
            let archive = enc.done().unwrap();
            let mut dec = Decoder::from_archive(&archive).unwrap();
            let got = dec.next().unwrap().unwrap().as_str().unwrap().to_string();
            proptest::prop_assert_eq!(got, s);
        }

        #[test]
        fn prop_distinct_values_differ(a: u64, b: u64) {
            proptest::prop_assume!(a != b);
            let mut ea = Encoder::new();
            ea.uint(a);
            let mut eb = Encoder::new();
            eb.uint(b);
            proptest::prop_assert_ne!(ea.done().unwrap(), eb.done().unwrap());
        }
    }
}
