//! The frame envelope: authenticated, optionally-compressed framing around
//! one codec-encoded message (spec §4.2).
//!
//! Wire layout, outermost to innermost:
//! `[optional 4-byte 0x80 000000 compression marker] [zero-padded-to-4 payload bytes] [4-byte little-endian nonce]`
//! where the payload (compressed or not) was encrypted in place with XXTEA
//! keyed by `SHA1(password || nonce_decimal)`.

mod btea;

use rand::Rng;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};
use thiserror::Error;

/// Wire-format version. A mismatch on decode is treated as a malformed
/// frame and rejected (spec §4.2, §7).
pub const WIRE_VERSION: u8 = 1;

/// Total envelope size hard cap (spec §4.2, §6).
pub const MAX_FRAME_LEN: usize = 8000;

/// Messages larger than this (pre-padding) are opportunistically
/// compressed (spec §4.2 step 2).
pub const COMPRESSION_THRESHOLD: usize = 500;

const COMPRESSION_MARKER: [u8; 4] = [0x80, 0x00, 0x00, 0x00];
const NONCE_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN}-byte cap")]
    Oversize(usize),
    #[error("frame truncated: need at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("decrypted payload failed authentication (wrong password or corrupt frame)")]
    BadCiphertext,
    #[error("compressed payload failed to inflate")]
    BadCompression,
}

pub type Result<T> = std::result::Result<T, FrameError>;

fn derive_key(password: &str, nonce: u32) -> [u32; 5] {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut words = [0u32; 5];
    for (i, chunk) in digest.chunks(4).enumerate() {
        words[i] = u32::from_le_bytes(chunk.try_into().unwrap());
    }
    words
}

fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

fn compress(payload: &[u8]) -> Option<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(payload).ok()?;
    let compressed = enc.finish().ok()?;
    if compressed.len() + COMPRESSION_MARKER.len() < payload.len() {
        let mut out = Vec::with_capacity(compressed.len() + 4);
        out.extend_from_slice(&COMPRESSION_MARKER);
        out.extend_from_slice(&compressed);
        Some(out)
    } else {
        None
    }
}

fn decompress(framed: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    let mut dec = ZlibDecoder::new(&framed[4..]);
    let mut out = Vec::new();
    dec.read_to_end(&mut out).map_err(|_| FrameError::BadCompression)?;
    Ok(out)
}

/// Encrypts and frames one already codec-encoded message body.
///
/// `version`/`seq`/`op`/`cluster_id`/`sender_id` header fields are the
/// caller's responsibility (they live inside the codec archive per spec
/// §6); this layer only handles the outer authenticated envelope.
pub fn encode(payload: &[u8], password: &str, rng: &mut impl Rng) -> Result<Vec<u8>> {
    let mut body = if payload.len() > COMPRESSION_THRESHOLD {
        compress(payload).unwrap_or_else(|| payload.to_vec())
    } else {
        payload.to_vec()
    };
    pad4(&mut body);

    let nonce: u32 = rng.gen_range(0..=i32::MAX as u32);
    let key = derive_key(password, nonce);
    let mut words = btea::bytes_to_words_le(&body);
    btea::encrypt(&mut words, &key);
    let mut out = btea::words_to_bytes_le(&words, body.len());

    out.extend_from_slice(&nonce.to_le_bytes());

    if out.len() > MAX_FRAME_LEN {
        return Err(FrameError::Oversize(out.len()));
    }
    Ok(out)
}

/// Decrypts and unframes, returning the inner codec-encoded payload bytes.
pub fn decode(frame: &[u8], password: &str) -> Result<Vec<u8>> {
    if frame.len() > MAX_FRAME_LEN {
        return Err(FrameError::Oversize(frame.len()));
    }
    if frame.len() < NONCE_LEN + 4 {
        return Err(FrameError::Truncated { needed: NONCE_LEN + 4, got: frame.len() });
    }
    let split = frame.len() - NONCE_LEN;
    let (ciphertext, nonce_bytes) = frame.split_at(split);
    let nonce = u32::from_le_bytes(nonce_bytes.try_into().unwrap());

    let key = derive_key(password, nonce);
    let mut words = btea::bytes_to_words_le(ciphertext);
    btea::decrypt(&mut words, &key);
    let plain = btea::words_to_bytes_le(&words, ciphertext.len());

    if plain.len() >= 4 && plain[..4] == COMPRESSION_MARKER {
        decompress(&plain)
    } else {
        // Trailing zero padding is harmless for the codec decoder, which
        // knows its own length from the BigList header; strip nothing here.
        Ok(plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn round_trips_small_message() {
        let mut r = rng();
        let msg = b"hello cluster";
        let frame = encode(msg, "s3cret", &mut r).unwrap();
        let got = decode(&frame, "s3cret").unwrap();
        assert_eq!(&got[..msg.len()], msg);
    }

    #[test]
    fn wrong_password_fails_or_garbles() {
        let mut r = rng();
        let msg = b"hello cluster, this is a longer authenticated payload";
        let frame = encode(msg, "s3cret", &mut r).unwrap();
        let got = decode(&frame, "wrong").unwrap();
        assert_ne!(&got[..msg.len().min(got.len())], &msg[..msg.len().min(got.len())]);
    }

    #[test]
    fn large_message_gets_compressed() {
        let mut r = rng();
        let msg = vec![b'a'; 2000]; // highly compressible, over the threshold
        let frame = encode(&msg, "pw", &mut r).unwrap();
        assert!(frame.len() < msg.len());
        let got = decode(&frame, "pw").unwrap();
        assert_eq!(&got[..msg.len()], msg.as_slice());
    }

    #[test]
    fn truncation_by_any_amount_fails_or_garbles() {
        let mut r = rng();
        let msg = b"authenticate this please, a bit longer than one word";
        let frame = encode(msg, "pw", &mut r).unwrap();
        for cut in 1..frame.len() {
            let truncated = &frame[..frame.len() - cut];
            match decode(truncated, "pw") {
                Err(_) => {}
                Ok(got) => assert_ne!(got, decode(&frame, "pw").unwrap()),
            }
        }
    }

    #[test]
    fn oversize_frame_is_rejected() {
        let big = vec![0u8; MAX_FRAME_LEN + 1];
        assert_eq!(decode(&big, "pw"), Err(FrameError::Oversize(MAX_FRAME_LEN + 1)));
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip(msg in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..400), pw in "[a-zA-Z0-9]{1,20}") {
            let mut r = rng();
            let frame = encode(&msg, &pw, &mut r).unwrap();
            let got = decode(&frame, &pw).unwrap();
            proptest::prop_assert_eq!(&got[..msg.len()], msg.as_slice());
        }
    }
}
