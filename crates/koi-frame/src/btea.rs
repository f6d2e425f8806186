//! Corrected Block TEA (XXTEA), used by the frame layer as a fast symmetric
//! cipher over a LAN where a full PKI is overkill.
//!
//! Ported from the original `koi` project's `crypt.cpp`: only the first
//! four words of the key are ever referenced (the `(p & 3) ^ e` index is
//! always in `0..4`), so a 5-word key array — as produced by truncating a
//! SHA-1 digest into `u32` words — degrades gracefully to a 128-bit key.

const DELTA: u32 = 0x9e37_79b9;

fn mx(sum: u32, y: u32, z: u32, p: i32, e: u32, key: &[u32]) -> u32 {
    (((z >> 5) ^ (y << 2)).wrapping_add((y >> 3) ^ (z << 4)))
        ^ ((sum ^ y).wrapping_add(key[((p & 3) as u32 ^ e) as usize]))
}

/// Encrypts `v` in place. `v.len()` must be >= 2 for XXTEA to mix properly;
/// the frame layer always pads to a 4-byte boundary so `v` is never empty
/// when `data` is non-empty.
pub fn encrypt(v: &mut [u32], key: &[u32]) {
    let length = v.len() as i32;
    if length < 2 {
        return;
    }
    let mut sum: u32 = 0;
    let mut z = v[(length - 1) as usize];
    let mut q = 6 + 52 / length;
    while q > 0 {
        q -= 1;
        sum = sum.wrapping_add(DELTA);
        let e = (sum >> 2) & 3;
        for p in 0..length - 1 {
            let y = v[(p + 1) as usize];
            v[p as usize] = v[p as usize].wrapping_add(mx(sum, y, z, p, e, key));
            z = v[p as usize];
        }
        let y = v[0];
        let p = length - 1;
        v[p as usize] = v[p as usize].wrapping_add(mx(sum, y, z, p, e, key));
        z = v[p as usize];
    }
}

/// Decrypts `v` in place; the inverse of [`encrypt`].
pub fn decrypt(v: &mut [u32], key: &[u32]) {
    let length = v.len() as i32;
    if length < 2 {
        return;
    }
    let q = 6 + 52 / length;
    let mut sum: u32 = (q as u32).wrapping_mul(DELTA);
    while sum != 0 {
        let e = (sum >> 2) & 3;
        let mut y;
        for p in (1..length).rev() {
            let z = v[(p - 1) as usize];
            y = v[p as usize];
            v[p as usize] = v[p as usize].wrapping_sub(mx(sum, y, z, p, e, key));
        }
        let z = v[(length - 1) as usize];
        y = v[0];
        v[0] = v[0].wrapping_sub(mx(sum, y, z, 0, e, key));
        sum = sum.wrapping_sub(DELTA);
    }
}

pub fn bytes_to_words_le(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|c| {
            let mut b = [0u8; 4];
            b[..c.len()].copy_from_slice(c);
            u32::from_le_bytes(b)
        })
        .collect()
}

pub fn words_to_bytes_le(words: &[u32], out_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 4);
    for w in words {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out.truncate(out_len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = [1u32, 2, 3, 4, 5];
        let mut words = bytes_to_words_le(b"this is 16 bytes");
        let original = words.clone();
        encrypt(&mut words, &key);
        assert_ne!(words, original);
        decrypt(&mut words, &key);
        assert_eq!(words, original);
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trips(data: Vec<u32>, key: [u32; 5]) {
            let mut v = data.clone();
            if v.len() >= 2 {
                encrypt(&mut v, &key);
                decrypt(&mut v, &key);
                proptest::prop_assert_eq!(v, data);
            }
        }
    }
}
