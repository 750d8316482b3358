//! Position-dependent XOR that hides the embedded catalog from casual
//! inspection (`strings`, file-type sniffing). Not a security boundary.
//!
//! A blob is `key ++ payload'` where `payload'[j] = payload[j] ^ key[j % KEY_LEN]`.
//! Decoding XORs every byte `i` with the *pre-transform* byte at `i % KEY_LEN`,
//! so the key region decodes to zeros and is dropped.

use thiserror::Error;

/// Width of the XOR key carried at the front of every blob.
pub const KEY_LEN: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObfuscationError {
    #[error("blob is {0} bytes, too short to carry the XOR key and a payload")]
    TooShort(usize),
}

/// XOR `data[j]` with `key[j % key.len()]` in place. Applying it twice with the
/// same key is the identity.
pub fn xor_with_key(data: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    for (j, b) in data.iter_mut().enumerate() {
        *b ^= key[j % key.len()];
    }
}

/// Recover the payload from an obfuscated blob.
pub fn deobfuscate(blob: &[u8]) -> Result<Vec<u8>, ObfuscationError> {
    if blob.len() <= KEY_LEN {
        return Err(ObfuscationError::TooShort(blob.len()));
    }

    // Copy the key before touching anything so no byte is read after it has
    // been transformed.
    let key: [u8; KEY_LEN] = std::array::from_fn(|i| blob[i]);

    let mut payload = blob[KEY_LEN..].to_vec();
    xor_with_key(&mut payload, &key);
    Ok(payload)
}

/// Produce a blob that [`deobfuscate`] turns back into `payload`.
pub fn obfuscate(payload: &[u8], key: &[u8; KEY_LEN]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(KEY_LEN + payload.len());
    blob.extend_from_slice(key);
    let start = blob.len();
    blob.extend_from_slice(payload);
    xor_with_key(&mut blob[start..], key);
    blob
}
