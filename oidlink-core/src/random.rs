use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

/// Raw entropy behind every nonce.
pub const NONCE_ENTROPY_BYTES: usize = 32;

/// Fill a buffer of `len` bytes from the thread-local CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// A base64 encoded token carrying `len` bytes of entropy.
pub fn random_token(len: usize) -> String {
    STANDARD.encode(random_bytes(len))
}

/// An alphanumeric password of exactly `len` characters.
pub fn random_password(len: usize) -> String {
    let mut password = String::with_capacity(len);
    while password.len() < len {
        let chunk = STANDARD.encode(random_bytes(len + 1));
        password.extend(chunk.chars().filter(char::is_ascii_alphanumeric));
    }
    password.truncate(len);
    password
}
