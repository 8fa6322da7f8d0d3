use crate::adb::AdbCrypto;
use std::sync::{Arc, OnceLock};

/// 2048-bit PKCS#8 key used by every test that needs a key pair
pub const TEST_KEY_PEM: &str = include_str!("test_adbkey.pem");

/// `adbkey.pub` text for [`TEST_KEY_PEM`], computed independently
pub const TEST_PUBLIC_KEY: &str = include_str!("test_adbkey.pub");

/// Parsed once and shared; key parsing is slow in debug builds
pub fn test_crypto() -> Arc<AdbCrypto> {
    static CRYPTO: OnceLock<Arc<AdbCrypto>> = OnceLock::new();
    CRYPTO
        .get_or_init(|| Arc::new(AdbCrypto::from_pem(TEST_KEY_PEM).expect("fixture key parses")))
        .clone()
}

/// Deterministic non-repeating-looking bytes
pub fn sample_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// A 20-byte AUTH token
pub fn test_token() -> Vec<u8> {
    (1..=20).collect()
}

/// Test file content
pub fn test_file_content() -> Vec<u8> {
    b"This is test file content.\nLine 2\nLine 3\n".to_vec()
}
