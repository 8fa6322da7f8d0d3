use crate::error::{AdbError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::{BufMut, BytesMut};
use log::*;
use rsa::hazmat::rsa_decrypt_and_check;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Modulus size the device auth protocol expects
pub const KEY_LENGTH_BITS: usize = 2048;
pub const KEY_LENGTH_BYTES: usize = KEY_LENGTH_BITS / 8;
pub const KEY_LENGTH_WORDS: usize = KEY_LENGTH_BYTES / 4;

/// AUTH/TOKEN challenges are SHA-1 sized
pub const TOKEN_SIZE: usize = 20;

/// len + n0inv + n[] + rr[] + exponent
pub const PUBLIC_KEY_STRUCT_LENGTH: usize = 4 + 4 + KEY_LENGTH_BYTES * 2 + 4;

const PUBLIC_KEY_SUFFIX: &str = " unknown@unknown";

const SHA1_DIGEST_INFO: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];

/// `00 01 FF.. 00` followed by the SHA-1 DigestInfo prefix; the token fills
/// the last 20 bytes of the block.
pub const SIGNATURE_PADDING: [u8; KEY_LENGTH_BYTES - TOKEN_SIZE] = signature_padding();

const fn signature_padding() -> [u8; KEY_LENGTH_BYTES - TOKEN_SIZE] {
    let mut padding = [0xffu8; KEY_LENGTH_BYTES - TOKEN_SIZE];
    padding[0] = 0x00;
    padding[1] = 0x01;

    let prefix_start = padding.len() - SHA1_DIGEST_INFO.len();
    padding[prefix_start - 1] = 0x00;

    let mut i = 0;
    while i < SHA1_DIGEST_INFO.len() {
        padding[prefix_start + i] = SHA1_DIGEST_INFO[i];
        i += 1;
    }
    padding
}

/// RSA key pair used to answer the device's AUTH challenges.
pub struct AdbCrypto {
    key: RsaPrivateKey,
    public_key: Vec<u8>,
}

impl AdbCrypto {
    /// Generate a fresh 2048-bit key with exponent 65537
    pub fn generate() -> Result<Self> {
        info!("Generating {}-bit RSA key pair", KEY_LENGTH_BITS);
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), KEY_LENGTH_BITS)?;
        Self::from_private_key(key)
    }

    pub fn from_private_key(mut key: RsaPrivateKey) -> Result<Self> {
        // CRT values for signing
        key.precompute()?;
        let public_key = encode_public_key(&key.to_public_key())?;
        Ok(Self { key, public_key })
    }

    /// Parse a PEM private key, PKCS#8 (`adbkey`) or PKCS#1.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| AdbError::Crypto(e.to_string()))?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| AdbError::Crypto(e.to_string()))?
        };
        Self::from_private_key(key)
    }

    /// Load the private key stored at `path`
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading ADB key from {}", path.display());
        let pem = fs::read_to_string(path)?;
        let crypto = Self::from_pem(&pem)?;
        info!("Loaded ADB key {} ({})", path.display(), crypto.fingerprint());
        Ok(crypto)
    }

    /// Store the private key at `path` and the ADB public key text next to it
    /// as `<path>.pub`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let pem = self
            .key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AdbError::Crypto(e.to_string()))?;
        fs::write(path, pem.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        fs::write(public_key_path(path), format!("{}\n", self.public_key_text()))?;
        debug!("Saved ADB key pair to {}", path.display());
        Ok(())
    }

    /// Load the key at `path`, creating and saving a new pair if it is missing
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let crypto = Self::generate()?;
        crypto.save(path)?;
        info!("Created new ADB key {}", path.display());
        Ok(crypto)
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// Sign an AUTH/TOKEN challenge.
    ///
    /// The device checks `signature^e mod n` against the fixed padding plus
    /// the token, so this is the raw private-key transform of that block.
    pub fn sign_token(&self, token: &[u8]) -> Result<Vec<u8>> {
        if token.len() != TOKEN_SIZE {
            return Err(AdbError::Auth(format!(
                "token must be {} bytes, got {}",
                TOKEN_SIZE,
                token.len()
            )));
        }

        let mut block = Vec::with_capacity(KEY_LENGTH_BYTES);
        block.extend_from_slice(&SIGNATURE_PADDING);
        block.extend_from_slice(token);

        // Blinded CRT transform, checked against the public key before use
        let message = BigUint::from_bytes_be(&block);
        let signature =
            rsa_decrypt_and_check(&self.key, Some(&mut rand::thread_rng()), &message)?;
        Ok(left_pad(signature.to_bytes_be(), KEY_LENGTH_BYTES))
    }

    /// The 524-byte `RSAPublicKey` struct the device stores
    pub fn public_key_struct(&self) -> &[u8] {
        &self.public_key
    }

    /// Base64 struct plus user@host suffix, as written to `adbkey.pub`
    pub fn public_key_text(&self) -> String {
        let mut text = STANDARD.encode(&self.public_key);
        text.push_str(PUBLIC_KEY_SUFFIX);
        text
    }

    /// AUTH/RSA_PUBLIC payload: the key text terminated with NUL
    pub fn public_key_payload(&self) -> Vec<u8> {
        let mut payload = self.public_key_text().into_bytes();
        payload.push(0);
        payload
    }

    /// SHA-256 of the public key struct, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.public_key);
        format!("{:x}", hasher.finalize())
    }
}

/// `<path>.pub`
pub fn public_key_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".pub");
    PathBuf::from(name)
}

/// Convert a public key to the device's binary layout:
///
/// ```text
/// u32 len;              // modulus length in 32-bit words
/// u32 n0inv;            // -1 / n[0] mod 2^32
/// u32 n[len];           // modulus, little-endian words
/// u32 rr[len];          // R^2 mod n, R = 2^(32 * len)
/// u32 exponent;
/// ```
pub fn encode_public_key(key: &RsaPublicKey) -> Result<Vec<u8>> {
    let n = key.n();
    if n.bits() != KEY_LENGTH_BITS {
        return Err(AdbError::Crypto(format!(
            "modulus must be {} bits, got {}",
            KEY_LENGTH_BITS,
            n.bits()
        )));
    }

    let exponent = key.e().to_bytes_le();
    if exponent.len() > 4 {
        return Err(AdbError::Crypto("public exponent does not fit in 32 bits".into()));
    }

    let modulus = to_words_le(n, KEY_LENGTH_WORDS);
    let n0 = u32::from_le_bytes([modulus[0], modulus[1], modulus[2], modulus[3]]);

    let r_squared = (BigUint::from(1u32) << (2 * KEY_LENGTH_BITS)) % n;

    let mut buf = BytesMut::with_capacity(PUBLIC_KEY_STRUCT_LENGTH);
    buf.put_u32_le(KEY_LENGTH_WORDS as u32);
    buf.put_u32_le(montgomery_n0inv(n0));
    buf.put_slice(&modulus);
    buf.put_slice(&to_words_le(&r_squared, KEY_LENGTH_WORDS));
    buf.put_slice(&zero_extend_le(exponent, 4));

    Ok(buf.to_vec())
}

/// `-(n0^-1) mod 2^32` for odd `n0`.
///
/// Newton's iteration `x = x * (2 - n0 * x)` doubles the number of correct
/// low bits each round; `x = n0` already holds 3 (n0 * n0 = 1 mod 8), so
/// four rounds reach 48 > 32.
pub fn montgomery_n0inv(n0: u32) -> u32 {
    let mut inverse = n0;
    for _ in 0..4 {
        inverse = inverse.wrapping_mul(2u32.wrapping_sub(n0.wrapping_mul(inverse)));
    }
    inverse.wrapping_neg()
}

fn to_words_le(value: &BigUint, words: usize) -> Vec<u8> {
    zero_extend_le(value.to_bytes_le(), words * 4)
}

fn zero_extend_le(mut bytes: Vec<u8>, len: usize) -> Vec<u8> {
    bytes.resize(len, 0);
    bytes
}

fn left_pad(bytes: Vec<u8>, len: usize) -> Vec<u8> {
    if bytes.len() >= len {
        return bytes;
    }
    let mut padded = vec![0u8; len - bytes.len()];
    padded.extend_from_slice(&bytes);
    padded
}
