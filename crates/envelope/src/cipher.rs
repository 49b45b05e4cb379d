//! Incremental AES-256-CBC with PKCS#7 padding.
//!
//! The RustCrypto `cbc` modes operate on whole blocks; the types here accept
//! arbitrarily sized input and carry the unaligned tail over to the next call.
//!
//! **No integrity protection.** CBC without a MAC is malleable: a modified
//! ciphertext decrypts to modified plaintext unless the padding check happens
//! to fail. Callers that need tamper detection must authenticate the envelope
//! out of band.

use aes::cipher::{
    block_padding::{Padding, Pkcs7},
    generic_array::GenericArray,
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use bytes::{Bytes, BytesMut};

use crate::error::CodecError;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of the CBC initialisation vector (one AES block).
pub const IV_LEN: usize = 16;

/// AES block size in bytes.
pub const BLOCK_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// A stateful cipher direction that can be fed input of any length.
pub trait BlockTransform {
    /// Feed `input` and return every byte that can be produced so far.
    ///
    /// The returned buffer may be empty when `input` does not complete a block.
    fn update(&mut self, input: &[u8]) -> Bytes;

    /// Flush the final block, consuming the context.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::CorruptCiphertext`] if the accumulated input cannot
    /// be finalised (decryption only).
    fn finalize(self) -> Result<Bytes, CodecError>;
}

/// Returns [`CodecError::InvalidKeyLength`] unless `key` is exactly [`KEY_LEN`] bytes.
pub fn check_key_len(key: &[u8]) -> Result<(), CodecError> {
    if key.len() != KEY_LEN {
        return Err(CodecError::InvalidKeyLength(key.len()));
    }
    Ok(())
}

/// Length of the ciphertext produced for `plaintext_len` input bytes.
pub fn padded_len(plaintext_len: usize) -> usize {
    (plaintext_len / BLOCK_LEN + 1) * BLOCK_LEN
}

/// Streaming AES-256-CBC encryption context.
pub struct CbcEncryptor {
    inner: Aes256CbcEnc,
    pending: BytesMut,
}

impl CbcEncryptor {
    /// Create an encryption context for `(key, iv)`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
    pub fn new(key: &[u8], iv: &[u8; IV_LEN]) -> Result<Self, CodecError> {
        check_key_len(key)?;
        let inner = Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|_| CodecError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            inner,
            pending: BytesMut::with_capacity(BLOCK_LEN),
        })
    }
}

impl BlockTransform for CbcEncryptor {
    fn update(&mut self, input: &[u8]) -> Bytes {
        self.pending.extend_from_slice(input);
        let aligned = self.pending.len() - self.pending.len() % BLOCK_LEN;
        let mut out = self.pending.split_to(aligned);
        for block in out.chunks_exact_mut(BLOCK_LEN) {
            self.inner
                .encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        out.freeze()
    }

    fn finalize(mut self) -> Result<Bytes, CodecError> {
        // `pending` is always shorter than one block here.
        let pos = self.pending.len();
        let mut block = aes::Block::default();
        block[..pos].copy_from_slice(&self.pending);
        Pkcs7::pad(&mut block, pos);
        self.inner.encrypt_block_mut(&mut block);
        Ok(Bytes::copy_from_slice(&block))
    }
}

/// Streaming AES-256-CBC decryption context.
///
/// The last full block is always held back until [`BlockTransform::finalize`]
/// because only then is it known to carry the padding.
pub struct CbcDecryptor {
    inner: Aes256CbcDec,
    pending: BytesMut,
}

impl CbcDecryptor {
    /// Create a decryption context for `(key, iv)`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
    pub fn new(key: &[u8], iv: &[u8; IV_LEN]) -> Result<Self, CodecError> {
        check_key_len(key)?;
        let inner = Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| CodecError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            inner,
            pending: BytesMut::with_capacity(2 * BLOCK_LEN),
        })
    }
}

impl BlockTransform for CbcDecryptor {
    fn update(&mut self, input: &[u8]) -> Bytes {
        self.pending.extend_from_slice(input);
        // Keep between 1 and BLOCK_LEN bytes back for the final block.
        let ready = match self.pending.len() {
            0 => 0,
            n => (n - 1) / BLOCK_LEN * BLOCK_LEN,
        };
        let mut out = self.pending.split_to(ready);
        for block in out.chunks_exact_mut(BLOCK_LEN) {
            self.inner
                .decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        out.freeze()
    }

    fn finalize(mut self) -> Result<Bytes, CodecError> {
        if self.pending.len() != BLOCK_LEN {
            return Err(CodecError::CorruptCiphertext);
        }
        let mut block = aes::Block::clone_from_slice(&self.pending);
        self.inner.decrypt_block_mut(&mut block);
        let plaintext = Pkcs7::unpad(&block).map_err(|_| CodecError::CorruptCiphertext)?;
        Ok(Bytes::copy_from_slice(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // NIST SP 800-38A, F.2.5 CBC-AES256.Encrypt, first block.
    const NIST_KEY: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";
    const NIST_IV: &str = "000102030405060708090a0b0c0d0e0f";
    const NIST_PLAINTEXT: &str = "6bc1bee22e409f96e93d7e117393172a";
    const NIST_CIPHERTEXT: &str = "f58c4c04d6e5f1ba779eabfb5f7bfbd6";

    fn nist_iv() -> [u8; IV_LEN] {
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&hex::decode(NIST_IV).unwrap());
        iv
    }

    #[test]
    fn encrypts_known_answer_block() {
        let key = hex::decode(NIST_KEY).unwrap();
        let mut enc = CbcEncryptor::new(&key, &nist_iv()).unwrap();
        let out = enc.update(&hex::decode(NIST_PLAINTEXT).unwrap());
        assert_eq!(hex::encode(&out), NIST_CIPHERTEXT);
    }

    #[test]
    fn decryptor_holds_back_last_block() {
        let key = hex::decode(NIST_KEY).unwrap();
        let mut dec = CbcDecryptor::new(&key, &nist_iv()).unwrap();
        let out = dec.update(&hex::decode(NIST_CIPHERTEXT).unwrap());
        assert!(out.is_empty());
        assert_eq!(dec.pending.len(), BLOCK_LEN);
    }

    #[test]
    fn split_updates_match_single_update() {
        let key = [0x11u8; KEY_LEN];
        let iv = [0x22u8; IV_LEN];
        let data: Vec<u8> = (0u8..100).collect();

        let mut whole = CbcEncryptor::new(&key, &iv).unwrap();
        let mut expected = whole.update(&data).to_vec();
        expected.extend_from_slice(&whole.finalize().unwrap());

        let mut split = CbcEncryptor::new(&key, &iv).unwrap();
        let mut actual = Vec::new();
        for piece in data.chunks(7) {
            actual.extend_from_slice(&split.update(piece));
        }
        actual.extend_from_slice(&split.finalize().unwrap());

        assert_eq!(actual, expected);
        assert_eq!(actual.len(), padded_len(data.len()));
    }

    #[test]
    fn aligned_plaintext_gets_full_padding_block() {
        let key = [0x33u8; KEY_LEN];
        let iv = [0x44u8; IV_LEN];
        let mut enc = CbcEncryptor::new(&key, &iv).unwrap();
        let mut ciphertext = enc.update(&[0u8; 32]).to_vec();
        ciphertext.extend_from_slice(&enc.finalize().unwrap());
        assert_eq!(ciphertext.len(), 48);

        let mut dec = CbcDecryptor::new(&key, &iv).unwrap();
        let mut plaintext = dec.update(&ciphertext).to_vec();
        plaintext.extend_from_slice(&dec.finalize().unwrap());
        assert_eq!(plaintext, vec![0u8; 32]);
    }

    #[test]
    fn unaligned_ciphertext_is_corrupt() {
        let key = [0x55u8; KEY_LEN];
        let iv = [0x66u8; IV_LEN];
        let mut dec = CbcDecryptor::new(&key, &iv).unwrap();
        dec.update(&[0u8; 20]);
        assert!(matches!(dec.finalize(), Err(CodecError::CorruptCiphertext)));
    }

    #[test]
    fn empty_ciphertext_is_corrupt() {
        let dec = CbcDecryptor::new(&[0u8; KEY_LEN], &[0u8; IV_LEN]).unwrap();
        assert!(matches!(dec.finalize(), Err(CodecError::CorruptCiphertext)));
    }

    #[test]
    fn rejects_short_key() {
        assert!(matches!(
            CbcEncryptor::new(&[0u8; 16], &[0u8; IV_LEN]),
            Err(CodecError::InvalidKeyLength(16))
        ));
        assert!(matches!(
            CbcDecryptor::new(&[0u8; 33], &[0u8; IV_LEN]),
            Err(CodecError::InvalidKeyLength(33))
        ));
    }

    #[test]
    fn padded_len_rounds_up_to_next_block() {
        assert_eq!(padded_len(0), 16);
        assert_eq!(padded_len(13), 16);
        assert_eq!(padded_len(16), 32);
        assert_eq!(padded_len(17), 32);
    }
}
