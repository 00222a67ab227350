use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::error::{PakError, Result};

pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;

/// Length of `len` rounded up to the cipher block size.
#[inline]
pub const fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

fn cipher(key: &[u8]) -> Result<Aes128> {
    Aes128::new_from_slice(key).map_err(|_| PakError::InvalidKeyLength {
        expected: KEY_SIZE,
        found: key.len(),
    })
}

fn padded_copy(data: &[u8]) -> Vec<u8> {
    let mut buf = data.to_vec();
    buf.resize(padded_len(data.len()), 0);
    buf
}

/// Encrypts header/FAT bytes block by block. The input is zero-padded to the block size.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let mut buf = padded_copy(plaintext);
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(aes::Block::from_mut_slice(chunk));
    }
    Ok(buf)
}

/// Reverses [`encrypt`]. Trailing bytes that do not fill a whole block are zero-padded first.
pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let mut buf = padded_copy(ciphertext);
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(aes::Block::from_mut_slice(chunk));
    }
    Ok(buf)
}
