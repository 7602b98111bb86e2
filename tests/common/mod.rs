//! Shared helpers for integration tests.

use std::path::Path;

use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use ferry::security::identity::{PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};

/// Write a small test keypair into `dir` so the identity store finds both
/// files and skips generation. 1024-bit keys keep the test suite fast; the
/// wire format is identical.
pub fn seed_identity(dir: &Path) -> RsaPublicKey {
    let private = RsaPrivateKey::new(&mut OsRng, 1024).expect("test key generation");
    let public = RsaPublicKey::from(&private);
    private
        .write_pkcs1_pem_file(dir.join(PRIVATE_KEY_FILE), LineEnding::LF)
        .expect("write private pem");
    public
        .write_pkcs1_pem_file(dir.join(PUBLIC_KEY_FILE), LineEnding::LF)
        .expect("write public pem");
    public
}

/// Payload offsets of the frames and chunks inside a captured sender stream.
///
/// Layout: manifest, sender key, wrapped session key, base nonce (all
/// length-prefixed frames), then `(len, ciphertext)` chunks until the
/// zero-length terminator.
pub struct WireLayout {
    /// (offset, len) of each header frame payload, in emit order.
    pub header_frames: Vec<(usize, usize)>,
    /// (offset, len) of each ciphertext chunk payload, in emit order.
    pub chunks: Vec<(usize, usize)>,
}

pub fn parse_wire(wire: &[u8]) -> WireLayout {
    fn be32(bytes: &[u8], at: usize) -> usize {
        u32::from_be_bytes(bytes[at..at + 4].try_into().unwrap()) as usize
    }

    let mut pos = 0;
    let mut header_frames = Vec::new();
    for _ in 0..4 {
        let len = be32(wire, pos);
        header_frames.push((pos + 4, len));
        pos += 4 + len;
    }

    let mut chunks = Vec::new();
    loop {
        let len = be32(wire, pos);
        if len == 0 {
            break;
        }
        chunks.push((pos + 4, len));
        pos += 4 + len;
    }

    WireLayout {
        header_frames,
        chunks,
    }
}
