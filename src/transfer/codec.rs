//! Authenticated chunk streaming over any reliable byte stream.
//!
//! The sender emits a random base nonce as a frame, then a sequence of
//! `u32_be(len) || ciphertext` chunks, then a zero-length terminator. Each
//! chunk is sealed with AES-256-GCM under a nonce derived from the base
//! nonce and a strictly increasing 32-bit counter, so chunks cannot be
//! reordered, replayed, or modified without failing tag verification.
//!
//! Counter-derived nonces also eliminate the birthday risk of drawing a
//! random nonce per chunk: within one session every `(key, nonce)` pair is
//! used exactly once.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FerryError;
use crate::security::identity::SESSION_KEY_LEN;
use crate::wire::frame::{eof_as_truncation, read_frame, write_frame};

/// AES-256-GCM nonce length.
pub const NONCE_LEN: usize = 12;
/// AES-256-GCM authentication tag length.
pub const TAG_LEN: usize = 16;
/// Upper bound on a single ciphertext chunk on the wire.
pub const MAX_CIPHERTEXT_LEN: usize = 64 * 1024;
/// Per-chunk headroom reserved for the tag and nonce material.
pub const CHUNK_OVERHEAD: usize = TAG_LEN + NONCE_LEN;
/// Upper bound on a single plaintext chunk (65 508 bytes).
pub const MAX_PLAINTEXT_LEN: usize = MAX_CIPHERTEXT_LEN - CHUNK_OVERHEAD;

/// Number of chunks a session can carry before the 32-bit counter wraps.
pub const MAX_CHUNKS_PER_SESSION: u64 = (u32::MAX as u64) + 1;

/// Derive the nonce for chunk `counter`: the base nonce with its final four
/// bytes replaced by the big-endian counter.
pub fn derive_nonce(base: &[u8; NONCE_LEN], counter: u32) -> [u8; NONCE_LEN] {
    let mut nonce = *base;
    nonce[NONCE_LEN - 4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// Number of chunks needed to carry `file_size` bytes.
pub fn chunks_for_size(file_size: u64) -> u64 {
    file_size.div_ceil(MAX_PLAINTEXT_LEN as u64)
}

/// Refuse sizes whose chunk count would wrap the nonce counter.
pub fn check_counter_capacity(file_size: u64) -> Result<(), FerryError> {
    if chunks_for_size(file_size) > MAX_CHUNKS_PER_SESSION {
        return Err(FerryError::Protocol(format!(
            "file of {file_size} bytes needs more than {MAX_CHUNKS_PER_SESSION} chunks"
        )));
    }
    Ok(())
}

/// Begin the sending half of a chunk stream: generate a random base nonce,
/// emit it as a frame, and return a writer bound to `session_key`.
pub async fn open_send<W>(
    mut sink: W,
    session_key: &[u8; SESSION_KEY_LEN],
) -> Result<ChunkWriter<W>, FerryError>
where
    W: AsyncWrite + Unpin,
{
    let mut base_nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut base_nonce);
    write_frame(&mut sink, &base_nonce).await?;

    Ok(ChunkWriter {
        sink,
        cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(session_key)),
        base_nonce,
        chunks_written: 0,
    })
}

/// Begin the receiving half: read the base nonce frame, validate its length,
/// and return a reader bound to `session_key`.
pub async fn open_recv<R>(
    mut source: R,
    session_key: &[u8; SESSION_KEY_LEN],
) -> Result<ChunkReader<R>, FerryError>
where
    R: AsyncRead + Unpin,
{
    let nonce_bytes = read_frame(&mut source).await?;
    let base_nonce: [u8; NONCE_LEN] = nonce_bytes.as_slice().try_into().map_err(|_| {
        FerryError::Protocol(format!(
            "base nonce must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        ))
    })?;

    Ok(ChunkReader {
        source,
        cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(session_key)),
        base_nonce,
        chunks_read: 0,
        finished: false,
    })
}

/// Sending half of an authenticated chunk stream.
pub struct ChunkWriter<W> {
    sink: W,
    cipher: Aes256Gcm,
    base_nonce: [u8; NONCE_LEN],
    chunks_written: u64,
}

impl<W: AsyncWrite + Unpin> ChunkWriter<W> {
    /// Seal and emit one plaintext chunk. The counter advances only after
    /// the chunk is fully written out.
    pub async fn write_chunk(&mut self, plaintext: &[u8]) -> Result<(), FerryError> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(FerryError::ChunkTooLarge {
                len: plaintext.len() + CHUNK_OVERHEAD,
                max: MAX_CIPHERTEXT_LEN,
            });
        }
        let counter = u32::try_from(self.chunks_written)
            .map_err(|_| FerryError::Protocol("chunk counter exhausted".into()))?;

        let nonce = derive_nonce(&self.base_nonce, counter);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| FerryError::ChunkTooLarge {
                len: plaintext.len() + CHUNK_OVERHEAD,
                max: MAX_CIPHERTEXT_LEN,
            })?;

        self.sink.write_u32(ciphertext.len() as u32).await?;
        self.sink.write_all(&ciphertext).await?;
        self.chunks_written += 1;
        Ok(())
    }

    /// Emit the zero-length terminator and flush, returning the sink.
    pub async fn finish(mut self) -> Result<W, FerryError> {
        self.sink.write_u32(0).await?;
        self.sink.flush().await?;
        Ok(self.sink)
    }

    /// Chunks emitted so far.
    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }
}

/// Receiving half of an authenticated chunk stream.
pub struct ChunkReader<R> {
    source: R,
    cipher: Aes256Gcm,
    base_nonce: [u8; NONCE_LEN],
    chunks_read: u64,
    finished: bool,
}

impl<R> std::fmt::Debug for ChunkReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReader")
            .field("chunks_read", &self.chunks_read)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Read, verify, and decrypt the next chunk. Returns `None` once the
    /// zero-length terminator arrives. The tag is verified before any
    /// plaintext byte is handed to the caller.
    pub async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, FerryError> {
        if self.finished {
            return Ok(None);
        }

        let len = self.source.read_u32().await.map_err(eof_as_truncation)? as usize;
        if len == 0 {
            self.finished = true;
            return Ok(None);
        }
        if len > MAX_CIPHERTEXT_LEN {
            return Err(FerryError::ChunkTooLarge {
                len,
                max: MAX_CIPHERTEXT_LEN,
            });
        }

        let mut ciphertext = vec![0u8; len];
        self.source
            .read_exact(&mut ciphertext)
            .await
            .map_err(eof_as_truncation)?;

        let counter = u32::try_from(self.chunks_read)
            .map_err(|_| FerryError::Protocol("chunk counter exhausted".into()))?;
        let nonce = derive_nonce(&self.base_nonce, counter);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| FerryError::ChunkAuthenticationFailed)?;

        self.chunks_read += 1;
        Ok(Some(plaintext))
    }

    /// Chunks verified so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn key() -> [u8; SESSION_KEY_LEN] {
        [7u8; SESSION_KEY_LEN]
    }

    async fn encode_chunks(chunks: &[&[u8]]) -> Vec<u8> {
        let mut writer = open_send(std::io::Cursor::new(Vec::new()), &key())
            .await
            .unwrap();
        for chunk in chunks {
            writer.write_chunk(chunk).await.unwrap();
        }
        writer.finish().await.unwrap().into_inner()
    }

    #[tokio::test]
    async fn roundtrip_multiple_chunks() {
        let wire = encode_chunks(&[b"first", b"second", b"third"]).await;

        let mut reader = open_recv(wire.as_slice(), &key()).await.unwrap();
        assert_eq!(reader.read_chunk().await.unwrap().unwrap(), b"first");
        assert_eq!(reader.read_chunk().await.unwrap().unwrap(), b"second");
        assert_eq!(reader.read_chunk().await.unwrap().unwrap(), b"third");
        assert!(reader.read_chunk().await.unwrap().is_none());
        assert_eq!(reader.chunks_read(), 3);
    }

    #[tokio::test]
    async fn empty_stream_is_just_the_terminator() {
        let wire = encode_chunks(&[]).await;
        // base nonce frame (4 + 12) plus the 4-byte terminator
        assert_eq!(wire.len(), 4 + NONCE_LEN + 4);

        let mut reader = open_recv(wire.as_slice(), &key()).await.unwrap();
        assert!(reader.read_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chunk_length_does_not_signal_end_of_stream() {
        // A short chunk in the middle must not terminate the stream.
        let wire = encode_chunks(&[b"x", b"longer tail chunk"]).await;
        let mut reader = open_recv(wire.as_slice(), &key()).await.unwrap();
        assert_eq!(reader.read_chunk().await.unwrap().unwrap(), b"x");
        assert_eq!(
            reader.read_chunk().await.unwrap().unwrap(),
            b"longer tail chunk"
        );
        assert!(reader.read_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tampered_ciphertext_fails_authentication() {
        let mut wire = encode_chunks(&[b"payload bytes"]).await;
        // Flip one bit inside the first ciphertext chunk (past the base
        // nonce frame and the chunk length prefix).
        let offset = 4 + NONCE_LEN + 4;
        wire[offset] ^= 0x01;

        let mut reader = open_recv(wire.as_slice(), &key()).await.unwrap();
        let err = reader.read_chunk().await.unwrap_err();
        assert!(matches!(err, FerryError::ChunkAuthenticationFailed));
    }

    #[tokio::test]
    async fn tampered_tag_fails_authentication() {
        let mut wire = encode_chunks(&[b"payload bytes"]).await;
        let last = wire.len() - 5; // last ciphertext byte, before the terminator
        wire[last] ^= 0x80;

        let mut reader = open_recv(wire.as_slice(), &key()).await.unwrap();
        let err = reader.read_chunk().await.unwrap_err();
        assert!(matches!(err, FerryError::ChunkAuthenticationFailed));
    }

    #[tokio::test]
    async fn replayed_chunk_fails_authentication() {
        // Encode two identical plaintexts, then replace chunk 1's ciphertext
        // with chunk 0's. The tag only verifies under chunk 0's nonce, so the
        // reader must reject it at position 1.
        let wire = encode_chunks(&[b"same bytes", b"same bytes"]).await;
        let chunk_len = 4 + b"same bytes".len() + TAG_LEN;
        let first_chunk_at = 4 + NONCE_LEN;
        let second_chunk_at = first_chunk_at + chunk_len;

        let mut tampered = wire.clone();
        let first: Vec<u8> = wire[first_chunk_at..first_chunk_at + chunk_len].to_vec();
        tampered[second_chunk_at..second_chunk_at + chunk_len].copy_from_slice(&first);

        let mut reader = open_recv(tampered.as_slice(), &key()).await.unwrap();
        assert!(reader.read_chunk().await.unwrap().is_some());
        let err = reader.read_chunk().await.unwrap_err();
        assert!(matches!(err, FerryError::ChunkAuthenticationFailed));
    }

    #[tokio::test]
    async fn truncation_before_terminator_is_detected() {
        let wire = encode_chunks(&[b"first", b"second"]).await;
        // Cut the stream at every byte boundary before the terminator; each
        // prefix must end in StreamTruncated, never a silent success.
        for cut in (4 + NONCE_LEN)..wire.len() - 4 {
            let mut reader = open_recv(&wire[..cut], &key()).await.unwrap();
            let outcome = loop {
                match reader.read_chunk().await {
                    Ok(Some(_)) => continue,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };
            assert!(
                matches!(outcome, Err(FerryError::StreamTruncated)),
                "cut at {cut} must truncate"
            );
        }
    }

    #[tokio::test]
    async fn wrong_key_fails_authentication() {
        let wire = encode_chunks(&[b"secret"]).await;
        let other_key = [8u8; SESSION_KEY_LEN];
        let mut reader = open_recv(wire.as_slice(), &other_key).await.unwrap();
        let err = reader.read_chunk().await.unwrap_err();
        assert!(matches!(err, FerryError::ChunkAuthenticationFailed));
    }

    #[tokio::test]
    async fn oversized_declared_chunk_is_rejected() {
        let writer = open_send(std::io::Cursor::new(Vec::new()), &key())
            .await
            .unwrap();
        let mut wire = writer.finish().await.unwrap().into_inner();
        // Rewrite the terminator into an oversized chunk length.
        let len = wire.len();
        wire[len - 4..].copy_from_slice(&((MAX_CIPHERTEXT_LEN as u32) + 1).to_be_bytes());

        let mut reader = open_recv(wire.as_slice(), &key()).await.unwrap();
        let err = reader.read_chunk().await.unwrap_err();
        assert!(matches!(err, FerryError::ChunkTooLarge { .. }));
    }

    #[tokio::test]
    async fn oversized_plaintext_is_rejected_by_writer() {
        let mut writer = open_send(std::io::Cursor::new(Vec::new()), &key())
            .await
            .unwrap();
        let too_big = vec![0u8; MAX_PLAINTEXT_LEN + 1];
        let err = writer.write_chunk(&too_big).await.unwrap_err();
        assert!(matches!(err, FerryError::ChunkTooLarge { .. }));
    }

    #[tokio::test]
    async fn bad_base_nonce_length_is_rejected() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        write_frame(&mut cursor, &[0u8; NONCE_LEN - 1]).await.unwrap();
        let wire = cursor.into_inner();
        let err = open_recv(wire.as_slice(), &key()).await.unwrap_err();
        assert!(matches!(err, FerryError::Protocol(_)));
    }

    #[test]
    fn derived_nonces_are_unique_per_counter() {
        let base = [0xAA; NONCE_LEN];
        let nonces: HashSet<_> = (0u32..10_000).map(|i| derive_nonce(&base, i)).collect();
        assert_eq!(nonces.len(), 10_000);
    }

    #[test]
    fn derived_nonce_keeps_prefix_and_encodes_counter_big_endian() {
        let base = [0x11; NONCE_LEN];
        let nonce = derive_nonce(&base, 0x0102_0304);
        assert_eq!(&nonce[..NONCE_LEN - 4], &base[..NONCE_LEN - 4]);
        assert_eq!(&nonce[NONCE_LEN - 4..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn counter_capacity_limits() {
        assert!(check_counter_capacity(0).is_ok());
        assert!(check_counter_capacity(MAX_PLAINTEXT_LEN as u64 * MAX_CHUNKS_PER_SESSION).is_ok());
        assert!(
            check_counter_capacity(MAX_PLAINTEXT_LEN as u64 * MAX_CHUNKS_PER_SESSION + 1).is_err()
        );
    }

    #[test]
    fn plaintext_limit_matches_wire_limit() {
        assert_eq!(MAX_PLAINTEXT_LEN, 65_508);
        assert_eq!(MAX_CIPHERTEXT_LEN, 65_536);
    }
}
