//! permessage-deflate (RFC 7692) without context takeover: every message
//! gets a fresh compressor/decompressor window.
use flate2::Compression;
use flate2::write::{DeflateDecoder, DeflateEncoder};
use std::io::{self, Write};

const SYNC_MARKER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Raw-DEFLATEs `payload`, stripping the trailing 4-byte sync marker if
/// present (RFC 7692 §7.2.1).
pub fn compress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    let mut out = encoder.finish()?;
    if out.ends_with(&SYNC_MARKER) {
        out.truncate(out.len() - SYNC_MARKER.len());
    }
    Ok(out)
}

/// Appends the sync marker back and raw-INFLATEs (RFC 7692 §7.2.2).
pub fn decompress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut input = Vec::with_capacity(payload.len() + SYNC_MARKER.len());
    input.extend_from_slice(payload);
    input.extend_from_slice(&SYNC_MARKER);

    let mut decoder = DeflateDecoder::new(Vec::new());
    decoder.write_all(&input)?;
    decoder.finish()
}
