// Copyright 2025-2026 Garner contributors.

//! Reversible byte-stream compression with a self-describing frame.
//!
//! Small inputs become a single stream: one algorithm-id byte followed by
//! the algorithm's own format. Larger inputs are split into fixed-size
//! chunks compressed in parallel and wrapped in a container:
//!
//! ```text
//! 0xEE | algo(1) | chunk count (u32 LE) | { size (u32 LE) | bytes } per chunk
//! ```
//!
//! Chunk boundaries are fixed byte offsets, so the output is deterministic
//! regardless of how many workers run.

mod huffman;
mod lzss;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{Error, Result};

/// Break inputs into chunks of this many bytes for parallel compression.
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Leading byte identifying the parallel chunk container.
const CONTAINER_MARKER: u8 = 0xEE;

/// Available compression algorithms.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Frequency-table Huffman coding.
    Huffman,
    /// Dictionary coding over a sliding window.
    #[default]
    Lzss,
    /// LZSS then Huffman; worthwhile for text-like input.
    Joined,
}

impl Algorithm {
    pub fn id(self) -> u8 {
        match self {
            Algorithm::Huffman => 0,
            Algorithm::Lzss => 1,
            Algorithm::Joined => 2,
        }
    }
}

impl TryFrom<u8> for Algorithm {
    type Error = Error;

    fn try_from(id: u8) -> Result<Algorithm> {
        match id {
            0 => Ok(Algorithm::Huffman),
            1 => Ok(Algorithm::Lzss),
            2 => Ok(Algorithm::Joined),
            id => Err(Error::UnknownAlgorithm { id }),
        }
    }
}

/// Compress `input`, choosing single-stream or chunked framing by size.
pub fn compress(input: &[u8], algorithm: Algorithm) -> Vec<u8> {
    if input.len() < 2 * CHUNK_SIZE {
        let mut out = vec![algorithm.id()];
        out.extend_from_slice(&compress_stream(input, algorithm));
        return out;
    }
    let chunks: Vec<Vec<u8>> = input
        .par_chunks(CHUNK_SIZE)
        .map(|chunk| compress_stream(chunk, algorithm))
        .collect();
    trace!(
        "Compressed {} bytes as {} parallel chunks",
        input.len(),
        chunks.len()
    );
    let mut out = Vec::with_capacity(6 + chunks.iter().map(Vec::len).sum::<usize>());
    out.push(CONTAINER_MARKER);
    out.push(algorithm.id());
    out.extend_from_slice(&(chunks.len() as u32).to_le_bytes());
    for chunk in &chunks {
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(chunk);
    }
    out
}

/// Decompress a blob produced by [compress], dispatching on the leading byte.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let (&first, rest) = input.split_first().ok_or(Error::CompressedDataTruncated)?;
    if first != CONTAINER_MARKER {
        return decompress_stream(rest, Algorithm::try_from(first)?);
    }
    if rest.len() < 5 {
        return Err(Error::CompressedDataTruncated);
    }
    let algorithm = Algorithm::try_from(rest[0])?;
    let num_chunks = u32::from_le_bytes(rest[1..5].try_into().unwrap()) as usize;
    let mut chunks = Vec::with_capacity(num_chunks);
    let mut pos = 5;
    for _ in 0..num_chunks {
        if pos + 4 > rest.len() {
            return Err(Error::CompressedDataTruncated);
        }
        let size = u32::from_le_bytes(rest[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + size > rest.len() {
            return Err(Error::CompressedDataTruncated);
        }
        chunks.push(&rest[pos..pos + size]);
        pos += size;
    }
    let decoded: Vec<Vec<u8>> = chunks
        .into_par_iter()
        .map(|chunk| decompress_stream(chunk, algorithm))
        .collect::<Result<_>>()?;
    Ok(decoded.concat())
}

fn compress_stream(input: &[u8], algorithm: Algorithm) -> Vec<u8> {
    match algorithm {
        Algorithm::Huffman => huffman::encode(input),
        Algorithm::Lzss => lzss::encode(input),
        Algorithm::Joined => huffman::encode(&lzss::encode(input)),
    }
}

fn decompress_stream(input: &[u8], algorithm: Algorithm) -> Result<Vec<u8>> {
    match algorithm {
        Algorithm::Huffman => huffman::decode(input),
        Algorithm::Lzss => lzss::decode(input),
        Algorithm::Joined => lzss::decode(&huffman::decode(input)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Algorithm; 3] = [Algorithm::Huffman, Algorithm::Lzss, Algorithm::Joined];

    /// Deterministic pseudorandom bytes (xorshift64*).
    fn prng_bytes(seed: u64, len: usize) -> Vec<u8> {
        let mut state = seed;
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let word = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.truncate(len);
        out
    }

    #[test]
    fn small_input_single_stream() {
        for algo in ALL {
            let blob = compress(b"hello, compression", algo);
            assert_eq!(blob[0], algo.id());
            assert_eq!(decompress(&blob).unwrap(), b"hello, compression");
        }
    }

    #[test]
    fn empty_input_roundtrips() {
        for algo in ALL {
            let blob = compress(&[], algo);
            assert_eq!(decompress(&blob).unwrap(), Vec::<u8>::new());
        }
    }

    #[test]
    fn large_input_uses_container() {
        // Highly compressible so the test stays fast.
        let input: Vec<u8> = b"abcdefgh"
            .iter()
            .cycle()
            .take(2 * CHUNK_SIZE + 12345)
            .copied()
            .collect();
        let blob = compress(&input, Algorithm::Lzss);
        assert_eq!(blob[0], CONTAINER_MARKER);
        assert_eq!(blob[1], Algorithm::Lzss.id());
        let num_chunks = u32::from_le_bytes(blob[2..6].try_into().unwrap());
        assert_eq!(num_chunks, 3);
        assert_eq!(decompress(&blob).unwrap(), input);
    }

    #[test]
    fn container_boundary_is_exact() {
        // One byte under the threshold stays single-stream.
        let input = vec![7u8; 2 * CHUNK_SIZE - 1];
        assert_eq!(compress(&input, Algorithm::Huffman)[0], Algorithm::Huffman.id());
        let input = vec![7u8; 2 * CHUNK_SIZE];
        assert_eq!(compress(&input, Algorithm::Huffman)[0], CONTAINER_MARKER);
    }

    #[test]
    fn pseudorandom_roundtrip_all_algorithms() {
        let input = prng_bytes(12345, 1 << 20);
        for algo in ALL {
            let blob = compress(&input, algo);
            assert_eq!(decompress(&blob).unwrap(), input, "algorithm {algo:?}");
        }
    }

    #[test]
    fn unknown_algorithm_rejected() {
        assert!(matches!(
            decompress(&[0x7F, 1, 2, 3]),
            Err(Error::UnknownAlgorithm { id: 0x7F })
        ));
        assert!(matches!(
            Algorithm::try_from(9),
            Err(Error::UnknownAlgorithm { id: 9 })
        ));
    }

    #[test]
    fn truncated_container_rejected() {
        let input = vec![1u8; 2 * CHUNK_SIZE];
        let blob = compress(&input, Algorithm::Lzss);
        assert!(matches!(
            decompress(&blob[..8]),
            Err(Error::CompressedDataTruncated)
        ));
        assert!(matches!(
            decompress(&[]),
            Err(Error::CompressedDataTruncated)
        ));
    }

    #[test]
    fn repetitive_text_compresses_well() {
        let input = "The quick brown fox jumps over the lazy dog.\n".repeat(100);
        let blob = compress(input.as_bytes(), Algorithm::Lzss);
        assert!(
            blob.len() < input.len() / 2,
            "{} bytes compressed to {}",
            input.len(),
            blob.len()
        );
        assert_eq!(decompress(&blob).unwrap(), input.as_bytes());
    }
}
