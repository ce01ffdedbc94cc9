use std::sync::Arc;

use strata_core::{
    BitPacker, ChunkPipeline, Decoder, EncoderOptions, ParallelEncoder, StageOutcome,
    StageTransform, StrataError, CHUNK_SIZE, HEADER_SIZE, SIZE_ENTRY_SIZE,
};

fn encode_decode(pipeline: ChunkPipeline, data: &[u8]) -> Vec<u8> {
    let encoder = ParallelEncoder::with_options(pipeline.clone(), EncoderOptions { workers: 4 });
    let (stream, _stats) = encoder.encode(data).expect("encode failed");
    Decoder::new(pipeline).decode(&stream).expect("decode failed")
}

fn patterned(len: usize) -> Vec<u8> {
    // Low-entropy words so the packer has planes to drop, with enough
    // variation to exercise several mask shapes.
    (0..len)
        .map(|i| match i % 4 {
            0 => (i / 4 % 13) as u8,
            1 => 0,
            2 => (i / 64 % 3) as u8,
            _ => 0,
        })
        .collect()
}

#[test]
fn lossless_pipeline_round_trips() {
    for len in [1usize, 7, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, CHUNK_SIZE * 5 + 3] {
        let data = patterned(len);
        assert_eq!(encode_decode(ChunkPipeline::bit_packing(), &data), data, "len {len}");
    }
}

#[test]
fn incompressible_input_round_trips_via_raw_fallback() {
    // A xorshift stream keeps every nibble plane busy.
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 100)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect();

    assert_eq!(encode_decode(ChunkPipeline::bit_packing(), &data), data);
}

#[test]
fn streams_survive_a_trip_through_the_filesystem() {
    let data = patterned(CHUNK_SIZE + 200);
    let encoder = ParallelEncoder::new(ChunkPipeline::bit_packing());
    let (stream, _) = encoder.encode(&data).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patterned.strata");
    std::fs::write(&path, &stream).unwrap();

    let read_back = std::fs::read(&path).unwrap();
    let restored = Decoder::new(ChunkPipeline::bit_packing())
        .decode(&read_back)
        .unwrap();
    assert_eq!(restored, data);
}

#[test]
fn empty_input_is_a_fatal_error() {
    let encoder = ParallelEncoder::new(ChunkPipeline::bit_packing());
    assert!(matches!(
        encoder.encode(&[]),
        Err(StrataError::InvalidInput(_))
    ));
}

#[test]
fn stream_layout_matches_the_size_table() {
    let data = patterned(CHUNK_SIZE * 4 + 123);
    let encoder = ParallelEncoder::new(ChunkPipeline::bit_packing());
    let (stream, stats) = encoder.encode(&data).unwrap();

    let original_size = u64::from_le_bytes(stream[..8].try_into().unwrap());
    assert_eq!(original_size, data.len() as u64);

    let chunks = data.len().div_ceil(CHUNK_SIZE);
    assert_eq!(stats.chunks_total, chunks);
    assert_eq!(stats.chunks_raw + stats.chunks_packed, chunks);
    assert_eq!(stats.worker_tasks.iter().sum::<usize>(), chunks);

    // Contiguity: the payload is exactly the concatenation described
    // by the size table, and no chunk expands.
    let payload_base = HEADER_SIZE + SIZE_ENTRY_SIZE * chunks;
    let mut payload_len = 0usize;
    for id in 0..chunks {
        let at = HEADER_SIZE + SIZE_ENTRY_SIZE * id;
        let stored = u16::from_le_bytes([stream[at], stream[at + 1]]) as usize;
        let original_len = CHUNK_SIZE.min(data.len() - id * CHUNK_SIZE);
        assert!(stored > 0, "chunk {id} stored zero bytes");
        assert!(stored <= original_len, "chunk {id} expanded");
        payload_len += stored;
    }
    assert_eq!(stream.len(), payload_base + payload_len);
    assert_eq!(stats.output_bytes, stream.len() as u64);
}

#[test]
fn quantized_pipeline_reconstructs_within_the_bound() {
    let bound = 0.01f32;
    let values: Vec<f32> = (0..CHUNK_SIZE) // four chunks of f32 words
        .map(|i| (i as f32 * 0.37).sin() * 50.0)
        .collect();
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

    let pipeline = ChunkPipeline::quantizing(bound).unwrap();
    let restored = encode_decode(pipeline, &data);
    assert_eq!(restored.len(), data.len());

    for (i, (original, decoded)) in values
        .iter()
        .zip(restored.chunks_exact(4).map(|b| {
            f32::from_le_bytes([b[0], b[1], b[2], b[3]])
        }))
        .enumerate()
    {
        assert!(
            (decoded - original).abs() <= bound,
            "word {i}: {original} decoded as {decoded}"
        );
    }
}

#[test]
fn non_finite_words_survive_the_quantizing_pipeline() {
    let bound = 0.5f32;
    let mut values: Vec<f32> = (0..CHUNK_SIZE / 2).map(|i| (i % 100) as f32).collect();
    // Poison two words in the second chunk; they must take the
    // verbatim outlier path rather than failing the encode.
    values[CHUNK_SIZE / 4 + 4] = f32::NAN;
    values[CHUNK_SIZE / 4 + 5] = f32::INFINITY;
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

    let restored = encode_decode(ChunkPipeline::quantizing(bound).unwrap(), &data);
    let decoded: Vec<f32> = restored
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    for (i, (original, decoded)) in values.iter().zip(decoded).enumerate() {
        if original.is_finite() {
            assert!(
                (decoded - original).abs() <= bound,
                "word {i}: {original} decoded as {decoded}"
            );
        } else if original.is_nan() {
            assert!(decoded.is_nan(), "word {i}: NaN decoded as {decoded}");
        } else {
            assert_eq!(decoded, *original, "word {i}");
        }
    }
}

#[test]
fn raw_tail_chunk_under_a_quantizing_pipeline() {
    // A full compressible chunk plus a single trailing word whose
    // quantized code touches too many nibble planes to shrink: the
    // tail chunk is stored raw and the decoder must still run the
    // quantizer inverse after the verbatim copy.
    let bound = 0.001f32;
    let mut values: Vec<f32> = (0..CHUNK_SIZE / 4)
        .map(|i| (i % 32) as f32 * 0.004)
        .collect();
    values.push(262.0);
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

    let pipeline = ChunkPipeline::quantizing(bound).unwrap();
    let encoder = ParallelEncoder::new(pipeline.clone());
    let (stream, stats) = encoder.encode(&data).unwrap();
    assert_eq!(stats.chunks_total, 2);
    assert_eq!(stats.chunks_packed, 1);
    assert_eq!(stats.chunks_raw, 1, "tail chunk must be stored raw");

    let restored = Decoder::new(pipeline).decode(&stream).unwrap();
    for (i, (original, decoded)) in values
        .iter()
        .zip(restored.chunks_exact(4).map(|b| {
            f32::from_le_bytes([b[0], b[1], b[2], b[3]])
        }))
        .enumerate()
    {
        assert!(
            (decoded - original).abs() <= bound,
            "word {i}: {original} decoded as {decoded}"
        );
    }
}

/// Preprocessing stage that fails on chunks starting with a marker byte.
struct RejectsMarkedChunks;

impl StageTransform for RejectsMarkedChunks {
    fn name(&self) -> &'static str {
        "rejects_marked"
    }

    fn apply(&self, data: &[u8]) -> strata_core::Result<StageOutcome> {
        if data.first() == Some(&0xEE) {
            return Err(StrataError::CompressionError("marked chunk".to_string()));
        }
        Ok(StageOutcome::Unchanged)
    }

    fn reverse(&self, data: &[u8], _original_len: usize) -> strata_core::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn preserves_len(&self) -> bool {
        true
    }
}

#[test]
fn preprocess_failure_fails_the_encode_call() {
    let mut data = patterned(CHUNK_SIZE * 3);
    data[CHUNK_SIZE] = 0xEE;

    let pipeline = ChunkPipeline::new(
        Some(Arc::new(RejectsMarkedChunks)),
        Arc::new(BitPacker::new()),
    );
    let encoder = ParallelEncoder::new(pipeline);
    assert!(matches!(
        encoder.encode(&data),
        Err(StrataError::CompressionError(_))
    ));
}

/// Claims to preserve length but grows every chunk by one byte.
struct GrowsEveryChunk;

impl StageTransform for GrowsEveryChunk {
    fn name(&self) -> &'static str {
        "grows"
    }

    fn apply(&self, data: &[u8]) -> strata_core::Result<StageOutcome> {
        let mut out = data.to_vec();
        out.push(0);
        Ok(StageOutcome::Transformed(out))
    }

    fn reverse(&self, data: &[u8], _original_len: usize) -> strata_core::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn preserves_len(&self) -> bool {
        true
    }
}

#[test]
#[should_panic(expected = "preserve chunk length")]
fn length_changing_preprocess_is_detected() {
    let data = patterned(CHUNK_SIZE);
    let pipeline = ChunkPipeline::new(Some(Arc::new(GrowsEveryChunk)), Arc::new(BitPacker::new()));
    let encoder = ParallelEncoder::with_options(pipeline, EncoderOptions { workers: 1 });
    let _ = encoder.encode(&data);
}

/// Compression stage that never improves, forcing raw storage everywhere.
struct NeverHelps;

impl StageTransform for NeverHelps {
    fn name(&self) -> &'static str {
        "never_helps"
    }

    fn apply(&self, _data: &[u8]) -> strata_core::Result<StageOutcome> {
        Ok(StageOutcome::Unchanged)
    }

    fn reverse(&self, _data: &[u8], _original_len: usize) -> strata_core::Result<Vec<u8>> {
        panic!("raw chunks must never reach the stage inverse");
    }
}

#[test]
fn raw_fallback_preserves_the_input_verbatim() {
    let data = patterned(CHUNK_SIZE * 2 + 77);
    let pipeline = ChunkPipeline::new(None, Arc::new(NeverHelps));
    let encoder = ParallelEncoder::new(pipeline.clone());
    let (stream, stats) = encoder.encode(&data).unwrap();

    assert_eq!(stats.chunks_packed, 0);
    assert_eq!(stats.chunks_raw, stats.chunks_total);

    // Payload is byte-identical to the input and every table entry is
    // the chunk's original size.
    let chunks = stats.chunks_total;
    let payload_base = HEADER_SIZE + SIZE_ENTRY_SIZE * chunks;
    assert_eq!(&stream[payload_base..], &data[..]);
    for id in 0..chunks {
        let at = HEADER_SIZE + SIZE_ENTRY_SIZE * id;
        let stored = u16::from_le_bytes([stream[at], stream[at + 1]]) as usize;
        assert_eq!(stored, CHUNK_SIZE.min(data.len() - id * CHUNK_SIZE));
    }

    assert_eq!(Decoder::new(pipeline).decode(&stream).unwrap(), data);
}

/// Compression stage that halves all-zero chunks and declines tiny ones.
struct HalvesZeroChunks;

impl StageTransform for HalvesZeroChunks {
    fn name(&self) -> &'static str {
        "halves_zero_chunks"
    }

    fn apply(&self, data: &[u8]) -> strata_core::Result<StageOutcome> {
        if data.len() >= 16 && data.iter().all(|&byte| byte == 0) {
            Ok(StageOutcome::Transformed(vec![0u8; data.len() / 2]))
        } else {
            Ok(StageOutcome::Unchanged)
        }
    }

    fn reverse(&self, data: &[u8], original_len: usize) -> strata_core::Result<Vec<u8>> {
        if data.len() != original_len / 2 || data.iter().any(|&byte| byte != 0) {
            return Err(StrataError::DecompressionError(
                "not a halved all-zero chunk".to_string(),
            ));
        }
        Ok(vec![0u8; original_len])
    }
}

#[test]
fn all_zero_three_chunk_scenario() {
    // CHUNK_SIZE*2 + 10 zero bytes: two full chunks halved, the ten
    // byte tail chunk stored raw.
    let data = vec![0u8; CHUNK_SIZE * 2 + 10];
    let pipeline = ChunkPipeline::new(None, Arc::new(HalvesZeroChunks));
    let encoder = ParallelEncoder::new(pipeline.clone());
    let (stream, stats) = encoder.encode(&data).unwrap();

    assert_eq!(stats.chunks_total, 3);
    assert_eq!(stats.chunks_packed, 2);
    assert_eq!(stats.chunks_raw, 1);

    let size_at = |id: usize| {
        let at = HEADER_SIZE + SIZE_ENTRY_SIZE * id;
        u16::from_le_bytes([stream[at], stream[at + 1]]) as usize
    };
    assert_eq!(size_at(0), CHUNK_SIZE / 2);
    assert_eq!(size_at(1), CHUNK_SIZE / 2);
    assert_eq!(size_at(2), 10);

    assert_eq!(Decoder::new(pipeline).decode(&stream).unwrap(), data);
}
