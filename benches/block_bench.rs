// In benches/block_bench.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use blockpress::{BlockCodec, CodecConfig, CodecKind, MIN_BLOCK_SIZE};

/// Generates a vector of highly compressible data.
fn generate_low_entropy_bytes(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let pattern = b"abcdefgABCDEFG12345";
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

/// Generates a vector of less compressible, more random-looking data.
fn generate_high_entropy_bytes(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let pattern: Vec<u8> = (0..=255u8).collect();
    while data.len() < size {
        data.extend_from_slice(&pattern);
    }
    data.truncate(size);
    data
}

const BENCH_DATA_SIZE: usize = 4 * MIN_BLOCK_SIZE;

fn encode(codec: &BlockCodec, payload: &[u8]) -> Vec<u8> {
    let mut sink = Vec::new();
    let mut out = codec.create_output_stream(&mut sink).unwrap();
    out.write_bytes(payload).unwrap();
    out.close().unwrap();
    drop(out);
    sink
}

fn decode(codec: &BlockCodec, stream: &[u8]) -> Vec<u8> {
    let mut input = codec.create_input_stream(stream).unwrap();
    let mut restored = Vec::with_capacity(BENCH_DATA_SIZE);
    let mut chunk = [0u8; 8192];
    loop {
        let n = input.read_bytes(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        restored.extend_from_slice(&chunk[..n]);
    }
    restored
}

fn bench_block_streams(c: &mut Criterion) {
    let low_entropy = generate_low_entropy_bytes(BENCH_DATA_SIZE);
    let high_entropy = generate_high_entropy_bytes(BENCH_DATA_SIZE);

    let mut group = c.benchmark_group("block_stream");
    group.throughput(Throughput::Bytes(BENCH_DATA_SIZE as u64));

    for kind in [CodecKind::Lz4, CodecKind::Zstd] {
        let codec = BlockCodec::new(CodecConfig {
            codec: kind,
            level: 1,
            block_size: MIN_BLOCK_SIZE,
            use_foreign_buffer: false,
        })
        .unwrap();

        group.bench_function(format!("encode/{kind}/low_entropy"), |b| {
            b.iter(|| encode(&codec, black_box(&low_entropy)))
        });
        group.bench_function(format!("encode/{kind}/high_entropy"), |b| {
            b.iter(|| encode(&codec, black_box(&high_entropy)))
        });

        let encoded_low = encode(&codec, &low_entropy);
        let encoded_high = encode(&codec, &high_entropy);
        group.bench_function(format!("decode/{kind}/low_entropy"), |b| {
            b.iter(|| decode(&codec, black_box(&encoded_low)))
        });
        group.bench_function(format!("decode/{kind}/high_entropy"), |b| {
            b.iter(|| decode(&codec, black_box(&encoded_high)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_block_streams);
criterion_main!(benches);
