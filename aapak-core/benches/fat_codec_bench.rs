//! FAT record codec and cipher throughput

use std::hint::black_box;
use std::io::Cursor;

use aapak_core::codec;
use aapak_core::pak::{Entry, FormatDescriptor, cipher};
use aapak_core::pakfile::PakFileBuilder;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};

const TYPICAL_NAME: &str = "game/db/character/appearance/face_preset_0042.dat";

fn sample_entry() -> Entry {
    Entry::new(TYPICAL_NAME, 0x0012_3400, 48_213, 435)
        .with_md5([0x5A; 16])
        .with_times(133_000_000_000_000_000, 133_000_000_100_000_000)
}

fn bench_entry_codec(c: &mut Criterion) {
    let descriptor = FormatDescriptor::classic();
    let entry = sample_entry();
    let raw = codec::entry::encode(descriptor, &entry).unwrap();

    let mut group = c.benchmark_group("entry_codec");
    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| black_box(codec::entry::encode(descriptor, black_box(&entry)).unwrap()))
    });
    group.bench_function("decode", |b| {
        b.iter(|| black_box(codec::entry::decode(descriptor, black_box(&raw)).unwrap()))
    });
    group.finish();
}

fn bench_cipher(c: &mut Criterion) {
    let key = &FormatDescriptor::classic().key;
    let mut group = c.benchmark_group("cipher");

    for len in [16usize, 0x150, 64 * 1024] {
        let data = vec![0xA5u8; len];
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_function(format!("encrypt/{len}"), |b| {
            b.iter(|| black_box(cipher::encrypt(key, black_box(&data)).unwrap()))
        });
    }

    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let mut pak = PakFileBuilder::new().create(Cursor::new(Vec::new())).unwrap();
    for i in 0..1000 {
        pak.pack(&format!("dir{}/file{i:04}.bin", i % 16), &[i as u8; 64], 0, 0)
            .unwrap();
    }
    pak.close().unwrap();
    let bytes = pak.into_inner().unwrap().into_inner();

    c.bench_function("open_1000_entries", |b| {
        b.iter(|| {
            let pak = PakFileBuilder::new()
                .open(Cursor::new(black_box(bytes.clone())))
                .unwrap();
            black_box(pak.payload_end())
        })
    });
}

criterion_group!(benches, bench_entry_codec, bench_cipher, bench_open);

criterion_main!(benches);
