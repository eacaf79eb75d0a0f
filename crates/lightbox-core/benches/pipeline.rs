//! Benchmarks for the Lightbox asset pipeline.
//!
//! Run with: cargo bench -p lightbox-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lightbox_core::collaborators::{
    parse_raw_metadata, ImageTransformer, NativeTransformer, TransformRequest,
};
use lightbox_core::hasher::{hash_bytes, hash_file};
use lightbox_core::naming::safe_name;

const RAW_EXIF: &str = "\
ExifTool Version Number         : 12.40
File Name                       : IMG_0001.jpg
File Type                       : JPEG
Make                            : Canon
Camera Model Name               : Canon EOS 5D Mark II
Exposure Time                   : 1/125
F Number                        : 2.8
ISO                             : 400
Date/Time Original              : 2012:12:24 18:30:01
Focal Length                    : 50.0 mm
Lens ID                         : EF50mm f/1.4 USM
";

fn benchmark_hash_file(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("source.bin");
    std::fs::write(&path, vec![0xA5u8; 4 * 1024 * 1024]).unwrap();

    c.bench_function("hash_file_4mb", |b| {
        b.iter(|| {
            let _ = hash_file(black_box(&path), black_box(&[Some("Rome"), None]));
        })
    });
}

fn benchmark_hash_bytes(c: &mut Criterion) {
    let data = vec![0x5Au8; 256 * 1024];

    c.bench_function("hash_bytes_256kb", |b| {
        b.iter(|| hash_bytes(black_box(&data), black_box(&[Some("Rome"), Some("At dusk")])))
    });
}

fn benchmark_parse_raw_metadata(c: &mut Criterion) {
    c.bench_function("parse_raw_metadata", |b| {
        b.iter(|| parse_raw_metadata(black_box(RAW_EXIF)))
    });
}

fn benchmark_safe_name(c: &mut Criterion) {
    c.bench_function("safe_name", |b| {
        b.iter(|| safe_name(black_box("Summer in Kyōto / 2013 (part 2)")))
    });
}

fn benchmark_native_thumbnail(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("source.png");
    image::DynamicImage::new_rgb8(1920, 1080).save(&source).unwrap();

    let transformer = NativeTransformer::new(60);
    let request = TransformRequest {
        source,
        dest: dir.path().join("80s.jpg"),
        size_limit: 80,
        thumbnail: true,
        square: true,
    };
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("native_square_thumbnail", |b| {
        b.iter(|| {
            let _ = rt.block_on(transformer.transform(black_box(&request)));
        })
    });
}

criterion_group!(
    benches,
    benchmark_hash_file,
    benchmark_hash_bytes,
    benchmark_parse_raw_metadata,
    benchmark_safe_name,
    benchmark_native_thumbnail,
);
criterion_main!(benches);
