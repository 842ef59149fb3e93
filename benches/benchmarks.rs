use criterion::{black_box, criterion_group, criterion_main, Criterion};

use plast_rust::align::banded::{self, BandBuffer, SmallGapParams, LANES};
use plast_rust::align::semigap::{GapCosts, SemiGapAligner};
use plast_rust::align::{ungapped, ScoreMatrix};
use plast_rust::db::Database;
use plast_rust::index::{SeedIndex, SeedModel};
use plast_rust::util::Alphabet;

/// 线性同余生成的蛋白编码序列
fn make_protein(len: usize, seed: u32) -> Vec<u8> {
    let mut seq = Vec::with_capacity(len);
    let mut x: u32 = seed;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(((x >> 16) % 20) as u8);
    }
    seq
}

/// 每隔 `every` 个残基替换一次
fn mutate(seq: &[u8], every: usize) -> Vec<u8> {
    seq.iter().enumerate().map(|(i, &c)| if i % every == every - 1 { (c + 7) % 20 } else { c }).collect()
}

fn bench_ungapped_extend(c: &mut Criterion) {
    let matrix = ScoreMatrix::protein("BLOSUM62").unwrap();
    let query = make_protein(400, 42);
    let subject = mutate(&query, 9);

    c.bench_function("ungapped_extend_400aa", |b| {
        b.iter(|| {
            black_box(ungapped::extend(black_box(&query), black_box(&subject), 200, 200, 4, &matrix, 16));
        })
    });
}

fn bench_small_gap(c: &mut Criterion) {
    let matrix = ScoreMatrix::protein("BLOSUM62").unwrap();
    let p = SmallGapParams { gap_open: 11, gap_extend: 1, band_width: 8, window: 32 };
    let q = make_protein(32, 7);
    let s = mutate(&q, 5);
    let mut buf = BandBuffer::new();

    c.bench_function("small_gap_scalar_x8", |b| {
        b.iter(|| {
            for _ in 0..LANES {
                black_box(banded::anchored_band_score(black_box(&q), black_box(&s), &matrix, &p, &mut buf));
            }
        })
    });

    let qs: [&[u8]; LANES] = [&q; LANES].map(|v| v.as_slice());
    let ss: [&[u8]; LANES] = [&s; LANES].map(|v| v.as_slice());
    c.bench_function("small_gap_lanes_x8", |b| {
        b.iter(|| {
            black_box(banded::anchored_band_score_lanes(black_box(&qs), black_box(&ss), &matrix, &p, &mut buf));
        })
    });
}

fn bench_semigap(c: &mut Criterion) {
    let matrix = ScoreMatrix::protein("BLOSUM62").unwrap();
    let query = make_protein(300, 3);
    let mut subject = mutate(&query, 11);
    subject.insert(150, 5);
    let costs = GapCosts { open: 11, extend: 1, xdrop: 65 };
    let mut aligner = SemiGapAligner::new();

    c.bench_function("semigap_align_300aa", |b| {
        b.iter(|| {
            black_box(aligner.align(black_box(&query), black_box(&subject), 100, 100, &matrix, &costs));
        })
    });
}

fn bench_index_build(c: &mut Criterion) {
    let mut db = Database::new(Alphabet::Protein);
    for i in 0..200 {
        db.push(&format!("p{}", i), None, &make_protein(300, i)).unwrap();
    }
    let model = SeedModel::new(Alphabet::Protein, 4).unwrap();

    c.bench_function("seed_index_build_60k", |b| {
        b.iter(|| {
            black_box(SeedIndex::build(black_box(&db), model));
        })
    });
}

criterion_group!(benches, bench_ungapped_extend, bench_small_gap, bench_semigap, bench_index_build);
criterion_main!(benches);
