use criterion::{black_box, criterion_group, criterion_main, Criterion};
use turtleshell_core::codec::{decode, encode_tags, sentinel_wrap};
use turtleshell_core::features::FeatureExtractor;

fn bench_codec(c: &mut Criterion) {
    let segmentations: Vec<Vec<&str>> = vec![
        vec!["un", "help", "ful"],
        vec!["anti", "dis", "establish", "ment", "arian", "ism"],
        vec!["walk", "ed"],
        vec!["a"],
        vec!["re", "write", "s"],
    ];
    let tagged: Vec<(String, Vec<_>)> = segmentations
        .iter()
        .map(|morphs| (morphs.concat(), sentinel_wrap(&encode_tags(morphs.as_slice()))))
        .collect();

    c.bench_function("encode_batch_5", |b| {
        b.iter(|| {
            for morphs in &segmentations {
                let _ = encode_tags(black_box(morphs.as_slice()));
            }
        });
    });

    c.bench_function("decode_batch_5", |b| {
        b.iter(|| {
            for (word, tags) in &tagged {
                let _ = decode(black_box(word), black_box(tags));
            }
        });
    });
}

fn bench_features(c: &mut Criterion) {
    let extractor = FeatureExtractor::default();

    c.bench_function("word_features_long", |b| {
        b.iter(|| extractor.word_features(black_box("antidisestablishmentarianism")));
    });
}

criterion_group!(benches, bench_codec, bench_features);
criterion_main!(benches);
