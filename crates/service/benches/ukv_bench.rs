use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;

use service::ukv::{keys, statements, KeyValue};

fn bench_validate_keys(c: &mut Criterion) {
    let list: Vec<String> = (0..1000).map(|i| format!("prefs.section-{i}/theme")).collect();
    c.bench_function("ukv_validate_key_list_1000", |b| {
        b.iter(|| keys::validate_key_list(&list).unwrap());
    });
}

fn bench_build_batch_upsert(c: &mut Criterion) {
    let pairs: Vec<KeyValue> = (0..1000).map(|i| KeyValue { key: format!("k{i}"), value: json!({"i": i}) }).collect();
    c.bench_function("ukv_build_upsert_1000", |b| {
        b.iter(|| statements::upsert_key_values("bench-identity", &pairs).unwrap());
    });
}

criterion_group!(benches, bench_validate_keys, bench_build_batch_upsert);
criterion_main!(benches);
