//! 병합/중복 제거 벤치마크
//!
//! 카탈로그 한 번 분량(수천 행)에 대해 canonical JSON 해시 기반 dedup 비용 측정

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ps3_update_collector_lib::application::dedup_exact;
use ps3_update_collector_lib::domain::catalog::fields;
use ps3_update_collector_lib::infrastructure::parse_manifest;
use ps3_update_collector_lib::{MergedEntry, RawEntry, TitleId, UpdateKind, UpdateRecord};

fn sample_merged(rows: usize, distinct: usize) -> Vec<MergedEntry> {
    let updates: Vec<UpdateRecord> = (0..4)
        .map(|i| {
            UpdateRecord::new(
                UpdateKind::Primary,
                Some(format!("01.{i:02}")),
                format!("http://cdn.test/BLUS30443-A01{i:02}.pkg"),
                Some(format!("{i:040}")),
                Some(1024 * (i + 1)),
            )
        })
        .collect();

    (0..rows)
        .map(|row| {
            let entry = RawEntry::from_fields([
                (fields::TITLE, format!("Game {}", row % distinct)),
                (fields::REGION, "USA".to_string()),
                (fields::DISC_ID, "BLUS30443".to_string()),
            ]);
            let id = TitleId::parse("BLUS30443").unwrap();
            MergedEntry::new(id, entry, updates.clone())
        })
        .collect()
}

fn sample_manifest(packages: usize) -> String {
    let mut xml = String::from(r#"<?xml version="1.0"?><titlepatch titleid="BLUS30443"><tag name="t">"#);
    for i in 0..packages {
        xml.push_str(&format!(
            r#"<package version="01.{i:02}" size="{}" sha1sum="ab" url="http://cdn.test/p{i}.pkg"/>"#,
            1000 + i
        ));
    }
    xml.push_str("</tag></titlepatch>");
    xml
}

fn dedup_benchmarks(c: &mut Criterion) {
    let mostly_unique = sample_merged(5_000, 5_000);
    let mostly_dupes = sample_merged(5_000, 50);

    c.bench_function("dedup - 5000행, 중복 없음", |b| {
        b.iter(|| black_box(dedup_exact(mostly_unique.clone())))
    });

    c.bench_function("dedup - 5000행, 50종", |b| {
        b.iter(|| black_box(dedup_exact(mostly_dupes.clone())))
    });

    let manifest = sample_manifest(32);
    c.bench_function("manifest 파싱 - 32 packages", |b| {
        b.iter(|| black_box(parse_manifest(manifest.as_bytes())))
    });
}

criterion_group!(benches, dedup_benchmarks);
criterion_main!(benches);
