//! Benchmarks for index normalization and replay
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use dqm_archive::archive::{MemoryContainer, MemoryOpener, Table};
use dqm_archive::element::{DqmStore, TypeTag};
use dqm_archive::source::index::index_table;
use dqm_archive::source::ElementRow;
use dqm_archive::{DqmArchiveSource, IndexRecord, Replay, TraversalOrder};

/// Records for `runs` runs of `lumis` lumis each, with every run-scoped
/// record written after its lumis and a duplicate of each lumi at the end
fn interleaved_records(runs: u32, lumis: u32) -> Vec<IndexRecord> {
    let mut records = Vec::new();
    let mut row = 0;
    for run in 1..=runs {
        for lumi in 0..=lumis {
            let lumi = if lumi == lumis { 0 } else { lumi + 1 };
            records.push(IndexRecord::new(run, lumi, TypeTag::Int, row, row));
            row += 1;
        }
    }
    for run in 1..=runs {
        for lumi in 1..=lumis {
            records.push(IndexRecord::new(run, lumi, TypeTag::Int, row, row));
            row += 1;
        }
    }
    records
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for (runs, lumis) in [(1, 100), (10, 100), (50, 200)] {
        let records = interleaved_records(runs, lumis);
        group.throughput(Throughput::Elements(records.len() as u64));

        group.bench_function(format!("build_{}x{}", runs, lumis), |b| {
            b.iter(|| TraversalOrder::build(black_box(&records)))
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    let records = interleaved_records(5, 50);
    let mut ints = Table::new(TypeTag::Int.table_key());
    for (i, _) in records.iter().enumerate() {
        let name = format!("Det/EventInfo/processedEvents_{}", i % 16);
        ints.push_row(&ElementRow::new(name, 1i64)).unwrap();
    }
    let container = MemoryContainer::new("bench")
        .with_table(index_table(&records).unwrap())
        .with_table(ints);

    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("memory_segment", |b| {
        b.iter(|| {
            let opener = MemoryOpener::new().with(container.clone());
            let mut source = DqmArchiveSource::new(vec!["bench".to_string()], opener);
            let mut store = DqmStore::new();
            Replay::new().run(&mut source, &mut store).unwrap();
            black_box(store.len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_replay);
criterion_main!(benches);
