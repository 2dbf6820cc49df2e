use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use bloodbank_core::{BatchId, BloodType};
use bloodbank_events::InMemoryEventBus;
use bloodbank_infra::{
    BloodBankEnvelope, EngineConfig, FixedClock, FulfillmentEngine, InMemoryBloodBankStore,
    NewBatch, NewRequest,
};
use bloodbank_inventory::{plan_allocation, AllocationTarget, InventoryBatch, ReceiveBatch};
use bloodbank_requests::Priority;

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// `count` batches of `units` each, expiry dates scattered over six weeks.
fn snapshot(count: usize, units: u32) -> Vec<InventoryBatch> {
    (0..count)
        .map(|i| {
            let (batch, _) = InventoryBatch::receive(&ReceiveBatch {
                batch_id: BatchId::new(),
                blood_type: BloodType::OPositive,
                quantity: units,
                expiry_date: now() + Duration::days(1 + (i as i64 * 7919) % 42),
                donor_id: None,
                received_at: now() - Duration::days(1),
            })
            .unwrap();
            batch
        })
        .collect()
}

fn bench_plan_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_allocation");

    for batch_count in [10usize, 100, 1_000] {
        let batches = snapshot(batch_count, 3);
        // Need half the pool: consumes ~N/2 batches and splits one.
        let need = (batch_count as u32 * 3) / 2 + 1;

        group.throughput(Throughput::Elements(batch_count as u64));
        group.bench_with_input(
            BenchmarkId::new("fifo_with_split", batch_count),
            &batches,
            |b, batches| {
                b.iter(|| {
                    plan_allocation(
                        black_box(batches),
                        BloodType::OPositive,
                        need,
                        AllocationTarget::Used,
                        now(),
                        BatchId::new,
                    )
                    .unwrap()
                })
            },
        );
    }

    group.finish();
}

fn bench_check_and_approve(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_and_approve");
    group.sample_size(50);

    group.bench_function("in_memory_200_batches", |b| {
        b.iter_batched(
            || {
                let engine = FulfillmentEngine::new(
                    Arc::new(InMemoryBloodBankStore::new()),
                    Arc::new(InMemoryEventBus::<BloodBankEnvelope>::new()),
                    Arc::new(FixedClock::new(now())),
                    EngineConfig::default(),
                );
                for i in 0..200i64 {
                    engine
                        .receive_batch(NewBatch {
                            blood_type: BloodType::APositive,
                            quantity: 2,
                            expiry_date: now() + Duration::days(1 + i % 30),
                            donor_id: None,
                        })
                        .unwrap();
                }
                let request = engine
                    .submit(NewRequest {
                        blood_type: BloodType::APositive,
                        quantity: 51,
                        priority: Priority::High,
                        patient_name: "Bench Patient".to_string(),
                        hospital: None,
                        notes: None,
                    })
                    .unwrap();
                (engine, request.id_typed())
            },
            |(engine, request_id)| engine.check_and_approve(request_id, None).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_plan_allocation, bench_check_and_approve);
criterion_main!(benches);
