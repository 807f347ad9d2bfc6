use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{ApprovalThreshold, Money, Order, OrderItem, PaymentDetails};
use std::hint::black_box;

fn items(count: usize) -> Vec<OrderItem> {
    (0..count)
        .map(|i| OrderItem::new(format!("SKU-{i:04}"), 2, Money::from_cents(1999)))
        .collect()
}

fn bench_create_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain/create_order");
    let payment = PaymentDetails::test_card();

    for count in [1, 10, 100] {
        let line_items = items(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &line_items, |b, line_items| {
            b.iter(|| {
                Order::new(
                    "ORD-BENCH",
                    "bench@example.com",
                    black_box(line_items.clone()),
                    payment.clone(),
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_requires_approval(c: &mut Criterion) {
    let threshold = ApprovalThreshold::default();
    let order = Order::new(
        "ORD-BENCH",
        "bench@example.com",
        items(50),
        PaymentDetails::test_card(),
    )
    .unwrap();

    c.bench_function("domain/requires_approval", |b| {
        b.iter(|| threshold.requires_approval(black_box(&order)));
    });
}

fn bench_card_expiry(c: &mut Criterion) {
    let card = PaymentDetails::test_card();

    c.bench_function("domain/card_expiry", |b| {
        b.iter(|| black_box(&card).is_expired());
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_requires_approval,
    bench_card_expiry
);
criterion_main!(benches);
