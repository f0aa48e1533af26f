//! Benchmark condition compilation and statement assembly.

use chainorm::{Db, Model, RecordingExecutor, Value, args, cond};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

#[derive(Debug, Default, Model)]
#[orm(table = "orders")]
struct Order {
    #[orm(tag = "primaryKey;autoIncrement")]
    id: i64,
    customer_id: i64,
    status: String,
    total_cents: i64,
    #[orm(tag = "softDelete")]
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn bench_select_build(c: &mut Criterion) {
    let db = Db::new(RecordingExecutor::new());
    let mut group = c.benchmark_group("statement_build/select");

    for conditions in [1usize, 8, 32] {
        let mut query = db.model::<Order>();
        for i in 0..conditions {
            query = if i % 4 == 3 {
                query.or(cond("status = ?", args![format!("s{i}")]))
            } else if i > 0 && i % 4 == 0 {
                // keep OR-tails closed by grouping the chain so far
                let inner = query;
                db.model::<Order>().where_(&inner).where_([("customer_id", Value::I64(i as i64))])
            } else {
                query.where_(cond("total_cents > ?", args![i as i64]))
            };
        }
        let query = query.order("id DESC").limit(50);

        group.bench_with_input(BenchmarkId::from_parameter(conditions), &query, |b, q| {
            b.iter(|| black_box(q.select_statement().unwrap()));
        });
    }

    group.finish();
}

fn bench_branching(c: &mut Criterion) {
    let db = Db::new(RecordingExecutor::new());
    let base = db
        .model::<Order>()
        .where_(cond("customer_id = ?", args![7_i64]))
        .order("id");

    c.bench_function("statement_build/branch_and_build", |b| {
        b.iter(|| {
            let branch = base.clone().where_(cond("status = ?", args!["open"])).limit(10);
            black_box(branch.first_statement().unwrap())
        });
    });
}

criterion_group!(benches, bench_select_build, bench_branching);
criterion_main!(benches);
