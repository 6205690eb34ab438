use criterion::{black_box, criterion_group, criterion_main, Criterion};

use forgedb::catalog::{Column, TableDef};
use forgedb::engine::Engine;
use forgedb::executor::insert::execute_insert;
use forgedb::executor::select::execute_select;
use forgedb::dp::{new_rng, DEFAULT_SEED};
use forgedb::statement::{InsertStmt, ProjectionItem, SelectStmt};
use forgedb::value::{ColumnType, Value};

fn seeded_table(rows: i64) -> Engine {
    let mut engine = Engine::new();
    let mut pk = Column::new("id", ColumnType::Int);
    pk.primary_key = true;
    engine
        .create_table(TableDef::new("t", vec![pk, Column::new("region", ColumnType::Text), Column::new("amt", ColumnType::Int)]))
        .unwrap();

    for id in 0..rows {
        let region = if id % 2 == 0 { "E" } else { "W" };
        execute_insert(&mut engine, &InsertStmt {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "region".to_string(), "amt".to_string()],
            rows: vec![vec![Value::Int(id), Value::Text(region.to_string()), Value::Int(id % 100)]],
            on_conflict_merge: false,
        })
        .unwrap();
    }
    engine
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert 1000 rows", |b| {
        b.iter(|| black_box(seeded_table(1000)));
    });
}

fn bench_select_group_by(c: &mut Criterion) {
    let engine = seeded_table(1000);
    let mut rng = new_rng(DEFAULT_SEED);
    let stmt = SelectStmt {
        projections: vec![ProjectionItem::Column(forgedb::statement::ColumnRef::unqualified("region")), ProjectionItem::Sum(forgedb::statement::ColumnRef::unqualified("amt"))],
        table: "t".to_string(),
        join: None,
        as_of_tx: None,
        where_clause: vec![],
        group_by: vec!["region".to_string()],
        order_by: None,
        limit: None,
    };

    c.bench_function("select group by region with sum", |b| {
        b.iter(|| black_box(execute_select(&engine, &stmt, &mut rng, 1.0).unwrap()));
    });
}

criterion_group!(benches, bench_insert, bench_select_group_by);
criterion_main!(benches);
