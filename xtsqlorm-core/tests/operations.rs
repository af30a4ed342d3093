mod common;

use common::{fixture, Fixture, User};
use xtsqlorm::validate::{Rule, Schema};
use xtsqlorm::{
    create_operations, record, Condition, Error, Operations, Order, Record, Repository, Value,
};

async fn seeded(fx: &Fixture, n: i64) -> Operations<User> {
    let ops: Operations<User> = Operations::for_model(fx.provider.clone());
    let items: Vec<Record> = (1..=n)
        .map(|i| record! { "username" => format!("user{i:02}"), "age" => 20 + i % 5 })
        .collect();
    ops.bulk_create(&items).await.unwrap();
    ops
}

fn user_schema() -> Schema {
    Schema::new()
        .field("username", [Rule::Required, Rule::Length { min: Some(3), max: Some(20) }])
        .field("email", [Rule::Email])
        .field("age", [Rule::Range { min: Some(0.0), max: Some(150.0) }])
}

#[tokio::test]
async fn alice_round_trip() {
    let fx = fixture().await;
    let ops: Operations<User> = Operations::for_model(fx.provider.clone());

    let alice = ops
        .create(&record! { "username" => "alice", "email" => "a@x.com" })
        .await
        .unwrap();
    let fetched = ops.get_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(fetched.username, "alice");

    assert!(ops.delete(alice.id).await.unwrap());
    assert!(!ops.exists(alice.id).await.unwrap());
    assert_eq!(ops.get_by_id(alice.id).await.unwrap(), None);
}

#[tokio::test]
async fn writes_invalidate_the_whole_cache() {
    let fx = fixture().await;
    let ops: Operations<User> = Operations::for_model(fx.provider.clone());
    let a = ops.create(&record! { "username" => "aaa" }).await.unwrap();
    let b = ops.create(&record! { "username" => "bbb" }).await.unwrap();

    ops.get_by_id(a.id).await.unwrap();
    ops.get_by_id(b.id).await.unwrap();
    assert_eq!(ops.cache_len(), 2);

    // Change row `a` behind the cache's back, then write an unrelated row
    let other: Repository<User> = Repository::new(fx.provider.clone());
    other
        .update(a.id, &record! { "age" => 99 })
        .await
        .unwrap();
    assert_eq!(ops.get_by_id(a.id).await.unwrap().unwrap().age, None);

    ops.update(b.id, &record! { "age" => 1 }).await.unwrap();
    assert_eq!(ops.cache_len(), 0);
    assert_eq!(ops.get_by_id(a.id).await.unwrap().unwrap().age, Some(99));
}

#[tokio::test]
async fn missing_rows_are_not_cached_and_failed_deletes_keep_the_cache() {
    let fx = fixture().await;
    let ops: Operations<User> = Operations::for_model(fx.provider.clone());
    let a = ops.create(&record! { "username" => "aaa" }).await.unwrap();

    assert_eq!(ops.get_by_id(404).await.unwrap(), None);
    ops.get_by_id(a.id).await.unwrap();
    assert_eq!(ops.cache_len(), 1);

    assert!(!ops.delete(404).await.unwrap());
    assert_eq!(ops.cache_len(), 1);

    ops.clear_cache();
    assert_eq!(ops.cache_len(), 0);
}

#[tokio::test]
async fn disabled_cache_always_reads_storage() {
    let fx = fixture().await;
    let ops = create_operations::<User>(fx.provider.clone(), None, false);
    let a = ops.create(&record! { "username" => "aaa" }).await.unwrap();
    ops.get_by_id(a.id).await.unwrap();
    assert_eq!(ops.cache_len(), 0);
}

#[tokio::test]
async fn validation_runs_before_persistence() {
    let fx = fixture().await;
    let ops: Operations<User> = Operations::for_model(fx.provider.clone()).with_validator(user_schema());

    let err = ops
        .create(&record! { "username" => "al", "email" => "a@x.com" })
        .await
        .unwrap_err();
    match err {
        Error::Validation { reason, payload } => {
            assert!(reason.contains("username"));
            assert_eq!(payload.get("username"), Some(&Value::from("al")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    // Required binds on create only
    assert!(ops.create(&record! { "email" => "a@x.com" }).await.unwrap_err().is_validation());

    let ok = ops.create(&record! { "username" => "alice" }).await.unwrap();
    ops.update(ok.id, &record! { "age" => 31 }).await.unwrap();
    assert!(ops
        .update(ok.id, &record! { "age" => 200 })
        .await
        .unwrap_err()
        .is_validation());

    // One bad item rejects the whole batch
    let err = ops
        .bulk_create(&[record! { "username" => "good" }, record! { "username" => "x" }])
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(ops.count().await.unwrap(), 1);
}

#[tokio::test]
async fn closure_validators() {
    let fx = fixture().await;
    let ops: Operations<User> = Operations::for_model(fx.provider.clone()).with_validator(
        |data: &Record, _mode: xtsqlorm::ValidationMode| {
            match data.get("username").and_then(Value::as_str) {
                Some("root") => Err(xtsqlorm::ValidationError::new("reserved", Some("username"), "root")),
                _ => Ok(()),
            }
        },
    );
    assert!(ops.create(&record! { "username" => "root" }).await.unwrap_err().is_validation());
    assert!(ops.create(&record! { "username" => "toor" }).await.is_ok());
}

#[tokio::test]
async fn pagination_pages_and_totals() {
    let fx = fixture().await;
    let ops = seeded(&fx, 23).await;

    let page = ops
        .get_paginated(3, 10, None, Some("username"), Order::Asc)
        .await
        .unwrap();
    assert_eq!(page.total, 23);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.items[0].username, "user21");
    assert_eq!(page.total_pages(), 3);
    assert!(!page.has_next());

    let filtered = ops
        .get_paginated(1, 100, Some(Condition::eq("age", 20)), None, Order::Asc)
        .await
        .unwrap();
    assert_eq!(filtered.total, 4);
    assert!(filtered.items.iter().all(|u| u.age == Some(20)));

    let beyond = ops.get_paginated(9, 10, None, None, Order::Asc).await.unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 23);
}

#[tokio::test]
async fn or_of_and_filtering() {
    let fx = fixture().await;
    let ops = seeded(&fx, 10).await;

    let rows = ops
        .filter_by_conditions(
            &[
                record! { "username" => "user01", "age" => 21 },
                record! { "username" => "user02", "age" => 99 },
                record! { "age" => 20 },
            ],
            None,
        )
        .await
        .unwrap();
    let mut names: Vec<_> = rows.into_iter().map(|u| u.username).collect();
    names.sort();
    assert_eq!(names, ["user01", "user05", "user10"]);

    assert_eq!(ops.filter_by_conditions(&[], None).await.unwrap().len(), 10);
    assert_eq!(ops.filter_by_conditions(&[], Some(4)).await.unwrap().len(), 4);

    let one = ops
        .get_one(Some(Condition::like("username", "user1%")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.username, "user10");
}

#[tokio::test]
async fn bulk_create_is_atomic() {
    let fx = fixture().await;
    let ops: Operations<User> = Operations::for_model(fx.provider.clone());

    let err = ops
        .bulk_create(&[record! { "username" => "a" }, record! { "age" => 1 }])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Database(_)));
    assert_eq!(ops.count().await.unwrap(), 0);

    let rows = ops
        .bulk_create(&[record! { "username" => "a" }, record! { "username" => "b" }])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].id < rows[1].id);
}

#[tokio::test]
async fn batched_create_commits_per_chunk() {
    let fx = fixture().await;
    let ops: Operations<User> = Operations::for_model(fx.provider.clone());

    let items: Vec<Record> = (0..7).map(|i| record! { "username" => format!("u{i}") }).collect();
    let rows = ops.bulk_create_batched(&items, 3).await.unwrap();
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[0].username, "u0");
    assert_eq!(rows[6].username, "u6");
    assert!(rows.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert_eq!(ops.count().await.unwrap(), 7);

    // Second chunk fails: the first stays committed
    let mut items: Vec<Record> = (0..4).map(|i| record! { "username" => format!("v{i}") }).collect();
    items[3] = record! { "age" => 1 };
    assert!(ops.bulk_create_batched(&items, 2).await.is_err());
    assert_eq!(ops.count().await.unwrap(), 9);
}

#[tokio::test]
async fn bulk_update_reports_skipped_and_missing_items() {
    let fx = fixture().await;
    let ops = seeded(&fx, 2).await;

    let report = ops
        .bulk_update(
            &[
                record! { "id" => 1, "username" => "X" },
                record! { "username" => "Y" },
                record! { "id" => 77, "username" => "Z" },
            ],
            "id",
        )
        .await
        .unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, vec![1]);
    assert_eq!(report.not_found, vec![77]);

    assert_eq!(ops.get_by_id(1).await.unwrap().unwrap().username, "X");
    assert_eq!(ops.get_by_id(2).await.unwrap().unwrap().username, "user02");
}

#[tokio::test]
async fn field_stats() {
    let fx = fixture().await;
    let ops: Operations<User> = Operations::for_model(fx.provider.clone());

    let empty = ops.get_field_stats("age").await.unwrap();
    assert_eq!(empty.count, 0);
    assert_eq!(empty.min, Value::Null);
    assert_eq!(empty.avg, 0.0);

    ops.bulk_create(&[
        record! { "username" => "a", "age" => 10 },
        record! { "username" => "b", "age" => 25 },
        record! { "username" => "c" },
    ])
    .await
    .unwrap();

    let stats = ops.get_field_stats("age").await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.min, Value::Int(10));
    assert_eq!(stats.max, Value::Int(25));
    assert!((stats.avg - 17.5).abs() < f64::EPSILON);

    assert!(matches!(
        ops.get_field_stats("salary").await,
        Err(Error::UnknownColumn { .. })
    ));
}

#[tokio::test]
async fn export_and_raw_sql() {
    let fx = fixture().await;
    let ops = seeded(&fx, 5).await;

    let table = ops
        .export_table(Some(&["username", "age"]), Some(Condition::gt("age", 22)))
        .await
        .unwrap();
    assert_eq!(table.columns(), ["username", "age"]);
    assert_eq!(table.num_rows(), 2);
    assert!(table.column("id").is_none());

    let full = ops.export_table(None, None).await.unwrap();
    assert_eq!(full.num_columns(), 4);
    assert_eq!(full.num_rows(), 5);

    assert_eq!(ops.records().await.unwrap().len(), 5);

    let mut ages = ops.distinct_rows(&["age"]).await.unwrap();
    ages.sort_by_key(|row| row[0].as_i64());
    assert_eq!(ages.len(), 5);

    ops.get_by_id(1).await.unwrap();
    let affected = ops
        .execute_raw("UPDATE users SET age = ? WHERE age > ?", vec![0.into(), 22.into()])
        .await
        .unwrap();
    assert_eq!(affected, 2);
    assert_eq!(ops.cache_len(), 0);

    let rows = ops
        .fetch_raw("SELECT username FROM users WHERE age = ?", vec![0.into()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].len(), 1);

    let users = ops
        .from_statement("SELECT * FROM users WHERE age = ? ORDER BY id", vec![0.into()])
        .await
        .unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.age == Some(0)));
}
