/// Versioned create / conditional write tests
///
/// Run with: cargo test --test occ_protocol_tests

use futures::future::join_all;
use occdb::model::schema;
use occdb::{Employee, EntityStore, MemoryDatastore, StoreConfig, StoreError, TableNames, Timer, generate_id};
use std::sync::Arc;
use tokio::sync::Barrier;
use tokio_test::{assert_err, assert_ok};

fn setup() -> (EntityStore, MemoryDatastore) {
    let tables = TableNames::default();
    let db = MemoryDatastore::with_tables(schema::tables(&tables)).unwrap();
    (EntityStore::new(StoreConfig::new(tables)), db)
}

#[tokio::test]
async fn test_successive_writes_increment_by_one() {
    let (store, db) = setup();
    let mut employee = store
        .employee_create(&db, &Employee::new(generate_id(), "Antonio", "Alexander", "a@x.com"))
        .await
        .unwrap();

    for expected in 2..=20 {
        employee.last_name = format!("Alexander {}", expected);
        employee = store.employee_write(&db, &employee).await.unwrap();
        assert_eq!(employee.version, expected);
    }
    assert_eq!(store.employee_read(&db, &employee.id).await.unwrap().version, 20);
}

#[tokio::test]
async fn test_concurrent_writes_same_version_one_wins() {
    let (store, db) = setup();
    let store = Arc::new(store);
    let created = store
        .employee_create(&db, &Employee::new(generate_id(), "Antonio", "", "a@x.com"))
        .await
        .unwrap();

    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));
    let mut handles = vec![];

    for task_id in 0..contenders {
        let store = Arc::clone(&store);
        let db = db.clone();
        let barrier = Arc::clone(&barrier);
        let mut employee = created.clone();
        employee.first_name = format!("Writer {}", task_id);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            store.employee_write(&db, &employee).await
        }));
    }

    let outcomes: Vec<Result<Employee, StoreError>> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<&Employee> = outcomes.iter().filter_map(|outcome| outcome.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one write may land on version 1");
    assert_eq!(winners[0].version, 2);
    assert!(
        outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .all(StoreError::is_version_conflict)
    );

    let stored = store.employee_read(&db, &created.id).await.unwrap();
    assert_eq!(&stored, winners[0]);
}

#[tokio::test]
async fn test_interleaved_read_write_pair() {
    let (store, db) = setup();
    let created = store
        .employee_create(&db, &Employee::new("e1", "Antonio", "", "a@x.com"))
        .await
        .unwrap();

    let first = store.employee_read(&db, "e1").await.unwrap();
    let second = store.employee_read(&db, "e1").await.unwrap();
    assert_eq!(first.version, created.version);

    assert_ok!(store.employee_write(&db, &first).await);
    let err = assert_err!(store.employee_write(&db, &second).await);
    assert!(err.is_version_conflict());
}

#[tokio::test]
async fn test_create_on_used_email_returns_original() {
    let (store, db) = setup();
    let original = store
        .employee_create(&db, &Employee::new(generate_id(), "Antonio", "Alexander", "a@x.com"))
        .await
        .unwrap();

    let again = store
        .employee_create(&db, &Employee::new(generate_id(), "Tony", "Alex", "a@x.com"))
        .await
        .unwrap();

    assert_eq!(again.id, original.id);
    assert_eq!(again.version, original.version + 1);
    assert_eq!(again.first_name, "Tony");
    assert_eq!(db.row_count("employee").await.unwrap(), 1);
}

#[tokio::test]
async fn test_read_missing_or_deleted() {
    let (store, db) = setup();
    let err = store.employee_read(&db, "never-created").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "employee", .. }));

    store
        .employee_create(&db, &Employee::new("e1", "", "", "a@x.com"))
        .await
        .unwrap();
    assert_eq!(store.employee_delete(&db, Some("e1")).await.unwrap(), 1);
    assert!(store.employee_read(&db, "e1").await.unwrap_err().is_not_found());
    assert!(store.timer_read(&db, "t-missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_walkthrough_scenario() {
    let (store, db) = setup();

    let e1 = store
        .employee_create(&db, &Employee::new("E1", "Antonio", "", "a@x.com"))
        .await
        .unwrap();
    assert_eq!(e1.version, 1);

    let upserted = store
        .employee_create(&db, &Employee::new(generate_id(), "Antonio", "", "a@x.com"))
        .await
        .unwrap();
    assert_eq!(upserted.id, "E1");
    assert_eq!(upserted.version, 2);

    let mut rename = upserted.clone();
    rename.first_name = "Tony".to_string();
    let renamed = store.employee_write(&db, &rename).await.unwrap();
    assert_eq!(renamed.version, 3);
    assert_eq!(renamed.first_name, "Tony");

    let err = store.employee_write(&db, &rename).await.unwrap_err();
    assert!(err.is_version_conflict());

    let timer = store
        .timer_create(&db, &Timer::new(generate_id(), "E1", "comment", 1_000))
        .await
        .unwrap();
    assert_eq!(timer.version, 1);

    let err = store
        .timer_create(&db, &Timer::new(generate_id(), generate_id(), "comment", 1_000))
        .await
        .unwrap_err();
    assert!(err.is_referential_integrity());
}

#[tokio::test]
async fn test_custom_table_names() {
    let tables = TableNames {
        employee: "staff".to_string(),
        timer: "staff_timer".to_string(),
    };
    let db = MemoryDatastore::with_tables(schema::tables(&tables)).unwrap();
    let store = EntityStore::new(StoreConfig::new(tables));

    store
        .employee_create(&db, &Employee::new("e1", "A", "", "a@x.com"))
        .await
        .unwrap();
    store
        .timer_create(&db, &Timer::new("t1", "e1", "", 5))
        .await
        .unwrap();

    assert_eq!(db.row_count("staff").await.unwrap(), 1);
    assert_eq!(db.row_count("staff_timer").await.unwrap(), 1);
}
