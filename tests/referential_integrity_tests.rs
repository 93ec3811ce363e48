use occdb::model::schema;
use occdb::{DbError, Employee, EntityStore, MemoryDatastore, StoreConfig, StoreError, TableNames, Timer, generate_id};

fn setup() -> (EntityStore, MemoryDatastore) {
    let tables = TableNames::default();
    let db = MemoryDatastore::with_tables(schema::tables(&tables)).unwrap();
    (EntityStore::new(StoreConfig::new(tables)), db)
}

#[tokio::test]
async fn test_orphan_timer_rejected_then_accepted() {
    let (store, db) = setup();
    let owner_id = generate_id();
    let timer = Timer::new(generate_id(), owner_id.as_str(), "This is a comment", 1_700_000_000);

    let err = store.timer_create(&db, &timer).await.unwrap_err();
    match err {
        StoreError::ReferentialIntegrity(msg) => assert!(msg.contains(&owner_id)),
        other => panic!("Expected ReferentialIntegrity, got {:?}", other),
    }
    assert_eq!(db.row_count("timer").await.unwrap(), 0);

    store
        .employee_create(&db, &Employee::new(owner_id.as_str(), "Antonio", "", "a@x.com"))
        .await
        .unwrap();
    let created = store.timer_create(&db, &timer).await.unwrap();
    assert_eq!(created.employee_id, owner_id);
    assert_eq!(created.version, 1);
}

#[tokio::test]
async fn test_owner_delete_restricted_while_referenced() {
    let (store, db) = setup();
    store
        .employee_create(&db, &Employee::new("e1", "Antonio", "", "a@x.com"))
        .await
        .unwrap();
    store
        .timer_create(&db, &Timer::new("t1", "e1", "", 10))
        .await
        .unwrap();

    let err = store.employee_delete(&db, Some("e1")).await.unwrap_err();
    assert!(err.is_referential_integrity());
    assert_eq!(store.employee_read(&db, "e1").await.unwrap().version, 1);

    assert_eq!(store.timer_delete(&db, None).await.unwrap(), 1);
    assert_eq!(store.employee_delete(&db, Some("e1")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_bulk_reset_order() {
    let (store, db) = setup();
    for n in 0..3 {
        let employee_id = format!("e{}", n);
        store
            .employee_create(&db, &Employee::new(employee_id.as_str(), "", "", format!("{}@x.com", n)))
            .await
            .unwrap();
        store
            .timer_create(&db, &Timer::new(format!("t{}", n), employee_id.as_str(), "", 10))
            .await
            .unwrap();
    }

    assert!(store.employee_delete(&db, None).await.is_err());
    assert_eq!(db.row_count("employee").await.unwrap(), 3);

    assert_eq!(store.timer_delete(&db, None).await.unwrap(), 3);
    assert_eq!(store.employee_delete(&db, None).await.unwrap(), 3);
    assert_eq!(store.timer_delete(&db, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_timer_owner_survives_employee_rewrite() {
    let (store, db) = setup();
    let employee = store
        .employee_create(&db, &Employee::new("e1", "Antonio", "", "a@x.com"))
        .await
        .unwrap();
    store
        .timer_create(&db, &Timer::new("t1", "e1", "", 10))
        .await
        .unwrap();

    let mut renamed = employee.clone();
    renamed.email_address = "antonio@x.com".to_string();
    store.employee_write(&db, &renamed).await.unwrap();

    assert_eq!(store.timer_read(&db, "t1").await.unwrap().employee_id, "e1");
}

#[tokio::test]
async fn test_datastore_rejects_dangling_key_directly() {
    use occdb::statement::Statement;
    use occdb::Executor;

    let (_, db) = setup();
    let err = db
        .execute(
            &Statement::insert("timer")
                .value("uuid", "t1")
                .value("start", 1i64)
                .value("employee_id", 42i64)
                .build(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ForeignKeyViolation(_)));
}
