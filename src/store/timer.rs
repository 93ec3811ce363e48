use super::{EntityStore, StoreError, StoreResult, discard, settle};
use crate::connection::{Executor, Transaction, Transactional};
use crate::core::RowReader;
use crate::model::Timer;
use crate::model::schema::{COMMENT, COMPLETED, EMPLOYEE_ID, FINISH, START, UUID, VERSION};
use crate::statement::{Filter, Query, Statement};
use tracing::debug;

pub(crate) const ENTITY: &str = "timer";

const COLUMNS: [&str; 7] = [UUID, COMMENT, START, FINISH, COMPLETED, VERSION, EMPLOYEE_ID];

fn validate_create(timer: &Timer) -> StoreResult<()> {
    if timer.id.is_empty() {
        return Err(StoreError::validation("timer id is required"));
    }
    if timer.employee_id.is_empty() {
        return Err(StoreError::validation("timer employee id is required"));
    }
    if timer.start <= 0 {
        return Err(StoreError::validation(format!(
            "timer start must be positive, got {}",
            timer.start
        )));
    }
    validate_finish(timer)
}

fn validate_finish(timer: &Timer) -> StoreResult<()> {
    if timer.is_finished() && timer.finish < timer.start {
        return Err(StoreError::validation(format!(
            "timer finish {} is before start {}",
            timer.finish, timer.start
        )));
    }
    Ok(())
}

impl EntityStore {
    /// Inserts the timer at version 1 under an existing employee. When the id
    /// already exists, that timer takes the new comment and owner and its
    /// version is bumped instead.
    pub async fn timer_create<D>(&self, db: &D, timer: &Timer) -> StoreResult<Timer>
    where
        D: Transactional + ?Sized,
    {
        validate_create(timer)?;
        let mut tx = db.begin().await?;
        let outcome = self.timer_upsert(&mut *tx, timer).await;
        match settle(tx, outcome).await {
            Ok(created) => {
                debug!(timer = %created.id, employee = %created.employee_id, version = created.version, "timer created");
                Ok(created)
            }
            Err(err) => {
                debug!(timer = %timer.id, employee = %timer.employee_id, error = %err, "timer create failed");
                Err(err)
            }
        }
    }

    async fn timer_upsert(&self, tx: &mut dyn Transaction, timer: &Timer) -> StoreResult<Timer> {
        let table = &self.tables().timer;
        let owner = self.employee_key(tx, &timer.employee_id).await?.ok_or_else(|| {
            StoreError::ReferentialIntegrity(format!(
                "timer '{}' references missing employee '{}'",
                timer.id, timer.employee_id
            ))
        })?;

        let insert = Statement::insert(table.as_str())
            .value(UUID, timer.id.as_str())
            .value(COMMENT, timer.comment.as_str())
            .value(START, timer.start)
            .value(FINISH, timer.finish)
            .value(COMPLETED, timer.completed)
            .value(VERSION, 1i64)
            .value(EMPLOYEE_ID, owner)
            .build();

        match tx.execute(&insert).await {
            Ok(_) => {}
            Err(err) if err.is_unique_violation() => {
                let update = Statement::update(table.as_str())
                    .set(COMMENT, timer.comment.as_str())
                    .set(EMPLOYEE_ID, owner)
                    .increment(VERSION, 1)
                    .filter(Filter::new().eq(UUID, timer.id.as_str()));
                if tx.execute(&update).await? == 0 {
                    return Err(err.into());
                }
                debug!(timer = %timer.id, "create collided, updated in place");
            }
            Err(err) => return Err(err.into()),
        }

        self.timer_select(tx, Filter::new().eq(UUID, timer.id.as_str()))
            .await?
            .ok_or_else(|| StoreError::not_found(ENTITY, timer.id.as_str()))
    }

    async fn timer_select(&self, tx: &mut dyn Transaction, filter: Filter) -> StoreResult<Option<Timer>> {
        let query = Query::select(self.tables().timer.as_str(), COLUMNS).filter(filter);
        let Some(row) = tx.query_row(&query).await? else {
            return Ok(None);
        };

        let mut reader = RowReader::new(row);
        let mut timer = Timer {
            id: reader.text()?,
            comment: reader.text()?,
            start: reader.integer()?,
            finish: reader.integer()?,
            elapsed_time: 0,
            completed: reader.boolean()?,
            version: reader.integer()?,
            employee_id: String::new(),
        };
        let owner = reader.integer()?;
        timer.employee_id = self.employee_uuid(tx, owner).await?.ok_or_else(|| {
            StoreError::ReferentialIntegrity(format!(
                "timer '{}' references missing employee key {}",
                timer.id, owner
            ))
        })?;
        timer.elapsed_time = timer.elapsed();
        Ok(Some(timer))
    }

    /// Writes comment, finish and completed only if the row is still at
    /// `timer.version`. The finish is checked against the stored start.
    pub async fn timer_write<D>(&self, db: &D, timer: &Timer) -> StoreResult<Timer>
    where
        D: Transactional + ?Sized,
    {
        if timer.id.is_empty() {
            return Err(StoreError::validation("timer id is required"));
        }

        let mut tx = db.begin().await?;
        let outcome = self.timer_conditional_write(&mut *tx, timer).await;
        let written = settle(tx, outcome).await?;
        debug!(timer = %written.id, version = written.version, "timer written");
        Ok(written)
    }

    async fn timer_conditional_write(&self, tx: &mut dyn Transaction, timer: &Timer) -> StoreResult<Timer> {
        let update = Statement::update(self.tables().timer.as_str())
            .set(COMMENT, timer.comment.as_str())
            .set(FINISH, timer.finish)
            .set(COMPLETED, timer.completed)
            .increment(VERSION, 1)
            .filter(Filter::new().eq(UUID, timer.id.as_str()).eq(VERSION, timer.version));

        if tx.execute(&update).await? == 0 {
            return Err(StoreError::version_conflict(ENTITY, timer.id.as_str(), timer.version));
        }

        let filter = Filter::new()
            .eq(UUID, timer.id.as_str())
            .eq(VERSION, timer.version + 1);
        let written = self
            .timer_select(tx, filter)
            .await?
            .ok_or_else(|| StoreError::version_conflict(ENTITY, timer.id.as_str(), timer.version))?;
        validate_finish(&written)?;
        Ok(written)
    }

    pub async fn timer_read<D>(&self, db: &D, id: &str) -> StoreResult<Timer>
    where
        D: Transactional + ?Sized,
    {
        let mut tx = db.begin().await?;
        let outcome = self.timer_select(&mut *tx, Filter::new().eq(UUID, id)).await;
        discard(tx, outcome)
            .await?
            .ok_or_else(|| StoreError::not_found(ENTITY, id))
    }

    /// Deletes one timer, or all of them when `id` is `None`.
    pub async fn timer_delete<D>(&self, db: &D, id: Option<&str>) -> StoreResult<u64>
    where
        D: Executor + ?Sized,
    {
        let filter = id.map_or_else(Filter::all, |id| Filter::new().eq(UUID, id));
        let removed = db
            .execute(&Statement::delete(self.tables().timer.as_str(), filter))
            .await?;
        debug!(timer = id.unwrap_or("*"), removed, "timer deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::memory::MemoryDatastore;
    use crate::model::{Employee, TableNames, schema};
    use crate::store::StoreConfig;

    async fn setup() -> (EntityStore, MemoryDatastore) {
        let tables = TableNames::default();
        let db = MemoryDatastore::with_tables(schema::tables(&tables)).unwrap();
        let store = EntityStore::new(StoreConfig::new(tables));
        store
            .employee_create(&db, &Employee::new("e1", "Antonio", "", "a@x.com"))
            .await
            .unwrap();
        (store, db)
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let (store, db) = setup().await;
        let created = store
            .timer_create(&db, &Timer::new("t1", "e1", "standup", 1_000))
            .await
            .unwrap();

        assert_eq!(created.version, 1);
        assert_eq!(created.employee_id, "e1");
        assert_eq!(created.elapsed_time, 0);
        assert_eq!(store.timer_read(&db, "t1").await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_finish_derives_elapsed_time() {
        let (store, db) = setup().await;
        let mut timer = store
            .timer_create(&db, &Timer::new("t1", "e1", "standup", 1_000))
            .await
            .unwrap();

        timer.finish = 4_000;
        timer.completed = true;
        let finished = store.timer_write(&db, &timer).await.unwrap();
        assert_eq!(finished.version, 2);
        assert_eq!(finished.elapsed_time, 3_000);
        assert!(finished.completed);

        let err = store.timer_write(&db, &timer).await.unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn test_finish_before_start_is_rejected() {
        let (store, db) = setup().await;
        let mut timer = store
            .timer_create(&db, &Timer::new("t1", "e1", "", 1_000))
            .await
            .unwrap();

        timer.finish = 10;
        assert!(store.timer_write(&db, &timer).await.unwrap_err().is_validation());
        assert_eq!(store.timer_read(&db, "t1").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_finish_checked_against_stored_start() {
        let (store, db) = setup().await;
        store
            .timer_create(&db, &Timer::new("t1", "e1", "", 1_000))
            .await
            .unwrap();

        let partial = Timer {
            finish: 10,
            completed: true,
            version: 1,
            ..Timer::new("t1", "", "", 0)
        };
        assert!(store.timer_write(&db, &partial).await.unwrap_err().is_validation());

        let stored = store.timer_read(&db, "t1").await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.finish, 0);
        assert!(!stored.completed);

        let partial = Timer { finish: 1_500, ..partial };
        let finished = store.timer_write(&db, &partial).await.unwrap();
        assert_eq!(finished.start, 1_000);
        assert_eq!(finished.elapsed_time, 500);
    }

    #[tokio::test]
    async fn test_delete_one_is_idempotent() {
        let (store, db) = setup().await;
        for id in ["t1", "t2"] {
            store
                .timer_create(&db, &Timer::new(id, "e1", "", 1_000))
                .await
                .unwrap();
        }

        assert_eq!(store.timer_delete(&db, Some("t1")).await.unwrap(), 1);
        assert_eq!(store.timer_delete(&db, Some("t1")).await.unwrap(), 0);
        assert!(store.timer_read(&db, "t1").await.unwrap_err().is_not_found());
        assert_eq!(store.timer_read(&db, "t2").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (store, db) = setup().await;
        for timer in [
            Timer::new("", "e1", "", 1),
            Timer::new("t1", "", "", 1),
            Timer::new("t1", "e1", "", 0),
        ] {
            assert!(store.timer_create(&db, &timer).await.unwrap_err().is_validation());
        }
        assert_eq!(db.row_count("timer").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_with_existing_id_moves_owner() {
        let (store, db) = setup().await;
        store
            .employee_create(&db, &Employee::new("e2", "Beth", "", "b@x.com"))
            .await
            .unwrap();
        store
            .timer_create(&db, &Timer::new("t1", "e1", "first", 1_000))
            .await
            .unwrap();

        let moved = store
            .timer_create(&db, &Timer::new("t1", "e2", "second", 2_000))
            .await
            .unwrap();
        assert_eq!(moved.version, 2);
        assert_eq!(moved.employee_id, "e2");
        assert_eq!(moved.comment, "second");
        assert_eq!(moved.start, 1_000);
        assert_eq!(db.row_count("timer").await.unwrap(), 1);
    }
}
