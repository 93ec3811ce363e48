use super::{EntityStore, StoreError, StoreResult, discard, settle};
use crate::connection::{Executor, Transaction, Transactional};
use crate::core::{DbError, RowReader};
use crate::model::Employee;
use crate::model::schema::{EMAIL_ADDRESS, FIRST_NAME, ID, LAST_NAME, LAST_UPDATED, UUID, VERSION};
use crate::statement::{Filter, Query, Statement};
use chrono::Utc;
use tracing::debug;

pub(crate) const ENTITY: &str = "employee";

const COLUMNS: [&str; 6] = [UUID, FIRST_NAME, LAST_NAME, EMAIL_ADDRESS, VERSION, LAST_UPDATED];

fn decode(row: Vec<crate::core::Value>) -> StoreResult<Employee> {
    let mut reader = RowReader::new(row);
    Ok(Employee {
        id: reader.text()?,
        first_name: reader.text()?,
        last_name: reader.text()?,
        email_address: reader.text()?,
        version: reader.integer()?,
        last_updated: reader.timestamp()?,
    })
}

fn validate(employee: &Employee) -> StoreResult<()> {
    if employee.id.is_empty() {
        return Err(StoreError::validation("employee id is required"));
    }
    if employee.email_address.is_empty() {
        return Err(StoreError::validation("employee email address is required"));
    }
    Ok(())
}

impl EntityStore {
    /// Inserts the employee at version 1. When the id or email already
    /// exists, the existing row takes the new names and its version is
    /// bumped instead; its id is kept.
    pub async fn employee_create<D>(&self, db: &D, employee: &Employee) -> StoreResult<Employee>
    where
        D: Transactional + ?Sized,
    {
        validate(employee)?;
        let mut tx = db.begin().await?;
        let outcome = self.employee_upsert(&mut *tx, employee).await;
        let created = settle(tx, outcome).await?;
        debug!(employee = %created.id, version = created.version, "employee created");
        Ok(created)
    }

    async fn employee_upsert(&self, tx: &mut dyn Transaction, employee: &Employee) -> StoreResult<Employee> {
        let table = &self.tables().employee;
        let now = Utc::now();

        let insert = Statement::insert(table.as_str())
            .value(UUID, employee.id.as_str())
            .value(FIRST_NAME, employee.first_name.as_str())
            .value(LAST_NAME, employee.last_name.as_str())
            .value(EMAIL_ADDRESS, employee.email_address.as_str())
            .value(VERSION, 1i64)
            .value(LAST_UPDATED, now)
            .build();

        let id = match tx.execute(&insert).await {
            Ok(_) => employee.id.clone(),
            Err(err) if err.is_unique_violation() => {
                let existing = self.employee_collision(tx, employee).await?.ok_or(err)?;
                let update = Statement::update(table.as_str())
                    .set(FIRST_NAME, employee.first_name.as_str())
                    .set(LAST_NAME, employee.last_name.as_str())
                    .set(LAST_UPDATED, now)
                    .increment(VERSION, 1)
                    .filter(Filter::new().eq(UUID, existing.as_str()));
                tx.execute(&update).await?;
                debug!(employee = %existing, requested = %employee.id, "create collided, updated in place");
                existing
            }
            Err(err) => return Err(err.into()),
        };

        self.employee_select(tx, Filter::new().eq(UUID, id.as_str()))
            .await?
            .ok_or_else(|| StoreError::not_found(ENTITY, id))
    }

    /// The first existing row sharing a key with `employee`: id, then email.
    async fn employee_collision(
        &self,
        tx: &mut dyn Transaction,
        employee: &Employee,
    ) -> Result<Option<String>, DbError> {
        let table = &self.tables().employee;
        for filter in [
            Filter::new().eq(UUID, employee.id.as_str()),
            Filter::new().eq(EMAIL_ADDRESS, employee.email_address.as_str()),
        ] {
            let query = Query::select(table.as_str(), [UUID]).filter(filter);
            if let Some(row) = tx.query_row(&query).await? {
                return Ok(Some(RowReader::new(row).text()?));
            }
        }
        Ok(None)
    }

    async fn employee_select(&self, tx: &mut dyn Transaction, filter: Filter) -> StoreResult<Option<Employee>> {
        let query = Query::select(self.tables().employee.as_str(), COLUMNS).filter(filter);
        tx.query_row(&query).await?.map(decode).transpose()
    }

    /// Writes names and email only if the row is still at `employee.version`.
    pub async fn employee_write<D>(&self, db: &D, employee: &Employee) -> StoreResult<Employee>
    where
        D: Transactional + ?Sized,
    {
        validate(employee)?;
        let mut tx = db.begin().await?;
        let outcome = self.employee_conditional_write(&mut *tx, employee).await;
        match settle(tx, outcome).await {
            Ok(written) => {
                debug!(employee = %written.id, version = written.version, "employee written");
                Ok(written)
            }
            Err(err) => {
                debug!(employee = %employee.id, version = employee.version, error = %err, "employee write rejected");
                Err(err)
            }
        }
    }

    async fn employee_conditional_write(
        &self,
        tx: &mut dyn Transaction,
        employee: &Employee,
    ) -> StoreResult<Employee> {
        let update = Statement::update(self.tables().employee.as_str())
            .set(FIRST_NAME, employee.first_name.as_str())
            .set(LAST_NAME, employee.last_name.as_str())
            .set(EMAIL_ADDRESS, employee.email_address.as_str())
            .set(LAST_UPDATED, Utc::now())
            .increment(VERSION, 1)
            .filter(
                Filter::new()
                    .eq(UUID, employee.id.as_str())
                    .eq(VERSION, employee.version),
            );

        if tx.execute(&update).await? == 0 {
            return Err(StoreError::version_conflict(ENTITY, employee.id.as_str(), employee.version));
        }

        let filter = Filter::new()
            .eq(UUID, employee.id.as_str())
            .eq(VERSION, employee.version + 1);
        self.employee_select(tx, filter)
            .await?
            .ok_or_else(|| StoreError::version_conflict(ENTITY, employee.id.as_str(), employee.version))
    }

    pub async fn employee_read<D>(&self, db: &D, id: &str) -> StoreResult<Employee>
    where
        D: Transactional + ?Sized,
    {
        let mut tx = db.begin().await?;
        let outcome = self.employee_select(&mut *tx, Filter::new().eq(UUID, id)).await;
        discard(tx, outcome)
            .await?
            .ok_or_else(|| StoreError::not_found(ENTITY, id))
    }

    /// Deletes one employee, or all of them when `id` is `None`. Rejected with
    /// `ReferentialIntegrity` while any timer still references a target row.
    pub async fn employee_delete<D>(&self, db: &D, id: Option<&str>) -> StoreResult<u64>
    where
        D: Executor + ?Sized,
    {
        let filter = id.map_or_else(Filter::all, |id| Filter::new().eq(UUID, id));
        let removed = db
            .execute(&Statement::delete(self.tables().employee.as_str(), filter))
            .await?;
        debug!(employee = id.unwrap_or("*"), removed, "employee deleted");
        Ok(removed)
    }

    /// Integer key of the employee with string id `id`, if it exists.
    pub(crate) async fn employee_key(&self, tx: &mut dyn Transaction, id: &str) -> StoreResult<Option<i64>> {
        let query = Query::select(self.tables().employee.as_str(), [ID]).filter(Filter::new().eq(UUID, id));
        match tx.query_row(&query).await? {
            Some(row) => Ok(Some(RowReader::new(row).integer()?)),
            None => Ok(None),
        }
    }

    /// String id of the employee with integer key `key`, if it exists.
    pub(crate) async fn employee_uuid(&self, tx: &mut dyn Transaction, key: i64) -> StoreResult<Option<String>> {
        let query = Query::select(self.tables().employee.as_str(), [UUID]).filter(Filter::new().eq(ID, key));
        match tx.query_row(&query).await? {
            Some(row) => Ok(Some(RowReader::new(row).text()?)),
            None => Ok(None),
        }
    }
}
