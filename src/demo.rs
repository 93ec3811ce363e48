//! The demonstration sequence the `occdb` binary runs.

use crate::connection::Datastore;
use crate::harness::{Harness, HarnessConfig};
use crate::id::generate_id;
use crate::model::{Employee, Timer, unix_nanos_now};
use crate::report::{Event, Reporter};
use crate::store::{EntityStore, StoreError};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::sync::Arc;

const FIRST_NAME: &str = "Antonio";
const LAST_NAME: &str = "Alexander";
const EMAIL_ADDRESS: &str = "antonio.alexander@mistersoftwaredeveloper.com";

#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    /// `None` skips the concurrency harness.
    pub harness: Option<HarnessConfig>,
}

pub struct Demo<'a> {
    store: EntityStore,
    datastore: Arc<dyn Datastore>,
    reporter: &'a dyn Reporter,
}

impl<'a> Demo<'a> {
    pub fn new(store: EntityStore, datastore: Arc<dyn Datastore>, reporter: &'a dyn Reporter) -> Self {
        Self {
            store,
            datastore,
            reporter,
        }
    }

    pub async fn run(&self, options: &DemoOptions, datastore_label: &str) -> Result<()> {
        self.reporter.report(&Event::Banner {
            build: &self.store.config().build,
            datastore: datastore_label,
        })?;

        self.concurrent_create().await.context("concurrent create")?;
        self.conditional_write().await.context("conditional write")?;
        if let Some(config) = &options.harness {
            self.contention(config).await.context("concurrency harness")?;
        }
        self.referential_integrity()
            .await
            .context("referential integrity")?;
        Ok(())
    }

    fn db(&self) -> &dyn Datastore {
        self.datastore.as_ref()
    }

    fn section(&self, title: &str) -> Result<()> {
        self.reporter.report(&Event::Section { title })?;
        Ok(())
    }

    fn note(&self, message: impl AsRef<str>) -> Result<()> {
        self.reporter.report(&Event::Note {
            message: message.as_ref(),
        })?;
        Ok(())
    }

    fn entity<T: Serialize>(&self, label: &str, entity: &T) -> Result<()> {
        self.reporter.report(&Event::Entity {
            label,
            entity: serde_json::to_value(entity)?,
        })?;
        Ok(())
    }

    fn expected(&self, label: &str, err: &StoreError) -> Result<()> {
        self.reporter.report(&Event::ExpectedError {
            label,
            error: err.to_string(),
        })?;
        Ok(())
    }

    /// Deletes every timer, then every employee.
    async fn reset(&self) -> Result<()> {
        self.store.timer_delete(self.db(), None).await?;
        self.store.employee_delete(self.db(), None).await?;
        Ok(())
    }

    async fn concurrent_create(&self) -> Result<()> {
        self.section("Testing Concurrent Create with Employees")?;
        self.note("Deleting all current employees and timers")?;
        self.reset().await?;

        let created = self
            .store
            .employee_create(
                self.db(),
                &Employee::new(generate_id(), FIRST_NAME, LAST_NAME, EMAIL_ADDRESS),
            )
            .await?;
        self.entity("Created employee", &created)?;

        let duplicate = Employee::new(generate_id(), FIRST_NAME, LAST_NAME, EMAIL_ADDRESS);
        self.entity("Creating the same employee with a different id", &duplicate)?;
        let upserted = self.store.employee_create(self.db(), &duplicate).await?;
        if upserted.id != created.id || upserted.version != created.version + 1 {
            bail!(
                "expected {} at version {}, got {} at version {}",
                created.id,
                created.version + 1,
                upserted.id,
                upserted.version
            );
        }
        self.entity(
            "The id is unchanged, the names were written and the version was incremented",
            &upserted,
        )?;
        Ok(())
    }

    async fn conditional_write(&self) -> Result<()> {
        self.section("Testing Concurrent Mutations")?;
        self.reset().await?;

        let employee = self
            .store
            .employee_create(
                self.db(),
                &Employee::new(generate_id(), "Teddy", "Perkins", "teddy.perkins@atlanta.com"),
            )
            .await?;

        self.note(format!(
            "Mutating the employee at its latest version {}",
            employee.version
        ))?;
        let mut renamed = employee.clone();
        renamed.first_name = "Theodore".to_string();
        let mutated = self.store.employee_write(self.db(), &renamed).await?;
        self.entity("The mutation succeeded", &mutated)?;

        self.note(format!(
            "Mutating again with the old version {} instead of {}",
            employee.version, mutated.version
        ))?;
        match self.store.employee_write(self.db(), &renamed).await {
            Ok(_) => bail!("a stale write was accepted"),
            Err(err) if err.is_version_conflict() => self.expected("Stale write", &err)?,
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    async fn contention(&self, config: &HarnessConfig) -> Result<()> {
        self.section("Testing Concurrent Mutations with Different Timings")?;
        let employee = self
            .store
            .employee_create(
                self.db(),
                &Employee::new(generate_id(), FIRST_NAME, LAST_NAME, EMAIL_ADDRESS),
            )
            .await?;
        self.entity("Contended employee", &employee)?;
        self.note(format!(
            "Starting {} actors and counting rejected writes over {:?}",
            config.actors.len(),
            config.observation
        ))?;

        let harness = Harness::new(self.store.clone(), Arc::clone(&self.datastore));
        let report = harness.run(config, &employee.id).await?;
        self.reporter.report(&Event::Harness { report: &report })?;
        Ok(())
    }

    async fn referential_integrity(&self) -> Result<()> {
        self.section("Testing Concurrency Between Tables")?;
        let employee = self
            .store
            .employee_create(
                self.db(),
                &Employee::new(generate_id(), FIRST_NAME, LAST_NAME, EMAIL_ADDRESS),
            )
            .await?;

        let mut timer = Timer::new(generate_id(), generate_id(), "This is a comment", unix_nanos_now());
        self.entity("Creating a timer with a non-existent employee id", &timer)?;
        match self.store.timer_create(self.db(), &timer).await {
            Ok(_) => bail!("a timer without an employee was accepted"),
            Err(err) if err.is_referential_integrity() => self.expected("Orphan timer", &err)?,
            Err(err) => return Err(err.into()),
        }

        self.note("With a valid employee id the create succeeds")?;
        timer.employee_id = employee.id.clone();
        let created = self.store.timer_create(self.db(), &timer).await?;
        self.entity("Created timer", &created)?;

        match self.store.employee_delete(self.db(), Some(employee.id.as_str())).await {
            Ok(_) => bail!("an employee with timers was deleted"),
            Err(err) if err.is_referential_integrity() => {
                self.expected("Deleting the timer's employee", &err)?
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::memory::MemoryDatastore;
    use crate::model::{TableNames, schema};
    use crate::report::JsonReporter;
    use crate::store::StoreConfig;

    #[tokio::test]
    async fn test_demo_without_harness() {
        let tables = TableNames::default();
        let datastore = Arc::new(MemoryDatastore::with_tables(schema::tables(&tables)).unwrap());
        let reporter = JsonReporter::new(Vec::new());
        let store = EntityStore::new(StoreConfig::new(tables));

        Demo::new(store, datastore.clone(), &reporter)
            .run(&DemoOptions::default(), "memory")
            .await
            .unwrap();

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(text.matches("\"expected_error\"").count(), 3);
        assert_eq!(datastore.row_count("timer").await.unwrap(), 1);
    }
}
