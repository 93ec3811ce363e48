//! Entities persisted by the store.

pub mod schema;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMPLOYEE_TABLE: &str = "employee";
pub const DEFAULT_TIMER_TABLE: &str = "timer";

/// Physical table names. Timer rows reference the employee table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNames {
    pub employee: String,
    pub timer: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            employee: DEFAULT_EMPLOYEE_TABLE.to_string(),
            timer: DEFAULT_TIMER_TABLE.to_string(),
        }
    }
}

/// The owner entity. `email_address` is an alternate key.
///
/// `version` is assigned by the store: callers only echo back the version they
/// last read when asking for a conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    pub email_address: String,
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Employee {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email_address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email_address: email_address.into(),
            version: 0,
            last_updated: None,
        }
    }
}

/// The dependent entity: a start/stop timer owned by an employee.
///
/// `start` and `finish` are nanoseconds since the Unix epoch; `finish == 0`
/// means the timer is still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: String,
    pub comment: String,
    pub start: i64,
    pub finish: i64,
    /// Derived from `start`/`finish` on every read; never persisted.
    pub elapsed_time: i64,
    pub completed: bool,
    pub version: i64,
    pub employee_id: String,
}

impl Timer {
    pub fn new(
        id: impl Into<String>,
        employee_id: impl Into<String>,
        comment: impl Into<String>,
        start: i64,
    ) -> Self {
        Self {
            id: id.into(),
            comment: comment.into(),
            start,
            finish: 0,
            elapsed_time: 0,
            completed: false,
            version: 0,
            employee_id: employee_id.into(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish != 0
    }

    pub fn elapsed(&self) -> i64 {
        if self.is_finished() {
            self.finish - self.start
        } else {
            0
        }
    }
}

/// Current wall-clock time in Unix nanoseconds.
pub fn unix_nanos_now() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_elapsed() {
        let mut timer = Timer::new("t1", "e1", "comment", 100);
        assert!(!timer.is_finished());
        assert_eq!(timer.elapsed(), 0);

        timer.finish = 350;
        assert_eq!(timer.elapsed(), 250);
    }

    #[test]
    fn test_employee_json_shape() {
        let employee = Employee::new("e1", "Antonio", "", "a@x.com");
        let json = serde_json::to_value(&employee).unwrap();
        assert_eq!(json["id"], "e1");
        assert_eq!(json["first_name"], "Antonio");
        assert!(json.get("last_name").is_none());
        assert!(json.get("last_updated").is_none());
        assert_eq!(json["version"], 0);
    }
}
