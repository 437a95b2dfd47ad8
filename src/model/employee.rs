use serde::{Deserialize, Serialize};

/// The slice of an employee row the attendance core reads.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    /// Employees created before organizations existed have none.
    pub organization_id: Option<u64>,
    pub manager_id: Option<u64>,
    pub status: String,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}
