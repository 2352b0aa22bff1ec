//! Employees as seen through the directory, their roles, and the actor
//! context every lifecycle operation receives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::{encode::IsNull, error::BoxDynError, Database, Decode, Encode, FromRow, Type};
use utoipa::ToSchema;

use crate::types::EmployeeId;

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Directory record for an employee.
pub struct Employee {
    /// Unique identifier for the employee.
    #[schema(value_type = String)]
    pub emp_id: EmployeeId,
    pub full_name: String,
    /// Notification address; may be empty for accounts without mail.
    pub email: String,
    /// Current department. Evaluated live for manager scoping.
    pub department: Option<String>,
    #[schema(value_type = String, example = "manager")]
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    /// Builds the actor context for requests authenticated as this employee.
    pub fn actor(&self) -> Actor {
        Actor {
            emp_id: self.emp_id,
            role: self.role,
            department: self.department.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Organisational role. Anything the directory stores outside the known set
/// is kept as `Unknown`, which grants no permissions.
pub enum UserRole {
    #[default]
    Employee,
    Manager,
    Admin,
    Unknown,
}

impl UserRole {
    /// Returns the canonical snake_case representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Employee => "employee",
            UserRole::Manager => "manager",
            UserRole::Admin => "admin",
            UserRole::Unknown => "unknown",
        }
    }

    /// Parses a stored or transmitted role, tolerating legacy casings.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "employee" => UserRole::Employee,
            "manager" => UserRole::Manager,
            "admin" => UserRole::Admin,
            _ => UserRole::Unknown,
        }
    }

    /// Returns `true` for roles that may decide requests at all.
    pub fn is_reviewer(&self) -> bool {
        matches!(self, UserRole::Manager | UserRole::Admin)
    }
}

impl Serialize for UserRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(UserRole::parse(&s))
    }
}

impl<'r, DB: Database> Decode<'r, DB> for UserRole
where
    String: Decode<'r, DB>,
{
    fn decode(value: <DB as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = String::decode(value)?;
        Ok(UserRole::parse(&s))
    }
}

impl<'q, DB: Database> Encode<'q, DB> for UserRole
where
    String: Encode<'q, DB>,
{
    fn encode_by_ref(
        &self,
        buf: &mut <DB as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        self.as_str().to_string().encode_by_ref(buf)
    }
}

impl<DB: Database> Type<DB> for UserRole
where
    String: Type<DB>,
{
    fn type_info() -> <DB as Database>::TypeInfo {
        String::type_info()
    }

    fn compatible(ty: &<DB as Database>::TypeInfo) -> bool {
        String::compatible(ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The authenticated caller of a lifecycle operation.
pub struct Actor {
    pub emp_id: EmployeeId,
    pub role: UserRole,
    pub department: Option<String>,
}

impl Actor {
    pub fn new(emp_id: EmployeeId, role: UserRole, department: Option<String>) -> Self {
        Self {
            emp_id,
            role,
            department,
        }
    }
}
