//! Employee records: the relational source of truth the search index is derived from.

pub mod store;
pub mod types;

pub use types::{AuditAction, AuditEntry, Employee, EmployeeUpdate, InvalidEmployee, NewEmployee};
