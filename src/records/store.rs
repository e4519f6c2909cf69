//! Employee CRUD over SQLite, with an audit row written in the same transaction
//! as every change.
//!
//! [`list_employees`] and [`fetch_employees_by_ids`] are the two reads the search
//! index depends on: the first feeds a rebuild, the second hydrates search hits.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashMap;

use super::types::{AuditAction, AuditEntry, Employee, EmployeeUpdate, NewEmployee};

const EMPLOYEE_TABLE: &str = "employee_info";

const EMPLOYEE_COLUMNS: &str = "id, name, date_of_birth, address, contact_number, \
     pan_number, aadhar_number, created_at";

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        name: row.get(1)?,
        date_of_birth: row.get(2)?,
        address: row.get(3)?,
        contact_number: row.get(4)?,
        pan_number: row.get(5)?,
        aadhar_number: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Insert a new employee. Validation failures surface as [`super::InvalidEmployee`]
/// inside the returned error; unique-key clashes as a rusqlite constraint error.
pub fn create_employee(conn: &mut Connection, new: &NewEmployee) -> Result<Employee> {
    new.validate()?;

    let tx = conn.transaction()?;
    let now = chrono::Utc::now().to_rfc3339();

    tx.execute(
        "INSERT INTO employee_info \
         (name, date_of_birth, address, contact_number, pan_number, aadhar_number, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.name.trim(),
            new.date_of_birth,
            new.address,
            new.contact_number.trim(),
            new.pan_number.trim(),
            new.aadhar_number.trim(),
            now,
        ],
    )?;
    let id = tx.last_insert_rowid();

    write_audit_log(&tx, AuditAction::Create, id, Some(&format!("created {}", new.name.trim())))?;

    let employee = query_employee(&tx, id)?.context("inserted employee vanished")?;
    tx.commit()?;

    tracing::debug!(id, "employee created");
    Ok(employee)
}

/// Fetch one employee by primary key.
pub fn get_employee(conn: &Connection, id: i64) -> Result<Option<Employee>> {
    query_employee(conn, id)
}

/// All employees in primary-key order.
pub fn list_employees(conn: &Connection) -> Result<Vec<Employee>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employee_info ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([], employee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Apply a partial update. Returns `None` if the employee does not exist.
pub fn update_employee(
    conn: &mut Connection,
    id: i64,
    update: &EmployeeUpdate,
) -> Result<Option<Employee>> {
    update.validate()?;

    let tx = conn.transaction()?;
    let Some(mut employee) = query_employee(&tx, id)? else {
        return Ok(None);
    };

    let mut changed = Vec::new();
    let fields = [
        ("name", &update.name, &mut employee.name),
        ("date_of_birth", &update.date_of_birth, &mut employee.date_of_birth),
        ("address", &update.address, &mut employee.address),
        ("contact_number", &update.contact_number, &mut employee.contact_number),
        ("pan_number", &update.pan_number, &mut employee.pan_number),
        ("aadhar_number", &update.aadhar_number, &mut employee.aadhar_number),
    ];
    for (column, new_value, current) in fields {
        if let Some(value) = new_value {
            *current = value.trim().to_string();
            changed.push(column);
        }
    }

    if changed.is_empty() {
        return Ok(Some(employee));
    }

    tx.execute(
        "UPDATE employee_info SET name = ?1, date_of_birth = ?2, address = ?3, \
         contact_number = ?4, pan_number = ?5, aadhar_number = ?6 WHERE id = ?7",
        params![
            employee.name,
            employee.date_of_birth,
            employee.address,
            employee.contact_number,
            employee.pan_number,
            employee.aadhar_number,
            id,
        ],
    )?;

    write_audit_log(
        &tx,
        AuditAction::Update,
        id,
        Some(&format!("updated {}", changed.join(", "))),
    )?;
    tx.commit()?;

    tracing::debug!(id, fields = ?changed, "employee updated");
    Ok(Some(employee))
}

/// Delete an employee. Returns `false` if no such employee existed.
pub fn delete_employee(conn: &mut Connection, id: i64) -> Result<bool> {
    let tx = conn.transaction()?;
    let deleted = tx.execute("DELETE FROM employee_info WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Ok(false);
    }
    write_audit_log(&tx, AuditAction::Delete, id, None)?;
    tx.commit()?;

    tracing::debug!(id, "employee deleted");
    Ok(true)
}

/// Case-insensitive substring match on `name`.
pub fn search_employees_by_name(conn: &Connection, name: &str) -> Result<Vec<Employee>> {
    let pattern = format!("%{}%", escape_like(name.trim()));
    let mut stmt = conn.prepare(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employee_info \
         WHERE name LIKE ?1 ESCAPE '\\' ORDER BY id"
    ))?;
    let rows = stmt
        .query_map(params![pattern], employee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Batch-fetch employees by id. Ids with no row are simply absent from the map.
pub fn fetch_employees_by_ids(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, Employee>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    // Build a parameterized IN clause
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employee_info WHERE id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

    let rows = stmt
        .query_map(params.as_slice(), employee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().map(|e| (e.id, e)).collect())
}

pub fn count_employees(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM employee_info", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Audit trail for one employee, oldest first.
pub fn audit_entries(conn: &Connection, record_id: i64) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT action, table_name, record_id, description, created_at \
         FROM audit_log WHERE table_name = ?1 AND record_id = ?2 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![EMPLOYEE_TABLE, record_id], |row| {
            let action: String = row.get(0)?;
            let action = action.parse::<AuditAction>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?;
            Ok(AuditEntry {
                action,
                table_name: row.get(1)?,
                record_id: row.get(2)?,
                description: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn write_audit_log(
    tx: &Transaction,
    action: AuditAction,
    record_id: i64,
    description: Option<&str>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO audit_log (action, table_name, record_id, description, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            action.as_str(),
            EMPLOYEE_TABLE,
            record_id,
            description,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn query_employee(conn: &Connection, id: i64) -> Result<Option<Employee>> {
    let employee = conn
        .query_row(
            &format!("SELECT {EMPLOYEE_COLUMNS} FROM employee_info WHERE id = ?1"),
            params![id],
            employee_from_row,
        )
        .optional()?;
    Ok(employee)
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
