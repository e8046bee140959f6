use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};

use super::Store;
use super::schema::{DROP_SCHEMA, SCHEMA};
use crate::error::{Error, Result};
use crate::types::*;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn map_constraint(result: rusqlite::Result<usize>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Err(Error::NotFound)
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(Error::AlreadyExists)
        }
        Err(e) => Err(Error::from(e)),
    }
}

fn tenant_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: row.get(0)?,
        display_name: row.get(1)?,
        plan_tier: row.get(2)?,
    })
}

fn resource_policy_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResourcePolicy> {
    Ok(ResourcePolicy {
        script_name: row.get(0)?,
        limits: ResourceLimits {
            cpu_ms: row.get(1)?,
            memory: row.get(2)?,
        },
    })
}

fn outbound_policy_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboundPolicy> {
    Ok(OutboundPolicy {
        script_name: row.get(0)?,
        outbound_script_name: row.get(1)?,
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(DROP_SCHEMA)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // Customer directory

    fn create_tenant(&self, tenant: &Tenant) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO customers (id, name, plan_type) VALUES (?1, ?2, ?3)",
            params![tenant.id, tenant.display_name, tenant.plan_tier],
        );
        map_constraint(result)
    }

    fn get_tenant(&self, id: &str) -> Result<Option<Tenant>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, plan_type FROM customers WHERE id = ?1",
            params![id],
            tenant_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, plan_type FROM customers ORDER BY id")?;
        let rows = stmt.query_map([], tenant_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn create_tenant_token(&self, token: &TenantToken) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO customer_tokens (token_digest, customer_id) VALUES (?1, ?2)",
            params![token.token_digest, token.tenant_id],
        );
        map_constraint(result)
    }

    fn get_tenant_by_token_digest(&self, digest: &str) -> Result<Option<Tenant>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT customers.id, customers.name, customers.plan_type
             FROM customer_tokens
             JOIN customers ON customers.id = customer_tokens.customer_id
             WHERE customer_tokens.token_digest = ?1",
            params![digest],
            tenant_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn has_tenants(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    // Resource policies

    fn upsert_resource_policy(&self, policy: &ResourcePolicy) -> Result<()> {
        self.conn().execute(
            "INSERT INTO dispatch_limits (script_id, cpu_ms, memory) VALUES (?1, ?2, ?3)
             ON CONFLICT(script_id) DO UPDATE SET cpu_ms = excluded.cpu_ms, memory = excluded.memory",
            params![
                policy.script_name,
                policy.limits.cpu_ms,
                policy.limits.memory
            ],
        )?;
        Ok(())
    }

    fn get_resource_policy(&self, script_name: &str) -> Result<Option<ResourcePolicy>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT script_id, cpu_ms, memory FROM dispatch_limits WHERE script_id = ?1",
            params![script_name],
            resource_policy_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_resource_policies(&self) -> Result<Vec<ResourcePolicy>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT script_id, cpu_ms, memory FROM dispatch_limits ORDER BY script_id")?;
        let rows = stmt.query_map([], resource_policy_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Outbound policies

    fn upsert_outbound_policy(&self, policy: &OutboundPolicy) -> Result<()> {
        self.conn().execute(
            "INSERT INTO outbound_workers (script_id, outbound_script_id) VALUES (?1, ?2)
             ON CONFLICT(script_id) DO UPDATE SET outbound_script_id = excluded.outbound_script_id",
            params![policy.script_name, policy.outbound_script_name],
        )?;
        Ok(())
    }

    fn get_outbound_policy(&self, script_name: &str) -> Result<Option<OutboundPolicy>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT script_id, outbound_script_id FROM outbound_workers WHERE script_id = ?1",
            params![script_name],
            outbound_policy_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_outbound_policies(&self) -> Result<Vec<OutboundPolicy>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT script_id, outbound_script_id FROM outbound_workers ORDER BY script_id",
        )?;
        let rows = stmt.query_map([], outbound_policy_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}
