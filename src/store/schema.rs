pub const SCHEMA: &str = r#"
-- Tenants; created by bootstrap only
CREATE TABLE IF NOT EXISTS customers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    plan_type TEXT NOT NULL
);

-- Tokens are stored as sha256 digests; possession of the raw token is authentication
CREATE TABLE IF NOT EXISTS customer_tokens (
    token_digest TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL REFERENCES customers(id) ON DELETE CASCADE
);

-- Per-script execution limits (NULL = default limit)
CREATE TABLE IF NOT EXISTS dispatch_limits (
    script_id TEXT PRIMARY KEY,
    cpu_ms INTEGER,
    memory INTEGER
);

-- Per-script outbound worker binding
CREATE TABLE IF NOT EXISTS outbound_workers (
    script_id TEXT PRIMARY KEY,
    outbound_script_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_customer_tokens_customer ON customer_tokens(customer_id);
"#;

pub const DROP_SCHEMA: &str = r#"
DROP TABLE IF EXISTS customer_tokens;
DROP TABLE IF EXISTS customers;
DROP TABLE IF EXISTS dispatch_limits;
DROP TABLE IF EXISTS outbound_workers;
"#;
