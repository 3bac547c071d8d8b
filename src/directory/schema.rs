//! SQLite schema for the principal directories
//!
//! Each principal kind has its own table with an identical column layout;
//! `contact` is unique per table. Customer and staff contacts are also
//! claimed in `shared_contacts`, whose primary key makes the two directories
//! one namespace.

use crate::models::Role;

/// SQL statement to create the principal tables
pub const CREATE_SCHEMA: &str = r#"
-- Customers table
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    contact TEXT NOT NULL UNIQUE,
    credential_digest TEXT NOT NULL,
    phone TEXT,
    address TEXT,
    position TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Staff table
CREATE TABLE IF NOT EXISTS staff (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    contact TEXT NOT NULL UNIQUE,
    credential_digest TEXT NOT NULL,
    phone TEXT,
    address TEXT,
    position TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Administrators table
CREATE TABLE IF NOT EXISTS administrators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    contact TEXT NOT NULL UNIQUE,
    credential_digest TEXT NOT NULL,
    phone TEXT,
    address TEXT,
    position TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Contacts owned by the customer or staff directory
CREATE TABLE IF NOT EXISTS shared_contacts (
    contact TEXT PRIMARY KEY,
    role TEXT NOT NULL
);

INSERT OR IGNORE INTO shared_contacts (contact, role)
    SELECT contact, 'customer' FROM customers;
INSERT OR IGNORE INTO shared_contacts (contact, role)
    SELECT contact, 'staff' FROM staff;
"#;

/// Table backing a role's directory
pub fn table_for(role: Role) -> &'static str {
    match role {
        Role::Customer => "customers",
        Role::Staff => "staff",
        Role::Admin => "administrators",
    }
}

/// Whether the role's contacts are claimed in `shared_contacts`
pub fn shares_contacts(role: Role) -> bool {
    matches!(role, Role::Customer | Role::Staff)
}

/// Columns returned to read paths (no credential digest)
pub const PUBLIC_COLUMNS: &str =
    "id, name, contact, phone, address, position, active, created_at";
