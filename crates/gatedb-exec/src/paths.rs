//! Ref-name layout for tables, rows, indexes and catalog entries (§4.K,
//! §4.L, §6.F).

/// `db/tables/<T>/schema`.
pub fn schema(table: &str) -> String {
    format!("db/tables/{table}/schema")
}

/// `db/tables/<T>/next_id`.
pub fn counter(table: &str) -> String {
    format!("db/tables/{table}/next_id")
}

/// Prefix matching every ref under `db/tables/<T>/` (schema, counter,
/// rows, indexes) — used by `drop_table_execute`/`truncate_execute`.
pub fn table_prefix(table: &str) -> String {
    format!("db/tables/{table}/")
}

/// `db/tables/<T>/rows/<id>`.
pub fn row(table: &str, id: i64) -> String {
    format!("db/tables/{table}/rows/{id}")
}

/// Prefix matching every row ref of a table.
pub fn rows_prefix(table: &str) -> String {
    format!("db/tables/{table}/rows/")
}

/// `db/tables/<T>/indexes/<name>`.
pub fn index(table: &str, name: &str) -> String {
    format!("db/tables/{table}/indexes/{name}")
}

/// Prefix matching every index of a table.
pub fn indexes_prefix(table: &str) -> String {
    format!("db/tables/{table}/indexes/")
}

/// `db/tables/<T>/constraints/<name>`.
pub fn constraint(table: &str, name: &str) -> String {
    format!("db/tables/{table}/constraints/{name}")
}

/// Prefix matching every constraint of a table.
pub fn constraints_prefix(table: &str) -> String {
    format!("db/tables/{table}/constraints/")
}

/// `db/views/<name>`.
pub fn view(name: &str) -> String {
    format!("db/views/{name}")
}

/// `db/triggers/<name>`.
pub fn trigger(name: &str) -> String {
    format!("db/triggers/{name}")
}
