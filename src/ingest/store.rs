//! Inspection record persistence
//!
//! [`InspectionStore`] is the seam the orchestrator uploads through.
//! [`SqliteStore`] keeps the record in a local SQLite file with one
//! mother table (registered components) and one inspection table per
//! component kind.

use chrono::Utc;
use miette::Diagnostic;
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::entities::ComponentKind;
use crate::ingest::row::{RowValue, UploadRow};

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("Inspection record unavailable at {}", path.display())]
    #[diagnostic(
        code(rwogp::store::unavailable),
        help("Check the database path in the configuration and its directory permissions")
    )]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Cannot create the inspection record directory {}", path.display())]
    #[diagnostic(code(rwogp::store::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inspection record query failed")]
    #[diagnostic(code(rwogp::store::query))]
    Query(#[from] rusqlite::Error),

    #[error("'{name}' is not registered in {table}")]
    #[diagnostic(
        code(rwogp::store::parent_missing),
        help("Register the component first: rwogp register <type> <name>")
    )]
    ParentMissing { table: String, name: String },

    #[error("Invalid column name '{column}'")]
    #[diagnostic(code(rwogp::store::invalid_column))]
    InvalidColumn { column: String },
}

/// Offsets last recorded for a protomodule
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RecordedOffsets {
    pub x_mu: i64,
    pub y_mu: i64,
    pub angle_deg: f64,
}

/// Where upload rows go
pub trait InspectionStore {
    /// Is `name` registered in the kind's mother table
    fn parent_exists(&mut self, kind: ComponentKind, name: &str) -> Result<bool, StoreError>;

    /// Insert a row tied to its mother-table record
    fn insert_linked(&mut self, kind: ComponentKind, row: &UploadRow) -> Result<(), StoreError>;

    /// Insert a row with no mother-table link
    fn insert_unlinked(&mut self, kind: ComponentKind, row: &UploadRow) -> Result<(), StoreError>;

    /// Most recent offsets stored for a protomodule
    fn latest_offsets(&mut self, proto_name: &str) -> Result<Option<RecordedOffsets>, StoreError>;
}

impl ToSql for RowValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            RowValue::Text(s) => Value::Text(s.clone()),
            RowValue::Int(v) => Value::Integer(*v),
            RowValue::Real(v) => Value::Real(*v),
            RowValue::RealList(values) => Value::Text(
                serde_json::to_string(values)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            ),
            RowValue::Blob(bytes) => Value::Blob(bytes.clone()),
            RowValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
            RowValue::Time(t) => Value::Text(t.format("%H:%M:%S").to_string()),
            RowValue::Null => Value::Null,
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

/// SQLite-backed inspection record
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the record at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(|source| StoreError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let mut store = Self { conn };
        store.init_schema().map_err(|e| match e {
            StoreError::Query(source) => StoreError::Unavailable {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&mut self) -> Result<(), StoreError> {
        let mut sql = String::from("PRAGMA foreign_keys = ON;\n");
        for kind in ComponentKind::ALL {
            sql.push_str(&schema_for(kind));
        }
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    /// Add a component to its mother table; false if it was already there
    pub fn register(
        &mut self,
        kind: ComponentKind,
        name: &str,
        institution: Option<&str>,
    ) -> Result<bool, StoreError> {
        let table = kind.table();
        let sql = format!(
            "INSERT OR IGNORE INTO {mother} ({name_col}, institution, registered_at) VALUES (?1, ?2, ?3)",
            mother = table.mother_table,
            name_col = table.name_column(),
        );
        let inserted = self
            .conn
            .execute(&sql, params![name, institution, Utc::now().to_rfc3339()])?;
        Ok(inserted > 0)
    }

    /// Number of inspection rows stored for a kind
    pub fn inspection_count(&self, kind: ComponentKind) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table().inspect_table);
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    fn insert(&mut self, kind: ComponentKind, row: &UploadRow, linked: bool) -> Result<usize, StoreError> {
        let table = kind.table();
        let name_col = table.name_column();
        let no_col = table.number_column();

        let mut columns = Vec::with_capacity(row.len());
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(row.len() + 1);
        for (column, value) in row.iter() {
            if !is_identifier(column) || column == no_col {
                return Err(StoreError::InvalidColumn {
                    column: column.to_string(),
                });
            }
            columns.push(column);
            values.push(value);
        }

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = if linked {
            let name = row.get(&name_col).ok_or_else(|| StoreError::InvalidColumn {
                column: name_col.clone(),
            })?;
            values.push(name);
            format!(
                "INSERT INTO {inspect} ({no_col}, {cols}) \
                 SELECT m.{no_col}, {placeholders} FROM {mother} m WHERE m.{name_col} = ?{last}",
                inspect = table.inspect_table,
                cols = columns.join(", "),
                placeholders = placeholders.join(", "),
                mother = table.mother_table,
                last = columns.len() + 1,
            )
        } else {
            format!(
                "INSERT INTO {inspect} ({cols}) VALUES ({placeholders})",
                inspect = table.inspect_table,
                cols = columns.join(", "),
                placeholders = placeholders.join(", "),
            )
        };

        Ok(self.conn.execute(&sql, values.as_slice())?)
    }
}

impl InspectionStore for SqliteStore {
    fn parent_exists(&mut self, kind: ComponentKind, name: &str) -> Result<bool, StoreError> {
        let table = kind.table();
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
            table.mother_table,
            table.name_column()
        );
        Ok(self.conn.query_row(&sql, params![name], |row| row.get(0))?)
    }

    fn insert_linked(&mut self, kind: ComponentKind, row: &UploadRow) -> Result<(), StoreError> {
        if self.insert(kind, row, true)? == 0 {
            let table = kind.table();
            let name = row
                .get(&table.name_column())
                .and_then(RowValue::as_text)
                .unwrap_or_default()
                .to_string();
            return Err(StoreError::ParentMissing {
                table: table.mother_table.to_string(),
                name,
            });
        }
        Ok(())
    }

    fn insert_unlinked(&mut self, kind: ComponentKind, row: &UploadRow) -> Result<(), StoreError> {
        self.insert(kind, row, false)?;
        Ok(())
    }

    fn latest_offsets(&mut self, proto_name: &str) -> Result<Option<RecordedOffsets>, StoreError> {
        let offsets = self
            .conn
            .query_row(
                "SELECT x_offset_mu, y_offset_mu, ang_offset_deg FROM proto_inspect \
                 WHERE proto_name = ?1 ORDER BY proto_row_no DESC LIMIT 1",
                params![proto_name],
                |row| {
                    Ok(RecordedOffsets {
                        x_mu: row.get::<_, Option<i64>>(0)?.unwrap_or(0),
                        y_mu: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                        angle_deg: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    })
                },
            )
            .optional()?;
        Ok(offsets)
    }
}

fn is_identifier(column: &str) -> bool {
    !column.is_empty()
        && column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !column.starts_with(|c: char| c.is_ascii_digit())
}

fn schema_for(kind: ComponentKind) -> String {
    let table = kind.table();
    let offsets = if kind.part_kind().is_some() {
        "x_offset_mu INTEGER,\n    y_offset_mu INTEGER,\n    ang_offset_deg REAL,\n    "
    } else {
        ""
    };
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {mother} (
    {p}_no INTEGER PRIMARY KEY AUTOINCREMENT,
    {p}_name TEXT NOT NULL UNIQUE,
    institution TEXT,
    registered_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS {inspect} (
    {p}_row_no INTEGER PRIMARY KEY AUTOINCREMENT,
    {p}_no INTEGER REFERENCES {mother}({p}_no),
    {p}_name TEXT NOT NULL,
    flatness REAL,
    thickness REAL,
    x_points TEXT,
    y_points TEXT,
    z_points TEXT,
    {offsets}hexplot BLOB,
    inspector TEXT,
    comment TEXT,
    date_inspect TEXT,
    time_inspect TEXT,
    weight REAL,
    run_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_{inspect}_name ON {inspect}({p}_name);
"#,
        mother = table.mother_table,
        inspect = table.inspect_table,
        p = table.prefix,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn module_row(name: &str, x: i64) -> UploadRow {
        let mut row = UploadRow::default();
        row.insert("module_name", RowValue::Text(name.to_string()));
        row.insert("flatness", RowValue::Real(0.05));
        row.insert("x_points", RowValue::RealList(vec![1.0, 2.5]));
        row.insert("x_offset_mu", RowValue::Int(x));
        row.insert("run_id", RowValue::Text(Ulid::nil().to_string()));
        row
    }

    fn proto_row(name: &str, x: i64, y: i64, angle: f64) -> UploadRow {
        let mut row = UploadRow::default();
        row.insert("proto_name", RowValue::Text(name.to_string()));
        row.insert("x_offset_mu", RowValue::Int(x));
        row.insert("y_offset_mu", RowValue::Int(y));
        row.insert("ang_offset_deg", RowValue::Real(angle));
        row
    }

    #[test]
    fn test_register_and_parent_exists() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.parent_exists(ComponentKind::Modules, "M1").unwrap());
        assert!(store.register(ComponentKind::Modules, "M1", Some("CMU")).unwrap());
        assert!(!store.register(ComponentKind::Modules, "M1", None).unwrap());
        assert!(store.parent_exists(ComponentKind::Modules, "M1").unwrap());
        assert!(!store.parent_exists(ComponentKind::Baseplates, "M1").unwrap());
    }

    #[test]
    fn test_linked_insert_requires_parent() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .insert_linked(ComponentKind::Modules, &module_row("M1", 10))
            .unwrap_err();
        assert!(matches!(err, StoreError::ParentMissing { ref name, .. } if name == "M1"));
        assert_eq!(store.inspection_count(ComponentKind::Modules).unwrap(), 0);

        store.register(ComponentKind::Modules, "M1", None).unwrap();
        store
            .insert_linked(ComponentKind::Modules, &module_row("M1", 10))
            .unwrap();
        assert_eq!(store.inspection_count(ComponentKind::Modules).unwrap(), 1);

        let (no, points): (Option<i64>, String) = store
            .conn
            .query_row("SELECT module_no, x_points FROM module_inspect", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(no, Some(1));
        assert_eq!(points, "[1.0,2.5]");
    }

    #[test]
    fn test_unlinked_insert() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_unlinked(ComponentKind::Modules, &module_row("M2", 5))
            .unwrap();
        let no: Option<i64> = store
            .conn
            .query_row("SELECT module_no FROM module_inspect", [], |r| r.get(0))
            .unwrap();
        assert_eq!(no, None);
    }

    #[test]
    fn test_latest_offsets() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.latest_offsets("P1").unwrap(), None);

        let kind = ComponentKind::Protomodules;
        store.insert_unlinked(kind, &proto_row("P1", 10, 20, 0.01)).unwrap();
        store.insert_unlinked(kind, &proto_row("P1", -5, 7, 0.02)).unwrap();
        store.insert_unlinked(kind, &proto_row("P2", 99, 99, 1.0)).unwrap();

        assert_eq!(
            store.latest_offsets("P1").unwrap(),
            Some(RecordedOffsets {
                x_mu: -5,
                y_mu: 7,
                angle_deg: 0.02
            })
        );
    }

    #[test]
    fn test_rejects_unknown_identifiers() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut row = module_row("M1", 1);
        row.insert("bad column; DROP", RowValue::Null);
        assert!(matches!(
            store.insert_unlinked(ComponentKind::Modules, &row),
            Err(StoreError::InvalidColumn { .. })
        ));
    }

    #[test]
    fn test_open_creates_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("db/inspections.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.register(ComponentKind::Baseplates, "BP1", None).unwrap();
        }
        let mut reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.parent_exists(ComponentKind::Baseplates, "BP1").unwrap());
    }
}
