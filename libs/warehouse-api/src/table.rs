use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;

// ═══════════════════════════════════════════════════════════════
//  TableRef
// ═══════════════════════════════════════════════════════════════

/// Fully qualified table location: `[project:]dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: Option<String>,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(dataset: &str, table: &str) -> Result<Self, WarehouseError> {
        validate_ident("dataset", dataset)?;
        validate_ident("table", table)?;
        Ok(Self {
            project: None,
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }

    pub fn with_project(mut self, project: &str) -> Result<Self, WarehouseError> {
        validate_project(project)?;
        self.project = Some(project.to_string());
        Ok(self)
    }

    /// Parse `dataset.table` or `project:dataset.table`.
    pub fn parse(reference: &str) -> Result<Self, WarehouseError> {
        let (project, rest) = match reference.split_once(':') {
            Some((p, rest)) => (Some(p), rest),
            None => (None, reference),
        };
        let Some((dataset, table)) = rest.split_once('.') else {
            return Err(WarehouseError::config(format!(
                "bad table reference '{reference}', expected [project:]dataset.table"
            )));
        };

        // a second '.' lands in `table` and fails the identifier check
        let table_ref = Self::new(dataset, table)?;
        match project {
            Some(p) => table_ref.with_project(p),
            None => Ok(table_ref),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.project {
            Some(ref p) => write!(f, "{p}:{}.{}", self.dataset, self.table),
            None => write!(f, "{}.{}", self.dataset, self.table),
        }
    }
}

impl FromStr for TableRef {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Dataset and table names end up inside DDL, keep them to `[A-Za-z0-9_]`.
fn validate_ident(what: &str, name: &str) -> Result<(), WarehouseError> {
    if name.is_empty() {
        return Err(WarehouseError::config(format!("{what} name is empty")));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(WarehouseError::config(format!(
            "{what} name '{name}' may only contain letters, digits and '_'"
        )));
    }
    Ok(())
}

fn validate_project(name: &str) -> Result<(), WarehouseError> {
    if name.is_empty() {
        return Err(WarehouseError::config("project name is empty"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(WarehouseError::config(format!("bad project name '{name}'")));
    }
    Ok(())
}

/// Result of a table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub table: TableRef,
    pub num_rows: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Dispositions
// ═══════════════════════════════════════════════════════════════

/// Whether the sink may create the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateDisposition {
    /// Create the table with the declared schema when it is missing.
    #[default]
    #[serde(alias = "CREATE_IF_NEEDED")]
    CreateIfNeeded,
    /// Fail when the table is missing.
    #[serde(alias = "CREATE_NEVER")]
    CreateNever,
}

/// What the sink does when the destination table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Fail if the table already holds rows.
    #[default]
    #[serde(alias = "WRITE_EMPTY")]
    WriteEmpty,
    /// Append to existing rows.
    #[serde(alias = "WRITE_APPEND")]
    WriteAppend,
    /// Remove existing rows before writing.
    #[serde(alias = "WRITE_TRUNCATE")]
    WriteTruncate,
}

impl fmt::Display for CreateDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateDisposition::CreateIfNeeded => f.write_str("create_if_needed"),
            CreateDisposition::CreateNever => f.write_str("create_never"),
        }
    }
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteDisposition::WriteEmpty => f.write_str("write_empty"),
            WriteDisposition::WriteAppend => f.write_str("write_append"),
            WriteDisposition::WriteTruncate => f.write_str("write_truncate"),
        }
    }
}

impl FromStr for CreateDisposition {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create_if_needed" => Ok(CreateDisposition::CreateIfNeeded),
            "create_never" => Ok(CreateDisposition::CreateNever),
            other => Err(WarehouseError::config(format!("unknown create disposition '{other}'"))),
        }
    }
}

impl FromStr for WriteDisposition {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "write_empty" => Ok(WriteDisposition::WriteEmpty),
            "write_append" => Ok(WriteDisposition::WriteAppend),
            "write_truncate" => Ok(WriteDisposition::WriteTruncate),
            other => Err(WarehouseError::config(format!("unknown write disposition '{other}'"))),
        }
    }
}
