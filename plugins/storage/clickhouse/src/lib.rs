use warehouse_api::client::WarehouseFuture;
use warehouse_api::{
    Field, FieldMode, FieldType, TableInfo, TableRef, TableRow, TableSchema, WarehouseClient,
    WarehouseError,
};

// ClickHouse server error codes that map onto warehouse error kinds.
const TABLE_ALREADY_EXISTS: u32 = 57;
const UNKNOWN_TABLE: u32 = 60;
const UNKNOWN_DATABASE: u32 = 81;

// ═══════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ClickHouseConfig {
    /// Full base URL; overrides host/port/tls when set.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Engine clause used for CREATE TABLE.
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Per-request limit; a stalled server fails the call instead of hanging it.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            tls: false,
            accept_invalid_certs: false,
            engine: default_engine(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    8123
}
fn default_user() -> String {
    "default".into()
}
fn default_engine() -> String {
    "MergeTree ORDER BY tuple()".into()
}
fn default_request_timeout_ms() -> u64 {
    300_000
}

// ═══════════════════════════════════════════════════════════════
//  ClickHouseWarehouse
// ═══════════════════════════════════════════════════════════════

/// Warehouse backend over the ClickHouse HTTP interface.
///
/// Dataset maps to database. BYTES columns are `String` and hold the
/// base64 text of the value; rows are inserted as `JSONEachRow`.
pub struct ClickHouseWarehouse {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    engine: String,
}

impl ClickHouseWarehouse {
    pub fn new(config: ClickHouseConfig) -> Result<Self, WarehouseError> {
        let base_url = match config.url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let scheme = if config.tls { "https" } else { "http" };
                format!("{scheme}://{}:{}", config.host, config.port)
            }
        };
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| WarehouseError::config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            user: config.user,
            password: config.password,
            engine: config.engine,
        })
    }

    /// Build from a JSON config string (`"{}"` = defaults).
    pub fn from_config_json(config_json: &str) -> Result<Self, WarehouseError> {
        let config: ClickHouseConfig = serde_json::from_str(config_json)
            .map_err(|e| WarehouseError::config(format!("clickhouse config: {e}")))?;
        Self::new(config)
    }

    /// Run a statement passed as the request body.
    async fn exec(&self, sql: &str) -> Result<String, WarehouseError> {
        let req = self
            .http
            .post(&self.base_url)
            .query(&[("user", self.user.as_str()), ("password", self.password.as_str())])
            .body(sql.to_owned());
        self.send(req).await
    }

    /// Run `sql` from the query string with `body` as the data block (INSERT).
    async fn exec_with_data(&self, sql: &str, body: String) -> Result<String, WarehouseError> {
        let req = self
            .http
            .post(&self.base_url)
            .query(&[
                ("user", self.user.as_str()),
                ("password", self.password.as_str()),
                ("query", sql),
            ])
            .body(body);
        self.send(req).await
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<String, WarehouseError> {
        let resp = req
            .send()
            .await
            .map_err(|e| WarehouseError::io(format!("CH request: {e}")))?;

        let status = resp.status();
        let code = resp
            .headers()
            .get("X-ClickHouse-Exception-Code")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let body = resp.text().await.map_err(|e| WarehouseError::io(format!("CH read: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify(code.or_else(|| code_from_body(&body)), body.trim()))
        }
    }
}

fn classify(code: Option<u32>, message: &str) -> WarehouseError {
    match code {
        Some(UNKNOWN_TABLE | UNKNOWN_DATABASE) => WarehouseError::not_found(message),
        Some(TABLE_ALREADY_EXISTS) => WarehouseError::conflict(message),
        _ => WarehouseError::io(message),
    }
}

/// Error bodies start with `Code: <n>. DB::Exception: ...`.
fn code_from_body(body: &str) -> Option<u32> {
    let rest = body.trim_start().strip_prefix("Code: ")?;
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn qualified(table: &TableRef) -> String {
    // Names are restricted to [A-Za-z0-9_] by TableRef.
    format!("`{}`.`{}`", table.dataset, table.table)
}

fn column_type(field: &Field) -> String {
    let base = match field.field_type {
        FieldType::String | FieldType::Bytes => "String",
        FieldType::Integer => "Int64",
        FieldType::Float => "Float64",
        FieldType::Boolean => "Bool",
        FieldType::Timestamp => "DateTime64(6, 'UTC')",
        FieldType::Numeric => "Decimal(38, 9)",
    };
    match field.mode {
        FieldMode::Nullable => format!("Nullable({base})"),
        FieldMode::Required => base.to_string(),
        FieldMode::Repeated => format!("Array({base})"),
    }
}

fn create_table_sql(table: &TableRef, schema: &TableSchema, engine: &str) -> Result<String, WarehouseError> {
    let mut columns = Vec::with_capacity(schema.fields.len());
    for f in &schema.fields {
        // Schemas built in code skip the `from_json` name check.
        if f.name.is_empty() || !f.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(WarehouseError::schema(format!("bad column name '{}'", f.name)));
        }
        columns.push(format!("`{}` {}", f.name, column_type(f)));
    }
    Ok(format!("CREATE TABLE {} ({}) ENGINE = {}", qualified(table), columns.join(", "), engine))
}

impl WarehouseClient for ClickHouseWarehouse {
    fn name(&self) -> &str {
        "clickhouse"
    }

    fn get_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, Option<TableInfo>> {
        Box::pin(async move {
            let exists = self.exec(&format!("EXISTS TABLE {}", qualified(table))).await?;
            if exists.trim() != "1" {
                return Ok(None);
            }
            let count = self.exec(&format!("SELECT count() FROM {}", qualified(table))).await?;
            let num_rows = count
                .trim()
                .parse::<u64>()
                .map_err(|e| WarehouseError::format(format!("parse row count '{}': {e}", count.trim())))?;
            Ok(Some(TableInfo { table: table.clone(), num_rows }))
        })
    }

    fn create_table<'a>(&'a self, table: &'a TableRef, schema: &'a TableSchema) -> WarehouseFuture<'a, ()> {
        Box::pin(async move {
            let sql = create_table_sql(table, schema, &self.engine)?;
            tracing::debug!(%table, %sql, "creating table");
            self.exec(&sql).await?;
            Ok(())
        })
    }

    fn insert_rows<'a>(&'a self, table: &'a TableRef, rows: &'a [TableRow]) -> WarehouseFuture<'a, ()> {
        Box::pin(async move {
            if rows.is_empty() {
                return Ok(());
            }
            let mut body = String::new();
            for row in rows {
                body.push_str(&serde_json::to_string(row)?);
                body.push('\n');
            }
            let sql = format!("INSERT INTO {} FORMAT JSONEachRow", qualified(table));
            self.exec_with_data(&sql, body).await?;
            Ok(())
        })
    }

    fn truncate_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, ()> {
        Box::pin(async move {
            self.exec(&format!("TRUNCATE TABLE {}", qualified(table))).await?;
            Ok(())
        })
    }

    fn delete_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, ()> {
        Box::pin(async move {
            self.exec(&format!("DROP TABLE {}", qualified(table))).await?;
            Ok(())
        })
    }
}
