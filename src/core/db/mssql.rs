/// SQL Server Connector Module
///
/// Connector backed by tiberius over a tokio TCP stream. Named instances are
/// resolved through the SQL Server Browser service; otherwise the connector
/// dials host and port directly.

use crate::config::MssqlConfig;
use crate::core::db::connection::{blocking_runtime, connectivity, not_connected, Connector};
use crate::core::db::cursor::{ColumnMeta, Cursor};
use crate::core::db::reader::TypedRowReader;
use crate::core::{DataReaderError, Result, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::time::Duration;
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, Client, ColumnData, ColumnType, FromSql, Row, SqlBrowser, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, error, info};

type MssqlClient = Client<Compat<TcpStream>>;

impl ToSql for Value {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            Value::Null => ColumnData::String(None),
            Value::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
            Value::Float(f) => ColumnData::F64(Some(*f)),
            Value::Bool(b) => ColumnData::Bit(Some(*b)),
            Value::Int32(i) => ColumnData::I32(Some(*i)),
            Value::Int64(i) => ColumnData::I64(Some(*i)),
            Value::Timestamp(ts) => ts.to_sql(),
        }
    }
}

/// Type name as SQL Server reports it in `sys.types`.
pub fn type_name(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Bit | ColumnType::Bitn => "BIT",
        ColumnType::Int1 => "TINYINT",
        ColumnType::Int2 => "SMALLINT",
        ColumnType::Int4 => "INT",
        // Nullable integers of every width arrive as Intn
        ColumnType::Int8 | ColumnType::Intn => "BIGINT",
        ColumnType::Float4 => "REAL",
        ColumnType::Float8 | ColumnType::Floatn => "FLOAT",
        ColumnType::Money => "MONEY",
        ColumnType::Money4 => "SMALLMONEY",
        ColumnType::Decimaln => "DECIMAL",
        ColumnType::Numericn => "NUMERIC",
        ColumnType::Datetime4 => "SMALLDATETIME",
        ColumnType::Datetime | ColumnType::Datetimen => "DATETIME",
        ColumnType::Datetime2 => "DATETIME2",
        ColumnType::Daten => "DATE",
        ColumnType::Timen => "TIME",
        ColumnType::DatetimeOffsetn => "DATETIMEOFFSET",
        ColumnType::Guid => "UNIQUEIDENTIFIER",
        ColumnType::BigVarChar => "VARCHAR",
        ColumnType::BigChar => "CHAR",
        ColumnType::NVarchar => "NVARCHAR",
        ColumnType::NChar => "NCHAR",
        ColumnType::Text => "TEXT",
        ColumnType::NText => "NTEXT",
        ColumnType::BigVarBin => "VARBINARY",
        ColumnType::BigBinary => "BINARY",
        ColumnType::Image => "IMAGE",
        ColumnType::Xml => "XML",
        _ => "",
    }
}

fn numeric_to_f64(n: &Numeric) -> f64 {
    n.value() as f64 / 10f64.powi(i32::from(n.scale()))
}

fn undecodable(column: &str, e: impl std::fmt::Display) -> DataReaderError {
    DataReaderError::SchemaContract(format!("column '{}': {}", column, e))
}

/// Decodes one cell by its TDS data type.
fn decode(data: &ColumnData<'static>, column: &str) -> Result<Option<Value>> {
    let chrono_err = |e: tiberius::error::Error| undecodable(column, e);
    let value = match data {
        ColumnData::U8(v) => v.map(|i| Value::Int32(i32::from(i))),
        ColumnData::I16(v) => v.map(|i| Value::Int32(i32::from(i))),
        ColumnData::I32(v) => v.map(Value::Int32),
        ColumnData::I64(v) => v.map(Value::Int64),
        ColumnData::F32(v) => v.map(|f| Value::Float(f64::from(f))),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| Value::Text(s.to_string())),
        ColumnData::Guid(v) => v.as_ref().map(|g| Value::Text(g.to_string())),
        ColumnData::Numeric(v) => v.as_ref().map(|n| Value::Float(numeric_to_f64(n))),
        ColumnData::Xml(v) => v.as_ref().map(|x| Value::Text(x.to_string())),
        ColumnData::Binary(v) => match v {
            Some(bytes) => Some(Value::Text(String::from_utf8(bytes.to_vec()).map_err(
                |_| undecodable(column, "binary value is not valid UTF-8"),
            )?)),
            None => None,
        },
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .map_err(chrono_err)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .map_err(chrono_err)?
            .map(|t| Value::Text(t.to_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)
                .map_err(chrono_err)?
                .map(Value::Timestamp)
        }
        ColumnData::DateTimeOffset(_) => DateTime::<Utc>::from_sql(data)
            .map_err(chrono_err)?
            .map(|ts| Value::Timestamp(ts.naive_utc())),
    };
    Ok(value)
}

/// Cursor over the rows returned by one SQL Server query.
pub struct MssqlCursor {
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Row>,
}

impl Cursor for MssqlCursor {
    fn columns(&self) -> Result<Vec<ColumnMeta>> {
        Ok(self.columns.clone())
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let row = match self.rows.pop_front() {
            Some(row) => row,
            None => return Ok(None),
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for (i, data) in row.into_iter().enumerate() {
            let column = self.columns.get(i).map(|c| c.name.as_str()).unwrap_or("?");
            values.push(decode(&data, column)?.unwrap_or(Value::Null));
        }
        Ok(Some(values))
    }

    fn close(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }
}

/// Connector for a SQL Server instance.
pub struct MssqlConnector {
    settings: MssqlConfig,
    runtime: Option<Runtime>,
    client: Option<MssqlClient>,
}

impl MssqlConnector {
    pub fn new(
        host: &str,
        port: Option<u16>,
        user: &str,
        password: &str,
        database: &str,
        instance: Option<&str>,
    ) -> Self {
        MssqlConnector::from_config(MssqlConfig {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: Some(password.to_string()),
            database: database.to_string(),
            instance: instance.map(str::to_string),
            ..MssqlConfig::default()
        })
    }

    pub fn from_config(settings: MssqlConfig) -> Self {
        MssqlConnector {
            settings,
            runtime: None,
            client: None,
        }
    }

    fn named_instance(&self) -> Option<&str> {
        self.settings.instance.as_deref().filter(|i| !i.is_empty())
    }

    /// Driver configuration from the ADO.NET string when one is set,
    /// otherwise from the individual settings.
    pub fn driver_config(&self) -> Result<tiberius::Config> {
        let s = &self.settings;
        if let Some(ado) = &s.ado_string {
            return tiberius::Config::from_ado_string(ado).map_err(|e| {
                DataReaderError::Config(format!("invalid SQL Server connection string: {}", e))
            });
        }

        let mut config = tiberius::Config::new();
        config.host(&s.host);
        match (self.named_instance(), s.port) {
            (Some(instance), _) => {
                config.instance_name(instance);
            }
            (None, Some(port)) => {
                config.port(port);
            }
            (None, None) => {}
        }
        config.database(&s.database);
        config.application_name("datareader");
        config.authentication(AuthMethod::sql_server(
            &s.user,
            s.password.as_deref().unwrap_or(""),
        ));
        if s.trust_cert {
            config.trust_cert();
        }
        Ok(config)
    }
}

/// Pings the server and returns its version banner.
async fn server_version(client: &mut MssqlClient) -> Result<String> {
    let row = client
        .simple_query("SELECT @@version")
        .await
        .map_err(connectivity)?
        .into_row()
        .await
        .map_err(connectivity)?;

    match row {
        Some(row) => Ok(row
            .try_get::<&str, _>(0)
            .map_err(connectivity)?
            .unwrap_or_default()
            .to_string()),
        None => Ok(String::new()),
    }
}

impl Connector for MssqlConnector {
    fn open(&mut self) -> Result<()> {
        let config = self.driver_config()?;
        let runtime = blocking_runtime()?;
        let named = self.named_instance().is_some();
        let secs = self.settings.connect_timeout_secs;

        let (client, version) = runtime
            .block_on(async move {
                let dial = async {
                    if named {
                        TcpStream::connect_named(&config).await.map_err(connectivity)
                    } else {
                        TcpStream::connect(config.get_addr()).await.map_err(connectivity)
                    }
                };
                let tcp = tokio::time::timeout(Duration::from_secs(secs), dial)
                    .await
                    .map_err(|_| {
                        DataReaderError::Connectivity(format!("timed out after {}s", secs))
                    })??;
                tcp.set_nodelay(true).map_err(connectivity)?;

                let mut client = Client::connect(config, tcp.compat_write())
                    .await
                    .map_err(connectivity)?;
                let version = server_version(&mut client).await?;
                Ok::<_, DataReaderError>((client, version))
            })
            .map_err(|e| {
                error!("mssql: cannot connect: {}", e);
                e
            })?;

        info!("mssql: connected to {}", self.settings.host);
        debug!("mssql: {}", version.lines().next().unwrap_or_default());
        self.client = Some(client);
        self.runtime = Some(runtime);
        Ok(())
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            info!("mssql: closed {}", self.settings.host);
        }
        self.runtime = None;
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    fn query(&mut self, sql: &str, args: &[Value]) -> Result<TypedRowReader> {
        let (runtime, client) = match (self.runtime.as_ref(), self.client.as_mut()) {
            (Some(runtime), Some(client)) => (runtime, client),
            _ => return Err(not_connected("mssql")),
        };
        debug!("mssql: query {} ({} args)", sql, args.len());

        let params: Vec<&dyn ToSql> = args.iter().map(|a| a as &dyn ToSql).collect();
        let (columns, rows) = runtime
            .block_on(async {
                let mut stream = client.query(sql, &params).await?;
                let columns: Vec<ColumnMeta> = stream
                    .columns()
                    .await?
                    .map(|cols| {
                        cols.iter()
                            .map(|c| ColumnMeta::new(c.name(), type_name(c.column_type())))
                            .collect()
                    })
                    .unwrap_or_default();
                let rows = stream.into_first_result().await?;
                Ok::<_, tiberius::error::Error>((columns, rows))
            })
            .map_err(|e| {
                error!("mssql: {}", e);
                DataReaderError::QueryExecution(e.to_string())
            })?;

        debug!("mssql: {} rows", rows.len());
        TypedRowReader::new(Box::new(MssqlCursor {
            columns,
            rows: rows.into(),
        }))
    }

    fn non_query(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        let (runtime, client) = match (self.runtime.as_ref(), self.client.as_mut()) {
            (Some(runtime), Some(client)) => (runtime, client),
            _ => return Err(not_connected("mssql")),
        };
        debug!("mssql: execute {} ({} args)", sql, args.len());

        let params: Vec<&dyn ToSql> = args.iter().map(|a| a as &dyn ToSql).collect();
        runtime
            .block_on(client.execute(sql, &params))
            .map(|result| result.total())
            .map_err(|e| {
                error!("mssql: {}", e);
                DataReaderError::QueryExecution(e.to_string())
            })
    }
}

impl Drop for MssqlConnector {
    fn drop(&mut self) {
        self.close();
    }
}
