//! Raw aircraft data sources.
//!
//! A [`RecordSource`] produces the raw tabular dataset that the normalizer
//! consumes. The production source posts a query to the BAZL export and
//! parses the CSV it returns; file and static sources exist for offline runs
//! and tests.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};

/// One CSV row, keyed by trimmed column name.
pub type RawRecord = BTreeMap<String, String>;

/// A parsed CSV payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDataset {
    /// Column names in header order.
    pub columns: Vec<String>,
    /// Rows in feed order.
    pub records: Vec<RawRecord>,
}

impl RawDataset {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check whether the header contains `column`.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Something that can produce the raw aircraft dataset.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Human-readable description of the source, for logging.
    fn describe(&self) -> String;

    /// Retrieve the full dataset.
    ///
    /// # Errors
    ///
    /// Returns a fetch error if the source is unreachable or the payload
    /// cannot be decoded and parsed.
    async fn fetch(&self) -> Result<RawDataset>;
}

/// Query body understood by the BAZL export.
#[derive(Debug, Clone, Serialize)]
struct QueryPayload {
    sort_list: String,
    language: String,
    #[serde(rename = "queryProperties")]
    query_properties: QueryProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryProperties {
    aircraft_status: Vec<String>,
}

/// Fetches the register over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    endpoint: String,
    payload: QueryPayload,
    delimiter: u8,
}

impl HttpSource {
    /// Build a source from the `[source]` configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoint = config.source.endpoint.clone();
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|source| Error::Fetch {
                endpoint: endpoint.clone(),
                source,
            })?;

        Ok(Self {
            client,
            endpoint,
            payload: QueryPayload {
                sort_list: "registration".to_string(),
                language: config.source.language.clone(),
                query_properties: QueryProperties {
                    aircraft_status: config.source.allowed_statuses.clone(),
                },
            },
            delimiter: config.delimiter(),
        })
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    async fn fetch(&self) -> Result<RawDataset> {
        info!(endpoint = %self.endpoint, "Fetching aircraft data");

        let transport = |source: reqwest::Error| Error::Fetch {
            endpoint: self.endpoint.clone(),
            source,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.payload)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchStatus {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        debug!(bytes = body.len(), "Received CSV payload");

        parse_csv(&decode_body(&body)?, self.delimiter)
    }
}

/// Reads a previously downloaded export from disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    delimiter: u8,
}

impl FileSource {
    /// Create a source reading `path` with the given delimiter.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }
}

#[async_trait]
impl RecordSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<RawDataset> {
        info!(path = %self.path.display(), "Reading aircraft data");
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|source| Error::SourceRead {
                path: self.path.clone(),
                source,
            })?;
        parse_csv(&decode_body(&body)?, self.delimiter)
    }
}

/// Serves a fixed dataset.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    dataset: RawDataset,
}

impl StaticSource {
    /// Wrap an already parsed dataset.
    #[must_use]
    pub fn new(dataset: RawDataset) -> Self {
        Self { dataset }
    }

    /// Parse CSV text into a static source.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV cannot be parsed.
    pub fn from_csv(text: &str, delimiter: u8) -> Result<Self> {
        Ok(Self::new(parse_csv(text, delimiter)?))
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn describe(&self) -> String {
        format!("static dataset ({} rows)", self.dataset.len())
    }

    async fn fetch(&self) -> Result<RawDataset> {
        Ok(self.dataset.clone())
    }
}

/// Decode a feed body, honouring a UTF-8, UTF-16 or UTF-32 byte-order mark.
///
/// Bodies without a BOM are treated as UTF-8.
///
/// # Errors
///
/// Returns a feed error if the bytes are not valid in the detected encoding.
pub fn decode_body(bytes: &[u8]) -> Result<String> {
    let invalid = |encoding: &str| Error::feed(format!("body is not valid {encoding}"));

    match bytes {
        [0xFF, 0xFE, 0x00, 0x00, rest @ ..] => decode_utf32(rest, u32::from_le_bytes),
        [0x00, 0x00, 0xFE, 0xFF, rest @ ..] => decode_utf32(rest, u32::from_be_bytes),
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => {
            String::from_utf8(rest.to_vec()).map_err(|_| invalid("UTF-8"))
        }
        _ => String::from_utf8(bytes.to_vec()).map_err(|_| invalid("UTF-8")),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::feed("UTF-16 body has an odd number of bytes"));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| Error::feed("body is not valid UTF-16"))
}

fn decode_utf32(bytes: &[u8], unit: fn([u8; 4]) -> u32) -> Result<String> {
    if bytes.len() % 4 != 0 {
        return Err(Error::feed("UTF-32 body is not a multiple of four bytes"));
    }
    bytes
        .chunks_exact(4)
        .map(|quad| {
            char::from_u32(unit([quad[0], quad[1], quad[2], quad[3]]))
                .ok_or_else(|| Error::feed("body is not valid UTF-32"))
        })
        .collect()
}

/// Parse delimited text into a dataset.
///
/// Header names and cells are trimmed; rows shorter than the header simply
/// lack the missing columns.
///
/// # Errors
///
/// Returns an error if the CSV is malformed.
pub fn parse_csv(text: &str, delimiter: u8) -> Result<RawDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: RawRecord = columns
            .iter()
            .zip(row.iter())
            .map(|(column, value)| (column.clone(), value.to_string()))
            .collect();
        records.push(record);
    }

    debug!(rows = records.len(), columns = columns.len(), "Parsed CSV");
    Ok(RawDataset { columns, records })
}
