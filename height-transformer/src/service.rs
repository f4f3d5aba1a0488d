use std::{
    fmt,
    fs::{self, File},
    path::{Path, PathBuf},
    str::FromStr,
};

use reqwest::blocking::{multipart::Form, Client, ClientBuilder, Response};
use serde::Deserialize;

use pcd_core::table::{self, ResponseTable};

use crate::error::HeightError;

static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const GPSH_BASE_URL: &str = "https://webapp.geod.nrcan.gc.ca/CSRS/tools/GPSH";

/// The service rejects uploads above roughly this many rows.
pub const DEFAULT_MAX_BATCH_ROWS: usize = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ConversionType {
    #[serde(rename = "batch")]
    Batch,
    #[serde(rename = "CGG2013a")]
    Cgg2013a,
    #[serde(rename = "HT2_0_CGG2013a")]
    Ht2Cgg2013a,
}

impl ConversionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Cgg2013a => "CGG2013a",
            Self::Ht2Cgg2013a => "HT2_0_CGG2013a",
        }
    }

    /// Endpoint URL under `base`, which must not end with a slash.
    pub fn url_at(&self, base: &str) -> String {
        let endpoint = match self {
            Self::Batch => "upload",
            Self::Cgg2013a => "CGG2013a",
            Self::Ht2Cgg2013a => "HT2_0_CGG2013a",
        };
        format!("{}/{}", base, endpoint)
    }
}

impl FromStr for ConversionType {
    type Err = HeightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(Self::Batch),
            "CGG2013a" => Ok(Self::Cgg2013a),
            "HT2_0_CGG2013a" => Ok(Self::Ht2Cgg2013a),
            _ => Err(HeightError::UnknownConversionType(s.to_string())),
        }
    }
}

impl fmt::Display for ConversionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    #[default]
    Geo,
    Plan,
}

impl Projection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geo => "geo",
            Self::Plan => "plan",
        }
    }
}

impl FromStr for Projection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geo" => Ok(Self::Geo),
            "plan" => Ok(Self::Plan),
            _ => Err(format!("unknown projection '{s}' (expected geo or plan)")),
        }
    }
}

/// Every option the conversion service understands, with its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub model: String,
    pub frame: String,
    pub epoch: String,
    pub lang: String,
    pub conversion: String,
    pub projection: Projection,
    pub westpos: bool,
    /// Sent with single-point requests in planar projection only.
    pub zone: Option<String>,
    /// Endpoint used by single-point requests.
    pub conversion_type: ConversionType,
    pub max_batch_rows: usize,
    /// Where to keep a copy of the raw bulk response.
    pub keep_response: Option<PathBuf>,
    /// Root of the service endpoints.
    pub base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model: "HT2_0_CGG2013a".to_string(),
            frame: "NAD83(CSRS)".to_string(),
            epoch: "1997-01-01".to_string(),
            lang: "en".to_string(),
            conversion: "on".to_string(),
            projection: Projection::Geo,
            westpos: true,
            zone: None,
            conversion_type: ConversionType::Ht2Cgg2013a,
            max_batch_rows: DEFAULT_MAX_BATCH_ROWS,
            keep_response: None,
            base_url: GPSH_BASE_URL.to_string(),
        }
    }
}

/// Per-call replacements for [`ServiceConfig`] options. `None` keeps the configured value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinglePointOverrides {
    pub conversion_type: Option<ConversionType>,
    pub projection: Option<Projection>,
    pub lang: Option<String>,
    pub conversion: Option<String>,
    pub westpos: Option<bool>,
    pub model: Option<String>,
    pub frame: Option<String>,
    pub epoch: Option<String>,
    pub zone: Option<String>,
}

impl ServiceConfig {
    pub fn merged(&self, overrides: &SinglePointOverrides) -> ServiceConfig {
        let o = overrides.clone();
        ServiceConfig {
            conversion_type: o.conversion_type.unwrap_or(self.conversion_type),
            projection: o.projection.unwrap_or(self.projection),
            lang: o.lang.unwrap_or_else(|| self.lang.clone()),
            conversion: o.conversion.unwrap_or_else(|| self.conversion.clone()),
            westpos: o.westpos.unwrap_or(self.westpos),
            model: o.model.unwrap_or_else(|| self.model.clone()),
            frame: o.frame.unwrap_or_else(|| self.frame.clone()),
            epoch: o.epoch.unwrap_or_else(|| self.epoch.clone()),
            zone: o.zone.or_else(|| self.zone.clone()),
            ..self.clone()
        }
    }

    /// Form fields of a bulk upload, besides the file itself.
    pub fn batch_fields(&self) -> [(&'static str, String); 3] {
        [
            ("model", self.model.clone()),
            ("frame", self.frame.clone()),
            ("epoch", self.epoch.clone()),
        ]
    }

    /// Query parameters of a single-point request.
    pub fn single_point_query(&self, x: f64, y: f64, z: f64) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("lang", self.lang.clone()),
            ("proj", self.projection.as_str().to_string()),
            ("conversion", self.conversion.clone()),
            ("westpos", self.westpos.to_string()),
            ("model", self.model.clone()),
            ("frame", self.frame.clone()),
            ("epoch", self.epoch.clone()),
            ("x", x.to_string()),
            ("y", y.to_string()),
            ("z", z.to_string()),
        ];
        if self.projection == Projection::Plan {
            if let Some(zone) = &self.zone {
                query.push(("zone", zone.clone()));
            }
        }
        query
    }
}

pub trait GeodeticService {
    /// Uploads a CSV extract and returns the parsed response table.
    fn batch_call(&self, extract: &Path) -> Result<ResponseTable, HeightError>;

    /// Converts one coordinate and returns the raw XML response.
    fn single_point(
        &self,
        x: f64,
        y: f64,
        z: f64,
        overrides: &SinglePointOverrides,
    ) -> Result<String, HeightError>;
}

/// Client of the NRCan GPS-H web service.
pub struct GpshClient {
    client: Client,
    config: ServiceConfig,
}

impl GpshClient {
    pub fn new(config: ServiceConfig) -> Result<Self, HeightError> {
        let client = ClientBuilder::new().user_agent(USER_AGENT).build()?;
        Ok(Self { client, config })
    }
}

impl GeodeticService for GpshClient {
    fn batch_call(&self, extract: &Path) -> Result<ResponseTable, HeightError> {
        let rows = count_data_rows(extract)?;
        if rows > self.config.max_batch_rows {
            return Err(HeightError::InputTooLarge {
                rows,
                limit: self.config.max_batch_rows,
            });
        }

        let mut form = Form::new();
        for (name, value) in self.config.batch_fields() {
            form = form.text(name, value);
        }
        let form = form.file("file", extract)?;

        let url = ConversionType::Batch.url_at(&self.config.base_url);
        log::info!("uploading {} rows to {}", rows, url);
        let start = std::time::Instant::now();

        let response = self.client.post(&url).multipart(form).send()?;
        let body = read_success_body(response)?;
        log::info!("received {} bytes in {:?}", body.len(), start.elapsed());

        if let Some(path) = &self.config.keep_response {
            fs::write(path, &body)?;
            log::info!("response saved to {}", path.display());
        }

        Ok(ResponseTable::parse(&body, ',')?)
    }

    fn single_point(
        &self,
        x: f64,
        y: f64,
        z: f64,
        overrides: &SinglePointOverrides,
    ) -> Result<String, HeightError> {
        let config = self.config.merged(overrides);
        let url = config.conversion_type.url_at(&config.base_url);
        let query = config.single_point_query(x, y, z);
        log::debug!("GET {} {:?}", url, query);

        let response = self.client.get(&url).query(&query).send()?;
        read_success_body(response)
    }
}

fn read_success_body(response: Response) -> Result<String, HeightError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(HeightError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn count_data_rows(path: &Path) -> Result<usize, HeightError> {
    Ok(table::count_data_rows(File::open(path)?, ',')?)
}
