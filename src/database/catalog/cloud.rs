//! Cloud connections

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::database::core::{Row, StoreHandle, StoreResult, Tables};
use crate::database::sql::Sql;

/// Kinds of cloud a vault can live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudType {
    Dropbox,
    GoogleDrive,
    Onedrive,
    Pcloud,
    Webdav,
    S3,
    /// Only found in stores that have not been migrated past version 11
    Local,
}

impl CloudType {
    pub const ALL: [CloudType; 7] = [
        CloudType::Dropbox,
        CloudType::GoogleDrive,
        CloudType::Onedrive,
        CloudType::Pcloud,
        CloudType::Webdav,
        CloudType::S3,
        CloudType::Local,
    ];

    /// Name as stored in the `TYPE` column
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudType::Dropbox => "DROPBOX",
            CloudType::GoogleDrive => "GOOGLE_DRIVE",
            CloudType::Onedrive => "ONEDRIVE",
            CloudType::Pcloud => "PCLOUD",
            CloudType::Webdav => "WEBDAV",
            CloudType::S3 => "S3",
            CloudType::Local => "LOCAL",
        }
    }
}

impl fmt::Display for CloudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CloudType::ALL
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown cloud type '{}'", s))
    }
}

/// One row of the cloud table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudRecord {
    pub id: i64,
    /// Raw type name; see [`CloudRecord::cloud_type`]
    pub cloud_type: String,
    pub url: Option<String>,
    pub username: Option<String>,
    pub webdav_certificate: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Whether credentials are stored. The credentials themselves are never
    /// read into a record.
    pub has_access_token: bool,
}

impl CloudRecord {
    pub fn cloud_type(&self) -> Option<CloudType> {
        self.cloud_type.parse().ok()
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        Ok(Self {
            id: row.required_long("_id")?,
            cloud_type: row.required_text("TYPE")?,
            url: row.text("URL")?,
            username: row.text("USERNAME")?,
            webdav_certificate: row.text("WEBDAV_CERTIFICATE")?,
            s3_bucket: row.text("S3_BUCKET")?,
            s3_region: row.text("S3_REGION")?,
            has_access_token: !row.is_null("ACCESS_TOKEN")?,
        })
    }
}

const COLUMNS: &[&str] = &[
    "_id",
    "TYPE",
    "URL",
    "USERNAME",
    "WEBDAV_CERTIFICATE",
    "S3_BUCKET",
    "S3_REGION",
    "ACCESS_TOKEN",
];

/// Read access to cloud connections
pub struct CloudRepository<'a> {
    handle: &'a dyn StoreHandle,
}

impl<'a> CloudRepository<'a> {
    pub fn new(handle: &'a dyn StoreHandle) -> Self {
        Self { handle }
    }

    /// All clouds, by id
    pub fn all(&self) -> StoreResult<Vec<CloudRecord>> {
        Sql::query(Tables::CLOUD)
            .columns(COLUMNS)
            .order_by("_id")
            .execute_on(self.handle, CloudRecord::from_row)
    }

    pub fn by_type(&self, cloud_type: CloudType) -> StoreResult<Vec<CloudRecord>> {
        Sql::query(Tables::CLOUD)
            .columns(COLUMNS)
            .where_("TYPE", Sql::eq(cloud_type.as_str()))
            .order_by("_id")
            .execute_on(self.handle, CloudRecord::from_row)
    }

    pub fn count(&self) -> StoreResult<u64> {
        count_rows(self.handle, Tables::CLOUD)
    }
}

pub(super) fn count_rows(handle: &dyn StoreHandle, table: &str) -> StoreResult<u64> {
    let rows = handle.query(&format!("SELECT COUNT(*) AS n FROM {}", table), &[], None)?;
    let count = match rows.first() {
        Some(row) => row.required_long("n")?,
        None => 0,
    };
    Ok(count as u64)
}
