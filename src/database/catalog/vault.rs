//! Vaults

use serde::{Deserialize, Serialize};

use super::cloud::count_rows;
use crate::database::core::{Row, StoreHandle, StoreResult, Tables};
use crate::database::sql::Sql;

/// One row of the vault table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub id: i64,
    pub cloud_id: Option<i64>,
    pub cloud_type: String,
    pub name: String,
    pub path: Option<String>,
    pub position: Option<i64>,
    pub format: Option<i64>,
    pub shortening_threshold: Option<i64>,
}

impl VaultRecord {
    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        Ok(Self {
            id: row.required_long("_id")?,
            cloud_id: row.long("FOLDER_CLOUD_ID")?,
            cloud_type: row.required_text("CLOUD_TYPE")?,
            name: row.required_text("FOLDER_NAME")?,
            path: row.text("FOLDER_PATH")?,
            position: row.long("POSITION")?,
            format: row.long("FORMAT")?,
            shortening_threshold: row.long("SHORTENING_THRESHOLD")?,
        })
    }
}

const COLUMNS: &[&str] = &[
    "_id",
    "FOLDER_CLOUD_ID",
    "CLOUD_TYPE",
    "FOLDER_NAME",
    "FOLDER_PATH",
    "POSITION",
    "FORMAT",
    "SHORTENING_THRESHOLD",
];

/// Read access to vaults
pub struct VaultRepository<'a> {
    handle: &'a dyn StoreHandle,
}

impl<'a> VaultRepository<'a> {
    pub fn new(handle: &'a dyn StoreHandle) -> Self {
        Self { handle }
    }

    /// All vaults in display order
    pub fn all(&self) -> StoreResult<Vec<VaultRecord>> {
        Sql::query(Tables::VAULT)
            .columns(COLUMNS)
            .order_by("POSITION")
            .execute_on(self.handle, VaultRecord::from_row)
    }

    pub fn for_cloud(&self, cloud_id: i64) -> StoreResult<Vec<VaultRecord>> {
        Sql::query(Tables::VAULT)
            .columns(COLUMNS)
            .where_("FOLDER_CLOUD_ID", Sql::eq(cloud_id))
            .order_by("POSITION")
            .execute_on(self.handle, VaultRecord::from_row)
    }

    pub fn count(&self) -> StoreResult<u64> {
        count_rows(self.handle, Tables::VAULT)
    }
}
