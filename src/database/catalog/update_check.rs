//! The single update-check row

use serde::{Deserialize, Serialize};

use crate::database::core::{StoreHandle, StoreResult, Tables};
use crate::database::sql::Sql;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheckRecord {
    pub version: Option<String>,
    pub release_note: Option<String>,
    pub url_to_apk: Option<String>,
    pub url_to_release_note: Option<String>,
    pub apk_sha256: Option<String>,
}

pub struct UpdateCheckRepository<'a> {
    handle: &'a dyn StoreHandle,
}

impl<'a> UpdateCheckRepository<'a> {
    pub fn new(handle: &'a dyn StoreHandle) -> Self {
        Self { handle }
    }

    /// The update-check state, if the row exists
    pub fn get(&self) -> StoreResult<Option<UpdateCheckRecord>> {
        let records = Sql::query(Tables::UPDATE_CHECK)
            .columns(&[
                "VERSION",
                "RELEASE_NOTE",
                "URL_TO_APK",
                "URL_TO_RELEASE_NOTE",
                "APK_SHA256",
            ])
            .where_("_id", Sql::eq(1i64))
            .execute_on(self.handle, |row| {
                Ok(UpdateCheckRecord {
                    version: row.text("VERSION")?,
                    release_note: row.text("RELEASE_NOTE")?,
                    url_to_apk: row.text("URL_TO_APK")?,
                    url_to_release_note: row.text("URL_TO_RELEASE_NOTE")?,
                    apk_sha256: row.text("APK_SHA256")?,
                })
            })?;
        Ok(records.into_iter().next())
    }
}
