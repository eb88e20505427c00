//! The catalog's migration chain, version 1 (template) to 13

use tracing::{debug, info};

use super::{MigrationContext, MigrationStep};
use crate::database::core::{column_names, table_exists, CryptorError, StoreResult, Tables};
use crate::database::sql::{ColumnType, Sql};

/// Settings key the license token lives under once it has left the store
pub const LICENSE_TOKEN_KEY: &str = "license_token";

const UPDATE_CHECK_ROW: i64 = 1;

/// Every step, in chain order
pub fn catalog_steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep::new(1, 2, "create update check table", create_update_check)
            .with_recovery(rebuild_update_check),
        MigrationStep::new(2, 3, "add webdav certificate", add_webdav_certificate),
        MigrationStep::new(3, 4, "add vault position", add_vault_position),
        MigrationStep::new(4, 5, "rename webdav url to url", rename_cloud_url),
        MigrationStep::new(5, 6, "add vault format", add_vault_format),
        MigrationStep::new(6, 7, "add apk checksum", add_apk_checksum),
        MigrationStep::new(7, 8, "add default pcloud", add_default_pcloud),
        MigrationStep::new(8, 9, "add s3 columns", add_s3_columns),
        MigrationStep::new(9, 10, "encrypt webdav tokens", encrypt_webdav_tokens),
        MigrationStep::new(10, 11, "move license to settings", move_license_to_settings),
        MigrationStep::new(11, 12, "remove local clouds", remove_local_clouds),
        MigrationStep::new(12, 13, "unique vault folder", unique_vault_folder),
    ]
}

fn create_update_check_table(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    Sql::create_table(Tables::UPDATE_CHECK)
        .id()
        .optional_text("LICENSE_TOKEN")
        .optional_text("RELEASE_NOTE")
        .optional_text("VERSION")
        .optional_text("URL_TO_APK")
        .optional_text("URL_TO_RELEASE_NOTE")
        .execute_on(ctx.handle)
}

fn create_update_check(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    create_update_check_table(ctx)?;
    Sql::insert_into(Tables::UPDATE_CHECK)
        .integer("_id", UPDATE_CHECK_ROW)
        .execute_on(ctx.handle)?;
    Ok(())
}

/// The table already exists in some other shape. Rebuild it, carrying over
/// the license token and nothing else.
fn rebuild_update_check(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    let mut token = None;
    if table_exists(ctx.handle, Tables::UPDATE_CHECK)? {
        let columns = column_names(ctx.handle, Tables::UPDATE_CHECK)?;
        if columns.iter().any(|c| c.eq_ignore_ascii_case("LICENSE_TOKEN")) {
            token = Sql::query(Tables::UPDATE_CHECK)
                .columns(&["LICENSE_TOKEN"])
                .where_("LICENSE_TOKEN", Sql::is_not_null())
                .order_by("_id")
                .limit(1)
                .execute_on(ctx.handle, |row| row.text("LICENSE_TOKEN"))?
                .into_iter()
                .flatten()
                .next();
        }
        ctx.handle
            .exec_sql(&format!("DROP TABLE {}", Tables::UPDATE_CHECK))?;
    }
    info!(
        kept_license = token.is_some(),
        "rebuilding {}",
        Tables::UPDATE_CHECK
    );

    create_update_check_table(ctx)?;
    Sql::insert_into(Tables::UPDATE_CHECK)
        .integer("_id", UPDATE_CHECK_ROW)
        .optional_text("LICENSE_TOKEN", token.as_deref())
        .execute_on(ctx.handle)?;
    Ok(())
}

fn add_webdav_certificate(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    Sql::alter_table(Tables::CLOUD)
        .add_column("WEBDAV_CERTIFICATE", ColumnType::Text)
        .execute_on(ctx.handle)
}

fn add_vault_position(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    Sql::alter_table(Tables::VAULT)
        .add_column("POSITION", ColumnType::Integer)
        .execute_on(ctx.handle)?;

    let ids = Sql::query(Tables::VAULT)
        .columns(&["_id"])
        .order_by("_id")
        .execute_on(ctx.handle, |row| row.required_long("_id"))?;
    for (position, id) in ids.into_iter().enumerate() {
        Sql::update(Tables::VAULT)
            .set("POSITION", position as i64)
            .where_("_id", Sql::eq(id))
            .execute_on(ctx.handle)?;
    }
    Ok(())
}

/// SQLite's recommended table rebuild: create the new shape, copy, drop the
/// old table, then take over its name. Referencing foreign keys follow the
/// name, so they point at the new table afterwards.
fn rename_cloud_url(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    const REBUILT: &str = "CLOUD_ENTITY_REBUILT";

    Sql::create_table(REBUILT)
        .id()
        .required_text("TYPE")
        .optional_text("ACCESS_TOKEN")
        .optional_text("URL")
        .optional_text("USERNAME")
        .optional_text("WEBDAV_CERTIFICATE")
        .execute_on(ctx.handle)?;
    ctx.handle.exec_sql(&format!(
        "INSERT INTO {new} (_id, TYPE, ACCESS_TOKEN, URL, USERNAME, WEBDAV_CERTIFICATE) \
         SELECT _id, TYPE, ACCESS_TOKEN, WEBDAV_URL, USERNAME, WEBDAV_CERTIFICATE FROM {old}",
        new = REBUILT,
        old = Tables::CLOUD
    ))?;
    ctx.handle.exec_sql(&format!("DROP TABLE {}", Tables::CLOUD))?;
    Sql::alter_table(REBUILT)
        .rename_to(Tables::CLOUD)
        .execute_on(ctx.handle)
}

fn add_vault_format(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    Sql::alter_table(Tables::VAULT)
        .add_column("FORMAT", ColumnType::Integer)
        .add_column("SHORTENING_THRESHOLD", ColumnType::Integer)
        .execute_on(ctx.handle)
}

fn add_apk_checksum(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    Sql::alter_table(Tables::UPDATE_CHECK)
        .add_column("APK_SHA256", ColumnType::Text)
        .execute_on(ctx.handle)
}

fn add_default_pcloud(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    let existing = Sql::query(Tables::CLOUD)
        .columns(&["_id"])
        .where_("TYPE", Sql::eq("PCLOUD"))
        .execute_on(ctx.handle, |row| row.required_long("_id"))?;
    if existing.is_empty() {
        Sql::insert_into(Tables::CLOUD)
            .text("TYPE", "PCLOUD")
            .execute_on(ctx.handle)?;
    }
    Ok(())
}

fn add_s3_columns(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    Sql::alter_table(Tables::CLOUD)
        .add_column("S3_BUCKET", ColumnType::Text)
        .add_column("S3_REGION", ColumnType::Text)
        .add_column("S3_SECRET_KEY", ColumnType::Text)
        .execute_on(ctx.handle)
}

fn encrypt_webdav_tokens(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    let tokens = Sql::query(Tables::CLOUD)
        .columns(&["_id", "ACCESS_TOKEN"])
        .where_("TYPE", Sql::eq("WEBDAV"))
        .where_("ACCESS_TOKEN", Sql::is_not_null())
        .execute_on(ctx.handle, |row| {
            Ok((row.required_long("_id")?, row.required_text("ACCESS_TOKEN")?))
        })?;

    if !tokens.is_empty() && !ctx.cryptor.encrypts() {
        return Err(CryptorError(format!(
            "{} webdav access token(s) would stay in plaintext; configure a credential cryptor",
            tokens.len()
        ))
        .into());
    }

    for (id, token) in &tokens {
        let encrypted = ctx.cryptor.encrypt(token)?;
        Sql::update(Tables::CLOUD)
            .set("ACCESS_TOKEN", encrypted)
            .where_("_id", Sql::eq(*id))
            .execute_on(ctx.handle)?;
    }
    debug!(count = tokens.len(), "encrypted webdav access tokens");
    Ok(())
}

fn move_license_to_settings(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    let token = Sql::query(Tables::UPDATE_CHECK)
        .columns(&["LICENSE_TOKEN"])
        .where_("_id", Sql::eq(UPDATE_CHECK_ROW))
        .execute_on(ctx.handle, |row| row.text("LICENSE_TOKEN"))?
        .into_iter()
        .flatten()
        .next();

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        ctx.settings.set(LICENSE_TOKEN_KEY, &token)?;
    }
    Sql::update(Tables::UPDATE_CHECK)
        .set("LICENSE_TOKEN", None::<String>)
        .where_("_id", Sql::eq(UPDATE_CHECK_ROW))
        .execute_on(ctx.handle)?;
    Ok(())
}

/// Local storage is no longer supported. Vaults stored there are dropped
/// together with the clouds themselves.
fn remove_local_clouds(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    let local_ids = Sql::query(Tables::CLOUD)
        .columns(&["_id"])
        .where_("TYPE", Sql::eq("LOCAL"))
        .execute_on(ctx.handle, |row| row.required_long("_id"))?;
    if local_ids.is_empty() {
        return Ok(());
    }

    let vaults = Sql::delete_from(Tables::VAULT)
        .where_("FOLDER_CLOUD_ID", Sql::in_list(local_ids.iter().copied()))
        .execute_on(ctx.handle)?;
    let clouds = Sql::delete_from(Tables::CLOUD)
        .where_("TYPE", Sql::eq("LOCAL"))
        .execute_on(ctx.handle)?;
    info!(vaults, clouds, "removed local clouds");
    Ok(())
}

fn unique_vault_folder(ctx: &MigrationContext<'_>) -> StoreResult<()> {
    // Keep the oldest vault of each duplicated folder. NULLs never collide.
    ctx.handle.exec_sql(&format!(
        "DELETE FROM {vault} \
         WHERE FOLDER_PATH IS NOT NULL AND FOLDER_CLOUD_ID IS NOT NULL \
         AND _id NOT IN (SELECT MIN(_id) FROM {vault} GROUP BY FOLDER_CLOUD_ID, FOLDER_PATH)",
        vault = Tables::VAULT
    ))?;
    ctx.handle.exec_sql(&format!(
        "CREATE UNIQUE INDEX IDX_VAULT_ENTITY_FOLDER_PATH_FOLDER_CLOUD_ID \
         ON {} (FOLDER_PATH, FOLDER_CLOUD_ID)",
        Tables::VAULT
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{
        write_template, CryptorError, SqliteStore, StoreError, StoreHandle, StoreOpenError,
    };
    use crate::database::external::{
        CredentialCryptor, IdentityCryptor, InMemorySettings, SettingsStore,
    };
    use crate::database::migration::{run_path, Migrations};

    struct ReversingCryptor;

    impl CredentialCryptor for ReversingCryptor {
        fn encrypt(&self, plaintext: &str) -> Result<String, CryptorError> {
            Ok(plaintext.chars().rev().collect())
        }

        fn decrypt(&self, ciphertext: &str) -> Result<String, CryptorError> {
            Ok(ciphertext.chars().rev().collect())
        }
    }

    struct Fixture {
        store: SqliteStore,
        settings: InMemorySettings,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn template() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("catalog.db");
            write_template(&path).unwrap();
            Self {
                store: SqliteStore::open(&path).unwrap(),
                settings: InMemorySettings::new(),
                _dir: dir,
            }
        }

        /// Run the chain from the store's current version up to `target`
        fn migrate_to(&self, target: u32) {
            let migrations = Migrations::catalog();
            let from = self.store.version().unwrap();
            let path: Vec<_> = migrations
                .path(from)
                .unwrap()
                .iter()
                .take_while(|s| s.to_version() <= target)
                .copied()
                .collect();
            run_path(&self.ctx(), &path).unwrap();
            assert_eq!(self.store.version().unwrap(), target);
        }

        fn ctx(&self) -> MigrationContext<'_> {
            MigrationContext {
                handle: &self.store,
                cryptor: &ReversingCryptor,
                settings: &self.settings,
            }
        }

        fn exec(&self, sql: &str) {
            self.store.exec_sql(sql).unwrap();
        }

        fn strings(&self, sql: &str) -> Vec<Option<String>> {
            self.store
                .query(sql, &[], None)
                .unwrap()
                .decode(|row| row.text("v"))
                .unwrap()
        }
    }

    #[test]
    fn test_full_chain_reaches_latest_schema() {
        let fixture = Fixture::template();
        fixture.migrate_to(13);

        let store = &fixture.store;
        assert_eq!(
            store.column_names(Tables::CLOUD).unwrap(),
            vec![
                "_id",
                "TYPE",
                "ACCESS_TOKEN",
                "URL",
                "USERNAME",
                "WEBDAV_CERTIFICATE",
                "S3_BUCKET",
                "S3_REGION",
                "S3_SECRET_KEY"
            ]
        );
        assert_eq!(
            store.column_names(Tables::VAULT).unwrap(),
            vec![
                "_id",
                "FOLDER_CLOUD_ID",
                "FOLDER_PATH",
                "FOLDER_NAME",
                "CLOUD_TYPE",
                "PASSWORD",
                "POSITION",
                "FORMAT",
                "SHORTENING_THRESHOLD"
            ]
        );
        assert!(store
            .column_names(Tables::UPDATE_CHECK)
            .unwrap()
            .contains(&"APK_SHA256".to_string()));

        // LOCAL is gone, PCLOUD was added
        assert_eq!(
            fixture.strings("SELECT TYPE AS v FROM CLOUD_ENTITY ORDER BY _id"),
            vec![
                Some("DROPBOX".into()),
                Some("GOOGLE_DRIVE".into()),
                Some("ONEDRIVE".into()),
                Some("PCLOUD".into())
            ]
        );
    }

    #[test]
    fn test_update_check_rebuild_keeps_only_license_token() {
        let fixture = Fixture::template();
        fixture.exec(
            "CREATE TABLE UPDATE_CHECK_ENTITY (_id INTEGER PRIMARY KEY, LICENSE_TOKEN TEXT, STALE TEXT);
             INSERT INTO UPDATE_CHECK_ENTITY VALUES (7, 'license-abc', 'junk');",
        );

        fixture.migrate_to(2);

        assert_eq!(
            fixture.store.column_names(Tables::UPDATE_CHECK).unwrap(),
            vec![
                "_id",
                "LICENSE_TOKEN",
                "RELEASE_NOTE",
                "VERSION",
                "URL_TO_APK",
                "URL_TO_RELEASE_NOTE"
            ]
        );
        assert_eq!(
            fixture.strings("SELECT _id || ':' || LICENSE_TOKEN AS v FROM UPDATE_CHECK_ENTITY"),
            vec![Some("1:license-abc".into())]
        );
    }

    #[test]
    fn test_vault_positions_follow_ids() {
        let fixture = Fixture::template();
        fixture.exec(
            "INSERT INTO VAULT_ENTITY (_id, FOLDER_CLOUD_ID, FOLDER_NAME, CLOUD_TYPE) VALUES
                (5, 1, 'b', 'DROPBOX'), (2, 1, 'a', 'DROPBOX'), (9, 2, 'c', 'GOOGLE_DRIVE');",
        );
        fixture.migrate_to(4);

        assert_eq!(
            fixture.strings("SELECT FOLDER_NAME || POSITION AS v FROM VAULT_ENTITY ORDER BY _id"),
            vec![Some("a0".into()), Some("b1".into()), Some("c2".into())]
        );
    }

    #[test]
    fn test_url_rename_keeps_rows_and_references() {
        let fixture = Fixture::template();
        fixture.exec(
            "INSERT INTO CLOUD_ENTITY (_id, TYPE, WEBDAV_URL, USERNAME) VALUES (10, 'WEBDAV', 'https://dav', 'me');
             INSERT INTO VAULT_ENTITY (FOLDER_CLOUD_ID, FOLDER_NAME, CLOUD_TYPE) VALUES (10, 'v', 'WEBDAV');",
        );
        fixture.migrate_to(5);

        assert_eq!(
            fixture.strings("SELECT URL AS v FROM CLOUD_ENTITY WHERE _id = 10"),
            vec![Some("https://dav".into())]
        );

        // The vault's foreign key now points at the rebuilt table
        fixture.exec("PRAGMA foreign_keys=ON");
        fixture.exec("DELETE FROM CLOUD_ENTITY WHERE _id = 10");
        assert_eq!(
            fixture.strings("SELECT FOLDER_CLOUD_ID AS v FROM VAULT_ENTITY"),
            vec![None]
        );
    }

    #[test]
    fn test_webdav_tokens_are_encrypted() {
        let fixture = Fixture::template();
        fixture.migrate_to(9);
        fixture.exec(
            "INSERT INTO CLOUD_ENTITY (TYPE, ACCESS_TOKEN) VALUES ('WEBDAV', 'secret'), ('DROPBOX', 'plain');
             INSERT INTO CLOUD_ENTITY (TYPE) VALUES ('WEBDAV');",
        );
        fixture.migrate_to(10);

        assert_eq!(
            fixture.strings("SELECT ACCESS_TOKEN AS v FROM CLOUD_ENTITY WHERE _id > 5 ORDER BY _id"),
            vec![Some("terces".into()), Some("plain".into()), None]
        );
    }

    #[test]
    fn test_plaintext_cryptor_cannot_encrypt_webdav_tokens() {
        let fixture = Fixture::template();
        fixture.migrate_to(9);
        fixture.exec("INSERT INTO CLOUD_ENTITY (TYPE, ACCESS_TOKEN) VALUES ('WEBDAV', 'secret')");

        let ctx = MigrationContext {
            handle: &fixture.store,
            cryptor: &IdentityCryptor,
            settings: &fixture.settings,
        };
        let migrations = Migrations::catalog();
        let err = run_path(&ctx, &migrations.path(9).unwrap()[..1]).unwrap_err();
        assert!(matches!(
            err,
            StoreOpenError::MigrationFailed {
                from: 9,
                to: 10,
                source: StoreError::Cryptor(_),
                ..
            }
        ));
        assert_eq!(fixture.store.version().unwrap(), 9);
        assert_eq!(
            fixture.strings("SELECT ACCESS_TOKEN AS v FROM CLOUD_ENTITY WHERE TYPE = 'WEBDAV'"),
            vec![Some("secret".into())]
        );

        // nothing to encrypt, nothing to refuse
        fixture.exec("DELETE FROM CLOUD_ENTITY WHERE TYPE = 'WEBDAV'");
        run_path(&ctx, &migrations.path(9).unwrap()[..1]).unwrap();
        assert_eq!(fixture.store.version().unwrap(), 10);
    }

    #[test]
    fn test_license_moves_to_settings() {
        let fixture = Fixture::template();
        fixture.migrate_to(10);
        fixture.exec("UPDATE UPDATE_CHECK_ENTITY SET LICENSE_TOKEN = 'license-abc' WHERE _id = 1");
        fixture.migrate_to(11);

        assert_eq!(
            fixture.settings.get(LICENSE_TOKEN_KEY).unwrap(),
            Some("license-abc".into())
        );
        assert_eq!(
            fixture.strings("SELECT LICENSE_TOKEN AS v FROM UPDATE_CHECK_ENTITY"),
            vec![None]
        );
    }

    #[test]
    fn test_local_clouds_and_their_vaults_are_removed() {
        let fixture = Fixture::template();
        fixture.migrate_to(11);
        fixture.exec(
            "INSERT INTO VAULT_ENTITY (FOLDER_CLOUD_ID, FOLDER_PATH, FOLDER_NAME, CLOUD_TYPE) VALUES
                (4, '/sd/a', 'on-device', 'LOCAL'),
                (1, '/a', 'in-dropbox', 'DROPBOX');",
        );
        fixture.migrate_to(12);

        assert_eq!(
            fixture.strings("SELECT FOLDER_NAME AS v FROM VAULT_ENTITY"),
            vec![Some("in-dropbox".into())]
        );
        assert!(fixture
            .strings("SELECT TYPE AS v FROM CLOUD_ENTITY WHERE TYPE = 'LOCAL'")
            .is_empty());
    }

    #[test]
    fn test_duplicate_folders_collapse_before_unique_index() {
        let fixture = Fixture::template();
        fixture.migrate_to(12);
        fixture.exec(
            "INSERT INTO VAULT_ENTITY (FOLDER_CLOUD_ID, FOLDER_PATH, FOLDER_NAME, CLOUD_TYPE) VALUES
                (1, '/a', 'first', 'DROPBOX'),
                (1, '/a', 'second', 'DROPBOX'),
                (2, '/a', 'other-cloud', 'GOOGLE_DRIVE');",
        );
        fixture.migrate_to(13);

        assert_eq!(
            fixture.strings("SELECT FOLDER_NAME AS v FROM VAULT_ENTITY ORDER BY _id"),
            vec![Some("first".into()), Some("other-cloud".into())]
        );
        let duplicate = fixture.store.exec_sql(
            "INSERT INTO VAULT_ENTITY (FOLDER_CLOUD_ID, FOLDER_PATH, FOLDER_NAME, CLOUD_TYPE) \
             VALUES (1, '/a', 'again', 'DROPBOX')",
        );
        assert!(matches!(duplicate, Err(StoreError::Sqlite(_))));
    }
}
