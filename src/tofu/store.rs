//! Persistent, append-only table of trusted certificate fingerprints backed by SQLite.
//!
//! Rows are `(hostname, address, fingerprint)` with no uniqueness constraint: a host that
//! rotated its certificate under retrust mode simply gains another row. Rows are never
//! updated or deleted by the helper.

use std::path::Path;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, FromQueryResult,
    RuntimeErr, SqlxSqliteConnector, Statement, TransactionTrait,
    sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use super::{CertificateValidator, fingerprint::Fingerprinter};
use crate::errors::HelperError;

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS tofu (hostname TEXT, address TEXT, fingerprint TEXT)";
const SELECT_FINGERPRINTS: &str =
    "SELECT fingerprint FROM tofu WHERE hostname = ? AND address = ?";
const INSERT_RECORD: &str = "INSERT INTO tofu (hostname, address, fingerprint) VALUES (?, ?, ?)";
const SELECT_ALL: &str = "SELECT hostname, address, fingerprint FROM tofu ORDER BY rowid";

/// One trusted `(hostname, address, fingerprint)` row.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct TrustRecord {
    pub hostname: String,
    pub address: String,
    pub fingerprint: String,
}

#[derive(Debug, FromQueryResult)]
struct FingerprintRow {
    fingerprint: String,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    /// The fingerprint was already on record for this host and address.
    Known,
    /// A new trust record was written (first contact, or retrust mode).
    Recorded,
}

pub struct TofuStore {
    db: DatabaseConnection,
    fingerprinter: Fingerprinter,
    retrust: bool,
}

impl TofuStore {
    /// Opens (creating if needed) the trust store database at `path`.
    pub async fn open(
        path: &Path,
        fingerprinter: Fingerprinter,
        retrust: bool,
    ) -> Result<Self, HelperError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // a sqlite:// URL would percent-decode the path and split it at `?`
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| DbErr::Conn(RuntimeErr::SqlxError(e)))?;
        let db = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool);
        db.execute_unprepared(CREATE_TABLE).await?;
        tracing::debug!("opened trust store at {}", path.display());
        Ok(Self {
            db,
            fingerprinter,
            retrust,
        })
    }

    /// Applies the TOFU policy to a peer certificate.
    ///
    /// The lookup and the insert it leads to run inside a single transaction.
    pub async fn check(
        &self,
        cert_der: &[u8],
        hostname: &str,
        address: &str,
    ) -> Result<TrustDecision, HelperError> {
        let fingerprint = self.fingerprinter.fingerprint(cert_der);
        let txn = self.db.begin().await?;
        let known = fingerprints_for(&txn, hostname, address).await?;

        if !known.is_empty() && !self.retrust {
            if known.contains(&fingerprint) {
                txn.commit().await?;
                return Ok(TrustDecision::Known);
            }
            txn.rollback().await?;
            return Err(HelperError::UntrustedCertificate {
                hostname: hostname.to_string(),
                address: address.to_string(),
                fingerprint: self.fingerprinter.certificate_fingerprint(cert_der),
            });
        }

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            INSERT_RECORD,
            [
                hostname.into(),
                address.into(),
                fingerprint.as_str().into(),
            ],
        ))
        .await?;
        txn.commit().await?;
        tracing::info!(
            "trusting certificate {} for {} ({})",
            fingerprint,
            hostname,
            address
        );
        Ok(TrustDecision::Recorded)
    }

    /// All trust records in insertion order.
    pub async fn records(&self) -> Result<Vec<TrustRecord>, HelperError> {
        let records = TrustRecord::find_by_statement(Statement::from_string(
            DbBackend::Sqlite,
            SELECT_ALL,
        ))
        .all(&self.db)
        .await?;
        Ok(records)
    }

    /// Releases the database connection. The helper calls this on every exit path.
    pub async fn close(self) -> Result<(), HelperError> {
        self.db.close().await?;
        Ok(())
    }
}

async fn fingerprints_for(
    txn: &DatabaseTransaction,
    hostname: &str,
    address: &str,
) -> Result<Vec<String>, HelperError> {
    let rows = FingerprintRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Sqlite,
        SELECT_FINGERPRINTS,
        [hostname.into(), address.into()],
    ))
    .all(txn)
    .await?;
    Ok(rows.into_iter().map(|row| row.fingerprint).collect())
}

#[async_trait]
impl CertificateValidator for TofuStore {
    async fn validate(
        &self,
        cert_der: &[u8],
        hostname: &str,
        address: &str,
    ) -> Result<(), HelperError> {
        self.check(cert_der, hostname, address).await.map(|_| ())
    }
}
