// SQLite store
//
// Each entity lives in its own table as a JSON document next to a few
// indexed columns. Versioned writes are conditional updates, and compound
// operations run inside one transaction.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    check_version, ContractFilter, MarketRequestFilter, ProcurementStore, ProposalFilter, RfpFilter, StoreError,
    StoreResult, StoredEntity,
};
use crate::award::AwardTransaction;
use crate::config::DatabaseConfig;
use crate::contracts::Contract;
use crate::market::MarketRequest;
use crate::proposals::{Proposal, ProposalStatus};
use crate::rfp::RfpRequest;
use crate::types::{ContractId, MarketRequestId, ProposalId, RfpRequestId};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and optionally run migrations
    pub async fn new(database_url: &str, max_connections: u32, auto_migrate: bool) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        Self::new(&config.url, config.max_connections, config.auto_migrate).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
    }
}

fn decode<T: StoredEntity>(body: &str) -> StoreResult<T> {
    Ok(serde_json::from_str(body)?)
}

async fn fetch<T: StoredEntity>(conn: &mut SqliteConnection, id: &str) -> StoreResult<Option<T>> {
    let sql = format!("SELECT body FROM {} WHERE id = ?1", T::TABLE);
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => {
            let body: String = row.get("body");
            Ok(Some(decode(&body)?))
        }
        None => Ok(None),
    }
}

async fn fetch_all<T: StoredEntity>(conn: &mut SqliteConnection) -> StoreResult<Vec<T>> {
    let sql = format!("SELECT body FROM {} ORDER BY id", T::TABLE);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| {
            let body: String = row.get("body");
            decode(&body)
        })
        .collect()
}

async fn stored_version<T: StoredEntity>(conn: &mut SqliteConnection, id: &str) -> StoreResult<Option<u64>> {
    let sql = format!("SELECT version FROM {} WHERE id = ?1", T::TABLE);
    let version: Option<i64> = sqlx::query_scalar(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(version.map(|v| v as u64))
}

/// Insert at version 1 or update from the loaded version, failing on any
/// mismatch with the stored row
async fn write<T: StoredEntity>(conn: &mut SqliteConnection, entity: &T) -> StoreResult<T> {
    let expected = entity.version();
    let mut next = entity.clone();
    next.set_version(expected + 1);
    let body = serde_json::to_string(&next)?;

    let affected = if expected == 0 {
        let sql = format!(
            "INSERT INTO {} (id, version, status, organization_id, owner_id, ref_id, body) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) ON CONFLICT(id) DO NOTHING",
            T::TABLE
        );
        sqlx::query(&sql)
            .bind(next.key())
            .bind(next.version() as i64)
            .bind(next.status_label())
            .bind(next.organization())
            .bind(next.owner())
            .bind(next.reference())
            .bind(&body)
            .execute(&mut *conn)
            .await?
            .rows_affected()
    } else {
        let sql = format!(
            "UPDATE {} SET version = ?2, status = ?3, organization_id = ?4, owner_id = ?5, ref_id = ?6, \
             body = ?7, updated_at = datetime('now') WHERE id = ?1 AND version = ?8",
            T::TABLE
        );
        sqlx::query(&sql)
            .bind(next.key())
            .bind(next.version() as i64)
            .bind(next.status_label())
            .bind(next.organization())
            .bind(next.owner())
            .bind(next.reference())
            .bind(&body)
            .bind(expected as i64)
            .execute(&mut *conn)
            .await?
            .rows_affected()
    };

    if affected == 0 {
        let found = stored_version::<T>(conn, entity.key()).await?;
        check_version::<T>(entity.key(), expected, found)?;
        // Version matched on re-read, so the row changed between statements
        return Err(StoreError::VersionConflict {
            entity: T::KIND,
            id: entity.key().to_string(),
            expected,
            found: found.unwrap_or(0),
        });
    }

    debug!(entity = %T::KIND, id = next.key(), version = next.version(), "Saved entity");
    Ok(next)
}

async fn remove<T: StoredEntity>(conn: &mut SqliteConnection, id: &str, expected_version: u64) -> StoreResult<()> {
    let found = stored_version::<T>(conn, id).await?.ok_or_else(|| StoreError::Missing {
        entity: T::KIND,
        id: id.to_string(),
    })?;
    check_version::<T>(id, expected_version, Some(found))?;
    let sql = format!("DELETE FROM {} WHERE id = ?1 AND version = ?2", T::TABLE);
    sqlx::query(&sql)
        .bind(id)
        .bind(expected_version as i64)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ProcurementStore for SqliteStore {
    async fn load_rfp(&self, id: &RfpRequestId) -> StoreResult<Option<RfpRequest>> {
        fetch(&mut *self.pool.acquire().await?, id.as_str()).await
    }

    async fn save_rfp(&self, rfp: &RfpRequest) -> StoreResult<RfpRequest> {
        write(&mut *self.pool.acquire().await?, rfp).await
    }

    async fn query_rfps(&self, filter: &RfpFilter) -> StoreResult<Vec<RfpRequest>> {
        let all: Vec<RfpRequest> = fetch_all(&mut *self.pool.acquire().await?).await?;
        Ok(all.into_iter().filter(|r| filter.matches(r)).collect())
    }

    async fn delete_rfp(&self, id: &RfpRequestId, expected_version: u64) -> StoreResult<()> {
        remove::<RfpRequest>(&mut *self.pool.acquire().await?, id.as_str(), expected_version).await
    }

    async fn load_market(&self, id: &MarketRequestId) -> StoreResult<Option<MarketRequest>> {
        fetch(&mut *self.pool.acquire().await?, id.as_str()).await
    }

    async fn save_market(&self, market: &MarketRequest) -> StoreResult<MarketRequest> {
        write(&mut *self.pool.acquire().await?, market).await
    }

    async fn query_markets(&self, filter: &MarketRequestFilter) -> StoreResult<Vec<MarketRequest>> {
        let all: Vec<MarketRequest> = fetch_all(&mut *self.pool.acquire().await?).await?;
        Ok(all.into_iter().filter(|m| filter.matches(m)).collect())
    }

    async fn delete_market(&self, id: &MarketRequestId, expected_version: u64) -> StoreResult<()> {
        remove::<MarketRequest>(&mut *self.pool.acquire().await?, id.as_str(), expected_version).await
    }

    async fn load_proposal(&self, id: &ProposalId) -> StoreResult<Option<Proposal>> {
        fetch(&mut *self.pool.acquire().await?, id.as_str()).await
    }

    async fn save_proposal(&self, proposal: &Proposal) -> StoreResult<Proposal> {
        write(&mut *self.pool.acquire().await?, proposal).await
    }

    async fn query_proposals(&self, filter: &ProposalFilter) -> StoreResult<Vec<Proposal>> {
        let all: Vec<Proposal> = fetch_all(&mut *self.pool.acquire().await?).await?;
        Ok(all.into_iter().filter(|p| filter.matches(p)).collect())
    }

    async fn delete_proposal(&self, id: &ProposalId, expected_version: u64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let proposal: Option<Proposal> = fetch(&mut tx, id.as_str()).await?;
        remove::<Proposal>(&mut tx, id.as_str(), expected_version).await?;
        if let Some(proposal) = proposal {
            if let Some(mut market) = fetch::<MarketRequest>(&mut tx, proposal.market_request_id.as_str()).await? {
                market.detach_proposal(id);
                write(&mut tx, &market).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_contract(&self, id: &ContractId) -> StoreResult<Option<Contract>> {
        fetch(&mut *self.pool.acquire().await?, id.as_str()).await
    }

    async fn save_contract(&self, contract: &Contract) -> StoreResult<Contract> {
        write(&mut *self.pool.acquire().await?, contract).await
    }

    async fn query_contracts(&self, filter: &ContractFilter) -> StoreResult<Vec<Contract>> {
        let all: Vec<Contract> = fetch_all(&mut *self.pool.acquire().await?).await?;
        Ok(all.into_iter().filter(|c| filter.matches(c)).collect())
    }

    async fn insert_proposal_exclusive(&self, proposal: &Proposal) -> StoreResult<Proposal> {
        let mut tx = self.pool.begin().await?;
        let market_key = proposal.market_request_id.as_str();
        let Some(mut market) = fetch::<MarketRequest>(&mut tx, market_key).await? else {
            return Err(StoreError::Missing {
                entity: MarketRequest::KIND,
                id: market_key.to_string(),
            });
        };

        let existing: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM proposals
            WHERE ref_id = ?1 AND owner_id = ?2 AND status != ?3 AND id != ?4
            LIMIT 1
            "#,
        )
        .bind(market_key)
        .bind(proposal.vendor_id.as_str())
        .bind(ProposalStatus::Withdrawn.as_str())
        .bind(proposal.id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let duplicate = |existing: String| StoreError::DuplicateActiveProposal {
            vendor_id: proposal.vendor_id.to_string(),
            market_request_id: market_key.to_string(),
            existing,
        };
        if let Some(existing) = existing {
            return Err(duplicate(existing));
        }

        let stored = match write(&mut tx, proposal).await {
            Ok(stored) => stored,
            Err(StoreError::Database(err)) if is_unique_violation(&err) => {
                return Err(duplicate("unknown".to_string()));
            }
            Err(err) => return Err(err),
        };
        market.attach_proposal(&stored.id);
        write(&mut tx, &market).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn apply_award(&self, award: &AwardTransaction) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        write(&mut tx, &award.market).await?;
        for proposal in award.proposals() {
            write(&mut tx, proposal).await?;
        }
        if let Some(contract) = &award.new_contract {
            write(&mut tx, contract).await?;
        }
        tx.commit().await?;
        debug!(market_request_id = %award.market.id, rejected = award.rejected.len(), "Applied award transaction");
        Ok(())
    }

    async fn apply_conversion(&self, rfp: &RfpRequest, market: &MarketRequest) -> StoreResult<(RfpRequest, MarketRequest)> {
        let mut tx = self.pool.begin().await?;
        let rfp = write(&mut tx, rfp).await?;
        let market = write(&mut tx, market).await?;
        tx.commit().await?;
        Ok((rfp, market))
    }
}
