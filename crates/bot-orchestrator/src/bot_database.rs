use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use autotrade_core::{
    BotConfig, BotExecutionRecord, BotLifecycleState, BotStore, ExecutionAction, ExecutionStatus,
    OrderSide, StoredBot, TradeRecord,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// `SQLite` persistence for bot configs, lifecycle status, execution log and trades.
///
/// Timestamps are stored as Unix milliseconds, decimals as text.
#[derive(Clone)]
pub struct SqliteBotStore {
    pool: SqlitePool,
}

type BotRow = (String, String, Option<i64>, Option<i64>);
type ExecutionRow = (String, String, String, String, String, Option<String>, i64);
type TradeRow = (String, String, String, String, String, String, String, String, i64);

impl SqliteBotStore {
    /// Opens (creating if missing) the database and runs migrations.
    ///
    /// # Arguments
    ///
    /// * `database_url` - `SQLite` database path (e.g., `<sqlite://autotrade.db>`)
    /// * `max_connections` - pool size
    ///
    /// # Errors
    ///
    /// Returns error if connection fails or migrations fail.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url {database_url}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {database_url}"))?;

        Self::migrate(pool).await
    }

    /// Creates a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails.
    pub async fn in_memory() -> Result<Self> {
        // Every in-memory connection is its own database, so the pool holds one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        Ok(Self { pool })
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| anyhow!("Invalid timestamp {millis}"))
}

fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value).with_context(|| format!("Invalid decimal {value}"))
}

fn stored_bot(row: BotRow) -> Result<StoredBot> {
    let (config_json, status, started_at, stopped_at) = row;
    let config: BotConfig = serde_json::from_str(&config_json)?;
    let status = BotLifecycleState::parse(&status)
        .ok_or_else(|| anyhow!("Unknown bot status {status}"))?;
    Ok(StoredBot {
        config,
        status,
        started_at: started_at.map(from_millis).transpose()?,
        stopped_at: stopped_at.map(from_millis).transpose()?,
    })
}

fn execution_record(row: ExecutionRow) -> Result<BotExecutionRecord> {
    let (id, bot_id, action, status, details_json, error, timestamp) = row;
    Ok(BotExecutionRecord {
        action: ExecutionAction::parse(&action)
            .ok_or_else(|| anyhow!("Unknown execution action {action}"))?,
        status: ExecutionStatus::parse(&status)
            .ok_or_else(|| anyhow!("Unknown execution status {status}"))?,
        details: serde_json::from_str(&details_json)?,
        timestamp: from_millis(timestamp)?,
        id,
        bot_id,
        error,
    })
}

fn trade_record(row: TradeRow) -> Result<TradeRecord> {
    let (id, bot_id, symbol, side, amount, price, fee, order_id, timestamp) = row;
    let side = match side.as_str() {
        "BUY" => OrderSide::Buy,
        "SELL" => OrderSide::Sell,
        other => bail!("Unknown order side {other}"),
    };
    Ok(TradeRecord {
        id,
        bot_id,
        symbol,
        side,
        amount: parse_decimal(&amount)?,
        price: parse_decimal(&price)?,
        fee: parse_decimal(&fee)?,
        order_id,
        timestamp: from_millis(timestamp)?,
    })
}

#[async_trait]
impl BotStore for SqliteBotStore {
    async fn load_bot(&self, bot_id: &str) -> Result<Option<StoredBot>> {
        let row = sqlx::query_as::<_, BotRow>(
            "SELECT config_json, status, started_at, stopped_at FROM bots WHERE bot_id = ?1",
        )
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(stored_bot).transpose()
    }

    async fn save_bot(&self, config: &BotConfig) -> Result<()> {
        let config_json = serde_json::to_string(config)?;
        let now = to_millis(Utc::now());

        sqlx::query(
            r"
            INSERT INTO bots (bot_id, config_json, status, created_at, updated_at)
            VALUES (?1, ?2, 'STOPPED', ?3, ?3)
            ON CONFLICT(bot_id) DO UPDATE SET
                config_json = excluded.config_json,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&config.id)
        .bind(config_json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_bots(&self) -> Result<Vec<StoredBot>> {
        let rows = sqlx::query_as::<_, BotRow>(
            "SELECT config_json, status, started_at, stopped_at FROM bots ORDER BY bot_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(stored_bot).collect()
    }

    async fn update_status(
        &self,
        bot_id: &str,
        status: BotLifecycleState,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let at = to_millis(at);
        let sql = match status {
            BotLifecycleState::Running => {
                "UPDATE bots SET status = ?2, started_at = ?3, updated_at = ?3 WHERE bot_id = ?1"
            }
            BotLifecycleState::Stopped => {
                "UPDATE bots SET status = ?2, stopped_at = ?3, updated_at = ?3 WHERE bot_id = ?1"
            }
            BotLifecycleState::Paused => {
                "UPDATE bots SET status = ?2, updated_at = ?3 WHERE bot_id = ?1"
            }
        };

        let result = sqlx::query(sql)
            .bind(bot_id)
            .bind(status.as_str())
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("Bot {bot_id} not found");
        }
        Ok(())
    }

    async fn append_execution(&self, record: &BotExecutionRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO bot_executions (id, bot_id, action, status, details_json, error, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(&record.id)
        .bind(&record.bot_id)
        .bind(record.action.as_str())
        .bind(record.status.as_str())
        .bind(serde_json::to_string(&record.details)?)
        .bind(&record.error)
        .bind(to_millis(record.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_executions(
        &self,
        bot_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<BotExecutionRecord>> {
        // Newest first with the limit applied, then flipped back to oldest first.
        let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let rows = sqlx::query_as::<_, ExecutionRow>(
            r"
            SELECT id, bot_id, action, status, details_json, error, timestamp
            FROM bot_executions
            WHERE bot_id = ?1
            ORDER BY seq DESC
            LIMIT ?2
            ",
        )
        .bind(bot_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().rev().map(execution_record).collect()
    }

    async fn record_trade(&self, trade: &TradeRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO bot_trades (id, bot_id, symbol, side, amount, price, fee, order_id, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(&trade.id)
        .bind(&trade.bot_id)
        .bind(&trade.symbol)
        .bind(trade.side.to_string())
        .bind(trade.amount.to_string())
        .bind(trade.price.to_string())
        .bind(trade.fee.to_string())
        .bind(&trade.order_id)
        .bind(to_millis(trade.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_trades(&self, bot_id: &str) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r"
            SELECT id, bot_id, symbol, side, amount, price, fee, order_id, timestamp
            FROM bot_trades
            WHERE bot_id = ?1
            ORDER BY seq
            ",
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(trade_record).collect()
    }
}
