//! Connection manager: one pooled connection source per database
//!
//! Uses the sqlx `Any` driver so the backend is picked from the URL at
//! runtime. Pool sizing follows `EngineOptions`: `pool_size` connections are
//! kept open, up to `max_overflow` more are opened under load, and those extra
//! connections close again after `idle_timeout`.

use std::str::FromStr;

use serde::Serialize;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions};
use tracing::{debug, error, info};

use crate::config::EngineOptions;
use crate::dialect::Dialect;
use crate::error::{Error, Result};

/// Best-effort snapshot of pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Open connections
    pub size: u32,
    /// Connections currently handed out
    pub checked_out: u32,
    /// Open connections beyond the configured pool size
    pub overflow: u32,
    /// Idle connections
    pub checked_in: u32,
}

/// Owns the connection pool for one database endpoint.
///
/// Cloning is cheap and shares the same pool.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    pool: AnyPool,
    dialect: Dialect,
    pool_size: u32,
}

impl ConnectionManager {
    /// Open a pool for the configured endpoint.
    ///
    /// # Errors
    ///
    /// `Error::Config` for an unknown key, a missing field or an unsupported
    /// driver; `Error::Database` if the first connection cannot be opened.
    pub async fn connect(options: EngineOptions) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let url = options.resolve_url()?;
        let dialect = Dialect::from_url(&url)?;

        let mut connect_options = AnyConnectOptions::from_str(&url)
            .map_err(|e| Error::config(format!("invalid connection URL: {e}")))?;
        if !options.echo {
            connect_options = connect_options.disable_statement_logging();
        }

        let pool = pool_options(&options).connect_with(connect_options).await?;

        info!(
            dialect = %dialect,
            pool_size = options.pool_size,
            max_overflow = options.max_overflow,
            "connection pool ready"
        );

        Ok(Self {
            pool,
            dialect,
            pool_size: options.pool_size,
        })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: AnyPool, dialect: Dialect, pool_size: u32) -> Self {
        Self {
            pool,
            dialect,
            pool_size,
        }
    }

    /// Read-only handle to the underlying pool
    pub fn engine(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Run `SELECT 1`. Never errors; any failure is logged and reported as `false`.
    pub async fn ping(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => {
                debug!(dialect = %self.dialect, "ping ok");
                true
            }
            Err(e) => {
                error!(dialect = %self.dialect, error = %e, "ping failed");
                false
            }
        }
    }

    /// Close every pooled connection. Safe to call more than once.
    pub async fn dispose(&self) {
        if self.pool.is_closed() {
            debug!("connection pool already disposed");
            return;
        }
        self.pool.close().await;
        info!(dialect = %self.dialect, "connection pool disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Pool usage snapshot, `None` once the pool is disposed.
    pub fn pool_status(&self) -> Option<PoolStatus> {
        if self.pool.is_closed() {
            return None;
        }
        let size = self.pool.size();
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(size).min(size);
        Some(PoolStatus {
            size,
            checked_out: size - idle,
            overflow: size.saturating_sub(self.pool_size),
            checked_in: idle,
        })
    }
}

fn pool_options(options: &EngineOptions) -> AnyPoolOptions {
    let max = options.max_connections();
    AnyPoolOptions::new()
        .min_connections(options.pool_size.min(max))
        .max_connections(max)
        .idle_timeout(options.idle_timeout)
        .acquire_timeout(options.pool_timeout)
        .max_lifetime(options.pool_recycle)
        .test_before_acquire(options.pre_ping)
}
