use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, models::ProductRecord};

pub struct PgCatalog {
	pub pool: PgPool,
	table: String,
}

impl PgCatalog {
	pub async fn connect(cfg: &rival_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool, table: cfg.product_table.clone() })
	}

	/// Reads the full product table. Callers snapshot and cache the result;
	/// this is never issued per candidate.
	pub async fn load_products(&self) -> Result<Vec<ProductRecord>> {
		// The table name is validated as a plain identifier at config load.
		let sql = format!(
			"\
SELECT
	product_id,
	company,
	channel,
	product_name,
	track,
	labels,
	features,
	summary_coverage,
	summary_liability,
	summary_exclusions,
	summary_provisions,
	summary_services
FROM {}",
			self.table
		);
		let rows: Vec<ProductRecord> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

		Ok(rows)
	}
}
