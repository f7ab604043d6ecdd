use sq_domain::Product;

use crate::{Error, Result, db::Db, models::ProductRow};

/// Reads the whole source-of-record table.
pub async fn fetch_products(db: &Db, table: &str) -> Result<Vec<Product>> {
	let table = checked_identifier(table)?;
	let sql = format!(
		"\
SELECT
	product_id,
	name,
	description,
	category,
	tags,
	price::double precision AS price,
	stock::bigint AS stock,
	origin
FROM {table}
ORDER BY product_id"
	);
	let rows: Vec<ProductRow> = sqlx::query_as(&sql).fetch_all(&db.pool).await?;

	Ok(rows.into_iter().map(ProductRow::into_product).collect())
}

pub async fn count_products(db: &Db, table: &str) -> Result<u64> {
	let table = checked_identifier(table)?;
	let count: i64 =
		sqlx::query_scalar(&format!("SELECT count(*) FROM {table}")).fetch_one(&db.pool).await?;

	Ok(count.max(0) as u64)
}

fn checked_identifier(table: &str) -> Result<&str> {
	let valid = !table.is_empty()
		&& table.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
		&& !table.starts_with(|ch: char| ch.is_ascii_digit());

	if !valid {
		return Err(Error::InvalidArgument(format!("{table:?} is not a plain table name.")));
	}

	Ok(table)
}
