use serde_json::Value;
use sqlx::types::Json;

use crate::{
	Result,
	db::Db,
	models::{NewPrompt, NewQuotation, NewQuotationItem, QuotationItem, QuotationStatus},
};

pub async fn insert_prompt(db: &Db, prompt: &NewPrompt) -> Result<i64> {
	let prompt_id: i64 = sqlx::query_scalar(
		"\
INSERT INTO prompts (request_text, brief, client, source)
VALUES ($1, $2, $3, $4)
RETURNING prompt_id",
	)
	.bind(prompt.request_text.as_str())
	.bind(Json(&prompt.brief))
	.bind(Json(&prompt.client))
	.bind(Json(&prompt.source))
	.fetch_one(&db.pool)
	.await?;

	Ok(prompt_id)
}

pub async fn insert_quotation(db: &Db, quotation: &NewQuotation) -> Result<i64> {
	let quotation_id: i64 = sqlx::query_scalar(
		"\
INSERT INTO quotations (prompt_id, status, notes, currency, valid_until)
VALUES ($1, $2, $3, $4, $5)
RETURNING quotation_id",
	)
	.bind(quotation.prompt_id)
	.bind(QuotationStatus::Incomplete.as_str())
	.bind(quotation.notes.as_str())
	.bind(quotation.currency.as_str())
	.bind(quotation.valid_until)
	.fetch_one(&db.pool)
	.await?;

	Ok(quotation_id)
}

pub async fn item_exists(db: &Db, quotation_id: i64, product_id: i64) -> Result<bool> {
	let exists: bool = sqlx::query_scalar(
		"\
SELECT EXISTS (
	SELECT 1
	FROM quotation_items
	WHERE quotation_id = $1
		AND product_id = $2
)",
	)
	.bind(quotation_id)
	.bind(product_id)
	.fetch_one(&db.pool)
	.await?;

	Ok(exists)
}

/// Inserts a line. Returns `false` when the product is already on the quotation.
pub async fn insert_item(db: &Db, item: &NewQuotationItem) -> Result<bool> {
	let result = sqlx::query(
		"\
INSERT INTO quotation_items (
	quotation_id,
	query_id,
	product_id,
	name,
	description,
	tags,
	price,
	currency,
	quantity,
	origin,
	available,
	request_text,
	analysis
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
ON CONFLICT (quotation_id, product_id) DO NOTHING",
	)
	.bind(item.quotation_id)
	.bind(item.query_id.as_str())
	.bind(item.product_id)
	.bind(item.name.as_str())
	.bind(item.description.as_str())
	.bind(item.tags.as_slice())
	.bind(item.price)
	.bind(item.currency.as_str())
	.bind(item.quantity)
	.bind(item.origin.as_str())
	.bind(item.available)
	.bind(item.request_text.as_str())
	.bind(item.analysis.as_ref().map(Json))
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() > 0)
}

/// Appends one analysis entry to the quotation's report, creating the report on first use.
pub async fn append_report(db: &Db, quotation_id: i64, entry: &Value) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO quotation_reports (quotation_id, entries)
VALUES ($1, jsonb_build_array($2::jsonb))
ON CONFLICT (quotation_id) DO UPDATE
SET entries = quotation_reports.entries || EXCLUDED.entries, updated_at = now()",
	)
	.bind(quotation_id)
	.bind(Json(entry))
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn list_report(db: &Db, quotation_id: i64) -> Result<Vec<Value>> {
	let entries: Option<Json<Vec<Value>>> = sqlx::query_scalar(
		"\
SELECT entries
FROM quotation_reports
WHERE quotation_id = $1",
	)
	.bind(quotation_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(entries.map(|Json(entries)| entries).unwrap_or_default())
}

pub async fn list_items(db: &Db, quotation_id: i64) -> Result<Vec<QuotationItem>> {
	let items = sqlx::query_as(
		"\
SELECT
	item_id,
	quotation_id,
	query_id,
	product_id,
	name,
	price,
	quantity,
	available
FROM quotation_items
WHERE quotation_id = $1
ORDER BY item_id",
	)
	.bind(quotation_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(items)
}

pub async fn update_quotation(
	db: &Db,
	quotation_id: i64,
	total: f64,
	status: QuotationStatus,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE quotations
SET total = $1, status = $2, updated_at = now()
WHERE quotation_id = $3",
	)
	.bind(total)
	.bind(status.as_str())
	.bind(quotation_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}
