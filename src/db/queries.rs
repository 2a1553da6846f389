//! Typed query surface over the relational tables this gateway reads and
//! writes. Queries are plain `sqlx::query`/`query_as` calls rather than the
//! compile-time-checked `query!` macros, since there is no live database
//! connection available to verify them against at build time.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub full_names: String,
    pub phone_number: String,
}

pub async fn find_user_by_msisdn(pool: &PgPool, msisdn: &str) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, full_names, phone_number FROM users WHERE phone_number = $1 LIMIT 1",
    )
    .bind(msisdn)
    .fetch_optional(pool)
    .await
}

pub async fn find_user_locale(pool: &PgPool, msisdn: &str) -> sqlx::Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT locale FROM ussd_user_settings WHERE phone_number = $1 LIMIT 1",
    )
    .bind(msisdn)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(locale,)| locale))
}

pub async fn set_user_locale(pool: &PgPool, msisdn: &str, locale: &str) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO ussd_user_settings (phone_number, locale, updated_at) \
         VALUES ($1, $2, now()) \
         ON CONFLICT (phone_number) DO UPDATE SET locale = EXCLUDED.locale, updated_at = now()",
    )
    .bind(msisdn)
    .bind(locale)
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent distinct account numbers used by `msisdn` for `service_type`,
/// most-recent first, capped at 3 entries, deduplicated while preserving
/// recency order.
pub async fn recent_account_numbers(
    pool: &PgPool,
    msisdn: &str,
    service_type: &str,
) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT customer_account_number FROM efashe_transactions \
         WHERE customer_phone = $1 AND service_type = $2 \
         ORDER BY created_at DESC LIMIT 10",
    )
    .bind(msisdn)
    .bind(service_type)
    .fetch_all(pool)
    .await?;

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(3);
    for (number,) in rows {
        if seen.insert(number.clone()) {
            out.push(number);
            if out.len() == 3 {
                break;
            }
        }
    }
    Ok(out)
}

pub async fn lookup_account_name(
    pool: &PgPool,
    service_type: &str,
    account_number: &str,
) -> sqlx::Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT customer_account_name FROM efashe_transactions \
         WHERE service_type = $1 AND customer_account_number = $2 \
         AND customer_account_name IS NOT NULL \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(service_type)
    .bind(account_number)
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|(name,)| name))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ElectricityPurchaseRow {
    pub token: Option<String>,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

pub async fn recent_electricity_purchases(
    pool: &PgPool,
    msisdn: &str,
) -> sqlx::Result<Vec<ElectricityPurchaseRow>> {
    sqlx::query_as::<_, ElectricityPurchaseRow>(
        "SELECT token, amount, created_at FROM efashe_transactions \
         WHERE customer_phone = $1 AND service_type = 'ELECTRICITY' AND token IS NOT NULL \
         ORDER BY created_at DESC LIMIT 3",
    )
    .bind(msisdn)
    .fetch_all(pool)
    .await
}

/// Records a completed efashe-backed transaction locally so future turns can
/// surface it in recent-account-number prompts. The backend's own ledger is
/// authoritative for settlement; this is a read-side cache of history.
#[allow(clippy::too_many_arguments)]
pub async fn record_efashe_transaction(
    pool: &PgPool,
    transaction_id: &str,
    service_type: &str,
    customer_phone: &str,
    customer_account_number: &str,
    amount: f64,
    customer_account_name: Option<&str>,
    token: Option<&str>,
    message: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO efashe_transactions \
         (transaction_id, service_type, customer_phone, customer_account_number, amount, \
          currency, customer_account_name, token, message, created_at) \
         VALUES ($1, $2, $3, $4, $5, 'RWF', $6, $7, $8, now())",
    )
    .bind(transaction_id)
    .bind(service_type)
    .bind(customer_phone)
    .bind(customer_account_number)
    .bind(amount)
    .bind(customer_account_name)
    .bind(token)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiverRow {
    pub id: i64,
    pub company_name: String,
    pub account_number: String,
    pub username: String,
}

pub async fn find_receiver(pool: &PgPool, identifier: &str) -> sqlx::Result<Option<ReceiverRow>> {
    sqlx::query_as::<_, ReceiverRow>(
        "SELECT id, company_name, account_number, username FROM receivers \
         WHERE account_number = $1 OR username = $1 LIMIT 1",
    )
    .bind(identifier)
    .fetch_optional(pool)
    .await
}

pub async fn insert_merchant_payment(
    pool: &PgPool,
    receiver_id: i64,
    amount: f64,
    phone_number: &str,
    message: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO transactions (receiver_id, transaction_type, amount, status, phone_number, message, created_at) \
         VALUES ($1, 'PAYMENT', $2, 'PENDING', $3, $4, now())",
    )
    .bind(receiver_id)
    .bind(amount)
    .bind(phone_number)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}
