//! Electricity (token/meter vending) flow: meter number -> owner lookup ->
//! amount -> confirm (upstream `initiate`) -> submit (upstream `process`).

use async_trait::async_trait;

use crate::handlers::common::{confirm_via_upstream, parse_amount, render_recent_numbers, resolve_account_number, submit_via_upstream};
use crate::handlers::{ActionContext, ActionOutcome, Handler, HandlerMap};

const SERVICE: &str = "electricity";
const SERVICE_TYPE: &str = "ELECTRICITY";
const RECENT_KEY: &str = "electricity_recent_numbers";
const METER_KEY: &str = "electricity_meter_number";
const OWNER_KEY: &str = "electricity_owner_name";

async fn recent_numbers(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let body = render_recent_numbers(ctx, SERVICE_TYPE, RECENT_KEY, "electricity_ask_meter").await;
    ActionOutcome::Text(body)
}

/// Top 3 past token purchases (amount + purchase date), for the "my
/// purchase history" menu option rather than the meter-entry prompt.
async fn recent_purchases(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    match crate::db::recent_electricity_purchases(ctx.pool, ctx.msisdn).await {
        Ok(purchases) if !purchases.is_empty() => {
            let mut body = ctx.localizer.get(ctx.language, "electricity_purchase_history", None);
            for purchase in &purchases {
                body.push('\n');
                body.push_str(&format!(
                    "{} - {} ({})",
                    purchase.token.as_deref().unwrap_or("-"),
                    purchase.amount,
                    purchase.created_at.format("%Y-%m-%d")
                ));
            }
            ActionOutcome::Text(body)
        }
        Ok(_) => ActionOutcome::Text(ctx.localizer.get(ctx.language, "electricity_no_purchase_history", None)),
        Err(err) => {
            tracing::warn!(error = %err, "electricity purchase history lookup failed");
            ActionOutcome::Text(ctx.localizer.get(ctx.language, "electricity_no_purchase_history", None))
        }
    }
}

async fn lookup_owner(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let meter = resolve_account_number(ctx, RECENT_KEY, ctx.input);
    if !crate::handlers::common::is_digits(&meter) {
        return ActionOutcome::Soft("electricity_invalid_meter".to_string());
    }
    let owner = match crate::db::lookup_account_name(ctx.pool, SERVICE_TYPE, &meter).await {
        Ok(name) => name.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(error = %err, "electricity owner lookup failed");
            String::new()
        }
    };
    ctx.extras.set(METER_KEY, &meter);
    ctx.extras.set(OWNER_KEY, &owner);
    ActionOutcome::Proceed
}

async fn confirm(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let amount = match parse_amount(ctx.input) {
        Some(a) => a,
        None => return ActionOutcome::Soft("invalid_amount".to_string()),
    };
    let meter = ctx.extras.get_typed::<String>(METER_KEY).unwrap_or_default();
    if meter.is_empty() {
        return ActionOutcome::Internal("missing meter number in session".to_string());
    }
    match confirm_via_upstream(ctx, SERVICE, SERVICE_TYPE, &meter, amount, None).await {
        Ok(result) => {
            if let Some(min) = result.vend_min {
                if amount < min {
                    return ActionOutcome::Soft("electricity_amount_below_minimum".to_string());
                }
            }
            if let Some(max) = result.vend_max {
                if amount > max {
                    return ActionOutcome::Soft("electricity_amount_above_maximum".to_string());
                }
            }
            let owner = ctx.extras.get_typed::<String>(OWNER_KEY).unwrap_or_default();
            let name = if owner.is_empty() { result.customer_account_name.clone() } else { owner };
            let mut params = std::collections::HashMap::new();
            params.insert("Meter".to_string(), meter);
            params.insert("Amount".to_string(), format!("{amount}"));
            params.insert("Name".to_string(), name);
            ActionOutcome::RenderParams("electricity_confirm_prompt".to_string(), params)
        }
        Err(outcome) => outcome,
    }
}

async fn submit(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let meter = ctx.extras.get_typed::<String>(METER_KEY).unwrap_or_default();
    submit_via_upstream(ctx, SERVICE, SERVICE_TYPE, &meter).await
}

struct RecentNumbers;

#[async_trait]
impl Handler for RecentNumbers {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        recent_numbers(ctx).await
    }
}

struct RecentPurchases;

#[async_trait]
impl Handler for RecentPurchases {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        recent_purchases(ctx).await
    }
}

struct LookupOwner;

#[async_trait]
impl Handler for LookupOwner {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        lookup_owner(ctx).await
    }
}

struct Confirm;

#[async_trait]
impl Handler for Confirm {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        confirm(ctx).await
    }
}

struct Submit;

#[async_trait]
impl Handler for Submit {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        submit(ctx).await
    }
}

pub fn register(handlers: &mut HandlerMap) {
    handlers.insert("electricity_recent_numbers", Box::new(RecentNumbers));
    handlers.insert("electricity_recent_purchases", Box::new(RecentPurchases));
    handlers.insert("electricity_lookup_owner", Box::new(LookupOwner));
    handlers.insert("electricity_confirm", Box::new(Confirm));
    handlers.insert("electricity_submit", Box::new(Submit));
}
