//! Merchant payment: account/username lookup -> amount -> direct insert.
//!
//! Unlike the other services, merchant payments never call the upstream
//! client — the row is written straight into the local `transactions` table.

use async_trait::async_trait;

use crate::db;
use crate::handlers::{ActionContext, ActionOutcome, Handler, HandlerMap};
use crate::handlers::common::parse_amount;

const RECEIVER_ID_KEY: &str = "merchant_receiver_id";
const RECEIVER_NAME_KEY: &str = "merchant_receiver_name";

async fn lookup(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let identifier = ctx.input.trim();
    if identifier.is_empty() {
        return ActionOutcome::Soft("merchant_invalid_account".to_string());
    }
    match db::find_receiver(ctx.pool, identifier).await {
        Ok(Some(receiver)) => {
            ctx.extras.set(RECEIVER_ID_KEY, receiver.id);
            ctx.extras.set(RECEIVER_NAME_KEY, &receiver.company_name);
            ActionOutcome::Render("merchant_found_prompt".to_string())
        }
        Ok(None) => ActionOutcome::Soft("merchant_not_found".to_string()),
        Err(err) => {
            tracing::warn!(error = %err, "merchant lookup failed");
            ActionOutcome::Internal(err.to_string())
        }
    }
}

async fn submit(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let amount = match parse_amount(ctx.input) {
        Some(a) => a,
        None => return ActionOutcome::Soft("invalid_amount".to_string()),
    };
    let receiver_id = match ctx.extras.get_typed::<i64>(RECEIVER_ID_KEY) {
        Some(id) => id,
        None => return ActionOutcome::Internal("missing merchant receiver in session".to_string()),
    };

    match db::insert_merchant_payment(ctx.pool, receiver_id, amount, ctx.msisdn, "USSD merchant payment").await {
        Ok(()) => ActionOutcome::Render("merchant_submit_success".to_string()),
        Err(err) => {
            tracing::warn!(error = %err, "merchant payment insert failed");
            ActionOutcome::Internal(err.to_string())
        }
    }
}

struct Lookup;

#[async_trait]
impl Handler for Lookup {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        lookup(ctx).await
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
    handlers.insert("merchant_lookup", Box::new(Lookup));
    handlers.insert("merchant_submit", Box::new(Submit));
}
