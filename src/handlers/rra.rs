//! RRA tax payments: the document id is the only thing the user types —
//! amount, account name, tax type, and charges all come back authoritative
//! from `initiate`.

use async_trait::async_trait;

use crate::handlers::common::{backend_outcome, submit_via_upstream};
use crate::handlers::{ActionContext, ActionOutcome, Handler, HandlerMap};
use crate::upstream::InitiatePayload;

const SERVICE: &str = "rra";
const SERVICE_TYPE: &str = "RRA";
const DOCUMENT_KEY: &str = "rra_document_id";
const ACCOUNT_NAME_KEY: &str = "rra_account_name";
const TAX_TYPE_KEY: &str = "rra_tax_type";
const CHARGES_KEY: &str = "rra_charges";

async fn initiate(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let document_id = ctx.input.trim().to_string();
    if document_id.is_empty() {
        return ActionOutcome::Soft("rra_invalid_document".to_string());
    }

    let payload = InitiatePayload {
        service_type: SERVICE_TYPE.to_string(),
        customer_phone: ctx.msisdn.to_string(),
        account_number: document_id.clone(),
        amount: 0.0,
        target_msisdn: None,
    };

    match ctx.upstream.initiate(&payload).await {
        Ok(result) => {
            if result.amount <= 0.0
                || result.customer_account_name.is_empty()
                || result.tax_type.as_deref().unwrap_or("").is_empty()
            {
                return ActionOutcome::Soft("rra_missing_info".to_string());
            }
            ctx.extras.set(DOCUMENT_KEY, &document_id);
            ctx.extras.set("rra_transaction_id", &result.transaction_id);
            ctx.extras.set("rra_amount", result.amount);
            ctx.extras.set(ACCOUNT_NAME_KEY, &result.customer_account_name);
            ctx.extras.set(TAX_TYPE_KEY, result.tax_type.clone().unwrap_or_default());
            ctx.extras.set(CHARGES_KEY, result.charges.unwrap_or(0.0));
            let mut params = std::collections::HashMap::new();
            params.insert("Amount".to_string(), format!("{}", result.amount));
            params.insert("Name".to_string(), result.customer_account_name.clone());
            params.insert("TaxType".to_string(), result.tax_type.clone().unwrap_or_default());
            params.insert("Charges".to_string(), format!("{}", result.charges.unwrap_or(0.0)));
            ActionOutcome::RenderParams("rra_confirm_prompt".to_string(), params)
        }
        Err(err) => backend_outcome(err),
    }
}

async fn submit(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let document_id = ctx.extras.get_typed::<String>(DOCUMENT_KEY).unwrap_or_default();
    submit_via_upstream(ctx, SERVICE, SERVICE_TYPE, &document_id).await
}

struct Initiate;

#[async_trait]
impl Handler for Initiate {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        initiate(ctx).await
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
    handlers.insert("rra_initiate", Box::new(Initiate));
    handlers.insert("rra_submit", Box::new(Submit));
}
