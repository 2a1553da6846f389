//! Airtime top-up: self or another MSISDN -> amount -> confirm -> submit.
//! Targeting a different MSISDN routes through `initiate_for_other` instead
//! of `initiate`.

use async_trait::async_trait;

use crate::handlers::common::{confirm_via_upstream, is_digits, parse_amount, submit_via_upstream};
use crate::handlers::{ActionContext, ActionOutcome, Handler, HandlerMap};

const SERVICE: &str = "airtime";
const SERVICE_TYPE: &str = "AIRTIME";
const TARGET_KEY: &str = "airtime_target_msisdn";

async fn choose_self(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    ctx.extras.set(TARGET_KEY, ctx.msisdn);
    ActionOutcome::Proceed
}

async fn set_other_msisdn(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    if !is_digits(ctx.input) {
        return ActionOutcome::Soft("airtime_invalid_msisdn".to_string());
    }
    ctx.extras.set(TARGET_KEY, ctx.input);
    ActionOutcome::Proceed
}

async fn confirm(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let amount = match parse_amount(ctx.input) {
        Some(a) => a,
        None => return ActionOutcome::Soft("invalid_amount".to_string()),
    };
    let target = ctx
        .extras
        .get_typed::<String>(TARGET_KEY)
        .unwrap_or_else(|| ctx.msisdn.to_string());

    match confirm_via_upstream(ctx, SERVICE, SERVICE_TYPE, &target, amount, Some(&target)).await {
        Ok(_) => {
            let mut params = std::collections::HashMap::new();
            params.insert("Amount".to_string(), format!("{amount}"));
            params.insert("Target".to_string(), target);
            ActionOutcome::RenderParams("airtime_confirm_prompt".to_string(), params)
        }
        Err(outcome) => outcome,
    }
}

async fn submit(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let target = ctx
        .extras
        .get_typed::<String>(TARGET_KEY)
        .unwrap_or_else(|| ctx.msisdn.to_string());
    submit_via_upstream(ctx, SERVICE, SERVICE_TYPE, &target).await
}

struct ChooseSelf;

#[async_trait]
impl Handler for ChooseSelf {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        choose_self(ctx).await
    }
}

struct SetOtherMsisdn;

#[async_trait]
impl Handler for SetOtherMsisdn {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        set_other_msisdn(ctx).await
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
    handlers.insert("airtime_choose_self", Box::new(ChooseSelf));
    handlers.insert("airtime_set_other_msisdn", Box::new(SetOtherMsisdn));
    handlers.insert("airtime_confirm", Box::new(Confirm));
    handlers.insert("airtime_submit", Box::new(Submit));
}
