//! Pay-TV: card -> account lookup -> package -> period -> confirm -> submit.
//!
//! Pricing is a fixed compile-time table, not a user-typed amount: selecting
//! a period deterministically derives the price. The Chinese add-on package
//! only ever offers a monthly period regardless of which period token the
//! user sends.

use async_trait::async_trait;

use crate::handlers::common::{confirm_via_upstream, is_digits, resolve_account_number, submit_via_upstream};
use crate::handlers::{ActionContext, ActionOutcome, Handler, HandlerMap};

const SERVICE: &str = "tv";
const SERVICE_TYPE: &str = "TV";
const RECENT_KEY: &str = "tv_recent_numbers";
const CARD_KEY: &str = "tv_card_number";
const PACKAGE_KEY: &str = "tv_package";
const AMOUNT_KEY: &str = "tv_amount";

struct Package {
    code: &'static str,
    daily: Option<u32>,
    weekly: Option<u32>,
    monthly: u32,
    is_addon: bool,
}

const PACKAGES: &[Package] = &[
    Package { code: "BASIC", daily: Some(800), weekly: Some(2_700), monthly: 8_000, is_addon: false },
    Package { code: "CLASSIC", daily: Some(1_200), weekly: Some(4_200), monthly: 11_000, is_addon: false },
    Package { code: "FRENCH", daily: Some(1_500), weekly: Some(4_700), monthly: 14_000, is_addon: false },
    Package { code: "UNIQUE", daily: Some(1_500), weekly: Some(4_700), monthly: 14_000, is_addon: false },
    Package { code: "SUPER", daily: Some(2_100), weekly: Some(7_700), monthly: 20_000, is_addon: false },
    Package { code: "CHINESE_ADDON", daily: None, weekly: None, monthly: 15_000, is_addon: true },
];

fn package_by_menu_index(input: &str) -> Option<&'static Package> {
    let index: usize = input.parse().ok()?;
    PACKAGES.get(index.checked_sub(1)?)
}

fn package_by_code(code: &str) -> Option<&'static Package> {
    PACKAGES.iter().find(|p| p.code == code)
}

/// `1` = daily, `2` = weekly, `3` = monthly. An add-on package ignores the
/// requested period and is always billed monthly.
fn price_for_period(package: &Package, period_input: &str) -> Option<u32> {
    if package.is_addon {
        return Some(package.monthly);
    }
    match period_input {
        "1" => package.daily,
        "2" => package.weekly,
        "3" => Some(package.monthly),
        _ => None,
    }
}

async fn lookup_account(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let card = resolve_account_number(ctx, RECENT_KEY, ctx.input);
    if !is_digits(&card) {
        return ActionOutcome::Soft("tv_invalid_card".to_string());
    }
    ctx.extras.set(CARD_KEY, &card);
    ActionOutcome::Proceed
}

async fn save_package(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let package = match package_by_menu_index(ctx.input) {
        Some(p) => p,
        None => return ActionOutcome::Soft("tv_invalid_package".to_string()),
    };
    ctx.extras.set(PACKAGE_KEY, package.code);
    ActionOutcome::Proceed
}

async fn save_period(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let package_code = ctx.extras.get_typed::<String>(PACKAGE_KEY).unwrap_or_default();
    let package = match package_by_code(&package_code) {
        Some(p) => p,
        None => return ActionOutcome::Internal("missing tv package in session".to_string()),
    };
    let amount = match price_for_period(package, ctx.input) {
        Some(a) => a,
        None => return ActionOutcome::Soft("tv_invalid_period".to_string()),
    };
    ctx.extras.set(AMOUNT_KEY, amount);
    ActionOutcome::Proceed
}

async fn confirm(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let card = ctx.extras.get_typed::<String>(CARD_KEY).unwrap_or_default();
    let amount = ctx.extras.get_typed::<u32>(AMOUNT_KEY).unwrap_or(0);
    if card.is_empty() || amount == 0 {
        return ActionOutcome::Internal("missing tv card/amount in session".to_string());
    }
    match confirm_via_upstream(ctx, SERVICE, SERVICE_TYPE, &card, amount as f64, None).await {
        Ok(result) => {
            let mut params = std::collections::HashMap::new();
            params.insert("Amount".to_string(), format!("{amount}"));
            params.insert("Card".to_string(), card);
            params.insert("Name".to_string(), result.customer_account_name.clone());
            ActionOutcome::RenderParams("tv_confirm_prompt".to_string(), params)
        }
        Err(outcome) => outcome,
    }
}

async fn submit(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let card = ctx.extras.get_typed::<String>(CARD_KEY).unwrap_or_default();
    submit_via_upstream(ctx, SERVICE, SERVICE_TYPE, &card).await
}

struct LookupAccount;

#[async_trait]
impl Handler for LookupAccount {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        lookup_account(ctx).await
    }
}

struct SavePackage;

#[async_trait]
impl Handler for SavePackage {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        save_package(ctx).await
    }
}

struct SavePeriod;

#[async_trait]
impl Handler for SavePeriod {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        save_period(ctx).await
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
    handlers.insert("tv_lookup_account", Box::new(LookupAccount));
    handlers.insert("tv_save_package", Box::new(SavePackage));
    handlers.insert("tv_save_period", Box::new(SavePeriod));
    handlers.insert("tv_confirm", Box::new(Confirm));
    handlers.insert("tv_submit", Box::new(Submit));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_weekly_is_4200() {
        let package = package_by_code("CLASSIC").unwrap();
        assert_eq!(price_for_period(package, "2"), Some(4_200));
    }

    #[test]
    fn addon_ignores_requested_period_and_bills_monthly() {
        let package = package_by_code("CHINESE_ADDON").unwrap();
        assert_eq!(price_for_period(package, "1"), Some(15_000));
        assert_eq!(price_for_period(package, "2"), Some(15_000));
        assert_eq!(price_for_period(package, "3"), Some(15_000));
    }

    #[test]
    fn menu_index_is_one_based() {
        assert_eq!(package_by_menu_index("1").unwrap().code, "BASIC");
        assert_eq!(package_by_menu_index("6").unwrap().code, "CHINESE_ADDON");
        assert!(package_by_menu_index("7").is_none());
        assert!(package_by_menu_index("0").is_none());
    }
}
