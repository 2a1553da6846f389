//! Helpers shared across service handlers: language switching, amount
//! parsing, recent-account-number prompts, and the generic confirm/submit
//! pattern used by every backend-integrated service.

use async_trait::async_trait;

use crate::db;
use crate::handlers::{ActionContext, ActionOutcome, Handler};
use crate::upstream::InitiatePayload;

pub async fn set_language(ctx: &mut ActionContext<'_>, lang: &str) -> ActionOutcome {
    if let Err(err) = db::set_user_locale(ctx.pool, ctx.msisdn, lang).await {
        tracing::warn!(error = %err, "failed to persist language preference");
    }
    ActionOutcome::Proceed
}

pub struct SetLanguageEn;

#[async_trait]
impl Handler for SetLanguageEn {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        set_language(ctx, "en").await
    }
}

pub struct SetLanguageRw;

#[async_trait]
impl Handler for SetLanguageRw {
    async fn call(&self, ctx: &mut ActionContext<'_>) -> ActionOutcome {
        set_language(ctx, "rw").await
    }
}

/// Strips thousands separators and whitespace, then parses a strictly
/// positive, finite amount.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

pub fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Renders up to 3 recent account numbers as a numbered list, and stores
/// them under `extras_key` so a subsequent `"1"`/`"2"`/`"3"` choice can be
/// resolved back to the full number.
pub async fn render_recent_numbers(
    ctx: &mut ActionContext<'_>,
    service_type: &str,
    extras_key: &str,
    prompt_key: &str,
) -> String {
    match db::recent_account_numbers(ctx.pool, ctx.msisdn, service_type).await {
        Ok(numbers) if !numbers.is_empty() => {
            ctx.extras.set(extras_key, numbers.clone());
            let mut body = ctx.localizer.get(ctx.language, prompt_key, None);
            for (idx, number) in numbers.iter().enumerate() {
                body.push('\n');
                body.push_str(&format!("{}. {number}", idx + 1));
            }
            body
        }
        Ok(_) => ctx.localizer.get(ctx.language, "ask_account_number_raw", None),
        Err(err) => {
            tracing::warn!(error = %err, "failed to load recent account numbers");
            ctx.localizer.get(ctx.language, "ask_account_number_raw", None)
        }
    }
}

/// Resolves the user's choice against a previously rendered numbered list:
/// `"1"`..`"3"` picks the corresponding stored entry, anything else is used
/// as a literal account number.
pub fn resolve_account_number(ctx: &ActionContext<'_>, extras_key: &str, input: &str) -> String {
    if let Ok(index) = input.parse::<usize>() {
        if index >= 1 {
            if let Some(numbers) = ctx.extras.get_typed::<Vec<String>>(extras_key) {
                if let Some(number) = numbers.get(index - 1) {
                    return number.clone();
                }
            }
        }
    }
    input.to_string()
}

/// Classifies a failed upstream call per the error-to-user policy: auth
/// errors (401/403, already retried once inside the client) and transport
/// failures never reach the end user verbatim, while other backend business
/// errors surface their extracted message and let the session continue.
pub fn backend_outcome(err: crate::error::EngineError) -> ActionOutcome {
    match err {
        crate::error::EngineError::Backend { status: 401, .. }
        | crate::error::EngineError::Backend { status: 403, .. } => {
            ActionOutcome::Internal("upstream authentication failed".to_string())
        }
        crate::error::EngineError::Backend { message, .. } => ActionOutcome::Soft(message),
        other => ActionOutcome::Internal(other.to_string()),
    }
}

/// Calls `initiate` (or `initiate_for_other` when `target_msisdn` is set),
/// stashing the returned transaction id and amount under `{service}_*`
/// extras keys for the submit step to pick up.
pub async fn confirm_via_upstream(
    ctx: &mut ActionContext<'_>,
    service: &str,
    service_type: &str,
    account_number: &str,
    amount: f64,
    target_msisdn: Option<&str>,
) -> Result<crate::upstream::InitiateResult, ActionOutcome> {
    let payload = InitiatePayload {
        service_type: service_type.to_string(),
        customer_phone: ctx.msisdn.to_string(),
        account_number: account_number.to_string(),
        amount,
        target_msisdn: target_msisdn.map(str::to_string),
    };

    let result = if let Some(target) = target_msisdn {
        if target != ctx.msisdn {
            ctx.upstream.initiate_for_other(&payload).await
        } else {
            ctx.upstream.initiate(&payload).await
        }
    } else {
        ctx.upstream.initiate(&payload).await
    };

    match result {
        Ok(result) => {
            ctx.extras.set(format!("{service}_transaction_id"), &result.transaction_id);
            ctx.extras.set(format!("{service}_amount"), result.amount);
            ctx.extras.set(
                format!("{service}_account_name"),
                &result.customer_account_name,
            );
            Ok(result)
        }
        Err(err) => Err(backend_outcome(err)),
    }
}

/// Calls `process(transaction_id)` for the stashed transaction id, recording
/// a local history row on success so future "recent numbers" prompts see it.
pub async fn submit_via_upstream(
    ctx: &mut ActionContext<'_>,
    service: &str,
    service_type: &str,
    account_number: &str,
) -> ActionOutcome {
    let transaction_id = match ctx.extras.get_typed::<String>(&format!("{service}_transaction_id")) {
        Some(id) => id,
        None => return ActionOutcome::Internal("no pending transaction to submit".to_string()),
    };
    let amount = ctx
        .extras
        .get_typed::<f64>(&format!("{service}_amount"))
        .unwrap_or(0.0);
    let account_name = ctx.extras.get_typed::<String>(&format!("{service}_account_name"));

    match ctx.upstream.process(&transaction_id).await {
        Ok(()) => {
            if let Err(err) = db::record_efashe_transaction(
                ctx.pool,
                &transaction_id,
                service_type,
                ctx.msisdn,
                account_number,
                amount,
                account_name.as_deref(),
                None,
                &format!("USSD {service} payment"),
            )
            .await
            {
                tracing::warn!(error = %err, "failed to record local transaction history");
            }
            ActionOutcome::Render(format!("{service}_submit_success"))
        }
        Err(err) => {
            tracing::warn!(error = %err, service, "submit failed at upstream");
            backend_outcome(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_amount_strips_commas_and_whitespace() {
        assert_eq!(parse_amount("1,500"), Some(1500.0));
        assert_eq!(parse_amount(" 2000 "), Some(2000.0));
    }

    #[test]
    fn parse_amount_rejects_non_positive_and_garbage() {
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn is_digits_rejects_mixed_and_empty() {
        assert!(is_digits("250788123456"));
        assert!(!is_digits("25078 812"));
        assert!(!is_digits(""));
    }

    #[test]
    fn backend_outcome_hides_auth_errors_from_the_user() {
        let err = crate::error::EngineError::Backend { status: 401, message: "token expired".to_string() };
        match backend_outcome(err) {
            ActionOutcome::Internal(_) => {}
            other => panic!("expected Internal, got {other:?}"),
        }
        let err = crate::error::EngineError::Backend { status: 403, message: "forbidden".to_string() };
        match backend_outcome(err) {
            ActionOutcome::Internal(_) => {}
            other => panic!("expected Internal, got {other:?}"),
        }
    }

    #[test]
    fn backend_outcome_surfaces_business_error_message() {
        let err = crate::error::EngineError::Backend {
            status: 400,
            message: "insufficient balance".to_string(),
        };
        match backend_outcome(err) {
            ActionOutcome::Soft(message) => assert_eq!(message, "insufficient balance"),
            other => panic!("expected Soft, got {other:?}"),
        }
    }
}
