//! Loyalty API handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use validator::Validate;

use shared::error::{AppError, AppResult};
use shared::models::{CustomerBalance, CustomerSummary, EntryKind, LedgerEntry, LoyaltyStats};

use crate::api::{MerchantId, Pagination};
use crate::core::ServerState;
use crate::db::repository::ledger;
use crate::loyalty::{
    accrual, customers, redemption, AccrualOutcome, Adjustment, RedemptionReceipt, SkipReason,
};

#[derive(Debug, serde::Deserialize, Validate)]
pub struct AccruePayload {
    #[validate(length(min = 5, max = 20))]
    pub customer_phone: String,
    /// One of: purchase, referral_bonus, review_bonus, birthday_bonus
    pub kind: EntryKind,
    /// Order total; required for purchase accruals
    pub order_total: Option<Decimal>,
    /// Idempotency key: order id, referral id, review id, ...
    #[validate(length(min = 1, max = 128))]
    pub source_ref: String,
}

#[derive(Debug, serde::Deserialize, Validate)]
pub struct AdjustPayload {
    #[validate(range(min = 1))]
    pub points: i64,
    pub reason: Option<String>,
    pub reason_ar: Option<String>,
    /// Admin identity recorded in the entry's reason text
    pub actor: Option<String>,
}

impl From<AdjustPayload> for Adjustment {
    fn from(payload: AdjustPayload) -> Self {
        Self {
            points: payload.points,
            reason: payload.reason,
            reason_ar: payload.reason_ar,
            actor: payload.actor,
        }
    }
}

#[derive(Debug, serde::Deserialize, Validate)]
pub struct RedeemPayload {
    #[validate(range(min = 1))]
    pub points: i64,
}

/// How an accrual request was resolved
#[derive(Debug, serde::Serialize)]
pub struct AccrueResponse {
    /// "posted" | "already_recorded" | "skipped"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<LedgerEntry>,
}

impl From<AccrualOutcome> for AccrueResponse {
    fn from(outcome: AccrualOutcome) -> Self {
        match outcome {
            AccrualOutcome::Posted(entry) => Self {
                status: "posted",
                skip_reason: None,
                entry: Some(entry),
            },
            AccrualOutcome::AlreadyRecorded(entry) => Self {
                status: "already_recorded",
                skip_reason: None,
                entry: Some(entry),
            },
            AccrualOutcome::Skipped(reason) => Self {
                status: "skipped",
                skip_reason: Some(match reason {
                    SkipReason::ProgramDisabled => "program_disabled",
                    SkipReason::BonusDisabled => "bonus_disabled",
                    SkipReason::ZeroPoints => "zero_points",
                }),
                entry: None,
            },
        }
    }
}

/// GET /api/loyalty/customers - paged summaries, top lifetime points first
pub async fn list_customers(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<CustomerSummary>>> {
    let (limit, offset) = page.clamp(50);
    let list = customers::summaries(state.pool(), merchant_id, limit, offset).await?;
    Ok(Json(list))
}

/// GET /api/loyalty/customers/:phone - projected balance and tier
pub async fn get_customer(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Path(phone): Path<String>,
) -> AppResult<Json<CustomerBalance>> {
    let balance = customers::balance(state.pool(), merchant_id, &phone).await?;
    Ok(Json(balance))
}

/// GET /api/loyalty/customers/:phone/transactions - history, newest first
pub async fn list_transactions(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Path(phone): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    let (limit, offset) = page.clamp(50);
    let entries = customers::transactions(state.pool(), merchant_id, &phone, limit, offset).await?;
    Ok(Json(entries))
}

/// POST /api/loyalty/customers/:phone/credit - manual point credit
pub async fn credit(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Path(phone): Path<String>,
    Json(payload): Json<AdjustPayload>,
) -> AppResult<Json<LedgerEntry>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let entry =
        redemption::credit(state.pool(), &state.locks, merchant_id, &phone, payload.into())
            .await?;
    Ok(Json(entry))
}

/// POST /api/loyalty/customers/:phone/deduct - manual point deduction
pub async fn deduct(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Path(phone): Path<String>,
    Json(payload): Json<AdjustPayload>,
) -> AppResult<Json<LedgerEntry>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let entry =
        redemption::deduct(state.pool(), &state.locks, merchant_id, &phone, payload.into())
            .await?;
    Ok(Json(entry))
}

/// POST /api/loyalty/customers/:phone/redeem - convert points to value
pub async fn redeem(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Path(phone): Path<String>,
    Json(payload): Json<RedeemPayload>,
) -> AppResult<Json<RedemptionReceipt>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let receipt = redemption::redeem(
        state.pool(),
        &state.locks,
        merchant_id,
        &phone,
        payload.points,
    )
    .await?;
    Ok(Json(receipt))
}

/// POST /api/loyalty/accrue - feed a business event to the policy engine
pub async fn accrue(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Json(payload): Json<AccruePayload>,
) -> AppResult<Json<AccrueResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let outcome = match payload.kind {
        EntryKind::Purchase => {
            let order_total = payload.order_total.ok_or_else(|| {
                AppError::invalid_request("order_total is required for purchase accruals")
            })?;
            accrual::accrue_purchase(
                state.pool(),
                &state.locks,
                merchant_id,
                &payload.customer_phone,
                order_total,
                &payload.source_ref,
            )
            .await?
        }
        kind if kind.is_accrual() => {
            accrual::accrue_bonus(
                state.pool(),
                &state.locks,
                merchant_id,
                &payload.customer_phone,
                kind,
                &payload.source_ref,
            )
            .await?
        }
        other => {
            return Err(AppError::invalid_request(format!(
                "{other} cannot be accrued; use the adjustment endpoints"
            )));
        }
    };

    Ok(Json(outcome.into()))
}

/// GET /api/loyalty/stats - merchant-wide program aggregates
pub async fn stats(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
) -> AppResult<Json<LoyaltyStats>> {
    let stats = ledger::stats(state.pool(), merchant_id).await?;
    Ok(Json(stats))
}
