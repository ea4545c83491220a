// File: loyalty-core/src/services/redemption_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::Error;
use crate::config::RedemptionConfig;
use crate::crypto::{IssuedToken, TokenCodec};
use crate::models::{
    Actor, AuditAction, DiscountTerms, Redemption, RedemptionAuditEntry, RedemptionStatus,
    RewardSnapshot, RewardType,
};
use crate::services::discount::{self, DiscountQuote};
use crate::services::points_ledger::PointsLedger;
use crate::services::reward_catalog::RewardCatalog;
use crate::txn::{run_optimistic, Attempt};
use loyalty_common::traits::{RedemptionAuditRepository, RedemptionRepository};


#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveReceipt {
    pub redemption_id: Uuid,
    pub reward_type: RewardType,
    pub status: RedemptionStatus,
    pub coupon_code: Option<String>,
    pub token: String,
    pub token_expires_at: DateTime<Utc>,
    pub points_deducted: i64,
    pub expires_at: DateTime<Utc>,
}

/// Type-specific fields shown to the partner after a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardDisplay {
    #[serde(rename_all = "camelCase")]
    Coupon {
        coupon_code: Option<String>,
        instructions: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    PercentOff {
        discount_percent: i64,
        max_discount_amount: Option<i64>,
        min_purchase_amount: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    AmountOff {
        discount_amount: i64,
        min_purchase_amount: Option<i64>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub redemption_id: Uuid,
    pub user_id: String,
    pub reward_id: String,
    pub reward_type: RewardType,
    pub title: String,
    pub subtitle: Option<String>,
    pub brand_name: String,
    pub status: RedemptionStatus,
    pub points_deducted: i64,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub display: RewardDisplay,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub bill_amount: Option<i64>,
    pub applied_discount: Option<i64>,
    pub partner_transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmReceipt {
    pub redemption_id: Uuid,
    pub status: RedemptionStatus,
    pub redeemed_at: DateTime<Utc>,
    pub points_committed: i64,
    pub bill_amount: Option<i64>,
    pub applied_discount: Option<i64>,
    pub final_amount: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelReceipt {
    pub redemption_id: Uuid,
    pub status: RedemptionStatus,
    pub points_released: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerStats {
    pub total_redemptions: i64,
    pub total_discount_given: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerHistory {
    pub redemptions: Vec<Redemption>,
    pub stats: PartnerStats,
}

/// Drives a redemption through RESERVED -> ACTIVE -> REDEEMED, or into
/// CANCELLED / EXPIRED, keeping the ledger and stock in step.
///
/// Each status change is a version-guarded write of the redemption record.
/// Points and stock live in other aggregates, so every multi-step operation
/// undoes its earlier steps when a later one fails.
pub struct RedemptionService {
    ledger: Arc<PointsLedger>,
    catalog: Arc<RewardCatalog>,
    redemptions: Arc<dyn RedemptionRepository + Send + Sync>,
    audit: Arc<dyn RedemptionAuditRepository + Send + Sync>,
    tokens: TokenCodec,
    config: RedemptionConfig,
}

impl RedemptionService {
    pub fn new(
        ledger: Arc<PointsLedger>,
        catalog: Arc<RewardCatalog>,
        redemptions: Arc<dyn RedemptionRepository + Send + Sync>,
        audit: Arc<dyn RedemptionAuditRepository + Send + Sync>,
        tokens: TokenCodec,
        config: RedemptionConfig,
    ) -> Self {
        Self {
            ledger,
            catalog,
            redemptions,
            audit,
            tokens,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<PointsLedger> {
        &self.ledger
    }

    pub fn catalog(&self) -> &Arc<RewardCatalog> {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Reserve
    // ------------------------------------------------------------------

    pub async fn reserve(
        &self,
        user_id: &str,
        user_org_id: Option<&str>,
        reward_id: &str,
    ) -> Result<ReserveReceipt, Error> {
        let now = Utc::now();
        let reward = self.catalog.get_reward(reward_id).await?;

        let prior = self
            .redemptions
            .count_for_user_reward(user_id, reward_id, &RedemptionStatus::CAP_STATUSES)
            .await?;
        self.catalog
            .validate_eligibility(&reward, user_id, user_org_id, prior, now)?;

        let redemption_id = Uuid::new_v4();
        let is_coupon = reward.reward_type() == RewardType::Coupon;
        let redemption = Redemption {
            redemption_id,
            user_id: user_id.to_string(),
            reward_id: reward.reward_id.clone(),
            snapshot: RewardSnapshot::of(&reward),
            points_deducted: reward.points_cost,
            status: RedemptionStatus::Reserved,
            partner_binding: reward.partner_id.clone(),
            scanned_by: None,
            coupon_code: is_coupon.then(|| coupon_code(&reward.brand_name, redemption_id)),
            reserved_at: now,
            expires_at: now + self.config.reservation_ttl,
            activated_at: None,
            redeemed_at: None,
            cancelled_at: None,
            expired_at: None,
            cancellation_reason: None,
            cancelled_by: None,
            partner_transaction_id: None,
            bill_amount: None,
            applied_discount: None,
            version: 0,
        };
        let issued = self.tokens.issue(&redemption, now)?;

        // Step 1: lock points.
        self.ledger
            .reserve(user_id, reward.points_cost, redemption_id)
            .await?;

        // Step 2: take a coupon unit.
        if is_coupon {
            if let Err(e) = self.catalog.decrement_stock(reward_id).await {
                warn!(
                    "Reserve {} for '{}': stock step failed ({}); releasing points",
                    redemption_id, user_id, e
                );
                self.undo_points_reservation(user_id, reward.points_cost, redemption_id).await;
                return Err(e);
            }
        }

        // Step 3: persist the record. The store re-checks the per-user cap
        // atomically with the insert.
        let inserted = match self
            .redemptions
            .insert_redemption(&redemption, reward.max_per_user)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::MaxLimitReached { limit: reward.max_per_user }),
            Err(e) => Err(e),
        };
        if let Err(e) = inserted {
            warn!(
                "Reserve {} for '{}': insert failed ({}); compensating",
                redemption_id, user_id, e
            );
            if is_coupon {
                if let Err(stock_err) = self.catalog.increment_stock(reward_id).await {
                    error!(
                        "Reserve {}: failed to restore stock for reward '{}': {}",
                        redemption_id, reward_id, stock_err
                    );
                }
            }
            self.undo_points_reservation(user_id, reward.points_cost, redemption_id).await;
            return Err(e);
        }

        info!(
            "Reserved redemption {} of reward '{}' for user '{}' ({} points)",
            redemption_id, reward_id, user_id, reward.points_cost
        );

        Ok(ReserveReceipt {
            redemption_id,
            reward_type: reward.reward_type(),
            status: RedemptionStatus::Reserved,
            coupon_code: redemption.coupon_code,
            token: issued.token,
            token_expires_at: issued.expires_at,
            points_deducted: reward.points_cost,
            expires_at: redemption.expires_at,
        })
    }

    async fn undo_points_reservation(&self, user_id: &str, points: i64, redemption_id: Uuid) {
        if let Err(e) = self.ledger.release(user_id, points, redemption_id).await {
            error!(
                "Failed to release {} reserved points for '{}' (redemption {}): {}",
                points, user_id, redemption_id, e
            );
        }
    }

    // ------------------------------------------------------------------
    // Scan
    // ------------------------------------------------------------------

    pub async fn scan(&self, token: &str, partner_id: &str) -> Result<ScanSummary, Error> {
        let now = Utc::now();
        let verified = self.tokens.verify_signature(token, now)?;
        let claims = &verified.claims;
        let token_expired = verified.expired;
        let aggregate = format!("redemption:{}", claims.redemption_id);

        let summary = run_optimistic(&self.config.retry, &aggregate, || async move {
            let rd = self.load(claims.redemption_id).await?;
            if rd.user_id != claims.user_id {
                return Err(Error::InvalidToken);
            }

            match rd.status {
                RedemptionStatus::Redeemed => return Err(Error::AlreadyUsed),
                RedemptionStatus::Cancelled => return Err(Error::Cancelled),
                RedemptionStatus::Expired => return Err(Error::Expired),
                RedemptionStatus::Reserved | RedemptionStatus::Active => {}
            }

            if rd.is_past_expiry(now) {
                return if self.try_expire(&rd, now).await? {
                    Err(Error::Expired)
                } else {
                    Ok(Attempt::Conflict)
                };
            }
            if token_expired {
                return Err(Error::ExpiredToken);
            }

            check_partner(&rd, partner_id)?;
            if rd.status == RedemptionStatus::Active {
                debug!("Rescan of active redemption {} by '{}'", rd.redemption_id, partner_id);
                return Ok(Attempt::Committed(summarize(&rd)));
            }

            let mut next = rd.clone();
            next.status = RedemptionStatus::Active;
            next.activated_at = Some(now);
            next.scanned_by = Some(partner_id.to_string());
            if self.redemptions.update_if_version(&next).await? {
                Ok(Attempt::Committed(summarize(&next)))
            } else {
                Ok(Attempt::Conflict)
            }
        })
        .await?;

        info!(
            "Redemption {} scanned by partner '{}' => {}",
            summary.redemption_id, partner_id, summary.status
        );
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // CalculateDiscount
    // ------------------------------------------------------------------

    /// Prices a bill against the redemption's frozen terms. Read-only.
    pub async fn calculate_discount(
        &self,
        redemption_id: Uuid,
        bill_amount: i64,
    ) -> Result<DiscountQuote, Error> {
        let rd = self.load(redemption_id).await?;
        discount::calculate(&rd.snapshot.terms, bill_amount)
    }

    // ------------------------------------------------------------------
    // Confirm
    // ------------------------------------------------------------------

    pub async fn confirm(
        &self,
        redemption_id: Uuid,
        partner_id: &str,
        request: ConfirmRequest,
    ) -> Result<ConfirmReceipt, Error> {
        let now = Utc::now();
        let aggregate = format!("redemption:{}", redemption_id);
        let request = &request;

        // Claim ACTIVE -> REDEEMED first; only the winner of the claim commits points.
        let (previous, claimed, final_amount) =
            run_optimistic(&self.config.retry, &aggregate, || async move {
                let rd = self.load(redemption_id).await?;

                if rd.status.is_open() && rd.is_past_expiry(now) {
                    return if self.try_expire(&rd, now).await? {
                        Err(Error::Expired)
                    } else {
                        Ok(Attempt::Conflict)
                    };
                }
                if rd.status != RedemptionStatus::Active {
                    return Err(Error::InvalidState {
                        expected: "active",
                        actual: rd.status,
                    });
                }
                check_partner(&rd, partner_id)?;

                let (bill_amount, applied_discount, final_amount) =
                    match rd.snapshot.terms {
                        DiscountTerms::Coupon => (None, None, None),
                        DiscountTerms::PercentOff { .. } | DiscountTerms::AmountOff { .. } => {
                            let bill = request
                                .bill_amount
                                .filter(|b| *b > 0)
                                .ok_or(Error::MissingField("billAmount"))?;
                            let applied = request
                                .applied_discount
                                .filter(|d| *d >= 0)
                                .ok_or(Error::MissingField("appliedDiscount"))?;
                            let quote = discount::calculate(&rd.snapshot.terms, bill)?;
                            if quote.applied_discount != applied {
                                return Err(Error::DiscountMismatch {
                                    expected: quote.applied_discount,
                                    submitted: applied,
                                });
                            }
                            (Some(bill), Some(applied), Some(quote.final_amount))
                        }
                    };

                let mut next = rd.clone();
                next.status = RedemptionStatus::Redeemed;
                next.redeemed_at = Some(now);
                next.scanned_by = Some(partner_id.to_string());
                next.partner_transaction_id = request.partner_transaction_id.clone();
                next.bill_amount = bill_amount;
                next.applied_discount = applied_discount;

                if self.redemptions.update_if_version(&next).await? {
                    next.version += 1;
                    Ok(Attempt::Committed((rd, next, final_amount)))
                } else {
                    Ok(Attempt::Conflict)
                }
            })
            .await?;

        if let Err(e) = self
            .ledger
            .commit(&claimed.user_id, claimed.points_deducted, redemption_id)
            .await
        {
            warn!(
                "Confirm {}: ledger commit failed ({}); reverting to {}",
                redemption_id, e, previous.status
            );
            self.revert_claim(&claimed, &previous).await;
            return Err(e);
        }

        self.record_audit(&claimed, AuditAction::Redeem, Some(partner_id)).await;
        info!(
            "Redemption {} confirmed by partner '{}' ({} points committed)",
            redemption_id, partner_id, claimed.points_deducted
        );

        Ok(ConfirmReceipt {
            redemption_id,
            status: RedemptionStatus::Redeemed,
            redeemed_at: now,
            points_committed: claimed.points_deducted,
            bill_amount: claimed.bill_amount,
            applied_discount: claimed.applied_discount,
            final_amount,
        })
    }

    // ------------------------------------------------------------------
    // Cancel
    // ------------------------------------------------------------------

    pub async fn cancel(
        &self,
        redemption_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<CancelReceipt, Error> {
        let now = Utc::now();
        let aggregate = format!("redemption:{}", redemption_id);
        let reason = &reason;

        let (previous, claimed) = run_optimistic(&self.config.retry, &aggregate, || async move {
            let rd = self.load(redemption_id).await?;

            match actor {
                Actor::User(user_id) if *user_id != rd.user_id => {
                    return Err(Error::RedemptionNotFound(redemption_id.to_string()));
                }
                Actor::User(_) => {}
                Actor::Partner(partner_id) => {
                    if rd.partner_binding.is_none() && rd.scanned_by.is_none() {
                        return Err(Error::PartnerMismatch(
                            "redemption has not been presented to this partner".to_string(),
                        ));
                    }
                    check_partner(&rd, partner_id)?;
                }
            }

            if !rd.status.is_open() {
                return Err(Error::InvalidState {
                    expected: "reserved or active",
                    actual: rd.status,
                });
            }

            let mut next = rd.clone();
            next.status = RedemptionStatus::Cancelled;
            next.cancelled_at = Some(now);
            next.cancelled_by = Some(actor.to_string());
            next.cancellation_reason = Some(reason.clone().unwrap_or_else(|| match actor {
                Actor::User(_) => "Cancelled by user".to_string(),
                Actor::Partner(_) => "Cancelled by partner".to_string(),
            }));

            if self.redemptions.update_if_version(&next).await? {
                next.version += 1;
                Ok(Attempt::Committed((rd, next)))
            } else {
                Ok(Attempt::Conflict)
            }
        })
        .await?;

        self.release_holdings(&claimed, &previous).await?;

        let partner = match actor {
            Actor::Partner(p) => Some(p.as_str()),
            Actor::User(_) => None,
        };
        self.record_audit(&claimed, AuditAction::Cancel, partner).await;
        info!(
            "Redemption {} cancelled by {} ({} points released)",
            redemption_id, actor, claimed.points_deducted
        );

        Ok(CancelReceipt {
            redemption_id,
            status: RedemptionStatus::Cancelled,
            points_released: claimed.points_deducted,
        })
    }

    // ------------------------------------------------------------------
    // Expiry
    // ------------------------------------------------------------------

    /// Expires up to `limit` open redemptions whose deadline has passed.
    /// Returns how many this call transitioned.
    pub async fn expire_due(&self, now: DateTime<Utc>, limit: i64) -> Result<usize, Error> {
        let overdue = self.redemptions.list_overdue(now, limit).await?;
        let mut expired = 0;
        for rd in overdue {
            match self.try_expire(&rd, now).await {
                Ok(true) => expired += 1,
                Ok(false) => debug!("Redemption {} changed while expiring; skipping", rd.redemption_id),
                Err(e) => warn!("Failed to expire redemption {}: {}", rd.redemption_id, e),
            }
        }
        if expired > 0 {
            info!("Expired {} overdue redemption(s)", expired);
        }
        Ok(expired)
    }

    /// Claims EXPIRED for an open, overdue record and releases what it holds.
    /// `Ok(false)` means the record changed underneath us.
    async fn try_expire(&self, rd: &Redemption, now: DateTime<Utc>) -> Result<bool, Error> {
        let mut next = rd.clone();
        next.status = RedemptionStatus::Expired;
        next.expired_at = Some(now);
        if !self.redemptions.update_if_version(&next).await? {
            return Ok(false);
        }
        next.version += 1;

        self.release_holdings(&next, rd).await?;
        self.record_audit(&next, AuditAction::Expire, None).await;
        info!(
            "Redemption {} expired ({} points released)",
            rd.redemption_id, rd.points_deducted
        );
        Ok(true)
    }

    /// Returns stock (coupon) and reserved points after a successful claim of
    /// CANCELLED or EXPIRED. On failure the earlier step and the claim are undone.
    async fn release_holdings(&self, claimed: &Redemption, previous: &Redemption) -> Result<(), Error> {
        let is_coupon = claimed.reward_type() == RewardType::Coupon;

        if is_coupon {
            if let Err(e) = self.catalog.increment_stock(&claimed.reward_id).await {
                warn!(
                    "Redemption {}: stock restore failed ({}); reverting claim",
                    claimed.redemption_id, e
                );
                self.revert_claim(claimed, previous).await;
                return Err(e);
            }
        }

        if let Err(e) = self
            .ledger
            .release(&claimed.user_id, claimed.points_deducted, claimed.redemption_id)
            .await
        {
            warn!(
                "Redemption {}: points release failed ({}); reverting",
                claimed.redemption_id, e
            );
            if is_coupon {
                if let Err(stock_err) = self.catalog.decrement_stock(&claimed.reward_id).await {
                    error!(
                        "Redemption {}: failed to re-take stock unit: {}",
                        claimed.redemption_id, stock_err
                    );
                }
            }
            self.revert_claim(claimed, previous).await;
            return Err(e);
        }
        Ok(())
    }

    /// Writes `previous` back over a claim this service made.
    async fn revert_claim(&self, claimed: &Redemption, previous: &Redemption) {
        let mut restore = previous.clone();
        restore.version = claimed.version;
        match self.redemptions.update_if_version(&restore).await {
            Ok(true) => debug!(
                "Redemption {} reverted to {}",
                claimed.redemption_id, previous.status
            ),
            Ok(false) => error!(
                "Redemption {} changed before its claim could be reverted",
                claimed.redemption_id
            ),
            Err(e) => error!(
                "Failed to revert redemption {} to {}: {}",
                claimed.redemption_id, previous.status, e
            ),
        }
    }

    async fn record_audit(&self, rd: &Redemption, action: AuditAction, partner_id: Option<&str>) {
        let entry = RedemptionAuditEntry::new(rd, action, partner_id);
        if let Err(e) = self.audit.insert_entry(&entry).await {
            error!(
                "Failed to write {} audit entry for redemption {}: {}",
                action.as_str(),
                rd.redemption_id,
                e
            );
        }
    }

    // ------------------------------------------------------------------
    // Queries and token reissue
    // ------------------------------------------------------------------

    /// Mints a fresh token for a still-reserved redemption owned by `user_id`.
    pub async fn reissue_token(&self, redemption_id: Uuid, user_id: &str) -> Result<IssuedToken, Error> {
        let now = Utc::now();
        let rd = self.get_user_redemption(user_id, redemption_id).await?;
        if rd.status == RedemptionStatus::Reserved && rd.is_past_expiry(now) {
            self.try_expire(&rd, now).await?;
            return Err(Error::Expired);
        }
        if rd.status != RedemptionStatus::Reserved {
            return Err(Error::InvalidState {
                expected: "reserved",
                actual: rd.status,
            });
        }
        self.tokens.issue(&rd, now)
    }

    pub async fn get_user_redemption(&self, user_id: &str, redemption_id: Uuid) -> Result<Redemption, Error> {
        let rd = self.load(redemption_id).await?;
        if rd.user_id != user_id {
            return Err(Error::RedemptionNotFound(redemption_id.to_string()));
        }
        Ok(rd)
    }

    pub async fn list_user_redemptions(
        &self,
        user_id: &str,
        status: Option<RedemptionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Redemption>, Error> {
        self.redemptions
            .list_for_user(user_id, status, limit, offset)
            .await
    }

    /// Redemptions a partner confirmed, newest first. Stats cover the returned page.
    pub async fn partner_history(
        &self,
        partner_id: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<PartnerHistory, Error> {
        let redemptions = self
            .redemptions
            .list_redeemed_by_partner(partner_id, since, until, limit, offset)
            .await?;
        let stats = PartnerStats {
            total_redemptions: redemptions.len() as i64,
            total_discount_given: redemptions
                .iter()
                .map(|r| r.applied_discount.unwrap_or(0))
                .sum(),
        };
        Ok(PartnerHistory { redemptions, stats })
    }

    pub async fn audit_trail(&self, redemption_id: Uuid) -> Result<Vec<RedemptionAuditEntry>, Error> {
        self.audit.list_for_redemption(redemption_id).await
    }

    async fn load(&self, redemption_id: Uuid) -> Result<Redemption, Error> {
        self.redemptions
            .get_redemption(redemption_id)
            .await?
            .ok_or_else(|| Error::RedemptionNotFound(redemption_id.to_string()))
    }
}

/// The partner acting on a redemption must match its binding and, once
/// scanned, the scanning partner.
fn check_partner(rd: &Redemption, partner_id: &str) -> Result<(), Error> {
    if let Some(bound) = rd.partner_binding.as_deref() {
        if bound != partner_id {
            return Err(Error::PartnerMismatch(
                "redemption is bound to another partner".to_string(),
            ));
        }
    }
    if let Some(scanner) = rd.scanned_by.as_deref() {
        if scanner != partner_id {
            return Err(Error::PartnerMismatch(
                "redemption was activated by another partner".to_string(),
            ));
        }
    }
    Ok(())
}

fn summarize(rd: &Redemption) -> ScanSummary {
    let display = match rd.snapshot.terms {
        DiscountTerms::Coupon => RewardDisplay::Coupon {
            coupon_code: rd.coupon_code.clone(),
            instructions: rd.snapshot.how_to_claim.clone(),
        },
        DiscountTerms::PercentOff {
            discount_percent,
            max_discount_amount,
            min_purchase_amount,
        } => RewardDisplay::PercentOff {
            discount_percent,
            max_discount_amount,
            min_purchase_amount,
        },
        DiscountTerms::AmountOff {
            discount_amount,
            min_purchase_amount,
        } => RewardDisplay::AmountOff {
            discount_amount,
            min_purchase_amount,
        },
    };

    ScanSummary {
        redemption_id: rd.redemption_id,
        user_id: rd.user_id.clone(),
        reward_id: rd.reward_id.clone(),
        reward_type: rd.reward_type(),
        title: rd.snapshot.title.clone(),
        subtitle: rd.snapshot.subtitle.clone(),
        brand_name: rd.snapshot.brand_name.clone(),
        status: rd.status,
        points_deducted: rd.points_deducted,
        activated_at: rd.activated_at,
        expires_at: rd.expires_at,
        display,
    }
}

/// `BR-XXXXXX-RRR`: brand prefix, start of the redemption id, three random chars.
pub(crate) fn coupon_code(brand_name: &str, redemption_id: Uuid) -> String {
    let mut prefix: String = brand_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(2)
        .collect::<String>()
        .to_ascii_uppercase();
    while prefix.len() < 2 {
        prefix.push('X');
    }

    let id = redemption_id.simple().to_string();
    let middle = id[..6].to_ascii_uppercase();

    let random: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(3)
        .map(char::from)
        .collect::<String>()
        .to_ascii_uppercase();

    format!("{}-{}-{}", prefix, middle, random)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_code_shape() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        let code = coupon_code("Bean & Co", id);
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "BE");
        assert_eq!(parts[1], "A1B2C3");
        assert_eq!(parts[2].len(), 3);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn coupon_code_pads_short_brand() {
        let code = coupon_code("Q", Uuid::new_v4());
        assert!(code.starts_with("QX-"));
    }
}
