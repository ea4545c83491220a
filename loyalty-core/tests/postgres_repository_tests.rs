// File: loyalty-core/tests/postgres_repository_tests.rs
//
// Needs a reachable Postgres (TEST_DATABASE_URL). Run with `--ignored`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use loyalty_common::models::{PointsAccount, PointsEntry, PointsEntryKind, RedemptionStatus};
use loyalty_common::traits::{PointsRepository, RedemptionRepository, RewardRepository};
use loyalty_core::Error;
use loyalty_core::RedemptionConfig;
use loyalty_core::models::Actor;
use loyalty_core::repositories::postgres::{
    PostgresAuditRepository, PostgresPointsRepository, PostgresRedemptionRepository,
    PostgresRewardRepository,
};
use loyalty_core::services::ConfirmRequest;
use loyalty_core::test_utils::helpers::*;

#[tokio::test]
#[ignore]
async fn test_points_repository_version_guard() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let repo = PostgresPointsRepository::new(db.pool().clone());

    let account = PointsAccount::new("pg-user", 500);
    repo.insert_account(&account).await?;

    let stored = repo.get_account("pg-user").await?.expect("account should exist");
    assert_eq!(stored.version, 0);

    let mut next = stored.clone();
    next.reserved = 200;
    let entry = PointsEntry {
        entry_id: Uuid::new_v4(),
        user_id: "pg-user".into(),
        kind: PointsEntryKind::Reserve,
        points: 200,
        redemption_id: Uuid::new_v4(),
        balance_after: 500,
        reserved_after: 200,
        recorded_at: Utc::now(),
    };
    assert!(repo.update_if_version(&next, &entry).await?);

    // Same stale version again: rejected, and no second entry written.
    let mut stale_entry = entry.clone();
    stale_entry.entry_id = Uuid::new_v4();
    assert!(!repo.update_if_version(&next, &stale_entry).await?);

    let stored = repo.get_account("pg-user").await?.unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.reserved, 200);
    assert_eq!(repo.list_entries("pg-user", 10).await?.len(), 1);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_reward_repository_round_trip() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let repo = PostgresRewardRepository::new(db.pool().clone());

    let mut pct = percent_off_reward("pg-pct", 100, 15, Some(50), None);
    pct.how_to_claim = vec!["Scan at till".into(), "Enjoy".into()];
    repo.upsert_reward(&pct).await?;
    repo.upsert_reward(&coupon_reward("pg-coupon", 100, 4)).await?;

    let loaded = repo.get_reward("pg-pct").await?.unwrap();
    assert_eq!(loaded.kind, pct.kind);
    assert_eq!(loaded.how_to_claim, pct.how_to_claim);

    let coupon = repo.get_reward("pg-coupon").await?.unwrap();
    assert!(repo.set_stock_if_version("pg-coupon", 3, coupon.version).await?);
    assert!(!repo.set_stock_if_version("pg-coupon", 2, coupon.version).await?);
    assert_eq!(repo.get_reward("pg-coupon").await?.unwrap().stock_available(), Some(3));

    // Non-coupon rewards never take a stock write.
    assert!(!repo.set_stock_if_version("pg-pct", 1, loaded.version).await?);

    let active = repo.list_active_rewards(Utc::now()).await?;
    assert_eq!(active.len(), 2);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_full_lifecycle_on_postgres() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let pool = db.pool().clone();

    let redemptions = Arc::new(PostgresRedemptionRepository::new(pool.clone()));
    let svc = build_service(
        Arc::new(PostgresPointsRepository::new(pool.clone())),
        Arc::new(PostgresRewardRepository::new(pool.clone())),
        redemptions.clone(),
        Arc::new(PostgresAuditRepository::new(pool.clone())),
        RedemptionConfig::default(),
    );

    svc.ledger().open_account("pg-u1", 1000).await?;
    svc.catalog()
        .upsert(&amount_off_reward("pg-amt", 300, 75, Some(100)))
        .await?;
    svc.catalog().upsert(&coupon_reward("pg-c", 200, 2)).await?;

    let r = svc.reserve("pg-u1", None, "pg-amt").await?;
    svc.scan(&r.token, "pg-shop").await?;
    svc.confirm(
        r.redemption_id,
        "pg-shop",
        ConfirmRequest {
            bill_amount: Some(400),
            applied_discount: Some(75),
            partner_transaction_id: Some("tx-1".into()),
        },
    )
    .await?;

    let c = svc.reserve("pg-u1", None, "pg-c").await?;
    svc.cancel(c.redemption_id, &Actor::User("pg-u1".into()), Some("nope".into()))
        .await?;

    let bal = svc.ledger().get_balance("pg-u1").await?;
    assert_eq!((bal.balance, bal.reserved, bal.redeemed), (700, 0, 300));

    let history = svc.partner_history("pg-shop", None, None, 10, 0).await?;
    assert_eq!(history.stats.total_redemptions, 1);
    assert_eq!(history.stats.total_discount_given, 75);

    let counted = redemptions
        .count_for_user_reward("pg-u1", "pg-c", &[RedemptionStatus::Cancelled])
        .await?;
    assert_eq!(counted, 1);

    let trail = svc.audit_trail(c.redemption_id).await?;
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].reason.as_deref(), Some("nope"));

    let overdue = redemptions
        .list_overdue(Utc::now() + Duration::days(2), 10)
        .await?;
    assert!(overdue.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_capped_insert_and_stock_keeping_upsert() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let pool = db.pool().clone();

    let rewards = Arc::new(PostgresRewardRepository::new(pool.clone()));
    let redemptions = Arc::new(PostgresRedemptionRepository::new(pool.clone()));
    let svc = build_service(
        Arc::new(PostgresPointsRepository::new(pool.clone())),
        rewards.clone(),
        redemptions.clone(),
        Arc::new(PostgresAuditRepository::new(pool.clone())),
        RedemptionConfig::default(),
    );

    svc.ledger().open_account("pg-u2", 1000).await?;
    let mut once = coupon_reward("pg-once", 100, 4);
    once.max_per_user = 1;
    svc.catalog().upsert(&once).await?;

    let r = svc.reserve("pg-u2", None, "pg-once").await?;
    let stored = redemptions.get_redemption(r.redemption_id).await?.unwrap();

    let mut second = stored.clone();
    second.redemption_id = Uuid::new_v4();
    assert!(!redemptions.insert_redemption(&second, 1).await?);
    assert!(redemptions.insert_redemption(&second, 2).await?);

    // Live stock is 3 after the reservation; editing the title keeps it.
    once.title = "Once only".into();
    svc.catalog().upsert(&once).await?;
    assert_eq!(rewards.get_reward("pg-once").await?.unwrap().stock_available(), Some(3));
    Ok(())
}
