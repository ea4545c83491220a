// File: loyalty-core/tests/catalog_tests.rs

use std::sync::Arc;

use chrono::{Duration, Utc};

use loyalty_core::Error;
use loyalty_core::models::{RewardStatus, RewardType};
use loyalty_core::repositories::InMemoryRewardRepository;
use loyalty_core::services::RewardCatalog;
use loyalty_core::test_utils::helpers::{amount_off_reward, coupon_reward, percent_off_reward};
use loyalty_core::txn::RetryPolicy;

fn catalog() -> RewardCatalog {
    RewardCatalog::new(Arc::new(InMemoryRewardRepository::new()), RetryPolicy::default())
}

#[tokio::test]
async fn test_eligibility_checks_in_order() -> Result<(), Error> {
    let catalog = catalog();
    let now = Utc::now();

    let mut reward = coupon_reward("r1", 100, 5);
    reward.status = RewardStatus::Inactive;
    reward.valid_from = now + Duration::days(1);
    // Inactive wins over the not-yet-open window.
    let err = catalog.validate_eligibility(&reward, "u1", None, 0, now).unwrap_err();
    assert!(matches!(err, Error::RewardNotActive));

    reward.status = RewardStatus::Active;
    let err = catalog.validate_eligibility(&reward, "u1", None, 0, now).unwrap_err();
    assert!(matches!(err, Error::RewardNotYetAvailable));

    reward.valid_from = now - Duration::days(2);
    reward.valid_to = now;
    let err = catalog.validate_eligibility(&reward, "u1", None, 0, now).unwrap_err();
    assert!(matches!(err, Error::RewardExpired));

    reward.valid_to = now + Duration::days(2);
    reward.audience_org_id = Some("org-a".into());
    let err = catalog
        .validate_eligibility(&reward, "u1", Some("org-b"), 0, now)
        .unwrap_err();
    assert!(matches!(err, Error::RewardOrgRestricted));
    let err = catalog.validate_eligibility(&reward, "u1", None, 0, now).unwrap_err();
    assert!(matches!(err, Error::RewardOrgRestricted));

    reward.max_per_user = 2;
    let err = catalog
        .validate_eligibility(&reward, "u1", Some("org-a"), 2, now)
        .unwrap_err();
    assert!(matches!(err, Error::MaxLimitReached { limit: 2 }));

    catalog.validate_eligibility(&reward, "u1", Some("org-a"), 1, now)?;
    Ok(())
}

#[tokio::test]
async fn test_stock_decrements_to_zero_then_fails() -> Result<(), Error> {
    let catalog = catalog();
    catalog.upsert(&coupon_reward("c1", 100, 2)).await?;

    assert_eq!(catalog.decrement_stock("c1").await?, Some(1));
    assert_eq!(catalog.decrement_stock("c1").await?, Some(0));
    let err = catalog.decrement_stock("c1").await.unwrap_err();
    assert!(matches!(err, Error::OutOfStock(ref id) if id == "c1"));

    assert_eq!(catalog.get_reward("c1").await?.stock_available(), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_increment_is_capped_at_total() -> Result<(), Error> {
    let catalog = catalog();
    catalog.upsert(&coupon_reward("c2", 100, 3)).await?;

    catalog.decrement_stock("c2").await?;
    assert_eq!(catalog.increment_stock("c2").await?, Some(3));
    assert_eq!(catalog.increment_stock("c2").await?, Some(3));
    Ok(())
}

#[tokio::test]
async fn test_stock_ops_are_noops_without_stock() -> Result<(), Error> {
    let catalog = catalog();
    catalog
        .upsert(&percent_off_reward("p1", 100, 10, None, None))
        .await?;

    assert_eq!(catalog.decrement_stock("p1").await?, None);
    assert_eq!(catalog.increment_stock("p1").await?, None);

    let err = catalog.decrement_stock("missing").await.unwrap_err();
    assert!(matches!(err, Error::RewardNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_upsert_validates_definition() -> Result<(), Error> {
    let catalog = catalog();

    let mut bad = coupon_reward("bad", 100, 2);
    bad.points_cost = 0;
    assert!(matches!(catalog.upsert(&bad).await.unwrap_err(), Error::InvalidAmount(0)));

    let mut bad = coupon_reward("bad", 100, 2);
    if let loyalty_core::models::RewardKind::Coupon { stock_available, .. } = &mut bad.kind {
        *stock_available = 5;
    }
    assert!(matches!(catalog.upsert(&bad).await.unwrap_err(), Error::InvalidReward(_)));
    Ok(())
}

#[tokio::test]
async fn test_upsert_rejects_out_of_range_discounts() -> Result<(), Error> {
    let catalog = catalog();

    let negative = percent_off_reward("neg", 100, -10, None, None);
    assert!(matches!(catalog.upsert(&negative).await.unwrap_err(), Error::InvalidReward(_)));

    let too_big = percent_off_reward("big", 100, 120, None, None);
    assert!(matches!(catalog.upsert(&too_big).await.unwrap_err(), Error::InvalidReward(_)));

    let negative_cap = percent_off_reward("cap", 100, 10, Some(-5), None);
    assert!(matches!(catalog.upsert(&negative_cap).await.unwrap_err(), Error::InvalidReward(_)));

    let negative_flat = amount_off_reward("flat", 100, -50, None);
    assert!(matches!(catalog.upsert(&negative_flat).await.unwrap_err(), Error::InvalidReward(_)));

    assert!(catalog.get_reward("neg").await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_upsert_keeps_live_stock() -> Result<(), Error> {
    let catalog = catalog();
    catalog.upsert(&coupon_reward("c", 100, 3)).await?;
    assert_eq!(catalog.decrement_stock("c").await?, Some(2));
    assert_eq!(catalog.decrement_stock("c").await?, Some(1));

    // A title edit carrying the original counts must not refill stock.
    let mut edited = coupon_reward("c", 100, 3);
    edited.title = "Renamed".into();
    catalog.upsert(&edited).await?;
    let stored = catalog.get_reward("c").await?;
    assert_eq!(stored.title, "Renamed");
    assert_eq!(stored.stock_available(), Some(1));

    // Raising the total adds the difference.
    catalog.upsert(&coupon_reward("c", 100, 5)).await?;
    assert_eq!(catalog.get_reward("c").await?.stock_available(), Some(3));

    // Lowering it below what is held floors at zero.
    catalog.upsert(&coupon_reward("c", 100, 1)).await?;
    assert_eq!(catalog.get_reward("c").await?.stock_available(), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_list_available_filters() -> Result<(), Error> {
    let catalog = catalog();
    let now = Utc::now();

    catalog.upsert(&coupon_reward("open-coupon", 100, 5)).await?;
    catalog
        .upsert(&amount_off_reward("open-amount", 100, 50, None))
        .await?;

    let mut org_only = percent_off_reward("org-percent", 100, 10, None, None);
    org_only.audience_org_id = Some("org-a".into());
    catalog.upsert(&org_only).await?;

    let mut inactive = coupon_reward("inactive", 100, 5);
    inactive.status = RewardStatus::Inactive;
    catalog.upsert(&inactive).await?;

    let mut future = coupon_reward("future", 100, 5);
    future.valid_from = now + Duration::days(3);
    catalog.upsert(&future).await?;

    let mut ended = coupon_reward("ended", 100, 5);
    ended.valid_to = now - Duration::hours(1);
    catalog.upsert(&ended).await?;

    let mut ids: Vec<String> = catalog
        .list_available(None, None, 50, 0, now)
        .await?
        .into_iter()
        .map(|r| r.reward_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["open-amount", "open-coupon"]);

    let org = catalog.list_available(Some("org-a"), None, 50, 0, now).await?;
    assert_eq!(org.len(), 3);

    let coupons = catalog
        .list_available(Some("org-a"), Some(RewardType::Coupon), 50, 0, now)
        .await?;
    assert_eq!(coupons.len(), 1);
    assert_eq!(coupons[0].reward_id, "open-coupon");

    let paged = catalog.list_available(Some("org-a"), None, 2, 2, now).await?;
    assert_eq!(paged.len(), 1);
    Ok(())
}
