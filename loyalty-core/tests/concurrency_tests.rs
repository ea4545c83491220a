// File: loyalty-core/tests/concurrency_tests.rs

use std::time::Duration;

use loyalty_core::config::BalanceRule;
use loyalty_core::models::RedemptionStatus;
use loyalty_core::services::ConfirmRequest;
use loyalty_core::test_utils::helpers::*;
use loyalty_core::txn::RetryPolicy;
use loyalty_core::{Error, RedemptionConfig};

fn contended_config() -> RedemptionConfig {
    RedemptionConfig {
        retry: RetryPolicy {
            max_attempts: 50,
            base_backoff: Duration::from_millis(1),
        },
        ..RedemptionConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_goes_to_exactly_one_user() -> Result<(), Error> {
    let eng = in_memory_engine(RedemptionConfig::default());
    eng.ledger().open_account("u1", 1000).await?;
    eng.ledger().open_account("u2", 1000).await?;
    eng.catalog().upsert(&coupon_reward("last", 100, 1)).await?;

    let s1 = eng.service.clone();
    let s2 = eng.service.clone();
    let h1 = tokio::spawn(async move { s1.reserve("u1", None, "last").await });
    let h2 = tokio::spawn(async move { s2.reserve("u2", None, "last").await });
    let results = vec![h1.await.unwrap(), h2.await.unwrap()];

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(loser, Error::OutOfStock(_)));

    assert_eq!(eng.stock_of("last").await?, Some(0));
    let reserved: i64 = eng.ledger().get_balance("u1").await?.reserved
        + eng.ledger().get_balance("u2").await?.reserved;
    assert_eq!(reserved, 100);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stock_never_oversells_under_contention() -> Result<(), Error> {
    let eng = in_memory_engine(contended_config());
    eng.catalog().upsert(&coupon_reward("hot", 10, 3)).await?;

    let mut handles = Vec::new();
    for i in 0..8 {
        let user = format!("user-{}", i);
        eng.ledger().open_account(&user, 100).await?;
        let svc = eng.service.clone();
        handles.push(tokio::spawn(async move { svc.reserve(&user, None, "hot").await }));
    }

    let mut ok = 0;
    let mut out_of_stock = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(Error::OutOfStock(_)) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(out_of_stock, 5);
    assert_eq!(eng.stock_of("hot").await?, Some(0));

    let mut total_reserved = 0;
    for i in 0..8 {
        total_reserved += eng.ledger().get_balance(&format!("user-{}", i)).await?.reserved;
    }
    assert_eq!(total_reserved, 30);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_user_cannot_exceed_per_user_cap() -> Result<(), Error> {
    let eng = in_memory_engine(contended_config());
    eng.ledger().open_account("u1", 10_000).await?;

    for round in 0..20 {
        let reward_id = format!("cap-{}", round);
        let mut reward = percent_off_reward(&reward_id, 10, 10, None, None);
        reward.max_per_user = 1;
        eng.catalog().upsert(&reward).await?;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = eng.service.clone();
            let id = reward_id.clone();
            handles.push(tokio::spawn(async move { svc.reserve("u1", None, &id).await }));
        }

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(Error::MaxLimitReached { limit: 1 }) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(ok, 1, "round {}: cap of one exceeded", round);
    }

    let balance = eng.ledger().get_balance("u1").await?;
    assert_eq!(balance.reserved, 20 * 10);
    let held = eng.service.list_user_redemptions("u1", None, 100, 0).await?;
    assert_eq!(held.len(), 20);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reserves_cannot_overdraw_balance() -> Result<(), Error> {
    let eng = in_memory_engine(contended_config());
    assert_eq!(RedemptionConfig::default().balance_rule, BalanceRule::Available);
    eng.ledger().open_account("u1", 1000).await?;
    eng.catalog()
        .upsert(&amount_off_reward("a", 600, 50, None))
        .await?;
    eng.catalog()
        .upsert(&percent_off_reward("b", 600, 10, None, None))
        .await?;

    let s1 = eng.service.clone();
    let s2 = eng.service.clone();
    let h1 = tokio::spawn(async move { s1.reserve("u1", None, "a").await });
    let h2 = tokio::spawn(async move { s2.reserve("u1", None, "b").await });
    let results = vec![h1.await.unwrap(), h2.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::InsufficientBalance { .. }))));

    let bal = eng.ledger().get_balance("u1").await?;
    assert_eq!((bal.balance, bal.reserved), (1000, 600));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_confirms_commit_once() -> Result<(), Error> {
    let eng = in_memory_engine(contended_config());
    eng.ledger().open_account("u1", 1000).await?;
    eng.catalog().upsert(&coupon_reward("c", 250, 5)).await?;

    let receipt = eng.service.reserve("u1", None, "c").await?;
    eng.service.scan(&receipt.token, "shop").await?;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let svc = eng.service.clone();
        let id = receipt.redemption_id;
        handles.push(tokio::spawn(async move {
            svc.confirm(id, "shop", ConfirmRequest::default()).await
        }));
    }

    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(r) => {
                assert_eq!(r.status, RedemptionStatus::Redeemed);
                ok += 1;
            }
            Err(Error::InvalidState { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(ok, 1);

    let bal = eng.ledger().get_balance("u1").await?;
    assert_eq!((bal.balance, bal.reserved, bal.redeemed), (750, 0, 250));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_confirm_settles_one_way() -> Result<(), Error> {
    let eng = in_memory_engine(contended_config());
    eng.ledger().open_account("u1", 1000).await?;
    eng.catalog().upsert(&coupon_reward("c", 200, 5)).await?;

    let receipt = eng.service.reserve("u1", None, "c").await?;
    eng.service.scan(&receipt.token, "shop").await?;

    let id = receipt.redemption_id;
    let s1 = eng.service.clone();
    let s2 = eng.service.clone();
    let confirm = tokio::spawn(async move {
        s1.confirm(id, "shop", ConfirmRequest::default()).await.is_ok()
    });
    let cancel = tokio::spawn(async move {
        s2.cancel(id, &loyalty_core::models::Actor::User("u1".into()), None)
            .await
            .is_ok()
    });
    let confirmed = confirm.await.unwrap();
    let cancelled = cancel.await.unwrap();
    assert!(confirmed ^ cancelled);

    let bal = eng.ledger().get_balance("u1").await?;
    assert_eq!(bal.reserved, 0);
    if confirmed {
        assert_eq!((bal.balance, bal.redeemed), (800, 200));
        assert_eq!(eng.stock_of("c").await?, Some(4));
    } else {
        assert_eq!((bal.balance, bal.redeemed), (1000, 0));
        assert_eq!(eng.stock_of("c").await?, Some(5));
    }
    Ok(())
}

#[tokio::test]
async fn test_raw_rule_permits_over_reservation() -> Result<(), Error> {
    let eng = in_memory_engine(RedemptionConfig {
        balance_rule: BalanceRule::Raw,
        ..RedemptionConfig::default()
    });
    eng.ledger().open_account("u1", 1000).await?;
    eng.catalog()
        .upsert(&amount_off_reward("a", 600, 50, None))
        .await?;

    eng.service.reserve("u1", None, "a").await?;
    eng.service.reserve("u1", None, "a").await?;
    assert_eq!(eng.ledger().get_balance("u1").await?.reserved, 1200);
    Ok(())
}
