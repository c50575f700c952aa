use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wagerbook::error::{Rejection, ServiceError};
use wagerbook::types::MatchStatus;

use crate::fixtures::{catalog, leg, ticket, Harness};

async fn worked_example(h: Harness) {
    h.fund("alice", dec!(1000)).await;

    // Client claims stale odds; the catalog's 1.8 and 2.0 are used.
    let t = ticket(
        vec![leg("NPFL-1", "home", Some(dec!(1.95))), leg("NPFL-2", "away", Some(dec!(2.0)))],
        dec!(100),
    );
    let receipt = h.bets.place_bet("alice", t, None, h.now).await.unwrap();

    assert_eq!(receipt.total_odds, dec!(3.6));
    assert_eq!(receipt.potential_payout, dec!(360.00));
    assert_eq!(h.balance("alice").await, dec!(900));

    let bet = h.ledger.get_bet(&receipt.bet_id).await.unwrap().unwrap();
    assert_eq!(bet.user_id, "alice");
    assert_eq!(bet.stake, dec!(100));
    assert_eq!(bet.selections[0].odd, dec!(1.8));
    assert_eq!(bet.match_ids, vec!["NPFL-1".to_string(), "NPFL-2".to_string()]);
    assert_eq!(bet.winnings, Decimal::ZERO);
}

#[tokio::test]
async fn test_worked_example_memory() {
    worked_example(Harness::memory().with_catalog().await).await;
}

#[tokio::test]
async fn test_worked_example_sqlite() {
    worked_example(Harness::sqlite().await.with_catalog().await).await;
}

async fn rejections(h: Harness) {
    h.fund("bob", dec!(1000)).await;

    let cases = [
        ("NPFL-3", "match_started"),
        ("EPL-1", "match_not_open"),
        ("EPL-2", "match_started"),
        ("EPL-3", "match_not_open"),
        ("NOPE", "match_not_found"),
    ];
    for (match_id, code) in cases {
        let err = h
            .bets
            .place_bet("bob", ticket(vec![leg(match_id, "home", None)], dec!(100)), None, h.now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), code, "{match_id}");
    }

    let err = h
        .bets
        .place_bet("bob", ticket(vec![leg("NPFL-1", "home", None)], dec!(500000.01)), None, h.now)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "stake_out_of_range");

    assert_eq!(h.balance("bob").await, dec!(1000));
}

#[tokio::test]
async fn test_rejections_memory() {
    rejections(Harness::memory().with_catalog().await).await;
}

#[tokio::test]
async fn test_rejections_sqlite() {
    rejections(Harness::sqlite().await.with_catalog().await).await;
}

#[tokio::test]
async fn test_unfunded_user_provisioned_and_rejected() {
    let h = Harness::sqlite().await.with_catalog().await;
    let err = h
        .bets
        .place_bet("carol", ticket(vec![leg("NPFL-2", "draw", None)], dec!(100)), None, h.now)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Rejected(Rejection::InsufficientFunds)));

    let account = h.ledger.get_account("carol").await.unwrap().unwrap();
    assert_eq!(account.balance, Decimal::ZERO);
}

#[tokio::test]
async fn test_idempotent_replay_sqlite() {
    let h = Harness::sqlite().await.with_catalog().await;
    h.fund("dave", dec!(500)).await;

    let t = ticket(vec![leg("NPFL-1", "draw", None)], dec!(200));
    let first = h.bets.place_bet("dave", t.clone(), Some("order-77"), h.now).await.unwrap();
    let again = h.bets.place_bet("dave", t, Some("order-77"), h.now).await.unwrap();

    assert_eq!(first.bet_id, again.bet_id);
    assert!(again.replayed);
    assert_eq!(h.balance("dave").await, dec!(300));
}

#[tokio::test]
async fn test_keyed_retry_after_suspension_sqlite() {
    let h = Harness::sqlite().await.with_catalog().await;
    h.fund("dave", dec!(500)).await;

    let t = ticket(vec![leg("NPFL-1", "draw", None)], dec!(200));
    let first = h.bets.place_bet("dave", t.clone(), Some("k1"), h.now).await.unwrap();

    let mut suspended = catalog(h.now).into_iter().find(|m| m.match_id == "NPFL-1").unwrap();
    suspended.status = MatchStatus::Suspended;
    h.seeder.seed_match(suspended).await.unwrap();

    let retry = h.bets.place_bet("dave", t, Some("k1"), h.now).await.unwrap();
    assert!(retry.replayed);
    assert_eq!(retry.bet_id, first.bet_id);
    assert_eq!(retry.potential_payout, dec!(620.00));
    assert_eq!(h.balance("dave").await, dec!(300));
}

#[tokio::test]
async fn test_reused_key_for_other_ticket_sqlite() {
    let h = Harness::sqlite().await.with_catalog().await;
    h.fund("dave", dec!(1000)).await;

    let first = ticket(vec![leg("NPFL-1", "draw", None)], dec!(200));
    h.bets.place_bet("dave", first, Some("k1"), h.now).await.unwrap();

    let other = ticket(vec![leg("NPFL-2", "home", None)], dec!(500));
    let err = h.bets.place_bet("dave", other, Some("k1"), h.now).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(Rejection::IdempotencyKeyReused { .. })
    ));
    assert_eq!(h.balance("dave").await, dec!(800));
}

#[tokio::test]
async fn test_sqlite_harness_cleans_up() {
    let h = Harness::sqlite().await.with_catalog().await;
    h.fund("erin", dec!(500)).await;
    let dir = h.scratch_dir().unwrap().to_path_buf();
    assert!(dir.join("ledger.db").exists());

    drop(h);
    assert!(!dir.exists());
}
