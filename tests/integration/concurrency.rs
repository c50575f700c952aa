use rust_decimal_macros::dec;

use crate::fixtures::{leg, ticket, Harness};

/// Two placements racing for a balance that covers only one of them.
async fn race_for_balance(h: Harness) {
    h.fund("eve", dec!(150)).await;

    let a = h.bets.clone();
    let b = h.bets.clone();
    let now = h.now;
    let first = tokio::spawn(async move {
        a.place_bet("eve", ticket(vec![leg("NPFL-1", "home", None)], dec!(100)), None, now)
            .await
    });
    let second = tokio::spawn(async move {
        b.place_bet("eve", ticket(vec![leg("NPFL-2", "away", None)], dec!(100)), None, now)
            .await
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);

    let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(failure.code(), "insufficient_funds");
    assert_eq!(h.balance("eve").await, dec!(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_race_for_balance_memory() {
    race_for_balance(Harness::memory().with_catalog().await).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_race_for_balance_sqlite() {
    race_for_balance(Harness::sqlite().await.with_catalog().await).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_small_bets_never_overdraw() {
    let h = Harness::sqlite().await.with_catalog().await;
    h.fund("frank", dec!(1000)).await;

    let mut handles = Vec::new();
    for _ in 0..25 {
        let svc = h.bets.clone();
        let now = h.now;
        handles.push(tokio::spawn(async move {
            svc.place_bet("frank", ticket(vec![leg("NPFL-2", "home", None)], dec!(100)), None, now)
                .await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            placed += 1;
        }
    }
    assert_eq!(placed, 10);
    assert_eq!(h.balance("frank").await, dec!(0));
}
