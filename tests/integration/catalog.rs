use wagerbook::catalog::MatchFilter;
use wagerbook::types::MatchStatus;

use crate::fixtures::Harness;

async fn listed_ids(h: &Harness, filter: MatchFilter) -> Vec<String> {
    h.catalog
        .list_bettable_matches(&filter, h.now)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.match_id)
        .collect()
}

async fn check_listing(h: Harness) {
    // Kicked-off NPFL-3 is still indexed as upcoming but must not appear.
    let upcoming = listed_ids(
        &h,
        MatchFilter {
            status: Some(MatchStatus::Upcoming),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(upcoming, vec!["NPFL-1"]);

    let npfl = listed_ids(
        &h,
        MatchFilter {
            sport: Some("football".into()),
            league: Some("NPFL".into()),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(npfl, vec!["NPFL-1", "NPFL-2"]);

    let epl = listed_ids(
        &h,
        MatchFilter {
            sport: Some("football".into()),
            league: Some("EPL".into()),
            ..Default::default()
        },
    )
    .await;
    assert!(epl.is_empty());

    let everything = listed_ids(&h, MatchFilter::default()).await;
    assert_eq!(everything, vec!["NPFL-1", "NPFL-2"]);
}

#[tokio::test]
async fn test_listing_memory() {
    check_listing(Harness::memory().with_catalog().await).await;
}

#[tokio::test]
async fn test_listing_sqlite() {
    check_listing(Harness::sqlite().await.with_catalog().await).await;
}

#[tokio::test]
async fn test_listing_hides_scores() {
    let h = Harness::sqlite().await.with_catalog().await;
    let out = h
        .catalog
        .list_bettable_matches(&MatchFilter::default(), h.now)
        .await
        .unwrap();
    assert!(out.iter().all(|m| m.home_score.is_none() && m.away_score.is_none()));
}
