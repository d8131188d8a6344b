mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use gambo_engine::bundle::StaticGameSource;
use gambo_engine::models::{BundleRequest, BundleType, Odds};
use gambo_engine::{
    BundleGenerator, BundleOutcome, EngineConfig, EngineError, PortfolioOptimizer, WeightStore,
};

use common::{asset, mismatch};

fn request(target_odds: f64, max_games: usize, min_confidence: f64) -> BundleRequest {
    BundleRequest {
        bundle_type: BundleType::Value,
        target_odds,
        min_confidence,
        max_games,
        sports: Vec::new(),
        date: None,
    }
}

fn generator(config: EngineConfig, games: Vec<gambo_engine::models::GameData>) -> BundleGenerator {
    BundleGenerator::new(
        config,
        Arc::new(WeightStore::default()),
        Arc::new(StaticGameSource::new(games)),
    )
}

#[test]
fn two_qualifying_assets_form_the_bundle() {
    let gen = generator(EngineConfig::default(), Vec::new());
    let assets = vec![
        asset("a", "Premier League", 0, 1.6, 0.70, 80.0),
        asset("b", "Serie A", 3, 1.7, 0.66, 82.0),
    ];
    let bundle = gen.build_bundle(&request(2.7, 2, 60.0), &assets, 2).unwrap();

    let ids: Vec<&str> = bundle.games.iter().map(|g| g.game_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_relative_eq!(bundle.expected_return, 2.72, epsilon = 1e-9);
    assert!((bundle.confidence - 81.0).abs() < 0.5);
    assert!(!bundle.metadata.portfolio_metrics.fallback_used);
}

#[test]
fn crowded_kickoff_slot_uses_flagged_fallback() {
    let optimizer = PortfolioOptimizer::default();
    let assets = vec![
        asset("a", "Premier League", 0, 1.5, 0.72, 75.0),
        asset("b", "Premier League", 0, 1.6, 0.70, 75.0),
        asset("c", "Premier League", 0, 1.8, 0.65, 75.0),
    ];
    assert!(matches!(
        optimizer.optimize(&assets, 3.0, 3),
        Err(EngineError::NoCombinationFound { .. })
    ));

    let gen = generator(EngineConfig::default(), Vec::new());
    let bundle = gen.build_bundle(&request(3.0, 2, 60.0), &assets, 3).unwrap();
    let metrics = &bundle.metadata.portfolio_metrics;
    assert!(metrics.fallback_used);
    assert!(metrics.correlation_risk > 0.6);
    // top expected return: c (1.17) then b (1.12)
    let ids: Vec<&str> = bundle.games.iter().map(|g| g.game_id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b"]);
    assert_relative_eq!(bundle.expected_return, 1.8 * 1.6, epsilon = 1e-12);
}

#[tokio::test]
async fn end_to_end_bundle_from_static_slate() {
    let mut config = EngineConfig::default();
    config.thresholds.min_confidence = 30.0;
    config.thresholds.max_risk = 1.0;
    let games = vec![
        mismatch("g1", "Premier League", 0, Odds::new(3.0, Some(3.4), 2.5)),
        mismatch("g2", "La Liga", 8, Odds::new(3.0, Some(3.4), 2.5)),
        mismatch("g3", "Bundesliga", 16, Odds::new(3.0, Some(3.4), 2.5)),
    ];
    let gen = generator(config, games);

    match gen.generate_or_report(&request(9.0, 2, 30.0)).await {
        BundleOutcome::Generated(bundle) => {
            assert_eq!(bundle.games.len(), 2);
            assert_eq!(bundle.expected_return, 9.0);
            assert!(bundle.confidence >= 30.0);
            assert!(bundle.games.iter().all(|g| (0.0..=0.10).contains(&g.stake)));
            assert_eq!(bundle.metadata.selection_criteria.candidates, 3);
            assert_eq!(bundle.metadata.selection_criteria.qualified, 3);
        }
        BundleOutcome::Unavailable { reason } => panic!("expected a bundle: {}", reason),
    }
}

#[tokio::test]
async fn repeated_fixture_is_bundled_once() {
    let mut config = EngineConfig::default();
    config.thresholds.min_confidence = 30.0;
    config.thresholds.max_risk = 1.0;
    let odds = Odds::new(3.0, Some(3.4), 2.5);
    let g1 = mismatch("g1", "Premier League", 0, odds.clone());

    let gen = generator(config.clone(), vec![g1.clone(), g1.clone(), g1.clone()]);
    let err = gen.generate(&request(9.0, 2, 30.0)).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientData { qualified: 1, .. }));

    let g2 = mismatch("g2", "La Liga", 8, odds);
    let gen = generator(config, vec![g1.clone(), g2, g1]);
    let bundle = gen.generate(&request(9.0, 2, 30.0)).await.unwrap();
    let ids: Vec<&str> = bundle.games.iter().map(|g| g.game_id.as_str()).collect();
    assert_eq!(ids, vec!["g1", "g2"]);
    assert_eq!(bundle.metadata.selection_criteria.qualified, 2);
    assert!(bundle.metadata.portfolio_metrics.correlation_risk <= 0.95);
}

#[tokio::test]
async fn empty_slate_reports_unavailable() {
    let gen = generator(EngineConfig::default(), Vec::new());
    match gen.generate_or_report(&request(3.0, 3, 60.0)).await {
        BundleOutcome::Unavailable { reason } => assert!(reason.contains("insufficient data")),
        BundleOutcome::Generated(_) => panic!("nothing to bundle"),
    }
}

#[tokio::test]
async fn sport_filter_excludes_everything() {
    let games = vec![
        mismatch("g1", "Premier League", 0, Odds::new(3.0, Some(3.4), 2.5)),
        mismatch("g2", "La Liga", 8, Odds::new(3.0, Some(3.4), 2.5)),
    ];
    let gen = generator(EngineConfig::default(), games);
    let mut req = request(9.0, 2, 30.0);
    req.sports = vec![gambo_engine::models::Sport::Tennis];
    let err = gen.generate(&req).await.unwrap_err();
    assert!(matches!(err, EngineError::InsufficientData { qualified: 0, .. }));
}
