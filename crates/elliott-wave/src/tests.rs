use crate::*;
use analysis_core::{BarSeries, DecimalNum};

/// Synthetic daily bars: straight legs between hand-placed pivots
/// (impulse up from bar 5 to 60, A-B-C down to bar 88).
const BTC_DAILY: &str = include_str!("../fixtures/btc_usd_pt1d.json");

fn btc_daily() -> BarSeries<f64> {
    serde_json::from_str(BTC_DAILY).unwrap()
}

/// The fixture with a deterministic wobble of up to 200 on every price.
fn noisy_btc_daily() -> BarSeries<f64> {
    let mut series = btc_daily();
    for (i, bar) in series.bars.iter_mut().enumerate() {
        let shift = 200.0 * (1.9 * i as f64).sin();
        bar.open += shift;
        bar.high += shift;
        bar.low += shift;
        bar.close += shift;
    }
    series
}

fn fixture_config() -> WaveConfig {
    WaveConfig {
        swing_detector: SwingDetectorConfig::fixed(0.05),
        fibonacci_tolerance: 0.25,
        ..Default::default()
    }
}

fn analyze_btc() -> DegreeAnalysis<f64> {
    ElliottWaveAnalyzer::new(fixture_config())
        .unwrap()
        .analyze_latest(&btc_daily(), Degree::Primary)
        .unwrap()
}

#[test]
fn test_btc_daily_ends_in_wave_c() {
    let analysis = analyze_btc();
    assert_eq!(analysis.evaluation_index, 94);
    assert_eq!(analysis.raw_swings.len(), 8);
    assert_eq!(analysis.phase.phase, Phase::CorrectiveC);
    assert!(analysis.phase.impulse_confirmed);
    assert!(analysis.phase.corrective_confirmed);
    assert_eq!(analysis.phase.impulse_swings.len(), 5);
    assert_eq!(analysis.phase.corrective_swings.len(), 3);
    assert_eq!(analysis.phase.rising(), Some(true));
}

#[test]
fn test_btc_daily_base_case() {
    let analysis = analyze_btc();
    let base = analysis.base_case().expect("base case");
    assert_eq!(base.id(), "zigzag-60-corrective_c");
    assert_eq!(base.current_phase(), Phase::CorrectiveC);
    assert_eq!(base.degree(), Degree::Primary);
    assert!(!base.is_bullish());
    assert_eq!(base.invalidation_price(), 48000.0);
    assert_eq!(base.scenario_type(), ScenarioType::CorrectiveZigzag);

    // the same three swings also pass as a flat, with a weaker B fit
    let alternatives: Vec<&str> = analysis.scenario_set.alternatives().iter().map(|s| s.id()).collect();
    assert_eq!(alternatives, vec!["flat-60-corrective_c"]);
    let flat = &analysis.scenario_set.alternatives()[0];
    assert!(flat.confidence().fibonacci < base.confidence().fibonacci);
    assert!(analysis.probability_of(base.id()) > analysis.probability_of(flat.id()));

    assert_eq!(analysis.scenario_set.consensus(), Phase::CorrectiveC);
    assert!(analysis.scenario_set.has_strong_consensus());
    assert_eq!(analysis.trend_bias.direction, TrendDirection::Bearish);
}

#[test]
fn test_default_config_on_btc_daily() {
    let analysis = ElliottWaveAnalyzer::new(WaveConfig::default())
        .unwrap()
        .analyze_latest(&btc_daily(), Degree::Primary)
        .unwrap();
    let pivots: Vec<usize> = analysis.raw_swings.iter().map(|s| s.to_index).collect();
    assert_eq!(pivots, vec![15, 22, 40, 48, 60, 68, 75, 88]);
    assert_eq!(analysis.phase.phase, Phase::CorrectiveC);

    // B at 0.6 of A is too shallow for a flat at the default tolerance
    let ids: Vec<&str> = analysis.scenario_set.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["zigzag-60-corrective_c"]);
    assert_eq!(analysis.probability_of("zigzag-60-corrective_c"), 1.0);
}

#[test]
fn test_default_config_on_noisy_series() {
    let analysis = ElliottWaveAnalyzer::new(WaveConfig::default())
        .unwrap()
        .analyze_latest(&noisy_btc_daily(), Degree::Primary)
        .unwrap();
    assert_eq!(analysis.raw_swings.len(), 8);
    assert_eq!(analysis.raw_swings[0].from_index, 5);
    assert_eq!(analysis.raw_swings[7].to_index, 88);
    assert!(analysis.phase.impulse_confirmed);
    assert_eq!(analysis.phase.phase, Phase::CorrectiveC);

    let base = analysis.base_case().expect("base case");
    assert_eq!(base.id(), "zigzag-60-corrective_c");
    assert!(!base.is_bullish());
    assert_eq!(analysis.trend_bias.direction, TrendDirection::Bearish);
}

#[test]
fn test_btc_daily_scores_are_bounded() {
    let analysis = analyze_btc();
    for s in analysis.scenario_set.iter() {
        let c = s.confidence();
        for v in [c.overall, c.fibonacci, c.time, c.alternation, c.channel, c.completeness] {
            assert!((0.0..=100.0).contains(&(v * 100.0)));
        }
        assert!(["HIGH", "MEDIUM", "LOW"].contains(&c.level().name()));
        assert!(["BULLISH", "BEARISH"].contains(&s.direction_label()));
        assert_eq!(s.swings().len(), s.scenario_type().expected_swings());
        assert!(swings_alternate(s.swings()));
    }
    let total: f64 = analysis.probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-4);
}

#[test]
fn test_btc_daily_latest_ratio() {
    let analysis = analyze_btc();
    // C (24) against B (12)
    assert_eq!(analysis.latest_ratio.ratio_type, RatioType::Extension);
    assert!((analysis.latest_ratio.value - 2.0).abs() < 1e-9);
    assert!(analysis.confluence.ratio_match);
}

#[test]
fn test_repeated_runs_are_identical() {
    let analyzer = ElliottWaveAnalyzer::new(fixture_config()).unwrap();
    let series = btc_daily();
    let first = serde_json::to_value(analyzer.analyze(&series, Degree::Primary, 80).unwrap()).unwrap();
    let second = serde_json::to_value(analyzer.analyze(&series, Degree::Primary, 80).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_phase_indicator_walks_forward() {
    let series = btc_daily();
    let config = fixture_config();
    let indicator = PhaseIndicator::new(
        &series,
        SwingDetector::new(config.swing_detector).unwrap(),
        PhaseClassifier::new(config.validator().unwrap()),
        Degree::Primary,
    );
    // wave 5 top at bar 60 is confirmed by bar 64
    assert_eq!(indicator.phase(62), Phase::Wave4);
    assert_eq!(indicator.phase(66), Phase::Wave5);
    assert!(indicator.is_impulse_confirmed(66));
    assert!(!indicator.is_corrective_confirmed(66));
    assert_eq!(indicator.impulse_swings(66).len(), 5);
    assert_eq!(indicator.corrective_swings(94).len(), 3);

    let mut memo = PhaseMemo::new();
    assert_eq!(indicator.assess_cached(94, &mut memo).phase, Phase::CorrectiveC);
    assert_eq!(indicator.assess_cached(94, &mut memo).phase, Phase::CorrectiveC);
    assert_eq!(memo.len(), 1);
}

#[test]
fn test_decimal_matches_float() {
    let float = analyze_btc();
    let decimal_series: BarSeries<DecimalNum> = btc_daily().convert();
    let decimal = ElliottWaveAnalyzer::new(fixture_config())
        .unwrap()
        .analyze_latest(&decimal_series, Degree::Primary)
        .unwrap();

    assert_eq!(decimal.phase.phase, float.phase.phase);
    assert_eq!(decimal.raw_swings.len(), float.raw_swings.len());
    let decimal_ids: Vec<&str> = decimal.scenario_set.iter().map(|s| s.id()).collect();
    let float_ids: Vec<&str> = float.scenario_set.iter().map(|s| s.id()).collect();
    assert_eq!(decimal_ids, float_ids);
    for (d, f) in decimal.scenario_set.iter().zip(float.scenario_set.iter()) {
        assert!((d.confidence_score() - f.confidence_score()).abs() < 1e-6);
    }
}

#[test]
fn test_compression_keeps_alternation() {
    let config = WaveConfig {
        compressor: SwingCompressorConfig {
            min_amplitude_pct: 0.15,
            min_bars: 0,
        },
        ..fixture_config()
    };
    let analysis = ElliottWaveAnalyzer::new(config)
        .unwrap()
        .analyze_latest(&btc_daily(), Degree::Primary)
        .unwrap();
    assert!(analysis.structural_swings.len() < analysis.raw_swings.len());
    assert!(swings_alternate(&analysis.structural_swings));
}

#[test]
fn test_single_bar_decimal_series() {
    let series: BarSeries<DecimalNum> = btc_daily().convert();
    let one = BarSeries::new("ONE", series.bars[..1].to_vec());
    let analysis = ElliottWaveAnalyzer::new(fixture_config())
        .unwrap()
        .analyze_latest(&one, Degree::Minor)
        .unwrap();
    assert_eq!(analysis.phase.phase, Phase::None);
    assert!(analysis.scenario_set.is_empty());
    assert_eq!(analysis.trend_bias, TrendBias::unknown());
}
