use proptest::prelude::*;

use common::{Importance, Level, LevelSet, SignalKind};
use strategy::{LevelRules, ObservationState, SignalEngine};

fn rules() -> LevelRules {
    LevelRules {
        tolerance: 5.0,
        hysteresis: 50.0,
        context_levels: 3,
    }
}

fn level_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(5000.0f64..7000.0, 0..8)
}

fn build(supports: &[f64], resistances: &[f64]) -> LevelSet {
    LevelSet::from_levels(
        supports
            .iter()
            .enumerate()
            .map(|(i, v)| Level::support(*v, format!("S{i}"), Importance::High).unwrap())
            .chain(
                resistances
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Level::resistance(*v, format!("R{i}"), Importance::Medium).unwrap()),
            ),
    )
}

proptest! {
    /// A price never tests and breaks the same level in one pass.
    #[test]
    fn test_and_breakout_are_exclusive(
        supports in level_values(),
        resistances in level_values(),
        price in 4900.0f64..7100.0,
    ) {
        let engine = SignalEngine::new(rules(), "SPX");
        let levels = build(&supports, &resistances);
        let mut state = ObservationState::new();
        let signals = engine.evaluate(price, &levels, &mut state);

        for s in &signals {
            let conflicting = match s.kind {
                SignalKind::SupportTest => SignalKind::BreakoutDown,
                SignalKind::BreakoutDown => SignalKind::SupportTest,
                SignalKind::ResistanceTest => SignalKind::BreakoutUp,
                SignalKind::BreakoutUp => SignalKind::ResistanceTest,
            };
            prop_assert!(!signals.iter().any(|o| o.kind == conflicting && o.level == s.level));
        }
    }

    /// Re-evaluating the same price emits nothing new.
    #[test]
    fn same_price_twice_is_silent(
        supports in level_values(),
        resistances in level_values(),
        price in 4900.0f64..7100.0,
    ) {
        let engine = SignalEngine::new(rules(), "SPX");
        let levels = build(&supports, &resistances);
        let mut state = ObservationState::new();
        engine.evaluate(price, &levels, &mut state);
        prop_assert!(engine.evaluate(price, &levels, &mut state).is_empty());
    }

    /// Context is sorted by distance and capped.
    #[test]
    fn context_is_sorted_and_capped(
        supports in level_values(),
        resistances in level_values(),
        price in 4900.0f64..7100.0,
        cap in 0usize..5,
    ) {
        let engine = SignalEngine::new(LevelRules { context_levels: cap, ..rules() }, "SPX");
        let levels = build(&supports, &resistances);
        let mut state = ObservationState::new();
        for s in engine.evaluate(price, &levels, &mut state) {
            prop_assert!(s.context.len() <= cap);
            for pair in s.context.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
            for c in &s.context {
                prop_assert!((c.distance - (c.value - price).abs()).abs() < 1e-9);
            }
        }
    }

    /// Within the hysteresis range a support test never repeats.
    #[test]
    fn support_test_not_repeated_inside_hysteresis(
        level in 5500.0f64..6500.0,
        offset in -5.0f64..=5.0,
        path in prop::collection::vec(-50.0f64..=50.0, 1..20),
    ) {
        let engine = SignalEngine::new(rules(), "SPX");
        let levels = build(&[level], &[]);
        let mut state = ObservationState::new();
        let first = engine.evaluate(level + offset, &levels, &mut state);
        prop_assert_eq!(
            first.iter().filter(|s| s.kind == SignalKind::SupportTest).count(),
            1
        );
        for step in path {
            let again = engine.evaluate(level + step, &levels, &mut state);
            prop_assert!(again.iter().all(|s| s.kind != SignalKind::SupportTest));
        }
    }
}
