use crate::element::Element;

#[test]
fn float_weighted_mean() {
    let samples = [(1.0_f64, 1.0), (2.0, 1.0), (6.0, 2.0)];

    // (1 + 2 + 12) / 4
    assert!((f64::weighted_mean(&samples) - 3.75).abs() < 1e-12);
}

#[test]
fn float_blend_is_moving_average() {
    let blended = 1.0_f64.blend(&2.0, 0.7);

    assert!((blended - 1.3).abs() < 1e-12);
}

#[test]
fn float_refine_rounds_to_level_decimals() {
    assert!((1.2345_f64.refine(2) - 1.23).abs() < 1e-12);
    assert!((1.2345_f64.refine(0) - 1.0).abs() < 1e-12);
}

#[test]
fn integer_hooks_round() {
    let samples = [(1_i64, 1.0), (2, 1.0)];

    assert_eq!(i64::weighted_mean(&samples), 2); // 1.5 rounds up
    assert_eq!(10_i64.blend(&20, 0.7), 13);
    assert_eq!(7_i64.refine(3), 7);
    assert!((3_i64.distance(&10) - 7.0).abs() < 1e-12);
}

#[test]
fn opaque_defaults_are_winner_takes_all() {
    let samples = [("first".to_owned(), 1.0), ("last".to_owned(), 1.0)];

    assert_eq!(String::weighted_mean(&samples), "last");
    assert_eq!("a".to_owned().blend(&"b".to_owned(), 0.7), "b");
    assert!((("a".to_owned().distance(&"a".to_owned())) - 0.0).abs() < 1e-12);
    assert!((("a".to_owned().distance(&"b".to_owned())) - 1.0).abs() < 1e-12);
}

#[test]
fn cache_keys_distinguish_values() {
    assert_ne!(1.0_f64.cache_key(), 2.0_f64.cache_key());
    assert_eq!(1.0_f64.cache_key(), 1.0_f64.cache_key());
}
