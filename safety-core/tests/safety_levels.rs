//! Behaviour tests for the banding of overall scores.

use rstest::rstest;
use safety_core::SafetyLevel;

#[rstest]
#[case(0, SafetyLevel::VeryUnsafe, "Very Unsafe", "#ef4444")]
#[case(19, SafetyLevel::VeryUnsafe, "Very Unsafe", "#ef4444")]
#[case(20, SafetyLevel::Unsafe, "Unsafe", "#f97316")]
#[case(40, SafetyLevel::Moderate, "Moderate", "#eab308")]
#[case(59, SafetyLevel::Moderate, "Moderate", "#eab308")]
#[case(60, SafetyLevel::Safe, "Safe", "#84cc16")]
#[case(79, SafetyLevel::Safe, "Safe", "#84cc16")]
#[case(80, SafetyLevel::VerySafe, "Very Safe", "#22c55e")]
#[case(100, SafetyLevel::VerySafe, "Very Safe", "#22c55e")]
fn bands_cover_the_whole_range(
    #[case] overall: u8,
    #[case] level: SafetyLevel,
    #[case] label: &str,
    #[case] color: &str,
) {
    let band = SafetyLevel::from_overall(overall);
    assert_eq!(band, level);
    assert_eq!(band.label(), label);
    assert_eq!(band.color(), color);
    assert_eq!(band.to_string(), label);
}

#[rstest]
fn bands_order_from_least_to_most_safe() {
    let mut bands: Vec<SafetyLevel> = (0..=100_u8).step_by(10).map(SafetyLevel::from_overall).collect();
    let sorted = {
        let mut copy = bands.clone();
        copy.sort();
        copy
    };
    assert_eq!(bands, sorted);
    bands.dedup();
    assert_eq!(bands.len(), 5);
}
