//! Property-based tests for migration ordering.

use proptest::prelude::*;

use super::source::select_migrations;

/// Strategy for a plausible migration file name with one of a few extensions.
fn file_name() -> impl Strategy<Value = String> {
    (
        "[0-9]{1,4}",
        "[a-z_]{1,12}",
        prop_oneof![Just("sql"), Just("txt"), Just("SQL"), Just("md")],
    )
        .prop_map(|(prefix, stem, ext)| format!("{prefix}_{stem}.{ext}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Output is strictly ascending, so no file can be applied twice or out of order.
    #[test]
    fn prop_selection_strictly_ascending(names in prop::collection::vec(file_name(), 0..40)) {
        let selected = select_migrations(names, "sql");
        for pair in selected.windows(2) {
            prop_assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    /// Listing order does not change what is selected or the order it is applied in.
    #[test]
    fn prop_selection_ignores_listing_order(
        names in prop::collection::vec(file_name(), 0..40),
        seed in any::<u64>(),
    ) {
        let mut shuffled = names.clone();
        // Deterministic rotation plus reversal stands in for an arbitrary listing order.
        if !shuffled.is_empty() {
            let len = shuffled.len();
            #[allow(clippy::cast_possible_truncation)]
            shuffled.rotate_left((seed % len as u64) as usize);
        }
        if seed % 2 == 0 {
            shuffled.reverse();
        }

        prop_assert_eq!(select_migrations(names, "sql"), select_migrations(shuffled, "sql"));
    }

    /// Exactly the names with the recognized extension survive.
    #[test]
    fn prop_selection_keeps_only_extension(names in prop::collection::vec(file_name(), 0..40)) {
        let selected = select_migrations(names.clone(), "sql");
        for name in &selected {
            prop_assert!(name.ends_with(".sql"));
            prop_assert!(names.contains(name));
        }
        for name in &names {
            if name.ends_with(".sql") {
                prop_assert!(selected.contains(name));
            }
        }
    }
}
