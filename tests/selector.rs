use proptest::prelude::*;
use rowtree::selector::{SheetCondition, SheetSelector, select};

proptest! {
    #[test]
    fn range_selector_matches_exactly_its_positions(
        low in 1usize..20,
        span in 0usize..10,
        position in 1usize..40,
    ) {
        let high = low + span;
        let selectors = vec![
            SheetSelector::new(vec![SheetCondition::Range { low, high }], "ranged"),
            SheetSelector::new(Vec::new(), "fallback"),
        ];
        let expected = if (low..=high).contains(&position) { "ranged" } else { "fallback" };
        prop_assert_eq!(select(&selectors, "sheet", position), Some(&expected));
    }

    #[test]
    fn conditions_are_conjunctive(name in "[a-z]{1,8}", position in 1usize..10) {
        let selector = SheetSelector::new(
            vec![
                SheetCondition::name("^a").unwrap(),
                SheetCondition::Range { low: 1, high: 5 },
            ],
            (),
        );
        prop_assert_eq!(
            selector.matches(&name, position),
            name.starts_with('a') && position <= 5
        );
    }
}
