use regex::Regex;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum SheetCondition {
    /// Regular expression tested against the sheet name.
    Name(Regex),
    /// Inclusive range over the 1-based sheet position.
    Range { low: usize, high: usize },
}

impl SheetCondition {
    pub fn name(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(SheetCondition::Name)
            .map_err(|err| Error::pattern(pattern, "sheet selector", err))
    }

    pub fn test(&self, name: &str, position: usize) -> bool {
        match self {
            SheetCondition::Name(pattern) => pattern.is_match(name),
            SheetCondition::Range { low, high } => *low <= position && position <= *high,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SheetSelector<T> {
    pub conditions: Vec<SheetCondition>,
    pub target: T,
}

impl<T> SheetSelector<T> {
    pub fn new(conditions: Vec<SheetCondition>, target: T) -> Self {
        SheetSelector { conditions, target }
    }

    /// All conditions must hold; an empty list matches every sheet.
    pub fn matches(&self, name: &str, position: usize) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.test(name, position))
    }
}

/// Target of the first selector whose conditions all hold.
pub fn select<'a, T>(
    selectors: &'a [SheetSelector<T>],
    name: &str,
    position: usize,
) -> Option<&'a T> {
    selectors
        .iter()
        .find(|selector| selector.matches(name, position))
        .map(|selector| &selector.target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_selector_wins() {
        let selectors = vec![
            SheetSelector::new(vec![SheetCondition::name("^inv").unwrap()], "first"),
            SheetSelector::new(vec![SheetCondition::name(".*").unwrap()], "second"),
        ];
        assert_eq!(select(&selectors, "invoices", 1), Some(&"first"));
        assert_eq!(select(&selectors, "orders", 1), Some(&"second"));
    }

    #[test]
    fn range_is_inclusive_on_one_based_positions() {
        let condition = SheetCondition::Range { low: 1, high: 2 };
        assert!(condition.test("any", 1));
        assert!(condition.test("any", 2));
        assert!(!condition.test("any", 3));
        assert!(!condition.test("any", 0));
    }

    #[test]
    fn conditions_are_combined_with_and() {
        let selector = SheetSelector::new(
            vec![
                SheetCondition::name("^data").unwrap(),
                SheetCondition::Range { low: 2, high: 2 },
            ],
            (),
        );
        assert!(selector.matches("data_q1", 2));
        assert!(!selector.matches("data_q1", 1));
        assert!(!selector.matches("summary", 2));
    }

    #[test]
    fn empty_condition_list_matches_everything() {
        let selectors = vec![SheetSelector::new(Vec::new(), 7)];
        assert_eq!(select(&selectors, "whatever", 99), Some(&7));
    }

    #[test]
    fn no_match_yields_none() {
        let selectors = vec![SheetSelector::new(vec![SheetCondition::Range { low: 3, high: 4 }], 1)];
        assert_eq!(select(&selectors, "s", 1), None);
    }

    #[test]
    fn invalid_name_pattern_is_reported() {
        let err = SheetCondition::name("(").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
