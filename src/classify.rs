//! Row classification: flat physical rows to a nested record tree.
//!
//! Classification is a pushdown matcher. Each stack frame is bound to one row
//! type and holds a cursor into that type's children, plus the records it has
//! matched so far (the last of which is the frame's open record). A physical
//! row is retried against the stack until one of the transitions consumes or
//! drops it:
//!
//! - [`Transition::Match`]: the top frame's conditions hold; the row becomes
//!   the frame's new open record and the next row is read.
//! - [`Transition::Descend`]: no match, but the frame has an open record and an
//!   untried child type; a frame for that child is pushed.
//! - [`Transition::Ascend`]: no match and no untried child below the root; the
//!   frame's records are attached to the parent's open record and it is popped.
//! - [`Transition::Drop`]: no match anywhere on the stack; the row is skipped.
//!
//! Every step either consumes a row, advances a bounded child cursor, or pops
//! a frame, so classification always terminates.

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    grammar::{Grammar, RowType},
    grid::{Sheet, Workbook},
    selector::{self, SheetSelector},
    tree::{ChildGroup, RowRecord, SheetTree, TreeDocument},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Match,
    Descend,
    Ascend,
    Drop,
}

#[derive(Debug)]
struct Frame<'g> {
    row_type: &'g RowType,
    next_child: usize,
    rows: Vec<RowRecord>,
}

impl<'g> Frame<'g> {
    fn open(grammar: &'g Grammar, name: &str, sheet: &str) -> Result<Self> {
        let row_type = grammar.get(name).ok_or_else(|| Error::UndefinedRowType {
            row_type: name.to_string(),
            sheet: sheet.to_string(),
        })?;
        Ok(Frame {
            row_type,
            next_child: 0,
            rows: Vec::new(),
        })
    }

    fn has_open_record(&self) -> bool {
        !self.rows.is_empty()
    }
}

#[derive(Debug)]
pub struct Classifier<'g> {
    grammar: &'g Grammar,
    sheet: String,
    stack: Vec<Frame<'g>>,
    rows_read: usize,
    rows_dropped: usize,
}

impl<'g> Classifier<'g> {
    pub fn new(grammar: &'g Grammar, entry_type: &str, sheet: &str) -> Result<Self> {
        let root = Frame::open(grammar, entry_type, sheet)?;
        Ok(Classifier {
            grammar,
            sheet: sheet.to_string(),
            stack: vec![root],
            rows_read: 0,
            rows_dropped: 0,
        })
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_dropped
    }

    /// Applies a single transition for `cells` without consuming further rows.
    pub fn step(&mut self, cells: &[String]) -> Result<Transition> {
        let grammar = self.grammar;
        let Some(frame) = self.stack.last_mut() else {
            return Ok(Transition::Drop);
        };
        let row_type = frame.row_type;

        if row_type.matches(cells) {
            let columns = row_type.extract(cells, &self.sheet)?;
            let index = frame.rows.len() + 1;
            frame
                .rows
                .push(RowRecord::new(row_type.name.clone(), index, columns));
            // Child cursor belongs to the open record; a new record starts over.
            frame.next_child = 0;
            return Ok(Transition::Match);
        }

        if frame.has_open_record() && frame.next_child < row_type.children.len() {
            let child_name = &row_type.children[frame.next_child];
            frame.next_child += 1;
            let child = Frame::open(grammar, child_name, &self.sheet)?;
            self.stack.push(child);
            return Ok(Transition::Descend);
        }

        if self.stack.len() > 1 {
            self.ascend();
            return Ok(Transition::Ascend);
        }

        Ok(Transition::Drop)
    }

    /// Runs transitions until the row is matched or dropped.
    pub fn feed(&mut self, cells: &[String]) -> Result<Transition> {
        self.rows_read += 1;
        loop {
            let transition = self.step(cells)?;
            trace!(
                "sheet '{}' row {}: {:?} (depth {})",
                self.sheet,
                self.rows_read,
                transition,
                self.stack.len()
            );
            match transition {
                Transition::Match => return Ok(transition),
                Transition::Drop => {
                    self.rows_dropped += 1;
                    debug!(
                        "sheet '{}' row {} matched no active row type; dropped",
                        self.sheet, self.rows_read
                    );
                    return Ok(transition);
                }
                Transition::Descend | Transition::Ascend => continue,
            }
        }
    }

    /// Unwinds the stack and returns the root frame's records.
    pub fn finish(mut self) -> Vec<RowRecord> {
        while self.stack.len() > 1 {
            self.ascend();
        }
        self.stack.pop().map(|root| root.rows).unwrap_or_default()
    }

    fn ascend(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if !frame.has_open_record() {
            return;
        }
        if let Some(parent) = self.stack.last_mut().and_then(|p| p.rows.last_mut()) {
            parent.children.push(ChildGroup {
                name: frame.row_type.name.clone(),
                rows: frame.rows,
            });
        }
    }
}

/// Classifies every row of `sheet` starting from `entry_type`.
pub fn classify(sheet: &Sheet, grammar: &Grammar, entry_type: &str) -> Result<Vec<RowRecord>> {
    let mut classifier = Classifier::new(grammar, entry_type, &sheet.name)?;
    for cells in &sheet.rows {
        classifier.feed(cells)?;
    }
    if classifier.rows_dropped() > 0 {
        debug!(
            "sheet '{}': {} of {} row(s) dropped",
            sheet.name,
            classifier.rows_dropped(),
            sheet.rows.len()
        );
    }
    Ok(classifier.finish())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedSheets {
    #[default]
    Skip,
    Fail,
}

/// Everything the read path needs: selectors naming entry row types, the
/// grammar, and the policy for sheets no selector picks.
#[derive(Debug, Clone)]
pub struct ReadPlan {
    pub selectors: Vec<SheetSelector<String>>,
    pub grammar: Grammar,
    pub unmatched: UnmatchedSheets,
}

impl ReadPlan {
    pub fn classify_sheet(&self, sheet: &Sheet) -> Result<Option<SheetTree>> {
        let Some(entry_type) = selector::select(&self.selectors, &sheet.name, sheet.position())
        else {
            return match self.unmatched {
                UnmatchedSheets::Skip => {
                    warn!("No sheet selector matched '{}'; skipping", sheet.name);
                    Ok(None)
                }
                UnmatchedSheets::Fail => Err(Error::UnmatchedSheet {
                    sheet: sheet.name.clone(),
                    position: sheet.position(),
                }),
            };
        };
        debug!("Sheet '{}' uses entry row type '{entry_type}'", sheet.name);
        let rows = classify(sheet, &self.grammar, entry_type)?;
        Ok(Some(SheetTree {
            name: sheet.name.clone(),
            index: sheet.position(),
            rows,
        }))
    }

    pub fn classify_workbook(&self, workbook: &Workbook) -> Result<TreeDocument> {
        let mut document = TreeDocument::default();
        for sheet in &workbook.sheets {
            if let Some(tree) = self.classify_sheet(sheet)? {
                info!(
                    "Sheet '{}': {} record(s) from {} row(s)",
                    tree.name,
                    tree.record_count(),
                    sheet.rows.len()
                );
                document.sheets.push(tree);
            }
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Column;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn invoice_grammar() -> Grammar {
        Grammar::from_types([
            RowType::new("header")
                .with_condition("A", "^H$")
                .unwrap()
                .with_cell("B", "number")
                .unwrap()
                .with_children(["item"]),
            RowType::new("item")
                .with_condition("A", "^I$")
                .unwrap()
                .with_cell("B", "text")
                .unwrap()
                .with_children(["sub"]),
            RowType::new("sub")
                .with_condition("A", "^S$")
                .unwrap()
                .with_cell("B", "note")
                .unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn each_transition_is_observable() {
        let grammar = invoice_grammar();
        let mut classifier = Classifier::new(&grammar, "header", "s").unwrap();

        assert_eq!(classifier.step(&row(&["H", "1"])).unwrap(), Transition::Match);
        assert_eq!(classifier.step(&row(&["I", "a"])).unwrap(), Transition::Descend);
        assert_eq!(classifier.depth(), 2);
        assert_eq!(classifier.step(&row(&["I", "a"])).unwrap(), Transition::Match);
        // item -> sub is tried, sub has no open record and no children, so it pops.
        assert_eq!(classifier.step(&row(&["X"])).unwrap(), Transition::Descend);
        assert_eq!(classifier.step(&row(&["X"])).unwrap(), Transition::Ascend);
        assert_eq!(classifier.step(&row(&["X"])).unwrap(), Transition::Ascend);
        assert_eq!(classifier.depth(), 1);
        assert_eq!(classifier.step(&row(&["X"])).unwrap(), Transition::Drop);
    }

    #[test]
    fn builds_nested_groups_with_sibling_indexes() {
        let grammar = invoice_grammar();
        let sheet = Sheet::new(
            "inv",
            0,
            vec![
                row(&["H", "1"]),
                row(&["I", "apples"]),
                row(&["S", "fresh"]),
                row(&["I", "pears"]),
                row(&["H", "2"]),
                row(&["I", "plums"]),
            ],
        );
        let records = classify(&sheet, &grammar, "header").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 1);
        assert_eq!(records[1].index, 2);

        let items = &records[0].child("item").unwrap().rows;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].index, 2);
        assert_eq!(items[1].columns, vec![Column::new("B", "text", "pears")]);
        let subs = &items[0].child("sub").unwrap().rows;
        assert_eq!(subs[0].columns, vec![Column::new("B", "note", "fresh")]);
        assert!(items[1].children.is_empty());

        // The second header gets its own item group.
        let second = &records[1].child("item").unwrap().rows;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].index, 1);
    }

    #[test]
    fn unmatched_root_rows_are_dropped() {
        let grammar = invoice_grammar();
        let sheet = Sheet::new(
            "inv",
            0,
            vec![row(&["title"]), row(&["H", "1"]), row(&["total", "9"])],
        );
        let records = classify(&sheet, &grammar, "header").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].children.is_empty());
    }

    #[test]
    fn child_types_are_tried_in_declared_order() {
        let grammar = Grammar::from_types([
            RowType::new("h")
                .with_condition("A", "^H$")
                .unwrap()
                .with_children(["a", "b"]),
            RowType::new("a").with_condition("A", "^A$").unwrap(),
            RowType::new("b").with_condition("A", "^B$").unwrap(),
        ])
        .unwrap();
        let sheet = Sheet::new("s", 0, vec![row(&["H"]), row(&["A"]), row(&["B"]), row(&["B"])]);
        let records = classify(&sheet, &grammar, "h").unwrap();
        let names = records[0]
            .children
            .iter()
            .map(|g| (g.name.as_str(), g.rows.len()))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![("a", 1), ("b", 2)]);
    }

    #[test]
    fn undefined_child_type_aborts_the_sheet() {
        let grammar = Grammar::from_types([RowType::new("h")
            .with_condition("A", "^H$")
            .unwrap()
            .with_children(["ghost"])])
        .unwrap();
        let sheet = Sheet::new("orders", 0, vec![row(&["H"]), row(&["x"])]);
        let err = classify(&sheet, &grammar, "h").unwrap_err();
        assert_eq!(
            err.to_string(),
            "no grammar definition for type 'ghost' used in sheet 'orders'"
        );
    }

    #[test]
    fn undefined_entry_type_is_reported() {
        let grammar = invoice_grammar();
        assert!(matches!(
            Classifier::new(&grammar, "missing", "s"),
            Err(Error::UndefinedRowType { .. })
        ));
    }

    #[test]
    fn unwinding_at_end_of_input_attaches_open_groups() {
        let grammar = invoice_grammar();
        let sheet = Sheet::new(
            "inv",
            0,
            vec![row(&["H", "1"]), row(&["I", "a"]), row(&["S", "b"])],
        );
        let records = classify(&sheet, &grammar, "header").unwrap();
        let item = &records[0].child("item").unwrap().rows[0];
        assert_eq!(item.child("sub").unwrap().rows.len(), 1);
    }
}
