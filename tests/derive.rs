mod common;

use common::fixture_path;
use rowtree::{
    config::{DeriveConfig, ReadConfig},
    derive::DerivePlan,
    error::{Error, EvalError},
    expr::EvaluatorRegistry,
    grid::Workbook,
    tree::{CellValue, Column, TreeDocument},
};

fn classified(grammar: &str, sheet: &str) -> TreeDocument {
    let plan = ReadConfig::load(&fixture_path(grammar))
        .unwrap()
        .build()
        .unwrap();
    let workbook =
        Workbook::from_csv_paths(&[fixture_path(sheet)], None, encoding_rs::UTF_8).unwrap();
    plan.classify_workbook(&workbook).unwrap()
}

fn plan_from(yaml: &str) -> DerivePlan {
    DeriveConfig::from_yaml_str(yaml)
        .unwrap()
        .build(&EvaluatorRegistry::with_builtins())
        .unwrap()
}

#[test]
fn euro_rule_appends_fifth_column() {
    let plan = DeriveConfig::load(&fixture_path("std-rules.yml"))
        .unwrap()
        .build(&EvaluatorRegistry::with_builtins())
        .unwrap();
    let derived = plan.derive(classified("std-grammar.yml", "std.csv")).unwrap();
    let record = &derived.sheets[0].rows[0];
    assert_eq!(record.columns.len(), 5);
    assert_eq!(record.columns[4], Column::new("AA", "woeuro", "Bücher"));
}

#[test]
fn chained_rules_read_earlier_outputs_and_honour_guards() {
    let plan = DeriveConfig::load(&fixture_path("invoice-rules.yml"))
        .unwrap()
        .build(&EvaluatorRegistry::with_builtins())
        .unwrap();
    let derived = plan
        .derive(classified("invoice-grammar.yml", "invoices.csv"))
        .unwrap();
    let sheet = &derived.sheets[0];

    let items = &sheet.rows[0].child("item").unwrap().rows;
    assert_eq!(items[0].column_by_tag("sku").unwrap().value, CellValue::from("Wid"));
    assert_eq!(items[0].column_by_tag("initial").unwrap().value, CellValue::from("W"));
    assert_eq!(items[1].column_by_tag("initial").unwrap().value, CellValue::from("G"));

    let cable = &sheet.rows[1].child("item").unwrap().rows[0];
    assert_eq!(cable.column_by_tag("sku").unwrap().value, CellValue::from("Cab"));
    assert!(cable.column_by_tag("initial").is_none());

    // Headers and notes are not items.
    assert_eq!(sheet.rows[0].columns.len(), 2);
    assert_eq!(sheet.rows[0].child("note").unwrap().rows[0].columns.len(), 1);
}

#[test]
fn sheets_without_selector_pass_through_unchanged() {
    let plan = plan_from(
        r#"
sheets:
  - when: [{ name: "^other$" }]
    apply_rules: r
rules:
  - name: r
    from: [{ col: B }]
    output: { tag: x }
    expression: { kind: pattern-extract }
"#,
    );
    let input = classified("invoice-grammar.yml", "invoices.csv");
    let derived = plan.derive(input.clone()).unwrap();
    assert_eq!(derived, input);
}

#[test]
fn only_the_first_matching_selector_applies() {
    let plan = plan_from(
        r#"
sheets:
  - when: [{ low: 1 }]
    apply_rules: first
  - when: [{ name: ".*" }]
    apply_rules: second
rules:
  - name: first
    row_type: "^header$"
    from: [{ tag: number }]
    output: { tag: first }
    expression: { kind: pattern-extract }
  - name: second
    row_type: "^header$"
    from: [{ tag: number }]
    output: { tag: second }
    expression: { kind: pattern-extract }
"#,
    );
    let derived = plan
        .derive(classified("invoice-grammar.yml", "invoices.csv"))
        .unwrap();
    let header = &derived.sheets[0].rows[0];
    assert_eq!(header.column_by_tag("first").unwrap().value, CellValue::from("1001"));
    assert!(header.column_by_tag("second").is_none());
}

#[test]
fn invalid_group_aborts_with_rule_context() {
    let plan = plan_from(
        r#"
sheets:
  - apply_rules: broken
rules:
  - name: broken
    row_type: item
    from: [{ tag: text }]
    output: { tag: out }
    expression: { pattern-extract: { pattern: "(W)idget", group: 5 } }
"#,
    );
    let err = plan
        .derive(classified("invoice-grammar.yml", "invoices.csv"))
        .unwrap_err();
    match err {
        Error::Rule {
            rule,
            row_type,
            index,
            sheet,
            source,
        } => {
            assert_eq!(rule, "broken");
            assert_eq!(row_type, "item");
            assert_eq!(index, 1);
            assert_eq!(sheet, "invoices");
            assert!(matches!(source, EvalError::InvalidGroup { group: 5, available: 1, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn numeric_source_is_rejected_by_pattern_extract() {
    let plan = plan_from(
        r#"
sheets:
  - apply_rules: qty
rules:
  - name: qty
    row_type: item
    from: [{ tag: qty }]
    output: { tag: out }
    expression: { kind: pattern-extract }
"#,
    );
    let err = plan
        .derive(classified("invoice-grammar.yml", "invoices.csv"))
        .unwrap_err();
    assert!(err.to_string().contains("expected a string value but found integer"));
}
