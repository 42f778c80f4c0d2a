use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::{
    classify::ReadPlan,
    cli::{DeriveArgs, ReadArgs, RunArgs, SheetInputArgs, TreeOutputArgs},
    config::{DeriveConfig, ReadConfig},
    derive::DerivePlan,
    expr,
    grid::Workbook,
    io_utils,
    printable_delimiter,
    tree::TreeDocument,
};

fn load_read_plan(path: &Path) -> Result<ReadPlan> {
    let config = ReadConfig::load(path)?;
    let plan = config
        .build()
        .with_context(|| format!("Compiling grammar from {path:?}"))?;
    info!(
        "Grammar {:?}: {} row type(s), {} sheet selector(s)",
        path,
        plan.grammar.len(),
        plan.selectors.len()
    );
    Ok(plan)
}

fn load_derive_plan(path: &Path) -> Result<DerivePlan> {
    let config = DeriveConfig::load(path)?;
    let plan = config
        .build(expr::registry())
        .with_context(|| format!("Compiling derivation rules from {path:?}"))?;
    info!(
        "Rules {:?}: {} rule(s), {} sheet selector(s)",
        path,
        plan.rules.len(),
        plan.selectors.len()
    );
    Ok(plan)
}

fn load_workbook(args: &SheetInputArgs) -> Result<Workbook> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    if let Some(delimiter) = args.delimiter {
        info!(
            "Reading {} sheet(s) with delimiter '{}'",
            args.inputs.len(),
            printable_delimiter(delimiter)
        );
    }
    Workbook::from_csv_paths(&args.inputs, args.delimiter, encoding)
}

fn classify_workbook(plan: &ReadPlan, workbook: &Workbook) -> Result<TreeDocument> {
    plan.classify_workbook(workbook)
        .context("Classifying sheet rows")
}

fn write_output(args: &TreeOutputArgs, document: &TreeDocument) -> Result<()> {
    let format = io_utils::resolve_tree_format(args.output.as_deref(), args.format);
    io_utils::write_tree_document(args.output.as_deref(), document, format)?;
    match &args.output {
        Some(path) if !io_utils::is_dash(path) => info!(
            "Wrote {} sheet(s) to {:?} as {:?}",
            document.sheets.len(),
            path,
            format
        ),
        _ => info!("Wrote {} sheet(s) to stdout", document.sheets.len()),
    }
    Ok(())
}

pub fn read(args: &ReadArgs) -> Result<()> {
    let plan = load_read_plan(&args.config)?;
    let workbook = load_workbook(&args.sheets)?;
    let document = classify_workbook(&plan, &workbook)?;
    write_output(&args.output, &document)
}

pub fn derive(args: &DeriveArgs) -> Result<()> {
    let plan = load_derive_plan(&args.config)?;
    let format = io_utils::resolve_tree_format(Some(&args.input), args.input_format);
    let document = io_utils::read_tree_document(&args.input, format)
        .with_context(|| format!("Loading tree document {:?}", args.input))?;
    let derived = plan.derive(document).context("Applying derivation rules")?;
    write_output(&args.output, &derived)
}

pub fn run(args: &RunArgs) -> Result<()> {
    // Both configurations are compiled before any sheet is read.
    let read_plan = load_read_plan(&args.grammar)?;
    let derive_plan = load_derive_plan(&args.rules)?;
    let workbook = load_workbook(&args.sheets)?;
    let document = classify_workbook(&read_plan, &workbook)?;
    let derived = derive_plan
        .derive(document)
        .context("Applying derivation rules")?;
    write_output(&args.output, &derived)
}
