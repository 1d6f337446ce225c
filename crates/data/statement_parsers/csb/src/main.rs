use anyhow::{Context, Result};
use std::path::Path;
use std::{env, fs};

use csb_parser::CsbStatementParser;

fn main() -> Result<()> {
    // Usage:
    //   csb_parser <statement.xlsx> [output.json] [sheet_index]
    //
    // Prints a summary; writes the grouped records as JSON when an
    // output path is given.

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(statement_path) = args.first() else {
        println!("❌ Usage: csb_parser <statement.xlsx> [output.json] [sheet_index]");
        return Ok(());
    };
    let output_path = args.get(1);
    let sheet_index: Option<usize> = args.get(2).and_then(|s| s.parse().ok());

    let mut parser = CsbStatementParser::new();
    if let Some(idx) = sheet_index {
        parser = parser.with_sheet_index(idx);
    }

    println!("📖 Parsing CSB statement: {statement_path}");
    let result = parser
        .parse_file(Path::new(statement_path))
        .with_context(|| format!("Failed parsing {statement_path}"))?;

    println!("\n📊 Summary:");
    println!("─────────────────────────────────────────");
    println!("✓ Statement currency: {}", result.currency);
    println!("✓ Grouped security records: {}", result.records.len());
    println!(
        "✓ Rows dropped: {} (invalid date: {}, non-security: {}, missing code: {}, zero-quantity groups: {})",
        result.diagnostics.dropped_total(),
        result.diagnostics.missing_date + result.diagnostics.invalid_date,
        result.diagnostics.non_security_rows,
        result.diagnostics.missing_security_code,
        result.diagnostics.zero_quantity_groups,
    );
    println!("─────────────────────────────────────────");

    if let Some(output_path) = output_path {
        let json = serde_json::to_string_pretty(&result.records)?;
        fs::write(output_path, json)
            .with_context(|| format!("Failed writing {output_path}"))?;
        println!("✅ Records written to: {output_path}");
    }

    Ok(())
}
