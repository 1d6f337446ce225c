use anyhow::{Context, Result};
use std::path::Path;
use std::{env, fs};

use citi_parser::CitiDailyBalanceParser;

fn main() -> Result<()> {
    // Usage:
    //   citi_parser monthly <statement.csv|statement.xls> [output.json]
    //   citi_parser daily-balance <report.csv> [output.json] [encoding]

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("monthly") => monthly(&args[1..]),
        Some("daily-balance") => daily_balance(&args[1..]),
        _ => {
            println!("❌ Usage: citi_parser monthly <statement.csv|.xls> [output.json]");
            println!("          citi_parser daily-balance <report.csv> [output.json] [encoding]");
            Ok(())
        }
    }
}

fn monthly(args: &[String]) -> Result<()> {
    let Some(statement_path) = args.first() else {
        println!("❌ Usage: citi_parser monthly <statement.csv|.xls> [output.json]");
        return Ok(());
    };

    println!("📖 Parsing Citi monthly statement: {statement_path}");
    let result = citi_parser::parse_monthly_statement(Path::new(statement_path))
        .with_context(|| format!("Failed parsing {statement_path}"))?;

    println!("\n📊 Summary:");
    println!("─────────────────────────────────────────");
    println!("✓ Monthly transactions: {}", result.records.len());
    println!(
        "✓ Blocks skipped: {}",
        result.diagnostics.malformed_records
    );
    println!("─────────────────────────────────────────");

    write_output(args.get(1), &result.records)
}

fn daily_balance(args: &[String]) -> Result<()> {
    let Some(report_path) = args.first() else {
        println!("❌ Usage: citi_parser daily-balance <report.csv> [output.json] [encoding]");
        return Ok(());
    };

    let mut parser = CitiDailyBalanceParser::new();
    if let Some(encoding) = args.get(2) {
        parser = parser.with_encoding(encoding);
    }

    println!("📖 Parsing Citi daily balance report: {report_path}");
    let result = parser
        .parse_file(Path::new(report_path))
        .with_context(|| format!("Failed parsing {report_path}"))?;

    println!("\n📊 Summary:");
    println!("─────────────────────────────────────────");
    println!("✓ Daily balance records: {}", result.records.len());
    println!(
        "✓ Records skipped: {}",
        result.diagnostics.malformed_records
    );
    println!("─────────────────────────────────────────");

    write_output(args.get(1), &result.records)
}

fn write_output<S: serde::Serialize>(path: Option<&String>, records: &[S]) -> Result<()> {
    if let Some(output_path) = path {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(output_path, json)
            .with_context(|| format!("Failed writing {output_path}"))?;
        println!("✅ Records written to: {output_path}");
    }
    Ok(())
}
