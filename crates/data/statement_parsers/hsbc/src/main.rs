use anyhow::{Context, Result};
use std::path::Path;
use std::{env, fs};

use hsbc_parser::{HsbcDailyCashParser, BANK_NAME};
use utils::accounts::JsonAccountDirectory;

fn main() -> Result<()> {
    // Usage:
    //   hsbc_parser daily-cash <feed.txt> <accounts.json> [snapshot_dir]
    //   hsbc_parser monthly <statement.csv> [output.json]

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("daily-cash") => daily_cash(&args[1..]),
        Some("monthly") => monthly(&args[1..]),
        _ => {
            println!("❌ Usage: hsbc_parser daily-cash <feed.txt> <accounts.json> [snapshot_dir]");
            println!("          hsbc_parser monthly <statement.csv> [output.json]");
            Ok(())
        }
    }
}

fn daily_cash(args: &[String]) -> Result<()> {
    let (Some(feed_path), Some(accounts_path)) = (args.first(), args.get(1)) else {
        println!("❌ Usage: hsbc_parser daily-cash <feed.txt> <accounts.json> [snapshot_dir]");
        return Ok(());
    };
    let snapshot_dir = args.get(2).map(String::as_str).unwrap_or("dataroom");

    println!("📖 Parsing HSBC daily cash feed: {feed_path}");
    let directory = JsonAccountDirectory::new(accounts_path);
    let result = HsbcDailyCashParser::new()
        .parse_file(Path::new(feed_path), &directory)
        .with_context(|| format!("Failed parsing {feed_path}"))?;

    println!("\n📊 Summary:");
    println!("─────────────────────────────────────────");
    println!("✓ Bank: {BANK_NAME}");
    println!("✓ Account balance records: {}", result.records.len());
    println!(
        "✓ Rows dropped: {} (malformed: {}, unmatched account: {}, incomplete join: {})",
        result.diagnostics.dropped_total(),
        result.diagnostics.malformed_records,
        result.diagnostics.unmatched_account,
        result.diagnostics.incomplete_after_join,
    );
    println!("─────────────────────────────────────────");

    if !result.records.is_empty() {
        let written =
            hsbc_parser::write_daily_cash_snapshot(&result.records, Path::new(snapshot_dir))?;
        println!("✅ Snapshot written to: {}", written.display());
    }

    Ok(())
}

fn monthly(args: &[String]) -> Result<()> {
    let Some(statement_path) = args.first() else {
        println!("❌ Usage: hsbc_parser monthly <statement.csv> [output.json]");
        return Ok(());
    };

    println!("📖 Parsing HSBC monthly statement: {statement_path}");
    let result = hsbc_parser::parse_monthly_statement(Path::new(statement_path))
        .with_context(|| format!("Failed parsing {statement_path}"))?;

    println!("\n📊 Summary:");
    println!("─────────────────────────────────────────");
    println!("✓ Monthly transactions: {}", result.records.len());
    println!(
        "✓ Rows dropped: {} (invalid date: {}, malformed: {})",
        result.diagnostics.dropped_total(),
        result.diagnostics.invalid_date,
        result.diagnostics.malformed_records,
    );
    println!("─────────────────────────────────────────");

    if let Some(output_path) = args.get(1) {
        let json = serde_json::to_string_pretty(&result.records)?;
        fs::write(output_path, json)
            .with_context(|| format!("Failed writing {output_path}"))?;
        println!("✅ Records written to: {output_path}");
    }

    Ok(())
}
