use crate::environment::Variable;
use crate::error::Result;
use crate::runtime::{RunOutcome, Value};
use crate::tokenizer::Token;
use log::debug;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

pub const TOKENS_FILE: &str = "tokens.jsonl";
pub const SYMBOL_TABLE_FILE: &str = "symbol_table.txt";
pub const TRANSCRIPT_FILE: &str = "transcript.txt";

/// Writes one `{"type": ..., "value": ...}` record per line.
pub fn write_tokens<W: Write>(mut writer: W, tokens: &[Token]) -> Result<()> {
    for token in tokens {
        serde_json::to_writer(&mut writer, token)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_tokens(dump: &str) -> Result<Vec<Token>> {
    dump.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Yarn(s) => format!("\"{}\"", s),
        Value::Noob => "NOOB".to_string(),
        other => other.to_string(),
    }
}

pub fn render_symbol_table(variables: &[Variable]) -> String {
    let header = ["IDENTIFIER", "TYPE", "VALUE"];
    let rows: Vec<[String; 3]> = variables
        .iter()
        .map(|v| {
            [
                v.identifier.clone(),
                v.declared_type.to_string(),
                render_value(&v.value),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: [&str; 3]| {
        format!(
            "{:<w0$} | {:<w1$} | {}",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1]
        )
        .trim_end()
        .to_string()
    };

    let mut report = format_row(header);
    report.push('\n');
    report.push_str(&"-".repeat(widths.iter().sum::<usize>() + 6));
    report.push('\n');
    for row in &rows {
        report.push_str(&format_row([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
        report.push('\n');
    }
    report
}

pub fn render_transcript(lines: &[String]) -> String {
    let mut transcript = String::from("=== BEGIN OUTPUT ===\n");
    for line in lines {
        transcript.push_str(line);
        transcript.push('\n');
    }
    transcript.push_str("=== END OUTPUT ===\n");
    transcript
}

pub fn emit_tokens(dir: &Path, tokens: &[Token]) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_tokens(BufWriter::new(File::create(dir.join(TOKENS_FILE))?), tokens)
}

pub fn emit_outcome(dir: &Path, outcome: &RunOutcome) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(
        dir.join(SYMBOL_TABLE_FILE),
        render_symbol_table(&outcome.variables),
    )?;
    fs::write(dir.join(TRANSCRIPT_FILE), render_transcript(&outcome.output))?;
    debug!("wrote run artifacts to {}", dir.display());
    Ok(())
}
