//! Interactive authoring of a daily level sheet.

use std::io::{BufRead, Write};

use common::{Importance, Level, LevelKind, LevelSet, Result};

/// Prompt for support levels, then resistance levels. An empty value line
/// (or end of input) finishes a section. Unparseable numbers are re-prompted
/// and unknown importance falls back to medium.
pub fn prompt_levels<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Vec<Level>> {
    let mut levels = Vec::new();

    writeln!(out, "\n🟢 SUPPORT LEVELS")?;
    writeln!(out, "Enter support levels (press Enter when done):")?;
    prompt_section(LevelKind::Support, input, out, &mut levels)?;

    writeln!(out, "\n🔴 RESISTANCE LEVELS")?;
    writeln!(out, "Enter resistance levels (press Enter when done):")?;
    prompt_section(LevelKind::Resistance, input, out, &mut levels)?;

    Ok(levels)
}

fn prompt_section<R: BufRead, W: Write>(
    kind: LevelKind,
    input: &mut R,
    out: &mut W,
    levels: &mut Vec<Level>,
) -> Result<()> {
    let label = match kind {
        LevelKind::Support => "Support",
        LevelKind::Resistance => "Resistance",
    };

    loop {
        let Some(raw) = ask(&format!("\n{label} level (or press Enter to finish): "), input, out)? else {
            return Ok(());
        };
        if raw.is_empty() {
            return Ok(());
        }
        let value = match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                writeln!(out, "❌ Invalid number. Please try again.")?;
                continue;
            }
        };
        let description = ask("Description: ", input, out)?.unwrap_or_default();
        let importance = ask("Importance (high/medium/low): ", input, out)?
            .and_then(|s| s.parse::<Importance>().ok())
            .unwrap_or_default();

        levels.push(Level::new(kind, value, description, importance)?);
    }
}

/// `None` at end of input.
fn ask<R: BufRead, W: Write>(prompt: &str, input: &mut R, out: &mut W) -> Result<Option<String>> {
    write!(out, "{prompt}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Plain-text summary of a loaded sheet for `levels show`.
pub fn summarize(levels: &LevelSet) -> String {
    let mut out = format!(
        "🟢 Support levels: {}\n🔴 Resistance levels: {}\n",
        levels.supports.len(),
        levels.resistances.len()
    );
    for level in levels.iter() {
        out.push_str(&format!(
            "  {} {:<10} {:>8.2}  {}\n",
            level.importance.marker(),
            level.kind,
            level.value,
            level.description
        ));
    }
    out
}

pub const FORMAT_HELP: &str = "level_type,level_value,description,importance\n\
                               support,6295,Major dip buy level,high\n\
                               resistance,6430,POLR upside target,high";
