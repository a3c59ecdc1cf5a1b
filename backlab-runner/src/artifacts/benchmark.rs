//! Benchmark series export. The `date,close` header is always written;
//! body rows are omitted only when the benchmark fetch failed.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

pub fn write(path: &Path, series: Option<&[(NaiveDate, f64)]>) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("failed to create benchmark CSV {}", path.display()))?;

    writeln!(file, "date,close")?;

    if let Some(series) = series {
        for (date, close) in series {
            writeln!(file, "{date},{close:.4}")?;
        }
    }

    Ok(())
}
