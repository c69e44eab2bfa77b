//! Word-pair file I/O.
//!
//! `.src` files hold one word per line as space-separated characters;
//! `.tgt` files hold the same with `!` tokens at morph boundaries.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use anyhow::Context;
use turtleshell_core::types::{Dataset, Segmentation};

/// Load a `.tgt` file.
pub fn load_tgt_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_lines(BufReader::new(file), Segmentation::from_tgt_line)
        .with_context(|| format!("reading {}", path.display()))
}

/// Load a `.src` file. Each word becomes a single-morph segmentation.
pub fn load_src_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_lines(BufReader::new(file), |line| {
        Segmentation::unsegmented(Segmentation::word_from_src_line(line)?)
    })
    .with_context(|| format!("reading {}", path.display()))
}

/// Load a `.tgt` file that may legitimately be absent, such as an
/// exhausted pool. A missing file yields an empty dataset.
pub fn load_optional_tgt_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Dataset> {
    match File::open(path.as_ref()) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Dataset::new()),
        _ => load_tgt_file(path),
    }
}

/// Parse `.src` content held in memory.
pub fn parse_src_str(content: &str) -> anyhow::Result<Dataset> {
    read_lines(content.as_bytes(), |line| {
        Segmentation::unsegmented(Segmentation::word_from_src_line(line)?)
    })
}

/// Write a dataset as `.tgt` content.
pub fn save_tgt_file<P: AsRef<Path>>(path: P, dataset: &Dataset) -> anyhow::Result<()> {
    let path = path.as_ref();
    std::fs::write(path, dataset.to_tgt_string())
        .with_context(|| format!("writing {}", path.display()))
}

/// Write a dataset as `.src` content.
pub fn save_src_file<P: AsRef<Path>>(path: P, dataset: &Dataset) -> anyhow::Result<()> {
    let path = path.as_ref();
    std::fs::write(path, dataset.to_src_string())
        .with_context(|| format!("writing {}", path.display()))
}

fn read_lines<R, F>(reader: R, parse: F) -> anyhow::Result<Dataset>
where
    R: BufRead,
    F: Fn(&str) -> turtleshell_core::Result<Segmentation>,
{
    let mut dataset = Dataset::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let example = parse(&line).with_context(|| format!("line {}", number + 1))?;
        dataset.push(example);
    }
    Ok(dataset)
}
