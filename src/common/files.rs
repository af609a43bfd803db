use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Create (or empty) the output file, creating its parent directory first.
pub fn truncate_output<P: AsRef<Path>>(path: P) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    File::create(path)?;
    Ok(())
}

/// Read every non-blank line of the candidate list. Lines are decoded one by
/// one; bytes that are not valid UTF-8 become U+FFFD instead of failing the
/// whole file.
pub fn read_lines<P: AsRef<Path>>(path: P) -> io::Result<Vec<String>> {
    let content = fs::read(path)?;
    Ok(content
        .split(|&b| b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim_end_matches('\r').to_string())
        .filter(|line| !line.trim().is_empty())
        .collect())
}

/// Overwrite `path` with one record per line, trailing newline included.
pub fn write_records<P: AsRef<Path>, T: Display>(path: P, records: &[T]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        writeln!(writer, "{}", record)?;
    }
    writer.flush()
}
