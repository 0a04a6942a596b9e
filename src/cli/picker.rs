//! Interactive CSV picker for `eis fit --pick`.
//!
//! Impedance exports usually sit somewhere below the working directory, so the
//! picker lists every `*.csv` it finds (a few levels deep) and lets the user
//! choose one by number or type a path.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// How many directory levels below `.` are searched.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Directories never worth descending into.
const SKIPPED_DIRS: [&str; 3] = [".git", "target", "node_modules"];

/// Prompt on stdin/stdout for a CSV from the current directory tree.
pub fn prompt_for_csv_path() -> Result<PathBuf, AppError> {
    let files = discover_csv_files();
    let stdin = io::stdin();
    choose_csv(&files, &mut stdin.lock(), &mut io::stdout())
}

/// Run the selection dialogue over arbitrary input/output.
///
/// Accepts a list number or an explicit path; `q` cancels. Invalid answers are
/// reported and asked again until the input ends.
fn choose_csv<R: BufRead, W: Write>(files: &[PathBuf], input: &mut R, out: &mut W) -> Result<PathBuf, AppError> {
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No .csv files found below the current directory. Pass one with `eis fit -f <file.csv>`.",
        ));
    }

    let io_err = |e: io::Error| AppError::new(2, format!("Picker I/O error: {e}"));

    writeln!(out, "Impedance spectra found ({}):", files.len()).map_err(io_err)?;
    for (idx, path) in files.iter().enumerate() {
        writeln!(out, "{:>3}) {}", idx + 1, pretty_path(path)).map_err(io_err)?;
    }

    loop {
        write!(out, "Spectrum to fit [1-{}], a path, or q: ", files.len()).map_err(io_err)?;
        out.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(AppError::new(
                2,
                "No selection made. Pass a CSV with `eis fit -f <file.csv>`.",
            ));
        }

        let answer = line.trim();
        if answer.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Canceled."));
        }
        if answer.is_empty() {
            continue;
        }

        let result = match answer.parse::<usize>() {
            Ok(n) if (1..=files.len()).contains(&n) => validate_csv_path(&files[n - 1]),
            Ok(n) => Err(AppError::new(2, format!("No entry {n}; pick 1-{}.", files.len()))),
            Err(_) => validate_csv_path(Path::new(answer)),
        };
        match result {
            Ok(path) => return Ok(path),
            Err(err) => writeln!(out, "{err}").map_err(io_err)?,
        }
    }
}

/// Check that `path` is an existing `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(2, format!("CSV file not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a CSV file, got a directory: {}", path.display()),
        ));
    }
    if !has_csv_extension(path) {
        return Err(AppError::new(
            2,
            format!("Expected a .csv file (got: {}). Use -f to pass a CSV path.", path.display()),
        ));
    }
    Ok(path.to_path_buf())
}

/// `*.csv` files below the current directory, in path order.
pub fn discover_csv_files() -> Vec<PathBuf> {
    find_csv_files(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_csv_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(root, 0, max_depth, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn walk(dir: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            if !SKIPPED_DIRS.contains(&name) {
                walk(&path, depth + 1, max_depth, out);
            }
        } else if file_type.is_file() && has_csv_extension(&path) {
            out.push(path);
        }
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn pretty_path(path: &Path) -> String {
    path.strip_prefix("./").unwrap_or(path).display().to_string()
}
