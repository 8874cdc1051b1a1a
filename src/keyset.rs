use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use rustc_hash::FxHashSet;

use crate::error::{FilterError, Result};
use crate::filter::FilterConfig;
use crate::row::{trim_line_ending, Header};

/// Load the set of distinct join-key values from a delimited reference file
///
/// The first line must be a header naming the join-key column. Each data
/// line contributes the value of that column; duplicates collapse, blank
/// lines and missing-value tokens are skipped. Reference rows are never
/// materialized, only the key field is looked at.
///
/// `source` labels the input in error messages.
pub fn load_key_set<R: Read>(
    input: R,
    source: &str,
    config: &FilterConfig,
) -> Result<FxHashSet<String>> {
    let mut reader = BufReader::new(input);
    let mut line = String::new();

    let n = reader.read_line(&mut line)?;
    if n == 0 {
        return Err(FilterError::MissingHeader {
            file: source.to_string(),
        });
    }

    let header = Header::parse(trim_line_ending(&line), config.delimiter);
    let key_index =
        header
            .index_of(&config.key_column)
            .ok_or_else(|| FilterError::MissingKeyColumn {
                file: source.to_string(),
                column: config.key_column.clone(),
            })?;

    let mut keys = FxHashSet::default();

    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break; // EOF
        }

        let trimmed = trim_line_ending(&line);
        if trimmed.is_empty() {
            continue;
        }

        // Only the key column matters here; skip rows where it is absent
        // or holds the missing-value token.
        if let Some(key) = trimmed.split(config.delimiter).nth(key_index) {
            if key != config.missing_token {
                keys.insert(key.to_string());
            }
        }
    }

    Ok(keys)
}

/// Load the key set from a file on disk
pub fn load_key_set_from_path(path: &Path, config: &FilterConfig) -> Result<FxHashSet<String>> {
    let file = File::open(path).map_err(|e| FilterError::file(path, e))?;
    load_key_set(file, &path.display().to_string(), config)
}
