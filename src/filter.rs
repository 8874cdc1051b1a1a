use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{FilterError, Result};
use crate::keyset::load_key_set_from_path;
use crate::row::{trim_line_ending, Header, Row};

/// Reference dataset holding the keys to keep
pub const DEFAULT_REFERENCE_PATH: &str = "rating_filtered.csv";
/// Large dataset to be filtered
pub const DEFAULT_INPUT_PATH: &str = "title.basics.tsv";
/// Filtered output
pub const DEFAULT_OUTPUT_PATH: &str = "title_basics_filtered_v2.tsv";
/// Join-key column present in both datasets
pub const DEFAULT_KEY_COLUMN: &str = "tconst";
/// Token marking an absent field in the IMDB dumps
pub const DEFAULT_MISSING_TOKEN: &str = "\\N";
/// Rows read per block; bounds peak memory
pub const DEFAULT_BLOCK_SIZE: usize = 100_000;

/// Retained rows kept in the summary for the output preview
const PREVIEW_ROWS: usize = 5;

/// Progress reporting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No console output from the run
    Silent,
    /// Running totals on stderr after each block
    PerBlock,
}

/// Supported digest algorithms for output checksum computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-256 checksum
    Sha256,
    /// SHA-512 checksum
    Sha512,
}

impl DigestAlgorithm {
    /// Lowercase algorithm name for display
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

/// Internal enum for holding active digest state
enum DigestState {
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Writer wrapper that computes a digest of data as it is written
///
/// Enables streaming checksum computation of the filtered output with zero
/// buffering. Only bytes actually accepted by the inner writer are hashed.
pub struct DigestWriter<'a, W: Write> {
    inner: &'a mut W,
    state: DigestState,
}

impl<'a, W: Write> DigestWriter<'a, W> {
    /// Create a new DigestWriter with the specified algorithm
    pub fn new(inner: &'a mut W, algorithm: DigestAlgorithm) -> Self {
        let state = match algorithm {
            DigestAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => DigestState::Sha512(Sha512::new()),
        };
        DigestWriter { inner, state }
    }

    /// Finalize the digest and return the hex-encoded checksum
    pub fn finalize(self) -> String {
        match self.state {
            DigestState::Sha256(hasher) => hex::encode(hasher.finalize()),
            DigestState::Sha512(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

impl<'a, W: Write> Write for DigestWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        match &mut self.state {
            DigestState::Sha256(hasher) => hasher.update(&buf[..n]),
            DigestState::Sha512(hasher) => hasher.update(&buf[..n]),
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Immutable configuration for one filter run
///
/// Defaults carry the conventional file names and constants for the IMDB
/// `title.basics` dumps: tab delimiter, `\N` missing-value token, `tconst`
/// join key, 100,000-row blocks. Library callers override fields as needed;
/// the binary uses the defaults.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Reference dataset supplying the join-key values to keep
    pub reference_path: PathBuf,
    /// Large dataset to filter
    pub input_path: PathBuf,
    /// Destination for the filtered rows
    pub output_path: PathBuf,
    /// Name of the join-key column in both datasets
    pub key_column: String,
    /// Field delimiter
    pub delimiter: char,
    /// Token denoting an absent field value
    pub missing_token: String,
    /// Rows read per block
    pub block_size: usize,
    /// Checksum the output while writing it
    pub digest: Option<DigestAlgorithm>,
    /// Console progress mode
    pub progress: Progress,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            reference_path: PathBuf::from(DEFAULT_REFERENCE_PATH),
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            delimiter: '\t',
            missing_token: DEFAULT_MISSING_TOKEN.to_string(),
            block_size: DEFAULT_BLOCK_SIZE,
            digest: None,
            progress: Progress::Silent,
        }
    }
}

/// Accounting for one filter run
#[derive(Debug, Clone, Default)]
pub struct FilterSummary {
    /// Data rows read from the input
    pub rows_read: u64,
    /// Rows whose join key was in the key set
    pub rows_kept: u64,
    /// Rows skipped because their field count did not match the header
    pub rows_malformed: u64,
    /// Hex checksum of the output bytes, when a digest was configured
    pub digest: Option<String>,
    /// First few retained rows, encoded as output lines
    pub preview: Vec<String>,
}

impl FilterSummary {
    /// Kept rows as a percentage of rows read
    pub fn kept_rate(&self) -> f64 {
        if self.rows_read == 0 {
            0.0
        } else {
            self.rows_kept as f64 / self.rows_read as f64 * 100.0
        }
    }
}

/// Outcome of a completed run
#[derive(Debug)]
pub enum RunOutcome {
    /// At least one row matched; the output file was written
    Written(FilterSummary),
    /// No row matched; no output file was produced
    NoMatches(FilterSummary),
}

impl RunOutcome {
    /// The run's accounting, regardless of outcome
    pub fn summary(&self) -> &FilterSummary {
        match self {
            RunOutcome::Written(summary) | RunOutcome::NoMatches(summary) => summary,
        }
    }
}

/// Stream the candidate dataset and write rows whose join key is in `keys`
///
/// This function:
/// - Reads the header line and resolves the join-key column
/// - Writes the header through unchanged
/// - Reads the input in blocks of `config.block_size` rows
/// - Writes each block's matching rows immediately, in input order
/// - Skips (and counts) rows whose field count does not match the header
/// - Optionally computes a checksum of everything written
///
/// `source` labels the input in error messages. Retained rows keep their
/// columns byte-for-byte, including missing-value tokens.
pub fn filter_titles_streaming<R: Read, W: Write>(
    input: R,
    output: &mut W,
    keys: &FxHashSet<String>,
    source: &str,
    config: &FilterConfig,
) -> Result<FilterSummary> {
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

    // Branch once on the digest setting so the block loop is not re-checked per row
    match config.digest {
        Some(algorithm) => {
            let mut digest_writer = DigestWriter::new(output, algorithm);
            let mut summary = process_blocks(
                &mut reader,
                &mut digest_writer,
                &header,
                key_index,
                keys,
                config,
            )?;
            summary.digest = Some(digest_writer.finalize());
            Ok(summary)
        }
        None => process_blocks(&mut reader, output, &header, key_index, keys, config),
    }
}

/// Read, filter and write blocks until EOF
fn process_blocks<R: Read, W: Write>(
    reader: &mut BufReader<R>,
    output: &mut W,
    header: &Header,
    key_index: usize,
    keys: &FxHashSet<String>,
    config: &FilterConfig,
) -> Result<FilterSummary> {
    header.write_to(output, config.delimiter)?;

    let mut summary = FilterSummary::default();

    loop {
        let block = read_block(reader, config)?;
        if block.is_empty() {
            break; // EOF
        }

        filter_block(&block, output, header, key_index, keys, config, &mut summary)?;

        if config.progress == Progress::PerBlock {
            eprintln!(
                "processed {} rows, kept {}",
                summary.rows_read, summary.rows_kept
            );
        }

        if block.len() < config.block_size {
            break; // short block, EOF reached
        }
    }

    Ok(summary)
}

/// Read up to `config.block_size` data rows
///
/// Blocks always align to line boundaries; blank lines are not rows and are
/// skipped without being counted.
fn read_block<R: Read>(reader: &mut BufReader<R>, config: &FilterConfig) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut line = String::new();

    while rows.len() < config.block_size {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break; // EOF
        }

        let trimmed = trim_line_ending(&line);
        if trimmed.is_empty() {
            continue;
        }

        rows.push(Row::parse(trimmed, config.delimiter, &config.missing_token));
    }

    Ok(rows)
}

/// Test one block's rows for key membership and write the matches
fn filter_block<W: Write>(
    block: &[Row],
    output: &mut W,
    header: &Header,
    key_index: usize,
    keys: &FxHashSet<String>,
    config: &FilterConfig,
    summary: &mut FilterSummary,
) -> Result<()> {
    for row in block {
        summary.rows_read += 1;

        if row.len() != header.len() {
            summary.rows_malformed += 1;
            continue;
        }

        // A missing key can never match; the key set holds only real values
        let keep = row
            .field(key_index)
            .map_or(false, |key| keys.contains(key));

        if keep {
            row.write_to(output, config.delimiter, &config.missing_token)?;
            summary.rows_kept += 1;
            if summary.preview.len() < PREVIEW_ROWS {
                summary
                    .preview
                    .push(row.to_line(config.delimiter, &config.missing_token));
            }
        }
    }

    Ok(())
}

/// Run the whole filter against the configured paths
///
/// Checks that both inputs exist, loads the key set, streams the candidate
/// dataset into a temporary file next to the output path, then either
/// renames it onto the output path (at least one match) or removes it (no
/// matches). On any failure the temporary file is removed so no partial
/// output is left behind.
pub fn run(config: &FilterConfig) -> Result<RunOutcome> {
    let missing: Vec<PathBuf> = [&config.reference_path, &config.input_path]
        .iter()
        .filter(|path| !path.exists())
        .map(|path| path.to_path_buf())
        .collect();
    if !missing.is_empty() {
        return Err(FilterError::MissingInputs { files: missing });
    }

    if config.progress == Progress::PerBlock {
        eprintln!("loading keys from {}", config.reference_path.display());
    }
    let keys = load_key_set_from_path(&config.reference_path, config)?;
    if config.progress == Progress::PerBlock {
        eprintln!("loaded {} distinct {} values", keys.len(), config.key_column);
        eprintln!("filtering {}", config.input_path.display());
    }

    let input =
        File::open(&config.input_path).map_err(|e| FilterError::file(&config.input_path, e))?;

    let tmp_path = tmp_output_path(&config.output_path);
    let tmp = File::create(&tmp_path).map_err(|e| FilterError::file(&tmp_path, e))?;
    let mut writer = BufWriter::new(tmp);

    let source = config.input_path.display().to_string();
    let summary = match filter_titles_streaming(input, &mut writer, &keys, &source, config) {
        Ok(summary) => summary,
        Err(e) => {
            drop(writer);
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
    };

    if let Err(e) = writer.flush() {
        drop(writer);
        let _ = fs::remove_file(&tmp_path);
        return Err(FilterError::file(&tmp_path, e));
    }
    drop(writer);

    if summary.rows_kept == 0 {
        fs::remove_file(&tmp_path).map_err(|e| FilterError::file(&tmp_path, e))?;
        return Ok(RunOutcome::NoMatches(summary));
    }

    if let Err(e) = fs::rename(&tmp_path, &config.output_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(FilterError::file(&config.output_path, e));
    }

    Ok(RunOutcome::Written(summary))
}

/// Temporary sibling of the output path, renamed into place on success
fn tmp_output_path(output: &Path) -> PathBuf {
    let mut tmp = output.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_set(names: &[&str]) -> FxHashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn config() -> FilterConfig {
        FilterConfig::default()
    }

    const CANDIDATES: &str = "tconst\tprimaryTitle\n\
                              A\tfirst\n\
                              C\tsecond\n\
                              B\tthird\n\
                              D\tfourth\n\
                              A\tfifth\n";

    #[test]
    fn test_scenario_keeps_matches_in_order() {
        let keys = key_set(&["A", "B"]);

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(CANDIDATES.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();

        assert_eq!(summary.rows_read, 5);
        assert_eq!(summary.rows_kept, 3);
        assert_eq!(summary.rows_malformed, 0);
        assert!((summary.kept_rate() - 60.0).abs() < 1e-9);

        let result = String::from_utf8(output).unwrap();
        assert_eq!(
            result,
            "tconst\tprimaryTitle\nA\tfirst\nB\tthird\nA\tfifth\n"
        );
    }

    #[test]
    fn test_match_is_case_and_whitespace_sensitive() {
        let input = "tconst\tprimaryTitle\n\
                     tt0000001\texact\n\
                     TT0000001\tupper\n\
                     tt0000001 \tpadded\n";
        let keys = key_set(&["tt0000001"]);

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(input.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();

        assert_eq!(summary.rows_kept, 1);
        let result = String::from_utf8(output).unwrap();
        assert!(result.contains("exact"));
        assert!(!result.contains("upper"));
        assert!(!result.contains("padded"));
    }

    #[test]
    fn test_missing_token_round_trips() {
        let input = "tconst\tstartYear\tendYear\n\
                     tt0000001\t1894\t\\N\n\
                     tt0000002\t\\N\t\\N\n";
        let keys = key_set(&["tt0000001", "tt0000002"]);

        let mut output = Vec::new();
        filter_titles_streaming(input.as_bytes(), &mut output, &keys, "titles", &config()).unwrap();

        let result = String::from_utf8(output).unwrap();
        assert!(result.contains("tt0000001\t1894\t\\N\n"));
        assert!(result.contains("tt0000002\t\\N\t\\N\n"));
    }

    #[test]
    fn test_missing_key_never_matches() {
        let input = "tconst\tprimaryTitle\n\\N\tghost\ntt0000001\treal\n";
        let keys = key_set(&["tt0000001", "\\N"]);

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(input.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();

        assert_eq!(summary.rows_read, 2);
        assert_eq!(summary.rows_kept, 1);
        assert!(!String::from_utf8(output).unwrap().contains("ghost"));
    }

    #[test]
    fn test_malformed_rows_are_skipped_and_counted() {
        let input = "tconst\tprimaryTitle\tstartYear\n\
                     tt0000001\tfirst\t1894\n\
                     tt0000002\tshort-row\n\
                     tt0000003\ttoo\twide\trow\n\
                     tt0000004\tlast\t1900\n";
        let keys = key_set(&["tt0000001", "tt0000002", "tt0000003", "tt0000004"]);

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(input.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();

        assert_eq!(summary.rows_read, 4);
        assert_eq!(summary.rows_kept, 2);
        assert_eq!(summary.rows_malformed, 2);
        // Accounting: every row read is kept, rejected, or counted malformed
        assert_eq!(
            summary.rows_read,
            summary.rows_kept + summary.rows_malformed
        );

        let result = String::from_utf8(output).unwrap();
        assert!(result.contains("first"));
        assert!(result.contains("last"));
        assert!(!result.contains("short-row"));
    }

    #[test]
    fn test_block_size_does_not_change_output() {
        let keys = key_set(&["A", "B"]);

        let mut expected = Vec::new();
        let base = filter_titles_streaming(
            CANDIDATES.as_bytes(),
            &mut expected,
            &keys,
            "titles",
            &config(),
        )
        .unwrap();

        for block_size in [1, 2, 3, 5, 100] {
            let cfg = FilterConfig {
                block_size,
                ..config()
            };
            let mut output = Vec::new();
            let summary =
                filter_titles_streaming(CANDIDATES.as_bytes(), &mut output, &keys, "titles", &cfg)
                    .unwrap();

            assert_eq!(output, expected, "block_size {}", block_size);
            assert_eq!(summary.rows_read, base.rows_read);
            assert_eq!(summary.rows_kept, base.rows_kept);
        }
    }

    #[test]
    fn test_empty_key_set_keeps_nothing() {
        let keys = FxHashSet::default();

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(CANDIDATES.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();

        assert_eq!(summary.rows_read, 5);
        assert_eq!(summary.rows_kept, 0);
        assert_eq!(String::from_utf8(output).unwrap(), "tconst\tprimaryTitle\n");
    }

    #[test]
    fn test_header_only_input() {
        let keys = key_set(&["A"]);

        let mut output = Vec::new();
        let summary = filter_titles_streaming(
            "tconst\tprimaryTitle\n".as_bytes(),
            &mut output,
            &keys,
            "titles",
            &config(),
        )
        .unwrap();

        assert_eq!(summary.rows_read, 0);
        assert_eq!(summary.rows_kept, 0);
        assert_eq!(summary.kept_rate(), 0.0);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let keys = key_set(&["A"]);

        let mut output = Vec::new();
        let err = filter_titles_streaming("".as_bytes(), &mut output, &keys, "titles", &config())
            .unwrap_err();
        assert!(matches!(err, FilterError::MissingHeader { .. }));
    }

    #[test]
    fn test_input_without_key_column_is_an_error() {
        let keys = key_set(&["A"]);

        let mut output = Vec::new();
        let err = filter_titles_streaming(
            "primaryTitle\tstartYear\nfirst\t1894\n".as_bytes(),
            &mut output,
            &keys,
            "titles",
            &config(),
        )
        .unwrap_err();
        assert!(matches!(err, FilterError::MissingKeyColumn { .. }));
    }

    #[test]
    fn test_last_line_without_newline() {
        let input = "tconst\tprimaryTitle\nA\tfirst\nB\tlast";
        let keys = key_set(&["A", "B"]);

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(input.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();

        assert_eq!(summary.rows_kept, 2);
        // Output is normalized to one row per line
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "tconst\tprimaryTitle\nA\tfirst\nB\tlast\n"
        );
    }

    #[test]
    fn test_digest_is_stable_and_hex() {
        let keys = key_set(&["A", "B"]);
        let cfg = FilterConfig {
            digest: Some(DigestAlgorithm::Sha256),
            ..config()
        };

        let mut output1 = Vec::new();
        let summary1 =
            filter_titles_streaming(CANDIDATES.as_bytes(), &mut output1, &keys, "titles", &cfg)
                .unwrap();
        let mut output2 = Vec::new();
        let summary2 =
            filter_titles_streaming(CANDIDATES.as_bytes(), &mut output2, &keys, "titles", &cfg)
                .unwrap();

        let digest1 = summary1.digest.unwrap();
        assert_eq!(digest1.len(), 64);
        assert!(digest1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(Some(digest1), summary2.digest);
        assert_eq!(output1, output2);
    }

    #[test]
    fn test_digest_covers_exactly_the_output_bytes() {
        let keys = key_set(&["A"]);
        let cfg = FilterConfig {
            digest: Some(DigestAlgorithm::Sha256),
            ..config()
        };

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(CANDIDATES.as_bytes(), &mut output, &keys, "titles", &cfg)
                .unwrap();

        let expected = hex::encode(Sha256::digest(&output));
        assert_eq!(summary.digest.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_digest_sha512_length() {
        let keys = key_set(&["A"]);
        let cfg = FilterConfig {
            digest: Some(DigestAlgorithm::Sha512),
            ..config()
        };

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(CANDIDATES.as_bytes(), &mut output, &keys, "titles", &cfg)
                .unwrap();

        assert_eq!(summary.digest.unwrap().len(), 128);
    }

    #[test]
    fn test_no_digest_by_default() {
        let keys = key_set(&["A"]);

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(CANDIDATES.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();
        assert!(summary.digest.is_none());
    }

    #[test]
    fn test_preview_holds_first_kept_rows() {
        let keys = key_set(&["A", "B"]);

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(CANDIDATES.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();

        assert_eq!(summary.preview, vec!["A\tfirst", "B\tthird", "A\tfifth"]);
    }

    #[test]
    fn test_preview_is_capped() {
        let mut input = String::from("tconst\tprimaryTitle\n");
        for i in 0..20 {
            input.push_str(&format!("tt{:07}\ttitle {}\n", i, i));
        }
        let keys: FxHashSet<String> = (0..20).map(|i| format!("tt{:07}", i)).collect();

        let mut output = Vec::new();
        let summary =
            filter_titles_streaming(input.as_bytes(), &mut output, &keys, "titles", &config())
                .unwrap();

        assert_eq!(summary.rows_kept, 20);
        assert_eq!(summary.preview.len(), 5);
    }
}
