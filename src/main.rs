use std::process;

use title_basics_filter::{run, DigestAlgorithm, FilterConfig, Progress, RunOutcome};

fn main() {
    // Fixed invocation: paths, block size and key column are built in
    let config = FilterConfig {
        digest: Some(DigestAlgorithm::Sha256),
        progress: Progress::PerBlock,
        ..FilterConfig::default()
    };

    eprintln!(
        "filtering {} against keys from {}",
        config.input_path.display(),
        config.reference_path.display()
    );

    match run(&config) {
        Ok(RunOutcome::Written(summary)) => {
            eprintln!();
            eprintln!("rows read:    {}", summary.rows_read);
            eprintln!("rows kept:    {}", summary.rows_kept);
            eprintln!("kept rate:    {:.2}%", summary.kept_rate());
            if summary.rows_malformed > 0 {
                eprintln!(
                    "rows skipped: {} (field count did not match the header)",
                    summary.rows_malformed
                );
            }
            eprintln!("written to {}", config.output_path.display());
            if let (Some(algorithm), Some(checksum)) = (config.digest, &summary.digest) {
                eprintln!("{}: {}", algorithm.name(), checksum);
            }
            if !summary.preview.is_empty() {
                eprintln!();
                eprintln!("first rows of the filtered output:");
                for line in &summary.preview {
                    eprintln!("  {}", line);
                }
            }
        }
        Ok(RunOutcome::NoMatches(summary)) => {
            eprintln!(
                "no matching rows in the {} rows read; no output file written",
                summary.rows_read
            );
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}
