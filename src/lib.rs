//! title-basics-filter - Streaming membership filter for IMDB title metadata
//!
//! This library filters the IMDB `title.basics.tsv` dump, keeping only the
//! rows whose `tconst` key appears in a pre-filtered ratings file. It is
//! designed for large dumps: the ratings keys are held in a hash set while
//! the big file streams through in bounded-size blocks, so peak memory never
//! depends on the input size.
//!
//! # Key Features
//!
//! - **Block streaming**: reads the large input 100,000 rows at a time
//! - **Order preservation**: retained rows keep their original order
//! - **Fast membership**: `FxHashSet` for O(1) key lookups
//! - **Verbatim rows**: columns pass through unchanged, `\N` missing-value
//!   tokens included
//! - **Atomic output**: written to a temp file and renamed into place; no
//!   file at all when nothing matched
//! - **Output checksum**: optional SHA-256/SHA-512 digest of the written
//!   bytes
//!
//! # Examples
//!
//! Filtering in memory:
//!
//! ```
//! use title_basics_filter::{filter_titles_streaming, load_key_set, FilterConfig};
//!
//! # fn main() -> title_basics_filter::Result<()> {
//! let config = FilterConfig::default();
//!
//! let ratings = "tconst\taverageRating\ntt0000001\t5.7\n";
//! let keys = load_key_set(ratings.as_bytes(), "ratings", &config)?;
//!
//! let titles = "tconst\tprimaryTitle\n\
//!               tt0000001\tCarmencita\n\
//!               tt0099999\tUnrated\n";
//! let mut output = Vec::new();
//! let summary = filter_titles_streaming(titles.as_bytes(), &mut output, &keys, "titles", &config)?;
//!
//! assert_eq!(summary.rows_kept, 1);
//! assert_eq!(
//!     String::from_utf8(output).unwrap(),
//!     "tconst\tprimaryTitle\ntt0000001\tCarmencita\n"
//! );
//! # Ok(())
//! # }
//! ```
//!
//! Running against files on disk:
//!
//! ```no_run
//! use title_basics_filter::{run, FilterConfig, RunOutcome};
//!
//! # fn main() -> title_basics_filter::Result<()> {
//! let config = FilterConfig::default();
//! match run(&config)? {
//!     RunOutcome::Written(summary) => {
//!         println!("kept {} of {} rows", summary.rows_kept, summary.rows_read);
//!     }
//!     RunOutcome::NoMatches(summary) => {
//!         println!("no matches in {} rows", summary.rows_read);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod keyset;
pub mod row;

pub use error::{FilterError, Result};
pub use filter::{
    filter_titles_streaming, run, DigestAlgorithm, DigestWriter, FilterConfig, FilterSummary,
    Progress, RunOutcome,
};
pub use keyset::{load_key_set, load_key_set_from_path};
pub use row::{Header, Row};
