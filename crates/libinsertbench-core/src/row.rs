//! Synthetic rows for TestTable

use md5::{Digest, Md5};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Column names in insertion order
pub const COLUMNS: [&str; 4] = ["id", "intCol", "stringCol", "textCol"];

/// How many times the digest is repeated to fill `textCol`
pub const TEXT_REPEAT: usize = 100;

/// One row of TestTable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntheticRow {
    pub id: u64,
    pub int_col: u32,
    pub string_col: String,
    pub text_col: String,
}

impl SyntheticRow {
    /// Field values as text, in [`COLUMNS`] order
    pub fn fields(&self) -> [String; 4] {
        [
            self.id.to_string(),
            self.int_col.to_string(),
            self.string_col.clone(),
            self.text_col.clone(),
        ]
    }
}

/// Produces the rows a statement or staging file carries.
///
/// `row_count` is the number of rows already written when the batch starts and
/// `row_num` the position inside the batch.
pub trait RowGenerator {
    fn row(&mut self, row_count: u64, row_num: u64) -> SyntheticRow;

    fn batch(&mut self, row_count: u64, len: usize) -> Vec<SyntheticRow> {
        (0..len as u64).map(|row_num| self.row(row_count, row_num)).collect()
    }
}

/// Hex MD5 of the decimal concatenation of `row_count` and `row_num`
pub fn row_digest(row_count: u64, row_num: u64) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("{}{}", row_count, row_num).as_bytes());
    hex::encode(hasher.finalize())
}

/// Default generator: digest-derived strings plus a random `intCol`
pub struct Md5RowGenerator {
    rng: StdRng,
}

impl Md5RowGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible `intCol` values
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for Md5RowGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RowGenerator for Md5RowGenerator {
    fn row(&mut self, row_count: u64, row_num: u64) -> SyntheticRow {
        let digest = row_digest(row_count, row_num);
        SyntheticRow {
            id: row_count + row_num,
            int_col: self.rng.gen(),
            text_col: digest.repeat(TEXT_REPEAT),
            string_col: digest,
        }
    }
}
