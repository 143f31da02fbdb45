use std::path::PathBuf;

use clap::Parser;

pub mod engine;
pub mod input;

/// Default number of reducers for hash-partitioned stages.
pub const DEFAULT_REDUCERS: u32 = 11;

/// Default size of one input split, in bytes.
pub const DEFAULT_SPLIT_SIZE: u64 = 32 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(version, about = "Groups words into anagram classes, largest class first", long_about = None)]
pub struct Args {
    /// Input file, directory, or glob spec. One word per line.
    pub input: String,

    /// Output directory. Must not exist yet.
    pub output: PathBuf,

    /// Number of reducers for the grouping stage
    #[arg(long, default_value_t = DEFAULT_REDUCERS, value_parser = clap::value_parser!(u32).range(1..))]
    pub reducers: u32,

    /// Maximum size of one input split in bytes
    #[arg(long, default_value_t = DEFAULT_SPLIT_SIZE, value_parser = clap::value_parser!(u64).range(1..))]
    pub split_size: u64,

    /// Skip the per-split combiner
    #[arg(long)]
    pub no_combine: bool,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub input: String,
    pub output: PathBuf,
    pub n_reduce: u32,
    pub split_size: u64,
    pub combine: bool,
}

impl Job {
    /// A job with default tuning for the given input and output.
    pub fn new(input: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Job {
            input: input.into(),
            output: output.into(),
            n_reduce: DEFAULT_REDUCERS,
            split_size: DEFAULT_SPLIT_SIZE,
            combine: true,
        }
    }
}

impl From<Args> for Job {
    fn from(args: Args) -> Self {
        Job {
            input: args.input,
            output: args.output,
            n_reduce: args.reducers,
            split_size: args.split_size,
            combine: !args.no_combine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_input_and_output() {
        let args = Args::try_parse_from(["anagram-sorter", "words.txt", "out"]).unwrap();
        let job = Job::from(args);
        assert_eq!(job.input, "words.txt");
        assert_eq!(job.output, PathBuf::from("out"));
        assert_eq!(job.n_reduce, DEFAULT_REDUCERS);
        assert_eq!(job.split_size, DEFAULT_SPLIT_SIZE);
        assert!(job.combine);
    }

    #[test]
    fn tuning_flags() {
        let args = Args::try_parse_from([
            "anagram-sorter",
            "--reducers",
            "3",
            "--split-size",
            "16",
            "--no-combine",
            "in/*.txt",
            "out",
        ])
        .unwrap();
        let job = Job::from(args);
        assert_eq!(job.n_reduce, 3);
        assert_eq!(job.split_size, 16);
        assert!(!job.combine);
    }

    #[test]
    fn rejects_zero_reducers_and_missing_output() {
        assert!(Args::try_parse_from(["anagram-sorter", "--reducers", "0", "in", "out"]).is_err());
        assert!(Args::try_parse_from(["anagram-sorter", "in"]).is_err());
    }
}
