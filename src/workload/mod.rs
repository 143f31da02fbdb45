//! MapReduce applications that run on the standalone engine.
//!
//! # Example
//!
//! ```
//! use anagram_sorter::workload;
//!
//! let stages = workload::anagram::pipeline();
//! assert_eq!(stages.len(), 2);
//! assert_eq!(stages[0].name, "assemble");
//! ```

pub mod anagram;
