//! Import pipeline for the alumni mentor directory.
//!
//! A survey export (CSV) is tokenized, its columns located, and every row
//! classified as new, existing, or invalid against the current directory.
//! The directory itself can be checked for duplicate names and exported.

pub mod classifier;
pub mod duplicates;
pub mod error;
pub mod export;
pub mod locator;
pub mod models;
pub mod normalize;
pub mod store;
pub mod tokenizer;

pub use classifier::{ImportClassifier, ImportReport};
pub use duplicates::{find_duplicates, DuplicateGroup, DuplicateReport};
pub use error::{Error, Result};
pub use models::{Category, Classification, Config, ImportCandidate, ImportRules, MentorInput, MentorRecord};
pub use store::{open_store, AnyStore, MentorStore, RestStore, SnapshotStore};
