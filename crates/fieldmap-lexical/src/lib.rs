//! Name normalization and the lexical matching tiers.
//!
//! - [`normalize`]: canonical comparison tokens
//! - [`AliasDictionary`] / [`ExactAliasMatcher`]: exact and alias hits
//! - [`LexicalMatcher`]: graded substring, suffix, overlap and fuzzy scores

#![deny(unsafe_code)]

pub mod aliases;
pub mod error;
pub mod lexical;
pub mod normalize;

pub use aliases::{ALIAS_CONFIDENCE, AliasDictionary, EXACT_CONFIDENCE, ExactAliasMatcher};
pub use error::AliasError;
pub use lexical::LexicalMatcher;
pub use normalize::{normalize, spaced, split_words};
