pub mod tables;
pub mod sanitize;
pub mod extract;
pub mod validation;

pub use sanitize::*;
pub use extract::*;
pub use validation::*;

use thiserror::Error;

/// Why a case description cannot be analyzed yet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Case description is too short: please provide at least {min} characters")]
    TooShort { min: usize },

    #[error("Case description is too long: please limit it to {max} characters")]
    TooLong { max: usize },

    #[error("Case description is missing age: include it, approximate is fine ('60s', 'elderly', 'middle-aged')")]
    MissingAge,

    #[error("Case description is missing procedure: mention the requested procedure or test")]
    MissingProcedure,
}
