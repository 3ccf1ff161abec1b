use thiserror::Error;

/// Malformed input rejected before any storage access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Search query must be at least {min} characters")]
    QueryTooShort { min: usize },

    #[error("Username must be between {min} and {max} characters")]
    UsernameLength { min: usize, max: usize },

    #[error("Username may only contain letters, digits and @/./+/-/_")]
    UsernameCharacters,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("{field} may not be blank")]
    Blank { field: &'static str },

    #[error("{field} may not exceed {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Progress must be between {min} and {max}, got {value}")]
    ProgressOutOfRange { value: i64, min: i64, max: i64 },

    #[error("You cannot send a peer request to yourself")]
    SelfPeering,

    #[error("You cannot share a topic with yourself")]
    SelfShare,
}
