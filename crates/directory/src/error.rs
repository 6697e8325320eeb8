/// Errors surfaced by the directory client across the HTTP boundary.
#[derive(Debug)]
pub enum Error {
    /// The directory does not recognize this token.
    TokenNotValid,
    /// A `POST /addr` (register) call failed.
    RegisterAddrFailed,
    /// The directory returned `code != 200` for some other reason.
    Api { code: i64, msg: String },
    /// Transport-level failure talking to the directory, including a
    /// response body that doesn't match the expected JSON envelope shape
    /// (`reqwest::Response::json` surfaces decode failures as this type).
    Request(reqwest::Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TokenNotValid => write!(f, "token not valid"),
            Self::RegisterAddrFailed => write!(f, "cannot register address"),
            Self::Api { code, msg } => write!(f, "directory error {code}: {msg}"),
            Self::Request(e) => write!(f, "directory request failed: {e}"),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(value)
    }
}
