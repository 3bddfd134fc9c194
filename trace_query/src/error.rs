use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid trace ql condition on {attribute}: {details}"))]
    InvalidCondition { attribute: String, details: String },

    #[snafu(display("bad regex operand {pattern:?}: {source}"))]
    BadRegex { pattern: String, source: regex::Error },

    #[snafu(display("iterator engine error: {source}"))]
    Engine { source: parquetquery::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<parquetquery::Error> for Error {
    fn from(source: parquetquery::Error) -> Self {
        Error::Engine { source }
    }
}
