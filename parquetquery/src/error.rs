use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("I/O error reading column chunk: {source}"))]
    ColumnChunkIo { source: Box<dyn std::error::Error + Send + Sync> },

    #[snafu(display("I/O error reading page: {source}"))]
    PageIo { source: Box<dyn std::error::Error + Send + Sync> },

    #[snafu(display("column index {column_index} out of range for row group"))]
    ColumnIndexOutOfRange { column_index: usize },

    #[snafu(display("left join requires at least one required iterator"))]
    NoRequiredIterators {}
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
