use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("trace ids must be 128 bit, received {bits} bits"))]
    InvalidTraceId { bits: usize },

    #[snafu(display(
        "RATE_LIMITED: ingestion rate limit ({local_limit} bytes/s, global {global_limit} bytes/s) exceeded while adding {added} bytes to tenant {tenant}: burst size is {burst} bytes"
    ))]
    ExceedsBurst {
        tenant: String,
        local_limit: u64,
        global_limit: u64,
        burst: u64,
        added: u64,
    },

    #[snafu(display("RATE_LIMITED: batch size {added} exceeds ingestion limit for tenant {tenant}: {available} tokens available"))]
    RateLimited { tenant: String, added: u64, available: u64 },

    #[snafu(display("request cancelled before rebatching completed"))]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
