use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("varint overflows 64 bits")]
    VarintOverflow,

    #[error("unexpected end of stream")]
    UnexpectedEof,
}
