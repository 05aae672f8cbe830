use crate::error::BufferPoolError;

pub type BufferResult<T> = Result<T, BufferPoolError>;
