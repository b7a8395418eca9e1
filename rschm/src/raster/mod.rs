pub mod metadata;
pub mod quantize;
pub mod writer;
