pub mod commands;
pub mod frame;

pub use commands::Command;
pub use frame::{
    decode_reader_count, decode_statuses, encode_request, encode_statuses, expect_response_len,
};
