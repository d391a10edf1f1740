pub mod decode;
pub mod types;
pub mod ws;
