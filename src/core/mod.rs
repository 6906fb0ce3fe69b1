// Core modules implementing the file layout, column codecs, encoder, decoder, and errors.
pub mod codec;
pub mod error;
pub mod format;
pub mod reader;
pub mod validate;
pub mod value;
pub mod writer;
