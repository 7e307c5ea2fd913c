//! Little-endian binary IO helpers for the metatile container format.

mod value_reader;
mod value_writer;

pub use value_reader::ValueReaderSlice;
pub use value_writer::ValueWriterBlob;
