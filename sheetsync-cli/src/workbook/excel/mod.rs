//! Excel I/O for workbooks

mod reader;
mod writer;

pub use reader::{LoadedWorkbook, read_workbook};
pub use writer::render_workbook;
