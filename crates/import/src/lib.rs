pub mod csv;

pub use csv::{read_statement, write_statement, ImportError, Statement, BOUNCE_TYPE_HEADER};
