pub mod app;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod output;
pub mod records;
pub mod sources;
pub mod store;
pub mod tui;
pub mod workbook;
