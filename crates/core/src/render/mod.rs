pub mod charts;
pub mod format;
pub mod page;
pub mod table;
