pub mod price;
pub mod report;
