pub mod scan;
pub mod setup;
pub mod ui;
pub mod universe;
