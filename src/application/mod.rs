pub mod bootstrap;
pub mod commands;
pub mod console;
pub mod day_filler;
pub mod month_fill;
pub mod project_picker;
pub mod session;
