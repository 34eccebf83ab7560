pub mod display;
pub mod import;
pub mod list;

pub use display::DisplayCommand;
pub use import::ImportCommand;
pub use list::ListCommand;
