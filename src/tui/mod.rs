//! Terminal output for the CLI: styled results, markdown replies and a wait spinner

pub mod renderer;
pub mod spinner;
pub mod theme;

pub use renderer::TerminalRenderer;
pub use spinner::WaitSpinner;
pub use theme::Theme;
