//! Terminal colors for CLI output

use crossterm::style::Color;

pub struct Theme {
    /// Model replies
    pub assistant: Color,
    pub error: Color,
    /// Secondary info such as model ids and timings
    pub dim: Color,
    pub success: Color,
    pub title: Color,
    /// Token counts and costs
    pub stats: Color,
    /// Providers without an API key
    pub inactive: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            assistant: Color::White,
            error: Color::Red,
            dim: Color::DarkGrey,
            success: Color::Green,
            title: Color::Magenta,
            stats: Color::Blue,
            inactive: Color::DarkYellow,
        }
    }
}
