//! Terminal rendering of unified results with markdown support

use crossterm::style::{Color, Stylize};
use serde_json::Value;
use termimad::MadSkin;

use super::theme::Theme;
use crate::api::{
    Capabilities, ChatResult, CompletionResult, EmbeddingResult, GeneratedImage, ImageResult,
    ModelDescriptor, TokenUsage,
};

/// Number of vector components printed for embeddings
const VECTOR_PREVIEW: usize = 8;

pub struct TerminalRenderer {
    theme: Theme,
    skin: MadSkin,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        let theme = Theme::default();
        let skin = Self::build_skin(&theme);
        Self { theme, skin }
    }

    fn build_skin(theme: &Theme) -> MadSkin {
        let mut skin = MadSkin::default();
        skin.set_headers_fg(to_termimad_color(theme.title));
        skin.bold.set_fg(to_termimad_color(Color::White));
        skin.italic.set_fg(to_termimad_color(Color::DarkYellow));
        skin.inline_code.set_fg(to_termimad_color(Color::Green));
        skin.code_block.set_fg(to_termimad_color(Color::Green));
        skin
    }

    /// Print model output, formatting markdown when present
    pub fn render_text(&self, content: &str) {
        if has_markdown_elements(content) {
            self.skin.print_text(content);
        } else {
            println!("{}", content.with(self.theme.assistant));
        }
    }

    pub fn render_chat(&self, result: &ChatResult) {
        self.render_text(&result.content);
        if let Some(call) = &result.function_call {
            self.render_info(&format!("function call: {}", call));
        }
        self.render_usage(&result.usage, &result.model_id, result.finish_reason.as_deref());
    }

    pub fn render_completion(&self, result: &CompletionResult) {
        self.render_text(&result.text);
        self.render_usage(&result.usage, &result.model_id, result.finish_reason.as_deref());
    }

    pub fn render_embedding(&self, result: &EmbeddingResult) {
        println!(
            "  {} {}",
            format!("{} dimensions", result.vector.len()).with(self.theme.stats),
            format!("[{}]", result.model_id).with(self.theme.dim),
        );
        println!("  {}", vector_preview(&result.vector, VECTOR_PREVIEW));
        self.render_usage(&result.usage, &result.model_id, None);
    }

    pub fn render_images(&self, result: &ImageResult) {
        for (idx, image) in result.images.iter().enumerate() {
            let (location, revised) = match image {
                GeneratedImage::Url { url, revised_prompt } => (url.clone(), revised_prompt),
                GeneratedImage::B64Json {
                    b64_json,
                    revised_prompt,
                } => (format!("<base64, {} bytes>", b64_json.len()), revised_prompt),
            };
            println!("  {} {}", format!("[{}]", idx).with(self.theme.dim), location);
            if let Some(prompt) = revised {
                println!("      {}", prompt.as_str().with(self.theme.dim));
            }
        }
    }

    /// Render the token usage line after a response
    pub fn render_usage(&self, usage: &TokenUsage, model: &str, finish_reason: Option<&str>) {
        println!(
            "\n  {} {} [{}]{}",
            "\u{2022}".with(self.theme.dim),
            format_usage(usage).with(self.theme.stats),
            model.with(self.theme.dim),
            finish_reason
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
                .with(self.theme.dim),
        );
    }

    pub fn render_provider(&self, name: &str, display_name: &str, active: bool, caps: Capabilities) {
        let status = if active {
            "active".with(self.theme.success)
        } else {
            "no key".with(self.theme.inactive)
        };
        println!(
            "  {:<14} {:<14} {:<8} {}",
            name,
            display_name,
            status,
            capability_list(caps).with(self.theme.dim),
        );
    }

    pub fn render_models(&self, models: &[ModelDescriptor], default_model: &str) {
        for model in models {
            let marker = if model.id == default_model { "*" } else { " " };
            let context = model
                .context_window
                .map(|c| format!("{}k ctx", c / 1000))
                .unwrap_or_default();
            println!(
                "  {} {:<40} {:<11} {}",
                marker.with(self.theme.success),
                model.id,
                format!("{:?}", model.kind).to_lowercase().with(self.theme.dim),
                context.with(self.theme.stats),
            );
        }
    }

    pub fn render_json(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        }
    }

    pub fn render_title(&self, title: &str) {
        println!("{}", title.with(self.theme.title));
    }

    pub fn render_error(&self, msg: &str) {
        eprintln!(
            "  {} {}",
            "\u{2717}".with(self.theme.error),
            msg.with(self.theme.error)
        );
    }

    pub fn render_success(&self, msg: &str) {
        println!(
            "  {} {}",
            "\u{2713}".with(self.theme.success),
            msg.with(self.theme.success)
        );
    }

    pub fn render_info(&self, msg: &str) {
        println!("  {}", msg.with(self.theme.dim));
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn format_usage(usage: &TokenUsage) -> String {
    let mut line = format!(
        "{} in + {} out = {} tokens",
        usage.input_tokens, usage.output_tokens, usage.total_tokens
    );
    if let Some(cost) = usage.estimated_cost_usd {
        line.push_str(&format!(", ${:.6}", cost));
    }
    line
}

fn capability_list(caps: Capabilities) -> String {
    let flags = [
        (caps.chat, "chat"),
        (caps.completion, "complete"),
        (caps.embeddings, "embed"),
        (caps.images, "image"),
    ];
    flags
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn vector_preview(vector: &[f32], n: usize) -> String {
    let head: Vec<String> = vector.iter().take(n).map(|v| format!("{:.4}", v)).collect();
    if vector.len() > n {
        format!("[{}, ...]", head.join(", "))
    } else {
        format!("[{}]", head.join(", "))
    }
}

/// Check if content has markdown elements worth rendering through the skin
fn has_markdown_elements(content: &str) -> bool {
    content.contains("```")
        || content.contains("## ")
        || content.contains("# ")
        || content.contains("**")
        || content.contains("| ")
        || content.contains("- [")
}

/// Convert crossterm Color to termimad color
fn to_termimad_color(color: Color) -> termimad::crossterm::style::Color {
    // termimad re-exports its own crossterm; map variant by variant
    match color {
        Color::Black => termimad::crossterm::style::Color::Black,
        Color::DarkGrey => termimad::crossterm::style::Color::DarkGrey,
        Color::Red => termimad::crossterm::style::Color::Red,
        Color::DarkRed => termimad::crossterm::style::Color::DarkRed,
        Color::Green => termimad::crossterm::style::Color::Green,
        Color::DarkGreen => termimad::crossterm::style::Color::DarkGreen,
        Color::Yellow => termimad::crossterm::style::Color::Yellow,
        Color::DarkYellow => termimad::crossterm::style::Color::DarkYellow,
        Color::Blue => termimad::crossterm::style::Color::Blue,
        Color::DarkBlue => termimad::crossterm::style::Color::DarkBlue,
        Color::Magenta => termimad::crossterm::style::Color::Magenta,
        Color::DarkMagenta => termimad::crossterm::style::Color::DarkMagenta,
        Color::Cyan => termimad::crossterm::style::Color::Cyan,
        Color::DarkCyan => termimad::crossterm::style::Color::DarkCyan,
        Color::White => termimad::crossterm::style::Color::White,
        Color::Grey => termimad::crossterm::style::Color::Grey,
        _ => termimad::crossterm::style::Color::Reset,
    }
}
