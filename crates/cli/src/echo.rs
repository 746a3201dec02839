use folio_core::{ChapterDescriptor, SourceProfile, WorkResult};
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "Folio".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Search and read web novels from several providers\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print elapsed time with color coding
pub fn print_timing(label: &str, duration: std::time::Duration) {
    let ms = duration.as_secs_f64() * 1000.0;
    let label = format!("{}:", label);

    if ms < 1000.0 {
        eprintln!("  {} {:>8.0}ms ({})", label.dimmed(), ms, "fast".dimmed());
    } else if ms < 5000.0 {
        eprintln!("  {} {:>8.0}ms ({})", label.dimmed(), ms, "moderate".bright_yellow());
    } else {
        eprintln!("  {} {:>8.0}ms ({})", label.dimmed(), ms, "slow".bright_red());
    }
}

/// One line per provider
pub fn format_source(profile: &SourceProfile) -> String {
    format!("{}\t{}", profile.name, profile.base_url)
}

/// Numbered search hit, two lines
pub fn format_result(index: usize, result: &WorkResult) -> String {
    format!(
        "{:>3}. {} / {} [{}]\n     {}",
        index + 1,
        result.title,
        result.author,
        result.source,
        result.url
    )
}

/// Chapter list entry, numbered from one
pub fn format_chapter(chapter: &ChapterDescriptor) -> String {
    format!("{:>5}. {}\t{}", chapter.ordinal + 1, chapter.title, chapter.url)
}
