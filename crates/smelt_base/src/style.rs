//! ANSI styling for terminal diagnostics.
//!
//! The error renderer and the CLI colorize a handful of fragments: the
//! `error`/`warning` labels, line-number gutters, and progress verbs. Each
//! helper wraps its text in the escape sequence for one style and closes
//! it with a reset, so styled fragments can be spliced into any message.

/// ANSI escape code styling utilities.
pub struct Style;

const RESET: &str = "\x1b[0m";

fn paint(codes: &str, text: &str) -> String {
    format!("\x1b[{}m{}{}", codes, text, RESET)
}

impl Style {
    pub fn red(text: &str) -> String {
        paint("31", text)
    }

    pub fn yellow(text: &str) -> String {
        paint("33", text)
    }

    pub fn blue(text: &str) -> String {
        paint("34", text)
    }

    pub fn cyan(text: &str) -> String {
        paint("36", text)
    }

    pub fn bold(text: &str) -> String {
        paint("1", text)
    }

    /// Bold and red in one sequence; used for the `error` label.
    pub fn bold_red(text: &str) -> String {
        paint("1;31", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_style_closes_with_a_reset() {
        for styled in [
            Style::red("x"),
            Style::yellow("x"),
            Style::blue("x"),
            Style::cyan("x"),
            Style::bold("x"),
            Style::bold_red("x"),
        ] {
            assert!(styled.ends_with(RESET), "unterminated style: {:?}", styled);
            assert!(styled.contains('x'));
        }
    }

    #[test]
    fn bold_red_is_one_combined_sequence() {
        assert_eq!(Style::bold_red("fatal"), "\x1b[1;31mfatal\x1b[0m");
    }
}
