//! Terminal output: colored notes and plain tables.

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

/// Honors `NO_COLOR` and dumb terminals.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

/// Errors go to stderr.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

/// `key: value` line with a dimmed key.
pub fn field(key: &str, value: &str) -> String {
    if supports_color() {
        format!("  {DIM}{key}:{RESET} {value}")
    } else {
        format!("  {key}: {value}")
    }
}

/// Render left-aligned columns. Cells wider than `max_width` are cut with `…`.
pub fn render_table(headers: &[&str], rows: &[Vec<String>], max_width: usize) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|c| truncate(c, max_width)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate().take(headers.len()) {
            widths[i] = widths[i].max(strip_ansi(cell).chars().count());
        }
    }

    let line = |values: Vec<&str>| -> String {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| {
                let pad = w.saturating_sub(strip_ansi(v).chars().count());
                format!("{v}{}", " ".repeat(pad))
            })
            .collect();
        format!("  {}", padded.join("  ").trim_end())
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}\n", sep.join("  ")));
    for row in &cells {
        let values: Vec<&str> = (0..headers.len())
            .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        out.push_str(&line(values));
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi() {
        let colored = format!("{GREEN}hello{RESET}");
        assert_eq!(strip_ansi(&colored), "hello");
    }

    #[test]
    fn renders_aligned_table() {
        let rows = vec![
            vec!["7".to_string(), "Contracts".to_string()],
            vec!["12".to_string(), "HR".to_string()],
        ];
        let table = render_table(&["ID", "Name"], &rows, 40);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "  ID  Name");
        assert_eq!(lines[1], "  --  ---------");
        assert_eq!(lines[2], "  7   Contracts");
        assert_eq!(lines[3], "  12  HR");
    }

    #[test]
    fn long_cells_are_truncated() {
        let rows = vec![vec!["a very long description".to_string()]];
        let table = render_table(&["Description"], &rows, 12);
        assert!(table.contains("a very long…"));
        assert!(!table.contains("description"));
    }
}
