//! Box-drawn candidate table.

use super::DisplayCandidate;

/// Render candidates as a `token | p | text` table.
///
/// Probabilities are shown with 4 decimals. Text is escaped so control
/// characters and newlines stay on one row.
pub fn candidate_table(candidates: &[DisplayCandidate]) -> String {
    let rows: Vec<[String; 3]> = candidates
        .iter()
        .map(|c| {
            [
                c.token.to_string(),
                format!("{:.4}", c.probability),
                format!("{:?}", c.text),
            ]
        })
        .collect();

    let headers = ["token", "p", "text"];
    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let rule = |left: &str, mid: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{left}{}{right}", segments.join(mid))
    };
    let line = |cells: [&str; 3]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!(" {cell:<w$} "))
            .collect();
        format!("│{}│", padded.join("│"))
    };

    let mut lines = Vec::with_capacity(rows.len() + 4);
    lines.push(rule("┌", "┬", "┐"));
    lines.push(line(headers));
    lines.push(rule("├", "┼", "┤"));
    for row in &rows {
        lines.push(line([&row[0], &row[1], &row[2]]));
    }
    lines.push(rule("└", "┴", "┘"));

    lines.join("\n")
}
