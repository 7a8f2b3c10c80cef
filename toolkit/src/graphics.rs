// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Plot rendering for metric and feature distribution graphics
//!
//! Charts are plain horizontal bar charts emitted as SVG and stored base64
//! encoded, so a template can inline them with a `data:` URI.

use crate::model_card::Graphic;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Height of one bar, in pixels
const BAR_HEIGHT: usize = 18;
/// Vertical space between bars
const BAR_GAP: usize = 6;
/// Column reserved for the right-aligned bar labels
const LABEL_WIDTH: usize = 180;
/// Length of the longest bar
const PLOT_WIDTH: usize = 320;
/// Column reserved for the value printed after each bar
const VALUE_WIDTH: usize = 80;
const TITLE_HEIGHT: usize = 28;
/// Labels longer than this are cut with an ellipsis
const MAX_LABEL_CHARS: usize = 28;

/// Render a bar chart named `name`, one bar per `(label, value)` pair.
///
/// Bars are scaled to the largest absolute finite value. Non-finite values
/// are drawn as empty bars with their value still printed.
pub fn bar_chart(name: &str, bars: &[(String, f64)]) -> Graphic {
    let svg = bar_chart_svg(name, bars);
    Graphic {
        name: name.to_string(),
        image: STANDARD.encode(svg.as_bytes()),
    }
}

fn bar_chart_svg(title: &str, bars: &[(String, f64)]) -> String {
    let width = LABEL_WIDTH + PLOT_WIDTH + VALUE_WIDTH;
    let height = TITLE_HEIGHT + bars.len() * (BAR_HEIGHT + BAR_GAP) + BAR_GAP;
    let max = bars
        .iter()
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" font-family="sans-serif" font-size="12">"#
    ));
    svg.push_str(&format!(
        r#"<text x="4" y="18" font-weight="bold">{}</text>"#,
        escape_xml(title)
    ));

    for (i, (label, value)) in bars.iter().enumerate() {
        let y = TITLE_HEIGHT + i * (BAR_HEIGHT + BAR_GAP);
        let bar = if value.is_finite() && max > 0.0 {
            (value.abs() / max * PLOT_WIDTH as f64).round() as usize
        } else {
            0
        };
        let text_y = y + BAR_HEIGHT - 5;
        svg.push_str(&format!(
            r#"<text x="{}" y="{text_y}" text-anchor="end">{}</text>"#,
            LABEL_WIDTH - 6,
            escape_xml(&truncate(label, MAX_LABEL_CHARS))
        ));
        svg.push_str(&format!(
            "<rect x=\"{LABEL_WIDTH}\" y=\"{y}\" width=\"{bar}\" height=\"{BAR_HEIGHT}\" fill=\"#4c78a8\"/>"
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{text_y}">{}</text>"#,
            LABEL_WIDTH + bar + 4,
            format_value(*value)
        ));
    }

    svg.push_str("</svg>");
    svg
}

/// Compact numeric label used on bars and in metric values.
///
/// Whole numbers print without a fraction (`3`), everything else with four
/// decimals (`0.1235`).
pub fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
    }
}

/// Cut `label` to `max_chars` characters, the last one an ellipsis
fn truncate(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        label.to_string()
    } else {
        label.chars().take(max_chars - 1).collect::<String>() + "…"
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
