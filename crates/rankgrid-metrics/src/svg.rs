//! SVG utilization timeline.
//!
//! Ranks run along the x axis, time since the start of the run along the
//! y axis. Every instance is one rectangle covering its rank range and its
//! wall-clock span, scaled into a 500×500 canvas. A caption below the
//! canvas gives the total elapsed time and the load-balance ratio.

use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::statistics::RunStatistics;

const CANVAS: f64 = 500.0;
const CAPTION_HEIGHT: f64 = 24.0;

/// Render the run timeline as a standalone SVG document.
pub fn render_svg(stats: &RunStatistics<'_>) -> String {
    let total_ms = stats.total_elapsed_ms();
    let x_scale = if stats.total_ranks() == 0 {
        0.0
    } else {
        CANVAS / f64::from(stats.total_ranks())
    };
    let y_scale = if total_ms == 0 {
        0.0
    } else {
        CANVAS / total_ms as f64
    };

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{CANVAS}\" height=\"{}\" viewBox=\"0 0 {CANVAS} {}\">",
        CANVAS + CAPTION_HEIGHT,
        CANVAS + CAPTION_HEIGHT
    );
    let _ = writeln!(
        out,
        "  <rect x=\"0\" y=\"0\" width=\"{CANVAS}\" height=\"{CANVAS}\" style=\"fill: #ffffff\"/>"
    );

    for instance in stats.historic().iter().filter(|i| i.is_finished()) {
        let offset_ms = instance
            .started_at()
            .saturating_duration_since(stats.begin())
            .as_millis() as f64;
        let _ = writeln!(
            out,
            "  <rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" style=\"fill: {}\"><title>{}</title></rect>",
            x_scale * f64::from(instance.starting_rank()),
            y_scale * offset_ms,
            x_scale * f64::from(instance.ranks()),
            y_scale * instance.elapsed_ms() as f64,
            color_for(instance.id()),
            escape(instance.id()),
        );
    }

    let _ = writeln!(
        out,
        "  <text x=\"4\" y=\"{}\" font-family=\"monospace\" font-size=\"12\">Total elapsed time: {}ms, load balance ratio: {:.4}</text>",
        CANVAS + CAPTION_HEIGHT - 8.0,
        total_ms,
        stats.load_balance_ratio()
    );
    out.push_str("</svg>\n");
    out
}

/// Stable fill color derived from the command id.
pub fn color_for(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    format!("#{}", hex::encode(&digest[..3]))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
