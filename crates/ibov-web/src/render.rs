//! Server-side HTML and inline SVG rendering for the dashboard.

use ibov_forecast::Histogram;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 360.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 40.0;

pub const BLUE: &str = "#0d6efd";
pub const RED: &str = "#dc3545";
pub const GREY: &str = "#6c757d";

/// A polyline in data coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub label: String,
    pub color: &'static str,
    pub dashed: bool,
    pub points: Vec<(f64, f64)>,
}

/// A shaded interval between `lower` and `upper` at the same x positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub label: String,
    pub color: &'static str,
    pub points: Vec<(f64, f64, f64)>,
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Bounds {
    fn collect(lines: &[Line], bands: &[Band]) -> Option<Self> {
        let xs = lines
            .iter()
            .flat_map(|line| line.points.iter().map(|p| p.0))
            .chain(bands.iter().flat_map(|band| band.points.iter().map(|p| p.0)));
        let ys = lines
            .iter()
            .flat_map(|line| line.points.iter().map(|p| p.1))
            .chain(
                bands
                    .iter()
                    .flat_map(|band| band.points.iter().flat_map(|p| [p.1, p.2])),
            );
        let (x_min, x_max) = min_max(xs)?;
        let (y_min, y_max) = min_max(ys)?;
        let pad = if y_max > y_min { (y_max - y_min) * 0.05 } else { 1.0 };
        Some(Self {
            x_min,
            x_max: if x_max > x_min { x_max } else { x_min + 1.0 },
            y_min: y_min - pad,
            y_max: y_max + pad,
        })
    }

    fn x(&self, value: f64) -> f64 {
        MARGIN_LEFT + (value - self.x_min) / (self.x_max - self.x_min) * plot_width()
    }

    fn y(&self, value: f64) -> f64 {
        MARGIN_TOP + (self.y_max - value) / (self.y_max - self.y_min) * plot_height()
    }
}

fn plot_width() -> f64 {
    WIDTH - MARGIN_LEFT - MARGIN_RIGHT
}

fn plot_height() -> f64 {
    HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|value| value.is_finite())
        .fold(None, |acc, value| match acc {
            None => Some((value, value)),
            Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
        })
}

/// Line chart with optional confidence bands. `x_labels` are printed under
/// the left and right ends of the x axis.
pub fn line_chart(title: &str, x_labels: (&str, &str), lines: &[Line], bands: &[Band]) -> String {
    let Some(bounds) = Bounds::collect(lines, bands) else {
        return format!("<p class=\"note\">{}: no data to plot.</p>", escape_html(title));
    };

    let mut svg = svg_open(title);
    push_axes(&mut svg, &bounds, x_labels);

    for band in bands {
        if band.points.is_empty() {
            continue;
        }
        let upper = band
            .points
            .iter()
            .map(|(x, _, hi)| format!("{:.1},{:.1}", bounds.x(*x), bounds.y(*hi)));
        let lower = band
            .points
            .iter()
            .rev()
            .map(|(x, lo, _)| format!("{:.1},{:.1}", bounds.x(*x), bounds.y(*lo)));
        let polygon: Vec<String> = upper.chain(lower).collect();
        svg.push_str(&format!(
            "<polygon points=\"{}\" fill=\"{}\" fill-opacity=\"0.15\" stroke=\"none\"><title>{}</title></polygon>",
            polygon.join(" "),
            band.color,
            escape_html(&band.label)
        ));
    }

    for line in lines {
        let points: Vec<String> = line
            .points
            .iter()
            .filter(|(_, y)| y.is_finite())
            .map(|(x, y)| format!("{:.1},{:.1}", bounds.x(*x), bounds.y(*y)))
            .collect();
        let dash = if line.dashed { " stroke-dasharray=\"6 4\"" } else { "" };
        svg.push_str(&format!(
            "<polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\"{dash}><title>{}</title></polyline>",
            points.join(" "),
            line.color,
            escape_html(&line.label)
        ));
    }

    svg.push_str("</svg>");
    svg.push_str(&legend(lines, bands));
    svg
}

/// Vertical-bar chart of a histogram.
pub fn histogram_chart(title: &str, histogram: &Histogram) -> String {
    let peak = histogram.counts.iter().copied().max().unwrap_or(0).max(1) as f64;
    let bins = histogram.counts.len().max(1) as f64;
    let x_max = histogram.min + histogram.bin_width * bins;
    let bounds = Bounds {
        x_min: histogram.min,
        x_max: if x_max > histogram.min { x_max } else { histogram.min + 1.0 },
        y_min: 0.0,
        y_max: peak,
    };

    let mut svg = svg_open(title);
    let left = format_number(histogram.min);
    let right = format_number(x_max);
    push_axes(&mut svg, &bounds, (&left, &right));

    let bar_width = plot_width() / bins;
    for (index, count) in histogram.counts.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        let x = MARGIN_LEFT + index as f64 * bar_width;
        let top = bounds.y(*count as f64);
        let from = histogram.min + histogram.bin_width * index as f64;
        svg.push_str(&format!(
            "<rect x=\"{x:.1}\" y=\"{top:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{BLUE}\" fill-opacity=\"0.7\"><title>{} to {}: {count}</title></rect>",
            (bar_width - 1.0).max(0.5),
            MARGIN_TOP + plot_height() - top,
            format_number(from),
            format_number(from + histogram.bin_width),
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn svg_open(title: &str) -> String {
    format!(
        "<figure><figcaption>{}</figcaption><svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {WIDTH} {HEIGHT}\" role=\"img\">",
        escape_html(title)
    )
}

fn push_axes(svg: &mut String, bounds: &Bounds, x_labels: (&str, &str)) {
    let bottom = MARGIN_TOP + plot_height();
    let right = MARGIN_LEFT + plot_width();
    svg.push_str(&format!(
        "<rect x=\"{MARGIN_LEFT}\" y=\"{MARGIN_TOP}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"#dee2e6\"/>",
        plot_width(),
        plot_height()
    ));

    for step in 0..=4 {
        let value = bounds.y_min + (bounds.y_max - bounds.y_min) * f64::from(step) / 4.0;
        let y = bounds.y(value);
        svg.push_str(&format!(
            "<line x1=\"{MARGIN_LEFT}\" y1=\"{y:.1}\" x2=\"{right:.1}\" y2=\"{y:.1}\" stroke=\"#f1f3f5\"/>\
             <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"11\" fill=\"{GREY}\">{}</text>",
            MARGIN_LEFT - 6.0,
            y + 4.0,
            format_number(value)
        ));
    }

    svg.push_str(&format!(
        "<text x=\"{MARGIN_LEFT}\" y=\"{:.1}\" font-size=\"11\" fill=\"{GREY}\">{}</text>\
         <text x=\"{right:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"11\" fill=\"{GREY}\">{}</text>",
        bottom + 18.0,
        escape_html(x_labels.0),
        bottom + 18.0,
        escape_html(x_labels.1)
    ));
}

fn legend(lines: &[Line], bands: &[Band]) -> String {
    let mut html = String::from("<p class=\"legend\">");
    for line in lines {
        html.push_str(&format!(
            "<span style=\"color:{}\">&#9632; {}</span> ",
            line.color,
            escape_html(&line.label)
        ));
    }
    for band in bands {
        html.push_str(&format!(
            "<span style=\"color:{};opacity:0.5\">&#9632; {}</span> ",
            band.color,
            escape_html(&band.label)
        ));
    }
    html.push_str("</p></figure>");
    html
}

/// Two decimals with `,` thousands separators, e.g. `132,834.00`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return String::from("N/A");
    }
    let formatted = format!("{:.2}", value.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{fraction}")
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_number(132_834.0), "132,834.00");
        assert_eq!(format_number(999.999), "1,000.00");
        assert_eq!(format_number(-1_234.5), "-1,234.50");
        assert_eq!(format_number(-0.001), "0.00");
        assert_eq!(format_number(f64::NAN), "N/A");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"a\" & 'b'</b>"),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn line_chart_draws_band_and_lines() {
        let svg = line_chart(
            "Forecast",
            ("2024-01-01", "2024-01-10"),
            &[Line {
                label: String::from("history"),
                color: BLUE,
                dashed: false,
                points: vec![(0.0, 100.0), (1.0, 101.0), (2.0, 99.0)],
            }],
            &[Band {
                label: String::from("95% interval"),
                color: RED,
                points: vec![(3.0, 95.0, 105.0), (4.0, 94.0, 106.0)],
            }],
        );

        assert!(svg.contains("<svg"));
        assert_eq!(svg.matches("<polyline").count(), 1);
        assert_eq!(svg.matches("<polygon").count(), 1);
        assert!(svg.contains("2024-01-10"));
    }

    #[test]
    fn empty_chart_renders_note() {
        let html = line_chart("Empty", ("", ""), &[], &[]);
        assert!(html.contains("no data to plot"));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn histogram_draws_non_empty_bins() {
        let histogram = Histogram::build(&[0.0, 0.1, 0.2, 5.0], 5).expect("histogram");
        let svg = histogram_chart("Residuals", &histogram);
        assert_eq!(svg.matches("<rect x=").count(), 1 + 2);
    }
}
