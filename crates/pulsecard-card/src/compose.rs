//! Card composition: per-query sections in display order, charts
//! re-sorted oldest-first, multi-day labels disambiguated, empty results
//! replaced by explicit no-data blocks.

use chrono::{Local, TimeZone};
use std::collections::HashSet;

use pulsecard_core::{CardStyle, DisplayMode, Series, Snapshot};

use crate::document::{
    Block, CardDocument, ChartBlock, ChartKind, ChartPoint, ChartSeries, TextBlock, TextLine,
};

/// One query's contribution to the card, in the mode the task resolved
/// for it.
#[derive(Debug, Clone)]
pub struct QuerySection {
    pub name: String,
    pub display_order: i32,
    pub mode: DisplayMode,
    pub chart_style: String,
    pub unit: String,
    pub show_data_label: bool,
    /// Chart input, newest-first from the sampler.
    pub series: Vec<Series>,
    /// Text input.
    pub snapshots: Vec<Snapshot>,
}

/// Assemble the notification document. Sections are ordered by display
/// order (ties by name); button and footer are appended once.
pub fn compose(style: &CardStyle, footer: &str, mut sections: Vec<QuerySection>) -> CardDocument {
    sections.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name))
    });

    let multi_day = sections
        .iter()
        .filter(|s| s.mode != DisplayMode::Text)
        .any(|s| is_multi_day(&s.series));

    let mut doc = CardDocument::new(&style.title, &style.theme);
    let count = sections.len();
    for (i, section) in sections.into_iter().enumerate() {
        match section.mode {
            DisplayMode::Chart => push_chart_section(&mut doc, &section, multi_day),
            DisplayMode::Text => push_text_section(&mut doc, &section),
            DisplayMode::Both => {
                push_chart_section(&mut doc, &section, multi_day);
                push_text_section(&mut doc, &section);
            }
        }
        if i + 1 < count {
            doc.push(Block::Separator);
        }
    }

    doc.push(Block::Separator);
    if !style.button_text.is_empty() && !style.button_url.is_empty() {
        doc.push(Block::Action {
            text: style.button_text.clone(),
            url: style.button_url.clone(),
        });
    }
    doc.push(Block::Footer {
        text: footer.to_string(),
    });
    doc
}

fn push_chart_section(doc: &mut CardDocument, section: &QuerySection, multi_day: bool) {
    let total_points: usize = section.series.iter().map(|s| s.samples.len()).sum();
    if total_points == 0 {
        tracing::info!("📊 Query '{}' returned no points, emitting no-data block", section.name);
        doc.push(Block::NoData {
            title: section.name.clone(),
        });
        return;
    }

    let mut series: Vec<ChartSeries> = section
        .series
        .iter()
        .filter(|s| !s.samples.is_empty())
        .map(|s| build_chart_series(s, multi_day))
        .collect();
    series.sort_by(|a, b| a.name.cmp(&b.name));

    doc.push(Block::Chart(ChartBlock {
        title: section.name.clone(),
        kind: ChartKind::from_style(&section.chart_style),
        unit: section.unit.clone(),
        show_data_label: section.show_data_label,
        multi_day,
        series,
    }));
}

fn push_text_section(doc: &mut CardDocument, section: &QuerySection) {
    if section.snapshots.is_empty() {
        doc.push(Block::NoData {
            title: section.name.clone(),
        });
        return;
    }

    let mut snapshots: Vec<&Snapshot> = section.snapshots.iter().collect();
    snapshots.sort_by(|a, b| a.label.cmp(&b.label));

    doc.push(Block::Text(TextBlock {
        title: section.name.clone(),
        unit: section.unit.clone(),
        lines: snapshots
            .into_iter()
            .map(|s| TextLine {
                label: s.label.clone(),
                value: format_value(s.value, &section.unit),
            })
            .collect(),
    }));
}

/// One series, re-sorted oldest-first, display labels disambiguated.
fn build_chart_series(series: &Series, multi_day: bool) -> ChartSeries {
    let mut samples = series.samples.clone();
    samples.sort_by_key(|s| s.unix);

    let mut seen: HashSet<String> = HashSet::new();
    let points = samples
        .iter()
        .enumerate()
        .map(|(seq, sample)| {
            let mut x = if multi_day && is_time_of_day(&sample.display) {
                format!("{} {}", date_prefix(sample.unix), sample.display)
            } else {
                sample.display.clone()
            };
            // Same display label twice in one series would silently merge
            // in the renderer; suffix the later point with its timestamp.
            if !seen.insert(x.clone()) {
                x = format!("{x}.{}", sample.unix);
                seen.insert(x.clone());
            }
            ChartPoint {
                x,
                y: sample.value,
                unix: sample.unix,
                seq,
            }
        })
        .collect();

    ChartSeries {
        name: series.label.clone(),
        points,
    }
}

/// A chart spans multiple days when one series carries more than one
/// calendar date, or repeats a time-of-day label. Best-effort display
/// heuristic, not a date attribution guarantee.
fn is_multi_day(series: &[Series]) -> bool {
    for s in series {
        let mut dates: HashSet<String> = HashSet::new();
        let mut displays: HashSet<&str> = HashSet::new();
        for sample in &s.samples {
            dates.insert(date_prefix(sample.unix));
            if dates.len() > 1 {
                return true;
            }
            if !displays.insert(sample.display.as_str()) {
                return true;
            }
        }
    }
    false
}

fn is_time_of_day(display: &str) -> bool {
    display.len() == 5 && display.as_bytes()[2] == b':'
}

fn date_prefix(unix: i64) -> String {
    Local
        .timestamp_opt(unix, 0)
        .single()
        .map(|dt| dt.format("%m/%d").to_string())
        .unwrap_or_default()
}

/// Format a value for text lines: up to two decimals, trailing zeros
/// trimmed, unit appended.
pub fn format_value(value: f64, unit: &str) -> String {
    let mut s = format!("{value:.2}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    format!("{s}{unit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulsecard_core::Sample;

    fn series(label: &str, points: &[(i64, f64, &str)]) -> Series {
        Series {
            label: label.into(),
            samples: points
                .iter()
                .map(|(unix, value, display)| Sample {
                    unix: *unix,
                    value: *value,
                    display: display.to_string(),
                })
                .collect(),
        }
    }

    fn chart_section(name: &str, order: i32, series_list: Vec<Series>) -> QuerySection {
        QuerySection {
            name: name.into(),
            display_order: order,
            mode: DisplayMode::Chart,
            chart_style: "area".into(),
            unit: "%".into(),
            show_data_label: false,
            series: series_list,
            snapshots: vec![],
        }
    }

    #[test]
    fn chart_points_are_resorted_oldest_first() {
        // Sampler order is newest-first; display must be ascending.
        let s = series(
            "pod-a",
            &[(300, 3.0, "09:00"), (200, 2.0, "08:00"), (100, 1.0, "07:00")],
        );
        let doc = compose(
            &CardStyle::default(),
            "pulsecard",
            vec![chart_section("cpu", 0, vec![s])],
        );
        let Block::Chart(chart) = &doc.blocks[0] else {
            panic!("expected chart block");
        };
        let unixes: Vec<i64> = chart.series[0].points.iter().map(|p| p.unix).collect();
        assert_eq!(unixes, vec![100, 200, 300]);
        assert_eq!(chart.series[0].name, "pod-a");
    }

    #[test]
    fn zero_points_become_no_data_block() {
        let doc = compose(
            &CardStyle::default(),
            "pulsecard",
            vec![chart_section("cpu", 0, vec![])],
        );
        assert!(matches!(&doc.blocks[0], Block::NoData { title } if title == "cpu"));
        assert!(!doc.blocks.iter().any(|b| matches!(b, Block::Chart(_))));
    }

    #[test]
    fn sections_sorted_by_order_then_name() {
        let doc = compose(
            &CardStyle::default(),
            "pulsecard",
            vec![
                chart_section("zeta", 1, vec![]),
                chart_section("alpha", 1, vec![]),
                chart_section("omega", 0, vec![]),
            ],
        );
        let titles: Vec<&str> = doc
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::NoData { title } => Some(title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec!["omega", "alpha", "zeta"]);
    }

    #[test]
    fn multi_day_series_get_date_prefixes() {
        let day = 86400;
        let s = series(
            "pod-a",
            &[(3 * day + 3600, 3.0, "09:00"), (2 * day, 2.0, "08:00"), (day, 1.0, "08:00")],
        );
        let doc = compose(
            &CardStyle::default(),
            "pulsecard",
            vec![chart_section("cpu", 0, vec![s])],
        );
        let Block::Chart(chart) = &doc.blocks[0] else {
            panic!("expected chart block");
        };
        assert!(chart.multi_day);
        for p in &chart.series[0].points {
            assert!(p.x.contains('/'), "expected date prefix in '{}'", p.x);
        }
    }

    #[test]
    fn colliding_display_labels_get_positional_suffix() {
        // Two distinct timestamps that render to the same display string.
        let s = series("pod-a", &[(86401, 2.0, "08:00"), (86400, 1.0, "08:00")]);
        let doc = compose(
            &CardStyle::default(),
            "pulsecard",
            vec![chart_section("cpu", 0, vec![s])],
        );
        let Block::Chart(chart) = &doc.blocks[0] else {
            panic!("expected chart block");
        };
        let xs: Vec<&str> = chart.series[0].points.iter().map(|p| p.x.as_str()).collect();
        assert_ne!(xs[0], xs[1]);
        assert!(xs[1].ends_with(".86401"), "got {:?}", xs);
    }

    #[test]
    fn both_mode_emits_chart_and_text() {
        let mut section = chart_section(
            "cpu",
            0,
            vec![series("pod-a", &[(100, 1.0, "07:00"), (200, 2.0, "08:00"),
                (300, 3.0, "09:00"), (400, 4.0, "10:00"), (500, 5.0, "11:00")])],
        );
        section.mode = DisplayMode::Both;
        section.snapshots = vec![
            Snapshot { label: "pod-b".into(), value: 2.0, at: Utc::now() },
            Snapshot { label: "pod-a".into(), value: 1.0, at: Utc::now() },
        ];
        let doc = compose(&CardStyle::default(), "pulsecard", vec![section]);
        assert!(matches!(&doc.blocks[0], Block::Chart(_)));
        let Block::Text(text) = &doc.blocks[1] else {
            panic!("expected text block");
        };
        // Alphabetical label order.
        assert_eq!(text.lines[0].label, "pod-a");
        assert_eq!(text.lines[1].label, "pod-b");
    }

    #[test]
    fn button_and_footer_appended_once() {
        let style = CardStyle {
            button_text: "Dashboard".into(),
            button_url: "https://grafana.example/d/1".into(),
            ..CardStyle::default()
        };
        let doc = compose(
            &style,
            "pulsecard",
            vec![chart_section("a", 0, vec![]), chart_section("b", 1, vec![])],
        );
        let actions = doc.blocks.iter().filter(|b| matches!(b, Block::Action { .. })).count();
        let footers = doc.blocks.iter().filter(|b| matches!(b, Block::Footer { .. })).count();
        assert_eq!(actions, 1);
        assert_eq!(footers, 1);
    }

    #[test]
    fn value_formatting_trims_zeros() {
        assert_eq!(format_value(1.5, "GiB"), "1.5GiB");
        assert_eq!(format_value(2.0, ""), "2");
        assert_eq!(format_value(0.857, "%"), "0.86%");
    }
}
