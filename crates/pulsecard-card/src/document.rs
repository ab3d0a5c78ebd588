//! The typed notification document and its wire serialization.
//!
//! Blocks are a tagged union built by the composer; `to_wire` flattens
//! them into the chat backend's `{msg_type, card:{...}}` JSON once, at
//! the delivery boundary.

use chrono::Local;
use serde_json::{Value, json};

/// Chart types the delivery backend can render. Anything else is
/// remapped to its nearest supported analogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Area,
    Scatter,
    Bubble,
}

impl ChartKind {
    /// Coerce a configured style to a supported type. 3-D and radial
    /// styles collapse to their 2-D analogue; unknown styles default to
    /// a line chart.
    pub fn from_style(style: &str) -> Self {
        match style {
            "line" => ChartKind::Line,
            "bar" => ChartKind::Bar,
            "pie" => ChartKind::Pie,
            "area" => ChartKind::Area,
            "scatter" => ChartKind::Scatter,
            "bubble" => ChartKind::Bubble,
            "bar3d" | "funnel" => ChartKind::Bar,
            "line3d" | "radar" => ChartKind::Line,
            "gauge" => ChartKind::Pie,
            other => {
                tracing::debug!("Unknown chart style '{other}', using line");
                ChartKind::Line
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
            ChartKind::Area => "area",
            ChartKind::Scatter => "scatter",
            ChartKind::Bubble => "bubble",
        }
    }
}

/// One rendered chart point. `unix` and `seq` ride along so the renderer
/// never silently merges two distinct points with the same display label.
#[derive(Debug, Clone)]
pub struct ChartPoint {
    pub x: String,
    pub y: f64,
    pub unix: i64,
    pub seq: usize,
}

/// One chart series, oldest-first, ready for display.
#[derive(Debug, Clone)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone)]
pub struct ChartBlock {
    pub title: String,
    pub kind: ChartKind,
    pub unit: String,
    pub show_data_label: bool,
    pub multi_day: bool,
    pub series: Vec<ChartSeries>,
}

/// A "label: value" listing, rendered with tree prefixes.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub title: String,
    pub unit: String,
    pub lines: Vec<TextLine>,
}

#[derive(Debug, Clone)]
pub struct TextLine {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum Block {
    Chart(ChartBlock),
    Text(TextBlock),
    /// Explicit empty-state for a query that returned no points.
    NoData { title: String },
    Separator,
    Action { text: String, url: String },
    Footer { text: String },
}

/// The fully composed, transport-ready document.
#[derive(Debug, Clone)]
pub struct CardDocument {
    pub title: String,
    pub theme: String,
    pub blocks: Vec<Block>,
}

impl CardDocument {
    pub fn new(title: &str, theme: &str) -> Self {
        Self {
            title: title.to_string(),
            theme: theme.to_string(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    /// Serialize to the chat backend's interactive-card JSON.
    pub fn to_wire(&self) -> Value {
        let mut elements: Vec<Value> = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Chart(chart) => push_chart(&mut elements, chart),
                Block::Text(text) => push_text(&mut elements, text),
                Block::NoData { title } => {
                    elements.push(json!({
                        "tag": "markdown",
                        "content": format!("**{title}**"),
                    }));
                    elements.push(json!({
                        "tag": "markdown",
                        "content": "📊 *No data*: the query returned no points for the selected window.",
                    }));
                }
                Block::Separator => elements.push(json!({"tag": "hr"})),
                Block::Action { text, url } => elements.push(json!({
                    "tag": "action",
                    "actions": [{
                        "tag": "button",
                        "text": {"content": text, "tag": "plain_text"},
                        "type": "default",
                        "url": url,
                    }],
                })),
                Block::Footer { text } => elements.push(json!({
                    "tag": "note",
                    "elements": [{
                        "tag": "lark_md",
                        "content": format!("{} {}", text, Local::now().format("%Y-%m-%d %H:%M:%S")),
                    }],
                })),
            }
        }

        json!({
            "msg_type": "interactive",
            "card": {
                "config": {
                    "wide_screen_mode": true,
                    "enable_forward": true,
                },
                "header": {
                    "title": {"tag": "plain_text", "content": self.title},
                    "template": self.theme,
                },
                "elements": elements,
            },
        })
    }
}

fn push_chart(elements: &mut Vec<Value>, chart: &ChartBlock) {
    elements.push(json!({
        "tag": "markdown",
        "content": block_title(&chart.title, &chart.unit),
    }));

    let data: Vec<Value> = chart
        .series
        .iter()
        .map(|s| {
            json!({
                "values": s.points.iter().map(|p| json!({
                    "x": p.x,
                    "y": p.y,
                    "name": s.name,
                    "unix": p.unix,
                    "seq": p.seq,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();

    let series: Vec<Value> = (0..chart.series.len())
        .map(|i| {
            json!({
                "type": chart.kind.as_str(),
                "stack": false,
                "dataIndex": i,
                "label": {
                    "visible": chart.show_data_label,
                    "formatter": value_formatter(&chart.unit, "{y}"),
                },
                "seriesField": "name",
                "xField": if chart.kind == ChartKind::Bar {
                    json!(["x", "name"])
                } else {
                    json!("x")
                },
                "yField": "y",
            })
        })
        .collect();

    elements.push(json!({
        "tag": "chart",
        "chart_spec": {
            "type": "common",
            "data": data,
            "series": series,
            "axes": [
                {
                    "orient": "bottom",
                    "label": {
                        "visible": true,
                        "autoRotate": chart.multi_day,
                        "autoHide": false,
                        "autoEllipsis": false,
                        "style": {
                            "fontSize": if chart.multi_day { 10 } else { 12 },
                            "angle": if chart.multi_day { 45 } else { 0 },
                        },
                    },
                    "grid": {"visible": true, "alignTick": true},
                },
                {
                    "orient": "left",
                    "label": {
                        "visible": true,
                        "formatter": value_formatter(&chart.unit, "{label}"),
                    },
                },
            ],
            "legends": {"position": "bottom"},
            "tooltip": {
                "mark": {"content": [{"valueFormatter": value_formatter(&chart.unit, "{name}: {y}")}]},
                "dimension": {"content": [{"valueFormatter": value_formatter(&chart.unit, "{name}: {y}")}]},
            },
        },
    }));
}

fn push_text(elements: &mut Vec<Value>, text: &TextBlock) {
    elements.push(json!({
        "tag": "markdown",
        "content": block_title(&text.title, &text.unit),
    }));
    for (i, line) in text.lines.iter().enumerate() {
        let prefix = if i + 1 < text.lines.len() { "├─" } else { "└─" };
        elements.push(json!({
            "tag": "markdown",
            "content": format!("{prefix} {}: {}", line.label, line.value),
        }));
    }
}

fn block_title(title: &str, unit: &str) -> String {
    if unit.is_empty() {
        format!("**{title}**")
    } else {
        format!("**{title}** ({unit})")
    }
}

/// Unit-aware value formatter template for labels and tooltips.
fn value_formatter(unit: &str, base: &str) -> String {
    match unit {
        "" => base.to_string(),
        "%" => format!("{base}%"),
        other => format!("{base}{other}"),
    }
}
