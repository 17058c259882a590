use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::{Value, json};

use crate::clients::errors::{Error, Result};
use crate::tables::Table;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
/// Marker diameter, in pixels, of the most popular track.
const MAX_MARKER_PX: f64 = 40.0;

/// A chart that can be drawn by Plotly.
pub trait Chart {
    /// Page and figure title.
    fn title(&self) -> &str;

    /// Plotly figure (`data` + `layout`).
    fn figure(&self) -> Value;
}

/// One track on the scatter chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    /// x axis, in BPM.
    pub tempo: f64,
    /// y axis.
    pub danceability: f64,
    /// Marker size and colour.
    pub popularity: f64,
    /// Hover label.
    pub name: String,
}

/// Tempo against danceability, sized and coloured by popularity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterChart {
    /// Figure title.
    pub title: String,
    /// One point per track, in table order.
    pub points: Vec<ScatterPoint>,
}

/// Share of each genre among the top artists.
#[derive(Debug, Clone, PartialEq)]
pub struct PieChart {
    /// Figure title.
    pub title: String,
    /// Genre label and its count.
    pub slices: Vec<(String, f64)>,
}

fn numbers(table: &Table, column: &str) -> Result<Vec<f64>> {
    required(table, column)?
        .into_iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| Error::ChartError(format!("{column} holds a non-number: {v}")))
        })
        .collect()
}

fn labels(table: &Table, column: &str) -> Result<Vec<String>> {
    Ok(required(table, column)?
        .into_iter()
        .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string))
        .collect())
}

fn required<'t>(table: &'t Table, column: &str) -> Result<Vec<&'t Value>> {
    table
        .column(column)
        .ok_or_else(|| Error::ChartError(format!("table has no {column} column")))
}

impl ScatterChart {
    /// Reads the `Tempo`, `Danceability`, `Popularity` and `Name` columns.
    pub fn from_tracks(tracks: &Table) -> Result<Self> {
        let tempo = numbers(tracks, "Tempo")?;
        let danceability = numbers(tracks, "Danceability")?;
        let popularity = numbers(tracks, "Popularity")?;
        let names = labels(tracks, "Name")?;

        let points = names
            .into_iter()
            .zip(tempo)
            .zip(danceability)
            .zip(popularity)
            .map(|(((name, tempo), danceability), popularity)| ScatterPoint {
                tempo,
                danceability,
                popularity,
                name,
            })
            .collect();
        Ok(ScatterChart {
            title: "Plot of Song Popularity using Tempo against Danceability".to_string(),
            points,
        })
    }
}

impl Chart for ScatterChart {
    fn title(&self) -> &str {
        &self.title
    }

    fn figure(&self) -> Value {
        let popularity: Vec<f64> = self.points.iter().map(|p| p.popularity).collect();
        let max = popularity.iter().copied().fold(0.0_f64, f64::max);
        // Plotly's recipe for area-scaled bubbles
        let sizeref = if max > 0.0 {
            2.0 * max / MAX_MARKER_PX.powi(2)
        } else {
            1.0
        };
        json!({
            "data": [{
                "type": "scatter",
                "mode": "markers",
                "x": self.points.iter().map(|p| p.tempo).collect::<Vec<_>>(),
                "y": self.points.iter().map(|p| p.danceability).collect::<Vec<_>>(),
                "hovertext": self.points.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
                "hovertemplate": "<b>%{hovertext}</b><br>Tempo=%{x}<br>Danceability=%{y}<br>Popularity=%{marker.color}<extra></extra>",
                "marker": {
                    "size": popularity,
                    "sizemode": "area",
                    "sizeref": sizeref,
                    "sizemin": 4,
                    "color": popularity,
                    "colorscale": "Plasma",
                    "showscale": true,
                    "colorbar": { "title": { "text": "Popularity" } },
                },
            }],
            "layout": {
                "title": { "text": self.title },
                "xaxis": { "title": { "text": "Tempo" } },
                "yaxis": { "title": { "text": "Danceability" } },
            },
        })
    }
}

impl PieChart {
    /// Reads the `Genre` and `Count` columns.
    pub fn from_genres(genres: &Table) -> Result<Self> {
        let names = labels(genres, "Genre")?;
        let counts = numbers(genres, "Count")?;
        Ok(PieChart {
            title: "Your Genre Breakdown".to_string(),
            slices: names.into_iter().zip(counts).collect(),
        })
    }
}

impl Chart for PieChart {
    fn title(&self) -> &str {
        &self.title
    }

    fn figure(&self) -> Value {
        json!({
            "data": [{
                "type": "pie",
                "labels": self.slices.iter().map(|(g, _)| g.as_str()).collect::<Vec<_>>(),
                "values": self.slices.iter().map(|(_, n)| *n).collect::<Vec<_>>(),
                "sort": false,
            }],
            "layout": { "title": { "text": self.title } },
        })
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standalone HTML page drawing `chart` with Plotly.
pub fn render_html(chart: &dyn Chart) -> Result<String> {
    // "</" must not appear inside the inline script
    let figure = serde_json::to_string(&chart.figure())?.replace("</", "<\\/");
    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:90vh;"></div>
<script>
const figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout, {{responsive: true}});
</script>
</body>
</html>
"#,
        title = escape_html(chart.title()),
    ))
}

/// Writes `chart` as `dir/file_name`, creating `dir` if needed.
pub async fn write_chart(chart: &dyn Chart, dir: &Path, file_name: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, render_html(chart)?).await?;
    info!("Wrote \"{}\" to {path:?}", chart.title());
    Ok(path)
}

/// Opens a written chart in the default browser.
pub fn open_in_browser(path: &Path) -> Result<()> {
    let target = path
        .to_str()
        .ok_or_else(|| Error::ChartError(format!("path {path:?} is not valid UTF-8")))?;
    debug!("Opening {target}");
    webbrowser::open(target)?;
    Ok(())
}
