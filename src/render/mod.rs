//! Chart rendering
//!
//! A page is a headline above a 2x3 grid of charts. The drawing code is generic
//! over the plotters backend so the same page goes into the PDF and the SVG output.

pub mod pdf;

use crate::report::{DeviceChart, PageSummary};
use crate::stats::{AckRatio, ChannelCounts, Distribution};
use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontStyle;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub use pdf::PdfReport;

const RSSI_COLOR: RGBColor = RGBColor(31, 119, 180);
const SNR_COLOR: RGBColor = RGBColor(218, 165, 32);
const MTYPE_COLOR: RGBColor = RGBColor(75, 0, 130);
const DEVICE_COLOR: RGBColor = RGBColor(0, 128, 128);
const HOURLY_COLOR: RGBColor = RGBColor(88, 15, 65);
const NO_ACK_COLOR: RGBColor = RGBColor(140, 0, 15);
const ACK_COLOR: RGBColor = RGBColor(21, 176, 26);

fn bold(size: f64) -> TextStyle<'static> {
    ("sans-serif", size).into_font().style(FontStyle::Bold).into()
}

fn regular(size: f64) -> TextStyle<'static> {
    ("sans-serif", size).into_font().into()
}

/// Draw one report page onto `root`
pub fn draw_page<DB>(root: &DrawingArea<DB, Shift>, page: &PageSummary) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let body = root.titled(&page.headline, bold(28.0))?;
    let panels = body.split_evenly((2, 3));

    draw_distribution(&panels[0], "RSSI distribution", "RSSI in dB", &page.rssi, RSSI_COLOR)?;
    draw_distribution(
        &panels[1],
        "SNR distribution",
        "Signal to Noise Ratio",
        &page.snr,
        SNR_COLOR,
    )?;

    let (labels, counts): (Vec<String>, Vec<u32>) = page
        .message_types
        .iter()
        .map(|(mtype, count)| (mtype.label().to_string(), *count))
        .unzip();
    draw_categories(
        &panels[2],
        "Number of messages per message type",
        "Type of message",
        "Number of messages",
        &labels,
        &counts,
        MTYPE_COLOR,
    )?;

    match &page.devices {
        DeviceChart::Devices { shown, .. } => {
            let (labels, counts): (Vec<String>, Vec<u32>) = shown.iter().cloned().unzip();
            let title = format!("Number of messages of the {} most active devices", shown.len());
            draw_categories(
                &panels[3],
                &title,
                "Device Addresses (Hexadecimal)",
                "Number of messages",
                &labels,
                &counts,
                DEVICE_COLOR,
            )?;
        }
        DeviceChart::Channels(channels) => draw_channels(&panels[3], channels)?,
    }

    draw_ack_ratio(&panels[4], &page.ack)?;

    let (labels, counts): (Vec<String>, Vec<u32>) = page
        .hourly
        .iter()
        .map(|(hour, count)| (hour.to_string(), count))
        .unzip();
    draw_categories(
        &panels[5],
        "Packets received per hour since start of recording",
        "Hour since start of recording",
        "Number of received packets",
        &labels,
        &counts,
        HOURLY_COLOR,
    )?;

    Ok(())
}

fn draw_distribution<DB>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    x_desc: &str,
    dist: &Distribution,
    color: RGBColor,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let lo = *dist.range.start() as i32;
    let hi = *dist.range.end() as i32;
    let y_max = dist.max_count() + 1;

    let mut chart = ChartBuilder::on(area)
        .caption(title, bold(18.0))
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d((lo..hi).into_segmented(), 0u32..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(12)
        .x_label_formatter(&|v| match v {
            SegmentValue::Exact(v) | SegmentValue::CenterOf(v) => v.to_string(),
            SegmentValue::Last => String::new(),
        })
        .label_style(regular(12.0))
        .x_desc(x_desc)
        .y_desc("Number of messages")
        .axis_desc_style(bold(14.0))
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(color.filled())
            .margin(1)
            .data(dist.iter().map(|(value, count)| (value as i32, count))),
    )?;

    Ok(())
}

/// Bar chart with one labelled bar per category
fn draw_categories<DB>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    labels: &[String],
    counts: &[u32],
    color: RGBColor,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if labels.is_empty() {
        return draw_placeholder(area, title);
    }

    // A lone category still gets a two-segment axis
    let last = (labels.len() as u32).max(2) - 1;
    let y_max = counts.iter().copied().max().unwrap_or(0) + 1;
    let label = |index: &u32| labels.get(*index as usize).cloned().unwrap_or_default();

    let mut chart = ChartBuilder::on(area)
        .caption(title, bold(18.0))
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d((0u32..last).into_segmented(), 0u32..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len().min(24))
        .x_label_formatter(&|v| match v {
            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => label(i),
            SegmentValue::Last => String::new(),
        })
        .label_style(regular(12.0))
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(bold(14.0))
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(color.filled())
            .margin(8)
            .data(counts.iter().enumerate().map(|(i, count)| (i as u32, *count))),
    )?;

    Ok(())
}

fn draw_channels<DB>(area: &DrawingArea<DB, Shift>, channels: &ChannelCounts) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (labels, counts): (Vec<String>, Vec<u32>) = channels
        .channels
        .iter()
        .map(|(freq, count)| (ChannelCounts::label(*freq), *count))
        .unzip();

    draw_categories(
        area,
        "Number of messages received per frequency",
        "Channel frequency in MHz",
        "Number of messages",
        &labels,
        &counts,
        DEVICE_COLOR,
    )
}

fn draw_ack_ratio<DB>(area: &DrawingArea<DB, Shift>, ack: &AckRatio) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let title = "Acknowledgement vs. No Acknowledgement";
    if ack.total() == 0 {
        return draw_placeholder(area, title);
    }

    let area = area.titled(title, bold(18.0))?;
    let (width, height) = area.dim_in_pixel();

    // Guarded by the empty check above
    let acked_percent = ack.acked_percent().unwrap_or(0.0);
    let slices: Vec<(f64, RGBColor, String)> = [
        (
            ack.not_acked,
            NO_ACK_COLOR,
            format!("No Acknowledgement ({:.1}%)", 100.0 - acked_percent),
        ),
        (
            ack.acked,
            ACK_COLOR,
            format!("Acknowledgement ({:.1}%)", acked_percent),
        ),
    ]
    .into_iter()
    .filter(|(count, _, _)| *count > 0)
    .map(|(count, color, label)| (count as f64, color, label))
    .collect();

    let sizes: Vec<f64> = slices.iter().map(|s| s.0).collect();
    let colors: Vec<RGBColor> = slices.iter().map(|s| s.1).collect();
    // Slices are named and quantified in the legend
    let names: Vec<&str> = slices.iter().map(|_| "").collect();

    let center = (width as i32 / 2, height as i32 / 2);
    let radius = width.min(height) as f64 * 0.38;

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &names);
    pie.start_angle(-90.0);
    pie.donut_hole(radius * 0.5);
    area.draw(&pie)?;

    // Legend in the lower left corner
    let mut y = height as i32 - 20 * slices.len() as i32 - 8;
    for (_, color, label) in &slices {
        area.draw(&Rectangle::new([(12, y), (26, y + 14)], color.filled()))?;
        area.draw(&Text::new(label.as_str(), (32, y), regular(13.0)))?;
        y += 20;
    }

    Ok(())
}

fn draw_placeholder<DB>(area: &DrawingArea<DB, Shift>, title: &str) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = area.titled(title, bold(18.0))?;
    let (width, height) = area.dim_in_pixel();
    let style = regular(16.0).pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new(
        "No packets",
        (width as i32 / 2, height as i32 / 2),
        style,
    ))?;
    Ok(())
}

/// Render one page as an SVG document
pub fn render_svg(page: &PageSummary, size: (u32, u32)) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        draw_page(&root, page)?;
        root.present()?;
    }
    Ok(svg)
}

/// Write every page as `page-NN.svg` into `dir`, creating it when missing
pub fn write_svg_pages(
    dir: impl AsRef<Path>,
    pages: &[PageSummary],
    size: (u32, u32),
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create SVG directory: {}", dir.display()))?;

    let mut written = Vec::with_capacity(pages.len());
    for (index, page) in pages.iter().enumerate() {
        let path = dir.join(format!("page-{:02}.svg", index + 1));
        let svg = render_svg(page, size)?;
        fs::write(&path, svg)
            .with_context(|| format!("Failed to write SVG page: {}", path.display()))?;
        info!(path = %path.display(), "Wrote SVG page");
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::record;
    use crate::config::Config;

    #[test]
    fn test_svg_overview_page() {
        let mut acked = record(2_000, "260B3C4D", -80, 3);
        acked.ack = true;
        let records = vec![record(1_000, "26011BDA", -97, 7), acked];
        let page = PageSummary::build(&records, &Config::default(), None).unwrap();

        let svg = render_svg(&page, (1296, 864)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Overview of all 2 devices"));
        assert!(svg.contains("RSSI distribution"));
        assert!(svg.contains("SNR distribution"));
        assert!(svg.contains("Number of messages per message type"));
        assert!(svg.contains("Acknowledgement vs. No Acknowledgement"));
        assert!(svg.contains("Packets received per hour since start of recording"));
        assert!(svg.contains("No Acknowledgement (50.0%)"));
        assert!(svg.contains("Acknowledgement (50.0%)"));
    }

    #[test]
    fn test_svg_legend_skips_empty_slice() {
        let mut acked = record(1_000, "26011BDA", -80, 3);
        acked.ack = true;
        let page = PageSummary::build(&[acked], &Config::default(), None).unwrap();

        let svg = render_svg(&page, (1296, 864)).unwrap();
        assert!(svg.contains("Acknowledgement (100.0%)"));
        assert!(!svg.contains("No Acknowledgement ("));
    }

    #[test]
    fn test_write_svg_pages_creates_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("pages").join("svg");
        let config = Config::default();
        let records = vec![record(1_000, "26011BDA", -97, 7), record(2_000, "260B3C4D", -80, 3)];
        let pages = vec![
            PageSummary::build(&records, &config, None).unwrap(),
            PageSummary::build(&records[..1], &config, None).unwrap(),
        ];

        let written = write_svg_pages(&dir, &pages, config.page.size()).unwrap();
        assert_eq!(written, vec![dir.join("page-01.svg"), dir.join("page-02.svg")]);

        let second = fs::read_to_string(dir.join("page-02.svg")).unwrap();
        assert!(second.contains("Overview of the device with the device address 26011BDA"));
        assert!(!dir.join("page-03.svg").exists());
    }

    #[test]
    fn test_svg_single_device_page() {
        let records = vec![record(1_000, "26011BDA", -97, 7)];
        let page = PageSummary::build(&records, &Config::default(), None).unwrap();

        let svg = render_svg(&page, (1296, 864)).unwrap();
        assert!(svg.contains("Number of messages received per frequency"));
        assert!(svg.contains("Channel frequency in MHz"));
    }

    #[test]
    fn test_svg_empty_page() {
        let page = PageSummary::build(&[], &Config::default(), None).unwrap();

        let svg = render_svg(&page, (1296, 864)).unwrap();
        assert!(svg.contains("No packets recorded"));
        assert!(svg.contains("No packets"));
    }
}
