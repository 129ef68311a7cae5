use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Datelike, Local, NaiveDate};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use log::debug;
use plotters::prelude::*;
use plotters::style::FontTransform;

use crate::error::{Result, TrackerError};
use crate::record::RecordSet;

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the date axis
    pub x_label: String,

    /// Label for the duration axis
    pub y_label: String,

    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    /// Creates the default configuration for the tracker chart
    ///
    /// # Returns
    /// * `ChartOptions` - Default configuration with:
    ///   - "Chore Adherence Over Time" title
    ///   - "Date" and "Duration (minutes)" axis labels
    ///   - 1000x600 pixel dimensions
    fn default() -> Self {
        Self {
            title: "Chore Adherence Over Time".to_string(),
            x_label: "Date".to_string(),
            y_label: "Duration (minutes)".to_string(),
            width: 1000,
            height: 600,
        }
    }
}

/// All dated entries of one task, ordered by date.
///
/// Entries whose duration could not be read keep their place as `None` so the
/// line can be broken there.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskSeries {
    pub task: String,
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl TaskSeries {
    /// Runs of consecutive points with a known duration.
    pub fn segments(&self) -> Vec<Vec<(NaiveDate, f64)>> {
        let mut segments = Vec::new();
        let mut current = Vec::new();

        for &(date, duration) in &self.points {
            match duration {
                Some(minutes) => current.push((date, minutes)),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }

        segments
    }
}

/// Groups records into one series per task.
///
/// Records with an unreadable date are left out. Series appear in the order
/// their task was first seen; points are sorted by date, and entries sharing
/// a date stay in insertion order.
///
/// # Arguments
/// * `records` - Every record currently in the store
///
/// # Returns
/// * `Vec<TaskSeries>` - One series per distinct task label
///
/// # Examples
/// ```
/// use chore_tracker::{Record, RecordSet, series};
///
/// let records: RecordSet = vec![
///     Record::new("2024-01-02", "Dishes", "20"),
///     Record::new("2024-01-01", "Dishes", "10"),
/// ]
/// .into();
///
/// let all = series(&records);
/// assert_eq!(all.len(), 1);
/// assert_eq!(all[0].points[0].1, Some(10.0));
/// ```
pub fn series(records: &RecordSet) -> Vec<TaskSeries> {
    let mut groups: Vec<TaskSeries> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let Some(date) = record.parsed_date() else {
            debug!("Skipping record with unreadable date {:?}", record.date);
            continue;
        };

        let slot = *slots.entry(record.task.as_str()).or_insert_with(|| {
            groups.push(TaskSeries {
                task: record.task.clone(),
                points: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].points.push((date, record.parsed_duration()));
    }

    for group in &mut groups {
        group.points.sort_by_key(|&(date, _)| date);
    }

    groups
}

/// Renders the duration-over-time line chart as PNG bytes.
///
/// One marked line is drawn per task. An empty record set still produces a
/// valid chart with axes, grid and title.
///
/// # Arguments
/// * `records` - Records to plot
/// * `options` - Chart title, axis labels and image size
///
/// # Returns
/// * `Result<Vec<u8>>` - PNG image data or an error
///
/// # Errors
/// * `TrackerError::Chart` if the size is zero or drawing fails
/// * `TrackerError::Image` if PNG encoding fails
///
/// # Implementation Notes
/// * Draws into an in-memory RGB buffer, no temporary file is written
/// * Dates become day numbers on the x axis and are formatted back for labels
/// * The duration axis starts at zero unless some duration is negative
pub fn render(records: &RecordSet, options: &ChartOptions) -> Result<Vec<u8>> {
    if options.width == 0 || options.height == 0 {
        return Err(TrackerError::Chart(format!(
            "chart dimensions must be non-zero, got {}x{}",
            options.width, options.height
        )));
    }

    let all_series = series(records);
    let (x_min, x_max) = day_range(&all_series);
    let (y_min, y_max) = duration_range(&all_series);
    let pin = |minutes: f64| minutes.clamp(y_min, y_max);

    let mut pixels = vec![0u8; options.width as usize * options.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(20)
            .x_label_area_size(100)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .x_labels(12)
            .y_labels(10)
            .x_label_style(
                ("sans-serif", 14)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .x_label_formatter(&|day| format_day(*day))
            .draw()
            .map_err(chart_error)?;

        for (index, task_series) in all_series.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();

            for segment in task_series.segments() {
                chart
                    .draw_series(LineSeries::new(
                        segment.iter().map(|&(date, minutes)| (to_day(date), pin(minutes))),
                        color.stroke_width(2),
                    ))
                    .map_err(chart_error)?;
            }

            chart
                .draw_series(task_series.points.iter().filter_map(|&(date, duration)| {
                    duration.map(|minutes| Circle::new((to_day(date), pin(minutes)), 4, color.filled()))
                }))
                .map_err(chart_error)?
                .label(task_series.task.as_str())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
        }

        if !all_series.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(chart_error)?;
        }

        root.present().map_err(chart_error)?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        &pixels,
        options.width,
        options.height,
        ColorType::Rgb8,
    )?;

    debug!(
        "Rendered chart with {} series ({} bytes)",
        all_series.len(),
        png.len()
    );
    Ok(png)
}

/// Renders the chart and wraps it as a `data:` URI for an `<img>` tag.
///
/// # Arguments
/// * `records` - Records to plot
/// * `options` - Chart styling options
///
/// # Returns
/// * `Result<String>` - `data:image/png;base64,...` or an error from [`render`]
pub fn render_data_uri(records: &RecordSet, options: &ChartOptions) -> Result<String> {
    let png = render(records, options)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Largest magnitude the duration axis extends to. Points beyond it are pinned
/// to the edge of the chart.
const AXIS_LIMIT: f64 = 1e300;

fn chart_error<E: std::fmt::Display>(err: E) -> TrackerError {
    TrackerError::Chart(err.to_string())
}

fn to_day(date: NaiveDate) -> i32 {
    date.num_days_from_ce()
}

fn format_day(day: i32) -> String {
    NaiveDate::from_num_days_from_ce_opt(day)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// One day of padding on either side keeps the first and last points off the axes.
fn day_range(all_series: &[TaskSeries]) -> (i32, i32) {
    let days: Vec<i32> = all_series
        .iter()
        .flat_map(|s| s.points.iter().map(|&(date, _)| to_day(date)))
        .collect();

    match (days.iter().min(), days.iter().max()) {
        (Some(&min), Some(&max)) => (min - 1, max + 1),
        _ => {
            let today = to_day(Local::now().date_naive());
            (today - 1, today + 1)
        }
    }
}

fn duration_range(all_series: &[TaskSeries]) -> (f64, f64) {
    let values: Vec<f64> = all_series
        .iter()
        .flat_map(|s| s.points.iter().filter_map(|&(_, duration)| duration))
        .collect();

    if values.is_empty() {
        return (0.0, 100.0);
    }

    let min_val = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_val = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let padding = ((max_val - min_val) * 0.1).max(1.0);

    // The axis always includes zero. Bounds stay within AXIS_LIMIT since
    // plotters cannot lay out ticks on an axis reaching infinity.
    let y_min = if min_val < 0.0 { min_val - padding } else { 0.0 };
    let y_max = max_val + padding;
    (
        y_min.clamp(-AXIS_LIMIT, 0.0),
        y_max.clamp(0.0, AXIS_LIMIT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn two_task_records() -> RecordSet {
        vec![
            Record::new("2024-01-02", "A", "20"),
            Record::new("2024-01-03", "B", "15"),
            Record::new("2024-01-01", "A", "10"),
            Record::new("2024-01-01", "B", "5"),
        ]
        .into()
    }

    #[test]
    fn groups_by_task_and_sorts_by_date() {
        let all = series(&two_task_records());

        assert_eq!(all.len(), 2);
        assert_eq!(
            all[0],
            TaskSeries {
                task: "A".to_string(),
                points: vec![(date(2024, 1, 1), Some(10.0)), (date(2024, 1, 2), Some(20.0))],
            }
        );
        assert_eq!(
            all[1],
            TaskSeries {
                task: "B".to_string(),
                points: vec![(date(2024, 1, 1), Some(5.0)), (date(2024, 1, 3), Some(15.0))],
            }
        );
    }

    #[test]
    fn equal_dates_keep_insertion_order() {
        let records: RecordSet = vec![
            Record::new("2024-01-02", "A", "3"),
            Record::new("2024-01-01", "A", "1"),
            Record::new("2024-01-01", "A", "2"),
        ]
        .into();

        let all = series(&records);

        let durations: Vec<_> = all[0].points.iter().map(|&(_, d)| d).collect();
        assert_eq!(durations, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn unreadable_dates_are_dropped_and_bad_durations_kept_as_none() {
        let records: RecordSet = vec![
            Record::new("not a date", "A", "10"),
            Record::new("2024-01-01", "A", "n/a"),
            Record::new("2024-01-02", "A", "7"),
        ]
        .into();

        let all = series(&records);

        assert_eq!(all.len(), 1);
        assert_eq!(
            all[0].points,
            vec![(date(2024, 1, 1), None), (date(2024, 1, 2), Some(7.0))]
        );
    }

    #[test]
    fn missing_durations_break_the_line() {
        let task = TaskSeries {
            task: "A".to_string(),
            points: vec![
                (date(2024, 1, 1), Some(1.0)),
                (date(2024, 1, 2), Some(2.0)),
                (date(2024, 1, 3), None),
                (date(2024, 1, 4), None),
                (date(2024, 1, 5), Some(5.0)),
            ],
        };

        assert_eq!(
            task.segments(),
            vec![
                vec![(date(2024, 1, 1), 1.0), (date(2024, 1, 2), 2.0)],
                vec![(date(2024, 1, 5), 5.0)],
            ]
        );
    }

    #[test]
    fn empty_set_renders_a_decodable_image() {
        let options = ChartOptions::default();

        let png = render(&RecordSet::new(), &options).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), options.width);
        assert_eq!(decoded.height(), options.height);
    }

    #[test]
    fn renders_records_at_requested_size() {
        let options = ChartOptions {
            width: 640,
            height: 480,
            ..ChartOptions::default()
        };

        let png = render(&two_task_records(), &options).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }

    #[test]
    fn renders_when_every_duration_is_missing() {
        let records: RecordSet = vec![Record::new("2024-01-01", "A", "n/a")].into();

        assert!(render(&records, &ChartOptions::default()).is_ok());
    }

    #[test]
    fn zero_sized_chart_is_rejected() {
        let options = ChartOptions {
            width: 0,
            ..ChartOptions::default()
        };

        assert!(matches!(
            render(&RecordSet::new(), &options),
            Err(TrackerError::Chart(_))
        ));
    }

    #[test]
    fn data_uri_wraps_png_bytes() {
        let uri = render_data_uri(&two_task_records(), &ChartOptions::default()).unwrap();

        let encoded = uri.strip_prefix("data:image/png;base64,").unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        assert!(image::load_from_memory(&png).is_ok());
    }

    #[test]
    fn huge_durations_still_render() {
        let records: RecordSet = vec![
            Record::new("2024-01-01", "A", "1.7e308"),
            Record::new("2024-01-02", "A", "0"),
            Record::new("2024-01-03", "B", "-1.7e308"),
        ]
        .into();

        let png = render(&records, &ChartOptions::default()).unwrap();

        assert!(image::load_from_memory(&png).is_ok());
    }

    #[test]
    fn duration_axis_stays_finite() {
        let all = series(
            &vec![
                Record::new("2024-01-01", "A", "1.7e308"),
                Record::new("2024-01-02", "A", "-1.7e308"),
            ]
            .into(),
        );

        let (low, high) = duration_range(&all);

        assert_eq!((low, high), (-AXIS_LIMIT, AXIS_LIMIT));
    }

    #[test]
    fn negative_only_durations_keep_a_non_empty_axis() {
        let all = series(&vec![Record::new("2024-01-01", "A", "-10")].into());

        let (low, high) = duration_range(&all);

        assert!(low < -10.0);
        assert_eq!(high, 0.0);
    }

    #[test]
    fn duration_axis_starts_at_zero_for_positive_values() {
        let all = series(&two_task_records());

        let (low, high) = duration_range(&all);

        assert_eq!(low, 0.0);
        assert!(high > 20.0);
    }
}
