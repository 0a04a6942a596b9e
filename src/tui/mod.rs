//! Ratatui-based terminal UI.
//!
//! The TUI fits the selected CSV once, then renders the measured points and the
//! fitted model as a Nyquist chart or as Bode charts (`|Z|` and phase), with the
//! parameter table alongside. Settings can be toggled and the data refit
//! without leaving the screen.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::app::pipeline::{RunOutput, run_fit_with_data};
use crate::domain::{FitConfig, FitResult, ImpedancePoint, Weighting};
use crate::error::AppError;
use crate::io::load_spectrum;
use crate::plot::model_curve;

mod plotters_chart;

use plotters_chart::EisPlottersChart;

/// Curve samples for the fitted model.
const CURVE_SAMPLES: usize = 200;

/// Start the TUI for an already-resolved configuration.
pub fn run(config: FitConfig) -> Result<(), AppError> {
    // Load and fit before touching the terminal so errors print normally.
    let mut app = App::new(config)?;

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Nyquist,
    Bode,
}

impl View {
    fn toggle(self) -> Self {
        match self {
            View::Nyquist => View::Bode,
            View::Bode => View::Nyquist,
        }
    }
}

struct App {
    config: FitConfig,
    run: RunOutput,
    view: View,
    /// Index into `run.selection.fits` of the circuit being displayed.
    shown: usize,
    status: String,
}

impl App {
    fn new(config: FitConfig) -> Result<Self, AppError> {
        let ingest = load_spectrum(&config.csv_path, config.layout)?;
        let run = run_fit_with_data(&config, ingest)?;
        let shown = best_index(&run);
        Ok(Self {
            config,
            run,
            view: View::Nyquist,
            shown,
            status: "Fitted.".to_string(),
        })
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('v') => {
                self.view = self.view.toggle();
                self.status = format!("view: {:?}", self.view);
            }
            KeyCode::Char('f') => {
                self.config.keep_all = !self.config.keep_all;
                let label = if self.config.keep_all { "off" } else { "on" };
                self.refit(format!("quadrant filter {label}"), false);
            }
            KeyCode::Char('w') => {
                self.config.weighting = match self.config.weighting {
                    Weighting::Unit => Weighting::Modulus,
                    Weighting::Modulus => Weighting::Unit,
                };
                self.refit(format!("weighting: {:?}", self.config.weighting), false);
            }
            KeyCode::Char('s') => {
                self.config.starts = next_starts(self.config.starts);
                self.refit(format!("starts: {}", self.config.starts), false);
            }
            KeyCode::Char('r') => self.refit("reloaded".to_string(), true),
            KeyCode::Char('c') | KeyCode::Right => {
                let n = self.run.selection.fits.len();
                self.shown = (self.shown + 1) % n.max(1);
            }
            KeyCode::Left => {
                let n = self.run.selection.fits.len().max(1);
                self.shown = (self.shown + n - 1) % n;
            }
            _ => {}
        }
        false
    }

    /// Refit with the current settings; on failure keep the previous result.
    fn refit(&mut self, label: String, reload: bool) {
        let ingest = if reload {
            match load_spectrum(&self.config.csv_path, self.config.layout) {
                Ok(ingest) => ingest,
                Err(err) => {
                    self.status = format!("{label}: {err}");
                    return;
                }
            }
        } else {
            self.run.ingest.clone()
        };

        match run_fit_with_data(&self.config, ingest) {
            Ok(run) => {
                self.shown = best_index(&run);
                self.run = run;
                self.status = label;
            }
            Err(err) => {
                self.status = format!("{label}: {err}");
            }
        }
    }

    fn shown_fit(&self) -> &FitResult {
        self.run
            .selection
            .fits
            .get(self.shown)
            .unwrap_or(&self.run.selection.best)
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let fit = self.shown_fit();
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("eis", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" - {}", self.config.csv_path.display())),
        ]));

        let chosen = if fit.circuit == self.run.selection.best.circuit {
            " (best)"
        } else {
            ""
        };
        lines.push(Line::from(Span::styled(
            format!(
                "circuit: {}{chosen} | n={} of {} | filter: {} | weighting: {:?} | starts: {}",
                fit.circuit,
                self.run.stats.n_points,
                self.run.ingest.rows_used,
                if self.config.keep_all { "off" } else { "first quadrant" },
                self.config.weighting,
                self.config.starts,
            ),
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "mean error={:.4e} | rmse={:.4e} | bic={:.3} | iters={}{}",
                fit.quality.mean_abs_error,
                fit.quality.rmse,
                fit.quality.bic,
                fit.quality.iterations,
                if fit.quality.converged { "" } else { " (not converged)" },
            ),
            Style::default().fg(Color::Gray),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(40)])
            .split(area);

        match self.view {
            View::Nyquist => {
                let series = chart_series(&self.run.points, self.shown_fit(), SeriesKind::Nyquist);
                self.draw_chart(frame, chunks[0], "Nyquist", &series);
            }
            View::Bode => {
                let halves = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .split(chunks[0]);
                let magnitude = chart_series(&self.run.points, self.shown_fit(), SeriesKind::Magnitude);
                let phase = chart_series(&self.run.points, self.shown_fit(), SeriesKind::Phase);
                self.draw_chart(frame, halves[0], "Bode |Z|", &magnitude);
                self.draw_chart(frame, halves[1], "Bode phase", &phase);
            }
        }
        self.draw_parameters(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect, title: &str, series: &ChartSeries) {
        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let (chart_rect, insets) = chart_layout(inner);
        let widget = EisPlottersChart {
            curve: &series.curve,
            points: &series.points,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, series);
        }
    }

    fn draw_parameters(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let fit = self.shown_fit();
        let items: Vec<ListItem> = fit
            .circuit
            .params()
            .iter()
            .zip(&fit.parameters)
            .zip(&fit.conf)
            .map(|((info, value), conf)| {
                let conf = if conf.is_finite() {
                    format!("±{conf:.1e}")
                } else {
                    "±n/a".to_string()
                };
                ListItem::new(format!("{:<7} {value:>9.3e} {conf:<9} {}", info.name, info.unit))
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .title("Estimated parameters")
                .borders(Borders::ALL),
        );
        frame.render_widget(list, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "v view  f filter  w weighting  s starts  c/←/→ circuit  r reload  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn best_index(run: &RunOutput) -> usize {
    run.selection
        .fits
        .iter()
        .position(|f| f.circuit == run.selection.best.circuit)
        .unwrap_or(0)
}

fn next_starts(current: usize) -> usize {
    match current {
        0 | 1 => 4,
        2..=4 => 16,
        _ => 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeriesKind {
    Nyquist,
    Magnitude,
    Phase,
}

/// Everything the chart widget and tick labels need.
#[derive(Debug, Clone)]
struct ChartSeries {
    curve: Vec<(f64, f64)>,
    points: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    kind: SeriesKind,
}

impl ChartSeries {
    fn x_label(&self) -> &'static str {
        match self.kind {
            SeriesKind::Nyquist => "Re(Z) [Ohm]",
            SeriesKind::Magnitude | SeriesKind::Phase => "f [Hz]",
        }
    }

    fn y_label(&self) -> &'static str {
        match self.kind {
            SeriesKind::Nyquist => "-Im(Z)",
            SeriesKind::Magnitude => "|Z|",
            SeriesKind::Phase => "-phase",
        }
    }

    fn fmt_x(&self, v: f64) -> String {
        match self.kind {
            SeriesKind::Nyquist => fmt_axis_value(v),
            SeriesKind::Magnitude | SeriesKind::Phase => fmt_axis_pow10(v),
        }
    }

    fn fmt_y(&self, v: f64) -> String {
        match self.kind {
            SeriesKind::Nyquist => fmt_axis_value(v),
            SeriesKind::Magnitude => fmt_axis_pow10(v),
            SeriesKind::Phase => fmt_axis_degrees(v),
        }
    }
}

/// Build chart series for Plotters. Bode axes use `log10` values.
fn chart_series(points: &[ImpedancePoint], fit: &FitResult, kind: SeriesKind) -> ChartSeries {
    let project: fn(&ImpedancePoint) -> (f64, f64) = match kind {
        SeriesKind::Nyquist => |p| (p.z.re, -p.z.im),
        SeriesKind::Magnitude => |p| (p.frequency.log10(), p.z.norm().log10()),
        SeriesKind::Phase => |p| (p.frequency.log10(), -p.z.arg().to_degrees()),
    };

    let curve: Vec<(f64, f64)> = model_curve(fit, points, CURVE_SAMPLES)
        .iter()
        .map(project)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    let observed: Vec<(f64, f64)> = points
        .iter()
        .map(project)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    let x_bounds = padded_bounds(observed.iter().chain(&curve).map(|&(x, _)| x));
    let y_bounds = padded_bounds(observed.iter().chain(&curve).map(|&(_, y)| y));

    ChartSeries {
        curve,
        points: observed,
        x_bounds,
        y_bounds,
        kind,
    }
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    if hi <= lo {
        let half = (lo.abs() * 0.5).max(0.5);
        return [lo - half, hi + half];
    }
    let pad = ((hi - lo) * 0.05).max(1e-12);
    [lo - pad, hi + pad]
}

fn fmt_axis_value(v: f64) -> String {
    if v.abs() >= 1e4 || (v != 0.0 && v.abs() < 1e-2) {
        format!("{v:.1e}")
    } else {
        format!("{v:.2}")
    }
}

fn fmt_axis_pow10(v: f64) -> String {
    fmt_axis_value(10f64.powf(v))
}

fn fmt_axis_degrees(v: f64) -> String {
    format!("{v:.0}°")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 9,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 4 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    series: &ChartSeries,
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let [x0, x1] = series.x_bounds;
    let [y0, y1] = series.y_bounds;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = series.fmt_x(x0 + u * (x1 - x0));
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label_len = label.chars().count() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = series.fmt_y(y0 + u * (y1 - y0));
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label_len = label.chars().count() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(series.x_label())
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(series.y_label())
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitQuality;
    use crate::models::Circuit;

    fn randles() -> (Vec<ImpedancePoint>, FitResult) {
        let circuit = Circuit::parse("R0-p(R1,C1)").unwrap();
        let params = vec![10.0, 100.0, 1e-5];
        let points = [1e4, 1e3, 1e2, 1e1, 1.0]
            .iter()
            .map(|&f| ImpedancePoint {
                frequency: f,
                z: circuit.impedance(&params, f),
            })
            .collect();
        let fit = FitResult {
            circuit,
            parameters: params,
            conf: vec![f64::NAN; 3],
            quality: FitQuality {
                sse: 0.0,
                rmse: 0.0,
                mean_abs_error: 0.0,
                aic: 0.0,
                bic: 0.0,
                n: 5,
                iterations: 0,
                converged: true,
            },
        };
        (points, fit)
    }

    #[test]
    fn nyquist_series_bounds_cover_points() {
        let (points, fit) = randles();
        let s = chart_series(&points, &fit, SeriesKind::Nyquist);
        assert_eq!(s.points.len(), 5);
        assert_eq!(s.curve.len(), CURVE_SAMPLES);
        for &(x, y) in s.points.iter().chain(&s.curve) {
            assert!(x >= s.x_bounds[0] && x <= s.x_bounds[1]);
            assert!(y >= s.y_bounds[0] && y <= s.y_bounds[1]);
        }
    }

    #[test]
    fn bode_series_use_log_frequency() {
        let (points, fit) = randles();
        let s = chart_series(&points, &fit, SeriesKind::Magnitude);
        assert!((s.points[0].0 - 4.0).abs() < 1e-12);
        assert!(s.x_bounds[0] < 0.0 && s.x_bounds[1] > 4.0);

        let phase = chart_series(&points, &fit, SeriesKind::Phase);
        assert!(phase.points.iter().all(|&(_, deg)| deg > 0.0 && deg < 90.0));
    }

    #[test]
    fn view_toggle_and_starts_cycle() {
        assert_eq!(View::Nyquist.toggle(), View::Bode);
        assert_eq!(View::Bode.toggle(), View::Nyquist);
        assert_eq!(next_starts(1), 4);
        assert_eq!(next_starts(4), 16);
        assert_eq!(next_starts(16), 1);
    }

    #[test]
    fn axis_formatters() {
        assert_eq!(fmt_axis_value(12.5), "12.50");
        assert_eq!(fmt_axis_value(123456.0), "1.2e5");
        assert_eq!(fmt_axis_pow10(2.0), "100.00");
        assert_eq!(fmt_axis_degrees(45.4), "45°");
    }
}
