use anyhow::Context;
use iced::{
    mouse, time,
    widget::{
        button,
        canvas::{self, Canvas, Frame, Geometry, Path, Stroke},
        column, row, scrollable, text, text_input, Column, Container, Row,
    },
    Alignment, Color, Element, Length, Point, Rectangle, Renderer, Size, Subscription, Task, Theme,
};
use parkcore::api::{
    BadgeVariant, CongestionLevel, DetectionSummary, ForecastPoint, SlotCell, ZoneId,
};
use parkcore::controllers::{
    FetchOutcome, GallerySource, GalleryState, RefreshReport, TrafficState, UploadState,
};
use parkcore::telemetry::Metrics;
use parkcore::{ClientConfig, Dashboard, HttpApi};
use std::path::PathBuf;

const CONFIG_ENV: &str = "PARKSIGHT_CONFIG";
const HISTORY_LIMIT: usize = 20;
const LEVELS: [CongestionLevel; 5] = [
    CongestionLevel::Critical,
    CongestionLevel::High,
    CongestionLevel::Moderate,
    CongestionLevel::Low,
    CongestionLevel::Minimal,
];

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = load_config()?;
    log::info!("dashboard talking to {}", config.base_url);
    let dashboard = Dashboard::connect(config.clone()).context("building HTTP client")?;

    iced::application(
        move || Visualizer::boot(dashboard.clone(), config.clone()),
        Visualizer::update,
        Visualizer::view,
    )
    .title(application_title)
    .subscription(application_subscription)
    .theme(application_theme)
    .run()
    .context("running dashboard window")
}

fn load_config() -> anyhow::Result<ClientConfig> {
    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => ClientConfig::load(&path)
            .with_context(|| format!("loading {}", PathBuf::from(&path).display()))?,
        None => ClientConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn application_title(_: &Visualizer) -> String {
    "ParkSight Dashboard".into()
}

/// The polling timer only exists while the Traffic tab is on screen.
fn application_subscription(state: &Visualizer) -> Subscription<Message> {
    if state.tab == Tab::Traffic && state.config.auto_refresh {
        time::every(state.config.refresh_interval()).map(|_| Message::Tick)
    } else {
        Subscription::none()
    }
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Parking,
    Traffic,
}

struct Visualizer {
    dashboard: Dashboard<HttpApi>,
    config: ClientConfig,
    tab: Tab,
    path: String,
    upload: UploadState,
    gallery: GalleryState,
    traffic: TrafficState,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
enum Message {
    TabSelected(Tab),
    PathChanged(String),
    Detect,
    Detected(Result<DetectionSummary, String>),
    GalleryPrevious,
    GalleryNext,
    GallerySelected(usize),
    GalleryRefresh,
    GalleryRefreshed(GallerySource),
    Tick,
    RefreshTraffic,
    TrafficRefreshed(RefreshReport),
    ZoneSelected(ZoneId),
    ForecastLoaded(ZoneId, FetchOutcome),
}

impl Visualizer {
    fn boot(dashboard: Dashboard<HttpApi>, config: ClientConfig) -> (Self, Task<Message>) {
        let gallery = dashboard.gallery().snapshot();
        let refresh = Task::perform(refresh_gallery(dashboard.clone()), Message::GalleryRefreshed);
        (
            Visualizer {
                upload: dashboard.upload.snapshot(),
                traffic: dashboard.traffic.snapshot(),
                gallery,
                dashboard,
                config,
                tab: Tab::Parking,
                path: String::new(),
                status: "Select a parking lot image to analyse.".into(),
                history: Vec::new(),
            },
            refresh,
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                let entering_traffic = tab == Tab::Traffic && state.tab != Tab::Traffic;
                state.tab = tab;
                if entering_traffic {
                    state.push_history("Traffic view opened".into());
                    return Task::perform(
                        refresh_traffic(state.dashboard.clone()),
                        Message::TrafficRefreshed,
                    );
                }
                Task::none()
            }
            Message::PathChanged(path) => {
                state.path = path;
                Task::none()
            }
            Message::Detect => {
                let path = state.path.trim();
                if state.upload.busy || path.is_empty() {
                    return Task::none();
                }
                state.upload.busy = true;
                state.status = "Analysing...".into();
                Task::perform(
                    detect_file(state.dashboard.clone(), PathBuf::from(path)),
                    Message::Detected,
                )
            }
            Message::Detected(Ok(summary)) => {
                state.sync_parking();
                state.status = format!(
                    "{} available / {} occupied, accuracy {}",
                    summary.available,
                    summary.occupied,
                    summary.accuracy_label()
                );
                state.push_history(format!("Detection: {}", state.status));
                Task::none()
            }
            Message::Detected(Err(err)) => {
                state.sync_parking();
                state.status = format!("Detection error: {err}");
                state.push_history(state.status.clone());
                Task::none()
            }
            Message::GalleryPrevious => {
                state.dashboard.gallery().previous();
                state.sync_parking();
                Task::none()
            }
            Message::GalleryNext => {
                state.dashboard.gallery().next();
                state.sync_parking();
                Task::none()
            }
            Message::GallerySelected(index) => {
                state.dashboard.gallery().select(index);
                state.sync_parking();
                Task::none()
            }
            Message::GalleryRefresh => {
                Task::perform(refresh_gallery(state.dashboard.clone()), Message::GalleryRefreshed)
            }
            Message::GalleryRefreshed(source) => {
                state.sync_parking();
                state.push_history(format!(
                    "Gallery: {} image(s), {:?}",
                    state.gallery.len(),
                    source
                ));
                Task::none()
            }
            Message::Tick | Message::RefreshTraffic => Task::perform(
                refresh_traffic(state.dashboard.clone()),
                Message::TrafficRefreshed,
            ),
            Message::TrafficRefreshed(report) => {
                state.sync_traffic();
                if report.zones == FetchOutcome::Failed {
                    state.status = "Zone data unavailable, showing last known values".into();
                }
                state.push_history(format!(
                    "Refresh #{}: zones {:?}, congestion {:?}, analytics {:?}",
                    state.traffic.refresh_count, report.zones, report.congestion, report.analytics
                ));
                Task::none()
            }
            Message::ZoneSelected(zone_id) => {
                state.traffic.selected_zone = Some(zone_id);
                Task::perform(select_zone(state.dashboard.clone(), zone_id), move |outcome| {
                    Message::ForecastLoaded(zone_id, outcome)
                })
            }
            Message::ForecastLoaded(zone_id, outcome) => {
                state.sync_traffic();
                if outcome == FetchOutcome::Failed {
                    state.push_history(format!("Forecast for zone {zone_id} failed"));
                }
                Task::none()
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let tabs = row![
            tab_button("Parking", Tab::Parking, state.tab),
            tab_button("Traffic", Tab::Traffic, state.tab),
        ]
        .spacing(8);

        let content = match state.tab {
            Tab::Parking => state.parking_view(),
            Tab::Traffic => state.traffic_view(),
        };

        let history_list = if state.history.is_empty() {
            Column::new().push(text("No activity yet").size(12))
        } else {
            state
                .history
                .iter()
                .rev()
                .fold(Column::new().spacing(4), |col, entry| {
                    col.push(text(entry.as_str()).size(12))
                })
        };

        let layout = column![
            row![text("ParkSight").size(28), tabs]
                .spacing(24)
                .align_y(Alignment::Center),
            text(&state.status).size(14),
            text(state.metrics_line()).size(11),
            content,
            text("Activity log").size(16),
            Container::new(scrollable(history_list).height(Length::Fixed(90.0))).padding(6),
        ]
        .spacing(12)
        .padding(20);

        Container::new(scrollable(layout))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn parking_view(&self) -> Element<'_, Message> {
        let busy = self.upload.busy;
        let detect_label = if busy { "Analysing..." } else { "Detect" };
        let can_submit = !busy && !self.path.trim().is_empty();

        let mut upload_column = column![
            text("Upload").size(24),
            text_input("Path to a parking lot image", &self.path)
                .on_input(Message::PathChanged)
                .on_submit(Message::Detect)
                .padding(6),
            button(detect_label)
                .on_press_maybe(can_submit.then_some(Message::Detect))
                .padding(10),
        ]
        .spacing(10)
        .width(Length::Fixed(360.0));

        if let Some(error) = &self.upload.error {
            upload_column =
                upload_column.push(text(error.as_str()).color(Color::from_rgb(0.9, 0.35, 0.35)));
        }
        if let Some(preview) = &self.upload.preview {
            upload_column = upload_column.push(
                text(format!(
                    "Preview: {} ({}, {:.1} KB)",
                    preview.file_name,
                    preview.media_type,
                    preview.bytes.len() as f32 / 1024.0
                ))
                .size(12),
            );
        }

        let results = match &self.upload.summary {
            Some(summary) => {
                let availability = summary
                    .availability_percent()
                    .map(|percent| format!("{percent}% free"))
                    .unwrap_or_else(|| "no spots detected".into());
                column![
                    text("Detection results").size(24),
                    row![
                        stat("Available", summary.available.to_string()),
                        stat("Occupied", summary.occupied.to_string()),
                        stat("Accuracy", summary.accuracy_label()),
                    ]
                    .spacing(24),
                    text(availability).size(14),
                    Canvas::new(SlotGrid::new(&summary.slots))
                        .width(Length::Fill)
                        .height(Length::Fixed(220.0)),
                ]
                .spacing(10)
            }
            None => column![
                text("Detection results").size(24),
                text("No detection yet").size(14),
            ]
            .spacing(10),
        };

        let indicators = (0..self.gallery.len()).fold(Row::new().spacing(4), |row, index| {
            let marker = if index == self.gallery.cursor() { "●" } else { "○" };
            row.push(
                button(text(marker).size(12))
                    .padding(4)
                    .style(button::text)
                    .on_press(Message::GallerySelected(index)),
            )
        });

        let source = match self.gallery.source() {
            GallerySource::Remote => "recent detections",
            GallerySource::Placeholder => "placeholder",
        };
        let gallery_column = column![
            row![
                text("Recent detections").size(24),
                button("Reload").on_press(Message::GalleryRefresh).padding(6),
            ]
            .spacing(12)
            .align_y(Alignment::Center),
            text(format!(
                "{} / {} ({})",
                self.gallery.cursor() + 1,
                self.gallery.len(),
                source
            ))
            .size(12),
            text(self.gallery.current()).size(14),
            row![
                button("<").on_press(Message::GalleryPrevious).padding(6),
                indicators,
                button(">").on_press(Message::GalleryNext).padding(6),
            ]
            .spacing(8)
            .align_y(Alignment::Center),
        ]
        .spacing(8);

        row![upload_column, column![results, gallery_column].spacing(20)]
            .spacing(20)
            .align_y(Alignment::Start)
            .into()
    }

    fn traffic_view(&self) -> Element<'_, Message> {
        let traffic = &self.traffic;
        let header = row![
            text("Traffic").size(24),
            button(if traffic.loading { "Refreshing..." } else { "Refresh" })
                .on_press(Message::RefreshTraffic)
                .padding(6),
            text(match traffic.last_refresh {
                Some(at) => format!(
                    "refresh #{}, {}s ago",
                    traffic.refresh_count,
                    at.elapsed().as_secs()
                ),
                None => "not refreshed yet".into(),
            })
            .size(12),
        ]
        .spacing(12)
        .align_y(Alignment::Center);

        let congestion: Element<'_, Message> = match &traffic.congestion {
            Some(summary) => {
                let counts = LEVELS.iter().fold(Row::new().spacing(16), |row, &level| {
                    row.push(
                        text(format!(
                            "{}: {}",
                            level.label(),
                            summary.overall_congestion.get(level)
                        ))
                        .color(badge_color(level.badge())),
                    )
                });
                column![
                    counts,
                    text(format!(
                        "Average wait {:.1} min, traffic flow {}",
                        summary.avg_wait_time, summary.total_traffic_flow
                    ))
                    .size(12),
                ]
                .spacing(6)
                .into()
            }
            None => text("Congestion data unavailable").size(14).into(),
        };

        let zone_list = if traffic.zones.is_empty() {
            Column::new().push(text("No zones loaded").size(12))
        } else {
            traffic
                .zones
                .iter()
                .fold(Column::new().spacing(4), |col, zone| {
                    let selected = traffic.selected_zone == Some(zone.id);
                    let level = zone.congestion.level;
                    let label = row![
                        text(format!(
                            "{:<18} {:>5.1}%  {}/{} free",
                            zone.name, zone.occupancy_rate, zone.available_slots, zone.total_slots
                        ))
                        .size(13),
                        text(level.label())
                            .size(13)
                            .color(badge_color(level.badge())),
                    ]
                    .spacing(12);
                    col.push(
                        button(label)
                            .width(Length::Fill)
                            .style(if selected {
                                button::primary
                            } else {
                                button::secondary
                            })
                            .on_press(Message::ZoneSelected(zone.id)),
                    )
                })
        };

        let forecast_title = match traffic.selected() {
            Some(zone) => format!(
                "{} forecast: wait {} min, peak {}, flow {}",
                zone.name, zone.avg_wait_time, zone.peak_hour, zone.traffic_flow
            ),
            None => "Select a zone to see its forecast".into(),
        };
        let forecast_stale = traffic.forecast_zone != traffic.selected_zone;
        let forecast = Canvas::new(LineChart::from_forecast(&traffic.forecast, forecast_stale))
            .width(Length::Fill)
            .height(Length::Fixed(200.0));

        let trend = Canvas::new(LineChart::new(
            traffic
                .analytics
                .hourly_trends
                .iter()
                .map(|trend| trend.avg_occupancy)
                .collect(),
            Color::from_rgb(0.55, 0.8, 0.45),
        ))
        .width(Length::Fill)
        .height(Length::Fixed(160.0));

        let weekly = traffic
            .analytics
            .weekly_forecast
            .iter()
            .fold(Row::new().spacing(12), |row, day| {
                row.push(text(format!("{} {:.0}%", day.day, day.occupancy_rate)).size(12))
            });

        column![
            header,
            congestion,
            row![
                Container::new(scrollable(zone_list).height(Length::Fixed(320.0)))
                    .width(Length::Fixed(420.0)),
                column![text(forecast_title).size(16), forecast].spacing(8),
            ]
            .spacing(20)
            .align_y(Alignment::Start),
            text(format!(
                "Daily occupancy across {} zones ({} spots)",
                traffic.analytics.total_zones, traffic.analytics.total_capacity
            ))
            .size(16),
            trend,
            weekly,
        ]
        .spacing(14)
        .into()
    }

    fn metrics_line(&self) -> String {
        let totals = [
            self.dashboard.upload.metrics(),
            self.dashboard.gallery().metrics(),
            self.dashboard.traffic.metrics(),
        ]
        .into_iter()
        .fold(Metrics::default(), |mut acc, metrics| {
            acc.requests += metrics.requests;
            acc.failures += metrics.failures;
            acc.discarded += metrics.discarded;
            acc
        });
        format!(
            "requests {} | failures {} | discarded {}",
            totals.requests, totals.failures, totals.discarded
        )
    }

    fn sync_parking(&mut self) {
        self.upload = self.dashboard.upload.snapshot();
        self.gallery = self.dashboard.gallery().snapshot();
    }

    fn sync_traffic(&mut self) {
        self.traffic = self.dashboard.traffic.snapshot();
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }
}

fn tab_button(label: &str, tab: Tab, active: Tab) -> Element<'_, Message> {
    button(text(label))
        .padding(8)
        .style(if tab == active {
            button::primary
        } else {
            button::secondary
        })
        .on_press(Message::TabSelected(tab))
        .into()
}

fn stat(label: &str, value: String) -> Element<'_, Message> {
    column![text(label).size(12), text(value).size(22)]
        .spacing(2)
        .into()
}

fn badge_color(variant: BadgeVariant) -> Color {
    match variant {
        BadgeVariant::Destructive => Color::from_rgb(0.9, 0.3, 0.3),
        BadgeVariant::Warning => Color::from_rgb(0.95, 0.6, 0.2),
        BadgeVariant::Success => Color::from_rgb(0.35, 0.78, 0.45),
        BadgeVariant::Secondary => Color::from_rgb(0.6, 0.64, 0.72),
        BadgeVariant::Default => Color::from_rgb(0.45, 0.6, 0.95),
    }
}

async fn detect_file(
    dashboard: Dashboard<HttpApi>,
    path: PathBuf,
) -> Result<DetectionSummary, String> {
    dashboard
        .upload
        .submit_path(&path)
        .await
        .map_err(|err| err.to_string())
}

async fn refresh_gallery(dashboard: Dashboard<HttpApi>) -> GallerySource {
    dashboard.gallery().refresh().await
}

async fn refresh_traffic(dashboard: Dashboard<HttpApi>) -> RefreshReport {
    dashboard.traffic.refresh().await
}

async fn select_zone(dashboard: Dashboard<HttpApi>, zone_id: ZoneId) -> FetchOutcome {
    dashboard.traffic.select_zone(zone_id).await
}

/// Occupancy grid, one cell per detected spot in detection order.
#[derive(Clone)]
struct SlotGrid {
    slots: Vec<SlotCell>,
}

impl SlotGrid {
    fn new(slots: &[SlotCell]) -> Self {
        Self {
            slots: slots.to_vec(),
        }
    }
}

impl canvas::Program<Message> for SlotGrid {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.05, 0.05, 0.05),
        );

        if !self.slots.is_empty() {
            let columns = (self.slots.len() as f32).sqrt().ceil().max(1.0) as usize;
            let rows = self.slots.len().div_ceil(columns);
            let gap = 4.0;
            let cell = ((bounds.width - gap) / columns as f32)
                .min((bounds.height - gap) / rows as f32)
                - gap;

            for slot in &self.slots {
                let x = gap + (slot.index % columns) as f32 * (cell + gap);
                let y = gap + (slot.index / columns) as f32 * (cell + gap);
                let base = if slot.occupied {
                    Color::from_rgb(0.86, 0.3, 0.3)
                } else {
                    Color::from_rgb(0.3, 0.78, 0.42)
                };
                let alpha = slot.confidence.unwrap_or(1.0).clamp(0.35, 1.0);
                frame.fill_rectangle(
                    Point::new(x, y),
                    Size::new(cell, cell),
                    Color { a: alpha, ..base },
                );
            }
        }

        vec![frame.into_geometry()]
    }
}

#[derive(Clone)]
struct LineChart {
    data: Vec<f32>,
    color: Color,
}

impl LineChart {
    fn new(data: Vec<f32>, color: Color) -> Self {
        Self { data, color }
    }

    /// Demand curve; dimmed while a newer zone selection is loading.
    fn from_forecast(points: &[ForecastPoint], stale: bool) -> Self {
        let color = if stale {
            Color::from_rgb(0.35, 0.4, 0.45)
        } else {
            Color::from_rgb(0.18, 0.72, 0.89)
        };
        Self::new(points.iter().map(|point| point.demand as f32).collect(), color)
    }
}

impl canvas::Program<Message> for LineChart {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.05, 0.05, 0.05),
        );

        if self.data.len() > 1 {
            let max = self.data.iter().cloned().fold(0.0, f32::max).max(1.0);
            let step = bounds.width / (self.data.len() as f32 - 1.0);
            let path = Path::new(|builder| {
                for (i, value) in self.data.iter().enumerate() {
                    let x = i as f32 * step;
                    let y = bounds.height - (value / max) * (bounds.height - 8.0);
                    if i == 0 {
                        builder.move_to(Point::new(x, y));
                    } else {
                        builder.line_to(Point::new(x, y));
                    }
                }
            });

            frame.stroke(
                &path,
                Stroke::default().with_width(2.5).with_color(self.color),
            );
        }

        vec![frame.into_geometry()]
    }
}
