use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::{Instant, SystemTime},
};

use catppuccin_egui::Theme;
use eframe::egui;
use egui::{CentralPanel, CollapsingHeader, Context, Id, Separator, SidePanel, Ui};
use egui_extras::{Column, TableBuilder};
use tokio::{
    runtime::Runtime,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    data_aquisition::http::HttpInfoSource,
    gui::{
        canvas::CanvasView,
        inspector_panel::InspectorPanel,
    },
    layout::LayoutDriver,
    network::{layout_graph::LayoutGraph, peer::PeerId},
    topology::{
        crawl::{CrawlCompletion, CrawlController, CrawlEvent, CrawlRequest, FailedPeers},
        source::CrawlError,
        store::TopologyStore,
    },
};

const STATUS_CAPACITY: usize = 20;

pub fn main(rt: Arc<Runtime>, config: AppConfig) -> eframe::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };
    eframe::run_native(
        "DHT topology",
        native_options,
        Box::new(move |cc| {
            let app = App::new(cc, rt, config)?;
            Ok(Box::new(app) as Box<dyn eframe::App>)
        }),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct StatusLine {
    at: SystemTime,
    level: StatusLevel,
    text: String,
}

struct App {
    store: TopologyStore,
    layout: LayoutGraph,
    driver: LayoutDriver,
    crawl: CrawlController,

    runtime: Arc<Runtime>,
    ctx: Context,
    completions_tx: UnboundedSender<CrawlCompletion>,
    completions_rx: UnboundedReceiver<CrawlCompletion>,
    in_flight: HashSet<CrawlRequest>,
    failed: FailedPeers,

    config: AppConfig,
    bootstrap_input: String,
    crawl_depth: usize,

    selected: Option<PeerId>,
    canvas: CanvasView,
    theme: Theme,
    status: VecDeque<StatusLine>,
}

impl App {
    fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Arc<Runtime>,
        config: AppConfig,
    ) -> Result<Self, CrawlError> {
        let theme = catppuccin_egui::MOCHA;
        catppuccin_egui::set_theme(&cc.egui_ctx, theme);

        let source = HttpInfoSource::new(&config.fetch)?;
        let (completions_tx, completions_rx) = unbounded_channel();

        let mut app = Self {
            store: TopologyStore::new(),
            layout: LayoutGraph::new(),
            driver: LayoutDriver::new(config.simulation.clone()),
            crawl: CrawlController::new(Arc::new(source)),

            runtime,
            ctx: cc.egui_ctx.clone(),
            completions_tx,
            completions_rx,
            in_flight: HashSet::new(),
            failed: FailedPeers::default(),

            bootstrap_input: config.bootstrap.clone(),
            config,
            crawl_depth: 0,

            selected: None,
            canvas: CanvasView::default(),
            theme,
            status: VecDeque::new(),
        };

        let bootstrap = app.bootstrap_input.clone();
        app.seed(&bootstrap);
        Ok(app)
    }

    fn push_status(&mut self, level: StatusLevel, text: String) {
        self.status.push_front(StatusLine {
            at: SystemTime::now(),
            level,
            text,
        });
        self.status.truncate(STATUS_CAPACITY);
    }

    /// Runs the network half of a crawl step on the runtime. Duplicate requests are dropped.
    fn dispatch(&mut self, request: CrawlRequest) {
        if !self.in_flight.insert(request.clone()) {
            return;
        }
        let crawl = self.crawl.clone();
        let tx = self.completions_tx.clone();
        let ctx = self.ctx.clone();
        self.runtime.spawn(async move {
            let completion = crawl.fetch(request).await;
            // receiver only goes away on shutdown
            let _ = tx.send(completion);
            ctx.request_repaint();
        });
    }

    fn seed(&mut self, address: &str) {
        let address = address.trim();
        if address.is_empty() {
            self.push_status(StatusLevel::Error, "Bootstrap address is empty".to_string());
            return;
        }
        info!(%address, "seeding");
        self.crawl_depth = 0;
        self.failed.clear();
        let request = self.crawl.seed_request(address);
        self.dispatch(request);
    }

    /// Operator-triggered probe. Also the only way a failed peer gets retried.
    fn probe(&mut self, id: &PeerId) {
        self.failed.forget(id);
        match self.crawl.probe_request(&self.store, id) {
            Ok(request) => self.dispatch(request),
            Err(e) => {
                warn!(peer = %id, error = %e, "cannot probe");
                self.push_status(StatusLevel::Error, e.to_string());
            }
        }
    }

    fn crawl_frontier(&mut self) -> usize {
        let wave = self.crawl.frontier_requests(&self.store, &self.failed);
        let count = wave.len();
        for request in wave {
            self.dispatch(request);
        }
        count
    }

    fn is_probing(&self, id: &PeerId) -> bool {
        self.in_flight.iter().any(|request| {
            matches!(request, CrawlRequest::Probe { id: probing, .. } if probing == id)
        })
    }

    /// Applies every completion that arrived since the last frame, one at a time.
    fn drain_completions(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.in_flight.remove(&completion.request);
            self.failed.note(&completion);
            let request = completion.request.clone();

            match self.crawl.apply(&mut self.store, completion) {
                Ok(events) => {
                    for event in events {
                        self.handle_event(event);
                    }
                    if let CrawlRequest::Seed { address } = &request {
                        self.push_status(StatusLevel::Info, format!("Seeded from {address}"));
                    }
                }
                Err(e) => {
                    warn!(address = request.address(), error = %e, "crawl step failed");
                    self.push_status(StatusLevel::Error, e.to_string());
                }
            }
        }
    }

    fn handle_event(&mut self, event: CrawlEvent) {
        match event {
            CrawlEvent::TopologyChanged => {
                let report = self.layout.reconcile(&self.store);
                if !report.is_empty() {
                    self.driver.reheat(Instant::now());
                }
            }
            CrawlEvent::SelectionChanged(id) => self.selected = Some(id),
        }
    }

    /// Follows the frontier one wave at a time once the previous wave has settled.
    fn advance_auto_crawl(&mut self) {
        let crawl = &self.config.crawl;
        if !crawl.auto_crawl || !self.in_flight.is_empty() || self.crawl_depth >= crawl.max_depth {
            return;
        }
        let dispatched = self.crawl_frontier();
        if dispatched > 0 {
            self.crawl_depth += 1;
            info!(depth = self.crawl_depth, peers = dispatched, "crawling frontier");
        }
    }

    fn render_status_section(&mut self, ui: &mut Ui) {
        CollapsingHeader::new("Status")
            .default_open(true)
            .show(ui, |ui| {
                ui.label(format!(
                    "{} peers, {} links, {} requests in flight, {} unreachable",
                    self.store.node_count(),
                    self.layout.edge_count(),
                    self.in_flight.len(),
                    self.failed.len()
                ));
                if self.status.is_empty() {
                    ui.weak("Nothing to report");
                }
                egui::ScrollArea::vertical()
                    .id_salt("status")
                    .max_height(120.0)
                    .show(ui, |ui| {
                        for line in &self.status {
                            let color = match line.level {
                                StatusLevel::Info => self.theme.subtext1,
                                StatusLevel::Error => self.theme.red,
                            };
                            ui.colored_label(
                                color,
                                format!(
                                    "[{}] {}",
                                    humantime::format_rfc3339_seconds(line.at),
                                    line.text
                                ),
                            );
                        }
                    });
                if !self.status.is_empty() && ui.small_button("Clear").clicked() {
                    self.status.clear();
                }
            });
    }

    fn render_crawl_section(&mut self, ui: &mut Ui) {
        CollapsingHeader::new("Crawl")
            .default_open(true)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Bootstrap");
                    ui.text_edit_singleline(&mut self.bootstrap_input);
                });
                ui.horizontal(|ui| {
                    if ui.button("Seed").clicked() {
                        let address = self.bootstrap_input.clone();
                        self.seed(&address);
                    }
                    if ui
                        .button("Crawl frontier")
                        .on_hover_text("Probe every discovered peer that has not answered yet, skipping failed ones")
                        .clicked()
                    {
                        let dispatched = self.crawl_frontier();
                        info!(peers = dispatched, "manual frontier crawl");
                    }
                });
                ui.checkbox(&mut self.config.crawl.auto_crawl, "Auto crawl");
                ui.add_enabled_ui(self.config.crawl.auto_crawl, |ui| {
                    ui.add(
                        egui::Slider::new(&mut self.config.crawl.max_depth, 0..=10).text("max depth"),
                    );
                });
            });
    }

    fn render_forces_section(&mut self, ui: &mut Ui) {
        CollapsingHeader::new("Forces")
            .default_open(true)
            .show(ui, |ui| {
                let mut changed = false;
                let config = self.driver.config_mut();
                ui.horizontal(|ui| {
                    changed |= ui
                        .add(egui::Slider::new(&mut config.charge_strength, -1000.0..=0.0).text("charge"))
                        .changed();
                    info_icon(ui, "Many-body strength; more negative pushes nodes further apart.");
                });
                ui.horizontal(|ui| {
                    changed |= ui
                        .add(egui::Slider::new(&mut config.link_distance, 20.0..=600.0).text("link distance"))
                        .changed();
                    info_icon(ui, "Rest length of the spring between linked peers.");
                });
                ui.horizontal(|ui| {
                    changed |= ui
                        .add(egui::Slider::new(&mut config.velocity_decay, 0.0..=1.0).text("velocity decay"))
                        .changed();
                    info_icon(ui, "Fraction of velocity lost per tick (friction).");
                });

                if changed {
                    self.driver.reheat(Instant::now());
                }

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Reheat").clicked() {
                        self.driver.reheat(Instant::now());
                    }
                    if ui.button("Stop").clicked() {
                        self.driver.stop();
                    }
                    let state = if self.driver.is_running() { "running" } else { "halted" };
                    ui.weak(format!("{state}, alpha {:.3}", self.driver.alpha()));
                });
                ui.horizontal(|ui| {
                    ui.checkbox(&mut self.canvas.show_labels, "Labels");
                    if ui.button("Reset view").clicked() {
                        self.canvas.reset();
                    }
                });
            });
    }

    fn render_peers_section(&mut self, ui: &mut Ui) {
        CollapsingHeader::new("Peers")
            .default_open(false)
            .show(ui, |ui| {
                if ui.button("Print store data").clicked() {
                    match serde_json::to_string_pretty(&self.store) {
                        Ok(json) => info!("store data:\n{json}"),
                        Err(e) => warn!(error = %e, "could not serialize store"),
                    }
                }
                if ui.button("Print layout data").clicked() {
                    info!("{}", self.layout);
                }

                let rows: Vec<_> = self
                    .store
                    .all_nodes()
                    .map(|node| {
                        (
                            node.id.clone(),
                            node.address.clone(),
                            node.last_probed,
                            self.is_probing(&node.id),
                        )
                    })
                    .collect();

                let mut to_select: Option<PeerId> = None;
                let mut to_probe: Option<PeerId> = None;

                TableBuilder::new(ui)
                    .striped(true)
                    .resizable(true)
                    .max_scroll_height(300.0)
                    .column(Column::auto().at_least(90.0))
                    .column(Column::auto().at_least(110.0))
                    .column(Column::auto().at_least(145.0))
                    .column(Column::auto().at_least(40.0))
                    .header(20.0, |mut header| {
                        header.col(|ui| {
                            ui.strong("Peer");
                        });
                        header.col(|ui| {
                            ui.strong("Address");
                        });
                        header.col(|ui| {
                            ui.strong("Last probed");
                        });
                        header.col(|ui| {
                            ui.strong("Actions");
                        });
                    })
                    .body(|mut body| {
                        for (id, address, last_probed, probing) in rows {
                            body.row(22.0, |mut row| {
                                row.col(|ui| {
                                    if ui.link(id.to_string()).clicked() {
                                        to_select = Some(id.clone());
                                    }
                                });
                                row.col(|ui| {
                                    ui.label(address.as_deref().unwrap_or("unknown"));
                                });
                                row.col(|ui| {
                                    match last_probed {
                                        Some(ts) => ui.label(humantime::format_rfc3339_seconds(ts).to_string()),
                                        None => ui.weak("never"),
                                    };
                                });
                                row.col(|ui| {
                                    if probing {
                                        ui.spinner();
                                    } else if ui
                                        .add_enabled(address.is_some(), egui::Button::new("⟳").small())
                                        .on_hover_text("Probe this peer")
                                        .clicked()
                                    {
                                        to_probe = Some(id.clone());
                                    }
                                });
                            });
                        }
                    });

                if let Some(id) = to_select {
                    self.selected = Some(id);
                }
                if let Some(id) = to_probe {
                    self.probe(&id);
                }
            });
    }

    fn render(&mut self, ctx: &Context) {
        SidePanel::right("right_panel")
            .min_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_status_section(ui);
                    ui.add(Separator::default());
                    self.render_crawl_section(ui);
                    ui.add(Separator::default());
                    self.render_forces_section(ui);
                    ui.add(Separator::default());
                    self.render_peers_section(ui);
                });
            });

        let response = CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.canvas
                    .show(ui, &self.layout.projection, self.selected.as_ref(), &self.theme)
            })
            .inner;

        if let Some(id) = response.clicked {
            self.selected = Some(id.clone());
            self.probe(&id);
        }

        if let (Some(id), Some(anchor)) = (self.selected.clone(), response.selected_anchor) {
            let panel = InspectorPanel::new(Id::new(("inspector_panel", id.as_str())), anchor);
            let probing = self.is_probing(&id);
            let resp = panel.show(ctx, &self.store, &id, probing);
            if resp.reprobe_clicked {
                self.probe(&id);
            }
            if resp.close_clicked {
                self.selected = None;
            }
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        self.drain_completions();
        self.advance_auto_crawl();

        if self.driver.tick(&mut self.layout, Instant::now()) {
            ctx.request_repaint();
        }
        self.render(ctx);
    }
}

fn info_icon(ui: &mut egui::Ui, tip: &str) {
    ui.add_space(4.0);
    ui.small_button("ℹ").on_hover_text(tip);
}
