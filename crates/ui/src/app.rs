use std::path::{Path, PathBuf};

use anyhow::{Context as _, anyhow};
use busvis_core::decode::busjson::SchemaVariant;
use busvis_core::decode::is_handler_log;
use busvis_core::decode::linebuf::LineReader;
use busvis_core::group::{GroupBy, HandlerField, HostField, MessageField};
use busvis_core::interact::NavKey;
use busvis_core::model::{HostRequestRecord, PaneRecords};
use busvis_core::replay::{self, ReplayFlavor};
use busvis_core::report;
use busvis_core::workspace::{PANE_HANDLERS, PANE_HOST, PANE_MESSAGES, Workspace};
use busvis_protocol::ThemeToken;
use eframe::egui;
use tracing::{error, info};

use crate::renderer;
use crate::theme::{self, ThemeMode};

const PANE_NAMES: [&str; 3] = ["Messages", "Async handlers", "Host requests"];

/// Detail-panel rows shown per group before eliding.
const DETAIL_ROW_LIMIT: usize = 50;

/// Main application state: the workspace plus UI-only chrome.
pub struct BusVisApp {
    workspace: Workspace,
    theme_mode: ThemeMode,
    schema: SchemaVariant,
    /// Blocking error line shown in the status bar until the next
    /// successful load.
    error: Option<String>,
    status: String,
    replay_open: bool,
    replay_output: String,
}

impl BusVisApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(theme::dark_visuals());
        Self {
            workspace: Workspace::new(),
            theme_mode: ThemeMode::Dark,
            schema: SchemaVariant::Detect,
            error: None,
            status: String::new(),
            replay_open: false,
            replay_output: String::new(),
        }
    }

    fn open_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Trace files", &["txt", "ndjson", "json", "log"])
            .pick_file()
        else {
            return;
        };
        self.load(&path);
    }

    fn load(&mut self, path: &Path) {
        match self.load_path(path) {
            Ok(status) => {
                info!(path = %path.display(), "loaded trace");
                self.status = status;
                self.error = None;
            }
            Err(err) => {
                error!(path = %path.display(), %err, "load failed");
                self.error = Some(format!("{err:#}"));
            }
        }
    }

    /// Route a file to the right parser: the handler log is detected by
    /// its sentinel tag, everything else is treated as one half of the
    /// external decoder's paired outputs.
    fn load_path(&mut self, path: &Path) -> anyhow::Result<String> {
        let data =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        if is_handler_log(&data) {
            let out = self.workspace.load_handler_log(&data)?;
            return Ok(format!(
                "{}: {} handler records, {} unfinished, {} lines skipped",
                path.display(),
                out.records.len(),
                out.unfinished,
                out.skipped_lines,
            ));
        }

        let (timing_path, records_path) = decoder_pair(path)?;
        let (timing, timing_lines) = read_lines(&timing_path, 0)?;
        // Both decoder outputs describe the same records, so the timing
        // line count predicts the structural file's total.
        let (records, _) = read_lines(&records_path, timing_lines)?;
        let summary = self
            .workspace
            .load_decoded_trace(&timing, &records, self.schema)?;

        let mut status = format!(
            "{}: {} records, {} skipped",
            path.display(),
            summary.records,
            summary.skipped_record_lines + summary.skipped_timestamp_lines,
        );
        if summary.schema_flagged > 0 {
            status.push_str(&format!(", {} ambiguous headers", summary.schema_flagged));
        }
        Ok(status)
    }

    fn toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("busvis");
                ui.separator();

                if ui.button("Open trace…").clicked() {
                    self.open_file();
                }

                egui::ComboBox::from_id_salt("schema")
                    .selected_text(schema_label(self.schema))
                    .show_ui(ui, |ui| {
                        for variant in
                            [SchemaVariant::Detect, SchemaVariant::Modern, SchemaVariant::Legacy]
                        {
                            ui.selectable_value(&mut self.schema, variant, schema_label(variant));
                        }
                    });
                ui.separator();

                if ui.button("−").clicked() {
                    self.workspace.begin_zoom_animation(PANE_MESSAGES, -0.3, None);
                }
                if ui.button("+").clicked() {
                    self.workspace.begin_zoom_animation(PANE_MESSAGES, 0.3, None);
                }
                if ui.button("◀").clicked() {
                    self.workspace.begin_pan_animation(PANE_MESSAGES, -0.25);
                }
                if ui.button("▶").clicked() {
                    self.workspace.begin_pan_animation(PANE_MESSAGES, 0.25);
                }
                if ui.button("Reset view").clicked() {
                    self.workspace.reset_zoom();
                }
                ui.separator();

                self.messages_menu(ui);
                self.handlers_menu(ui);
                self.host_menu(ui);
                ui.separator();

                let replay_ready =
                    !self.workspace.panes[PANE_HOST].highlighted_records.is_empty();
                if ui
                    .add_enabled(replay_ready, egui::Button::new("Replay…"))
                    .clicked()
                {
                    self.replay_open = true;
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = match self.theme_mode {
                        ThemeMode::Dark => "Dark",
                        ThemeMode::Light => "Light",
                    };
                    if ui.button(label).clicked() {
                        self.theme_mode = match self.theme_mode {
                            ThemeMode::Dark => {
                                ui.ctx().set_visuals(theme::light_visuals());
                                ThemeMode::Light
                            }
                            ThemeMode::Light => {
                                ui.ctx().set_visuals(theme::dark_visuals());
                                ThemeMode::Dark
                            }
                        };
                        for pane in &mut self.workspace.panes {
                            pane.mark_dirty();
                        }
                    }
                });
            });
        });
    }

    fn messages_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("Messages by…", |ui| {
            let GroupBy::Messages(mut fields) =
                self.workspace.panes[PANE_MESSAGES].group_by.clone()
            else {
                return;
            };
            let mut changed = false;
            for field in MessageField::ALL {
                let mut on = fields.contains(&field);
                if ui.checkbox(&mut on, field.label()).changed() {
                    if on {
                        fields.push(field);
                    } else {
                        fields.retain(|f| *f != field);
                    }
                    changed = true;
                }
            }
            if changed {
                self.workspace.set_group_by(PANE_MESSAGES, GroupBy::Messages(fields));
            }
            self.distribution_toggle(ui, PANE_MESSAGES);
        });
    }

    fn handlers_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("Handlers by…", |ui| {
            let GroupBy::Handlers(mut fields) =
                self.workspace.panes[PANE_HANDLERS].group_by.clone()
            else {
                return;
            };
            let mut changed = false;
            for field in HandlerField::ALL {
                let mut on = fields.contains(&field);
                if ui.checkbox(&mut on, field.label()).changed() {
                    if on {
                        fields.push(field);
                    } else {
                        fields.retain(|f| *f != field);
                    }
                    changed = true;
                }
            }
            if changed {
                self.workspace.set_group_by(PANE_HANDLERS, GroupBy::Handlers(fields));
            }
            self.distribution_toggle(ui, PANE_HANDLERS);
        });
    }

    fn host_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("Host requests by…", |ui| {
            let GroupBy::Host(mut fields) = self.workspace.panes[PANE_HOST].group_by.clone()
            else {
                return;
            };
            let mut changed = false;
            for field in HostField::ALL {
                let mut on = fields.contains(&field);
                if ui.checkbox(&mut on, field.label()).changed() {
                    if on {
                        fields.push(field);
                    } else {
                        fields.retain(|f| *f != field);
                    }
                    changed = true;
                }
            }
            if changed {
                self.workspace.set_group_by(PANE_HOST, GroupBy::Host(fields));
            }
            self.distribution_toggle(ui, PANE_HOST);
        });
    }

    fn distribution_toggle(&mut self, ui: &mut egui::Ui, pane: usize) {
        ui.separator();
        let mut show = self.workspace.panes[pane].show_distribution;
        if ui.checkbox(&mut show, "Time distribution").changed() {
            self.workspace.panes[pane].show_distribution = show;
            self.workspace.panes[pane].mark_dirty();
        }
    }

    fn status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(err) = &self.error {
                    ui.colored_label(ui.visuals().error_fg_color, err);
                    return;
                }
                let ws = &self.workspace;
                let win = ws.panes[PANE_MESSAGES].window;
                ui.label(format!(
                    "Messages: {} | Handlers: {} | Host requests: {} | View: {:.2}s – {:.2}s",
                    ws.panes[PANE_MESSAGES].records.len(),
                    ws.panes[PANE_HANDLERS].records.len(),
                    ws.panes[PANE_HOST].records.len(),
                    win.lo,
                    win.hi,
                ));
                if !self.status.is_empty() {
                    ui.separator();
                    ui.label(&self.status);
                }
            });
        });
    }

    fn show_pane(&mut self, ui: &mut egui::Ui, pane: usize, rect: egui::Rect) {
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        let mode = self.theme_mode;

        let local =
            |pos: egui::Pos2| (f64::from(pos.x - rect.left()), f64::from(pos.y - rect.top()));

        // A drag keeps reporting positions even once the pointer leaves
        // the pane, so highlight drags and scrollbar drags survive
        // excursions.
        let pointer = response.hover_pos().or_else(|| {
            if self.workspace.panes[pane].mouse.pressed {
                response.interact_pointer_pos()
            } else {
                None
            }
        });
        if let Some(pos) = pointer {
            let (x, y) = local(pos);
            self.workspace.on_mouse_move(pane, x, y);
        } else if self.workspace.panes[pane].mouse.hovered {
            self.workspace.panes[pane].on_mouse_leave();
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta);
            if scroll.y.abs() > 0.1 {
                // Wheel-down is a positive delta for the workspace.
                self.workspace.on_wheel(pane, f64::from(-scroll.y));
            }
            if ui.input(|i| i.pointer.primary_pressed()) {
                self.workspace.on_mouse_down(pane);
            }
        }
        if ui.input(|i| i.pointer.primary_released())
            && self.workspace.panes[pane].mouse.pressed
        {
            self.workspace.on_mouse_up(pane);
        }

        let cmds = self.workspace.render_pane(
            pane,
            f64::from(rect.width()),
            f64::from(rect.height()),
        );
        let painter = ui.painter_at(rect);
        painter.rect_filled(
            rect,
            egui::CornerRadius::ZERO,
            theme::resolve(ThemeToken::Background, mode),
        );
        renderer::render_commands(&painter, &cmds, rect.min, mode);
        painter.text(
            egui::pos2(rect.left() + 20.0, rect.bottom() - 4.0),
            egui::Align2::LEFT_BOTTOM,
            PANE_NAMES[pane],
            egui::FontId::proportional(11.0),
            theme::resolve(ThemeToken::RowLabelDim, mode),
        );
    }

    fn detail_panel(&self, ctx: &egui::Context) {
        let any = self
            .workspace
            .panes
            .iter()
            .any(|p| p.is_highlighted() && !p.highlighted_records.is_empty());
        if !any {
            return;
        }
        egui::SidePanel::right("detail")
            .default_width(380.0)
            .show(ctx, |ui| {
                ui.heading("Highlighted records");
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for pane in [PANE_MESSAGES, PANE_HANDLERS, PANE_HOST] {
                        let eng = &self.workspace.panes[pane];
                        if !eng.is_highlighted() {
                            continue;
                        }
                        let sections = report::highlighted_messages(eng);
                        if sections.is_empty() {
                            continue;
                        }
                        ui.separator();
                        ui.strong(PANE_NAMES[pane]);
                        for section in sections {
                            let count = section.records.len();
                            egui::CollapsingHeader::new(format!("{} — {count}", section.title))
                                .id_salt((pane, section.title.as_str()))
                                .show(ui, |ui| {
                                    for &idx in section.records.iter().take(DETAIL_ROW_LIMIT) {
                                        if let Some(line) = record_summary(&eng.records, idx) {
                                            ui.monospace(line);
                                        }
                                    }
                                    if count > DETAIL_ROW_LIMIT {
                                        ui.label(format!("… {} more", count - DETAIL_ROW_LIMIT));
                                    }
                                });
                        }
                    }
                });
            });
    }

    fn replay_window(&mut self, ctx: &egui::Context) {
        if !self.replay_open {
            return;
        }
        let host = &self.workspace.panes[PANE_HOST];
        let reqs: Vec<HostRequestRecord> = match &host.records {
            PaneRecords::HostRequests(records) => host
                .highlighted_records
                .iter()
                .filter_map(|&i| records.get(i).cloned())
                .collect(),
            _ => Vec::new(),
        };

        let mut open = self.replay_open;
        egui::Window::new("Replay scripts")
            .open(&mut open)
            .resizable(true)
            .show(ctx, |ui| {
                ui.label(format!("{} highlighted requests", reqs.len()));
                ui.horizontal_wrapped(|ui| {
                    for flavor in ReplayFlavor::ALL {
                        if ui.button(flavor.label()).clicked() {
                            let refs: Vec<&HostRequestRecord> = reqs.iter().collect();
                            self.replay_output = replay::generate(flavor, &refs);
                        }
                    }
                });
                if !self.replay_output.is_empty() {
                    if ui.button("Copy to clipboard").clicked() {
                        ui.ctx().copy_text(self.replay_output.clone());
                    }
                    egui::ScrollArea::vertical().max_height(300.0).show(ui, |ui| {
                        ui.add(
                            egui::TextEdit::multiline(&mut self.replay_output)
                                .font(egui::TextStyle::Monospace)
                                .desired_width(f32::INFINITY),
                        );
                    });
                }
            });
        self.replay_open = open;
    }
}

impl eframe::App for BusVisApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Dropped files load like the Open dialog.
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        for path in dropped {
            self.load(&path);
        }

        // Arrow keys drive the continuous per-frame pan/zoom deltas.
        ctx.input(|i| {
            self.workspace.set_shift(i.modifiers.shift);
            for event in &i.events {
                let egui::Event::Key { key, pressed, repeat, .. } = event else {
                    continue;
                };
                if *repeat {
                    continue;
                }
                let nav = match key {
                    egui::Key::ArrowLeft => NavKey::PanLeft,
                    egui::Key::ArrowRight => NavKey::PanRight,
                    egui::Key::ArrowUp => NavKey::ZoomIn,
                    egui::Key::ArrowDown => NavKey::ZoomOut,
                    _ => continue,
                };
                if *pressed {
                    self.workspace.key_down(nav);
                } else {
                    self.workspace.key_up(nav);
                }
            }
        });

        self.toolbar(ctx);
        self.status_bar(ctx);
        self.detail_panel(ctx);
        self.replay_window(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.workspace.origin_sec.is_none() {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(ui.available_height() / 3.0);
                        ui.heading("Drop a trace here or click Open");
                        ui.label(
                            "Handler logs are detected by their @asio tag; decoder output \
                             loads as a .txt timing / .ndjson record pair",
                        );
                    });
                });
                return;
            }

            let avail = ui.available_rect_before_wrap();
            let pane_h = avail.height() / 3.0;
            for pane in [PANE_MESSAGES, PANE_HANDLERS, PANE_HOST] {
                let rect = egui::Rect::from_min_size(
                    egui::pos2(avail.left(), avail.top() + pane as f32 * pane_h),
                    egui::vec2(avail.width(), pane_h - 4.0),
                );
                self.show_pane(ui, pane, rect);
            }
        });

        // Animations and held navigation keys need frames while idle.
        let nav_active = self
            .workspace
            .panes
            .iter()
            .any(|p| p.nav.delta_x != 0.0 || p.nav.delta_zoom != 0.0);
        if self.workspace.any_animating() || nav_active {
            ctx.request_repaint();
        }
    }
}

fn schema_label(schema: SchemaVariant) -> &'static str {
    match schema {
        SchemaVariant::Detect => "Schema: detect",
        SchemaVariant::Modern => "Schema: modern",
        SchemaVariant::Legacy => "Schema: legacy",
    }
}

/// One-line record summary for the detail panel.
fn record_summary(records: &PaneRecords, idx: usize) -> Option<String> {
    match records {
        PaneRecords::Messages(v) => v.get(idx).map(|m| {
            format!(
                "{:.6} {} {} → {} {}",
                m.timestamp,
                m.kind.label(),
                m.sender,
                m.destination,
                m.member
            )
        }),
        PaneRecords::AsyncHandlers(v) => v
            .get(idx)
            .map(|h| format!("#{} {}", h.handler_id, h.short_description)),
        PaneRecords::HostRequests(v) => v.get(idx).map(|r| {
            format!(
                "({}, {}) req {} / resp {} bytes",
                r.netfn,
                r.cmd,
                r.request.len(),
                r.response.len()
            )
        }),
    }
}

/// Pull a file through the incremental line reader, the same path that
/// consumes a live decoder pipe. Returns the reassembled text and its
/// line count.
fn read_lines(path: &Path, expected_lines: usize) -> anyhow::Result<(String, usize)> {
    let file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = LineReader::new(file, expected_lines);
    let mut lines = Vec::new();
    for line in reader.by_ref() {
        lines.push(line.with_context(|| format!("reading {}", path.display()))?);
    }
    if expected_lines > 0 {
        info!(
            path = %path.display(),
            percent = reader.progress().percent(),
            "decoder output consumed"
        );
    }
    let count = lines.len();
    Ok((lines.join("\n"), count))
}

/// Resolve the external decoder's sibling outputs from either half: the
/// `.txt` timing file or the `.ndjson`/`.json` structural file.
fn decoder_pair(path: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if matches!(ext, "ndjson" | "json") {
        let timing = path.with_extension("txt");
        if !timing.exists() {
            return Err(anyhow!(
                "no sibling timing file {} for {}",
                timing.display(),
                path.display()
            ));
        }
        return Ok((timing, path.to_owned()));
    }
    let records = ["ndjson", "json"]
        .iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.exists())
        .ok_or_else(|| {
            anyhow!("no sibling .ndjson record file next to {}", path.display())
        })?;
    Ok((path.to_owned(), records))
}
