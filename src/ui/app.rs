use std::time::{Duration, Instant};

use anyhow::Result;
use eframe::egui::{
    self, Align, Color32, Key, Layout, RichText, ScrollArea, TextEdit, TopBottomPanel, Ui,
};
use rand::seq::IndexedRandom;

use crate::controller::{NoticeKind, TimerController};
use crate::history::model::Goal;
use crate::pacing::{COARSE_INTERVAL, Cadence, CoarseWaker};
use crate::theme::{SWATCHES, ThemeColor};
use crate::time_provider::{SystemTimeProvider, TimeProvider};
use crate::timer::engine::SessionState;
use crate::timer::parse::{format_hms, format_percent, parse_seconds};

const HERO_ROTATE_EVERY: Duration = Duration::from_secs(3);
const IDLE_REPAINT: Duration = Duration::from_millis(250);
const BACKGROUND: Color32 = Color32::from_rgb(28, 28, 28);
const NOTICE_ERROR: Color32 = Color32::from_rgb(255, 120, 120);
const NOTICE_INFO: Color32 = Color32::from_rgb(161, 230, 200);

const HERO_WORDS: &[&str] = &[
    "focus", "study", "work", "code", "write", "grind", "create", "read", "plan", "finish",
    "organise", "build", "research", "clean", "polish", "run", "lift", "plank", "stretch", "train",
    "squat", "bench", "deadlift", "pushup", "sweat", "move", "jog", "cycle", "meditate", "breathe",
    "chill", "rest", "reflect", "unwind", "relax", "nap", "reset", "soak", "zen", "cook", "bake",
    "boil", "fry", "brew", "wash", "vacuum", "mop", "dust", "fold", "shop", "prep", "game",
    "scroll", "meme", "vibe", "party", "sing", "dance", "jam", "binge", "paint", "draw", "goon",
    "punt", "procrastinate", "doomscroll", "panic", "schemin", "yeet", "touchgrass", "manifest",
    "simp", "conquer", "vanish", "loaf",
];

const TIME_EXAMPLES: &[&str] = &[
    "E.g. 25m, 1:30:00, 90 sec",
    "E.g. 13s (speedrun to fridge)",
    "E.g. 40m (nap before regret)",
    "E.g. 2h (enough to question life choices)",
    "E.g. 69m (nice)",
    "E.g. 8h (the sleep I'll never get)",
];

pub fn run_gui(controller: TimerController, fps: u16) -> Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Time to...")
            .with_inner_size([960.0, 640.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    let app = TimeToApp::new(controller, fps);
    eframe::run_native(
        "timeto",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to launch timer window: {err}"))?;

    Ok(())
}

fn configure_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(Color32::WHITE);
    visuals.panel_fill = BACKGROUND;
    visuals.window_fill = Color32::from_rgb(36, 36, 36);
    visuals.extreme_bg_color = Color32::from_rgb(20, 20, 20);
    ctx.set_visuals(visuals);
}

fn to_color32(color: ThemeColor) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

fn pick_placeholder() -> &'static str {
    TIME_EXAMPLES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(TIME_EXAMPLES[0])
}

/// Minimised or unfocused windows drop to the coarse cadence.
fn surface_visible(minimized: Option<bool>, focused: Option<bool>) -> bool {
    !minimized.unwrap_or(false) && focused.unwrap_or(true)
}

/// Keeps a 1 Hz repaint request alive while a countdown runs, so completion
/// is noticed even when the window has stopped repainting on its own.
fn sync_waker(waker: &mut Option<CoarseWaker>, state: SessionState, ctx: &egui::Context) {
    match (state, waker.is_some()) {
        (SessionState::Running, false) => {
            let ctx = ctx.clone();
            *waker = Some(CoarseWaker::spawn(COARSE_INTERVAL, move || {
                ctx.request_repaint()
            }));
        }
        (SessionState::Idle | SessionState::Finished, true) => *waker = None,
        _ => {}
    }
}

struct TimeToApp {
    controller: TimerController,
    provider: SystemTimeProvider,
    fps: u16,
    title_input: String,
    time_input: String,
    time_placeholder: &'static str,
    word_index: usize,
    next_word_at: Instant,
    picker_open: bool,
    hex_input: String,
    pending_title_input: String,
    show_history: bool,
    goal_title_input: String,
    goal_sessions: u32,
    goal_hours: f64,
    waker: Option<CoarseWaker>,
}

impl TimeToApp {
    fn new(controller: TimerController, fps: u16) -> Self {
        let hex_input = controller.theme().committed().to_hex();
        Self {
            controller,
            provider: SystemTimeProvider::new(),
            fps: fps.max(1),
            title_input: String::new(),
            time_input: String::new(),
            time_placeholder: TIME_EXAMPLES[0],
            word_index: 0,
            next_word_at: Instant::now() + HERO_ROTATE_EVERY,
            picker_open: false,
            hex_input,
            pending_title_input: String::new(),
            show_history: false,
            goal_title_input: String::new(),
            goal_sessions: 4,
            goal_hours: 0.0,
            waker: None,
        }
    }

    fn accent(&self) -> Color32 {
        to_color32(self.controller.theme().active())
    }

    fn start_from_form(&mut self) {
        let sample = self.provider.now();
        let title = self.title_input.clone();
        let time_text = self.time_input.clone();
        if self
            .controller
            .start_from_input(&title, &time_text, sample)
            .is_ok()
        {
            self.close_picker(false);
            self.pending_title_input.clear();
        }
    }

    fn restart(&mut self) {
        self.controller.reset();
        self.pending_title_input.clear();
    }

    fn close_picker(&mut self, save: bool) {
        if save {
            self.controller.save_theme();
        } else {
            self.controller.theme_mut().cancel();
        }
        self.picker_open = false;
        self.hex_input = self.controller.theme().committed().to_hex();
    }

    fn rotate_hero_word(&mut self, now: Instant) {
        if now < self.next_word_at {
            return;
        }
        self.word_index = (self.word_index + 1) % HERO_WORDS.len();
        self.next_word_at = now + HERO_ROTATE_EVERY;
    }

    fn show_notice(&mut self, ui: &mut Ui) {
        let Some(notice) = self.controller.notice() else {
            return;
        };
        let color = match notice.kind {
            NoticeKind::Error => NOTICE_ERROR,
            NoticeKind::Info => NOTICE_INFO,
        };
        let text = notice.text.clone();
        let mut dismissed = false;
        ui.horizontal_wrapped(|ui| {
            ui.label(RichText::new(text).size(18.0).color(color).strong());
            if ui.button("Dismiss").clicked() {
                dismissed = true;
            }
        });
        if dismissed {
            self.controller.dismiss_notice();
        }
    }

    fn show_setup(&mut self, ui: &mut Ui) {
        let accent = self.accent();
        ui.vertical_centered(|ui| {
            ui.add_space((ui.available_height() * 0.12).max(12.0));
            ui.label(RichText::new("Time to").size(44.0));
            ui.label(
                RichText::new(HERO_WORDS[self.word_index])
                    .size(44.0)
                    .italics()
                    .color(accent),
            );
            ui.add_space(18.0);

            let title_response = ui.add(
                TextEdit::singleline(&mut self.title_input)
                    .hint_text("Enter timer title")
                    .font(egui::TextStyle::Heading)
                    .horizontal_align(Align::Center)
                    .desired_width(400.0),
            );
            ui.add_space(24.0);
            ui.label(RichText::new("How much time you got?").size(26.0));
            let time_response = ui.add(
                TextEdit::singleline(&mut self.time_input)
                    .hint_text(self.time_placeholder)
                    .font(egui::TextStyle::Heading)
                    .horizontal_align(Align::Center)
                    .desired_width(400.0),
            );
            if time_response.gained_focus() {
                self.time_placeholder = pick_placeholder();
            }
            let understood = parse_seconds(&self.time_input);
            if understood > 0 {
                ui.label(
                    RichText::new(format!("= {}", format_hms(understood)))
                        .color(Color32::from_rgb(161, 180, 201)),
                );
            }
            let submitted = (title_response.lost_focus() || time_response.lost_focus())
                && ui.input(|input| input.key_pressed(Key::Enter));

            ui.add_space(16.0);
            let start_clicked = ui
                .add(
                    egui::Button::new(RichText::new("Start").size(26.0).color(Color32::BLACK))
                        .fill(accent)
                        .min_size(egui::vec2(160.0, 44.0)),
                )
                .clicked();
            if submitted || start_clicked {
                self.start_from_form();
            }

            ui.add_space(16.0);
            ui.horizontal(|ui| {
                let theme_label = if self.picker_open { "Close theme" } else { "Theme" };
                if ui
                    .add(egui::Button::new(RichText::new(theme_label).color(accent)).frame(false))
                    .clicked()
                {
                    if self.picker_open {
                        self.close_picker(false);
                    } else {
                        self.picker_open = true;
                        self.hex_input = self.controller.theme().committed().to_hex();
                    }
                }
                let history_label = if self.show_history { "Hide history" } else { "History" };
                if ui
                    .add(egui::Button::new(RichText::new(history_label).color(accent)).frame(false))
                    .clicked()
                {
                    self.show_history = !self.show_history;
                }
            });
            if self.picker_open {
                self.show_picker(ui);
            }
        });
    }

    fn show_picker(&mut self, ui: &mut Ui) {
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            for swatch in SWATCHES {
                let Ok(color) = swatch.parse::<ThemeColor>() else {
                    continue;
                };
                let (rect, response) =
                    ui.allocate_exact_size(egui::vec2(26.0, 26.0), egui::Sense::click());
                ui.painter().rect_filled(rect, 4.0, to_color32(color));
                if response.on_hover_text(swatch).clicked() {
                    self.controller.theme_mut().preview(color);
                    self.hex_input = swatch.to_string();
                }
            }

            let active = self.controller.theme().active();
            let mut rgb = [active.r, active.g, active.b];
            if ui.color_edit_button_srgb(&mut rgb).changed() {
                let picked = ThemeColor::rgb(rgb[0], rgb[1], rgb[2]);
                self.controller.theme_mut().preview(picked);
                self.hex_input = picked.to_hex();
            }
        });
        ui.horizontal(|ui| {
            ui.label("Hex");
            let response = ui.add(TextEdit::singleline(&mut self.hex_input).desired_width(100.0));
            if response.changed()
                && let Ok(color) = self.hex_input.parse::<ThemeColor>()
            {
                self.controller.theme_mut().preview(color);
            }
            let previewing = self.controller.theme().is_previewing();
            if ui.add_enabled(previewing, egui::Button::new("Save")).clicked() {
                self.close_picker(true);
            }
            if ui.button("Cancel").clicked() {
                self.close_picker(false);
            }
        });
    }

    fn show_countdown(&mut self, ui: &mut Ui) {
        let frame = self.controller.frame();
        let accent = self.accent();
        let full = ui.max_rect();
        let fraction = (frame.percent / 100.0).clamp(0.0, 1.0) as f32;
        let filled = egui::Rect::from_min_size(
            full.min,
            egui::vec2(full.width() * fraction, full.height()),
        );
        ui.painter().rect_filled(filled, 0.0, accent);

        let mut restart = false;
        ui.add_space(10.0);
        ui.columns(3, |columns| {
            columns[0].label(RichText::new(format_percent(frame.percent)).size(24.0));
            columns[1].vertical_centered(|ui| {
                ui.label(RichText::new(self.controller.title()).size(36.0).strong());
            });
            columns[2].with_layout(Layout::right_to_left(Align::Min), |ui| {
                if ui.button(RichText::new("Restart").size(20.0)).clicked() {
                    restart = true;
                }
            });
        });

        ui.vertical_centered(|ui| {
            ui.add_space((ui.available_height() * 0.25).max(8.0));
            let size = (ui.available_width() / 5.0).clamp(48.0, 220.0);
            ui.label(
                RichText::new(format_hms(frame.remaining_seconds))
                    .size(size)
                    .monospace(),
            );
            if frame.state == SessionState::Finished && self.controller.has_pending_title() {
                ui.add_space(16.0);
                ui.label(RichText::new("What were you doing?").size(22.0));
                let response = ui.add(
                    TextEdit::singleline(&mut self.pending_title_input)
                        .hint_text("Name this session")
                        .horizontal_align(Align::Center)
                        .desired_width(300.0),
                );
                let submitted =
                    response.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter));
                if (ui.button("Log it").clicked() || submitted)
                    && self
                        .controller
                        .resolve_pending_title(&self.pending_title_input)
                {
                    self.pending_title_input.clear();
                }
            }
        });

        if restart {
            self.restart();
        }
    }

    fn show_history_panel(&mut self, ui: &mut Ui) {
        ui.heading("History");
        match self.controller.user() {
            Some(user) => ui.label(format!("Logging sessions for {user}")),
            None => ui.label(
                RichText::new("Set --user to log completed sessions.")
                    .color(Color32::from_rgb(161, 180, 201)),
            ),
        };
        ui.separator();

        let progress = self.controller.goal_progress();
        let mut remove_title = None;
        ui.label(RichText::new("Goals").strong());
        if progress.is_empty() {
            ui.label("No goals yet.");
        }
        for goal in &progress {
            ui.horizontal(|ui| {
                ui.label(RichText::new(&goal.title).strong());
                if goal.is_met() {
                    ui.colored_label(NOTICE_INFO, "met");
                }
                if ui.small_button("Remove").clicked() {
                    remove_title = Some(goal.title.clone());
                }
            });
            if let (Some(target), Some(ratio)) = (goal.goal.target_sessions, goal.sessions_ratio())
            {
                ui.add(
                    egui::ProgressBar::new(ratio.min(1.0) as f32)
                        .text(format!("{}/{target} sessions", goal.totals.sessions)),
                );
            }
            if let (Some(target), Some(ratio)) = (goal.goal.target_hours, goal.hours_ratio()) {
                ui.add(
                    egui::ProgressBar::new(ratio.min(1.0) as f32)
                        .text(format!("{:.1}/{target:.1} h", goal.hours_done())),
                );
            }
        }
        if let Some(title) = remove_title {
            self.controller.remove_goal(&title);
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label("Title");
            ui.add(TextEdit::singleline(&mut self.goal_title_input).desired_width(140.0));
        });
        ui.horizontal(|ui| {
            ui.label("Sessions");
            ui.add(egui::DragValue::new(&mut self.goal_sessions).range(0..=1_000));
            ui.label("Hours");
            ui.add(
                egui::DragValue::new(&mut self.goal_hours)
                    .range(0.0..=1_000.0)
                    .speed(0.25),
            );
        });
        if ui.button("Set goal").clicked() {
            let goal = Goal {
                target_sessions: (self.goal_sessions > 0).then_some(self.goal_sessions),
                target_hours: (self.goal_hours > 0.0).then_some(self.goal_hours),
            };
            let title = self.goal_title_input.clone();
            if self.controller.set_goal(&title, goal).is_ok() {
                self.goal_title_input.clear();
            }
        }

        ui.separator();
        ui.label(RichText::new("Recent sessions").strong());
        ScrollArea::vertical()
            .id_salt("history_scroll")
            .show(ui, |ui| {
                let history = self.controller.history();
                if history.logs.is_empty() {
                    ui.label("Nothing logged yet.");
                }
                for entry in history.recent_logs(50) {
                    let color = entry
                        .color
                        .parse::<ThemeColor>()
                        .map(to_color32)
                        .unwrap_or(Color32::GRAY);
                    ui.horizontal(|ui| {
                        ui.colored_label(color, "■");
                        ui.label(&entry.title);
                        ui.label(RichText::new(format_hms(entry.seconds)).monospace());
                        ui.label(
                            RichText::new(entry.completed_at.format("%Y-%m-%d %H:%M").to_string())
                                .color(Color32::from_rgb(161, 180, 201)),
                        );
                    });
                }
            });
    }

    fn schedule_repaint(&self, ctx: &egui::Context, visible: bool) {
        if self.controller.state() == SessionState::Running {
            let cadence = Cadence::for_surface(visible, self.fps);
            ctx.request_repaint_after(cadence.interval());
        } else {
            ctx.request_repaint_after(IDLE_REPAINT);
        }
    }
}

impl eframe::App for TimeToApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let visible = ctx.input(|input| {
            let viewport = input.viewport();
            surface_visible(viewport.minimized, viewport.focused)
        });
        let sample = self.provider.now();
        self.controller.tick(sample);
        sync_waker(&mut self.waker, self.controller.state(), ctx);
        if self.controller.state() == SessionState::Idle {
            self.rotate_hero_word(sample.monotonic);
        }

        if self.controller.notice().is_some() {
            TopBottomPanel::top("notice")
                .resizable(false)
                .show(ctx, |ui| self.show_notice(ui));
        }

        if self.show_history {
            egui::SidePanel::right("history_panel")
                .resizable(true)
                .min_width(260.0)
                .default_width(320.0)
                .show(ctx, |ui| self.show_history_panel(ui));
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(BACKGROUND))
            .show(ctx, |ui| match self.controller.state() {
                SessionState::Idle => self.show_setup(ui),
                SessionState::Running | SessionState::Finished => self.show_countdown(ui),
            });

        self.schedule_repaint(ctx, visible);
    }
}
