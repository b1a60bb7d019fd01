use anyhow::Result;
use eframe::{egui, App, CreationContext, Frame};
use log::{error, info};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use crate::config::Config;
use crate::display::EguiDisplay;
use crate::pages;
use crate::render::{self, PageTexture};
use crate::types::{LibraryItem, MangaItem, ViewMode};
use crate::viewer::{PageViewer, ReaderSettings};

const SOURCE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "gif", "cbz", "zip"];

struct ReaderSession {
    viewer: PageViewer,
    texture: PageTexture,
}

pub struct MangaApp {
    display: EguiDisplay,
    settings: ReaderSettings,
    view_mode: ViewMode,
    library: Vec<LibraryItem>,
    mangas: HashMap<String, MangaItem>,
    reader: Option<ReaderSession>,
    close_requested: Rc<Cell<bool>>,
    pending_path: Option<PathBuf>,
    status_message: Option<(String, f32)>,
}

impl MangaApp {
    pub fn new(cc: &CreationContext<'_>, config: Config) -> Self {
        let mut app = Self::with_context(cc.egui_ctx.clone(), config.reader);
        app.pending_path = config.open_path;
        if app.pending_path.is_some() {
            cc.egui_ctx.request_repaint();
        }
        app
    }

    fn with_context(ctx: egui::Context, settings: ReaderSettings) -> Self {
        Self {
            display: EguiDisplay::new(ctx),
            settings,
            view_mode: ViewMode::Library,
            library: Vec::new(),
            mangas: HashMap::new(),
            reader: None,
            close_requested: Rc::new(Cell::new(false)),
            pending_path: None,
            status_message: None,
        }
    }

    fn set_status(&mut self, message: String, duration: f32) {
        self.status_message = Some((message, duration));
    }

    fn open_path(&mut self, path: &Path) -> Result<()> {
        let opened = pages::open_manga(path)?;
        let id = opened.manga.id().to_owned();
        if !self.mangas.contains_key(&id) {
            self.library.push(opened.manga.library_item());
        }
        self.mangas.insert(id, opened.manga.clone());
        self.mount(opened.manga, opened.start_index);
        Ok(())
    }

    fn open_from_library(&mut self, id: &str) {
        if let Some(manga) = self.mangas.get(id).cloned() {
            self.mount(manga, 0);
        }
    }

    fn mount(&mut self, manga: MangaItem, start_index: usize) {
        if let Some(session) = self.reader.take() {
            session.viewer.unmount(&mut self.display);
        }
        self.close_requested.set(false);
        let close_requested = Rc::clone(&self.close_requested);
        let viewer = PageViewer::mount_at(
            manga,
            start_index,
            Box::new(move || close_requested.set(true)),
            &mut self.display,
            self.settings,
        );
        self.reader = Some(ReaderSession {
            viewer,
            texture: PageTexture::default(),
        });
        self.view_mode = ViewMode::Reader;
    }

    fn apply_close_request(&mut self) {
        if !self.close_requested.replace(false) {
            return;
        }
        if let Some(session) = self.reader.take() {
            session.viewer.unmount(&mut self.display);
        }
        self.view_mode = ViewMode::Library;
    }

    fn open_dialog(&mut self, pick_folder: bool) {
        let picked = if pick_folder {
            rfd::FileDialog::new().pick_folder()
        } else {
            rfd::FileDialog::new()
                .add_filter("Comics & Images", &SOURCE_EXTENSIONS)
                .pick_file()
        };
        if let Some(path) = picked {
            self.open_reporting(&path);
        }
    }

    fn open_reporting(&mut self, path: &Path) {
        if let Err(e) = self.open_path(path) {
            error!("Error opening {}: {:#}", path.display(), e);
            self.set_status(format!("Error: {:#}", e), 5.0);
        }
    }

    fn update_reader(&mut self, ctx: &egui::Context) {
        let Some(session) = self.reader.as_mut() else {
            self.view_mode = ViewMode::Library;
            return;
        };
        let now = Instant::now();

        session.viewer.sync_fullscreen(&self.display);
        session.viewer.handle_pending_keys(&mut self.display);
        session.viewer.tick(now);

        render::show_reader(
            ctx,
            &mut session.viewer,
            &mut session.texture,
            &mut self.display,
            now,
        );

        if let Some(wait) = session.viewer.next_tick_in(now) {
            ctx.request_repaint_after(wait);
        }
        self.apply_close_request();
    }

    fn show_library(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("{} in library", self.library.len()));
                if let Some((ref message, _)) = self.status_message {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(message);
                    });
                }
            });
        });

        let mut open_id = None;
        let mut dialog = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.heading("Manga Viewer");
                ui.label("Open a folder of images or a comic archive (.cbz, .zip)");
                ui.add_space(20.0);

                ui.horizontal(|ui| {
                    if ui.button("Open File").clicked() {
                        dialog = Some(false);
                    }
                    if ui.button("Open Directory").clicked() {
                        dialog = Some(true);
                    }
                });

                if !self.library.is_empty() {
                    ui.add_space(20.0);
                    ui.heading("Library");
                    for item in &self.library {
                        let title = if item.is_demo == Some(true) {
                            format!("{} (demo)", item.title)
                        } else {
                            item.title.clone()
                        };
                        if ui.button(title).on_hover_text(item.id.as_str()).clicked() {
                            open_id = Some(item.id.clone());
                        }
                    }
                }

                ui.add_space(20.0);
                ui.collapsing("Keyboard Shortcuts", |ui| {
                    ui.label("Arrow Right / Space: Next page");
                    ui.label("Arrow Left: Previous page");
                    ui.label("Escape: Exit fullscreen, or close the reader");
                    ui.label("Click the page: Show/hide controls");
                });
            });
        });

        if let Some(pick_folder) = dialog {
            self.open_dialog(pick_folder);
        }
        if let Some(id) = open_id {
            info!("Reopening {}", id);
            self.open_from_library(&id);
        }
    }
}

impl App for MangaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        if let Some(path) = self.pending_path.take() {
            self.open_reporting(&path);
        }

        if let Some((_, ref mut duration)) = self.status_message {
            *duration -= ctx.input(|i| i.unstable_dt);
            if *duration <= 0.0 {
                self.status_message = None;
            }
        }

        match self.view_mode {
            ViewMode::Reader => self.update_reader(ctx),
            ViewMode::Library => self.show_library(ctx),
        }
    }
}
