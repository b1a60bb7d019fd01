use eframe::egui;
use egui::{
    Align2, Color32, ColorImage, Rect, RichText, Sense, TextureHandle, TextureOptions, Ui, Vec2,
};
use image::DynamicImage;
use log::warn;
use std::time::Instant;

use crate::display::DisplayEnvironment;
use crate::pages;
use crate::viewer::PageViewer;

const OVERLAY_FILL: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 180);
const PLAYING_DOT: Color32 = Color32::from_rgb(74, 222, 128);

/// Texture for the page currently on screen. A page that failed to decode is
/// remembered as `None` so it is not retried every frame.
#[derive(Default)]
pub struct PageTexture {
    loaded: Option<(String, Option<TextureHandle>)>,
}

impl PageTexture {
    fn get(&mut self, ctx: &egui::Context, reference: &str) -> Option<&TextureHandle> {
        let stale = self
            .loaded
            .as_ref()
            .map_or(true, |(loaded, _)| loaded != reference);
        if stale {
            let texture = match pages::load_page(reference) {
                Ok(img) => Some(to_texture(ctx, img)),
                Err(e) => {
                    warn!("{:#}", e);
                    None
                }
            };
            self.loaded = Some((reference.to_owned(), texture));
        }
        self.loaded.as_ref().and_then(|(_, texture)| texture.as_ref())
    }
}

fn to_texture(ctx: &egui::Context, img: DynamicImage) -> TextureHandle {
    let size = [img.width() as _, img.height() as _];
    let image_buffer = img.to_rgba8();
    let pixels = image_buffer.as_flat_samples();
    let color_image = ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
    ctx.load_texture("current_page", color_image, TextureOptions::default())
}

/// Largest rect with the image's aspect ratio that fits inside `area`, centred.
pub fn fit_rect(image_size: Vec2, area: Rect) -> Rect {
    if image_size.x <= 0.0 || image_size.y <= 0.0 {
        return Rect::from_center_size(area.center(), Vec2::ZERO);
    }
    let scale = (area.width() / image_size.x).min(area.height() / image_size.y);
    Rect::from_center_size(area.center(), image_size * scale)
}

pub fn page_toast(title: &str, index: usize) -> String {
    format!("{} • PAGE {}", title.to_uppercase(), index + 1)
}

pub fn show_reader(
    ctx: &egui::Context,
    viewer: &mut PageViewer,
    texture: &mut PageTexture,
    env: &mut dyn DisplayEnvironment,
    now: Instant,
) {
    egui::CentralPanel::default()
        .frame(egui::Frame::new().fill(Color32::BLACK))
        .show(ctx, |ui| {
            draw_page(ui, ctx, viewer, texture);
        });

    if !viewer.show_controls() {
        return;
    }

    egui::Area::new(egui::Id::new("reader_home"))
        .anchor(Align2::LEFT_TOP, [24.0, 24.0])
        .show(ctx, |ui| {
            overlay_frame(ui, |ui| {
                if ui.button(RichText::new("🏠 Home").size(18.0)).clicked() {
                    viewer.close();
                }
            });
        });

    egui::Area::new(egui::Id::new("reader_fullscreen"))
        .anchor(Align2::RIGHT_TOP, [-24.0, 24.0])
        .show(ctx, |ui| {
            overlay_frame(ui, |ui| {
                let label = if viewer.is_fullscreen() {
                    "Exit Fullscreen"
                } else {
                    "Fullscreen"
                };
                if ui.button(RichText::new(label).size(18.0)).clicked() {
                    viewer.toggle_fullscreen(env);
                }
            });
        });

    egui::Area::new(egui::Id::new("reader_controls"))
        .anchor(Align2::CENTER_BOTTOM, [0.0, -40.0])
        .show(ctx, |ui| {
            overlay_frame(ui, |ui| {
                ui.vertical_centered(|ui| {
                    draw_slider(ui, viewer);
                    ui.add_space(8.0);
                    draw_buttons(ui, viewer, now);
                });
            });
        });

    egui::Area::new(egui::Id::new("reader_toast"))
        .anchor(Align2::CENTER_BOTTOM, [0.0, -8.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(
                RichText::new(page_toast(viewer.manga().title(), viewer.current_index()))
                    .small()
                    .strong()
                    .color(Color32::from_white_alpha(80)),
            );
        });
}

fn draw_page(
    ui: &mut Ui,
    ctx: &egui::Context,
    viewer: &mut PageViewer,
    texture: &mut PageTexture,
) {
    let area = ui.max_rect();
    let response = ui.allocate_rect(area, Sense::click());

    if let Some(texture) = texture.get(ctx, viewer.current_page()) {
        ui.painter().image(
            texture.id(),
            fit_rect(texture.size_vec2(), area),
            Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            Color32::WHITE,
        );
    }

    if response.clicked() {
        viewer.toggle_controls();
    }
}

fn overlay_frame(ui: &mut Ui, add_contents: impl FnOnce(&mut Ui)) {
    egui::Frame::new()
        .fill(OVERLAY_FILL)
        .corner_radius(8.0)
        .inner_margin(8.0)
        .show(ui, add_contents);
}

fn draw_slider(ui: &mut Ui, viewer: &mut PageViewer) {
    ui.horizontal(|ui| {
        let muted = Color32::from_white_alpha(128);
        let current = (viewer.current_index() + 1).to_string();
        ui.label(RichText::new(current).small().color(muted));

        let mut index = viewer.current_index();
        ui.spacing_mut().slider_width = 420.0;
        let slider =
            egui::Slider::new(&mut index, 0..=viewer.manga().last_index()).show_value(false);
        if ui.add(slider).changed() {
            viewer.seek(index);
        }

        ui.label(RichText::new(viewer.page_count().to_string()).small().color(muted));
    });
}

fn draw_buttons(ui: &mut Ui, viewer: &mut PageViewer, now: Instant) {
    ui.horizontal(|ui| {
        let prev = egui::Button::new(RichText::new("◀").size(24.0));
        if ui.add_enabled(!viewer.is_first(), prev).clicked() {
            viewer.retreat();
        }

        // Placeholder for page analysis.
        ui.add_enabled(false, egui::Button::new(RichText::new("🧠").size(24.0)))
            .on_disabled_hover_text("Page analysis is not available yet");

        let (label, fill) = if viewer.is_playing() {
            ("⏸", Color32::from_rgb(239, 68, 68))
        } else {
            ("▶", Color32::from_rgb(75, 43, 238))
        };
        let play = ui.add(
            egui::Button::new(RichText::new(label).size(28.0).color(Color32::WHITE))
                .fill(fill)
                .min_size(Vec2::splat(48.0)),
        );
        if play.clicked() {
            viewer.toggle_play(now);
        }
        if viewer.is_playing() {
            let dot = play.rect.right_top() + Vec2::new(-2.0, 2.0);
            ui.painter().circle_filled(dot, 5.0, PLAYING_DOT);
        }

        let next = egui::Button::new(RichText::new("▶").size(24.0));
        if ui.add_enabled(!viewer.is_last(), next).clicked() {
            viewer.advance();
        }
    });
}
