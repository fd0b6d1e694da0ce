use std::hash::{DefaultHasher, Hash, Hasher};

use catppuccin_egui::Theme;
use egui::{Align2, Color32, FontId, Pos2, Rect, Response, Sense, Stroke, Ui, Vec2};

use crate::network::{layout_graph::RenderProjection, peer::PeerId};

const NODE_RADIUS: f32 = 8.0;
const ARROW_LENGTH: f32 = 7.0;

/// Pan/zoom state of the graph canvas.
#[derive(Debug, Clone)]
pub struct CanvasView {
    pub pan: Vec2,
    pub zoom: f32,
    pub show_labels: bool,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            show_labels: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct CanvasResponse {
    pub clicked: Option<PeerId>,
    /// Screen position of the selected node, if it is drawn.
    pub selected_anchor: Option<Pos2>,
}

/// World origin sits at the viewport center.
fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Pos2) -> Pos2 {
    rect.center() + pan + world.to_vec2() * zoom
}

fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Pos2 {
    ((screen - rect.center() - pan) / zoom).to_pos2()
}

/// Stable per-peer color picked from the theme's accent palette.
pub fn peer_color(theme: &Theme, id: &PeerId) -> Color32 {
    let palette = [
        theme.blue,
        theme.peach,
        theme.green,
        theme.red,
        theme.mauve,
        theme.maroon,
        theme.pink,
        theme.overlay2,
        theme.yellow,
        theme.teal,
    ];
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    palette[(hasher.finish() % palette.len() as u64) as usize]
}

impl CanvasView {
    pub fn show(
        &mut self,
        ui: &mut Ui,
        projection: &RenderProjection,
        selected: Option<&PeerId>,
        theme: &Theme,
    ) -> CanvasResponse {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, theme.base);

        self.handle_zoom(ui, rect, &response);
        if response.dragged() {
            self.pan += response.drag_delta();
        }

        let (pan, zoom) = (self.pan, self.zoom);
        let radius = (NODE_RADIUS * zoom.powf(0.4)).clamp(3.0, 24.0);
        let link_stroke = Stroke::new(1.5, theme.overlay1);

        for link in &projection.links {
            let from = world_to_screen(rect, pan, zoom, link.from);
            let to = world_to_screen(rect, pan, zoom, link.to);
            let delta = to - from;
            let length = delta.length();
            if length <= radius {
                continue;
            }
            let direction = delta / length;
            let tip = to - direction * radius;
            painter.line_segment([from, tip], link_stroke);

            let normal = Vec2::new(-direction.y, direction.x);
            let base = tip - direction * ARROW_LENGTH;
            painter.add(egui::Shape::convex_polygon(
                vec![
                    tip,
                    base + normal * (ARROW_LENGTH * 0.5),
                    base - normal * (ARROW_LENGTH * 0.5),
                ],
                theme.overlay1,
                Stroke::NONE,
            ));
        }

        let pointer = response.interact_pointer_pos().or_else(|| response.hover_pos());
        let mut hovered: Option<(&PeerId, f32)> = None;
        let mut selected_anchor = None;

        for node in &projection.nodes {
            let center = world_to_screen(rect, pan, zoom, node.position);
            if !rect.expand(radius).contains(center) {
                continue;
            }

            let is_selected = selected == Some(&node.id);
            let stroke = if is_selected {
                Stroke::new(3.0, theme.text)
            } else {
                Stroke::new(1.5, theme.crust)
            };
            painter.circle(center, radius, peer_color(theme, &node.id), stroke);

            if is_selected {
                selected_anchor = Some(center);
            }
            if self.show_labels {
                painter.text(
                    center + Vec2::new(0.0, radius + 2.0),
                    Align2::CENTER_TOP,
                    node.id.as_str(),
                    FontId::proportional(11.0),
                    theme.subtext0,
                );
            }

            if let Some(pointer) = pointer {
                let distance = center.distance(pointer);
                if distance <= radius && hovered.is_none_or(|(_, best)| distance < best) {
                    hovered = Some((&node.id, distance));
                }
            }
        }

        if let Some((id, _)) = hovered {
            response.clone().on_hover_text_at_pointer(id.to_string());
        }

        CanvasResponse {
            clicked: if response.clicked() {
                hovered.map(|(id, _)| id.clone())
            } else {
                None
            },
            selected_anchor,
        }
    }

    fn handle_zoom(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        if !response.hovered() {
            return;
        }
        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, self.pan, self.zoom, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(0.05, 6.0);
        self.pan = pointer - rect.center() - (world_before.to_vec2() * self.zoom);
    }

    pub fn reset(&mut self) {
        self.pan = Vec2::ZERO;
        self.zoom = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_world_round_trip() {
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let (pan, zoom) = (Vec2::new(15.0, -5.0), 2.0);
        let world = Pos2::new(-30.0, 12.5);

        let screen = world_to_screen(rect, pan, zoom, world);
        assert_eq!(world_to_screen(rect, Vec2::ZERO, 1.0, Pos2::ZERO), rect.center());
        let back = screen_to_world(rect, pan, zoom, screen);
        assert!((back - world).length() < 1e-4);
    }

    #[test]
    fn test_peer_color_is_stable() {
        let theme = catppuccin_egui::MOCHA;
        let id = PeerId::from("a94a8fe5");
        assert_eq!(peer_color(&theme, &id), peer_color(&theme, &id));
    }
}
