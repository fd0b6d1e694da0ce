use egui::{self, Context, Frame, Id, Order, Pos2, Ui, Vec2};

use crate::{network::peer::PeerId, topology::store::TopologyStore};

/// Text block describing a peer's routing table, as shown to the operator.
///
/// Neighbors are ranked by bucket index (starting at 1). Returns `None` for unknown peers.
pub fn describe(store: &TopologyStore, id: &PeerId) -> Option<String> {
    let node = store.node_by_id(id)?;
    let mut out = String::from("Neighbors:\n");

    match &node.last_info {
        Some(info) => {
            for (bucket_index, entry) in info.neighbors() {
                out.push_str(&format!("{}. {}\n", bucket_index + 1, entry.id));
            }
        }
        None => out.push_str("(not probed yet)\n"),
    }

    out.push_str(&format!(
        "\n\nAddress: {}\n",
        node.address.as_deref().unwrap_or("unknown")
    ));

    if let Some(info) = &node.last_info {
        out.push_str(&format!("Port: {}\n", info.port));
        if !info.storage.is_empty() {
            out.push_str("Storage:\n");
            for key in info.storage.keys() {
                out.push_str(&format!("- {key}\n"));
            }
        }
    }
    Some(out)
}

/// Response data from the inspector panel show call.
#[derive(Debug, Clone, Default)]
pub struct InspectorResponse {
    pub close_clicked: bool,
    pub reprobe_clicked: bool,
}

/// Floating panel anchored near the selected node that shows `describe` output.
#[derive(Debug, Clone)]
pub struct InspectorPanel {
    id: Id,
    anchor: Pos2,
    offset: Vec2,
    min_width: f32,
}

impl InspectorPanel {
    pub fn new(id: Id, anchor: Pos2) -> Self {
        Self {
            id,
            anchor,
            // slightly right of and above the node
            offset: Vec2 { x: 12.0, y: -80.0 },
            min_width: 240.0,
        }
    }

    pub fn show(
        &self,
        ctx: &Context,
        store: &TopologyStore,
        peer: &PeerId,
        probing: bool,
    ) -> InspectorResponse {
        let mut response = InspectorResponse::default();
        let text = describe(store, peer).unwrap_or_else(|| format!("Unknown peer {peer}"));
        let last_probed = store.node_by_id(peer).and_then(|node| node.last_probed);

        egui::Area::new(self.id)
            .order(Order::Foreground)
            .interactable(true)
            .constrain(true)
            .fixed_pos(self.anchor + self.offset)
            .show(ctx, |ui| {
                Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_min_width(self.min_width);
                    ui.horizontal(|ui| {
                        ui.strong(peer.to_string());
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.small_button("✕").on_hover_text("Close").clicked() {
                                response.close_clicked = true;
                            }
                            let reprobe = ui.add_enabled(!probing, egui::Button::new("⟳").small());
                            if reprobe.on_hover_text("Probe this peer again").clicked() {
                                response.reprobe_clicked = true;
                            }
                        });
                    });
                    ui.separator();
                    if probing {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Probing...");
                        });
                    }
                    if let Some(ts) = last_probed {
                        ui.small(format!(
                            "Last probed: {}",
                            humantime::format_rfc3339_seconds(ts)
                        ));
                    }
                    monospace_block(ui, &text);
                });
            });

        response
    }
}

fn monospace_block(ui: &mut Ui, text: &str) {
    ui.add(egui::Label::new(egui::RichText::new(text).monospace()).wrap_mode(egui::TextWrapMode::Extend));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::topology::store::tests::info;

    #[test]
    fn test_describe_ranks_by_bucket() {
        let mut store = TopologyStore::new();
        store.ingest(info("A", &[&[("B", "h2"), ("C", "h3")], &[], &[("D", "h4")]]), Some("h1"));

        let text = describe(&store, &"A".into()).unwrap();
        assert_eq!(
            text,
            "Neighbors:\n1. B\n1. C\n3. D\n\n\nAddress: h1\nPort: 9000\n"
        );
    }

    #[test]
    fn test_describe_unprobed_neighbor() {
        let mut store = TopologyStore::new();
        store.ingest(info("A", &[&[("B", "h2")]]), Some("h1"));

        let text = describe(&store, &"B".into()).unwrap();
        assert_eq!(text, "Neighbors:\n(not probed yet)\n\n\nAddress: h2\n");
        assert!(describe(&store, &"Z".into()).is_none());
    }

    #[test]
    fn test_describe_lists_storage_keys() {
        let mut store = TopologyStore::new();
        let mut snapshot = info("A", &[]);
        snapshot.storage.insert("k2".into(), json!("v"));
        snapshot.storage.insert("k1".into(), json!(3));
        store.ingest(snapshot, None);

        let text = describe(&store, &"A".into()).unwrap();
        assert!(text.contains("Address: unknown"));
        assert!(text.ends_with("Storage:\n- k1\n- k2\n"));
    }

    #[test]
    fn test_describe_does_not_mutate() {
        let mut store = TopologyStore::new();
        store.ingest(info("A", &[&[("B", "h2")]]), Some("h1"));
        let before = (store.node_count(), store.edge_log_len());

        let _ = describe(&store, &"A".into());
        let _ = describe(&store, &"B".into());
        assert_eq!((store.node_count(), store.edge_log_len()), before);
    }
}
