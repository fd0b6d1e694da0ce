/*!
Force-directed simulation driving the `LayoutGraph`.

The simulation cools an `alpha` energy parameter on every tick; forces are scaled by it, so
the layout settles as alpha decays. `reheat` puts energy back in after a topology change.
World coordinates are centered on the origin; the canvas maps the origin to the viewport
center.
*/

mod forces;

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use egui::{Pos2, Vec2};
use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use crate::network::layout_graph::LayoutGraph;
use forces::{Link, apply_center, apply_links, apply_many_body, initial_position};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Many-body strength; negative repels.
    pub charge_strength: f32,
    /// Distance below which the many-body force stops growing.
    pub distance_min: f32,
    /// Rest length of the link spring.
    pub link_distance: f32,
    pub center: Pos2,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f32,
    pub alpha_min: f32,
    pub alpha_decay: f32,
    pub alpha_target: f32,
    /// Stop ticking this long after the last reheat. `None` runs until alpha cools down.
    pub halt_after: Option<Duration>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let alpha_min: f32 = 0.001;
        Self {
            charge_strength: -100.0,
            distance_min: 1.0,
            link_distance: 200.0,
            center: Pos2::ZERO,
            velocity_decay: 0.2,
            alpha_min,
            // cools from 1 to alpha_min in ~300 ticks
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            alpha_target: 0.0,
            halt_after: Some(Duration::from_millis(2000)),
        }
    }
}

pub struct LayoutDriver {
    config: SimulationConfig,
    alpha: f32,
    running: bool,
    last_reheat: Option<Instant>,
    ticks: u64,
    // scratch buffers reused between ticks
    indices: Vec<NodeIndex>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
}

impl LayoutDriver {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            alpha: 1.0,
            running: false,
            last_reheat: None,
            ticks: 0,
            indices: Vec::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Restarts the simulation at full energy and re-arms the halt timer.
    pub fn reheat(&mut self, now: Instant) {
        self.alpha = 1.0;
        self.running = true;
        self.last_reheat = Some(now);
        debug!("simulation reheated");
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advances the simulation by one step if it is running. Returns whether it still runs.
    pub fn tick(&mut self, layout: &mut LayoutGraph, now: Instant) -> bool {
        if !self.running {
            return false;
        }

        if let (Some(halt_after), Some(last_reheat)) = (self.config.halt_after, self.last_reheat)
            && now.saturating_duration_since(last_reheat) >= halt_after
        {
            debug!(ticks = self.ticks, alpha = self.alpha, "simulation halted by timer");
            self.running = false;
            return false;
        }

        self.step(layout);
        layout.refresh_projection();

        if self.alpha < self.config.alpha_min {
            debug!(ticks = self.ticks, "simulation cooled down");
            self.running = false;
        }
        self.running
    }

    /// One integration step, regardless of the running state.
    pub fn step(&mut self, layout: &mut LayoutGraph) {
        self.place_new_nodes(layout);

        self.alpha += (self.config.alpha_target - self.alpha) * self.config.alpha_decay;
        self.ticks += 1;

        self.indices.clear();
        self.positions.clear();
        self.velocities.clear();
        for index in layout.graph.node_indices() {
            let node = &layout.graph[index];
            self.indices.push(index);
            self.positions.push(node.position.unwrap_or(self.config.center).to_vec2());
            self.velocities.push(node.velocity);
        }
        if self.indices.is_empty() {
            return;
        }

        let slots: HashMap<NodeIndex, usize> = self
            .indices
            .iter()
            .enumerate()
            .map(|(slot, &index)| (index, slot))
            .collect();
        let pairs: Vec<(usize, usize)> = layout
            .graph
            .edge_indices()
            .filter_map(|edge| layout.graph.edge_endpoints(edge))
            .filter_map(|(from, to)| Some((*slots.get(&from)?, *slots.get(&to)?)))
            .collect();
        let links = Link::weighted(&pairs, self.indices.len());

        let mut rng = rand::rng();
        apply_many_body(
            &self.positions,
            &mut self.velocities,
            self.config.charge_strength,
            self.config.distance_min,
            self.alpha,
            &mut rng,
        );
        apply_links(
            &links,
            &self.positions,
            &mut self.velocities,
            self.config.link_distance,
            self.alpha,
            &mut rng,
        );
        apply_center(&mut self.positions, self.config.center);

        let retain = 1.0 - self.config.velocity_decay;
        for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            *velocity *= retain;
            *position += *velocity;
        }

        for (slot, &index) in self.indices.iter().enumerate() {
            if let Some(node) = layout.graph.node_weight_mut(index) {
                node.position = Some(self.positions[slot].to_pos2());
                node.velocity = self.velocities[slot];
            }
        }
    }

    fn place_new_nodes(&self, layout: &mut LayoutGraph) {
        let indices: Vec<NodeIndex> = layout.graph.node_indices().collect();
        for (slot, index) in indices.into_iter().enumerate() {
            if let Some(node) = layout.graph.node_weight_mut(index)
                && node.position.is_none()
            {
                node.position = Some(initial_position(slot, self.config.center));
            }
        }
    }
}

impl Default for LayoutDriver {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        network::peer::PeerId,
        topology::store::{TopologyStore, tests::info},
    };

    fn pair_layout() -> (TopologyStore, LayoutGraph) {
        let mut store = TopologyStore::new();
        store.ingest(info("A", &[&[("B", "h2")]]), Some("h1"));
        let mut layout = LayoutGraph::new();
        layout.reconcile(&store);
        (store, layout)
    }

    fn position(layout: &LayoutGraph, id: &str) -> Pos2 {
        layout.node(&PeerId::from(id)).unwrap().position.unwrap()
    }

    #[test]
    fn test_not_running_until_reheated() {
        let (_, mut layout) = pair_layout();
        let mut driver = LayoutDriver::default();
        assert!(!driver.tick(&mut layout, Instant::now()));
        assert!(layout.node(&"A".into()).unwrap().position.is_none());
    }

    #[test]
    fn test_first_tick_places_nodes_and_projects() {
        let (_, mut layout) = pair_layout();
        let mut driver = LayoutDriver::default();
        let now = Instant::now();
        driver.reheat(now);

        assert!(driver.tick(&mut layout, now));
        assert_eq!(layout.projection.nodes.len(), 2);
        assert_eq!(layout.projection.links.len(), 1);
        assert_eq!(layout.projection.links[0].from, position(&layout, "A"));
        assert_eq!(layout.projection.links[0].to, position(&layout, "B"));
    }

    #[test]
    fn test_simulation_converges() {
        let (_, mut layout) = pair_layout();
        let mut driver = LayoutDriver::new(SimulationConfig {
            halt_after: None,
            ..SimulationConfig::default()
        });
        let now = Instant::now();
        driver.reheat(now);

        let mut ticks = 0;
        while driver.tick(&mut layout, now) {
            ticks += 1;
            assert!(ticks < 1000, "simulation never cooled down");
        }
        assert!(driver.alpha() < driver.config().alpha_min);

        let (a, b) = (position(&layout, "A"), position(&layout, "B"));
        let distance = a.distance(b);
        assert!(distance > 150.0 && distance < 260.0, "settled at {distance}");
        let centroid = (a.to_vec2() + b.to_vec2()) / 2.0;
        assert!(centroid.length() < 1.0);
    }

    #[test]
    fn test_timer_halts_simulation() {
        let (_, mut layout) = pair_layout();
        let mut driver = LayoutDriver::default();
        let start = Instant::now();
        driver.reheat(start);

        assert!(driver.tick(&mut layout, start + Duration::from_millis(1000)));
        assert!(!driver.tick(&mut layout, start + Duration::from_millis(2500)));
        assert!(!driver.is_running());

        // a topology change re-arms the timer
        driver.reheat(start + Duration::from_millis(3000));
        assert!(driver.tick(&mut layout, start + Duration::from_millis(3500)));
        assert!(driver.alpha() < 1.0);
    }

    #[test]
    fn test_reconcile_keeps_settled_positions() {
        let (mut store, mut layout) = pair_layout();
        let mut driver = LayoutDriver::default();
        let now = Instant::now();
        driver.reheat(now);
        for _ in 0..50 {
            driver.tick(&mut layout, now);
        }
        let (a, b) = (position(&layout, "A"), position(&layout, "B"));

        store.ingest(info("B", &[&[("A", "h1"), ("C", "h3")]]), None);
        let report = layout.reconcile(&store);
        assert!(!report.is_empty());

        assert_eq!(position(&layout, "A"), a);
        assert_eq!(position(&layout, "B"), b);
        assert!(layout.node(&"C".into()).unwrap().position.is_none());

        driver.reheat(now);
        driver.tick(&mut layout, now);
        let c = position(&layout, "C");
        assert!(c.x.is_finite() && c.y.is_finite());
        assert_eq!(layout.projection.nodes.len(), 3);
    }
}
