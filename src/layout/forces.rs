use egui::{Pos2, Vec2, vec2};
use rand::Rng;

/// A link between two slots of the position/velocity buffers.
#[derive(Clone, Copy, Debug)]
pub(super) struct Link {
    pub(super) source: usize,
    pub(super) target: usize,
    /// 1 / min(degree(source), degree(target))
    pub(super) strength: f32,
    /// Share of the correction applied to the target: degree(source) / (sum of degrees)
    pub(super) bias: f32,
}

impl Link {
    /// Builds links with degree-based strength and bias. Self links are dropped.
    pub(super) fn weighted(pairs: &[(usize, usize)], node_count: usize) -> Vec<Link> {
        let mut degree = vec![0u32; node_count];
        for &(source, target) in pairs {
            if source == target || source >= node_count || target >= node_count {
                continue;
            }
            degree[source] += 1;
            degree[target] += 1;
        }

        pairs
            .iter()
            .filter(|(source, target)| {
                source != target && *source < node_count && *target < node_count
            })
            .map(|&(source, target)| {
                let (ds, dt) = (degree[source] as f32, degree[target] as f32);
                Link {
                    source,
                    target,
                    strength: 1.0 / ds.min(dt),
                    bias: ds / (ds + dt),
                }
            })
            .collect()
    }
}

fn jiggle(rng: &mut impl Rng) -> f32 {
    rng.random_range(-0.5e-6..0.5e-6)
}

/// Pairwise repulsion (attraction for positive strength), inverse to squared distance.
pub(super) fn apply_many_body(
    positions: &[Vec2],
    velocities: &mut [Vec2],
    strength: f32,
    distance_min: f32,
    alpha: f32,
    rng: &mut impl Rng,
) {
    let distance_min_sq = distance_min * distance_min;
    for i in 0..positions.len() {
        let mut force = Vec2::ZERO;
        for j in 0..positions.len() {
            if i == j {
                continue;
            }
            let mut delta = positions[j] - positions[i];
            if delta.x == 0.0 {
                delta.x = jiggle(rng);
            }
            if delta.y == 0.0 {
                delta.y = jiggle(rng);
            }
            let mut distance_sq = delta.length_sq();
            if distance_sq < distance_min_sq {
                distance_sq = (distance_min_sq * distance_sq).sqrt();
            }
            if distance_sq <= 0.0 {
                continue;
            }
            force += delta * (strength * alpha / distance_sq);
        }
        velocities[i] += force;
    }
}

/// Spring pulling linked nodes toward `distance`, using next-step positions.
pub(super) fn apply_links(
    links: &[Link],
    positions: &[Vec2],
    velocities: &mut [Vec2],
    distance: f32,
    alpha: f32,
    rng: &mut impl Rng,
) {
    for link in links {
        let (s, t) = (link.source, link.target);
        let mut delta = (positions[t] + velocities[t]) - (positions[s] + velocities[s]);
        if delta.x == 0.0 {
            delta.x = jiggle(rng);
        }
        if delta.y == 0.0 {
            delta.y = jiggle(rng);
        }
        let length = delta.length();
        if length <= 0.0 {
            continue;
        }
        let correction = delta * ((length - distance) / length * alpha * link.strength);
        velocities[t] -= correction * link.bias;
        velocities[s] += correction * (1.0 - link.bias);
    }
}

/// Shifts every node so the centroid lands on `center`.
pub(super) fn apply_center(positions: &mut [Vec2], center: Pos2) {
    if positions.is_empty() {
        return;
    }
    let mut centroid = Vec2::ZERO;
    for position in positions.iter() {
        centroid += *position;
    }
    centroid /= positions.len() as f32;
    let shift = centroid - center.to_vec2();
    for position in positions.iter_mut() {
        *position -= shift;
    }
}

const INITIAL_RADIUS: f32 = 10.0;

/// Phyllotaxis spiral slot `index` around `center`, used for nodes that have no position yet.
pub(super) fn initial_position(index: usize, center: Pos2) -> Pos2 {
    let initial_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
    let angle = index as f32 * initial_angle;
    center + vec2(radius * angle.cos(), radius * angle.sin())
}
