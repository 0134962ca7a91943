use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_2, PI};

use crate::config::LayoutConfig;
use crate::geometry::{Point, Rect, Segment};
use crate::ir::{Connector, Entity, EntityId, Pointer, ReactionDiagram, Role, RoleKind, Stoichiometry};

// ── Rule lines ──────────────────────────────────────────────────────
/// Fraction of the free space between a band and the reaction at which
/// its shared rule line runs.
const RULE_POSITION_RATIO: f32 = 0.5;
/// Coordinates closer than this are treated as equal.
const ALIGN_EPSILON: f32 = 1e-3;

/// Border point a connector leaves its entity from, after the gene leader.
#[derive(Debug, Clone, Copy)]
struct Stub {
    leader: Option<Segment>,
    start: Point,
}

fn stub(entity: &Entity, kind: RoleKind, leader_length: f32) -> Stub {
    let b = entity.bounds;
    let c = b.center();
    let (border, direction) = match kind {
        RoleKind::Input => (Point::new(b.right(), c.y), (1.0, 0.0)),
        RoleKind::Output => (Point::new(b.x, c.y), (-1.0, 0.0)),
        RoleKind::Catalyst if entity.is_input_catalyst() => (Point::new(c.x, b.y), (0.0, -1.0)),
        RoleKind::Catalyst => (Point::new(c.x, b.bottom()), (0.0, 1.0)),
        RoleKind::PositiveRegulator | RoleKind::NegativeRegulator => (Point::new(c.x, b.y), (0.0, -1.0)),
    };
    if !entity.shape.is_gene() {
        return Stub {
            leader: None,
            start: border,
        };
    }
    let end = Point::new(
        border.x + direction.0 * leader_length,
        border.y + direction.1 * leader_length,
    );
    Stub {
        leader: Some(Segment::new(border, end)),
        start: end,
    }
}

fn rule_between(edge: f32, target: f32) -> f32 {
    edge + (target - edge) * RULE_POSITION_RATIO
}

/// Drops repeated points and interior points of straight runs.
pub(super) fn compress_path(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        if let Some(last) = out.last()
            && last.distance(point) <= ALIGN_EPSILON
        {
            continue;
        }
        if out.len() >= 2 {
            let prev = out[out.len() - 2];
            let curr = out[out.len() - 1];
            let cross = (curr.x - prev.x) * (point.y - curr.y) - (curr.y - prev.y) * (point.x - curr.x);
            if cross.abs() <= ALIGN_EPSILON {
                out.pop();
            }
        }
        out.push(*point);
    }
    out
}

pub(super) fn path_bend_count(segments: &[Segment]) -> usize {
    segments
        .windows(2)
        .filter(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let cross = (a.to.x - a.from.x) * (b.to.y - b.from.y) - (a.to.y - a.from.y) * (b.to.x - b.from.x);
            cross.abs() > ALIGN_EPSILON
        })
        .count()
}

fn connector(stub: Stub, path: &[Point], role: Role, config: &LayoutConfig) -> Connector {
    let mut segments: Vec<Segment> = stub.leader.into_iter().collect();
    let points = compress_path(path);
    segments.extend(
        points
            .windows(2)
            .map(|pair| Segment::new(pair[0], pair[1]))
            .filter(|segment| !segment.is_degenerate()),
    );
    let stoichiometry = (role.stoichiometry > 1)
        .then(|| segments.first())
        .flatten()
        .map(|first| Stoichiometry {
            value: role.stoichiometry,
            shape: Rect::centered_at(
                first.midpoint(),
                config.stoichiometry_size,
                config.stoichiometry_size,
            ),
        });
    Connector {
        pointer: Pointer::from(role.kind),
        segments,
        stoichiometry,
    }
}

/// Endpoints on the reaction for `count` regulators, fanned out below it at
/// equal angles. `xs` are the regulators' x positions in ascending order.
pub(super) fn fan_endpoints(reaction: Rect, xs: &[f32], marker_size: f32) -> Vec<Point> {
    let center = reaction.center();
    let half = reaction.height / 2.0;
    match xs {
        [] => return Vec::new(),
        [_] => return vec![Point::new(center.x, reaction.bottom())],
        _ => {}
    }
    let all_left = xs.iter().all(|x| *x < center.x - ALIGN_EPSILON);
    let all_right = xs.iter().all(|x| *x > center.x + ALIGN_EPSILON);
    let (start, total) = if all_left {
        (FRAC_PI_2, FRAC_PI_2)
    } else if all_right {
        (0.0, FRAC_PI_2)
    } else {
        (0.0, PI)
    };
    let count = xs.len() as f32;
    let step = total / (count + 1.0);
    let radius = half + marker_size * count / total;
    // Leftmost regulator takes the largest angle, which points left.
    (0..xs.len())
        .map(|idx| {
            let angle = start + total - step * (idx as f32 + 1.0);
            Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

/// Orthogonal connectors from every participant to the reaction, sharing a
/// rule line per band.
pub(super) fn route_connectors(diagram: &mut ReactionDiagram, config: &LayoutConfig) {
    let reaction = diagram.reaction.bounds;
    let top_center = Point::new(reaction.center().x, reaction.y);
    let input_tip = diagram.reaction.input_tip();
    let output_tip = diagram.reaction.output_tip();

    let stubs: Vec<(EntityId, Role, Stub)> = diagram
        .entities
        .iter()
        .flat_map(|entity| {
            entity
                .roles
                .iter()
                .map(move |role| (entity.id, *role, stub(entity, role.kind, config.gene_leader_length)))
        })
        .collect();
    let is_input_catalyst = |id: EntityId| diagram.entity(id).is_input_catalyst();

    let edge = |kind: RoleKind, fold: fn(f32, f32) -> f32, axis: fn(Point) -> f32| {
        stubs
            .iter()
            .filter(|(id, role, _)| role.kind == kind && !(kind == RoleKind::Catalyst && is_input_catalyst(*id)))
            .map(|(_, _, stub)| axis(stub.start))
            .reduce(fold)
    };
    let input_rule = edge(RoleKind::Input, f32::max, |p| p.x).map(|e| rule_between(e, input_tip.x));
    let output_rule = edge(RoleKind::Output, f32::min, |p| p.x).map(|e| rule_between(e, output_tip.x));
    let catalyst_rule = edge(RoleKind::Catalyst, f32::max, |p| p.y).map(|e| rule_between(e, reaction.y));
    let regulator_edge = stubs
        .iter()
        .filter(|(_, role, _)| role.kind.is_regulator())
        .map(|(_, _, stub)| stub.start.y)
        .reduce(f32::min);
    let regulator_rule = regulator_edge.map(|e| rule_between(e, reaction.bottom()));

    let mut regulators: Vec<(usize, f32)> = stubs
        .iter()
        .enumerate()
        .filter(|(_, (_, role, _))| role.kind.is_regulator())
        .map(|(idx, (_, _, stub))| (idx, stub.start.x))
        .collect();
    regulators.sort_by(|a, b| a.1.total_cmp(&b.1));
    let xs: Vec<f32> = regulators.iter().map(|(_, x)| *x).collect();
    let fan: BTreeMap<usize, Point> = regulators
        .iter()
        .map(|(idx, _)| *idx)
        .zip(fan_endpoints(reaction, &xs, config.regulator_marker_size))
        .collect();

    let mut routed: Vec<(EntityId, Connector)> = Vec::with_capacity(stubs.len());
    for (idx, (id, role, stub)) in stubs.iter().enumerate() {
        let s = stub.start;
        let path = match role.kind {
            RoleKind::Input => {
                let x = input_rule.unwrap_or(input_tip.x);
                vec![s, Point::new(x, s.y), Point::new(x, input_tip.y), input_tip]
            }
            RoleKind::Output => {
                let x = output_rule.unwrap_or(output_tip.x);
                vec![s, Point::new(x, s.y), Point::new(x, output_tip.y), output_tip]
            }
            RoleKind::Catalyst if is_input_catalyst(*id) => {
                let y = s.y.min(reaction.y) - config.rule_gap;
                vec![s, Point::new(s.x, y), Point::new(top_center.x, y), top_center]
            }
            RoleKind::Catalyst => {
                let y = catalyst_rule.unwrap_or(reaction.y);
                vec![s, Point::new(s.x, y), Point::new(top_center.x, y), top_center]
            }
            RoleKind::PositiveRegulator | RoleKind::NegativeRegulator => {
                let end = fan
                    .get(&idx)
                    .copied()
                    .unwrap_or(Point::new(reaction.center().x, reaction.bottom()));
                let y = regulator_rule.unwrap_or(reaction.bottom()).max(end.y);
                vec![s, Point::new(s.x, y), Point::new(end.x, y), end]
            }
        };
        routed.push((*id, connector(*stub, &path, *role, config)));
    }

    let bends: usize = routed
        .iter()
        .map(|(_, connector)| path_bend_count(&connector.segments))
        .sum();
    log::debug!("routed {} connectors with {bends} bends", routed.len());
    for (id, connector) in routed {
        diagram.entity_mut(id).connectors.push(connector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_path_drops_straight_runs_and_duplicates() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ];
        assert_eq!(
            compress_path(&points),
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0)
            ]
        );
    }

    #[test]
    fn fan_spreads_over_a_semicircle_below() {
        let reaction = Rect::new(0.0, 0.0, 12.0, 12.0);
        let points = fan_endpoints(reaction, &[-100.0, 0.0, 100.0], 8.0);
        assert_eq!(points.len(), 3);
        let center = reaction.center();
        let radii: Vec<f32> = points.iter().map(|p| p.distance(&center)).collect();
        assert!(radii.iter().all(|r| (r - radii[0]).abs() < 1e-3), "shared radius");
        assert!((radii[0] - (6.0 + 8.0 * 3.0 / PI)).abs() < 1e-3);
        assert!(points.iter().all(|p| p.y > center.y), "fan stays below");
        assert!(points[0].x < points[1].x && points[1].x < points[2].x);
        assert!((points[1].x - center.x).abs() < 1e-3, "middle one at 90 degrees");
    }

    #[test]
    fn fan_uses_a_quarter_when_all_regulators_are_on_one_side() {
        let reaction = Rect::new(0.0, 0.0, 12.0, 12.0);
        let points = fan_endpoints(reaction, &[-80.0, -40.0], 8.0);
        let center = reaction.center();
        assert!(points.iter().all(|p| p.x < center.x && p.y > center.y));
        let radius = points[0].distance(&center);
        assert!((radius - (6.0 + 8.0 * 2.0 / FRAC_PI_2)).abs() < 1e-3);
    }

    #[test]
    fn single_regulator_meets_the_bottom_centre() {
        let reaction = Rect::new(10.0, 10.0, 12.0, 12.0);
        assert_eq!(fan_endpoints(reaction, &[3.0], 8.0), vec![Point::new(16.0, 22.0)]);
    }

    #[test]
    fn bends_are_counted_between_segments() {
        let segments = [
            Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0)),
            Segment::new(Point::new(10.0, 0.0), Point::new(10.0, 10.0)),
            Segment::new(Point::new(10.0, 10.0), Point::new(20.0, 10.0)),
        ];
        assert_eq!(path_bend_count(&segments), 2);
    }
}
