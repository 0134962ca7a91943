// Side vocabulary shared by roles, leaf groups and compartment boxes, and the
// rules deciding where two boxes go relative to each other.

use std::collections::BTreeSet;

use crate::ir::RoleKind;

/// Declaration order is the fixed iteration order of every [`PlaceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Place {
    Left,
    Right,
    Top,
    Bottom,
    Center,
}

pub(crate) type PlaceSet = BTreeSet<Place>;

pub(crate) const SIDES: [Place; 4] = [Place::Left, Place::Right, Place::Top, Place::Bottom];

impl Place {
    pub(crate) fn of_role(kind: RoleKind) -> Place {
        match kind {
            RoleKind::Input => Place::Left,
            RoleKind::Output => Place::Right,
            RoleKind::Catalyst => Place::Top,
            RoleKind::PositiveRegulator | RoleKind::NegativeRegulator => Place::Bottom,
        }
    }

    pub(crate) fn opposite(self) -> Place {
        match self {
            Place::Left => Place::Right,
            Place::Right => Place::Left,
            Place::Top => Place::Bottom,
            Place::Bottom => Place::Top,
            Place::Center => Place::Center,
        }
    }

    /// Left and right bands are exclusive per row, top and bottom per column.
    pub(crate) fn is_row_exclusive(self) -> bool {
        matches!(self, Place::Left | Place::Right)
    }

    pub(crate) fn is_column_exclusive(self) -> bool {
        matches!(self, Place::Top | Place::Bottom)
    }
}

/// Sides a box holding `place` wants to take relative to a neighbour, best first.
fn preferences(place: Place) -> &'static [Place] {
    match place {
        Place::Left => &[Place::Left, Place::Top, Place::Bottom],
        Place::Right => &[Place::Right, Place::Top, Place::Bottom],
        Place::Top => &[Place::Top, Place::Left, Place::Right],
        Place::Bottom => &[Place::Bottom, Place::Left, Place::Right],
        Place::Center => &SIDES,
    }
}

/// Sides a box holding `place` lets a neighbour take relative to itself.
fn allowances(place: Place) -> &'static [Place] {
    match place {
        Place::Left => &[Place::Right, Place::Top, Place::Bottom],
        Place::Right => &[Place::Left, Place::Top, Place::Bottom],
        Place::Top => &[Place::Bottom, Place::Left, Place::Right],
        Place::Bottom => &[Place::Top, Place::Left, Place::Right],
        Place::Center => &[
            Place::Center,
            Place::Left,
            Place::Right,
            Place::Top,
            Place::Bottom,
        ],
    }
}

pub(crate) fn places_of_roles<'a>(roles: impl IntoIterator<Item = &'a RoleKind>) -> PlaceSet {
    roles.into_iter().map(|kind| Place::of_role(*kind)).collect()
}

/// Every side is taken, so the set constrains nothing consistently.
pub(crate) fn is_full(busy: &PlaceSet) -> bool {
    SIDES.iter().all(|side| busy.contains(side))
}

/// Intersection of the per-side lists, ordered like the first list. An empty
/// set of sides constrains nothing and yields every side.
fn intersect(busy: &PlaceSet, table: fn(Place) -> &'static [Place]) -> Vec<Place> {
    let mut sides = busy.iter().copied().filter(|place| *place != Place::Center);
    let Some(first) = sides.next() else {
        return SIDES.to_vec();
    };
    let mut out: Vec<Place> = table(first).to_vec();
    for place in sides {
        let allowed = table(place);
        out.retain(|candidate| allowed.contains(candidate));
    }
    out
}

pub(crate) fn preferred(busy: &PlaceSet) -> Vec<Place> {
    intersect(busy, preferences)
}

pub(crate) fn allowed(busy: &PlaceSet) -> Vec<Place> {
    if busy.contains(&Place::Center) {
        return allowances(Place::Center).to_vec();
    }
    intersect(busy, allowances)
}

/// Side `a` should take relative to `b`, `None` when the pair is unplaceable.
pub(crate) fn resolve(a: &PlaceSet, b: &PlaceSet) -> Option<Place> {
    let prefs = preferred(a);
    let allows = allowed(b);
    if let Some(place) = prefs.iter().find(|place| allows.contains(place)) {
        return Some(*place);
    }
    let first_allowed = allows.iter().copied().find(|place| *place != Place::Center);
    if allows.contains(&Place::Center) {
        prefs.first().copied().or(first_allowed)
    } else {
        first_allowed
    }
}

/// Like [`resolve`], retrying with an empty set for a side that holds every
/// role, and defaulting to [`Place::Left`] when still undecidable.
pub(crate) fn negotiate(a: &PlaceSet, b: &PlaceSet) -> Place {
    if let Some(place) = resolve(a, b) {
        return place;
    }
    let empty = PlaceSet::new();
    let retry_a = if is_full(a) { &empty } else { a };
    let retry_b = if is_full(b) { &empty } else { b };
    if (is_full(a) || is_full(b))
        && let Some(place) = resolve(retry_a, retry_b)
    {
        return place;
    }
    log::warn!("unplaceable sibling pair {a:?} / {b:?}; placing the first on the left");
    Place::Left
}
