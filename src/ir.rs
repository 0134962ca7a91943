use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Point, Rect, Segment};

/// Name given to the synthetic tree root.
pub const ROOT_COMPARTMENT_NAME: &str = "extracellular";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompartmentId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub usize);

/// Role of a participant. The declaration order is the canonical iteration
/// order used everywhere a role set drives a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleKind {
    Input,
    Output,
    Catalyst,
    PositiveRegulator,
    NegativeRegulator,
}

impl RoleKind {
    pub const ALL: [RoleKind; 5] = [
        RoleKind::Input,
        RoleKind::Output,
        RoleKind::Catalyst,
        RoleKind::PositiveRegulator,
        RoleKind::NegativeRegulator,
    ];

    pub fn is_regulator(self) -> bool {
        matches!(
            self,
            RoleKind::PositiveRegulator | RoleKind::NegativeRegulator
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub kind: RoleKind,
    pub stoichiometry: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityShape {
    #[default]
    Protein,
    Complex,
    Chemical,
    ChemicalDrug,
    Gene,
    Rna,
    EntitySet,
    ProteinDrug,
    ComplexDrug,
    EntitySetDrug,
    Cell,
    Other,
}

impl EntityShape {
    pub fn is_gene(self) -> bool {
        self == EntityShape::Gene
    }

    pub fn is_chemical(self) -> bool {
        matches!(self, EntityShape::Chemical | EntityShape::ChemicalDrug)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionKind {
    #[default]
    Transition,
    Binding,
    Dissociation,
    Omitted,
    Uncertain,
}

/// Decoration drawn where a connector meets the reaction (or, for outputs,
/// the entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pointer {
    Input,
    Output,
    Catalyst,
    PositiveRegulation,
    NegativeRegulation,
}

impl From<RoleKind> for Pointer {
    fn from(kind: RoleKind) -> Self {
        match kind {
            RoleKind::Input => Pointer::Input,
            RoleKind::Output => Pointer::Output,
            RoleKind::Catalyst => Pointer::Catalyst,
            RoleKind::PositiveRegulator => Pointer::PositiveRegulation,
            RoleKind::NegativeRegulator => Pointer::NegativeRegulation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stoichiometry {
    pub value: u32,
    pub shape: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub pointer: Pointer,
    pub segments: Vec<Segment>,
    pub stoichiometry: Option<Stoichiometry>,
}

impl Connector {
    pub fn translate(&mut self, dx: f32, dy: f32) {
        for segment in &mut self.segments {
            segment.translate(dx, dy);
        }
        if let Some(stoichiometry) = &mut self.stoichiometry {
            stoichiometry.shape.translate(dx, dy);
        }
    }

    pub fn bounds(&self) -> Option<Rect> {
        let segments = self.segments.iter().map(Segment::bounds);
        let shape = self.stoichiometry.iter().map(|s| s.shape);
        crate::geometry::union_all(segments.chain(shape))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub bounds: Rect,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub shape: EntityShape,
    pub compartment: CompartmentId,
    /// Sorted by kind, one entry per kind.
    pub roles: Vec<Role>,
    pub attachments: Vec<Attachment>,
    pub bounds: Rect,
    pub connectors: Vec<Connector>,
}

impl Entity {
    pub fn role(&self, kind: RoleKind) -> Option<&Role> {
        self.roles.iter().find(|role| role.kind == kind)
    }

    pub fn has_role(&self, kind: RoleKind) -> bool {
        self.role(kind).is_some()
    }

    /// An input that also catalyses the reaction keeps a single glyph with
    /// two connectors.
    pub fn is_input_catalyst(&self) -> bool {
        self.has_role(RoleKind::Input) && self.has_role(RoleKind::Catalyst)
    }

    /// One role, or an input that is also a catalyst. Other multi-role
    /// participants must be split into one glyph per role before layout.
    pub fn has_supported_roles(&self) -> bool {
        self.roles.len() == 1 || (self.roles.len() == 2 && self.is_input_catalyst())
    }

    fn add_role(&mut self, kind: RoleKind, stoichiometry: u32) {
        match self.roles.iter_mut().find(|role| role.kind == kind) {
            Some(role) => role.stoichiometry += stoichiometry,
            None => {
                self.roles.push(Role {
                    kind,
                    stoichiometry,
                });
                self.roles.sort_by_key(|role| role.kind);
            }
        }
    }

    /// Glyph bounds plus the attachments sitting on its border.
    pub fn full_bounds(&self) -> Rect {
        self.attachments
            .iter()
            .fold(self.bounds, |acc, attachment| acc.union(&attachment.bounds))
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.bounds.translate(dx, dy);
        for attachment in &mut self.attachments {
            attachment.bounds.translate(dx, dy);
        }
        for connector in &mut self.connectors {
            connector.translate(dx, dy);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reaction {
    pub name: String,
    pub kind: ReactionKind,
    pub compartment: Option<CompartmentId>,
    pub bounds: Rect,
    /// Left stub first, right stub second, each running outwards from the glyph.
    pub backbone: Vec<Segment>,
}

impl Reaction {
    pub fn input_tip(&self) -> Point {
        self.backbone
            .first()
            .map(|segment| segment.to)
            .unwrap_or_else(|| Point::new(self.bounds.x, self.bounds.center().y))
    }

    pub fn output_tip(&self) -> Point {
        self.backbone
            .get(1)
            .map(|segment| segment.to)
            .unwrap_or_else(|| Point::new(self.bounds.right(), self.bounds.center().y))
    }

    /// Glyph plus backbone.
    pub fn extent(&self) -> Rect {
        self.backbone
            .iter()
            .fold(self.bounds, |acc, segment| acc.union(&segment.bounds()))
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.bounds.translate(dx, dy);
        for segment in &mut self.backbone {
            segment.translate(dx, dy);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compartment {
    pub id: CompartmentId,
    pub name: String,
    pub parent: Option<CompartmentId>,
    pub children: Vec<CompartmentId>,
    pub entities: Vec<EntityId>,
    pub bounds: Rect,
    /// Top-left corner is the label anchor.
    pub label_bounds: Rect,
    /// Set on the extracellular root, which only exists while laying out.
    pub synthetic: bool,
}

impl Compartment {
    fn new(id: CompartmentId, name: String, parent: Option<CompartmentId>) -> Self {
        Self {
            id,
            name,
            parent,
            children: Vec::new(),
            entities: Vec::new(),
            bounds: Rect::default(),
            label_bounds: Rect::default(),
            synthetic: false,
        }
    }

    pub fn label_position(&self) -> Point {
        Point::new(self.label_bounds.x, self.label_bounds.y)
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.bounds.translate(dx, dy);
        self.label_bounds.translate(dx, dy);
    }
}

#[derive(Debug, Clone)]
pub struct ReactionDiagram {
    pub compartments: Vec<Compartment>,
    pub entities: Vec<Entity>,
    pub reaction: Reaction,
    pub bounds: Rect,
}

impl ReactionDiagram {
    pub fn root(&self) -> CompartmentId {
        CompartmentId(0)
    }

    pub fn compartment(&self, id: CompartmentId) -> &Compartment {
        &self.compartments[id.0]
    }

    pub fn compartment_mut(&mut self, id: CompartmentId) -> &mut Compartment {
        &mut self.compartments[id.0]
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }

    /// Compartments that belong in the output (the synthetic root excluded).
    pub fn compartments(&self) -> impl Iterator<Item = &Compartment> {
        self.compartments.iter().filter(|c| !c.synthetic)
    }

    pub fn reaction_compartment(&self) -> CompartmentId {
        self.reaction.compartment.unwrap_or(self.root())
    }

    pub fn is_ancestor_or_self(&self, ancestor: CompartmentId, node: CompartmentId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.compartments[id.0].parent;
        }
        false
    }

    pub fn depth(&self, id: CompartmentId) -> usize {
        let mut depth = 0;
        let mut current = self.compartments[id.0].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.compartments[parent.0].parent;
        }
        depth
    }

    /// Children before parents, siblings in declaration order.
    pub fn post_order(&self) -> Vec<CompartmentId> {
        fn visit(diagram: &ReactionDiagram, id: CompartmentId, out: &mut Vec<CompartmentId>) {
            for child in &diagram.compartments[id.0].children {
                visit(diagram, *child, out);
            }
            out.push(id);
        }
        let mut out = Vec::with_capacity(self.compartments.len());
        for compartment in &self.compartments {
            if compartment.parent.is_none() {
                visit(self, compartment.id, &mut out);
            }
        }
        out
    }

    /// Moves the reaction glyph into another compartment.
    pub fn move_reaction_to(&mut self, compartment: CompartmentId) {
        self.reaction.compartment = Some(compartment);
    }

    /// Detaches the synthetic root so that its former children become the
    /// top-level compartments of the output.
    pub fn drop_synthetic_root(&mut self) {
        let root = self.root();
        if !self.compartments[root.0].synthetic {
            return;
        }
        let children = std::mem::take(&mut self.compartments[root.0].children);
        for child in children {
            self.compartments[child.0].parent = None;
        }
        self.compartments[root.0].bounds = Rect::default();
        self.compartments[root.0].label_bounds = Rect::default();
    }

    /// Re-attaches top-level compartments to the synthetic root, undoing
    /// [`ReactionDiagram::drop_synthetic_root`].
    pub fn restore_synthetic_root(&mut self) {
        let root = self.root();
        if !self.compartments[root.0].synthetic {
            return;
        }
        let orphans: Vec<CompartmentId> = self
            .compartments
            .iter()
            .filter(|c| !c.synthetic && c.parent.is_none())
            .map(|c| c.id)
            .collect();
        for id in &orphans {
            self.compartments[id.0].parent = Some(root);
        }
        self.compartments[root.0].children.extend(orphans);
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown compartment `{0}`")]
    UnknownCompartment(String),
    #[error("duplicate compartment `{0}`")]
    DuplicateCompartment(String),
    #[error("compartment `{0}` is part of a parent cycle")]
    CompartmentCycle(String),
    #[error("unknown entity #{0}")]
    UnknownEntity(usize),
    #[error("entity `{0}` has no roles")]
    EntityWithoutRoles(String),
    #[error("entity `{entity}` has zero stoichiometry for {kind:?}")]
    ZeroStoichiometry { entity: String, kind: RoleKind },
    #[error("entity `{entity}` combines roles {kinds:?}; only an input may also be a catalyst")]
    UnsupportedRoleCombination { entity: String, kinds: Vec<RoleKind> },
    #[error("diagram has no reaction")]
    MissingReaction,
    #[error("diagram already has a reaction")]
    DuplicateReaction,
}

/// Incrementally assembles a [`ReactionDiagram`]. The synthetic root exists
/// from the start; every other compartment needs an existing parent.
#[derive(Debug, Clone)]
pub struct DiagramBuilder {
    compartments: Vec<Compartment>,
    entities: Vec<Entity>,
    reaction: Option<Reaction>,
}

impl DiagramBuilder {
    pub fn new() -> Self {
        let mut root = Compartment::new(CompartmentId(0), ROOT_COMPARTMENT_NAME.to_string(), None);
        root.synthetic = true;
        Self {
            compartments: vec![root],
            entities: Vec::new(),
            reaction: None,
        }
    }

    pub fn root(&self) -> CompartmentId {
        CompartmentId(0)
    }

    pub fn compartment(
        &mut self,
        name: impl Into<String>,
        parent: CompartmentId,
    ) -> Result<CompartmentId, ModelError> {
        self.check_compartment(parent)?;
        let id = CompartmentId(self.compartments.len());
        self.compartments
            .push(Compartment::new(id, name.into(), Some(parent)));
        self.compartments[parent.0].children.push(id);
        Ok(id)
    }

    pub fn entity(
        &mut self,
        name: impl Into<String>,
        shape: EntityShape,
        compartment: CompartmentId,
    ) -> Result<EntityId, ModelError> {
        self.check_compartment(compartment)?;
        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            id,
            name: name.into(),
            shape,
            compartment,
            roles: Vec::new(),
            attachments: Vec::new(),
            bounds: Rect::default(),
            connectors: Vec::new(),
        });
        self.compartments[compartment.0].entities.push(id);
        Ok(id)
    }

    pub fn role(
        &mut self,
        entity: EntityId,
        kind: RoleKind,
        stoichiometry: u32,
    ) -> Result<(), ModelError> {
        let entry = self
            .entities
            .get_mut(entity.0)
            .ok_or(ModelError::UnknownEntity(entity.0))?;
        if stoichiometry == 0 {
            return Err(ModelError::ZeroStoichiometry {
                entity: entry.name.clone(),
                kind,
            });
        }
        entry.add_role(kind, stoichiometry);
        Ok(())
    }

    pub fn attachment(&mut self, entity: EntityId, name: impl Into<String>) -> Result<(), ModelError> {
        let entry = self
            .entities
            .get_mut(entity.0)
            .ok_or(ModelError::UnknownEntity(entity.0))?;
        entry.attachments.push(Attachment {
            name: name.into(),
            bounds: Rect::default(),
        });
        Ok(())
    }

    pub fn reaction(
        &mut self,
        name: impl Into<String>,
        kind: ReactionKind,
        compartment: Option<CompartmentId>,
    ) -> Result<(), ModelError> {
        if self.reaction.is_some() {
            return Err(ModelError::DuplicateReaction);
        }
        if let Some(compartment) = compartment {
            self.check_compartment(compartment)?;
        }
        self.reaction = Some(Reaction {
            name: name.into(),
            kind,
            compartment,
            bounds: Rect::default(),
            backbone: Vec::new(),
        });
        Ok(())
    }

    pub fn build(self) -> Result<ReactionDiagram, ModelError> {
        let reaction = self.reaction.ok_or(ModelError::MissingReaction)?;
        if let Some(entity) = self.entities.iter().find(|e| e.roles.is_empty()) {
            return Err(ModelError::EntityWithoutRoles(entity.name.clone()));
        }
        if let Some(entity) = self.entities.iter().find(|e| !e.has_supported_roles()) {
            return Err(ModelError::UnsupportedRoleCombination {
                entity: entity.name.clone(),
                kinds: entity.roles.iter().map(|role| role.kind).collect(),
            });
        }
        let diagram = ReactionDiagram {
            compartments: self.compartments,
            entities: self.entities,
            reaction,
            bounds: Rect::default(),
        };
        Ok(prune_empty_compartments(diagram))
    }

    fn check_compartment(&self, id: CompartmentId) -> Result<(), ModelError> {
        if id.0 < self.compartments.len() {
            Ok(())
        } else {
            Err(ModelError::UnknownCompartment(format!("#{}", id.0)))
        }
    }
}

impl Default for DiagramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes compartments whose subtree holds neither an entity nor the
/// reaction, renumbering the survivors in their original order.
fn prune_empty_compartments(mut diagram: ReactionDiagram) -> ReactionDiagram {
    let count = diagram.compartments.len();
    let mut occupied = vec![false; count];
    let reaction_compartment = diagram.reaction_compartment();
    for id in diagram.post_order() {
        let compartment = &diagram.compartments[id.0];
        occupied[id.0] = compartment.synthetic
            || !compartment.entities.is_empty()
            || id == reaction_compartment
            || compartment.children.iter().any(|child| occupied[child.0]);
    }
    if occupied.iter().all(|kept| *kept) {
        return diagram;
    }

    let mut remap: Vec<Option<CompartmentId>> = vec![None; count];
    let mut next = 0;
    for (idx, kept) in occupied.iter().enumerate() {
        if *kept {
            remap[idx] = Some(CompartmentId(next));
            next += 1;
        } else {
            log::debug!(
                "pruning empty compartment `{}`",
                diagram.compartments[idx].name
            );
        }
    }

    let compartments = std::mem::take(&mut diagram.compartments);
    diagram.compartments = compartments
        .into_iter()
        .filter_map(|mut compartment| {
            let id = remap[compartment.id.0]?;
            compartment.id = id;
            compartment.parent = compartment.parent.and_then(|p| remap[p.0]);
            compartment.children = compartment
                .children
                .iter()
                .filter_map(|child| remap[child.0])
                .collect();
            Some(compartment)
        })
        .collect();
    for entity in &mut diagram.entities {
        if let Some(id) = remap[entity.compartment.0] {
            entity.compartment = id;
        }
    }
    diagram.reaction.compartment = diagram.reaction.compartment.and_then(|c| remap[c.0]);
    diagram
}

fn default_stoichiometry() -> u32 {
    1
}

/// Serialized description of one reaction, as handed over by the query
/// and mapping collaborator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramInput {
    #[serde(default)]
    pub compartments: Vec<CompartmentInput>,
    pub reaction: ReactionInput,
    #[serde(default)]
    pub entities: Vec<EntityInput>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompartmentInput {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionInput {
    pub name: String,
    #[serde(default)]
    pub kind: ReactionKind,
    #[serde(default)]
    pub compartment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInput {
    pub name: String,
    #[serde(default)]
    pub shape: EntityShape,
    #[serde(default)]
    pub compartment: Option<String>,
    pub roles: Vec<RoleInput>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInput {
    #[serde(rename = "type")]
    pub kind: RoleKind,
    #[serde(default = "default_stoichiometry")]
    pub stoichiometry: u32,
}

impl DiagramInput {
    pub fn into_diagram(self) -> Result<ReactionDiagram, ModelError> {
        let mut builder = DiagramBuilder::new();
        let mut ids: BTreeMap<String, CompartmentId> = BTreeMap::new();

        let mut seen = std::collections::BTreeSet::new();
        for compartment in &self.compartments {
            if !seen.insert(compartment.id.as_str()) {
                return Err(ModelError::DuplicateCompartment(compartment.id.clone()));
            }
        }
        for compartment in &self.compartments {
            if let Some(parent) = &compartment.parent
                && !seen.contains(parent.as_str())
            {
                return Err(ModelError::UnknownCompartment(parent.clone()));
            }
        }

        // Parents may be declared after their children; resolve in rounds.
        let mut pending: Vec<&CompartmentInput> = self.compartments.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for compartment in pending {
                let parent = match &compartment.parent {
                    None => Some(builder.root()),
                    Some(parent) => ids.get(parent).copied(),
                };
                match parent {
                    Some(parent) => {
                        let name = compartment
                            .name
                            .clone()
                            .unwrap_or_else(|| compartment.id.clone());
                        let id = builder.compartment(name, parent)?;
                        ids.insert(compartment.id.clone(), id);
                    }
                    None => deferred.push(compartment),
                }
            }
            if deferred.len() == before {
                return Err(ModelError::CompartmentCycle(deferred[0].id.clone()));
            }
            pending = deferred;
        }

        let resolve = |name: &Option<String>| -> Result<Option<CompartmentId>, ModelError> {
            match name {
                None => Ok(None),
                Some(name) => ids
                    .get(name)
                    .copied()
                    .map(Some)
                    .ok_or_else(|| ModelError::UnknownCompartment(name.clone())),
            }
        };

        for entity in &self.entities {
            let compartment = resolve(&entity.compartment)?.unwrap_or(builder.root());
            let id = builder.entity(entity.name.clone(), entity.shape, compartment)?;
            for role in &entity.roles {
                builder.role(id, role.kind, role.stoichiometry)?;
            }
            for attachment in &entity.attachments {
                builder.attachment(id, attachment.clone())?;
            }
        }

        let compartment = resolve(&self.reaction.compartment)?;
        builder.reaction(self.reaction.name.clone(), self.reaction.kind, compartment)?;
        builder.build()
    }
}
