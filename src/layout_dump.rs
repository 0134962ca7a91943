use crate::geometry::{Rect, Segment};
use crate::ir::{Connector, ReactionDiagram};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub reaction: ReactionDump,
    pub compartments: Vec<CompartmentDump>,
    pub entities: Vec<EntityDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionDump {
    pub name: String,
    pub kind: String,
    pub compartment: Option<String>,
    pub bounds: Rect,
    pub backbone: Vec<Segment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompartmentDump {
    pub name: String,
    pub parent: Option<String>,
    pub bounds: Rect,
    pub label_x: f32,
    pub label_y: f32,
    pub label_width: f32,
    pub label_height: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDump {
    pub name: String,
    pub shape: String,
    pub compartment: Option<String>,
    pub bounds: Rect,
    pub attachments: Vec<AttachmentDump>,
    pub connectors: Vec<Connector>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentDump {
    pub name: String,
    pub bounds: Rect,
}

impl LayoutDump {
    pub fn from_diagram(diagram: &ReactionDiagram) -> Self {
        // Only visible compartments get a name in the dump.
        let name_of = |id| {
            let compartment = diagram.compartment(id);
            (!compartment.synthetic).then(|| compartment.name.clone())
        };

        let compartments = diagram
            .compartments()
            .map(|compartment| CompartmentDump {
                name: compartment.name.clone(),
                parent: compartment.parent.and_then(name_of),
                bounds: compartment.bounds,
                label_x: compartment.label_bounds.x,
                label_y: compartment.label_bounds.y,
                label_width: compartment.label_bounds.width,
                label_height: compartment.label_bounds.height,
            })
            .collect();

        let entities = diagram
            .entities
            .iter()
            .map(|entity| EntityDump {
                name: entity.name.clone(),
                shape: format!("{:?}", entity.shape),
                compartment: name_of(entity.compartment),
                bounds: entity.bounds,
                attachments: entity
                    .attachments
                    .iter()
                    .map(|attachment| AttachmentDump {
                        name: attachment.name.clone(),
                        bounds: attachment.bounds,
                    })
                    .collect(),
                connectors: entity.connectors.clone(),
            })
            .collect();

        let reaction = &diagram.reaction;
        LayoutDump {
            width: diagram.bounds.width,
            height: diagram.bounds.height,
            reaction: ReactionDump {
                name: reaction.name.clone(),
                kind: format!("{:?}", reaction.kind),
                compartment: name_of(diagram.reaction_compartment()),
                bounds: reaction.bounds,
                backbone: reaction.backbone.clone(),
            },
            compartments,
            entities,
        }
    }
}

pub fn write_layout_dump(path: &Path, diagram: &ReactionDiagram) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_diagram(diagram);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
