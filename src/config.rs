use serde::{Deserialize, Serialize};
use std::path::Path;

use anyhow::Context;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Font used for every measurement (entity names, compartment labels).
    pub font_family: String,
    pub font_size: f32,
    pub font_bold: bool,
    pub label_line_height: f32,

    pub entity_min_width: f32,
    pub entity_height: f32,
    pub chemical_height: f32,
    pub gene_height: f32,
    pub entity_padding_x: f32,
    pub attachment_size: f32,
    pub reaction_size: f32,
    pub reaction_padding: f32,
    pub backbone_length: f32,

    /// Gap between glyphs of the same row or column group.
    pub glyph_gap: f32,

    pub min_cell: f32,
    pub compartment_padding: f32,
    pub compartment_label_padding: f32,
    /// Extra room between the reaction and its nearest band on each side.
    pub role_gap: f32,

    pub rule_gap: f32,
    pub gene_leader_length: f32,
    pub stoichiometry_size: f32,
    pub regulator_marker_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_family: "Arial, Helvetica, sans-serif".to_string(),
            font_size: 8.0,
            font_bold: true,
            label_line_height: 1.4,
            entity_min_width: 60.0,
            entity_height: 35.0,
            chemical_height: 25.0,
            gene_height: 40.0,
            entity_padding_x: 10.0,
            attachment_size: 12.0,
            reaction_size: 12.0,
            reaction_padding: 12.0,
            backbone_length: 20.0,
            glyph_gap: 16.0,
            min_cell: 20.0,
            compartment_padding: 20.0,
            compartment_label_padding: 8.0,
            role_gap: 30.0,
            rule_gap: 12.0,
            gene_leader_length: 8.0,
            stoichiometry_size: 12.0,
            regulator_marker_size: 8.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    font_family: Option<String>,
    font_size: Option<f32>,
    font_bold: Option<bool>,
    label_line_height: Option<f32>,
    entity_min_width: Option<f32>,
    entity_height: Option<f32>,
    chemical_height: Option<f32>,
    gene_height: Option<f32>,
    entity_padding_x: Option<f32>,
    attachment_size: Option<f32>,
    reaction_size: Option<f32>,
    reaction_padding: Option<f32>,
    backbone_length: Option<f32>,
    glyph_gap: Option<f32>,
    min_cell: Option<f32>,
    compartment_padding: Option<f32>,
    compartment_label_padding: Option<f32>,
    role_gap: Option<f32>,
    rule_gap: Option<f32>,
    gene_leader_length: Option<f32>,
    stoichiometry_size: Option<f32>,
    regulator_marker_size: Option<f32>,
}

macro_rules! overlay {
    ($config:ident, $file:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $file.$field {
                $config.$field = v;
            }
        )+
    };
}

/// Loads a JSON5 overlay on top of [`LayoutConfig::default`]. Every key is
/// optional; missing keys keep their default.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let config = LayoutConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("parsing config {}", path.display()))
}

pub fn parse_config(contents: &str) -> anyhow::Result<LayoutConfig> {
    let mut config = LayoutConfig::default();
    let file: LayoutConfigFile = json5::from_str(contents)?;
    if let Some(v) = file.font_family {
        config.font_family = v;
    }
    overlay!(
        config,
        file,
        font_size,
        font_bold,
        label_line_height,
        entity_min_width,
        entity_height,
        chemical_height,
        gene_height,
        entity_padding_x,
        attachment_size,
        reaction_size,
        reaction_padding,
        backbone_length,
        glyph_gap,
        min_cell,
        compartment_padding,
        compartment_label_padding,
        role_gap,
        rule_gap,
        gene_leader_length,
        stoichiometry_size,
        regulator_marker_size,
    );
    if config.font_size <= 0.0 {
        anyhow::bail!("fontSize must be positive, got {}", config.font_size);
    }
    Ok(config)
}
