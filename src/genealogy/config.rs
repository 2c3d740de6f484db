//! Spacing constants and display policies for the layout engine.

use serde::{Serialize, Deserialize};

/// Spacing parameters for family tree layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical gap between consecutive generations (default: 300).
    pub generation_spacing: f64,

    /// Base horizontal gap between adjacent siblings (default: 100).
    pub sibling_spacing: f64,

    /// Vertical drop from a parent or partnership bar to the sibling bus (default: 125).
    pub descendant_dropdown: f64,

    /// Horizontal gap between partners at the same level (default: 200).
    pub partner_spacing: f64,

    /// Multiplier on the horizontal spread of children (default: 2.0).
    pub expand_factor: f64,

    /// Multiplier on the minimum gap kept between colliding subtrees (default: 1.0).
    pub offset_factor: f64,

    /// Height of the crown drawn above rulers.
    pub crown_size: f64,

    pub portrait_width: f64,
    pub portrait_height: f64,

    /// Soft cap on nodes placed per layout pass. `None` means unlimited.
    pub max_nodes: Option<usize>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            generation_spacing: 300.0,
            sibling_spacing: 100.0,
            descendant_dropdown: 125.0,
            partner_spacing: 200.0,
            expand_factor: 2.0,
            offset_factor: 1.0,
            crown_size: 30.0,
            portrait_width: 80.0,
            portrait_height: 100.0,
            max_nodes: None,
        }
    }
}

impl LayoutConfig {
    /// Horizontal spread between adjacent children placed at `height`.
    pub fn children_spread(&self, height: u32) -> f64 {
        self.sibling_spacing * self.expand_factor / (height as f64 + 1.0)
    }

    /// Minimum distance kept between nodes of neighbouring subtrees at `height`.
    pub fn min_gap(&self, height: u32) -> f64 {
        self.offset_factor * self.children_spread(height)
    }

    /// Extent of one drawn node, depending on the icon mode.
    pub fn node_extent(&self, mode: IconMode) -> (f64, f64) {
        match mode {
            IconMode::Image => (self.portrait_width, self.portrait_height),
            IconMode::Name => (self.portrait_width, self.portrait_height / 4.0),
        }
    }

    /// Apply a partial update; unspecified fields keep their values.
    pub fn apply(&mut self, update: &SpacingUpdate) {
        let SpacingUpdate {
            generation_spacing,
            sibling_spacing,
            descendant_dropdown,
            partner_spacing,
            expand_factor,
            offset_factor,
            crown_size,
            portrait_width,
            portrait_height,
        } = *update;

        if let Some(v) = generation_spacing { self.generation_spacing = v; }
        if let Some(v) = sibling_spacing { self.sibling_spacing = v; }
        if let Some(v) = descendant_dropdown { self.descendant_dropdown = v; }
        if let Some(v) = partner_spacing { self.partner_spacing = v; }
        if let Some(v) = expand_factor { self.expand_factor = v; }
        if let Some(v) = offset_factor { self.offset_factor = v; }
        if let Some(v) = crown_size { self.crown_size = v; }
        if let Some(v) = portrait_width { self.portrait_width = v; }
        if let Some(v) = portrait_height { self.portrait_height = v; }
    }
}

/// Any subset of the spacing fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacingUpdate {
    pub generation_spacing: Option<f64>,
    pub sibling_spacing: Option<f64>,
    pub descendant_dropdown: Option<f64>,
    pub partner_spacing: Option<f64>,
    pub expand_factor: Option<f64>,
    pub offset_factor: Option<f64>,
    pub crown_size: Option<f64>,
    pub portrait_width: Option<f64>,
    pub portrait_height: Option<f64>,
}

/// How a character is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IconMode {
    #[default]
    Image,
    Name,
}

/// Display switches recognised by the layout engine and the arranger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPolicy {
    /// Draw root-2 next to root-1 with a partnership bar.
    pub include_root_partners: bool,
    /// Draw connectors between partners living in different families.
    pub connect_partners: bool,
    /// Show every family on its own, including redundant single-founder families.
    pub explode: bool,
    /// Emit crown positions above rulers.
    pub show_rulers: bool,
    /// Emit a label position for each family.
    pub show_family_names: bool,
    pub icon_mode: IconMode,
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self {
            include_root_partners: true,
            connect_partners: true,
            explode: false,
            show_rulers: true,
            show_family_names: true,
            icon_mode: IconMode::Image,
        }
    }
}
