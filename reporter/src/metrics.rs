//! Static metric-label and palette registries.
//!
//! Resolution is a pure lookup: every column name resolves to something, an
//! unregistered categorical falls back to the combined palette and an
//! unregistered numeric column to a title-cased label with no transform.

use plotters::style::RGBColor;

use crate::models::Direction;

/// Unit transform applied to a raw numeric column before plotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    NegLog10,
}

#[derive(Debug, Clone)]
pub struct MetricDescriptor {
    pub column: String,
    pub label: String,
    pub transform: Option<Transform>,
    pub direction: Direction,
}

/// Display metadata for a numeric column. Unregistered columns get a
/// title-cased label, no transform, and a higher-is-better orientation.
pub fn metric_descriptor(column: &str) -> MetricDescriptor {
    let (label, transform, direction) = match column {
        "kd" => ("-log10(KD)", Some(Transform::NegLog10), Direction::HigherIsBetter),
        "iptm" => ("ipTM", None, Direction::HigherIsBetter),
        "ptm" => ("pTM", None, Direction::HigherIsBetter),
        "plddt" => ("pLDDT", None, Direction::HigherIsBetter),
        "pae_interaction" => ("PAE Interaction", None, Direction::LowerIsBetter),
        "esm_pll" => ("ESM-PLL", None, Direction::HigherIsBetter),
        "esm_pll_avg" => ("ESM-PLL Average", None, Direction::HigherIsBetter),
        "interface_dG" => ("Interface dG", None, Direction::LowerIsBetter),
        "interface_sc" => ("Interface Shape Complementarity", None, Direction::HigherIsBetter),
        "interface_buried_sasa" => ("Interface Buried SASA", None, Direction::HigherIsBetter),
        "interface_hbonds" => ("Interface H-Bonds", None, Direction::HigherIsBetter),
        "sequence_length" => ("Sequence Length", None, Direction::HigherIsBetter),
        "similarity_check" => ("Similarity Check", None, Direction::HigherIsBetter),
        _ => {
            return MetricDescriptor {
                column: column.to_string(),
                label: title_case(column),
                transform: None,
                direction: Direction::HigherIsBetter,
            }
        }
    };
    MetricDescriptor {
        column: column.to_string(),
        label: label.to_string(),
        transform,
        direction,
    }
}

/// "pae_interaction" -> "Pae Interaction". Fallback display name for columns
/// outside the registry.
pub fn title_case(column: &str) -> String {
    column
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// Shared theme colors (hex values from the competition blog-post theme).
pub const TEXT_COLOR: RGBColor = RGBColor(51, 51, 51);
pub const SUBTITLE_COLOR: RGBColor = RGBColor(61, 122, 154);

const GRAY: RGBColor = RGBColor(229, 231, 235);
const SLATE: RGBColor = RGBColor(158, 162, 175);
const LILAC: RGBColor = RGBColor(196, 178, 251);
const PERIWINKLE: RGBColor = RGBColor(167, 193, 251);
const ROYAL: RGBColor = RGBColor(42, 77, 208);
const STEEL: RGBColor = RGBColor(62, 97, 117);
const CORAL: RGBColor = RGBColor(220, 122, 115);
const GOLD: RGBColor = RGBColor(233, 196, 53);
const TEAL: RGBColor = RGBColor(105, 183, 167);
const VIOLET: RGBColor = RGBColor(139, 144, 221);
const SKY: RGBColor = RGBColor(140, 210, 244);
const AZURE: RGBColor = RGBColor(86, 166, 212);

/// Ordered fallback cycle: the union of every named palette's colors.
const FALLBACK_CYCLE: &[RGBColor] = &[
    AZURE, VIOLET, SKY, STEEL, ROYAL, TEAL, GOLD, CORAL, LILAC, PERIWINKLE, SLATE, GRAY,
];

/// Mapping from categorical value to display color for one column.
#[derive(Debug, Clone)]
pub struct CategoryPalette {
    entries: &'static [(&'static str, RGBColor)],
}

impl CategoryPalette {
    /// Color for a category value. Unregistered values cycle through the
    /// combined fallback palette by their position in the legend.
    pub fn color_for(&self, value: &str, position: usize) -> RGBColor {
        self.entries
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, color)| *color)
            .unwrap_or_else(|| FALLBACK_CYCLE[position % FALLBACK_CYCLE.len()])
    }
}

const BINDING_STRENGTH_PALETTE: &[(&str, RGBColor)] = &[
    ("None", GRAY),
    ("Not expressed", SLATE),
    ("Weak", LILAC),
    ("Medium", PERIWINKLE),
    ("Strong", ROYAL),
    ("Missing data", STEEL),
];

const EXPRESSION_PALETTE: &[(&str, RGBColor)] = &[
    ("None", GRAY),
    ("Low", SLATE),
    ("Medium", GOLD),
    ("High", TEAL),
];

const SELECTED_PALETTE: &[(&str, RGBColor)] = &[
    ("Top 100", VIOLET),
    ("Adaptyv selection", SKY),
    ("Not selected", GRAY),
];

const DESIGN_CATEGORY_PALETTE: &[(&str, RGBColor)] = &[
    ("De novo", AZURE),
    ("Optimized binder", VIOLET),
    ("Diversified binder", SKY),
    ("Hallucination", STEEL),
];

const BINDING_PALETTE: &[(&str, RGBColor)] = &[("Yes", ROYAL), ("No", GRAY)];

const DE_NOVO_PALETTE: &[(&str, RGBColor)] = &[("De novo", AZURE), ("Existing binder", VIOLET)];

const METRIC_PALETTE: &[(&str, RGBColor)] = &[
    ("ESM-PLL", SKY),
    ("ipTM", VIOLET),
    ("PAE Interaction", STEEL),
    ("pLDDT", AZURE),
    ("-log10(KD)", ROYAL),
];

const ROUND_PALETTE: &[(&str, RGBColor)] = &[("1", AZURE), ("2", VIOLET)];

const FALLBACK_PALETTE: &[(&str, RGBColor)] = &[];

/// Palette for a categorical column. Unregistered columns resolve to the
/// combined fallback palette; resolution never fails.
pub fn palette_for_column(column: &str) -> CategoryPalette {
    let entries = match column {
        "binding_strength" => BINDING_STRENGTH_PALETTE,
        "expression" => EXPRESSION_PALETTE,
        "selected" => SELECTED_PALETTE,
        "design_category" => DESIGN_CATEGORY_PALETTE,
        "binding" => BINDING_PALETTE,
        "de_novo" => DE_NOVO_PALETTE,
        "metric" => METRIC_PALETTE,
        "round" => ROUND_PALETTE,
        _ => FALLBACK_PALETTE,
    };
    CategoryPalette { entries }
}

/// Fixed display order for the stacked-bar segments of known columns.
pub fn level_order(column: &str) -> Option<&'static [&'static str]> {
    match column {
        "binding_strength" => Some(&["None", "Not expressed", "Weak", "Medium", "Strong"]),
        "expression" => Some(&["None", "Low", "Medium", "High"]),
        "selected" => Some(&["Top 100", "Adaptyv selection", "Not selected"]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_descriptor_carries_transform_and_direction() {
        let kd = metric_descriptor("kd");
        assert_eq!(kd.label, "-log10(KD)");
        assert_eq!(kd.transform, Some(Transform::NegLog10));
        assert_eq!(kd.direction, Direction::HigherIsBetter);

        let pae = metric_descriptor("pae_interaction");
        assert_eq!(pae.direction, Direction::LowerIsBetter);
    }

    #[test]
    fn unregistered_descriptor_title_cases_the_raw_name() {
        let d = metric_descriptor("my_new_score");
        assert_eq!(d.label, "My New Score");
        assert!(d.transform.is_none());
    }

    #[test]
    fn palette_resolution_is_total() {
        let pal = palette_for_column("no_such_column");
        // Unknown values still get a deterministic color from the cycle.
        let a = pal.color_for("anything", 0);
        let b = pal.color_for("anything", 0);
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
        assert_eq!(a.2, b.2);
    }

    #[test]
    fn binding_strength_palette_matches_registry() {
        let pal = palette_for_column("binding_strength");
        assert_eq!(pal.color_for("Strong", 0).0, 42);
        assert_eq!(pal.color_for("None", 0).0, 229);
    }
}
