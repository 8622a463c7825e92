//! Insulation, window and airtightness values for the envelope.
//!
//! Each property is resolved by an ordered list of named strategies; the
//! first one that has a value wins. The order is user input, energy-spec
//! record, notes on the drawings, era defaults, construction-quality defaults.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::confidence::Source;
use crate::io::ancillary::EnergySpecRecord;
use crate::io::inputs::UserInputs;

static R_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bR\s*-?\s*(\d{1,2}(?:\.\d+)?)\b").expect("valid R-value regex"));

static U_FACTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bU\s*-?\s*(?:FACTOR|VALUE)?\s*[=:]?\s*(0?\.\d+)").expect("valid U-factor regex")
});

static SHGC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bSHGC\s*[=:]?\s*(0?\.\d+)").expect("valid SHGC regex"));

static ACH50: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*ACH\s*(?:@|AT)?\s*50|\bACH\s*50\s*[=:]?\s*(\d+(?:\.\d+)?)")
        .expect("valid ACH50 regex")
});

/// Era of construction, from the year built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructionEra {
    Pre1960,
    From1960To1979,
    From1980To1999,
    From2000To2011,
    From2012,
}

impl ConstructionEra {
    pub fn from_year(year: u32) -> Self {
        match year {
            ..1960 => Self::Pre1960,
            1960..1980 => Self::From1960To1979,
            1980..2000 => Self::From1980To1999,
            2000..2012 => Self::From2000To2011,
            _ => Self::From2012,
        }
    }

    pub fn defaults(&self) -> ConstructionDefaults {
        let d = ConstructionDefaults::new;
        match self {
            Self::Pre1960 => d(7.0, 11.0, 0.0, 1.10, 0.70, 15.0),
            Self::From1960To1979 => d(11.0, 19.0, 11.0, 0.90, 0.65, 12.0),
            Self::From1980To1999 => d(13.0, 30.0, 13.0, 0.65, 0.55, 8.0),
            Self::From2000To2011 => d(15.0, 38.0, 19.0, 0.45, 0.40, 6.0),
            Self::From2012 => d(20.0, 49.0, 30.0, 0.32, 0.27, 4.0),
        }
    }
}

impl fmt::Display for ConstructionEra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pre1960 => "pre-1960",
            Self::From1960To1979 => "1960-1979",
            Self::From1980To1999 => "1980-1999",
            Self::From2000To2011 => "2000-2011",
            Self::From2012 => "2012+",
        };
        write!(f, "{s}")
    }
}

/// Overall build quality, used when nothing more specific is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConstructionQuality {
    Tight,
    #[default]
    Average,
    Loose,
}

impl ConstructionQuality {
    pub fn ach50(&self) -> f64 {
        match self {
            Self::Tight => 3.5,
            Self::Average => 7.0,
            Self::Loose => 12.0,
        }
    }

    pub fn defaults(&self) -> ConstructionDefaults {
        let d = ConstructionDefaults::new;
        match self {
            Self::Tight => d(20.0, 49.0, 30.0, 0.30, 0.27, self.ach50()),
            Self::Average => d(13.0, 38.0, 19.0, 0.45, 0.40, self.ach50()),
            Self::Loose => d(11.0, 19.0, 11.0, 0.75, 0.60, self.ach50()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstructionDefaults {
    pub wall_r: f64,
    pub ceiling_r: f64,
    pub floor_r: f64,
    pub window_u: f64,
    pub window_shgc: f64,
    pub ach50: f64,
}

impl ConstructionDefaults {
    pub fn new(wall_r: f64, ceiling_r: f64, floor_r: f64, window_u: f64, window_shgc: f64, ach50: f64) -> Self {
        Self {
            wall_r,
            ceiling_r,
            floor_r,
            window_u,
            window_shgc,
            ach50,
        }
    }

    fn get(&self, property: EnvelopeProperty) -> f64 {
        match property {
            EnvelopeProperty::WallR => self.wall_r,
            EnvelopeProperty::CeilingR => self.ceiling_r,
            EnvelopeProperty::FloorR => self.floor_r,
            EnvelopeProperty::WindowU => self.window_u,
            EnvelopeProperty::WindowShgc => self.window_shgc,
            EnvelopeProperty::Ach50 => self.ach50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnvelopeProperty {
    WallR,
    CeilingR,
    FloorR,
    WindowU,
    WindowShgc,
    Ach50,
}

impl EnvelopeProperty {
    pub const ALL: [EnvelopeProperty; 6] = [
        Self::WallR,
        Self::CeilingR,
        Self::FloorR,
        Self::WindowU,
        Self::WindowShgc,
        Self::Ach50,
    ];

    pub fn field(&self) -> &'static str {
        match self {
            Self::WallR => "wall_r",
            Self::CeilingR => "ceiling_r",
            Self::FloorR => "floor_r",
            Self::WindowU => "window_u",
            Self::WindowShgc => "window_shgc",
            Self::Ach50 => "ach50",
        }
    }
}

/// A resolved property value and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub value: f64,
    pub source: Source,
    pub confidence: f64,
    pub strategy: String,
}

/// Everything the strategies may draw on.
#[derive(Debug, Clone, Copy)]
pub struct ConstructionContext<'a> {
    pub inputs: &'a UserInputs,
    pub energy_spec: Option<&'a EnergySpecRecord>,
    /// Upper-cased text of all pages.
    pub notes: &'a str,
}

impl ConstructionContext<'_> {
    pub fn era(&self) -> Option<ConstructionEra> {
        self.inputs.year_built.map(ConstructionEra::from_year)
    }

    pub fn quality(&self) -> ConstructionQuality {
        self.inputs.construction_quality.unwrap_or_default()
    }
}

pub trait ConstructionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn select(&self, property: EnvelopeProperty, ctx: &ConstructionContext) -> Option<Selection>;
}

struct UserValue;
struct EnergySpecValue;
struct DrawingNotes;
struct EraDefault;
struct QualityDefault;

impl ConstructionStrategy for UserValue {
    fn name(&self) -> &'static str {
        "user"
    }

    fn select(&self, property: EnvelopeProperty, ctx: &ConstructionContext) -> Option<Selection> {
        let i = ctx.inputs;
        let value = match property {
            EnvelopeProperty::WallR => i.wall_r,
            EnvelopeProperty::CeilingR => i.ceiling_r,
            EnvelopeProperty::FloorR => None,
            EnvelopeProperty::WindowU => i.window_u,
            EnvelopeProperty::WindowShgc => i.window_shgc,
            EnvelopeProperty::Ach50 => i.ach50,
        }?;
        Some(selection(value, Source::UserProvided, 1.0, self.name()))
    }
}

impl ConstructionStrategy for EnergySpecValue {
    fn name(&self) -> &'static str {
        "energy_spec"
    }

    fn select(&self, property: EnvelopeProperty, ctx: &ConstructionContext) -> Option<Selection> {
        let spec = ctx.energy_spec?;
        let value = match property {
            EnvelopeProperty::WallR => spec.wall_r,
            EnvelopeProperty::CeilingR => spec.ceiling_r,
            EnvelopeProperty::FloorR => spec.floor_r,
            EnvelopeProperty::WindowU => spec.window_u,
            EnvelopeProperty::WindowShgc => spec.window_shgc,
            EnvelopeProperty::Ach50 => spec.ach50,
        }?;
        Some(selection(value, Source::Detected, spec.confidence, self.name()))
    }
}

impl ConstructionStrategy for DrawingNotes {
    fn name(&self) -> &'static str {
        "drawing_notes"
    }

    fn select(&self, property: EnvelopeProperty, ctx: &ConstructionContext) -> Option<Selection> {
        let value = match property {
            EnvelopeProperty::WallR | EnvelopeProperty::CeilingR | EnvelopeProperty::FloorR => {
                notes_r_values(ctx.notes, property)
                    .into_iter()
                    .min_by(f64::total_cmp)
            }
            EnvelopeProperty::WindowU => captures(&U_FACTOR, ctx.notes)
                .filter(|u| (0.1..=1.5).contains(u))
                .max_by(f64::total_cmp),
            EnvelopeProperty::WindowShgc => captures(&SHGC, ctx.notes)
                .filter(|s| (0.1..=0.9).contains(s))
                .max_by(f64::total_cmp),
            EnvelopeProperty::Ach50 => captures(&ACH50, ctx.notes)
                .filter(|a| (0.5..=30.0).contains(a))
                .max_by(f64::total_cmp),
        }?;
        Some(selection(value, Source::Detected, 0.75, self.name()))
    }
}

impl ConstructionStrategy for EraDefault {
    fn name(&self) -> &'static str {
        "era_default"
    }

    fn select(&self, property: EnvelopeProperty, ctx: &ConstructionContext) -> Option<Selection> {
        let era = ctx.era()?;
        let value = era.defaults().get(property);
        Some(selection(value, Source::Inferred, 0.6, self.name()))
    }
}

impl ConstructionStrategy for QualityDefault {
    fn name(&self) -> &'static str {
        "quality_default"
    }

    fn select(&self, property: EnvelopeProperty, ctx: &ConstructionContext) -> Option<Selection> {
        let value = ctx.quality().defaults().get(property);
        Some(selection(value, Source::Defaulted, 0.4, self.name()))
    }
}

fn selection(value: f64, source: Source, confidence: f64, strategy: &str) -> Selection {
    Selection {
        value,
        source,
        confidence,
        strategy: strategy.to_string(),
    }
}

/// Values of every first capture group that parses as a number.
fn captures<'t>(re: &'t Regex, text: &'t str) -> impl Iterator<Item = f64> + 't {
    re.captures_iter(text).filter_map(|c| {
        c.iter()
            .skip(1)
            .flatten()
            .next()
            .and_then(|m| m.as_str().parse::<f64>().ok())
    })
}

/// R-values in `notes` that belong to `property`.
///
/// A value is tied to the component named right after it on the same line
/// (`R-13 WALLS`), or else right before it (`ATTIC: R-38`).
pub fn notes_r_values(notes: &str, property: EnvelopeProperty) -> Vec<f64> {
    let keywords: &[&str] = match property {
        EnvelopeProperty::WallR => &["WALL"],
        EnvelopeProperty::CeilingR => &["CEILING", "ATTIC", "ROOF"],
        EnvelopeProperty::FloorR => &["FLOOR", "CRAWL"],
        _ => return Vec::new(),
    };
    let all: [&[&str]; 3] = [&["WALL"], &["CEILING", "ATTIC", "ROOF"], &["FLOOR", "CRAWL"]];
    let mut out = Vec::new();
    for line in notes.lines() {
        let matches: Vec<_> = R_VALUE.captures_iter(line).collect();
        for (k, caps) in matches.iter().enumerate() {
            let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Ok(value) = num.as_str().parse::<f64>() else {
                continue;
            };
            if !(1.0..=100.0).contains(&value) {
                continue;
            }
            let next_start = matches
                .get(k + 1)
                .and_then(|c| c.get(0))
                .map_or(line.len(), |m| m.start());
            let after: String = line[whole.end()..next_start].chars().take(40).collect();
            let prev_end = if k == 0 {
                0
            } else {
                matches[k - 1].get(0).map_or(0, |m| m.end())
            };
            let before = &line[prev_end..whole.start()];
            let names = |s: &str, kws: &[&str]| kws.iter().any(|kw| s.contains(kw));
            let owner = all
                .iter()
                .position(|kws| names(&after, kws))
                .or_else(|| all.iter().position(|kws| names(before, kws)));
            if let Some(idx) = owner
                && all[idx] == keywords
            {
                out.push(value);
            }
        }
    }
    out
}

/// Runs the strategy chain for each envelope property.
pub struct ConstructionSelector {
    strategies: Vec<Box<dyn ConstructionStrategy>>,
}

impl ConstructionSelector {
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(UserValue),
                Box::new(EnergySpecValue),
                Box::new(DrawingNotes),
                Box::new(EraDefault),
                Box::new(QualityDefault),
            ],
        }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn select(&self, property: EnvelopeProperty, ctx: &ConstructionContext) -> Selection {
        self.strategies
            .iter()
            .find_map(|s| s.select(property, ctx))
            .unwrap_or_else(|| {
                let value = ConstructionQuality::Average.defaults().get(property);
                selection(value, Source::Defaulted, 0.4, "quality_default")
            })
    }
}

impl Default for ConstructionSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Effective U-value of an opaque assembly from its nominal cavity R-value.
///
/// Framing bypasses part of the cavity insulation; `assembly_r` covers the
/// sheathing, finishes and air films.
pub fn effective_u(nominal_r: f64, framing_factor: f64, assembly_r: f64) -> f64 {
    let r = nominal_r.max(0.0) * framing_factor + assembly_r;
    if r > 0.0 { 1.0 / r } else { 0.0 }
}

/// Slab-edge F-factor (BTU/h·ft·°F) for a given edge insulation R-value.
pub fn slab_f_factor(edge_r: f64) -> f64 {
    const TABLE: [(f64, f64); 4] = [(0.0, 0.73), (5.0, 0.54), (10.0, 0.48), (15.0, 0.45)];
    let r = edge_r.max(0.0);
    for pair in TABLE.windows(2) {
        let ((r0, f0), (r1, f1)) = (pair[0], pair[1]);
        if r <= r1 {
            return f0 + (f1 - f0) * (r - r0) / (r1 - r0);
        }
    }
    TABLE[TABLE.len() - 1].1
}

/// U-value of a below-grade wall including the soil path.
pub fn below_grade_u(wall_r: f64) -> f64 {
    1.0 / (wall_r.max(0.0) + 4.0)
}
