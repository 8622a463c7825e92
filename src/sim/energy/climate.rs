//! Design conditions by ZIP code.
//!
//! The built-in table maps three-digit ZIP prefixes to a representative
//! station's 99 % heating and 1 % cooling design temperatures. It is coarse by
//! construction; callers with better data inject their own [`ClimateLookup`].

use serde::{Deserialize, Serialize};

use crate::confidence::{RunLog, Stage};
use crate::io::inputs::validate_zip;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateData {
    /// IECC climate zone, e.g. `4A`.
    pub climate_zone: String,
    pub winter_design_temp_f: f64,
    pub summer_design_temp_f: f64,
    pub design_wind_mph: f64,
    /// Outdoor minus indoor humidity ratio at cooling design, grains/lb.
    pub summer_grains_difference: f64,
    pub location: String,
}

impl ClimateData {
    pub fn new(zone: &str, winter_f: f64, summer_f: f64, wind_mph: f64, grains: f64, location: &str) -> Self {
        Self {
            climate_zone: zone.to_string(),
            winter_design_temp_f: winter_f,
            summer_design_temp_f: summer_f,
            design_wind_mph: wind_mph,
            summer_grains_difference: grains,
            location: location.to_string(),
        }
    }

    /// Used when the ZIP code is unknown.
    pub fn fallback() -> Self {
        Self::new("4A", 15.0, 90.0, 15.0, 30.0, "fallback")
    }
}

/// Source of design conditions.
pub trait ClimateLookup: Sync {
    fn lookup(&self, zip: &str) -> Option<ClimateData>;
}

/// ZIP-prefix table of design conditions.
#[derive(Debug, Clone)]
pub struct BuiltinClimateTable {
    rows: Vec<(u16, u16, ClimateData)>,
}

impl BuiltinClimateTable {
    pub fn new() -> Self {
        let r = |lo: u16, hi: u16, zone: &str, w: f64, s: f64, g: f64, loc: &str| {
            (lo, hi, ClimateData::new(zone, w, s, 15.0, g, loc))
        };
        let rows = vec![
            r(6, 9, "1A", 66.0, 90.0, 55.0, "San Juan PR"),
            r(10, 27, "5A", 7.0, 88.0, 33.0, "Boston MA"),
            r(28, 29, "5A", 9.0, 86.0, 33.0, "Providence RI"),
            r(30, 38, "5A", -1.0, 88.0, 30.0, "Manchester NH"),
            r(39, 49, "6A", -5.0, 84.0, 25.0, "Portland ME"),
            r(50, 59, "6A", -9.0, 85.0, 25.0, "Burlington VT"),
            r(60, 69, "5A", 7.0, 88.0, 35.0, "Hartford CT"),
            r(70, 89, "4A", 13.0, 91.0, 38.0, "Newark NJ"),
            r(100, 119, "4A", 15.0, 89.0, 37.0, "New York NY"),
            r(120, 149, "5A", 2.0, 85.0, 28.0, "Albany NY"),
            r(150, 168, "5A", 5.0, 86.0, 30.0, "Pittsburgh PA"),
            r(169, 196, "4A", 14.0, 91.0, 38.0, "Philadelphia PA"),
            r(197, 199, "4A", 14.0, 90.0, 40.0, "Wilmington DE"),
            r(200, 205, "4A", 17.0, 93.0, 42.0, "Washington DC"),
            r(206, 219, "4A", 14.0, 91.0, 40.0, "Baltimore MD"),
            r(220, 246, "4A", 18.0, 92.0, 42.0, "Richmond VA"),
            r(247, 268, "5A", 9.0, 87.0, 32.0, "Charleston WV"),
            r(270, 289, "3A", 22.0, 92.0, 45.0, "Charlotte NC"),
            r(290, 299, "3A", 26.0, 94.0, 50.0, "Columbia SC"),
            r(300, 319, "3A", 24.0, 93.0, 48.0, "Atlanta GA"),
            r(320, 339, "2A", 35.0, 92.0, 55.0, "Orlando FL"),
            r(340, 349, "1A", 47.0, 91.0, 60.0, "Miami FL"),
            r(350, 369, "3A", 22.0, 94.0, 50.0, "Birmingham AL"),
            r(370, 385, "4A", 18.0, 93.0, 45.0, "Nashville TN"),
            r(386, 397, "3A", 24.0, 94.0, 52.0, "Jackson MS"),
            r(398, 399, "3A", 24.0, 93.0, 48.0, "Albany GA"),
            r(400, 427, "4A", 10.0, 91.0, 40.0, "Louisville KY"),
            r(430, 459, "5A", 5.0, 89.0, 35.0, "Columbus OH"),
            r(460, 479, "5A", 2.0, 89.0, 36.0, "Indianapolis IN"),
            r(480, 499, "5A", 3.0, 87.0, 32.0, "Detroit MI"),
            r(500, 528, "5A", -5.0, 90.0, 36.0, "Des Moines IA"),
            r(530, 549, "6A", -7.0, 87.0, 32.0, "Madison WI"),
            r(550, 567, "6A", -12.0, 88.0, 32.0, "Minneapolis MN"),
            r(570, 577, "6A", -11.0, 92.0, 25.0, "Sioux Falls SD"),
            r(580, 588, "7", -18.0, 90.0, 20.0, "Fargo ND"),
            r(590, 599, "6B", -10.0, 90.0, 0.0, "Billings MT"),
            r(600, 629, "5A", -1.0, 91.0, 36.0, "Chicago IL"),
            r(630, 658, "4A", 6.0, 94.0, 42.0, "St. Louis MO"),
            r(660, 679, "4A", 5.0, 97.0, 35.0, "Wichita KS"),
            r(680, 693, "5A", -3.0, 94.0, 35.0, "Omaha NE"),
            r(700, 714, "2A", 33.0, 93.0, 60.0, "New Orleans LA"),
            r(716, 729, "3A", 20.0, 96.0, 48.0, "Little Rock AR"),
            r(730, 749, "3A", 13.0, 99.0, 40.0, "Oklahoma City OK"),
            r(750, 769, "3A", 22.0, 99.0, 45.0, "Dallas TX"),
            r(770, 789, "2A", 32.0, 96.0, 55.0, "Houston TX"),
            r(790, 799, "3B", 19.0, 97.0, 0.0, "Lubbock TX"),
            r(800, 816, "5B", 1.0, 93.0, 0.0, "Denver CO"),
            r(820, 831, "6B", -7.0, 88.0, 0.0, "Casper WY"),
            r(832, 838, "5B", 5.0, 96.0, 0.0, "Boise ID"),
            r(840, 847, "5B", 8.0, 97.0, 0.0, "Salt Lake City UT"),
            r(850, 865, "2B", 38.0, 110.0, 0.0, "Phoenix AZ"),
            r(870, 884, "4B", 18.0, 94.0, 0.0, "Albuquerque NM"),
            r(889, 891, "3B", 29.0, 108.0, 0.0, "Las Vegas NV"),
            r(893, 898, "5B", 13.0, 95.0, 0.0, "Reno NV"),
            r(900, 935, "3B", 43.0, 89.0, 10.0, "Los Angeles CA"),
            r(936, 939, "3B", 32.0, 100.0, 0.0, "Fresno CA"),
            r(940, 954, "3C", 38.0, 85.0, 5.0, "San Francisco CA"),
            r(955, 961, "3B", 30.0, 98.0, 0.0, "Sacramento CA"),
            r(967, 968, "1A", 62.0, 88.0, 45.0, "Honolulu HI"),
            r(970, 979, "4C", 24.0, 88.0, 5.0, "Portland OR"),
            r(980, 994, "4C", 26.0, 83.0, 5.0, "Seattle WA"),
            r(995, 999, "7", -18.0, 75.0, 0.0, "Anchorage AK"),
        ];
        Self { rows }
    }
}

impl Default for BuiltinClimateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ClimateLookup for BuiltinClimateTable {
    fn lookup(&self, zip: &str) -> Option<ClimateData> {
        let prefix: u16 = zip.trim().get(..3)?.parse().ok()?;
        self.rows
            .iter()
            .find(|(lo, hi, _)| (*lo..=*hi).contains(&prefix))
            .map(|(_, _, c)| c.clone())
    }
}

/// Looks up `zip`, falling back to a moderate cold climate with a warning.
pub fn resolve_climate(lookup: &dyn ClimateLookup, zip: &str, log: &mut RunLog) -> ClimateData {
    let found = validate_zip(zip).ok().and_then(|_| lookup.lookup(zip));
    match found {
        Some(c) => {
            log.detected(
                Stage::Loads,
                "climate",
                0.9,
                format!(
                    "{} ({}): {}°F / {}°F",
                    c.location, c.climate_zone, c.winter_design_temp_f, c.summer_design_temp_f
                ),
            );
            c
        }
        None => {
            log.warning(
                Stage::Loads,
                "climate_fallback",
                format!("no design conditions for ZIP {zip:?}; using fallback climate"),
            );
            log.defaulted(Stage::Loads, "climate", 0.4, "fallback climate");
            ClimateData::fallback()
        }
    }
}
