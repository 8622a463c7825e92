//! Load Calculation Engine.
//!
//! A run walks a fixed sequence of states:
//!
//! ```text
//! EnvelopeReady -> InfiltrationComputed -> DuctLossesComputed
//!   -> [MultiStoryDistributed] -> TotalsAggregated -> SafetyFactorApplied -> Done
//! ```
//!
//! The multi-story state is only entered for buildings with two or more
//! floors. The visited states are kept on the result.

use serde::{Deserialize, Serialize};

use super::boundary::Season;
use super::climate::ClimateData;
use super::config::LoadConfig;
use super::construction::EnvelopeProperty;
use super::ducts::calculate_duct_losses;
use super::envelope::BuildingEnvelope;
use super::hvac::{apply_safety_factor, select_tonnage};
use super::infiltration::{InfiltrationInputs, calculate_infiltration};
use super::multistory::{FloorSlice, floor_slices, infiltration_shares, inter_floor_transfer};
use super::result::{BuildingLoad, ComponentLoads, DuctLossResult, FloorLoad, InfiltrationResult};
use super::zone::ThermalZone;
use crate::confidence::{RunLog, Source, Stage};
use crate::io::inputs::UserInputs;
use crate::plan::space::BoundaryCondition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    EnvelopeReady,
    InfiltrationComputed,
    DuctLossesComputed,
    MultiStoryDistributed,
    TotalsAggregated,
    SafetyFactorApplied,
    Done,
}

impl LoadState {
    /// The state after this one, `None` once done.
    pub fn successor(self, multi_story: bool) -> Option<LoadState> {
        use LoadState::*;
        match self {
            EnvelopeReady => Some(InfiltrationComputed),
            InfiltrationComputed => Some(DuctLossesComputed),
            DuctLossesComputed if multi_story => Some(MultiStoryDistributed),
            DuctLossesComputed => Some(TotalsAggregated),
            MultiStoryDistributed => Some(TotalsAggregated),
            TotalsAggregated => Some(SafetyFactorApplied),
            SafetyFactorApplied => Some(Done),
            Done => None,
        }
    }
}

/// Both design conditions of one quantity.
#[derive(Debug, Clone, PartialEq)]
struct Seasonal<T> {
    heating: T,
    cooling: T,
}

struct LoadRun<'a> {
    cfg: &'a LoadConfig,
    envelope: &'a BuildingEnvelope,
    zones: Vec<&'a ThermalZone>,
    climate: &'a ClimateData,
    state: LoadState,
    trace: Vec<LoadState>,
    notes: Vec<String>,
}

impl LoadRun<'_> {
    fn multi_story(&self) -> bool {
        self.zones.len() >= 2
    }

    /// Floor assembly between stories, recovered from the envelope's stack height.
    fn floor_gap_ft(&self) -> f64 {
        let n = self.zones.len();
        if n < 2 {
            return 0.0;
        }
        let stories: f64 = self.zones.iter().map(|z| z.ceiling_height_ft).sum();
        ((self.envelope.stack_height_ft - stories) / (n - 1) as f64).max(0.0)
    }

    fn advance(&mut self, to: LoadState) {
        debug_assert_eq!(self.state.successor(self.multi_story()), Some(to));
        tracing::debug!(from = ?self.state, to = ?to, "load state");
        self.state = to;
        self.trace.push(to);
    }

    fn indoor(&self, season: Season) -> f64 {
        match season {
            Season::Heating => self.cfg.indoor_heating_f,
            Season::Cooling => self.cfg.indoor_cooling_f,
        }
    }

    fn delta_t(&self, boundary: BoundaryCondition, season: Season) -> f64 {
        self.cfg
            .boundary_temperatures
            .design_delta_t(boundary, season, self.climate, self.indoor(season))
    }

    fn area_shares(&self) -> Vec<f64> {
        let total: f64 = self.zones.iter().map(|z| z.conditioned_area_ft2).sum();
        let n = self.zones.len().max(1) as f64;
        self.zones
            .iter()
            .map(|z| {
                if total > 0.0 {
                    z.conditioned_area_ft2 / total
                } else {
                    1.0 / n
                }
            })
            .collect()
    }

    /// Conduction, solar and internal components of one zone.
    fn envelope_loads(&self, zone: &ThermalZone, season: Season) -> ComponentLoads {
        let env = self.envelope;
        let cfg = self.cfg;
        let dt_out = self.delta_t(BoundaryCondition::Exterior, season);
        let mut c = ComponentLoads::default();

        let net_wall = zone.net_wall_area(env);
        let below = if zone.floor_level <= 0 && zone.ceiling_height_ft > 0.0 {
            (env.below_grade_depth_ft / zone.ceiling_height_ft).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let dt_ground = self.delta_t(BoundaryCondition::Ground, season);
        c.walls = net_wall * ((1.0 - below) * env.wall_u * dt_out + below * env.below_grade_u * dt_ground);

        c.windows = env.window_u * zone.window_area(env) * dt_out;
        c.doors = env.door_u * zone.door_area(env) * dt_out;

        c.ceilings = zone
            .ceiling_boundaries
            .iter()
            .map(|(b, a)| env.ceiling_u * a * self.delta_t(*b, season))
            .sum();

        c.floors = zone
            .floor_boundaries
            .iter()
            .map(|(b, a)| match b {
                BoundaryCondition::Ground if zone.floor_level <= 0 => {
                    cfg.basement_floor_u * a * dt_ground
                }
                BoundaryCondition::Ground => match season {
                    // Slab edge loss scales with the exposed perimeter of the on-grade part
                    Season::Heating => {
                        let fraction = if zone.conditioned_area_ft2 > 0.0 {
                            (a / zone.conditioned_area_ft2).min(1.0)
                        } else {
                            1.0
                        };
                        env.slab_f_factor * zone.exposed_perimeter_ft * fraction * dt_out
                    }
                    Season::Cooling => 0.0,
                },
                other => env.floor_u * a * self.delta_t(*other, season),
            })
            .sum();

        if season == Season::Cooling {
            c.solar = zone
                .window_area_by_orientation(env)
                .iter()
                .map(|(o, a)| a * env.window_shgc * cfg.solar_factor(*o))
                .sum();
            c.internal = zone.sensible_internal_gain_btuh(cfg);
        }
        c
    }

    fn compute_infiltration(&self, user: &UserInputs, log: &mut RunLog) -> Seasonal<InfiltrationResult> {
        let env = self.envelope;
        let cfg = self.cfg;
        let shielding = match user.shielding_class {
            Some(c) => {
                log.user(Stage::Loads, "shielding_class", format!("class {c}"));
                c
            }
            None => {
                log.defaulted(Stage::Loads, "shielding_class", 0.7, "typical suburban shielding");
                cfg.default_shielding_class
            }
        };
        let terrain = match user.terrain_class {
            Some(c) => {
                log.user(Stage::Loads, "terrain_class", format!("class {c}"));
                c
            }
            None => {
                log.defaulted(Stage::Loads, "terrain_class", 0.7, "typical suburban terrain");
                cfg.default_terrain_class
            }
        };

        let stories = self.zones.len().max(1);
        let base = InfiltrationInputs {
            season: Season::Heating,
            ach50: env.ach50,
            volume_ft3: env.volume_ft3,
            stories,
            stack_height_ft: env.stack_height_ft,
            indoor_f: cfg.indoor_heating_f,
            outdoor_f: self.climate.winter_design_temp_f,
            wind_mph: self.climate.design_wind_mph,
            shielding_class: shielding,
            terrain_class: terrain,
            ventilation: env.mechanical.ventilation,
            grains_difference: 0.0,
        };
        let heating = calculate_infiltration(&base, cfg);
        let cooling = calculate_infiltration(
            &InfiltrationInputs {
                season: Season::Cooling,
                indoor_f: cfg.indoor_cooling_f,
                outdoor_f: self.climate.summer_design_temp_f,
                grains_difference: self.climate.summer_grains_difference,
                ..base
            },
            cfg,
        );

        if let Some(sel) = env.selections.get(&EnvelopeProperty::Ach50) {
            let note = format!("ACH50 {} from {}", sel.value, sel.strategy);
            match sel.source {
                Source::UserProvided => log.user(Stage::Loads, "infiltration", note),
                source => log.record(Stage::Loads, "infiltration", source, sel.confidence, note),
            }
        }
        tracing::info!(
            cfm50 = heating.cfm50,
            heating_cfm = heating.infiltration_cfm,
            cooling_cfm = cooling.infiltration_cfm,
            "infiltration computed"
        );
        Seasonal { heating, cooling }
    }

    fn compute_ducts(&self, log: &mut RunLog) -> Seasonal<DuctLossResult> {
        let mech = &self.envelope.mechanical;
        let area = self.envelope.conditioned_area_ft2;
        let heating = calculate_duct_losses(mech, area, Season::Heating, self.climate, self.cfg);
        let cooling = calculate_duct_losses(mech, area, Season::Cooling, self.climate, self.cfg);
        log.inferred(
            Stage::Loads,
            "duct_losses",
            mech.confidence,
            format!("{:?} ducts, {:?} sealing", mech.duct_location, mech.duct_sealing),
        );
        Seasonal { heating, cooling }
    }

    fn distribute(
        &self,
        slices: &[FloorSlice],
        infiltration: &Seasonal<InfiltrationResult>,
        log: &mut RunLog,
    ) -> (Seasonal<Vec<f64>>, Seasonal<Vec<f64>>) {
        let shares = Seasonal {
            heating: infiltration_shares(
                slices,
                infiltration.heating.stack_cfm,
                infiltration.heating.wind_cfm,
                Season::Heating,
                self.cfg,
            ),
            cooling: infiltration_shares(
                slices,
                infiltration.cooling.stack_cfm,
                infiltration.cooling.wind_cfm,
                Season::Cooling,
                self.cfg,
            ),
        };
        let transfer = Seasonal {
            heating: inter_floor_transfer(slices, Season::Heating, self.cfg),
            cooling: inter_floor_transfer(slices, Season::Cooling, self.cfg),
        };
        log.inferred(
            Stage::Loads,
            "stack_distribution",
            0.8,
            format!(
                "{} floors, neutral plane at {:.0}% of height",
                slices.len(),
                self.cfg.neutral_plane_fraction * 100.0
            ),
        );
        (shares, transfer)
    }

    fn aggregate(
        &self,
        infiltration: &Seasonal<InfiltrationResult>,
        ducts: &Seasonal<DuctLossResult>,
        shares: &Seasonal<Vec<f64>>,
        transfer: &Seasonal<Vec<f64>>,
        coupling_discount: f64,
    ) -> Vec<FloorLoad> {
        let area = self.area_shares();
        self.zones
            .iter()
            .enumerate()
            .map(|(i, zone)| {
                let a = area[i];
                let sh = shares.heating.get(i).copied().unwrap_or(a);
                let sc = shares.cooling.get(i).copied().unwrap_or(a);

                let mut heating = self.envelope_loads(zone, Season::Heating);
                heating.infiltration = infiltration.heating.sensible_btuh * sh;
                heating.ventilation = infiltration.heating.ventilation_sensible_btuh * a;
                heating.ducts = ducts.heating.sensible_btuh() * a;
                heating.inter_floor = transfer.heating.get(i).copied().unwrap_or(0.0);

                let mut cooling = self.envelope_loads(zone, Season::Cooling);
                cooling.infiltration = infiltration.cooling.sensible_btuh * sc;
                cooling.ventilation = infiltration.cooling.ventilation_sensible_btuh * a;
                cooling.ducts = ducts.cooling.sensible_btuh() * a;
                cooling.inter_floor = transfer.cooling.get(i).copied().unwrap_or(0.0);

                let latent = infiltration.cooling.latent_btuh * sc
                    + ducts.cooling.latent_btuh * a
                    + zone.latent_internal_gain_btuh(self.cfg);

                FloorLoad {
                    floor_level: zone.floor_level,
                    zone_id: zone.id.clone(),
                    conditioned_area_ft2: zone.conditioned_area_ft2,
                    heating,
                    cooling,
                    cooling_latent_btuh: latent,
                    infiltration_cfm_heating: infiltration.heating.infiltration_cfm * sh,
                    infiltration_cfm_cooling: infiltration.cooling.infiltration_cfm * sc,
                    coupling_discount,
                    notes: Vec::new(),
                }
            })
            .collect()
    }
}

/// Turns an envelope and its zones into design loads and equipment size.
#[derive(Debug, Clone, Default)]
pub struct LoadCalculationEngine {
    pub config: LoadConfig,
}

impl LoadCalculationEngine {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        envelope: &BuildingEnvelope,
        zones: &[ThermalZone],
        climate: &ClimateData,
        user: &UserInputs,
        log: &mut RunLog,
    ) -> BuildingLoad {
        let cfg = &self.config;
        let mut ordered: Vec<&ThermalZone> = zones.iter().collect();
        ordered.sort_by_key(|z| z.floor_level);
        let mut run = LoadRun {
            cfg,
            envelope,
            zones: ordered,
            climate,
            state: LoadState::EnvelopeReady,
            trace: vec![LoadState::EnvelopeReady],
            notes: Vec::new(),
        };

        let infiltration = run.compute_infiltration(user, log);
        run.advance(LoadState::InfiltrationComputed);

        let ducts = run.compute_ducts(log);
        run.advance(LoadState::DuctLossesComputed);

        let slices = floor_slices(zones, run.floor_gap_ft());
        let (shares, transfer) = if run.multi_story() {
            let out = run.distribute(&slices, &infiltration, log);
            run.advance(LoadState::MultiStoryDistributed);
            out
        } else {
            let area = run.area_shares();
            (
                Seasonal {
                    heating: area.clone(),
                    cooling: area,
                },
                Seasonal {
                    heating: vec![0.0; run.zones.len()],
                    cooling: vec![0.0; run.zones.len()],
                },
            )
        };

        let coupling_discount = cfg.coupling_discount(run.zones.len());
        let floors = run.aggregate(&infiltration, &ducts, &shares, &transfer, coupling_discount);
        let (heating_btuh, cooling_sensible_btuh, latent) = if floors.is_empty() {
            run.notes.push("no zones; building-level infiltration and ducts only".to_string());
            (
                infiltration.heating.sensible_btuh
                    + infiltration.heating.ventilation_sensible_btuh
                    + ducts.heating.sensible_btuh(),
                infiltration.cooling.sensible_btuh
                    + infiltration.cooling.ventilation_sensible_btuh
                    + ducts.cooling.sensible_btuh(),
                infiltration.cooling.latent_btuh + ducts.cooling.latent_btuh,
            )
        } else {
            (
                floors.iter().map(|f| f.heating_btuh()).sum::<f64>(),
                floors.iter().map(|f| f.cooling_sensible_btuh()).sum::<f64>(),
                floors.iter().map(|f| f.cooling_latent_btuh).sum::<f64>(),
            )
        };
        if coupling_discount > 0.0 {
            run.notes.push(format!(
                "{:.1}% inter-floor coupling discount",
                coupling_discount * 100.0
            ));
        }
        run.advance(LoadState::TotalsAggregated);

        let design_heating_btuh = apply_safety_factor(heating_btuh, cfg);
        let design_cooling_btuh = apply_safety_factor(cooling_sensible_btuh + latent, cfg);
        let tonnage = select_tonnage(design_cooling_btuh, cfg);
        if tonnage.is_multi_system() {
            run.notes.push(format!(
                "{} systems of {} tons",
                tonnage.systems, tonnage.tons_per_system
            ));
        }
        run.advance(LoadState::SafetyFactorApplied);

        let area = envelope.conditioned_area_ft2;
        let heating_btuh_per_ft2 = if area > 0.0 { design_heating_btuh / area } else { 0.0 };
        let (lo, hi) = cfg.sanity_band_btuh_per_ft2;
        if area > 0.0 && !(lo..=hi).contains(&heating_btuh_per_ft2) {
            log.warning(
                Stage::Loads,
                "heating_load_out_of_band",
                format!("{heating_btuh_per_ft2:.1} BTU/h·ft² outside {lo}-{hi}"),
            );
        }
        run.advance(LoadState::Done);

        tracing::info!(
            heating = design_heating_btuh,
            cooling = design_cooling_btuh,
            tons = tonnage.nominal_tons,
            per_ft2 = heating_btuh_per_ft2,
            "loads calculated"
        );

        BuildingLoad {
            conditioned_area_ft2: area,
            floors,
            infiltration_heating: infiltration.heating,
            infiltration_cooling: infiltration.cooling,
            ducts_heating: ducts.heating,
            ducts_cooling: ducts.cooling,
            heating_btuh,
            cooling_sensible_btuh,
            cooling_latent_btuh: latent,
            coupling_discount,
            safety_factor: cfg.safety_factor,
            design_heating_btuh,
            design_cooling_btuh,
            heating_btuh_per_ft2,
            tonnage,
            states: run.trace,
            notes: run.notes,
        }
    }
}
