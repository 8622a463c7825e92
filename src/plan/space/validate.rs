//! Plausibility checks on detected rooms.

use super::{Space, SpaceConfig};
use crate::confidence::{RunLog, Stage};

/// Flags rooms outside their type's plausible size range and drops rooms
/// without a usable area.
///
/// Out-of-range rooms are kept with reduced confidence; the range is widened
/// by `size_tolerance` on both ends before anything is flagged.
pub fn validate_spaces(rooms: Vec<Space>, cfg: &SpaceConfig, log: &mut RunLog) -> Vec<Space> {
    let mut out = Vec::with_capacity(rooms.len());
    for mut room in rooms {
        if !room.area_ft2.is_finite() || room.area_ft2 <= 0.0 {
            log.warning(
                Stage::Spaces,
                "room_without_area",
                format!("{} ({}) dropped: no usable area", room.id, room.name),
            );
            continue;
        }
        if let Some(profile) = cfg.profile(room.room_type) {
            let lo = profile.min_area_ft2 * (1.0 - cfg.size_tolerance);
            let hi = profile.max_area_ft2 * (1.0 + cfg.size_tolerance);
            if !(lo..=hi).contains(&room.area_ft2) {
                room.confidence *= 0.6;
                log.warning(
                    Stage::Spaces,
                    "implausible_room_size",
                    format!(
                        "{} ({}) is {:.0} ft², expected {:.0}-{:.0} ft² for {}",
                        room.id,
                        room.name,
                        room.area_ft2,
                        profile.min_area_ft2,
                        profile.max_area_ft2,
                        room.room_type
                    ),
                );
            }
        }
        out.push(room);
    }
    out
}

/// Building-wide checks once all pages are merged.
pub fn validate_building(rooms: &[Space], log: &mut RunLog) {
    if rooms.is_empty() {
        log.warning(
            Stage::Spaces,
            "no_rooms_detected",
            "no rooms found on any page; zones use whole-floor defaults",
        );
        log.defaulted(Stage::Spaces, "rooms", 0.1, "no rooms detected");
        return;
    }
    let conditioned = rooms.iter().filter(|r| r.room_type.is_conditioned()).count();
    if conditioned == 0 {
        log.warning(
            Stage::Spaces,
            "no_conditioned_rooms",
            "only unconditioned rooms were found",
        );
    }
    let defaulted = rooms
        .iter()
        .filter(|r| !r.has_measured_area())
        .count();
    if defaulted * 2 > rooms.len() {
        log.info(
            Stage::Spaces,
            "room_areas_mostly_typical",
            format!("{defaulted} of {} room areas are typical sizes", rooms.len()),
        );
    }
}
