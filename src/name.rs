//! Name-based ordering for rooms and zones in reports and messages.

/// Types that expose a display name.
pub trait HasName {
    fn get_name(&self) -> &str;
}

impl<T: HasName + ?Sized> HasName for &T {
    fn get_name(&self) -> &str {
        (*self).get_name()
    }
}

impl<T: HasName + ?Sized> HasName for Box<T> {
    fn get_name(&self) -> &str {
        (**self).get_name()
    }
}

pub trait SortByName {
    /// Stable sort by name, case-insensitive, original case breaking ties.
    fn sort_by_name(&mut self);
}

impl<T: HasName> SortByName for [T] {
    fn sort_by_name(&mut self) {
        self.sort_by(|a, b| {
            let (x, y) = (a.get_name(), b.get_name());
            x.to_lowercase().cmp(&y.to_lowercase()).then_with(|| x.cmp(y))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::energy::ThermalZone;
    use std::collections::BTreeMap;

    fn zone(level: i32, name: &str) -> ThermalZone {
        ThermalZone {
            id: format!("zone-L{level}"),
            name: name.to_string(),
            floor_level: level,
            space_ids: vec![],
            conditioned_area_ft2: 1000.0,
            ceiling_height_ft: 8.0,
            wall_indices: vec![],
            exposed_perimeter_ft: 0.0,
            floor_boundaries: BTreeMap::new(),
            ceiling_boundaries: BTreeMap::new(),
            bedrooms: 0,
            has_kitchen: false,
            occupants: 2.0,
        }
    }

    #[test]
    fn test_sort_is_case_insensitive() {
        let mut zones = vec![zone(2, "upper"), zone(0, "Basement"), zone(1, "Main")];
        zones.as_mut_slice().sort_by_name();
        let names: Vec<&str> = zones.iter().map(|z| z.get_name()).collect();
        assert_eq!(names, vec!["Basement", "Main", "upper"]);
    }

    #[test]
    fn test_sort_through_references() {
        let a = zone(1, "Floor 2");
        let b = zone(2, "Floor 1");
        let mut refs: Vec<&ThermalZone> = vec![&a, &b];
        refs.sort_by_name();
        assert_eq!(refs[0].floor_level, 2);
        let boxed: Box<ThermalZone> = Box::new(zone(3, "Attic room"));
        assert_eq!(boxed.get_name(), "Attic room");
    }
}
