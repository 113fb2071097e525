/// Detection resolver: plate deduplication and plate → vehicle association
///
/// Turns one detector pass (vehicles and plates mixed) into an ordered list of
/// vehicles with the plates they own, plus a trailing bucket of plates no
/// vehicle claimed.
use anyhow::Result;
use common::geometry::{ioa, Rect};
use common::validation;
use common::Detection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum share of a plate's area that must lie inside a vehicle box
    /// for the plate to be assigned to that vehicle (0.0 to 1.0)
    #[serde(default = "default_plate_vehicle_ioa")]
    pub plate_vehicle_ioa_threshold: f32,
}

fn default_plate_vehicle_ioa() -> f32 {
    0.85
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            plate_vehicle_ioa_threshold: default_plate_vehicle_ioa(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        validation::validate_unit_interval(
            self.plate_vehicle_ioa_threshold,
            "plate_vehicle_ioa_threshold",
        )
    }
}

#[derive(Debug, Clone)]
struct PlateCandidate {
    detection: Detection,
    area: i64,
    assigned_to_vehicle: bool,
}

#[derive(Debug, Clone)]
struct VehicleCandidate {
    detection: Detection,
    plates: BTreeSet<usize>,
}

/// A vehicle with the plates resolved to it, in plate detection order
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleAssignment {
    pub vehicle: Detection,
    pub plates: Vec<Detection>,
}

/// Outcome of one resolution pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    /// One entry per vehicle, in vehicle detection order
    pub vehicles: Vec<VehicleAssignment>,

    /// Surviving plates never matched to a vehicle, in detection order
    pub unassigned: Vec<Detection>,

    /// Plate detections discarded as overlapping duplicates
    pub duplicates_removed: usize,
}

impl Resolution {
    /// Vehicle entries followed by the trailing `(None, unassigned)` entry
    pub fn entries(&self) -> impl Iterator<Item = (Option<&Detection>, &[Detection])> + '_ {
        self.vehicles
            .iter()
            .map(|assignment| (Some(&assignment.vehicle), assignment.plates.as_slice()))
            .chain(std::iter::once((None, self.unassigned.as_slice())))
    }

    /// Number of plates across all vehicles and the unassigned bucket
    pub fn plate_count(&self) -> usize {
        self.vehicles.iter().map(|v| v.plates.len()).sum::<usize>() + self.unassigned.len()
    }
}

/// Resolves raw detector output into vehicle/plate ownership
#[derive(Debug, Clone)]
pub struct DetectionResolver {
    config: ResolverConfig,
}

impl DetectionResolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve(&self, detections: &[Detection]) -> Resolution {
        let vehicle_detections: Vec<Detection> =
            detections.iter().filter(|d| d.is_vehicle()).copied().collect();
        let plate_detections: Vec<Detection> =
            detections.iter().filter(|d| d.is_plate()).copied().collect();

        let plate_boxes: Vec<Rect> = plate_detections.iter().map(|d| d.bbox).collect();
        let survivors = remove_duplicate_plates(&plate_boxes);
        let duplicates_removed = plate_detections.len() - survivors.len();

        let mut plates: Vec<PlateCandidate> = survivors
            .into_iter()
            .map(|idx| {
                let detection = plate_detections[idx];
                PlateCandidate {
                    area: detection.bbox.area(),
                    detection,
                    assigned_to_vehicle: false,
                }
            })
            .collect();

        let threshold = self.config.plate_vehicle_ioa_threshold;
        let mut vehicles: Vec<VehicleCandidate> = vehicle_detections
            .into_iter()
            .map(|detection| {
                let mut claimed = BTreeSet::new();
                for (idx, plate) in plates.iter_mut().enumerate() {
                    if plate.area > 0 && ioa(&detection.bbox, &plate.detection.bbox) >= threshold {
                        claimed.insert(idx);
                        plate.assigned_to_vehicle = true;
                    }
                }
                VehicleCandidate {
                    detection,
                    plates: claimed,
                }
            })
            .collect();

        let mut claims: Vec<BTreeSet<usize>> =
            vehicles.iter_mut().map(|v| std::mem::take(&mut v.plates)).collect();
        let repaired = repair_conflicts(&mut claims);
        let released = self.enforce_exclusive_claims(&vehicles, &plates, &mut claims);
        for (vehicle, claimed) in vehicles.iter_mut().zip(claims) {
            vehicle.plates = claimed;
        }

        let resolution = Resolution {
            vehicles: vehicles
                .iter()
                .map(|vehicle| VehicleAssignment {
                    vehicle: vehicle.detection,
                    plates: vehicle
                        .plates
                        .iter()
                        .map(|&idx| plates[idx].detection)
                        .collect(),
                })
                .collect(),
            unassigned: plates
                .iter()
                .filter(|plate| !plate.assigned_to_vehicle)
                .map(|plate| plate.detection)
                .collect(),
            duplicates_removed,
        };

        let assigned = resolution.plate_count() - resolution.unassigned.len();
        tracing::debug!(
            vehicles = resolution.vehicles.len(),
            plates = plate_detections.len(),
            duplicates = duplicates_removed,
            assigned,
            unassigned = resolution.unassigned.len(),
            repaired,
            released,
            "resolved detections"
        );

        let outcomes = &telemetry::metrics::RESOLVER_PLATES;
        outcomes
            .with_label_values(&["duplicate"])
            .inc_by(duplicates_removed as u64);
        outcomes.with_label_values(&["assigned"]).inc_by(assigned as u64);
        outcomes
            .with_label_values(&["unassigned"])
            .inc_by(resolution.unassigned.len() as u64);
        telemetry::metrics::RESOLVER_CONFLICTS_REPAIRED.inc_by((repaired + released) as u64);

        resolution
    }

    /// Leave every plate with at most one vehicle after conflict repair.
    ///
    /// Repair only resolves plates that are some vehicle's sole plate; a plate
    /// still claimed by several vehicles goes to the one covering the largest
    /// share of it, then to the smallest vehicle box, then to the earliest
    /// detection. Returns the number of claims released.
    fn enforce_exclusive_claims(
        &self,
        vehicles: &[VehicleCandidate],
        plates: &[PlateCandidate],
        claims: &mut [BTreeSet<usize>],
    ) -> usize {
        let mut released = 0;

        for (plate_idx, plate) in plates.iter().enumerate() {
            let claimants: Vec<usize> = claims
                .iter()
                .enumerate()
                .filter(|(_, claimed)| claimed.contains(&plate_idx))
                .map(|(vehicle_idx, _)| vehicle_idx)
                .collect();

            if claimants.len() < 2 {
                continue;
            }

            let owner = claimants
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    let ioa_a = ioa(&vehicles[a].detection.bbox, &plate.detection.bbox);
                    let ioa_b = ioa(&vehicles[b].detection.bbox, &plate.detection.bbox);
                    ioa_a
                        .partial_cmp(&ioa_b)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| {
                            vehicles[b]
                                .detection
                                .bbox
                                .area()
                                .cmp(&vehicles[a].detection.bbox.area())
                        })
                        .then_with(|| b.cmp(&a))
                })
                .unwrap_or(claimants[0]);

            for vehicle_idx in claimants.into_iter().filter(|&idx| idx != owner) {
                claims[vehicle_idx].remove(&plate_idx);
                released += 1;
            }

            tracing::debug!(plate = plate_idx, vehicle = owner, "plate claimed by several vehicles");
        }

        released
    }
}

/// Order-independent duplicate plate removal.
///
/// Candidates are visited from largest to smallest area (detection order
/// breaks ties) and a candidate is kept only if it does not overlap any
/// candidate already kept. Returns the surviving indices in input order.
pub fn remove_duplicate_plates(plates: &[Rect]) -> Vec<usize> {
    let mut by_area: Vec<usize> = (0..plates.len()).collect();
    by_area.sort_by(|&a, &b| plates[b].area().cmp(&plates[a].area()).then(a.cmp(&b)));

    let mut kept: Vec<usize> = Vec::new();
    for idx in by_area {
        if kept.iter().all(|&k| !plates[k].overlaps(&plates[idx])) {
            kept.push(idx);
        }
    }

    kept.sort_unstable();
    kept
}

/// Conflict repair between vehicles claiming the same plates.
///
/// A vehicle with exactly one plate is singular, one with several is
/// multiple. Each singular vehicle's plate is removed from every multiple
/// vehicle; a multiple vehicle left with one plate becomes singular and is
/// processed in turn. Returns the number of claims removed.
pub fn repair_conflicts(claims: &mut [BTreeSet<usize>]) -> usize {
    let mut singular: Vec<usize> = (0..claims.len()).filter(|&v| claims[v].len() == 1).collect();
    let mut multiple: Vec<usize> = (0..claims.len()).filter(|&v| claims[v].len() > 1).collect();
    let mut removed = 0;

    while !multiple.is_empty() {
        let Some(vehicle) = singular.pop() else {
            break;
        };
        let Some(&plate) = claims[vehicle].iter().next() else {
            continue;
        };

        let mut promoted = Vec::new();
        multiple.retain(|&other| {
            if claims[other].remove(&plate) {
                removed += 1;
            }
            if claims[other].len() == 1 {
                promoted.push(other);
                false
            } else {
                true
            }
        });
        singular.extend(promoted);
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x1: i32, y1: i32, x2: i32, y2: i32) -> Rect {
        Rect::new(x1, y1, x2, y2).unwrap()
    }

    fn vehicle(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::vehicle(rect(x1, y1, x2, y2), 0.9)
    }

    fn plate(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::plate(rect(x1, y1, x2, y2), 0.8)
    }

    fn resolver() -> DetectionResolver {
        DetectionResolver::new(ResolverConfig::default()).unwrap()
    }

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_config_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.plate_vehicle_ioa_threshold, 0.85);
        assert!(DetectionResolver::new(ResolverConfig {
            plate_vehicle_ioa_threshold: 1.2
        })
        .is_err());
    }

    #[test]
    fn test_disjoint_plates_are_all_kept() {
        let plates = vec![rect(0, 0, 50, 20), rect(60, 0, 110, 20), rect(0, 30, 50, 50)];
        assert_eq!(remove_duplicate_plates(&plates), vec![0, 1, 2]);
    }

    #[test]
    fn test_overlapping_plates_keep_larger_in_any_order() {
        let large = rect(0, 0, 100, 40);
        let small = rect(5, 5, 90, 35);

        assert_eq!(remove_duplicate_plates(&[large, small]), vec![0]);
        assert_eq!(remove_duplicate_plates(&[small, large]), vec![1]);
    }

    #[test]
    fn test_overlap_cluster_is_order_independent() {
        // a overlaps b, b overlaps c, a and c are disjoint
        let a = rect(0, 0, 100, 40);
        let b = rect(90, 0, 170, 40);
        let c = rect(160, 0, 220, 40);

        for order in [[a, b, c], [c, b, a], [b, a, c], [b, c, a]] {
            let kept: Vec<Rect> = remove_duplicate_plates(&order)
                .into_iter()
                .map(|idx| order[idx])
                .collect();
            assert_eq!(kept.len(), 2);
            assert!(kept.contains(&a));
            assert!(kept.contains(&c));
        }
    }

    #[test]
    fn test_scenario_duplicate_plate_keeps_larger() {
        let resolution = resolver().resolve(&[plate(0, 0, 100, 40), plate(5, 5, 90, 35)]);

        assert_eq!(resolution.duplicates_removed, 1);
        assert!(resolution.vehicles.is_empty());
        assert_eq!(resolution.unassigned, vec![plate(0, 0, 100, 40)]);
    }

    #[test]
    fn test_scenario_plate_inside_vehicle_is_assigned() {
        let resolution = resolver().resolve(&[vehicle(0, 0, 200, 150), plate(60, 100, 160, 140)]);

        assert_eq!(resolution.vehicles.len(), 1);
        assert_eq!(resolution.vehicles[0].plates, vec![plate(60, 100, 160, 140)]);
        assert!(resolution.unassigned.is_empty());
    }

    #[test]
    fn test_plate_below_threshold_is_unassigned() {
        // Only half of the plate lies inside the vehicle box
        let resolution = resolver().resolve(&[vehicle(0, 0, 200, 150), plate(150, 100, 250, 140)]);

        assert!(resolution.vehicles[0].plates.is_empty());
        assert_eq!(resolution.unassigned, vec![plate(150, 100, 250, 140)]);
    }

    #[test]
    fn test_empty_input_yields_trailing_entry_only() {
        let resolution = resolver().resolve(&[]);
        let entries: Vec<_> = resolution.entries().collect();

        assert_eq!(entries.len(), 1);
        assert!(entries[0].0.is_none());
        assert!(entries[0].1.is_empty());
    }

    #[test]
    fn test_entries_preserve_detection_order() {
        let detections = [
            plate(500, 500, 560, 520),
            vehicle(0, 0, 200, 150),
            vehicle(300, 0, 500, 150),
            plate(320, 100, 400, 130),
            plate(20, 100, 100, 130),
        ];
        let resolution = resolver().resolve(&detections);
        let entries: Vec<_> = resolution.entries().collect();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, Some(&detections[1]));
        assert_eq!(entries[0].1, &[detections[4]]);
        assert_eq!(entries[1].0, Some(&detections[2]));
        assert_eq!(entries[1].1, &[detections[3]]);
        assert_eq!(entries[2].0, None);
        assert_eq!(entries[2].1, &[detections[0]]);
    }

    #[test]
    fn test_repair_removes_singular_plate_from_multiple_vehicle() {
        let mut claims = vec![set(&[0]), set(&[0, 1])];
        let removed = repair_conflicts(&mut claims);

        assert_eq!(removed, 1);
        assert_eq!(claims, vec![set(&[0]), set(&[1])]);
    }

    #[test]
    fn test_repair_cascades_through_promoted_vehicles() {
        // Vehicle 1 becomes singular after losing plate 0, which then frees
        // vehicle 2 of plate 1.
        let mut claims = vec![set(&[0]), set(&[0, 1]), set(&[1, 2])];
        repair_conflicts(&mut claims);

        assert_eq!(claims, vec![set(&[0]), set(&[1]), set(&[2])]);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut claims = vec![set(&[0]), set(&[0, 1, 2]), set(&[3, 4]), set(&[]), set(&[2])];
        repair_conflicts(&mut claims);
        let once = claims.clone();

        assert_eq!(repair_conflicts(&mut claims), 0);
        assert_eq!(claims, once);
    }

    #[test]
    fn test_nested_vehicles_share_plate_resolved_to_one_owner() {
        // A car box inside a larger truck box; both fully contain the plate
        let detections = [
            vehicle(0, 0, 400, 300),
            vehicle(50, 50, 250, 250),
            plate(100, 200, 180, 230),
        ];
        let resolution = resolver().resolve(&detections);

        assert!(resolution.vehicles[0].plates.is_empty());
        assert_eq!(resolution.vehicles[1].plates, vec![detections[2]]);
        assert!(resolution.unassigned.is_empty());
    }

    #[test]
    fn test_no_plate_is_owned_twice_and_all_meet_threshold() {
        let detections = [
            vehicle(0, 0, 300, 200),
            vehicle(100, 0, 400, 200),
            vehicle(0, 0, 400, 200),
            plate(120, 150, 180, 170),
            plate(20, 150, 80, 170),
            plate(320, 150, 380, 170),
            plate(600, 10, 650, 30),
        ];
        let resolver = resolver();
        let resolution = resolver.resolve(&detections);

        let mut seen = Vec::new();
        for assignment in &resolution.vehicles {
            for p in &assignment.plates {
                assert!(ioa(&assignment.vehicle.bbox, &p.bbox) >= 0.85);
                assert!(!seen.contains(&p.bbox), "plate {:?} assigned twice", p.bbox);
                seen.push(p.bbox);
            }
        }
        for p in &resolution.unassigned {
            assert!(!seen.contains(&p.bbox));
        }
        assert_eq!(resolution.plate_count(), 4);
    }
}
