/// Integration tests for plate deduplication and plate/vehicle association
use anyhow::Result;
use plate_reader::common::{ioa, Detection, DetectionClass, RawDetection, Rect};
use plate_reader::engine::resolver::{remove_duplicate_plates, repair_conflicts};
use plate_reader::engine::{DetectionResolver, ResolverConfig};
use std::collections::BTreeSet;

fn rect(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Rect> {
    Rect::new(x1, y1, x2, y2)
}

fn detection(class_id: u32, xyxy: [f32; 4]) -> Result<Detection> {
    Detection::try_from(&RawDetection {
        class_id,
        confidence: 0.8,
        xyxy,
    })
}

#[test]
fn test_duplicate_plates_keep_larger_box() -> Result<()> {
    let larger = rect(0, 0, 100, 40)?;
    let smaller = rect(5, 5, 90, 35)?;
    assert_eq!(larger.area(), 4000);
    assert_eq!(smaller.area(), 2550);

    let resolver = DetectionResolver::new(ResolverConfig::default())?;
    for detections in [
        vec![Detection::plate(larger, 0.6), Detection::plate(smaller, 0.9)],
        vec![Detection::plate(smaller, 0.9), Detection::plate(larger, 0.6)],
    ] {
        let resolution = resolver.resolve(&detections);
        assert_eq!(resolution.unassigned.len(), 1);
        assert_eq!(resolution.unassigned[0].bbox, larger);
        assert_eq!(resolution.duplicates_removed, 1);
    }
    Ok(())
}

#[test]
fn test_raw_detections_are_classified_and_assigned() -> Result<()> {
    let vehicle = detection(0, [0.0, 0.0, 200.9, 150.2])?;
    let plate = detection(3, [60.0, 100.0, 160.0, 140.0])?;
    assert_eq!(vehicle.class, DetectionClass::Vehicle);
    assert_eq!(plate.class, DetectionClass::Plate);
    assert_eq!(ioa(&vehicle.bbox, &plate.bbox), 1.0);

    let resolver = DetectionResolver::new(ResolverConfig::default())?;
    let resolution = resolver.resolve(&[plate, vehicle]);

    assert_eq!(resolution.vehicles.len(), 1);
    assert_eq!(resolution.vehicles[0].vehicle, vehicle);
    assert_eq!(resolution.vehicles[0].plates, vec![plate]);
    assert!(resolution.unassigned.is_empty());
    Ok(())
}

#[test]
fn test_threshold_is_configurable() -> Result<()> {
    let vehicle = Detection::vehicle(rect(0, 0, 200, 150)?, 0.9);
    let straddling = Detection::plate(rect(150, 100, 250, 140)?, 0.9);

    let strict = DetectionResolver::new(ResolverConfig::default())?;
    assert_eq!(strict.resolve(&[vehicle, straddling]).unassigned.len(), 1);

    let lenient = DetectionResolver::new(ResolverConfig {
        plate_vehicle_ioa_threshold: 0.5,
    })?;
    let resolution = lenient.resolve(&[vehicle, straddling]);
    assert_eq!(resolution.vehicles[0].plates.len(), 1);
    assert!(resolution.unassigned.is_empty());
    Ok(())
}

#[test]
fn test_every_surviving_plate_appears_exactly_once() -> Result<()> {
    let detections = vec![
        Detection::vehicle(rect(0, 0, 300, 200)?, 0.9),
        Detection::vehicle(rect(250, 0, 600, 220)?, 0.9),
        Detection::vehicle(rect(20, 20, 280, 190)?, 0.9),
        Detection::plate(rect(100, 150, 180, 175)?, 0.7),
        Detection::plate(rect(105, 152, 175, 172)?, 0.9),
        Detection::plate(rect(400, 170, 480, 195)?, 0.7),
        Detection::plate(rect(270, 100, 310, 115)?, 0.7),
        Detection::plate(rect(900, 900, 950, 920)?, 0.7),
    ];
    let resolver = DetectionResolver::new(ResolverConfig::default())?;
    let resolution = resolver.resolve(&detections);

    let mut seen: Vec<Rect> = Vec::new();
    for (_, plates) in resolution.entries() {
        for plate in plates {
            assert!(!seen.contains(&plate.bbox));
            seen.push(plate.bbox);
        }
    }

    let plate_boxes: Vec<Rect> = detections
        .iter()
        .filter(|d| d.is_plate())
        .map(|d| d.bbox)
        .collect();
    let survivors = remove_duplicate_plates(&plate_boxes);
    assert_eq!(seen.len(), survivors.len());
    assert_eq!(resolution.duplicates_removed, plate_boxes.len() - survivors.len());
    Ok(())
}

#[test]
fn test_conflict_repair_reaches_fixed_point() {
    let mut claims: Vec<BTreeSet<usize>> = vec![
        [2].into_iter().collect(),
        [0, 1, 2].into_iter().collect(),
        [1, 3].into_iter().collect(),
        [0].into_iter().collect(),
    ];
    repair_conflicts(&mut claims);
    let after_first = claims.clone();
    repair_conflicts(&mut claims);

    assert_eq!(claims, after_first);
    assert_eq!(claims[1], [1].into_iter().collect());
    assert_eq!(claims[2], [3].into_iter().collect());
}
