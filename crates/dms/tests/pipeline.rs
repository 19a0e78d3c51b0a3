//! End-to-end DMS behaviour on synthetic frames with scripted detectors

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dms::{
    DmsAnalysis, DmsConfig, DmsError, DmsEvent, DmsModule, EyeVerdict, Region, RegionExtractor,
};
use image::{GrayImage, Luma};

const FRAME_W: u32 = 320;
const FRAME_H: u32 = 240;
const SKIN: u8 = 230;
const PUPIL: u8 = 10;

const FACE: Region = Region::new(60, 40, 200, 200);
/// Eye boxes relative to the upper half of `FACE`
const EYES_IN_FACE: [Region; 2] = [Region::new(30, 30, 60, 40), Region::new(110, 30, 60, 40)];

fn extractor(eye_count: usize) -> RegionExtractor {
    let face = |_: &GrayImage| -> Result<Vec<Region>, DmsError> { Ok(vec![FACE]) };
    let eyes = move |_: &GrayImage| -> Result<Vec<Region>, DmsError> {
        Ok(EYES_IN_FACE.iter().copied().take(eye_count).collect())
    };
    RegionExtractor::new(Box::new(face), Box::new(eyes))
}

fn module(eye_count: usize) -> DmsModule {
    DmsModule::new(DmsConfig::default(), extractor(eye_count)).unwrap()
}

/// Frame with both eyes drawn open (dark pupils) or closed (plain skin)
fn frame(open: bool) -> GrayImage {
    let mut img = GrayImage::from_pixel(FRAME_W, FRAME_H, Luma([SKIN]));
    if open {
        for eye in EYES_IN_FACE {
            let cx = (FACE.x + eye.x + eye.width / 2) as i64;
            let cy = (FACE.y + eye.y + eye.height / 2) as i64;
            for y in (cy - 10)..=(cy + 10) {
                for x in (cx - 10)..=(cx + 10) {
                    if (x - cx).pow(2) + (y - cy).pow(2) <= 100 {
                        img.put_pixel(x as u32, y as u32, Luma([PUPIL]));
                    }
                }
            }
        }
    }
    img
}

fn at(secs: f64) -> Duration {
    Duration::from_secs_f64(secs)
}

fn run(dms: &mut DmsModule, script: &[(bool, f64)]) -> Vec<DmsAnalysis> {
    let (open, closed) = (frame(true), frame(false));
    script
        .iter()
        .map(|&(is_open, t)| {
            let img = if is_open { &open } else { &closed };
            dms.analyze(img, at(t)).unwrap()
        })
        .collect()
}

#[test]
fn open_eyes_are_classified_open() {
    let mut dms = module(2);
    let analysis = dms.analyze(&frame(true), at(0.0)).unwrap();

    assert!(analysis.face_detected);
    assert_eq!(analysis.face_bbox, Some(FACE));
    assert_eq!(analysis.eyes.len(), 2);
    assert!(analysis.eyes.iter().all(|e| e.verdict == EyeVerdict::Open));
    assert_eq!(analysis.eyes[0].region, Region::new(90, 70, 60, 40));
    assert!(!analysis.both_eyes_closed);
    assert_eq!(analysis.blink_count, 0);
}

#[test]
fn closed_eyes_count_one_blink_per_run() {
    let mut dms = module(2);
    // closed, closed, closed, open, closed
    let results = run(
        &mut dms,
        &[(false, 0.0), (false, 0.1), (false, 0.2), (true, 0.3), (false, 0.4)],
    );

    assert!(results[0].both_eyes_closed);
    assert_eq!(results[0].events, vec![DmsEvent::Blink { count: 1 }]);
    assert!(results[1].events.is_empty());
    assert!(!results[3].eyes_closed);
    assert_eq!(results[4].events, vec![DmsEvent::Blink { count: 2 }]);
    assert_eq!(dms.state().blink_count(), 2);
}

#[test]
fn sustained_closure_raises_then_clears_alert() {
    let mut dms = module(2);
    let results = run(
        &mut dms,
        &[(false, 0.0), (false, 3.9), (false, 4.1), (false, 4.15), (true, 4.2)],
    );

    assert!(!results[1].alert_active);
    assert!(results[2].alert_active);
    assert!(results[2].alert_raised());
    assert!(!results[3].alert_raised(), "alert must be reported once");
    assert!(results[3].alert_active);

    let cleared = &results[4];
    assert!(!cleared.alert_active);
    assert!(!cleared.eyes_closed);
    assert_eq!(
        cleared.events,
        vec![DmsEvent::DrowsinessAlertCleared { closed_for_ms: 4200 }]
    );
    assert_eq!(dms.state().blink_count(), 1);
}

#[test]
fn single_eye_never_counts_as_closed() {
    let mut dms = module(1);
    let script: Vec<(bool, f64)> = (0..10).map(|i| (false, i as f64)).collect();
    let results = run(&mut dms, &script);

    assert!(results.iter().all(|a| a.is_inconclusive() && !a.both_eyes_closed));
    assert_eq!(dms.state().blink_count(), 0);
    assert!(!dms.state().alert_active());
}

#[test]
fn losing_an_eye_mid_closure_clears_alert() {
    let visible = Arc::new(AtomicUsize::new(2));
    let face = |_: &GrayImage| -> Result<Vec<Region>, DmsError> { Ok(vec![FACE]) };
    let eyes = {
        let visible = Arc::clone(&visible);
        move |_: &GrayImage| -> Result<Vec<Region>, DmsError> {
            let n = visible.load(Ordering::SeqCst);
            Ok(EYES_IN_FACE.iter().copied().take(n).collect())
        }
    };
    let mut dms =
        DmsModule::new(DmsConfig::default(), RegionExtractor::new(Box::new(face), Box::new(eyes)))
            .unwrap();

    run(&mut dms, &[(false, 0.0), (false, 5.0)]);
    assert!(dms.state().alert_active());

    visible.store(1, Ordering::SeqCst);
    let analysis = dms.analyze(&frame(false), at(5.1)).unwrap();
    assert!(analysis.is_inconclusive());
    assert!(analysis.alert_cleared());
    assert!(!analysis.eyes_closed);
    assert_eq!(dms.state().blink_count(), 1);
}

#[test]
fn no_face_is_inconclusive() {
    let face = |_: &GrayImage| -> Result<Vec<Region>, DmsError> { Ok(vec![]) };
    let eyes = |_: &GrayImage| -> Result<Vec<Region>, DmsError> { Ok(vec![]) };
    let mut dms =
        DmsModule::new(DmsConfig::default(), RegionExtractor::new(Box::new(face), Box::new(eyes)))
            .unwrap();

    let analysis = dms.analyze(&frame(false), at(0.0)).unwrap();
    assert!(!analysis.face_detected);
    assert_eq!(analysis.face_bbox, None);
    assert!(analysis.eyes.is_empty());
    assert!(!analysis.eyes_closed);
}

fn module_with_eyes(eyes: Vec<Region>) -> DmsModule {
    let face = |_: &GrayImage| -> Result<Vec<Region>, DmsError> { Ok(vec![FACE]) };
    let eyes = move |_: &GrayImage| -> Result<Vec<Region>, DmsError> { Ok(eyes.clone()) };
    DmsModule::new(DmsConfig::default(), RegionExtractor::new(Box::new(face), Box::new(eyes)))
        .unwrap()
}

#[test]
fn degenerate_eye_regions_fail_safe_to_open() {
    let mut dms = module_with_eyes(vec![Region::new(30, 30, 0, 40), Region::new(110, 30, 60, 40)]);

    let analysis = dms.analyze(&frame(false), at(0.0)).unwrap();
    assert_eq!(analysis.eyes.len(), 2);
    assert_eq!(analysis.eyes[0].verdict, EyeVerdict::Open);
    assert_eq!(analysis.eyes[1].verdict, EyeVerdict::Closed);
    assert!(!analysis.both_eyes_closed);
    assert_eq!(analysis.blink_count, 0);
}

#[test]
fn malformed_extra_eye_blocks_blink_from_closed_pair() {
    let mut eyes = EYES_IN_FACE.to_vec();
    eyes.push(Region::new(10, 10, 0, 5));
    let mut dms = module_with_eyes(eyes);

    let results = run(&mut dms, &[(false, 0.0), (false, 5.0)]);
    for analysis in &results {
        assert_eq!(analysis.eyes.len(), 3);
        assert_eq!(analysis.eyes[2].verdict, EyeVerdict::Open);
        assert!(!analysis.both_eyes_closed);
        assert!(analysis.events.is_empty());
    }
    assert_eq!(dms.state().blink_count(), 0);
    assert!(!dms.state().alert_active());
}

#[test]
fn eye_outside_face_search_area_is_open() {
    // Below the face's upper half but still inside the frame
    let mut eyes = EYES_IN_FACE.to_vec();
    eyes.push(Region::new(30, 150, 60, 40));
    let mut dms = module_with_eyes(eyes);

    let analysis = dms.analyze(&frame(false), at(0.0)).unwrap();
    assert_eq!(analysis.eyes[2].region, Region::new(90, 190, 60, 40));
    assert_eq!(analysis.eyes[2].verdict, EyeVerdict::Open);
    assert!(!analysis.both_eyes_closed);
    assert_eq!(analysis.blink_count, 0);
}

#[test]
fn reset_discards_session() {
    let mut dms = module(2);
    run(&mut dms, &[(false, 0.0), (false, 5.0)]);
    dms.reset_state();
    assert_eq!(dms.state().blink_count(), 0);
    assert!(!dms.state().eyes_closed());
}

#[test]
fn invalid_config_rejected_at_construction() {
    let config = DmsConfig {
        alert_threshold_secs: -4.0,
        ..Default::default()
    };
    assert!(matches!(
        DmsModule::new(config, extractor(2)),
        Err(DmsError::Config(_))
    ));
}
