//! End-to-end scenarios across the engine, cache and workflow.

use std::sync::Arc;

use wind_core::cache::{ManualClock, ResultCache};
use wind_core::geometry::{BuildingGeometry, ZoneType};
use wind_core::parameters::{AsceEdition, CalculationRequest, EnclosureClassification, ExposureCategory, WindParameters};
use wind_core::policy::{CacheConfig, EnginePolicy, WorkflowConfig};
use wind_core::pressure::{calculate, calculate_design, illustrative_roof_table, DesignOutcome};
use wind_core::workflow::{CalculationWorkflow, WorkflowState};
use wind_core::CalculationResult;

fn reference_request() -> CalculationRequest {
    CalculationRequest::new(
        BuildingGeometry::rectangle(100.0, 80.0, 30.0),
        WindParameters::new(120.0, ExposureCategory::C)
            .with_edition(AsceEdition::Asce7_22)
            .with_classification(EnclosureClassification::Enclosed),
    )
}

#[test]
fn test_reference_building_zone_ordering() {
    let result = calculate(&reference_request(), &illustrative_roof_table(), &EnginePolicy::default()).unwrap();

    let corner = result.max_pressure_for(ZoneType::Corner).unwrap();
    let perimeter = result.max_pressure_for(ZoneType::Perimeter).unwrap();
    let field = result.max_pressure_for(ZoneType::Field).unwrap();
    assert!(corner > perimeter, "corner {} <= perimeter {}", corner, perimeter);
    assert!(perimeter > field, "perimeter {} <= field {}", perimeter, field);

    // qz at 30 ft, Exposure C, 120 mph, Kd 0.85
    assert!((result.qz_psf() - 30.78).abs() < 0.05);
    let area: f64 = result.zones.iter().map(|z| z.area_sqft).sum();
    assert!((area - 8000.0).abs() / 8000.0 <= 0.01);

    let json = serde_json::to_string(&result).unwrap();
    let parsed: CalculationResult = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, result);
}

#[test]
fn test_glazing_failure_yields_both_results() {
    let mut request = reference_request();
    request.wind = request.wind.with_glazing_failure(true);

    let outcome = calculate_design(&request, &illustrative_roof_table(), &EnginePolicy::default()).unwrap();
    let DesignOutcome::GlazingFailure { intact, breached } = outcome else {
        panic!("glazing failure should produce both cases");
    };
    assert_eq!(intact.enclosure, EnclosureClassification::Enclosed);
    assert_eq!(breached.enclosure, EnclosureClassification::PartiallyEnclosed);
    assert!((intact.qz_psf() - breached.qz_psf()).abs() < 1e-9);
    assert!(breached.max_pressure_psf > intact.max_pressure_psf);
}

#[test]
fn test_elongated_building_enhancement() {
    let request = CalculationRequest::new(
        BuildingGeometry::rectangle(300.0, 100.0, 30.0),
        WindParameters::new(120.0, ExposureCategory::C),
    );
    let result = calculate(&request, &illustrative_roof_table(), &EnginePolicy::default()).unwrap();
    assert!(result.zone1_prime.is_required);
    assert!(result.zone1_prime.pressure_increase_percent >= 30.0);
    assert!(result.zones.iter().filter(|z| z.zone_type == ZoneType::Corner).all(|z| z.zone1_prime_applied));
}

#[test]
fn test_cache_round_trip_and_expiry() {
    let clock = Arc::new(ManualClock::default());
    let cache: ResultCache = ResultCache::with_clock(CacheConfig::default(), clock.clone());
    let request = reference_request();
    let result = calculate(&request, &illustrative_roof_table(), &EnginePolicy::default()).unwrap();

    cache.set(&request, result.clone(), None).unwrap();
    assert_eq!(cache.get(&request), Some(result));

    clock.advance(chrono::Duration::hours(1));
    assert!(cache.get(&request).is_none());
    assert_eq!(cache.len(), 0);
}

#[tokio::test]
async fn test_workflow_with_cache() {
    let cache: Arc<ResultCache> = Arc::new(ResultCache::new(CacheConfig::default()));
    let workflow: CalculationWorkflow = CalculationWorkflow::new(WorkflowConfig::default());

    for _ in 0..2 {
        let cache = Arc::clone(&cache);
        workflow
            .start(reference_request(), move |request, progress| {
                let cache = Arc::clone(&cache);
                async move {
                    progress.update(25, "Checking cache");
                    cache.get_or_compute(&request, || {
                        calculate(&request, &illustrative_roof_table(), &EnginePolicy::default())
                    })
                }
            })
            .unwrap();
        workflow.wait().await;
        assert!(matches!(workflow.state(), WorkflowState::Complete { .. }));
    }

    let metrics = cache.metrics();
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.misses, 1);
    assert!((metrics.hit_rate - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_workflow_reports_validation_failure_and_retries() {
    let workflow: CalculationWorkflow = CalculationWorkflow::new(WorkflowConfig::default());
    let bad = CalculationRequest::new(
        BuildingGeometry::rectangle(100.0, 0.0, 30.0),
        WindParameters::new(120.0, ExposureCategory::C),
    );

    workflow
        .start(bad.clone(), |request, _| async move {
            calculate(&request, &illustrative_roof_table(), &EnginePolicy::default())
        })
        .unwrap();
    workflow.wait().await;

    match workflow.state() {
        WorkflowState::Error { message, can_retry } => {
            assert!(can_retry);
            assert!(message.contains("width"));
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(workflow.request(), Some(bad));

    workflow.retry().unwrap();
    workflow.wait().await;
    assert!(matches!(workflow.state(), WorkflowState::Error { .. }));
}
