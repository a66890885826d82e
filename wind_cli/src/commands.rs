use std::fs;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use wind_core::cache::{CacheMetrics, ResultCache};
use wind_core::geometry::{decompose, ZoneDecomposition};
use wind_core::policy::EnginePolicy;
use wind_core::pressure::coefficients::{illustrative_roof_table, CoefficientTable};
use wind_core::pressure::zone1_prime::{analyze, Zone1PrimeAnalysis, Zone1PrimeInput};
use wind_core::pressure::{calculate_design, CalculationResult, DesignOutcome};
use wind_core::workflow::{CalculationWorkflow, WorkflowState};
use wind_core::parameters::ExposureCategory;
use wind_core::{CalcError, CalcResult, CalculationRequest};

use crate::cli::{CalculateArgs, Cli, Commands, Zone1PrimeArgs, ZonesArgs};

const RULE: &str = "═══════════════════════════════════════════════════════════════════════";

pub async fn execute(cli: Cli) -> Result<()> {
    let policy = load_policy(&cli)?;
    match &cli.command {
        Commands::Calculate(args) => run_calculate(args, policy, cli.json).await,
        Commands::Zones(args) => run_zones(args, &policy, cli.json),
        Commands::Zone1Prime(args) => run_zone1_prime(args, &policy, cli.json),
    }
}

fn load_policy(cli: &Cli) -> Result<EnginePolicy> {
    let policy = match &cli.policy {
        Some(path) => EnginePolicy::load_from_file(path)
            .with_context(|| format!("loading policy from {}", path.display()))?,
        None => EnginePolicy::default(),
    };
    let policy = policy.with_env_overrides();
    policy.validate().context("validating policy")?;
    Ok(policy)
}

fn load_table(args: &CalculateArgs) -> Result<CoefficientTable> {
    let Some(path) = &args.table else {
        tracing::info!("no coefficient table given; using the illustrative roof table");
        return Ok(illustrative_roof_table());
    };
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let table = CoefficientTable::from_json(&content).with_context(|| format!("parsing {}", path.display()))?;
    table.validate().with_context(|| format!("validating {}", path.display()))?;
    Ok(table)
}

// ============================================================================
// calculate
// ============================================================================

async fn run_calculate(args: &CalculateArgs, policy: EnginePolicy, json: bool) -> Result<()> {
    let request = args.to_request()?;
    let table = Arc::new(load_table(args)?);
    let cache: Arc<ResultCache<DesignOutcome>> = Arc::new(ResultCache::new(policy.cache.clone()));
    cache.bind_context(&table, &policy)?;
    let workflow: CalculationWorkflow<DesignOutcome> = CalculationWorkflow::new(policy.workflow.clone());
    let policy = Arc::new(policy);

    {
        let cache = Arc::clone(&cache);
        workflow.start(request, move |request, progress| {
            let (cache, table, policy) = (Arc::clone(&cache), Arc::clone(&table), Arc::clone(&policy));
            async move {
                progress.update(10, "Checking cache");
                let outcome = compute_design(request, cache, table, policy).await?;
                progress.update(90, "Finalizing");
                Ok(outcome)
            }
        })?;
    }
    workflow.wait().await;

    let outcome = match workflow.state() {
        WorkflowState::Complete { result } => result,
        WorkflowState::Error { message, .. } => bail!("calculation failed: {}", message),
        other => bail!("calculation ended in unexpected state '{}'", other.name()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome {
        DesignOutcome::Single { result } => print_result("WIND PRESSURE RESULTS", result),
        DesignOutcome::GlazingFailure { intact, breached } => {
            print_result("WIND PRESSURE RESULTS - INTACT ENVELOPE", intact);
            println!();
            print_result("WIND PRESSURE RESULTS - GLAZING FAILURE", breached);
        }
    }
    println!();
    print_metrics(&cache.metrics());
    Ok(())
}

/// Cached design run on the blocking pool; the engine is synchronous and CPU-bound.
async fn compute_design(
    request: CalculationRequest,
    cache: Arc<ResultCache<DesignOutcome>>,
    table: Arc<CoefficientTable>,
    policy: Arc<EnginePolicy>,
) -> CalcResult<DesignOutcome> {
    tokio::task::spawn_blocking(move || {
        cache.get_or_compute(&request, || calculate_design(&request, &table, &policy))
    })
    .await
    .map_err(|error| CalcError::calculation_failed("wind_pressure", error.to_string()))?
}

fn print_result(title: &str, result: &CalculationResult) {
    let v = &result.velocity;
    println!("{}", RULE);
    println!("  {}", title);
    println!("{}", RULE);
    println!();
    println!("Velocity Pressure:");
    println!("  Kz  = {:.3}  (z = {:.1} ft)", v.kz, v.evaluated_height_ft);
    println!("  Kzt = {:.2}   Kd = {:.2}   I = {:.2}", v.kzt, v.kd, v.importance_factor);
    println!("  qz  = {:.2} psf", v.qz_psf);
    println!();
    println!(
        "Enclosure: {}   GCpi = +{:.2} / {:.2}",
        result.enclosure, result.internal_pressure.positive, result.internal_pressure.negative
    );
    println!();
    println!(
        "  {:<24} {:<18} {:>9} {:>8} {:>7} {:>9} {:>9} {:>9}  {}",
        "Zone", "Type", "Area", "A_eff", "GCp", "p(+GCpi)", "p(-GCpi)", "Net", "Z1'"
    );
    for zone in &result.zones {
        println!(
            "  {:<24} {:<18} {:>9.1} {:>8.1} {:>7.2} {:>9.2} {:>9.2} {:>9.2}  {}",
            zone.zone_id,
            zone.zone_type.display_name(),
            zone.area_sqft,
            zone.effective_area_sqft,
            zone.gcp,
            zone.pressure_positive_internal_psf,
            zone.pressure_negative_internal_psf,
            zone.net_pressure_psf,
            if zone.zone1_prime_applied { "yes" } else { "" }
        );
    }
    println!();
    println!(
        "  CONTROLLING: {} at {:.2} psf ({})",
        result.controlling_zone_id,
        result.max_pressure_psf,
        result.controlling_load_case.display_name()
    );
    println!("  {}", result.zone1_prime.explanation);

    if !result.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }
    println!("{}", RULE);
}

fn print_metrics(metrics: &CacheMetrics) {
    println!(
        "Cache: {} requests, {} hits, {} misses ({:.1}% hit rate), avg calc {:.2} ms",
        metrics.total_requests, metrics.hits, metrics.misses, metrics.hit_rate, metrics.average_calculation_ms
    );
}

// ============================================================================
// zones
// ============================================================================

fn run_zones(args: &ZonesArgs, policy: &EnginePolicy, json: bool) -> Result<()> {
    let geometry = args.geometry.to_geometry()?;
    let decomposition = decompose(&geometry, policy)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&decomposition)?);
        return Ok(());
    }
    print_zones(&decomposition);
    Ok(())
}

fn print_zones(decomposition: &ZoneDecomposition) {
    println!("{}", RULE);
    println!("  PRESSURE ZONES");
    println!("{}", RULE);
    for sizes in &decomposition.sizes {
        println!("  Corner size: {:.2} ft   Perimeter size: {:.2} ft", sizes.corner, sizes.perimeter);
    }
    println!();
    println!("  {:<24} {:<18} {:>10} {:>8} {:>8}", "Zone", "Type", "Area", "GCp", "Vertices");
    for zone in &decomposition.zones {
        println!(
            "  {:<24} {:<18} {:>10.1} {:>8.2} {:>8}",
            zone.id,
            zone.zone_type.display_name(),
            zone.area,
            zone.base_gcp,
            zone.boundary.vertices.len()
        );
    }
    println!();
    println!(
        "  Total: {:.1} sq ft of {:.1} sq ft footprint ({:.3}% error)",
        decomposition.total_zone_area(),
        decomposition.footprint_area,
        decomposition.partition_error() * 100.0
    );
    for warning in &decomposition.warnings {
        println!("  Warning: {}", warning);
    }
    println!("{}", RULE);
}

// ============================================================================
// zone1-prime
// ============================================================================

fn run_zone1_prime(args: &Zone1PrimeArgs, policy: &EnginePolicy, json: bool) -> Result<()> {
    let geometry = args.geometry.to_geometry()?;
    let (length, width) = geometry.bounding_dimensions();
    let input = Zone1PrimeInput {
        length,
        width,
        height: geometry.height(),
        exposure: ExposureCategory::from_str_flexible(&args.exposure)?,
        effective_wind_area_sqft: args.effective_area,
    };
    let analysis = analyze(&input, &policy.zone1_prime)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }
    print_zone1_prime(&analysis);
    Ok(())
}

fn print_zone1_prime(analysis: &Zone1PrimeAnalysis) {
    println!("{}", RULE);
    println!("  ZONE 1' ANALYSIS");
    println!("{}", RULE);
    println!("  Aspect ratio: {:.2}   Height ratio: {:.2}", analysis.aspect_ratio, analysis.height_ratio);
    println!();
    for trigger in &analysis.triggers {
        println!(
            "  [{}] {:<16} {:>8.2} (threshold {:.2}) - {}",
            if trigger.triggered { "x" } else { " " },
            trigger.kind.display_name(),
            trigger.value,
            trigger.threshold,
            trigger.impact
        );
    }
    println!();
    println!(
        "  RESULT: {} (+{:.0}%, confidence {:.0})",
        if analysis.is_required { "REQUIRED" } else { "NOT REQUIRED" },
        analysis.pressure_increase_percent,
        analysis.confidence
    );
    println!("  {}", analysis.explanation);
    for warning in &analysis.warnings {
        println!("  Warning: {}", warning);
    }
    println!("{}", RULE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use wind_core::geometry::BuildingGeometry;
    use wind_core::parameters::WindParameters;
    use wind_core::policy::CacheConfig;

    #[tokio::test]
    async fn test_design_runs_off_the_async_worker_and_is_cached() {
        let cache: Arc<ResultCache<DesignOutcome>> = Arc::new(ResultCache::new(CacheConfig::default()));
        let table = Arc::new(illustrative_roof_table());
        let policy = Arc::new(EnginePolicy::default());
        cache.bind_context(&table, &policy).unwrap();
        let request = CalculationRequest::new(
            BuildingGeometry::rectangle(100.0, 80.0, 30.0),
            WindParameters::new(120.0, ExposureCategory::C).with_glazing_failure(true),
        );

        let first = compute_design(request.clone(), Arc::clone(&cache), Arc::clone(&table), Arc::clone(&policy))
            .await
            .unwrap();
        let second = compute_design(request, Arc::clone(&cache), table, policy).await.unwrap();

        assert!(matches!(first, DesignOutcome::GlazingFailure { .. }));
        assert_eq!(first, second);
        let metrics = cache.metrics();
        assert_eq!((metrics.hits, metrics.misses), (1, 1));
    }

    #[tokio::test]
    async fn test_design_validation_error_surfaces() {
        let cache: Arc<ResultCache<DesignOutcome>> = Arc::new(ResultCache::new(CacheConfig::default()));
        let request = CalculationRequest::new(
            BuildingGeometry::rectangle(100.0, 80.0, 30.0),
            WindParameters::new(-5.0, ExposureCategory::C),
        );
        let err = compute_design(
            request,
            Arc::clone(&cache),
            Arc::new(illustrative_roof_table()),
            Arc::new(EnginePolicy::default()),
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
        assert!(cache.is_empty());
    }
}
