use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use wind_core::geometry::BuildingGeometry;
use wind_core::parameters::{
    AsceEdition, CalculationRequest, EnclosureClassification, ExposureCategory, RiskCategory, SiteLocation,
    WindParameters,
};

/// Windcalc - ASCE 7 low-rise wind pressure calculator
#[derive(Parser, Debug)]
#[command(name = "windcalc")]
#[command(about = "ASCE 7 low-rise wind pressure calculator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Policy TOML file overriding the default constants
    #[arg(long, global = true)]
    pub policy: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calculate zone design pressures
    Calculate(CalculateArgs),

    /// Show the pressure zone decomposition of a footprint
    Zones(ZonesArgs),

    /// Run the Zone 1' elongated-building analysis
    Zone1Prime(Zone1PrimeArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shape {
    Rectangle,
    LShape,
}

#[derive(Args, Debug)]
pub struct GeometryArgs {
    /// Footprint shape
    #[arg(long, value_enum, default_value = "rectangle")]
    pub shape: Shape,

    /// Rectangle length (ft)
    #[arg(long)]
    pub length: Option<f64>,

    /// Rectangle width (ft)
    #[arg(long)]
    pub width: Option<f64>,

    /// L-shape leg 1 length (ft)
    #[arg(long)]
    pub length1: Option<f64>,

    /// L-shape leg 1 width (ft)
    #[arg(long)]
    pub width1: Option<f64>,

    /// L-shape leg 2 length (ft)
    #[arg(long)]
    pub length2: Option<f64>,

    /// L-shape leg 2 width (ft)
    #[arg(long)]
    pub width2: Option<f64>,

    /// Mean roof height (ft)
    #[arg(long)]
    pub height: f64,
}

impl GeometryArgs {
    pub fn to_geometry(&self) -> Result<BuildingGeometry> {
        let geometry = match self.shape {
            Shape::Rectangle => BuildingGeometry::rectangle(
                required(self.length, "--length")?,
                required(self.width, "--width")?,
                self.height,
            ),
            Shape::LShape => BuildingGeometry::l_shape(
                required(self.length1, "--length1")?,
                required(self.width1, "--width1")?,
                required(self.length2, "--length2")?,
                required(self.width2, "--width2")?,
                self.height,
            ),
        };
        geometry.validate()?;
        Ok(geometry)
    }
}

fn required(value: Option<f64>, flag: &str) -> Result<f64> {
    match value {
        Some(v) => Ok(v),
        None => bail!("{} is required for this shape", flag),
    }
}

#[derive(Args, Debug)]
pub struct WindArgs {
    /// Basic wind speed (mph)
    #[arg(long)]
    pub speed: f64,

    /// Exposure category (B, C or D)
    #[arg(long, default_value = "C")]
    pub exposure: String,

    /// ASCE 7 edition (7-10, 7-16, 7-22)
    #[arg(long, default_value = "7-22")]
    pub edition: String,

    /// Risk category (I-IV)
    #[arg(long, default_value = "II")]
    pub risk: String,

    /// Enclosure classification (enclosed, partially_enclosed, open)
    #[arg(long, default_value = "enclosed")]
    pub enclosure: String,

    /// Topographic factor Kzt
    #[arg(long, default_value_t = 1.0)]
    pub kzt: f64,

    /// Directionality factor Kd
    #[arg(long, default_value_t = 0.85)]
    pub kd: f64,

    /// Ignore internal pressure (GCpi = 0)
    #[arg(long)]
    pub no_internal_pressure: bool,

    /// Also compute the breached-envelope (partially enclosed) case
    #[arg(long)]
    pub glazing_failure: bool,
}

impl WindArgs {
    pub fn to_parameters(&self) -> Result<WindParameters> {
        let mut wind = WindParameters::new(self.speed, ExposureCategory::from_str_flexible(&self.exposure)?)
            .with_edition(AsceEdition::from_str_flexible(&self.edition)?)
            .with_risk_category(RiskCategory::from_str_flexible(&self.risk)?)
            .with_classification(EnclosureClassification::from_str_flexible(&self.enclosure)?)
            .with_glazing_failure(self.glazing_failure);
        wind.topographic_factor = self.kzt;
        wind.directionality_factor = self.kd;
        wind.include_internal_pressure = !self.no_internal_pressure;
        wind.validate()?;
        Ok(wind)
    }
}

#[derive(Args, Debug)]
pub struct CalculateArgs {
    #[command(flatten)]
    pub geometry: GeometryArgs,

    #[command(flatten)]
    pub wind: WindArgs,

    /// Component effective wind area (sq ft)
    #[arg(long, default_value_t = 10.0)]
    pub effective_area: f64,

    /// Coefficient table JSON (defaults to the built-in illustrative table)
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// Site city
    #[arg(long)]
    pub city: Option<String>,

    /// Site state
    #[arg(long)]
    pub state: Option<String>,

    /// Professional mode
    #[arg(long)]
    pub professional: bool,
}

impl CalculateArgs {
    pub fn to_request(&self) -> Result<CalculationRequest> {
        let mut request = CalculationRequest::new(self.geometry.to_geometry()?, self.wind.to_parameters()?)
            .with_effective_area(self.effective_area)
            .with_professional_mode(self.professional);
        if self.city.is_some() || self.state.is_some() {
            request = request.with_location(SiteLocation::new(
                self.city.clone().unwrap_or_default(),
                self.state.clone().unwrap_or_default(),
            ));
        }
        request.validate()?;
        Ok(request)
    }
}

#[derive(Args, Debug)]
pub struct ZonesArgs {
    #[command(flatten)]
    pub geometry: GeometryArgs,
}

#[derive(Args, Debug)]
pub struct Zone1PrimeArgs {
    #[command(flatten)]
    pub geometry: GeometryArgs,

    /// Exposure category (B, C or D)
    #[arg(long, default_value = "C")]
    pub exposure: String,

    /// Component effective wind area (sq ft)
    #[arg(long, default_value_t = 10.0)]
    pub effective_area: f64,
}
