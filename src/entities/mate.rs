//! Mate entity - 1:1 contact between two features with fit calculation
//!
//! A mate represents direct contact between two features, such as a pin in a hole.
//! The fit analysis is automatically calculated based on the feature dimensions.

use chrono::{DateTime, Utc};
use miette::{miette, Result};
use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, Status};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::feature::Dimension;

/// Mate type classification - the intended fit between mating features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum MateType {
    /// Clearance fit - guaranteed gap between parts
    #[default]
    Clearance,
    /// Transition fit - may be clearance or interference
    Transition,
    /// Interference fit - press fit, guaranteed overlap
    Interference,
}

impl std::fmt::Display for MateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MateType::Clearance => write!(f, "clearance"),
            MateType::Transition => write!(f, "transition"),
            MateType::Interference => write!(f, "interference"),
        }
    }
}

impl std::str::FromStr for MateType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clearance" => Ok(MateType::Clearance),
            "transition" => Ok(MateType::Transition),
            "interference" => Ok(MateType::Interference),
            _ => Err(format!(
                "Invalid mate type: '{}'. Use 'clearance', 'transition', or 'interference'",
                s
            )),
        }
    }
}

/// Fit result classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitResult {
    /// Guaranteed clearance (min_clearance > 0)
    Clearance,
    /// Guaranteed interference (max_clearance < 0)
    Interference,
    /// May be either (overlapping ranges)
    Transition,
}

impl std::fmt::Display for FitResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitResult::Clearance => write!(f, "clearance"),
            FitResult::Interference => write!(f, "interference"),
            FitResult::Transition => write!(f, "transition"),
        }
    }
}

/// Automatically calculated fit analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitAnalysis {
    /// Minimum clearance at worst-case (hole_min - shaft_max)
    /// Negative means interference
    pub worst_case_min_clearance: f64,

    /// Maximum clearance at worst-case (hole_max - shaft_min)
    pub worst_case_max_clearance: f64,

    /// Resulting fit classification
    pub fit_result: FitResult,

    /// Statistical (RSS) fit analysis - optional, calculated on demand
    /// Uses normal distribution assumptions to estimate interference probability
    /// Future: Will support 3D torsor-based analysis for full GD&T
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistical: Option<StatisticalFit>,
}

impl FitAnalysis {
    /// Calculate fit from hole and shaft dimensions (legacy tuple interface)
    /// hole_dim: (nominal, plus_tol, minus_tol)
    /// shaft_dim: (nominal, plus_tol, minus_tol)
    pub fn calculate(hole_dim: (f64, f64, f64), shaft_dim: (f64, f64, f64)) -> Self {
        let (hole_nom, hole_plus, hole_minus) = hole_dim;
        let (shaft_nom, shaft_plus, shaft_minus) = shaft_dim;

        // Hole limits
        let hole_max = hole_nom + hole_plus;
        let hole_min = hole_nom - hole_minus;

        // Shaft limits
        let shaft_max = shaft_nom + shaft_plus;
        let shaft_min = shaft_nom - shaft_minus;

        // Clearance calculations (positive = clearance, negative = interference)
        let min_clearance = hole_min - shaft_max;
        let max_clearance = hole_max - shaft_min;

        // Determine fit result
        let fit_result = if min_clearance > 0.0 {
            FitResult::Clearance
        } else if max_clearance < 0.0 {
            FitResult::Interference
        } else {
            FitResult::Transition
        };

        FitAnalysis {
            worst_case_min_clearance: min_clearance,
            worst_case_max_clearance: max_clearance,
            fit_result,
            statistical: None, // Calculated on demand via with_statistical()
        }
    }

    /// Calculate fit from two Dimension structs, auto-detecting which is hole vs shaft
    /// based on the `internal` field.
    ///
    /// Returns error if both dimensions have the same internal/external designation.
    pub fn from_dimensions(dim_a: &Dimension, dim_b: &Dimension) -> Result<Self> {
        // Auto-detect: internal=true is hole, internal=false is shaft
        let (hole_dim, shaft_dim) = if dim_a.internal && !dim_b.internal {
            (dim_a, dim_b)
        } else if !dim_a.internal && dim_b.internal {
            (dim_b, dim_a)
        } else if dim_a.internal && dim_b.internal {
            return Err(miette!(
                "Mate requires one internal and one external feature (both are internal)"
            ));
        } else {
            return Err(miette!(
                "Mate requires one internal and one external feature (both are external)"
            ));
        };

        // Hole limits (internal feature)
        let hole_max = hole_dim.nominal + hole_dim.plus_tol; // LMC
        let hole_min = hole_dim.nominal - hole_dim.minus_tol; // MMC

        // Shaft limits (external feature)
        let shaft_max = shaft_dim.nominal + shaft_dim.plus_tol; // MMC
        let shaft_min = shaft_dim.nominal - shaft_dim.minus_tol; // LMC

        // Clearance calculations (positive = clearance, negative = interference)
        let min_clearance = hole_min - shaft_max;
        let max_clearance = hole_max - shaft_min;

        // Determine fit result
        let fit_result = if min_clearance > 0.0 {
            FitResult::Clearance
        } else if max_clearance < 0.0 {
            FitResult::Interference
        } else {
            FitResult::Transition
        };

        Ok(FitAnalysis {
            worst_case_min_clearance: min_clearance,
            worst_case_max_clearance: max_clearance,
            fit_result,
            statistical: None, // Calculated on demand via with_statistical()
        })
    }

    /// Add statistical analysis to this fit analysis
    /// sigma_level: process capability (6.0 for ±3σ, 4.0 for ±2σ, etc.)
    pub fn with_statistical(
        mut self,
        hole_dim: &Dimension,
        shaft_dim: &Dimension,
        sigma_level: f64,
    ) -> Result<Self> {
        self.statistical = Some(StatisticalFit::calculate(hole_dim, shaft_dim, sigma_level)?);
        Ok(self)
    }

    /// Check if this is an acceptable clearance fit
    pub fn is_clearance(&self) -> bool {
        self.fit_result == FitResult::Clearance
    }

    /// Check if this is an acceptable interference fit
    pub fn is_interference(&self) -> bool {
        self.fit_result == FitResult::Interference
    }
}

/// Statistical fit analysis using RSS (Root Sum Square) method
/// Calculates clearance distribution assuming normal distributions for hole and shaft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFit {
    /// Mean clearance (hole_mean - shaft_mean)
    pub mean_clearance: f64,

    /// Standard deviation of clearance (RSS of hole and shaft σ)
    pub sigma_clearance: f64,

    /// Minimum clearance at 3σ (mean - 3σ)
    pub clearance_3sigma_min: f64,

    /// Maximum clearance at 3σ (mean + 3σ)
    pub clearance_3sigma_max: f64,

    /// Probability of interference (clearance < 0) as percentage
    pub probability_interference: f64,

    /// Fit classification at 3σ limits
    pub fit_result_3sigma: FitResult,
}

/// Standard normal cumulative distribution function (CDF)
/// Φ(z) = probability that a standard normal random variable is ≤ z
/// Uses Hastings approximation (error < 7.5e-8)
fn normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return 0.5;
    }
    if z >= 8.0 {
        return 1.0;
    }
    if z <= -8.0 {
        return 0.0;
    }

    // Handle negative z by symmetry: Φ(-z) = 1 - Φ(z)
    let (z_abs, negate) = if z < 0.0 { (-z, true) } else { (z, false) };

    // Hastings approximation constants (A&S 26.2.17)
    const B0: f64 = 0.2316419;
    const B1: f64 = 0.319381530;
    const B2: f64 = -0.356563782;
    const B3: f64 = 1.781477937;
    const B4: f64 = -1.821255978;
    const B5: f64 = 1.330274429;

    let t = 1.0 / (1.0 + B0 * z_abs);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let pdf = (-0.5 * z_abs * z_abs).exp() / (2.0 * std::f64::consts::PI).sqrt();
    let cdf = 1.0 - pdf * (B1 * t + B2 * t2 + B3 * t3 + B4 * t4 + B5 * t5);

    if negate {
        1.0 - cdf
    } else {
        cdf
    }
}

impl StatisticalFit {
    /// Calculate statistical fit from hole and shaft dimensions
    /// sigma_level: process capability (6.0 for ±3σ, 4.0 for ±2σ, etc.)
    pub fn calculate(
        hole_dim: &Dimension,
        shaft_dim: &Dimension,
        sigma_level: f64,
    ) -> Result<Self> {
        // Verify we have one internal and one external
        if !hole_dim.internal {
            return Err(miette!("First dimension must be internal (hole)"));
        }
        if shaft_dim.internal {
            return Err(miette!("Second dimension must be external (shaft)"));
        }

        // Calculate process means (center of tolerance band)
        let hole_mean_offset = (hole_dim.plus_tol - hole_dim.minus_tol) / 2.0;
        let hole_mean = hole_dim.nominal + hole_mean_offset;

        let shaft_mean_offset = (shaft_dim.plus_tol - shaft_dim.minus_tol) / 2.0;
        let shaft_mean = shaft_dim.nominal + shaft_mean_offset;

        // Mean clearance
        let mean_clearance = hole_mean - shaft_mean;

        // Calculate σ for each (σ = tolerance_band / sigma_level)
        let hole_sigma = hole_dim.tolerance_band() / sigma_level;
        let shaft_sigma = shaft_dim.tolerance_band() / sigma_level;

        // RSS combination: σ_clearance = √(σ_hole² + σ_shaft²)
        let sigma_clearance = (hole_sigma * hole_sigma + shaft_sigma * shaft_sigma).sqrt();

        // 3σ limits
        let clearance_3sigma_min = mean_clearance - 3.0 * sigma_clearance;
        let clearance_3sigma_max = mean_clearance + 3.0 * sigma_clearance;

        // Probability of interference: P(clearance < 0) = Φ(-mean/σ)
        let z = if sigma_clearance > 0.0 {
            -mean_clearance / sigma_clearance
        } else if mean_clearance >= 0.0 {
            f64::NEG_INFINITY // 0% interference
        } else {
            f64::INFINITY // 100% interference
        };
        let probability_interference = normal_cdf(z) * 100.0;

        // Determine fit result at 3σ
        let fit_result_3sigma = if clearance_3sigma_min > 0.0 {
            FitResult::Clearance
        } else if clearance_3sigma_max < 0.0 {
            FitResult::Interference
        } else {
            FitResult::Transition
        };

        Ok(StatisticalFit {
            mean_clearance,
            sigma_clearance,
            clearance_3sigma_min,
            clearance_3sigma_max,
            probability_interference,
            fit_result_3sigma,
        })
    }

    /// Calculate from dimensions, auto-detecting hole vs shaft
    pub fn from_dimensions(dim_a: &Dimension, dim_b: &Dimension, sigma_level: f64) -> Result<Self> {
        if dim_a.internal && !dim_b.internal {
            Self::calculate(dim_a, dim_b, sigma_level)
        } else if !dim_a.internal && dim_b.internal {
            Self::calculate(dim_b, dim_a, sigma_level)
        } else if dim_a.internal && dim_b.internal {
            Err(miette!(
                "Statistical fit requires one internal and one external feature (both are internal)"
            ))
        } else {
            Err(miette!(
                "Statistical fit requires one internal and one external feature (both are external)"
            ))
        }
    }
}

/// Mate links
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MateLinks {
    /// Stackups using this mate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_in_stackups: Vec<String>,

    /// Requirements verified by this mate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verifies: Vec<String>,
}

/// Cached feature reference info for mates (denormalized for readability, validated on check)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MateFeatureRef {
    /// Feature entity ID (FEAT-...)
    pub id: EntityId,

    /// Feature name (cached from feature entity)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Component ID that owns this feature (cached)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,

    /// Component name/title (cached for readability)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
}

impl std::fmt::Display for MateFeatureRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display the name if available, otherwise the ID
        if let Some(ref name) = self.name {
            write!(f, "{}", name)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

impl MateFeatureRef {
    /// Create a new MateFeatureRef with just the ID
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: None,
            component_id: None,
            component_name: None,
        }
    }

    /// Create a MateFeatureRef with all cached info populated
    pub fn with_cache(
        id: EntityId,
        name: Option<String>,
        component_id: Option<String>,
        component_name: Option<String>,
    ) -> Self {
        Self {
            id,
            name,
            component_id,
            component_name,
        }
    }
}

/// Mate entity - 1:1 contact between two features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mate {
    /// Unique identifier (MATE-...)
    pub id: EntityId,

    /// Mate title/name
    pub title: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// First feature (FEAT-...) - typically the hole/bore (with cached info)
    pub feature_a: MateFeatureRef,

    /// Second feature (FEAT-...) - typically the shaft/pin (with cached info)
    pub feature_b: MateFeatureRef,

    /// Mate type classification
    pub mate_type: MateType,

    /// Automatically calculated fit analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_analysis: Option<FitAnalysis>,

    /// Additional notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Classification tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Current status
    #[serde(default)]
    pub status: Status,

    /// Links to other entities
    #[serde(default)]
    pub links: MateLinks,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Author name
    pub author: String,

    /// Revision counter
    #[serde(default = "default_revision")]
    pub entity_revision: u32,
}

fn default_revision() -> u32 {
    1
}

impl Entity for Mate {
    const PREFIX: &'static str = "MATE";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn status(&self) -> &str {
        match self.status {
            Status::Draft => "draft",
            Status::Review => "review",
            Status::Approved => "approved",
            Status::Released => "released",
            Status::Obsolete => "obsolete",
        }
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn author(&self) -> &str {
        &self.author
    }
}

impl Mate {
    /// Create a new mate with required fields (accepts feature EntityIds)
    pub fn new(
        title: impl Into<String>,
        feature_a: EntityId,
        feature_b: EntityId,
        mate_type: MateType,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Mate),
            title: title.into(),
            description: None,
            feature_a: MateFeatureRef::new(feature_a),
            feature_b: MateFeatureRef::new(feature_b),
            mate_type,
            fit_analysis: None,
            notes: None,
            tags: Vec::new(),
            status: Status::default(),
            links: MateLinks::default(),
            created: Utc::now(),
            author: author.into(),
            entity_revision: 1,
        }
    }

    /// Create a new mate with full feature references (including cached info)
    pub fn with_features(
        title: impl Into<String>,
        feature_a: MateFeatureRef,
        feature_b: MateFeatureRef,
        mate_type: MateType,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Mate),
            title: title.into(),
            description: None,
            feature_a,
            feature_b,
            mate_type,
            fit_analysis: None,
            notes: None,
            tags: Vec::new(),
            status: Status::default(),
            links: MateLinks::default(),
            created: Utc::now(),
            author: author.into(),
            entity_revision: 1,
        }
    }

    /// Set fit analysis from feature dimensions (legacy tuple interface)
    pub fn calculate_fit(&mut self, hole_dim: (f64, f64, f64), shaft_dim: (f64, f64, f64)) {
        self.fit_analysis = Some(FitAnalysis::calculate(hole_dim, shaft_dim));
    }

    /// Calculate fit analysis from two Dimension structs
    /// Auto-detects which is hole vs shaft based on the `internal` field
    pub fn calculate_fit_from_dimensions(
        &mut self,
        dim_a: &Dimension,
        dim_b: &Dimension,
    ) -> Result<()> {
        self.fit_analysis = Some(FitAnalysis::from_dimensions(dim_a, dim_b)?);
        Ok(())
    }

    /// Check if fit analysis has been calculated
    pub fn has_analysis(&self) -> bool {
        self.fit_analysis.is_some()
    }

    /// Get fit result summary string
    pub fn fit_summary(&self) -> String {
        match &self.fit_analysis {
            Some(analysis) => format!(
                "{} ({:.4} to {:.4})",
                analysis.fit_result,
                analysis.worst_case_min_clearance,
                analysis.worst_case_max_clearance
            ),
            None => "Not calculated".to_string(),
        }
    }
}
