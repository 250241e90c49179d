//! Stackup entity - Tolerance chain analysis with multiple contributors
//!
//! A stackup represents a tolerance chain with multiple dimensional contributors.
//! Supports worst-case, RSS (statistical), and Monte Carlo analysis methods.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::entity::{Entity, Status};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::feature::Feature;

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

/// Target/gap specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Name of the target dimension/gap
    pub name: String,

    /// Nominal value
    pub nominal: f64,

    /// Upper specification limit
    pub upper_limit: f64,

    /// Lower specification limit
    pub lower_limit: f64,

    /// Units
    #[serde(default = "default_units")]
    pub units: String,

    /// Is this a critical dimension?
    #[serde(default)]
    pub critical: bool,
}

fn default_units() -> String {
    "mm".to_string()
}

/// Direction of contributor in stackup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Direction {
    /// Adds to the stack (positive contribution)
    #[default]
    Positive,
    /// Subtracts from the stack (negative contribution)
    Negative,
}

/// Statistical distribution for Monte Carlo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Distribution {
    /// Normal (Gaussian) distribution
    #[default]
    Normal,
    /// Uniform distribution
    Uniform,
    /// Triangular distribution
    Triangular,
}

/// Cached feature reference info (denormalized for readability, validated on check)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRef {
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

impl FeatureRef {
    /// Create a new FeatureRef with just the ID
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: None,
            component_id: None,
            component_name: None,
        }
    }

    /// Create a FeatureRef with all cached info populated
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

/// GD&T contribution to tolerance stackup
/// Currently supports 1D position tolerance contribution
/// Future: Will support 3D Small Displacement Torsors for full GD&T analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GdtContribution {
    /// Position tolerance value (diameter of cylindrical zone)
    /// In 1D analysis, this adds to the contributor's tolerance band
    pub position_tolerance: f64,

    /// Actual feature size for bonus tolerance calculation (MMC/LMC)
    /// If None, uses MMC (worst-case, no bonus)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_size: Option<f64>,

    /// Calculated bonus tolerance (actual departure from MMC/LMC)
    /// Auto-calculated when actual_size is provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus: Option<f64>,

    /// Effective position tolerance (position_tolerance + bonus)
    /// Auto-calculated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_tolerance: Option<f64>,

    // Future 3D fields (reserved for torsor-based analysis):
    // pub torsor_constraints: Option<TorsorConstraints>,
    // pub datum_reference_frame: Option<DatumReferenceFrame>,
    // pub projected_tolerance_zone: Option<f64>,
}

impl GdtContribution {
    /// Create a new GD&T contribution with just position tolerance (no bonus)
    pub fn new(position_tolerance: f64) -> Self {
        Self {
            position_tolerance,
            actual_size: None,
            bonus: None,
            effective_tolerance: Some(position_tolerance),
        }
    }

    /// Create with bonus calculation from actual size and MMC
    pub fn with_bonus(position_tolerance: f64, actual_size: f64, mmc: f64) -> Self {
        let bonus = (actual_size - mmc).abs();
        let effective = position_tolerance + bonus;
        Self {
            position_tolerance,
            actual_size: Some(actual_size),
            bonus: Some(bonus),
            effective_tolerance: Some(effective),
        }
    }

    /// Get effective tolerance (with bonus if applicable)
    pub fn effective(&self) -> f64 {
        self.effective_tolerance.unwrap_or(self.position_tolerance)
    }
}

/// A contributor to the tolerance stackup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    /// Contributor name/description
    pub name: String,

    /// Optional reference to a Feature entity (with cached info)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<FeatureRef>,

    /// Direction of contribution
    #[serde(default)]
    pub direction: Direction,

    /// Nominal value
    pub nominal: f64,

    /// Plus tolerance (positive number)
    pub plus_tol: f64,

    /// Minus tolerance (positive number)
    pub minus_tol: f64,

    /// Statistical distribution for Monte Carlo
    #[serde(default)]
    pub distribution: Distribution,

    /// Source reference (drawing number, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// GD&T position tolerance contribution (optional)
    /// When present, adds to the tolerance band for statistical analysis
    /// Future: Will support full 3D torsor-based analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdt_position: Option<GdtContribution>,
}

impl Contributor {
    /// Get total tolerance band (dimensional only)
    pub fn tolerance_band(&self) -> f64 {
        self.plus_tol + self.minus_tol
    }

    /// Get total tolerance band including GD&T position if present
    /// For 1D analysis, position tolerance is treated as additional bilateral tolerance
    /// (half added to each side, contributing to variance)
    pub fn total_tolerance_band(&self) -> f64 {
        let dim_band = self.plus_tol + self.minus_tol;
        if let Some(ref gdt) = self.gdt_position {
            // Position tolerance zone diameter adds to total variation
            // In 1D, we treat it as ± (effective / 2)
            dim_band + gdt.effective()
        } else {
            dim_band
        }
    }

    /// Get signed contribution based on direction
    pub fn signed_nominal(&self) -> f64 {
        match self.direction {
            Direction::Positive => self.nominal,
            Direction::Negative => -self.nominal,
        }
    }

    /// Sync values from a linked feature's primary dimension
    /// Returns true if any values were changed
    pub fn sync_from_feature(&mut self, feature: &Feature) -> bool {
        let mut changed = false;

        if let Some(dim) = feature.primary_dimension() {
            if (self.nominal - dim.nominal).abs() > f64::EPSILON {
                self.nominal = dim.nominal;
                changed = true;
            }
            if (self.plus_tol - dim.plus_tol).abs() > f64::EPSILON {
                self.plus_tol = dim.plus_tol;
                changed = true;
            }
            if (self.minus_tol - dim.minus_tol).abs() > f64::EPSILON {
                self.minus_tol = dim.minus_tol;
                changed = true;
            }
        }

        changed
    }

    /// Check if this contributor is out of sync with a feature
    pub fn is_out_of_sync(&self, feature: &Feature) -> bool {
        if let Some(dim) = feature.primary_dimension() {
            (self.nominal - dim.nominal).abs() > f64::EPSILON
                || (self.plus_tol - dim.plus_tol).abs() > f64::EPSILON
                || (self.minus_tol - dim.minus_tol).abs() > f64::EPSILON
        } else {
            false
        }
    }
}

/// Worst-case analysis results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorstCaseResult {
    /// Minimum possible result
    pub min: f64,

    /// Maximum possible result
    pub max: f64,

    /// Margin to specification limits
    pub margin: f64,

    /// Pass/fail/marginal
    pub result: AnalysisResult,
}

/// RSS (Root Sum Square) statistical analysis results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssResult {
    /// Mean value
    pub mean: f64,

    /// 3-sigma spread (±3σ)
    pub sigma_3: f64,

    /// Margin to specification limits at 3σ
    pub margin: f64,

    /// Process capability index (Cp) - ignores centering
    /// Cp = (USL - LSL) / (6σ)
    #[serde(default)]
    pub cp: f64,

    /// Process capability index (Cpk) - accounts for centering
    /// Cpk = min(USL-μ, μ-LSL) / (3σ)
    pub cpk: f64,

    /// Estimated yield percentage
    pub yield_percent: f64,

    /// Sensitivity analysis: variance contribution percentage for each contributor
    /// Index matches contributors array; values sum to 100%
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitivity: Vec<f64>,

    /// Shifted mean when mean_shift_k > 0 (Bender method)
    /// Shifts toward nearest spec limit for worst-case analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shifted_mean: Option<f64>,
}

/// Monte Carlo simulation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    /// Number of iterations
    pub iterations: u32,

    /// Mean result
    pub mean: f64,

    /// Standard deviation
    pub std_dev: f64,

    /// Minimum value seen
    pub min: f64,

    /// Maximum value seen
    pub max: f64,

    /// Estimated yield percentage (within spec)
    pub yield_percent: f64,

    /// Lower percentile (2.5% for 95% CI)
    pub percentile_2_5: f64,

    /// Upper percentile (97.5% for 95% CI)
    pub percentile_97_5: f64,

    /// Process performance index (Pp) - uses sample std_dev
    /// Pp = (USL - LSL) / (6s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp: Option<f64>,

    /// Process performance index (Ppk) - uses sample std_dev, accounts for centering
    /// Ppk = min(USL-μ, μ-LSL) / (3s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppk: Option<f64>,
}

/// Analysis result classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisResult {
    /// Within specification
    Pass,
    /// Close to limit (margin < 10% of tolerance)
    Marginal,
    /// Out of specification
    Fail,
}

impl std::fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisResult::Pass => write!(f, "pass"),
            AnalysisResult::Marginal => write!(f, "marginal"),
            AnalysisResult::Fail => write!(f, "fail"),
        }
    }
}

/// Combined analysis results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResults {
    /// Worst-case analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst_case: Option<WorstCaseResult>,

    /// RSS statistical analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rss: Option<RssResult>,

    /// Monte Carlo simulation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<MonteCarloResult>,
}

// ===== 3D SDT Tolerance Analysis Types =====

/// 3D analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis3DConfig {
    /// Enable 3D analysis for this stackup
    #[serde(default)]
    pub enabled: bool,

    /// Analysis method: "jacobian_torsor" or "monte_carlo_3d"
    #[serde(default = "default_3d_method")]
    pub method: String,

    /// Number of iterations for Monte Carlo 3D
    #[serde(default = "default_3d_iterations")]
    pub monte_carlo_iterations: u32,
}

fn default_3d_method() -> String {
    "jacobian_torsor".to_string()
}

fn default_3d_iterations() -> u32 {
    10000
}

impl Default for Analysis3DConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: default_3d_method(),
            monte_carlo_iterations: default_3d_iterations(),
        }
    }
}

/// Statistics for a single DOF in 3D analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TorsorStats {
    /// Worst-case minimum value
    pub wc_min: f64,

    /// Worst-case maximum value
    pub wc_max: f64,

    /// Statistical mean
    #[serde(default)]
    pub rss_mean: f64,

    /// Statistical 3-sigma spread
    #[serde(default)]
    pub rss_3sigma: f64,

    /// Monte Carlo mean (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc_mean: Option<f64>,

    /// Monte Carlo std dev (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc_std_dev: Option<f64>,
}

/// Result torsor with statistics for all 6 DOFs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultTorsor {
    /// Translation along X
    pub u: TorsorStats,

    /// Translation along Y
    pub v: TorsorStats,

    /// Translation along Z
    pub w: TorsorStats,

    /// Rotation about X (radians)
    pub alpha: TorsorStats,

    /// Rotation about Y (radians)
    pub beta: TorsorStats,

    /// Rotation about Z (radians)
    pub gamma: TorsorStats,
}

/// 3D sensitivity entry for a contributor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensitivity3DEntry {
    /// Contributor name
    pub name: String,

    /// Feature ID if linked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,

    /// Variance contribution per DOF [u, v, w, α, β, γ] as percentages
    pub contribution_pct: [f64; 6],
}

/// Jacobian matrix summary for chain analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JacobianSummary {
    /// Number of contributors in chain
    pub chain_length: usize,

    /// Total constrained DOFs across chain
    pub total_constrained_dof: usize,

    /// Free DOFs in result
    pub result_free_dof: Vec<String>,
}

/// Combined 3D analysis results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis3DResults {
    /// Result torsor with 6-DOF statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_torsor: Option<ResultTorsor>,

    /// 3D sensitivity analysis per contributor
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitivity_3d: Vec<Sensitivity3DEntry>,

    /// Jacobian chain summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jacobian_summary: Option<JacobianSummary>,

    /// Analysis timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
}

/// Disposition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Disposition {
    /// Under review
    #[default]
    UnderReview,
    /// Approved
    Approved,
    /// Rejected
    Rejected,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::UnderReview => write!(f, "under_review"),
            Disposition::Approved => write!(f, "approved"),
            Disposition::Rejected => write!(f, "rejected"),
        }
    }
}

/// Stackup links
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackupLinks {
    /// Requirements verified by this stackup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verifies: Vec<String>,

    /// Mates used in this stackup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mates_used: Vec<String>,
}

/// Stackup entity - tolerance chain analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stackup {
    /// Unique identifier (TOL-...)
    pub id: EntityId,

    /// Stackup title/name
    pub title: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Target specification
    pub target: Target,

    /// List of contributors to the stackup
    #[serde(default)]
    pub contributors: Vec<Contributor>,

    /// Sigma level for statistical analysis (tolerance = sigma_level × σ)
    /// Default 6.0 means tolerance band spans ±3σ (99.73% of distribution)
    /// Lower values (e.g., 4.0) are more conservative (assume wider process variation)
    #[serde(default = "default_sigma_level")]
    pub sigma_level: f64,

    /// Mean shift factor (Bender k-factor) for process drift modeling
    /// Common values: 0.0 (none), 1.5 (automotive/Bender method)
    /// Shifts the mean toward the nearest spec limit for worst-case analysis
    #[serde(default)]
    pub mean_shift_k: f64,

    /// Include GD&T position tolerances in statistical analysis
    /// When true, contributors with gdt_position will use total_tolerance_band()
    #[serde(default)]
    pub include_gdt: bool,

    // ===== 3D SDT Analysis Fields =====

    /// Functional measurement direction [dx, dy, dz] for 3D analysis
    /// The result torsor will be projected onto this direction for 1D comparison
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functional_direction: Option<[f64; 3]>,

    /// 3D analysis configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_3d: Option<Analysis3DConfig>,

    /// 3D analysis results (auto-calculated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_results_3d: Option<Analysis3DResults>,

    /// Analysis results (auto-calculated)
    #[serde(default)]
    pub analysis_results: AnalysisResults,

    /// Review disposition
    #[serde(default)]
    pub disposition: Disposition,

    /// Classification tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Current status
    #[serde(default)]
    pub status: Status,

    /// Links to other entities
    #[serde(default)]
    pub links: StackupLinks,

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

fn default_sigma_level() -> f64 {
    6.0
}

impl Entity for Stackup {
    const PREFIX: &'static str = "TOL";

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

impl Default for Stackup {
    fn default() -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Tol),
            title: String::new(),
            description: None,
            target: Target {
                name: String::new(),
                nominal: 0.0,
                upper_limit: 0.0,
                lower_limit: 0.0,
                units: "mm".to_string(),
                critical: false,
            },
            contributors: Vec::new(),
            sigma_level: default_sigma_level(),
            mean_shift_k: 0.0,
            include_gdt: false,
            functional_direction: None,
            analysis_3d: None,
            analysis_results_3d: None,
            analysis_results: AnalysisResults::default(),
            disposition: Disposition::default(),
            tags: Vec::new(),
            status: Status::default(),
            links: StackupLinks::default(),
            created: Utc::now(),
            author: String::new(),
            entity_revision: 1,
        }
    }
}

impl Stackup {
    /// Create a new stackup with target specification
    pub fn new(
        title: impl Into<String>,
        target_name: impl Into<String>,
        target_nominal: f64,
        target_upper: f64,
        target_lower: f64,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Tol),
            title: title.into(),
            target: Target {
                name: target_name.into(),
                nominal: target_nominal,
                upper_limit: target_upper,
                lower_limit: target_lower,
                units: "mm".to_string(),
                critical: false,
            },
            author: author.into(),
            created: Utc::now(),
            ..Default::default()
        }
    }

    /// Add a contributor to the stackup
    pub fn add_contributor(&mut self, contributor: Contributor) {
        self.contributors.push(contributor);
    }

    /// Run all analyses
    pub fn analyze(&mut self) {
        self.analysis_results.worst_case = Some(self.calculate_worst_case());
        self.analysis_results.rss = Some(self.calculate_rss());
        self.analysis_results.monte_carlo = Some(self.calculate_monte_carlo(10000));
    }

    /// Calculate worst-case analysis
    pub fn calculate_worst_case(&self) -> WorstCaseResult {
        let mut min_result = 0.0;
        let mut max_result = 0.0;

        for contrib in &self.contributors {
            match contrib.direction {
                Direction::Positive => {
                    min_result += contrib.nominal - contrib.minus_tol;
                    max_result += contrib.nominal + contrib.plus_tol;
                }
                Direction::Negative => {
                    min_result -= contrib.nominal + contrib.plus_tol;
                    max_result -= contrib.nominal - contrib.minus_tol;
                }
            }
        }

        // Calculate margin (minimum distance to spec limits)
        let upper_margin = self.target.upper_limit - max_result;
        let lower_margin = min_result - self.target.lower_limit;
        let margin = upper_margin.min(lower_margin);

        // Determine result
        let tolerance_band = self.target.upper_limit - self.target.lower_limit;
        let marginal_threshold = tolerance_band * 0.1;

        let result = if margin > marginal_threshold {
            AnalysisResult::Pass
        } else if margin > 0.0 {
            AnalysisResult::Marginal
        } else {
            AnalysisResult::Fail
        };

        WorstCaseResult {
            min: min_result,
            max: max_result,
            margin,
            result,
        }
    }

    /// Calculate RSS (Root Sum Square) statistical analysis
    pub fn calculate_rss(&self) -> RssResult {
        let mut mean = 0.0;
        let mut variance = 0.0;
        let mut individual_variances: Vec<f64> = Vec::with_capacity(self.contributors.len());

        for contrib in &self.contributors {
            // For unilateral tolerances, shift mean to center of tolerance band
            // This ensures the process is centered within the tolerance zone
            let mean_offset = (contrib.plus_tol - contrib.minus_tol) / 2.0;
            let process_mean = contrib.nominal + mean_offset;

            mean += match contrib.direction {
                Direction::Positive => process_mean,
                Direction::Negative => -process_mean,
            };

            // σ = tolerance_band / sigma_level (default 6.0 for ±3σ process)
            // When include_gdt is true, include GD&T position tolerance in the band
            let tol_band = if self.include_gdt {
                contrib.total_tolerance_band()
            } else {
                contrib.tolerance_band()
            };
            let contrib_sigma = tol_band / self.sigma_level;
            let contrib_variance = contrib_sigma * contrib_sigma;
            variance += contrib_variance;
            individual_variances.push(contrib_variance);
        }

        let sigma = variance.sqrt();
        let sigma_3 = 3.0 * sigma;

        // Calculate sensitivity (variance contribution percentage)
        // sensitivity_i = (σ_i² / Σσ_j²) × 100%
        let sensitivity = if variance > 0.0 {
            individual_variances
                .iter()
                .map(|v| (v / variance) * 100.0)
                .collect()
        } else {
            Vec::new()
        };

        // Apply mean shift (Bender k-factor) if configured
        // Shift toward nearest spec limit for worst-case analysis
        let (cpk_mean, shifted_mean) = if self.mean_shift_k > 0.0 && sigma > 0.0 {
            let upper_margin = self.target.upper_limit - mean;
            let lower_margin = mean - self.target.lower_limit;

            // Shift toward the nearest limit (worst-case direction)
            let shifted = if upper_margin < lower_margin {
                // Closer to upper limit, shift upward
                mean + self.mean_shift_k * sigma
            } else {
                // Closer to lower limit, shift downward
                mean - self.mean_shift_k * sigma
            };
            (shifted, Some(shifted))
        } else {
            (mean, None)
        };

        // Calculate Cp (ignores centering) = (USL - LSL) / (6σ)
        let spec_range = self.target.upper_limit - self.target.lower_limit;
        let cp = if sigma > 0.0 {
            spec_range / (6.0 * sigma)
        } else {
            f64::INFINITY
        };

        // Calculate Cpk using cpk_mean (shifted if k > 0, original otherwise)
        let upper_margin = self.target.upper_limit - cpk_mean;
        let lower_margin = cpk_mean - self.target.lower_limit;
        let cpk = if sigma > 0.0 {
            (upper_margin.min(lower_margin)) / (3.0 * sigma)
        } else {
            f64::INFINITY
        };

        // Calculate yield using normal distribution CDF (based on original mean)
        // Φ(z) = probability that a standard normal random variable is ≤ z
        let yield_upper_margin = self.target.upper_limit - mean;
        let yield_lower_margin = mean - self.target.lower_limit;
        let z_upper = if sigma > 0.0 {
            yield_upper_margin / sigma
        } else {
            f64::INFINITY
        };
        let z_lower = if sigma > 0.0 {
            -yield_lower_margin / sigma
        } else {
            f64::NEG_INFINITY
        };

        // Yield = Φ(z_upper) - Φ(z_lower)
        let yield_percent = (normal_cdf(z_upper) - normal_cdf(z_lower)) * 100.0;

        // Margin at 3σ
        let margin = (self.target.upper_limit - (mean + sigma_3))
            .min((mean - sigma_3) - self.target.lower_limit);

        RssResult {
            mean,
            sigma_3,
            margin,
            cp,
            cpk,
            yield_percent,
            sensitivity,
            shifted_mean,
        }
    }

    /// Run Monte Carlo simulation
    pub fn calculate_monte_carlo(&self, iterations: u32) -> MonteCarloResult {
        let (result, _samples) = self.calculate_monte_carlo_with_samples(iterations);
        result
    }

    /// Run Monte Carlo simulation and return both results and raw samples
    pub fn calculate_monte_carlo_with_samples(
        &self,
        iterations: u32,
    ) -> (MonteCarloResult, Vec<f64>) {
        let mut rng = rand::rng();
        let mut results: Vec<f64> = Vec::with_capacity(iterations as usize);

        for _ in 0..iterations {
            let mut result = 0.0;

            for contrib in &self.contributors {
                // Get tolerance band (with or without GD&T based on include_gdt flag)
                let tol_band = if self.include_gdt {
                    contrib.total_tolerance_band()
                } else {
                    contrib.tolerance_band()
                };

                let value = match contrib.distribution {
                    Distribution::Normal => {
                        // Box-Muller transform for normal distribution
                        // For unilateral tolerances, center the mean within the tolerance band
                        let mean_offset = (contrib.plus_tol - contrib.minus_tol) / 2.0;
                        let mean = contrib.nominal + mean_offset;
                        let sigma = tol_band / self.sigma_level;
                        let u1: f64 = rng.random();
                        let u2: f64 = rng.random();
                        let z = (-2.0_f64 * u1.ln()).sqrt()
                            * (2.0_f64 * std::f64::consts::PI * u2).cos();
                        mean + sigma * z
                    }
                    Distribution::Uniform => {
                        // For uniform, use the full tolerance band as the range
                        let half_band = tol_band / 2.0;
                        let center = contrib.nominal + (contrib.plus_tol - contrib.minus_tol) / 2.0;
                        rng.random_range((center - half_band)..=(center + half_band))
                    }
                    Distribution::Triangular => {
                        // For triangular, use the full tolerance band
                        let half_band = tol_band / 2.0;
                        let center = contrib.nominal + (contrib.plus_tol - contrib.minus_tol) / 2.0;
                        let min = center - half_band;
                        let max = center + half_band;
                        let mode = center;
                        // Triangular distribution using inverse transform
                        let u: f64 = rng.random();
                        let fc = (mode - min) / (max - min);
                        if u < fc {
                            min + (u * (max - min) * (mode - min)).sqrt()
                        } else {
                            max - ((1.0 - u) * (max - min) * (max - mode)).sqrt()
                        }
                    }
                };

                match contrib.direction {
                    Direction::Positive => result += value,
                    Direction::Negative => result -= value,
                }
            }

            results.push(result);
        }

        // Keep unsorted copy for CSV export
        let raw_samples = results.clone();

        // Calculate statistics
        results.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let n = results.len() as f64;
        let mean: f64 = results.iter().sum::<f64>() / n;
        let variance: f64 = results.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        let min = results.first().copied().unwrap_or(0.0);
        let max = results.last().copied().unwrap_or(0.0);

        // Calculate yield (percentage within spec)
        let in_spec = results
            .iter()
            .filter(|&x| *x >= self.target.lower_limit && *x <= self.target.upper_limit)
            .count();
        let yield_percent = (in_spec as f64 / n) * 100.0;

        // Percentiles
        let p2_5_idx = ((iterations as f64) * 0.025) as usize;
        let p97_5_idx = ((iterations as f64) * 0.975) as usize;
        let percentile_2_5 = results.get(p2_5_idx).copied().unwrap_or(min);
        let percentile_97_5 = results.get(p97_5_idx).copied().unwrap_or(max);

        // Calculate Pp and Ppk using sample std_dev (process performance indices)
        // These differ from Cp/Cpk in that they use actual sample statistics
        // rather than assumed process capability
        let (pp, ppk) = if std_dev > 0.0 {
            // Pp = (USL - LSL) / (6s) where s = sample std_dev
            let spec_range = self.target.upper_limit - self.target.lower_limit;
            let pp_val = spec_range / (6.0 * std_dev);

            // Ppk = min(USL-μ, μ-LSL) / (3s)
            let upper_margin = self.target.upper_limit - mean;
            let lower_margin = mean - self.target.lower_limit;
            let ppk_val = (upper_margin.min(lower_margin)) / (3.0 * std_dev);

            (Some(pp_val), Some(ppk_val))
        } else {
            (None, None)
        };

        (
            MonteCarloResult {
                iterations,
                mean,
                std_dev,
                min,
                max,
                yield_percent,
                percentile_2_5,
                percentile_97_5,
                pp,
                ppk,
            },
            raw_samples,
        )
    }

    /// Get number of contributors
    pub fn contributor_count(&self) -> usize {
        self.contributors.len()
    }

    /// Check if analysis has been run
    pub fn has_analysis(&self) -> bool {
        self.analysis_results.worst_case.is_some()
    }
}
