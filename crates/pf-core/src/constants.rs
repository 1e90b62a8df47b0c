//! Constants used throughout the engine.
//!
//! All internal computation runs in feet, cubic feet per second, cubic feet,
//! mass per cubic foot, and integer seconds. These factors convert between
//! that basis and the user-facing unit systems.

/// Current engine version, recorded in the binary output file.
pub const VERSION: i32 = 30000;

/// Magic number identifying a binary output file.
pub const MAGIC_NUMBER: i32 = 1236385461;

/// Marker for properties not yet assigned a value.
pub const MISSING: f64 = -999999999.9;

/// Gravitational acceleration (ft/sec^2).
pub const GRAVITY: f64 = 32.2;

/// Kinematic viscosity of water at 20 deg C (ft^2/sec).
pub const VISCOSITY: f64 = 1.1e-5;

/// Molecular diffusivity of chlorine at 20 deg C (ft^2/sec).
pub const DIFFUSIVITY: f64 = 1.3e-8;

// Conversion factors for US flow units
pub const GPM_PER_CFS: f64 = 448.831;
pub const MGD_PER_CFS: f64 = 0.64632;
pub const IMGD_PER_CFS: f64 = 0.5382;
pub const AFD_PER_CFS: f64 = 1.9837;

// Conversion factors for SI flow units
pub const LPS_PER_CFS: f64 = 28.317;
pub const LPM_PER_CFS: f64 = 1699.0;
pub const CMH_PER_CFS: f64 = 101.94;
pub const CMD_PER_CFS: f64 = 2446.6;
pub const MLD_PER_CFS: f64 = 2.4466;

// Conversion factors for SI quantities
pub const L_PER_FT3: f64 = 28.317;
pub const M3_PER_FT3: f64 = 0.028317;
pub const M_PER_FT: f64 = 0.3048;
pub const KPA_PER_PSI: f64 = 6.895;
pub const KW_PER_HP: f64 = 0.7457;

// Miscellaneous factors
pub const SEC_PER_DAY: f64 = 86400.0;
pub const PSI_PER_FT: f64 = 0.4333;
pub const FT3_PER_L: f64 = 0.0353145;

/// Minimum head loss gradient (ft per cfs).
pub const MIN_GRADIENT: f64 = 1.0e-6;

/// Effectively infinite flow resistance, used to pin closed links.
pub const HIGH_RESISTANCE: f64 = 1.0e8;

/// Negligible head value (ft).
pub const HEAD_EPSILON: f64 = 1.0e-6;

/// Flow regarded as zero in a closed link (cfs).
pub const ZERO_FLOW: f64 = 1.0e-6;
