use crate::errors::{SolanumError, SolanumResult};
use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Deserializer, Serialize};

// Keys every raw parameter mapping must carry
pub const REQUIRED_KEYS: [&str; 27] = [
    "sowing",
    "harvest",
    "EDay",
    "plantDensity",
    "wmax",
    "tm",
    "te",
    "A",
    "tu",
    "b",
    "RUE",
    "DMCont",
    "Tb",
    "To",
    "Tu",
    "Tcr",
    "Tld",
    "Trg",
    "Pc",
    "w",
    "Soil_depth",
    "FC",
    "WP",
    "ISM",
    "CO2AirConcent",
    "useRefIrri",
    "numrep",
];

// Width of the thermal-time bracket searched above te when calibrating t50
const T50_BRACKET_WIDTH: f64 = 1000.0;
// Relative step size at which the calibration stops
const T50_TOLERANCE: f64 = 1e-12;
// Hard stop for the calibration loop
const T50_MAX_ITERATIONS: usize = 10_000;

// Flat parameter mapping as supplied by the user configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawParameters {
    #[serde(deserialize_with = "deserialize_date")]
    pub sowing: NaiveDate, // Sowing date
    #[serde(deserialize_with = "deserialize_date")]
    pub harvest: NaiveDate, // Harvest date
    #[serde(rename = "EDay")]
    pub emergence_days: i64, // Days from sowing to emergence
    #[serde(rename = "plantDensity")]
    pub plant_density: f64, // Plants per square metre
    pub wmax: f64, // Maximum canopy cover [-]
    pub tm: f64,   // Thermal time of maximum canopy growth rate [°C day]
    pub te: f64,   // Thermal time at maximum canopy cover [°C day]
    #[serde(rename = "A")]
    pub hi_max: f64, // Asymptotic harvest index [-]
    pub tu: f64, // Thermal time at the harvest-index inflection [°C day]
    pub b: f64,  // Harvest-index curve spread [°C day]
    #[serde(rename = "RUE")]
    pub rue: f64, // Radiation use efficiency [g/MJ]
    #[serde(rename = "DMCont")]
    pub dm_content: f64, // Tuber dry matter content [-]
    #[serde(rename = "Tb")]
    pub tb: f64, // Base temperature [°C]
    #[serde(rename = "To")]
    pub to: f64, // Optimum temperature [°C]
    #[serde(rename = "Tu")]
    pub t_upper: f64, // Upper cardinal temperature [°C]
    #[serde(rename = "Tcr")]
    pub tcr: f64, // Frost recovery threshold [°C]
    #[serde(rename = "Tld")]
    pub tld: f64, // Lethal frost temperature [°C]
    #[serde(rename = "Trg")]
    pub trg: f64, // Regrowth temperature [°C]
    #[serde(rename = "Pc")]
    pub pc: f64, // Critical photoperiod [h]
    pub w: f64, // Photoperiod sensitivity [-]
    #[serde(rename = "Soil_depth")]
    pub soil_depth: f64, // Rooting depth [m]
    #[serde(rename = "FC")]
    pub fc: f64, // Field capacity [m³/m³]
    #[serde(rename = "WP")]
    pub wp: f64, // Wilting point [m³/m³]
    #[serde(rename = "ISM")]
    pub ism: f64, // Initial soil moisture [m³/m³]
    #[serde(rename = "CO2AirConcent")]
    pub co2_concentration: f64, // Atmospheric CO2 [ppm]
    #[serde(rename = "useRefIrri")]
    pub use_ref_irri: i64, // 0 = apply the weather table's irrigation column
    pub numrep: i64, // Replicate count
}

impl RawParameters {
    /// Build the raw mapping from a flat TOML table.
    ///
    /// Every key in [`REQUIRED_KEYS`] must be present; the first absent key is
    /// reported by name.
    pub fn from_table(table: toml::Table) -> SolanumResult<Self> {
        if let Some(key) = REQUIRED_KEYS.iter().find(|k| !table.contains_key(**k)) {
            return Err(SolanumError::MissingParameter(key.to_string()));
        }
        Ok(RawParameters::deserialize(toml::Value::Table(table))?)
    }

    pub fn from_toml_str(text: &str) -> SolanumResult<Self> {
        let table: toml::Table = text.parse()?;
        Self::from_table(table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Phenology {
    pub sowing: NaiveDate,
    pub harvest: NaiveDate,
    pub emergence_days: i64,
    pub duration: i64, // Days from sowing to harvest, both inclusive
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Growth {
    pub plant_density: f64,
    pub wmax: f64,
    pub tm: f64,
    pub te: f64,
    pub hi_max: f64,
    pub tu: f64,
    pub b: f64,
    pub rue: f64,
    pub dm_content: f64,
    pub t50: f64, // Thermal time where the wmax-scaled canopy curve term equals 0.5
    pub d: f64,   // t50 - te
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Temperature {
    pub tb: f64,
    pub to: f64,
    pub tu: f64,
    pub tcr: f64,
    pub tld: f64,
    pub trg: f64,
    pub a: f64, // Exponent of the beta-shaped temperature response
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Photoperiod {
    pub pc: f64,
    pub w: f64,
}

// Soil water limits, fractions as supplied and depth equivalents [mm]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SoilWater {
    pub depth: f64,
    pub volume: f64,
    pub fc_fraction: f64,
    pub wp_fraction: f64,
    pub cl_fraction: f64,
    pub ism_fraction: f64,
    pub fc: f64,
    pub wp: f64,
    pub cl: f64,
    pub ism: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Environment {
    pub co2_concentration: f64,
    pub co2_effect: f64,
    pub use_ref_irri: i64,
}

impl Environment {
    // Irrigation is read from the weather table only when the flag is 0
    pub fn uses_weather_irrigation(&self) -> bool {
        self.use_ref_irri == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Simulation {
    pub numrep: i64,
}

/// Derived, read-only parameter set consumed by every submodel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSet {
    pub phenology: Phenology,
    pub growth: Growth,
    pub temperature: Temperature,
    pub photoperiod: Photoperiod,
    pub soil_water: SoilWater,
    pub environment: Environment,
    pub simulation: Simulation,
}

impl ParameterSet {
    /// Derive the grouped parameter set from the raw mapping.
    ///
    /// Pure: the same raw mapping always yields a bit-identical result.
    /// Fails with [`SolanumError::InvalidParameter`] when the emergence date
    /// falls outside the representable calendar.
    pub fn derive(raw: &RawParameters) -> SolanumResult<Self> {
        if emergence_date(raw.sowing, raw.emergence_days).is_none() {
            return Err(SolanumError::InvalidParameter {
                key: "EDay".to_string(),
                reason: format!(
                    "{} days after sowing ({}) is outside the supported date range",
                    raw.emergence_days, raw.sowing
                ),
            });
        }
        let duration = (raw.harvest - raw.sowing).num_days() + 1;

        let cl_fraction = critical_limit_fraction(raw.fc, raw.wp);
        let volume = soil_volume(raw.soil_depth);

        let t50 = calibrate_t50(
            raw.te,
            raw.te + T50_BRACKET_WIDTH,
            raw.wmax,
            raw.te,
            raw.tm,
        );

        Ok(ParameterSet {
            phenology: Phenology {
                sowing: raw.sowing,
                harvest: raw.harvest,
                emergence_days: raw.emergence_days,
                duration,
            },
            growth: Growth {
                plant_density: raw.plant_density,
                wmax: raw.wmax,
                tm: raw.tm,
                te: raw.te,
                hi_max: raw.hi_max,
                tu: raw.tu,
                b: raw.b,
                rue: raw.rue,
                dm_content: raw.dm_content,
                t50,
                d: t50 - raw.te,
            },
            temperature: Temperature {
                tb: raw.tb,
                to: raw.to,
                tu: raw.t_upper,
                tcr: raw.tcr,
                tld: raw.tld,
                trg: raw.trg,
                a: temperature_exponent(raw.tb, raw.to, raw.t_upper),
            },
            photoperiod: Photoperiod {
                pc: raw.pc,
                w: raw.w,
            },
            soil_water: SoilWater {
                depth: raw.soil_depth,
                volume,
                fc_fraction: raw.fc,
                wp_fraction: raw.wp,
                cl_fraction,
                ism_fraction: raw.ism,
                fc: to_depth_equivalent(volume, raw.fc),
                wp: to_depth_equivalent(volume, raw.wp),
                cl: to_depth_equivalent(volume, cl_fraction),
                ism: to_depth_equivalent(volume, raw.ism),
            },
            environment: Environment {
                co2_concentration: raw.co2_concentration,
                co2_effect: co2_effect(raw.co2_concentration),
                use_ref_irri: raw.use_ref_irri,
            },
            simulation: Simulation {
                numrep: raw.numrep,
            },
        })
    }

    pub fn from_toml_str(text: &str) -> SolanumResult<Self> {
        let raw = RawParameters::from_toml_str(text)?;
        Self::derive(&raw)
    }

    // Grouped dump of the derived parameters
    pub fn to_toml_string(&self) -> SolanumResult<String> {
        Ok(toml::to_string(self)?)
    }
}

// Sowing shifted by the emergence offset, `None` past the calendar limits
pub fn emergence_date(sowing: NaiveDate, emergence_days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(emergence_days).and_then(|days| sowing.checked_add_signed(days))
}

/// Critical soil-water fraction, halfway between field capacity and wilting point.
pub fn critical_limit_fraction(fc: f64, wp: f64) -> f64 {
    fc - 0.5 * (fc - wp)
}

pub fn soil_volume(depth: f64) -> f64 {
    10000.0 * depth
}

// Fraction of the soil volume expressed as a water depth [mm]
pub fn to_depth_equivalent(volume: f64, fraction: f64) -> f64 {
    (volume * fraction) / 1000.0
}

/// Objective of the t50 calibration: canopy shortfall from one half at thermal time `x`.
pub fn half_cover_objective(x: f64, wmax: f64, te: f64, tm: f64) -> f64 {
    0.5 - wmax * (1.0 + (te - x) / (te - tm)) * (x / te).powf(te / (te - tm))
}

/**
Locates t50 on the bracket `[lower, upper]`.

The trial point starts at the upper end. Each pass keeps the half whose
objective changes sign relative to the current lower end, and the loop stops
once the relative step falls below 1e-12 or the objective is exactly zero.
The historical outputs depend on this exact sequence of trial points.

# Returns
The last trial point.
*/
pub fn calibrate_t50(lower: f64, upper: f64, wmax: f64, te: f64, tm: f64) -> f64 {
    let mut a = lower;
    let mut b = upper;
    let mut x = b;
    let mut d = (a + b) / 2.0;

    for _ in 0..T50_MAX_ITERATIONS {
        if (x - d).abs() / x.abs() < T50_TOLERANCE {
            return x;
        }
        let fx = half_cover_objective(x, wmax, te, tm);
        if fx == 0.0 {
            return x;
        }

        let fa = half_cover_objective(a, wmax, te, tm);
        if fx * fa < 0.0 {
            b = x;
        } else {
            a = x;
        }

        d = x;
        x = (a + b) / 2.0;
    }

    log::warn!(
        "t50 calibration did not converge after {} iterations, using {}",
        T50_MAX_ITERATIONS,
        x
    );
    x
}

/// Exponent `a` of the beta temperature response, so that the curve peaks at `to`.
pub fn temperature_exponent(tb: f64, to: f64, tu: f64) -> f64 {
    2f64.ln() / ((tu - tb) / (to - tb)).ln()
}

/// RUE multiplier for atmospheric CO2 [ppm], rounded to one decimal.
pub fn co2_effect(concentration: f64) -> f64 {
    let effect = if concentration < 330.0 {
        0.0031 * concentration + 0.0093
    } else if concentration < 880.0 {
        0.0007 * concentration + 0.79
    } else {
        0.000008 * concentration + 1.4223
    };
    (effect * 10.0).round_ties_even() / 10.0
}

/// Parses `YYYY-MM-DD` or day-first `DD/MM/YYYY`.
pub fn parse_date(text: &str) -> SolanumResult<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
        .map_err(|_| SolanumError::InvalidDate(text.to_string()))
}

// Accepts a quoted date string or a bare TOML date
pub(crate) fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match toml::Value::deserialize(deserializer)? {
        toml::Value::String(s) => s,
        toml::Value::Datetime(dt) => dt.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a date, found {}",
                other.type_str()
            )));
        }
    };
    parse_date(&text).map_err(serde::de::Error::custom)
}
