use crate::errors::{SolanumError, SolanumResult};
use crate::parameters::{ParameterSet, Temperature, deserialize_date, emergence_date};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Columns every weather record must carry; Irri is optional
pub const WEATHER_COLUMNS: [&str; 6] = ["Date", "Tmin", "Tmax", "ETo", "Prec", "Rad"];

// Observed weather for one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    #[serde(rename = "Date", deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    #[serde(rename = "Tmin")]
    pub tmin: f64, // Minimum air temperature [°C]
    #[serde(rename = "Tmax")]
    pub tmax: f64, // Maximum air temperature [°C]
    #[serde(rename = "ETo")]
    pub eto: f64, // Reference evapotranspiration [mm/day]
    #[serde(rename = "Prec")]
    pub prec: f64, // Precipitation [mm/day]
    #[serde(rename = "Rad")]
    pub rad: f64, // Solar radiation [MJ/m²/day]
    #[serde(rename = "Irri", default)]
    pub irri: f64, // Applied irrigation [mm/day]
}

impl WeatherDay {
    // Daily mean temperature
    pub fn tav(&self) -> f64 {
        (self.tmin + self.tmax) / 2.0
    }
}

/// Loads weather records from a TOML document holding a `[[weather]]` array.
///
/// A record without a `Date`, or without any other required column, is a
/// configuration error naming the absent field.
pub fn weather_from_toml_str(text: &str) -> SolanumResult<Vec<WeatherDay>> {
    let mut document: toml::Table = text.parse()?;
    let rows = match document.remove("weather") {
        Some(toml::Value::Array(rows)) => rows,
        Some(other) => {
            return Err(SolanumError::Config(format!(
                "'weather' must be an array of tables, found {}",
                other.type_str()
            )));
        }
        None => {
            return Err(SolanumError::Config(
                "no [[weather]] records found".to_string(),
            ));
        }
    };

    rows.into_iter()
        .map(|row| {
            let table = match row {
                toml::Value::Table(table) => table,
                other => {
                    return Err(SolanumError::Config(format!(
                        "weather record must be a table, found {}",
                        other.type_str()
                    )));
                }
            };
            if let Some(column) = WEATHER_COLUMNS.iter().find(|c| !table.contains_key(**c)) {
                return Err(SolanumError::MissingWeatherField(column.to_string()));
            }
            Ok(WeatherDay::deserialize(toml::Value::Table(table))?)
        })
        .collect()
}

/// Breakpoints of the trapezoidal thermal-time weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardinalTemperatures {
    pub base: f64,
    pub lower_optimum: f64,
    pub upper_optimum: f64,
    pub ceiling: f64,
}

impl CardinalTemperatures {
    pub fn new(base: f64, lower_optimum: f64, upper_optimum: f64, ceiling: f64) -> Self {
        CardinalTemperatures {
            base,
            lower_optimum,
            upper_optimum,
            ceiling,
        }
    }

    // Plateau ends 11 degrees below the upper cardinal temperature
    pub fn from_temperature(temp: &Temperature) -> Self {
        Self::new(temp.tb, temp.to, temp.tu - 11.0, temp.tu)
    }
}

/// Weight `k(Y)` applied to the mean temperature `y` when accumulating thermal time.
pub fn thermal_weight(y: f64, c: &CardinalTemperatures) -> f64 {
    if y < c.base || y > c.ceiling {
        return 0.0;
    }
    if y < c.lower_optimum {
        let b1 = 1.0 / (c.lower_optimum - c.base);
        let a1 = -b1 * c.base;
        a1 + b1 * y
    } else if y > c.upper_optimum {
        let b2 = 1.0 / (c.upper_optimum - c.ceiling);
        let a2 = -b2 * c.ceiling;
        a2 + b2 * y
    } else {
        1.0
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/**
Cumulative thermal time for each day of `days`.

`days` must be restricted to `[sowing, harvest]` and sorted by date. Days before
`sowing + emergence_days` stay at zero. Inside the window each day adds
`k(Y) * (Y - base)`, where `base` is 2 when the median minimum temperature of
the window exceeds 10 °C, else 0.

# Returns
One value per input day. All zeros when the post-emergence window is empty or
the emergence date lies beyond the calendar.
*/
pub fn thermal_time(
    days: &[WeatherDay],
    sowing: NaiveDate,
    harvest: NaiveDate,
    emergence_days: i64,
    cardinals: &CardinalTemperatures,
) -> Vec<f64> {
    let mut tt = vec![0.0; days.len()];
    let Some(emergence) = emergence_date(sowing, emergence_days) else {
        log::warn!(
            "Emergence {} days after {} is out of range; thermal time stays at zero",
            emergence_days,
            sowing
        );
        return tt;
    };
    let in_window = |d: &WeatherDay| d.date >= emergence && d.date <= harvest;

    let mut window_tmin: Vec<f64> = days.iter().filter(|d| in_window(*d)).map(|d| d.tmin).collect();
    if window_tmin.is_empty() {
        log::warn!(
            "No weather days between emergence ({}) and harvest ({}); thermal time stays at zero",
            emergence,
            harvest
        );
        return tt;
    }

    let base = if median(&mut window_tmin) > 10.0 { 2.0 } else { 0.0 };

    let mut cumulative = 0.0;
    for (i, day) in days.iter().enumerate() {
        if !in_window(day) {
            continue;
        }
        let y = day.tav();
        cumulative += thermal_weight(y, cardinals) * (y - base);
        tt[i] = cumulative;
    }
    tt
}

// Weather for one day of the season with its cumulative thermal time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateDay {
    pub weather: WeatherDay,
    pub tt: f64, // Cumulative thermal time [°C day]
}

/// Season weather restricted to `[sowing, harvest]` with thermal time attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateSeries {
    days: Vec<ClimateDay>,
}

impl ClimateSeries {
    pub fn new(weather: Vec<WeatherDay>, params: &ParameterSet) -> Self {
        let phen = &params.phenology;
        let mut season: Vec<WeatherDay> = weather
            .into_iter()
            .filter(|d| d.date >= phen.sowing && d.date <= phen.harvest)
            .collect();
        season.sort_by_key(|d| d.date);

        let cardinals = CardinalTemperatures::from_temperature(&params.temperature);
        let tt = thermal_time(
            &season,
            phen.sowing,
            phen.harvest,
            phen.emergence_days,
            &cardinals,
        );

        let days = season
            .into_iter()
            .zip(tt)
            .map(|(weather, tt)| ClimateDay { weather, tt })
            .collect();
        ClimateSeries { days }
    }

    pub fn days(&self) -> &[ClimateDay] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_thermal_time(&self) -> f64 {
        self.days.last().map(|d| d.tt).unwrap_or(0.0)
    }

    pub fn log_summary(&self) {
        match (self.days.first(), self.days.last()) {
            (Some(first), Some(last)) => log::info!(
                "Simulation period {} to {}: {} days, total thermal time {:.2}",
                first.weather.date,
                last.weather.date,
                self.days.len(),
                self.total_thermal_time()
            ),
            _ => log::info!("Simulation period is empty"),
        }
    }
}
