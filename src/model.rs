use crate::canopy::CanopyGrowth;
use crate::climate::{ClimateDay, ClimateSeries, WeatherDay, weather_from_toml_str};
use crate::errors::{SolanumError, SolanumResult};
use crate::output::{ResultsRow, ResultsTable};
use crate::parameters::ParameterSet;
use crate::stress::StressCalculator;
use crate::water::WaterBalance;
use std::path::Path;

// Share of global radiation that is photosynthetically active
const PAR_FRACTION: f64 = 0.5;
// Share of potential soil evaporation drawn from the bucket
const SOIL_EVAPORATION_SHARE: f64 = 0.5;
// Share of potential transpiration drawn from the bucket
const TRANSPIRATION_SHARE: f64 = 0.8;

/// Cross-day accumulators carried through the daily loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationState {
    pub day: i64,                      // Index of the last simulated day, -1 before the first
    pub days_after_emergence: i64,     // Days since emergence, 0 until then
    pub cum_heat_stress: f64,          // Sum of daily heat-stress indices
    pub cum_water_stress: f64,         // Sum of daily water-stress factors
    pub dry_matter: f64,               // Potential cumulative dry matter [g/m²]
    pub dry_matter_water_limited: f64, // Water-limited cumulative dry matter [g/m²]
    pub soil_water: f64,               // Current soil water [mm]
    pub c1: f64,                       // Canopy offset, held at zero
    pub c2: f64,                       // Canopy offset, held at zero
    pub variability: f64,              // Relative perturbation of canopy cover
}

impl SimulationState {
    pub fn initialize(params: &ParameterSet, variability: f64) -> Self {
        SimulationState {
            day: -1,
            days_after_emergence: 0,
            cum_heat_stress: 0.0,
            cum_water_stress: 0.0,
            dry_matter: 0.0,
            dry_matter_water_limited: 0.0,
            soil_water: params.soil_water.ism,
            c1: 0.0,
            c2: 0.0,
            variability,
        }
    }
}

// Outputs of one daily transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyOutput {
    pub fty_potential: f64,
    pub fty_water_limited: f64,
    pub canopy_water_limited: f64,
    pub harvest_index: f64,
    pub rue_water_limited: f64,
    pub soil_water: f64,
    pub water_stress: f64,
    pub actual_transpiration: f64, // Reported as ETC
}

/// Daily tuber crop simulation over one growing season.
pub struct SolanumModel {
    params: ParameterSet,
    climate: ClimateSeries,
    stress: StressCalculator,
    canopy: CanopyGrowth,
    water: WaterBalance,
    variability: f64,
    results: Option<ResultsTable>,
}

impl SolanumModel {
    pub fn new(weather: Vec<WeatherDay>, params: ParameterSet) -> Self {
        let climate = ClimateSeries::new(weather, &params);
        SolanumModel {
            stress: StressCalculator::new(&params),
            canopy: CanopyGrowth::new(&params),
            water: WaterBalance::from_params(&params),
            params,
            climate,
            variability: 0.0,
            results: None,
        }
    }

    /// Builds the model from a weather document (`[[weather]]` records) and a
    /// flat parameter document, both TOML.
    pub fn from_toml_strs(weather: &str, params: &str) -> SolanumResult<Self> {
        let params = ParameterSet::from_toml_str(params)?;
        let weather = weather_from_toml_str(weather)?;
        Ok(Self::new(weather, params))
    }

    // Fixed canopy perturbation applied on every day of the run
    pub fn with_variability(mut self, variability: f64) -> Self {
        self.variability = variability;
        self
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn climate(&self) -> &ClimateSeries {
        &self.climate
    }

    /// Advances `state` by one day and returns that day's outputs.
    pub fn step(&self, state: &mut SimulationState, day: &ClimateDay) -> DailyOutput {
        let growth = &self.params.growth;
        let w = &day.weather;
        let tav = w.tav();

        state.day += 1;
        state.days_after_emergence = (state.day - self.params.phenology.emergence_days).max(0);

        let hs = self.stress.heat_stress(tav);
        state.cum_heat_stress += hs;

        let mut canopy = self
            .canopy
            .canopy_cover(day.tt, growth.plant_density, state.variability);
        if state.days_after_emergence <= 0 {
            canopy = 0.0;
        }
        // Frost damage is evaluated but not yet applied to the canopy
        let (ccl, rf) = self.stress.frost_stress_factors(w.tmin);
        canopy = (canopy + state.c2 - state.c1).max(0.0);

        let t0 = self.water.potential_transpiration(w.eto, canopy);
        let e0 = self.water.potential_soil_evaporation(w.eto, t0);

        if state.day > 0 {
            let irrigation = if self.params.environment.uses_weather_irrigation() {
                w.irri
            } else {
                0.0
            };
            let update = self.water.update_soil_water_balance(
                state.soil_water,
                w.prec,
                irrigation,
                e0 * SOIL_EVAPORATION_SHARE,
                t0 * TRANSPIRATION_SHARE,
            );
            state.soil_water = update.moisture;
        }

        let actual_t = self.water.actual_transpiration(t0, state.soil_water);
        let ws = self.water.water_stress_factor(actual_t, t0);
        state.cum_water_stress += ws;

        let cw = self
            .water
            .canopy_cover_water_limited(state.cum_water_stress, canopy);
        let hi = self.canopy.harvest_index(day.tt, state.cum_heat_stress);
        let rue_w = self.canopy.effective_rue(growth.rue, day.tt, tav, 1.0, ws);
        let rue_p = self.canopy.potential_rue(growth.rue, day.tt, tav);

        let par = w.rad * PAR_FRACTION;
        state.dry_matter += self.canopy.biomass_increment(par, canopy, rue_p);
        state.dry_matter_water_limited += self.canopy.biomass_increment(par, cw, rue_w);

        let fty_p = state.dry_matter * hi / growth.dm_content;
        let fty_w = state.dry_matter_water_limited * hi / growth.dm_content;
        let hi_ws = self
            .canopy
            .effective_hi(hi, ws, CanopyGrowth::default_stress_threshold());

        log::debug!(
            "{} - HI: {:.3}, HI_ws: {:.3}, HS: {:.3}, WS: {:.3}, ccl: {:.2}, rf: {:.2}",
            w.date,
            hi,
            hi_ws,
            hs,
            ws,
            ccl,
            rf
        );

        DailyOutput {
            fty_potential: fty_p,
            fty_water_limited: fty_w,
            canopy_water_limited: cw,
            harvest_index: hi,
            rue_water_limited: rue_w,
            soil_water: state.soil_water,
            water_stress: ws,
            actual_transpiration: actual_t,
        }
    }

    /// Runs the whole season with the given variability draw, leaving the model untouched.
    pub fn simulate(&self, variability: f64) -> ResultsTable {
        let mut state = SimulationState::initialize(&self.params, variability);
        let mut table = ResultsTable::with_capacity(self.climate.len());
        for day in self.climate.days() {
            let out = self.step(&mut state, day);
            table.push(ResultsRow::new(day, &out));
        }
        table
    }

    pub fn run_simulation(&mut self) -> &ResultsTable {
        log::info!(
            "Running {} days from {} to {}",
            self.climate.len(),
            self.params.phenology.sowing,
            self.params.phenology.harvest
        );
        self.climate.log_summary();

        let table = self.simulate(self.variability);
        if let Some(last) = table.last() {
            log::info!(
                "Season finished: FTYP {:.3}, FTYW {:.3}",
                last.ftyp,
                last.ftyw
            );
        }
        self.results.insert(table)
    }

    pub fn results(&self) -> SolanumResult<&ResultsTable> {
        self.results.as_ref().ok_or(SolanumError::NotSimulated)
    }

    pub fn save_results_csv<P: AsRef<Path>>(&self, path: P) -> SolanumResult<()> {
        let path = path.as_ref();
        self.results()?.save_csv(path)?;
        log::info!("Results saved to {}", path.display());
        Ok(())
    }
}
