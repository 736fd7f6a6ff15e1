use crate::climate::ClimateDay;
use crate::errors::SolanumResult;
use crate::model::DailyOutput;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// Column order of the results table; ETC holds actual transpiration
pub const RESULT_COLUMNS: [&str; 15] = [
    "Date", "Tmin", "Tmax", "TT", "ETo", "Prec", "Rad", "FTYP", "FTYW", "CCw", "HI_HS", "RUEw",
    "ASWC", "WS", "ETC",
];

// One simulated day: season weather joined with the day's outputs, fields in RESULT_COLUMNS order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultsRow {
    pub date: NaiveDate,
    pub tmin: f64,
    pub tmax: f64,
    pub tt: f64,
    pub eto: f64,
    pub prec: f64,
    pub rad: f64,
    pub ftyp: f64, // Potential fresh tuber yield [t/ha]
    pub ftyw: f64, // Water-limited fresh tuber yield [t/ha]
    pub ccw: f64,
    pub hi_hs: f64,
    pub ruew: f64,
    pub aswc: f64,
    pub ws: f64,
    pub etc: f64,
}

impl ResultsRow {
    pub fn new(day: &ClimateDay, out: &DailyOutput) -> Self {
        let w = &day.weather;
        ResultsRow {
            date: w.date,
            tmin: w.tmin,
            tmax: w.tmax,
            tt: day.tt,
            eto: w.eto,
            prec: w.prec,
            rad: w.rad,
            ftyp: out.fty_potential,
            ftyw: out.fty_water_limited,
            ccw: out.canopy_water_limited,
            hi_hs: out.harvest_index,
            ruew: out.rue_water_limited,
            aswc: out.soil_water,
            ws: out.water_stress,
            etc: out.actual_transpiration,
        }
    }

    // Numeric columns in table order, Date excluded
    pub fn values(&self) -> [f64; 14] {
        [
            self.tmin, self.tmax, self.tt, self.eto, self.prec, self.rad, self.ftyp, self.ftyw,
            self.ccw, self.hi_hs, self.ruew, self.aswc, self.ws, self.etc,
        ]
    }
}

/// Full-season results, one row per simulated day in date order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    rows: Vec<ResultsRow>,
}

impl ResultsTable {
    pub fn with_capacity(n: usize) -> Self {
        ResultsTable {
            rows: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, row: ResultsRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ResultsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&ResultsRow> {
        self.rows.last()
    }

    /// Values of a numeric column by its header name, `None` for unknown names and `Date`.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = RESULT_COLUMNS.iter().skip(1).position(|c| *c == name)?;
        Some(self.rows.iter().map(|r| r.values()[index]).collect())
    }

    pub fn write_csv<W: Write>(&self, writer: &mut W) -> SolanumResult<()> {
        writeln!(writer, "{}", RESULT_COLUMNS.join(","))?;
        for row in &self.rows {
            let values: Vec<String> = row.values().iter().map(|v| v.to_string()).collect();
            writeln!(writer, "{},{}", row.date, values.join(","))?;
        }
        Ok(())
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> SolanumResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::WeatherDay;

    fn row(day: u32, ftyp: f64) -> ResultsRow {
        let climate = ClimateDay {
            weather: WeatherDay {
                date: NaiveDate::from_ymd_opt(2023, 6, day).unwrap(),
                tmin: 10.0,
                tmax: 20.0,
                eto: 3.0,
                prec: 1.5,
                rad: 18.0,
                irri: 0.0,
            },
            tt: 120.0,
        };
        let out = DailyOutput {
            fty_potential: ftyp,
            fty_water_limited: ftyp / 2.0,
            canopy_water_limited: 0.4,
            harvest_index: 0.3,
            rue_water_limited: 2.5,
            soil_water: 60.0,
            water_stress: 0.0,
            actual_transpiration: 1.25,
        };
        ResultsRow::new(&climate, &out)
    }

    #[test]
    fn columns_are_addressable_by_name() {
        let mut table = ResultsTable::with_capacity(2);
        table.push(row(1, 2.0));
        table.push(row(2, 3.0));
        assert_eq!(table.column("FTYP"), Some(vec![2.0, 3.0]));
        assert_eq!(table.column("FTYW"), Some(vec![1.0, 1.5]));
        assert_eq!(table.column("ETC"), Some(vec![1.25, 1.25]));
        assert_eq!(table.column("TT"), Some(vec![120.0, 120.0]));
        assert_eq!(table.column("Date"), None);
        assert_eq!(table.column("missing"), None);
    }

    #[test]
    fn writes_header_and_rows() {
        let mut table = ResultsTable::default();
        table.push(row(1, 2.0));
        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Tmin,Tmax,TT,ETo,Prec,Rad,FTYP,FTYW,CCw,HI_HS,RUEw,ASWC,WS,ETC")
        );
        assert_eq!(
            lines.next(),
            Some("2023-06-01,10,20,120,3,1.5,18,2,1,0.4,0.3,2.5,60,0,1.25")
        );
        assert_eq!(lines.next(), None);
    }
}
