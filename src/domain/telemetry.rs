//! Meter value (telemetry) generation
//!
//! Produces OCPP 1.6 `MeterValue` shaped snapshots. Apart from the energy
//! register, which tracks the connector's cumulative reading, the sampled
//! values are fixed representative figures: the generator reproduces the
//! shape of a real meter, not its electrical behaviour.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Layout of generated snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterValueFormat {
    /// Per-phase voltage/current plus aggregates, with context and location
    #[default]
    Detailed,
    /// Flat scalar readings only
    Simple,
}

impl fmt::Display for MeterValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detailed => write!(f, "detailed"),
            Self::Simple => write!(f, "simple"),
        }
    }
}

impl FromStr for MeterValueFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detailed" => Ok(Self::Detailed),
            "simple" => Ok(Self::Simple),
            other => Err(format!("unknown meter value format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Measurand {
    #[serde(rename = "Voltage")]
    Voltage,
    #[serde(rename = "Current.Import")]
    CurrentImport,
    #[serde(rename = "Power.Active.Import")]
    PowerActiveImport,
    #[serde(rename = "Power.Offered")]
    PowerOffered,
    #[serde(rename = "SoC")]
    SoC,
    #[serde(rename = "Energy.Active.Import.Register")]
    EnergyActiveImportRegister,
    #[serde(rename = "Temperature")]
    Temperature,
    #[serde(rename = "RPM")]
    Rpm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitOfMeasure {
    Wh,
    #[serde(rename = "kWh")]
    KWh,
    W,
    #[serde(rename = "kW")]
    Kw,
    A,
    V,
    Percent,
    Celsius,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    L1,
    L2,
    L3,
    #[serde(rename = "L1-N")]
    L1N,
    #[serde(rename = "L2-N")]
    L2N,
    #[serde(rename = "L3-N")]
    L3N,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Location {
    Outlet,
    EV,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadingContext {
    #[serde(rename = "Sample.Periodic")]
    SamplePeriodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueFormat {
    Raw,
}

/// One reading inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ReadingContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ValueFormat>,
    pub measurand: Measurand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitOfMeasure>,
}

impl SampledValue {
    fn new(measurand: Measurand, value: impl Into<String>, unit: Option<UnitOfMeasure>) -> Self {
        Self {
            value: value.into(),
            context: None,
            format: None,
            measurand,
            phase: None,
            location: None,
            unit,
        }
    }

    fn periodic(mut self, location: Location) -> Self {
        self.context = Some(ReadingContext::SamplePeriodic);
        self.format = Some(ValueFormat::Raw);
        self.location = Some(location);
        self
    }

    fn on_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// A timestamped set of readings, serialised as an OCPP `MeterValue`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub timestamp: DateTime<Utc>,
    pub sampled_value: Vec<SampledValue>,
    #[serde(skip)]
    pub format: MeterValueFormat,
}

impl TelemetrySnapshot {
    /// Energy register reading normalised to Wh
    pub fn energy_wh(&self) -> Option<u64> {
        let sample = self
            .sampled_value
            .iter()
            .find(|s| s.measurand == Measurand::EnergyActiveImportRegister)?;
        let value: f64 = sample.value.parse().ok()?;
        let wh = match sample.unit {
            Some(UnitOfMeasure::KWh) => value * 1000.0,
            _ => value,
        };
        Some(wh.round() as u64)
    }

    pub fn sample(&self, measurand: Measurand) -> Option<&SampledValue> {
        self.sampled_value.iter().find(|s| s.measurand == measurand)
    }
}

/// Build a snapshot for the given cumulative reading (Wh).
pub fn generate(meter_value: u64, format: MeterValueFormat) -> TelemetrySnapshot {
    let sampled_value = match format {
        MeterValueFormat::Detailed => detailed_samples(meter_value),
        MeterValueFormat::Simple => simple_samples(meter_value),
    };

    TelemetrySnapshot {
        timestamp: Utc::now(),
        sampled_value,
        format,
    }
}

fn detailed_samples(meter_value: u64) -> Vec<SampledValue> {
    use Measurand::*;
    use UnitOfMeasure::*;

    let outlet = |measurand, value: &str, unit| {
        SampledValue::new(measurand, value, Some(unit)).periodic(Location::Outlet)
    };

    vec![
        outlet(Voltage, "229.8", V).on_phase(Phase::L1N),
        outlet(Voltage, "230.4", V).on_phase(Phase::L2N),
        outlet(Voltage, "231.1", V).on_phase(Phase::L3N),
        outlet(CurrentImport, "15.9", A).on_phase(Phase::L1),
        outlet(CurrentImport, "16.1", A).on_phase(Phase::L2),
        outlet(CurrentImport, "16.0", A).on_phase(Phase::L3),
        outlet(PowerActiveImport, "11040", W),
        outlet(PowerOffered, "11000", W),
        SampledValue::new(SoC, "52", Some(Percent)).periodic(Location::EV),
        outlet(EnergyActiveImportRegister, &meter_value.to_string(), Wh),
    ]
}

fn simple_samples(meter_value: u64) -> Vec<SampledValue> {
    use Measurand::*;
    use UnitOfMeasure::*;

    let kwh = format!("{:.3}", meter_value as f64 / 1000.0);

    vec![
        SampledValue::new(EnergyActiveImportRegister, kwh, Some(KWh)),
        SampledValue::new(PowerActiveImport, "11.04", Some(Kw)),
        SampledValue::new(SoC, "52", Some(Percent)),
        SampledValue::new(Temperature, "28.5", Some(Celsius)),
        SampledValue::new(CurrentImport, "48", Some(A)),
        SampledValue::new(Rpm, "0", None),
        SampledValue::new(Voltage, "230", Some(V)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detailed_snapshot_has_per_phase_readings() {
        let snapshot = generate(1234, MeterValueFormat::Detailed);

        assert_eq!(snapshot.format, MeterValueFormat::Detailed);
        assert_eq!(snapshot.sampled_value.len(), 10);
        assert_eq!(snapshot.energy_wh(), Some(1234));

        let phases: Vec<_> = snapshot
            .sampled_value
            .iter()
            .filter(|s| s.measurand == Measurand::Voltage)
            .filter_map(|s| s.phase)
            .collect();
        assert_eq!(phases, vec![Phase::L1N, Phase::L2N, Phase::L3N]);
        assert!(snapshot
            .sampled_value
            .iter()
            .all(|s| s.context == Some(ReadingContext::SamplePeriodic)));
    }

    #[test]
    fn simple_snapshot_is_flat_and_in_kwh() {
        let snapshot = generate(1500, MeterValueFormat::Simple);

        assert_eq!(snapshot.sampled_value.len(), 7);
        assert!(snapshot
            .sampled_value
            .iter()
            .all(|s| s.phase.is_none() && s.context.is_none() && s.location.is_none()));

        let energy = snapshot
            .sample(Measurand::EnergyActiveImportRegister)
            .expect("energy sample");
        assert_eq!(energy.value, "1.500");
        assert_eq!(energy.unit, Some(UnitOfMeasure::KWh));
        assert_eq!(snapshot.energy_wh(), Some(1500));
        assert!(snapshot.sample(Measurand::Rpm).is_some());
    }

    #[test]
    fn snapshot_serialises_as_ocpp_meter_value() {
        let snapshot = generate(42, MeterValueFormat::Detailed);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json["timestamp"].is_string());
        assert!(json.get("format").is_none());
        let last = &json["sampledValue"][9];
        assert_eq!(last["measurand"], "Energy.Active.Import.Register");
        assert_eq!(last["value"], "42");
        assert_eq!(last["unit"], "Wh");
        assert_eq!(last["context"], "Sample.Periodic");
        assert_eq!(json["sampledValue"][0]["phase"], "L1-N");
    }

    #[test]
    fn format_parses_and_displays() {
        assert_eq!("Simple".parse::<MeterValueFormat>(), Ok(MeterValueFormat::Simple));
        assert_eq!(MeterValueFormat::default().to_string(), "detailed");
        assert!("verbose".parse::<MeterValueFormat>().is_err());
    }
}
