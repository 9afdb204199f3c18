use serde::Deserialize;

use crate::error::{Error, Result};
use crate::readings::Reading;

/// Unit rate and daily standing charge of the active tariff plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tariff {
    pub rate: f64,
    pub standing: f64,
}

impl Tariff {
    /// Cost of a consumption reading at this tariff's unit rate.
    ///
    /// Readings in `W` are converted to kilo-units first.
    pub fn cost(&self, reading: &Reading) -> f64 {
        let amount = if reading.unit == "W" {
            reading.value / 1000.0
        } else {
            reading.value
        };
        amount * self.rate
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TariffReply {
    data: Vec<TariffEntry>,
}

#[derive(Debug, Deserialize)]
struct TariffEntry {
    #[serde(default)]
    plan: Vec<TariffPlan>,
}

#[derive(Debug, Deserialize)]
struct TariffPlan {
    #[serde(rename = "planDetail", default)]
    plan_detail: Vec<PlanDetail>,
}

#[derive(Debug, Deserialize)]
struct PlanDetail {
    #[serde(default)]
    rate: Option<f64>,
    #[serde(default)]
    standing: Option<f64>,
}

impl TariffReply {
    pub(crate) fn into_tariff(self, url: &str) -> Result<Tariff> {
        let details = self
            .data
            .into_iter()
            .next()
            .and_then(|entry| entry.plan.into_iter().next())
            .map(|plan| plan.plan_detail)
            .ok_or_else(|| Error::parse(url, "tariff reply has no plan"))?;

        let rate = details.iter().find_map(|d| d.rate);
        let standing = details.iter().find_map(|d| d.standing);
        match (rate, standing) {
            (Some(rate), Some(standing)) => Ok(Tariff { rate, standing }),
            _ => Err(Error::parse(url, "tariff plan lacks rate or standing charge")),
        }
    }
}
