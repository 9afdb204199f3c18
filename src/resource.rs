use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Electricity in energy units (Wh / kWh).
pub const ELECTRICITY_CONSUMPTION: &str = "electricity.consumption";
/// Electricity in monetary units (pence).
pub const ELECTRICITY_COST: &str = "electricity.consumption.cost";
/// Gas in energy units (Wh / kWh).
pub const GAS_CONSUMPTION: &str = "gas.consumption";
/// Gas in monetary units (pence).
pub const GAS_COST: &str = "gas.consumption.cost";

/// A virtual metering entity as listed by `GET /resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "resourceId")]
    pub id: String,
    pub name: String,
    pub classifier: String,
}

/// A resource with its metadata, as returned by `GET /resource/{id}`.
///
/// Fields this crate does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDetails {
    #[serde(rename = "resourceId")]
    pub id: String,
    pub name: String,
    pub classifier: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "baseUnit")]
    pub base_unit: Option<String>,
    #[serde(default, rename = "resourceTypeId")]
    pub resource_type_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResourceDetails {
    pub fn resource(&self) -> Resource {
        Resource {
            id: self.id.clone(),
            name: self.name.clone(),
            classifier: self.classifier.clone(),
        }
    }
}
