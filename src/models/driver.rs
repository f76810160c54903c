use serde::{Deserialize, Serialize};

use crate::models::delivery::{Delivery, DeliveryStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverProfile {
    #[serde(rename = "prenom", default)]
    pub first_name: Option<String>,
    #[serde(rename = "nom", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "telephone", default)]
    pub phone: Option<String>,
    #[serde(rename = "vehicleInfo", default)]
    pub vehicle_plate: Option<String>,
    #[serde(rename = "typeVehicule", default)]
    pub vehicle_type: Option<String>,
    #[serde(rename = "note", default)]
    pub rating: Option<f64>,
}

impl DriverProfile {
    pub fn full_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        if name.is_empty() {
            "Mon profil".to_string()
        } else {
            name.to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub package_id: String,
    pub client_name: String,
    pub delivered_at: Option<String>,
    pub status: Option<DeliveryStatus>,
}

impl From<&Delivery> for HistoryEntry {
    fn from(delivery: &Delivery) -> Self {
        Self {
            id: delivery.id,
            package_id: delivery.package_id(),
            client_name: delivery.client_name(),
            delivered_at: delivery.delivered_at.clone(),
            status: delivery.status,
        }
    }
}
