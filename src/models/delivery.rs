use serde::{Deserialize, Serialize};

/// Address used when neither the delivery nor its client carries one.
pub const DEFAULT_DESTINATION_ADDRESS: &str = "Paris, France";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryStatus {
    #[serde(rename = "ASSIGNEE")]
    Assigned,
    #[serde(rename = "EN_COURS")]
    EnRoute,
    #[serde(rename = "LIVREE")]
    Delivered,
}

impl DeliveryStatus {
    pub fn as_wire(&self) -> &'static str {
        match self {
            DeliveryStatus::Assigned => "ASSIGNEE",
            DeliveryStatus::EnRoute => "EN_COURS",
            DeliveryStatus::Delivered => "LIVREE",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Client {
    #[serde(rename = "prenom", default)]
    pub first_name: Option<String>,
    #[serde(rename = "nom", default)]
    pub last_name: Option<String>,
    #[serde(rename = "adresse", default)]
    pub address: Option<String>,
    #[serde(rename = "telephone", default)]
    pub phone: Option<String>,
}

impl Client {
    pub fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() { None } else { Some(name) }
    }
}

/// A parcel assignment as the backend returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub id: i64,
    #[serde(rename = "codeBarre", default)]
    pub barcode: Option<String>,
    #[serde(rename = "adresse", default)]
    pub address: Option<String>,
    #[serde(rename = "statut", default)]
    pub status: Option<DeliveryStatus>,
    #[serde(default)]
    pub client: Option<Client>,
    #[serde(rename = "dateLivraison", default)]
    pub delivered_at: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl Delivery {
    pub fn package_id(&self) -> String {
        non_blank(self.barcode.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("LIV-{}", self.id))
    }

    pub fn destination_address(&self) -> String {
        non_blank(self.address.as_deref())
            .or_else(|| non_blank(self.client.as_ref().and_then(|c| c.address.as_deref())))
            .unwrap_or(DEFAULT_DESTINATION_ADDRESS)
            .to_string()
    }

    pub fn client_name(&self) -> String {
        self.client
            .as_ref()
            .and_then(Client::display_name)
            .unwrap_or_else(|| "Client".to_string())
    }
}

/// The delivery currently being worked, projected for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveDelivery {
    pub id: i64,
    pub package_id: String,
    pub destination_address: String,
    pub client_name: String,
    pub client_phone: Option<String>,
}

impl From<&Delivery> for ActiveDelivery {
    fn from(delivery: &Delivery) -> Self {
        Self {
            id: delivery.id,
            package_id: delivery.package_id(),
            destination_address: delivery.destination_address(),
            client_name: delivery.client_name(),
            client_phone: delivery
                .client
                .as_ref()
                .and_then(|c| non_blank(c.phone.as_deref()))
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ActiveDelivery, Delivery, DeliveryStatus};

    #[test]
    fn decodes_backend_payload() {
        let delivery: Delivery = serde_json::from_value(json!({
            "id": 12,
            "codeBarre": "PKG001234",
            "adresse": "10 rue de Rivoli, Paris",
            "statut": "ASSIGNEE",
            "client": { "prenom": "Claire", "nom": "Martin", "telephone": "0601020304" }
        }))
        .unwrap();

        assert_eq!(delivery.status, Some(DeliveryStatus::Assigned));

        let active = ActiveDelivery::from(&delivery);
        assert_eq!(active.package_id, "PKG001234");
        assert_eq!(active.destination_address, "10 rue de Rivoli, Paris");
        assert_eq!(active.client_name, "Claire Martin");
        assert_eq!(active.client_phone.as_deref(), Some("0601020304"));
    }

    #[test]
    fn falls_back_for_missing_fields() {
        let delivery: Delivery = serde_json::from_value(json!({
            "id": 7,
            "adresse": "  ",
            "client": { "adresse": "3 place Bellecour, Lyon" }
        }))
        .unwrap();

        let active = ActiveDelivery::from(&delivery);
        assert_eq!(active.package_id, "LIV-7");
        assert_eq!(active.destination_address, "3 place Bellecour, Lyon");
        assert_eq!(active.client_name, "Client");
        assert!(active.client_phone.is_none());

        let bare: Delivery = serde_json::from_value(json!({ "id": 8 })).unwrap();
        assert_eq!(bare.destination_address(), "Paris, France");
    }
}
