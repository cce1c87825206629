use serde::{Deserialize, Serialize};

/// Input-only reference directory types (spec §3). The core reads these;
/// it never mutates them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub specialty: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub full_name: String,
    pub dob: String,
    pub primary_provider_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validator {
    pub id: String,
    pub tier: u8,
    pub reputation: f64,
    pub blocks_proposed: u64,
    pub uptime: f64,
    pub last_seen: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReferenceDirectory {
    pub providers: Vec<Provider>,
    pub patients: Vec<Patient>,
    pub validators: Vec<Validator>,
}
