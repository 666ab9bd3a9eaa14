//! Row types for the administrative database.
//!
//! The SQL schema is expected to be read by third parties without the
//! convenience of an ORM, so relationships stay explicit (plain foreign-key
//! columns, no generic attachment indirection).

use serde::Serialize;

use crate::fields::PartialDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub group_id: i64,
}

impl Region {
    /// The admin group that controls a region, by convention.
    pub fn default_group_name(name: &str) -> String {
        format!("{} Admins", name)
    }
}

/// A school district and its contact surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DistrictRow {
    pub name: String,
    pub url: String,
    pub twitter: String,
    pub facebook: String,
    /// E.164, or empty when unknown.
    pub phone: String,
    pub superintendent_name: String,
    pub superintendent_email: String,
    pub civil_rights_url: String,
    pub civil_rights_contact_name: String,
    pub civil_rights_contact_email: String,
    pub hib_url: String,
    pub hib_form_url: String,
    pub hib_contact_name: String,
    pub hib_contact_email: String,
    pub board_url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchoolRow {
    pub name: String,
    pub url: String,
    pub district_id: Option<i64>,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_public: bool,
    pub is_elementary: bool,
    pub is_middle: bool,
    pub is_high: bool,
}

impl SchoolRow {
    /// A school must be at least one of elementary, middle, or high.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.is_elementary || self.is_middle || self.is_high) {
            anyhow::bail!(
                "school {:?} must be at least one of elementary, middle, or high",
                self.name
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IncidentRow {
    pub region_id: i64,
    pub school_id: i64,
    pub description: String,
    pub occurred_at: PartialDate,
    pub submitted_at: String,
    pub published_at: Option<String>,
    pub published_by: Option<i64>,
    pub reported_to_school: bool,
    pub school_response: String,
}
