//! Seed-data import from AirTable CSV exports.
//!
//! The exports directory holds up to three files — `districts.csv`,
//! `schools.csv`, `incidents.csv` — processed in that order. A missing file
//! contributes nothing and is not an error, so an empty directory imports
//! zero records successfully.
//!
//! Districts and schools are skip-on-existing; incidents are not
//! deduplicated. Re-running the import against a populated database
//! duplicates incidents, which is why the reconstitution pipeline always
//! starts from a fresh database.

mod address;

pub use address::{parse_address, Address};

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{NaiveDateTime, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};

use crate::fields::{normalize_phone, PartialDate};
use crate::http::Fetcher;
use crate::storage::{DistrictRow, IncidentRow, SchoolRow, Store};

/// All incidents in the exports are Seattle incidents so far.
const DEFAULT_REGION: &str = "Seattle";

/// The account that publishes imported incidents.
const PUBLISHER_USER_ID: i64 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub districts: u64,
    pub schools: u64,
    pub incidents: u64,
    pub attachments: u64,
    pub skipped: u64,
}

impl ImportStats {
    pub fn records(&self) -> u64 {
        self.districts + self.schools + self.incidents
    }
}

pub struct Importer<'a> {
    store: &'a Store,
    fetcher: &'a dyn Fetcher,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a Store, fetcher: &'a dyn Fetcher) -> Self {
        Self { store, fetcher }
    }

    /// Import every export file present under `dir`.
    pub fn import_dir(&self, dir: &Path) -> anyhow::Result<ImportStats> {
        if !dir.is_dir() {
            bail!("exports directory {} does not exist", dir.display());
        }
        let mut stats = ImportStats::default();
        self.load_districts(&dir.join("districts.csv"), &mut stats)?;
        self.load_schools(&dir.join("schools.csv"), &mut stats)?;
        self.load_incidents(&dir.join("incidents.csv"), &mut stats)?;
        tracing::info!(?stats, dir = %dir.display(), "import finished");
        Ok(stats)
    }

    fn load_districts(&self, path: &Path, stats: &mut ImportStats) -> anyhow::Result<()> {
        let Some(rows) = read_csv::<DistrictCsvRow>(path)? else {
            return Ok(());
        };
        for row in rows {
            if row.name.is_empty() {
                bail!("district row without a name in {}", path.display());
            }
            if self.store.district_id_by_name(&row.name)?.is_some() {
                tracing::info!(district = %row.name, "district already exists; skipping");
                stats.skipped += 1;
                continue;
            }
            if row.superintendent_name.is_empty() {
                bail!("district {:?} has no superintendent name", row.name);
            }
            let (logo_name, logo_url) = parse_attachment_cell(&row.logo)
                .with_context(|| format!("district {:?} logo", row.name))?;
            let logo_data = self.fetcher.fetch(&logo_url)?;

            let district = DistrictRow {
                name: row.name.clone(),
                url: row.url,
                twitter: row.twitter,
                facebook: row.facebook,
                phone: normalize_phone(&row.phone)
                    .with_context(|| format!("district {:?} phone", row.name))?,
                superintendent_name: row.superintendent_name,
                superintendent_email: row.superintendent_email,
                civil_rights_url: row.civil_rights_url,
                civil_rights_contact_name: row.civil_rights_contact,
                civil_rights_contact_email: row.civil_rights_email,
                hib_url: row.hib_url,
                hib_form_url: row.hib_form,
                hib_contact_name: row.hib_contact,
                hib_contact_email: row.hib_email,
                board_url: row.board_url,
            };
            let district_id = self.store.insert_district(&district)?;
            self.store
                .insert_district_logo(&logo_name, &logo_data, district_id)?;
            stats.districts += 1;
            stats.attachments += 1;
            tracing::info!(district = %district.name, id = district_id, "created district");
        }
        Ok(())
    }

    fn load_schools(&self, path: &Path, stats: &mut ImportStats) -> anyhow::Result<()> {
        let Some(rows) = read_csv::<SchoolCsvRow>(path)? else {
            return Ok(());
        };
        for row in rows {
            if row.name.is_empty() {
                bail!("school row without a name in {}", path.display());
            }
            if self.store.school_id_by_name(&row.name)?.is_some() {
                tracing::info!(school = %row.name, "school already exists; skipping");
                stats.skipped += 1;
                continue;
            }

            let school_type = row.school_type.to_lowercase();
            if !matches!(school_type.as_str(), "public" | "private" | "") {
                bail!("school {:?} has unexpected type {:?}", row.name, row.school_type);
            }

            let district_id = if row.district.is_empty() {
                None
            } else {
                Some(
                    self.store
                        .district_id_by_name(&row.district)?
                        .with_context(|| {
                            format!("school {:?} names unknown district {:?}", row.name, row.district)
                        })?,
                )
            };

            let mut is_elementary = false;
            let mut is_middle = false;
            let mut is_high = false;
            for level in row.school_level.split(',') {
                match level.trim().to_lowercase().as_str() {
                    "elementary" => is_elementary = true,
                    "middle" => is_middle = true,
                    "high" => is_high = true,
                    _ => {}
                }
            }

            let address = parse_address(&row.address)
                .with_context(|| format!("school {:?} address", row.name))?;

            let school = SchoolRow {
                name: row.name.clone(),
                url: row.website,
                district_id,
                street: address.street,
                city: address.city,
                state: address.state,
                zip_code: address.zip_code,
                latitude: parse_optional_float(&row.latitude)
                    .with_context(|| format!("school {:?} latitude", row.name))?,
                longitude: parse_optional_float(&row.longitude)
                    .with_context(|| format!("school {:?} longitude", row.name))?,
                is_public: school_type == "public",
                is_elementary,
                is_middle,
                is_high,
            };
            let id = self.store.insert_school(&school)?;
            stats.schools += 1;
            tracing::info!(school = %school.name, id, "created school");
        }
        Ok(())
    }

    fn load_incidents(&self, path: &Path, stats: &mut ImportStats) -> anyhow::Result<()> {
        let Some(rows) = read_csv::<IncidentCsvRow>(path)? else {
            return Ok(());
        };

        let region = self.store.get_or_create_region(DEFAULT_REGION)?;
        let publisher = self
            .store
            .user_by_id(PUBLISHER_USER_ID)?
            .context("no publisher account; create the superuser before importing incidents")?;
        if !publisher.is_superuser {
            bail!("publisher account {:?} is not a superuser", publisher.username);
        }

        for row in rows {
            let occurred_at = occurrence_date(&row.year, &row.month, &row.day)
                .with_context(|| format!("incident at school {:?}", row.school))?;

            let school_id = self
                .store
                .school_id_by_name(&row.school)?
                .with_context(|| format!("incident names unknown school {:?}", row.school))?;

            // Fetch supporting materials up front: a dead link aborts the
            // import before the incident row is created.
            let mut materials = Vec::new();
            if !row.supporting_materials.is_empty() {
                for cell in row.supporting_materials.split(',') {
                    let (name, url) = parse_attachment_cell(cell)
                        .with_context(|| format!("supporting material for {:?}", row.school))?;
                    let data = self.fetcher.fetch(&url)?;
                    materials.push((name, data));
                }
            }

            let last_modified = parse_export_timestamp(&row.last_modified)
                .with_context(|| format!("incident at school {:?}", row.school))?;

            let incident = IncidentRow {
                region_id: region.id,
                school_id,
                description: row.description,
                occurred_at,
                // Best we can do for now: the export only carries the
                // AirTable modification time.
                submitted_at: last_modified.clone(),
                published_at: Some(last_modified),
                published_by: Some(publisher.id),
                reported_to_school: row.reported_school == "Yes",
                school_response: row.school_response,
            };
            let incident_id = self.store.insert_incident(&incident)?;

            for name in row.incident_type.split(',') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let type_id = self.store.get_or_create_incident_type(name)?;
                self.store.link_incident_type(incident_id, type_id)?;
            }
            for name in row.sources.split(',') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let source_id = self.store.get_or_create_source_type(name)?;
                self.store.link_source_type(incident_id, source_id)?;
            }

            for (name, data) in materials {
                self.store
                    .insert_supporting_material(&name, &data, incident_id)?;
                stats.attachments += 1;
            }

            for (extra_name, value) in [
                ("media-coverage", &row.media_coverage),
                ("social-media-post", &row.social_media_post),
                ("other-related", &row.other_related),
            ] {
                if !value.is_empty() {
                    self.store
                        .insert_incident_extra(incident_id, extra_name, value)?;
                }
            }

            stats.incidents += 1;
            tracing::info!(incident = incident_id, school = %row.school, "created incident");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DistrictCsvRow {
    #[serde(rename = "District-Name")]
    name: String,
    #[serde(rename = "District-Logo")]
    logo: String,
    #[serde(rename = "District-URL")]
    url: String,
    #[serde(rename = "District-Twitter")]
    twitter: String,
    #[serde(rename = "District-Facebook")]
    facebook: String,
    #[serde(rename = "District-Phone")]
    phone: String,
    #[serde(rename = "Superintendent-Name")]
    superintendent_name: String,
    #[serde(rename = "Superintendent-Email")]
    superintendent_email: String,
    #[serde(rename = "CivilRights-URL")]
    civil_rights_url: String,
    #[serde(rename = "CivilRights-Contact")]
    civil_rights_contact: String,
    #[serde(rename = "CivilRights-Email")]
    civil_rights_email: String,
    #[serde(rename = "HIB-URL")]
    hib_url: String,
    #[serde(rename = "HIB-Form")]
    hib_form: String,
    #[serde(rename = "HIB-Contact")]
    hib_contact: String,
    #[serde(rename = "HIB-Email")]
    hib_email: String,
    #[serde(rename = "Board-URL")]
    board_url: String,
}

#[derive(Debug, Deserialize)]
struct SchoolCsvRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Website")]
    website: String,
    #[serde(rename = "School-Type")]
    school_type: String,
    #[serde(rename = "District")]
    district: String,
    #[serde(rename = "School-Level")]
    school_level: String,
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Latitude")]
    latitude: String,
    #[serde(rename = "Longitude")]
    longitude: String,
}

#[derive(Debug, Deserialize)]
struct IncidentCsvRow {
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "Month")]
    month: String,
    #[serde(rename = "Day")]
    day: String,
    #[serde(rename = "School")]
    school: String,
    #[serde(rename = "Incident-Type")]
    incident_type: String,
    #[serde(rename = "Incident-Description")]
    description: String,
    #[serde(rename = "Supporting-Materials")]
    supporting_materials: String,
    #[serde(rename = "School-Response")]
    school_response: String,
    #[serde(rename = "Media-Coverage")]
    media_coverage: String,
    #[serde(rename = "Social-Media-Post")]
    social_media_post: String,
    #[serde(rename = "Other-Related")]
    other_related: String,
    #[serde(rename = "Reported-School")]
    reported_school: String,
    #[serde(rename = "Source(s)")]
    sources: String,
    #[serde(rename = "Last Modified")]
    last_modified: String,
}

/// Read a CSV export. `None` means the file is absent, which callers treat
/// as an empty import. The exports sometimes carry a UTF-8 BOM.
fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<Vec<T>>> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "export file missing; skipping");
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let mut rows = Vec::new();
    for (i, row) in reader.deserialize::<T>().enumerate() {
        // Header is line 1.
        rows.push(row.with_context(|| format!("{} line {}", path.display(), i + 2))?);
    }
    Ok(Some(rows))
}

/// Split a `Name (https://url)` export cell.
fn parse_attachment_cell(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, rest) = raw
        .split_once('(')
        .with_context(|| format!("expected \"Name (url)\", got {:?}", raw))?;
    let name = name.trim();
    let url = rest.trim().trim_end_matches(')').trim();
    if name.is_empty() || url.is_empty() {
        bail!("expected \"Name (url)\", got {:?}", raw);
    }
    Ok((name.to_string(), url.to_string()))
}

fn occurrence_date(year: &str, month: &str, day: &str) -> anyhow::Result<PartialDate> {
    if year.len() != 4 {
        bail!("year {:?} must be 4 digits", year);
    }
    let year: u16 = year.parse().with_context(|| format!("year {:?}", year))?;

    let month = match month {
        "" => None,
        m if m.len() == 2 => Some(m.parse::<u8>().with_context(|| format!("month {:?}", m))?),
        m => bail!("month {:?} must be 2 digits", m),
    };

    let day = match day {
        "" | "null" => None,
        d if (1..=2).contains(&d.len()) => {
            Some(d.parse::<u8>().with_context(|| format!("day {:?}", d))?)
        }
        d => bail!("day {:?} must be 1 or 2 digits", d),
    };

    PartialDate::new(year, month, day).map_err(Into::into)
}

/// Parse the AirTable `Last Modified` stamp (`M/DD/YYYY H:MMam|pm`,
/// America/Los_Angeles) into RFC 3339.
fn parse_export_timestamp(raw: &str) -> anyhow::Result<String> {
    let normalized = raw.trim().to_ascii_uppercase();
    let naive = NaiveDateTime::parse_from_str(&normalized, "%m/%d/%Y %I:%M%p")
        .with_context(|| format!("timestamp {:?}", raw))?;
    let stamped = chrono_tz::America::Los_Angeles
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("timestamp {:?} does not exist in America/Los_Angeles", raw))?;
    Ok(stamped.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn parse_optional_float(raw: &str) -> anyhow::Result<Option<f64>> {
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(raw.parse()?))
}
