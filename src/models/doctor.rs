use serde::{Deserialize, Serialize};

use crate::validation::FieldErrors;

/// Number of ranked speciality slots a doctor profile carries.
pub const SPECIALITY_SLOTS: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speciality {
    pub id: i64,
    pub name: String,
}

/// Medical credentials of a doctor account. Specialities are grouped in four
/// ranked slots, each holding any number of speciality ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DoctorProfile {
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub experience: String,
    pub qualification: String,
    pub highlights: String,
    pub speciality1: Vec<i64>,
    pub speciality2: Vec<i64>,
    pub speciality3: Vec<i64>,
    pub speciality4: Vec<i64>,
}

impl DoctorProfile {
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Speciality ids stored in `slot` (1-based).
    pub fn slot(&self, slot: u8) -> &[i64] {
        match slot {
            1 => &self.speciality1,
            2 => &self.speciality2,
            3 => &self.speciality3,
            4 => &self.speciality4,
            _ => &[],
        }
    }

    pub fn slot_mut(&mut self, slot: u8) -> Option<&mut Vec<i64>> {
        match slot {
            1 => Some(&mut self.speciality1),
            2 => Some(&mut self.speciality2),
            3 => Some(&mut self.speciality3),
            4 => Some(&mut self.speciality4),
            _ => None,
        }
    }
}

/// Client-supplied doctor fields; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorProfilePatch {
    pub experience: Option<String>,
    pub qualification: Option<String>,
    pub highlights: Option<String>,
    pub speciality1: Option<Vec<i64>>,
    pub speciality2: Option<Vec<i64>>,
    pub speciality3: Option<Vec<i64>>,
    pub speciality4: Option<Vec<i64>>,
}

impl DoctorProfilePatch {
    pub fn slot(&self, slot: u8) -> Option<&[i64]> {
        match slot {
            1 => self.speciality1.as_deref(),
            2 => self.speciality2.as_deref(),
            3 => self.speciality3.as_deref(),
            4 => self.speciality4.as_deref(),
            _ => None,
        }
    }

    /// Every speciality id referenced by the patch, with its field name.
    pub fn referenced_specialities(&self) -> Vec<(String, i64)> {
        (1..=SPECIALITY_SLOTS)
            .flat_map(move |slot| {
                self.slot(slot)
                    .unwrap_or_default()
                    .iter()
                    .map(move |id| (format!("speciality{slot}"), *id))
            })
            .collect()
    }

    /// Report ids that do not name an existing speciality.
    pub fn check_specialities(&self, missing: &[i64]) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for (field, id) in self.referenced_specialities() {
            if missing.contains(&id) {
                errors.add(field, format!("Invalid pk \"{id}\" - object does not exist."));
            }
        }
        errors.into_result()
    }

    /// Merge text fields and replace slots supplied with a non-empty list.
    /// An empty list keeps the stored slot.
    pub fn apply(&self, doctor: &mut DoctorProfile) {
        if let Some(v) = &self.experience {
            doctor.experience = v.clone();
        }
        if let Some(v) = &self.qualification {
            doctor.qualification = v.clone();
        }
        if let Some(v) = &self.highlights {
            doctor.highlights = v.clone();
        }
        for slot in 1..=SPECIALITY_SLOTS {
            if let Some(ids) = self.slot(slot).filter(|ids| !ids.is_empty()) {
                if let Some(target) = doctor.slot_mut(slot) {
                    let mut ids = ids.to_vec();
                    ids.sort_unstable();
                    ids.dedup();
                    *target = ids;
                }
            }
        }
    }
}
