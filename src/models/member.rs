//! Roster member model matching the front end's member records.

use serde::{Deserialize, Serialize};

/// A roster member.
///
/// Every field except `id` carries a serde default so records written by
/// older clients (or edited by hand in the remote repository) still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub title: String,
    /// Department key, see [`crate::models::Department`].
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub callsign: String,
    #[serde(default)]
    pub hire_date: String,
    #[serde(default)]
    pub last_promotion: String,
    #[serde(default)]
    pub discord: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub mi: bool,
    #[serde(default)]
    pub air: bool,
    #[serde(default)]
    pub fp: bool,
    /// Base64 data URI of the member photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Member {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Request body for creating a new member.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub callsign: String,
    #[serde(default)]
    pub hire_date: String,
    #[serde(default)]
    pub last_promotion: String,
    #[serde(default)]
    pub discord: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub mi: bool,
    #[serde(default)]
    pub air: bool,
    #[serde(default)]
    pub fp: bool,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Request body for updating an existing member. Absent fields keep their
/// stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub hire_date: Option<String>,
    #[serde(default)]
    pub last_promotion: Option<String>,
    #[serde(default)]
    pub discord: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub mi: Option<bool>,
    #[serde(default)]
    pub air: Option<bool>,
    #[serde(default)]
    pub fp: Option<bool>,
    /// An empty string removes the stored photo.
    #[serde(default)]
    pub photo: Option<String>,
}

impl UpdateMemberRequest {
    /// Merge the present fields into `member`. `id` and timestamps are left
    /// to the store.
    pub fn apply_to(&self, member: &mut Member) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(value) = value {
                *target = value.trim().to_string();
            }
        }

        set(&mut member.first_name, &self.first_name);
        set(&mut member.last_name, &self.last_name);
        set(&mut member.title, &self.title);
        set(&mut member.department, &self.department);
        set(&mut member.callsign, &self.callsign);
        set(&mut member.hire_date, &self.hire_date);
        set(&mut member.last_promotion, &self.last_promotion);
        set(&mut member.discord, &self.discord);
        set(&mut member.notes, &self.notes);

        if let Some(mi) = self.mi {
            member.mi = mi;
        }
        if let Some(air) = self.air {
            member.air = air;
        }
        if let Some(fp) = self.fp {
            member.fp = fp;
        }
        if let Some(photo) = &self.photo {
            member.photo = (!photo.is_empty()).then(|| photo.clone());
        }
    }
}
