//! Call-sign allocation.
//!
//! Maps a member's title to a department and works out which call signs that
//! member may take. Pure functions over the current member list; the caller
//! supplies the id of the member being edited (if any) so its own call sign
//! stays selectable.

use serde::Serialize;

use crate::models::{Department, Member};

/// How a call sign is chosen for a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "available", rename_all = "camelCase")]
pub enum CallsignOptions {
    /// Free-text entry; any non-empty string is accepted.
    Manual,
    /// Pick from the unassigned pool entries, in pool order. Empty when the
    /// pool is exhausted.
    Pooled(Vec<String>),
}

/// Department and call-sign options resolved from a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub department: Department,
    pub label: &'static str,
    pub options: CallsignOptions,
}

/// Department for a title, matched exactly.
pub fn department_for_title(title: &str) -> Option<Department> {
    let department = match title {
        "DEPUTY CHIEF" | "CHIEF OF HOSPITAL" => Department::ManagementStaff,
        "Hospital supervisor" => Department::HospitalSupervisor,
        "Human Resources" => Department::HumanResources,
        "CHIEF OF DOCTOR" => Department::ChiefOfDoctor,
        "DOCTOR" | "Junior Doctor" => Department::Doctors,
        "EMS Supervisor" => Department::EmsSupervisor,
        "Medical Director" => Department::MedicalDirector,
        "Paramedic Officer" => Department::ParamedicSupervisor,
        "Licensed Paramedic" => Department::ParamedicOfficer,
        "Paramedics" | "Senior Paramedics" => Department::SeniorParamedics,
        "EMT" | "Advanced EMT" => Department::SeniorEmt,
        "ECA" => Department::Eca,
        "Students" => Department::CadetStudents,
        _ => return None,
    };
    Some(department)
}

/// Call-sign options for `department`, excluding call signs held by members
/// other than `editing_id`.
pub fn allocate(
    department: Department,
    members: &[Member],
    editing_id: Option<&str>,
) -> CallsignOptions {
    let Some(pool) = department.pool() else {
        return CallsignOptions::Manual;
    };

    let taken: Vec<&str> = members
        .iter()
        .filter(|m| m.department == department.as_str())
        .filter(|m| Some(m.id.as_str()) != editing_id)
        .map(|m| m.callsign.as_str())
        .collect();

    CallsignOptions::Pooled(
        pool.callsigns()
            .into_iter()
            .filter(|c| !taken.contains(&c.as_str()))
            .collect(),
    )
}

/// Resolve a title to its department, label and call-sign options.
///
/// `None` means the title is unknown and a department must be chosen before
/// the member can be saved.
pub fn assignment_for_title(
    title: &str,
    members: &[Member],
    editing_id: Option<&str>,
) -> Option<Assignment> {
    let department = department_for_title(title)?;
    Some(Assignment {
        department,
        label: department.label(),
        options: allocate(department, members, editing_id),
    })
}

/// Check a call sign a member is about to be saved with.
///
/// An empty call sign is always allowed. When a pooled department has no free
/// entries left, any call sign is accepted as a manual fallback.
pub fn validate_callsign(
    department: Department,
    callsign: &str,
    members: &[Member],
    editing_id: Option<&str>,
) -> Result<(), String> {
    if callsign.is_empty() {
        return Ok(());
    }

    match allocate(department, members, editing_id) {
        CallsignOptions::Manual => Ok(()),
        CallsignOptions::Pooled(available) if available.is_empty() => Ok(()),
        CallsignOptions::Pooled(available) => {
            if available.iter().any(|c| c == callsign) {
                Ok(())
            } else if department.pool().is_some_and(|p| p.contains(callsign)) {
                Err(format!("Call sign {} is already assigned", callsign))
            } else {
                Err(format!(
                    "Call sign {} is not in the {} range",
                    callsign,
                    department.as_str()
                ))
            }
        }
    }
}
