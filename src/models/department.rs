//! Department model: the fixed, ordered list of roster categories.

use serde::{Deserialize, Serialize};

/// A roster department.
///
/// Declaration order is the display order of the public roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    ManagementStaff,
    HospitalSupervisor,
    HumanResources,
    ChiefOfDoctor,
    Doctors,
    EmsSupervisor,
    MedicalDirector,
    ParamedicSupervisor,
    ParamedicOfficer,
    SeniorParamedics,
    SeniorEmt,
    Eca,
    CadetStudents,
}

/// A contiguous, pre-numbered call-sign range such as `P-01..=P-20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallsignPool {
    pub prefix: char,
    pub first: u8,
    pub last: u8,
}

impl CallsignPool {
    const fn new(prefix: char, first: u8, last: u8) -> Self {
        Self {
            prefix,
            first,
            last,
        }
    }

    /// All call signs in the pool, ascending.
    pub fn callsigns(&self) -> Vec<String> {
        (self.first..=self.last)
            .map(|n| format!("{}-{:02}", self.prefix, n))
            .collect()
    }

    pub fn len(&self) -> usize {
        usize::from(self.last - self.first) + 1
    }

    pub fn contains(&self, callsign: &str) -> bool {
        let Some((prefix, number)) = callsign.split_once('-') else {
            return false;
        };
        if prefix.len() != 1 || !prefix.starts_with(self.prefix) || number.len() != 2 {
            return false;
        }
        number
            .parse::<u8>()
            .map(|n| (self.first..=self.last).contains(&n))
            .unwrap_or(false)
    }
}

impl Department {
    pub const ALL: [Department; 13] = [
        Department::ManagementStaff,
        Department::HospitalSupervisor,
        Department::HumanResources,
        Department::ChiefOfDoctor,
        Department::Doctors,
        Department::EmsSupervisor,
        Department::MedicalDirector,
        Department::ParamedicSupervisor,
        Department::ParamedicOfficer,
        Department::SeniorParamedics,
        Department::SeniorEmt,
        Department::Eca,
        Department::CadetStudents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::ManagementStaff => "MANAGEMENT_STAFF",
            Department::HospitalSupervisor => "HOSPITAL_SUPERVISOR",
            Department::HumanResources => "HUMAN_RESOURCES",
            Department::ChiefOfDoctor => "CHIEF_OF_DOCTOR",
            Department::Doctors => "DOCTORS",
            Department::EmsSupervisor => "EMS_SUPERVISOR",
            Department::MedicalDirector => "MEDICAL_DIRECTOR",
            Department::ParamedicSupervisor => "PARAMEDIC_SUPERVISOR",
            Department::ParamedicOfficer => "PARAMEDIC_OFFICER",
            Department::SeniorParamedics => "SENIOR_PARAMEDICS",
            Department::SeniorEmt => "SENIOR_EMT",
            Department::Eca => "ECA",
            Department::CadetStudents => "CADET_STUDENTS",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Department::ALL.into_iter().find(|d| d.as_str() == key)
    }

    /// Display label shown as the roster section header.
    pub fn label(&self) -> &'static str {
        match self {
            Department::ManagementStaff => "MANGMENT STAFF",
            Department::HospitalSupervisor => "Hospital Supervisor",
            Department::HumanResources => "Human resources",
            Department::ChiefOfDoctor => "Chief of Doctor",
            Department::Doctors => "Doctors",
            Department::EmsSupervisor => "EMS Supervisor",
            Department::MedicalDirector => "Medical Director",
            Department::ParamedicSupervisor => "Paramedic Officer",
            Department::ParamedicOfficer => "Licensed Paramedic (Call signs From P-01 to P-20)",
            Department::SeniorParamedics => {
                "Senior Paramedics and Paramedics (Call signs From P-21 to P-39)"
            }
            Department::SeniorEmt => "Advanced EMT and EMT (Call signs From E-40 to E-59)",
            Department::Eca => "ECA (Call signs From E-60 to E-79)",
            Department::CadetStudents => "Students (Call Signs From C-80 to C-99)",
        }
    }

    /// The reserved call-sign range, or `None` for departments whose call
    /// signs are entered by hand.
    pub fn pool(&self) -> Option<CallsignPool> {
        match self {
            Department::ParamedicOfficer => Some(CallsignPool::new('P', 1, 20)),
            Department::SeniorParamedics => Some(CallsignPool::new('P', 21, 39)),
            Department::SeniorEmt => Some(CallsignPool::new('E', 40, 59)),
            Department::Eca => Some(CallsignPool::new('E', 60, 79)),
            Department::CadetStudents => Some(CallsignPool::new('C', 80, 99)),
            _ => None,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.pool().is_none()
    }
}

/// Department summary returned by the departments endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentInfo {
    pub key: Department,
    pub label: &'static str,
    pub manual_callsign: bool,
    pub callsigns: Vec<String>,
}

impl From<Department> for DepartmentInfo {
    fn from(department: Department) -> Self {
        Self {
            key: department,
            label: department.label(),
            manual_callsign: department.is_manual(),
            callsigns: department
                .pool()
                .map(|pool| pool.callsigns())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip() {
        for department in Department::ALL {
            assert_eq!(Department::from_key(department.as_str()), Some(department));
        }
        assert_eq!(Department::from_key("paramedic_officer"), None);
        assert_eq!(Department::from_key(""), None);
    }

    #[test]
    fn test_serde_uses_keys() {
        let json = serde_json::to_string(&Department::SeniorEmt).unwrap();
        assert_eq!(json, "\"SENIOR_EMT\"");
    }

    #[test]
    fn test_pool_sizes() {
        assert_eq!(Department::ParamedicOfficer.pool().unwrap().len(), 20);
        assert_eq!(Department::SeniorParamedics.pool().unwrap().len(), 19);
        assert_eq!(Department::SeniorEmt.pool().unwrap().len(), 20);
        assert_eq!(Department::Eca.pool().unwrap().len(), 20);
        assert_eq!(Department::CadetStudents.pool().unwrap().len(), 20);
    }

    #[test]
    fn test_pool_callsign_format() {
        let pool = Department::ParamedicOfficer.pool().unwrap().callsigns();
        assert_eq!(pool.first().map(String::as_str), Some("P-01"));
        assert_eq!(pool.last().map(String::as_str), Some("P-20"));

        let pool = Department::CadetStudents.pool().unwrap().callsigns();
        assert_eq!(pool.first().map(String::as_str), Some("C-80"));
        assert_eq!(pool.last().map(String::as_str), Some("C-99"));
    }

    #[test]
    fn test_pools_are_disjoint() {
        let pooled: Vec<Vec<String>> = Department::ALL
            .iter()
            .filter_map(|d| d.pool())
            .map(|p| p.callsigns())
            .collect();

        for (i, a) in pooled.iter().enumerate() {
            for b in pooled.iter().skip(i + 1) {
                assert!(a.iter().all(|c| !b.contains(c)));
            }
        }
    }

    #[test]
    fn test_pool_contains() {
        let pool = Department::SeniorParamedics.pool().unwrap();
        assert!(pool.contains("P-21"));
        assert!(pool.contains("P-39"));
        assert!(!pool.contains("P-20"));
        assert!(!pool.contains("P-40"));
        assert!(!pool.contains("E-21"));
        assert!(!pool.contains("P-3"));
        assert!(!pool.contains("P21"));
    }

    #[test]
    fn test_manual_departments() {
        let manual: Vec<_> = Department::ALL.iter().filter(|d| d.is_manual()).collect();
        assert_eq!(manual.len(), 8);
        assert!(Department::ParamedicSupervisor.is_manual());
        assert!(!Department::ParamedicOfficer.is_manual());
    }
}
