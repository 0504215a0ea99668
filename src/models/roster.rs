//! Public roster view: members grouped by department.

use serde::Serialize;

use super::{Department, Member};

/// One department section of the public roster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSection {
    pub department: Department,
    pub label: &'static str,
    pub members: Vec<Member>,
}

/// Group members by department in display order.
///
/// Members with an empty or unknown department are listed with the students.
/// Within the senior paramedic and EMT sections the senior title comes first,
/// then members are ordered by call sign.
pub fn build_roster(members: &[Member]) -> Vec<RosterSection> {
    let mut sections: Vec<RosterSection> = Department::ALL
        .into_iter()
        .map(|department| RosterSection {
            department,
            label: department.label(),
            members: Vec::new(),
        })
        .collect();

    for member in members {
        let department =
            Department::from_key(&member.department).unwrap_or(Department::CadetStudents);
        if let Some(section) = sections.iter_mut().find(|s| s.department == department) {
            section.members.push(member.clone());
        }
    }

    for section in &mut sections {
        let senior_title = match section.department {
            Department::SeniorParamedics => "Senior Paramedics",
            Department::SeniorEmt => "Advanced EMT",
            _ => continue,
        };
        section.members.sort_by(|a, b| {
            let a_senior = a.title == senior_title;
            let b_senior = b.title == senior_title;
            b_senior
                .cmp(&a_senior)
                .then_with(|| a.callsign.cmp(&b.callsign))
        });
    }

    sections
}
