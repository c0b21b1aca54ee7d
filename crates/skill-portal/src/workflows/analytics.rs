use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{require_role, WorkflowError};
use crate::domain::{Role, SkillStatus, SkillType, StudentType, User};
use crate::store::PortalStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillTypeStats {
    #[serde(rename = "type")]
    pub skill_type: SkillType,
    pub total_skills: usize,
    /// Mean budgeted capacity, not actual enrollment.
    pub average_students: f64,
    pub total_budget: f64,
    pub active_skills: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentStats {
    pub student_type: StudentType,
    pub total_students: usize,
    pub avg_enrolled_skills: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillStatistics {
    pub skill_stats: Vec<SkillTypeStats>,
    pub enrollment_stats: Vec<EnrollmentStats>,
}

/// Skill-team aggregates over the whole catalogue.
pub struct SkillAnalytics<S> {
    store: Arc<S>,
}

impl<S> SkillAnalytics<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Per skill type and per student type; groups without members are omitted.
    pub fn skill_statistics(&self, actor: &User) -> Result<SkillStatistics, WorkflowError> {
        require_role(actor, Role::SkillTeam)?;

        #[derive(Default)]
        struct TypeTotals {
            skills: usize,
            capacity: u64,
            budget: f64,
            active: usize,
        }

        let mut by_type: BTreeMap<SkillType, TypeTotals> = BTreeMap::new();
        for skill in self.store.skills()? {
            let totals = by_type.entry(skill.skill_type).or_default();
            totals.skills += 1;
            totals.capacity += u64::from(skill.budget.number_of_students);
            totals.budget += skill.budget.amount;
            if skill.status == SkillStatus::Active {
                totals.active += 1;
            }
        }

        let skill_stats = by_type
            .into_iter()
            .map(|(skill_type, totals)| SkillTypeStats {
                skill_type,
                total_skills: totals.skills,
                average_students: totals.capacity as f64 / totals.skills as f64,
                total_budget: totals.budget,
                active_skills: totals.active,
            })
            .collect();

        let mut by_student_type: Vec<(StudentType, usize, usize)> = Vec::new();
        for user in self.store.users()? {
            if !user.is_student() {
                continue;
            }
            let student_type = user.student_type.unwrap_or(StudentType::DayScholar);
            match by_student_type
                .iter_mut()
                .find(|(kind, _, _)| *kind == student_type)
            {
                Some((_, students, enrolled)) => {
                    *students += 1;
                    *enrolled += user.enrolled_skills.len();
                }
                None => by_student_type.push((student_type, 1, user.enrolled_skills.len())),
            }
        }
        by_student_type.sort_by_key(|(kind, _, _)| kind.label());

        let enrollment_stats = by_student_type
            .into_iter()
            .map(|(student_type, students, enrolled)| EnrollmentStats {
                student_type,
                total_students: students,
                avg_enrolled_skills: enrolled as f64 / students as f64,
            })
            .collect();

        Ok(SkillStatistics {
            skill_stats,
            enrollment_stats,
        })
    }
}
