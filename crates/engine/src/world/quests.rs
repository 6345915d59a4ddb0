use crate::content::{Catalog, QuestDef};

#[derive(Debug, Clone, PartialEq)]
pub struct QuestObjective {
    pub description: String,
    pub target_amount: u32,
    pub current_amount: u32,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quest {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub objectives: Vec<QuestObjective>,
    pub experience_reward: u32,
    pub gold_reward: u32,
    pub is_active: bool,
    pub is_completed: bool,
}

impl Quest {
    pub fn from_def(def: &QuestDef) -> Self {
        Self {
            id: def.id,
            title: def.title.clone(),
            description: def.description.clone(),
            objectives: def
                .objectives
                .iter()
                .map(|objective| QuestObjective {
                    description: objective.description.clone(),
                    target_amount: objective.target_amount,
                    current_amount: 0,
                    is_completed: false,
                })
                .collect(),
            experience_reward: def.experience_reward,
            gold_reward: def.gold_reward,
            is_active: false,
            is_completed: false,
        }
    }

    pub fn all_objectives_completed(&self) -> bool {
        self.objectives.iter().all(|objective| objective.is_completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestProgress {
    Updated { current: u32, target: u32 },
    Completed { gold_reward: u32, experience_reward: u32 },
}

/// Live quest state, one entry per catalog quest in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestLog {
    quests: Vec<Quest>,
}

impl QuestLog {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            quests: catalog.quest_defs().map(Quest::from_def).collect(),
        }
    }

    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    pub fn quest(&self, id: i32) -> Option<&Quest> {
        self.quests.iter().find(|quest| quest.id == id)
    }

    pub fn quest_mut(&mut self, id: i32) -> Option<&mut Quest> {
        self.quests.iter_mut().find(|quest| quest.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Quest> {
        self.quests.iter().filter(|quest| quest.is_active)
    }

    /// Activates a quest that is neither active nor completed.
    pub fn activate(&mut self, id: i32) -> bool {
        match self.quest_mut(id) {
            Some(quest) if !quest.is_active && !quest.is_completed => {
                quest.is_active = true;
                true
            }
            _ => false,
        }
    }

    pub fn activate_first(&mut self) -> Option<i32> {
        let id = self.quests.first()?.id;
        self.activate(id).then_some(id)
    }

    /// Adds progress to one objective of an active quest. Progress is capped
    /// at the objective target; finishing the last objective completes the
    /// quest and deactivates it.
    pub fn record_progress(
        &mut self,
        id: i32,
        objective_index: usize,
        amount: u32,
    ) -> Option<QuestProgress> {
        let quest = self.quest_mut(id)?;
        if !quest.is_active || quest.is_completed {
            return None;
        }
        let objective = quest.objectives.get_mut(objective_index)?;
        objective.current_amount = objective
            .current_amount
            .saturating_add(amount)
            .min(objective.target_amount);
        if objective.current_amount >= objective.target_amount {
            objective.is_completed = true;
        }
        let (current, target) = (objective.current_amount, objective.target_amount);

        if quest.all_objectives_completed() {
            quest.is_completed = true;
            quest.is_active = false;
            return Some(QuestProgress::Completed {
                gold_reward: quest.gold_reward,
                experience_reward: quest.experience_reward,
            });
        }
        Some(QuestProgress::Updated { current, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::QuestObjectiveDef;

    fn log_with(defs: Vec<QuestDef>) -> QuestLog {
        QuestLog::from_catalog(&Catalog::from_defs(Vec::new(), defs))
    }

    fn quest_def(id: i32, targets: &[u32]) -> QuestDef {
        QuestDef {
            id,
            title: format!("Quest {id}"),
            description: String::new(),
            objectives: targets
                .iter()
                .map(|target| QuestObjectiveDef {
                    description: format!("reach {target}"),
                    target_amount: *target,
                })
                .collect(),
            experience_reward: 50,
            gold_reward: 25,
        }
    }

    #[test]
    fn quests_are_ordered_by_id() {
        let log = log_with(vec![quest_def(7, &[3]), quest_def(2, &[1])]);
        let ids: Vec<i32> = log.quests().iter().map(|quest| quest.id).collect();
        assert_eq!(ids, vec![2, 7]);
    }

    #[test]
    fn progress_is_ignored_for_inactive_quests() {
        let mut log = log_with(vec![quest_def(7, &[3])]);
        assert_eq!(log.record_progress(7, 0, 1), None);
        assert_eq!(log.quest(7).expect("quest").objectives[0].current_amount, 0);
    }

    #[test]
    fn progress_clamps_and_completes_quest() {
        let mut log = log_with(vec![quest_def(7, &[3, 2])]);
        assert!(log.activate(7));

        assert_eq!(
            log.record_progress(7, 0, 10),
            Some(QuestProgress::Updated {
                current: 3,
                target: 3
            })
        );
        assert_eq!(
            log.record_progress(7, 1, 2),
            Some(QuestProgress::Completed {
                gold_reward: 25,
                experience_reward: 50
            })
        );

        let quest = log.quest(7).expect("quest");
        assert!(quest.is_completed);
        assert!(!quest.is_active);
        assert!(!log.activate(7));
    }

    #[test]
    fn activate_first_picks_lowest_id() {
        let mut log = log_with(vec![quest_def(4, &[1]), quest_def(1, &[1])]);
        assert_eq!(log.activate_first(), Some(1));
        assert_eq!(log.activate_first(), None);
        assert_eq!(log.active().count(), 1);
    }
}
