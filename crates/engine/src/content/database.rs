use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingTier {
    Base,
    Upgraded,
}

impl BuildingTier {
    /// Levels at or below 1 use the base tier; everything above uses the
    /// upgraded tier. There is no third tier.
    pub fn for_level(level: u32) -> Self {
        if level <= 1 {
            Self::Base
        } else {
            Self::Upgraded
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingDef {
    pub def_name: String,
    pub label: String,
    pub prefab: String,
    pub tier: BuildingTier,
    pub wood_cost: u32,
    pub stone_cost: u32,
    pub gold_cost: u32,
    pub upgrade_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestObjectiveDef {
    pub description: String,
    pub target_amount: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestDef {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub objectives: Vec<QuestObjectiveDef>,
    pub experience_reward: u32,
    pub gold_reward: u32,
}

/// The building definitions restore can instantiate, one per tier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildingTiers {
    pub base: Option<BuildingDef>,
    pub upgraded: Option<BuildingDef>,
}

impl BuildingTiers {
    pub fn get(&self, tier: BuildingTier) -> Option<&BuildingDef> {
        match tier {
            BuildingTier::Base => self.base.as_ref(),
            BuildingTier::Upgraded => self.upgraded.as_ref(),
        }
    }

    pub fn for_level(&self, level: u32) -> Option<&BuildingDef> {
        self.get(BuildingTier::for_level(level))
    }
}

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    building_defs: BTreeMap<String, BuildingDef>,
    quest_defs: BTreeMap<i32, QuestDef>,
}

impl Catalog {
    /// Later definitions replace earlier ones with the same key.
    pub fn from_defs(buildings: Vec<BuildingDef>, quests: Vec<QuestDef>) -> Self {
        Self {
            building_defs: buildings
                .into_iter()
                .map(|def| (def.def_name.clone(), def))
                .collect(),
            quest_defs: quests.into_iter().map(|def| (def.id, def)).collect(),
        }
    }

    pub fn building_def_by_name(&self, name: &str) -> Option<&BuildingDef> {
        self.building_defs.get(name)
    }

    pub fn building_defs(&self) -> impl Iterator<Item = &BuildingDef> {
        self.building_defs.values()
    }

    pub fn quest_def(&self, id: i32) -> Option<&QuestDef> {
        self.quest_defs.get(&id)
    }

    /// Quest definitions in ascending id order.
    pub fn quest_defs(&self) -> impl Iterator<Item = &QuestDef> {
        self.quest_defs.values()
    }

    /// First definition (by name) of each tier.
    pub fn building_tiers(&self) -> BuildingTiers {
        let first_of = |tier: BuildingTier| {
            self.building_defs
                .values()
                .find(|def| def.tier == tier)
                .cloned()
        };
        BuildingTiers {
            base: first_of(BuildingTier::Base),
            upgraded: first_of(BuildingTier::Upgraded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn building(def_name: &str, tier: BuildingTier) -> BuildingDef {
        BuildingDef {
            def_name: def_name.to_string(),
            label: def_name.to_string(),
            prefab: def_name.to_string(),
            tier,
            wood_cost: 0,
            stone_cost: 0,
            gold_cost: 0,
            upgrade_to: None,
        }
    }

    #[test]
    fn tier_selection_by_level() {
        assert_eq!(BuildingTier::for_level(0), BuildingTier::Base);
        assert_eq!(BuildingTier::for_level(1), BuildingTier::Base);
        assert_eq!(BuildingTier::for_level(2), BuildingTier::Upgraded);
        assert_eq!(BuildingTier::for_level(9), BuildingTier::Upgraded);
    }

    #[test]
    fn building_tiers_pick_one_def_per_tier() {
        let catalog = Catalog::from_defs(
            vec![
                building("house", BuildingTier::Upgraded),
                building("hut", BuildingTier::Base),
            ],
            Vec::new(),
        );
        let tiers = catalog.building_tiers();
        assert_eq!(tiers.for_level(1).map(|def| def.def_name.as_str()), Some("hut"));
        assert_eq!(tiers.for_level(3).map(|def| def.def_name.as_str()), Some("house"));
    }

    #[test]
    fn missing_tier_is_none() {
        let catalog = Catalog::from_defs(vec![building("hut", BuildingTier::Base)], Vec::new());
        assert!(catalog.building_tiers().for_level(2).is_none());
    }
}
