use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::MatchError;
use crate::models::{FeedbackExample, Preferences, Profile};

/// Read-only lookup of a profile's preferences
pub trait PreferenceIndex: Send + Sync {
    fn preferences_for(&self, id: &str) -> Option<&Preferences>;
}

impl PreferenceIndex for HashMap<String, Preferences> {
    fn preferences_for(&self, id: &str) -> Option<&Preferences> {
        self.get(id)
    }
}

impl PreferenceIndex for BTreeMap<String, Preferences> {
    fn preferences_for(&self, id: &str) -> Option<&Preferences> {
        self.get(id)
    }
}

/// Read-only view over a profile population, injected per call
pub trait ProfileRepository: PreferenceIndex {
    fn profile(&self, id: &str) -> Option<&Profile>;

    fn profiles(&self) -> &[Profile];
}

/// Repository backed by in-memory collections
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    profiles: Vec<Profile>,
    positions: HashMap<String, usize>,
    preferences: HashMap<String, Preferences>,
}

impl InMemoryRepository {
    /// Rejects duplicate profile ids and preferences for unknown profiles
    pub fn new(profiles: Vec<Profile>, preferences: Vec<Preferences>) -> Result<Self, MatchError> {
        let mut positions = HashMap::with_capacity(profiles.len());
        for (i, profile) in profiles.iter().enumerate() {
            if positions.insert(profile.id.clone(), i).is_some() {
                return Err(MatchError::input(&profile.id, "duplicate profile id"));
            }
        }

        let mut by_id = HashMap::with_capacity(preferences.len());
        for prefs in preferences {
            if !positions.contains_key(&prefs.candidate_id) {
                return Err(MatchError::input(
                    &prefs.candidate_id,
                    "preferences for unknown profile",
                ));
            }
            by_id.insert(prefs.candidate_id.clone(), prefs);
        }

        Ok(Self {
            profiles,
            positions,
            preferences: by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl PreferenceIndex for InMemoryRepository {
    fn preferences_for(&self, id: &str) -> Option<&Preferences> {
        self.preferences.get(id)
    }
}

impl ProfileRepository for InMemoryRepository {
    fn profile(&self, id: &str) -> Option<&Profile> {
        self.positions.get(id).map(|&i| &self.profiles[i])
    }

    fn profiles(&self) -> &[Profile] {
        &self.profiles
    }
}

/// On-disk population snapshot consumed by the command-line runner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationFile {
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub preferences: Vec<Preferences>,
    /// `name -> [latitude, longitude]`
    #[serde(default)]
    pub locations: BTreeMap<String, [f64; 2]>,
    #[serde(default)]
    pub feedback: Vec<FeedbackExample>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::default_languages;
    use crate::models::{Community, EducationLevel, Gender, MaritalStatus, ReligiosityLevel};

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.to_string(),
            gender: Gender::Female,
            age: 24,
            marital_status: MaritalStatus::Single,
            community: Community::Sephardic,
            religiosity: ReligiosityLevel::Moderate,
            location: "Haifa".to_string(),
            education: EducationLevel::Seminary,
            occupation: None,
            description: String::new(),
            languages: default_languages(),
            smoking: false,
        }
    }

    #[test]
    fn test_lookup_by_id() {
        let repo = InMemoryRepository::new(
            vec![profile("a"), profile("b")],
            vec![Preferences::unrestricted("a")],
        )
        .unwrap();

        assert_eq!(repo.profile("b").map(|p| p.id.as_str()), Some("b"));
        assert!(repo.profile("z").is_none());
        assert!(repo.preferences_for("a").is_some());
        assert!(repo.preferences_for("b").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = InMemoryRepository::new(vec![profile("a"), profile("a")], vec![]);
        assert!(matches!(result, Err(MatchError::Input { .. })));
    }

    #[test]
    fn test_orphan_preferences_rejected() {
        let result = InMemoryRepository::new(vec![profile("a")], vec![Preferences::unrestricted("x")]);
        assert!(result.is_err());
    }
}
