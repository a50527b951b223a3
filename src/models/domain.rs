use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use validator::{Validate, ValidationError};

/// Side-discriminator value of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Divorced,
    Widowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Community {
    Lithuanian,
    Hasidic,
    Sephardic,
    ModernOrthodox,
    NationalReligious,
}

impl Community {
    pub const ALL: [Community; 5] = [
        Community::Lithuanian,
        Community::Hasidic,
        Community::Sephardic,
        Community::ModernOrthodox,
        Community::NationalReligious,
    ];
}

/// Religiosity level, ordered from strictest to most flexible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReligiosityLevel {
    VeryStrict,
    Strict,
    Moderate,
    Flexible,
}

impl ReligiosityLevel {
    pub const ALL: [ReligiosityLevel; 4] = [
        ReligiosityLevel::VeryStrict,
        ReligiosityLevel::Strict,
        ReligiosityLevel::Moderate,
        ReligiosityLevel::Flexible,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    HighSchool,
    Seminary,
    Yeshiva,
    College,
    University,
    AdvancedDegree,
}

/// Candidate profile
///
/// Immutable for the duration of a matching run; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_profile"))]
pub struct Profile {
    #[validate(length(min = 1))]
    pub id: String,
    pub gender: Gender,
    #[validate(range(min = 18, max = 120))]
    pub age: u8,
    #[serde(rename = "maritalStatus", default = "default_marital_status")]
    pub marital_status: MaritalStatus,
    pub community: Community,
    #[serde(rename = "religiosityLevel")]
    pub religiosity: ReligiosityLevel,
    pub location: String,
    pub education: EducationLevel,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(rename = "descriptionText", default)]
    pub description: String,
    #[serde(default = "default_languages")]
    pub languages: BTreeSet<String>,
    #[serde(default)]
    pub smoking: bool,
}

fn default_marital_status() -> MaritalStatus {
    MaritalStatus::Single
}

/// Languages assumed when a profile lists none
pub fn default_languages() -> BTreeSet<String> {
    BTreeSet::from(["hebrew".to_string()])
}

fn validate_profile(profile: &Profile) -> Result<(), ValidationError> {
    if profile.languages.is_empty() {
        return Err(ValidationError::new("languages_empty"));
    }
    if profile.location.trim().is_empty() {
        return Err(ValidationError::new("location_empty"));
    }
    Ok(())
}

impl Profile {
    /// Number of languages shared with `other`
    pub fn common_languages(&self, other: &Profile) -> usize {
        self.languages.intersection(&other.languages).count()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {})", self.id, self.gender, self.age)
    }
}

/// Hard eligibility constraints
///
/// Every field is optional; an unset field (or an empty set) imposes no
/// restriction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_age_range"))]
pub struct HardConstraints {
    #[serde(rename = "minAge", default)]
    #[validate(range(min = 18, max = 120))]
    pub min_age: Option<u8>,
    #[serde(rename = "maxAge", default)]
    #[validate(range(min = 18, max = 120))]
    pub max_age: Option<u8>,
    #[serde(rename = "maxDistanceKm", default)]
    #[validate(range(max = 1000))]
    pub max_distance_km: Option<u16>,
    #[serde(default)]
    pub smoking: Option<bool>,
    #[serde(rename = "requiredCommunities", default)]
    pub communities: Option<BTreeSet<Community>>,
    #[serde(rename = "requiredReligiosity", default)]
    pub religiosity: Option<BTreeSet<ReligiosityLevel>>,
    #[serde(rename = "requiredLanguages", default)]
    pub languages: Option<BTreeSet<String>>,
}

fn validate_age_range(constraints: &HardConstraints) -> Result<(), ValidationError> {
    if let (Some(min), Some(max)) = (constraints.min_age, constraints.max_age) {
        if max < min {
            return Err(ValidationError::new("max_age_below_min_age"));
        }
    }
    Ok(())
}

impl HardConstraints {
    /// Allowed communities, `None` when unrestricted
    pub fn allowed_communities(&self) -> Option<&BTreeSet<Community>> {
        self.communities.as_ref().filter(|set| !set.is_empty())
    }

    /// Allowed religiosity levels, `None` when unrestricted
    pub fn allowed_religiosity(&self) -> Option<&BTreeSet<ReligiosityLevel>> {
        self.religiosity.as_ref().filter(|set| !set.is_empty())
    }

    /// Required languages, `None` when unrestricted
    pub fn required_languages(&self) -> Option<&BTreeSet<String>> {
        self.languages.as_ref().filter(|set| !set.is_empty())
    }
}

/// Soft preferences: they shape scores, never eligibility
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoftPreferences {
    #[serde(rename = "preferredEducation", default)]
    pub education: Option<BTreeSet<EducationLevel>>,
    #[serde(rename = "preferredOccupation", default)]
    pub occupation: Option<BTreeSet<String>>,
    #[serde(rename = "preferredLocation", default)]
    pub location: Option<String>,
}

/// Everything a profile asks of a counterpart
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Preferences {
    #[serde(rename = "candidateId")]
    #[validate(length(min = 1))]
    pub candidate_id: String,
    #[serde(rename = "mustHave", default)]
    #[validate(nested)]
    pub constraints: HardConstraints,
    #[serde(rename = "niceToHave", default)]
    pub soft: SoftPreferences,
    #[serde(rename = "freeText", default)]
    pub free_text: String,
}

impl Preferences {
    pub fn unrestricted(candidate_id: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            constraints: HardConstraints::default(),
            soft: SoftPreferences::default(),
            free_text: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: "p1".to_string(),
            gender: Gender::Male,
            age: 28,
            marital_status: MaritalStatus::Single,
            community: Community::Lithuanian,
            religiosity: ReligiosityLevel::Strict,
            location: "Jerusalem".to_string(),
            education: EducationLevel::Yeshiva,
            occupation: None,
            description: "Learns in the mornings".to_string(),
            languages: default_languages(),
            smoking: false,
        }
    }

    #[test]
    fn test_valid_profile() {
        assert!(profile().validate().is_ok());
    }

    #[test]
    fn test_profile_age_out_of_bounds() {
        let mut p = profile();
        p.age = 16;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_profile_requires_languages() {
        let mut p = profile();
        p.languages.clear();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_inverted_age_range_rejected() {
        let constraints = HardConstraints {
            min_age: Some(30),
            max_age: Some(25),
            ..Default::default()
        };
        assert!(constraints.validate().is_err());
    }

    #[test]
    fn test_empty_sets_are_unrestricted() {
        let constraints = HardConstraints {
            communities: Some(BTreeSet::new()),
            ..Default::default()
        };
        assert!(constraints.allowed_communities().is_none());
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let json = r#"{
            "id": "x",
            "gender": "F",
            "age": 24,
            "community": "sephardic",
            "religiosityLevel": "moderate",
            "location": "Haifa",
            "education": "seminary"
        }"#;
        let p: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(p.languages, default_languages());
        assert_eq!(p.marital_status, MaritalStatus::Single);
        assert!(!p.smoking);
    }
}
