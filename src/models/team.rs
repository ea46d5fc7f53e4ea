use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Teams the keyword rules can route to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
pub enum Team {
    #[strum(serialize = "Backend Team")]
    #[serde(rename = "Backend Team")]
    Backend,

    #[strum(serialize = "UX Team")]
    #[serde(rename = "UX Team")]
    UX,

    #[strum(serialize = "Frontend Team")]
    #[serde(rename = "Frontend Team")]
    Frontend,

    #[strum(serialize = "Platform Team")]
    #[serde(rename = "Platform Team")]
    Platform,
}

impl Team {
    /// All teams in rule priority order
    pub fn all() -> Vec<Team> {
        Team::iter().collect()
    }
}

/// A final team assignment: one of the known teams, or a label the
/// trained model learned from its training data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TeamLabel {
    Team(Team),
    Other(String),
}

impl TeamLabel {
    /// The known team, if this label is one
    pub fn team(&self) -> Option<Team> {
        match self {
            TeamLabel::Team(team) => Some(*team),
            TeamLabel::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TeamLabel::Team(Team::Backend) => "Backend Team",
            TeamLabel::Team(Team::UX) => "UX Team",
            TeamLabel::Team(Team::Frontend) => "Frontend Team",
            TeamLabel::Team(Team::Platform) => "Platform Team",
            TeamLabel::Other(label) => label,
        }
    }
}

impl fmt::Display for TeamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Team> for TeamLabel {
    fn from(team: Team) -> Self {
        TeamLabel::Team(team)
    }
}

impl From<String> for TeamLabel {
    fn from(label: String) -> Self {
        match Team::from_str(&label) {
            Ok(team) => TeamLabel::Team(team),
            Err(_) => TeamLabel::Other(label),
        }
    }
}

impl From<&str> for TeamLabel {
    fn from(label: &str) -> Self {
        TeamLabel::from(label.to_string())
    }
}

impl From<TeamLabel> for String {
    fn from(label: TeamLabel) -> Self {
        match label {
            TeamLabel::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_display_names() {
        assert_eq!(Team::Backend.to_string(), "Backend Team");
        assert_eq!(Team::UX.to_string(), "UX Team");
        assert_eq!(Team::Frontend.to_string(), "Frontend Team");
        assert_eq!(Team::Platform.to_string(), "Platform Team");
    }

    #[test]
    fn test_team_parse() {
        assert_eq!(Team::from_str("Frontend Team").unwrap(), Team::Frontend);
        assert!(Team::from_str("frontend").is_err());
    }

    #[test]
    fn test_all_in_priority_order() {
        assert_eq!(
            Team::all(),
            vec![Team::Backend, Team::UX, Team::Frontend, Team::Platform]
        );
    }

    #[test]
    fn test_label_from_string() {
        assert_eq!(
            TeamLabel::from("Platform Team"),
            TeamLabel::Team(Team::Platform)
        );
        assert_eq!(
            TeamLabel::from("Security Team"),
            TeamLabel::Other("Security Team".to_string())
        );
        assert_eq!(TeamLabel::from("Security Team").team(), None);
    }

    #[test]
    fn test_label_serde_as_plain_string() {
        let json = serde_json::to_string(&TeamLabel::from(Team::UX)).unwrap();
        assert_eq!(json, "\"UX Team\"");

        let label: TeamLabel = serde_json::from_str("\"Data Team\"").unwrap();
        assert_eq!(label.as_str(), "Data Team");
    }
}
