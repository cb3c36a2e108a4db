//! Search target, registry record shapes and search state

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Business being resolved against the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            website: None,
            category: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Target for a related entity: its name, this company's address, nothing else
    pub fn related(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: self.address.clone(),
            website: None,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityInformation {
    pub entity_name: Option<String>,
    pub entity_number: Option<String>,
    pub entity_type: Option<String>,
    pub entity_subtype: Option<String>,
    pub formation_date: Option<String>,
    pub profession: Option<String>,
    pub formation_effective_date: Option<String>,
    pub entity_status: Option<String>,
    pub renew_by_date: Option<String>,
    pub entity_status_details: Option<String>,
    pub last_renewed_date: Option<String>,
    pub status_updated_on: Option<String>,
    pub expiration_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisteredAgent {
    pub name: Option<String>,
    pub registered_agent_type: Option<String>,
    pub street_address: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Principal {
    pub title: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddressInformation {
    pub physical_address: Option<String>,
    pub physical_address_updated_date: Option<String>,
    pub mailing_address: Option<String>,
    pub mailing_address_updated_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceOfProcessInformation {
    pub service_of_process_name: Option<String>,
    pub last_updated: Option<String>,
    pub service_of_process_address: Option<String>,
}

/// One registry record as extracted by the agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BusinessEntityRecord {
    pub entity_information: EntityInformation,
    pub registered_agent: RegisteredAgent,
    pub principal_information: Vec<Principal>,
    pub address_information: AddressInformation,
    pub service_of_process_information: ServiceOfProcessInformation,
}

impl BusinessEntityRecord {
    pub fn entity_number(&self) -> Option<&str> {
        self.entity_information
            .entity_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Principal names in listed order, skipping blank ones
    pub fn principal_names(&self) -> impl Iterator<Item = &str> {
        self.principal_information
            .iter()
            .filter_map(|p| p.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCriteria {
    pub name: Option<String>,
}

/// Reported by the agent when the registry search matched nothing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoResultSentinel {
    pub search_criteria: SearchCriteria,
    pub no_results: bool,
}

/// The two shapes an agent attempt may legitimately produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReport {
    Record(BusinessEntityRecord),
    NoResult(NoResultSentinel),
}

impl AgentReport {
    /// Classify a parsed agent output; `None` for anything that is neither shape.
    ///
    /// Records are accepted wrapped in `businessEntity` or bare.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        if object.get("noResults").and_then(Value::as_bool) == Some(true) {
            return serde_json::from_value(value.clone())
                .ok()
                .map(Self::NoResult);
        }

        let record = match object.get("businessEntity") {
            Some(inner) if inner.is_object() => inner,
            Some(_) => return None,
            None if object.contains_key("entityInformation") => value,
            None => return None,
        };
        serde_json::from_value(record.clone()).ok().map(Self::Record)
    }
}

/// Depth and exclusion history threaded through one search path.
///
/// Values are never mutated in place; each transition returns the next state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchState {
    depth: u32,
    tested_entities: Vec<String>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Entity numbers already examined, in the order they were rejected
    pub fn tested_entities(&self) -> &[String] {
        &self.tested_entities
    }

    pub fn has_tested(&self, entity_number: &str) -> bool {
        self.tested_entities.iter().any(|n| n == entity_number)
    }

    /// Next attempt with the exclusion set unchanged
    pub fn descend(&self) -> Self {
        Self {
            depth: self.depth + 1,
            tested_entities: self.tested_entities.clone(),
        }
    }

    /// Next attempt with `entity_number` added to the exclusion set
    pub fn excluding(&self, entity_number: &str) -> Self {
        let mut next = self.descend();
        if !next.has_tested(entity_number) {
            next.tested_entities.push(entity_number.to_string());
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AttemptDecision {
    NotFound,
    Accepted,
    /// A principal was classified as a related entity and becomes the next target
    BranchToRelated { name: String },
    Rejected,
    /// The agent picked an entity excluded earlier on this path
    AlreadyTested,
}

/// Trace entry for one agent attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchAttempt {
    pub depth: u32,
    pub company: Company,
    pub tested_entities: Vec<String>,
    pub entity_number: Option<String>,
    #[serde(flatten)]
    pub decision: AttemptDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SearchOutcome {
    Found {
        record: BusinessEntityRecord,
        state: SearchState,
        trace: Vec<SearchAttempt>,
    },
    NotFound {
        state: SearchState,
        trace: Vec<SearchAttempt>,
    },
    /// The depth ceiling was reached before either terminal condition
    Exhausted {
        state: SearchState,
        trace: Vec<SearchAttempt>,
    },
}

impl SearchOutcome {
    pub fn record(&self) -> Option<&BusinessEntityRecord> {
        match self {
            Self::Found { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn state(&self) -> &SearchState {
        match self {
            Self::Found { state, .. } | Self::NotFound { state, .. } | Self::Exhausted { state, .. } => {
                state
            }
        }
    }

    pub fn trace(&self) -> &[SearchAttempt] {
        match self {
            Self::Found { trace, .. } | Self::NotFound { trace, .. } | Self::Exhausted { trace, .. } => {
                trace
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_report_recognises_no_result() {
        let value = json!({"searchCriteria": {"name": "Tech9"}, "noResults": true});
        match AgentReport::from_value(&value) {
            Some(AgentReport::NoResult(sentinel)) => {
                assert_eq!(sentinel.search_criteria.name.as_deref(), Some("Tech9"));
            }
            other => panic!("expected no-result, got {other:?}"),
        }
    }

    #[test]
    fn test_report_accepts_wrapped_and_bare_records() {
        let wrapped = json!({"businessEntity": {
            "entityInformation": {"entityName": "TECH9 LLC", "entityNumber": " 9876543-0160 "},
            "principalInformation": [{"name": "Jane Doe", "title": "Manager"}, {"name": ""}]
        }});
        let Some(AgentReport::Record(record)) = AgentReport::from_value(&wrapped) else {
            panic!("expected record");
        };
        assert_eq!(record.entity_number(), Some("9876543-0160"));
        assert_eq!(record.principal_names().collect::<Vec<_>>(), vec!["Jane Doe"]);

        let bare = json!({"entityInformation": {"entityNumber": "1"}});
        assert!(matches!(AgentReport::from_value(&bare), Some(AgentReport::Record(_))));
    }

    #[test]
    fn test_report_rejects_other_shapes() {
        assert_eq!(AgentReport::from_value(&json!({})), None);
        assert_eq!(AgentReport::from_value(&json!({"noResults": false})), None);
        assert_eq!(AgentReport::from_value(&json!({"businessEntity": "n/a"})), None);
        assert_eq!(AgentReport::from_value(&json!([1, 2])), None);
    }

    #[test]
    fn test_state_transitions() {
        let start = SearchState::new();
        let rejected = start.excluding("111");
        assert_eq!(rejected.depth(), 1);
        assert_eq!(rejected.tested_entities(), ["111".to_string()]);

        let branched = rejected.descend();
        assert_eq!(branched.depth(), 2);
        assert_eq!(branched.tested_entities(), rejected.tested_entities());

        let again = branched.excluding("111");
        assert_eq!(again.tested_entities().len(), 1);
        assert_eq!(start.depth(), 0);
        assert!(start.tested_entities().is_empty());
    }

    #[test]
    fn test_related_company_keeps_only_address() {
        let company = Company::new("Tech9")
            .with_address("2975 Executive Pkwy Ste. 330, Lehi, UT 84043")
            .with_website("http://tech9.com/")
            .with_category("Software company");
        let related = company.related("Acme Holdings");
        assert_eq!(related.name, "Acme Holdings");
        assert_eq!(related.address, company.address);
        assert_eq!(related.website, None);
        assert_eq!(
            serde_json::to_value(&related).unwrap(),
            json!({"name": "Acme Holdings", "address": "2975 Executive Pkwy Ste. 330, Lehi, UT 84043"})
        );
    }
}
