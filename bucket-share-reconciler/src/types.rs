//! Policy document model shared by identity-role, bucket and key policies.
//!
//! The shapes follow the AWS authorization document schema. Fields this crate
//! does not interpret (`NotAction`, `NotPrincipal`, ...) are kept in `extra`
//! so unrelated statements survive a read-modify-write cycle verbatim.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

/// A JSON value that may be written either as a bare scalar or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone + PartialEq> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }

    pub fn contains(&self, needle: &T) -> bool {
        match self {
            Self::One(value) => value == needle,
            Self::Many(values) => values.contains(needle),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Many(values) if values.is_empty())
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Statement principal: either the `"*"` wildcard or a map such as
/// `{"AWS": [...], "Service": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    Wildcard(String),
    Mapped(IndexMap<String, OneOrMany<String>>),
}

impl Principal {
    pub const AWS: &'static str = "AWS";

    pub fn any() -> Self {
        Self::Wildcard("*".to_string())
    }

    pub fn aws<I: IntoIterator<Item = String>>(arns: I) -> Self {
        let mut map = IndexMap::new();
        map.insert(
            Self::AWS.to_string(),
            OneOrMany::Many(arns.into_iter().collect()),
        );
        Self::Mapped(map)
    }

    /// The `AWS` principal entries, normalized to a list.
    pub fn aws_principals(&self) -> Vec<String> {
        match self {
            Self::Wildcard(_) => Vec::new(),
            Self::Mapped(map) => map
                .get(Self::AWS)
                .map(OneOrMany::to_vec)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Statement {
    pub fn allow() -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            action: None,
            resource: None,
            condition: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: OneOrMany<String>) -> Self {
        self.action = Some(action);
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: OneOrMany<String>) -> Self {
        self.resource = Some(resource);
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Map<String, Value>) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.action.as_ref().map(OneOrMany::to_vec).unwrap_or_default()
    }

    pub fn resources(&self) -> Vec<String> {
        self.resource
            .as_ref()
            .map(OneOrMany::to_vec)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "statements_one_or_many")]
    pub statement: Vec<Statement>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            id: None,
            statement,
            extra: Map::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

fn default_version() -> String {
    POLICY_VERSION.to_string()
}

fn statements_one_or_many<'de, D>(deserializer: D) -> Result<Vec<Statement>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::<Statement>::deserialize(deserializer)? {
        OneOrMany::One(statement) => vec![statement],
        OneOrMany::Many(statements) => statements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_principal_string_and_list_forms() {
        let single: Principal =
            serde_json::from_value(json!({"AWS": "arn:aws:iam::111122223333:role/R1"})).unwrap();
        assert_eq!(
            single.aws_principals(),
            vec!["arn:aws:iam::111122223333:role/R1"]
        );

        let many: Principal = serde_json::from_value(json!({
            "AWS": ["arn:aws:iam::111122223333:role/R1", "arn:aws:iam::111122223333:role/R2"]
        }))
        .unwrap();
        assert_eq!(many.aws_principals().len(), 2);

        let wildcard: Principal = serde_json::from_value(json!("*")).unwrap();
        assert_eq!(wildcard, Principal::any());
        assert!(wildcard.aws_principals().is_empty());
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = json!({
            "Version": "2012-10-17",
            "Id": "key-default-1",
            "Statement": [{
                "Sid": "DenyInsecure",
                "Effect": "Deny",
                "Principal": "*",
                "NotAction": "s3:GetObject",
                "Resource": "arn:aws:s3:::b1/*",
                "Condition": {"Bool": {"aws:SecureTransport": false}}
            }]
        });
        let doc: PolicyDocument = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.statement[0].extra.get("NotAction"), Some(&json!("s3:GetObject")));
        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn test_single_statement_object_is_accepted() {
        let doc = PolicyDocument::from_json(
            r#"{"Version":"2012-10-17",
                "Statement":{"Effect":"Allow","Action":"s3:*","Resource":"*"}}"#,
        )
        .unwrap();
        assert_eq!(doc.statement.len(), 1);
        assert_eq!(doc.statement[0].actions(), vec!["s3:*"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let statement = Statement::allow()
            .with_sid("Test")
            .with_action(OneOrMany::One("s3:GetObject".to_string()))
            .with_resource(OneOrMany::One("arn:aws:s3:::bucket/*".to_string()));
        let json = serde_json::to_string(&PolicyDocument::new(vec![statement])).unwrap();
        assert!(json.contains("\"Version\":\"2012-10-17\""));
        assert!(json.contains("\"Sid\":\"Test\""));
        assert!(json.contains("\"Effect\":\"Allow\""));
        assert!(!json.contains("Principal"));
        assert!(!json.contains("\"Id\""));
    }
}
