use mongodb::bson::{self, oid::ObjectId, Document};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

/// Stored user. Only the bcrypt hash is persisted, under `pwd`. The id is
/// generated before insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    #[serde(rename = "pwd")]
    pub password_hash: String,
}

impl User {
    pub fn new(email: String, password_hash: String) -> Self {
        Self {
            id: ObjectId::new(),
            email,
            password_hash,
        }
    }
}

/// The free-form columns of a project row. Every field is optional; absent
/// fields are neither stored nor echoed back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFields {
    #[serde(
        rename = "projectname",
        alias = "projectName",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "loose_string"
    )]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    pub technologies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    pub deadlines: Option<String>,
    #[serde(
        rename = "projectMembers",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "loose_string"
    )]
    pub project_members: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string")]
    pub priority: Option<String>,
}

impl ProjectFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Renders the present fields as a `$set` body.
    pub fn to_document(&self) -> Result<Document, bson::ser::Error> {
        bson::to_document(self)
    }

    /// Overwrites every field present in `patch`, leaving the rest untouched.
    pub fn apply(&mut self, patch: &ProjectFields) {
        let pairs = [
            (&mut self.project_name, &patch.project_name),
            (&mut self.description, &patch.description),
            (&mut self.technologies, &patch.technologies),
            (&mut self.deadlines, &patch.deadlines),
            (&mut self.project_members, &patch.project_members),
            (&mut self.status, &patch.status),
            (&mut self.client, &patch.client),
            (&mut self.budget, &patch.budget),
            (&mut self.priority, &patch.priority),
        ];
        for (slot, value) in pairs {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "integral_id")]
    pub id: i64,
    #[serde(flatten)]
    pub fields: ProjectFields,
}

impl Project {
    pub fn new(id: i64, fields: ProjectFields) -> Self {
        Self { id, fields }
    }
}

/// Accepts strings, numbers and booleans, keeping the string form.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
        Flag(bool),
    }

    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(value.map(|value| match value {
        Loose::Text(text) => text,
        Loose::Int(n) => n.to_string(),
        Loose::Float(n) => n.to_string(),
        Loose::Flag(flag) => flag.to_string(),
    }))
}

/// Older rows may carry the id as a 32-bit int or an integral double.
fn integral_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(i64),
        Float(f64),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(n) => Ok(n),
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        Number::Float(n)
            if n.is_finite()
                && n.fract() == 0.0
                && n >= i64::MIN as f64
                && n < i64::MAX as f64 =>
        {
            Ok(n as i64)
        }
        Number::Float(n) => Err(D::Error::custom(format!(
            "project id {n} is not an integer in range"
        ))),
    }
}
