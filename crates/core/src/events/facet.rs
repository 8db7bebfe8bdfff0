use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::events::{LineageEvent, PRODUCER};

pub const PARENT_FACET: &str = "parent";
pub const ERROR_MESSAGE_FACET: &str = "errorMessage";
pub const SQL_FACET: &str = "sql";
pub const PARAMS_FACET: &str = "params";

const PARENT_SCHEMA_URL: &str =
    "https://openlineage.io/spec/facets/1-0-0/ParentRunFacet.json#/$defs/ParentRunFacet";
const ERROR_MESSAGE_SCHEMA_URL: &str =
    "https://openlineage.io/spec/facets/1-0-0/ErrorMessageRunFacet.json#/$defs/ErrorMessageRunFacet";
const SQL_SCHEMA_URL: &str =
    "https://openlineage.io/spec/facets/1-0-0/SQLJobFacet.json#/$defs/SQLJobFacet";

/// Metadata attached to a job, run or dataset.
///
/// The known kinds get structured variants; anything else a caller wants to
/// carry goes through [`Facet::Raw`] and is serialized verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Facet {
    Parent(Box<LineageEvent>),
    ErrorMessage {
        message: String,
        programming_language: String,
    },
    Sql {
        query: String,
    },
    Params(Map<String, Value>),
    Raw(Value),
}

impl Facet {
    pub fn parent(event: LineageEvent) -> Self {
        Facet::Parent(Box::new(event))
    }

    pub fn error_message(message: impl Into<String>) -> Self {
        Facet::ErrorMessage {
            message: message.into(),
            programming_language: "rust".to_string(),
        }
    }

    pub fn sql(query: impl Into<String>) -> Self {
        Facet::Sql {
            query: query.into(),
        }
    }

    pub fn params<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Facet::Params(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_parent(&self) -> Option<&LineageEvent> {
        match self {
            Facet::Parent(event) => Some(&**event),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Facet::ErrorMessage { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ParentRunWire<'a> {
    #[serde(rename = "_producer")]
    producer: &'static str,
    #[serde(rename = "_schemaURL")]
    schema_url: &'static str,
    run: RunRef,
    job: JobRef<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunRef {
    run_id: Uuid,
}

#[derive(Serialize)]
struct JobRef<'a> {
    namespace: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorMessageWire<'a> {
    #[serde(rename = "_producer")]
    producer: &'static str,
    #[serde(rename = "_schemaURL")]
    schema_url: &'static str,
    message: &'a str,
    programming_language: &'a str,
}

#[derive(Serialize)]
struct SqlWire<'a> {
    #[serde(rename = "_producer")]
    producer: &'static str,
    #[serde(rename = "_schemaURL")]
    schema_url: &'static str,
    query: &'a str,
}

// A parent goes on the wire as a reference to its run, not the whole event.
impl Serialize for Facet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Facet::Parent(parent) => ParentRunWire {
                producer: PRODUCER,
                schema_url: PARENT_SCHEMA_URL,
                run: RunRef {
                    run_id: parent.run.run_id,
                },
                job: JobRef {
                    namespace: &parent.job.namespace,
                    name: &parent.job.name,
                },
            }
            .serialize(serializer),
            Facet::ErrorMessage {
                message,
                programming_language,
            } => ErrorMessageWire {
                producer: PRODUCER,
                schema_url: ERROR_MESSAGE_SCHEMA_URL,
                message,
                programming_language,
            }
            .serialize(serializer),
            Facet::Sql { query } => SqlWire {
                producer: PRODUCER,
                schema_url: SQL_SCHEMA_URL,
                query,
            }
            .serialize(serializer),
            Facet::Params(params) => params.serialize(serializer),
            Facet::Raw(value) => value.serialize(serializer),
        }
    }
}

/// The optional facets accepted by
/// [`EventBuilder::attach_facets`](crate::events::EventBuilder::attach_facets).
#[derive(Debug, Clone, Default)]
pub struct FacetAttachments {
    pub parent: Option<LineageEvent>,
    pub params: Option<Map<String, Value>>,
    pub sql: Option<String>,
    pub error: Option<String>,
}

impl FacetAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: LineageEvent) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.params = Some(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_none() && self.params.is_none() && self.sql.is_none() && self.error.is_none()
    }
}
