use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::events::Facet;

pub const PRODUCER: &str = "https://github.com/kuchmenko/lineage-relay";
pub const SCHEMA_URL: &str =
    "https://openlineage.io/spec/1-0-5/OpenLineage.json#/definitions/RunEvent";

pub type Facets = BTreeMap<String, Facet>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Start,
    Running,
    Complete,
    Fail,
    Abort,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Start => "START",
            EventType::Running => "RUNNING",
            EventType::Complete => "COMPLETE",
            EventType::Fail => "FAIL",
            EventType::Abort => "ABORT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventType::Complete | EventType::Fail | EventType::Abort
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: Facets,
}

impl Run {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            facets: Facets::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub namespace: String,
    pub name: String,
    pub facets: Facets,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub namespace: String,
    pub name: String,
    pub facets: Facets,
}

/// One run event as handed to a sink. Values of this type are plain
/// snapshots: nothing links them back to the builder that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEvent {
    pub event_type: EventType,
    pub event_time: DateTime<Utc>,
    pub run: Run,
    pub job: Job,
    pub inputs: Vec<Dataset>,
    pub outputs: Vec<Dataset>,
    pub producer: String,
    #[serde(rename = "schemaURL")]
    pub schema_url: String,
}

impl LineageEvent {
    pub fn run_id(&self) -> Uuid {
        self.run.run_id
    }

    pub fn job_facet(&self, key: &str) -> Option<&Facet> {
        self.job.facets.get(key)
    }

    pub fn run_facet(&self, key: &str) -> Option<&Facet> {
        self.run.facets.get(key)
    }
}
