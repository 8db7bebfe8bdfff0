use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{LineageError, Result},
    events::{
        Dataset, ERROR_MESSAGE_FACET, EventType, Facet, FacetAttachments, Facets, Job,
        LineageEvent, PARAMS_FACET, PARENT_FACET, PRODUCER, Run, SCHEMA_URL, SQL_FACET,
    },
};

/// Accumulates one run event across calls and hands out snapshots of it.
///
/// Mutators work in place and return `&mut Self` so calls chain:
///
/// ```
/// use lineage_relay_core::events::{EventBuilder, FacetAttachments};
///
/// let mut job = EventBuilder::from_fields("myspace", "job_1", None)?;
/// job.input("public.input_1")
///     .input("public.input_2")
///     .attach_facets(FacetAttachments::new().with_sql("select 1"));
/// let started = job.dump();
///
/// job.output("public.output_1").complete(None);
/// let completed = job.dump();
/// assert_eq!(started.run_id(), completed.run_id());
/// # Ok::<(), lineage_relay_core::LineageError>(())
/// ```
///
/// The builder does not police event type transitions. Calling `complete`
/// twice, or emitting RUNNING after COMPLETE, is allowed.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: LineageEvent,
}

fn non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LineageError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

impl EventBuilder {
    pub fn from_fields(
        namespace: impl Into<String>,
        name: impl Into<String>,
        run_id: Option<Uuid>,
    ) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();
        non_empty("namespace", &namespace)?;
        non_empty("name", &name)?;

        Ok(Self {
            event: LineageEvent {
                event_type: EventType::Start,
                event_time: Utc::now(),
                run: Run::new(run_id.unwrap_or_else(Uuid::new_v4)),
                job: Job {
                    namespace,
                    name,
                    facets: Facets::new(),
                },
                inputs: Vec::new(),
                outputs: Vec::new(),
                producer: PRODUCER.to_string(),
                schema_url: SCHEMA_URL.to_string(),
            },
        })
    }

    /// Continue from an existing snapshot, e.g. one received from elsewhere.
    pub fn from_event(event: LineageEvent) -> Result<Self> {
        non_empty("namespace", &event.job.namespace)?;
        non_empty("name", &event.job.name)?;
        Ok(Self { event })
    }

    pub fn namespace(&self) -> &str {
        &self.event.job.namespace
    }

    pub fn name(&self) -> &str {
        &self.event.job.name
    }

    pub fn run_id(&self) -> Uuid {
        self.event.run.run_id
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        self.event.event_time
    }

    pub fn parent(&self) -> Result<&LineageEvent> {
        self.event
            .job
            .facets
            .get(PARENT_FACET)
            .and_then(Facet::as_parent)
            .ok_or(LineageError::NotAttached {
                facet: PARENT_FACET,
            })
    }

    /// Attach every facet present in `facets`, overwriting earlier values
    /// under the same key. An empty error string counts as absent.
    pub fn attach_facets(&mut self, facets: FacetAttachments) -> &mut Self {
        let FacetAttachments {
            parent,
            params,
            sql,
            error,
        } = facets;

        if let Some(parent) = parent {
            self.attach_job_facet(PARENT_FACET, Facet::parent(parent));
        }

        if let Some(error) = error.filter(|e| !e.is_empty()) {
            self.attach_run_facet(ERROR_MESSAGE_FACET, Facet::error_message(error));
        }

        if let Some(sql) = sql {
            self.attach_job_facet(SQL_FACET, Facet::sql(sql));
        }

        if let Some(params) = params {
            self.attach_job_facet(PARAMS_FACET, Facet::Params(params));
        }

        self
    }

    pub fn attach_job_facet(&mut self, key: impl Into<String>, facet: Facet) -> &mut Self {
        self.event.job.facets.insert(key.into(), facet);
        self
    }

    pub fn attach_run_facet(&mut self, key: impl Into<String>, facet: Facet) -> &mut Self {
        self.event.run.facets.insert(key.into(), facet);
        self
    }

    /// Start a logically new run. Only the run id changes.
    pub fn reset_run_id(&mut self, run_id: Option<Uuid>) -> &mut Self {
        self.event.run.run_id = run_id.unwrap_or_else(Uuid::new_v4);
        self
    }

    /// Refresh the event time. The time never moves backwards, even if the
    /// wall clock does.
    pub fn touch_event_time(&mut self) -> &mut Self {
        let now = Utc::now();
        if now > self.event.event_time {
            self.event.event_time = now;
        }
        self
    }

    pub fn set_event_type(&mut self, event_type: EventType) -> &mut Self {
        self.event.event_type = event_type;
        self
    }

    pub fn attach_input(
        &mut self,
        name: impl Into<String>,
        facets: Option<Facets>,
        namespace: Option<&str>,
    ) -> &mut Self {
        let dataset = self.dataset(name.into(), facets, namespace);
        self.event.inputs.push(dataset);
        self
    }

    pub fn attach_output(
        &mut self,
        name: impl Into<String>,
        facets: Option<Facets>,
        namespace: Option<&str>,
    ) -> &mut Self {
        let dataset = self.dataset(name.into(), facets, namespace);
        self.event.outputs.push(dataset);
        self
    }

    /// Shorthand for an input in the job namespace without facets.
    pub fn input(&mut self, name: impl Into<String>) -> &mut Self {
        self.attach_input(name, None, None)
    }

    /// Shorthand for an output in the job namespace without facets.
    pub fn output(&mut self, name: impl Into<String>) -> &mut Self {
        self.attach_output(name, None, None)
    }

    pub fn running(&mut self) -> &mut Self {
        self.set_event_type(EventType::Running)
    }

    pub fn abort(&mut self) -> &mut Self {
        self.set_event_type(EventType::Abort)
    }

    /// Finish the run: FAIL with an error facet when `error` is non-empty,
    /// COMPLETE otherwise.
    pub fn complete(&mut self, error: Option<&str>) -> &mut Self {
        match error.filter(|e| !e.is_empty()) {
            Some(error) => {
                self.set_event_type(EventType::Fail);
                self.attach_facets(FacetAttachments::new().with_error(error))
            }
            None => self.set_event_type(EventType::Complete),
        }
    }

    pub fn snapshot(&mut self, refresh_time: bool) -> LineageEvent {
        if refresh_time {
            self.touch_event_time();
        }
        self.event.clone()
    }

    pub fn dump(&mut self) -> LineageEvent {
        self.snapshot(true)
    }

    fn dataset(&self, name: String, facets: Option<Facets>, namespace: Option<&str>) -> Dataset {
        Dataset {
            namespace: namespace
                .filter(|ns| !ns.is_empty())
                .unwrap_or(self.namespace())
                .to_string(),
            name,
            facets: facets.unwrap_or_default(),
        }
    }
}
