//! Cohort service: compile, execute, read back.

use cohortql_core::{CohortQueryKind, CompiledQuery, DatasetNamespace, Domain, SearchRequest};
use cohortql_warehouse::{DynWarehouse, QueryRows};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::binder::format_for_log;
use crate::compiler::CohortCompiler;
use crate::error::CohortError;
use crate::review::{EventPage, ParticipantEvent, participant_events_query};

pub type Result<T> = std::result::Result<T, CohortError>;

#[derive(Clone)]
pub struct CohortService {
    compiler: Arc<CohortCompiler>,
    client: DynWarehouse,
}

impl CohortService {
    pub fn new(compiler: CohortCompiler, client: DynWarehouse) -> Self {
        Self {
            compiler: Arc::new(compiler),
            client,
        }
    }

    pub fn compiler(&self) -> &CohortCompiler {
        &self.compiler
    }

    /// Number of distinct persons matching the definition.
    pub async fn count_participants(
        &self,
        request: &SearchRequest,
        namespace: &DatasetNamespace,
    ) -> Result<i64> {
        let query = self.compiler.compile(request, namespace, CohortQueryKind::Count)?;
        let rows = self.execute(&query).await?;
        let count = rows.single_i64("count")?;
        info!(
            count,
            backend = self.client.backend_name(),
            "cohort count executed"
        );
        Ok(count)
    }

    /// Matching person ids, ascending.
    pub async fn participant_ids(
        &self,
        request: &SearchRequest,
        namespace: &DatasetNamespace,
    ) -> Result<Vec<i64>> {
        let query = self
            .compiler
            .compile(request, namespace, CohortQueryKind::PersonIds)?;
        let rows = self.execute(&query).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            match row.get_i64("person_id")? {
                Some(id) => ids.push(id),
                None => warn!("skipping row without person_id"),
            }
        }
        info!(
            persons = ids.len(),
            backend = self.client.backend_name(),
            "cohort person ids executed"
        );
        Ok(ids)
    }

    /// One page of a participant's events in `domain`, newest first.
    pub async fn participant_events(
        &self,
        namespace: &DatasetNamespace,
        domain: Domain,
        person_id: i64,
        page: EventPage,
    ) -> Result<Vec<ParticipantEvent>> {
        let query = participant_events_query(namespace, domain, person_id, page);
        let rows = self.execute(&query).await?;
        Ok(ParticipantEvent::from_rows(&rows)?)
    }

    async fn execute(&self, query: &CompiledQuery) -> Result<QueryRows> {
        if self.compiler.config().log_sql {
            debug!(sql = %format_for_log(&query.sql, &query.parameters), "executing query");
        }
        Ok(self.client.execute(query).await?)
    }
}

impl std::fmt::Debug for CohortService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohortService")
            .field("compiler", &self.compiler)
            .field("backend", &self.client.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohortql_core::{SearchGroup, SearchGroupItem, SearchParameter};
    use cohortql_warehouse::{Fixture, FixtureEvent, FixturePerson, InMemoryWarehouse};
    use time::macros::date;

    fn service() -> CohortService {
        let fixture = Fixture::new(date!(2024 - 01 - 01))
            .with_person(FixturePerson::new(1, date!(1980 - 05 - 01), 8507))
            .with_person(FixturePerson::new(2, date!(1990 - 05 - 01), 8532))
            .with_person(FixturePerson::new(3, date!(1970 - 05 - 01), 8507))
            .with_event(FixtureEvent::new(3, Domain::Condition, 1, date!(2020 - 01 - 01)).with_code("250.1"));
        CohortService::new(
            CohortCompiler::default(),
            Arc::new(InMemoryWarehouse::new(fixture)),
        )
    }

    fn male() -> SearchRequest {
        let item = SearchGroupItem::new("i1", "DEMO").with_parameter(
            SearchParameter::new("DEMO").with_subtype("GEN").with_concept_id(8507),
        );
        SearchRequest::default().with_include(SearchGroup::new("g1").with_item(item))
    }

    fn namespace() -> DatasetNamespace {
        DatasetNamespace::new("proj", "cdr").unwrap()
    }

    #[tokio::test]
    async fn test_count_participants() {
        assert_eq!(service().count_participants(&male(), &namespace()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_participant_ids() {
        assert_eq!(
            service().participant_ids(&male(), &namespace()).await.unwrap(),
            vec![1, 3]
        );
    }

    #[test]
    fn test_invalid_request_is_compile_error() {
        let result = tokio_test::block_on(
            service().count_participants(&SearchRequest::default(), &namespace()),
        );
        assert!(matches!(result, Err(CohortError::Compile(_))));
    }

    #[tokio::test]
    async fn test_participant_events() {
        let events = service()
            .participant_events(&namespace(), Domain::Condition, 3, EventPage::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source_concept_id, Some(1));
    }
}
