//! End-to-end workflow scenarios against the in-memory store

use async_trait::async_trait;
use certflow_core::{
    validation::rule_ids, CoreError, DefinitionId, DomainEvent, DomainEventHandler, FieldMap,
    Priority, StepMatching, StepSubmission, TracingEventHandler, WorkflowConfig,
    WorkflowInstanceRepository, WorkflowService, WorkflowStatus, COMPLETED_STEP,
};
use certflow_state_inmemory::InMemoryStateStoreProvider;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fields(value: Value) -> FieldMap {
    value.as_object().cloned().unwrap()
}

fn boiler_bundle() -> String {
    json!({
        "definitions": [{
            "id": "boiler",
            "name": "Boiler installation certificate",
            "version": "2024.1",
            "slaHours": 72,
            "steps": [
                {"id": "applicant_data", "stepRef": "steps/boiler/applicant_data", "nextStep": "document_upload"},
                {"id": "document_upload", "stepRef": "steps/boiler/document_upload", "nextStep": "final_approval"},
                {"id": "final_approval", "stepRef": "steps/boiler/final_approval", "nextStep": "completed"}
            ]
        }],
        "steps": {
            "steps/boiler/applicant_data": {
                "id": "applicant_data",
                "title": "Applicant and installation",
                "actor": "customer",
                "fields": [
                    {"key": "name", "type": "text", "label": "Name", "required": true},
                    {"key": "email", "type": "email", "label": "E-mail", "pattern": "^[^@\\s]+@[^@\\s]+$"},
                    {"key": "power", "type": "number", "label": "Power", "required": true,
                     "min": 0, "max": 10000, "pattern": "^-?\\d+(\\.\\d+)?$", "patternMessage": "Power must be numeric"},
                    {"key": "fuel", "type": "select", "label": "Fuel",
                     "options": [{"value": "gas", "label": "Gas"}, {"value": "oil", "label": "Oil"}]},
                    {"key": "tank_location", "type": "text", "label": "Tank location",
                     "requiredIf": {"field": "fuel", "values": ["oil"]}}
                ]
            },
            "steps/boiler/document_upload": {
                "id": "document_upload",
                "title": "Documents",
                "actor": "customer",
                "fields": [
                    {"key": "site_plan", "type": "file", "label": "Site plan",
                     "accept": [".pdf"], "maxFileSize": 5000000},
                    {"key": "rooms", "type": "table", "label": "Rooms", "minRows": 1}
                ]
            },
            "steps/boiler/final_approval": {
                "id": "final_approval",
                "title": "Inspection result",
                "actor": "inspector",
                "fields": [
                    {"key": "safety_score", "type": "number", "label": "Safety score",
                     "required": true, "min": 0, "max": 100}
                ]
            }
        }
    })
    .to_string()
}

fn setup_with(config: WorkflowConfig) -> (InMemoryStateStoreProvider, WorkflowService) {
    init_tracing();
    let provider = InMemoryStateStoreProvider::new();
    let (_, definitions) = provider.create_repositories();
    definitions.load_json(&boiler_bundle()).unwrap();
    let service = provider.create_service(Arc::new(TracingEventHandler), config);
    (provider, service)
}

fn setup() -> (InMemoryStateStoreProvider, WorkflowService) {
    setup_with(WorkflowConfig::default())
}

fn applicant_data() -> FieldMap {
    fields(json!({
        "name": "Ada Lovelace",
        "email": "ada@example.org",
        "power": "123.45",
        "fuel": "gas"
    }))
}

fn document_data() -> FieldMap {
    fields(json!({
        "site_plan": {"name": "plan.pdf", "size": 120000},
        "rooms": [{"name": "Basement", "area": 20}]
    }))
}

fn boiler() -> DefinitionId {
    DefinitionId("boiler".to_string())
}

#[tokio::test]
async fn test_three_step_workflow_completes() -> Result<(), CoreError> {
    let (_, service) = setup();

    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec!["gas".to_string()])
        .await?;
    assert_eq!(instance.current_step, "applicant_data");
    assert_eq!(instance.assigned_actor.as_deref(), Some("customer"));
    assert!(instance.sla_deadline.is_some());

    let instance = service
        .submit_step(
            &instance.id,
            StepSubmission::new("applicant_data", applicant_data(), "applicant-1"),
        )
        .await?;
    assert_eq!(instance.current_step, "document_upload");
    assert_eq!(instance.step_history.len(), 1);

    let instance = service
        .submit_step(
            &instance.id,
            StepSubmission::new("document_upload", document_data(), "applicant-1"),
        )
        .await?;
    assert_eq!(instance.current_step, "final_approval");
    assert_eq!(instance.assigned_actor.as_deref(), Some("inspector"));
    assert_eq!(instance.step_history.len(), 2);

    let instance = service
        .submit_step(
            &instance.id,
            StepSubmission::new("final_approval", fields(json!({"safety_score": 85})), "inspector-7")
                .with_decision("approve")
                .with_comments("All good"),
        )
        .await?;

    assert_eq!(instance.status, WorkflowStatus::Completed);
    assert_eq!(instance.current_step, COMPLETED_STEP);
    assert!(instance.completed_at.is_some());
    assert_eq!(instance.step_history.len(), 3);
    assert_eq!(instance.version, 4);

    let steps: Vec<_> = instance.step_history.iter().map(|h| h.step_id.as_str()).collect();
    assert_eq!(steps, vec!["applicant_data", "document_upload", "final_approval"]);
    assert!(instance
        .step_history
        .windows(2)
        .all(|w| w[0].completed_at <= w[1].completed_at));

    // Every snapshot holds the merged data as of that submission
    assert_eq!(instance.step_history[0].data_snapshot, applicant_data());
    assert_eq!(instance.step_history[2].data_snapshot, instance.current_data);
    assert_eq!(instance.current_data["safety_score"], json!(85));

    // Keys from all three submissions survive the shallow merges
    let final_data = fields(json!({"safety_score": 85}));
    for (key, value) in applicant_data()
        .iter()
        .chain(document_data().iter())
        .chain(final_data.iter())
    {
        assert_eq!(instance.current_data.get(key), Some(value), "field {}", key);
    }

    let stored = service.get_instance(&instance.id).await?;
    assert_eq!(stored.version, 4);
    assert_eq!(stored.status, WorkflowStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn test_required_fields_reported() -> Result<(), CoreError> {
    let (_, service) = setup();
    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;

    let report = service
        .validate_step(&instance.id, "applicant_data", &fields(json!({"email": "ada@example.org"})))
        .await?;

    let required: Vec<_> = report
        .by_rule(rule_ids::REQUIRED)
        .map(|v| v.field.as_str())
        .collect();
    assert_eq!(required, vec!["name", "power"]);
    Ok(())
}

#[tokio::test]
async fn test_numeric_inputs() -> Result<(), CoreError> {
    let (_, service) = setup();
    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;

    let with_power = |power: &str| {
        let mut data = applicant_data();
        data.insert("power".to_string(), json!(power));
        data
    };

    let negative = service
        .validate_step(&instance.id, "applicant_data", &with_power("-1"))
        .await?;
    let ids: Vec<_> = negative.violations().iter().map(|v| v.rule_id.as_str()).collect();
    assert_eq!(ids, vec![rule_ids::NUMERIC_RANGE]);

    let garbage = service
        .validate_step(&instance.id, "applicant_data", &with_power("123W"))
        .await?;
    let ids: Vec<_> = garbage.violations().iter().map(|v| v.rule_id.as_str()).collect();
    assert_eq!(ids, vec![rule_ids::NUMERIC_RANGE, rule_ids::PATTERN]);
    assert_eq!(garbage.violations()[1].message, "Power must be numeric");

    let decimal = service
        .validate_step(&instance.id, "applicant_data", &with_power("123.45"))
        .await?;
    assert!(decimal.is_valid());
    Ok(())
}

#[tokio::test]
async fn test_conditional_and_option_fields() -> Result<(), CoreError> {
    let (_, service) = setup();
    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;

    let mut oil = applicant_data();
    oil.insert("fuel".to_string(), json!("oil"));
    let report = service.validate_step(&instance.id, "applicant_data", &oil).await?;
    assert_eq!(report.by_rule(rule_ids::REQUIRED_IF).count(), 1);
    assert_eq!(report.violations()[0].field, "tank_location");

    let mut coal = applicant_data();
    coal.insert("fuel".to_string(), json!("coal"));
    let report = service.validate_step(&instance.id, "applicant_data", &coal).await?;
    assert_eq!(report.by_rule(rule_ids::ALLOWED_VALUES).count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_validate_step_is_idempotent() -> Result<(), CoreError> {
    let (_, service) = setup();
    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;
    let data = fields(json!({"power": "-1"}));

    let first = service.validate_step(&instance.id, "applicant_data", &data).await?;
    let second = service.validate_step(&instance.id, "applicant_data", &data).await?;
    assert_eq!(first, second);

    let stored = service.get_instance(&instance.id).await?;
    assert_eq!(stored.version, instance.version);
    assert!(stored.current_data.is_empty());
    assert!(stored.step_history.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stale_step_submission_leaves_instance_unchanged() -> Result<(), CoreError> {
    let (_, service) = setup();
    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;
    let instance = service
        .submit_step(
            &instance.id,
            StepSubmission::new("applicant_data", applicant_data(), "applicant-1"),
        )
        .await?;

    // Re-submitting the first step after it advanced
    let err = service
        .submit_step(
            &instance.id,
            StepSubmission::new("applicant_data", applicant_data(), "applicant-1"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidStep(_)));

    let stored = service.get_instance(&instance.id).await?;
    assert_eq!(stored.current_step, "document_upload");
    assert_eq!(stored.step_history.len(), 1);
    assert_eq!(stored.version, instance.version);
    Ok(())
}

#[tokio::test]
async fn test_document_step_rules() -> Result<(), CoreError> {
    let (_, service) = setup();
    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;
    let instance = service
        .submit_step(
            &instance.id,
            StepSubmission::new("applicant_data", applicant_data(), "applicant-1"),
        )
        .await?;

    // Two files on a single-file field
    let two_files = fields(json!({
        "site_plan": [{"name": "a.pdf", "size": 10}, {"name": "b.pdf", "size": 10}],
        "rooms": [{"name": "Basement"}]
    }));
    let report = service
        .validate_step(&instance.id, "document_upload", &two_files)
        .await?;
    let file_issues: Vec<_> = report.by_rule(rule_ids::FILE_UPLOAD).collect();
    assert_eq!(file_issues.len(), 1);
    assert!(file_issues[0].message.contains("only one file"));

    // No rows and no documents
    let empty = fields(json!({"rooms": []}));
    let report = service.validate_step(&instance.id, "document_upload", &empty).await?;
    assert_eq!(report.by_rule(rule_ids::MIN_TABLE_ENTRIES).count(), 1);
    assert_eq!(report.by_rule(rule_ids::AT_LEAST_ONE_DOCUMENT).count(), 1);

    // Rows as a JSON string count the same as a list
    let as_string = fields(json!({
        "site_plan": "{\"name\":\"plan.pdf\",\"size\":100}",
        "rooms": "[{\"name\":\"Basement\"},{\"name\":\"Attic\"}]"
    }));
    let report = service
        .validate_step(&instance.id, "document_upload", &as_string)
        .await?;
    assert!(report.is_valid(), "unexpected violations: {}", report);
    Ok(())
}

#[tokio::test]
async fn test_low_safety_score_blocks_approval() -> Result<(), CoreError> {
    let (_, service) = setup();
    let mut instance = service
        .create_instance(&boiler(), "applicant-1", Priority::High, vec![])
        .await?;
    for (step, data) in [("applicant_data", applicant_data()), ("document_upload", document_data())] {
        instance = service
            .submit_step(&instance.id, StepSubmission::new(step, data, "applicant-1"))
            .await?;
    }

    let err = service
        .submit_step(
            &instance.id,
            StepSubmission::new("final_approval", fields(json!({"safety_score": 42})), "inspector-7")
                .with_decision("approve"),
        )
        .await
        .unwrap_err();
    let report = err.validation_report().unwrap();
    assert_eq!(report.violations().len(), 1);
    assert_eq!(report.violations()[0].rule_id, rule_ids::SAFETY_SCORE_THRESHOLD);

    let stored = service.get_instance(&instance.id).await?;
    assert_eq!(stored.current_step, "final_approval");
    assert_eq!(stored.step_history.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_stale_version_rejected() -> Result<(), CoreError> {
    let (provider, service) = setup();
    let (instance_repo, _) = provider.create_repositories();

    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;

    // A second writer loads the instance before the submission lands
    let mut concurrent = instance_repo.find_by_id(&instance.id).await?.unwrap();
    let loaded_version = concurrent.version;

    service
        .submit_step(
            &instance.id,
            StepSubmission::new("applicant_data", applicant_data(), "applicant-1"),
        )
        .await?;

    concurrent.tags.push("late".to_string());
    concurrent.version = loaded_version + 1;
    let err = instance_repo
        .save(&concurrent, Some(loaded_version))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ConcurrencyConflict(_)));

    let stored = service.get_instance(&instance.id).await?;
    assert!(stored.tags.is_empty());
    assert_eq!(stored.step_history.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_workflows_by_status_and_actor() -> Result<(), CoreError> {
    let (_, service) = setup();

    let first = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;
    let second = service
        .create_instance(&boiler(), "applicant-2", Priority::Low, vec![])
        .await?;
    let mut third = service
        .create_instance(&boiler(), "applicant-3", Priority::Urgent, vec![])
        .await?;
    for (step, data) in [("applicant_data", applicant_data()), ("document_upload", document_data())] {
        third = service
            .submit_step(&third.id, StepSubmission::new(step, data, "applicant-3"))
            .await?;
    }

    let customer = service
        .get_workflows_by_status(WorkflowStatus::InProgress, Some("customer"))
        .await?;
    let mut ids: Vec<_> = customer.iter().map(|i| i.id.clone()).collect();
    ids.sort_by(|a, b| a.0.cmp(&b.0));
    let mut expected = vec![first.id.clone(), second.id.clone()];
    expected.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(ids, expected);

    let inspector = service
        .get_workflows_by_status(WorkflowStatus::InProgress, Some("inspector"))
        .await?;
    assert_eq!(inspector.len(), 1);
    assert_eq!(inspector[0].id, third.id);

    let completed = service
        .get_workflows_by_status(WorkflowStatus::Completed, None)
        .await?;
    assert!(completed.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_legacy_suffix_step_matching() -> Result<(), CoreError> {
    let exact = setup();
    let legacy = setup_with(WorkflowConfig {
        step_matching: StepMatching::LegacySuffix,
        ..WorkflowConfig::default()
    });

    for (_, service) in [&exact, &legacy] {
        let instance = service
            .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
            .await?;
        let result = service
            .validate_step(&instance.id, "boiler/applicant_data", &applicant_data())
            .await;

        match service.config().step_matching {
            StepMatching::Exact => assert!(matches!(result, Err(CoreError::InvalidStep(_)))),
            StepMatching::LegacySuffix => assert!(result?.is_valid()),
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_unknown_definition_and_instance() {
    let (_, service) = setup();

    let err = service
        .create_instance(&DefinitionId("elevator".to_string()), "a", Priority::Normal, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DefinitionNotFound(_)));

    let err = service
        .get_instance(&certflow_core::WorkflowInstanceId("missing".to_string()))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[derive(Default)]
struct CollectingHandler {
    events: Mutex<Vec<(String, &'static str)>>,
}

#[async_trait]
impl DomainEventHandler for CollectingHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        self.events
            .lock()
            .unwrap()
            .push((event.workflow_instance_id().0.clone(), event.event_type()));
        Ok(())
    }
}

#[tokio::test]
async fn test_events_dispatched_after_each_write() -> Result<(), CoreError> {
    init_tracing();
    let provider = InMemoryStateStoreProvider::new();
    let (_, definitions) = provider.create_repositories();
    definitions.load_json(&boiler_bundle())?;

    let handler = Arc::new(CollectingHandler::default());
    let service = provider.create_service(handler.clone(), WorkflowConfig::default());

    let instance = service
        .create_instance(&boiler(), "applicant-1", Priority::Normal, vec![])
        .await?;
    service
        .submit_step(
            &instance.id,
            StepSubmission::new("applicant_data", fields(json!({"name": "x"})), "applicant-1"),
        )
        .await
        .unwrap_err();
    service
        .submit_step(
            &instance.id,
            StepSubmission::new("applicant_data", applicant_data(), "applicant-1"),
        )
        .await?;

    let events = handler.events.lock().unwrap().clone();
    let types: Vec<_> = events.iter().map(|(_, t)| *t).collect();
    assert_eq!(types, vec!["workflow_instance.created", "step.submitted"]);
    assert!(events.iter().all(|(id, _)| id == &instance.id.0));
    Ok(())
}
