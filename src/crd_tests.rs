// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use kube::CustomResourceExt;

    fn spec(project: &str) -> TenantInstanceSpec {
        TenantInstanceSpec {
            project_name: project.to_string(),
            ingress_class: None,
            ingress_domain: None,
            release_version: None,
            paused: false,
        }
    }

    #[test]
    fn test_phase_all_is_closed_and_ordered() {
        assert_eq!(Phase::ALL.len(), 7);
        assert_eq!(Phase::ALL[0], Phase::Pending);
        assert_eq!(Phase::ALL[6], Phase::Failed);
        let names: Vec<_> = Phase::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Pending",
                "Provisioning",
                "ProvisioningInProgress",
                "Running",
                "Deleting",
                "DeletingInProgress",
                "Failed"
            ]
        );
    }

    #[test]
    fn test_phase_serializes_verbatim() {
        for phase in Phase::ALL {
            let json = serde_json::to_value(phase).unwrap();
            assert_eq!(json, serde_json::Value::String(phase.as_str().to_string()));
            assert_eq!(phase.to_string(), phase.as_str());
        }
    }

    #[test]
    fn test_phase_path_predicates() {
        assert!(Phase::Deleting.is_deleting_path());
        assert!(Phase::DeletingInProgress.is_deleting_path());
        assert!(!Phase::Failed.is_deleting_path());
        assert!(!Phase::Running.is_deleting_path());
    }

    #[test]
    fn test_condition_type_parse() {
        for t in ConditionType::ALL {
            assert_eq!(ConditionType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ConditionType::parse("Degraded"), None);
        assert!(!ConditionType::ASPECTS.contains(&ConditionType::Ready));
    }

    #[test]
    fn test_status_defaults_when_fields_missing() {
        let status: TenantInstanceStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status.phase, Phase::Pending);
        assert!(status.conditions.is_empty());
        assert_eq!(status.failure_count, 0);
    }

    #[test]
    fn test_status_uses_camel_case() {
        let status = TenantInstanceStatus {
            phase: Phase::Running,
            observed_generation: Some(3),
            admin_url: Some("https://acme.example.com".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "Running");
        assert_eq!(json["observedGeneration"], 3);
        assert_eq!(json["adminUrl"], "https://acme.example.com");
        assert!(json.get("errorMessage").is_none());
    }

    #[test]
    fn test_spec_paused_defaults_false() {
        let spec: TenantInstanceSpec =
            serde_json::from_str(r#"{"projectName":"acme"}"#).unwrap();
        assert!(!spec.paused);
        assert!(spec.ingress_domain.is_none());
    }

    #[test]
    fn test_instance_phase_without_status() {
        let instance = TenantInstance::new("acme", spec("acme"));
        assert_eq!(instance.phase(), Phase::Pending);
        assert!(!instance.is_being_deleted());
    }

    #[test]
    fn test_crd_is_cluster_scoped_with_status() {
        let crd = TenantInstance::crd();
        assert_eq!(crd.spec.group, "tenancy.platform.io");
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.names.kind, "TenantInstance");
        let version = &crd.spec.versions[0];
        assert!(version.subresources.as_ref().unwrap().status.is_some());
        let columns = version.additional_printer_columns.as_ref().unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Project", "Phase", "Ready", "Age"]);
    }

    #[test]
    fn test_validate_project_name_accepts_dns_labels() {
        assert!(validate_project_name("acme").is_ok());
        assert!(validate_project_name("a").is_ok());
        assert!(validate_project_name("team-42").is_ok());
        assert!(validate_project_name(&"a".repeat(MAX_PROJECT_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_validate_project_name_rejects_malformed() {
        assert_eq!(validate_project_name(""), Err(SpecError::EmptyProjectName));
        assert!(matches!(
            validate_project_name("Acme"),
            Err(SpecError::InvalidProjectName { .. })
        ));
        assert!(matches!(
            validate_project_name("-acme"),
            Err(SpecError::InvalidProjectName { .. })
        ));
        assert!(matches!(
            validate_project_name("acme-"),
            Err(SpecError::InvalidProjectName { .. })
        ));
        assert!(matches!(
            validate_project_name("ac.me"),
            Err(SpecError::InvalidProjectName { .. })
        ));
        assert!(matches!(
            validate_project_name(&"a".repeat(MAX_PROJECT_NAME_LEN + 1)),
            Err(SpecError::ProjectNameTooLong { .. })
        ));
    }

    #[test]
    fn test_resource_coordinates_match_constants() {
        use crate::constants::{API_GROUP, API_GROUP_VERSION, API_VERSION, KIND_TENANT_INSTANCE};
        use kube::Resource;

        assert_eq!(TenantInstance::group(&()), API_GROUP);
        assert_eq!(TenantInstance::version(&()), API_VERSION);
        assert_eq!(TenantInstance::api_version(&()), API_GROUP_VERSION);
        assert_eq!(TenantInstance::kind(&()), KIND_TENANT_INSTANCE);
    }
}
