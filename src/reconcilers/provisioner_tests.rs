// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `provisioner.rs`

#[cfg(test)]
mod tests {
    use crate::config::ControllerDefaults;
    use crate::crd::{TenantInstance, TenantInstanceSpec};
    use crate::labels::{CERT_MANAGER_CLUSTER_ISSUER_ANNOTATION, K8S_MANAGED_BY};
    use crate::reconcilers::provisioner::*;
    use crate::release::{values_digest, ReleaseInfo};
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn instance(project: &str) -> TenantInstance {
        TenantInstance::new(
            project,
            TenantInstanceSpec {
                project_name: project.to_string(),
                ingress_class: None,
                ingress_domain: None,
                release_version: None,
                paused: false,
            },
        )
    }

    fn desired() -> DesiredState {
        DesiredState::new(&instance("acme"), &ControllerDefaults::default())
    }

    fn counter() -> impl FnMut() -> String {
        let mut n = 0;
        move || {
            n += 1;
            format!("generated-{n}")
        }
    }

    fn secret_value(action: &ObjectAction<k8s_openapi::api::core::v1::Secret>, key: &str) -> Option<String> {
        let secret = match action {
            ObjectAction::Create(s) | ObjectAction::Update(s) => s,
            ObjectAction::Unchanged => return None,
        };
        secret
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .map(|v| String::from_utf8_lossy(&v.0).to_string())
    }

    #[test]
    fn test_desired_state_names() {
        let d = desired();
        assert_eq!(d.namespace, "tenant-acme");
        assert_eq!(d.release_name, "acme");
        assert_eq!(d.secret_name, "acme-credentials");
        assert_eq!(d.ingress_name, "acme");
        assert_eq!(d.admin_host, "acme.tenants.local");
        assert_eq!(d.api_host, "acme-api.tenants.local");
        assert_eq!(d.admin_url(), "http://acme.tenants.local");
        assert_eq!(d.api_url(), "http://acme-api.tenants.local");
    }

    #[test]
    fn test_desired_state_spec_overrides_defaults() {
        let mut inst = instance("acme");
        inst.spec.ingress_domain = Some("example.com".to_string());
        inst.spec.ingress_class = Some("traefik".to_string());
        inst.spec.release_version = Some("2.0.0".to_string());
        let defaults = ControllerDefaults {
            tls_issuer: Some("letsencrypt".to_string()),
            ..Default::default()
        };

        let d = DesiredState::new(&inst, &defaults);
        assert_eq!(d.ingress_class, "traefik");
        assert_eq!(d.admin_host, "acme.example.com");
        assert_eq!(d.chart_version, "2.0.0");
        assert_eq!(d.admin_url(), "https://acme.example.com");
    }

    #[test]
    fn test_plan_namespace_create_then_unchanged() {
        let d = desired();
        let ObjectAction::Create(ns) = plan_namespace(&d, None) else {
            panic!("expected create");
        };
        assert_eq!(ns.metadata.name.as_deref(), Some("tenant-acme"));
        assert!(matches!(plan_namespace(&d, Some(&ns)), ObjectAction::Unchanged));
    }

    #[test]
    fn test_plan_namespace_adds_missing_labels_and_keeps_others() {
        let d = desired();
        let mut ns = build_namespace(&d);
        ns.metadata.labels = Some(BTreeMap::from([("team".to_string(), "blue".to_string())]));

        let ObjectAction::Update(updated) = plan_namespace(&d, Some(&ns)) else {
            panic!("expected update");
        };
        let labels = updated.metadata.labels.unwrap_or_default();
        assert_eq!(labels.get("team").map(String::as_str), Some("blue"));
        assert!(labels.contains_key(K8S_MANAGED_BY));
    }

    #[test]
    fn test_plan_secret_create_generates_all_keys() {
        let d = desired();
        let mut generator = counter();
        let action = plan_secret(&d, None, &mut generator);
        assert!(matches!(action, ObjectAction::Create(_)));
        assert_eq!(secret_value(&action, SECRET_KEY_PROJECT_NAME).as_deref(), Some("acme"));
        assert_eq!(secret_value(&action, SECRET_KEY_ADMIN_USERNAME).as_deref(), Some("admin"));
        for key in GENERATED_SECRET_KEYS {
            assert!(secret_value(&action, key).is_some_and(|v| v.starts_with("generated-")));
        }
    }

    #[test]
    fn test_plan_secret_preserves_generated_values() {
        let d = desired();
        let mut generator = counter();
        let ObjectAction::Create(secret) = plan_secret(&d, None, &mut generator) else {
            panic!("expected create");
        };

        let mut never = || -> String { panic!("must not regenerate") };
        assert!(matches!(plan_secret(&d, Some(&secret), &mut never), ObjectAction::Unchanged));
    }

    #[test]
    fn test_plan_secret_fills_only_missing_key() {
        let d = desired();
        let mut generator = counter();
        let ObjectAction::Create(mut secret) = plan_secret(&d, None, &mut generator) else {
            panic!("expected create");
        };
        let data = secret.data.get_or_insert_with(BTreeMap::new);
        let original_password = data.get(SECRET_KEY_ADMIN_PASSWORD).cloned();
        data.remove(SECRET_KEY_API_KEY);

        let mut refill = || "refilled".to_string();
        let action = plan_secret(&d, Some(&secret), &mut refill);
        assert!(matches!(action, ObjectAction::Update(_)));
        assert_eq!(secret_value(&action, SECRET_KEY_API_KEY).as_deref(), Some("refilled"));
        assert_eq!(
            secret_value(&action, SECRET_KEY_ADMIN_PASSWORD).map(|s| ByteString(s.into_bytes())),
            original_password
        );
    }

    #[test]
    fn test_generate_secret_value_is_random_and_url_safe() {
        let a = generate_secret_value();
        let b = generate_secret_value();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_plan_ingress_routes_both_hosts() {
        let d = desired();
        let ObjectAction::Create(ingress) = plan_ingress(&d, None) else {
            panic!("expected create");
        };
        let spec = ingress.spec.clone().unwrap_or_default();
        let rules = spec.rules.unwrap_or_default();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].host.as_deref(), Some("acme.tenants.local"));
        assert_eq!(rules[1].host.as_deref(), Some("acme-api.tenants.local"));
        let backend = rules[1]
            .http
            .as_ref()
            .and_then(|h| h.paths[0].backend.service.as_ref())
            .map(|s| s.name.clone());
        assert_eq!(backend.as_deref(), Some("acme-api"));
        assert!(spec.tls.is_none());
        assert!(matches!(plan_ingress(&d, Some(&ingress)), ObjectAction::Unchanged));
    }

    #[test]
    fn test_plan_ingress_tls_and_drift() {
        let mut d = desired();
        d.tls_issuer = Some("letsencrypt".to_string());
        let ingress = build_ingress(&d);
        assert_eq!(
            ingress
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(CERT_MANAGER_CLUSTER_ISSUER_ANNOTATION))
                .map(String::as_str),
            Some("letsencrypt")
        );
        assert!(ingress.spec.as_ref().and_then(|s| s.tls.as_ref()).is_some());

        let mut drifted = ingress.clone();
        if let Some(spec) = drifted.spec.as_mut() {
            spec.ingress_class_name = Some("other".to_string());
        }
        let ObjectAction::Update(fixed) = plan_ingress(&d, Some(&drifted)) else {
            panic!("expected update");
        };
        assert_eq!(fixed.spec, ingress.spec);
    }

    #[test]
    fn test_release_request_and_plan() {
        let d = desired();
        let credentials = BTreeMap::from([
            (SECRET_KEY_ADMIN_USERNAME.to_string(), "admin".to_string()),
            (SECRET_KEY_ADMIN_PASSWORD.to_string(), "pw".to_string()),
        ]);
        let defaults = ControllerDefaults::default();
        let request = release_request(&d, &credentials, &defaults);
        assert_eq!(request.name, "acme");
        assert_eq!(request.namespace, "tenant-acme");
        assert_eq!(request.chart_version, defaults.chart_version);
        assert_eq!(request.values["credentials"]["adminPassword"], "pw");

        assert!(matches!(plan_release(&request, None), ObjectAction::Create(_)));

        let mut info = ReleaseInfo {
            name: "acme".to_string(),
            namespace: "tenant-acme".to_string(),
            revision: 1,
            status: "deployed".to_string(),
            chart_name: defaults.chart_name.clone(),
            chart_version: defaults.chart_version.clone(),
            values_digest: Some(values_digest(&request.values)),
        };
        assert!(matches!(plan_release(&request, Some(&info)), ObjectAction::Unchanged));

        info.status = "failed".to_string();
        assert!(matches!(plan_release(&request, Some(&info)), ObjectAction::Update(_)));

        info.status = "deployed".to_string();
        info.chart_version = "0.0.1".to_string();
        assert!(matches!(plan_release(&request, Some(&info)), ObjectAction::Update(_)));
    }
}
