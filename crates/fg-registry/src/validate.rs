// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-reference validation of loaded definitions.
//!
//! References resolve against the enclosing domain file; operation bindings
//! resolve against the OpenAPI index.  All problems are collected into one
//! report rather than failing on the first.

use crate::DefinitionRegistry;
use fg_core::{DomainDefinition, InputMapping, OperationBinding, StepType};
use fg_openapi::OpenApiIndex;

/// Validate every domain in the registry.  Returns the full problem list;
/// empty means valid.
pub fn validate(registry: &DefinitionRegistry, index: Option<&OpenApiIndex>) -> Vec<String> {
    let mut errors = Vec::new();
    for domain in registry.domains() {
        validate_domain(domain, index, &mut errors);
    }
    errors
}

fn validate_domain(
    domain: &DomainDefinition,
    index: Option<&OpenApiIndex>,
    errors: &mut Vec<String>,
) {
    let d = &domain.domain;
    if d.trim().is_empty() {
        errors.push("definition file declares an empty domain".to_string());
        return;
    }

    // -- capability prefixes on pages and forms ------------------------------
    for page in &domain.pages {
        for cap in &page.capabilities {
            check_capability_prefix(d, "page", &page.id, cap, errors);
        }
    }
    for form in &domain.forms {
        for cap in &form.capabilities {
            check_capability_prefix(d, "form", &form.id, cap, errors);
        }
    }

    // -- command bindings ----------------------------------------------------
    for cmd in &domain.commands {
        check_binding(index, "command", &cmd.id, &cmd.operation, errors);
        check_mapping_strategy("command", &cmd.id, &cmd.input_mapping, errors);
    }

    // -- form references -----------------------------------------------------
    for form in &domain.forms {
        if let Some(cmd) = &form.submit_command {
            if !domain.commands.iter().any(|c| &c.id == cmd) {
                errors.push(format!(
                    "form '{}' submits unknown command '{cmd}'",
                    form.id
                ));
            }
        }
        for field in &form.fields {
            if let Some(lookup) = &field.lookup_id {
                if !domain.lookups.iter().any(|l| &l.id == lookup) {
                    errors.push(format!(
                        "form '{}' field '{}' references unknown lookup '{lookup}'",
                        form.id, field.name
                    ));
                }
            }
        }
        if let Some(ds) = &form.data_source {
            check_binding(index, "form", &form.id, &ds.operation, errors);
        }
    }

    // -- page references -----------------------------------------------------
    for page in &domain.pages {
        for action in &page.actions {
            let targets = [
                action.command_id.is_some(),
                action.form_id.is_some(),
                action.workflow_id.is_some(),
            ]
            .iter()
            .filter(|set| **set)
            .count();
            if targets != 1 {
                errors.push(format!(
                    "page '{}' action '{}' must bind exactly one of command_id, form_id, workflow_id",
                    page.id, action.id
                ));
            }
            if let Some(cmd) = &action.command_id {
                if !domain.commands.iter().any(|c| &c.id == cmd) {
                    errors.push(format!(
                        "page '{}' action '{}' references unknown command '{cmd}'",
                        page.id, action.id
                    ));
                }
            }
            if let Some(form) = &action.form_id {
                if !domain.forms.iter().any(|f| &f.id == form) {
                    errors.push(format!(
                        "page '{}' action '{}' references unknown form '{form}'",
                        page.id, action.id
                    ));
                }
            }
            if let Some(wf) = &action.workflow_id {
                if !domain.workflows.iter().any(|w| &w.id == wf) {
                    errors.push(format!(
                        "page '{}' action '{}' references unknown workflow '{wf}'",
                        page.id, action.id
                    ));
                }
            }
        }
        for filter in &page.filters {
            if let Some(lookup) = &filter.lookup_id {
                if !domain.lookups.iter().any(|l| &l.id == lookup) {
                    errors.push(format!(
                        "page '{}' filter '{}' references unknown lookup '{lookup}'",
                        page.id, filter.field
                    ));
                }
            }
        }
        if let Some(ds) = &page.data_source {
            check_binding(index, "page", &page.id, &ds.operation, errors);
        }
    }

    // -- workflows -----------------------------------------------------------
    for wf in &domain.workflows {
        if wf.step(&wf.initial_step).is_none() {
            errors.push(format!(
                "workflow '{}' initial_step '{}' is not a declared step",
                wf.id, wf.initial_step
            ));
        }
        if let Some(target) = &wf.on_timeout {
            if wf.step(target).is_none() {
                errors.push(format!(
                    "workflow '{}' on_timeout '{target}' is not a declared step",
                    wf.id
                ));
            }
        }
        for step in &wf.steps {
            match step.step_type {
                StepType::System | StepType::Notification => {
                    match &step.operation {
                        Some(op) => check_binding(
                            index,
                            "workflow step",
                            &format!("{}/{}", wf.id, step.id),
                            op,
                            errors,
                        ),
                        None => errors.push(format!(
                            "workflow '{}' step '{}' is {:?} but has no operation",
                            wf.id, step.id, step.step_type
                        )),
                    }
                    check_mapping_strategy(
                        "workflow step",
                        &format!("{}/{}", wf.id, step.id),
                        &step.input_mapping,
                        errors,
                    );
                }
                StepType::Human => {
                    if let Some(form) = &step.form_id {
                        if !domain.forms.iter().any(|f| &f.id == form) {
                            errors.push(format!(
                                "workflow '{}' step '{}' references unknown form '{form}'",
                                wf.id, step.id
                            ));
                        }
                    }
                }
                StepType::Terminal => {}
            }
            if let Some(target) = &step.on_timeout {
                if wf.step(target).is_none() {
                    errors.push(format!(
                        "workflow '{}' step '{}' on_timeout '{target}' is not a declared step",
                        wf.id, step.id
                    ));
                }
            }
        }
        for t in &wf.transitions {
            if wf.step(&t.from).is_none() {
                errors.push(format!(
                    "workflow '{}' transition from unknown step '{}'",
                    wf.id, t.from
                ));
            }
            if wf.step(&t.to).is_none() {
                errors.push(format!(
                    "workflow '{}' transition to unknown step '{}'",
                    wf.id, t.to
                ));
            }
        }
    }

    // -- searches and lookups ------------------------------------------------
    for search in &domain.searches {
        check_binding(index, "search", &search.id, &search.operation, errors);
    }
    for lookup in &domain.lookups {
        check_binding(index, "lookup", &lookup.id, &lookup.operation, errors);
    }
}

fn check_capability_prefix(
    domain: &str,
    kind: &str,
    id: &str,
    cap: &str,
    errors: &mut Vec<String>,
) {
    if cap == "*" {
        return;
    }
    if !cap.starts_with(&format!("{domain}:")) {
        errors.push(format!(
            "{kind} '{id}' declares capability '{cap}' outside domain '{domain}'"
        ));
    }
}

fn check_binding(
    index: Option<&OpenApiIndex>,
    kind: &str,
    id: &str,
    binding: &OperationBinding,
    errors: &mut Vec<String>,
) {
    let (Some(index), OperationBinding::Openapi { service_id, operation_id }) = (index, binding)
    else {
        return;
    };
    if !index.contains(service_id, operation_id) {
        errors.push(format!(
            "{kind} '{id}' binds unknown operation '{operation_id}' on service '{service_id}'"
        ));
    }
}

fn check_mapping_strategy(kind: &str, id: &str, mapping: &InputMapping, errors: &mut Vec<String>) {
    if let Some(strategy) = mapping.body_mapping.as_deref() {
        if !matches!(strategy, "passthrough" | "template" | "projection") {
            errors.push(format!(
                "{kind} '{id}' declares unknown body mapping strategy '{strategy}'"
            ));
        }
    }
}
