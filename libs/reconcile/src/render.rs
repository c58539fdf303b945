//! Read path: current hard limits in display units.

use qm_scheme::{ObjectRule, OrderedMap, QuantityInput};

use crate::{ProjectQuotaState, ReconcileError};

/// Renders every declared hard limit in its parameter's display unit.
///
/// The result has the same shape as a submission's `quota` section, in
/// scheme order, so a client can edit it and send it back.
pub fn render_quota(
    objects: &[ObjectRule],
    live: &ProjectQuotaState,
) -> Result<OrderedMap<OrderedMap<QuantityInput>>, ReconcileError> {
    let mut rendered = OrderedMap::new();

    for object in objects {
        let state = live.require(&object.name)?;
        let mut parameters = OrderedMap::new();

        for parameter in &object.parameters {
            let hard = state
                .hard
                .get(&parameter.name)
                .ok_or_else(|| ReconcileError::missing_limit(&object.name, &parameter.name))?;
            let unit = parameter.display_unit();
            let display = hard.convert(unit);
            parameters.insert(
                parameter.name.clone(),
                QuantityInput::new(display.magnitude().to_string(), unit.suffix()),
            );
        }

        rendered.insert(object.name.clone(), parameters);
    }

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use qm_quantity::Quantity;

    use super::*;
    use crate::QuotaObjectState;

    fn scheme() -> qm_scheme::CompiledScheme {
        qm_scheme::compile_str(
            r#"{
                "name": "standard",
                "version": 1,
                "quota": {
                    "pods": {
                        "count": { "displayName": "Pods", "allowedUnits": "", "valueType": "integer" }
                    },
                    "compute": {
                        "limits.cpu": { "displayName": "CPU", "allowedUnits": ["", "m"], "valueType": "decimal" },
                        "limits.memory": { "displayName": "Memory", "allowedUnits": ["Gi", "Mi"], "valueType": "integer" }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn state(pairs: &[(&str, &str)]) -> QuotaObjectState {
        QuotaObjectState {
            hard: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Quantity::parse(v).unwrap()))
                .collect(),
            used: BTreeMap::new(),
        }
    }

    #[test]
    fn test_renders_in_display_units_and_scheme_order() {
        let mut live = ProjectQuotaState::new();
        live.insert(
            "compute",
            state(&[("limits.cpu", "1500m"), ("limits.memory", "512Mi")]),
        );
        live.insert("pods", state(&[("count", "10")]));

        let rendered = render_quota(scheme().objects(), &live).unwrap();

        assert_eq!(
            serde_json::to_value(&rendered).unwrap(),
            serde_json::json!({
                "pods": { "count": { "value": "10", "units": "" } },
                "compute": {
                    "limits.cpu": { "value": "1.5", "units": "" },
                    "limits.memory": { "value": "0.5", "units": "Gi" }
                }
            })
        );
        assert_eq!(rendered.keys().collect::<Vec<_>>(), vec!["pods", "compute"]);
    }

    #[test]
    fn test_missing_object_fails() {
        let mut live = ProjectQuotaState::new();
        live.insert("pods", state(&[("count", "10")]));

        let err = render_quota(scheme().objects(), &live).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InconsistentClusterState {
                object: "compute".to_string(),
                parameter: None,
            }
        );
    }

    #[test]
    fn test_missing_limit_fails() {
        let mut live = ProjectQuotaState::new();
        live.insert("pods", state(&[("count", "10")]));
        live.insert("compute", state(&[("limits.cpu", "1")]));

        assert!(matches!(
            render_quota(scheme().objects(), &live),
            Err(ReconcileError::InconsistentClusterState {
                parameter: Some(_),
                ..
            })
        ));
    }
}
