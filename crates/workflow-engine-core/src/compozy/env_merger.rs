//! Merges environment maps with precedence workflow < task < component (§4.2).

use super::config::EnvMap;

/// Merges up to three maps into a fresh one. Missing maps are treated as empty;
/// none of the inputs are mutated.
pub fn merge_env(workflow: Option<&EnvMap>, task: Option<&EnvMap>, component: Option<&EnvMap>) -> EnvMap {
    let mut merged = EnvMap::new();
    for layer in [workflow, task, component].into_iter().flatten() {
        for (k, v) in layer {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn component_overrides_task_overrides_workflow() {
        let workflow = env(&[("A", "workflow"), ("B", "workflow")]);
        let task = env(&[("B", "task"), ("C", "task")]);
        let component = env(&[("C", "component")]);
        let merged = merge_env(Some(&workflow), Some(&task), Some(&component));
        assert_eq!(merged.get("A").unwrap(), "workflow");
        assert_eq!(merged.get("B").unwrap(), "task");
        assert_eq!(merged.get("C").unwrap(), "component");
    }

    #[test]
    fn missing_maps_are_empty() {
        let task = env(&[("A", "task")]);
        let merged = merge_env(None, Some(&task), None);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("A").unwrap(), "task");
    }

    #[test]
    fn inputs_are_not_mutated() {
        let workflow = env(&[("A", "workflow")]);
        let _ = merge_env(Some(&workflow), None, None);
        assert_eq!(workflow.get("A").unwrap(), "workflow");
    }
}
