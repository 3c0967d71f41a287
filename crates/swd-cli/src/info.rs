//! `swd_info` probe invocation and schema validation (§6), including the
//! `rules` object a group's `group.swd` may carry to augment dependencies of
//! steps declared by its own scripts (script-syntax.cc's `checkGroupFile`/
//! `checkRule`; application semantics are this repo's own, since the
//! retrieved original only carries the validator, not the merge).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use swd_core::{Artifact, ArtifactKind, Dependency, LinkType, Node, NodeId, StepFlags, Tree};

fn run_probe(file: &Path) -> Result<Value> {
    let output = Command::new(file)
        .arg("swd_info")
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("running '{} swd_info'", file.display()))?;
    if !output.status.success() {
        bail!("'{} swd_info' exited with a failure status", file.display());
    }
    serde_json::from_slice(&output.stdout)
        .with_context(|| format!("'{} swd_info' did not print valid JSON", file.display()))
}

fn is_owner_executable(path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path)?;
    Ok(meta.permissions().mode() & 0o100 != 0)
}

fn label(scope: &str) -> &str {
    if scope.is_empty() {
        "<root>"
    } else {
        scope
    }
}

/// Absolute ids (leading `/`) are used verbatim (minus the slash); otherwise
/// the id is prefixed with the enclosing unit's own canonical path.
fn qualify(id: &str, scope: &str) -> String {
    if let Some(rest) = id.strip_prefix('/') {
        rest.to_string()
    } else if scope.is_empty() {
        id.to_string()
    } else {
        format!("{scope}/{id}")
    }
}

fn parse_link_type(s: &str, unit_label: &str) -> Result<LinkType> {
    LinkType::parse(s).ok_or_else(|| anyhow::anyhow!("{unit_label}: unknown artifact link type '{s}'"))
}

fn parse_dependency(value: &Value, unit_label: &str, scope: &str) -> Result<Dependency> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("{unit_label}: dependency must be an object"))?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("{unit_label}: dependency must have a type-element"))?;
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("{unit_label}: dependency/id must exist"))?
        .to_string();
    if id.is_empty() {
        bail!("{unit_label}: dependency/id must not be empty");
    }

    match kind {
        "artifact" => Ok(Dependency::artifact_ref(qualify(&id, scope))),
        "data" => {
            let data = obj
                .get("data")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("{unit_label}: dependency[type=data]/data must exist"))?;
            Ok(Dependency::inline_data(id, data.as_bytes().to_vec()))
        }
        "file" => {
            let path = obj
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("{unit_label}: dependency[type=file]/path must exist"))?;
            Ok(Dependency::file_on_disk(id, PathBuf::from(path)))
        }
        other => bail!("{unit_label}: dependency/type has an unknown value '{other}'"),
    }
}

fn parse_dependency_array(value: &Value, unit_label: &str, scope: &str) -> Result<Vec<Dependency>> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("{unit_label}: dependencies must be an array"))?;
    items.iter().map(|d| parse_dependency(d, unit_label, scope)).collect()
}

/// Merge one unit's `artifacts` object into the registry, erroring on a
/// duplicate fully-qualified name (artifacts are declared exactly once).
fn merge_artifacts(
    value: &Value,
    scope: &str,
    unit_label: &str,
    artifacts: &mut BTreeMap<String, Artifact>,
) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("{unit_label}: artifact container must be an object"))?;
    for (key, spec) in obj {
        if key.is_empty() {
            bail!("{unit_label}: artifact key must not be empty");
        }
        let spec_obj = spec
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("{unit_label}: artifact value must be an object"))?;
        let kind_str = spec_obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("{unit_label}: artifact/type must exist"))?;
        let path = spec_obj
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("{unit_label}: artifact/path must exist"))?;

        let kind = match kind_str {
            "file" => ArtifactKind::File { path: PathBuf::from(path) },
            "directory" => {
                let exclude = match spec_obj.get("exclude") {
                    None => Vec::new(),
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|v| {
                            v.as_str().map(|s| s.to_string()).ok_or_else(|| {
                                anyhow::anyhow!(
                                    "{unit_label}: artifact[type=directory]/exclude/* must be strings"
                                )
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    Some(_) => bail!("{unit_label}: artifact[type=directory]/exclude must be an array"),
                };
                ArtifactKind::Directory { path: PathBuf::from(path), exclude }
            }
            other => bail!("{unit_label}: artifact/type has an unknown value '{other}'"),
        };

        if let Some(managed) = spec_obj.get("managed") {
            // Recorded for schema compatibility only; `Artifact::scope` already
            // tracks which unit declared it, so there is nothing else to do.
            if !managed.is_boolean() {
                bail!("{unit_label}: artifact/managed must be a boolean");
            }
        }

        let qualified = qualify(key, scope);
        if artifacts.contains_key(&qualified) {
            bail!("{unit_label}: artifact '{qualified}' defined more than once");
        }
        artifacts.insert(qualified.clone(), Artifact::new(qualified, scope.to_string(), kind));
    }
    Ok(())
}

struct ParsedStep {
    name: String,
    flags: StepFlags,
    artifacts: Vec<(String, LinkType)>,
    dependencies: Vec<Dependency>,
}

fn parse_step(value: &Value, scope: &str, unit_label: &str) -> Result<ParsedStep> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("{unit_label}: step must be an object"))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("{unit_label}: step must have a name"))?
        .to_string();
    let step_label = format!("{unit_label} {name}");

    let mut flags = StepFlags::default();
    if let Some(raw_flags) = obj.get("flags") {
        let items = raw_flags
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("{step_label}: step's flags-element must be an array"))?;
        for f in items {
            let flag = f
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("{step_label}: step's flags must be strings"))?
                .to_ascii_lowercase();
            match flag.as_str() {
                "always" => flags.always = true,
                "sudo" => flags.sudo = true,
                other => bail!("{step_label}: step has an unknown flag '{other}'"),
            }
        }
    }

    let mut artifacts = Vec::new();
    if let Some(links) = obj.get("artifacts") {
        let links_obj = links
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("{step_label}: step's artifact link container must be an object"))?;
        for (id, link_value) in links_obj {
            if id.is_empty() {
                bail!("{step_label}: step's artifact link id must not be empty");
            }
            let link_str = link_value
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("{step_label}: step's artifact link type must be a string"))?;
            artifacts.push((qualify(id, scope), parse_link_type(link_str, &step_label)?));
        }
    }

    let dependencies = match obj.get("dependencies") {
        Some(deps) => parse_dependency_array(deps, &step_label, scope)?,
        None => Vec::new(),
    };

    Ok(ParsedStep { name, flags, artifacts, dependencies })
}

fn parse_steps(value: &Value, scope: &str, unit_label: &str) -> Result<Vec<ParsedStep>> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("{unit_label}: step container must be an array"))?;
    items.iter().map(|s| parse_step(s, scope, unit_label)).collect()
}

/// Walk the Group/Script skeleton running each unit's `swd_info` probe,
/// adding Steps to `tree` and merging declared artifacts into `artifacts`.
pub fn populate(tree: &mut Tree, artifacts: &mut BTreeMap<String, Artifact>, root_path: &Path) -> Result<()> {
    let root = tree.root();
    populate_group(tree, artifacts, root_path, root)
}

fn populate_group(
    tree: &mut Tree,
    artifacts: &mut BTreeMap<String, Artifact>,
    root_path: &Path,
    group: NodeId,
) -> Result<()> {
    let scope = tree.canonical_path(group);
    let unit_label = label(&scope).to_string();

    let group_dir = if scope.is_empty() {
        root_path.to_path_buf()
    } else {
        root_path.join(&scope)
    };
    let group_info_path = group_dir.join("group.swd");

    let mut rules: BTreeMap<String, Vec<Dependency>> = BTreeMap::new();

    if group_info_path.is_file() {
        if !is_owner_executable(&group_info_path)? {
            bail!("{unit_label}: group.swd found but it is not executable");
        }
        let j = run_probe(&group_info_path)?;
        let obj = j
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("{unit_label}: group-json must be an object"))?;
        if let Some(a) = obj.get("artifacts") {
            merge_artifacts(a, &scope, &unit_label, artifacts)?;
        }
        if let Some(r) = obj.get("rules") {
            let rules_obj = r
                .as_object()
                .ok_or_else(|| anyhow::anyhow!("{unit_label}: rules container must be an object"))?;
            for (step_name, rule) in rules_obj {
                if step_name.is_empty() {
                    bail!("{unit_label}: rule's step-indicator key must not be empty");
                }
                let rule_obj = rule
                    .as_object()
                    .ok_or_else(|| anyhow::anyhow!("{unit_label}: rule's step-indicator value must be an object"))?;
                let deps = match rule_obj.get("dependencies") {
                    Some(d) => parse_dependency_array(d, &unit_label, &scope)?,
                    None => bail!("{unit_label}: rule '{step_name}' has no dependencies"),
                };
                rules.insert(step_name.clone(), deps);
            }
        }
    }

    let children = tree.group_children(group).to_vec();
    for child in &children {
        match tree.node(*child) {
            Node::Group(_) => populate_group(tree, artifacts, root_path, *child)?,
            Node::Script(_) => populate_script(tree, artifacts, root_path, *child)?,
            Node::Step(_) => unreachable!("groups never own steps directly"),
        }
    }

    apply_rules(tree, &children, rules, &unit_label)
}

fn apply_rules(
    tree: &mut Tree,
    group_children: &[NodeId],
    rules: BTreeMap<String, Vec<Dependency>>,
    unit_label: &str,
) -> Result<()> {
    for (step_name, deps) in rules {
        let mut matches = Vec::new();
        for &child in group_children {
            if let Node::Script(s) = tree.node(child) {
                for &step_id in &s.steps {
                    if tree.name(step_id) == step_name {
                        matches.push(step_id);
                    }
                }
            }
        }
        match matches.as_slice() {
            [] => bail!("{unit_label}: rule references unknown step '{step_name}'"),
            [step_id] => {
                let step_id = *step_id;
                if let Node::Step(s) = tree.node_mut(step_id) {
                    s.dependencies.extend(deps);
                }
            }
            _ => bail!("{unit_label}: rule target '{step_name}' is ambiguous among this group's scripts"),
        }
    }
    Ok(())
}

fn populate_script(
    tree: &mut Tree,
    artifacts: &mut BTreeMap<String, Artifact>,
    root_path: &Path,
    script: NodeId,
) -> Result<()> {
    let scope = tree.canonical_path(script);
    let exec_path = root_path.join(tree.exec_path(script));

    let j = run_probe(&exec_path)?;
    let obj = j
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("{scope}: script-json must be an object"))?;

    if let Some(a) = obj.get("artifacts") {
        merge_artifacts(a, &scope, &scope, artifacts)?;
    }

    if let Some(steps) = obj.get("steps") {
        for parsed in parse_steps(steps, &scope, &scope)? {
            tree.add_step(script, parsed.name, parsed.artifacts, parsed.dependencies, parsed.flags);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_probe(path: &Path, json: &str) {
        fs::write(path, format!("#!/bin/bash\ncat <<'PROBE_EOF'\n{json}\nPROBE_EOF\n")).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn qualify_strips_leading_slash_for_absolute_ids() {
        assert_eq!(qualify("/shared/out", "10-a"), "shared/out");
        assert_eq!(qualify("out", "10-a"), "10-a/out");
        assert_eq!(qualify("out", ""), "out");
    }

    #[test]
    fn run_probe_reads_json_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("probe.sh");
        write_probe(&file, r#"{"steps": []}"#);
        let v = run_probe(&file).unwrap();
        assert_eq!(v["steps"], Value::Array(vec![]));
    }

    #[test]
    fn run_probe_nonzero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("probe.sh");
        fs::write(&file, "#!/bin/bash\nexit 1\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(run_probe(&file).is_err());
    }

    #[test]
    fn run_probe_non_json_stdout_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("probe.sh");
        fs::write(&file, "#!/bin/bash\necho not json\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(run_probe(&file).is_err());
    }

    #[test]
    fn populate_script_adds_steps_and_qualified_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write_probe(
            dir.path().join("10-a.swd").as_path(),
            r#"{
                "artifacts": {"out": {"type": "file", "path": "out.txt"}},
                "steps": [{"name": "build", "dependencies": [{"type": "artifact", "id": "out"}]}]
            }"#,
        );

        let mut tree = Tree::new("root");
        let root = tree.root();
        let script = tree.add_script(root, "10-a");
        let mut artifacts = BTreeMap::new();

        populate_script(&mut tree, &mut artifacts, dir.path(), script).unwrap();

        assert!(artifacts.contains_key("10-a/out"));
        let steps = tree.script_steps(script);
        assert_eq!(steps.len(), 1);
        match tree.node(steps[0]) {
            Node::Step(s) => {
                assert_eq!(s.name, "build");
                assert_eq!(s.dependencies[0].id, "10-a/out");
            }
            _ => panic!("expected a step"),
        }
    }

    #[test]
    fn duplicate_artifact_declaration_is_an_error() {
        let mut artifacts = BTreeMap::new();
        let spec: Value = serde_json::from_str(r#"{"out": {"type": "file", "path": "out.txt"}}"#).unwrap();
        merge_artifacts(&spec, "10-a", "10-a", &mut artifacts).unwrap();
        assert!(merge_artifacts(&spec, "10-a", "10-a", &mut artifacts).is_err());
    }

    #[test]
    fn group_rules_augment_the_matching_steps_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        write_probe(&dir.path().join("group.swd"), r#"{
            "rules": {"build": {"dependencies": [{"type": "data", "id": "seed", "data": "xyz"}]}}
        }"#);
        write_probe(&dir.path().join("10-a.swd"), r#"{"steps": [{"name": "build"}]}"#);

        let mut tree = Tree::new("root");
        let root = tree.root();
        tree.add_script(root, "10-a");
        let mut artifacts = BTreeMap::new();

        populate_group(&mut tree, &mut artifacts, dir.path(), root).unwrap();

        let script = tree.find_child(root, "10-a").unwrap();
        let step = tree.script_steps(script)[0];
        match tree.node(step) {
            Node::Step(s) => {
                assert_eq!(s.dependencies.len(), 1);
                assert_eq!(s.dependencies[0].id, "seed");
            }
            _ => panic!("expected a step"),
        }
    }

    #[test]
    fn rule_referencing_unknown_step_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_probe(&dir.path().join("group.swd"), r#"{
            "rules": {"nonexistent": {"dependencies": [{"type": "data", "id": "seed", "data": "x"}]}}
        }"#);
        write_probe(&dir.path().join("10-a.swd"), r#"{"steps": [{"name": "build"}]}"#);

        let mut tree = Tree::new("root");
        let root = tree.root();
        tree.add_script(root, "10-a");
        let mut artifacts = BTreeMap::new();

        assert!(populate_group(&mut tree, &mut artifacts, dir.path(), root).is_err());
    }

    #[test]
    fn rule_matching_steps_in_two_sibling_scripts_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        write_probe(&dir.path().join("group.swd"), r#"{
            "rules": {"build": {"dependencies": [{"type": "data", "id": "seed", "data": "x"}]}}
        }"#);
        write_probe(&dir.path().join("10-a.swd"), r#"{"steps": [{"name": "build"}]}"#);
        write_probe(&dir.path().join("20-b.swd"), r#"{"steps": [{"name": "build"}]}"#);

        let mut tree = Tree::new("root");
        let root = tree.root();
        tree.add_script(root, "10-a");
        tree.add_script(root, "20-b");
        let mut artifacts = BTreeMap::new();

        assert!(populate_group(&mut tree, &mut artifacts, dir.path(), root).is_err());
    }
}
