//! Persistence (§4.7): `artifacts.json` and `steps.json` under the
//! configured cache directory, written atomically and restored on startup.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifact::LinkType;
use crate::error::{CoreError, CoreResult};
use crate::master::Master;
use crate::unit::Node;

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactSave {
    hash: String,
    #[serde(default)]
    marks: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DependencySave {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    hash: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct StepSave {
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    dependencies: Option<Vec<DependencySave>>,
}

fn artifacts_path(cache_dir: &Path) -> std::path::PathBuf {
    cache_dir.join("artifacts.json")
}

fn steps_path(cache_dir: &Path) -> std::path::PathBuf {
    cache_dir.join("steps.json")
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> CoreResult<Option<T>> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::Io(e)),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| CoreError::MalformedCacheData {
            detail: format!("{} ({})", e, path.display()),
        })
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().expect("save path has a file name").to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

/// Restore hashes and marks into `master` from the cache directory. Absent
/// files are not an error; malformed ones are. A step cache entry that
/// fails the in-order completion discipline is logged and left incomplete
/// rather than aborting the whole load.
pub fn restore(master: &mut Master, cache_dir: &Path) -> CoreResult<()> {
    if let Some(saved) = read_json::<BTreeMap<String, ArtifactSave>>(&artifacts_path(cache_dir))? {
        for (name, entry) in saved {
            let Some(artifact) = master.artifacts.get_mut(&name) else {
                log::warn!("cache references unknown artifact '{name}', skipping");
                continue;
            };
            artifact.hash_cache_mut().store_hash(entry.hash);
            for (step_path, link_str) in entry.marks {
                let link_type = LinkType::parse(&link_str).ok_or_else(|| CoreError::MalformedCacheData {
                    detail: format!("unknown mark type '{link_str}' for artifact '{name}'"),
                })?;
                artifact.manager_mut().restore_mark(step_path, link_type);
            }
        }
    }

    if let Some(saved) = read_json::<BTreeMap<String, StepSave>>(&steps_path(cache_dir))? {
        for (step_path, entry) in saved {
            let Ok(step_id) = master.tree.find_unit(&step_path) else {
                log::warn!("cache references unknown step '{step_path}', skipping");
                continue;
            };
            if let Some(deps) = entry.dependencies {
                match master.tree.node_mut(step_id) {
                    Node::Step(s) => {
                        for saved_dep in &deps {
                            if let Some(dep) = s
                                .dependencies
                                .iter_mut()
                                .find(|d| d.id == saved_dep.id && d.type_str() == saved_dep.kind)
                            {
                                dep.restore_hash(saved_dep.hash.clone());
                            }
                        }
                    }
                    _ => unreachable!("find_unit on a step path returns a Step"),
                }
            }
            if entry.completed == Some(true) {
                if let Err(e) = master.tree.complete_step(step_id) {
                    log::warn!("could not restore completion of '{step_path}': {e}");
                }
            }
        }
    }

    Ok(())
}

/// Best-effort save: the caller is expected to log and suppress any error
/// (§4.7 — save happens on shutdown and must never abort the process).
pub fn save(master: &Master, cache_dir: &Path) -> std::io::Result<()> {
    swd_exec::ensure_dir(cache_dir)?;

    let mut artifacts_save = BTreeMap::new();
    for (name, artifact) in &master.artifacts {
        let marks = artifact
            .manager()
            .marks()
            .iter()
            .map(|(path, lt)| (path.clone(), lt.as_str().to_string()))
            .collect();
        artifacts_save.insert(
            name.clone(),
            ArtifactSave {
                hash: artifact.hash_cache().get_hash().to_string(),
                marks,
            },
        );
    }
    write_atomic(
        &artifacts_path(cache_dir),
        serde_json::to_vec_pretty(&artifacts_save)
            .map_err(serde_json_error_to_io)?
            .as_slice(),
    )?;

    let mut steps_save = BTreeMap::new();
    for step_id in master.tree.all_steps_under(master.tree.root()) {
        let path = master.tree.canonical_path(step_id);
        let (completed, deps) = match master.tree.node(step_id) {
            Node::Step(s) => (
                s.completed,
                s.dependencies
                    .iter()
                    .map(|d| DependencySave {
                        id: d.id.clone(),
                        kind: d.type_str().to_string(),
                        hash: d.stored_hash().to_string(),
                    })
                    .collect::<Vec<_>>(),
            ),
            _ => unreachable!(),
        };
        steps_save.insert(
            path,
            StepSave {
                completed: Some(completed),
                dependencies: Some(deps),
            },
        );
    }
    write_atomic(
        &steps_path(cache_dir),
        serde_json::to_vec_pretty(&steps_save)
            .map_err(serde_json_error_to_io)?
            .as_slice(),
    )
}

fn serde_json_error_to_io(e: serde_json::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e)
}
